//! Two-dimensional FFTs of zero-padded viewgrams, row by row then column by
//! column, with plans computed once per shape.

use std::sync::Arc;

use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

pub type Complex32 = Complex<f32>;

/// Smallest power of two which is at least `(extension + 1) * extent`
pub fn padded_size(extent: usize, extension: usize) -> usize {
    ((extension + 1) * extent).max(1).next_power_of_two()
}

/// Frequency index `k` of an `n`-point DFT, mapped to `-(n/2) ..= n/2`
#[inline]
pub fn signed_frequency(k: usize, n: usize) -> i32 {
    if k <= n / 2 { k as i32 } else { k as i32 - n as i32 }
}

pub struct Fft2d {
    rows: usize,
    cols: usize,
    row_forward: Arc<dyn Fft<f32>>,
    row_inverse: Arc<dyn Fft<f32>>,
    col_forward: Arc<dyn Fft<f32>>,
    col_inverse: Arc<dyn Fft<f32>>,
}

impl Fft2d {

    pub fn new(rows: usize, cols: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            rows, cols,
            row_forward: planner.plan_fft_forward(cols),
            row_inverse: planner.plan_fft_inverse(cols),
            col_forward: planner.plan_fft_forward(rows),
            col_inverse: planner.plan_fft_inverse(rows),
        }
    }

    pub fn shape(&self) -> (usize, usize) { (self.rows, self.cols) }

    /// Unnormalized forward transform, in place
    pub fn forward(&self, data: &mut Array2<Complex32>) {
        transform_rows(data, &self.row_forward);
        transform_cols(data, &self.col_forward);
    }

    /// Inverse transform, normalized by `1 / (rows * cols)`, in place
    pub fn inverse(&self, data: &mut Array2<Complex32>) {
        transform_cols(data, &self.col_inverse);
        transform_rows(data, &self.row_inverse);
        let norm = 1.0 / (self.rows * self.cols) as f32;
        data.mapv_inplace(|c| c * norm);
    }
}

fn transform_rows(data: &mut Array2<Complex32>, fft: &Arc<dyn Fft<f32>>) {
    let mut buffer = vec![Complex32::new(0.0, 0.0); data.ncols()];
    for mut row in data.rows_mut() {
        buffer.iter_mut().zip(row.iter()).for_each(|(b, &x)| *b = x);
        fft.process(&mut buffer);
        row.iter_mut().zip(&buffer).for_each(|(x, &b)| *x = b);
    }
}

fn transform_cols(data: &mut Array2<Complex32>, fft: &Arc<dyn Fft<f32>>) {
    let mut buffer = vec![Complex32::new(0.0, 0.0); data.nrows()];
    for mut col in data.columns_mut() {
        buffer.iter_mut().zip(col.iter()).for_each(|(b, &x)| *b = x);
        fft.process(&mut buffer);
        col.iter_mut().zip(&buffer).for_each(|(x, &b)| *x = b);
    }
}
