//! Frequency windows shared by the ramp and Colsher filters.

use serde::Deserialize;

use crate::fft::{signed_frequency, Complex32, Fft2d};

/// Generalised Hamming window: `alpha + (1 - alpha) cos(PI f / cutoff)` up
/// to `cutoff` (in cycles per sample), zero beyond
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterParameters {
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    #[serde(default = "default_cutoff")]
    pub cutoff: f32,
}

fn default_alpha () -> f32 { 1.0 }
fn default_cutoff() -> f32 { 0.5 }

impl Default for FilterParameters {
    fn default() -> Self { Self { alpha: default_alpha(), cutoff: default_cutoff() } }
}

impl FilterParameters {

    pub fn validate(&self, name: &str) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(format!("{name}: alpha must lie in [0, 1], got {}", self.alpha))
        }
        if !(self.cutoff > 0.0 && self.cutoff <= 0.5) {
            return Err(format!("{name}: cutoff must lie in (0, 0.5], got {}", self.cutoff))
        }
        Ok(())
    }

    #[inline]
    pub fn window(&self, frequency: f32) -> f32 {
        let f = frequency.abs();
        if f > self.cutoff { return 0.0 }
        self.alpha + (1.0 - self.alpha) * (std::f32::consts::PI * f / self.cutoff).cos()
    }
}

/// Windowed ramp `|nu|` for an `n`-point DFT of data sampled every
/// `sampling` mm, in DFT frequency order
pub fn ramp(n: usize, sampling: f32, parameters: &FilterParameters) -> Vec<f32> {
    (0..n).map(|k| {
        let f = signed_frequency(k, n).unsigned_abs() as f32 / n as f32;
        f / sampling * parameters.window(f)
    }).collect()
}

/// Apply a real, even 1D frequency response to each row of `rows`,
/// zero-padded to the length of `response`, two rows per transform
pub fn filter_rows(rows: &mut ndarray::Array2<f32>, response: &[f32]) {
    let (n_rows, n_cols) = rows.dim();
    let fft = Fft2d::new(1, response.len());
    let mut buffer = ndarray::Array2::from_elem((1, response.len()), Complex32::new(0.0, 0.0));
    let mut r = 0;
    while r < n_rows {
        let second = r + 1 < n_rows;
        buffer.fill(Complex32::new(0.0, 0.0));
        for c in 0..n_cols {
            let im = if second { rows[[r + 1, c]] } else { 0.0 };
            buffer[[0, c]] = Complex32::new(rows[[r, c]], im);
        }
        fft.forward(&mut buffer);
        buffer.iter_mut().zip(response).for_each(|(x, &h)| *x *= h);
        fft.inverse(&mut buffer);
        for c in 0..n_cols {
            rows[[r, c]] = buffer[[0, c]].re;
            if second { rows[[r + 1, c]] = buffer[[0, c]].im }
        }
        r += 2;
    }
}

#[cfg(test)]
mod test_filter {
    use super::*;
    use float_eq::assert_float_eq;
    use ndarray::Array2;
    use rstest::rstest;

    #[rstest(/**/ alpha, cutoff, f   , expected,
             case(1.0  , 0.5   , 0.0 , 1.0),
             case(1.0  , 0.5   , 0.5 , 1.0),
             case(1.0  , 0.25  , 0.3 , 0.0),
             case(0.5  , 0.5   , 0.5 , 0.0),
             case(0.54 , 0.5   , 0.25, 0.54),
             case(0.5  , 0.5   , 0.0 , 1.0),
    )]
    fn generalised_hamming(alpha: f32, cutoff: f32, f: f32, expected: f32) {
        let p = FilterParameters { alpha, cutoff };
        assert_float_eq!(p.window(f), expected, abs <= 1e-6);
        assert_float_eq!(p.window(-f), expected, abs <= 1e-6);
    }

    #[test]
    fn invalid_parameters() {
        assert!(FilterParameters { alpha: 1.5, cutoff: 0.5 }.validate("ramp").is_err());
        assert!(FilterParameters { alpha: 0.5, cutoff: 0.0 }.validate("ramp").is_err());
        assert!(FilterParameters::default().validate("ramp").is_ok());
    }

    #[test]
    fn ramp_is_even_and_zero_at_dc() {
        let r = ramp(8, 2.0, &FilterParameters::default());
        assert_eq!(r[0], 0.0);
        for k in 1..8 { assert_float_eq!(r[k], r[8 - k], abs <= 1e-7) }
        assert_float_eq!(r[4], 0.5 / 2.0, abs <= 1e-7);
    }

    #[test]
    fn filtering_rows_in_pairs_matches_one_at_a_time() {
        let response = ramp(16, 1.0, &FilterParameters { alpha: 0.5, cutoff: 0.4 });
        let data = Array2::from_shape_fn((3, 5), |(r, c)| ((r + 1) * (c + 2)) as f32 % 7.0);
        let mut together = data.clone();
        filter_rows(&mut together, &response);
        for r in 0..3 {
            let mut alone = data.slice(ndarray::s![r..r + 1, ..]).to_owned();
            filter_rows(&mut alone, &response);
            for c in 0..5 {
                assert_float_eq!(together[[r, c]], alone[[0, c]], abs <= 1e-4);
            }
        }
    }
}
