//! Projection data containers: single viewgrams, sets of viewgrams related by
//! symmetry, and sinograms.
//!
//! A *viewgram* holds the data of one (view, segment) pair, indexed by
//! `[axial position, tangential position]`. Axial and tangential position
//! numbers are signed and need not start at zero: growing a viewgram to cover
//! re-projected data extends its axial range below the measured minimum.

use std::ops::{DivAssign, MulAssign};

use ndarray::{s, Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2, Axis};

use crate::symmetries::ViewSegment;

/// Inclusive range of axial position numbers. Empty when `min > max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AxialRange {
    pub min: i32,
    pub max: i32,
}

impl AxialRange {
    pub fn new(min: i32, max: i32) -> Self { Self { min, max } }

    pub fn is_empty(&self) -> bool { self.min > self.max }

    pub fn len(&self) -> usize {
        if self.is_empty() { 0 } else { (self.max - self.min + 1) as usize }
    }

    pub fn contains(&self, pos: i32) -> bool { self.min <= pos && pos <= self.max }

    /// Smallest range covering both `self` and `other`
    pub fn hull(&self, other: AxialRange) -> Self {
        if self .is_empty() { return other }
        if other.is_empty() { return *self }
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn intersection(&self, other: AxialRange) -> Self {
        Self::new(self.min.max(other.min), self.max.min(other.max))
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<i32> { self.min..=self.max }
}

impl std::fmt::Display for AxialRange {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

// ----- Viewgram ----------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub struct Viewgram {
    pub view_segment: ViewSegment,
    min_axial_pos_num: i32,
    min_tangential_pos_num: i32,
    data: Array2<f32>,
}

impl Viewgram {

    pub fn new(view_segment: ViewSegment, min_axial_pos_num: i32, min_tangential_pos_num: i32, data: Array2<f32>) -> Self {
        Self { view_segment, min_axial_pos_num, min_tangential_pos_num, data }
    }

    pub fn zeros(view_segment: ViewSegment, axial: AxialRange, min_tangential_pos_num: i32, num_tangential_poss: usize) -> Self {
        let data = Array2::zeros((axial.len(), num_tangential_poss));
        Self::new(view_segment, axial.min, min_tangential_pos_num, data)
    }

    pub fn view_num   (&self) -> i32 { self.view_segment.view }
    pub fn segment_num(&self) -> i32 { self.view_segment.segment }

    pub fn axial_range(&self) -> AxialRange {
        AxialRange::new(self.min_axial_pos_num, self.min_axial_pos_num + self.data.nrows() as i32 - 1)
    }

    pub fn min_axial_pos_num(&self) -> i32 { self.min_axial_pos_num }
    pub fn max_axial_pos_num(&self) -> i32 { self.axial_range().max }

    pub fn min_tangential_pos_num(&self) -> i32 { self.min_tangential_pos_num }
    pub fn max_tangential_pos_num(&self) -> i32 { self.min_tangential_pos_num + self.data.ncols() as i32 - 1 }
    pub fn num_tangential_poss   (&self) -> usize { self.data.ncols() }

    pub fn data    (&self) -> &Array2<f32> { &self.data }
    pub fn data_mut(&mut self) -> &mut Array2<f32> { &mut self.data }

    fn row_index(&self, axial_pos: i32) -> usize { (axial_pos - self.min_axial_pos_num) as usize }

    /// Value at (axial, tangential) position numbers; zero outside the stored range
    pub fn get(&self, axial_pos: i32, tangential_pos: i32) -> f32 {
        if !self.axial_range().contains(axial_pos) ||
            tangential_pos < self.min_tangential_pos_num ||
            tangential_pos > self.max_tangential_pos_num() { return 0.0 }
        self.data[[self.row_index(axial_pos), (tangential_pos - self.min_tangential_pos_num) as usize]]
    }

    pub fn row(&self, axial_pos: i32) -> ArrayView1<f32> {
        self.data.row(self.row_index(axial_pos))
    }

    pub fn row_mut(&mut self, axial_pos: i32) -> ArrayViewMut1<f32> {
        let i = self.row_index(axial_pos);
        self.data.row_mut(i)
    }

    /// Mutable view of the rows in `range`, which must lie within the
    /// viewgram's axial range
    pub fn rows_mut(&mut self, range: AxialRange) -> ArrayViewMut2<f32> {
        let (lo, hi) = (self.row_index(range.min), self.row_index(range.max));
        self.data.slice_mut(s![lo..=hi, ..])
    }

    /// Extend the axial range to include `range`, keeping existing values and
    /// zero-filling new rows
    pub fn grow(&mut self, range: AxialRange) {
        let current = self.axial_range();
        let target = current.hull(range);
        if target == current { return }
        let mut grown = Array2::zeros((target.len(), self.data.ncols()));
        let offset = (current.min - target.min) as usize;
        grown.slice_mut(s![offset..offset + current.len(), ..]).assign(&self.data);
        self.data = grown;
        self.min_axial_pos_num = target.min;
    }
}

// ----- RelatedViewgrams --------------------------------------------------------------

/// A canonical (view, segment) pair's viewgram together with the viewgrams
/// related to it by symmetry. The first viewgram is the canonical one.
#[derive(Clone, Debug, PartialEq)]
pub struct RelatedViewgrams {
    basic: ViewSegment,
    viewgrams: Vec<Viewgram>,
    filtered: bool,
    boundary_weighted: bool,
}

impl RelatedViewgrams {

    pub fn new(basic: ViewSegment, viewgrams: Vec<Viewgram>) -> Self {
        Self { basic, viewgrams, filtered: false, boundary_weighted: false }
    }

    pub fn basic(&self) -> ViewSegment { self.basic }
    pub fn basic_segment_num(&self) -> i32 { self.basic.segment }
    pub fn basic_view_num   (&self) -> i32 { self.basic.view }

    pub fn len(&self) -> usize { self.viewgrams.len() }
    pub fn is_empty(&self) -> bool { self.viewgrams.is_empty() }

    pub fn iter    (&self)     -> std::slice::Iter   <'_, Viewgram> { self.viewgrams.iter() }
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Viewgram> { self.viewgrams.iter_mut() }

    pub fn viewgrams(&self) -> &[Viewgram] { &self.viewgrams }
    pub(crate) fn viewgrams_mut(&mut self) -> &mut [Viewgram] { &mut self.viewgrams }

    /// Axial range shared by all viewgrams in the set
    pub fn axial_range(&self) -> AxialRange {
        self.viewgrams.first()
            .map(Viewgram::axial_range)
            .unwrap_or(AxialRange::new(0, -1))
    }

    pub fn num_tangential_poss(&self) -> usize {
        self.viewgrams.first().map_or(0, Viewgram::num_tangential_poss)
    }

    /// Grow every viewgram to cover `range` (see `Viewgram::grow`)
    pub fn grow(&mut self, range: AxialRange) {
        self.viewgrams.iter_mut().for_each(|v| v.grow(range));
    }

    pub fn find_max(&self) -> f32 {
        self.viewgrams.iter()
            .flat_map(|v| v.data.iter().copied())
            .fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn sum(&self) -> f64 {
        self.viewgrams.iter().flat_map(|v| v.data.iter()).map(|&x| x as f64).sum()
    }

    pub fn is_filtered(&self) -> bool { self.filtered }
    pub(crate) fn mark_filtered(&mut self) { self.filtered = true }

    pub fn is_boundary_weighted(&self) -> bool { self.boundary_weighted }

    /// Halve all values, unless this has been done already. Returns whether
    /// the weight was applied by this call.
    pub fn apply_boundary_weight(&mut self) -> bool {
        if self.boundary_weighted { return false }
        *self /= 2.0;
        self.boundary_weighted = true;
        true
    }

    pub fn into_viewgrams(self) -> Vec<Viewgram> { self.viewgrams }
}

impl MulAssign<f32> for RelatedViewgrams {
    fn mul_assign(&mut self, factor: f32) {
        self.viewgrams.iter_mut().for_each(|v| v.data *= factor);
    }
}

impl DivAssign<f32> for RelatedViewgrams {
    fn div_assign(&mut self, divisor: f32) {
        self.viewgrams.iter_mut().for_each(|v| v.data /= divisor);
    }
}

// ----- Sinogram ----------------------------------------------------------------------

/// Data of all views at one (segment, axial position), indexed by
/// `[view, tangential position]`
#[derive(Clone, Debug, PartialEq)]
pub struct Sinogram {
    pub segment: i32,
    pub axial_pos: i32,
    pub data: Array2<f32>,
}

impl Sinogram {
    pub fn find_max(&self) -> f32 { self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max) }

    /// Collect the row at `axial_pos` of each viewgram (ordered by view) into
    /// a sinogram
    pub fn from_viewgrams<'v>(viewgrams: impl IntoIterator<Item = &'v Viewgram>, segment: i32, axial_pos: i32) -> Self {
        let rows: Vec<_> = viewgrams.into_iter().map(|v| v.row(axial_pos)).collect();
        let n_tangential = rows.first().map_or(0, |r| r.len());
        let mut data = Array2::zeros((rows.len(), n_tangential));
        for (mut out, row) in data.axis_iter_mut(Axis(0)).zip(rows) {
            out.assign(&row);
        }
        Self { segment, axial_pos, data }
    }
}
