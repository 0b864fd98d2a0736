//! Measured (or simulated) projection data of a whole scanner: one
//! `[view, axial, tangential]` array per segment.

use ndarray::{s, Array2, Array3, ArrayView3, ArrayViewMut3};

use crate::scanner::ScannerGeometry;
use crate::sinogram::{AxialRange, RelatedViewgrams, Sinogram, Viewgram};
use crate::symmetries::{Symmetries, ViewSegment};

#[derive(Clone, Debug, PartialEq)]
pub struct ProjData {
    geometry: ScannerGeometry,
    segments: Vec<Array3<f32>>,
}

impl ProjData {

    pub fn zeros(geometry: ScannerGeometry) -> Self {
        let segments = geometry.segment_nums()
            .map(|s| Array3::zeros(Self::segment_shape(&geometry, s)))
            .collect();
        Self { geometry, segments }
    }

    /// Wrap per-segment arrays, ordered from the most negative segment. Fails
    /// if any array does not have the shape required by `geometry`.
    pub fn new(geometry: ScannerGeometry, segments: Vec<Array3<f32>>) -> Result<Self, String> {
        if segments.len() != geometry.segment_nums().count() {
            return Err(format!("expected {} segments, got {}", geometry.segment_nums().count(), segments.len()))
        }
        for (segment, data) in geometry.segment_nums().zip(&segments) {
            let expected = Self::segment_shape(&geometry, segment);
            if data.dim() != expected {
                return Err(format!("segment {segment} has shape {:?}, expected {expected:?}", data.dim()))
            }
        }
        Ok(Self { geometry, segments })
    }

    fn segment_shape(geometry: &ScannerGeometry, segment: i32) -> (usize, usize, usize) {
        (geometry.num_views, geometry.num_axial_poss(segment) as usize, geometry.num_tangential_poss)
    }

    pub fn geometry(&self) -> &ScannerGeometry { &self.geometry }

    fn index(&self, segment: i32) -> usize {
        (segment - self.geometry.min_segment_num()) as usize
    }

    pub fn segment(&self, segment: i32) -> ArrayView3<f32> { self.segments[self.index(segment)].view() }

    pub fn segment_mut(&mut self, segment: i32) -> ArrayViewMut3<f32> {
        let i = self.index(segment);
        self.segments[i].view_mut()
    }

    pub fn segments(&self) -> impl Iterator<Item = (i32, ArrayView3<f32>)> {
        self.geometry.segment_nums().zip(self.segments.iter().map(Array3::view))
    }

    pub fn measured_range(&self, segment: i32) -> AxialRange {
        AxialRange::new(self.geometry.min_axial_pos_num(segment), self.geometry.max_axial_pos_num(segment))
    }

    pub fn viewgram(&self, vs: ViewSegment) -> Viewgram {
        let data: Array2<f32> = self.segment(vs.segment).slice(s![vs.view as usize, .., ..]).to_owned();
        Viewgram::new(vs,
                      self.geometry.min_axial_pos_num(vs.segment),
                      self.geometry.min_tangential_pos_num(),
                      data)
    }

    /// Store the rows of `viewgram` which lie within the measured axial range
    pub fn set_viewgram(&mut self, viewgram: &Viewgram) {
        let vs = viewgram.view_segment;
        let measured = self.measured_range(vs.segment);
        let overlap = measured.intersection(viewgram.axial_range());
        let mut target = self.segment_mut(vs.segment);
        for axial in overlap.iter() {
            target.slice_mut(s![vs.view as usize, (axial - measured.min) as usize, ..])
                .assign(&viewgram.row(axial));
        }
    }

    pub fn related_viewgrams(&self, vs: ViewSegment, symmetries: &dyn Symmetries) -> RelatedViewgrams {
        let related = symmetries.related(vs);
        let basic = related[0];
        RelatedViewgrams::new(basic, related.into_iter().map(|r| self.viewgram(r)).collect())
    }

    pub fn sinogram(&self, segment: i32, axial_pos: i32) -> Sinogram {
        let row = (axial_pos - self.geometry.min_axial_pos_num(segment)) as usize;
        let data = self.segment(segment).slice(s![.., row, ..]).to_owned();
        Sinogram { segment, axial_pos, data }
    }

    pub fn sum(&self) -> f64 {
        self.segments.iter().flat_map(|s| s.iter()).map(|&x| x as f64).sum()
    }
}
