//! Axial extent of the oblique data which the scanner cannot measure.
//!
//! An oblique LOR whose midpoint lies near the axial end of the scanner
//! leaves the detector cylinder before crossing the whole transaxial FOV.
//! For each segment we find the range of (virtual) axial positions whose
//! LORs still intersect the image: the positions outside the measured range
//! must be synthesized by forward projection.
//!
//! Image planes and virtual rings are related by
//! `z = planes_per_virtual_ring * ring + virtual_ring_offset`.

use crate::fov::FOV;
use crate::scanner::ScannerGeometry;
use crate::sinogram::AxialRange;
use units::mm_;

/// Per-segment bookkeeping, computed once when processing of a segment starts
/// and shared by all of its views
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentContext {
    pub segment: i32,
    pub average_ring_difference: f32,
    pub min_ring_difference: i32,
    pub max_ring_difference: i32,
    pub num_planes_per_virtual_ring: i32,
    pub num_virtual_rings_per_physical_ring: i32,
    pub virtual_ring_offset: f32,

    /// Axial positions present in the measured data
    pub measured: AxialRange,

    /// Lowest and highest axial positions whose LORs hit the image
    pub rmin: i32,
    pub rmax: i32,
}

impl SegmentContext {

    pub fn num_ring_differences(&self) -> i32 { self.max_ring_difference - self.min_ring_difference + 1 }

    pub fn axial_centre(&self) -> f32 { (self.measured.min + self.measured.max) as f32 / 2.0 }

    /// Missing positions below the measured range; empty if none
    pub fn missing_below(&self) -> AxialRange { AxialRange::new(self.rmin, self.measured.min - 1) }

    /// Missing positions above the measured range; empty if none
    pub fn missing_above(&self) -> AxialRange { AxialRange::new(self.measured.max + 1, self.rmax) }

    pub fn has_missing_data(&self) -> bool {
        !self.missing_below().is_empty() || !self.missing_above().is_empty()
    }

    /// The range viewgrams of this segment must cover once completed: the
    /// measured positions together with the missing ones
    pub fn extended(&self) -> AxialRange {
        self.measured.hull(self.backprojected())
    }

    /// The positions which are backprojected: `rmin` to `rmax`
    pub fn backprojected(&self) -> AxialRange { AxialRange::new(self.rmin, self.rmax) }
}

/// Find the range of axial positions in `segment` whose LORs intersect the
/// image described by `fov`.
///
/// Only the magnitude of the ring difference enters the calculation: the
/// missing ranges of segments `s` and `-s` coincide.
pub fn find_missing_range(geometry: &ScannerGeometry, segment: i32, fov: &FOV) -> SegmentContext {
    let single = geometry.is_single_ring_difference(segment);
    let (num_planes_per_virtual_ring, num_virtual_rings_per_physical_ring) = if single { (2, 1) } else { (1, 2) };
    let planes_per_vr = num_planes_per_virtual_ring         as f32;
    let vr_per_ring   = num_virtual_rings_per_physical_ring as f32;

    let min_ax = geometry.min_axial_pos_num(segment);
    let max_ax = geometry.max_axial_pos_num(segment);
    let (min_z, max_z) = (fov.min_z(), fov.max_z());

    let fovrad = ((geometry.num_tangential_poss / 2) as f32 - 1.0) * mm_(geometry.tangential_sampling);
    let radius = mm_(geometry.ring_radius);
    let delta  = geometry.average_ring_difference(segment).abs();

    // Match the axial centres of the scanner and the image
    let virtual_ring_offset = (max_z + min_z) as f32 / 2.0
        - planes_per_vr * (max_ax as f32 + vr_per_ring * delta + min_ax as f32) / 2.0;

    // z (in planes) where the LOR through the FOV edge at s=0 meets the detector
    let z = -delta * planes_per_vr * vr_per_ring * (fovrad + radius) / (2.0 * radius)
        // shift to the edge of the first plane
        + min_z as f32 - 0.5;

    let rmin = ((z - virtual_ring_offset) / planes_per_vr).floor() as i32;
    // As many positions are missing at either end
    let rmax = max_ax + (min_ax - rmin);

    SegmentContext {
        segment,
        average_ring_difference: geometry.average_ring_difference(segment),
        min_ring_difference: geometry.min_ring_difference(segment),
        max_ring_difference: geometry.max_ring_difference(segment),
        num_planes_per_virtual_ring,
        num_virtual_rings_per_physical_ring,
        virtual_ring_offset,
        measured: AxialRange::new(min_ax, max_ax),
        rmin,
        rmax,
    }
}

#[cfg(test)]
mod test_missing_range {
    use super::*;
    use float_eq::assert_float_eq;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};
    use rstest::rstest;

    #[rstest(/**/ rings, span, max_rd, segment, rmin, rmax,
             case(4, 1, 3,  1, -1, 3),
             case(4, 1, 3, -1, -1, 3),
             case(4, 1, 3,  3, -3, 3),
             case(4, 1, 3,  2, -2, 3),
    )]
    fn hand_picked(rings: usize, span: usize, max_rd: usize, segment: i32, rmin: i32, rmax: i32) {
        let geometry = ScannerGeometry::test_scanner(rings, span, max_rd);
        let fov = FOV::for_scanner(&geometry);
        let context = find_missing_range(&geometry, segment, &fov);
        assert_eq!((context.rmin, context.rmax), (rmin, rmax));
    }

    #[rstest(/**/ span, max_rd, segment, planes, virtual_rings,
             case(1, 3, 0, 2, 1),
             case(1, 3, 2, 2, 1),
             case(3, 4, 0, 1, 2),
             case(3, 4, 1, 1, 2),
    )]
    fn folding_factors(span: usize, max_rd: usize, segment: i32, planes: i32, virtual_rings: i32) {
        let geometry = ScannerGeometry::test_scanner(8, span, max_rd);
        let context = find_missing_range(&geometry, segment, &FOV::for_scanner(&geometry));
        assert_eq!(context.num_planes_per_virtual_ring, planes);
        assert_eq!(context.num_virtual_rings_per_physical_ring, virtual_rings);
    }

    // The edge of the first plane lies half a plane below the first axial
    // position, so even the direct segment gains one position at either end
    #[rstest(/**/ rings, span, max_rd,
             case( 4, 1,  3),
             case( 8, 3,  4),
             case(16, 1, 15),
    )]
    fn direct_segment_is_padded_by_one_position(rings: usize, span: usize, max_rd: usize) {
        let geometry = ScannerGeometry::test_scanner(rings, span, max_rd);
        let context = find_missing_range(&geometry, 0, &FOV::for_scanner(&geometry));
        let max_ax = geometry.max_axial_pos_num(0);
        assert_eq!(context.measured, AxialRange::new(0, max_ax));
        assert_eq!((context.rmin, context.rmax), (-1, max_ax + 1));
        assert_eq!(context.missing_below(), AxialRange::new(-1, -1));
        assert_eq!(context.missing_above(), AxialRange::new(max_ax + 1, max_ax + 1));
        assert_eq!(context.extended(), AxialRange::new(-1, max_ax + 1));
    }

    #[test]
    fn backprojected_range_ignores_measured_positions_outside_rmin_rmax() {
        let geometry = ScannerGeometry::test_scanner(4, 1, 3);
        let context = SegmentContext { rmin: 1, rmax: 1, ..find_missing_range(&geometry, 1, &FOV::for_scanner(&geometry)) };
        assert!(!context.has_missing_data());
        assert_eq!(context.backprojected(), AxialRange::new(1, 1));
        assert_eq!(context.extended(), context.measured);
    }

    #[test]
    fn missing_ranges_flank_measured_range() {
        let geometry = ScannerGeometry::test_scanner(4, 1, 3);
        let context = find_missing_range(&geometry, 1, &FOV::for_scanner(&geometry));
        assert_eq!(context.missing_below(), AxialRange::new(-1, -1));
        assert_eq!(context.missing_above(), AxialRange::new( 3,  3));
        assert_eq!(context.extended(),      AxialRange::new(-1,  3));
        assert!(context.has_missing_data());
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn missing_range_is_symmetric_about_axial_centre(
            rings      in 2..24_usize,
            span_index in 0..3_usize,
            segment    in -3..=3_i32,
            radius     in 30.0..300.0_f32,
        ) {
            let span = [1, 3, 5][span_index];
            let h = (span - 1) / 2;
            let max_segment = (rings - 1).saturating_sub(h) / span;
            prop_assume!(rings > h && segment.unsigned_abs() as usize <= max_segment);
            let mut geometry = ScannerGeometry::test_scanner(rings, span, max_segment * span + h);
            geometry.ring_radius = units::mm(radius);
            let context = find_missing_range(&geometry, segment, &FOV::for_scanner(&geometry));
            let centre = context.axial_centre();
            assert_float_eq!(context.rmax as f32 - centre, centre - context.rmin as f32, abs <= 1e-6);
        }
    }
}
