//! Geometry of a cylindrical scanner and the organisation of its projection
//! data into segments, views, axial and tangential positions.
//!
//! A *segment* groups the lines of response whose ring difference lies in
//! `[s*span - h, s*span + h]`, with `h = (span - 1) / 2`. When `span == 1`
//! each segment contains a single ring difference and successive axial
//! positions are one ring apart; otherwise the segment mixes ring
//! differences and axial positions are half a ring apart.

use units::{mm, mm_, radian, Angle, Length};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScannerGeometry {

    /// Number of detector rings
    pub num_rings: usize,

    /// Number of ring differences combined into each segment (odd)
    pub span: usize,

    /// Largest ring difference present in the data
    pub max_ring_difference: usize,

    /// Number of views covering `[0, PI)`
    pub num_views: usize,

    /// Number of tangential positions (bins) in each view
    pub num_tangential_poss: usize,

    /// Radius of the detector cylinder
    pub ring_radius: Length,

    /// Axial distance between neighbouring rings
    pub ring_spacing: Length,

    /// Distance between neighbouring tangential positions
    pub tangential_sampling: Length,

    /// Whether the data have been arc-corrected (uniform tangential sampling)
    pub arc_corrected: bool,
}

impl ScannerGeometry {

    /// Check internal consistency. Returns a description of the first
    /// problem found.
    pub fn validate(&self) -> Result<(), String> {
        let &Self { num_rings, span, max_ring_difference, num_views, num_tangential_poss, .. } = self;
        if num_rings == 0           { return Err("scanner has no rings".into()) }
        if num_views == 0           { return Err("projection data have no views".into()) }
        if num_tangential_poss < 2  { return Err("need at least 2 tangential positions".into()) }
        if span % 2 == 0            { return Err(format!("span must be odd, got {span}")) }
        if max_ring_difference >= num_rings {
            return Err(format!("max ring difference {max_ring_difference} must be less than number of rings {num_rings}"))
        }
        let h = (span - 1) / 2;
        if max_ring_difference < h || (max_ring_difference - h) % span != 0 {
            return Err(format!("max ring difference {max_ring_difference} is not a segment boundary for span {span}"))
        }
        if mm_(self.ring_radius) <= 0.0 || mm_(self.ring_spacing) <= 0.0 || mm_(self.tangential_sampling) <= 0.0 {
            return Err("scanner dimensions must be positive".into())
        }
        let fov_radius = (num_tangential_poss / 2) as f32 * mm_(self.tangential_sampling);
        if fov_radius >= mm_(self.ring_radius) {
            return Err("transaxial field of view exceeds the detector radius".into())
        }
        Ok(())
    }

    fn half_span(&self) -> i32 { (self.span as i32 - 1) / 2 }

    // ----- Segments ----------------------------------------------------------------

    pub fn max_segment_num(&self) -> i32 {
        (self.max_ring_difference as i32 - self.half_span()) / self.span as i32
    }

    pub fn min_segment_num(&self) -> i32 { -self.max_segment_num() }

    pub fn segment_nums(&self) -> impl Iterator<Item = i32> {
        self.min_segment_num()..=self.max_segment_num()
    }

    pub fn min_ring_difference(&self, segment: i32) -> i32 {
        segment * self.span as i32 - self.half_span()
    }

    pub fn max_ring_difference(&self, segment: i32) -> i32 {
        segment * self.span as i32 + self.half_span()
    }

    pub fn average_ring_difference(&self, segment: i32) -> f32 {
        (self.min_ring_difference(segment) + self.max_ring_difference(segment)) as f32 / 2.0
    }

    /// Number of distinct ring differences combined in `segment`
    pub fn num_ring_differences(&self, segment: i32) -> i32 {
        self.max_ring_difference(segment) - self.min_ring_difference(segment) + 1
    }

    pub fn is_single_ring_difference(&self, segment: i32) -> bool {
        self.max_ring_difference(segment) == self.min_ring_difference(segment)
    }

    // ----- Axial positions ---------------------------------------------------------

    pub fn num_axial_poss_per_ring_inc(&self, segment: i32) -> i32 {
        if self.is_single_ring_difference(segment) { 1 } else { 2 }
    }

    pub fn num_axial_poss(&self, segment: i32) -> i32 {
        let n = self.num_rings as i32;
        if self.is_single_ring_difference(segment) {
            n - self.min_ring_difference(segment).abs()
        } else {
            let smallest_ring_difference = if segment == 0 { 0 }
                                           else { self.min_ring_difference(segment.abs()) };
            2 * n - 1 - 2 * smallest_ring_difference
        }
    }

    pub fn min_axial_pos_num(&self, _segment: i32) -> i32 { 0 }

    pub fn max_axial_pos_num(&self, segment: i32) -> i32 {
        self.min_axial_pos_num(segment) + self.num_axial_poss(segment) - 1
    }

    /// Axial distance between neighbouring axial positions of `segment`
    pub fn axial_sampling(&self, segment: i32) -> Length {
        self.ring_spacing / self.num_axial_poss_per_ring_inc(segment) as f32
    }

    /// Axial offset of the midpoints of the LORs at `axial_pos`, relative to
    /// the axial centre of the scanner. Valid beyond the measured range, which
    /// is needed for the re-projected positions.
    pub fn axial_offset(&self, segment: i32, axial_pos: f32) -> Length {
        let centre = (self.min_axial_pos_num(segment) + self.max_axial_pos_num(segment)) as f32 / 2.0;
        self.axial_sampling(segment) * (axial_pos - centre)
    }

    /// Inverse of `axial_offset`: fractional axial position number
    pub fn axial_pos_at(&self, segment: i32, offset: Length) -> f32 {
        let centre = (self.min_axial_pos_num(segment) + self.max_axial_pos_num(segment)) as f32 / 2.0;
        mm_(offset) / mm_(self.axial_sampling(segment)) + centre
    }

    // ----- Obliqueness -------------------------------------------------------------

    /// Tangent of the co-polar angle of the LORs with `s = 0` in `segment`
    pub fn tan_theta(&self, segment: i32) -> f32 {
        self.average_ring_difference(segment) * mm_(self.ring_spacing) / (2.0 * mm_(self.ring_radius))
    }

    /// Sampling distance along `t`: the axial coordinate in the plane of a
    /// projection, perpendicular to the tangential direction
    pub fn sampling_in_t(&self, segment: i32) -> Length {
        let r     = mm_(self.ring_radius);
        let delta = self.average_ring_difference(segment) * mm_(self.ring_spacing);
        let cos_theta = 2.0 * r / (4.0 * r * r + delta * delta).sqrt();
        self.axial_sampling(segment) * cos_theta
    }

    // ----- Views and tangential positions ------------------------------------------

    pub fn min_view_num(&self) -> i32 { 0 }
    pub fn max_view_num(&self) -> i32 { self.num_views as i32 - 1 }

    pub fn view_angle(&self, view: i32) -> Angle {
        radian(view as f32 * std::f32::consts::PI / self.num_views as f32)
    }

    pub fn min_tangential_pos_num(&self) -> i32 { -(self.num_tangential_poss as i32 / 2) }

    pub fn max_tangential_pos_num(&self) -> i32 {
        self.min_tangential_pos_num() + self.num_tangential_poss as i32 - 1
    }

    pub fn tangential_offset(&self, tangential_pos: i32) -> Length {
        self.tangential_sampling * tangential_pos as f32
    }

    /// A small scanner used throughout the tests
    pub fn test_scanner(num_rings: usize, span: usize, max_ring_difference: usize) -> Self {
        Self {
            num_rings, span, max_ring_difference,
            num_views: 8,
            num_tangential_poss: 16,
            ring_radius: mm(40.0),
            ring_spacing: mm(4.0),
            tangential_sampling: mm(2.0),
            arc_corrected: true,
        }
    }
}

#[cfg(test)]
mod test_segments {
    use super::*;
    use rstest::rstest;
    use float_eq::assert_float_eq;

    #[rstest(/**/ rings, span, max_rd, segment, min_rd, max_rd_seg, n_axial,
             case(4, 1, 3,  0,  0,  0, 4),
             case(4, 1, 3,  1,  1,  1, 3),
             case(4, 1, 3, -3, -3, -3, 1),
             case(8, 3, 4,  0, -1,  1, 15),
             case(8, 3, 4,  1,  2,  4, 11),
             case(8, 3, 4, -1, -4, -2, 11),
             case(8, 5, 7,  1,  3,  7,  9),
    )]
    fn segment_organisation(
        rings: usize, span: usize, max_rd: usize, segment: i32,
        min_rd: i32, max_rd_seg: i32, n_axial: i32,
    ) {
        let scanner = ScannerGeometry::test_scanner(rings, span, max_rd);
        assert_eq!(scanner.validate(), Ok(()));
        assert_eq!(scanner.min_ring_difference(segment), min_rd);
        assert_eq!(scanner.max_ring_difference(segment), max_rd_seg);
        assert_eq!(scanner.num_axial_poss  (segment), n_axial);
        assert_eq!(scanner.max_axial_pos_num(segment), n_axial - 1);
    }

    #[rstest(/**/ rings, span, max_rd, expected,
             case(4, 1, 3, 3),
             case(4, 1, 0, 0),
             case(8, 3, 4, 1),
             case(8, 3, 1, 0),
             case(9, 3, 7, 2),
    )]
    fn max_segment(rings: usize, span: usize, max_rd: usize, expected: i32) {
        let scanner = ScannerGeometry::test_scanner(rings, span, max_rd);
        assert_eq!(scanner.max_segment_num(), expected);
        assert_eq!(scanner.segment_nums().count() as i32, 2 * expected + 1);
    }

    #[rstest(/**/ rings, span, max_rd,
             case(4, 2, 3), // even span
             case(4, 1, 4), // ring difference too large
             case(8, 3, 3), // not on a segment boundary
    )]
    fn invalid_geometries_are_rejected(rings: usize, span: usize, max_rd: usize) {
        assert!(ScannerGeometry::test_scanner(rings, span, max_rd).validate().is_err());
    }

    #[test]
    fn axial_offset_is_centred_and_invertible() {
        let scanner = ScannerGeometry::test_scanner(4, 1, 3);
        // segment 1 has axial positions 0, 1, 2: the middle one is central
        assert_float_eq!(mm_(scanner.axial_offset(1, 1.0)), 0.0, abs <= 1e-6);
        assert_float_eq!(mm_(scanner.axial_offset(1, 2.0)), 4.0, abs <= 1e-5);
        assert_float_eq!(scanner.axial_pos_at(1, scanner.axial_offset(1, -1.0)), -1.0, abs <= 1e-5);
    }

    #[test]
    fn obliqueness_grows_with_ring_difference() {
        let scanner = ScannerGeometry::test_scanner(4, 1, 3);
        assert_eq!(scanner.tan_theta(0), 0.0);
        assert_float_eq!(scanner.tan_theta( 1),  0.05, r2nd <= 1e-6);
        assert_float_eq!(scanner.tan_theta(-2), -0.10, r2nd <= 1e-6);
        // sampling in t shrinks by cos(theta)
        let expected = 4.0 / (1.0_f32 + 0.05 * 0.05).sqrt();
        assert_float_eq!(mm_(scanner.sampling_in_t(1)), expected, r2nd <= 1e-5);
    }
}
