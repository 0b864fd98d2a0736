//! Symmetries which group (view, segment) pairs into related sets, so that
//! each set is processed once, through its canonical member.
//!
//! Every set produced here has an even number of members, as required by the
//! pairwise Colsher filtering.

use crate::sinogram::RelatedViewgrams;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewSegment {
    pub view: i32,
    pub segment: i32,
}

impl ViewSegment {
    pub fn new(view: i32, segment: i32) -> Self { Self { view, segment } }
}

pub trait Symmetries: Send + Sync {

    /// Whether `vs` is the representative of its set of related pairs
    fn is_canonical(&self, vs: ViewSegment) -> bool;

    /// All members of the set containing `vs`, the canonical one first
    fn related(&self, vs: ViewSegment) -> Vec<ViewSegment>;

    fn basic_segment_num(&self, viewgrams: &RelatedViewgrams) -> i32 {
        viewgrams.basic_segment_num()
    }
}

fn check_even(num_views: usize) -> Result<(), String> {
    if num_views == 0 || num_views % 2 != 0 {
        return Err(format!("symmetries need an even, non-zero number of views, got {num_views}"))
    }
    Ok(())
}

/// Relates segment `s` with segment `-s` at the same view. Within segment 0,
/// views `v` and `v + num_views/2` are paired instead.
#[derive(Clone, Copy, Debug)]
pub struct SegmentSignSymmetries {
    num_views: i32,
}

impl SegmentSignSymmetries {
    pub fn new(num_views: usize) -> Result<Self, String> {
        check_even(num_views)?;
        Ok(Self { num_views: num_views as i32 })
    }
}

impl Symmetries for SegmentSignSymmetries {
    fn is_canonical(&self, ViewSegment { view, segment }: ViewSegment) -> bool {
        segment > 0 || (segment == 0 && view < self.num_views / 2)
    }

    fn related(&self, ViewSegment { view, segment }: ViewSegment) -> Vec<ViewSegment> {
        let half = self.num_views / 2;
        match segment {
            0 => {
                let v = view % half;
                vec![ViewSegment::new(v, 0), ViewSegment::new(v + half, 0)]
            }
            s => vec![ViewSegment::new(view, s.abs()), ViewSegment::new(view, -s.abs())],
        }
    }
}

/// Relates views `v` and `v + num_views/2` within each segment. Every
/// segment has canonical views.
#[derive(Clone, Copy, Debug)]
pub struct ViewPairSymmetries {
    num_views: i32,
}

impl ViewPairSymmetries {
    pub fn new(num_views: usize) -> Result<Self, String> {
        check_even(num_views)?;
        Ok(Self { num_views: num_views as i32 })
    }
}

impl Symmetries for ViewPairSymmetries {
    fn is_canonical(&self, vs: ViewSegment) -> bool { vs.view < self.num_views / 2 }

    fn related(&self, ViewSegment { view, segment }: ViewSegment) -> Vec<ViewSegment> {
        let half = self.num_views / 2;
        let v = view % half;
        vec![ViewSegment::new(v, segment), ViewSegment::new(v + half, segment)]
    }
}

#[cfg(test)]
mod test_symmetries {
    use super::*;
    use itertools::iproduct;
    use std::collections::HashSet;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};
    use rstest::rstest;

    // Every pair belongs to exactly one set, and each set has exactly one
    // canonical member, which comes first
    fn check_partition(symmetries: &dyn Symmetries, num_views: i32, max_segment: i32) {
        let mut seen = HashSet::new();
        for (segment, view) in iproduct!(-max_segment..=max_segment, 0..num_views) {
            let vs = ViewSegment::new(view, segment);
            if !symmetries.is_canonical(vs) { continue }
            let related = symmetries.related(vs);
            assert_eq!(related[0], vs);
            assert_eq!(related.len() % 2, 0);
            assert_eq!(related.iter().filter(|r| symmetries.is_canonical(**r)).count(), 1);
            for r in related {
                assert!(seen.insert(r), "{r:?} appears in more than one set");
            }
        }
        assert_eq!(seen.len() as i32, num_views * (2 * max_segment + 1));
    }

    #[test]
    fn segment_sign_symmetries_partition_all_pairs() {
        check_partition(&SegmentSignSymmetries::new(8).unwrap(), 8, 3);
    }

    #[test]
    fn view_pair_symmetries_partition_all_pairs() {
        check_partition(&ViewPairSymmetries::new(6).unwrap(), 6, 2);
    }

    #[rstest(/**/ view, segment, expected,
             case(0,  0, true),
             case(3,  0, true),
             case(4,  0, false),
             case(7,  2, true),
             case(0, -1, false),
    )]
    fn segment_sign_canonical(view: i32, segment: i32, expected: bool) {
        let s = SegmentSignSymmetries::new(8).unwrap();
        assert_eq!(s.is_canonical(ViewSegment::new(view, segment)), expected);
    }

    #[test]
    fn odd_number_of_views_is_rejected() {
        assert!(SegmentSignSymmetries::new(7).is_err());
        assert!(ViewPairSymmetries   ::new(0).is_err());
    }
}
