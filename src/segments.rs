//! Symmetry-reduced enumeration of the (view, segment) pairs to process.

use itertools::iproduct;

use crate::symmetries::{Symmetries, ViewSegment};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CanonicalPair {
    pub view_segment: ViewSegment,

    /// Set for the first canonical view of each segment: segment-level set-up
    /// happens here
    pub first_in_segment: bool,
}

/// Iterate over segments `-max_segment ..= max_segment` and, within each,
/// over views `min_view ..= max_view`, yielding only canonical pairs.
/// Segments without canonical views produce nothing.
pub struct CanonicalPairs<'s> {
    pairs: Box<dyn Iterator<Item = ViewSegment> + 's>,
    current_segment: Option<i32>,
}

impl<'s> CanonicalPairs<'s> {
    pub fn new(max_segment: i32, (min_view, max_view): (i32, i32), symmetries: &'s dyn Symmetries) -> Self {
        let pairs = iproduct!(-max_segment..=max_segment, min_view..=max_view)
            .map(|(segment, view)| ViewSegment { view, segment })
            .filter(move |&vs| symmetries.is_canonical(vs));
        Self { pairs: Box::new(pairs), current_segment: None }
    }
}

impl Iterator for CanonicalPairs<'_> {
    type Item = CanonicalPair;

    fn next(&mut self) -> Option<Self::Item> {
        let view_segment = self.pairs.next()?;
        let first_in_segment = self.current_segment != Some(view_segment.segment);
        self.current_segment = Some(view_segment.segment);
        Some(CanonicalPair { view_segment, first_in_segment })
    }
}

#[cfg(test)]
mod test_canonical_pairs {
    use super::*;
    use crate::symmetries::{SegmentSignSymmetries, ViewPairSymmetries};
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn only_canonical_pairs_in_segment_then_view_order() {
        let symmetries = SegmentSignSymmetries::new(4).unwrap();
        let pairs: Vec<_> = CanonicalPairs::new(1, (0, 3), &symmetries)
            .map(|p| (p.view_segment.segment, p.view_segment.view, p.first_in_segment))
            .collect();
        assert_eq!(pairs, vec![
            (0, 0, true), (0, 1, false),
            (1, 0, true), (1, 1, false), (1, 2, false), (1, 3, false),
        ]);
    }

    #[test]
    fn segment_setup_once_per_segment_with_canonical_views() {
        let symmetries = ViewPairSymmetries::new(8).unwrap();
        let firsts: Vec<_> = CanonicalPairs::new(2, (0, 7), &symmetries)
            .filter(|p| p.first_in_segment)
            .map(|p| p.view_segment.segment)
            .collect();
        assert_eq!(firsts, vec![-2, -1, 0, 1, 2]);
    }

    #[test]
    fn no_segments_beyond_zero_when_max_is_zero() {
        let symmetries = ViewPairSymmetries::new(8).unwrap();
        assert!(CanonicalPairs::new(0, (0, 7), &symmetries).all(|p| p.view_segment.segment == 0));
    }
}
