//! Completion of oblique viewgrams with forward-projected data where the
//! scanner could not measure.

use std::io::Write;

use crate::error::Result;
use crate::fit::FitCoefficients;
use crate::full_log::FullLog;
use crate::image::Image;
use crate::missing::SegmentContext;
use crate::projector::ForwardProjector;
use crate::sinogram::{AxialRange, RelatedViewgrams};

/// Forward project `estimate` into the missing axial ranges of `viewgrams`,
/// which must already have been grown to cover them. Measured rows are never
/// written. Synthesized rows are rescaled by `fit` unless it is the identity.
///
/// Returns the number of forward projections performed: zero when the
/// segment has no missing data.
pub fn fill_missing_data(
    viewgrams: &mut RelatedViewgrams,
    context: &SegmentContext,
    estimate: &Image,
    projector: &mut dyn ForwardProjector,
    fit: FitCoefficients,
    log: &mut FullLog,
) -> Result<usize> {
    let mut projections = 0;
    for (range, which) in [(context.missing_below(), "first from"), (context.missing_above(), "from")] {
        if range.is_empty() { continue }
        writeln!(log, "  - Forward projection of missing data {which} ring No {} to {}", range.min, range.max)?;
        projector.forward_project(viewgrams, estimate, range)?;
        projections += 1;
        if !fit.is_identity() {
            rescale(viewgrams, range, fit);
        }
    }
    if projections > 0 && !fit.is_identity() {
        writeln!(log, "  - Adjusted synthesized sinograms with alpha = {} and beta = {}", fit.alpha, fit.beta)?;
    }
    Ok(projections)
}

fn rescale(viewgrams: &mut RelatedViewgrams, range: AxialRange, fit: FitCoefficients) {
    for viewgram in viewgrams.iter_mut() {
        let rows = range.intersection(viewgram.axial_range());
        if rows.is_empty() { continue }
        viewgram.rows_mut(rows).mapv_inplace(|x| fit.apply(x));
    }
}
