//! Backprojection of filtered related viewgrams into the 3D volume.

use std::io::Write;

use crate::error::{ReconstructionError, Result};
use crate::full_log::FullLog;
use crate::image::Image;
use crate::missing::SegmentContext;
use crate::projector::BackProjector;
use crate::sinogram::RelatedViewgrams;

/// Add the backprojection of `viewgrams` over axial positions `rmin` to `rmax`
/// of their segment to `volume`. Measured positions outside that range, if
/// any, are not backprojected.
///
/// The outermost processed segment is only half covered by the
/// reconstruction's segment sampling, so its viewgrams are halved first. The
/// halving is recorded in the set and never applied twice.
///
/// Returns whether the viewgrams were halved by this call.
pub fn accumulate(
    volume: &mut Image,
    viewgrams: &mut RelatedViewgrams,
    context: &SegmentContext,
    max_segment: i32,
    projector: &mut dyn BackProjector,
    log: &mut FullLog,
) -> Result<bool> {
    if !viewgrams.is_filtered() && context.segment != 0 {
        return Err(ReconstructionError::StructuralInvariant(
            format!("oblique viewgrams of {:?} backprojected before filtering", viewgrams.basic())))
    }
    let halved = context.segment.abs() == max_segment && viewgrams.apply_boundary_weight();
    if halved {
        writeln!(log, "  - Halving outermost segment {} before backprojection", context.segment)?;
    }
    let range = context.backprojected();
    writeln!(log, "  - Backprojection of filtered projections over rings {} to {}", range.min, range.max)?;
    projector.back_project(volume, viewgrams, range)?;
    Ok(halved)
}
