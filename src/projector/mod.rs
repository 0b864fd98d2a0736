//! Forward and back projection between images and related viewgrams.
//!
//! Both directions share the parametrization of a line of response (LOR) by
//! view angle `phi`, tangential offset `s`, axial offset of its midpoint
//! `z_c` and obliqueness `tan_theta`: the LOR is the set of points
//!
//! ```text
//! (s cos phi - tau sin phi,  s sin phi + tau cos phi,  z_c + tau tan_theta)
//! ```
//!
//! for `|tau| <= sqrt(R^2 - s^2)`, where `R` is the detector radius.

pub use siddon::SiddonForwardProjector;
pub use interpolating::InterpolatingBackProjector;

pub mod siddon;
pub mod interpolating;

use std::time::{Duration, Instant};

use crate::error::{ReconstructionError, Result};
use crate::fov::FOV;
use crate::image::Image;
use crate::projdata::ProjData;
use crate::scanner::ScannerGeometry;
use crate::segments::CanonicalPairs;
use crate::sinogram::{AxialRange, RelatedViewgrams};
use crate::symmetries::Symmetries;

pub trait ForwardProjector {

    /// Prepare for projecting images described by `fov` into data of
    /// `geometry`. Must succeed before `forward_project` is used.
    fn set_up(&mut self, geometry: &ScannerGeometry, fov: &FOV) -> Result<()>;

    /// Overwrite the rows of each viewgram in `viewgrams` whose axial
    /// position lies in `range` with line integrals through `image`. Other
    /// rows are left untouched. `image` is not modified.
    fn forward_project(&mut self, viewgrams: &mut RelatedViewgrams, image: &Image, range: AxialRange) -> Result<()>;

    /// Time spent in `forward_project` since set-up
    fn elapsed(&self) -> Duration;
}

pub trait BackProjector {

    fn set_up(&mut self, geometry: &ScannerGeometry, fov: &FOV) -> Result<()>;

    /// Add the backprojection of the rows of `viewgrams` in `range` to `image`
    fn back_project(&mut self, image: &mut Image, viewgrams: &RelatedViewgrams, range: AxialRange) -> Result<()>;

    /// The symmetries according to which related viewgrams are grouped
    fn symmetries(&self) -> &dyn Symmetries;

    /// Time spent in `back_project` since set-up
    fn elapsed(&self) -> Duration;
}

/// Preconditions shared by the projectors
pub(crate) fn check_geometry(geometry: &ScannerGeometry) -> Result<()> {
    geometry.validate().map_err(ReconstructionError::config)?;
    if !geometry.arc_corrected {
        return Err(ReconstructionError::config(
            "projectors require arc-corrected data from a cylindrical scanner"))
    }
    Ok(())
}

pub(crate) fn not_set_up(what: &str) -> ReconstructionError {
    ReconstructionError::config(format!("{what} used before set_up"))
}

/// Forward project `image` into all measured positions of every segment of
/// `geometry`, one related set at a time. `projector` must be set up.
pub fn project_image(
    projector: &mut dyn ForwardProjector,
    image: &Image,
    geometry: &ScannerGeometry,
    symmetries: &dyn Symmetries,
) -> Result<ProjData> {
    let mut data = ProjData::zeros(*geometry);
    let views = (geometry.min_view_num(), geometry.max_view_num());
    for pair in CanonicalPairs::new(geometry.max_segment_num(), views, symmetries) {
        let mut set = data.related_viewgrams(pair.view_segment, symmetries);
        let range = set.axial_range();
        projector.forward_project(&mut set, image, range)?;
        set.iter().for_each(|viewgram| data.set_viewgram(viewgram));
    }
    Ok(data)
}

/// Geometry of the LORs in one viewgram, in mm
#[derive(Clone, Copy, Debug)]
pub(crate) struct LorGeometry {
    pub cos_phi: f32,
    pub sin_phi: f32,
    pub tan_theta: f32,
    pub radius: f32,
}

impl LorGeometry {
    pub fn new(geometry: &ScannerGeometry, view: i32, segment: i32) -> Self {
        let phi = units::radian_(geometry.view_angle(view));
        Self {
            cos_phi: phi.cos(),
            sin_phi: phi.sin(),
            tan_theta: geometry.tan_theta(segment),
            radius: units::mm_(geometry.ring_radius),
        }
    }

    /// Endpoints on the detector cylinder of the LOR with tangential offset
    /// `s` and midpoint at axial offset `z_c`. `None` if the LOR misses the
    /// detector.
    pub fn endpoints(&self, s: f32, z_c: f32) -> Option<([f32; 3], [f32; 3])> {
        if s.abs() >= self.radius { return None }
        let half = (self.radius * self.radius - s * s).sqrt();
        let point = |tau: f32| [
            s * self.cos_phi - tau * self.sin_phi,
            s * self.sin_phi + tau * self.cos_phi,
            z_c + tau * self.tan_theta,
        ];
        Some((point(-half), point(half)))
    }

    /// `(s, tau)` of the point `(x, y)`
    pub fn project(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.cos_phi + y * self.sin_phi, -x * self.sin_phi + y * self.cos_phi)
    }
}

/// Accumulates the time spent in projector calls
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Timer {
    total: Duration,
}

impl Timer {
    pub fn time<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.total += start.elapsed();
        result
    }

    pub fn elapsed(&self) -> Duration { self.total }
    pub fn reset(&mut self) { self.total = Duration::ZERO }
}
