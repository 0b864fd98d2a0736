//! The FBP3DRP driver: initial estimate, then for every canonical
//! (segment, view) pair grow, fill, filter and backproject.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use ndarray::Array2;
use tracing::{debug, info, warn};

use units::mm_;

use crate::accumulate::accumulate;
use crate::colsher::{ColsherFilterCache, ColsherSettings};
use crate::config::fbp3drp::Config;
use crate::error::{ReconstructionError, Result};
use crate::fbp2d::{Reconstruct2D, SsrbFbp2d};
use crate::fill::fill_missing_data;
use crate::fit::{fit_or_identity, FitCoefficients};
use crate::fov::FOV;
use crate::full_log::FullLog;
use crate::image::{Image, ImageStats};
use crate::missing::{find_missing_range, SegmentContext};
use crate::projdata::ProjData;
use crate::projector::{BackProjector, ForwardProjector};
use crate::segments::{CanonicalPair, CanonicalPairs};
use crate::sinogram::{AxialRange, RelatedViewgrams, Sinogram, Viewgram};
use crate::storage::{RawStorage, VolumeStorage};
use crate::symmetries::ViewSegment;
use crate::utils::group_digits;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Initializing,
    Estimating2D,
    LoadingReprojectionImage,
    ProcessingSegments,
    Finalizing,
    Done,
    Failed,
}

/// Observes the progress of a run and may ask for it to stop. Cancellation
/// is honoured between (segment, view) pairs only.
pub trait Monitor {
    fn segment_started(&mut self, _segment: i32, _num_views: usize) {}
    fn view_done(&mut self, _view_segment: ViewSegment) {}
    fn is_cancelled(&self) -> bool { false }
}

pub struct NoMonitor;
impl Monitor for NoMonitor {}

/// Cancels a run from another thread
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self { Self::default() }
    pub fn cancel(&self) { self.0.store(true, Ordering::Relaxed) }
}

impl Monitor for CancelToken {
    fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Timings {
    pub total: Duration,
    pub forward_projection: Duration,
    pub back_projection: Duration,
}

impl fmt::Display for Timings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "total {} ms, forward projection {} ms, backprojection {} ms",
               group_digits(self.total.as_millis()),
               group_digits(self.forward_projection.as_millis()),
               group_digits(self.back_projection.as_millis()))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub stats: ImageStats,
    pub timings: Timings,
    /// The outermost segment actually processed, after resolving -1
    pub effective_max_segment: i32,
    pub cancelled: bool,
    pub fit: FitCoefficients,
    pub segments_processed: usize,
    pub views_processed: usize,
    pub filter_builds: usize,
}

pub struct Reconstruction {
    pub image: Image,
    pub summary: RunSummary,
}

pub struct Fbp3drp {
    pub config: Config,
    forward: Option<Box<dyn ForwardProjector>>,
    back: Option<Box<dyn BackProjector>>,
    /// `None`: SSRB + FBP2D with the configured ramp filter
    estimator: Option<Box<dyn Reconstruct2D>>,
    storage: Box<dyn VolumeStorage>,
    state: RunState,
}

impl Fbp3drp {

    /// Without projectors: they must be supplied before `reconstruct`
    pub fn new(config: Config) -> Self {
        Self {
            config,
            forward: None,
            back: None,
            estimator: None,
            storage: Box::new(RawStorage::default()),
            state: RunState::Initializing,
        }
    }

    pub fn with_projectors(mut self, forward: impl ForwardProjector + 'static, back: impl BackProjector + 'static) -> Self {
        self.forward = Some(Box::new(forward));
        self.back    = Some(Box::new(back));
        self
    }

    pub fn with_estimator(mut self, estimator: impl Reconstruct2D + 'static) -> Self {
        self.estimator = Some(Box::new(estimator));
        self
    }

    pub fn with_storage(mut self, storage: impl VolumeStorage + 'static) -> Self {
        self.storage = Box::new(storage);
        self
    }

    pub fn state(&self) -> RunState { self.state }

    fn prefixed(&self, suffix: &str) -> PathBuf { prefixed(&self.config, suffix) }

    /// Reconstruct `data`. The configuration is left as it was found, whatever
    /// the outcome, so the same instance can be run again.
    pub fn reconstruct(&mut self, data: &ProjData, monitor: &mut dyn Monitor) -> Result<Reconstruction> {
        let requested_max_segment = self.config.max_segment_num_to_process;
        self.state = RunState::Initializing;
        let result = self.run(data, monitor);
        self.config.max_segment_num_to_process = requested_max_segment;
        self.state = match &result {
            Ok(_) => RunState::Done,
            Err(e) => { warn!("reconstruction failed: {e}"); RunState::Failed }
        };
        result
    }

    fn run(&mut self, data: &ProjData, monitor: &mut dyn Monitor) -> Result<Reconstruction> {
        let start = Instant::now();

        // ----- Initializing ------------------------------------------------------------
        self.config.validate()?;
        let geometry = *data.geometry();
        geometry.validate().map_err(ReconstructionError::Configuration)?;
        let fov = FOV::for_scanner(&geometry);
        {
            let forward = self.forward.as_deref_mut().ok_or_else(|| ReconstructionError::config("no forward projector set"))?;
            forward.set_up(&geometry, &fov)?;
            let back = self.back.as_deref_mut().ok_or_else(|| ReconstructionError::config("no backprojector set"))?;
            back.set_up(&geometry, &fov)?;
        }
        let mut log = FullLog::create(&self.prefixed(".full_log"))?;

        let max_segment = match self.config.max_segment_num_to_process {
            -1 => geometry.max_segment_num(),
            n if n > geometry.max_segment_num() => return Err(ReconstructionError::config(format!(
                "max_segment_num_to_process = {n} exceeds the data's maximum segment {}", geometry.max_segment_num()))),
            n => n,
        };
        self.config.max_segment_num_to_process = max_segment;
        info!(max_segment, "FBP3DRP reconstruction");
        log.section("FBP3DRP reconstruction")?;
        writeln!(log, "Processing segments -{max_segment} to {max_segment}")?;

        let extension = self.config.fft_extension;
        if extension.transaxial < 2 || extension.axial < 2 {
            let message = format!("FFT extension ({}, {}) below 2: expect aliasing unless the object occupies at most half of the FOV",
                                  extension.transaxial, extension.axial);
            warn!("{message}");
            writeln!(log, "WARNING: {message}")?;
        }

        // ----- Initial estimate --------------------------------------------------------
        let estimate = match self.config.image_for_reprojection.clone() {
            Some(path) => {
                self.state = RunState::LoadingReprojectionImage;
                writeln!(log, "Reading image for reprojection from {path:?}")?;
                let image = self.storage.read_volume(&path)?;
                if image.fov.n != fov.n {
                    return Err(ReconstructionError::config(format!(
                        "image for reprojection has {:?} voxels, the scanner needs {:?}", image.fov.n, fov.n)))
                }
                image
            }
            None => {
                self.state = RunState::Estimating2D;
                log.section("2D reconstruction")?;
                match self.estimator.as_deref_mut() {
                    Some(estimator) => estimator.reconstruct_2d(data, fov, &mut log)?,
                    None => SsrbFbp2d::new(self.config.ramp,
                                           self.config.num_segments_to_combine,
                                           self.config.fft_extension.transaxial)
                        .reconstruct_2d(data, fov, &mut log)?,
                }
            }
        };
        writeln!(log, "Initial estimate: {}", estimate.stats())?;
        if self.config.save_intermediate_files {
            self.storage.write_volume(&self.prefixed("_estimated"), &estimate)?;
        }

        // ----- Processing segments -----------------------------------------------------
        let mut summary = RunSummary {
            stats: estimate.stats(),
            timings: Timings::default(),
            effective_max_segment: max_segment,
            cancelled: false,
            fit: FitCoefficients::default(),
            segments_processed: 0,
            views_processed: 0,
            filter_builds: 0,
        };
        let volume = if max_segment == 0 {
            writeln!(log, "Maximum segment is 0: the 2D estimate is the result")?;
            estimate
        } else {
            self.state = RunState::ProcessingSegments;
            let mut volume = Image::zeros(estimate.fov);
            self.process_segments(data, &estimate, &mut volume, &mut summary, &mut log, monitor)?;
            volume
        };

        // ----- Finalizing --------------------------------------------------------------
        self.state = RunState::Finalizing;
        summary.stats = volume.stats();
        if let (Some(forward), Some(back)) = (&self.forward, &self.back) {
            summary.timings.forward_projection = forward.elapsed();
            summary.timings.back_projection    = back   .elapsed();
        }
        summary.timings.total = start.elapsed();
        log.section("Final volume")?;
        writeln!(log, "{}", summary.stats)?;
        writeln!(log, "Timing: {}", summary.timings)?;
        log.flush()?;
        if let Err(e) = self.write_run_log(&summary) {
            warn!("could not write the run log: {e}");
        }
        Ok(Reconstruction { image: volume, summary })
    }

    fn process_segments(
        &mut self,
        data: &ProjData,
        estimate: &Image,
        volume: &mut Image,
        summary: &mut RunSummary,
        log: &mut FullLog,
        monitor: &mut dyn Monitor,
    ) -> Result<()> {
        let geometry = *data.geometry();
        let max_segment = summary.effective_max_segment;
        let forward = self.forward.as_deref_mut().ok_or_else(|| ReconstructionError::config("no forward projector set"))?;
        let back    = self.back   .as_deref_mut().ok_or_else(|| ReconstructionError::config("no backprojector set"))?;

        if self.config.fit_projections {
            summary.fit = fit_estimate(data, estimate, forward, log)?;
        }

        let views = (geometry.min_view_num(), geometry.max_view_num());
        let plan: Vec<(CanonicalPair, Vec<ViewSegment>)> = {
            let symmetries = back.symmetries();
            CanonicalPairs::new(max_segment, views, symmetries)
                .map(|pair| (pair, symmetries.related(pair.view_segment)))
                .collect()
        };

        let settings = ColsherSettings {
            axial: self.config.colsher.axial,
            planar: self.config.colsher.planar,
            fft_extension: (self.config.fft_extension.transaxial, self.config.fft_extension.axial),
            sampling_tolerance: self.config.sampling_tolerance,
        };
        let mut filters = ColsherFilterCache::new(settings, max_segment);
        let mut context: Option<SegmentContext> = None;

        for (pair, related) in plan {
            if monitor.is_cancelled() {
                info!("reconstruction cancelled");
                writeln!(log, "Cancelled after {} views", summary.views_processed)?;
                summary.cancelled = true;
                break
            }
            let ViewSegment { view, segment } = pair.view_segment;
            if pair.first_in_segment {
                if let Some(previous) = context {
                    finish_segment(&self.config, self.storage.as_ref(), previous.segment, volume, log)?;
                }
                let ctx = find_missing_range(&geometry, segment, &volume.fov);
                log_segment(&ctx, log)?;
                debug!(segment, rmin = ctx.rmin, rmax = ctx.rmax, "segment set up");
                let canonical_views = views.1 - views.0 + 1;
                monitor.segment_started(segment, canonical_views as usize);
                summary.segments_processed += 1;
                context = Some(ctx);
            }
            let ctx = context.ok_or_else(|| ReconstructionError::StructuralInvariant(
                format!("view {view} of segment {segment} reached before its segment was set up")))?;

            writeln!(log, "Processing view {view} of segment {segment}")?;
            let viewgrams: Vec<Viewgram> = related.iter().map(|&vs| data.viewgram(vs)).collect();
            let mut viewgrams = RelatedViewgrams::new(related[0], viewgrams);
            viewgrams.grow(ctx.extended());
            fill_missing_data(&mut viewgrams, &ctx, estimate, forward, summary.fit, log)?;
            filters.apply(&mut viewgrams, &geometry, log)?;
            accumulate(volume, &mut viewgrams, &ctx, max_segment, back, log)?;

            summary.views_processed += 1;
            monitor.view_done(pair.view_segment);
        }
        if let Some(last) = context {
            finish_segment(&self.config, self.storage.as_ref(), last.segment, volume, log)?;
        }
        summary.filter_builds = filters.builds();
        Ok(())
    }

    fn write_run_log(&self, summary: &RunSummary) -> Result<()> {
        let path = self.prefixed(".log");
        let write = |path: &Path| -> std::io::Result<()> {
            let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
            let seconds = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
            writeln!(file, "FBP3DRP reconstruction")?;
            writeln!(file, "Date: {} s after the Unix epoch", group_digits(seconds))?;
            writeln!(file, "Parameters: {:#?}", self.config)?;
            writeln!(file, "Effective maximum segment: {}", summary.effective_max_segment)?;
            writeln!(file, "Segments processed: {}, views processed: {}{}",
                     summary.segments_processed, summary.views_processed,
                     if summary.cancelled { " (cancelled)" } else { "" })?;
            writeln!(file, "Timing: {}", summary.timings)?;
            writeln!(file, "Final volume: {}", summary.stats)?;
            file.flush()
        };
        write(&path).map_err(|e| ReconstructionError::io(path.clone(), e))
    }
}

fn prefixed(config: &Config, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{suffix}", config.output_prefix))
}

fn finish_segment(config: &Config, storage: &dyn VolumeStorage, segment: i32, volume: &Image, log: &mut FullLog) -> Result<()> {
    writeln!(log, "Volume after segment {segment}: {}", volume.stats())?;
    if config.save_intermediate_files {
        storage.write_volume(&prefixed(config, &format!("_afterseg{segment}")), volume)?;
    }
    Ok(())
}

fn log_segment(ctx: &SegmentContext, log: &mut FullLog) -> Result<()> {
    log.section(&format!("PROCESSING SEGMENT No {}", ctx.segment))?;
    writeln!(log, "Average delta = {} with span from {} to {}",
             ctx.average_ring_difference, ctx.min_ring_difference, ctx.max_ring_difference)?;
    writeln!(log, "Planes per virtual ring = {}, virtual rings per physical ring = {}, virtual ring offset = {}",
             ctx.num_planes_per_virtual_ring, ctx.num_virtual_rings_per_physical_ring, ctx.virtual_ring_offset)?;
    writeln!(log, "Measured axial positions {}, completed to {} to {}", ctx.measured, ctx.rmin, ctx.rmax)?;
    Ok(())
}

/// Fit forward projections of `estimate` to the direct sinogram at the axial
/// position where the estimate is most active
fn fit_estimate(data: &ProjData, estimate: &Image, forward: &mut dyn ForwardProjector, log: &mut FullLog) -> Result<FitCoefficients> {
    let geometry = data.geometry();
    let fov = &estimate.fov;
    let [nx, ny, nz] = fov.n;
    let plane_activity = |axial: i32| {
        let z = mm_(geometry.axial_offset(0, axial as f32)) - mm_(fov.plane_z(0));
        let iz = (z / mm_(fov.voxel_size[2])).round().clamp(0.0, (nz - 1) as f32) as usize;
        estimate.data[iz * nx * ny..(iz + 1) * nx * ny].iter().map(|&x| x as f64).sum::<f64>()
    };
    let axial = data.measured_range(0).iter()
        .map(|a| (a, plane_activity(a)))
        .fold((0, f64::NEG_INFINITY), |best, this| if this.1 > best.1 { this } else { best })
        .0;

    let range = AxialRange::new(axial, axial);
    let (num_views, num_tangential) = (geometry.num_views, geometry.num_tangential_poss);
    let mut calculated = Array2::zeros((num_views, num_tangential));
    for view in 0..num_views as i32 {
        let vs = ViewSegment::new(view, 0);
        let single = Viewgram::zeros(vs, range, geometry.min_tangential_pos_num(), num_tangential);
        let mut set = RelatedViewgrams::new(vs, vec![single]);
        forward.forward_project(&mut set, estimate, range)?;
        calculated.row_mut(view as usize).assign(&set.viewgrams()[0].row(axial));
    }
    let calculated = Sinogram { segment: 0, axial_pos: axial, data: calculated };
    writeln!(log, "Fitting at axial position {axial} of segment 0")?;
    Ok(fit_or_identity(&data.sinogram(0, axial), &calculated, log)?)
}
