//! Colsher filtering of completed oblique viewgrams.
//!
//! The Colsher filter is the 2D (tangential x axial) frequency response which
//! makes the backprojection of oblique projections, over a range of
//! obliqueness limited by `theta_max`, reproduce the image. It depends on the
//! obliqueness of the segment being filtered, so it is cached and rebuilt
//! whenever the segment changes.
//!
//! Viewgrams are filtered in pairs: the two real arrays are packed into the
//! real and imaginary parts of one complex array. The kernel is real and
//! even, so the two results separate cleanly after the inverse transform.

use std::f32::consts::PI;
use std::io::Write;

use ndarray::{s, Array2};
use tracing::{debug, warn};
use units::mm_;

use crate::error::{ReconstructionError, Result};
use crate::fft::{padded_size, signed_frequency, Complex32, Fft2d};
use crate::filter::FilterParameters;
use crate::full_log::FullLog;
use crate::scanner::ScannerGeometry;
use crate::sinogram::RelatedViewgrams;

/// Geometric parameters of the Colsher filter for one segment
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColsherGeometry {
    /// `PI/2 - theta` where `theta` is the obliqueness of the segment
    pub gamma: f32,
    /// Largest obliqueness included in the reconstruction
    pub theta_max: f32,
    /// Tangential sampling (mm)
    pub d_a: f32,
    /// Axial sampling in the plane of the projection (mm)
    pub d_b: f32,
}

/// Colsher frequency response at `(nu_a, nu_b)` (cycles per mm), without
/// windowing
pub fn colsher_response(g: &ColsherGeometry, nu_a: f32, nu_b: f32) -> f32 {
    let nu = nu_a.hypot(nu_b);
    if nu == 0.0 { return 0.0 }
    let cos_psi = (nu_b * g.gamma.sin() / nu).clamp(-1.0, 1.0);
    let sin_psi = (1.0 - cos_psi * cos_psi).sqrt();
    let sin_theta_max = g.theta_max.sin();
    if sin_psi <= sin_theta_max {
        nu / (2.0 * PI)
    } else {
        nu / (4.0 * (sin_theta_max / sin_psi).asin())
    }
}

pub struct ColsherFilter {
    kernel: Array2<f32>,
    fft: Fft2d,
}

impl ColsherFilter {

    /// Kernel of `height` (axial) by `width` (tangential) frequencies
    pub fn new(height: usize, width: usize, geometry: ColsherGeometry,
               axial: &FilterParameters, planar: &FilterParameters) -> Self {
        let kernel = Array2::from_shape_fn((height, width), |(l, k)| {
            let l = signed_frequency(l, height) as f32;
            let k = signed_frequency(k, width ) as f32;
            let (f_b, f_a) = (l / height as f32, k / width as f32);
            colsher_response(&geometry, f_a / geometry.d_a, f_b / geometry.d_b)
                * planar.window(f_a)
                * axial .window(f_b)
        });
        Self { kernel, fft: Fft2d::new(height, width) }
    }

    pub fn kernel(&self) -> &Array2<f32> { &self.kernel }

    /// Filter two viewgrams of identical shape, in place
    pub fn filter_pair(&self, a: &mut Array2<f32>, b: &mut Array2<f32>) -> Result<()> {
        let (rows, cols) = a.dim();
        let (height, width) = self.fft.shape();
        if b.dim() != (rows, cols) {
            return Err(ReconstructionError::StructuralInvariant(
                format!("paired viewgrams differ in shape: {:?} vs {:?}", a.dim(), b.dim())))
        }
        if rows > height || cols > width {
            return Err(ReconstructionError::StructuralInvariant(
                format!("viewgram {:?} larger than Colsher kernel {:?}", (rows, cols), (height, width))))
        }
        let mut packed = Array2::from_elem((height, width), Complex32::new(0.0, 0.0));
        packed.slice_mut(s![..rows, ..cols]).iter_mut()
            .zip(a.iter().zip(b.iter()))
            .for_each(|(p, (&re, &im))| *p = Complex32::new(re, im));
        self.fft.forward(&mut packed);
        packed.iter_mut().zip(self.kernel.iter()).for_each(|(p, &h)| *p *= h);
        self.fft.inverse(&mut packed);
        let filtered = packed.slice(s![..rows, ..cols]);
        a.iter_mut().zip(filtered.iter()).for_each(|(x, p)| *x = p.re);
        b.iter_mut().zip(filtered.iter()).for_each(|(x, p)| *x = p.im);
        Ok(())
    }
}

/// User-level settings of the 3D filtering stage
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColsherSettings {
    pub axial: FilterParameters,
    pub planar: FilterParameters,
    /// Zero-padding factors (tangential, axial)
    pub fft_extension: (usize, usize),
    /// Allowed relative mismatch between the derived axial sampling and the
    /// scanner's sampling in `t`
    pub sampling_tolerance: f32,
}

/// Holds the filter of the most recently filtered segment
pub struct ColsherFilterCache {
    settings: ColsherSettings,
    max_segment: i32,
    cached: Option<(i32, ColsherFilter)>,
    builds: usize,
}

impl ColsherFilterCache {

    /// `max_segment` is the outermost segment processed: it sets `theta_max`
    pub fn new(settings: ColsherSettings, max_segment: i32) -> Self {
        Self { settings, max_segment, cached: None, builds: 0 }
    }

    /// How many times a kernel has been constructed
    pub fn builds(&self) -> usize { self.builds }

    pub fn cached_segment(&self) -> Option<i32> { self.cached.as_ref().map(|(s, _)| *s) }

    pub fn geometry_for(&self, geometry: &ScannerGeometry, segment: i32) -> ColsherGeometry {
        let theta_max = geometry.tan_theta(self.max_segment).atan();
        let gamma = PI / 2.0 - geometry.tan_theta(segment).atan();
        ColsherGeometry {
            gamma, theta_max,
            d_a: mm_(geometry.tangential_sampling),
            d_b: mm_(geometry.axial_sampling(segment)) * gamma.sin(),
        }
    }

    fn ensure_filter(&mut self, geometry: &ScannerGeometry, viewgrams: &RelatedViewgrams, log: &mut FullLog) -> Result<&ColsherFilter> {
        let segment = viewgrams.basic_segment_num();
        if self.cached_segment() != Some(segment) {
            writeln!(log, "  - Constructing Colsher filter for this segment")?;
            let (ext_t, ext_a) = self.settings.fft_extension;
            let width  = padded_size(viewgrams.num_tangential_poss(), ext_t);
            let height = padded_size(viewgrams.axial_range().len(),   ext_a);
            let g = self.geometry_for(geometry, segment);
            writeln!(log, "Colsher filter theta_max = {} theta = {} d_a = {} d_b = {}",
                     g.theta_max, PI / 2.0 - g.gamma, g.d_a, g.d_b)?;

            let mismatch = (g.d_b / mm_(geometry.sampling_in_t(segment)) - 1.0).abs();
            if mismatch >= self.settings.sampling_tolerance {
                warn!(segment, mismatch, "axial sampling inconsistent with sampling in t");
                writeln!(log, "  - WARNING: axial sampling differs from sampling in t by {mismatch:e}")?;
            }
            debug!(segment, height, width, "building Colsher kernel");
            let filter = ColsherFilter::new(height, width, g, &self.settings.axial, &self.settings.planar);
            self.cached = Some((segment, filter));
            self.builds += 1;
        }
        match &self.cached {
            Some((_, filter)) => Ok(filter),
            None => Err(ReconstructionError::StructuralInvariant("Colsher filter cache is empty".into())),
        }
    }

    /// Filter all viewgrams of `viewgrams` pairwise with the kernel of their
    /// basic segment, then scale by the number of ring differences combined
    /// in that segment.
    pub fn apply(&mut self, viewgrams: &mut RelatedViewgrams, geometry: &ScannerGeometry, log: &mut FullLog) -> Result<()> {
        if viewgrams.is_filtered() {
            return Err(ReconstructionError::StructuralInvariant(
                format!("viewgrams of {:?} have already been filtered", viewgrams.basic())))
        }
        if viewgrams.len() % 2 != 0 {
            return Err(ReconstructionError::StructuralInvariant(
                format!("pairwise Colsher filtering needs an even number of viewgrams, got {}", viewgrams.len())))
        }
        let filter = self.ensure_filter(geometry, viewgrams, log)?;

        writeln!(log, "  - Apply Colsher filter to complete oblique sinograms")?;
        for pair in viewgrams.viewgrams_mut().chunks_exact_mut(2) {
            let (first, second) = pair.split_at_mut(1);
            filter.filter_pair(first[0].data_mut(), second[0].data_mut())?;
        }

        let num_ring_differences = geometry.num_ring_differences(viewgrams.basic_segment_num());
        writeln!(log, "  - Multiplying filtered projections by {num_ring_differences}")?;
        *viewgrams *= num_ring_differences as f32;
        viewgrams.mark_filtered();
        Ok(())
    }
}

#[cfg(test)]
mod test_colsher {
    use super::*;
    use crate::projdata::ProjData;
    use crate::sinogram::AxialRange;
    use crate::symmetries::{ViewPairSymmetries, ViewSegment};
    use float_eq::assert_float_eq;
    use rstest::rstest;

    fn settings() -> ColsherSettings {
        ColsherSettings {
            axial: FilterParameters::default(),
            planar: FilterParameters::default(),
            fft_extension: (2, 2),
            sampling_tolerance: 1e-4,
        }
    }

    fn related(geometry: ScannerGeometry, view: i32, segment: i32) -> RelatedViewgrams {
        let symmetries = ViewPairSymmetries::new(geometry.num_views).unwrap();
        let mut data = ProjData::zeros(geometry);
        data.segment_mut(segment).indexed_iter_mut()
            .for_each(|((v, a, t), x)| *x = ((v + 2 * a + 3 * t) % 5) as f32);
        data.related_viewgrams(ViewSegment::new(view, segment), &symmetries)
    }

    #[test]
    fn response_matches_ramp_inside_aperture() {
        let g = ColsherGeometry { gamma: PI / 2.0, theta_max: 0.3, d_a: 2.0, d_b: 4.0 };
        // Purely axial frequency: psi = 0, inside the aperture
        assert_float_eq!(colsher_response(&g, 0.0, 0.1), 0.1 / (2.0 * PI), r2nd <= 1e-6);
        // Purely tangential frequency: psi = PI/2, outside the aperture
        assert_float_eq!(colsher_response(&g, 0.1, 0.0), 0.1 / (4.0 * 0.3), r2nd <= 1e-5);
        assert_eq!(colsher_response(&g, 0.0, 0.0), 0.0);
    }

    #[test]
    fn response_is_continuous_at_aperture_edge() {
        let g = ColsherGeometry { gamma: PI / 2.0, theta_max: 0.4, d_a: 2.0, d_b: 4.0 };
        // sin(psi) == sin(theta_max) when nu_a / nu == sin(theta_max)
        let (nu_a, nu_b) = (0.4_f32.sin(), 0.4_f32.cos());
        let inside  = colsher_response(&g, nu_a * 0.99999, nu_b);
        let outside = colsher_response(&g, nu_a * 1.00001, nu_b);
        assert_float_eq!(inside, outside, r2nd <= 1e-2);
    }

    #[test]
    fn kernel_is_even() {
        let g = ColsherGeometry { gamma: 1.4, theta_max: 0.2, d_a: 2.0, d_b: 3.9 };
        let filter = ColsherFilter::new(8, 16, g, &FilterParameters { alpha: 0.5, cutoff: 0.4 }, &FilterParameters::default());
        let k = filter.kernel();
        for l in 0..8 {
            for c in 0..16 {
                assert_float_eq!(k[[l, c]], k[[(8 - l) % 8, (16 - c) % 16]], r2nd <= 1e-6);
            }
        }
    }

    #[test]
    fn paired_filtering_matches_separate_filtering() {
        let g = ColsherGeometry { gamma: 1.5, theta_max: 0.2, d_a: 2.0, d_b: 4.0 };
        let filter = ColsherFilter::new(8, 32, g, &FilterParameters::default(), &FilterParameters::default());
        let a0 = Array2::from_shape_fn((3, 10), |(r, c)| ((r * 7 + c * 3) % 4) as f32);
        let b0 = Array2::from_shape_fn((3, 10), |(r, c)| ((r + c) % 3) as f32);
        let (mut a, mut b) = (a0.clone(), b0.clone());
        filter.filter_pair(&mut a, &mut b).unwrap();

        let (mut a_alone, mut zeros) = (a0.clone(), Array2::zeros((3, 10)));
        filter.filter_pair(&mut a_alone, &mut zeros).unwrap();
        let (mut b_alone, mut zeros) = (b0.clone(), Array2::zeros((3, 10)));
        filter.filter_pair(&mut b_alone, &mut zeros).unwrap();

        for (x, y) in a.iter().zip(&a_alone) { assert_float_eq!(x, y, abs <= 1e-5) }
        for (x, y) in b.iter().zip(&b_alone) { assert_float_eq!(x, y, abs <= 1e-5) }
    }

    #[test]
    fn kernel_rebuilt_only_when_segment_changes() {
        let geometry = ScannerGeometry::test_scanner(4, 1, 3);
        let mut cache = ColsherFilterCache::new(settings(), 3);
        let mut log = FullLog::sink();
        for segment in [0, 0, 1, 1, 0] {
            let mut set = related(geometry, 1, segment);
            cache.apply(&mut set, &geometry, &mut log).unwrap();
        }
        assert_eq!(cache.builds(), 3);
        assert_eq!(cache.cached_segment(), Some(0));
    }

    #[test]
    fn filtering_twice_is_rejected() {
        let geometry = ScannerGeometry::test_scanner(4, 1, 3);
        let mut cache = ColsherFilterCache::new(settings(), 3);
        let mut set = related(geometry, 0, 1);
        cache.apply(&mut set, &geometry, &mut FullLog::sink()).unwrap();
        let once = set.clone();
        let again = cache.apply(&mut set, &geometry, &mut FullLog::sink());
        assert!(matches!(again, Err(ReconstructionError::StructuralInvariant(_))));
        assert_eq!(set, once);
    }

    #[test]
    fn odd_sets_are_rejected() {
        let geometry = ScannerGeometry::test_scanner(4, 1, 3);
        let mut cache = ColsherFilterCache::new(settings(), 3);
        let full = related(geometry, 0, 1);
        let mut odd = RelatedViewgrams::new(full.basic(), full.into_viewgrams().into_iter().take(1).collect());
        let result = cache.apply(&mut odd, &geometry, &mut FullLog::sink());
        assert!(matches!(result, Err(ReconstructionError::StructuralInvariant(_))));
        assert_eq!(cache.builds(), 0);
    }

    // Span 3 combines 3 ring differences in segment 1: the filtered data are
    // three times those of an identical single-ring-difference filtering
    #[rstest(/**/ span, max_rd, factor,
             case(1, 3, 1.0),
             case(3, 4, 3.0),
    )]
    fn scaled_by_number_of_ring_differences(span: usize, max_rd: usize, factor: f32) {
        let geometry = ScannerGeometry::test_scanner(8, span, max_rd);
        let mut cache = ColsherFilterCache::new(settings(), 1);
        let mut set = related(geometry, 2, 1);
        set.grow(AxialRange::new(-2, set.axial_range().max + 2));
        let unscaled = {
            let g = cache.geometry_for(&geometry, 1);
            let (ext_t, ext_a) = settings().fft_extension;
            let filter = ColsherFilter::new(padded_size(set.axial_range().len(), ext_a),
                                            padded_size(set.num_tangential_poss(), ext_t),
                                            g, &settings().axial, &settings().planar);
            let mut copy = set.clone().into_viewgrams();
            let (a, b) = copy.split_at_mut(1);
            filter.filter_pair(a[0].data_mut(), b[0].data_mut()).unwrap();
            copy
        };
        cache.apply(&mut set, &geometry, &mut FullLog::sink()).unwrap();
        assert!(set.is_filtered());
        for (filtered, reference) in set.iter().zip(&unscaled) {
            for (x, y) in filtered.data().iter().zip(reference.data()) {
                assert_float_eq!(*x, factor * y, abs <= 1e-5);
            }
        }
    }
}
