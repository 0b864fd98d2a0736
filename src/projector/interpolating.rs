//! Voxel-driven backprojection: every voxel centre is projected onto each
//! viewgram and picks up the bilinearly interpolated value at its
//! (axial, tangential) coordinates.

use std::f32::consts::PI;

use rayon::prelude::*;

use units::{mm, mm_};

use crate::error::Result;
use crate::fov::FOV;
use crate::image::Image;
use crate::scanner::ScannerGeometry;
use crate::sinogram::{AxialRange, RelatedViewgrams, Viewgram};
use crate::symmetries::{SegmentSignSymmetries, Symmetries};

use super::{check_geometry, not_set_up, BackProjector, LorGeometry, Timer};

pub struct InterpolatingBackProjector {
    symmetries: Box<dyn Symmetries>,
    geometry: Option<ScannerGeometry>,
    timer: Timer,
}

impl InterpolatingBackProjector {

    pub fn new(symmetries: impl Symmetries + 'static) -> Self {
        Self { symmetries: Box::new(symmetries), geometry: None, timer: Timer::default() }
    }

    /// Backprojector grouping segments `s` and `-s`
    pub fn for_geometry(geometry: &ScannerGeometry) -> Result<Self> {
        let symmetries = SegmentSignSymmetries::new(geometry.num_views)
            .map_err(crate::error::ReconstructionError::config)?;
        Ok(Self::new(symmetries))
    }
}

impl BackProjector for InterpolatingBackProjector {

    fn set_up(&mut self, geometry: &ScannerGeometry, _fov: &FOV) -> Result<()> {
        check_geometry(geometry)?;
        self.geometry = Some(*geometry);
        self.timer.reset();
        Ok(())
    }

    fn back_project(&mut self, image: &mut Image, viewgrams: &RelatedViewgrams, range: AxialRange) -> Result<()> {
        let geometry = self.geometry.ok_or_else(|| not_set_up("interpolating backprojector"))?;
        let fov = image.fov;
        let [nx, ny, _] = fov.n;
        let weight = PI / geometry.num_views as f32;
        let bin_size = mm_(geometry.tangential_sampling);
        self.timer.time(|| {
            for viewgram in viewgrams.iter() {
                let rows = range.intersection(viewgram.axial_range());
                if rows.is_empty() { continue }
                let segment = viewgram.segment_num();
                let lor = LorGeometry::new(&geometry, viewgram.view_num(), segment);
                image.data
                    .par_chunks_exact_mut(nx * ny)
                    .enumerate()
                    .for_each(|(iz, plane)| {
                        let z = mm_(fov.plane_z(iz as i32));
                        for iy in 0..ny {
                            for ix in 0..nx {
                                let [x, y, _] = fov.voxel_centre_mm([ix, iy, iz]);
                                let (s, tau) = lor.project(x, y);
                                if s.abs() >= lor.radius { continue }
                                let a = geometry.axial_pos_at(segment, mm(z - tau * lor.tan_theta));
                                plane[ix + iy * nx] += weight * bilinear(viewgram, rows, a, s / bin_size);
                            }
                        }
                    });
            }
        });
        Ok(())
    }

    fn symmetries(&self) -> &dyn Symmetries { self.symmetries.as_ref() }

    fn elapsed(&self) -> std::time::Duration { self.timer.elapsed() }
}

/// Interpolate `viewgram` at fractional (axial, tangential) position numbers,
/// treating rows outside `rows` as zero
fn bilinear(viewgram: &Viewgram, rows: AxialRange, axial: f32, tangential: f32) -> f32 {
    let (a0, t0) = (axial.floor(), tangential.floor());
    let (fa, ft) = (axial - a0, tangential - t0);
    let (a0, t0) = (a0 as i32, t0 as i32);
    let value = |a: i32, t: i32| if rows.contains(a) { viewgram.get(a, t) } else { 0.0 };
    (1.0 - fa) * ((1.0 - ft) * value(a0,     t0) + ft * value(a0,     t0 + 1)) +
           fa  * ((1.0 - ft) * value(a0 + 1, t0) + ft * value(a0 + 1, t0 + 1))
}

#[cfg(test)]
mod test_interpolating_backprojector {
    use super::*;
    use crate::projdata::ProjData;
    use crate::symmetries::ViewSegment;
    use float_eq::assert_float_eq;
    use rstest::rstest;

    // Segment 0 views 0 and 4 (perpendicular), with ones in axial position 2
    fn direct_set_with_one_hot_row(geometry: ScannerGeometry) -> RelatedViewgrams {
        let symmetries = SegmentSignSymmetries::new(geometry.num_views).unwrap();
        let mut set = ProjData::zeros(geometry).related_viewgrams(ViewSegment::new(0, 0), &symmetries);
        set.iter_mut().for_each(|v| v.row_mut(2).fill(1.0));
        set
    }

    #[rstest(/**/ plane, expected,
             case(4, 2.0),
             case(3, 1.0),
             case(5, 1.0),
             case(0, 0.0),
    )]
    fn central_voxel_interpolates_axially(plane: usize, expected: f32) {
        let geometry = ScannerGeometry::test_scanner(4, 1, 3);
        let fov = FOV::for_scanner(&geometry);
        let mut projector = InterpolatingBackProjector::for_geometry(&geometry).unwrap();
        projector.set_up(&geometry, &fov).unwrap();
        let set = direct_set_with_one_hot_row(geometry);

        let mut image = Image::zeros(fov);
        projector.back_project(&mut image, &set, AxialRange::new(0, 3)).unwrap();
        assert_float_eq!(image[[8, 8, plane]], expected * PI / 8.0, abs <= 1e-5);
    }

    #[test]
    fn rows_outside_range_are_ignored() {
        let geometry = ScannerGeometry::test_scanner(4, 1, 3);
        let fov = FOV::for_scanner(&geometry);
        let mut projector = InterpolatingBackProjector::for_geometry(&geometry).unwrap();
        projector.set_up(&geometry, &fov).unwrap();
        let set = direct_set_with_one_hot_row(geometry);

        let mut image = Image::zeros(fov);
        projector.back_project(&mut image, &set, AxialRange::new(0, 1)).unwrap();
        assert_eq!(image.stats().max, 0.0);
    }

    #[test]
    fn backprojection_accumulates() {
        let geometry = ScannerGeometry::test_scanner(4, 1, 3);
        let fov = FOV::for_scanner(&geometry);
        let mut projector = InterpolatingBackProjector::for_geometry(&geometry).unwrap();
        projector.set_up(&geometry, &fov).unwrap();
        let set = direct_set_with_one_hot_row(geometry);

        let mut image = Image::ones(fov);
        projector.back_project(&mut image, &set, AxialRange::new(0, 3)).unwrap();
        assert_float_eq!(image[[8, 8, 4]], 1.0 + 2.0 * PI / 8.0, abs <= 1e-5);
        assert_eq!(image[[8, 8, 0]], 1.0);
    }
}
