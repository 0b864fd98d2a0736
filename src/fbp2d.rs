//! Preliminary image estimate: single-slice rebinning (SSRB) of the oblique
//! data into the image planes, followed by slice-by-slice 2D filtered
//! backprojection.

use std::f32::consts::PI;
use std::io::Write;

use ndarray::{Array2, Array3, ArrayView1, Axis};
use rayon::prelude::*;
use tracing::{debug, info};

use units::mm_;

use crate::error::{ReconstructionError, Result};
use crate::fft::padded_size;
use crate::filter::{filter_rows, ramp, FilterParameters};
use crate::fov::FOV;
use crate::full_log::FullLog;
use crate::image::Image;
use crate::projdata::ProjData;
use crate::projector::LorGeometry;

/// Produces the image which is forward projected to complete the oblique data
pub trait Reconstruct2D {
    fn reconstruct_2d(&mut self, data: &ProjData, fov: FOV, log: &mut FullLog) -> Result<Image>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SsrbFbp2d {
    pub ramp: FilterParameters,
    /// Odd number of segments rebinned into the direct planes; -1: all of them
    pub num_segments_to_combine: i32,
    /// Zero-padding factor of the tangential FFT
    pub transaxial_extension: usize,
}

impl Default for SsrbFbp2d {
    fn default() -> Self {
        Self { ramp: FilterParameters::default(), num_segments_to_combine: -1, transaxial_extension: 2 }
    }
}

impl SsrbFbp2d {

    pub fn new(ramp: FilterParameters, num_segments_to_combine: i32, transaxial_extension: usize) -> Self {
        Self { ramp, num_segments_to_combine, transaxial_extension }
    }

    fn max_segment_to_combine(&self, data: &ProjData) -> Result<i32> {
        let available = data.geometry().max_segment_num();
        match self.num_segments_to_combine {
            -1 => Ok(available),
            n if n > 0 && n % 2 == 1 && (n - 1) / 2 <= available => Ok((n - 1) / 2),
            n => Err(ReconstructionError::config(format!(
                "num_segments_to_combine must be -1 or an odd number up to {}, got {n}", 2 * available + 1))),
        }
    }

    /// Average the sinograms of the combined segments into the plane nearest
    /// to their axial offset. Planes which receive no sinogram are
    /// interpolated from their nearest filled neighbours.
    ///
    /// Returns `[plane, view, tangential]`.
    pub fn rebin(&self, data: &ProjData, fov: &FOV) -> Result<Array3<f32>> {
        let geometry = data.geometry();
        let max_segment = self.max_segment_to_combine(data)?;
        let nz = fov.n[2];
        let dz = mm_(fov.voxel_size[2]);
        let z0 = mm_(fov.plane_z(0));

        let mut planes = Array3::<f32>::zeros((nz, geometry.num_views, geometry.num_tangential_poss));
        let mut counts = vec![0_u32; nz];
        for segment in -max_segment..=max_segment {
            let min_axial = geometry.min_axial_pos_num(segment);
            for (i, sinogram) in data.segment(segment).axis_iter(Axis(1)).enumerate() {
                let z = mm_(geometry.axial_offset(segment, (min_axial + i as i32) as f32));
                let iz = ((z - z0) / dz).round();
                if iz < 0.0 || iz >= nz as f32 { continue }
                let iz = iz as usize;
                let mut plane = planes.index_axis_mut(Axis(0), iz);
                plane += &sinogram;
                counts[iz] += 1;
            }
        }

        let filled: Vec<usize> = (0..nz).filter(|&iz| counts[iz] > 0).collect();
        if filled.is_empty() {
            return Err(ReconstructionError::config("no sinogram falls within the image planes"))
        }
        for &iz in &filled {
            let mut plane = planes.index_axis_mut(Axis(0), iz);
            plane /= counts[iz] as f32;
        }
        for iz in (0..nz).filter(|&iz| counts[iz] == 0) {
            let below = filled.iter().rev().find(|&&f| f < iz).copied();
            let above = filled.iter()      .find(|&&f| f > iz).copied();
            let plane: Array2<f32> = match (below, above) {
                (Some(b), Some(a)) => {
                    let w = (iz - b) as f32 / (a - b) as f32;
                    &planes.index_axis(Axis(0), b) * (1.0 - w) + &planes.index_axis(Axis(0), a) * w
                }
                (Some(n), None) | (None, Some(n)) => planes.index_axis(Axis(0), n).to_owned(),
                (None, None) => continue,
            };
            planes.index_axis_mut(Axis(0), iz).assign(&plane);
        }
        debug!(max_segment, planes = nz, empty = nz - filled.len(), "rebinned");
        Ok(planes)
    }
}

impl Reconstruct2D for SsrbFbp2d {

    fn reconstruct_2d(&mut self, data: &ProjData, fov: FOV, log: &mut FullLog) -> Result<Image> {
        self.ramp.validate("ramp").map_err(ReconstructionError::config)?;
        let geometry = *data.geometry();
        let max_segment = self.max_segment_to_combine(data)?;
        writeln!(log, "FBP2D: rebinning segments -{max_segment} to {max_segment} into {} planes", fov.n[2])?;
        info!(max_segment, "2D reconstruction of rebinned data");

        let planes = self.rebin(data, &fov)?;
        let (nz, nv, nt) = planes.dim();
        let mut rows = planes.into_shape((nz * nv, nt))
            .map_err(|e| ReconstructionError::StructuralInvariant(e.to_string()))?;

        let bin_size = mm_(geometry.tangential_sampling);
        let response = ramp(padded_size(nt, self.transaxial_extension), bin_size, &self.ramp);
        writeln!(log, "FBP2D: ramp filter alpha = {} cutoff = {}, {} point FFT",
                 self.ramp.alpha, self.ramp.cutoff, response.len())?;
        filter_rows(&mut rows, &response);

        let lors: Vec<_> = (0..nv as i32).map(|v| LorGeometry::new(&geometry, v, 0)).collect();
        let min_t = geometry.min_tangential_pos_num() as f32;
        let weight = PI / nv as f32;
        let [nx, ny, _] = fov.n;
        let mut image = Image::zeros(fov);
        image.data
            .par_chunks_exact_mut(nx * ny)
            .enumerate()
            .for_each(|(iz, plane)| {
                for iy in 0..ny {
                    for ix in 0..nx {
                        let [x, y, _] = fov.voxel_centre_mm([ix, iy, iz]);
                        let sum: f32 = lors.iter().enumerate()
                            .map(|(v, lor)| {
                                let (s, _) = lor.project(x, y);
                                linear(rows.row(iz * nv + v), s / bin_size - min_t)
                            })
                            .sum();
                        plane[ix + iy * nx] = weight * sum;
                    }
                }
            });
        writeln!(log, "FBP2D: {}", image.stats())?;
        Ok(image)
    }
}

/// Linear interpolation of `row` at fractional index `t`, zero outside
fn linear(row: ArrayView1<f32>, t: f32) -> f32 {
    let t0 = t.floor();
    let f = t - t0;
    let t0 = t0 as i64;
    let at = |i: i64| if i >= 0 && (i as usize) < row.len() { row[i as usize] } else { 0.0 };
    (1.0 - f) * at(t0) + f * at(t0 + 1)
}

#[cfg(test)]
mod test_fbp2d {
    use super::*;
    use crate::projector::{project_image, ForwardProjector, SiddonForwardProjector};
    use crate::scanner::ScannerGeometry;
    use crate::symmetries::SegmentSignSymmetries;
    use float_eq::assert_float_eq;
    use ndarray::array;
    use rstest::rstest;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    fn block_data(geometry: &ScannerGeometry) -> (ProjData, FOV) {
        let fov = FOV::for_scanner(geometry);
        let mut image = Image::zeros(fov);
        for ix in 7..=8 { for iy in 7..=8 { image[[ix, iy, 4]] = 1.0 } }
        let mut projector = SiddonForwardProjector::new();
        projector.set_up(geometry, &fov).unwrap();
        let symmetries = SegmentSignSymmetries::new(geometry.num_views).unwrap();
        (project_image(&mut projector, &image, geometry, &symmetries).unwrap(), fov)
    }

    #[test]
    fn linear_interpolation() {
        let row = array![1.0, 3.0, 5.0];
        assert_eq!(linear(row.view(), 0.5), 2.0);
        assert_eq!(linear(row.view(), 2.0), 5.0);
        assert_eq!(linear(row.view(), -1.0), 0.0);
        assert_eq!(linear(row.view(), 2.5), 2.5);
    }

    #[test]
    fn direct_planes_come_from_the_direct_segment() {
        let geometry = ScannerGeometry::test_scanner(4, 1, 3);
        let (data, fov) = block_data(&geometry);
        let planes = SsrbFbp2d::new(FilterParameters::default(), 1, 2).rebin(&data, &fov).unwrap();
        assert_eq!(planes.dim(), (7, 8, 16));
        for (plane, axial) in [(0, 0), (2, 1), (4, 2), (6, 3)] {
            assert_eq!(planes.index_axis(Axis(0), plane), data.segment(0).index_axis(Axis(1), axial));
        }
        // Odd planes are interpolated
        let expected = (&data.segment(0).index_axis(Axis(1), 2) + &data.segment(0).index_axis(Axis(1), 1)) / 2.0;
        for (a, b) in planes.index_axis(Axis(0), 3).iter().zip(expected.iter()) {
            assert_float_eq!(*a, *b, abs <= 1e-5);
        }
    }

    #[test]
    fn reconstructed_block_peaks_in_its_plane() {
        let geometry = ScannerGeometry::test_scanner(4, 1, 3);
        let (data, fov) = block_data(&geometry);
        let image = SsrbFbp2d::default().reconstruct_2d(&data, fov, &mut FullLog::sink()).unwrap();
        let (argmax, _) = image.data.iter().enumerate()
            .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) });
        let [ix, iy, iz] = crate::index::index1_to_3(argmax, fov.n);
        assert_eq!(iz, 4);
        assert!((7..=8).contains(&ix) && (7..=8).contains(&iy), "peak at {:?}", [ix, iy, iz]);
    }

    #[rstest(/**/ n, ok,
             case(-1, true),
             case( 1, true),
             case( 7, true),
             case( 9, false),
             case( 2, false),
             case( 0, false),
    )]
    fn number_of_segments_to_combine(n: i32, ok: bool) {
        let geometry = ScannerGeometry::test_scanner(4, 1, 3);
        let fov = FOV::for_scanner(&geometry);
        let data = ProjData::zeros(geometry);
        let result = SsrbFbp2d::new(FilterParameters::default(), n, 2).rebin(&data, &fov);
        assert_eq!(result.is_ok(), ok);
    }
}
