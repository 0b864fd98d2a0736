//! Forward projection by exact intersection lengths of LORs with voxels.
//!
//! The traversal is centred around two simplifications:
//!
//! 1. Express the voxel size in terms of distance along the LOR. This allows
//!    trivial calculation of how far we must move along the LOR before
//!    reaching the next voxel boundary, in any dimension.
//!
//! 2. Step the voxel index in the direction of travel in each dimension, so
//!    that progress along the LOR is always positive.

use ndarray::{parallel::prelude::*, Axis};

use units::mm_;

use crate::error::Result;
use crate::fov::FOV;
use crate::image::Image;
use crate::scanner::ScannerGeometry;
use crate::sinogram::{AxialRange, RelatedViewgrams};

use super::{check_geometry, not_set_up, ForwardProjector, LorGeometry, Timer};

#[derive(Clone, Debug, Default)]
pub struct SiddonForwardProjector {
    geometry: Option<ScannerGeometry>,
    timer: Timer,
}

impl SiddonForwardProjector {
    pub fn new() -> Self { Self::default() }
}

impl ForwardProjector for SiddonForwardProjector {

    fn set_up(&mut self, geometry: &ScannerGeometry, _fov: &FOV) -> Result<()> {
        check_geometry(geometry)?;
        self.geometry = Some(*geometry);
        self.timer.reset();
        Ok(())
    }

    fn forward_project(&mut self, viewgrams: &mut RelatedViewgrams, image: &Image, range: AxialRange) -> Result<()> {
        let geometry = self.geometry.ok_or_else(|| not_set_up("Siddon forward projector"))?;
        self.timer.time(|| {
            for viewgram in viewgrams.iter_mut() {
                let rows = range.intersection(viewgram.axial_range());
                if rows.is_empty() { continue }
                let segment = viewgram.segment_num();
                let lor = LorGeometry::new(&geometry, viewgram.view_num(), segment);
                let min_t = viewgram.min_tangential_pos_num();
                viewgram.rows_mut(rows)
                    .axis_iter_mut(Axis(0))
                    .into_par_iter()
                    .enumerate()
                    .for_each(|(i, mut row)| {
                        let axial = rows.min + i as i32;
                        let z_c = mm_(geometry.axial_offset(segment, axial as f32));
                        for (j, bin) in row.iter_mut().enumerate() {
                            let s = mm_(geometry.tangential_offset(min_t + j as i32));
                            *bin = lor.endpoints(s, z_c)
                                .map_or(0.0, |(p1, p2)| line_integral(image, p1, p2));
                        }
                    });
            }
        });
        Ok(())
    }

    fn elapsed(&self) -> std::time::Duration { self.timer.elapsed() }
}

/// Integral of `image` along the straight line from `p1` to `p2` (in mm):
/// the sum over traversed voxels of voxel value times intersection length.
pub fn line_integral(image: &Image, p1: [f32; 3], p2: [f32; 3]) -> f32 {
    let fov = &image.fov;
    let size = fov.voxel_size_mm();
    let half = fov.full_size_mm().map(|l| l / 2.0);
    let n = fov.n.map(|n| n as i32);

    let delta = [p2[0] - p1[0], p2[1] - p1[1], p2[2] - p1[2]];
    let length = (delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]).sqrt();
    if length == 0.0 { return 0.0 }
    let dir = delta.map(|d| d / length);

    // Clip the segment to the FOV box, one pair of planes at a time
    let (mut enter, mut exit) = (0.0_f32, length);
    for d in 0..3 {
        if dir[d].abs() < f32::EPSILON {
            if p1[d] <= -half[d] || p1[d] >= half[d] { return 0.0 }
            continue;
        }
        let a = (-half[d] - p1[d]) / dir[d];
        let b = ( half[d] - p1[d]) / dir[d];
        enter = enter.max(a.min(b));
        exit  = exit .min(a.max(b));
    }
    if enter >= exit { return 0.0 }

    // Entry point in voxel coordinates: floor gives the index
    let mut index = [0_i32; 3];
    let mut next_boundary = [f32::INFINITY; 3];
    let mut voxel_step    = [f32::INFINITY; 3];
    let mut index_step    = [0_i32; 3];
    for d in 0..3 {
        let v = (p1[d] + enter * dir[d] + half[d]) / size[d];
        index[d] = (v.floor() as i32).clamp(0, n[d] - 1);
        if dir[d].abs() < f32::EPSILON { continue }
        voxel_step[d] = size[d] / dir[d].abs();
        // Distance along the LOR to the next boundary in this dimension
        let frac_remaining = if dir[d] > 0.0 { (index[d] + 1) as f32 - v }
                             else            { v - index[d] as f32 };
        next_boundary[d] = frac_remaining.max(0.0) * voxel_step[d];
        index_step[d] = if dir[d] > 0.0 { 1 } else { -1 };
    }

    // How far we have moved since entering the FOV
    let total = exit - enter;
    let mut here = 0.0;
    let mut integral = 0.0;
    loop {
        // Which voxel boundary will be hit next, and its position
        let (dimension, boundary) = argmin(next_boundary);
        let boundary = boundary.min(total);

        // The weight is the length of LOR in this voxel
        let weight = boundary - here;
        if weight > 0.0 {
            integral += weight * image[[index[0] as usize, index[1] as usize, index[2] as usize]];
        }
        if boundary >= total { break }

        // Move along LOR until it leaves this voxel
        here = boundary;
        next_boundary[dimension] += voxel_step[dimension];
        index[dimension] += index_step[dimension];

        // Left the FOV through this dimension
        if index[dimension] < 0 || index[dimension] >= n[dimension] { break }
    }
    integral
}

#[inline]
fn argmin([x, y, z]: [f32; 3]) -> (usize, f32) {
    if x <= y {
        if x <= z { (0, x) } else { (2, z) }
    } else if y <= z { (1, y) } else { (2, z) }
}
