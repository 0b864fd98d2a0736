//! Voxelized 3D image: the initial estimate and the reconstructed volume.

use std::fmt;

use crate::fov::FOV;
use crate::index::{index3_to_1, Index1_u, Index3_u};
use units::todo::Intensityf32;

pub type ImageData = Vec<Intensityf32>;

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub fov: FOV,
    pub data: ImageData,
}

impl Image {

    /// Wrap `data` in an image. Fails if the number of values does not match
    /// the voxel counts of `fov`.
    pub fn new(fov: FOV, data: ImageData) -> Result<Self, String> {
        if data.len() != fov.num_voxels() {
            return Err(format!("Image data ({} values) does not match dimensions {:?}",
                               data.len(), fov.n))
        }
        Ok(Image { fov, data })
    }

    pub fn zeros(fov: FOV) -> Self {
        Self { data: vec![0.0; fov.num_voxels()], fov }
    }

    pub fn ones(fov: FOV) -> Self {
        Self { data: vec![1.0; fov.num_voxels()], fov }
    }

    pub fn fill(&mut self, value: Intensityf32) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    fn plane_len(&self) -> usize { self.fov.n[0] * self.fov.n[1] }

    /// Voxels of axial plane `iz`, `x` varying fastest
    pub fn plane(&self, iz: usize) -> &[Intensityf32] {
        let n = self.plane_len();
        &self.data[iz * n..(iz + 1) * n]
    }

    pub fn plane_mut(&mut self, iz: usize) -> &mut [Intensityf32] {
        let n = self.plane_len();
        &mut self.data[iz * n..(iz + 1) * n]
    }

    /// Mutable views of all axial planes, for processing them in parallel
    pub fn planes_mut(&mut self) -> std::slice::ChunksExactMut<'_, Intensityf32> {
        let n = self.plane_len();
        self.data.chunks_exact_mut(n)
    }

    pub fn stats(&self) -> ImageStats {
        let mut stats = ImageStats { min: f32::INFINITY, max: f32::NEG_INFINITY, sum: 0.0 };
        for &v in &self.data {
            stats.min = stats.min.min(v);
            stats.max = stats.max.max(v);
            stats.sum += v as f64;
        }
        stats
    }
}

/// Summary statistics written to the reconstruction logs
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageStats {
    pub min: Intensityf32,
    pub max: Intensityf32,
    pub sum: f64,
}

impl fmt::Display for ImageStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "min {:.6e}, max {:.6e}, sum {:.6e}", self.min, self.max, self.sum)
    }
}

impl core::ops::IndexMut<Index1_u> for Image {
    #[inline]
    fn index_mut(&mut self, i: Index1_u) -> &mut Self::Output { &mut self.data[i] }
}

impl core::ops::Index<Index1_u> for Image {
    type Output = Intensityf32;
    #[inline]
    fn index(&self, i: Index1_u) -> &Self::Output { &self.data[i] }
}

impl core::ops::IndexMut<Index3_u> for Image {
    fn index_mut(&mut self, i3: Index3_u) -> &mut Self::Output {
        let i1 = index3_to_1(i3, self.fov.n);
        &mut self.data[i1]
    }
}

impl core::ops::Index<Index3_u> for Image {
    type Output = Intensityf32;
    fn index(&self, i3: Index3_u) -> &Self::Output {
        let i1 = index3_to_1(i3, self.fov.n);
        &self.data[i1]
    }
}
