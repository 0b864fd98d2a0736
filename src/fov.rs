/// The size and granularity of the Field of View (FOV) in which images are
/// reconstructed.
///
/// Voxels are indexed by `[ix, iy, iz]`. The transaxial grid is centred on
/// the scanner axis; axial planes are numbered `0 ..= nz-1` with the middle
/// plane at the axial centre of the scanner.

use units::{mm, mm_, Length};
use units::todo::Lengthf32;
use crate::scanner::ScannerGeometry;
use crate::index::{BoxDim_u, Index3_u};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FOV {
    pub n: BoxDim_u,
    pub voxel_size: [Length; 3],
}

impl FOV {

    pub fn new((dx, dy, dz): (Length, Length, Length), (nx, ny, nz): (usize, usize, usize)) -> Self {
        Self { n: [nx, ny, nz], voxel_size: [dx, dy, dz] }
    }

    /// Default image for a scanner: one voxel per tangential bin
    /// transaxially, one plane per half ring spacing axially.
    pub fn for_scanner(scanner: &ScannerGeometry) -> Self {
        let n_xy = scanner.num_tangential_poss;
        let n_z  = 2 * scanner.num_rings - 1;
        let d_xy = scanner.tangential_sampling;
        Self::new((d_xy, d_xy, scanner.ring_spacing / 2.0), (n_xy, n_xy, n_z))
    }

    pub fn min_z(&self) -> i32 { 0 }
    pub fn max_z(&self) -> i32 { self.n[2] as i32 - 1 }

    pub fn num_voxels(&self) -> usize { self.n.iter().product() }

    /// Voxel sizes in mm
    pub fn voxel_size_mm(&self) -> [Lengthf32; 3] { self.voxel_size.map(mm_) }

    /// Full extent of the FOV in mm, in each dimension
    pub fn full_size_mm(&self) -> [Lengthf32; 3] {
        let d = self.voxel_size_mm();
        [d[0] * self.n[0] as f32, d[1] * self.n[1] as f32, d[2] * self.n[2] as f32]
    }

    /// Centre of voxel with given 3D index, in mm
    pub fn voxel_centre_mm(&self, [ix, iy, iz]: Index3_u) -> [Lengthf32; 3] {
        let [dx, dy, dz] = self.voxel_size_mm();
        let [nx, ny, nz] = self.n.map(|n| n as f32);
        [(ix as f32 - (nx - 1.0) / 2.0) * dx,
         (iy as f32 - (ny - 1.0) / 2.0) * dy,
         (iz as f32 - (nz - 1.0) / 2.0) * dz]
    }

    /// Axial position of the centre of plane `iz`
    pub fn plane_z(&self, iz: i32) -> Length {
        mm((iz as f32 - (self.n[2] as f32 - 1.0) / 2.0) * mm_(self.voxel_size[2]))
    }
}
