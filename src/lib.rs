//! Three-dimensional filtered backprojection with reprojection (FBP3DRP) of
//! cylindrical-scanner projection data.

pub mod error;
pub mod scanner;
pub mod index;
pub mod fov;
pub mod image;
pub mod sinogram;
pub mod symmetries;
pub mod projdata;
pub mod segments;
pub mod missing;
pub mod projector;
pub mod fft;
pub mod filter;
pub mod colsher;
pub mod fit;
pub mod fill;
pub mod accumulate;
pub mod fbp2d;
pub mod full_log;
pub mod io;
pub mod storage;
pub mod config;
pub mod reconstruction;
pub mod utils;

pub use error::{ReconstructionError, Result};
pub use fov::FOV;
pub use image::Image;
pub use projdata::ProjData;
pub use reconstruction::{Fbp3drp, Reconstruction, RunSummary, RunState, Monitor, NoMonitor, CancelToken};
pub use scanner::ScannerGeometry;
