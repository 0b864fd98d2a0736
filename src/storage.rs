//! Where volumes come from and go to: the reprojection image, intermediate
//! estimates and the final reconstruction.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::image::Image;
use crate::io::raw;

pub trait VolumeStorage {
    fn read_volume(&self, path: &Path) -> Result<Image>;
    fn write_volume(&self, path: &Path, image: &Image) -> Result<()>;
}

/// Volumes in the raw `Image3D` format. Paths without an extension get
/// `extension` appended.
#[derive(Clone, Debug)]
pub struct RawStorage {
    pub extension: String,
}

impl Default for RawStorage {
    fn default() -> Self { Self { extension: "raw".into() } }
}

impl RawStorage {
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.extension().is_some() || self.extension.is_empty() { path.to_path_buf() }
        else { path.with_extension(&self.extension) }
    }
}

impl VolumeStorage for RawStorage {

    fn read_volume(&self, path: &Path) -> Result<Image> {
        let path = self.resolve(path);
        debug!(?path, "reading volume");
        raw::read_image(&path)
    }

    fn write_volume(&self, path: &Path, image: &Image) -> Result<()> {
        let path = self.resolve(path);
        debug!(?path, "writing volume");
        raw::write_image(&path, image)
    }
}

#[cfg(test)]
mod test_storage {
    use super::*;
    use crate::error::ReconstructionError;
    use crate::fov::FOV;
    use units::mm;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    #[test]
    fn extension_is_added_when_missing() -> Result<()> {
        let dir = tempfile::tempdir().map_err(ReconstructionError::Log)?;
        let storage = RawStorage::default();
        let image = Image::ones(FOV::new((mm(1.0), mm(1.0), mm(1.0)), (2, 3, 4)));

        storage.write_volume(&dir.path().join("run_afterseg1"), &image)?;
        assert!(dir.path().join("run_afterseg1.raw").exists());
        assert_eq!(storage.read_volume(&dir.path().join("run_afterseg1"))?, image);

        storage.write_volume(&dir.path().join("final.img"), &image)?;
        assert!(dir.path().join("final.img").exists());
        Ok(())
    }
}
