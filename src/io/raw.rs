//! Little-endian binary formats of images and projection data.
//!
//! Image:           `[u16; 3]` voxel counts, `[f32; 3]` voxel sizes in mm,
//!                  then the voxel values, x fastest.
//! Projection data: magic, scanner geometry, number of values, then every
//!                  segment from the most negative, each `[view][axial][tangential]`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use binrw::{binrw, BinReaderExt, BinWriterExt};
use ndarray::Array3;

use units::{mm, mm_};

use crate::error::{ReconstructionError, Result};
use crate::fov::FOV;
use crate::image::Image;
use crate::projdata::ProjData;
use crate::scanner::ScannerGeometry;

fn format_error(path: &Path, reason: impl ToString) -> ReconstructionError {
    ReconstructionError::Format { path: path.to_path_buf(), reason: reason.to_string() }
}

fn read_le<T>(path: &Path) -> Result<T>
where
    T: for<'a> binrw::BinRead<Args<'a> = ()>,
{
    let file = File::open(path).map_err(|e| ReconstructionError::io(path, e))?;
    BufReader::new(file).read_le::<T>().map_err(|e| match e {
        binrw::Error::Io(e) => ReconstructionError::io(path, e),
        e => format_error(path, e),
    })
}

fn write_le<T>(path: &Path, value: &T) -> Result<()>
where
    T: for<'a> binrw::BinWrite<Args<'a> = ()>,
{
    let file = File::create(path).map_err(|e| ReconstructionError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    writer.write_le(value).map_err(|e| match e {
        binrw::Error::Io(e) => ReconstructionError::io(path, e),
        e => format_error(path, e),
    })?;
    writer.flush().map_err(|e| ReconstructionError::io(path, e))
}

// ----- Images ------------------------------------------------------------------------

#[binrw]
#[derive(Clone, Debug, PartialEq)]
pub struct Image3D {
    pub pixels: [u16; 3],
    pub mm: [f32; 3],
    #[br(count = pixels.iter().map(|&n| n as usize).product::<usize>())]
    pub data: Vec<f32>,
}

impl Image3D {
    pub fn read_from_file(path: &Path) -> Result<Self> { read_le(path) }
    pub fn write_to_file(&self, path: &Path) -> Result<()> { write_le(path, self) }
}

impl TryFrom<&Image> for Image3D {
    type Error = String;
    fn try_from(image: &Image) -> std::result::Result<Self, String> {
        let [nx, ny, nz] = image.fov.n;
        let count = |n: usize| u16::try_from(n).map_err(|_| format!("{n} voxels do not fit in the image header"));
        Ok(Self {
            pixels: [count(nx)?, count(ny)?, count(nz)?],
            mm: image.fov.voxel_size_mm(),
            data: image.data.clone(),
        })
    }
}

impl TryFrom<Image3D> for Image {
    type Error = String;
    fn try_from(Image3D { pixels, mm: [dx, dy, dz], data }: Image3D) -> std::result::Result<Self, String> {
        let [nx, ny, nz] = pixels.map(|n| n as usize);
        Image::new(FOV::new((mm(dx), mm(dy), mm(dz)), (nx, ny, nz)), data)
    }
}

pub fn read_image(path: &Path) -> Result<Image> {
    Image::try_from(Image3D::read_from_file(path)?).map_err(|e| format_error(path, e))
}

pub fn write_image(path: &Path, image: &Image) -> Result<()> {
    Image3D::try_from(image).map_err(|e| format_error(path, e))?.write_to_file(path)
}

// ----- Projection data ---------------------------------------------------------------

#[binrw]
#[brw(magic = b"FBPD")]
#[derive(Clone, Debug, PartialEq)]
pub struct ProjDataFile {
    pub num_rings          : u16,
    pub span               : u16,
    pub max_ring_difference: u16,
    pub num_views          : u16,
    pub num_tangential_poss: u16,
    pub arc_corrected      : u8,
    pub ring_radius        : f32, // mm
    pub ring_spacing       : f32, // mm
    pub tangential_sampling: f32, // mm
    pub num_values         : u32,
    #[br(count = num_values)]
    pub data: Vec<f32>,
}

impl ProjDataFile {

    pub fn geometry(&self) -> ScannerGeometry {
        ScannerGeometry {
            num_rings:           self.num_rings           as usize,
            span:                self.span                as usize,
            max_ring_difference: self.max_ring_difference as usize,
            num_views:           self.num_views           as usize,
            num_tangential_poss: self.num_tangential_poss as usize,
            ring_radius:         mm(self.ring_radius),
            ring_spacing:        mm(self.ring_spacing),
            tangential_sampling: mm(self.tangential_sampling),
            arc_corrected:       self.arc_corrected != 0,
        }
    }
}

impl TryFrom<&ProjData> for ProjDataFile {
    type Error = String;
    fn try_from(data: &ProjData) -> std::result::Result<Self, String> {
        let g = data.geometry();
        let small = |n: usize, what: &str| u16::try_from(n).map_err(|_| format!("{what} = {n} does not fit in the header"));
        let values: Vec<f32> = data.segments().flat_map(|(_, s)| s.iter().copied().collect::<Vec<_>>()).collect();
        Ok(Self {
            num_rings:           small(g.num_rings,           "num_rings")?,
            span:                small(g.span,                "span")?,
            max_ring_difference: small(g.max_ring_difference, "max_ring_difference")?,
            num_views:           small(g.num_views,           "num_views")?,
            num_tangential_poss: small(g.num_tangential_poss, "num_tangential_poss")?,
            arc_corrected:       u8::from(g.arc_corrected),
            ring_radius:         mm_(g.ring_radius),
            ring_spacing:        mm_(g.ring_spacing),
            tangential_sampling: mm_(g.tangential_sampling),
            num_values: u32::try_from(values.len()).map_err(|_| "too many values for one file".to_string())?,
            data: values,
        })
    }
}

impl TryFrom<ProjDataFile> for ProjData {
    type Error = String;
    fn try_from(file: ProjDataFile) -> std::result::Result<Self, String> {
        let geometry = file.geometry();
        geometry.validate()?;
        let shapes: Vec<_> = geometry.segment_nums()
            .map(|s| (geometry.num_views, geometry.num_axial_poss(s) as usize, geometry.num_tangential_poss))
            .collect();
        let expected: usize = shapes.iter().map(|(v, a, t)| v * a * t).sum();
        if expected != file.data.len() {
            return Err(format!("geometry requires {expected} values, file contains {}", file.data.len()))
        }
        let mut values = file.data.into_iter();
        let segments = shapes.into_iter()
            .map(|shape @ (v, a, t)| {
                let chunk: Vec<f32> = values.by_ref().take(v * a * t).collect();
                Array3::from_shape_vec(shape, chunk).map_err(|e| e.to_string())
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        ProjData::new(geometry, segments)
    }
}

pub fn read_projdata(path: &Path) -> Result<ProjData> {
    ProjData::try_from(read_le::<ProjDataFile>(path)?).map_err(|e| format_error(path, e))
}

pub fn write_projdata(path: &Path, data: &ProjData) -> Result<()> {
    write_le(path, &ProjDataFile::try_from(data).map_err(|e| format_error(path, e))?)
}

#[cfg(test)]
mod test_raw {
    use super::*;
    use crate::scanner::ScannerGeometry;
    use float_eq::assert_float_eq;
    use tempfile::tempdir;
    use units::mm_;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    /// Lengths pass through f32 mm in the header: compare them to within rounding
    fn assert_same_geometry(a: &ScannerGeometry, b: &ScannerGeometry) {
        assert_eq!((a.num_rings, a.span, a.max_ring_difference, a.num_views, a.num_tangential_poss, a.arc_corrected),
                   (b.num_rings, b.span, b.max_ring_difference, b.num_views, b.num_tangential_poss, b.arc_corrected));
        for (x, y) in [(a.ring_radius, b.ring_radius), (a.ring_spacing, b.ring_spacing),
                       (a.tangential_sampling, b.tangential_sampling)] {
            assert_float_eq!(mm_(x), mm_(y), r2nd <= 1e-6);
        }
    }

    #[test]
    fn image_roundtrip() -> Result<()> {
        // Harmless temporary location for output file
        let dir = tempdir().map_err(ReconstructionError::Log)?;
        let path = dir.path().join("image.raw");

        let fov = FOV::new((mm(2.0), mm(2.0), mm(4.0)), (3, 2, 2));
        let image = Image::new(fov, (0..12).map(|i| i as f32 * 0.5).collect()).unwrap();
        write_image(&path, &image)?;

        // 6 bytes of counts, 12 of voxel sizes, 4 per voxel
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 6 + 12 + 4 * 12);
        assert_eq!(read_image(&path)?, image);
        Ok(())
    }

    #[test]
    fn projdata_roundtrip() -> Result<()> {
        let dir = tempdir().map_err(ReconstructionError::Log)?;
        let path = dir.path().join("data.fbpd");

        let mut data = ProjData::zeros(ScannerGeometry::test_scanner(4, 1, 2));
        data.segment_mut(-2).iter_mut().enumerate().for_each(|(i, x)| *x = i as f32);
        data.segment_mut( 1).fill(7.0);
        write_projdata(&path, &data)?;
        let back = read_projdata(&path)?;
        assert_same_geometry(back.geometry(), data.geometry());
        for ((s1, a), (s2, b)) in back.segments().zip(data.segments()) {
            assert_eq!(s1, s2);
            assert_eq!(a, b);
        }
        Ok(())
    }

    #[test]
    fn truncated_image_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.raw");
        let header = Image3D { pixels: [2, 2, 2], mm: [1.0; 3], data: vec![0.0; 8] };
        header.write_to_file(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();
        assert!(read_image(&path).is_err());
    }

    #[test]
    fn wrong_magic_is_a_format_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bogus.fbpd");
        std::fs::write(&path, b"NOPE and some more bytes").unwrap();
        assert!(matches!(read_projdata(&path), Err(ReconstructionError::Format { .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(read_image(Path::new("/nonexistent/image.raw")), Err(ReconstructionError::Io { .. })));
    }
}
