// ----------------------------------- CLI -----------------------------------
use std::path::PathBuf;

use units::todo::Lengthf32;

#[derive(clap::Parser, Debug, Clone)]
#[command(name = "make_projdata", about = "Forward project an image into the projection data of a cylindrical scanner")]
pub struct Cli {

    /// Projection data output file
    #[arg(short, long)]
    pub out: PathBuf,

    /// Image to project. If absent, a uniform cylinder is projected
    #[arg(short, long)]
    pub image: Option<PathBuf>,

    /// Radius of the uniform cylinder [mm]
    #[arg(long, default_value = "20")]
    pub phantom_radius: Lengthf32,

    #[arg(long, default_value = "8")]
    pub rings: usize,

    /// Number of ring differences combined in each segment (odd)
    #[arg(long, default_value = "1")]
    pub span: usize,

    #[arg(long, default_value = "7")]
    pub max_ring_difference: usize,

    #[arg(long, default_value = "32")]
    pub views: usize,

    #[arg(long, default_value = "64")]
    pub tangential_poss: usize,

    /// [mm]
    #[arg(long, default_value = "100")]
    pub ring_radius: Lengthf32,

    /// [mm]
    #[arg(long, default_value = "4")]
    pub ring_spacing: Lengthf32,

    /// Tangential sampling [mm]
    #[arg(long, default_value = "2")]
    pub bin_size: Lengthf32,
}

// --------------------------------------------------------------------------------

use std::error::Error;

use clap::Parser;
use units::{mm, mm_};

use fbp3drp::io::raw::write_projdata;
use fbp3drp::projector::{project_image, ForwardProjector, SiddonForwardProjector};
use fbp3drp::storage::{RawStorage, VolumeStorage};
use fbp3drp::symmetries::SegmentSignSymmetries;
use fbp3drp::utils::{group_digits, timing::Progress};
use fbp3drp::{Image, ScannerGeometry, FOV};

fn main() -> Result<(), Box<dyn Error>> {

    let args = Cli::parse();
    let mut progress = Progress::new();

    let geometry = ScannerGeometry {
        num_rings: args.rings,
        span: args.span,
        max_ring_difference: args.max_ring_difference,
        num_views: args.views,
        num_tangential_poss: args.tangential_poss,
        ring_radius: mm(args.ring_radius),
        ring_spacing: mm(args.ring_spacing),
        tangential_sampling: mm(args.bin_size),
        arc_corrected: true,
    };
    geometry.validate()?;
    let fov = FOV::for_scanner(&geometry);

    let image = match &args.image {
        Some(path) => {
            progress.start(&format!("Reading {}", path.display()));
            let image = RawStorage::default().read_volume(path)?;
            progress.done();
            image
        }
        None => {
            let radius = args.phantom_radius;
            let mut image = Image::zeros(fov);
            let [nx, ny, nz] = fov.n;
            for iz in 0..nz { for iy in 0..ny { for ix in 0..nx {
                let [x, y, _] = fov.voxel_centre_mm([ix, iy, iz]);
                if x.hypot(y) <= radius { image[[ix, iy, iz]] = 1.0 }
            }}}
            image
        }
    };

    progress.start(&format!("Projecting {} voxels into {} segments",
                            group_digits(image.data.len()), 2 * geometry.max_segment_num() + 1));
    let mut projector = SiddonForwardProjector::new();
    projector.set_up(&geometry, &image.fov)?;
    let symmetries = SegmentSignSymmetries::new(geometry.num_views)?;
    let data = project_image(&mut projector, &image, &geometry, &symmetries)?;
    progress.done();

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    progress.start(&format!("Writing {}", args.out.display()));
    write_projdata(&args.out, &data)?;
    progress.done();
    println!("Total counts: {:.1} (ring spacing {} mm)", data.sum(), mm_(geometry.ring_spacing));
    Ok(())
}
