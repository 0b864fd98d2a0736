// ----------------------------------- CLI -----------------------------------
use std::path::PathBuf;

#[derive(clap::Parser, Debug, Clone)]
#[command(name = "fbp3drp", about = "3D filtered backprojection with reprojection of missing oblique data")]
pub struct Cli {

    /// TOML configuration file
    pub config: PathBuf,

    /// Projection data to reconstruct
    #[arg(short, long)]
    pub input: PathBuf,

    /// Override automatic generation of image output file name
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override `max_segment_num_to_process` of the configuration file
    #[arg(short = 's', long, allow_hyphen_values = true)]
    pub max_segment: Option<i32>,

    /// Maximum number of rayon threads
    #[arg(short = 'j', long, default_value = "4")]
    pub num_threads: usize,
}

// --------------------------------------------------------------------------------

use std::error::Error;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use fbp3drp::config::fbp3drp::read_config_file;
use fbp3drp::io::raw::read_projdata;
use fbp3drp::projector::{BackProjector, InterpolatingBackProjector, SiddonForwardProjector};
use fbp3drp::segments::CanonicalPairs;
use fbp3drp::storage::{RawStorage, VolumeStorage};
use fbp3drp::symmetries::ViewSegment;
use fbp3drp::utils::{group_digits, timing::Progress};
use fbp3drp::{Fbp3drp, Monitor, Reconstruction};

struct BarMonitor { bar: ProgressBar }

impl Monitor for BarMonitor {
    fn segment_started(&mut self, segment: i32, _num_views: usize) {
        self.bar.set_message(format!("segment {segment}"));
    }
    fn view_done(&mut self, _: ViewSegment) { self.bar.inc(1) }
}

fn main() -> Result<(), Box<dyn Error>> {

    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    rayon::ThreadPoolBuilder::new().num_threads(args.num_threads).build_global()?;

    let mut progress = Progress::new();

    progress.start("Reading configuration and projection data");
    let mut config = read_config_file(&args.config)?;
    if let Some(max_segment) = args.max_segment { config.max_segment_num_to_process = max_segment }
    let data = read_projdata(&args.input)?;
    progress.done();

    let geometry = *data.geometry();
    println!("Scanner: {} rings, span {}, {} views, {} bins, {} segments",
             geometry.num_rings, geometry.span, geometry.num_views,
             geometry.num_tangential_poss, 2 * geometry.max_segment_num() + 1);

    // If the directory where results will be written does not exist yet, make it
    let output = args.output.clone().unwrap_or_else(|| PathBuf::from(format!("{}.raw", config.output_prefix)));
    for path in [&output, &PathBuf::from(&config.output_prefix)] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }

    let back = InterpolatingBackProjector::for_geometry(&geometry)?;
    let max_segment = match config.max_segment_num_to_process {
        -1 => geometry.max_segment_num(),
        n  => n.min(geometry.max_segment_num()),
    };
    let views = (geometry.min_view_num(), geometry.max_view_num());
    let num_pairs = CanonicalPairs::new(max_segment, views, back.symmetries()).count();

    // --- Progress bar --------------------------------------------------------------
    let bar = ProgressBar::new(num_pairs as u64);
    bar.set_style(ProgressStyle::default_bar()
                  .template("Reconstructing {msg}\n[{elapsed_precise}] {wide_bar} {pos}/{len} ({eta_precise})")?);
    let mut monitor = BarMonitor { bar };

    progress.startln("Reconstructing");
    let mut fbp = Fbp3drp::new(config).with_projectors(SiddonForwardProjector::new(), back);
    let Reconstruction { image, summary } = fbp.reconstruct(&data, &mut monitor)?;
    monitor.bar.finish();
    progress.done_with_message("Reconstruction");

    println!("Processed {} views in {} segments{}", group_digits(summary.views_processed), summary.segments_processed,
             if summary.cancelled { " (cancelled)" } else { "" });
    println!("Final volume: {}", summary.stats);
    println!("Timing: {}", summary.timings);

    progress.start(&format!("Writing image to {}", output.display()));
    RawStorage::default().write_volume(&output, &image)?;
    progress.done();
    Ok(())
}
