//! Configuration file parser for FBP3DRP

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ReconstructionError, Result};
use crate::filter::FilterParameters;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {

    /// Prefix of the output volume and of the run logs
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Forward project this image instead of running the 2D reconstruction
    #[serde(default)]
    pub image_for_reprojection: Option<PathBuf>,

    /// Write the 2D estimate and the volume after each segment
    #[serde(default)]
    pub save_intermediate_files: bool,

    /// Outermost segment to process; -1: all segments in the data
    #[serde(default = "all")]
    pub max_segment_num_to_process: i32,

    /// Segments rebinned by the 2D reconstruction; -1: all
    #[serde(default = "all")]
    pub num_segments_to_combine: i32,

    /// Fit the synthesized sinograms to the measured ones
    #[serde(default)]
    pub fit_projections: bool,

    /// Allowed relative mismatch between the Colsher filter's axial sampling
    /// and the scanner's sampling in `t`
    #[serde(default = "default_sampling_tolerance")]
    pub sampling_tolerance: f32,

    /// Ramp filter of the 2D reconstruction
    #[serde(default)]
    pub ramp: FilterParameters,

    #[serde(default)]
    pub colsher: Colsher,

    #[serde(default)]
    pub fft_extension: FftExtension,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Colsher {
    #[serde(default)]
    pub axial: FilterParameters,
    #[serde(default)]
    pub planar: FilterParameters,
}

/// Zero-padding factors of the FFTs. Values below 2 cause aliasing unless the
/// data occupy at most half of the field of view.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FftExtension {
    #[serde(default = "default_extension")]
    pub transaxial: usize,
    #[serde(default = "default_extension")]
    pub axial: usize,
}

impl Default for FftExtension {
    fn default() -> Self { Self { transaxial: default_extension(), axial: default_extension() } }
}

fn default_output_prefix() -> String { "fbp3drp".into() }
fn default_sampling_tolerance() -> f32 { 1e-4 }
fn default_extension() -> usize { 2 }
fn all() -> i32 { -1 }

impl Default for Config {
    fn default() -> Self {
        Self {
            output_prefix: default_output_prefix(),
            image_for_reprojection: None,
            save_intermediate_files: false,
            max_segment_num_to_process: all(),
            num_segments_to_combine: all(),
            fit_projections: false,
            sampling_tolerance: default_sampling_tolerance(),
            ramp: FilterParameters::default(),
            colsher: Colsher::default(),
            fft_extension: FftExtension::default(),
        }
    }
}

impl Config {

    /// Reject values which parse but make no sense
    pub fn validate(&self) -> Result<()> {
        let bad = |message: String| Err(ReconstructionError::Configuration(message));
        self.ramp         .validate("ramp")          .map_err(ReconstructionError::Configuration)?;
        self.colsher.axial .validate("colsher.axial") .map_err(ReconstructionError::Configuration)?;
        self.colsher.planar.validate("colsher.planar").map_err(ReconstructionError::Configuration)?;
        let FftExtension { transaxial, axial } = self.fft_extension;
        if transaxial > 2 || axial > 2 {
            return bad(format!("fft_extension values must be 0, 1 or 2, got ({transaxial}, {axial})"))
        }
        if self.max_segment_num_to_process < -1 {
            return bad(format!("max_segment_num_to_process must be -1 or non-negative, got {}", self.max_segment_num_to_process))
        }
        let n = self.num_segments_to_combine;
        if n != -1 && (n <= 0 || n % 2 == 0) {
            return bad(format!("num_segments_to_combine must be -1 or odd, got {n}"))
        }
        if !(self.sampling_tolerance > 0.0) {
            return bad(format!("sampling_tolerance must be positive, got {}", self.sampling_tolerance))
        }
        if self.output_prefix.is_empty() {
            return bad("output_prefix must not be empty".into())
        }
        Ok(())
    }
}

pub fn parse_config(text: &str) -> Result<Config> {
    let config: Config = toml::from_str(text)
        .map_err(|e| ReconstructionError::Configuration(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

pub fn read_config_file(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path).map_err(|e| ReconstructionError::io(path, e))?;
    parse_config(&text)
}
