use crate::aerial::{AerialMeta, PlacementRecord};
use crate::affine::AffineTransform;
use crate::decode::ContrastEnhancement;
use crate::matching::MatcherOptions;
use crate::refine::RefineOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Deserialize)]
pub struct ReferenceConfig {
    pub image: PathBuf,
    /// Pixel → world transform overriding the world-file sidecar.
    #[serde(default)]
    pub geo: Option<AffineTransform>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlacementConfig {
    pub meta: AerialMeta,
    /// Persisted placement; the metadata default is used when absent.
    #[serde(default)]
    pub record: Option<PlacementRecord>,
    /// Accept the refined placement instead of rejecting the preview.
    #[serde(default = "default_accept")]
    pub accept: bool,
}

fn default_accept() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub contrast: ContrastEnhancement,
    /// Reader threads; 0 picks one per CPU.
    pub threads: usize,
    /// Seconds to wait for the display pixmap.
    pub timeout_s: f64,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            contrast: ContrastEnhancement::Histogram,
            threads: 2,
            timeout_s: 30.0,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct GeorefOutputConfig {
    pub json_out: Option<PathBuf>,
    /// Placement record after the run.
    pub placement_out: Option<PathBuf>,
    /// Display pixmap of the aerial.
    pub pixmap_out: Option<PathBuf>,
    pub debug_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GeorefToolConfig {
    pub aerial: PathBuf,
    pub reference: ReferenceConfig,
    pub placement: PlacementConfig,
    #[serde(default)]
    pub matcher: MatcherOptions,
    #[serde(default)]
    pub refine: RefineOptions,
    #[serde(default)]
    pub decode: DecodeConfig,
    #[serde(default)]
    pub output: GeorefOutputConfig,
}

pub fn load_config(path: &Path) -> Result<GeorefToolConfig, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
    parse_config(&contents).map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
}

pub fn parse_config(json: &str) -> Result<GeorefToolConfig, serde_json::Error> {
    serde_json::from_str(json)
}
