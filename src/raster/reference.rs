use super::worldfile::{find_world_file, parse_world_file};
use super::{PixelRect, Raster, RasterDataset};
use crate::affine::AffineTransform;
use crate::error::RasterError;
use crate::image::ImageF32;
use std::fs;
use std::path::Path;

/// Grayscale orthophoto / basemap with its pixel → world transform.
#[derive(Clone, Debug)]
pub struct ReferenceRaster {
    pub image: ImageF32,
    pub geo: AffineTransform,
}

impl ReferenceRaster {
    pub fn new(image: ImageF32, geo: AffineTransform) -> Self {
        Self { image, geo }
    }

    /// Open an image and its world-file sidecar.
    pub fn open(path: &Path) -> Result<Self, RasterError> {
        let world = find_world_file(path).ok_or_else(|| {
            RasterError::WorldFile(format!("no world file found next to {}", path.display()))
        })?;
        let text = fs::read_to_string(&world).map_err(|e| RasterError::Open {
            path: world.clone(),
            reason: e.to_string(),
        })?;
        let geo = parse_world_file(&text)?;
        let raster = Raster::open(path)?;
        Self::from_dataset(&raster, geo)
    }

    pub fn from_dataset(dataset: &dyn RasterDataset, geo: AffineTransform) -> Result<Self, RasterError> {
        let (w, h) = (dataset.width(), dataset.height());
        let image = dataset.read_gray(PixelRect::full(w, h), w, h)?;
        Ok(Self { image, geo })
    }

    /// Ground sample distance (world units per pixel).
    pub fn gsd(&self) -> f64 {
        self.geo.uniform_scale()
    }
}
