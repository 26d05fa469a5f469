//! Raster datasets feeding the refiner and the display decoder.
//!
//! A [`RasterDataset`] exposes pixel dimensions, a band count (1 or 3) and
//! resampled window reads. [`Raster`] is the in-memory implementation backed
//! by the `image` crate; it is either the full raster of an aerial or a
//! preview crop of a larger scan ([`RasterSource::Preview`]).
//!
//! [`ReferenceRaster`] pairs a grayscale orthophoto with its pixel → world
//! transform, usually read from a world-file sidecar (see [`worldfile`]).

mod reference;
pub mod worldfile;

pub use reference::ReferenceRaster;

use crate::error::RasterError;
use crate::image::ImageF32;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Integer pixel window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: usize,
    pub top: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRect {
    pub fn new(left: usize, top: usize, width: usize, height: usize) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Crop of a larger raster used for quick previews, with the view rotation
/// in counter-clockwise quarter turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRect {
    pub rect: PixelRect,
    pub rotation_ccw: u8,
}

impl PreviewRect {
    /// Displayed size after rotation.
    pub fn display_size(&self) -> (usize, usize) {
        if self.rotation_ccw % 2 == 1 {
            (self.rect.height, self.rect.width)
        } else {
            (self.rect.width, self.rect.height)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RasterSource {
    #[default]
    Full,
    Preview(PreviewRect),
}

/// Interleaved 8-bit samples with 1 or 3 bands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterBuffer {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub data: Vec<u8>,
}

impl RasterBuffer {
    pub fn new(width: usize, height: usize, bands: usize, data: Vec<u8>) -> Result<Self, RasterError> {
        if bands != 1 && bands != 3 {
            return Err(RasterError::UnsupportedBands(bands));
        }
        if data.len() != width * height * bands {
            return Err(RasterError::BufferSize {
                w: width,
                h: height,
                bands,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            bands,
            data,
        })
    }

    pub fn gray(width: usize, height: usize, data: Vec<u8>) -> Result<Self, RasterError> {
        Self::new(width, height, 1, data)
    }

    /// Average the bands into a `[0, 1]` float image.
    pub fn to_gray_f32(&self) -> ImageF32 {
        let mut out = ImageF32::new(self.width, self.height);
        let norm = 1.0 / (255.0 * self.bands as f32);
        for (dst, px) in out.data.iter_mut().zip(self.data.chunks_exact(self.bands)) {
            let sum: u32 = px.iter().map(|&v| v as u32).sum();
            *dst = sum as f32 * norm;
        }
        out
    }
}

pub trait RasterDataset: Send + Sync {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn band_count(&self) -> usize;
    fn source(&self) -> RasterSource;

    /// Read `window` resampled to `out_w × out_h`.
    fn read(&self, window: PixelRect, out_w: usize, out_h: usize) -> Result<RasterBuffer, RasterError>;

    fn is_preview(&self) -> bool {
        matches!(self.source(), RasterSource::Preview(_))
    }

    fn read_gray(&self, window: PixelRect, out_w: usize, out_h: usize) -> Result<ImageF32, RasterError> {
        Ok(self.read(window, out_w, out_h)?.to_gray_f32())
    }
}

/// Decoded raster held in memory.
#[derive(Clone, Debug)]
pub struct Raster {
    path: Option<PathBuf>,
    buffer: RasterBuffer,
    source: RasterSource,
}

impl Raster {
    /// Decode an image file. 16-bit and float samples are reduced to 8 bits.
    pub fn open(path: &Path) -> Result<Self, RasterError> {
        let img = image::open(path).map_err(|e| RasterError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let bands = img.color().channel_count() as usize;
        let (width, height) = (img.width() as usize, img.height() as usize);
        let data = match bands {
            1 => img.into_luma8().into_raw(),
            3 => img.into_rgb8().into_raw(),
            other => return Err(RasterError::UnsupportedBands(other)),
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            buffer: RasterBuffer::new(width, height, bands, data)?,
            source: RasterSource::Full,
        })
    }

    pub fn from_buffer(buffer: RasterBuffer) -> Self {
        Self {
            path: None,
            buffer,
            source: RasterSource::Full,
        }
    }

    /// Mark this raster as the backing scan of a preview crop.
    pub fn into_preview(mut self, preview: PreviewRect) -> Self {
        self.source = RasterSource::Preview(preview);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn buffer(&self) -> &RasterBuffer {
        &self.buffer
    }
}

impl RasterDataset for Raster {
    fn width(&self) -> usize {
        self.buffer.width
    }

    fn height(&self) -> usize {
        self.buffer.height
    }

    fn band_count(&self) -> usize {
        self.buffer.bands
    }

    fn source(&self) -> RasterSource {
        self.source
    }

    fn read(&self, window: PixelRect, out_w: usize, out_h: usize) -> Result<RasterBuffer, RasterError> {
        resample_window(&self.buffer, window, out_w, out_h)
    }
}

/// Crop `window` out of `buffer` and resize it with a Gaussian filter.
pub fn resample_window(
    buffer: &RasterBuffer,
    window: PixelRect,
    out_w: usize,
    out_h: usize,
) -> Result<RasterBuffer, RasterError> {
    let fits = window.left + window.width <= buffer.width && window.top + window.height <= buffer.height;
    if window.is_empty() || !fits || out_w == 0 || out_h == 0 {
        return Err(RasterError::Window {
            x: window.left,
            y: window.top,
            w: window.width,
            h: window.height,
            width: buffer.width,
            height: buffer.height,
        });
    }
    let (x, y, w, h) = (
        window.left as u32,
        window.top as u32,
        window.width as u32,
        window.height as u32,
    );
    let same_size = out_w == window.width && out_h == window.height;
    let data = match buffer.bands {
        1 => {
            let img = GrayImage::from_raw(buffer.width as u32, buffer.height as u32, buffer.data.clone())
                .ok_or(RasterError::BufferSize {
                    w: buffer.width,
                    h: buffer.height,
                    bands: 1,
                    got: buffer.data.len(),
                })?;
            let cropped = imageops::crop_imm(&img, x, y, w, h).to_image();
            if same_size {
                cropped.into_raw()
            } else {
                imageops::resize(&cropped, out_w as u32, out_h as u32, FilterType::Gaussian).into_raw()
            }
        }
        3 => {
            let img = RgbImage::from_raw(buffer.width as u32, buffer.height as u32, buffer.data.clone())
                .ok_or(RasterError::BufferSize {
                    w: buffer.width,
                    h: buffer.height,
                    bands: 3,
                    got: buffer.data.len(),
                })?;
            let cropped = imageops::crop_imm(&img, x, y, w, h).to_image();
            if same_size {
                cropped.into_raw()
            } else {
                imageops::resize(&cropped, out_w as u32, out_h as u32, FilterType::Gaussian).into_raw()
            }
        }
        other => return Err(RasterError::UnsupportedBands(other)),
    };
    RasterBuffer::new(out_w, out_h, buffer.bands, data)
}
