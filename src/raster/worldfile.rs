//! ESRI world files: six numbers `A D B E C F`, one per line, giving
//! `x = A·col + B·row + C` and `y = D·col + E·row + F` for pixel *centres*.
//!
//! Transforms in this crate use corner-based pixel coordinates, so parsing
//! shifts the translation by half a pixel.
use crate::affine::AffineTransform;
use crate::error::RasterError;
use nalgebra::{Matrix2, Vector2};
use std::path::{Path, PathBuf};

pub fn parse_world_file(text: &str) -> Result<AffineTransform, RasterError> {
    let values: Vec<f64> = text
        .split_whitespace()
        .map(|tok| {
            tok.parse::<f64>()
                .map_err(|e| RasterError::WorldFile(format!("'{tok}': {e}")))
        })
        .collect::<Result<_, _>>()?;
    if values.len() != 6 {
        return Err(RasterError::WorldFile(format!(
            "expected 6 values, got {}",
            values.len()
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(RasterError::WorldFile("non-finite value".into()));
    }
    let [a, d, b, e, c, f] = [values[0], values[1], values[2], values[3], values[4], values[5]];
    let linear = Matrix2::new(a, b, d, e);
    if linear.determinant().abs() <= f64::EPSILON {
        return Err(RasterError::WorldFile("singular pixel size".into()));
    }
    let corner = Vector2::new(c - 0.5 * (a + b), f - 0.5 * (d + e));
    Ok(AffineTransform::from_parts(linear, corner))
}

/// Inverse of [`parse_world_file`].
pub fn format_world_file(t: &AffineTransform) -> String {
    let l = t.linear();
    let o = t.translation();
    let c = o[0] + 0.5 * (l[(0, 0)] + l[(0, 1)]);
    let f = o[1] + 0.5 * (l[(1, 0)] + l[(1, 1)]);
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n",
        l[(0, 0)],
        l[(1, 0)],
        l[(0, 1)],
        l[(1, 1)],
        c,
        f
    )
}

/// Sidecar names tried for `image`: `.pgw`-style, `<ext>w`, then `.wld`.
pub fn world_file_candidates(image: &Path) -> Vec<PathBuf> {
    let Some(ext) = image.extension().and_then(|e| e.to_str()) else {
        return vec![image.with_extension("wld")];
    };
    let ext = ext.to_ascii_lowercase();
    let mut out = Vec::with_capacity(3);
    let chars: Vec<char> = ext.chars().collect();
    if chars.len() >= 2 {
        out.push(image.with_extension(format!("{}{}w", chars[0], chars[chars.len() - 1])));
    }
    out.push(image.with_extension(format!("{ext}w")));
    out.push(image.with_extension("wld"));
    out.dedup();
    out
}

pub fn find_world_file(image: &Path) -> Option<PathBuf> {
    world_file_candidates(image).into_iter().find(|p| p.is_file())
}
