use crate::affine::{AffineTransform, HOMOGENEOUS_TOL};
use crate::raster::PreviewRect;
use serde::{Deserialize, Serialize};

/// Where an aerial sits in the y-down scene: `scene = position + L · local`,
/// with `L` the linear item transform and `local` in display pixels relative
/// to the pixmap centre.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: [f64; 2],
    pub transform: AffineTransform,
}

impl Placement {
    pub fn new(position: [f64; 2], transform: AffineTransform) -> Self {
        Self {
            position,
            transform,
        }
    }

    /// Item-local → scene.
    pub fn scene_transform(&self) -> AffineTransform {
        AffineTransform::from_translation(self.position[0], self.position[1]).compose(&self.transform)
    }

    pub fn map_to_scene(&self, local: [f64; 2]) -> [f64; 2] {
        let p = self.transform.apply(local);
        [p[0] + self.position[0], p[1] + self.position[1]]
    }

    /// The item transform must be purely linear.
    pub fn is_linear(&self) -> bool {
        self.transform.has_identity_right_column(HOMOGENEOUS_TOL)
    }

    /// Compose `local` (acting in item coordinates) under the item transform
    /// and move the resulting translation into `position`.
    pub(crate) fn compose_local(&mut self, local: &AffineTransform) {
        let combined = self.transform.compose(local);
        let origin = combined.translation();
        self.transform = combined.linear_only();
        self.position[0] += origin[0];
        self.position[1] += origin[1];
    }
}

/// Whether the placement may still be changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformState {
    /// Equal to the metadata-derived default.
    Original,
    Changed,
    /// Refuses interaction and automatic georeferencing.
    Locked,
}

/// How much of the aerial's raster is at hand, in increasing order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Missing,
    /// No raster yet, but a directory of candidate previews exists.
    FindPreview,
    Preview,
    Image,
}

/// Raster backing an aerial.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AerialSource {
    #[default]
    Missing,
    FindPreview,
    /// Crop of a scanned film strip.
    Preview(PreviewRect),
    /// The full image with its native size.
    Image { width: usize, height: usize },
}

impl AerialSource {
    pub fn availability(&self) -> Availability {
        match self {
            Self::Missing => Availability::Missing,
            Self::FindPreview => Availability::FindPreview,
            Self::Preview(_) => Availability::Preview,
            Self::Image { .. } => Availability::Image,
        }
    }

    /// Size of the raster as displayed (rotation applied).
    pub fn display_size(&self) -> Option<(usize, usize)> {
        match *self {
            Self::Preview(p) => Some(p.display_size()),
            Self::Image { width, height } => Some((width, height)),
            Self::Missing | Self::FindPreview => None,
        }
    }
}

/// Metadata the default placement is derived from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AerialMeta {
    /// Ground radius covered by the image, in cartesian units.
    pub radius_bild: f64,
    /// Map units per cartesian unit.
    pub scale_cartesian2map: f64,
    /// Scene position of the image centre before any interaction.
    pub origin: [f64; 2],
}

/// Persisted placement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub position: [f64; 2],
    /// Nine row-major entries of the linear item transform.
    pub transform: AffineTransform,
    #[serde(default)]
    pub locked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_local_keeps_right_column_clear() {
        let mut p = Placement::new([10.0, 20.0], AffineTransform::from_scale(2.0));
        let before = p.map_to_scene([3.0, 4.0]);
        let about = AffineTransform::from_translation(3.0, 4.0)
            .compose(&AffineTransform::from_rotation(0.4))
            .compose(&AffineTransform::from_translation(-3.0, -4.0));
        p.compose_local(&about);
        assert!(p.is_linear());
        let after = p.map_to_scene([3.0, 4.0]);
        assert!((before[0] - after[0]).abs() < 1e-9 && (before[1] - after[1]).abs() < 1e-9);
    }

    #[test]
    fn record_json_uses_row_major_array() {
        let record = PlacementRecord {
            position: [1.0, 2.0],
            transform: AffineTransform::from_scale(0.5),
            locked: true,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"position":[1.0,2.0],"transform":[0.5,0.0,0.0,0.0,0.5,0.0,0.0,0.0,1.0],"locked":true}"#
        );
        let back: PlacementRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn availability_is_ordered() {
        assert!(Availability::Image > Availability::Preview);
        assert!(Availability::Preview > Availability::FindPreview);
        assert_eq!(
            AerialSource::Image {
                width: 4,
                height: 3
            }
            .availability(),
            Availability::Image
        );
    }
}
