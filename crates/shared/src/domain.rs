use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_CONFIDENCE: f64 = 0.0;
pub const MAX_CONFIDENCE: f64 = 100.0;

/// Face bounding box reported by the recognition service as `[x, y, w, h]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceLocation(pub [f64; 4]);

impl FaceLocation {
    pub fn x(&self) -> f64 {
        self.0[0]
    }

    pub fn y(&self) -> f64 {
        self.0[1]
    }

    pub fn width(&self) -> f64 {
        self.0[2]
    }

    pub fn height(&self) -> f64 {
        self.0[3]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub confidence: f64,
    pub face_location: FaceLocation,
}

impl FaceMatch {
    /// Image address to render for this match; the service may omit `url`.
    pub fn display_url(&self) -> &str {
        self.url.as_deref().unwrap_or(&self.filename)
    }

    pub fn has_valid_confidence(&self) -> bool {
        self.confidence.is_finite()
            && (MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&self.confidence)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryPhoto {
    pub filename: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_time: Option<DateTime<Utc>>,
}

impl GalleryPhoto {
    pub fn from_url(filename: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
            size: None,
            view_url: None,
            upload_time: None,
        }
    }
}
