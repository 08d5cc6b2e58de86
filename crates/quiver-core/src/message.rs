//! Marker message types
//!
//! These mirror the visualization marker message used by robot telemetry:
//! a header (frame + stamp), a shape tag, a pose, a scale vector, a color,
//! and an optional list of points. Messages can be loaded from a JSON array
//! or from JSON lines (one marker per line).

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum MessageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse marker on line {line}: {source}")]
    ParseError {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid marker {id}: {reason}")]
    ValidationError { id: MarkerId, reason: String },
}

/// Message timestamp (seconds + nanoseconds)
///
/// A zero stamp means "latest available" when used for transform lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stamp {
    #[serde(default)]
    pub sec: u32,
    #[serde(default)]
    pub nsec: u32,
}

impl Stamp {
    pub const ZERO: Stamp = Stamp { sec: 0, nsec: 0 };

    pub fn new(sec: u32, nsec: u32) -> Self {
        Self { sec, nsec }
    }

    /// Build a stamp from fractional seconds, saturating at zero
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }
        let sec = secs.trunc().min(u32::MAX as f64) as u32;
        let nsec = ((secs.fract() * 1e9).round() as u32).min(999_999_999);
        Self { sec, nsec }
    }

    pub fn is_zero(&self) -> bool {
        self.sec == 0 && self.nsec == 0
    }
}

impl std::fmt::Display for Stamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

/// Message header: coordinate frame and acquisition time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub frame_id: String,
    #[serde(default)]
    pub stamp: Stamp,
}

/// A position in 3D space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_dvec3(self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }
}

/// A direction or per-axis magnitude in 3D space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_dvec3(self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }
}

/// Orientation quaternion (x, y, z, w); defaults to identity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "default_w")]
    pub w: f64,
}

fn default_w() -> f64 {
    1.0
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }

    /// Convert to a unit quaternion
    ///
    /// An all-zero quaternion is treated as identity, which is how
    /// publishers that never fill in the orientation show up on the wire.
    pub fn to_dquat(self) -> DQuat {
        let q = DQuat::from_xyzw(self.x, self.y, self.z, self.w);
        let norm_sq = q.length_squared();
        if norm_sq <= f64::EPSILON {
            debug!("Zero-length orientation quaternion, using identity");
            DQuat::IDENTITY
        } else {
            q / norm_sq.sqrt()
        }
    }
}

impl From<DQuat> for Quaternion {
    fn from(q: DQuat) -> Self {
        Self::new(q.x, q.y, q.z, q.w)
    }
}

/// Position and orientation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    #[serde(default)]
    pub position: Point,
    #[serde(default)]
    pub orientation: Quaternion,
}

/// RGBA color, each channel in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorRgba {
    #[serde(default)]
    pub r: f32,
    #[serde(default)]
    pub g: f32,
    #[serde(default)]
    pub b: f32,
    #[serde(default = "default_alpha")]
    pub a: f32,
}

fn default_alpha() -> f32 {
    1.0
}

impl Default for ColorRgba {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }
}

impl ColorRgba {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Marker shape tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerType {
    #[default]
    Arrow,
    Cube,
    Sphere,
    Cylinder,
    LineStrip,
    LineList,
    CubeList,
    SphereList,
    Points,
    TextViewFacing,
    MeshResource,
    TriangleList,
}

/// Marker identity: namespace plus integer id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerId {
    pub ns: String,
    pub id: i32,
}

impl MarkerId {
    pub fn new(ns: impl Into<String>, id: i32) -> Self {
        Self { ns: ns.into(), id }
    }
}

impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.ns, self.id)
    }
}

/// A single visualization marker message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub ns: String,
    #[serde(default)]
    pub id: i32,
    #[serde(rename = "type", default)]
    pub marker_type: MarkerType,
    #[serde(default)]
    pub pose: Pose,
    #[serde(default = "default_scale")]
    pub scale: Vector3,
    #[serde(default)]
    pub color: ColorRgba,
    /// Endpoints for point-to-point shapes, relative to `pose.position`
    #[serde(default)]
    pub points: Vec<Point>,
}

fn default_scale() -> Vector3 {
    Vector3::new(1.0, 1.0, 1.0)
}

impl Marker {
    /// Create an arrow marker with identity pose and unit scale
    pub fn arrow(ns: impl Into<String>, id: i32, frame_id: impl Into<String>) -> Self {
        Self {
            header: Header {
                frame_id: frame_id.into(),
                stamp: Stamp::ZERO,
            },
            ns: ns.into(),
            id,
            marker_type: MarkerType::Arrow,
            pose: Pose::default(),
            scale: default_scale(),
            color: ColorRgba::default(),
            points: Vec::new(),
        }
    }

    pub fn marker_id(&self) -> MarkerId {
        MarkerId::new(self.ns.clone(), self.id)
    }

    /// Check structural constraints that loaders can reject up front
    pub fn validate(&self) -> Result<(), MessageError> {
        let fail = |reason: &str| MessageError::ValidationError {
            id: self.marker_id(),
            reason: reason.to_string(),
        };
        if self.header.frame_id.trim().is_empty() {
            return Err(fail("empty frame_id"));
        }
        if !self.pose.orientation.is_finite() {
            return Err(fail("non-finite orientation"));
        }
        let q = self.pose.orientation;
        if q.x == 0.0 && q.y == 0.0 && q.z == 0.0 && q.w == 0.0 {
            return Err(fail("zero-length orientation quaternion"));
        }
        Ok(())
    }
}

/// Parse markers from a JSON array or from JSON lines
pub fn parse_markers(content: &str) -> Result<Vec<Marker>, MessageError> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|source| MessageError::ParseError { line: source.line(), source });
    }

    let mut markers = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let marker = serde_json::from_str(line).map_err(|source| MessageError::ParseError {
            line: index + 1,
            source,
        })?;
        markers.push(marker);
    }
    Ok(markers)
}

/// Load markers from a file
pub fn load_markers(path: &Path) -> Result<Vec<Marker>, MessageError> {
    let content = std::fs::read_to_string(path)?;
    let markers = parse_markers(&content)?;
    debug!(path = %path.display(), count = markers.len(), "Loaded markers");
    Ok(markers)
}
