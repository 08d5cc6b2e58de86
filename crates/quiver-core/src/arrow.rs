//! Arrow geometry resolution
//!
//! Turns an arrow marker message into the pose, scale, and shaft/head
//! dimensions of an arrow primitive. Two modes exist:
//!
//! - **Pose mode** (no points): the arrow sits at `pose`, moved into the
//!   fixed frame, and is scaled by `scale` as a whole.
//! - **Two-point mode** (two or more points): the arrow runs from the first
//!   to the second point, after both are moved into the fixed frame. Here
//!   `scale.x` is the shaft radius, `scale.y` the head radius, and a non-zero
//!   `scale.z` overrides the head length.
//!
//! The arrow mesh points along its local -Z axis.
//!
//! Resolution never fails with an error: invalid input and missing
//! transforms come back as an [`ArrowOutcome`] that tells the caller to
//! hide the arrow.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use tracing::{debug, warn};

use crate::message::{ColorRgba, Marker};
use crate::status::StatusLevel;
use crate::transform::{PointTransformer, TransformError};

/// Head length as a fraction of the arrow length when not overridden
pub const DEFAULT_HEAD_FRACTION: f64 = 0.1;

pub const ONE_POINT_REASON: &str = "only specified one point of a point to point arrow";
pub const ZERO_SCALE_WARNING: &str = "Scale of 0 in one of x/y/z";

/// Shaft and head sizes of an arrow primitive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrowDimensions {
    pub shaft_length: f64,
    pub shaft_radius: f64,
    pub head_length: f64,
    pub head_radius: f64,
}

impl Default for ArrowDimensions {
    fn default() -> Self {
        Self {
            shaft_length: 1.0,
            shaft_radius: 0.1,
            head_length: 0.3,
            head_radius: 0.2,
        }
    }
}

impl ArrowDimensions {
    pub fn total_length(&self) -> f64 {
        self.shaft_length + self.head_length
    }
}

/// Desired state of the arrow after a successful resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedArrow {
    /// Position of the arrow tail in the fixed frame
    pub position: DVec3,
    pub orientation: DQuat,
    /// Whole-arrow scale; `(1, 1, 1)` in two-point mode
    pub scale: DVec3,
    /// Shaft/head sizes; only set in two-point mode
    pub dimensions: Option<ArrowDimensions>,
    pub color: ColorRgba,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrowOutcome {
    /// Malformed message (a single point)
    Invalid(String),
    /// One of the endpoints could not be moved into the fixed frame
    TransformFailed(String),
    /// Coincident endpoints or non-finite numbers
    Degenerate(String),
    Resolved(ResolvedArrow),
}

impl ArrowOutcome {
    pub fn resolved(&self) -> Option<&ResolvedArrow> {
        match self {
            ArrowOutcome::Resolved(arrow) => Some(arrow),
            _ => None,
        }
    }

    /// Whether any previously drawn arrow must be removed
    pub fn should_clear(&self) -> bool {
        !matches!(self, ArrowOutcome::Resolved(_))
    }
}

/// A user-visible message produced while resolving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: StatusLevel,
    pub message: String,
}

impl Diagnostic {
    fn warn(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warn,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            message: message.into(),
        }
    }
}

/// Outcome of resolving one message, with the diagnostics it produced
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub outcome: ArrowOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    fn new(outcome: ArrowOutcome) -> Self {
        Self {
            outcome,
            diagnostics: Vec::new(),
        }
    }

    fn with_diagnostic(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }
}

/// Rotation that turns the mesh's -Z axis onto a pose's +X axis
pub fn pose_axis_correction() -> DQuat {
    DQuat::from_rotation_y(-FRAC_PI_2)
}

/// Resolve an arrow marker into the fixed frame
pub fn resolve<T>(marker: &Marker, fixed_frame: &str, transformer: &T) -> Resolution
where
    T: PointTransformer + ?Sized,
{
    let id = marker.marker_id();

    if marker.points.len() == 1 {
        let text = format!("Arrow marker [{}] {}.", id, ONE_POINT_REASON);
        debug!("{}", text);
        return Resolution::new(ArrowOutcome::Invalid(ONE_POINT_REASON.to_string()))
            .with_diagnostic(Diagnostic::error(text));
    }

    if let Some(reason) = non_finite_field(marker) {
        return degenerate(&id.to_string(), reason);
    }

    if marker.points.is_empty() {
        resolve_pose(marker, fixed_frame, transformer)
    } else {
        resolve_two_point(marker, fixed_frame, transformer)
    }
}

fn resolve_pose<T>(marker: &Marker, fixed_frame: &str, transformer: &T) -> Resolution
where
    T: PointTransformer + ?Sized,
{
    let header = &marker.header;
    let (position, orientation) = match transformer.transform_pose(
        fixed_frame,
        &header.frame_id,
        header.stamp,
        marker.pose.position.to_dvec3(),
        marker.pose.orientation.to_dquat(),
    ) {
        Ok(pose) => pose,
        Err(e) => return transform_failed(marker, fixed_frame, e),
    };
    let scale = marker.scale.to_dvec3();

    let mut resolution = Resolution::new(ArrowOutcome::Resolved(ResolvedArrow {
        position,
        orientation: orientation * pose_axis_correction(),
        scale,
        dimensions: None,
        color: marker.color,
    }));
    if scale.x * scale.y * scale.z == 0.0 {
        resolution = resolution.with_diagnostic(Diagnostic::warn(ZERO_SCALE_WARNING));
    }
    resolution
}

fn resolve_two_point<T>(marker: &Marker, fixed_frame: &str, transformer: &T) -> Resolution
where
    T: PointTransformer + ?Sized,
{
    let origin = marker.pose.position.to_dvec3();
    let header = &marker.header;

    let mut ends = [DVec3::ZERO; 2];
    for (end, point) in ends.iter_mut().zip(&marker.points) {
        match transformer.transform_point(
            fixed_frame,
            &header.frame_id,
            header.stamp,
            point.to_dvec3() + origin,
        ) {
            Ok(transformed) => *end = transformed,
            Err(e) => return transform_failed(marker, fixed_frame, e),
        }
    }

    let [start, end] = ends;
    let direction = end - start;
    let distance = direction.length();
    if !distance.is_finite() || distance <= f64::EPSILON {
        return degenerate(
            &marker.marker_id().to_string(),
            "start and end points coincide",
        );
    }
    let orientation = DQuat::from_rotation_arc(DVec3::NEG_Z, direction / distance);

    let head_length = if marker.scale.z != 0.0 {
        marker.scale.z
    } else {
        DEFAULT_HEAD_FRACTION * distance
    };

    Resolution::new(ArrowOutcome::Resolved(ResolvedArrow {
        position: start,
        orientation,
        scale: DVec3::ONE,
        dimensions: Some(ArrowDimensions {
            shaft_length: distance - head_length,
            shaft_radius: marker.scale.x,
            head_length,
            head_radius: marker.scale.y,
        }),
        color: marker.color,
    }))
}

fn transform_failed(marker: &Marker, fixed_frame: &str, error: TransformError) -> Resolution {
    let reason = format!(
        "Error transforming marker [{}/{}] from frame [{}] to frame [{}]: {}",
        marker.ns, marker.id, marker.header.frame_id, fixed_frame, error
    );
    debug!("{}", reason);
    Resolution::new(ArrowOutcome::TransformFailed(reason))
}

fn non_finite_field(marker: &Marker) -> Option<&'static str> {
    if !marker.scale.to_dvec3().is_finite() {
        return Some("non-finite scale");
    }
    if !marker.pose.position.to_dvec3().is_finite() {
        return Some("non-finite pose");
    }
    // only pose mode reads the orientation
    if marker.points.is_empty() && !marker.pose.orientation.is_finite() {
        return Some("non-finite pose");
    }
    if marker.points.iter().take(2).any(|p| !p.to_dvec3().is_finite()) {
        return Some("non-finite point");
    }
    None
}

fn degenerate(id: &str, reason: &str) -> Resolution {
    warn!(marker = %id, "Degenerate arrow: {}", reason);
    Resolution::new(ArrowOutcome::Degenerate(reason.to_string()))
        .with_diagnostic(Diagnostic::warn(format!("Arrow marker [{}] is degenerate: {}", id, reason)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Point, Quaternion, Stamp, Vector3};
    use crate::transform::{FrameTree, Isometry};
    use std::cell::Cell;

    fn passthrough(_: &str, _: &str, _: Stamp, p: DVec3) -> Result<DVec3, TransformError> {
        Ok(p)
    }

    fn two_point(a: Point, b: Point, scale: Vector3) -> Marker {
        let mut marker = Marker::arrow("test", 1, "map");
        marker.points = vec![a, b];
        marker.scale = scale;
        marker
    }

    fn resolved(resolution: &Resolution) -> &ResolvedArrow {
        resolution
            .outcome
            .resolved()
            .unwrap_or_else(|| panic!("expected resolved arrow, got {:?}", resolution.outcome))
    }

    #[test]
    fn test_single_point_is_invalid() {
        let mut marker = Marker::arrow("goal", 3, "map");
        marker.points = vec![Point::new(1.0, 2.0, 3.0)];
        marker.scale = Vector3::new(f64::NAN, 0.0, 0.0);

        let resolution = resolve(&marker, "map", &passthrough);

        assert_eq!(resolution.outcome, ArrowOutcome::Invalid(ONE_POINT_REASON.to_string()));
        assert!(resolution.outcome.should_clear());
        assert_eq!(resolution.diagnostics.len(), 1);
        assert_eq!(resolution.diagnostics[0].level, StatusLevel::Error);
        assert!(resolution.diagnostics[0].message.contains("[goal/3]"));
    }

    #[test]
    fn test_pose_mode_identity_orientation() {
        let mut marker = Marker::arrow("goal", 1, "map");
        marker.scale = Vector3::new(2.0, 0.5, 0.25);
        marker.pose.position = Point::new(1.0, 2.0, 3.0);

        let resolution = resolve(&marker, "map", &passthrough);
        let arrow = resolved(&resolution);

        let expected = DQuat::from_xyzw(0.0, -std::f64::consts::FRAC_1_SQRT_2, 0.0, std::f64::consts::FRAC_1_SQRT_2);
        assert!(arrow.orientation.abs_diff_eq(expected, 1e-12));
        assert_eq!(arrow.position, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(arrow.scale, DVec3::new(2.0, 0.5, 0.25));
        assert_eq!(arrow.dimensions, None);
        assert!(resolution.diagnostics.is_empty());

        // mesh -Z ends up along the pose's +X
        assert!((arrow.orientation * DVec3::NEG_Z).abs_diff_eq(DVec3::X, 1e-12));
    }

    #[test]
    fn test_pose_mode_follows_pose_orientation() {
        let mut marker = Marker::arrow("goal", 1, "map");
        marker.pose.orientation = Quaternion::from(DQuat::from_rotation_z(FRAC_PI_2));

        let resolution = resolve(&marker, "map", &passthrough);
        let arrow = resolved(&resolution);
        assert!((arrow.orientation * DVec3::NEG_Z).abs_diff_eq(DVec3::Y, 1e-12));
    }

    #[test]
    fn test_pose_mode_moves_into_fixed_frame() {
        let mut tree = FrameTree::new();
        tree.set_static_transform(
            "odom",
            "map",
            Isometry::new(DVec3::new(5.0, 0.0, 0.0), DQuat::from_rotation_z(FRAC_PI_2)),
        )
        .unwrap();
        let mut marker = Marker::arrow("goal", 1, "odom");
        marker.pose.position = Point::new(1.0, 0.0, 0.0);

        let resolution = resolve(&marker, "map", &tree);
        let arrow = resolved(&resolution);
        assert!(arrow.position.abs_diff_eq(DVec3::new(5.0, 1.0, 0.0), 1e-9));
        // pose +X in odom is +Y in map
        assert!((arrow.orientation * DVec3::NEG_Z).abs_diff_eq(DVec3::Y, 1e-9));
    }

    #[test]
    fn test_pose_mode_unknown_frame_fails() {
        let marker = Marker::arrow("goal", 1, "no_such_frame");
        let tree = FrameTree::new();

        let resolution = resolve(&marker, "map", &tree);
        match &resolution.outcome {
            ArrowOutcome::TransformFailed(reason) => assert!(reason.contains("[no_such_frame]")),
            other => panic!("expected transform failure, got {:?}", other),
        }
        assert!(resolution.outcome.should_clear());
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn test_two_point_ignores_non_finite_orientation() {
        let mut marker = two_point(Point::new(0.0, 0.0, 0.0), Point::new(2.0, 0.0, 0.0), Vector3::new(0.1, 0.2, 0.0));
        marker.pose.orientation = Quaternion {
            x: f64::NAN,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        };

        let resolution = resolve(&marker, "map", &passthrough);
        assert!(resolution.outcome.resolved().is_some());

        marker.points.clear();
        let resolution = resolve(&marker, "map", &passthrough);
        assert_eq!(resolution.outcome, ArrowOutcome::Degenerate("non-finite pose".to_string()));
    }

    #[test]
    fn test_zero_scale_warns_but_resolves() {
        let mut marker = Marker::arrow("goal", 1, "map");
        marker.scale = Vector3::new(0.0, 1.0, 1.0);
        marker.color = ColorRgba::new(0.1, 0.2, 0.3, 0.4);

        let resolution = resolve(&marker, "map", &passthrough);
        let arrow = resolved(&resolution);

        assert_eq!(arrow.color, ColorRgba::new(0.1, 0.2, 0.3, 0.4));
        assert_eq!(
            resolution.diagnostics,
            vec![Diagnostic {
                level: StatusLevel::Warn,
                message: ZERO_SCALE_WARNING.to_string(),
            }]
        );
    }

    #[test]
    fn test_two_point_default_head_length() {
        let marker = two_point(Point::new(0.0, 0.0, 0.0), Point::new(10.0, 0.0, 0.0), Vector3::new(0.2, 0.4, 0.0));

        let resolution = resolve(&marker, "map", &passthrough);
        let arrow = resolved(&resolution);
        let dims = arrow.dimensions.unwrap();

        assert!((dims.head_length - 1.0).abs() < 1e-12);
        assert!((dims.shaft_length - 9.0).abs() < 1e-12);
        assert_eq!(dims.shaft_radius, 0.2);
        assert_eq!(dims.head_radius, 0.4);
        assert_eq!(arrow.scale, DVec3::ONE);
        assert_eq!(arrow.position, DVec3::ZERO);
        assert!((arrow.orientation * DVec3::NEG_Z).abs_diff_eq(DVec3::X, 1e-12));
    }

    #[test]
    fn test_two_point_head_length_override() {
        let marker = two_point(Point::new(0.0, 0.0, 0.0), Point::new(10.0, 0.0, 0.0), Vector3::new(0.2, 0.4, 3.0));

        let resolution = resolve(&marker, "map", &passthrough);
        let dims = resolved(&resolution).dimensions.unwrap();

        assert_eq!(dims.head_length, 3.0);
        assert_eq!(dims.shaft_length, 7.0);
    }

    #[test]
    fn test_two_point_negative_shaft_passes_through() {
        let marker = two_point(Point::new(0.0, 0.0, 0.0), Point::new(1.0, 0.0, 0.0), Vector3::new(0.1, 0.2, 3.0));

        let resolution = resolve(&marker, "map", &passthrough);
        assert_eq!(resolved(&resolution).dimensions.unwrap().shaft_length, -2.0);
    }

    #[test]
    fn test_two_point_along_negative_z_is_identity() {
        let marker = two_point(Point::new(0.0, 0.0, 0.0), Point::new(0.0, 0.0, -5.0), Vector3::new(0.1, 0.2, 0.0));

        let resolution = resolve(&marker, "map", &passthrough);
        assert!(resolved(&resolution).orientation.abs_diff_eq(DQuat::IDENTITY, 1e-12));
    }

    #[test]
    fn test_two_point_along_positive_z_flips() {
        let marker = two_point(Point::new(0.0, 0.0, 0.0), Point::new(0.0, 0.0, 2.0), Vector3::new(0.1, 0.2, 0.0));

        let resolution = resolve(&marker, "map", &passthrough);
        let arrow = resolved(&resolution);
        assert!((arrow.orientation * DVec3::NEG_Z).abs_diff_eq(DVec3::Z, 1e-9));
    }

    #[test]
    fn test_two_point_uses_pose_offset_and_transform() {
        let mut marker = two_point(Point::new(1.0, 0.0, 0.0), Point::new(1.0, 4.0, 0.0), Vector3::new(0.1, 0.2, 0.0));
        marker.pose.position = Point::new(0.0, 0.0, 2.0);
        marker.header.frame_id = "odom".to_string();
        marker.header.stamp = Stamp::new(42, 0);

        let shift = |target: &str, source: &str, stamp: Stamp, p: DVec3| -> Result<DVec3, TransformError> {
            assert_eq!(target, "map");
            assert_eq!(source, "odom");
            assert_eq!(stamp, Stamp::new(42, 0));
            Ok(p + DVec3::new(100.0, 0.0, 0.0))
        };

        let resolution = resolve(&marker, "map", &shift);
        let arrow = resolved(&resolution);
        assert_eq!(arrow.position, DVec3::new(101.0, 0.0, 2.0));
        assert!((arrow.dimensions.unwrap().total_length() - 4.0).abs() < 1e-12);
        assert!((arrow.orientation * DVec3::NEG_Z).abs_diff_eq(DVec3::Y, 1e-12));
    }

    #[test]
    fn test_extra_points_are_ignored() {
        let mut marker = two_point(Point::new(0.0, 0.0, 0.0), Point::new(2.0, 0.0, 0.0), Vector3::new(0.1, 0.2, 0.0));
        marker.points.push(Point::new(f64::NAN, 50.0, 50.0));

        let resolution = resolve(&marker, "map", &passthrough);
        assert!((resolved(&resolution).dimensions.unwrap().total_length() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_transform_failure_on_either_point() {
        for failing_call in 0..2 {
            let calls = Cell::new(0);
            let flaky = |_: &str, source: &str, _: Stamp, p: DVec3| -> Result<DVec3, TransformError> {
                let call = calls.get();
                calls.set(call + 1);
                if call == failing_call {
                    Err(TransformError::UnknownFrame(source.to_string()))
                } else {
                    Ok(p)
                }
            };
            let mut marker = two_point(Point::new(0.0, 0.0, 0.0), Point::new(1.0, 0.0, 0.0), Vector3::new(0.1, 0.2, 0.0));
            marker.header.frame_id = "base_link".to_string();

            let resolution = resolve(&marker, "map", &flaky);
            match &resolution.outcome {
                ArrowOutcome::TransformFailed(reason) => {
                    assert!(reason.contains("[test/1]"));
                    assert!(reason.contains("[base_link]"));
                    assert!(reason.contains("[map]"));
                }
                other => panic!("expected transform failure, got {:?}", other),
            }
            assert!(resolution.outcome.should_clear());
            assert!(resolution.diagnostics.is_empty());
        }
    }

    #[test]
    fn test_coincident_points_are_degenerate() {
        let marker = two_point(Point::new(1.0, 1.0, 1.0), Point::new(1.0, 1.0, 1.0), Vector3::new(0.1, 0.2, 0.0));

        let resolution = resolve(&marker, "map", &passthrough);
        assert!(matches!(resolution.outcome, ArrowOutcome::Degenerate(_)));
        assert_eq!(resolution.diagnostics[0].level, StatusLevel::Warn);
    }

    #[test]
    fn test_non_finite_scale_is_degenerate() {
        let mut marker = Marker::arrow("goal", 1, "map");
        marker.scale = Vector3::new(1.0, f64::INFINITY, 1.0);

        let resolution = resolve(&marker, "map", &passthrough);
        assert_eq!(resolution.outcome, ArrowOutcome::Degenerate("non-finite scale".to_string()));
    }

    #[test]
    fn test_color_passthrough_in_two_point_mode() {
        let mut marker = two_point(Point::new(0.0, 0.0, 0.0), Point::new(0.0, 3.0, 0.0), Vector3::new(0.1, 0.2, 0.0));
        marker.color = ColorRgba::new(1.0, 0.5, 0.0, 0.25);

        let resolution = resolve(&marker, "map", &passthrough);
        assert_eq!(resolved(&resolution).color, ColorRgba::new(1.0, 0.5, 0.0, 0.25));
    }
}
