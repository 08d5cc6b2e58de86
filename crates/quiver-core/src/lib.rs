//! Quiver Core - Marker messages, frame tree, and arrow resolution
//!
//! This crate provides the foundational pieces for drawing arrow markers:
//! - Marker message types and JSON loading
//! - A time-indexed reference frame tree for point transforms
//! - Arrow geometry resolution (pose mode and two-point mode)
//! - Per-marker status reporting
//! - The arrow marker that applies resolved geometry to a scene

pub mod arrow;
pub mod marker;
pub mod message;
pub mod scene;
pub mod status;
pub mod transform;

pub use arrow::{resolve, ArrowDimensions, ArrowOutcome, Diagnostic, Resolution, ResolvedArrow};
pub use marker::{ArrowMarker, MarkerContext};
pub use message::{ColorRgba, Marker, MarkerId, MarkerType, MessageError, Pose, Stamp};
pub use scene::{ArrowHandle, ArrowScene, ArrowState, ArrowStore};
pub use status::{MarkerStatus, StatusBoard, StatusLevel, StatusSink};
pub use transform::{FrameTree, Isometry, PointTransformer, TransformError};
