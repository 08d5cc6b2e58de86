//! Reference frame tree and point transformation
//!
//! Frames form a forest: every frame has at most one parent at any given
//! time, and each parent link carries a time-indexed history of rigid
//! transforms. Looking up a point walks both frames up to their closest
//! common ancestor and composes the links in between.

use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::message::Stamp;

/// Upper bound on parent links walked for one lookup
const MAX_CHAIN_DEPTH: usize = 1000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Frame [{0}] does not exist")]
    UnknownFrame(String),
    #[error("Frames [{source_frame}] and [{target}] are not connected")]
    NoCommonAncestor { source_frame: String, target: String },
    #[error("Lookup for frame [{frame}] at time {requested} would require extrapolation into the past (earliest data at {earliest})")]
    Extrapolation {
        frame: String,
        requested: Stamp,
        earliest: Stamp,
    },
    #[error("Frame [{0}] has a parent chain that is too long (is there a cycle?)")]
    ChainTooDeep(String),
    #[error("Invalid frame [{frame}]: {reason}")]
    InvalidFrame { frame: String, reason: String },
}

/// Something that can re-express a point in another frame
pub trait PointTransformer {
    /// Transform `point`, given in `source_frame` at `stamp`, into `target_frame`
    fn transform_point(
        &self,
        target_frame: &str,
        source_frame: &str,
        stamp: Stamp,
        point: DVec3,
    ) -> Result<DVec3, TransformError>;

    /// Transform a pose, given in `source_frame` at `stamp`, into `target_frame`
    ///
    /// The rotation is recovered from where the pose's unit axes land, so
    /// only rigid point transforms give a meaningful orientation.
    fn transform_pose(
        &self,
        target_frame: &str,
        source_frame: &str,
        stamp: Stamp,
        position: DVec3,
        orientation: DQuat,
    ) -> Result<(DVec3, DQuat), TransformError> {
        let apply = |point: DVec3| self.transform_point(target_frame, source_frame, stamp, point);
        let origin = apply(position)?;
        let x = apply(position + orientation * DVec3::X)? - origin;
        let y = apply(position + orientation * DVec3::Y)? - origin;

        let rotation = DQuat::from_mat3(&DMat3::from_cols(x, y, x.cross(y))).normalize();
        if !rotation.is_finite() {
            return Err(TransformError::InvalidFrame {
                frame: source_frame.to_string(),
                reason: "transform does not preserve orientation".to_string(),
            });
        }
        Ok((origin, rotation))
    }
}

impl<F> PointTransformer for F
where
    F: Fn(&str, &str, Stamp, DVec3) -> Result<DVec3, TransformError>,
{
    fn transform_point(
        &self,
        target_frame: &str,
        source_frame: &str,
        stamp: Stamp,
        point: DVec3,
    ) -> Result<DVec3, TransformError> {
        self(target_frame, source_frame, stamp, point)
    }
}

/// Rigid transform: rotation followed by translation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Isometry {
    pub translation: DVec3,
    pub rotation: DQuat,
}

impl Default for Isometry {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Isometry {
    pub const IDENTITY: Isometry = Isometry {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    pub fn new(translation: DVec3, rotation: DQuat) -> Self {
        Self {
            translation,
            rotation: rotation.normalize(),
        }
    }

    pub fn from_translation(translation: DVec3) -> Self {
        Self::new(translation, DQuat::IDENTITY)
    }

    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.rotation * point + self.translation
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            translation: -(rotation * self.translation),
            rotation,
        }
    }

    /// `self * other`: apply `other` first, then `self`
    pub fn then_after(&self, other: &Isometry) -> Isometry {
        Isometry {
            translation: self.transform_point(other.translation),
            rotation: self.rotation * other.rotation,
        }
    }
}

/// One parent link sample
#[derive(Debug, Clone, PartialEq)]
struct FrameSample {
    stamp: Stamp,
    parent: String,
    /// Pose of the child frame expressed in the parent frame
    transform: Isometry,
}

/// Time-indexed frame tree
#[derive(Debug, Clone, Default)]
pub struct FrameTree {
    /// Samples per child frame, sorted by stamp
    frames: HashMap<String, Vec<FrameSample>>,
}

impl FrameTree {
    /// Create an empty frame tree
    pub fn new() -> Self {
        Self {
            frames: HashMap::new(),
        }
    }

    /// Record a parent link for `child` valid from `stamp` onward
    ///
    /// A zero stamp marks a static link that applies at all times. A sample
    /// with the same stamp as an existing one replaces it.
    pub fn set_transform(
        &mut self,
        child: &str,
        parent: &str,
        stamp: Stamp,
        transform: Isometry,
    ) -> Result<(), TransformError> {
        if child.is_empty() || parent.is_empty() {
            return Err(TransformError::InvalidFrame {
                frame: child.to_string(),
                reason: "frame names must not be empty".to_string(),
            });
        }
        if child == parent {
            return Err(TransformError::InvalidFrame {
                frame: child.to_string(),
                reason: "frame cannot be its own parent".to_string(),
            });
        }

        let sample = FrameSample {
            stamp,
            parent: parent.to_string(),
            transform,
        };
        let samples = self.frames.entry(child.to_string()).or_default();
        match samples.binary_search_by(|s| s.stamp.cmp(&stamp)) {
            Ok(index) => samples[index] = sample,
            Err(index) => samples.insert(index, sample),
        }
        Ok(())
    }

    /// Record a link that applies at all times
    pub fn set_static_transform(
        &mut self,
        child: &str,
        parent: &str,
        transform: Isometry,
    ) -> Result<(), TransformError> {
        self.set_transform(child, parent, Stamp::ZERO, transform)
    }

    /// Whether a frame is known, either as a child or as somebody's parent
    pub fn has_frame(&self, frame: &str) -> bool {
        self.frames.contains_key(frame)
            || self
                .frames
                .values()
                .flatten()
                .any(|sample| sample.parent == frame)
    }

    /// All known frame names, sorted
    pub fn frame_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .frames
            .iter()
            .flat_map(|(child, samples)| {
                std::iter::once(child.clone()).chain(samples.iter().map(|s| s.parent.clone()))
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Pick the sample of `frame` that applies at `stamp`, if the frame has a parent
    fn sample_at(&self, frame: &str, stamp: Stamp) -> Result<Option<&FrameSample>, TransformError> {
        let Some(samples) = self.frames.get(frame) else {
            return Ok(None);
        };
        if stamp.is_zero() {
            return Ok(samples.last());
        }
        let index = samples.partition_point(|s| s.stamp <= stamp);
        if index == 0 {
            let earliest = samples.first().map(|s| s.stamp).unwrap_or_default();
            return Err(TransformError::Extrapolation {
                frame: frame.to_string(),
                requested: stamp,
                earliest,
            });
        }
        Ok(Some(&samples[index - 1]))
    }

    /// Walk from `frame` to its root, returning each ancestor together with
    /// the pose of `frame` expressed in that ancestor
    fn chain_to_root(&self, frame: &str, stamp: Stamp) -> Result<Vec<(String, Isometry)>, TransformError> {
        let mut chain = vec![(frame.to_string(), Isometry::IDENTITY)];
        let mut current = frame.to_string();
        let mut accumulated = Isometry::IDENTITY;

        while let Some(sample) = self.sample_at(&current, stamp)? {
            if chain.len() > MAX_CHAIN_DEPTH {
                return Err(TransformError::ChainTooDeep(frame.to_string()));
            }
            accumulated = sample.transform.then_after(&accumulated);
            current = sample.parent.clone();
            chain.push((current.clone(), accumulated));
        }
        Ok(chain)
    }

    /// Transform from `source` to `target` at `stamp`
    ///
    /// A frame is always reachable from itself, even if the tree has never
    /// heard of it.
    pub fn lookup(&self, target: &str, source: &str, stamp: Stamp) -> Result<Isometry, TransformError> {
        if target == source {
            return Ok(Isometry::IDENTITY);
        }
        for frame in [target, source] {
            if !self.has_frame(frame) {
                return Err(TransformError::UnknownFrame(frame.to_string()));
            }
        }

        let source_chain = self.chain_to_root(source, stamp)?;
        let target_chain: HashMap<String, Isometry> =
            self.chain_to_root(target, stamp)?.into_iter().collect();

        for (ancestor, source_in_ancestor) in &source_chain {
            if let Some(target_in_ancestor) = target_chain.get(ancestor) {
                return Ok(target_in_ancestor.inverse().then_after(source_in_ancestor));
            }
        }

        Err(TransformError::NoCommonAncestor {
            source_frame: source.to_string(),
            target: target.to_string(),
        })
    }
}

impl PointTransformer for FrameTree {
    fn transform_point(
        &self,
        target_frame: &str,
        source_frame: &str,
        stamp: Stamp,
        point: DVec3,
    ) -> Result<DVec3, TransformError> {
        let transform = self.lookup(target_frame, source_frame, stamp)?;
        Ok(transform.transform_point(point))
    }

    fn transform_pose(
        &self,
        target_frame: &str,
        source_frame: &str,
        stamp: Stamp,
        position: DVec3,
        orientation: DQuat,
    ) -> Result<(DVec3, DQuat), TransformError> {
        let transform = self.lookup(target_frame, source_frame, stamp)?;
        Ok((
            transform.transform_point(position),
            (transform.rotation * orientation).normalize(),
        ))
    }
}
