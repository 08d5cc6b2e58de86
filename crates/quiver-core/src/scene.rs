//! Scene-side arrow primitives
//!
//! [`ArrowScene`] is the mutation interface a renderer exposes for arrow
//! primitives. [`ArrowStore`] keeps the primitives as plain data, which is
//! what the headless CLI prints and what the Bevy plugin mirrors into
//! entities.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::arrow::ArrowDimensions;
use crate::message::{ColorRgba, MarkerId};

/// Renderer interface for arrow primitives
pub trait ArrowScene {
    type Handle: Clone + std::fmt::Debug;

    /// Create a new arrow primitive with default dimensions, owned by `owner`
    fn create_arrow(&mut self, owner: &MarkerId) -> Self::Handle;

    fn destroy_arrow(&mut self, handle: Self::Handle);

    fn set_pose(&mut self, handle: &Self::Handle, position: DVec3, orientation: DQuat);

    fn set_scale(&mut self, handle: &Self::Handle, scale: DVec3);

    fn set_dimensions(&mut self, handle: &Self::Handle, dimensions: ArrowDimensions);

    fn set_color(&mut self, handle: &Self::Handle, color: ColorRgba);

    /// Make the primitive pickable on behalf of `owner`
    fn register_selection(&mut self, _handle: &Self::Handle, _owner: &MarkerId) {}
}

/// Opaque arrow handle issued by [`ArrowStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArrowHandle(pub u64);

impl std::fmt::Display for ArrowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "arrow#{}", self.0)
    }
}

/// Full state of one arrow primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowState {
    pub owner: MarkerId,
    pub position: DVec3,
    pub orientation: DQuat,
    pub scale: DVec3,
    pub dimensions: ArrowDimensions,
    pub color: ColorRgba,
    pub selectable: bool,
    /// Bumped on every mutation
    pub revision: u64,
}

impl ArrowState {
    fn new(owner: MarkerId) -> Self {
        Self {
            owner,
            position: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
            scale: DVec3::ONE,
            dimensions: ArrowDimensions::default(),
            color: ColorRgba::default(),
            selectable: false,
            revision: 0,
        }
    }

    /// World-space tip of the arrow, taking scale into account
    pub fn tip(&self) -> DVec3 {
        let local = DVec3::new(0.0, 0.0, -self.dimensions.total_length()) * self.scale;
        self.position + self.orientation * local
    }
}

/// Headless [`ArrowScene`] that keeps every primitive in memory
#[derive(Debug, Clone, Default)]
pub struct ArrowStore {
    arrows: BTreeMap<ArrowHandle, ArrowState>,
    removed: Vec<ArrowHandle>,
    next_handle: u64,
}

impl ArrowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: &ArrowHandle) -> Option<&ArrowState> {
        self.arrows.get(handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArrowHandle, &ArrowState)> {
        self.arrows.iter()
    }

    pub fn len(&self) -> usize {
        self.arrows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrows.is_empty()
    }

    /// Handles destroyed since the last call
    pub fn drain_removed(&mut self) -> Vec<ArrowHandle> {
        std::mem::take(&mut self.removed)
    }

    fn update(&mut self, handle: &ArrowHandle, apply: impl FnOnce(&mut ArrowState)) {
        if let Some(state) = self.arrows.get_mut(handle) {
            apply(state);
            state.revision += 1;
        } else {
            tracing::debug!(%handle, "Ignoring update for destroyed arrow");
        }
    }
}

impl ArrowScene for ArrowStore {
    type Handle = ArrowHandle;

    fn create_arrow(&mut self, owner: &MarkerId) -> ArrowHandle {
        let handle = ArrowHandle(self.next_handle);
        self.next_handle += 1;
        self.arrows.insert(handle, ArrowState::new(owner.clone()));
        handle
    }

    fn destroy_arrow(&mut self, handle: ArrowHandle) {
        if self.arrows.remove(&handle).is_some() {
            self.removed.push(handle);
        }
    }

    fn set_pose(&mut self, handle: &ArrowHandle, position: DVec3, orientation: DQuat) {
        self.update(handle, |state| {
            state.position = position;
            state.orientation = orientation;
        });
    }

    fn set_scale(&mut self, handle: &ArrowHandle, scale: DVec3) {
        self.update(handle, |state| state.scale = scale);
    }

    fn set_dimensions(&mut self, handle: &ArrowHandle, dimensions: ArrowDimensions) {
        self.update(handle, |state| state.dimensions = dimensions);
    }

    fn set_color(&mut self, handle: &ArrowHandle, color: ColorRgba) {
        self.update(handle, |state| state.color = color);
    }

    fn register_selection(&mut self, handle: &ArrowHandle, owner: &MarkerId) {
        self.update(handle, |state| {
            state.selectable = true;
            state.owner = owner.clone();
        });
    }
}
