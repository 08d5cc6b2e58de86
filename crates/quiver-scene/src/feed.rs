//! Incoming marker messages
//!
//! Producers push decoded markers into [`MarkerFeed`]; once per frame they
//! are handed to the arrow marker owning their identity, which updates
//! [`MarkerArrows`].

use bevy::prelude::*;
use quiver_core::{
    ArrowMarker, ArrowStore, FrameTree, Marker, MarkerContext, MarkerId, MarkerType, StatusBoard,
};
use std::collections::HashMap;

use crate::arrows::MarkerArrows;

/// Pending markers plus the frame data needed to place them
#[derive(Resource, Debug, Clone)]
pub struct MarkerFeed {
    pub fixed_frame: String,
    pub frames: FrameTree,
    pub pending: Vec<Marker>,
}

impl Default for MarkerFeed {
    fn default() -> Self {
        Self {
            fixed_frame: "map".to_string(),
            frames: FrameTree::new(),
            pending: Vec::new(),
        }
    }
}

impl MarkerFeed {
    pub fn push(&mut self, marker: Marker) {
        self.pending.push(marker);
    }
}

/// Marker status table shown to the user
#[derive(Resource, Default, Deref, DerefMut)]
pub struct MarkerStatuses(pub StatusBoard);

/// Hand pending messages to their arrow markers
pub fn process_marker_feed(
    mut feed: ResMut<MarkerFeed>,
    mut arrows: ResMut<MarkerArrows>,
    mut statuses: ResMut<MarkerStatuses>,
    mut markers: Local<HashMap<MarkerId, ArrowMarker<ArrowStore>>>,
) {
    let pending = std::mem::take(&mut feed.pending);
    for message in pending {
        if message.marker_type != MarkerType::Arrow {
            tracing::warn!(
                marker = %message.marker_id(),
                marker_type = ?message.marker_type,
                "Skipping non-arrow marker"
            );
            continue;
        }

        let id = message.marker_id();
        let marker = markers
            .entry(id.clone())
            .or_insert_with(|| ArrowMarker::new(id));
        let old = marker.message().cloned();
        let mut ctx = MarkerContext {
            scene: &mut arrows.0,
            transformer: &feed.frames,
            status: &mut statuses.0,
            fixed_frame: &feed.fixed_frame,
        };
        marker.on_new_message(old.as_ref(), &message, &mut ctx);
    }
}
