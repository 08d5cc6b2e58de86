//! Quiver Scene - Bevy rendering of arrow markers
//!
//! Arrow markers pushed into [`MarkerFeed`] are resolved against its frame
//! tree and drawn as shaft + head meshes under a posed root entity.

pub mod arrows;
pub mod feed;

use bevy::prelude::*;

/// Plugin that resolves queued arrow markers and renders them
pub struct ArrowMarkerPlugin;

impl Plugin for ArrowMarkerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<feed::MarkerFeed>()
            .init_resource::<feed::MarkerStatuses>()
            .init_resource::<arrows::MarkerArrows>()
            .add_systems(Startup, arrows::setup_arrow_meshes)
            .add_systems(
                Update,
                (feed::process_marker_feed, arrows::sync_arrow_entities).chain(),
            );
    }
}

// Re-export commonly used types
pub use arrows::{ArrowEntity, ArrowHead, ArrowShaft, MarkerArrows};
pub use feed::{MarkerFeed, MarkerStatuses};
