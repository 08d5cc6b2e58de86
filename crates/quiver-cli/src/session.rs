//! Per-identity marker state for one run

use quiver_core::{
    ArrowMarker, ArrowOutcome, ArrowStore, FrameTree, Marker, MarkerContext, MarkerId, MarkerType,
    StatusBoard, StatusLevel, StatusSink,
};
use std::collections::HashMap;
use tracing::warn;

use crate::report::MarkerReport;

/// Arrow markers, their primitives and statuses
#[derive(Debug, Default)]
pub struct Session {
    pub scene: ArrowStore,
    pub status: StatusBoard,
    markers: HashMap<MarkerId, ArrowMarker<ArrowStore>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one message to the marker with its identity
    ///
    /// Returns `None` for non-arrow markers, which are skipped.
    pub fn handle(&mut self, message: &Marker, frames: &FrameTree, fixed_frame: &str) -> Option<MarkerReport> {
        let id = message.marker_id();

        if message.marker_type != MarkerType::Arrow {
            warn!(marker = %id, marker_type = ?message.marker_type, "Skipping non-arrow marker");
            return None;
        }

        let marker = self
            .markers
            .entry(id.clone())
            .or_insert_with(|| ArrowMarker::new(id.clone()));

        let outcome = match message.validate() {
            Ok(()) => {
                let old = marker.message().cloned();
                let mut ctx = MarkerContext {
                    scene: &mut self.scene,
                    transformer: frames,
                    status: &mut self.status,
                    fixed_frame,
                };
                marker.on_new_message(old.as_ref(), message, &mut ctx)
            }
            Err(e) => {
                warn!(marker = %id, "{}", e);
                marker.clear(&mut self.scene);
                self.status
                    .set_marker_status(&id, StatusLevel::Error, &e.to_string());
                ArrowOutcome::Invalid(e.to_string())
            }
        };

        let arrow = marker.handle().and_then(|handle| self.scene.get(handle));
        Some(MarkerReport::new(&id, &outcome, arrow, self.status.get(&id)))
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn visible_count(&self) -> usize {
        self.markers.values().filter(|m| m.is_visible()).count()
    }
}
