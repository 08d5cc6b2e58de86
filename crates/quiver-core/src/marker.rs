//! Arrow marker: applies resolved geometry to a scene primitive
//!
//! An [`ArrowMarker`] owns at most one arrow primitive. Each new message is
//! resolved first and only then applied, so a failed resolution never
//! leaves a half-updated arrow behind: the primitive is destroyed instead
//! and recreated by the next message that resolves.

use tracing::{debug, trace};

use crate::arrow::{self, ArrowOutcome, ResolvedArrow};
use crate::message::{Marker, MarkerId, MarkerType};
use crate::scene::ArrowScene;
use crate::status::{StatusLevel, StatusSink};
use crate::transform::PointTransformer;

pub const NEGATIVE_SHAFT_WARNING: &str = "Arrow head is longer than the arrow itself";
pub const NEGATIVE_HEAD_WARNING: &str = "Negative arrow head length (scale.z)";

/// Collaborators needed to process one marker message
pub struct MarkerContext<'a, S, T, R>
where
    S: ArrowScene,
    T: PointTransformer + ?Sized,
    R: StatusSink + ?Sized,
{
    pub scene: &'a mut S,
    pub transformer: &'a T,
    pub status: &'a mut R,
    /// Frame all geometry is rendered in
    pub fixed_frame: &'a str,
}

/// A single arrow marker and its scene primitive
#[derive(Debug)]
pub struct ArrowMarker<S: ArrowScene> {
    id: MarkerId,
    arrow: Option<S::Handle>,
    message: Option<Marker>,
}

impl<S: ArrowScene> ArrowMarker<S> {
    pub fn new(id: MarkerId) -> Self {
        Self {
            id,
            arrow: None,
            message: None,
        }
    }

    pub fn id(&self) -> &MarkerId {
        &self.id
    }

    /// Handle of the current primitive, if one is shown
    pub fn handle(&self) -> Option<&S::Handle> {
        self.arrow.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.arrow.is_some()
    }

    /// Last message received
    pub fn message(&self) -> Option<&Marker> {
        self.message.as_ref()
    }

    /// Process a new message for this marker
    ///
    /// `old_message` is the previous message for the same identity, if any.
    /// Geometry is always computed from `new_message` alone.
    pub fn on_new_message<T, R>(
        &mut self,
        old_message: Option<&Marker>,
        new_message: &Marker,
        ctx: &mut MarkerContext<'_, S, T, R>,
    ) -> ArrowOutcome
    where
        T: PointTransformer + ?Sized,
        R: StatusSink + ?Sized,
    {
        debug_assert_eq!(new_message.marker_type, MarkerType::Arrow);
        trace!(
            marker = %self.id,
            replaces = old_message.is_some(),
            "Arrow marker message"
        );

        let resolution = arrow::resolve(new_message, ctx.fixed_frame, ctx.transformer);
        for diagnostic in &resolution.diagnostics {
            ctx.status
                .set_marker_status(&self.id, diagnostic.level, &diagnostic.message);
        }

        match &resolution.outcome {
            ArrowOutcome::Resolved(resolved) => {
                if let Some(warning) = self.apply(resolved, ctx) {
                    ctx.status
                        .set_marker_status(&self.id, StatusLevel::Warn, warning);
                } else if resolution.diagnostics.is_empty() {
                    ctx.status.clear_marker_status(&self.id);
                }
            }
            _ => self.clear(ctx.scene),
        }

        self.message = Some(new_message.clone());
        resolution.outcome
    }

    /// Apply a resolved arrow; returns a warning if a length had to be clamped
    fn apply<T, R>(
        &mut self,
        resolved: &ResolvedArrow,
        ctx: &mut MarkerContext<'_, S, T, R>,
    ) -> Option<&'static str>
    where
        T: PointTransformer + ?Sized,
        R: StatusSink + ?Sized,
    {
        let handle = match &self.arrow {
            Some(handle) => handle.clone(),
            None => {
                let handle = ctx.scene.create_arrow(&self.id);
                ctx.scene.register_selection(&handle, &self.id);
                debug!(marker = %self.id, ?handle, "Created arrow primitive");
                self.arrow = Some(handle.clone());
                handle
            }
        };

        let scene = &mut *ctx.scene;
        scene.set_pose(&handle, resolved.position, resolved.orientation);
        scene.set_scale(&handle, resolved.scale);

        let mut warning = None;
        if let Some(mut dimensions) = resolved.dimensions {
            if dimensions.head_length < 0.0 {
                debug!(
                    marker = %self.id,
                    head_length = dimensions.head_length,
                    "Clamping negative head length"
                );
                dimensions.head_length = 0.0;
                warning = Some(NEGATIVE_HEAD_WARNING);
            }
            if dimensions.shaft_length < 0.0 {
                debug!(
                    marker = %self.id,
                    shaft_length = dimensions.shaft_length,
                    "Clamping negative shaft length"
                );
                dimensions.shaft_length = 0.0;
                warning = Some(NEGATIVE_SHAFT_WARNING);
            }
            scene.set_dimensions(&handle, dimensions);
        }

        scene.set_color(&handle, resolved.color);
        warning
    }

    /// Remove the primitive from the scene, if any
    pub fn clear(&mut self, scene: &mut S) {
        if let Some(handle) = self.arrow.take() {
            debug!(marker = %self.id, ?handle, "Cleared arrow primitive");
            scene.destroy_arrow(handle);
        }
    }
}
