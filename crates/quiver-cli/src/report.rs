//! Per-message result lines

use quiver_core::{ArrowOutcome, ArrowState, MarkerId, MarkerStatus, StatusLevel};
use serde::Serialize;

/// Result of feeding one message to its arrow marker
#[derive(Debug, Clone, Serialize)]
pub struct MarkerReport {
    pub marker: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrow: Option<ArrowState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub text: String,
}

impl MarkerReport {
    pub fn new(
        id: &MarkerId,
        outcome: &ArrowOutcome,
        arrow: Option<&ArrowState>,
        status: Option<&MarkerStatus>,
    ) -> Self {
        let (name, reason) = match outcome {
            ArrowOutcome::Resolved(_) => ("resolved", None),
            ArrowOutcome::Invalid(reason) => ("invalid", Some(reason.clone())),
            ArrowOutcome::TransformFailed(reason) => ("transform_failed", Some(reason.clone())),
            ArrowOutcome::Degenerate(reason) => ("degenerate", Some(reason.clone())),
        };
        Self {
            marker: id.to_string(),
            outcome: name,
            reason,
            arrow: arrow.cloned(),
            status: status.map(|s| StatusLine {
                level: s.level,
                text: s.text.clone(),
            }),
        }
    }

    /// Human-readable single line
    pub fn to_text(&self) -> String {
        let mut line = format!("[{}] {}", self.marker, self.outcome);
        if let Some(arrow) = &self.arrow {
            let p = arrow.position;
            let d = &arrow.dimensions;
            line.push_str(&format!(
                " at ({:.3}, {:.3}, {:.3}) shaft {:.3}/{:.3} head {:.3}/{:.3}",
                p.x, p.y, p.z, d.shaft_length, d.shaft_radius, d.head_length, d.head_radius
            ));
        }
        if let Some(reason) = &self.reason {
            line.push_str(&format!(": {}", reason));
        }
        if let Some(status) = &self.status {
            line.push_str(&format!(" [{}: {}]", status.level, status.text));
        }
        line
    }
}
