use serde::{Deserialize, Serialize};

use crate::{config::MarkerConfig, CueSyncError, CueTrack, Result, Viewport};

/// Which boundary of a cue a drag retimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerKind {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        marker: MarkerKind,
        cue_index: usize,
        /// Live preview time; not yet written to the track.
        candidate: f64,
    },
}

/// A boundary change written into the track on release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerCommit {
    pub cue_index: usize,
    pub marker: MarkerKind,
    /// Time under the pointer when it was released.
    pub requested: f64,
    /// Time stored after clamping to `0 <= start <= end`.
    pub committed: f64,
}

impl MarkerCommit {
    pub fn was_clamped(&self) -> bool {
        self.requested != self.committed
    }
}

/// Pointer-driven editor for the start/end boundary of the selected cue.
///
/// `pointer_down` may enter `Dragging`, `pointer_move` only updates the
/// preview, and `pointer_up` is the single point where the track is mutated.
#[derive(Debug, Clone)]
pub struct MarkerEditor {
    tolerance_px: f64,
    state: DragState,
}

impl MarkerEditor {
    pub fn new(tolerance_px: f64) -> Self {
        Self {
            tolerance_px: tolerance_px.max(0.0),
            state: DragState::Idle,
        }
    }

    pub fn from_config(config: &MarkerConfig) -> Self {
        Self::new(config.hit_tolerance_px)
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Current drag target and its preview time.
    pub fn preview(&self) -> Option<(usize, MarkerKind, f64)> {
        match self.state {
            DragState::Idle => None,
            DragState::Dragging {
                marker,
                cue_index,
                candidate,
            } => Some((cue_index, marker, candidate)),
        }
    }

    /// Starts a drag when `pointer_y` lies within the tolerance of the
    /// selected cue's start or end marker. When both qualify the start
    /// marker wins.
    pub fn pointer_down(
        &mut self,
        track: &CueTrack,
        selected: Option<usize>,
        pointer_y: f64,
        viewport: &Viewport,
    ) -> Option<MarkerKind> {
        if self.is_dragging() {
            tracing::debug!("pointer down ignored while a drag is active");
            return None;
        }

        let cue_index = selected?;
        let cue = track.get(cue_index)?;

        let near = |time: f64| (pointer_y - viewport.time_to_y(time)).abs() <= self.tolerance_px;
        let (marker, candidate) = if near(cue.start) {
            (MarkerKind::Start, cue.start)
        } else if near(cue.end) {
            (MarkerKind::End, cue.end)
        } else {
            return None;
        };

        tracing::debug!(cue_index, ?marker, "marker drag started");
        self.state = DragState::Dragging {
            marker,
            cue_index,
            candidate,
        };
        Some(marker)
    }

    /// Updates the preview time. Returns it while a drag is active.
    pub fn pointer_move(&mut self, pointer_y: f64, viewport: &Viewport) -> Option<f64> {
        match &mut self.state {
            DragState::Idle => None,
            DragState::Dragging { candidate, .. } => {
                *candidate = viewport.y_to_time(pointer_y);
                Some(*candidate)
            }
        }
    }

    /// Ends the drag and commits the preview time into the track.
    pub fn pointer_up(&mut self, track: &mut CueTrack) -> Result<Option<MarkerCommit>> {
        let DragState::Dragging {
            marker,
            cue_index,
            candidate,
        } = std::mem::replace(&mut self.state, DragState::Idle)
        else {
            return Ok(None);
        };

        let committed = match marker {
            MarkerKind::Start => track.retime_start(cue_index, candidate),
            MarkerKind::End => track.retime_end(cue_index, candidate),
        }
        .map_err(|_| {
            CueSyncError::msg(format!(
                "cue {cue_index} disappeared while its marker was being dragged"
            ))
        })?;

        let commit = MarkerCommit {
            cue_index,
            marker,
            requested: candidate,
            committed,
        };
        if commit.was_clamped() {
            tracing::warn!(cue_index, ?marker, requested = candidate, committed, "marker clamped");
        } else {
            tracing::debug!(cue_index, ?marker, committed, "marker committed");
        }
        Ok(Some(commit))
    }

    /// Abandons the drag without touching the track.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

impl Default for MarkerEditor {
    fn default() -> Self {
        Self::from_config(&MarkerConfig::default())
    }
}
