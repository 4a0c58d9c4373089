use crate::{Cue, CueTrack};

/// Index of the first cue, in sequence order, with `start <= time <= end`.
pub fn resolve(track: &CueTrack, time: f64) -> Option<usize> {
    track.iter().position(|cue| cue.contains(time))
}

pub fn resolve_cue(track: &CueTrack, time: f64) -> Option<&Cue> {
    resolve(track, time).and_then(|index| track.get(index))
}

/// Emitted when playback moves the active cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionChanged {
    pub previous: Option<usize>,
    pub current: usize,
}

/// Tracks the active cue across polling ticks.
///
/// The selection is sticky: ticks while paused, and ticks that land in a gap
/// between cues, leave it untouched.
#[derive(Debug, Clone, Default)]
pub struct PlaybackResolver {
    active: Option<usize>,
}

impl PlaybackResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Syncs the resolver with a selection made outside of playback
    /// (navigation, file load) so it is not re-announced on the next tick.
    pub fn set_active(&mut self, active: Option<usize>) {
        self.active = active;
    }

    pub fn observe(
        &mut self,
        track: &CueTrack,
        time: f64,
        playing: bool,
    ) -> Option<SelectionChanged> {
        if !playing {
            return None;
        }

        let current = resolve(track, time)?;
        if self.active == Some(current) {
            return None;
        }

        let change = SelectionChanged {
            previous: self.active.replace(current),
            current,
        };
        tracing::debug!(
            time,
            previous = ?change.previous,
            current = change.current,
            "active cue changed"
        );
        Some(change)
    }
}
