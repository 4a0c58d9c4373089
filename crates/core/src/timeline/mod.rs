//! Time to pixel mapping for a vertical, scrolling timeline.
//!
//! Time runs downwards. The window is `visible_duration` seconds tall and is
//! centered on the playback position, so the playhead always sits at half the
//! viewport height.

use serde::{Deserialize, Serialize};

use crate::{config::TimelineConfig, Cue, CueSyncError, Envelope, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineMapper {
    visible_duration: f64,
}

impl TimelineMapper {
    pub fn new(visible_duration: f64) -> Result<Self> {
        if !(visible_duration > 0.0) || !visible_duration.is_finite() {
            return Err(CueSyncError::InvalidInput("visible duration must be positive"));
        }
        Ok(Self { visible_duration })
    }

    pub fn from_config(config: &TimelineConfig) -> Result<Self> {
        Self::new(config.visible_duration_seconds)
    }

    pub fn visible_duration(&self) -> f64 {
        self.visible_duration
    }

    /// Captures the mapping for one render tick.
    pub fn viewport(&self, current_time: f64, height: f64) -> Viewport {
        Viewport {
            window_start: current_time - self.visible_duration / 2.0,
            visible_duration: self.visible_duration,
            height,
        }
    }
}

impl Default for TimelineMapper {
    fn default() -> Self {
        Self {
            visible_duration: TimelineConfig::default().visible_duration_seconds,
        }
    }
}

/// Mapping valid for a single `(current_time, height)` sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    window_start: f64,
    visible_duration: f64,
    height: f64,
}

impl Viewport {
    pub fn window_start(&self) -> f64 {
        self.window_start
    }

    pub fn window_end(&self) -> f64 {
        self.window_start + self.visible_duration
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn time_to_y(&self, time: f64) -> f64 {
        (time - self.window_start) / self.visible_duration * self.height
    }

    /// Inverse of [`Viewport::time_to_y`]. A zero-height viewport maps every
    /// row to the window start.
    pub fn y_to_time(&self, y: f64) -> f64 {
        if self.height <= 0.0 {
            return self.window_start;
        }
        y / self.height * self.visible_duration + self.window_start
    }

    pub fn contains_y(&self, y: f64) -> bool {
        (0.0..=self.height).contains(&y)
    }

    /// Y of `time` if it falls inside the viewport.
    pub fn visible_y(&self, time: f64) -> Option<f64> {
        let y = self.time_to_y(time);
        self.contains_y(y).then_some(y)
    }
}

/// One horizontal waveform stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeRow {
    pub y: f64,
    pub min: i16,
    pub max: i16,
}

/// Everything an external renderer needs to draw one tick of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineFrame {
    pub current_time: f64,
    pub window_start: f64,
    pub window_end: f64,
    pub height: f64,
    pub playhead_y: f64,
    pub rows: Vec<EnvelopeRow>,
    pub start_marker_y: Option<f64>,
    pub end_marker_y: Option<f64>,
}

impl TimelineFrame {
    /// Projects the visible envelope steps and the selected cue's markers.
    /// Markers outside the viewport are omitted.
    pub fn compose(
        mapper: &TimelineMapper,
        current_time: f64,
        height: f64,
        envelope: Option<&Envelope>,
        selected: Option<&Cue>,
    ) -> Self {
        let viewport = mapper.viewport(current_time, height);

        let rows = envelope
            .map(|envelope| {
                let range = envelope.range_between(viewport.window_start(), viewport.window_end());
                envelope.pairs()[range.clone()]
                    .iter()
                    .zip(range)
                    .map(|(pair, index)| EnvelopeRow {
                        y: viewport.time_to_y(envelope.time_of(index)),
                        min: pair.min,
                        max: pair.max,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            current_time,
            window_start: viewport.window_start(),
            window_end: viewport.window_end(),
            height,
            playhead_y: viewport.time_to_y(current_time),
            rows,
            start_marker_y: selected.and_then(|cue| viewport.visible_y(cue.start)),
            end_marker_y: selected.and_then(|cue| viewport.visible_y(cue.end)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope;

    #[test]
    fn centers_window_on_current_time() {
        let mapper = TimelineMapper::default();
        let viewport = mapper.viewport(40.0, 600.0);

        assert_eq!(viewport.window_start(), 25.0);
        assert_eq!(viewport.window_end(), 55.0);
        assert_eq!(viewport.time_to_y(40.0), 300.0);
        assert_eq!(viewport.time_to_y(25.0), 0.0);
        assert_eq!(viewport.time_to_y(55.0), 600.0);
    }

    #[test]
    fn y_to_time_inverts_time_to_y() {
        let mapper = TimelineMapper::new(12.0).unwrap();
        for current in [0.0, 3.3, 120.75] {
            let viewport = mapper.viewport(current, 480.0);
            for time in [-4.0, 0.0, current, current + 5.5] {
                let back = viewport.y_to_time(viewport.time_to_y(time));
                assert!((back - time).abs() < 1e-9, "{time} -> {back}");
            }
        }
    }

    #[test]
    fn window_may_start_before_zero() {
        let viewport = TimelineMapper::default().viewport(0.0, 300.0);
        assert_eq!(viewport.window_start(), -15.0);
        assert_eq!(viewport.y_to_time(0.0), -15.0);
        assert_eq!(viewport.visible_y(-20.0), None);
        assert_eq!(viewport.visible_y(0.0), Some(150.0));
    }

    #[test]
    fn rejects_non_positive_duration() {
        assert!(TimelineMapper::new(0.0).is_err());
        assert!(TimelineMapper::new(f64::NAN).is_err());
    }

    #[test]
    fn composes_rows_and_markers_for_visible_span() {
        // 4 seconds of audio at 100 steps per second.
        let samples: Vec<i16> = (0..32_000).map(|i| (i % 200) as i16 - 100).collect();
        let envelope = envelope::build(&samples, 8_000, 100).unwrap();
        let mapper = TimelineMapper::new(2.0).unwrap();
        let cue = Cue::new(1, 1.5, 9.0, "x");

        let frame = TimelineFrame::compose(&mapper, 1.0, 200.0, Some(&envelope), Some(&cue));

        assert_eq!(frame.window_start, 0.0);
        assert_eq!(frame.playhead_y, 100.0);
        assert_eq!(frame.rows.len(), 200);
        assert_eq!(frame.rows[0].y, 0.0);
        assert!(frame.rows.iter().all(|row| row.min <= row.max));
        assert_eq!(frame.start_marker_y, Some(150.0));
        assert_eq!(frame.end_marker_y, None);
    }

    #[test]
    fn composes_without_envelope_or_selection() {
        let frame = TimelineFrame::compose(&TimelineMapper::default(), 5.0, 100.0, None, None);
        assert!(frame.rows.is_empty());
        assert_eq!(frame.start_marker_y, None);
        assert_eq!(frame.playhead_y, 50.0);
    }
}
