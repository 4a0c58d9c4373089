//! Single-owner editor state driven by a cooperative polling loop.
//!
//! Each tick samples the transport, resolves the active cue and, when asked,
//! composes a [`TimelineFrame`] for the renderer. Pointer events retime the
//! selected cue through the [`MarkerEditor`].

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread::JoinHandle,
};

use crate::{
    codec, playback, ripple, Cue, CueSyncError, CueTrack, Decoder, EngineConfig, Envelope,
    EnvelopeLoader, MarkerCommit, MarkerEditor, MarkerKind, PlaybackResolver, Result,
    RippleOutcome, RippleRequest, SelectionChanged, TimelineFrame, TimelineMapper, Transport,
};

/// What one polling step observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub time: f64,
    pub playing: bool,
    pub selection_changed: Option<SelectionChanged>,
}

pub struct EditorSession<T: Transport> {
    config: EngineConfig,
    mapper: TimelineMapper,
    transport: T,
    envelope: EnvelopeLoader,
    track: CueTrack,
    cue_path: Option<PathBuf>,
    selected: Option<usize>,
    resolver: PlaybackResolver,
    markers: MarkerEditor,
}

impl<T: Transport> EditorSession<T> {
    pub fn new(config: EngineConfig, transport: T, decoder: Arc<dyn Decoder>) -> Result<Self> {
        config.validate()?;
        let mapper = TimelineMapper::from_config(&config.timeline)?;
        let envelope = EnvelopeLoader::new(decoder, config.envelope.visual_rate_hz);
        let markers = MarkerEditor::from_config(&config.markers);

        Ok(Self {
            config,
            mapper,
            transport,
            envelope,
            track: CueTrack::new(),
            cue_path: None,
            selected: None,
            resolver: PlaybackResolver::new(),
            markers,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn track(&self) -> &CueTrack {
        &self.track
    }

    pub fn cue_path(&self) -> Option<&Path> {
        self.cue_path.as_deref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_cue(&self) -> Option<&Cue> {
        self.selected.and_then(|index| self.track.get(index))
    }

    pub fn current_time(&self) -> f64 {
        self.transport.current_position_seconds()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    /// Loads a cue file, discarding the current track. Returns the number of
    /// blocks that were skipped while parsing.
    pub fn load_cues(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let parsed = codec::read_file(path)?;
        self.replace_track(parsed.track);
        self.cue_path = Some(path.to_path_buf());
        Ok(parsed.skipped.len())
    }

    /// Installs a new track and selects its first cue.
    pub fn replace_track(&mut self, track: CueTrack) {
        self.track = track;
        self.markers.cancel();
        self.select(if self.track.is_empty() { None } else { Some(0) });
    }

    pub fn save_cues(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        codec::write_file(path, &self.track)?;
        self.track.renumber();
        self.cue_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Hands the file to the transport and starts building its envelope in
    /// the background. The previous envelope is dropped immediately.
    pub fn load_audio(&mut self, path: impl AsRef<Path>) -> Result<JoinHandle<()>> {
        let path = path.as_ref();
        self.transport.load(path)?;
        self.envelope.load(path)
    }

    pub fn envelope(&self) -> Result<Option<Arc<Envelope>>> {
        self.envelope.envelope()
    }

    pub fn take_envelope_error(&self) -> Result<Option<CueSyncError>> {
        self.envelope.take_error()
    }

    pub fn select_next(&mut self) -> Option<usize> {
        let next = match self.selected {
            Some(index) if index + 1 < self.track.len() => Some(index + 1),
            other => other,
        };
        self.select(next);
        self.selected
    }

    pub fn select_previous(&mut self) -> Option<usize> {
        let previous = self.selected.map(|index| index.saturating_sub(1));
        self.select(previous);
        self.selected
    }

    /// Selects by 1-based ordinal, clamped into `1..=len`.
    pub fn select_ordinal(&mut self, ordinal: i64) -> Option<usize> {
        if self.track.is_empty() {
            return None;
        }
        let clamped = ordinal.clamp(1, self.track.len() as i64);
        self.select(Some(clamped as usize - 1));
        self.selected
    }

    /// Selects the cue playing at `time`, clearing the selection when `time`
    /// falls in a gap.
    pub fn select_at(&mut self, time: f64) -> Option<usize> {
        self.select(playback::resolve(&self.track, time));
        self.selected
    }

    /// Starts playback at the selected cue, or at the current position when
    /// there is nothing to select. Returns the start time.
    pub fn play_selected(&mut self) -> Result<f64> {
        let from = match self.selected_cue() {
            Some(cue) => cue.start,
            None => self.current_time(),
        };
        self.transport.play(from)?;
        tracing::info!(from, selected = ?self.selected, "playback started");
        Ok(from)
    }

    pub fn pause(&mut self) {
        self.transport.pause();
        tracing::info!(at = self.current_time(), "playback paused");
    }

    pub fn set_selected_text(&mut self, text: impl Into<String>) -> Result<()> {
        let index = self
            .selected
            .ok_or_else(|| CueSyncError::msg("no cue selected"))?;
        self.track.set_text(index, text)
    }

    /// One polling step. Selection follows playback only while playing.
    pub fn tick(&mut self) -> TickOutcome {
        let time = self.transport.current_position_seconds();
        let playing = self.transport.is_playing();
        let selection_changed = self.resolver.observe(&self.track, time, playing);
        if let Some(change) = selection_changed {
            self.selected = Some(change.current);
        }
        TickOutcome {
            time,
            playing,
            selection_changed,
        }
    }

    pub fn pointer_down(&mut self, pointer_y: f64, height: f64) -> Option<MarkerKind> {
        let viewport = self.mapper.viewport(self.current_time(), height);
        self.markers
            .pointer_down(&self.track, self.selected, pointer_y, &viewport)
    }

    pub fn pointer_move(&mut self, pointer_y: f64, height: f64) -> Option<f64> {
        let viewport = self.mapper.viewport(self.current_time(), height);
        self.markers.pointer_move(pointer_y, &viewport)
    }

    pub fn pointer_up(&mut self) -> Result<Option<MarkerCommit>> {
        self.markers.pointer_up(&mut self.track)
    }

    /// Replaces the track with the ripple result. On `NotFound` the track is
    /// left untouched and the error is returned for reporting.
    pub fn apply_ripple(&mut self, request: RippleRequest) -> Result<RippleOutcome> {
        let outcome = ripple::apply(&self.track, request)?;
        let selected = self
            .selected
            .map(|index| index.min(outcome.track.len().saturating_sub(1)))
            .filter(|_| !outcome.track.is_empty());
        self.track = outcome.track.clone();
        self.markers.cancel();
        self.select(selected);
        Ok(outcome)
    }

    /// Render geometry for the current tick. While a marker is dragged its
    /// preview time replaces the stored boundary.
    pub fn frame(&self, height: f64) -> Result<TimelineFrame> {
        let envelope = self.envelope()?;
        let mut selected = self.selected_cue().cloned();
        if let (Some(cue), Some((index, marker, candidate))) =
            (selected.as_mut(), self.markers.preview())
        {
            if Some(index) == self.selected {
                match marker {
                    MarkerKind::Start => cue.start = candidate,
                    MarkerKind::End => cue.end = candidate,
                }
            }
        }

        Ok(TimelineFrame::compose(
            &self.mapper,
            self.current_time(),
            height,
            envelope.as_deref(),
            selected.as_ref(),
        ))
    }

    fn select(&mut self, index: Option<usize>) {
        if self.selected != index {
            tracing::debug!(?index, "selection changed");
        }
        self.selected = index;
        self.resolver.set_active(index);
    }
}

impl<T: Transport> std::fmt::Debug for EditorSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("cues", &self.track.len())
            .field("cue_path", &self.cue_path)
            .field("selected", &self.selected)
            .field("markers", &self.markers.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawPcmDecoder, RippleMode, SimulatedTransport};

    const CUES: &str = "1\n00:00:01,000 --> 00:00:03,000\nHello\n\n2\n00:00:05,000 --> 00:00:07,000\nWorld\n\n3\n00:00:08,000 --> 00:00:09,000\nAgain\n\n";

    fn session() -> EditorSession<SimulatedTransport> {
        let mut config = EngineConfig::default();
        // 32 s over 256 px: 8 px per second.
        config.timeline.visible_duration_seconds = 32.0;
        let mut session = EditorSession::new(
            config,
            SimulatedTransport::new(),
            Arc::new(RawPcmDecoder::new(8_000)),
        )
        .unwrap();
        session.replace_track(codec::parse(CUES).unwrap());
        session
    }

    #[test]
    fn navigation_clamps_to_track_bounds() {
        let mut session = session();
        assert_eq!(session.selected(), Some(0));
        assert_eq!(session.select_previous(), Some(0));
        assert_eq!(session.select_next(), Some(1));
        assert_eq!(session.select_next(), Some(2));
        assert_eq!(session.select_next(), Some(2));
        assert_eq!(session.select_ordinal(0), Some(0));
        assert_eq!(session.select_ordinal(99), Some(2));

        session.replace_track(CueTrack::new());
        assert_eq!(session.selected(), None);
        assert_eq!(session.select_ordinal(1), None);
    }

    #[test]
    fn playback_ticks_follow_active_cue() {
        let mut session = session();
        session.select_ordinal(2);
        assert_eq!(session.play_selected().unwrap(), 5.0);

        // Already selected, so entering cue 2 is not announced again.
        assert_eq!(session.tick().selection_changed, None);

        let interval = session.config().playback.poll_interval().as_secs_f64();
        let mut changes = Vec::new();
        for _ in 0..150 {
            session.transport_mut().advance(interval);
            if let Some(change) = session.tick().selection_changed {
                changes.push(change.current);
            }
        }
        assert_eq!(changes, vec![2]);
        assert_eq!(session.selected(), Some(2));
    }

    #[test]
    fn selecting_a_gap_lets_playback_announce_the_next_cue() {
        let mut session = session();
        assert_eq!(session.select_at(4.0), None);
        assert_eq!(session.select_at(6.0), Some(1));
        assert_eq!(session.select_at(0.5), None);

        session.transport_mut().play(0.5).unwrap();
        session.transport_mut().advance(0.75);
        let change = session.tick().selection_changed.unwrap();
        assert_eq!(change.previous, None);
        assert_eq!(change.current, 0);
    }

    #[test]
    fn paused_ticks_keep_selection() {
        let mut session = session();
        session.play_selected().unwrap();
        session.pause();
        session.select_ordinal(3);

        let outcome = session.tick();
        assert!(!outcome.playing);
        assert_eq!(outcome.time, 1.0);
        assert_eq!(session.selected(), Some(2));
    }

    #[test]
    fn pointer_drag_retimes_selected_cue() {
        let mut session = session();
        // Paused at 16 s: the window spans 0..32 s.
        session.transport_mut().play(16.0).unwrap();
        session.pause();

        assert_eq!(session.pointer_down(9.0, 256.0), Some(MarkerKind::Start));
        assert_eq!(session.pointer_move(4.0, 256.0), Some(0.5));
        assert_eq!(session.frame(256.0).unwrap().start_marker_y, Some(4.0));
        assert_eq!(session.track().get(0).unwrap().start, 1.0);

        let commit = session.pointer_up().unwrap().unwrap();
        assert_eq!(commit.committed, 0.5);
        assert_eq!(session.track().get(0).unwrap().start, 0.5);
        assert_eq!(session.frame(256.0).unwrap().start_marker_y, Some(4.0));
    }

    #[test]
    fn ripple_replaces_track_and_keeps_selection_in_range() {
        let mut session = session();
        session.select_ordinal(3);

        let outcome = session
            .apply_ripple(RippleRequest::new(RippleMode::Reduce, 2.0, 8.0))
            .unwrap();
        assert_eq!(outcome.deleted.len(), 1);
        assert_eq!(session.track().len(), 2);
        assert_eq!(session.selected(), Some(1));
        assert_eq!(session.selected_cue().unwrap().start, 2.0);

        let missed = session.apply_ripple(RippleRequest::new(RippleMode::Extend, 50.0, 60.0));
        assert!(missed.unwrap_err().is_not_found());
        assert_eq!(session.track().len(), 2);
    }

    #[test]
    fn edits_text_and_saves_renumbered_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.srt");
        let mut session = session();
        session.select_next();
        session.set_selected_text("Brave\nnew world").unwrap();
        session.save_cues(&path).unwrap();

        let mut reloaded = self::session();
        assert_eq!(reloaded.load_cues(&path).unwrap(), 0);
        assert_eq!(reloaded.track().get(1).unwrap().text, "Brave\nnew world");
        assert_eq!(reloaded.cue_path(), Some(path.as_path()));
    }

    #[test]
    fn loads_audio_envelope_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("speech.pcm");
        let bytes: Vec<u8> = (0..16_000i32)
            .flat_map(|i| (((i % 64) - 32) as i16 * 100).to_le_bytes())
            .collect();
        std::fs::write(&audio, bytes).unwrap();

        let mut session = session();
        session.load_audio(&audio).unwrap().join().unwrap();
        assert_eq!(session.transport().loaded(), Some(audio.as_path()));

        let envelope = session.envelope().unwrap().unwrap();
        assert_eq!(envelope.len(), 200);
        let frame = session.frame(256.0).unwrap();
        // Window -16..16 s, audio covers 0..2 s.
        assert_eq!(frame.rows.len(), 200);
        assert_eq!(frame.rows[0].y, 128.0);
    }
}
