//! Core library for the Cue Sync subtitle timing engine.
//!
//! Each module owns one piece of the timeline synchronization pipeline: the
//! cue model and its text codec, waveform envelope generation, time to pixel
//! mapping, marker dragging, playback-driven cue resolution and ripple
//! retiming. [`EditorSession`] wires them together behind injected audio
//! collaborators ([`Decoder`], [`Transport`]).

pub mod audio;
pub mod codec;
pub mod config;
pub mod cue;
pub mod envelope;
pub mod error;
pub mod marker;
pub mod playback;
pub mod ripple;
pub mod session;
pub mod timeline;

pub use audio::{
    Decoder, EnvelopeLoader, PcmAudio, RawPcmDecoder, SimulatedTransport, Transport, WavDecoder,
};
pub use codec::{ParsedCues, SkippedBlock};
pub use config::{EngineConfig, EnvelopeConfig, MarkerConfig, PlaybackConfig, TimelineConfig};
pub use cue::{Cue, CueTrack};
pub use envelope::{Envelope, EnvelopeBuilder, EnvelopePair};
pub use error::{CueSyncError, Result};
pub use marker::{DragState, MarkerCommit, MarkerEditor, MarkerKind};
pub use playback::{PlaybackResolver, SelectionChanged};
pub use ripple::{AdjustReport, RippleMode, RippleOutcome, RippleRequest};
pub use session::{EditorSession, TickOutcome};
pub use timeline::{EnvelopeRow, TimelineFrame, TimelineMapper, Viewport};
