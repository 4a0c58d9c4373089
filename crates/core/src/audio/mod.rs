//! Seams to the audio collaborators the engine does not own: the decoder that
//! turns a file into mono PCM, and the transport that plays it back.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
    thread::{self, JoinHandle},
};

use crate::{envelope, CueSyncError, Envelope, Result};

/// Mono 16-bit PCM produced by a [`Decoder`].
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl PcmAudio {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Synchronously turns a file into mono PCM.
pub trait Decoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<PcmAudio>;
}

/// Playback device contract. `current_position_seconds` reports the last
/// known offset while paused or stopped, not zero.
pub trait Transport {
    fn load(&mut self, path: &Path) -> Result<()>;
    fn play(&mut self, from_seconds: f64) -> Result<()>;
    fn pause(&mut self);
    fn is_playing(&self) -> bool;
    fn current_position_seconds(&self) -> f64;
}

/// Decodes WAV files of any channel count and sample format, averaging the
/// channels down to mono.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl Decoder for WavDecoder {
    fn decode(&self, path: &Path) -> Result<PcmAudio> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 * scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let samples = interleaved
            .chunks(channels)
            .map(|frame| {
                let mono = frame.iter().sum::<f32>() / frame.len() as f32;
                (mono * i16::MAX as f32).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            ?path,
            channels,
            sample_rate = spec.sample_rate,
            frames = samples.len(),
            "decoded wav"
        );
        Ok(PcmAudio {
            samples,
            sample_rate: spec.sample_rate,
        })
    }
}

/// Reads headerless little-endian signed 16-bit mono PCM at a known rate,
/// the normalized stream an external converter produces.
#[derive(Debug, Clone, Copy)]
pub struct RawPcmDecoder {
    pub sample_rate: u32,
}

impl RawPcmDecoder {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl Decoder for RawPcmDecoder {
    fn decode(&self, path: &Path) -> Result<PcmAudio> {
        if self.sample_rate == 0 {
            return Err(CueSyncError::InvalidInput("raw PCM sample rate must be positive"));
        }
        let bytes = fs::read(path)?;
        if bytes.len() % 2 != 0 {
            tracing::warn!(?path, "raw PCM has a trailing odd byte; ignoring it");
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(PcmAudio {
            samples,
            sample_rate: self.sample_rate,
        })
    }
}

/// Deterministic transport driven by explicit clock advances instead of an
/// audio device.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport {
    loaded: Option<PathBuf>,
    position: f64,
    playing: bool,
    duration: Option<f64>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops playback automatically once `duration` is reached.
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration: Some(duration.max(0.0)),
            ..Self::default()
        }
    }

    pub fn loaded(&self) -> Option<&Path> {
        self.loaded.as_deref()
    }

    /// Moves the clock forward while playing.
    pub fn advance(&mut self, delta_seconds: f64) {
        if !self.playing {
            return;
        }
        self.position = (self.position + delta_seconds).max(0.0);
        if let Some(duration) = self.duration {
            if self.position >= duration {
                self.position = duration;
                self.playing = false;
            }
        }
    }
}

impl Transport for SimulatedTransport {
    fn load(&mut self, path: &Path) -> Result<()> {
        self.loaded = Some(path.to_path_buf());
        self.position = 0.0;
        self.playing = false;
        Ok(())
    }

    fn play(&mut self, from_seconds: f64) -> Result<()> {
        if !from_seconds.is_finite() {
            return Err(CueSyncError::Transport(format!(
                "cannot start playback at {from_seconds}"
            )));
        }
        self.position = from_seconds.max(0.0);
        self.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn current_position_seconds(&self) -> f64 {
        self.position
    }
}

/// Slot the envelope worker publishes into. A load bumps the generation so
/// results of superseded loads are dropped instead of published.
#[derive(Debug, Default)]
struct EnvelopeSlot {
    generation: u64,
    envelope: Option<Arc<Envelope>>,
    error: Option<String>,
}

/// Builds envelopes off the polling loop and hands them back atomically.
#[derive(Clone)]
pub struct EnvelopeLoader {
    decoder: Arc<dyn Decoder>,
    visual_rate_hz: u32,
    slot: Arc<Mutex<EnvelopeSlot>>,
}

impl EnvelopeLoader {
    pub fn new(decoder: Arc<dyn Decoder>, visual_rate_hz: u32) -> Self {
        Self {
            decoder,
            visual_rate_hz,
            slot: Arc::new(Mutex::new(EnvelopeSlot::default())),
        }
    }

    /// Discards the current envelope and starts decoding `path` on a worker
    /// thread.
    pub fn load(&self, path: impl Into<PathBuf>) -> Result<JoinHandle<()>> {
        let path = path.into();
        let generation = {
            let mut slot = self.lock()?;
            slot.generation += 1;
            slot.envelope = None;
            slot.error = None;
            slot.generation
        };

        let decoder = Arc::clone(&self.decoder);
        let shared = Arc::clone(&self.slot);
        let visual_rate_hz = self.visual_rate_hz;

        let handle = thread::Builder::new()
            .name("envelope-loader".to_string())
            .spawn(move || {
                let outcome = decoder.decode(&path).and_then(|pcm| {
                    envelope::build(&pcm.samples, pcm.sample_rate, visual_rate_hz)
                });

                let Ok(mut slot) = shared.lock() else {
                    tracing::error!("envelope slot poisoned; dropping result");
                    return;
                };
                if slot.generation != generation {
                    tracing::debug!(?path, "discarding superseded envelope");
                    return;
                }
                match outcome {
                    Ok(envelope) => {
                        tracing::info!(?path, pairs = envelope.len(), "envelope ready");
                        slot.envelope = Some(Arc::new(envelope));
                    }
                    Err(err) => {
                        tracing::error!(?path, %err, "envelope build failed");
                        slot.error = Some(err.to_string());
                    }
                }
            })?;
        Ok(handle)
    }

    /// The envelope of the most recent load, once it is ready.
    pub fn envelope(&self) -> Result<Option<Arc<Envelope>>> {
        Ok(self.lock()?.envelope.clone())
    }

    /// Failure of the most recent load, reported as an opaque decode error.
    pub fn take_error(&self) -> Result<Option<CueSyncError>> {
        Ok(self.lock()?.error.take().map(CueSyncError::Decode))
    }

    fn lock(&self) -> Result<MutexGuard<'_, EnvelopeSlot>> {
        self.slot
            .lock()
            .map_err(|_| CueSyncError::msg("envelope slot has been poisoned"))
    }
}

impl std::fmt::Debug for EnvelopeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeLoader")
            .field("visual_rate_hz", &self.visual_rate_hz)
            .finish()
    }
}
