use std::{fmt, ops::Range, path::Path};

use serde::{Deserialize, Serialize};

use crate::{CueSyncError, Result};

/// Minimum and maximum sample value over one envelope step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopePair {
    pub min: i16,
    pub max: i16,
}

/// Min/max amplitude summary of a mono signal, one pair per
/// `1 / visual_rate_hz` seconds. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    visual_rate_hz: u32,
    source_rate: u32,
    sample_count: usize,
    pairs: Vec<EnvelopePair>,
}

impl Envelope {
    pub fn visual_rate_hz(&self) -> u32 {
        self.visual_rate_hz
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    pub fn pairs(&self) -> &[EnvelopePair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Length of the source signal in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.sample_count as f64 / self.source_rate as f64
    }

    /// Start time of the step at `index`.
    pub fn time_of(&self, index: usize) -> f64 {
        index as f64 / self.visual_rate_hz as f64
    }

    /// Step covering `time`, clamped into `[0, len)`. `None` only when the
    /// envelope is empty.
    pub fn index_at(&self, time: f64) -> Option<usize> {
        if self.pairs.is_empty() {
            return None;
        }
        Some(self.raw_index(time).min(self.pairs.len() - 1))
    }

    /// Half-open index range of the steps between `start` and `end`,
    /// clamped to the envelope bounds.
    pub fn range_between(&self, start: f64, end: f64) -> Range<usize> {
        let len = self.pairs.len();
        let first = self.raw_index(start).min(len);
        let last = self.raw_index(end).min(len);
        first..last.max(first)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        tracing::info!(?path, pairs = self.pairs.len(), "wrote envelope cache");
        Ok(())
    }

    pub fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn raw_index(&self, time: f64) -> usize {
        let scaled = (time * self.visual_rate_hz as f64).floor();
        if scaled.is_nan() || scaled <= 0.0 {
            0
        } else {
            scaled as usize
        }
    }
}

/// Reduces `samples` into an envelope in one call.
pub fn build(samples: &[i16], source_rate: u32, visual_rate_hz: u32) -> Result<Envelope> {
    let mut builder = EnvelopeBuilder::new(source_rate, visual_rate_hz)?;
    builder.push(samples);
    Ok(builder.finish())
}

/// Streaming block reducer. Samples may arrive in arbitrarily sized blocks;
/// chunk boundaries depend only on the running sample count, so feeding the
/// same signal in different block sizes yields the same envelope.
pub struct EnvelopeBuilder {
    source_rate: u32,
    visual_rate_hz: u32,
    chunk_size: usize,
    sample_count: usize,
    pending: Option<(EnvelopePair, usize)>,
    pairs: Vec<EnvelopePair>,
}

impl EnvelopeBuilder {
    /// `chunk_size` is `floor(source_rate / visual_rate_hz)`, and never less
    /// than one sample.
    pub fn new(source_rate: u32, visual_rate_hz: u32) -> Result<Self> {
        if source_rate == 0 {
            return Err(CueSyncError::InvalidInput("source sample rate must be positive"));
        }
        if visual_rate_hz == 0 {
            return Err(CueSyncError::InvalidInput("visual rate must be positive"));
        }

        let chunk_size = ((source_rate / visual_rate_hz) as usize).max(1);
        Ok(Self {
            source_rate,
            visual_rate_hz,
            chunk_size,
            sample_count: 0,
            pending: None,
            pairs: Vec::new(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn push(&mut self, samples: &[i16]) {
        for &sample in samples {
            let (pair, filled) = self.pending.get_or_insert((
                EnvelopePair {
                    min: sample,
                    max: sample,
                },
                0,
            ));
            pair.min = pair.min.min(sample);
            pair.max = pair.max.max(sample);
            *filled += 1;

            if *filled == self.chunk_size {
                if let Some((pair, _)) = self.pending.take() {
                    self.pairs.push(pair);
                }
            }
        }
        self.sample_count += samples.len();
    }

    /// Flushes the trailing partial chunk, if any.
    pub fn finish(mut self) -> Envelope {
        if let Some((pair, _)) = self.pending.take() {
            self.pairs.push(pair);
        }
        tracing::debug!(
            samples = self.sample_count,
            pairs = self.pairs.len(),
            chunk_size = self.chunk_size,
            "built envelope"
        );
        Envelope {
            visual_rate_hz: self.visual_rate_hz,
            source_rate: self.source_rate,
            sample_count: self.sample_count,
            pairs: self.pairs,
        }
    }
}

impl fmt::Debug for EnvelopeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeBuilder")
            .field("source_rate", &self.source_rate)
            .field("visual_rate_hz", &self.visual_rate_hz)
            .field("chunk_size", &self.chunk_size)
            .field("sample_count", &self.sample_count)
            .field("pairs", &self.pairs.len())
            .finish()
    }
}
