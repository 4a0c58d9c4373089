//! Pivot-based bulk retiming of a whole cue track.
//!
//! Both modes are pure: they read a track and return a new one together with
//! a report of what moved and what was removed.

use std::{
    ffi::OsString,
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{codec, Cue, CueSyncError, CueTrack, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RippleMode {
    /// Move the anchor cue and everything after it to a target time.
    Extend,
    /// Pull a later cue (and everything after it) back onto the pivot,
    /// deleting earlier cues it would overlap.
    Reduce,
}

impl fmt::Display for RippleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Extend => f.write_str("extend"),
            Self::Reduce => f.write_str("reduce"),
        }
    }
}

impl FromStr for RippleMode {
    type Err = CueSyncError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "extend" => Ok(Self::Extend),
            "reduce" => Ok(Self::Reduce),
            _ => Err(CueSyncError::InvalidInput(
                "ripple mode must be `extend` or `reduce`",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RippleRequest {
    Extend { pivot: f64, target: f64 },
    Reduce { pivot: f64, source: f64 },
}

impl RippleRequest {
    /// Builds a request from the scripting surface, where `extra` is the
    /// target time for extend and the source time for reduce.
    pub fn new(mode: RippleMode, pivot: f64, extra: f64) -> Self {
        match mode {
            RippleMode::Extend => Self::Extend {
                pivot,
                target: extra,
            },
            RippleMode::Reduce => Self::Reduce {
                pivot,
                source: extra,
            },
        }
    }

    pub fn mode(&self) -> RippleMode {
        match self {
            Self::Extend { .. } => RippleMode::Extend,
            Self::Reduce { .. } => RippleMode::Reduce,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RippleOutcome {
    pub mode: RippleMode,
    /// Retimed track, renumbered `1..=N`.
    pub track: CueTrack,
    /// Index, in the input track, of the anchor (extend) or move cue (reduce).
    pub anchor_index: usize,
    /// Start of that cue before the shift; the normalized pivot for extend.
    pub anchor_start: f64,
    /// Extend: `target - normalized pivot`, added to every shifted cue.
    /// Reduce: `move cue start - pivot`, subtracted from every shifted cue.
    pub shift: f64,
    /// Earlier cues removed because the relocated content would overlap them.
    /// Their ordinals are rewritten to the 1-based position in the input
    /// track, the same numbering the anchor uses.
    pub deleted: Vec<Cue>,
    /// True when the shift broke start order and the output was re-sorted.
    pub reordered: bool,
}

impl fmt::Display for RippleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: anchor cue #{} at {}",
            self.mode,
            self.anchor_index + 1,
            codec::format_timestamp(self.anchor_start)
        )?;
        for cue in &self.deleted {
            writeln!(
                f,
                "deleted cue #{} ({} --> {})",
                cue.ordinal,
                codec::format_timestamp(cue.start),
                codec::format_timestamp(cue.end)
            )?;
        }
        let verb = match self.mode {
            RippleMode::Extend => "shifted by",
            RippleMode::Reduce => "pulled earlier by",
        };
        write!(f, "{verb} {:+.3}s", self.shift)
    }
}

pub fn apply(track: &CueTrack, request: RippleRequest) -> Result<RippleOutcome> {
    match request {
        RippleRequest::Extend { pivot, target } => extend(track, pivot, target),
        RippleRequest::Reduce { pivot, source } => reduce(track, pivot, source),
    }
}

/// Shifts the anchor cue and every cue after it so the anchor starts at
/// `target`.
///
/// The anchor is the first cue containing `pivot`, else the first cue that
/// starts after it. Fails with [`CueSyncError::NotFound`] when there is none.
pub fn extend(track: &CueTrack, pivot: f64, target: f64) -> Result<RippleOutcome> {
    check_time(pivot, "pivot time must be a non-negative number of seconds")?;
    check_time(target, "target time must be a non-negative number of seconds")?;

    let anchor_index = track
        .iter()
        .position(|cue| cue.contains(pivot))
        .or_else(|| track.iter().position(|cue| cue.start > pivot))
        .ok_or_else(|| {
            CueSyncError::NotFound(format!(
                "no cue at or after {}",
                codec::format_timestamp(pivot)
            ))
        })?;

    let anchor_start = track.cues()[anchor_index].start;
    let shift = target - anchor_start;
    tracing::info!(anchor_index, anchor_start, target, shift, "extend");

    let mut cues = track.cues().to_vec();
    for (index, cue) in cues.iter_mut().enumerate().skip(anchor_index) {
        let start = if index == anchor_index { target } else { cue.start + shift };
        let end = cue.end + shift;
        move_cue(cue, start, end);
    }

    Ok(finish(
        RippleMode::Extend,
        cues,
        anchor_index,
        anchor_start,
        shift,
        Vec::new(),
    ))
}

/// Pulls the move cue back so it starts at `pivot`, together with every cue
/// after it.
///
/// The move cue is the first cue with `start <= source < end`, else the first
/// cue starting at or after `source`. Earlier cues that lie in the vacated
/// span (starting at or after the pivot and ending after it) are deleted.
pub fn reduce(track: &CueTrack, pivot: f64, source: f64) -> Result<RippleOutcome> {
    check_time(pivot, "pivot time must be a non-negative number of seconds")?;
    check_time(source, "source time must be a non-negative number of seconds")?;

    let move_index = track
        .iter()
        .position(|cue| cue.start <= source && source < cue.end)
        .or_else(|| track.iter().position(|cue| cue.start >= source))
        .ok_or_else(|| {
            CueSyncError::NotFound(format!(
                "no cue at or after {}",
                codec::format_timestamp(source)
            ))
        })?;

    let anchor_start = track.cues()[move_index].start;
    let shift = anchor_start - pivot;
    tracing::info!(move_index, anchor_start, pivot, shift, "reduce");

    let (earlier, later) = track.cues().split_at(move_index);
    let mut deleted = Vec::new();
    let mut cues = Vec::with_capacity(track.len());

    for (index, cue) in earlier.iter().enumerate() {
        if overlaps_vacated_span(cue, pivot) {
            tracing::warn!(
                position = index + 1,
                start = cue.start,
                end = cue.end,
                "deleting cue overlapped by reduce"
            );
            deleted.push(Cue {
                ordinal: index as u32 + 1,
                ..cue.clone()
            });
        } else {
            cues.push(cue.clone());
        }
    }

    for (offset, cue) in later.iter().enumerate() {
        let mut cue = cue.clone();
        let start = if offset == 0 { pivot } else { cue.start - shift };
        let end = cue.end - shift;
        move_cue(&mut cue, start, end);
        cues.push(cue);
    }

    Ok(finish(
        RippleMode::Reduce,
        cues,
        move_index,
        anchor_start,
        shift,
        deleted,
    ))
}

/// Derived output name: `<name>_adjusted.<ext>` next to the input.
pub fn adjusted_path(input: &Path) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .ok_or(CueSyncError::InvalidInput("cue path has no file name"))?;

    let mut name = OsString::from(stem);
    name.push("_adjusted");
    if let Some(extension) = input.extension() {
        name.push(".");
        name.push(extension);
    }
    Ok(input.with_file_name(name))
}

/// Result of [`adjust_file`].
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustReport {
    pub output: PathBuf,
    pub outcome: RippleOutcome,
    pub skipped_blocks: usize,
}

/// Reads `path`, applies the ripple and writes the result next to it under
/// [`adjusted_path`]. Nothing is written when no anchor is found.
pub fn adjust_file(path: &Path, request: RippleRequest) -> Result<AdjustReport> {
    let parsed = codec::read_file(path)?;
    let outcome = apply(&parsed.track, request)?;
    let output = adjusted_path(path)?;
    codec::write_file(&output, &outcome.track)?;

    Ok(AdjustReport {
        output,
        outcome,
        skipped_blocks: parsed.skipped.len(),
    })
}

fn overlaps_vacated_span(cue: &Cue, pivot: f64) -> bool {
    cue.start >= pivot && cue.end > pivot
}

fn move_cue(cue: &mut Cue, start: f64, end: f64) {
    if start < 0.0 {
        tracing::warn!(ordinal = cue.ordinal, start, "shift moved cue before zero; clamping");
    }
    cue.start = start.max(0.0);
    cue.end = end.max(cue.start);
}

fn finish(
    mode: RippleMode,
    cues: Vec<Cue>,
    anchor_index: usize,
    anchor_start: f64,
    shift: f64,
    deleted: Vec<Cue>,
) -> RippleOutcome {
    let mut track = CueTrack::from_cues(cues);
    let reordered = track.sort_by_start();
    if reordered {
        tracing::warn!(%mode, "shift broke start order; track re-sorted");
    }
    track.renumber();

    RippleOutcome {
        mode,
        track,
        anchor_index,
        anchor_start,
        shift,
        deleted,
        reordered,
    }
}

fn check_time(value: f64, message: &'static str) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CueSyncError::InvalidInput(message))
    }
}
