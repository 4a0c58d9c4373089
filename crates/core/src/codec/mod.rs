//! Reader and writer for the sequential cue text format:
//!
//! ```text
//! 1
//! 00:00:01,000 --> 00:00:03,000
//! Hello
//!
//! ```
//!
//! Ordinals found in a file are validated but never trusted; [`serialize`]
//! always writes `1..=N` in sequence order.
//!
//! A blank line ends a block, so blank lines inside cue text (and empty text)
//! are written with a leading [`BLANK_LINE_MARK`] and restored on read.

use std::{borrow::Cow, fmt::Write as _, path::Path, sync::OnceLock};

use regex::{Captures, Regex};

use crate::{Cue, CueSyncError, CueTrack, Result};

const MILLIS_PER_HOUR: u64 = 3_600_000;
const MILLIS_PER_MINUTE: u64 = 60_000;
/// Absorbs binary representation error so that a parsed `,001` formats back
/// as `,001` instead of truncating to `,000`.
const TRUNCATION_EPSILON_MS: f64 = 1e-6;
/// Zero-width space prefixed to text lines that would otherwise read as a
/// block separator.
pub const BLANK_LINE_MARK: char = '\u{200b}';

/// A block that was dropped while parsing without aborting the parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBlock {
    /// 1-based line on which the block starts.
    pub line: usize,
    pub reason: String,
}

/// Outcome of a lenient parse: the cues plus every block that was skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCues {
    pub track: CueTrack,
    pub skipped: Vec<SkippedBlock>,
}

/// Parses cue text, logging skipped blocks and discarding their diagnostics.
pub fn parse(text: &str) -> Result<CueTrack> {
    Ok(parse_detailed(text)?.track)
}

/// Parses cue text.
///
/// Blocks with fewer than three lines or a non-integer ordinal are skipped
/// and reported in [`ParsedCues::skipped`]. A malformed time-range line aborts
/// the whole parse with [`CueSyncError::Format`].
pub fn parse_detailed(text: &str) -> Result<ParsedCues> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut parsed = ParsedCues::default();

    for block in split_blocks(text) {
        if block.lines.len() < 3 {
            skip(
                &mut parsed,
                block.first_line,
                format!("expected at least 3 lines, found {}", block.lines.len()),
            );
            continue;
        }

        let ordinal_line = block.lines[0].trim();
        let ordinal = match ordinal_line.parse::<u32>() {
            Ok(ordinal) => ordinal,
            Err(_) => {
                skip(
                    &mut parsed,
                    block.first_line,
                    format!("ordinal `{ordinal_line}` is not an integer"),
                );
                continue;
            }
        };

        let (start, end) = parse_time_range(block.lines[1])
            .ok_or_else(|| {
                CueSyncError::format(
                    block.first_line + 1,
                    format!(
                        "expected `HH:MM:SS,mmm --> HH:MM:SS,mmm`, found `{}`",
                        block.lines[1].trim()
                    ),
                )
            })?;

        let text = block.lines[2..]
            .iter()
            .map(|line| unescape_text_line(line))
            .collect::<Vec<_>>()
            .join("\n");
        parsed.track.push(Cue::new(ordinal, start, end, text));
    }

    tracing::debug!(
        cues = parsed.track.len(),
        skipped = parsed.skipped.len(),
        "parsed cue text"
    );
    Ok(parsed)
}

/// Serializes a track, renumbering ordinals `1..=N` in sequence order.
pub fn serialize(track: &CueTrack) -> String {
    let mut out = String::new();
    for (index, cue) in track.iter().enumerate() {
        let _ = write!(
            out,
            "{}\n{} --> {}\n",
            index + 1,
            format_timestamp(cue.start),
            format_timestamp(cue.end),
        );
        for line in cue.text.split('\n') {
            out.push_str(&escape_text_line(line));
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

fn needs_mark(line: &str) -> bool {
    line.trim_start_matches(BLANK_LINE_MARK).trim().is_empty()
}

fn escape_text_line(line: &str) -> Cow<'_, str> {
    if needs_mark(line) {
        Cow::Owned(format!("{BLANK_LINE_MARK}{line}"))
    } else {
        Cow::Borrowed(line)
    }
}

fn unescape_text_line(line: &str) -> &str {
    match line.strip_prefix(BLANK_LINE_MARK) {
        Some(rest) if needs_mark(rest) => rest,
        _ => line,
    }
}

pub fn read_file(path: impl AsRef<Path>) -> Result<ParsedCues> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let parsed = parse_detailed(&text)?;
    tracing::info!(?path, cues = parsed.track.len(), "loaded cue file");
    Ok(parsed)
}

pub fn write_file(path: impl AsRef<Path>, track: &CueTrack) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, serialize(track))?;
    tracing::info!(?path, cues = track.len(), "saved cue file");
    Ok(())
}

/// Formats seconds as `HH:MM:SS,mmm`. Milliseconds are truncated, hours are
/// not capped at 24, negative input formats as zero.
pub fn format_timestamp(seconds: f64) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0 + TRUNCATION_EPSILON_MS).floor() as u64
    } else {
        0
    };
    let hours = total_ms / MILLIS_PER_HOUR;
    let minutes = (total_ms % MILLIS_PER_HOUR) / MILLIS_PER_MINUTE;
    let secs = (total_ms % MILLIS_PER_MINUTE) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

/// Parses a timestamp argument. Accepts `HH:MM:SS,mmm`, `HH:MM:SS.mmm`,
/// `HH:MM:SS` and plain decimal seconds such as `4.5`.
pub fn parse_timestamp(input: &str) -> Result<f64> {
    let input = input.trim();
    if let Some(captures) = argument_regex().captures(input) {
        return argument_seconds(&captures).ok_or_else(|| {
            CueSyncError::format(0, format!("timestamp `{input}` is out of range"))
        });
    }

    match input.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(seconds),
        _ => Err(CueSyncError::format(
            0,
            format!("`{input}` is not a timestamp (expected HH:MM:SS,mmm or seconds)"),
        )),
    }
}

/// Transport label in `MM:SS.cc` form; minutes keep counting past 59.
pub fn format_clock(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    let hundredths = ((seconds * 100.0) % 100.0).floor() as u64;
    format!("{minutes:02}:{secs:02}.{hundredths:02}")
}

fn parse_time_range(line: &str) -> Option<(f64, f64)> {
    let captures = range_regex().captures(line)?;
    let field = |index: usize| -> Option<u64> { captures.get(index)?.as_str().parse().ok() };
    let start = to_seconds(field(1)?, field(2)?, field(3)?, field(4)?)?;
    let end = to_seconds(field(5)?, field(6)?, field(7)?, field(8)?)?;
    Some((start, end))
}

/// Missing optional fields count as zero; fields too large for `u64` fail.
fn argument_seconds(captures: &Captures<'_>) -> Option<f64> {
    let field = |index: usize| match captures.get(index) {
        Some(m) => m.as_str().parse::<u64>().ok(),
        None => Some(0),
    };
    to_seconds(field(1)?, field(2)?, field(3)?, field(4)?)
}

/// `None` when the hour field overflows.
fn to_seconds(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Option<f64> {
    let whole = hours
        .checked_mul(3600)?
        .checked_add(minutes * 60)?
        .checked_add(seconds)?;
    Some(whole as f64 + millis as f64 / 1000.0)
}

fn range_regex() -> &'static Regex {
    static RANGE: OnceLock<Regex> = OnceLock::new();
    RANGE.get_or_init(|| {
        Regex::new(r"^\s*(\d+):(\d{2}):(\d{2}),(\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2}),(\d{3})\s*$")
            .expect("time range pattern is valid")
    })
}

fn argument_regex() -> &'static Regex {
    static ARGUMENT: OnceLock<Regex> = OnceLock::new();
    ARGUMENT.get_or_init(|| {
        Regex::new(r"^(\d+):(\d{2}):(\d{2})(?:[,.](\d{3}))?$")
            .expect("timestamp pattern is valid")
    })
}

struct RawBlock<'a> {
    first_line: usize,
    lines: Vec<&'a str>,
}

fn split_blocks(text: &str) -> Vec<RawBlock<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<RawBlock<'_>> = None;

    for (index, line) in text.lines().enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            continue;
        }
        current
            .get_or_insert_with(|| RawBlock {
                first_line: index + 1,
                lines: Vec::new(),
            })
            .lines
            .push(line);
    }

    if let Some(block) = current {
        blocks.push(block);
    }
    blocks
}

fn skip(parsed: &mut ParsedCues, line: usize, reason: String) {
    tracing::warn!(line, %reason, "skipping cue block");
    parsed.skipped.push(SkippedBlock { line, reason });
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\n00:00:01,000 --> 00:00:03,000\nHello\n\n2\n00:00:05,000 --> 00:00:07,000\nWorld\n\n";

    #[test]
    fn parses_blocks_and_multiline_text() {
        let text = "3\n00:00:01,250 --> 00:00:02,500\nfirst line\nsecond line\n\n\n\n9\n01:02:03,004 --> 01:02:04,000\nnext\n";
        let track = parse(text).unwrap();

        assert_eq!(track.len(), 2);
        let first = track.get(0).unwrap();
        assert_eq!(first.ordinal, 3);
        assert_eq!(first.start, 1.25);
        assert_eq!(first.end, 2.5);
        assert_eq!(first.text, "first line\nsecond line");

        let second = track.get(1).unwrap();
        assert_eq!(second.start, 3723.004);
        assert_eq!(second.text, "next");
    }

    #[test]
    fn skips_bad_ordinals_and_short_blocks() {
        let text = "x\n00:00:01,000 --> 00:00:02,000\nbad ordinal\n\n2\n00:00:03,000 --> 00:00:04,000\n\n3\n00:00:05,000 --> 00:00:06,000\nkept\n";
        let parsed = parse_detailed(text).unwrap();

        assert_eq!(parsed.track.len(), 1);
        assert_eq!(parsed.track.get(0).unwrap().text, "kept");
        assert_eq!(parsed.skipped.len(), 2);
        assert_eq!(parsed.skipped[0].line, 1);
        assert!(parsed.skipped[0].reason.contains("ordinal"));
        assert_eq!(parsed.skipped[1].line, 5);
    }

    #[test]
    fn malformed_time_line_aborts_parse() {
        let text = "1\n00:00:01,000 --> 00:00:02,000\nok\n\n2\n00:00:03.000 -> 00:00:04,000\nbroken\n";
        match parse(text).unwrap_err() {
            CueSyncError::Format { line, .. } => assert_eq!(line, 6),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tolerates_crlf_bom_and_trailing_blank_lines() {
        let text = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,000\r\nhi\r\n\r\n\r\n";
        let track = parse(text).unwrap();
        assert_eq!(track.len(), 1);
        assert_eq!(track.get(0).unwrap().text, "hi");
    }

    #[test]
    fn accepts_hours_beyond_a_day() {
        let track = parse("1\n123:00:00,000 --> 123:00:01,500\nlong\n").unwrap();
        assert_eq!(track.get(0).unwrap().start, 442_800.0);
        assert_eq!(serialize(&track), "1\n123:00:00,000 --> 123:00:01,500\nlong\n\n");
    }

    #[test]
    fn serialize_renumbers_in_sequence_order() {
        let track = CueTrack::from_cues(vec![
            Cue::new(4, 0.0, 1.0, "a"),
            Cue::new(4, 2.0, 3.0, "b\nc"),
        ]);
        assert_eq!(
            serialize(&track),
            "1\n00:00:00,000 --> 00:00:01,000\na\n\n2\n00:00:02,000 --> 00:00:03,000\nb\nc\n\n"
        );
    }

    #[test]
    fn round_trip_preserves_times_and_text() {
        let original = parse(SAMPLE).unwrap();
        let reparsed = parse(&serialize(&original)).unwrap();
        assert_eq!(reparsed, original);

        // Every millisecond value in a second survives the trip.
        let cues = (0..1000)
            .map(|ms| {
                let start = 7.0 + ms as f64 / 1000.0;
                Cue::new(ms + 1, start, start + 0.001 * ms as f64, format!("cue {ms}"))
            })
            .collect();
        let mut track = CueTrack::from_cues(cues);
        let once = parse(&serialize(&track)).unwrap();
        track.renumber();
        let twice = parse(&serialize(&once)).unwrap();
        assert_eq!(once, twice);
        for (a, b) in once.iter().zip(track.iter()) {
            assert_eq!(format_timestamp(a.start), format_timestamp(b.start));
            assert_eq!(format_timestamp(a.end), format_timestamp(b.end));
        }
    }

    #[test]
    fn empty_and_multi_paragraph_text_survive_round_trip() {
        let track = CueTrack::from_cues(vec![
            Cue::new(1, 1.0, 2.0, ""),
            Cue::new(2, 3.0, 4.0, "para one\n\npara two"),
            Cue::new(3, 5.0, 6.0, "tail\n   "),
            Cue::new(4, 7.0, 8.0, "\u{200b}"),
        ]);

        let text = serialize(&track);
        let parsed = parse_detailed(&text).unwrap();
        assert!(parsed.skipped.is_empty(), "{:?}", parsed.skipped);
        assert_eq!(parsed.track, track);
        assert_eq!(serialize(&parsed.track), text);
    }

    #[test]
    fn visible_text_is_written_unchanged() {
        let track = CueTrack::from_cues(vec![Cue::new(1, 0.0, 1.0, "  indented\nplain")]);
        assert_eq!(
            serialize(&track),
            "1\n00:00:00,000 --> 00:00:01,000\n  indented\nplain\n\n"
        );
    }

    #[test]
    fn oversized_hours_are_format_errors() {
        let text = "1\n99999999999999999:00:00,000 --> 99999999999999999:00:01,000\nhuge\n";
        match parse(text).unwrap_err() {
            CueSyncError::Format { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }

        assert!(matches!(
            parse_timestamp("99999999999999999999:00:00"),
            Err(CueSyncError::Format { .. })
        ));
        assert!(parse_timestamp("99999999999999999:00:00").is_err());
        assert_eq!(parse_timestamp("1000000:00:00").unwrap(), 3_600_000_000.0);
    }

    #[test]
    fn formats_by_truncating_milliseconds() {
        assert_eq!(format_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_timestamp(1.0019), "00:00:01,001");
        assert_eq!(format_timestamp(59.9999), "00:00:59,999");
        assert_eq!(format_timestamp(3661.5), "01:01:01,500");
        assert_eq!(format_timestamp(-2.0), "00:00:00,000");
    }

    #[test]
    fn parses_timestamp_arguments() {
        assert_eq!(parse_timestamp("00:00:04,000").unwrap(), 4.0);
        assert_eq!(parse_timestamp("00:01:02.500").unwrap(), 62.5);
        assert_eq!(parse_timestamp("01:00:00").unwrap(), 3600.0);
        assert_eq!(parse_timestamp("2.5").unwrap(), 2.5);
        assert!(parse_timestamp("-1").is_err());
        assert!(parse_timestamp("soon").is_err());
    }

    #[test]
    fn formats_transport_clock() {
        assert_eq!(format_clock(0.0), "00:00.00");
        assert_eq!(format_clock(75.25), "01:15.25");
        assert_eq!(format_clock(3600.0), "60:00.00");
    }

    #[test]
    fn reads_and_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.srt");
        std::fs::write(&path, SAMPLE).unwrap();

        let parsed = read_file(&path).unwrap();
        let out = dir.path().join("out.srt");
        write_file(&out, &parsed.track).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), SAMPLE);

        let missing = read_file(dir.path().join("missing.srt")).unwrap_err();
        assert!(matches!(missing, CueSyncError::Io(_)));
    }
}
