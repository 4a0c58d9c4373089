use serde::{Deserialize, Serialize};

use crate::{CueSyncError, Result};

/// One timed subtitle entry. Times are seconds from the start of the audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub ordinal: u32,
    pub start: f64,
    pub end: f64,
    /// May contain embedded line breaks.
    pub text: String,
}

impl Cue {
    pub fn new(ordinal: u32, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            ordinal,
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Closed-interval containment, `start <= time <= end`.
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    /// Moves the start boundary, clamped to `0 <= start <= end`. Returns the
    /// value actually stored.
    pub fn set_start_clamped(&mut self, time: f64) -> f64 {
        self.start = time.max(0.0).min(self.end);
        self.start
    }

    /// Moves the end boundary, clamped to `end >= start` (and so `end >= 0`).
    pub fn set_end_clamped(&mut self, time: f64) -> f64 {
        self.end = time.max(0.0).max(self.start);
        self.end
    }
}

/// Ordered collection of cues; the single source of truth of an editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CueTrack {
    cues: Vec<Cue>,
}

impl CueTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the cues as given. Ordinals are kept until the next
    /// [`CueTrack::renumber`].
    pub fn from_cues(cues: Vec<Cue>) -> Self {
        Self { cues }
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cue> {
        self.cues.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Cue> {
        self.cues.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Cue> {
        self.cues.get_mut(index)
    }

    pub fn push(&mut self, cue: Cue) {
        self.cues.push(cue);
    }

    pub fn into_cues(self) -> Vec<Cue> {
        self.cues
    }

    /// Rewrites ordinals as `1..=N` in sequence order.
    pub fn renumber(&mut self) {
        for (index, cue) in self.cues.iter_mut().enumerate() {
            cue.ordinal = index as u32 + 1;
        }
    }

    pub fn is_sorted_by_start(&self) -> bool {
        self.cues.windows(2).all(|pair| pair[0].start <= pair[1].start)
    }

    /// Stable sort by start time. Returns true if the order changed.
    pub fn sort_by_start(&mut self) -> bool {
        if self.is_sorted_by_start() {
            return false;
        }
        self.cues.sort_by(|a, b| a.start.total_cmp(&b.start));
        true
    }

    pub fn set_text(&mut self, index: usize, text: impl Into<String>) -> Result<()> {
        let cue = self.cue_mut_checked(index)?;
        cue.text = text.into();
        Ok(())
    }

    pub fn retime_start(&mut self, index: usize, time: f64) -> Result<f64> {
        Ok(self.cue_mut_checked(index)?.set_start_clamped(time))
    }

    pub fn retime_end(&mut self, index: usize, time: f64) -> Result<f64> {
        Ok(self.cue_mut_checked(index)?.set_end_clamped(time))
    }

    fn cue_mut_checked(&mut self, index: usize) -> Result<&mut Cue> {
        let len = self.cues.len();
        self.cues
            .get_mut(index)
            .ok_or_else(|| CueSyncError::msg(format!("cue index {index} out of range (len {len})")))
    }
}

impl From<Vec<Cue>> for CueTrack {
    fn from(cues: Vec<Cue>) -> Self {
        Self::from_cues(cues)
    }
}

impl<'a> IntoIterator for &'a CueTrack {
    type Item = &'a Cue;
    type IntoIter = std::slice::Iter<'a, Cue>;

    fn into_iter(self) -> Self::IntoIter {
        self.cues.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> CueTrack {
        CueTrack::from_cues(vec![
            Cue::new(7, 1.0, 3.0, "first"),
            Cue::new(7, 5.0, 7.0, "second"),
        ])
    }

    #[test]
    fn renumbers_in_sequence_order() {
        let mut track = track();
        track.renumber();
        let ordinals: Vec<u32> = track.iter().map(|cue| cue.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2]);

        track.renumber();
        let again: Vec<u32> = track.iter().map(|cue| cue.ordinal).collect();
        assert_eq!(again, ordinals);
    }

    #[test]
    fn clamps_start_and_end_boundaries() {
        let mut cue = Cue::new(1, 2.0, 4.0, "x");

        assert_eq!(cue.set_start_clamped(9.0), 4.0);
        assert_eq!(cue.set_start_clamped(-3.0), 0.0);
        assert_eq!(cue.set_end_clamped(-1.0), 0.0);
        assert!(cue.start <= cue.end);

        cue.set_start_clamped(0.5);
        assert_eq!(cue.start, 0.0);
        assert_eq!(cue.set_end_clamped(6.0), 6.0);
        assert_eq!(cue.set_start_clamped(0.5), 0.5);
        assert_eq!(cue.duration(), 5.5);
    }

    #[test]
    fn stable_sort_reports_reordering() {
        let mut track = CueTrack::from_cues(vec![
            Cue::new(1, 4.0, 5.0, "b"),
            Cue::new(2, 1.0, 2.0, "a"),
            Cue::new(3, 4.0, 6.0, "c"),
        ]);

        assert!(track.sort_by_start());
        let texts: Vec<&str> = track.iter().map(|cue| cue.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert!(!track.sort_by_start());
    }

    #[test]
    fn edits_reject_out_of_range_index() {
        let mut track = track();
        assert!(track.set_text(2, "nope").is_err());
        track.set_text(1, "line one\nline two").unwrap();
        assert_eq!(track.get(1).unwrap().text, "line one\nline two");
    }
}
