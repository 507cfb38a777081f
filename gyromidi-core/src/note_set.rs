//! Arpeggiator note set: held pitches in ascending order plus a playback
//! cursor.

use gyromidi_types::{ArpPattern, MIDI_MAX};

/// Interval used to extend sets too small to derive their own period.
const FALLBACK_SPAN: i32 = 12;

/// Held pitches and playback position, mutated only on the scheduler thread.
#[derive(Debug, Clone)]
pub struct NoteSet {
    notes: Vec<u8>,   // ascending, duplicates allowed
    cursor: usize,    // index into `notes`, or into the pattern steps
    pattern: ArpPattern,
    rng_state: u64,
}

impl NoteSet {
    pub fn new(pattern: ArpPattern) -> Self {
        Self {
            notes: Vec::new(),
            cursor: 0,
            pattern,
            rng_state: 12345,
        }
    }

    pub fn notes(&self) -> &[u8] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn pattern(&self) -> &ArpPattern {
        &self.pattern
    }

    /// Insert before the first strictly greater pitch.
    pub fn push(&mut self, pitch: u8) {
        let at = self
            .notes
            .iter()
            .position(|&n| pitch < n)
            .unwrap_or(self.notes.len());
        self.notes.insert(at, pitch);
    }

    /// Remove the first occurrence of `pitch`. Returns `false` if it was not
    /// held.
    pub fn pop(&mut self, pitch: u8) -> bool {
        let Some(at) = self.notes.iter().position(|&n| n == pitch) else {
            return false;
        };
        self.notes.remove(at);
        if !matches!(self.pattern, ArpPattern::Sequence(_)) && self.cursor >= self.notes.len() {
            self.cursor = self.notes.len().saturating_sub(1);
        }
        true
    }

    /// Move the cursor to the start of the sequence (the top for `Down`).
    pub fn reset(&mut self) {
        self.cursor = match self.pattern {
            ArpPattern::Down => self.notes.len().saturating_sub(1),
            _ => 0,
        };
    }

    /// Advance the cursor one step and return the pitch now under it.
    pub fn next(&mut self) -> Option<u8> {
        let len = self.notes.len();
        if len == 0 {
            return None;
        }
        match &self.pattern {
            ArpPattern::Up => {
                self.cursor = (self.cursor + 1) % len;
                Some(self.notes[self.cursor])
            }
            ArpPattern::Down => {
                self.cursor = (self.cursor % len + len - 1) % len;
                Some(self.notes[self.cursor])
            }
            ArpPattern::Random => {
                self.rng_state = self
                    .rng_state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                self.cursor = ((self.rng_state >> 33) as usize) % len;
                Some(self.notes[self.cursor])
            }
            ArpPattern::Sequence(steps) => {
                if steps.is_empty() {
                    return None;
                }
                self.cursor = (self.cursor + 1) % steps.len();
                let pos = self.resolve(steps[self.cursor]);
                Some(self.notes[pos as usize])
            }
        }
    }

    /// Pitch `shift` places away from the cursor's position.
    ///
    /// Positions beyond either end treat the set as periodic: the period is
    /// the set's range plus the gap between its two highest pitches, added
    /// once per full set length overflowed. Results clamp to [0, 127].
    pub fn get(&self, shift: i32) -> Option<u8> {
        let len = self.notes.len() as i32;
        if len == 0 {
            return None;
        }
        let i = self.position()? + shift;
        if (0..len).contains(&i) {
            return Some(self.notes[i as usize]);
        }
        let periods = i.div_euclid(len);
        let base = self.notes[i.rem_euclid(len) as usize] as i32;
        let pitch = base + periods * self.span();
        Some(pitch.clamp(0, MIDI_MAX as i32) as u8)
    }

    /// Note index the cursor currently points at.
    fn position(&self) -> Option<i32> {
        match &self.pattern {
            ArpPattern::Sequence(steps) => steps.get(self.cursor).map(|&p| self.resolve(p)),
            _ => Some(self.cursor as i32),
        }
    }

    /// Pattern step to note index: negative steps count from the top,
    /// anything beyond the set clamps to its ends.
    fn resolve(&self, pos: i32) -> i32 {
        let len = self.notes.len() as i32;
        if pos >= len {
            len - 1
        } else if pos < -len {
            0
        } else if pos < 0 {
            len + pos
        } else {
            pos
        }
    }

    fn span(&self) -> i32 {
        match self.notes.as_slice() {
            [lowest, .., second, highest] => {
                let (lowest, second, highest) = (*lowest as i32, *second as i32, *highest as i32);
                (highest - lowest) + (highest - second)
            }
            _ => FALLBACK_SPAN,
        }
    }
}

impl Default for NoteSet {
    fn default() -> Self {
        Self::new(ArpPattern::Up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(pattern: ArpPattern, pitches: &[u8]) -> NoteSet {
        let mut set = NoteSet::new(pattern);
        for &p in pitches {
            set.push(p);
        }
        set
    }

    #[test]
    fn push_keeps_ascending_order_with_duplicates() {
        let set = set_of(ArpPattern::Up, &[67, 60, 64, 60, 72, 61]);
        assert_eq!(set.notes(), &[60, 60, 61, 64, 67, 72]);
    }

    #[test]
    fn push_pop_sequence_stays_sorted() {
        let mut set = NoteSet::default();
        let mut seed: u32 = 7;
        for round in 0..200 {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            let pitch = ((seed >> 16) % 24) as u8 + 48;
            if round % 3 == 2 {
                set.pop(pitch);
            } else {
                set.push(pitch);
            }
            assert!(set.notes().windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn pop_removes_first_match_only() {
        let mut set = set_of(ArpPattern::Up, &[60, 64, 64, 67]);
        assert!(set.pop(64));
        assert_eq!(set.notes(), &[60, 64, 67]);
    }

    #[test]
    fn pop_missing_pitch_is_noop() {
        let mut set = set_of(ArpPattern::Up, &[60, 64]);
        assert!(!set.pop(61));
        assert_eq!(set.notes(), &[60, 64]);
        let mut empty = NoteSet::default();
        assert!(!empty.pop(60));
    }

    #[test]
    fn up_cycles_forward() {
        let mut set = set_of(ArpPattern::Up, &[60, 64, 67]);
        set.reset();
        assert_eq!(set.get(0), Some(60));
        let played: Vec<u8> = (0..6).filter_map(|_| set.next()).collect();
        assert_eq!(played, vec![64, 67, 60, 64, 67, 60]);
    }

    #[test]
    fn down_cycles_backward_from_top() {
        let mut set = set_of(ArpPattern::Down, &[60, 64, 67]);
        set.reset();
        assert_eq!(set.cursor(), 2);
        assert_eq!(set.get(0), Some(67));
        let played: Vec<u8> = (0..6).filter_map(|_| set.next()).collect();
        assert_eq!(played, vec![64, 60, 67, 64, 60, 67]);
    }

    #[test]
    fn random_stays_within_set() {
        let mut set = set_of(ArpPattern::Random, &[60, 64, 67]);
        set.reset();
        for _ in 0..50 {
            let pitch = set.next().unwrap();
            assert!(set.notes().contains(&pitch));
            assert!(set.cursor() < 3);
        }
    }

    #[test]
    fn sequence_walks_pattern_with_clamping() {
        let mut set = set_of(ArpPattern::Sequence(vec![0, -1, 5, -9]), &[60, 64, 67]);
        set.reset();
        assert_eq!(set.get(0), Some(60));
        // -1 = top, 5 clamps to top, -9 clamps to bottom, then wraps to 0
        let played: Vec<u8> = (0..4).filter_map(|_| set.next()).collect();
        assert_eq!(played, vec![67, 67, 60, 60]);
    }

    #[test]
    fn empty_set_and_empty_pattern_yield_nothing() {
        let mut set = NoteSet::default();
        assert_eq!(set.next(), None);
        assert_eq!(set.get(0), None);

        let mut patternless = set_of(ArpPattern::Sequence(Vec::new()), &[60]);
        assert_eq!(patternless.next(), None);
        assert_eq!(patternless.get(0), None);
    }

    #[test]
    fn get_matches_extrapolation_table() {
        let mut set = set_of(ArpPattern::Up, &[60, 64, 67]);
        set.reset();
        // span = (67 - 60) + (67 - 64) = 10
        let table: &[(usize, i32, u8)] = &[
            (0, 0, 60),
            (0, 2, 67),
            (0, 3, 70),
            (0, 4, 74),
            (0, 7, 84),
            (0, -1, 57),
            (0, -3, 50),
            (0, -4, 47),
            (1, 1, 67),
            (2, 1, 70),
            (2, -8, 40),
            (0, 100, 127),
            (0, -100, 0),
        ];
        for &(steps, shift, expected) in table {
            set.reset();
            for _ in 0..steps {
                set.next();
            }
            assert_eq!(
                set.get(shift),
                Some(expected),
                "cursor {} shift {}",
                set.cursor(),
                shift
            );
        }
    }

    #[test]
    fn get_single_note_uses_octave_period() {
        let set = set_of(ArpPattern::Up, &[60]);
        assert_eq!(set.get(1), Some(72));
        assert_eq!(set.get(-2), Some(36));
    }

    #[test]
    fn get_follows_pattern_position() {
        let mut set = set_of(ArpPattern::Sequence(vec![2, 0]), &[60, 64, 67]);
        set.reset();
        assert_eq!(set.get(0), Some(67));
        assert_eq!(set.get(1), Some(70));
        set.next();
        assert_eq!(set.get(-1), Some(57));
    }

    #[test]
    fn pop_clamps_cursor() {
        let mut set = set_of(ArpPattern::Up, &[60, 64, 67]);
        set.next();
        set.next();
        assert_eq!(set.cursor(), 2);
        set.pop(67);
        assert_eq!(set.cursor(), 1);
        assert_eq!(set.next(), Some(60));
    }
}
