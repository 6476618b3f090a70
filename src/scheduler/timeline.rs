// Cadenza
// Copyright (C) 2021  Wesley Merkel
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use super::{NoteId, NoteRequest};
use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    mem,
};

/// A note waiting for its onset.
#[derive(Debug, Clone, Copy)]
pub struct Pending {
    pub time: f64,
    pub id: NoteId,
    pub request: NoteRequest,
}

impl Pending {
    fn key(&self) -> (f64, NoteId) {
        (self.time, self.id)
    }
}

// Times are validated as finite before they get here, so partial_cmp never fails.
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key()
            .partial_cmp(&other.key())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

/// Pending notes ordered by onset time, then by the order they were inserted.
#[derive(Debug)]
pub struct Timeline {
    heap: BinaryHeap<Reverse<Pending>>,
}

impl Timeline {
    pub fn with_capacity(capacity: usize) -> Timeline {
        Timeline {
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, pending: Pending) {
        self.heap.push(Reverse(pending));
    }

    /// The time of the earliest pending note.
    pub fn next_time(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse(pending)| pending.time)
    }

    /// Removes the earliest pending note if it starts before `end`.
    pub fn pop_before(&mut self, end: f64) -> Option<Pending> {
        match self.next_time() {
            Some(time) if time < end => self.heap.pop().map(|Reverse(pending)| pending),
            _ => None,
        }
    }

    /// Removes every pending note, earliest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Pending> {
        // Sorted ascending by Reverse, so latest first.
        mem::take(&mut self.heap)
            .into_sorted_vec()
            .into_iter()
            .rev()
            .map(|Reverse(pending)| pending)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::VoiceParams;

    fn pending(time: f64, id: NoteId) -> Pending {
        Pending {
            time,
            id,
            request: NoteRequest::new(VoiceParams::new(id as f32 + 1.0), 0.0, 1.0),
        }
    }

    #[test]
    fn pops_in_time_then_insertion_order() {
        let mut timeline = Timeline::with_capacity(8);
        timeline.push(pending(2.0, 0));
        timeline.push(pending(1.0, 3));
        timeline.push(pending(1.0, 1));
        timeline.push(pending(0.5, 2));

        let mut ids = Vec::new();
        while let Some(pending) = timeline.pop_before(f64::INFINITY) {
            ids.push(pending.id);
        }
        assert_eq!(vec![2, 1, 3, 0], ids);
    }

    #[test]
    fn pop_before_respects_window_end() {
        let mut timeline = Timeline::with_capacity(2);
        timeline.push(pending(1.0, 0));
        assert!(timeline.pop_before(1.0).is_none());
        assert!(timeline.pop_before(1.0 + f64::EPSILON).is_some());
        assert!(timeline.is_empty());
    }

    #[test]
    fn drains_in_time_then_insertion_order() {
        let mut timeline = Timeline::with_capacity(8);
        for &(time, id) in [(3.0, 4), (0.5, 7), (3.0, 2), (1.0, 5), (0.5, 6)].iter() {
            timeline.push(pending(time, id));
        }
        let drained: Vec<(f64, NoteId)> = timeline
            .drain()
            .map(|pending| (pending.time, pending.id))
            .collect();
        assert_eq!(
            vec![(0.5, 6), (0.5, 7), (1.0, 5), (3.0, 2), (3.0, 4)],
            drained
        );
        assert!(timeline.is_empty());
    }
}
