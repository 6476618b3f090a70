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

//! A module for composing sequences of notes.
//!
//! A [`Sequence`] is an ordered list of [`Note`]s. Notes keep the order they were added in, which
//! does not have to be the order they sound in: every note carries its own onset. Sequences are
//! built once and then played, so there is no API for removing or editing notes.
//!
//! Larger pieces are built by merging small sequences into bigger ones with
//! [`Sequence::add_sequence`]. Merging copies the notes, so the same phrase can be reused at many
//! offsets and volumes.
//!
//! # Examples
//!
//! ```
//! use cadenza::{note::Note, sequence::Sequence};
//!
//! fn motif() -> Sequence {
//!     let mut s = Sequence::default();
//!     s.add(Note::new(587.33).with_onset(0.0));
//!     s.add(Note::new(523.25).with_onset(1.0));
//!     s
//! }
//!
//! let motif = motif();
//! let mut piece = Sequence::default();
//! piece.add_sequence(&motif, 0.0, 1.0);
//! piece.add_sequence(&motif, 4.0, 0.5);
//!
//! assert_eq!(4, piece.len());
//! assert_eq!(5.0, piece.notes()[3].onset());
//! assert_eq!(2, motif.len());
//! ```
//!
//! # Score files
//!
//! Sequences can be stored as JSON with [`Sequence::to_writer`] and read back with
//! [`Sequence::from_reader`]. Missing note fields take the defaults documented on [`Note::new`].
//!
//! ```
//! use cadenza::sequence::Sequence;
//!
//! let json = r#"{
//!     "time_signature": { "upper": 3, "lower": 4 },
//!     "notes": [
//!         { "frequency": 440.0, "onset": 0.0, "duration": 1.0 },
//!         { "frequency": 660.0, "onset": 1.0 }
//!     ]
//! }"#;
//! let sequence = Sequence::from_reader(json.as_bytes())?;
//!
//! assert_eq!(2, sequence.len());
//! assert_eq!(3, sequence.time_signature().upper);
//! # cadenza::sequence::Result::Ok(())
//! ```

use crate::note::{Note, TimeSignature};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    iter::FromIterator,
    path::Path,
    slice,
};
use thiserror::Error;

/// A specialized [`Result`] type for loading and saving sequences.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned when a score cannot be read or written.
#[derive(Debug, Error)]
pub enum Error {
    #[error("opening score file: {0}")]
    Open(#[source] io::Error),
    #[error("creating score file: {0}")]
    Create(#[source] io::Error),
    #[error("writing score file: {0}")]
    Write(#[source] io::Error),
    #[error("decoding score: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("encoding score: {0}")]
    Encode(#[source] serde_json::Error),
}

/// An ordered collection of notes sharing a time signature.
///
/// See [the module level documentation](self) for more.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    #[serde(default)]
    time_signature: TimeSignature,
    notes: Vec<Note>,
}

impl Sequence {
    /// Create an empty sequence.
    pub fn new(time_signature: TimeSignature) -> Sequence {
        Sequence {
            time_signature,
            notes: Vec::new(),
        }
    }

    /// Appends a note.
    ///
    /// Notes are never deduplicated or reordered.
    pub fn add(&mut self, note: Note) {
        self.notes.push(note);
    }

    /// Appends a copy of every note in `other`, moved later by `start_beat` beats and with
    /// amplitudes multiplied by `amp_mult`.
    ///
    /// `other` is left untouched, so one phrase can be merged any number of times.
    pub fn add_sequence(&mut self, other: &Sequence, start_beat: f32, amp_mult: f32) {
        self.notes.extend(
            other
                .notes
                .iter()
                .map(|note| note.shifted(start_beat, amp_mult)),
        );
    }

    /// The notes in the order they were added.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn iter(&self) -> slice::Iter<'_, Note> {
        self.notes.iter()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    /// The beat at which the last note is released, or `0.0` for an empty sequence.
    pub fn length_beats(&self) -> f32 {
        self.notes.iter().map(Note::end).fold(0.0, f32::max)
    }

    /// Returns a copy of this sequence with every frequency multiplied by `ratio`.
    pub fn transposed(&self, ratio: f32) -> Sequence {
        Sequence {
            time_signature: self.time_signature,
            notes: self.notes.iter().map(|note| note.transposed(ratio)).collect(),
        }
    }

    /// Reads a sequence from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid score.
    pub fn from_reader<R: Read>(read: R) -> Result<Sequence> {
        serde_json::from_reader(read).map_err(Error::Decode)
    }

    /// Writes this sequence as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the score cannot be encoded or written.
    pub fn to_writer<W: Write>(&self, write: W) -> Result<()> {
        serde_json::to_writer_pretty(write, self).map_err(Error::Encode)
    }

    /// Reads a sequence from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Sequence> {
        let file = File::open(path).map_err(Error::Open)?;
        Sequence::from_reader(BufReader::new(file))
    }

    /// Writes this sequence to a JSON file, replacing it if it exists.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path).map_err(Error::Create)?;
        let mut write = BufWriter::new(file);
        self.to_writer(&mut write)?;
        write.flush().map_err(Error::Write)
    }
}

impl Extend<Note> for Sequence {
    fn extend<I: IntoIterator<Item = Note>>(&mut self, notes: I) {
        self.notes.extend(notes)
    }
}

impl FromIterator<Note> for Sequence {
    /// Collects notes into a sequence in common time.
    fn from_iter<I: IntoIterator<Item = Note>>(notes: I) -> Sequence {
        Sequence {
            time_signature: TimeSignature::default(),
            notes: notes.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Note;
    type IntoIter = slice::Iter<'a, Note>;

    fn into_iter(self) -> Self::IntoIter {
        self.notes.iter()
    }
}
