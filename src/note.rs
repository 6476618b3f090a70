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

//! Notes and time signatures.
//!
//! A [`Note`] is a single scheduled sound: a pitch, a position and length measured in beats, a
//! gain, and the shape of the envelope the voice should play it with. Notes are plain values.
//! Nothing in this crate mutates a note once it has been built; operations that move or scale a
//! note, like [`Note::shifted`], return a new one. This is what lets a single phrase be merged
//! into a larger [`Sequence`](crate::sequence::Sequence) many times at different offsets.
//!
//! # Examples
//!
//! ```
//! use cadenza::note::Note;
//!
//! let note = Note::new(440.0).with_onset(2.0).with_duration(1.0);
//! let echo = note.shifted(0.5, 0.5);
//!
//! assert_eq!(2.5, echo.onset());
//! assert_eq!(0.1, echo.amplitude());
//! assert_eq!(2.0, note.onset());
//! ```

use crate::voice::VoiceParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The frequency of A4 used by [`midi_to_hz`] when mapping keys and MIDI notes to pitches.
pub const TUNING_REFERENCE: f32 = 432.0;

/// Converts a MIDI note number into a frequency in hertz.
///
/// `reference` is the frequency of A4 (MIDI note 69).
///
/// # Examples
///
/// ```
/// use cadenza::note::{midi_to_hz, TUNING_REFERENCE};
///
/// assert_eq!(432.0, midi_to_hz(69.0, TUNING_REFERENCE));
/// assert_eq!(880.0, midi_to_hz(81.0, 440.0));
/// ```
pub fn midi_to_hz(note: f32, reference: f32) -> f32 {
    let exp = (note - 69.0) / 12.0;
    reference * 2f32.powf(exp)
}

/// A scheduled sound event.
///
/// Positions and lengths are measured in beats so that the same note can be played back at any
/// tempo. Envelope times (`attack`, `decay`, `release`) are in seconds and do not follow the
/// tempo.
///
/// No validation happens when a note is built. Notes with a non-positive frequency or duration
/// are rejected by the [`Scheduler`](crate::scheduler::Scheduler) when they are played; see
/// [`Note::validate`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(default)]
pub struct Note {
    frequency: f32,
    onset: f32,
    duration: f32,
    amplitude: f32,
    attack: f32,
    release: f32,
    decay: f32,
    sustain: f32,
}

impl Default for Note {
    /// Returns an A4 (440 Hz) note. See [`Note::new`] for the rest of the defaults.
    fn default() -> Note {
        Note::new(440.0)
    }
}

impl Note {
    /// Create a note with the given frequency, in hertz.
    ///
    /// The remaining fields take these defaults:
    ///
    /// | field | default |
    /// |---|---|
    /// | onset | 0 beats |
    /// | duration | 0.5 beats |
    /// | amplitude | 0.2 |
    /// | attack | 0.05 s |
    /// | release | 0.05 s |
    /// | decay | 0.5 s |
    /// | sustain | 0.05 |
    pub fn new(frequency: f32) -> Note {
        Note {
            frequency,
            onset: 0.0,
            duration: 0.5,
            amplitude: 0.2,
            attack: 0.05,
            release: 0.05,
            decay: 0.5,
            sustain: 0.05,
        }
    }

    /// Sets the position of the note, in beats from the start of its sequence.
    pub fn with_onset(mut self, onset: f32) -> Note {
        self.onset = onset;
        self
    }

    /// Sets how long the note is held before it is released, in beats.
    pub fn with_duration(mut self, duration: f32) -> Note {
        self.duration = duration;
        self
    }

    /// Sets the linear gain of the note.
    pub fn with_amplitude(mut self, amplitude: f32) -> Note {
        self.amplitude = amplitude;
        self
    }

    /// Sets the envelope of the note.
    ///
    /// `attack`, `decay` and `release` are in seconds; `sustain` is a level between 0 and 1.
    pub fn with_envelope(mut self, attack: f32, decay: f32, sustain: f32, release: f32) -> Note {
        self.attack = attack;
        self.decay = decay;
        self.sustain = sustain;
        self.release = release;
        self
    }

    /// Returns a copy of this note moved later by `beat_offset` beats with its amplitude
    /// multiplied by `amp_mult`.
    ///
    /// Every other field is copied unchanged. `note.shifted(0.0, 1.0)` is equal to `note`.
    pub fn shifted(&self, beat_offset: f32, amp_mult: f32) -> Note {
        Note {
            onset: self.onset + beat_offset,
            amplitude: self.amplitude * amp_mult,
            ..*self
        }
    }

    /// Returns a copy of this note with its frequency multiplied by `ratio`.
    pub fn transposed(&self, ratio: f32) -> Note {
        Note {
            frequency: self.frequency * ratio,
            ..*self
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn onset(&self) -> f32 {
        self.onset
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn attack(&self) -> f32 {
        self.attack
    }

    pub fn release(&self) -> f32 {
        self.release
    }

    pub fn decay(&self) -> f32 {
        self.decay
    }

    pub fn sustain(&self) -> f32 {
        self.sustain
    }

    /// The beat at which the note is released.
    pub fn end(&self) -> f32 {
        self.onset + self.duration
    }

    /// The voice controls needed to play this note.
    pub fn params(&self) -> VoiceParams {
        VoiceParams {
            frequency: self.frequency,
            amplitude: self.amplitude,
            attack: self.attack,
            decay: self.decay,
            sustain: self.sustain,
            release: self.release,
            pan: 0.0,
        }
    }

    /// Checks that the note can be played.
    ///
    /// # Errors
    ///
    /// Returns an error if the frequency or duration is not positive, the onset or an envelope
    /// time is negative, or any field is not finite.
    pub fn validate(&self) -> Result<(), InvalidNote> {
        self.params().validate()?;
        if !self.onset.is_finite() {
            return Err(InvalidNote::NotFinite("onset"));
        }
        if !self.duration.is_finite() {
            return Err(InvalidNote::NotFinite("duration"));
        }
        if self.duration <= 0.0 {
            return Err(InvalidNote::Duration(self.duration));
        }
        if self.onset < 0.0 {
            return Err(InvalidNote::Onset(self.onset));
        }
        Ok(())
    }
}

/// The reason a note was refused by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidNote {
    #[error("frequency must be positive, got {0}")]
    Frequency(f32),
    #[error("duration must be positive, got {0}")]
    Duration(f32),
    #[error("onset must not be negative, got {0}")]
    Onset(f32),
    #[error("delay must not be negative, got {0}")]
    Delay(f64),
    #[error("{0} must not be negative, got {1}")]
    Negative(&'static str, f32),
    #[error("{0} is not a finite number")]
    NotFinite(&'static str),
}

/// A musical time signature.
///
/// Sequences carry a time signature for reference only. The scheduler does not look at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Beats per measure.
    pub upper: u8,
    /// The note value that counts as one beat.
    pub lower: u8,
}

impl Default for TimeSignature {
    /// Returns common time, 4/4.
    fn default() -> TimeSignature {
        TimeSignature { upper: 4, lower: 4 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Note {
        Note::new(293.66)
            .with_onset(1.5)
            .with_duration(0.75)
            .with_amplitude(0.25)
            .with_envelope(0.01, 0.2, 0.6, 0.3)
    }

    #[test]
    fn shifted_by_nothing_is_identity() {
        let note = sample();
        assert_eq!(note, note.shifted(0.0, 1.0));
    }

    #[test]
    fn shifts_are_additive() {
        let note = sample();
        assert_eq!(
            note.shifted(1.25, 1.0).shifted(2.5, 1.0),
            note.shifted(3.75, 1.0)
        );
    }

    #[test]
    fn shifted_copies_everything_else() {
        let note = sample();
        let shifted = note.shifted(4.0, 0.5);
        assert_eq!(5.5, shifted.onset());
        assert_eq!(0.125, shifted.amplitude());
        assert_eq!(note.frequency(), shifted.frequency());
        assert_eq!(note.duration(), shifted.duration());
        assert_eq!(note.attack(), shifted.attack());
        assert_eq!(note.decay(), shifted.decay());
        assert_eq!(note.sustain(), shifted.sustain());
        assert_eq!(note.release(), shifted.release());
    }

    #[test]
    fn defaults() {
        let note = Note::default();
        assert_eq!(440.0, note.frequency());
        assert_eq!(0.0, note.onset());
        assert_eq!(0.5, note.duration());
        assert_eq!(0.2, note.amplitude());
        assert_eq!(0.05, note.attack());
        assert_eq!(0.05, note.release());
        assert_eq!(0.5, note.decay());
        assert_eq!(0.05, note.sustain());
    }

    #[test]
    fn validate_rejects_bad_parameters() {
        assert_eq!(Ok(()), sample().validate());
        assert_eq!(
            Err(InvalidNote::Frequency(0.0)),
            Note::new(0.0).validate()
        );
        assert_eq!(
            Err(InvalidNote::Duration(-1.0)),
            Note::new(440.0).with_duration(-1.0).validate()
        );
        assert_eq!(
            Err(InvalidNote::Onset(-0.5)),
            Note::new(440.0).with_onset(-0.5).validate()
        );
        assert_eq!(
            Err(InvalidNote::NotFinite("frequency")),
            Note::new(f32::NAN).validate()
        );
        assert_eq!(
            Err(InvalidNote::NotFinite("amplitude")),
            Note::new(440.0).with_amplitude(f32::INFINITY).validate()
        );
        assert_eq!(
            Err(InvalidNote::NotFinite("sustain")),
            Note::new(440.0)
                .with_envelope(0.01, 0.1, f32::NAN, 0.1)
                .validate()
        );
        assert_eq!(
            Err(InvalidNote::Negative("release", -0.1)),
            Note::new(440.0)
                .with_envelope(0.01, 0.1, 0.5, -0.1)
                .validate()
        );
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let note: Note = serde_json::from_str(r#"{"frequency": 220.0, "onset": 2.0}"#).unwrap();
        assert_eq!(Note::new(220.0).with_onset(2.0), note);
    }

    #[test]
    fn midi_to_hz_octaves() {
        assert_eq!(216.0, midi_to_hz(57.0, TUNING_REFERENCE));
        assert_eq!(440.0, midi_to_hz(69.0, 440.0));
    }
}
