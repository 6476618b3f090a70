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

//! The built-in piece.
//!
//! The piece is written as short phrases laid out on a grid of [`DASH`] beats. Each phrase starts
//! at beat zero and [`piece`] merges them one after the other, every [`PHRASE_DASHES`] dashes, at
//! half volume.
//!
//! ```
//! use cadenza::score;
//!
//! let piece = score::piece(1.0);
//! let phrases = score::phrases(1.0);
//! assert_eq!(phrases.iter().map(|p| p.len()).sum::<usize>(), piece.len());
//! ```

use crate::{note::Note, sequence::Sequence};

/// The tempo the piece was written for.
pub const BPM: f32 = 77.0;

/// The grid step phrases are written on, in beats.
pub const DASH: f32 = 1.0 / 6.0;

/// The length of every phrase, in dashes.
pub const PHRASE_DASHES: f32 = 27.0;

/// Amplitude of a note before the phrase is merged into the piece.
pub const AMPLITUDE: f32 = 0.25;

/// Volume of each phrase in the piece.
pub const PHRASE_GAIN: f32 = 0.5;

/// Attack time of every note, in seconds.
pub const ATTACK: f32 = 0.01;

/// Release time of every note, in seconds.
pub const RELEASE: f32 = 0.05;

// Note lengths are their length in seconds at BPM, used as beats.
const WHOLE: f32 = 240.0 / BPM;
const QUARTER: f32 = WHOLE / 4.0;
const DOTTED_HALF: f32 = WHOLE * 3.0 / 8.0;

/// Note pitches in hertz. Each octave down halves the frequency of the one above it.
pub mod pitch {
    pub const C8: f32 = 4186.01;
    pub const CS8: f32 = 4434.92;
    pub const D8: f32 = 4698.63;
    pub const DS8: f32 = 4978.03;
    pub const E8: f32 = 5274.04;
    pub const F8: f32 = 5587.65;
    pub const FS8: f32 = 5919.91;
    pub const G8: f32 = 6271.93;
    pub const GS8: f32 = 6644.88;
    pub const A8: f32 = 7040.00;
    pub const AS8: f32 = 7458.62;
    pub const B8: f32 = 7902.13;

    pub const D5: f32 = D8 / 8.0;
    pub const CS5: f32 = CS8 / 8.0;
    pub const C5: f32 = C8 / 8.0;
    pub const B4: f32 = B8 / 16.0;
    pub const AS4: f32 = AS8 / 16.0;
    pub const AS3: f32 = AS8 / 32.0;
    pub const D3: f32 = D8 / 32.0;
    pub const CS3: f32 = CS8 / 32.0;
    pub const B2: f32 = B8 / 64.0;
    pub const AS2: f32 = AS8 / 64.0;
}

use pitch::*;

// Notes hold at full level between attack and release.
fn note(frequency: f32, dash: u8, length: f32, transpose: f32) -> Note {
    Note::new(frequency * transpose)
        .with_onset(DASH * f32::from(dash))
        .with_duration(length)
        .with_amplitude(AMPLITUDE)
        .with_envelope(ATTACK, 0.0, 1.0, RELEASE)
}

fn phrase(transpose: f32, notes: &[(f32, u8, f32)]) -> Sequence {
    notes
        .iter()
        .map(|&(frequency, dash, length)| note(frequency, dash, length, transpose))
        .collect()
}

pub fn phrase1(transpose: f32) -> Sequence {
    phrase(
        transpose,
        &[
            (D5, 0, QUARTER),
            (D5, 6, DOTTED_HALF),
            (C5, 25, QUARTER),
            (B4, 3, QUARTER),
            (B2, 0, WHOLE),
        ],
    )
}

pub fn phrase2(transpose: f32) -> Sequence {
    phrase(
        transpose,
        &[
            (CS5, 4, QUARTER),
            (D5, 22, QUARTER),
            (D5, 26, QUARTER),
            (AS4, 2, QUARTER),
            (B4, 19, QUARTER),
            (D3, 19, QUARTER),
            (B2, 22, QUARTER),
        ],
    )
}

pub fn phrase3(transpose: f32) -> Sequence {
    phrase(
        transpose,
        &[
            (D5, 2, QUARTER),
            (D5, 4, QUARTER),
            (D5, 14, QUARTER),
            (D5, 17, QUARTER),
            (D5, 20, QUARTER),
            (D5, 22, QUARTER),
            (B4, 5, QUARTER),
            (B4, 11, QUARTER),
            (B4, 13, QUARTER),
            (B4, 23, QUARTER),
            (D3, 23, QUARTER),
            (B2, 23, QUARTER),
        ],
    )
}

pub fn phrase4(transpose: f32) -> Sequence {
    phrase(
        transpose,
        &[
            (CS5, 6, QUARTER),
            (CS5, 9, QUARTER),
            (CS5, 12, QUARTER),
            (CS5, 14, QUARTER),
            (CS5, 24, QUARTER),
            (B4, 3, QUARTER),
            (B4, 5, QUARTER),
            (AS4, 15, QUARTER),
            (AS4, 21, QUARTER),
            (AS4, 24, QUARTER),
            (AS3, 15, QUARTER),
            (CS3, 6, QUARTER),
            (CS3, 12, QUARTER),
            (CS3, 15, QUARTER),
            (CS3, 24, QUARTER),
            (AS2, 6, QUARTER),
            (AS2, 12, QUARTER),
            (AS2, 24, QUARTER),
        ],
    )
}

/// Every phrase of the piece, in order, each starting at beat zero.
pub fn phrases(transpose: f32) -> Vec<Sequence> {
    vec![
        phrase1(transpose),
        phrase2(transpose),
        phrase3(transpose),
        phrase4(transpose),
    ]
}

/// The whole piece with every frequency multiplied by `transpose`.
pub fn piece(transpose: f32) -> Sequence {
    let mut result = Sequence::default();
    for (k, phrase) in phrases(transpose).iter().enumerate() {
        result.add_sequence(phrase, DASH * PHRASE_DASHES * k as f32, PHRASE_GAIN);
    }
    result
}
