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

//! A note sequencer and voice scheduler for real-time audio.
//!
//! # Introduction
//!
//! Cadenza turns musical material, notes placed on a beat grid, into sound. It sits between the
//! code that composes music and the code that renders audio samples, and it is responsible for
//! deciding exactly when each sound starts and stops and which synthesizer voice plays it.
//!
//! The crate is made of a handful of small pieces:
//!
//!  * [`note`] and [`sequence`] - The musical material. A [`Note`](note::Note) is a pitch with a
//!    position and length in beats, an amplitude and an envelope. A
//!    [`Sequence`](sequence::Sequence) is an ordered list of notes. Big sequences are built by
//!    merging small ones at an offset and volume with
//!    [`add_sequence`](sequence::Sequence::add_sequence).
//!
//!  * [`voice`] - The [`Voice`](voice::Voice) trait describes a synthesizer voice that can be
//!    configured through named controls, triggered on and off, and asked whether it has finished
//!    sounding. [`SineEnv`](voice::SineEnv) is a simple enveloped sine wave voice.
//!
//!  * [`pool`] - A [`VoicePool`](pool::VoicePool) owns a set of reusable voices. When every voice
//!    is busy it either grows, steals the oldest voice, or refuses, as configured.
//!
//!  * [`clock`] and [`scheduler`] - The [`Scheduler`](scheduler::Scheduler) keeps every pending
//!    note on a timeline measured by a [`TransportClock`](clock::TransportClock). Each time the
//!    audio driver renders a block it ticks the scheduler, which triggers and releases voices
//!    whose times fall inside the block.
//!
//!  * [`osc`] - A UDP listener that lets other programs play notes and start or stop playback
//!    using Open Sound Control.
//!
//!  * [`render`] - Offline rendering of a scheduler to a WAV file.
//!
//!  * [`config`] and [`score`] - Runtime settings and a built-in piece used by the `cadenza`
//!    command line tool.
//!
//! # Examples
//!
//! This example renders a two note melody into a stereo buffer, one block at a time.
//!
//! ```
//! use cadenza::{
//!     clock::TransportClock,
//!     note::Note,
//!     pool::{PoolConfig, VoicePool},
//!     scheduler::Scheduler,
//!     sequence::Sequence,
//!     voice::SineEnv,
//! };
//!
//! // Notes are placed in beats. At 120 bpm every beat lasts half a second.
//! let mut melody = Sequence::default();
//! melody.add(Note::new(440.0).with_duration(1.0));
//! melody.add(Note::new(660.0).with_onset(1.0).with_duration(1.0));
//!
//! // Four voices, created up front, that are stolen oldest first when they run out.
//! let pool = VoicePool::new(PoolConfig::fixed(4), SineEnv::new);
//! let mut scheduler = Scheduler::new(pool).clock(TransportClock::new(48_000, 480));
//! assert_eq!(2, scheduler.play_sequence(&melody, 120.0));
//!
//! // The audio driver calls `process` once per block.
//! let mut block = vec![0.0; 480 * 2];
//! for _ in 0..110 {
//!     scheduler.process(&mut block, 2);
//! }
//!
//! assert_eq!(2, scheduler.stats().triggered);
//! assert_eq!(2, scheduler.stats().released);
//! ```

pub mod clock;
pub mod config;
pub mod note;
pub mod osc;
pub mod pool;
pub mod render;
pub mod scheduler;
pub mod score;
pub mod sequence;
pub mod voice;
