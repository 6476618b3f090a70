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

//! Synthesis voices.
//!
//! The scheduler does not know how a voice makes sound. It only needs the four operations of the
//! [`Voice`] trait, and it calls them in a fixed order for every note:
//!
//! 1. [`set_control`](Voice::set_control) for each control in [`VoiceParams`],
//! 2. [`trigger_on`](Voice::trigger_on) when the note starts,
//! 3. [`trigger_off`](Voice::trigger_off) when the note has been held for its duration,
//! 4. [`is_finished`](Voice::is_finished), polled once per tick until the release tail is over.
//!
//! Controls are never set on a voice between `trigger_on` and `trigger_off` of the same note.
//!
//! Voices that produce audio also implement [`Render`]. [`SineEnv`] is a small sine oscillator
//! with a linear envelope implementing both traits.

use crate::note::InvalidNote;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_4, PI};

/// Names of the controls set on a voice before it is triggered.
pub mod control {
    pub const FREQUENCY: &str = "frequency";
    pub const AMPLITUDE: &str = "amplitude";
    pub const ATTACK_TIME: &str = "attackTime";
    pub const DECAY_TIME: &str = "decayTime";
    pub const SUSTAIN: &str = "sustain";
    pub const RELEASE_TIME: &str = "releaseTime";
    pub const PAN: &str = "pan";
}

/// A sound generating unit that can be triggered on and off and reused across notes.
pub trait Voice {
    /// Sets a named control. Unknown names should be ignored.
    fn set_control(&mut self, name: &str, value: f32);

    /// Starts the note.
    fn trigger_on(&mut self);

    /// Starts the release phase of the note.
    fn trigger_off(&mut self);

    /// Returns true once the voice has gone silent after being released.
    fn is_finished(&self) -> bool;
}

impl<V: Voice + ?Sized> Voice for Box<V> {
    fn set_control(&mut self, name: &str, value: f32) {
        (**self).set_control(name, value)
    }

    fn trigger_on(&mut self) {
        (**self).trigger_on()
    }

    fn trigger_off(&mut self) {
        (**self).trigger_off()
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }
}

/// A voice that can produce audio.
pub trait Render {
    /// Mixes the voice's next block of audio into `out`.
    ///
    /// `out` holds interleaved frames of `channels` samples each. Implementations add to the
    /// buffer rather than overwrite it.
    fn render(&mut self, out: &mut [f32], channels: usize, sample_rate: f32);
}

/// The controls for a single note.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceParams {
    /// Hertz.
    pub frequency: f32,
    /// Linear gain.
    pub amplitude: f32,
    /// Seconds.
    pub attack: f32,
    /// Seconds.
    pub decay: f32,
    /// Level between 0 and 1.
    pub sustain: f32,
    /// Seconds.
    pub release: f32,
    /// -1 is hard left, 1 is hard right.
    pub pan: f32,
}

impl Default for VoiceParams {
    fn default() -> VoiceParams {
        VoiceParams::new(440.0)
    }
}

impl VoiceParams {
    /// Creates controls for the given frequency with the same defaults as
    /// [`Note::new`](crate::note::Note::new).
    pub fn new(frequency: f32) -> VoiceParams {
        VoiceParams {
            frequency,
            amplitude: 0.2,
            attack: 0.05,
            decay: 0.5,
            sustain: 0.05,
            release: 0.05,
            pan: 0.0,
        }
    }

    pub fn amplitude(mut self, amplitude: f32) -> VoiceParams {
        self.amplitude = amplitude;
        self
    }

    pub fn pan(mut self, pan: f32) -> VoiceParams {
        self.pan = pan;
        self
    }

    /// Checks that the controls are safe to send to a voice.
    ///
    /// # Errors
    ///
    /// Returns an error if a control is not finite, the frequency is not positive, or an
    /// envelope time is negative.
    pub fn validate(&self) -> Result<(), InvalidNote> {
        let controls = [
            ("frequency", self.frequency),
            ("amplitude", self.amplitude),
            ("attack", self.attack),
            ("decay", self.decay),
            ("sustain", self.sustain),
            ("release", self.release),
            ("pan", self.pan),
        ];
        if let Some(&(name, _)) = controls.iter().find(|(_, value)| !value.is_finite()) {
            return Err(InvalidNote::NotFinite(name));
        }
        if self.frequency <= 0.0 {
            return Err(InvalidNote::Frequency(self.frequency));
        }
        let times = [
            ("attack", self.attack),
            ("decay", self.decay),
            ("release", self.release),
        ];
        if let Some(&(name, value)) = times.iter().find(|(_, value)| *value < 0.0) {
            return Err(InvalidNote::Negative(name, value));
        }
        Ok(())
    }

    /// Sets every control on `voice`.
    pub fn apply<V: Voice + ?Sized>(&self, voice: &mut V) {
        voice.set_control(control::AMPLITUDE, self.amplitude);
        voice.set_control(control::FREQUENCY, self.frequency);
        voice.set_control(control::ATTACK_TIME, self.attack);
        voice.set_control(control::DECAY_TIME, self.decay);
        voice.set_control(control::SUSTAIN, self.sustain);
        voice.set_control(control::RELEASE_TIME, self.release);
        voice.set_control(control::PAN, self.pan);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
    Done,
}

/// A sine oscillator shaped by a linear attack, decay, sustain, release envelope.
#[derive(Debug, Clone)]
pub struct SineEnv {
    params: VoiceParams,
    phase: f32,
    level: f32,
    release_from: f32,
    stage: Stage,
}

impl Default for SineEnv {
    fn default() -> SineEnv {
        SineEnv::new()
    }
}

impl SineEnv {
    pub fn new() -> SineEnv {
        SineEnv {
            params: VoiceParams::default(),
            phase: 0.0,
            level: 0.0,
            release_from: 0.0,
            stage: Stage::Idle,
        }
    }

    pub fn params(&self) -> &VoiceParams {
        &self.params
    }

    /// The current envelope level, between 0 and 1.
    pub fn level(&self) -> f32 {
        self.level
    }

    fn next_level(&mut self, sample_rate: f32) -> f32 {
        let VoiceParams {
            attack,
            decay,
            sustain,
            release,
            ..
        } = self.params;
        let sustain = sustain.max(0.0).min(1.0);

        match self.stage {
            Stage::Idle | Stage::Done => self.level = 0.0,
            Stage::Attack => {
                self.level += step(1.0, attack, sample_rate);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                self.level -= step(1.0 - sustain, decay, sample_rate);
                if self.level <= sustain {
                    self.level = sustain;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => self.level = sustain,
            Stage::Release => {
                self.level -= step(self.release_from, release, sample_rate);
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = Stage::Done;
                }
            }
        }
        self.level
    }
}

// Per-sample increment covering `distance` in `seconds`. Zero-length segments finish at once.
fn step(distance: f32, seconds: f32, sample_rate: f32) -> f32 {
    if seconds <= 0.0 {
        f32::INFINITY
    } else {
        distance / (seconds * sample_rate)
    }
}

impl Voice for SineEnv {
    fn set_control(&mut self, name: &str, value: f32) {
        match name {
            control::FREQUENCY => self.params.frequency = value,
            control::AMPLITUDE => self.params.amplitude = value,
            control::ATTACK_TIME => self.params.attack = value,
            control::DECAY_TIME => self.params.decay = value,
            control::SUSTAIN => self.params.sustain = value,
            control::RELEASE_TIME => self.params.release = value,
            control::PAN => self.params.pan = value,
            _ => {}
        }
    }

    fn trigger_on(&mut self) {
        self.phase = 0.0;
        self.level = 0.0;
        self.stage = Stage::Attack;
    }

    fn trigger_off(&mut self) {
        self.stage = match self.stage {
            Stage::Attack | Stage::Decay | Stage::Sustain => {
                self.release_from = self.level;
                Stage::Release
            }
            Stage::Idle => Stage::Done,
            stage => stage,
        };
    }

    fn is_finished(&self) -> bool {
        matches!(self.stage, Stage::Idle | Stage::Done)
    }
}

impl Render for SineEnv {
    fn render(&mut self, out: &mut [f32], channels: usize, sample_rate: f32) {
        if self.is_finished() || channels == 0 {
            return;
        }

        let increment = 2.0 * PI * self.params.frequency / sample_rate;
        let angle = (self.params.pan.max(-1.0).min(1.0) + 1.0) * FRAC_PI_4;
        let (left, right) = (angle.cos(), angle.sin());

        for frame in out.chunks_mut(channels) {
            let sample = self.phase.sin() * self.next_level(sample_rate) * self.params.amplitude;
            self.phase = (self.phase + increment) % (2.0 * PI);

            match frame {
                [mono] => *mono += sample,
                [l, r, ..] => {
                    *l += sample * left;
                    *r += sample * right;
                }
                [] => {}
            }
        }
    }
}
