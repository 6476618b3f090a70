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

//! The transport clock.
//!
//! [`TransportClock`] is the time base every scheduling decision is made against. It only moves
//! when the render driver finishes a block, so everything that happens during one block sees the
//! same time. It never moves backwards.

/// A monotonic time base advanced once per audio block.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportClock {
    sample_rate: u32,
    block_size: usize,
    now: f64,
}

impl Default for TransportClock {
    /// Returns a clock for 512 frame blocks at 48 kHz.
    fn default() -> TransportClock {
        TransportClock::new(48_000, 512)
    }
}

impl TransportClock {
    pub fn new(sample_rate: u32, block_size: usize) -> TransportClock {
        TransportClock {
            sample_rate,
            block_size,
            now: 0.0,
        }
    }

    /// The time at the start of the current block, in seconds.
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The length of one block, in seconds.
    pub fn block_duration(&self) -> f64 {
        self.frames_to_seconds(self.block_size)
    }

    pub fn frames_to_seconds(&self, frames: usize) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        frames as f64 / f64::from(self.sample_rate)
    }

    /// Moves the clock forward by `elapsed` seconds and returns the new time.
    ///
    /// Negative, zero and non-finite values leave the clock where it is.
    pub fn advance(&mut self, elapsed: f64) -> f64 {
        if elapsed.is_finite() && elapsed > 0.0 {
            self.now += elapsed;
        }
        self.now
    }

    /// Moves the clock forward by one block.
    pub fn advance_block(&mut self) -> f64 {
        self.advance(self.block_duration())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_by_blocks() {
        let mut clock = TransportClock::new(1000, 250);
        assert_eq!(0.0, clock.now());
        assert_eq!(0.25, clock.advance_block());
        assert_eq!(0.5, clock.advance_block());
        assert_eq!(0.5, clock.now());
    }

    #[test]
    fn never_moves_backwards() {
        let mut clock = TransportClock::new(1000, 250);
        clock.advance(1.0);
        assert_eq!(1.0, clock.advance(-0.5));
        assert_eq!(1.0, clock.advance(0.0));
        assert_eq!(1.0, clock.advance(f64::NAN));
        assert_eq!(1.0, clock.advance(f64::INFINITY));
    }

    #[test]
    fn zero_sample_rate_does_not_advance() {
        let mut clock = TransportClock::new(0, 512);
        assert_eq!(0.0, clock.advance_block());
    }
}
