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

use super::NoteRequest;
use crate::{sequence::Sequence, voice::VoiceParams};
use std::sync::mpsc::Sender;
use thiserror::Error;

/// A request from another thread, applied at the start of the next tick.
#[derive(Debug)]
pub enum Command {
    Note(NoteRequest),
    Sequence { sequence: Sequence, bpm: f32 },
    Restart { sequence: Sequence, bpm: f32 },
    Stop,
}

/// Returned by [`Handle`] methods when the scheduler has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("the scheduler is no longer running")]
pub struct Disconnected;

/// Sends notes and commands to a [`Scheduler`](super::Scheduler) from another thread.
///
/// Handles are cheap to clone. Requests are queued and picked up by the scheduler at the start of
/// its next tick, so they never change a block that has already been rendered. Times are
/// measured from the scheduler's clock at that tick.
#[derive(Debug, Clone)]
pub struct Handle {
    sender: Sender<Command>,
}

impl Handle {
    pub(super) fn new(sender: Sender<Command>) -> Handle {
        Handle { sender }
    }

    /// Plays a note `delay` seconds after the next tick, releasing it `duration` seconds later.
    ///
    /// Invalid requests are rejected and counted by the scheduler when they arrive.
    pub fn add_voice_from_now(
        &self,
        params: VoiceParams,
        delay: f64,
        duration: f64,
    ) -> Result<(), Disconnected> {
        self.send(Command::Note(NoteRequest::new(params, delay, duration)))
    }

    /// Plays every note of `sequence` at `bpm`, starting at the next tick.
    pub fn play_sequence(&self, sequence: Sequence, bpm: f32) -> Result<(), Disconnected> {
        self.send(Command::Sequence { sequence, bpm })
    }

    /// Stops whatever is playing, then plays `sequence` from the start.
    pub fn restart(&self, sequence: Sequence, bpm: f32) -> Result<(), Disconnected> {
        self.send(Command::Restart { sequence, bpm })
    }

    /// Stops playback. See [`Scheduler::stop`](super::Scheduler::stop).
    pub fn stop(&self) -> Result<(), Disconnected> {
        self.send(Command::Stop)
    }

    fn send(&self, command: Command) -> Result<(), Disconnected> {
        self.sender.send(command).map_err(|_| Disconnected)
    }
}
