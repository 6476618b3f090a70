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

//! Schedule notes against a transport clock and a pool of voices.
//!
//! The [`Scheduler`] turns notes into calls on [`Voice`]s at the right time. Every note moves
//! through four states:
//!
//! * **Pending** - the note has an onset time that has not been reached yet.
//! * **Triggered** - the onset has been reached. A voice was acquired from the [`VoicePool`], its
//!   controls were set and it was triggered on.
//! * **Releasing** - the note has been held for its duration and its voice was triggered off. The
//!   voice keeps sounding through its release tail.
//! * **Done** - the voice reported that it finished and was returned to the pool.
//!
//! The render driver calls [`Scheduler::tick`] once per audio block with the length of that block.
//! A tick covers the window from the clock's current time up to the end of the block. Every
//! release and onset scheduled inside that window is handled in time order; releases come before
//! onsets at the same instant, and notes with the same onset are triggered in the order they were
//! added. Finally, releasing voices that have gone silent are returned to the pool.
//!
//! Notes are added relative to the current time with [`Scheduler::add_voice_from_now`], or in bulk
//! with [`Scheduler::play_sequence`]. Other threads use a [`Handle`], whose requests are queued
//! and applied at the start of the next tick.
//!
//! Nothing that goes wrong while scheduling stops playback. Invalid notes are rejected, notes
//! that find no free voice are dropped, and stale voice completions are ignored. Each case is
//! counted in [`Stats`]. A tick never logs; the render driver reads the stats between blocks and
//! reports whatever changed.
//!
//! # Examples
//!
//! ```
//! use cadenza::{
//!     note::Note,
//!     pool::{PoolConfig, VoicePool},
//!     scheduler::{Scheduler, Transition},
//!     sequence::Sequence,
//!     voice::SineEnv,
//! };
//! use std::sync::{Arc, Mutex};
//!
//! let mut sequence = Sequence::default();
//! sequence.add(Note::new(440.0).with_onset(0.0).with_duration(1.0));
//! sequence.add(Note::new(660.0).with_onset(1.0).with_duration(1.0));
//!
//! let onsets = Arc::new(Mutex::new(Vec::new()));
//! let mut scheduler = Scheduler::new(VoicePool::new(PoolConfig::fixed(4), SineEnv::new))
//!     .observer({
//!         let onsets = onsets.clone();
//!         move |time: f64, transition: Transition| {
//!             if let Transition::On { frequency, .. } = transition {
//!                 onsets.lock().unwrap().push((time, frequency));
//!             }
//!         }
//!     });
//!
//! scheduler.play_sequence(&sequence, 120.0);
//! for _ in 0..10 {
//!     scheduler.tick(0.1);
//! }
//!
//! assert_eq!(vec![(0.0, 440.0), (0.5, 660.0)], *onsets.lock().unwrap());
//! ```

mod handle;
mod timeline;

pub use handle::{Command, Disconnected, Handle};

use crate::{
    clock::TransportClock,
    note::InvalidNote,
    pool::{Acquired, VoiceId, VoicePool},
    sequence::Sequence,
    voice::{Render, Voice, VoiceParams},
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::mpsc};
use timeline::{Pending, Timeline};

/// Identifies a note for as long as the scheduler knows about it.
pub type NoteId = u64;

/// A note to play, timed in seconds from the moment it is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteRequest {
    pub params: VoiceParams,
    /// Seconds until the note is triggered on.
    pub delay: f64,
    /// Seconds the note is held before it is triggered off.
    pub duration: f64,
}

impl NoteRequest {
    pub fn new(params: VoiceParams, delay: f64, duration: f64) -> NoteRequest {
        NoteRequest {
            params,
            delay,
            duration,
        }
    }

    /// Checks that the request can be scheduled.
    ///
    /// # Errors
    ///
    /// Returns an error if the controls fail [`VoiceParams::validate`], the duration is not
    /// positive, the delay is negative, or a time is not finite.
    pub fn validate(&self) -> Result<(), InvalidNote> {
        self.params.validate()?;
        if !self.delay.is_finite() {
            return Err(InvalidNote::NotFinite("delay"));
        }
        if !self.duration.is_finite() {
            return Err(InvalidNote::NotFinite("duration"));
        }
        if self.duration <= 0.0 {
            return Err(InvalidNote::Duration(self.duration as f32));
        }
        if self.delay < 0.0 {
            return Err(InvalidNote::Delay(self.delay));
        }
        Ok(())
    }
}

/// A change in the state of a note, reported to the scheduler's [`Observer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// The note was triggered on.
    On {
        note: NoteId,
        voice: VoiceId,
        frequency: f32,
        amplitude: f32,
    },
    /// The note was triggered off and is releasing.
    Off { note: NoteId, voice: VoiceId },
    /// The note's voice finished and went back to the pool.
    Done { note: NoteId, voice: VoiceId },
    /// The note could not get a voice and was not played.
    Dropped { note: NoteId, frequency: f32 },
    /// The note's voice was taken for a newer note.
    Stolen { note: NoteId, voice: VoiceId },
    /// The note was still pending when playback stopped.
    Cancelled { note: NoteId },
}

/// Receives every [`Transition`] along with the scheduled time it happened at, in seconds.
///
/// Observers are called from the render thread. They should not block.
///
/// As a convenience, a blanket implementation of this trait is provided for closures implementing
/// `FnMut(f64, Transition)`.
pub trait Observer {
    fn observe(&mut self, time: f64, transition: Transition);
}

impl<F> Observer for F
where
    F: FnMut(f64, Transition),
{
    fn observe(&mut self, time: f64, transition: Transition) {
        self(time, transition)
    }
}

/// Running totals of what the scheduler has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub scheduled: u64,
    pub triggered: u64,
    pub released: u64,
    pub completed: u64,
    pub dropped: u64,
    pub stolen: u64,
    pub rejected: u64,
    pub cancelled: u64,
    pub stale_completions: u64,
    /// Ticks whose length was negative or not finite.
    pub ignored_ticks: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Triggered,
    Releasing,
}

#[derive(Debug, Clone, Copy)]
struct Active {
    id: NoteId,
    voice: VoiceId,
    off_time: f64,
    state: State,
}

/// Plays notes on a pool of voices. See [the module level documentation](self) for more.
pub struct Scheduler<V> {
    pool: VoicePool<V>,
    clock: TransportClock,
    timeline: Timeline,
    active: Vec<Active>,
    next_id: NoteId,
    stats: Stats,
    observer: Option<Box<dyn Observer + Send>>,
    sender: mpsc::Sender<Command>,
    receiver: mpsc::Receiver<Command>,
}

impl<V> fmt::Debug for Scheduler<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pool", &self.pool)
            .field("clock", &self.clock)
            .field("pending", &self.timeline.len())
            .field("active", &self.active.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<V> Scheduler<V> {
    /// Create a scheduler that plays notes on the voices in `pool`.
    ///
    /// The clock defaults to 512 frame blocks at 48 kHz.
    pub fn new(pool: VoicePool<V>) -> Scheduler<V> {
        let (sender, receiver) = mpsc::channel();
        Scheduler {
            active: Vec::with_capacity(pool.config().max),
            timeline: Timeline::with_capacity(1024),
            pool,
            clock: TransportClock::default(),
            next_id: 0,
            stats: Stats::default(),
            observer: None,
            sender,
            receiver,
        }
    }

    /// Replaces the transport clock.
    pub fn clock(mut self, clock: TransportClock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the observer that receives every note transition.
    pub fn observer(mut self, observer: impl Observer + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Returns a [`Handle`] for adding notes from other threads.
    pub fn handle(&self) -> Handle {
        Handle::new(self.sender.clone())
    }

    /// The current transport time, in seconds.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn transport(&self) -> &TransportClock {
        &self.clock
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn pool(&self) -> &VoicePool<V> {
        &self.pool
    }

    /// The number of notes waiting for their onset.
    pub fn pending_count(&self) -> usize {
        self.timeline.len()
    }

    /// The number of notes that are triggered or releasing.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Returns true when nothing is pending or sounding.
    pub fn is_idle(&self) -> bool {
        self.timeline.is_empty() && self.active.is_empty()
    }
}

impl<V: Voice> Scheduler<V> {
    /// Schedules a note to be triggered on `delay` seconds from now and triggered off `duration`
    /// seconds after that.
    ///
    /// # Errors
    ///
    /// Returns an error, and schedules nothing, if the request is invalid. See
    /// [`NoteRequest::validate`].
    pub fn add_voice_from_now(
        &mut self,
        params: VoiceParams,
        delay: f64,
        duration: f64,
    ) -> Result<NoteId, InvalidNote> {
        let result = self.schedule(NoteRequest::new(params, delay, duration));
        if let Err(err) = &result {
            log::warn!("rejecting note: {}", err);
        }
        result
    }

    fn schedule(&mut self, request: NoteRequest) -> Result<NoteId, InvalidNote> {
        if let Err(err) = request.validate() {
            self.stats.rejected += 1;
            return Err(err);
        }

        let id = self.next_id;
        self.next_id += 1;
        self.timeline.push(Pending {
            time: self.clock.now() + request.delay,
            id,
            request,
        });
        self.stats.scheduled += 1;
        Ok(id)
    }

    /// Schedules every note of `sequence` from now, converting beats into seconds at `bpm`.
    ///
    /// Returns the number of notes scheduled. Invalid notes are rejected individually; a tempo
    /// that is not positive rejects the whole sequence.
    pub fn play_sequence(&mut self, sequence: &Sequence, bpm: f32) -> usize {
        let scheduled = self.schedule_sequence(sequence, bpm);
        if scheduled < sequence.len() {
            log::warn!(
                "rejected {} of {} notes at {} bpm",
                sequence.len() - scheduled,
                sequence.len(),
                bpm
            );
        }
        log::debug!("scheduled {} notes at {} bpm", scheduled, bpm);
        scheduled
    }

    fn schedule_sequence(&mut self, sequence: &Sequence, bpm: f32) -> usize {
        if !(bpm.is_finite() && bpm > 0.0) {
            self.stats.rejected += sequence.len() as u64;
            return 0;
        }

        let seconds_per_beat = 60.0 / f64::from(bpm);
        let mut scheduled = 0;
        for note in sequence {
            if note.validate().is_err() {
                self.stats.rejected += 1;
                continue;
            }
            let request = NoteRequest::new(
                note.params(),
                f64::from(note.onset()) * seconds_per_beat,
                f64::from(note.duration()) * seconds_per_beat,
            );
            if self.schedule(request).is_ok() {
                scheduled += 1;
            }
        }
        scheduled
    }

    /// Stops playback.
    ///
    /// Pending notes are cancelled and never triggered. Triggered notes are triggered off right
    /// away so that their voices release instead of cutting out. Releasing notes carry on.
    /// Stopping again has no further effect.
    pub fn stop(&mut self) {
        let cancelled = self.halt();
        if cancelled > 0 {
            log::info!("stopped, cancelled {} pending notes", cancelled);
        }
    }

    // Cancelled notes are reported earliest first.
    fn halt(&mut self) -> u64 {
        let now = self.clock.now();

        let mut cancelled = 0;
        for pending in self.timeline.drain() {
            cancelled += 1;
            if let Some(observer) = self.observer.as_mut() {
                observer.observe(now, Transition::Cancelled { note: pending.id });
            }
        }
        self.stats.cancelled += cancelled;

        let mut index = 0;
        while index < self.active.len() {
            if self.active[index].state == State::Triggered && self.release_note(index, now) {
                continue;
            }
            index += 1;
        }
        cancelled
    }

    /// Advances the scheduler by one block of `elapsed` seconds.
    ///
    /// Queued requests from [`Handle`]s are applied first, at the current time. Then every
    /// release and onset that falls before the end of the block is handled, the clock moves to
    /// the end of the block, and finished voices are returned to the pool. Non-positive or
    /// non-finite `elapsed` values are treated as an empty block.
    pub fn tick(&mut self, elapsed: f64) {
        self.drain_commands();

        if !(elapsed.is_finite() && elapsed >= 0.0) {
            self.stats.ignored_ticks += 1;
        }
        let start = self.clock.now();
        let end = self.clock.advance(elapsed);
        if end > start {
            self.run_window(end);
        }
        self.reap(end);
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.receiver.try_recv() {
            match command {
                Command::Note(request) => {
                    let _ = self.schedule(request);
                }
                Command::Sequence { sequence, bpm } => {
                    self.schedule_sequence(&sequence, bpm);
                }
                Command::Restart { sequence, bpm } => {
                    self.halt();
                    self.schedule_sequence(&sequence, bpm);
                }
                Command::Stop => {
                    self.halt();
                }
            }
        }
    }

    fn run_window(&mut self, end: f64) {
        loop {
            let next_off = self.next_release(end);
            let next_on = self.timeline.next_time().filter(|&time| time < end);

            match (next_off, next_on) {
                (Some((index, off_time)), Some(on_time)) if off_time <= on_time => {
                    self.release_note(index, off_time);
                }
                (Some((index, off_time)), None) => {
                    self.release_note(index, off_time);
                }
                (_, Some(_)) => {
                    if let Some(pending) = self.timeline.pop_before(end) {
                        self.trigger(pending);
                    }
                }
                (None, None) => break,
            }
        }
    }

    // The triggered note with the earliest release before `end`, ties going to the older note.
    fn next_release(&self, end: f64) -> Option<(usize, f64)> {
        self.active
            .iter()
            .enumerate()
            .filter(|(_, active)| active.state == State::Triggered && active.off_time < end)
            .min_by(|(_, a), (_, b)| {
                (a.off_time, a.id)
                    .partial_cmp(&(b.off_time, b.id))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(index, active)| (index, active.off_time))
    }

    fn trigger(&mut self, pending: Pending) {
        let Pending { time, id, request } = pending;

        let Acquired { id: voice, stolen } = match self.pool.acquire() {
            Ok(acquired) => acquired,
            Err(_) => {
                self.stats.dropped += 1;
                self.notify(
                    time,
                    Transition::Dropped {
                        note: id,
                        frequency: request.params.frequency,
                    },
                );
                return;
            }
        };

        if let Some(stolen) = stolen {
            if let Some(index) = self.active.iter().position(|active| active.voice == stolen) {
                let victim = self.active.swap_remove(index);
                self.stats.stolen += 1;
                self.notify(
                    time,
                    Transition::Stolen {
                        note: victim.id,
                        voice: stolen,
                    },
                );
            }
        }

        match self.pool.get_mut(voice) {
            Some(v) => {
                request.params.apply(v);
                v.trigger_on();
            }
            None => {
                self.stats.dropped += 1;
                self.notify(
                    time,
                    Transition::Dropped {
                        note: id,
                        frequency: request.params.frequency,
                    },
                );
                return;
            }
        }

        self.active.push(Active {
            id,
            voice,
            off_time: time + request.duration,
            state: State::Triggered,
        });
        self.stats.triggered += 1;
        self.notify(
            time,
            Transition::On {
                note: id,
                voice,
                frequency: request.params.frequency,
                amplitude: request.params.amplitude,
            },
        );
    }

    // Triggers the note off. Voices that are silent straight away are returned to the pool at
    // once, in which case the note is removed and this returns true.
    fn release_note(&mut self, index: usize, time: f64) -> bool {
        let active = &mut self.active[index];
        active.state = State::Releasing;
        let (id, voice) = (active.id, active.voice);

        let finished = match self.pool.get_mut(voice) {
            Some(v) => {
                v.trigger_off();
                v.is_finished()
            }
            None => true,
        };
        self.stats.released += 1;
        self.notify(time, Transition::Off { note: id, voice });

        if finished {
            self.complete(index, time);
        }
        finished
    }

    fn reap(&mut self, time: f64) {
        let mut index = 0;
        while index < self.active.len() {
            let active = self.active[index];
            let finished = active.state == State::Releasing
                && self.pool.get(active.voice).map_or(true, |v| v.is_finished());
            if finished {
                self.complete(index, time);
            } else {
                index += 1;
            }
        }
    }

    fn complete(&mut self, index: usize, time: f64) {
        let active = self.active.swap_remove(index);
        match self.pool.release(active.voice) {
            Ok(()) => {
                self.stats.completed += 1;
                self.notify(
                    time,
                    Transition::Done {
                        note: active.id,
                        voice: active.voice,
                    },
                );
            }
            Err(_) => self.stats.stale_completions += 1,
        }
    }

    fn notify(&mut self, time: f64, transition: Transition) {
        if let Some(observer) = self.observer.as_mut() {
            observer.observe(time, transition);
        }
    }
}

impl<V: Voice + Render> Scheduler<V> {
    /// Ticks the scheduler for one block and renders every active voice into `out`.
    ///
    /// `out` holds interleaved frames of `channels` samples and is cleared first. The block
    /// length passed to [`tick`](Scheduler::tick) is derived from the number of frames and the
    /// clock's sample rate.
    pub fn process(&mut self, out: &mut [f32], channels: usize) {
        for sample in out.iter_mut() {
            *sample = 0.0;
        }
        if channels == 0 {
            return;
        }

        let frames = out.len() / channels;
        self.tick(self.clock.frames_to_seconds(frames));

        let sample_rate = self.clock.sample_rate() as f32;
        for (_, voice) in self.pool.active_mut() {
            voice.render(out, channels, sample_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        note::Note,
        pool::{ExhaustionPolicy, PoolConfig},
        voice::SineEnv,
    };
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    // Finishes as soon as it is triggered off.
    #[derive(Debug, Default)]
    struct Click {
        on: bool,
        released: bool,
    }

    impl Voice for Click {
        fn set_control(&mut self, _: &str, _: f32) {}

        fn trigger_on(&mut self) {
            self.on = true;
            self.released = false;
        }

        fn trigger_off(&mut self) {
            self.released = true;
        }

        fn is_finished(&self) -> bool {
            !self.on || self.released
        }
    }

    type Log = Arc<Mutex<Vec<(f64, Transition)>>>;

    fn scheduler(config: PoolConfig) -> (Scheduler<Click>, Log) {
        let log = Log::default();
        let scheduler = Scheduler::new(VoicePool::new(config, Click::default)).observer({
            let log = log.clone();
            move |time: f64, transition: Transition| {
                log.lock().unwrap().push((time, transition))
            }
        });
        (scheduler, log)
    }

    fn onsets(log: &Log) -> Vec<(f64, f32)> {
        log.lock()
            .unwrap()
            .iter()
            .filter_map(|(time, transition)| match transition {
                Transition::On { frequency, .. } => Some((*time, *frequency)),
                _ => None,
            })
            .collect()
    }

    fn offs(log: &Log) -> Vec<(f64, NoteId)> {
        log.lock()
            .unwrap()
            .iter()
            .filter_map(|(time, transition)| match transition {
                Transition::Off { note, .. } => Some((*time, *note)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn single_note_at_sixty_bpm() {
        let (mut scheduler, log) = scheduler(PoolConfig::fixed(4));
        let sequence: Sequence = vec![Note::new(440.0).with_duration(1.0)]
            .into_iter()
            .collect();

        assert_eq!(1, scheduler.play_sequence(&sequence, 60.0));
        for _ in 0..8 {
            scheduler.tick(0.25);
        }

        let log = log.lock().unwrap().clone();
        let voice = match log[0].1 {
            Transition::On { voice, .. } => voice,
            other => panic!("expected on, got {:?}", other),
        };
        assert_eq!(
            vec![
                (
                    0.0,
                    Transition::On {
                        note: 0,
                        voice,
                        frequency: 440.0,
                        amplitude: 0.2
                    }
                ),
                (1.0, Transition::Off { note: 0, voice }),
                (1.0, Transition::Done { note: 0, voice }),
            ],
            log
        );
        assert!(scheduler.is_idle());
    }

    #[test]
    fn beats_convert_at_tempo() {
        let (mut scheduler, log) = scheduler(PoolConfig::fixed(4));
        let sequence: Sequence = vec![
            Note::new(440.0).with_onset(0.0),
            Note::new(550.0).with_onset(0.5),
        ]
        .into_iter()
        .collect();

        scheduler.play_sequence(&sequence, 120.0);
        for _ in 0..4 {
            scheduler.tick(0.125);
        }
        assert_eq!(vec![(0.0, 440.0), (0.25, 550.0)], onsets(&log));
    }

    #[test]
    fn identical_onsets_keep_insertion_order() {
        let (mut scheduler, log) = scheduler(PoolConfig::fixed(8));
        let sequence: Sequence = [300.0, 100.0, 200.0]
            .iter()
            .map(|&frequency| Note::new(frequency).with_onset(1.0))
            .collect();

        scheduler.play_sequence(&sequence, 60.0);
        scheduler.tick(2.0);
        assert_eq!(
            vec![(1.0, 300.0), (1.0, 100.0), (1.0, 200.0)],
            onsets(&log)
        );
    }

    #[test]
    fn releases_in_time_order_within_a_block() {
        let (mut scheduler, log) = scheduler(PoolConfig::fixed(8));
        scheduler
            .add_voice_from_now(VoiceParams::new(100.0), 0.0, 0.75)
            .unwrap();
        scheduler
            .add_voice_from_now(VoiceParams::new(200.0), 0.0, 0.25)
            .unwrap();
        scheduler.tick(1.0);
        assert_eq!(vec![(0.25, 1), (0.75, 0)], offs(&log));
    }

    #[test]
    fn release_before_onset_frees_voice_for_reuse() {
        let (mut scheduler, log) = scheduler(PoolConfig::fixed(1).policy(ExhaustionPolicy::Drop));
        scheduler
            .add_voice_from_now(VoiceParams::new(100.0), 0.0, 0.5)
            .unwrap();
        scheduler
            .add_voice_from_now(VoiceParams::new(200.0), 0.5, 0.5)
            .unwrap();

        scheduler.tick(0.5);
        scheduler.tick(0.5);
        scheduler.tick(0.5);

        assert_eq!(vec![(0.0, 100.0), (0.5, 200.0)], onsets(&log));
        assert_eq!(0, scheduler.stats().dropped);
    }

    #[test]
    fn exhausted_pool_drops_note() {
        let (mut scheduler, log) = scheduler(PoolConfig::fixed(1).policy(ExhaustionPolicy::Drop));
        scheduler
            .add_voice_from_now(VoiceParams::new(100.0), 0.0, 1.0)
            .unwrap();
        scheduler
            .add_voice_from_now(VoiceParams::new(200.0), 0.25, 1.0)
            .unwrap();
        scheduler.tick(0.5);

        assert_eq!(vec![(0.0, 100.0)], onsets(&log));
        assert_eq!(1, scheduler.stats().dropped);
        assert_eq!(1, scheduler.pool().active_count());
        assert_eq!(1, scheduler.active_count());

        for _ in 0..4 {
            scheduler.tick(0.5);
        }
        assert!(scheduler.is_idle());
        assert_eq!(0, scheduler.pool().active_count());
    }

    #[test]
    fn invalid_notes_are_rejected() {
        let (mut scheduler, _) = scheduler(PoolConfig::fixed(1));
        assert_eq!(
            Err(InvalidNote::Frequency(0.0)),
            scheduler.add_voice_from_now(VoiceParams::new(0.0), 0.0, 1.0)
        );
        assert_eq!(
            Err(InvalidNote::Duration(0.0)),
            scheduler.add_voice_from_now(VoiceParams::new(100.0), 0.0, 0.0)
        );
        assert_eq!(
            Err(InvalidNote::Delay(-1.0)),
            scheduler.add_voice_from_now(VoiceParams::new(100.0), -1.0, 1.0)
        );

        let sequence: Sequence = vec![Note::new(100.0), Note::new(-5.0)].into_iter().collect();
        assert_eq!(1, scheduler.play_sequence(&sequence, 60.0));
        assert_eq!(0, scheduler.play_sequence(&sequence, 0.0));

        let stats = scheduler.stats();
        assert_eq!(6, stats.rejected);
        assert_eq!(1, stats.scheduled);
    }

    #[test]
    fn non_finite_controls_never_reach_the_mix() {
        let mut scheduler = Scheduler::new(VoicePool::new(PoolConfig::fixed(2), SineEnv::new))
            .clock(TransportClock::new(8_192, 128));
        let bad = [
            (VoiceParams::new(220.0).amplitude(f32::NAN), "amplitude"),
            (VoiceParams::new(220.0).pan(f32::INFINITY), "pan"),
            (
                VoiceParams {
                    sustain: f32::NAN,
                    ..VoiceParams::new(220.0)
                },
                "sustain",
            ),
        ];
        for &(params, field) in bad.iter() {
            assert_eq!(
                Err(InvalidNote::NotFinite(field)),
                scheduler.add_voice_from_now(params, 0.0, 1.0)
            );
        }
        let negative_attack = VoiceParams {
            attack: -0.5,
            ..VoiceParams::new(220.0)
        };
        assert_eq!(
            Err(InvalidNote::Negative("attack", -0.5)),
            scheduler.add_voice_from_now(negative_attack, 0.0, 1.0)
        );

        // The same request arriving through a handle is dropped at the next tick.
        scheduler
            .handle()
            .add_voice_from_now(VoiceParams::new(220.0).amplitude(f32::NAN), 0.0, 1.0)
            .unwrap();
        scheduler
            .add_voice_from_now(VoiceParams::new(440.0), 0.0, 1.0)
            .unwrap();

        let mut block = vec![0.0; 256];
        scheduler.process(&mut block, 2);
        assert!(block.iter().all(|sample| sample.is_finite()));
        assert!(block.iter().any(|&sample| sample != 0.0));
        assert_eq!(5, scheduler.stats().rejected);
        assert_eq!(1, scheduler.stats().triggered);
    }

    #[test]
    fn stop_cancels_pending_and_releases_triggered() {
        let (mut scheduler, log) = scheduler(PoolConfig::fixed(4));
        scheduler
            .add_voice_from_now(VoiceParams::new(100.0), 0.0, 10.0)
            .unwrap();
        scheduler
            .add_voice_from_now(VoiceParams::new(200.0), 5.0, 1.0)
            .unwrap();
        scheduler.tick(1.0);

        scheduler.stop();
        scheduler.stop();

        let stats = scheduler.stats();
        assert_eq!(1, stats.cancelled);
        assert_eq!(1, stats.released);
        assert_eq!(vec![(1.0, 0)], offs(&log));

        scheduler.tick(1.0);
        assert!(scheduler.is_idle());
        assert_eq!(vec![(0.0, 100.0)], onsets(&log));
    }

    #[test]
    fn handle_requests_apply_on_next_tick() {
        let (mut scheduler, log) = scheduler(PoolConfig::fixed(4));
        scheduler.tick(1.0);

        let handle = scheduler.handle();
        std::thread::spawn(move || {
            handle
                .add_voice_from_now(VoiceParams::new(330.0), 0.5, 0.5)
                .unwrap();
        })
        .join()
        .unwrap();

        assert!(onsets(&log).is_empty());
        scheduler.tick(1.0);
        assert_eq!(vec![(1.5, 330.0)], onsets(&log));
    }

    #[test]
    fn restart_stops_before_playing_again() {
        let (mut scheduler, log) = scheduler(PoolConfig::fixed(4));
        scheduler
            .add_voice_from_now(VoiceParams::new(100.0), 0.0, 10.0)
            .unwrap();
        scheduler
            .add_voice_from_now(VoiceParams::new(200.0), 5.0, 1.0)
            .unwrap();
        scheduler.tick(1.0);
        log.lock().unwrap().clear();

        let sequence: Sequence = vec![
            Note::new(300.0).with_duration(1.0),
            Note::new(400.0).with_onset(1.0).with_duration(2.0),
        ]
        .into_iter()
        .collect();
        scheduler.handle().restart(sequence, 60.0).unwrap();
        scheduler.tick(1.0);
        scheduler.tick(1.0);

        let events: Vec<(f64, &str, NoteId)> = log
            .lock()
            .unwrap()
            .iter()
            .map(|&(time, transition)| match transition {
                Transition::On { note, .. } => (time, "on", note),
                Transition::Off { note, .. } => (time, "off", note),
                Transition::Done { note, .. } => (time, "done", note),
                Transition::Cancelled { note } => (time, "cancelled", note),
                Transition::Dropped { note, .. } => (time, "dropped", note),
                Transition::Stolen { note, .. } => (time, "stolen", note),
            })
            .collect();
        assert_eq!(
            vec![
                (1.0, "cancelled", 1),
                (1.0, "off", 0),
                (1.0, "done", 0),
                (1.0, "on", 2),
                (2.0, "off", 2),
                (2.0, "done", 2),
                (2.0, "on", 3),
            ],
            events
        );

        let stats = scheduler.stats();
        assert_eq!(4, stats.scheduled);
        assert_eq!(1, stats.cancelled);
        assert_eq!(3, stats.triggered);
        assert_eq!(2, stats.released);
        assert_eq!(2, stats.completed);
    }

    #[test]
    fn stop_cancels_in_time_order() {
        let (mut scheduler, log) = scheduler(PoolConfig::fixed(4));
        for &delay in [3.0, 1.0, 2.0, 1.0].iter() {
            scheduler
                .add_voice_from_now(VoiceParams::new(100.0), delay, 1.0)
                .unwrap();
        }
        scheduler.stop();

        let cancelled: Vec<NoteId> = log
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, transition)| match transition {
                Transition::Cancelled { note } => Some(*note),
                _ => None,
            })
            .collect();
        assert_eq!(vec![1, 3, 2, 0], cancelled);
    }

    #[test]
    fn zero_and_negative_ticks_do_not_move_time() {
        let (mut scheduler, log) = scheduler(PoolConfig::fixed(1));
        scheduler
            .add_voice_from_now(VoiceParams::new(100.0), 0.0, 1.0)
            .unwrap();
        scheduler.tick(0.0);
        scheduler.tick(-1.0);
        scheduler.tick(f64::NAN);
        assert_eq!(0.0, scheduler.now());
        assert_eq!(2, scheduler.stats().ignored_ticks);
        assert!(onsets(&log).is_empty());

        scheduler.tick(0.5);
        assert_eq!(vec![(0.0, 100.0)], onsets(&log));
    }

    #[test]
    fn handle_reports_disconnect() {
        let (scheduler, _) = scheduler(PoolConfig::fixed(1));
        let handle = scheduler.handle();
        drop(scheduler);
        assert_eq!(Err(Disconnected), handle.stop());
    }
}
