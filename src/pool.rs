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

//! A pool of reusable voices.
//!
//! [`VoicePool`] owns every voice. A voice is either idle or active. [`VoicePool::acquire`] hands
//! out an idle voice as a [`VoiceId`], and [`VoicePool::release`] takes it back once the voice has
//! gone silent.
//!
//! When every voice is active the pool grows, one voice at a time, until it holds
//! [`PoolConfig::max`] voices. After that it follows its [`ExhaustionPolicy`]: by default it steals
//! the voice that was acquired longest ago. Growing calls the voice factory and allocates, so a
//! pool used from an audio callback should be created with `initial` equal to `max`.
//!
//! Every [`VoiceId`] carries a generation that changes whenever its slot is released or stolen.
//! Old ids are rejected, so releasing a voice twice, or releasing a voice that was stolen, is
//! reported and has no effect.
//!
//! # Examples
//!
//! ```
//! use cadenza::{
//!     pool::{PoolConfig, VoicePool},
//!     voice::SineEnv,
//! };
//!
//! let mut pool = VoicePool::new(PoolConfig::fixed(2), SineEnv::new);
//!
//! let first = pool.acquire()?.id;
//! assert_eq!(1, pool.active_count());
//!
//! pool.release(first)?;
//! assert!(pool.release(first).is_err());
//! assert_eq!(0, pool.active_count());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What the pool does when every voice is active and it cannot grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Reuse the voice that was acquired longest ago.
    StealOldest,
    /// Refuse the request.
    Drop,
}

impl Default for ExhaustionPolicy {
    /// Returns `ExhaustionPolicy::StealOldest`.
    fn default() -> ExhaustionPolicy {
        ExhaustionPolicy::StealOldest
    }
}

/// Sizing and exhaustion behavior of a [`VoicePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Voices created up front.
    pub initial: usize,
    /// The most voices the pool will ever hold.
    pub max: usize,
    pub policy: ExhaustionPolicy,
}

impl Default for PoolConfig {
    fn default() -> PoolConfig {
        PoolConfig {
            initial: 16,
            max: 64,
            policy: ExhaustionPolicy::default(),
        }
    }
}

impl PoolConfig {
    /// A pool of exactly `voices` voices, all created up front, that steals when full.
    pub fn fixed(voices: usize) -> PoolConfig {
        PoolConfig {
            initial: voices,
            max: voices,
            policy: ExhaustionPolicy::StealOldest,
        }
    }

    pub fn policy(mut self, policy: ExhaustionPolicy) -> PoolConfig {
        self.policy = policy;
        self
    }
}

/// A handle to an active voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId {
    index: usize,
    generation: u32,
}

impl VoiceId {
    /// The slot the voice lives in. Slots are reused, ids are not.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// A voice handed out by [`VoicePool::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquired {
    pub id: VoiceId,
    /// The id of the voice that was stolen to satisfy the request, if any. That id is no longer
    /// valid.
    pub stolen: Option<VoiceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AcquireError {
    #[error("all {0} voices are busy")]
    Exhausted(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReleaseError {
    #[error("voice {0} is not active, it was already released or stolen")]
    Stale(VoiceId),
}

struct Slot<V> {
    voice: V,
    generation: u32,
    // Acquisition stamp while active; lower is older.
    active_since: Option<u64>,
}

/// A set of reusable voices. See [the module level documentation](self) for more.
pub struct VoicePool<V> {
    slots: Vec<Slot<V>>,
    idle: Vec<usize>,
    config: PoolConfig,
    factory: Box<dyn FnMut() -> V + Send>,
    stamp: u64,
}

impl<V> fmt::Debug for VoicePool<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoicePool")
            .field("voices", &self.slots.len())
            .field("idle", &self.idle.len())
            .field("config", &self.config)
            .finish()
    }
}

impl<V> VoicePool<V> {
    /// Creates a pool, calling `factory` once for each of the `initial` voices.
    ///
    /// `max` is raised to `initial` if it is smaller.
    pub fn new<F>(config: PoolConfig, factory: F) -> VoicePool<V>
    where
        F: FnMut() -> V + Send + 'static,
    {
        let config = PoolConfig {
            max: config.max.max(config.initial),
            ..config
        };
        let mut pool = VoicePool {
            slots: Vec::with_capacity(config.max),
            idle: Vec::with_capacity(config.max),
            config,
            factory: Box::new(factory),
            stamp: 0,
        };
        for _ in 0..config.initial {
            pool.grow();
        }
        // Hand out low slots first.
        pool.idle.reverse();
        pool
    }

    fn grow(&mut self) -> usize {
        let index = self.slots.len();
        self.slots.push(Slot {
            voice: (self.factory)(),
            generation: 0,
            active_since: None,
        });
        self.idle.push(index);
        index
    }

    /// Takes an idle voice, growing or stealing if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if every voice is active, the pool is at its maximum size, and the policy
    /// is [`ExhaustionPolicy::Drop`].
    pub fn acquire(&mut self) -> Result<Acquired, AcquireError> {
        self.stamp += 1;
        let stamp = self.stamp;

        if self.idle.is_empty() && self.slots.len() < self.config.max {
            self.grow();
        }

        if let Some(index) = self.idle.pop() {
            let slot = &mut self.slots[index];
            slot.active_since = Some(stamp);
            return Ok(Acquired {
                id: VoiceId {
                    index,
                    generation: slot.generation,
                },
                stolen: None,
            });
        }

        match self.config.policy {
            ExhaustionPolicy::Drop => Err(AcquireError::Exhausted(self.slots.len())),
            ExhaustionPolicy::StealOldest => {
                let index = self
                    .slots
                    .iter()
                    .enumerate()
                    .filter_map(|(index, slot)| slot.active_since.map(|since| (since, index)))
                    .min()
                    .map(|(_, index)| index)
                    .ok_or(AcquireError::Exhausted(0))?;
                let slot = &mut self.slots[index];
                let stolen = VoiceId {
                    index,
                    generation: slot.generation,
                };
                slot.generation = slot.generation.wrapping_add(1);
                slot.active_since = Some(stamp);
                Ok(Acquired {
                    id: VoiceId {
                        index,
                        generation: slot.generation,
                    },
                    stolen: Some(stolen),
                })
            }
        }
    }

    /// Returns an active voice to the idle set.
    ///
    /// # Errors
    ///
    /// Returns an error, and changes nothing, if `id` is not active.
    pub fn release(&mut self, id: VoiceId) -> Result<(), ReleaseError> {
        match self.slots.get_mut(id.index) {
            Some(slot) if slot.generation == id.generation && slot.active_since.is_some() => {
                slot.active_since = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.idle.push(id.index);
                Ok(())
            }
            _ => Err(ReleaseError::Stale(id)),
        }
    }

    pub fn is_active(&self, id: VoiceId) -> bool {
        self.get(id).is_some()
    }

    /// Borrows an active voice.
    pub fn get(&self, id: VoiceId) -> Option<&V> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation && slot.active_since.is_some())
            .map(|slot| &slot.voice)
    }

    /// Mutably borrows an active voice.
    pub fn get_mut(&mut self, id: VoiceId) -> Option<&mut V> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation && slot.active_since.is_some())
            .map(|slot| &mut slot.voice)
    }

    /// Iterates over every active voice.
    pub fn active_mut(&mut self) -> impl Iterator<Item = (VoiceId, &mut V)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter(|(_, slot)| slot.active_since.is_some())
            .map(|(index, slot)| {
                (
                    VoiceId {
                        index,
                        generation: slot.generation,
                    },
                    &mut slot.voice,
                )
            })
    }

    pub fn active_count(&self) -> usize {
        self.slots.len() - self.idle.len()
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// The number of voices currently in the pool.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pool(config: PoolConfig) -> VoicePool<()> {
        VoicePool::new(config, || ())
    }

    fn assert_consistent<V>(pool: &VoicePool<V>) {
        let active = pool
            .slots
            .iter()
            .filter(|slot| slot.active_since.is_some())
            .count();
        assert_eq!(pool.active_count(), active);
        assert_eq!(pool.len(), active + pool.idle_count());
        for &index in pool.idle.iter() {
            assert!(pool.slots[index].active_since.is_none());
        }
        assert!(pool.len() <= pool.config().max);
    }

    #[test]
    fn release_then_acquire_reuses_slot() {
        let mut pool = pool(PoolConfig::fixed(4));
        let first = pool.acquire().unwrap().id;
        pool.release(first).unwrap();
        let second = pool.acquire().unwrap().id;
        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert_consistent(&pool);
    }

    #[test]
    fn double_release_is_rejected() {
        let mut pool = pool(PoolConfig::fixed(2));
        let id = pool.acquire().unwrap().id;
        assert_eq!(Ok(()), pool.release(id));
        assert_eq!(Err(ReleaseError::Stale(id)), pool.release(id));
        assert_eq!(0, pool.active_count());
        assert_eq!(2, pool.idle_count());
        assert_consistent(&pool);
    }

    #[test]
    fn stale_release_does_not_free_new_owner() {
        let mut pool = pool(PoolConfig::fixed(1));
        let old = pool.acquire().unwrap().id;
        pool.release(old).unwrap();
        let new = pool.acquire().unwrap().id;

        assert!(pool.release(old).is_err());
        assert!(pool.is_active(new));
        assert_consistent(&pool);
    }

    #[test]
    fn grows_until_max() {
        let mut pool = pool(PoolConfig {
            initial: 1,
            max: 3,
            policy: ExhaustionPolicy::Drop,
        });
        assert_eq!(1, pool.len());
        for _ in 0..3 {
            pool.acquire().unwrap();
        }
        assert_eq!(3, pool.len());
        assert_eq!(Err(AcquireError::Exhausted(3)), pool.acquire());
        assert_eq!(3, pool.active_count());
        assert_consistent(&pool);
    }

    #[test]
    fn steals_oldest() {
        let mut pool = pool(PoolConfig::fixed(2));
        let a = pool.acquire().unwrap().id;
        let b = pool.acquire().unwrap().id;

        let c = pool.acquire().unwrap();
        assert_eq!(Some(a), c.stolen);
        assert_eq!(a.index(), c.id.index());
        assert!(!pool.is_active(a));
        assert!(pool.is_active(b));
        assert!(pool.is_active(c.id));

        let d = pool.acquire().unwrap();
        assert_eq!(Some(b), d.stolen);

        assert!(pool.release(a).is_err());
        assert_eq!(2, pool.active_count());
        assert_consistent(&pool);
    }

    #[test]
    fn max_below_initial_is_raised() {
        let pool = pool(PoolConfig {
            initial: 4,
            max: 2,
            policy: ExhaustionPolicy::Drop,
        });
        assert_eq!(4, pool.config().max);
        assert_eq!(4, pool.len());
    }

    #[test]
    fn empty_pool_that_cannot_grow() {
        let mut stealing = pool(PoolConfig::fixed(0));
        assert_eq!(Err(AcquireError::Exhausted(0)), stealing.acquire());
    }

    #[test]
    fn active_mut_yields_only_active() {
        let mut pool = VoicePool::new(PoolConfig::fixed(3), || 0_u32);
        let a = pool.acquire().unwrap().id;
        let _b = pool.acquire().unwrap().id;
        pool.release(a).unwrap();
        for (_, voice) in pool.active_mut() {
            *voice += 1;
        }
        let total: u32 = pool.slots.iter().map(|slot| slot.voice).sum();
        assert_eq!(1, total);
    }
}
