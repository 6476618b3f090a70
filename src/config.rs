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

//! Runtime settings.
//!
//! Settings are stored as JSON. Every field is optional and falls back to the value returned by
//! [`Config::default`]. `pool.initial` is capped at `pool.max`, so a smaller pool can be asked
//! for by giving only its maximum.
//!
//! ```
//! use cadenza::{config::Config, pool::ExhaustionPolicy};
//!
//! let json = r#"{ "bpm": 120, "pool": { "max": 8, "policy": "drop" } }"#;
//! let config = Config::from_reader(json.as_bytes())?;
//!
//! assert_eq!(120.0, config.bpm);
//! assert_eq!(8, config.pool.max);
//! assert_eq!(8, config.pool.initial);
//! assert_eq!(ExhaustionPolicy::Drop, config.pool.policy);
//! assert_eq!(48_000, config.sample_rate);
//! # cadenza::config::Result::Ok(())
//! ```

use crate::{clock::TransportClock, pool::PoolConfig};
use serde::{Deserialize, Serialize};
use std::{
    env,
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
};
use thiserror::Error;

/// The environment variable naming a config file for [`Config::from_env`].
pub const CONFIG_VAR: &str = "CADENZA_CONFIG";

/// A specialized [`Result`] type for loading settings.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned when settings cannot be loaded.
#[derive(Debug, Error)]
pub enum Error {
    #[error("opening config file {}: {}", .path.display(), .source)]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("decoding config: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Where the OSC listener binds, if it runs at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OscConfig {
    pub enabled: bool,
    pub address: String,
}

impl Default for OscConfig {
    fn default() -> OscConfig {
        OscConfig {
            enabled: true,
            address: "127.0.0.1:16447".into(),
        }
    }
}

/// Settings for a render or playback run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Frames per second of rendered audio.
    pub sample_rate: u32,
    /// Frames rendered per scheduler tick.
    pub block_size: usize,
    /// Tempo of the score.
    pub bpm: f32,
    /// Multiplies the frequency of every note in the score.
    pub transpose: f32,
    pub pool: PoolConfig,
    pub osc: OscConfig,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            sample_rate: 48_000,
            block_size: 512,
            bpm: 77.0,
            transpose: 1.0,
            pool: PoolConfig::default(),
            osc: OscConfig::default(),
        }
    }
}

impl Config {
    /// Reads settings from JSON and validates them.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid JSON or the settings fail [`Config::validate`].
    pub fn from_reader<R: Read>(read: R) -> Result<Config> {
        let mut config: Config = serde_json::from_reader(read).map_err(Error::Decode)?;
        config.pool.initial = config.pool.initial.min(config.pool.max);
        config.validate()?;
        Ok(config)
    }

    /// Reads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_owned(),
            source,
        })?;
        Config::from_reader(BufReader::new(file))
    }

    /// Reads settings from the file named by the `CADENZA_CONFIG` environment variable.
    ///
    /// Returns the defaults if the variable is not set.
    pub fn from_env() -> Result<Config> {
        match env::var_os(CONFIG_VAR) {
            Some(path) => {
                log::info!("loading config from {:?}", path);
                Config::load(path)
            }
            None => Ok(Config::default()),
        }
    }

    /// Checks that the settings can drive a scheduler.
    ///
    /// # Errors
    ///
    /// Returns an error if the sample rate, block size, bpm or transposition is not positive, or
    /// if the pool could never hold a voice.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Invalid("sample_rate must be positive"));
        }
        if self.block_size == 0 {
            return Err(Error::Invalid("block_size must be positive"));
        }
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            return Err(Error::Invalid("bpm must be positive"));
        }
        if !(self.transpose.is_finite() && self.transpose > 0.0) {
            return Err(Error::Invalid("transpose must be positive"));
        }
        if self.pool.max == 0 {
            return Err(Error::Invalid("pool.max must be positive"));
        }
        if self.pool.max < self.pool.initial {
            return Err(Error::Invalid("pool.max must be at least pool.initial"));
        }
        Ok(())
    }

    /// A clock running at these settings.
    pub fn clock(&self) -> TransportClock {
        TransportClock::new(self.sample_rate, self.block_size)
    }
}
