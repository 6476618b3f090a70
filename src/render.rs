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

//! Offline rendering to WAV files.

use crate::{
    scheduler::Scheduler,
    voice::{Render, Voice},
};
use std::{
    io::{Seek, Write},
    path::Path,
};
use thiserror::Error;

/// Channels written by [`to_wav`].
pub const CHANNELS: u16 = 2;

/// A specialized [`Result`] type for rendering.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("writing WAV: {0}")]
    Wav(#[from] hound::Error),
}

/// What was written by a render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rendered {
    pub frames: usize,
    /// The largest absolute sample value before clipping.
    pub peak: f32,
    /// Whether the scheduler ran out of work before `limit` was reached.
    pub finished: bool,
}

impl Rendered {
    pub fn seconds(&self, sample_rate: u32) -> f64 {
        self.frames as f64 / f64::from(sample_rate)
    }
}

/// Renders the scheduler block by block into a 16 bit stereo WAV file at `path`.
///
/// Rendering stops once nothing is pending or sounding, or once the clock reaches `limit`
/// seconds.
pub fn to_wav<V, P>(scheduler: &mut Scheduler<V>, path: P, limit: f64) -> Result<Rendered>
where
    V: Voice + Render,
    P: AsRef<Path>,
{
    let writer = hound::WavWriter::create(path, spec(scheduler))?;
    write_wav(scheduler, writer, limit)
}

/// Like [`to_wav`], but writes to any seekable writer.
pub fn to_writer<V, W>(scheduler: &mut Scheduler<V>, write: W, limit: f64) -> Result<Rendered>
where
    V: Voice + Render,
    W: Write + Seek,
{
    let writer = hound::WavWriter::new(write, spec(scheduler))?;
    write_wav(scheduler, writer, limit)
}

fn spec<V>(scheduler: &Scheduler<V>) -> hound::WavSpec {
    hound::WavSpec {
        channels: CHANNELS,
        sample_rate: scheduler.transport().sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn write_wav<V, W>(
    scheduler: &mut Scheduler<V>,
    mut writer: hound::WavWriter<W>,
    limit: f64,
) -> Result<Rendered>
where
    V: Voice + Render,
    W: Write + Seek,
{
    let channels = usize::from(CHANNELS);
    let mut block = vec![0.0; scheduler.transport().block_size() * channels];
    let mut rendered = Rendered {
        frames: 0,
        peak: 0.0,
        finished: false,
    };

    while scheduler.now() < limit {
        if scheduler.is_idle() {
            rendered.finished = true;
            break;
        }
        scheduler.process(&mut block, channels);
        for &sample in block.iter() {
            rendered.peak = rendered.peak.max(sample.abs());
            writer.write_sample(to_i16(sample))?;
        }
        rendered.frames += block.len() / channels;
    }
    writer.finalize()?;

    if rendered.peak > 1.0 {
        log::warn!("output clipped, peak level was {:.3}", rendered.peak);
    }
    Ok(rendered)
}

fn to_i16(sample: f32) -> i16 {
    (sample.max(-1.0).min(1.0) * f32::from(i16::MAX)) as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::TransportClock,
        note::Note,
        pool::{PoolConfig, VoicePool},
        sequence::Sequence,
        voice::SineEnv,
    };
    use std::io::Cursor;
    use tempdir::TempDir;

    fn scheduler() -> Scheduler<SineEnv> {
        Scheduler::new(VoicePool::new(PoolConfig::fixed(2), SineEnv::new))
            .clock(TransportClock::new(8_192, 128))
    }

    #[test]
    fn renders_until_idle() {
        let mut scheduler = scheduler();
        let mut sequence = Sequence::default();
        sequence.add(Note::new(440.0).with_duration(0.5));
        scheduler.play_sequence(&sequence, 60.0);

        let dir = TempDir::new("cadenza").unwrap();
        let path = dir.path().join("out.wav");
        let rendered = to_wav(&mut scheduler, &path, 10.0).unwrap();

        assert!(rendered.finished);
        assert!(rendered.peak > 0.0 && rendered.peak <= 1.0);
        // Half a second held plus the release tail, rounded up to whole blocks.
        assert!(rendered.seconds(8_192) >= 0.5 && rendered.seconds(8_192) < 1.0);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(2, reader.spec().channels);
        assert_eq!(8_192, reader.spec().sample_rate);
        assert_eq!(rendered.frames as u32, reader.duration());
    }

    #[test]
    fn stops_at_limit() {
        let mut scheduler = scheduler();
        let mut sequence = Sequence::default();
        sequence.add(Note::new(440.0).with_duration(100.0));
        scheduler.play_sequence(&sequence, 60.0);

        let rendered = to_writer(&mut scheduler, Cursor::new(Vec::new()), 1.0).unwrap();
        assert!(!rendered.finished);
        assert_eq!(8_192, rendered.frames);
    }

    #[test]
    fn nothing_to_render() {
        let rendered = to_writer(&mut scheduler(), Cursor::new(Vec::new()), 1.0).unwrap();
        assert!(rendered.finished);
        assert_eq!(0, rendered.frames);
    }
}
