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

use anyhow::{Context, Result};
use cadenza::{
    config::{Config, CONFIG_VAR},
    osc::Listener,
    pool::VoicePool,
    render,
    scheduler::{Scheduler, Stats, Transition},
    score,
    sequence::Sequence,
    voice::SineEnv,
};
use clap::{Parser, Subcommand};
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

// Offline renders stop here even if something is still sounding.
const RENDER_LIMIT: f64 = 30.0 * 60.0;

/// Plays the built-in piece, or a score saved as JSON, on a bank of sine voices.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(after_help = "Settings are read from the JSON file named by CADENZA_CONFIG, if set.")]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a score to a 16 bit stereo WAV file
    Render {
        /// Where to write the WAV file
        out: PathBuf,
        /// A JSON score to play instead of the built-in piece
        score: Option<PathBuf>,
    },
    /// Play a score in real time, listening for OSC messages if enabled
    Run {
        /// A JSON score to play instead of the built-in piece
        score: Option<PathBuf>,
    },
    /// Print the built-in piece as JSON
    Dump,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config::from_env()
        .with_context(|| format!("loading settings from {}", CONFIG_VAR))?;
    match args.command {
        Command::Render { out, score } => render_file(&config, &out, score.as_deref()),
        Command::Run { score } => run(&config, score.as_deref()),
        Command::Dump => dump(&config),
    }
}

fn render_file(config: &Config, out: &Path, path: Option<&Path>) -> Result<()> {
    let score = load_score(config, path)?;
    let mut scheduler = scheduler(config);
    let scheduled = scheduler.play_sequence(&score, config.bpm);
    log::info!("rendering {} notes to {}", scheduled, out.display());

    let rendered = render::to_wav(&mut scheduler, out, RENDER_LIMIT)
        .with_context(|| format!("rendering to {}", out.display()))?;
    if !rendered.finished {
        log::warn!("stopped rendering after {}s", RENDER_LIMIT);
    }
    println!(
        "wrote {:.2}s to {}, peak {:.3}",
        rendered.seconds(config.sample_rate),
        out.display(),
        rendered.peak
    );
    report(scheduler.stats())
}

// Runs the scheduler against the wall clock. With OSC enabled this keeps listening until the
// process is killed.
fn run(config: &Config, path: Option<&Path>) -> Result<()> {
    let score = load_score(config, path)?;
    let mut scheduler = scheduler(config).observer(|time: f64, transition: Transition| {
        if let Transition::On { frequency, .. } = transition {
            log::info!("{:9.3}s {:8.2} Hz", time, frequency);
        } else {
            log::debug!("{:9.3}s {:?}", time, transition);
        }
    });

    let _listener = if config.osc.enabled {
        let listener = Listener::bind(
            config.osc.address.as_str(),
            scheduler.handle(),
            score.clone(),
            config.bpm,
        )
        .with_context(|| format!("listening on {}", config.osc.address))?;
        println!("listening for OSC on {}", listener.local_addr());
        Some(listener)
    } else {
        None
    };

    scheduler.play_sequence(&score, config.bpm);

    let channels = usize::from(render::CHANNELS);
    let mut block = vec![0.0; config.block_size * channels];
    let mut seen = scheduler.stats();
    let start = Instant::now();
    loop {
        scheduler.process(&mut block, channels);
        log_problems(&mut seen, scheduler.stats());
        if !config.osc.enabled && scheduler.is_idle() {
            break;
        }

        let due = start + Duration::from_secs_f64(scheduler.now());
        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
    }
    report(scheduler.stats())
}

fn dump(config: &Config) -> Result<()> {
    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    score::piece(config.transpose).to_writer(&mut stdout)?;
    writeln!(stdout)?;
    Ok(())
}

fn load_score(config: &Config, path: Option<&Path>) -> Result<Sequence> {
    match path {
        Some(path) => {
            let score = Sequence::load(path)
                .with_context(|| format!("loading score {}", path.display()))?;
            Ok(score.transposed(config.transpose))
        }
        None => Ok(score::piece(config.transpose)),
    }
}

fn scheduler(config: &Config) -> Scheduler<SineEnv> {
    Scheduler::new(VoicePool::new(config.pool, SineEnv::new)).clock(config.clock())
}

// Logs whatever went wrong during the last block. The scheduler only counts these.
fn log_problems(seen: &mut Stats, stats: Stats) {
    if stats.rejected > seen.rejected {
        log::warn!("rejected {} invalid notes", stats.rejected - seen.rejected);
    }
    if stats.dropped > seen.dropped {
        log::warn!("dropped {} notes for lack of voices", stats.dropped - seen.dropped);
    }
    if stats.stale_completions > seen.stale_completions {
        log::warn!(
            "ignored {} stale voice completions",
            stats.stale_completions - seen.stale_completions
        );
    }
    if stats.ignored_ticks > seen.ignored_ticks {
        log::warn!(
            "ignored {} invalid block lengths",
            stats.ignored_ticks - seen.ignored_ticks
        );
    }
    *seen = stats;
}

fn report(stats: Stats) -> Result<()> {
    log::info!("stats: {}", serde_json::to_string(&stats)?);
    if stats.rejected > 0 || stats.dropped > 0 {
        eprintln!(
            "{} notes rejected, {} dropped for lack of voices",
            stats.rejected, stats.dropped
        );
    }
    Ok(())
}
