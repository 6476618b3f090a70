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

//! Remote control over Open Sound Control (OSC).
//!
//! A [`Listener`] receives OSC packets on a UDP socket and turns them into requests on a
//! scheduler [`Handle`]. Bundles are unpacked and their messages handled in order; time tags are
//! ignored and every request takes effect at the scheduler's next tick.
//!
//! The following messages are understood:
//!
//! | address | arguments | effect |
//! |---|---|---|
//! | `/note` | frequency, delay, duration, amplitude (optional) | plays one note, times in seconds |
//! | `/midi` | MIDI note number, duration (optional, default 0.5) | plays one note now, A4 = 432 Hz |
//! | `/play` | bpm (optional) | stops playback, then plays the loaded score from the start |
//! | `/stop` | | stops playback |
//! | `/test` | string, int | logs the arguments |
//!
//! Numeric arguments may be sent as ints, floats or doubles, except the MIDI note number, which
//! must be an int. Anything else is logged and ignored.
//!
//! ```no_run
//! use cadenza::{
//!     osc::Listener,
//!     pool::{PoolConfig, VoicePool},
//!     scheduler::Scheduler,
//!     score,
//!     voice::SineEnv,
//! };
//!
//! let scheduler = Scheduler::new(VoicePool::new(PoolConfig::default(), SineEnv::new));
//! let _listener = Listener::bind("127.0.0.1:16447", scheduler.handle(), score::piece(1.0), 77.0)?;
//! // Drive the scheduler from the audio thread while the listener is alive.
//! # cadenza::osc::Result::Ok(())
//! ```

mod router;

pub use router::{MatchedArgs, Matcher, Router};

use crate::{
    note::{midi_to_hz, TUNING_REFERENCE},
    scheduler::{Disconnected, Handle},
    sequence::Sequence,
    voice::VoiceParams,
};
use rosc::{decoder::decode, OscError, OscPacket};
use std::{
    error, fmt, io,
    net::{SocketAddr, ToSocketAddrs, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

/// How long a `/midi` note sounds when the message does not say.
pub const DEFAULT_MIDI_DURATION: f32 = 0.5;

// How often the receive thread checks whether it should stop.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A remote control request decoded from one OSC message.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Note {
        params: VoiceParams,
        delay: f64,
        duration: f64,
    },
    Play {
        bpm: Option<f32>,
    },
    Stop,
    Test {
        text: String,
        value: i32,
    },
}

/// The routes understood by [`Listener`].
pub fn router() -> Router<Request> {
    let mut router = Router::default();
    router
        .addr("/note")
        .capture("frequency")
        .capture("delay")
        .capture("duration")
        .capture_optional("amplitude")
        .handle(|args| {
            let mut params = VoiceParams::new(args.float("frequency")?);
            let delay = args.float("delay")?;
            let duration = args.float("duration")?;
            if let Some(amplitude) = args.float("amplitude") {
                params = params.amplitude(amplitude);
            }
            Some(Request::Note {
                params,
                delay: f64::from(delay),
                duration: f64::from(duration),
            })
        });
    router
        .addr("/midi")
        .capture("note")
        .capture_optional("duration")
        .handle(|args| {
            let note = args.int("note")?;
            let duration = args.float("duration").unwrap_or(DEFAULT_MIDI_DURATION);
            Some(Request::Note {
                params: VoiceParams::new(midi_to_hz(note as f32, TUNING_REFERENCE)),
                delay: 0.0,
                duration: f64::from(duration),
            })
        });
    router
        .addr("/play")
        .capture_optional("bpm")
        .handle(|args| Some(Request::Play { bpm: args.float("bpm") }));
    router.addr("/stop").handle(|_| Some(Request::Stop));
    router
        .addr("/test")
        .capture("text")
        .capture("value")
        .handle(|args| {
            Some(Request::Test {
                text: args.string("text")?,
                value: args.int("value")?,
            })
        });
    router
}

/// Receives OSC messages on a background thread and forwards them to a scheduler.
///
/// The thread stops when the listener is dropped or when the scheduler goes away.
#[derive(Debug)]
pub struct Listener {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Listener {
    /// Binds a UDP socket to `address` and starts listening.
    ///
    /// `/play` messages play `score`, at `bpm` unless the message gives a tempo.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or configured.
    pub fn bind<A: ToSocketAddrs>(
        address: A,
        handle: Handle,
        score: Sequence,
        bpm: f32,
    ) -> Result<Listener> {
        let socket = UdpSocket::bind(address).map_err(|err| Error(ErrorInner::UdpBind(err)))?;
        socket
            .set_read_timeout(Some(POLL_INTERVAL))
            .map_err(|err| Error(ErrorInner::Configure(err)))?;
        let local_addr = socket
            .local_addr()
            .map_err(|err| Error(ErrorInner::Configure(err)))?;
        log::info!("listening for OSC on {}", local_addr);

        let running = Arc::new(AtomicBool::new(true));
        let reader = Reader {
            socket,
            router: router(),
            handle,
            score,
            bpm,
            running: Arc::clone(&running),
        };
        let thread = thread::spawn(move || reader.recv_loop());
        Ok(Listener {
            local_addr,
            running,
            thread: Some(thread),
        })
    }

    /// The address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the receive thread is still forwarding messages.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("OSC receive thread panicked");
            }
        }
    }
}

struct Reader {
    socket: UdpSocket,
    router: Router<Request>,
    handle: Handle,
    score: Sequence,
    bpm: f32,
    running: Arc<AtomicBool>,
}

impl Reader {
    fn recv_loop(self) {
        const MTU: usize = 65536;
        let mut buffer = vec![0_u8; MTU];

        while self.running.load(Ordering::SeqCst) {
            let result = match self.recv(&mut buffer) {
                Ok(Some(packet)) => self.dispatch(packet),
                Ok(None) => Ok(()),
                Err(err) => {
                    log::error!("error receiving next OSC packet: {}", err);
                    Ok(())
                }
            };
            if result.is_err() {
                log::info!("scheduler is gone, no longer listening on {:?}", self.socket);
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    // Returns None when the read times out.
    fn recv(&self, buffer: &mut [u8]) -> Result<Option<OscPacket>> {
        let len = match self.socket.recv(buffer) {
            Ok(len) => len,
            Err(err)
                if err.kind() == io::ErrorKind::WouldBlock
                    || err.kind() == io::ErrorKind::TimedOut =>
            {
                return Ok(None)
            }
            Err(err) => return Err(Error(ErrorInner::Recv(err))),
        };
        let packet = decode(&buffer[..len]).map_err(|err| Error(ErrorInner::OscDecode(err)))?;
        log::debug!("recv: {:?}", packet);
        Ok(Some(packet))
    }

    fn dispatch(&self, packet: OscPacket) -> std::result::Result<(), Disconnected> {
        match packet {
            OscPacket::Message(message) => match self.router.route(&message) {
                Some(request) => self.apply(request),
                None => {
                    log::debug!("ignoring unrecognized message {:?}", message);
                    Ok(())
                }
            },
            OscPacket::Bundle(bundle) => bundle
                .content
                .into_iter()
                .try_for_each(|packet| self.dispatch(packet)),
        }
    }

    fn apply(&self, request: Request) -> std::result::Result<(), Disconnected> {
        match request {
            Request::Note {
                params,
                delay,
                duration,
            } => self.handle.add_voice_from_now(params, delay, duration),
            Request::Play { bpm } => self
                .handle
                .restart(self.score.clone(), bpm.unwrap_or(self.bpm)),
            Request::Stop => self.handle.stop(),
            Request::Test { text, value } => {
                log::info!("/test {} {}", text, value);
                Ok(())
            }
        }
    }
}

/// A specialized [`Result`] type for OSC operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by [`Listener`] operations.
#[derive(Debug)]
pub struct Error(ErrorInner);

// OscError does not implement std::error::Error, so it stays out of the public API.
#[derive(Debug)]
enum ErrorInner {
    UdpBind(io::Error),
    Configure(io::Error),
    Recv(io::Error),
    OscDecode(OscError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            ErrorInner::UdpBind(e) => write!(f, "binding to UDP socket: {}", e),
            ErrorInner::Configure(e) => write!(f, "configuring UDP socket: {}", e),
            ErrorInner::Recv(e) => write!(f, "receiving OSC packet: {}", e),
            ErrorInner::OscDecode(e) => write!(f, "decoding OSC packet: {:?}", e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.0 {
            ErrorInner::UdpBind(e) => Some(e),
            ErrorInner::Configure(e) => Some(e),
            ErrorInner::Recv(e) => Some(e),
            ErrorInner::OscDecode(_) => None,
        }
    }
}
