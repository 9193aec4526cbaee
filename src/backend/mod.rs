//! Transmission backends and the worker loop that drives them.

use crate::{
    error::ResourceError,
    link::LinkEndpoints,
    queue::{Alarm, Intake},
};
use flume::TryRecvError;
use pingtide_common::{ConfigError, DestinationAddress};
use std::{fmt, io, str::FromStr};

mod afpacket;
pub mod frame;
#[cfg(feature = "pcap")]
mod pcap;
mod pfring;
mod raw;
pub mod ring;
pub mod sys;

pub use self::{afpacket::AfPacket, pfring::PfRing, raw::RawSocket};
#[cfg(feature = "pcap")]
pub use self::pcap::Pcap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Raw,
    Pcap,
    AfPacket,
    PfRing,
}

impl BackendKind {
    /// Whether frames are built by hand and need a resolved link.
    pub fn needs_link(self) -> bool {
        self != Self::Raw
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "pcap" if cfg!(feature = "pcap") => Ok(Self::Pcap),
            "pcap" => Err(ConfigError::BackendUnavailable("pcap")),
            "afpacket" => Ok(Self::AfPacket),
            "pfring" => Ok(Self::PfRing),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw",
            Self::Pcap => "pcap",
            Self::AfPacket => "afpacket",
            Self::PfRing => "pfring",
        })
    }
}

/// How link-layer backends turn an address into a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SendPolicy {
    /// Overwrite the destination bytes of a prebuilt template.
    #[default]
    PatchInPlace,
    /// Serialize every layer and compute the checksum per packet.
    Rebuild,
}

impl FromStr for SendPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patch" => Ok(Self::PatchInPlace),
            "rebuild" => Ok(Self::Rebuild),
            other => Err(ConfigError::UnknownSendPolicy(other.to_string())),
        }
    }
}

/// One worker's exclusive handle on the wire.
pub trait Transmit: Send {
    /// Emits one probe to `dst`.
    fn send(&mut self, dst: &DestinationAddress) -> io::Result<()>;

    /// Handles a failed [`Transmit::send`]. Only an error returned here stops
    /// the worker; the failed probe itself is never retried.
    fn recover(&mut self, error: io::Error) -> Result<(), ResourceError> {
        warn!(?error, "could not send probe");
        Ok(())
    }

    /// Pushes out anything the backend batched. Called whenever the queue runs dry.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A backend choice with everything needed to open it.
#[derive(Clone, Debug)]
pub enum Transport {
    Raw,
    #[cfg(feature = "pcap")]
    Pcap(LinkEndpoints),
    AfPacket { link: LinkEndpoints, ring_mb: usize },
    PfRing(LinkEndpoints),
}

impl Transport {
    pub fn new(kind: BackendKind, link: Option<LinkEndpoints>, ring_mb: usize) -> Result<Self, ConfigError> {
        let missing = || ConfigError::MissingInput("link endpoints for a link-layer backend");

        Ok(match kind {
            BackendKind::Raw => Self::Raw,
            #[cfg(feature = "pcap")]
            BackendKind::Pcap => Self::Pcap(link.ok_or_else(missing)?),
            #[cfg(not(feature = "pcap"))]
            BackendKind::Pcap => return Err(ConfigError::BackendUnavailable("pcap")),
            BackendKind::AfPacket => Self::AfPacket {
                link: link.ok_or_else(missing)?,
                ring_mb,
            },
            BackendKind::PfRing => Self::PfRing(link.ok_or_else(missing)?),
        })
    }

    pub fn open(&self, policy: SendPolicy) -> Result<Box<dyn Transmit>, ResourceError> {
        Ok(match self {
            Self::Raw => Box::new(RawSocket::open()?),
            #[cfg(feature = "pcap")]
            Self::Pcap(link) => Box::new(Pcap::open(link, policy)?),
            Self::AfPacket { link, ring_mb } => Box::new(AfPacket::open(link, policy, *ring_mb)?),
            Self::PfRing(link) => Box::new(PfRing::open(link, policy)?),
        })
    }
}

/// Drains `intake` through `backend` until the queue disconnects and empties.
///
/// Returns the number of probes handed to the backend. A fatal error is
/// logged and raised on `alarm` before it is returned.
pub fn run_worker(
    id: usize,
    backend: Box<dyn Transmit>,
    intake: Intake,
    alarm: Alarm,
) -> Result<u64, ResourceError> {
    info!(id, "starting worker");

    match drain(backend, &intake) {
        Ok(sent) => {
            info!(id, sent, "worker finished");
            Ok(sent)
        }
        Err(error) => {
            error!(id, ?error, "worker failed");
            // the scheduler may already be gone
            let _ = alarm.send(id);
            Err(error)
        }
    }
}

fn drain(mut backend: Box<dyn Transmit>, intake: &Intake) -> Result<u64, ResourceError> {
    let mut sent = 0_u64;
    loop {
        let dst = match intake.try_recv() {
            Ok(dst) => dst,
            Err(TryRecvError::Empty) => {
                if let Err(error) = backend.flush() {
                    backend.recover(error)?;
                }
                match intake.recv() {
                    Ok(dst) => dst,
                    Err(_) => break,
                }
            }
            Err(TryRecvError::Disconnected) => break,
        };

        match backend.send(&dst) {
            Ok(()) => sent += 1,
            Err(error) => backend.recover(error)?,
        }
    }

    if let Err(error) = backend.flush() {
        backend.recover(error)?;
    }

    Ok(sent)
}
