use crate::{
    backend::{BackendKind, SendPolicy},
    link::MacAddr,
};
use pingtide_common::{ClipPolicy, ConfigError, Prefix, RenderConfig, Technique, Wave};
use std::{path::PathBuf, time::Duration};

const DEFAULT_DST_NET: &str = "2001:610:1908:a000";

#[derive(Clone, Debug, argh::FromArgs)]
/// Paint an IPv6 pixel wall by pinging one address per pixel
pub struct Args {
    #[argh(option)]
    /// image to send (PNG, JPEG, GIF, ...)
    image: Option<PathBuf>,

    #[argh(option)]
    /// pre-rendered frame archive produced by pingtide-process
    data: Option<PathBuf>,

    #[argh(switch)]
    /// skip validating the frame archive
    ///
    /// loads faster, but a corrupt archive is undefined behaviour
    skip_checks: bool,

    #[argh(option, default = "DEFAULT_DST_NET.to_string()")]
    /// the wall's /64 prefix
    dst_net: String,

    #[argh(option, short = 'x', default = "0")]
    /// x offset
    x_offset: i32,

    #[argh(option, short = 'y', default = "0")]
    /// y offset
    y_offset: i32,

    #[argh(option, default = "5")]
    /// how often the current frame is re-sent per second
    rate: u32,

    #[argh(option, default = "1")]
    /// amount of parallel sending workers
    workers: usize,

    #[argh(switch)]
    /// send every frame once, then exit
    once: bool,

    #[argh(option, default = "Technique::Standard")]
    /// pixel order: standard, random, scanline, spiral or wave
    technique: Technique,

    #[argh(option, default = "10.0")]
    /// wave technique amplitude
    wave_amp: f64,

    #[argh(option, default = "0.1")]
    /// wave technique frequency
    wave_freq: f64,

    #[argh(option)]
    /// seed for the random technique and --shuffle
    seed: Option<u64>,

    #[argh(switch)]
    /// shuffle every frame's addresses after ordering
    shuffle: bool,

    #[argh(switch)]
    /// drop pixels that land outside the display instead of wrapping
    clip: bool,

    #[argh(option, default = "BackendKind::Raw")]
    /// transmission backend: raw, pcap, afpacket or pfring
    backend: BackendKind,

    #[argh(option)]
    /// egress interface, overriding the route table
    interface: Option<String>,

    #[argh(option)]
    /// gateway MAC address, overriding the neighbour table
    dst_mac: Option<MacAddr>,

    #[argh(option, default = "SendPolicy::PatchInPlace")]
    /// how link-layer frames are built: patch or rebuild
    send_policy: SendPolicy,

    #[argh(option, default = "8")]
    /// AF_PACKET ring budget in MiB
    ring_mb: usize,

    #[argh(option)]
    /// dispatch queue capacity (default: the largest frame)
    queue_len: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Image(PathBuf),
    Archive { path: PathBuf, skip_checks: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub rate: u32,
    pub one_pass: bool,
    pub queue_len: Option<usize>,
}

impl ScheduleConfig {
    /// Frame delay used when the input doesn't carry one.
    pub fn default_delay(&self) -> Duration {
        Duration::from_secs(1) / self.rate
    }
}

#[derive(Clone, Debug)]
pub struct TransmitConfig {
    pub backend: BackendKind,
    pub workers: usize,
    pub interface: Option<String>,
    pub dst_mac: Option<MacAddr>,
    pub policy: SendPolicy,
    pub ring_mb: usize,
}

/// Validated command line.
#[derive(Clone, Debug)]
pub struct Config {
    pub input: Input,
    pub render: RenderConfig,
    pub schedule: ScheduleConfig,
    pub transmit: TransmitConfig,
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        if args.rate == 0 {
            return Err(ConfigError::ZeroRate);
        }
        if args.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }

        let input = match (args.image, args.data) {
            (Some(image), None) => Input::Image(image),
            (None, Some(path)) => Input::Archive {
                path,
                skip_checks: args.skip_checks,
            },
            _ => return Err(ConfigError::MissingInput("exactly one of --image or --data")),
        };

        Ok(Self {
            input,
            render: RenderConfig {
                prefix: args.dst_net.parse::<Prefix>()?,
                offset: (args.x_offset, args.y_offset),
                technique: args.technique,
                wave: Wave {
                    amplitude: args.wave_amp,
                    frequency: args.wave_freq,
                },
                clip: if args.clip {
                    ClipPolicy::display()
                } else {
                    ClipPolicy::Wrap
                },
                shuffle: args.shuffle,
                seed: args.seed,
            },
            schedule: ScheduleConfig {
                rate: args.rate,
                one_pass: args.once,
                queue_len: args.queue_len,
            },
            transmit: TransmitConfig {
                backend: args.backend,
                workers: args.workers,
                interface: args.interface,
                dst_mac: args.dst_mac,
                policy: args.send_policy,
                ring_mb: args.ring_mb,
            },
        })
    }
}
