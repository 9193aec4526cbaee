#[macro_use]
extern crate tracing;

use anyhow::Context;
use itertools::Itertools;
use pingtide_common::{
    ClipPolicy, Frame, Prefix, RenderConfig, Renderer, Technique, Wave, decode::decode_file,
};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Duration,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(argh::FromArgs)]
/// render images into a frame archive to be sent by pingtide
struct Args {
    #[argh(positional)]
    /// image files, or directories whose files are taken in name order
    inputs: Vec<PathBuf>,

    #[argh(option)]
    /// path to output file
    output: PathBuf,

    #[argh(option, default = "String::from(\"2001:610:1908:a000\")")]
    /// the wall's /64 prefix
    dst_net: String,

    #[argh(option, short = 'x', default = "0")]
    /// x offset
    x_offset: i32,

    #[argh(option, short = 'y', default = "0")]
    /// y offset
    y_offset: i32,

    #[argh(option, default = "5")]
    /// frames per second for inputs that carry no delay
    rate: u32,

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
    /// drop pixels outside the display instead of wrapping
    clip: bool,
}

fn expand(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let files: Vec<PathBuf> = fs::read_dir(path)?
        .map_ok(|entry| entry.path())
        .filter_ok(|path| path.is_file())
        .try_collect()?;

    Ok(files.into_iter().sorted().collect())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args: Args = argh::from_env();

    anyhow::ensure!(args.rate > 0, pingtide_common::ConfigError::ZeroRate);
    anyhow::ensure!(
        !args.inputs.is_empty(),
        pingtide_common::ConfigError::MissingInput("at least one image")
    );

    let mut renderer = Renderer::new(&RenderConfig {
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
    });
    let default_delay = Duration::from_secs(1) / args.rate;

    let mut frames: Vec<Frame> = Vec::new();
    for path in args.inputs.iter().map(|path| expand(path)).flatten_ok() {
        let path = path?;
        info!(path = %path.display(), "rendering..");

        let decoded = decode_file(&path).with_context(|| format!("could not decode {}", path.display()))?;
        frames.extend(renderer.render_all(&decoded, default_delay));
    }

    let probes: usize = frames.iter().map(|frame| frame.addrs.len()).sum();
    info!(frames = frames.len(), probes, "serializing..");

    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&frames)?;
    let mut file = BufWriter::new(File::create(&args.output)?);
    file.write_all(&bytes)?;
    file.flush()?;

    info!(output = %args.output.display(), "wrote archive");
    Ok(())
}
