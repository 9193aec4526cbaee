use crate::config::{Input, ScheduleConfig};
use anyhow::Context;
use pingtide_common::{ArchivedFrame, Frame, RenderConfig, Renderer, decode};
use rkyv::vec::ArchivedVec;
use std::{fs::File, path::Path};

/// Loads the frames to send, rendering them first if the input is an image.
pub fn frames(input: &Input, render: &RenderConfig, schedule: &ScheduleConfig) -> anyhow::Result<Vec<Frame>> {
    let frames = match input {
        Input::Image(path) => from_image(path, render, schedule)?,
        Input::Archive { path, skip_checks } => from_archive(path, *skip_checks)?,
    };

    let probes: usize = frames.iter().map(|frame| frame.addrs.len()).sum();
    info!(frames = frames.len(), probes, "loaded frames");

    Ok(frames)
}

fn from_image(path: &Path, render: &RenderConfig, schedule: &ScheduleConfig) -> anyhow::Result<Vec<Frame>> {
    info!(path = %path.display(), "decoding image..");
    let decoded = decode::decode_file(path).with_context(|| format!("could not decode {}", path.display()))?;

    if let Some(first) = decoded.first() {
        let (width, height) = first.image.dimensions();
        info!(width, height, frames = decoded.len(), "image bounds");
    }

    Ok(Renderer::new(render).render_all(&decoded, schedule.default_delay()))
}

fn from_archive(path: &Path, skip_checks: bool) -> anyhow::Result<Vec<Frame>> {
    info!(path = %path.display(), skip_checks, "loading archive..");
    let file = File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    let data = unsafe { memmap2::Mmap::map(&file)? };

    let archived: &ArchivedVec<ArchivedFrame> = if skip_checks {
        unsafe { rkyv::access_unchecked(&data) }
    } else {
        rkyv::access::<_, rkyv::rancor::Error>(&data).context("frame archive failed validation")?
    };

    Ok(rkyv::deserialize::<Vec<Frame>, rkyv::rancor::Error>(archived)?)
}
