#[macro_use]
extern crate tracing;

use self::{
    backend::Transport,
    config::{Args, Config},
    scheduler::{AnimationPlan, Scheduler},
};
use anyhow::Context;
use std::{net::Ipv6Addr, thread};

mod backend;
mod config;
mod error;
mod link;
mod load;
mod queue;
mod route;
mod scheduler;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args: Args = argh::from_env();
    let config = Config::try_from(args)?;

    let frames = load::frames(&config.input, &config.render, &config.schedule)?;

    // archives may have been rendered for another prefix than --dst-net
    let target = frames
        .iter()
        .find_map(|frame| frame.addrs.first())
        .map_or_else(|| config.render.prefix.base(), |&addr| Ipv6Addr::from(addr));

    let link = if config.transmit.backend.needs_link() {
        Some(route::resolve(&config.transmit, target)?)
    } else {
        None
    };
    let transport = Transport::new(config.transmit.backend, link, config.transmit.ring_mb)?;
    info!(backend = %config.transmit.backend, workers = config.transmit.workers, "opening backends");

    let backends = (0..config.transmit.workers)
        .map(|_| transport.open(config.transmit.policy))
        .collect::<Result<Vec<_>, _>>()?;

    let capacity = config.schedule.queue_len.unwrap_or_else(|| {
        frames
            .iter()
            .map(|frame| frame.addrs.len())
            .max()
            .unwrap_or(1)
    });
    info!(capacity, "dispatch queue");
    let (dispatcher, intake) = queue::dispatch_queue(capacity);
    let (alarm, alarms) = queue::alarm_channel();

    let mut workers = Vec::with_capacity(backends.len());
    for (id, backend) in backends.into_iter().enumerate() {
        let intake = intake.clone();
        let alarm = alarm.clone();
        let handle = thread::Builder::new()
            .name(format!("pingtide-worker-{id}"))
            .spawn(move || backend::run_worker(id, backend, intake, alarm))
            .context("could not spawn worker thread")?;
        workers.push(handle);
    }
    drop((intake, alarm));

    let plan = AnimationPlan {
        frames,
        rate: config.schedule.rate,
        one_pass: config.schedule.one_pass,
    };

    info!("starting pingtide >:3");
    let mut runtime = monoio::RuntimeBuilder::<monoio::FusionDriver>::new()
        .enable_timer()
        .build()?;
    let scheduled = runtime.block_on(Scheduler::new(plan, dispatcher, alarms).run());

    let mut sent = 0;
    for handle in workers {
        match handle.join() {
            Ok(Ok(count)) => sent += count,
            Ok(Err(error)) => return Err(error.into()),
            Err(_) => anyhow::bail!("worker thread panicked"),
        }
    }
    scheduled?;

    info!(sent, "done");
    Ok(())
}
