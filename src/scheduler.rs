//! Frame scheduling: keeps the dispatch queue fed with the current frame.
//!
//! Within a frame, repeats are laid on a grid starting at frame entry
//! (`entry + k / rate`). After each emission the next repeat instant is
//! raced against the frame deadline and the earlier one wins; a tie goes to
//! the deadline. An emission that overruns the grid moves it to the present,
//! and one that overruns the deadline ends the frame.

use crate::queue::{Alarms, Dispatcher};
use flume::TrySendError;
use pingtide_common::{DestinationAddress, Frame};
use std::{
    future::Future,
    time::{Duration, Instant},
};
use thiserror::Error;

/// How often one-pass mode checks whether the queue has drained.
const DRAIN_POLL: Duration = Duration::from_millis(50);

#[derive(Clone, Debug)]
pub struct AnimationPlan {
    pub frames: Vec<Frame>,
    /// Re-emissions of the current frame per second.
    pub rate: u32,
    pub one_pass: bool,
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("every worker has exited")]
    WorkersGone,

    #[error("worker {0} failed")]
    WorkerFailed(usize),
}

#[derive(Debug)]
enum State {
    AdvanceFrame {
        frame: usize,
    },
    RepeatBurst {
        frame: usize,
        deadline: Instant,
        repeat_at: Instant,
    },
    Draining,
    Done,
}

pub struct Scheduler {
    plan: AnimationPlan,
    interval: Duration,
    dispatcher: Dispatcher,
    alarms: Alarms,
}

impl Scheduler {
    pub fn new(plan: AnimationPlan, dispatcher: Dispatcher, alarms: Alarms) -> Self {
        let interval = (Duration::from_secs(1) / plan.rate.max(1)).max(Duration::from_nanos(1));
        Self {
            plan,
            interval,
            dispatcher,
            alarms,
        }
    }

    /// Runs until one pass completes and the queue drains, or forever when
    /// looping. Stops early once a worker raises an alarm. The dispatcher is
    /// dropped on return, which releases the workers.
    pub async fn run(self) -> Result<(), ScheduleError> {
        if self.plan.frames.is_empty() {
            return Ok(());
        }

        let mut state = State::AdvanceFrame { frame: 0 };
        loop {
            trace!(?state, "scheduler step");
            state = match state {
                State::AdvanceFrame { frame } if frame == self.plan.frames.len() => {
                    if self.plan.one_pass {
                        State::Draining
                    } else {
                        State::AdvanceFrame { frame: 0 }
                    }
                }
                State::AdvanceFrame { frame } => {
                    debug!(frame, "switching frame");
                    let entry = Instant::now();
                    State::RepeatBurst {
                        frame,
                        deadline: entry + self.plan.frames[frame].delay(),
                        repeat_at: entry,
                    }
                }
                State::RepeatBurst {
                    frame,
                    deadline,
                    repeat_at,
                } => {
                    self.emit(frame).await?;
                    let now = Instant::now();

                    if self.plan.one_pass {
                        // the last frame goes straight to draining
                        if frame + 1 < self.plan.frames.len() {
                            self.wait_until(deadline).await?;
                        }
                        State::AdvanceFrame { frame: frame + 1 }
                    } else if now >= deadline {
                        State::AdvanceFrame { frame: frame + 1 }
                    } else {
                        let repeat_at = (repeat_at + self.interval).max(now);
                        if deadline <= repeat_at {
                            self.wait_until(deadline).await?;
                            State::AdvanceFrame { frame: frame + 1 }
                        } else {
                            self.wait_until(repeat_at).await?;
                            State::RepeatBurst {
                                frame,
                                deadline,
                                repeat_at,
                            }
                        }
                    }
                }
                State::Draining => {
                    // empty means dequeued, not sent; joining the workers
                    // covers the sends still in flight
                    while !self.dispatcher.is_empty() {
                        self.guarded(monoio::time::sleep(DRAIN_POLL)).await?;
                    }
                    info!("single pass complete, queue drained");
                    State::Done
                }
                State::Done => return Ok(()),
            };
        }
    }

    async fn emit(&self, frame: usize) -> Result<(), ScheduleError> {
        self.check_alarms()?;
        for addr in &self.plan.frames[frame].addrs {
            self.dispatch(*addr).await?;
        }
        Ok(())
    }

    async fn dispatch(&self, addr: DestinationAddress) -> Result<(), ScheduleError> {
        match self.dispatcher.try_send(addr) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(addr)) => self
                .guarded(self.dispatcher.send_async(addr))
                .await?
                .map_err(|_| ScheduleError::WorkersGone),
            Err(TrySendError::Disconnected(_)) => Err(ScheduleError::WorkersGone),
        }
    }

    async fn wait_until(&self, deadline: Instant) -> Result<(), ScheduleError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !remaining.is_zero() {
            self.guarded(monoio::time::sleep(remaining)).await?;
        }
        Ok(())
    }

    fn check_alarms(&self) -> Result<(), ScheduleError> {
        match self.alarms.try_recv() {
            Ok(id) => Err(ScheduleError::WorkerFailed(id)),
            Err(flume::TryRecvError::Empty) => Ok(()),
            Err(flume::TryRecvError::Disconnected) => Err(ScheduleError::WorkersGone),
        }
    }

    /// Runs `work` unless a worker raises an alarm first.
    async fn guarded<F: Future>(&self, work: F) -> Result<F::Output, ScheduleError> {
        monoio::select! {
            output = work => Ok(output),
            alarm = self.alarms.recv_async() => Err(match alarm {
                Ok(id) => ScheduleError::WorkerFailed(id),
                Err(_) => ScheduleError::WorkersGone,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue;
    use pingtide_common::DestinationAddress;
    use pretty_assertions::assert_eq;
    use std::{future::Future, thread};

    fn block_on<F: Future>(future: F) -> F::Output {
        let mut runtime = monoio::RuntimeBuilder::<monoio::LegacyDriver>::new()
            .enable_timer()
            .build()
            .unwrap();
        runtime.block_on(future)
    }

    fn run(plan: AnimationPlan, dispatcher: Dispatcher) -> Result<(), ScheduleError> {
        let (_alarm, alarms) = queue::alarm_channel();
        block_on(Scheduler::new(plan, dispatcher, alarms).run())
    }

    fn frame(tag: u8, len: u8, delay: Duration) -> Frame {
        let addrs = (0..len)
            .map(|i| DestinationAddress::from([0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, i, 0, tag, 0, 0, 0, 0xff]))
            .collect();
        Frame::new(addrs, delay)
    }

    fn tag(addr: &DestinationAddress) -> u8 {
        addr.octets()[11]
    }

    #[test]
    fn repeats_the_frame_until_its_deadline() {
        let plan = AnimationPlan {
            frames: vec![frame(1, 3, Duration::from_millis(500)), frame(2, 1, Duration::from_secs(1))],
            rate: 20,
            one_pass: false,
        };
        let (dispatcher, intake) = queue::dispatch_queue(3);

        // count frame one until frame two shows up, then hang up
        let consumer = thread::spawn(move || {
            let mut seen = 0;
            while let Ok(addr) = intake.recv() {
                if tag(&addr) == 2 {
                    break;
                }
                seen += 1;
            }
            seen
        });

        let started = Instant::now();
        let result = run(plan, dispatcher);
        let seen = consumer.join().unwrap();

        assert!(matches!(result, Err(ScheduleError::WorkersGone)));
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(seen % 3, 0, "frames are emitted whole");
        let emissions = seen / 3;
        assert!(emissions >= 10, "only {emissions} emissions");
        assert!(emissions <= 11, "{emissions} emissions");
    }

    #[test]
    fn one_pass_traverses_every_frame_once_then_drains() {
        let frames = vec![
            frame(1, 3, Duration::from_millis(20)),
            frame(2, 2, Duration::from_millis(20)),
            frame(3, 4, Duration::from_millis(20)),
        ];
        let expected: Vec<_> = frames.iter().flat_map(|f| f.addrs.clone()).collect();
        let plan = AnimationPlan {
            frames,
            rate: 1000,
            one_pass: true,
        };

        let (dispatcher, intake) = queue::dispatch_queue(2);
        let probe = intake.clone();
        let consumer = thread::spawn(move || intake.iter().collect::<Vec<_>>());

        run(plan, dispatcher).unwrap();
        assert!(probe.is_empty());
        drop(probe);

        assert_eq!(consumer.join().unwrap(), expected);
    }

    #[test]
    fn animation_advances_and_loops_back_to_the_first_frame() {
        let plan = AnimationPlan {
            frames: vec![frame(1, 1, Duration::from_millis(30)), frame(2, 1, Duration::from_millis(30))],
            rate: 1,
            one_pass: false,
        };
        let (dispatcher, intake) = queue::dispatch_queue(1);

        let consumer = thread::spawn(move || intake.iter().take(5).map(|addr| tag(&addr)).collect::<Vec<_>>());

        let result = run(plan, dispatcher);
        assert!(matches!(result, Err(ScheduleError::WorkersGone)));
        assert_eq!(consumer.join().unwrap(), vec![1, 2, 1, 2, 1]);
    }

    #[test]
    fn empty_plans_finish_immediately() {
        let (dispatcher, _intake) = queue::dispatch_queue(1);
        let plan = AnimationPlan {
            frames: Vec::new(),
            rate: 5,
            one_pass: false,
        };
        run(plan, dispatcher).unwrap();
    }

    #[test]
    fn one_pass_does_not_hold_the_last_frame() {
        let plan = AnimationPlan {
            frames: vec![frame(1, 1, Duration::from_millis(20)), frame(2, 1, Duration::from_secs(5))],
            rate: 5,
            one_pass: true,
        };
        let (dispatcher, intake) = queue::dispatch_queue(2);
        let consumer = thread::spawn(move || intake.iter().count());

        let started = Instant::now();
        run(plan, dispatcher).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(consumer.join().unwrap(), 2);
    }

    #[test]
    fn slow_workers_cannot_stretch_a_frame_past_its_deadline() {
        let plan = AnimationPlan {
            frames: vec![frame(1, 3, Duration::from_millis(50)), frame(2, 1, Duration::from_secs(1))],
            rate: 1000,
            one_pass: false,
        };
        let (dispatcher, intake) = queue::dispatch_queue(1);

        let started = Instant::now();
        let consumer = thread::spawn(move || {
            while let Ok(addr) = intake.recv() {
                if tag(&addr) == 2 {
                    return Some(started.elapsed());
                }
                thread::sleep(Duration::from_millis(10));
            }
            None
        });

        let result = run(plan, dispatcher);
        let second_frame_after = consumer.join().unwrap().unwrap();

        assert!(matches!(result, Err(ScheduleError::WorkersGone)));
        assert!(
            second_frame_after < Duration::from_millis(200),
            "second frame only after {second_frame_after:?}"
        );
    }

    #[test]
    fn a_worker_alarm_stops_the_schedule() {
        let plan = AnimationPlan {
            frames: vec![frame(1, 2, Duration::from_secs(5))],
            rate: 10,
            one_pass: false,
        };
        let (dispatcher, intake) = queue::dispatch_queue(4);
        let (alarm, alarms) = queue::alarm_channel();

        let consumer = thread::spawn(move || intake.iter().count());
        let raiser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            alarm.send(3).unwrap();
        });

        let started = Instant::now();
        let result = block_on(Scheduler::new(plan, dispatcher, alarms).run());

        assert!(matches!(result, Err(ScheduleError::WorkerFailed(3))));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(consumer.join().unwrap() >= 2);
        raiser.join().unwrap();
    }

    #[test]
    fn huge_rates_still_advance_the_repeat_grid() {
        let (dispatcher, _intake) = queue::dispatch_queue(1);
        let (_alarm, alarms) = queue::alarm_channel();
        let plan = AnimationPlan {
            frames: Vec::new(),
            rate: u32::MAX,
            one_pass: false,
        };
        assert_eq!(Scheduler::new(plan, dispatcher, alarms).interval, Duration::from_nanos(1));
    }
}
