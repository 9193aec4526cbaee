//! The dispatch queue between the scheduler and the workers.
//!
//! Bounded: a full queue suspends the scheduler, which is the only
//! backpressure in the system. Dropping the last [`Dispatcher`] tells the
//! workers to finish what is queued and exit.
//!
//! Workers that die raise an alarm on a separate channel so the scheduler
//! stops instead of feeding the survivors.

use pingtide_common::DestinationAddress;

pub type Dispatcher = flume::Sender<DestinationAddress>;
pub type Intake = flume::Receiver<DestinationAddress>;

/// Carries the id of a worker that hit a fatal error.
pub type Alarm = flume::Sender<usize>;
pub type Alarms = flume::Receiver<usize>;

pub fn dispatch_queue(capacity: usize) -> (Dispatcher, Intake) {
    flume::bounded(capacity.max(1))
}

pub fn alarm_channel() -> (Alarm, Alarms) {
    flume::unbounded()
}
