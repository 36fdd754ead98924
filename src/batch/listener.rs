use crate::batch::worker::WorkerEvent;
use std::sync::mpsc::Sender;

/// Sink for the user-facing log lines and progress of a batch run.
pub trait Listener {
    fn log(&self, message: &str);

    /// Overall progress in percent, `0..=100`.
    fn progress(&self, percent: u8);
}

/// Forwards log lines to `tracing`; progress is only traced at debug level.
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingListener;

impl Listener for TracingListener {
    fn log(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn progress(&self, percent: u8) {
        tracing::debug!("Progress: {percent}%");
    }
}

/// Sends every notification over a channel, used by the background worker.
pub struct ChannelListener {
    sender: Sender<WorkerEvent>,
}

impl ChannelListener {
    pub fn new(sender: Sender<WorkerEvent>) -> Self {
        Self { sender }
    }
}

impl Listener for ChannelListener {
    // A closed channel means nobody is listening any more.
    fn log(&self, message: &str) {
        let _ = self.sender.send(WorkerEvent::Log(message.to_owned()));
    }

    fn progress(&self, percent: u8) {
        let _ = self.sender.send(WorkerEvent::Progress(percent));
    }
}
