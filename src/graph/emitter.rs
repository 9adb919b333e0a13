//! Step sinks: where the loop reports human-readable progress lines.

use tokio::sync::mpsc;
use tracing::debug;

/// Receives each step string as it is produced. Must never block the loop.
pub trait StepSink: Send + Sync {
    fn emit(&self, step: &str);
}

pub struct NoopStepSink;

impl StepSink for NoopStepSink {
    fn emit(&self, _step: &str) {}
}

/// Forwards steps into a bounded channel. Steps are dropped when the
/// channel is full or the receiver has gone away.
#[derive(Clone)]
pub struct ChannelStepSink {
    tx: mpsc::Sender<String>,
}

impl ChannelStepSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl StepSink for ChannelStepSink {
    fn emit(&self, step: &str) {
        if let Err(err) = self.tx.try_send(step.to_string()) {
            debug!("Dropping progress step: {}", err);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::StepSink;

    #[derive(Default)]
    pub struct CollectingStepSink {
        pub steps: Mutex<Vec<String>>,
    }

    impl CollectingStepSink {
        pub fn steps(&self) -> Vec<String> {
            self.steps.lock().map(|s| s.clone()).unwrap_or_default()
        }
    }

    impl StepSink for CollectingStepSink {
        fn emit(&self, step: &str) {
            if let Ok(mut steps) = self.steps.lock() {
                steps.push(step.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (sink, mut rx) = ChannelStepSink::channel(1);
        sink.emit("first");
        sink.emit("second");

        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_receiver_is_ignored() {
        let (sink, rx) = ChannelStepSink::channel(4);
        drop(rx);
        sink.emit("nobody listening");
    }
}
