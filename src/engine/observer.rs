//! Progress observation.

use crate::state_machine::StateSnapshot;
use tokio::sync::mpsc;

/// Receives a read-only snapshot after every status transition of a run,
/// in transition order, starting with the `init` snapshot.
///
/// Called inline from the driver loop; implementations must not block.
pub trait ProgressObserver: Send + Sync {
    fn on_transition(&self, snapshot: &StateSnapshot);
}

/// Forwards snapshots into an unbounded channel.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<StateSnapshot>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StateSnapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_transition(&self, snapshot: &StateSnapshot) {
        // Receiver may be gone; the run does not care.
        let _ = self.tx.send(snapshot.clone());
    }
}
