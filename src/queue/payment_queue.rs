use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tracing::debug;
use uuid::Uuid;

/// Out-of-band hint that a payment was just created. Purely an
/// optimization: the periodic cycle picks the payment up regardless.
#[derive(Debug, Clone)]
pub struct DispatchTrigger {
    sender: Sender<Uuid>,
}

impl DispatchTrigger {
    /// Never blocks the intake path. Returns whether the hint was queued.
    pub fn trigger_immediate(&self, payment_id: Uuid) -> bool {
        match self.sender.try_send(payment_id) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(%payment_id, "trigger queue full, leaving payment to the next cycle");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

pub fn create_queue(buffer: usize) -> (DispatchTrigger, Receiver<Uuid>) {
    let (sender, receiver) = mpsc::channel(buffer);
    (DispatchTrigger { sender }, receiver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_and_closed_queue_drop_hints() {
        let (trigger, mut receiver) = create_queue(1);
        let first = Uuid::new_v4();

        assert!(trigger.trigger_immediate(first));
        assert!(!trigger.trigger_immediate(Uuid::new_v4()));
        assert_eq!(receiver.try_recv().unwrap(), first);

        drop(receiver);
        assert!(!trigger.trigger_immediate(Uuid::new_v4()));
    }
}
