use crate::error::Result;
use tokio::sync::oneshot;
use tracing::debug;

/// Pending one-shot requests fulfilled by the frame delivery task.
///
/// Each kind has a single slot. Issuing a new ticket of a kind drops the
/// previous sender, so a superseded caller observes channel closure rather
/// than a stale value; tearing the graph down drops everything outstanding.
#[derive(Default)]
pub struct TicketBoard {
    snapshot: Option<SnapshotTicket>,
    save_frame: Option<SaveFrameTicket>,
    resolution_probe: Option<ResolutionTicket>,
}

pub struct SnapshotTicket {
    pub quality: u8,
    pub reply: oneshot::Sender<Result<String>>,
}

pub struct SaveFrameTicket {
    pub reply: oneshot::Sender<Result<()>>,
}

pub struct ResolutionTicket {
    pub reply: oneshot::Sender<String>,
}

/// Tickets drained for fulfillment against a single frame
#[derive(Default)]
pub struct PendingTickets {
    pub snapshot: Option<SnapshotTicket>,
    pub save_frame: Option<SaveFrameTicket>,
    pub resolution_probe: Option<ResolutionTicket>,
}

impl PendingTickets {
    pub fn is_empty(&self) -> bool {
        self.snapshot.is_none() && self.save_frame.is_none() && self.resolution_probe.is_none()
    }
}

impl TicketBoard {
    pub fn issue_snapshot(&mut self, quality: u8) -> oneshot::Receiver<Result<String>> {
        let (reply, rx) = oneshot::channel();
        if self.snapshot.replace(SnapshotTicket { quality, reply }).is_some() {
            debug!("Superseding unfulfilled snapshot ticket");
        }
        rx
    }

    pub fn issue_save_frame(&mut self) -> oneshot::Receiver<Result<()>> {
        let (reply, rx) = oneshot::channel();
        if self.save_frame.replace(SaveFrameTicket { reply }).is_some() {
            debug!("Superseding unfulfilled save-frame ticket");
        }
        rx
    }

    pub fn issue_resolution_probe(&mut self) -> oneshot::Receiver<String> {
        let (reply, rx) = oneshot::channel();
        if self.resolution_probe.replace(ResolutionTicket { reply }).is_some() {
            debug!("Superseding unfulfilled resolution probe");
        }
        rx
    }

    /// Take everything pending; the caller fulfills outside the lock
    pub fn drain(&mut self) -> PendingTickets {
        PendingTickets {
            snapshot: self.snapshot.take(),
            save_frame: self.save_frame.take(),
            resolution_probe: self.resolution_probe.take(),
        }
    }

    /// Drop all outstanding tickets; their receivers observe closure
    pub fn clear(&mut self) {
        self.snapshot = None;
        self.save_frame = None;
        self.resolution_probe = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_ticket_supersedes_old_one() {
        let mut board = TicketBoard::default();
        let first = board.issue_snapshot(85);
        let second = board.issue_snapshot(85);

        // The first receiver sees closure, never a value
        assert!(first.await.is_err());

        let pending = board.drain();
        let ticket = pending.snapshot.unwrap();
        ticket.reply.send(Ok("payload".into())).unwrap();
        assert_eq!(second.await.unwrap().unwrap(), "payload");
    }

    #[tokio::test]
    async fn test_clear_drops_all_receivers() {
        let mut board = TicketBoard::default();
        let snapshot = board.issue_snapshot(85);
        let probe = board.issue_resolution_probe();

        board.clear();
        assert!(snapshot.await.is_err());
        assert!(probe.await.is_err());
        assert!(board.drain().is_empty());
    }

    #[test]
    fn test_drain_empties_the_board() {
        let mut board = TicketBoard::default();
        let _rx = board.issue_resolution_probe();

        let pending = board.drain();
        assert!(pending.resolution_probe.is_some());
        assert!(board.drain().is_empty());
    }
}
