//! Peer transport seam.
//!
//! `PeerConnection` is the trait the SessionCoordinator's remote-reader and
//! remote-writer workers are generic over. The only implementation shipped
//! in this crate is `LoopbackTransport`, a pair of `std::sync::mpsc`
//! channels connecting two in-process `SessionCoordinator`s -- enough to
//! drive the convergence properties end to end without a real network, and
//! to back the CLI's local-mirror demo mode. A production transport (TCP +
//! TLS + the actual bit-exact framing) is an external collaborator this
//! crate does not implement; this module defines the seam, not the socket
//! code.

use std::sync::mpsc::{Receiver, Sender};

use crate::error::SyncError;
use crate::update::Update;

/// One side of a peer connection.
///
/// `recv` returning `Ok(None)` signals that the peer has finished its
/// initial scan (see [`Self::send_scan_done`]); an unexpectedly closed
/// connection surfaces as `Err`, not as a second `None`, so callers never
/// have to guess which condition a `None` means.
pub trait PeerConnection: Send {
    fn send(&self, update: Update) -> Result<(), SyncError>;
    /// Signal that this side's initial scan has been fully sent. The peer's
    /// matching `recv()` call observes this as `Ok(None)`.
    fn send_scan_done(&self) -> Result<(), SyncError>;
    fn recv(&self) -> Result<Option<Update>, SyncError>;
}

enum LoopbackMsg {
    Update(Update),
    ScanDone,
}

/// An in-process, channel-backed `PeerConnection`. `LoopbackTransport::pair`
/// returns two halves wired to each other.
pub struct LoopbackTransport {
    tx: Sender<LoopbackMsg>,
    rx: Receiver<LoopbackMsg>,
}

impl LoopbackTransport {
    /// Build two `LoopbackTransport`s such that sending on one arrives on
    /// the other's `recv`.
    pub fn pair() -> (LoopbackTransport, LoopbackTransport) {
        let (tx_a, rx_a) = std::sync::mpsc::channel();
        let (tx_b, rx_b) = std::sync::mpsc::channel();
        (
            LoopbackTransport { tx: tx_a, rx: rx_b },
            LoopbackTransport { tx: tx_b, rx: rx_a },
        )
    }

    fn closed_err() -> SyncError {
        SyncError::ProtocolViolation {
            reason: "peer loopback channel closed".to_string(),
        }
    }
}

impl PeerConnection for LoopbackTransport {
    fn send(&self, update: Update) -> Result<(), SyncError> {
        self.tx
            .send(LoopbackMsg::Update(update))
            .map_err(|_| Self::closed_err())
    }

    fn send_scan_done(&self) -> Result<(), SyncError> {
        self.tx.send(LoopbackMsg::ScanDone).map_err(|_| Self::closed_err())
    }

    fn recv(&self) -> Result<Option<Update>, SyncError> {
        match self.rx.recv() {
            Ok(LoopbackMsg::Update(u)) => Ok(Some(u)),
            Ok(LoopbackMsg::ScanDone) => Ok(None),
            Err(_) => Err(Self::closed_err()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_pair_delivers_sent_update() {
        let (a, b) = LoopbackTransport::pair();
        a.send(Update::new("x", 1, false)).unwrap();
        let received = b.recv().unwrap().unwrap();
        assert_eq!(received.path, "x");
    }

    #[test]
    fn test_loopback_is_bidirectional() {
        let (a, b) = LoopbackTransport::pair();
        b.send(Update::new("y", 1, false)).unwrap();
        let received = a.recv().unwrap().unwrap();
        assert_eq!(received.path, "y");
    }

    #[test]
    fn test_scan_done_surfaces_as_none() {
        let (a, b) = LoopbackTransport::pair();
        a.send_scan_done().unwrap();
        assert!(b.recv().unwrap().is_none());
    }

    #[test]
    fn test_scan_done_then_more_updates_still_flow() {
        let (a, b) = LoopbackTransport::pair();
        a.send_scan_done().unwrap();
        a.send(Update::new("later", 5, false)).unwrap();
        assert!(b.recv().unwrap().is_none());
        assert_eq!(b.recv().unwrap().unwrap().path, "later");
    }

    #[test]
    fn test_recv_on_dropped_peer_errors() {
        let (a, b) = LoopbackTransport::pair();
        drop(a);
        assert!(b.recv().is_err());
    }
}
