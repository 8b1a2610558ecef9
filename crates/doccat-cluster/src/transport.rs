//! In-process message passing between numbered units.
//!
//! Every ordered pair of units has its own FIFO channel, so messages from one
//! sender to one receiver arrive in the order they were sent. All operations
//! block: `send` only enqueues (channels are unbounded, like a buffered send),
//! `recv` waits until a message from the named peer arrives, `barrier` waits
//! for every unit. There are no timeouts.

use std::sync::{Arc, Barrier};

use crossbeam_channel::{unbounded, Receiver, Sender};
use doccat_core::error::{Error, Result};

pub type Rank = usize;

/// Rank of the manager unit; workers are `1..size`.
pub const MANAGER: Rank = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Size handshake: a length or a count announced before what follows.
    Size(u32),
    Payload(Vec<u8>),
    /// The sender gave up on the run; the receiver should stop.
    Abort(String),
}

/// One unit's view of the cluster.
pub struct Endpoint {
    rank: Rank,
    size: usize,
    /// Indexed by destination rank.
    outbox: Vec<Sender<Message>>,
    /// Indexed by source rank.
    inbox: Vec<Receiver<Message>>,
    barrier: Arc<Barrier>,
}

impl Endpoint {
    pub fn rank(&self) -> Rank { self.rank }

    pub fn size(&self) -> usize { self.size }

    fn check_peer(&self, peer: Rank) -> Result<()> {
        if peer >= self.size || peer == self.rank {
            return Err(Error::Transport(format!("unit {} cannot address unit {peer} (cluster of {})", self.rank, self.size)));
        }
        Ok(())
    }

    pub fn send(&self, to: Rank, message: Message) -> Result<()> {
        self.check_peer(to)?;
        self.outbox[to]
            .send(message)
            .map_err(|_| Error::Transport(format!("unit {to} is gone (send from {})", self.rank)))
    }

    /// Blocks until the next message from `from` arrives. An `Abort` from the
    /// peer surfaces as `Error::Aborted`.
    pub fn recv(&self, from: Rank) -> Result<Message> {
        self.check_peer(from)?;
        match self.inbox[from].recv() {
            Ok(Message::Abort(reason)) => Err(Error::Aborted(reason)),
            Ok(message) => Ok(message),
            Err(_) => Err(Error::Transport(format!("unit {from} is gone (recv on {})", self.rank))),
        }
    }

    pub fn send_size(&self, to: Rank, size: usize) -> Result<()> {
        let size = u32::try_from(size).map_err(|_| Error::Transport(format!("size {size} does not fit the handshake")))?;
        self.send(to, Message::Size(size))
    }

    pub fn recv_size(&self, from: Rank) -> Result<usize> {
        match self.recv(from)? {
            Message::Size(n) => Ok(n as usize),
            other => Err(unexpected(from, "size", &other)),
        }
    }

    /// Two-phase send: the byte length, then the bytes.
    pub fn send_sized(&self, to: Rank, bytes: &[u8]) -> Result<()> {
        self.send_size(to, bytes.len())?;
        self.send(to, Message::Payload(bytes.to_vec()))
    }

    /// Receives a length handshake followed by a payload of exactly that length.
    pub fn recv_sized(&self, from: Rank) -> Result<Vec<u8>> {
        let len = self.recv_size(from)?;
        match self.recv(from)? {
            Message::Payload(bytes) if bytes.len() == len => Ok(bytes),
            Message::Payload(bytes) => Err(Error::Transport(format!("unit {from} announced {len} bytes but sent {}", bytes.len()))),
            other => Err(unexpected(from, "payload", &other)),
        }
    }

    /// Root sends `bytes` to every other unit; the others receive it.
    /// Every unit returns the broadcast payload.
    pub fn broadcast_sized(&self, root: Rank, bytes: Option<&[u8]>) -> Result<Vec<u8>> {
        if self.rank == root {
            let bytes = bytes.ok_or_else(|| Error::Transport("broadcast root has no payload".into()))?;
            for peer in (0..self.size).filter(|&p| p != root) { self.send_sized(peer, bytes)?; }
            Ok(bytes.to_vec())
        } else {
            self.recv_sized(root)
        }
    }

    /// Tells every other unit to stop. Units that are already gone are ignored.
    pub fn abort_all(&self, reason: &str) {
        for peer in (0..self.size).filter(|&p| p != self.rank) {
            let _ = self.outbox[peer].send(Message::Abort(reason.to_string()));
        }
    }

    /// Messages from `from` waiting to be received.
    #[cfg(test)]
    pub(crate) fn queued(&self, from: Rank) -> usize { self.inbox[from].len() }

    pub fn barrier(&self) {
        tracing::trace!(rank = self.rank, "waiting at barrier");
        self.barrier.wait();
    }
}

fn unexpected(from: Rank, expected: &str, got: &Message) -> Error {
    let kind = match got {
        Message::Size(_) => "size",
        Message::Payload(_) => "payload",
        Message::Abort(_) => "abort",
    };
    Error::Transport(format!("expected {expected} from unit {from}, got {kind}"))
}

/// Builds `size` fully connected endpoints sharing one barrier.
pub fn local_cluster(size: usize) -> Vec<Endpoint> {
    let barrier = Arc::new(Barrier::new(size));
    let mut outboxes: Vec<Vec<Sender<Message>>> = (0..size).map(|_| Vec::with_capacity(size)).collect();
    let mut inboxes: Vec<Vec<Option<Receiver<Message>>>> = (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
    for (src, outbox) in outboxes.iter_mut().enumerate() {
        for inbox in inboxes.iter_mut() {
            let (tx, rx) = unbounded();
            outbox.push(tx);
            inbox[src] = Some(rx);
        }
    }
    outboxes
        .into_iter()
        .zip(inboxes)
        .enumerate()
        .map(|(rank, (outbox, inbox))| Endpoint {
            rank,
            size,
            outbox,
            inbox: inbox.into_iter().flatten().collect(),
            barrier: Arc::clone(&barrier),
        })
        .collect()
}
