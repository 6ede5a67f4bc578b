//! Point-to-point message passing between the processes of a decomposed simulation
//!
//! The halo layer only needs blocking sends and receives matched by source rank and tag. The
//! [`Communicator`] trait captures exactly this. [`ChannelCommunicator`] implements it for ranks
//! running as threads of a single process, using one `crossbeam-channel` inbox per rank.

use std::collections::VecDeque;
use std::time::Duration;

use bytemuck::{Pod, Zeroable};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::trace;
use thiserror::Error as ThisError;

use crate::particle::ParticleSnapshot;

/// Tag distinguishing the messages exchanged in a time step
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MessageTag {
    /// Beads that moved into the subdomain of the receiver
    Migration,
    /// Boundary beads mirrored in the ghost proxies of the receiver
    Ghost,
}

/// Errors of the message transport
#[derive(Clone, PartialEq, Debug, ThisError)]
pub enum CommError {
    /// The addressed rank does not exist
    #[error("rank {0} does not exist")]
    InvalidRank(usize),
    /// The peer dropped its end of the connection
    #[error("rank {0} disconnected")]
    Disconnected(usize),
    /// No matching message arrived within the receive timeout
    #[error("timed out after {timeout:?} waiting for a {tag:?} message from rank {peer}")]
    Timeout {
        peer: usize,
        tag: MessageTag,
        timeout: Duration,
    },
    /// The payload of a message cannot be decoded
    #[error("malformed {tag:?} payload from rank {peer}: {reason}")]
    MalformedPayload {
        peer: usize,
        tag: MessageTag,
        reason: &'static str,
    },
}

/// Blocking point-to-point communication between the ranks of a decomposed simulation
pub trait Communicator: Send {
    /// Rank of this process
    fn rank(&self) -> usize;

    /// Total number of ranks
    fn size(&self) -> usize;

    /// Sends a message to another rank, may return before the message is received
    fn send(&self, dest: usize, tag: MessageTag, payload: Vec<u8>) -> Result<(), CommError>;

    /// Blocks until a message with the given tag from the given rank is available
    ///
    /// Messages from the same rank with the same tag are received in the order they were sent.
    fn recv(&mut self, source: usize, tag: MessageTag) -> Result<Vec<u8>, CommError>;
}

struct Envelope {
    source: usize,
    tag: MessageTag,
    payload: Vec<u8>,
}

/// In-process implementation of [`Communicator`], one instance per rank
pub struct ChannelCommunicator {
    rank: usize,
    /// Senders to the inboxes of all other ranks, `None` at the own rank
    senders: Vec<Option<Sender<Envelope>>>,
    inbox: Receiver<Envelope>,
    /// Received messages that did not match a previous `recv` call yet
    pending: VecDeque<Envelope>,
    timeout: Option<Duration>,
}

impl ChannelCommunicator {
    /// Creates connected communicators for all ranks of a world of the given size
    ///
    /// A rank holds no sender to its own inbox, so the inbox disconnects once all other ranks are dropped.
    pub fn create_world(size: usize, timeout: Option<Duration>) -> Vec<ChannelCommunicator> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..size).map(|_| crossbeam_channel::unbounded()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ChannelCommunicator {
                rank,
                senders: senders
                    .iter()
                    .enumerate()
                    .map(|(peer, sender)| (peer != rank).then(|| sender.clone()))
                    .collect(),
                inbox,
                pending: VecDeque::new(),
                timeout,
            })
            .collect()
    }

    fn take_pending(&mut self, source: usize, tag: MessageTag) -> Option<Vec<u8>> {
        let position = self
            .pending
            .iter()
            .position(|e| e.source == source && e.tag == tag)?;
        self.pending.remove(position).map(|e| e.payload)
    }

    /// Waits for the next message of any rank
    ///
    /// The inbox only disconnects after every other rank dropped its communicator, `source` included.
    fn next_envelope(&self, source: usize, tag: MessageTag) -> Result<Envelope, CommError> {
        match self.timeout {
            Some(timeout) => self.inbox.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => CommError::Timeout {
                    peer: source,
                    tag,
                    timeout,
                },
                RecvTimeoutError::Disconnected => CommError::Disconnected(source),
            }),
            None => self
                .inbox
                .recv()
                .map_err(|_| CommError::Disconnected(source)),
        }
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.senders.len()
    }

    fn send(&self, dest: usize, tag: MessageTag, payload: Vec<u8>) -> Result<(), CommError> {
        let sender = self
            .senders
            .get(dest)
            .and_then(Option::as_ref)
            .ok_or(CommError::InvalidRank(dest))?;
        trace!(
            "Rank {} sends {} bytes ({:?}) to rank {}",
            self.rank,
            payload.len(),
            tag,
            dest
        );
        sender
            .send(Envelope {
                source: self.rank,
                tag,
                payload,
            })
            .map_err(|_| CommError::Disconnected(dest))
    }

    fn recv(&mut self, source: usize, tag: MessageTag) -> Result<Vec<u8>, CommError> {
        if source >= self.size() || source == self.rank {
            return Err(CommError::InvalidRank(source));
        }
        if let Some(payload) = self.take_pending(source, tag) {
            return Ok(payload);
        }

        loop {
            let envelope = self.next_envelope(source, tag)?;
            if envelope.source == source && envelope.tag == tag {
                return Ok(envelope.payload);
            }
            self.pending.push_back(envelope);
        }
    }
}

/// Wire record of a bead mirrored in a ghost proxy of the receiver
///
/// The record addresses the neighbor slot of the receiver that resolves to the proxy: the region of
/// the receiver, the position of the anchor cell in that region's anchor list and the direction
/// from the anchor cell to the proxy.
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Debug, Default, Pod, Zeroable)]
pub struct GhostRecord {
    pub region: u32,
    pub cell: u32,
    pub direction: u32,
    _padding: u32,
    pub snapshot: ParticleSnapshot,
}

impl GhostRecord {
    pub fn new(region: u32, cell: u32, direction: u32, snapshot: ParticleSnapshot) -> Self {
        Self {
            region,
            cell,
            direction,
            _padding: 0,
            snapshot,
        }
    }
}

/// Encodes a slice of plain records into a message payload
pub fn encode_records<T: Pod>(records: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(records).to_vec()
}

/// Decodes a message payload into plain records
pub fn decode_records<T: Pod>(
    payload: &[u8],
    peer: usize,
    tag: MessageTag,
) -> Result<Vec<T>, CommError> {
    if payload.len() % std::mem::size_of::<T>() != 0 {
        return Err(CommError::MalformedPayload {
            peer,
            tag,
            reason: "payload length is not a multiple of the record size",
        });
    }
    Ok(bytemuck::pod_collect_to_vec(payload))
}
