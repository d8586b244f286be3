use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;
use serde::{Deserialize, Serialize};


/// Compute the log-base-two of the next power of two: 8 -> 3, 9 -> 4.
///
fn ceil_log2(x: usize) -> usize {
    let mut n = 0;
    while 1 << n < x {
        n += 1
    }
    n
}




/// Interface for a group of processes that can exchange ghost and partition
/// payloads over a network. The underlying transport can in principle be
/// TCP, a message queue, or a higher level abstraction like MPI; the
/// in-process implementation below runs over channels.
///
pub trait Communicator {
    /// Must be implemented to return the rank of this process within the
    /// communicator.
    fn rank(&self) -> usize;

    /// Must be implemented to return the number of peer processes in this
    /// communicator.
    fn size(&self) -> usize;

    /// Must be implemented to send a message to a peer. This method must
    /// return immediately, in other words it is not allowed to block until a
    /// matching receive is posted.
    fn send(&self, rank: usize, message: Vec<u8>);

    /// Must be implemented to receive a message from any of the peers. This
    /// method is allowed to block until a message is ready to be received.
    fn recv(&self) -> Vec<u8>;

    /// Implements a binomial tree broadcast from the root node. The message
    /// buffer must be `Some` if this is the root node, and it must be `None`
    /// otherwise.
    ///
    fn broadcast(&self, value: Option<Vec<u8>>) -> Vec<u8> {
        let r = self.rank();
        let p = self.size();

        let value = match value {
            Some(value) => value,
            None => self.recv(),
        };
        for level in (0..ceil_log2(p)).rev() {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 && r + one < p {
                self.send(r + one, value.clone())
            }
        }
        value
    }

    /// Implements a binomial tree reduce. All ranks return `None` except for
    /// the root.
    ///
    fn reduce<F>(&self, f: F, mut value: Vec<u8>) -> Option<Vec<u8>>
    where
        F: Fn(Vec<u8>, Vec<u8>) -> Vec<u8>,
    {
        let r = self.rank();
        let p = self.size();

        for level in 0..ceil_log2(p) {
            let one = 1 << level;
            let two = 1 << (level + 1);

            if r % two == 0 {
                if r + one < p {
                    value = f(value, self.recv())
                }
            } else {
                self.send(r - one, value);
                return None;
            }
        }
        Some(value)
    }

    /// Implements an all-reduce (symmetric fold) operation over a commutative
    /// binary operator.
    ///
    fn all_reduce<F>(&self, f: F, value: Vec<u8>) -> Vec<u8>
    where
        F: Fn(Vec<u8>, Vec<u8>) -> Vec<u8>,
    {
        self.broadcast(self.reduce(f, value))
    }
}




/**
 * An in-process communicator backed by crossbeam channels, one inbox per
 * rank and a sender handle to every peer. `group` manufactures the whole
 * communicator at once; ranks are then moved onto their worker threads.
 */
pub struct ChannelCommunicator {
    rank: usize,
    peers: Vec<Sender<Vec<u8>>>,
    inbox: Receiver<Vec<u8>>,
}




// ============================================================================
impl ChannelCommunicator {

    pub fn group(size: usize) -> Vec<Self> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| unbounded()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| Self {
                rank,
                peers: senders.clone(),
                inbox,
            })
            .collect()
    }
}

impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, rank: usize, message: Vec<u8>) {
        debug!("rank {} -> {}: {} bytes", self.rank, rank, message.len());
        self.peers[rank].send(message).expect("peer inbox was dropped")
    }

    fn recv(&self) -> Vec<u8> {
        self.inbox.recv().expect("all senders were dropped")
    }
}




/**
 * Wire envelope for one remote ghost payload: enough identity for the
 * receiver to locate (or build) the ghost patch, plus the flat payload in
 * protocol order.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GhostMessage {
    pub blockno: usize,
    pub patchno: usize,
    pub level: u32,
    pub time_interp: bool,
    pub payload: Vec<f64>,
}




/**
 * Wire envelope for one migrating patch: the whole solution grid, sent when
 * ownership moves between ranks at a synchronized moment.
 */
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PartitionMessage {
    pub blockno: usize,
    pub patchno: usize,
    pub payload: Vec<f64>,
}




pub fn encode<T: Serialize>(message: &T) -> Vec<u8> {
    rmp_serde::encode::to_vec(message).unwrap()
}


pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> T {
    rmp_serde::decode::from_slice(bytes).unwrap()
}
