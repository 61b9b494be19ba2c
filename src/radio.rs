//! Radio driver contract. The driver itself is out of scope here — this
//! crate only depends on the trait.

use crate::{Address, MAX_MESSAGE_LENGTH};

/// A byte-frame send/receive primitive keyed by a 1-byte address.
///
/// `set_address` conceptually opens three reception channels: broadcast,
/// a per-node channel derived from `addr`, and a write channel; this
/// trait doesn't distinguish them further since the processing loop only
/// ever needs "is a frame available" / "read it".
pub trait Radio {
    fn set_address(&mut self, addr: Address);

    /// Sends `bytes` to `to`. Returns the driver's success flag.
    fn send(&mut self, to: Address, bytes: &[u8]) -> bool;

    /// Non-blocking poll: `Some(sender_addr)` if a frame is waiting.
    fn available(&mut self) -> Option<Address>;

    /// Reads the waiting frame into `buf`, returning the number of bytes
    /// written. `buf` is at least `MAX_MESSAGE_LENGTH` bytes.
    fn receive(&mut self, buf: &mut [u8; MAX_MESSAGE_LENGTH]) -> usize;
}
