//! Node-side transport engine for a low-power wireless sensor mesh.
//!
//! This crate drives the message state machine of a single mesh node: it
//! decodes inbound frames, routes outbound ones via a parent/route table,
//! runs parent discovery, coordinates an optional per-peer signing
//! handshake, and interleaves an OTA firmware download with normal
//! traffic — all from one cooperatively-scheduled [`Node::process`] call.
//!
//! Everything that touches real hardware (radio, nonvolatile storage,
//! flash, a signer, a clock) is a trait the host implements; this crate
//! never talks to silicon directly. See [`Environment`] for the single
//! seam all of those collaborators are bundled behind.
//!
//! Supports `no_std`; `cfg(test)` builds pull in `std` for the unit and
//! integration test harnesses (hex fixtures, mock `Environment`s).
#![cfg_attr(not(test), no_std)]

pub mod clock;
pub mod crc16;
pub mod discovery;
pub mod error;
pub mod flash;
pub mod message;
pub mod node;
pub mod ota;
pub mod process;
pub mod radio;
pub mod routing;
pub mod sender;
pub mod signer;
pub mod signing;
pub mod storage;

pub use clock::Clock;
pub use error::Error;
pub use flash::{FirmwareConfig, FlashProgrammer};
pub use message::{Command, InternalType, Message, PayloadType, StreamType};
pub use node::{Capabilities, Environment, Node};
pub use radio::Radio;
pub use routing::RoutingTable;
pub use signer::{Nonce, Signer};
pub use storage::NonvolatileStorage;

/// 1-byte node identifier. `0` and `255` are reserved, see [`GATEWAY`],
/// [`BROADCAST`] and [`AUTO`].
pub type Address = u8;

/// The gateway's fixed address.
pub const GATEWAY: Address = 0;

/// Broadcast destination: every node on the local radio channel.
pub const BROADCAST: Address = 255;

/// Sentinel meaning "not yet assigned", for both `node_id` and `parent_id`.
///
/// Deliberately the same numeric value as [`BROADCAST`] — an unassigned
/// node has no address of its own yet, so it reuses the one value no real
/// node may hold. Which meaning applies is always clear from which field
/// is being read (`node_id`/`parent_id` vs. a message's `destination`).
pub const AUTO: Address = 255;

/// The protocol version stamped into every outbound frame by
/// [`Message::build`] and checked on every inbound frame by
/// [`process::process`].
pub const PROTOCOL_VERSION: u8 = 3;

/// `last + sender + destination + sensor + packed-flags(3) + type`.
pub const HEADER_SIZE: usize = 8;

/// Largest frame the radio driver can carry in one packet.
pub const MAX_MESSAGE_LENGTH: usize = 32;

/// Largest payload a message may carry (`MAX_MESSAGE_LENGTH - HEADER_SIZE`).
pub const MAX_PAYLOAD: usize = MAX_MESSAGE_LENGTH - HEADER_SIZE;

/// "Unknown distance to gateway".
pub const DISTANCE_UNKNOWN: u8 = 255;

/// Outbound-failure streak after which, with auto-find enabled, parent
/// rediscovery is triggered. Kept small so a node stuck behind a dead
/// parent notices quickly without rediscovering on every transient
/// collision.
pub const SEARCH_FAILURES: u8 = 3;

/// How long [`discovery::find_parent`] waits for `FIND_PARENT_RESPONSE`
/// packets before adopting whatever it heard.
pub const FIND_PARENT_WAIT_MS: u32 = 2000;

/// Absolute deadline for the signing coordinator's nonce round-trip.
pub const VERIFICATION_TIMEOUT_MS: u32 = 5000;

/// Per-block OTA retry budget; a session aborts after this many timeouts
/// with no response for the same block.
pub const OTA_RETRY: u8 = 5;

/// Minimum spacing between successive `FIRMWARE_REQUEST` retries.
pub const OTA_RETRY_DELAY_MS: u32 = 500;

/// Bytes per OTA block, matching the firmware config's block count.
pub const BLOCK_SIZE: usize = 16;

/// First flash offset past the bootloader header
/// (`"FLXIMG:" + size_hi + size_lo + ":"`, 10 bytes).
pub const START_OFFSET: u32 = 10;

/// Size of the lower flash region erased before an OTA session starts.
pub const FLASH_STAGING_SIZE: u32 = 32 * 1024;

/// Upper bound on `BROADCAST`-addressed reply jitter: a uniformly random
/// delay in `0..JITTER_MASK` milliseconds, spreading out replies from
/// nodes that all heard the same broadcast at once.
pub const JITTER_MASK: u32 = 1024;
