//! `Node`: the single owned value carrying node identity, the routing and
//! signing state, the outbound-failure streak and the in-flight OTA/signing
//! sessions, instead of a scatter of process-wide globals.
//!
//! `Environment` is the one seam every hardware collaborator (radio,
//! storage, signer, flash, clock) and host callback hook crosses, so the
//! processing loop and its helpers only ever carry one extra generic bound
//! instead of five.

use crate::flash::{FirmwareConfig, FlashProgrammer};
use crate::message::Message;
use crate::ota::OtaSession;
use crate::radio::Radio;
use crate::signer::Signer;
use crate::signing::SigningCoordinator;
use crate::storage::{layout, NonvolatileStorage};
use crate::{Address, Clock, AUTO, DISTANCE_UNKNOWN};

/// Value-level configuration replacing compile-time `#[cfg(feature)]`
/// sprinkling: repeater/gateway/auto-find/signing-required are all
/// cross-cutting, so one `Node` binary can't decide them at build time
/// without duplicating the whole crate per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Willing to forward traffic on behalf of descendants and maintain a
    /// routing table.
    pub repeater: bool,
    /// This node *is* the gateway (`node_id == GATEWAY`, `distance == 0`).
    pub gateway: bool,
    /// Whether `sender.rs`/`discovery.rs` may trigger rediscovery on a
    /// `failed_transmissions` streak.
    pub auto_find: bool,
    /// Whether this node globally enforces inbound signature verification.
    pub signing_required: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            repeater: false,
            gateway: false,
            auto_find: true,
            signing_required: false,
        }
    }
}

/// The single boundary trait bundling every external collaborator (radio,
/// storage, signer, flash, clock) plus the three host callback hooks a
/// processed frame may need to reach.
pub trait Environment {
    type Radio: Radio;
    type Storage: NonvolatileStorage;
    type Signer: Signer;
    type Flash: FlashProgrammer;
    type Clock: Clock;

    fn radio(&mut self) -> &mut Self::Radio;
    fn storage(&mut self) -> &mut Self::Storage;
    fn signer(&mut self) -> &mut Self::Signer;
    fn flash(&mut self) -> &mut Self::Flash;
    fn clock(&mut self) -> &mut Self::Clock;

    /// Invoked once per inbound frame addressed to us, after signing
    /// verification and ack emission, never for handshake/OTA/internal
    /// traffic that the core consumes itself.
    fn application(&mut self, msg: &Message);

    /// Consumes a fully-assembled message destined for the controller;
    /// only called on a gateway node.
    fn gateway_bridge(&mut self, msg: &Message);

    /// Host-provided handling for `INTERNAL` frames from the gateway that
    /// aren't one of the core's own handshake subtypes.
    fn process_internal_message(&mut self, msg: &Message);

    /// Error policy hook: every inbound error drops the frame and emits
    /// this "error blink" instead of propagating.
    fn error_blink(&mut self, err: crate::Error);
}

/// Node context: `{ node_id, parent_id, distance_to_gateway }`, each
/// persisted to a known nonvolatile offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeContext {
    pub node_id: Address,
    pub parent_id: Address,
    pub distance_to_gateway: u8,
}

impl NodeContext {
    /// All-`AUTO` context for a freshly booted, never-provisioned node.
    pub fn fresh() -> Self {
        NodeContext {
            node_id: AUTO,
            parent_id: AUTO,
            distance_to_gateway: DISTANCE_UNKNOWN,
        }
    }

    pub fn load(storage: &impl NonvolatileStorage) -> Self {
        NodeContext {
            node_id: storage.read_u8(layout::NODE_ID),
            parent_id: storage.read_u8(layout::PARENT_NODE_ID),
            distance_to_gateway: storage.read_u8(layout::DISTANCE),
        }
    }

    fn store(&self, storage: &mut impl NonvolatileStorage) {
        storage.write_u8(layout::NODE_ID, self.node_id);
        storage.write_u8(layout::PARENT_NODE_ID, self.parent_id);
        storage.write_u8(layout::DISTANCE, self.distance_to_gateway);
    }
}

/// The single owned value threaded through every operation in this crate.
pub struct Node {
    pub context: NodeContext,
    pub capabilities: Capabilities,

    /// Outbound-failure streak since the last success.
    pub failed_transmissions: u8,
    /// Reentrancy guard for `find_parent`.
    pub discovery_running: bool,
    /// Absolute `now_ms()` deadline of the in-flight discovery round, set
    /// when `discovery_running` becomes true.
    pub(crate) discovery_deadline_ms: u32,

    pub(crate) signing: SigningCoordinator,
    pub ota: Option<OtaSession>,
    pub(crate) stored_firmware_config: FirmwareConfig,

    /// Fatal latch for `Error::PoolExhausted`: once set, every subsequent
    /// `process` call returns immediately instead of spinning on a gateway
    /// that will never hand out another id.
    pub halted: bool,
}

impl Node {
    pub fn new(capabilities: Capabilities, env: &mut impl Environment) -> Self {
        let context = NodeContext::load(env.storage());
        let mut node = Node {
            context,
            capabilities,
            failed_transmissions: 0,
            discovery_running: false,
            discovery_deadline_ms: 0,
            signing: SigningCoordinator::new(),
            ota: None,
            stored_firmware_config: FirmwareConfig::default(),
            halted: false,
        };
        node.stored_firmware_config = node.load_firmware_config(env);
        node
    }

    pub fn node_id(&self) -> Address {
        self.context.node_id
    }

    pub fn parent_id(&self) -> Address {
        self.context.parent_id
    }

    pub fn distance(&self) -> u8 {
        self.context.distance_to_gateway
    }

    /// Persists `context` if it changed, avoiding a nonvolatile write on
    /// every call when nothing actually moved.
    pub(crate) fn set_context(&mut self, new: NodeContext, env: &mut impl Environment) {
        if new != self.context {
            self.context = new;
            self.context.store(env.storage());
        }
    }

    pub(crate) fn load_firmware_config(&self, env: &mut impl Environment) -> FirmwareConfig {
        let mut buf = [0u8; FirmwareConfig::WIRE_LEN];
        env.storage().read_block(
            layout::FIRMWARE_CONFIG_BASE,
            &mut buf[..layout::FIRMWARE_CONFIG_LEN as usize],
        );
        FirmwareConfig::from_bytes(&buf).unwrap_or_default()
    }

    pub(crate) fn store_firmware_config(&mut self, config: FirmwareConfig, env: &mut impl Environment) {
        self.stored_firmware_config = config;
        let bytes = config.to_bytes();
        env.storage()
            .write_block(layout::FIRMWARE_CONFIG_BASE, &bytes[..layout::FIRMWARE_CONFIG_LEN as usize]);
    }
}
