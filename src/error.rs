//! Error kinds produced by the transport engine.
//!
//! Policy: every inbound error drops the frame and emits an error blink
//! (`Environment::error_blink`); it is never propagated to the host as a
//! `Result`. Every outbound error is returned to the caller as `false` or
//! `Err`. `PoolExhausted` is fatal and latches `Node::halted`.

#[cfg_attr(feature = "defmt", derive(defmt::Debug))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Inbound frame's `version` field didn't match [`crate::PROTOCOL_VERSION`].
    ProtocolVersionMismatch,
    /// Inbound frame required a signature but didn't carry one.
    UnsignedButRequired,
    /// Inbound frame carried a signature that failed verification.
    SignatureVerifyFailed,
    /// The signing coordinator's nonce round-trip exceeded
    /// [`crate::VERIFICATION_TIMEOUT_MS`].
    NonceTimeout,
    /// `Signer::sign` reported failure.
    SignFailed,
    /// `send_route` needs a parent and `parent_id == AUTO`.
    NoParent,
    /// `send_route` needs a node id and `node_id == AUTO`.
    NoNodeId,
    /// `Radio::send` returned failure.
    RadioSendFailed,
    /// A gateway-role repeater received a frame for a destination with no
    /// known route and no parent to fall back to.
    RouteUnknownAtGateway,
    /// `FlashProgrammer::init` failed; the OTA session never opened.
    FlashInitFailed,
    /// The assembled firmware image's CRC-16 didn't match the config's.
    FirmwareChecksumFailed,
    /// The OTA session exhausted its per-block retry budget.
    FirmwareSessionExhausted,
    /// The gateway answered an `ID_REQUEST` with `AUTO` (no ids left).
    /// Fatal: the node halts permanently, see [`crate::node::Node::halted`].
    PoolExhausted,
}
