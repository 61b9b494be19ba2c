//! Signing coordinator.
//!
//! A half-duplex nonce request / sign / verify flow with a bounded wait
//! that re-enters the processing loop. The saved outbound copy lives in a
//! field distinct from the receive buffer `process.rs` decodes fresh off
//! the radio — nothing aliases the two, so the re-entrant `process` calls
//! this coordinator makes while waiting for a nonce can never clobber the
//! message it's trying to send.

use crate::message::{Command, InternalType, Message};
use crate::node::{Environment, Node};
use crate::signer::Nonce;
use crate::{Address, Error, VERIFICATION_TIMEOUT_MS};

/// A signing handshake's progress: idle, waiting on a nonce response, or
/// signed and ready to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    WaitingForNonce,
    Ok,
}

pub struct SigningCoordinator {
    state: State,
    saved: Option<Message>,
    destination: Address,
    deadline_ms: u32,
}

impl SigningCoordinator {
    pub fn new() -> Self {
        SigningCoordinator {
            state: State::Idle,
            saved: None,
            destination: crate::BROADCAST,
            deadline_ms: 0,
        }
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.saved = None;
    }

    /// Whether `msg` must go through this coordinator before it may be
    /// transmitted: destined to a peer requiring signing, and not itself
    /// an ack or a handshake-exempt subtype.
    pub fn requires_signing(env: &mut impl Environment, msg: &Message) -> bool {
        if msg.ack() {
            return false;
        }
        if msg.command() == Some(Command::Internal) {
            if let Some(t) = msg.internal_type() {
                if t.is_handshake_exempt() {
                    return false;
                }
            }
        }
        crate::routing::RoutingTable::get_sign_required(env.storage(), msg.destination())
    }

    /// Drives a send through the nonce handshake, re-entering
    /// `Node::process` while waiting.
    ///
    /// On success, returns the signed message ready for transmission. On
    /// timeout, returns `Err(Error::NonceTimeout)` and the send is
    /// abandoned, not retried.
    pub fn coordinate(
        node: &mut Node,
        env: &mut impl Environment,
        msg: Message,
    ) -> Result<Message, Error> {
        node.signing.state = State::WaitingForNonce;
        node.signing.saved = Some(msg);
        node.signing.destination = msg.destination();

        let nonce_req = Message::build(
            node.node_id(),
            msg.destination(),
            0,
            Command::Internal,
            InternalType::GetNonce as u8,
            false,
        );
        crate::sender::route(node, env, &nonce_req);

        let now = env.clock().now_ms();
        node.signing.deadline_ms = now.saturating_add(VERIFICATION_TIMEOUT_MS);

        while node.signing.state == State::WaitingForNonce {
            if env.clock().now_ms() >= node.signing.deadline_ms {
                node.signing.reset();
                env.error_blink(Error::NonceTimeout);
                return Err(Error::NonceTimeout);
            }
            crate::process::process(node, env);
        }

        match node.signing.saved.take() {
            Some(signed) if node.signing.state == State::Ok => {
                node.signing.reset();
                Ok(signed)
            }
            _ => {
                node.signing.reset();
                Err(Error::NonceTimeout)
            }
        }
    }

    /// Feeds an inbound `GET_NONCE_RESPONSE` nonce into the coordinator.
    /// No-op if we aren't waiting, or the response isn't from the peer
    /// we're waiting on.
    pub fn on_nonce(node: &mut Node, env: &mut impl Environment, from: Address, nonce: Nonce) {
        if node.signing.state != State::WaitingForNonce || from != node.signing.destination {
            return;
        }
        let Some(mut saved) = node.signing.saved else {
            return;
        };
        if env.signer().sign(&nonce, &mut saved) {
            node.signing.saved = Some(saved);
            node.signing.state = State::Ok;
        } else {
            env.error_blink(Error::SignFailed);
            node.signing.reset();
        }
    }
}

impl Default for SigningCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Idle-branch timer tick. Under this coordinator's synchronous design,
/// `coordinate`'s own loop always resets `state` before returning control
/// to anything but its own nested `process` calls, so in practice this
/// never finds anything to do — it exists as a defensive second check in
/// case a host ever drives `process` from outside that loop while a wait
/// is outstanding.
pub(crate) fn tick(node: &mut Node, env: &mut impl Environment) {
    if node.signing.state == State::WaitingForNonce && env.clock().now_ms() >= node.signing.deadline_ms {
        node.signing.reset();
        env.error_blink(Error::NonceTimeout);
    }
}

/// Inbound verification policy: if signing is required globally and the
/// message is addressed to us and isn't an ack and isn't an exempt
/// subtype, it must carry the signed bit *and* pass verification.
pub fn verify_inbound(node: &Node, env: &mut impl Environment, msg: &Message) -> Result<(), Error> {
    if !node.capabilities.signing_required {
        return Ok(());
    }
    if msg.ack() {
        return Ok(());
    }
    if msg.command() == Some(Command::Internal) {
        if let Some(t) = msg.internal_type() {
            if t.is_handshake_exempt() {
                return Ok(());
            }
        }
    }
    if !msg.signed() {
        return Err(Error::UnsignedButRequired);
    }
    if !env.signer().verify(msg) {
        return Err(Error::SignatureVerifyFailed);
    }
    Ok(())
}
