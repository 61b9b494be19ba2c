//! The core dispatcher. Consumes one received message per call, routes it
//! by destination and command/type, and produces at most one reply or
//! forwarded copy.
//!
//! Error policy: any failed inbound validation drops the frame and emits
//! an error blink; `process` never propagates an inbound error and never
//! panics.

use crate::discovery;
use crate::message::{Command, InternalType, Message, StreamType};
use crate::node::{Environment, Node, NodeContext};
use crate::ota;
use crate::routing::RoutingTable;
use crate::sender;
use crate::signing::{self, SigningCoordinator};
use crate::{Error, BROADCAST, GATEWAY, JITTER_MASK, MAX_MESSAGE_LENGTH};

/// Processes at most one inbound frame. If none is waiting, runs the OTA
/// idle tick and returns.
pub fn process(node: &mut Node, env: &mut impl Environment) {
    if node.halted {
        return;
    }

    if env.radio().available().is_none() {
        ota::tick(node, env);
        signing::tick(node, env);
        return;
    }

    let mut buf = [0u8; MAX_MESSAGE_LENGTH];
    let n = env.radio().receive(&mut buf);
    let msg = Message::from_bytes(&buf[..n]);

    if msg.version() != crate::PROTOCOL_VERSION {
        env.error_blink(Error::ProtocolVersionMismatch);
        return;
    }

    if msg.destination() == node.node_id() {
        if let Err(e) = signing::verify_inbound(node, env, &msg) {
            env.error_blink(e);
            return;
        }
    }

    if msg.destination() == node.node_id() {
        handle_for_us(node, env, msg);
    } else if msg.destination() == BROADCAST {
        handle_broadcast(node, env, msg);
    } else {
        handle_forward(node, env, msg);
    }
}

fn handle_for_us(node: &mut Node, env: &mut impl Environment, mut msg: Message) {
    msg.set_signed(false);

    if msg.last() != node.parent_id() && node.capabilities.repeater {
        RoutingTable::learn(env.storage(), msg.sender(), msg.last());
    }

    if msg.ack_requested() {
        let mut ack = msg;
        ack.set_sender(node.node_id());
        ack.set_destination(msg.sender());
        ack.set_ack_requested(false);
        ack.set_ack(true);
        sender::send_write(node, env, msg.sender(), &ack);
    }

    if msg.command() == Some(Command::Internal) {
        if let Some(t) = msg.internal_type() {
            match t {
                InternalType::FindParentResponse => {
                    let responder_distance = msg.get_byte().unwrap_or(crate::DISTANCE_UNKNOWN);
                    discovery::on_find_parent_response(node, env, msg.sender(), responder_distance);
                    return;
                }
                InternalType::GetNonce => {
                    let nonce = env.signer().generate_nonce();
                    let mut resp = Message::build(
                        node.node_id(),
                        msg.sender(),
                        0,
                        Command::Internal,
                        InternalType::GetNonceResponse as u8,
                        false,
                    );
                    resp.set_custom(&nonce);
                    sender::send_write(node, env, msg.sender(), &resp);
                    return;
                }
                InternalType::GetNonceResponse => {
                    let payload = msg.payload();
                    let mut nonce = [0u8; 8];
                    let n = payload.len().min(8);
                    nonce[..n].copy_from_slice(&payload[..n]);
                    SigningCoordinator::on_nonce(node, env, msg.sender(), nonce);
                    return;
                }
                InternalType::RequestSigning => {
                    let required = msg.get_byte().unwrap_or(0) != 0;
                    RoutingTable::set_sign_required(env.storage(), msg.sender(), required);
                    if node.capabilities.gateway {
                        let our_pref = RoutingTable::get_sign_required(env.storage(), msg.sender());
                        let mut resp = Message::build(
                            node.node_id(),
                            msg.sender(),
                            0,
                            Command::Internal,
                            InternalType::RequestSigning as u8,
                            false,
                        );
                        resp.set_byte(our_pref as u8);
                        sender::send_write(node, env, msg.sender(), &resp);
                    }
                    return;
                }
                InternalType::IdResponse if msg.sender() == GATEWAY && node.node_id() == crate::AUTO => {
                    let assigned = msg.get_byte().unwrap_or(crate::AUTO);
                    if assigned == crate::AUTO {
                        node.halted = true;
                        env.error_blink(Error::PoolExhausted);
                        return;
                    }
                    let new_ctx = NodeContext {
                        node_id: assigned,
                        parent_id: node.parent_id(),
                        distance_to_gateway: node.distance(),
                    };
                    node.set_context(new_ctx, env);
                    sender::present_node(node, env);
                    return;
                }
                _ if msg.sender() == GATEWAY => {
                    env.process_internal_message(&msg);
                    return;
                }
                _ => {}
            }
        }
    }

    if msg.command() == Some(Command::Stream) {
        if let Some(t) = msg.stream_type() {
            match t {
                StreamType::FirmwareConfigResponse => {
                    if let Some(new_config) = crate::flash::FirmwareConfig::from_bytes(msg.payload()) {
                        ota::start_if_changed(node, env, new_config);
                    }
                    return;
                }
                StreamType::FirmwareResponse => {
                    ota::on_block_response(node, env, msg.payload());
                    return;
                }
                _ => {}
            }
        }
    }

    if node.capabilities.gateway {
        env.gateway_bridge(&msg);
    }
    env.application(&msg);
}

fn handle_broadcast(node: &mut Node, env: &mut impl Environment, msg: Message) {
    if msg.command() == Some(Command::Internal)
        && msg.internal_type() == Some(InternalType::Discover)
        && msg.last() == node.parent_id()
    {
        let jitter = env.clock().jitter(JITTER_MASK);
        env.clock().wait_ms(jitter);

        let mut resp = Message::build(
            node.node_id(),
            msg.sender(),
            0,
            Command::Internal,
            InternalType::DiscoverResponse as u8,
            false,
        );
        resp.set_byte(node.parent_id());
        sender::send_write(node, env, msg.sender(), &resp);

        if node.capabilities.repeater {
            sender::send_write(node, env, BROADCAST, &msg);
        }
    }
}

fn handle_forward(node: &mut Node, env: &mut impl Environment, msg: Message) {
    if node.capabilities.repeater
        && node.node_id() != crate::AUTO
        && msg.command() == Some(Command::Internal)
        && msg.internal_type() == Some(InternalType::FindParent)
        && msg.sender() != node.parent_id()
    {
        if node.distance() == crate::DISTANCE_UNKNOWN {
            discovery::find_parent(node, env);
            return;
        }
        let jitter = env.clock().jitter(JITTER_MASK);
        env.clock().wait_ms(jitter);

        let mut resp = Message::build(
            node.node_id(),
            msg.sender(),
            0,
            Command::Internal,
            InternalType::FindParentResponse as u8,
            false,
        );
        resp.set_byte(node.distance());
        sender::send_write(node, env, msg.sender(), &resp);
        return;
    }

    // Any other unicast frame not destined for us was delivered because the
    // radio driver opened a per-node channel that put us on its path —
    // relay it toward its real destination.
    sender::send_route(node, env, msg);
}
