//! Sender: assembles the header, signs if required, chooses the next hop,
//! and handles transmission-failure escalation.

use crate::message::{Command, InternalType, Message};
use crate::node::{Environment, Node};
use crate::routing::RoutingTable;
use crate::signing::SigningCoordinator;
use crate::{Address, Error, BROADCAST, GATEWAY, SEARCH_FAILURES};

/// Stamps the protocol version, sets `last = self.node_id`, computes the
/// on-wire length (full `MAX_MESSAGE_LENGTH` if signed, else
/// `HEADER_SIZE + length`), and hands the bytes to the radio driver.
/// Returns the driver's success flag.
pub fn send_write(node: &mut Node, env: &mut impl Environment, next_hop: Address, msg: &Message) -> bool {
    let mut out = *msg;
    out.set_version(crate::PROTOCOL_VERSION);
    out.set_last(node.node_id());
    let len = out.wire_len();
    env.radio().send(next_hop, &out.as_bytes()[..len])
}

/// Routes `msg` toward its destination, running the signing handshake
/// first if required.
pub fn send_route(node: &mut Node, env: &mut impl Environment, mut msg: Message) -> bool {
    if node.parent_id() == crate::AUTO {
        env.error_blink(Error::NoParent);
        crate::discovery::find_parent(node, env);
        return false;
    }
    if node.node_id() == crate::AUTO {
        env.error_blink(Error::NoNodeId);
        request_node_id(node, env);
        return false;
    }

    msg.set_version(crate::PROTOCOL_VERSION);

    if SigningCoordinator::requires_signing(env, &msg) {
        match SigningCoordinator::coordinate(node, env, msg) {
            Ok(signed) => msg = signed,
            Err(_) => return false,
        }
    }

    route(node, env, &msg)
}

/// Next-hop selection, shared by `send_route` and by the signing
/// coordinator's nonce request — which must route like any other outbound
/// message but, being handshake-exempt, never itself re-enters the
/// coordinator.
pub(crate) fn route(node: &mut Node, env: &mut impl Environment, msg: &Message) -> bool {
    let mut route_error_reported = false;
    let ok = if !node.capabilities.repeater {
        send_write(node, env, node.parent_id(), msg)
    } else if msg.destination() == GATEWAY {
        RoutingTable::learn(env.storage(), msg.sender(), msg.last());
        send_write(node, env, node.parent_id(), msg)
    } else {
        let hop = RoutingTable::get_next_hop(env.storage(), msg.destination());
        if hop != BROADCAST {
            send_write(node, env, hop, msg)
        } else if msg.sender() == GATEWAY && msg.destination() == BROADCAST {
            send_write(node, env, BROADCAST, msg)
        } else if node.capabilities.gateway {
            env.error_blink(Error::RouteUnknownAtGateway);
            route_error_reported = true;
            false
        } else {
            RoutingTable::learn(env.storage(), msg.sender(), msg.last());
            send_write(node, env, node.parent_id(), msg)
        }
    };

    if ok {
        node.failed_transmissions = 0;
    } else {
        if !route_error_reported {
            env.error_blink(Error::RadioSendFailed);
        }
        node.failed_transmissions = node.failed_transmissions.saturating_add(1);
        if node.failed_transmissions > SEARCH_FAILURES && node.capabilities.auto_find {
            crate::discovery::find_parent(node, env);
        }
    }
    ok
}

/// If `node_id == AUTO`, sends `ID_REQUEST` to the parent. The response
/// arrives through the normal `process` dispatch like any other inbound
/// frame — no bounded wait here.
pub fn request_node_id(node: &mut Node, env: &mut impl Environment) {
    if node.node_id() != crate::AUTO {
        return;
    }
    let req = Message::build(
        node.node_id(),
        node.parent_id(),
        0,
        Command::Internal,
        InternalType::IdRequest as u8,
        false,
    );
    send_write(node, env, node.parent_id(), &req);
}

/// After id assignment, announces this node's role to the gateway and
/// requests the current firmware config.
pub fn present_node(node: &mut Node, env: &mut impl Environment) {
    let role: u8 = if node.capabilities.gateway {
        2
    } else if node.capabilities.repeater {
        1
    } else {
        0
    };
    let presentation = Message::build(
        node.node_id(),
        GATEWAY,
        0,
        Command::Presentation,
        role,
        false,
    );
    send_route(node, env, presentation);
    request_firmware_config(node, env);
}

/// Sends a `STREAM/FIRMWARE_CONFIG_REQUEST` to the gateway, so OTA can be
/// discovered without a human pressing a button.
pub fn request_firmware_config(node: &mut Node, env: &mut impl Environment) {
    let req = Message::build(
        node.node_id(),
        GATEWAY,
        0,
        Command::Stream,
        crate::message::StreamType::FirmwareConfigRequest as u8,
        false,
    );
    send_route(node, env, req);
}
