//! Parent discovery: broadcast-ping / best-response state machine with a
//! reentrancy guard.

use crate::message::{Command, InternalType, Message};
use crate::node::{Environment, Node, NodeContext};
use crate::{Address, BROADCAST, DISTANCE_UNKNOWN, FIND_PARENT_WAIT_MS};

/// Runs one round of parent discovery. A no-op if a round is already in
/// flight.
///
/// Broadcasts `INTERNAL/FIND_PARENT`, then drains inbound traffic for
/// ~[`FIND_PARENT_WAIT_MS`] while `process.rs`'s dispatch
/// (`on_find_parent_response`) adopts the first strictly-improving
/// responder. Persists `parent_id`/`distance` on exit if either changed.
pub fn find_parent(node: &mut Node, env: &mut impl Environment) {
    if node.discovery_running {
        return;
    }
    node.discovery_running = true;

    let mut ctx = node.context;
    ctx.distance_to_gateway = DISTANCE_UNKNOWN;
    node.set_context(ctx, env);

    let ping = Message::build(
        node.node_id(),
        BROADCAST,
        0,
        Command::Internal,
        InternalType::FindParent as u8,
        false,
    );
    crate::sender::send_write(node, env, BROADCAST, &ping);

    let deadline = env.clock().now_ms().saturating_add(FIND_PARENT_WAIT_MS);
    node.discovery_deadline_ms = deadline;
    while env.clock().now_ms() < deadline {
        crate::process::process(node, env);
    }

    node.discovery_running = false;
}

/// Dispatch hook for an inbound `FIND_PARENT_RESPONSE`: adopts `from` as
/// parent iff `responder_distance + 1` is strictly better than our
/// current distance. Ties are broken by *first* improving response, which
/// falls out naturally from strict `<`.
pub fn on_find_parent_response(
    node: &mut Node,
    env: &mut impl Environment,
    from: Address,
    responder_distance: u8,
) {
    if !node.capabilities.auto_find {
        return;
    }
    let candidate = responder_distance.saturating_add(1);
    if candidate < node.context.distance_to_gateway {
        let new_ctx = NodeContext {
            node_id: node.context.node_id,
            parent_id: from,
            distance_to_gateway: candidate,
        };
        node.set_context(new_ctx, env);
    }
}
