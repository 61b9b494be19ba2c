//! OTA firmware download session.
//!
//! Config-compare, erase, block request/response with retry and CRC-16
//! verification. Triggered on receipt of a `FIRMWARE_CONFIG_RESPONSE`
//! whose payload differs byte-for-byte from the stored config; destroyed
//! on completion, give-up, or explicit cancel.

use crate::crc16;
use crate::flash::FirmwareConfig;
use crate::message::{Command, Message, StreamType};
use crate::node::{Environment, Node};
use crate::{Error, BLOCK_SIZE, GATEWAY, OTA_RETRY, OTA_RETRY_DELAY_MS, START_OFFSET};

/// `{ active, next_block_to_request, retries_remaining, last_request_time_ms }`.
/// Blocks are indexed from `blocks` down to 1; completion is
/// `next_block_to_request == 0`.
pub struct OtaSession {
    pub config: FirmwareConfig,
    pub next_block_to_request: u16,
    pub retries_remaining: u8,
    pub last_request_time_ms: u32,
}

/// Opens a new session if `new_config` differs from the stored one.
/// Callers must ensure no session is already active — `process.rs` only
/// calls this from the dispatch branch, which can't reenter while a
/// session is open.
pub fn start_if_changed(node: &mut Node, env: &mut impl Environment, new_config: FirmwareConfig) {
    if new_config == node.stored_firmware_config {
        return;
    }
    if !env.flash().init() {
        env.error_blink(Error::FlashInitFailed);
        return;
    }
    env.flash().erase(0, crate::FLASH_STAGING_SIZE);

    node.ota = Some(OtaSession {
        config: new_config,
        next_block_to_request: new_config.blocks,
        retries_remaining: OTA_RETRY + 1,
        last_request_time_ms: 0,
    });
}

/// Idle-branch tick: called when no inbound frame is pending. Emits a
/// `FIRMWARE_REQUEST` if the retry-delay has elapsed, counting down the
/// retry budget; aborts the session on exhaustion.
pub fn tick(node: &mut Node, env: &mut impl Environment) {
    let now = env.clock().now_ms();
    let Some(session) = node.ota.as_mut() else {
        return;
    };
    if now.saturating_sub(session.last_request_time_ms) <= OTA_RETRY_DELAY_MS {
        return;
    }
    if session.retries_remaining == 0 {
        node.ota = None;
        env.error_blink(Error::FirmwareSessionExhausted);
        return;
    }
    session.retries_remaining -= 1;
    let block_to_request = session.next_block_to_request - 1;
    session.last_request_time_ms = now;

    let mut req = Message::build(
        node.node_id(),
        GATEWAY,
        0,
        Command::Stream,
        StreamType::FirmwareRequest as u8,
        false,
    );
    req.set_int(block_to_request as i32);
    crate::sender::send_route(node, env, req);
}

/// Dispatch hook for an inbound `FIRMWARE_RESPONSE`: writes the 16-byte
/// block payload to flash, decrements `next_block_to_request`, resets the
/// retry counter. Runs the completion CRC pass once the last block lands.
pub fn on_block_response(node: &mut Node, env: &mut impl Environment, payload: &[u8]) {
    let Some(session) = node.ota.as_mut() else {
        return;
    };
    let block_index = session.next_block_to_request - 1;
    let offset = START_OFFSET + (block_index as u32) * (BLOCK_SIZE as u32);
    let n = payload.len().min(BLOCK_SIZE);
    env.flash().write(offset, &payload[..n]);

    session.next_block_to_request -= 1;
    session.retries_remaining = OTA_RETRY + 1;

    if session.next_block_to_request == 0 {
        finish(node, env);
    }
}

fn finish(node: &mut Node, env: &mut impl Environment) {
    let Some(session) = node.ota.take() else {
        return;
    };
    let total = session.config.blocks as u32 * BLOCK_SIZE as u32;

    let mut crc = crc16::INIT;
    let mut remaining = total;
    let mut offset = START_OFFSET;
    let mut buf = [0u8; BLOCK_SIZE];
    while remaining > 0 {
        let chunk = (BLOCK_SIZE as u32).min(remaining) as usize;
        env.flash().read(offset, &mut buf[..chunk]);
        for &b in &buf[..chunk] {
            crc = crc16::update(crc, b);
        }
        offset += chunk as u32;
        remaining -= chunk as u32;
    }

    if crc != session.config.crc {
        env.error_blink(Error::FirmwareChecksumFailed);
        return;
    }

    let mut header = [0u8; START_OFFSET as usize];
    header[0..7].copy_from_slice(b"FLXIMG:");
    header[7] = (total >> 8) as u8;
    header[8] = total as u8;
    header[9] = b':';
    env.flash().write(0, &header);

    node.store_firmware_config(session.config, env);
    env.flash().reboot();
}
