//! Fixed-layout message codec for the mesh transport header.
//!
//! A [`Message`] owns its own `MAX_MESSAGE_LENGTH`-byte wire buffer. The
//! packed flags region (`command`/`ack_requested`/`ack`/`signed`/`version`/
//! `payload_type`/`length`) is a single [`modular_bitfield`] struct, packed
//! bit-for-bit the same way a MAC header or a MAC-command bitfield is.
//!
//! The codec itself is pure: `build`/`set_*` never touch I/O.

use modular_bitfield::prelude::*;

use crate::{Address, HEADER_SIZE, MAX_MESSAGE_LENGTH, MAX_PAYLOAD, PROTOCOL_VERSION};

const OFF_LAST: usize = 0;
const OFF_SENDER: usize = 1;
const OFF_DESTINATION: usize = 2;
const OFF_SENSOR: usize = 3;
const OFF_FLAGS: usize = 4;
const FLAGS_LEN: usize = 3;
const OFF_TYPE: usize = 7;
const OFF_PAYLOAD: usize = HEADER_SIZE;

/// The packed flags region: `command`(3) `ack_requested`(1) `ack`(1)
/// `signed`(1) `version`(3) `payload_type`(4) `length`(5) `rfu`(6) = 24
/// bits. `rfu` is the reserved tail `build` zeroes.
#[bitfield]
#[cfg_attr(feature = "defmt", derive(defmt::Debug))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MessageFlags {
    command: B3,
    ack_requested: bool,
    ack: bool,
    signed: bool,
    version: B3,
    payload_type: B4,
    length: B5,
    rfu: B6,
}

/// `command`, 3-bit field. Only 5 of 8 possible values are in use.
#[cfg_attr(feature = "defmt", derive(defmt::Debug))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Presentation = 0,
    Set = 1,
    Req = 2,
    Internal = 3,
    Stream = 4,
}

impl Command {
    fn from_u8(v: u8) -> Option<Command> {
        Some(match v {
            0 => Command::Presentation,
            1 => Command::Set,
            2 => Command::Req,
            3 => Command::Internal,
            4 => Command::Stream,
            _ => return None,
        })
    }
}

/// `payload_type`, 4-bit field.
#[cfg_attr(feature = "defmt", derive(defmt::Debug))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PayloadType {
    Str = 0,
    Byte = 1,
    Int = 2,
    Float = 3,
    Custom = 4,
}

impl PayloadType {
    fn from_u8(v: u8) -> Option<PayloadType> {
        Some(match v {
            0 => PayloadType::Str,
            1 => PayloadType::Byte,
            2 => PayloadType::Int,
            3 => PayloadType::Float,
            4 => PayloadType::Custom,
            _ => return None,
        })
    }
}

/// Subtype byte under `Command::Internal`. Includes the handshake-exempt
/// set consumed by the signing coordinator plus `Discover`/`DiscoverResponse`
/// used by the broadcast-discover flow.
#[cfg_attr(feature = "defmt", derive(defmt::Debug))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InternalType {
    FindParent = 0,
    FindParentResponse = 1,
    IdRequest = 2,
    IdResponse = 3,
    Heartbeat = 4,
    HeartbeatResponse = 5,
    GetNonce = 6,
    GetNonceResponse = 7,
    RequestSigning = 8,
    Discover = 9,
    DiscoverResponse = 10,
}

impl InternalType {
    pub fn from_u8(v: u8) -> Option<InternalType> {
        Some(match v {
            0 => InternalType::FindParent,
            1 => InternalType::FindParentResponse,
            2 => InternalType::IdRequest,
            3 => InternalType::IdResponse,
            4 => InternalType::Heartbeat,
            5 => InternalType::HeartbeatResponse,
            6 => InternalType::GetNonce,
            7 => InternalType::GetNonceResponse,
            8 => InternalType::RequestSigning,
            9 => InternalType::Discover,
            10 => InternalType::DiscoverResponse,
            _ => return None,
        })
    }

    /// Handshake-exempt subtypes: never signed, never nonce-checked.
    pub fn is_handshake_exempt(self) -> bool {
        matches!(
            self,
            InternalType::GetNonce
                | InternalType::GetNonceResponse
                | InternalType::RequestSigning
                | InternalType::IdRequest
                | InternalType::IdResponse
                | InternalType::FindParent
                | InternalType::FindParentResponse
                | InternalType::Heartbeat
                | InternalType::HeartbeatResponse
        )
    }
}

/// Subtype byte under `Command::Stream`.
#[cfg_attr(feature = "defmt", derive(defmt::Debug))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamType {
    FirmwareConfigRequest = 0,
    FirmwareConfigResponse = 1,
    FirmwareRequest = 2,
    FirmwareResponse = 3,
}

impl StreamType {
    pub fn from_u8(v: u8) -> Option<StreamType> {
        Some(match v {
            0 => StreamType::FirmwareConfigRequest,
            1 => StreamType::FirmwareConfigResponse,
            2 => StreamType::FirmwareRequest,
            3 => StreamType::FirmwareResponse,
            _ => return None,
        })
    }
}

/// A fixed-layout message: `HEADER_SIZE` bytes of header plus up to
/// `MAX_PAYLOAD` bytes of payload, all in one owned `MAX_MESSAGE_LENGTH`
/// buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Message {
    buf: [u8; MAX_MESSAGE_LENGTH],
}

impl core::fmt::Debug for Message {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Message")
            .field("last", &self.last())
            .field("sender", &self.sender())
            .field("destination", &self.destination())
            .field("sensor", &self.sensor())
            .field("command", &self.command())
            .field("ack_requested", &self.ack_requested())
            .field("ack", &self.ack())
            .field("signed", &self.signed())
            .field("version", &self.version())
            .field("payload_type", &self.payload_type())
            .field("type", &self.msg_type())
            .field("payload", &self.payload())
            .finish()
    }
}

impl Message {
    fn flags(&self) -> MessageFlags {
        let mut raw = [0u8; FLAGS_LEN];
        raw.copy_from_slice(&self.buf[OFF_FLAGS..OFF_FLAGS + FLAGS_LEN]);
        MessageFlags::from_bytes(raw)
    }

    fn set_flags(&mut self, flags: MessageFlags) {
        self.buf[OFF_FLAGS..OFF_FLAGS + FLAGS_LEN].copy_from_slice(&flags.into_bytes());
    }

    /// Assemble a fresh outbound message. Zeroes every reserved bit and
    /// stamps [`PROTOCOL_VERSION`].
    pub fn build(
        sender: Address,
        destination: Address,
        sensor: Address,
        command: Command,
        msg_type: u8,
        ack_requested: bool,
    ) -> Self {
        let mut msg = Message {
            buf: [0u8; MAX_MESSAGE_LENGTH],
        };
        msg.set_sender(sender);
        msg.set_destination(destination);
        msg.set_sensor(sensor);
        msg.set_type(msg_type);
        let mut flags = MessageFlags::new();
        flags.set_command(command as u8);
        flags.set_ack_requested(ack_requested);
        flags.set_version(PROTOCOL_VERSION);
        msg.set_flags(flags);
        msg
    }

    /// Decode a frame read off the radio. Shorter inputs are zero-padded,
    /// longer ones truncated — the radio driver hands us whatever it read
    /// into a `MAX_MESSAGE_LENGTH` buffer, so this never fails.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = [0u8; MAX_MESSAGE_LENGTH];
        let n = bytes.len().min(MAX_MESSAGE_LENGTH);
        buf[..n].copy_from_slice(&bytes[..n]);
        Message { buf }
    }

    pub fn as_bytes(&self) -> &[u8; MAX_MESSAGE_LENGTH] {
        &self.buf
    }

    /// On-wire length: `MAX_MESSAGE_LENGTH` if signed, else
    /// `HEADER_SIZE + length`. `length` is a raw 5-bit field that can hold
    /// values up to 31 even though `MAX_PAYLOAD` is smaller — clamp the
    /// same way `payload()` does, so a frame with a corrupted or
    /// out-of-range length subtype (radio noise, a malformed peer) never
    /// produces a slice length past the end of the fixed wire buffer.
    pub fn wire_len(&self) -> usize {
        if self.signed() {
            MAX_MESSAGE_LENGTH
        } else {
            HEADER_SIZE + (self.length() as usize).min(MAX_PAYLOAD)
        }
    }

    pub fn last(&self) -> Address {
        self.buf[OFF_LAST]
    }

    pub fn set_last(&mut self, v: Address) {
        self.buf[OFF_LAST] = v;
    }

    pub fn sender(&self) -> Address {
        self.buf[OFF_SENDER]
    }

    pub fn set_sender(&mut self, v: Address) {
        self.buf[OFF_SENDER] = v;
    }

    pub fn destination(&self) -> Address {
        self.buf[OFF_DESTINATION]
    }

    pub fn set_destination(&mut self, v: Address) {
        self.buf[OFF_DESTINATION] = v;
    }

    pub fn sensor(&self) -> Address {
        self.buf[OFF_SENSOR]
    }

    pub fn set_sensor(&mut self, v: Address) {
        self.buf[OFF_SENSOR] = v;
    }

    pub fn command(&self) -> Option<Command> {
        Command::from_u8(self.flags().command())
    }

    pub fn set_command(&mut self, command: Command) {
        let mut f = self.flags();
        f.set_command(command as u8);
        self.set_flags(f);
    }

    pub fn ack_requested(&self) -> bool {
        self.flags().ack_requested()
    }

    pub fn set_ack_requested(&mut self, v: bool) {
        let mut f = self.flags();
        f.set_ack_requested(v);
        self.set_flags(f);
    }

    pub fn ack(&self) -> bool {
        self.flags().ack()
    }

    pub fn set_ack(&mut self, v: bool) {
        let mut f = self.flags();
        f.set_ack(v);
        self.set_flags(f);
    }

    pub fn signed(&self) -> bool {
        self.flags().signed()
    }

    pub fn set_signed(&mut self, v: bool) {
        let mut f = self.flags();
        f.set_signed(v);
        self.set_flags(f);
    }

    pub fn version(&self) -> u8 {
        self.flags().version()
    }

    pub fn set_version(&mut self, v: u8) {
        let mut f = self.flags();
        f.set_version(v & 0x7);
        self.set_flags(f);
    }

    pub fn payload_type(&self) -> Option<PayloadType> {
        PayloadType::from_u8(self.flags().payload_type())
    }

    pub fn length(&self) -> u8 {
        self.flags().length()
    }

    pub fn msg_type(&self) -> u8 {
        self.buf[OFF_TYPE]
    }

    pub fn set_type(&mut self, v: u8) {
        self.buf[OFF_TYPE] = v;
    }

    pub fn internal_type(&self) -> Option<InternalType> {
        InternalType::from_u8(self.msg_type())
    }

    pub fn stream_type(&self) -> Option<StreamType> {
        StreamType::from_u8(self.msg_type())
    }

    pub fn payload(&self) -> &[u8] {
        let len = (self.length() as usize).min(MAX_PAYLOAD);
        &self.buf[OFF_PAYLOAD..OFF_PAYLOAD + len]
    }

    fn set_payload_and_type(&mut self, payload_type: PayloadType, bytes: &[u8]) {
        let len = bytes.len().min(MAX_PAYLOAD);
        self.buf[OFF_PAYLOAD..OFF_PAYLOAD + len].copy_from_slice(&bytes[..len]);
        let mut f = self.flags();
        f.set_payload_type(payload_type as u8);
        f.set_length(len as u8);
        self.set_flags(f);
    }

    /// Sets the payload to `s` and the payload type to `Str`, updating
    /// `length` in the same step so a reader never observes a payload type
    /// and a length that don't agree.
    pub fn set_str(&mut self, s: &str) {
        self.set_payload_and_type(PayloadType::Str, s.as_bytes());
    }

    pub fn set_byte(&mut self, b: u8) {
        self.set_payload_and_type(PayloadType::Byte, &[b]);
    }

    pub fn set_int(&mut self, v: i32) {
        self.set_payload_and_type(PayloadType::Int, &v.to_le_bytes());
    }

    pub fn set_float(&mut self, v: f32) {
        self.set_payload_and_type(PayloadType::Float, &v.to_le_bytes());
    }

    pub fn set_custom(&mut self, bytes: &[u8]) {
        self.set_payload_and_type(PayloadType::Custom, bytes);
    }

    pub fn get_str(&self) -> Option<&str> {
        core::str::from_utf8(self.payload()).ok()
    }

    pub fn get_byte(&self) -> Option<u8> {
        self.payload().first().copied()
    }

    pub fn get_int(&self) -> Option<i32> {
        let p = self.payload();
        (p.len() >= 4).then(|| i32::from_le_bytes(p[0..4].try_into().unwrap()))
    }

    pub fn get_float(&self) -> Option<f32> {
        let p = self.payload();
        (p.len() >= 4).then(|| f32::from_le_bytes(p[0..4].try_into().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_zeroes_reserved_and_stamps_version() {
        let msg = Message::build(10, 20, 0, Command::Set, 5, false);
        assert_eq!(msg.version(), PROTOCOL_VERSION);
        assert_eq!(msg.sender(), 10);
        assert_eq!(msg.destination(), 20);
        assert_eq!(msg.msg_type(), 5);
        assert!(!msg.signed());
        assert!(!msg.ack());
        assert_eq!(msg.length(), 0);
    }

    #[test]
    fn round_trip_preserves_every_header_field() {
        let mut msg = Message::build(1, 2, 3, Command::Internal, 7, true);
        msg.set_last(9);
        msg.set_ack(true);
        msg.set_signed(true);
        msg.set_str("hi");

        let decoded = Message::from_bytes(msg.as_bytes());
        assert_eq!(decoded.last(), 9);
        assert_eq!(decoded.sender(), 1);
        assert_eq!(decoded.destination(), 2);
        assert_eq!(decoded.sensor(), 3);
        assert_eq!(decoded.command(), Some(Command::Internal));
        assert!(decoded.ack_requested());
        assert!(decoded.ack());
        assert!(decoded.signed());
        assert_eq!(decoded.version(), PROTOCOL_VERSION);
        assert_eq!(decoded.payload_type(), Some(PayloadType::Str));
        assert_eq!(decoded.msg_type(), 7);
        assert_eq!(decoded.get_str(), Some("hi"));
    }

    #[test]
    fn set_updates_length_and_payload_type_together() {
        let mut msg = Message::build(1, 2, 0, Command::Set, 0, false);
        msg.set_int(-5);
        assert_eq!(msg.payload_type(), Some(PayloadType::Int));
        assert_eq!(msg.length(), 4);
        assert_eq!(msg.get_int(), Some(-5));
    }

    #[test]
    fn signed_frames_transmit_max_length_unsigned_exact() {
        let mut msg = Message::build(1, 2, 0, Command::Set, 0, false);
        msg.set_byte(42);
        assert_eq!(msg.wire_len(), HEADER_SIZE + 1);
        msg.set_signed(true);
        assert_eq!(msg.wire_len(), MAX_MESSAGE_LENGTH);
    }

    #[test]
    fn internal_type_round_trips_handshake_exempt_set() {
        assert!(InternalType::GetNonce.is_handshake_exempt());
        assert!(InternalType::FindParentResponse.is_handshake_exempt());
        assert!(!InternalType::Discover.is_handshake_exempt());
    }

    /// Hex-encoded wire capture round trip, the kind of fixture a logic
    /// analyzer or packet sniffer dump would be checked in as.
    #[test]
    fn hex_fixture_round_trips() {
        let mut msg = Message::build(1, 2, 3, Command::Req, 9, false);
        msg.set_int(-100);
        let fixture = hex::encode(msg.as_bytes());

        let bytes = hex::decode(&fixture).unwrap();
        let decoded = Message::from_bytes(&bytes);
        assert_eq!(decoded.sender(), 1);
        assert_eq!(decoded.destination(), 2);
        assert_eq!(decoded.command(), Some(Command::Req));
        assert_eq!(decoded.get_int(), Some(-100));
    }

    #[test]
    fn wire_len_clamps_an_out_of_range_length_subfield() {
        // A corrupted or malformed inbound frame can carry any 5-bit value
        // (0..31) in the length subfield even though MAX_PAYLOAD is 24;
        // wire_len must never hand back something past the wire buffer.
        let mut msg = Message::build(1, 2, 0, Command::Set, 0, false);
        let mut flags = msg.flags();
        flags.set_length(31);
        msg.set_flags(flags);
        assert_eq!(msg.wire_len(), HEADER_SIZE + MAX_PAYLOAD);
        assert!(msg.wire_len() <= MAX_MESSAGE_LENGTH);
    }
}
