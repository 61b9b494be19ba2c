//! Signer contract: an opaque nonce generator, verifier, and message
//! signer. This crate never performs the cryptography itself — see
//! `tests/common` for a reference AES-128-CMAC implementation used only
//! by integration tests.

use crate::Message;

/// A nonce exchanged during the `GET_NONCE`/`GET_NONCE_RESPONSE` handshake.
pub type Nonce = [u8; 8];

pub trait Signer {
    /// Produces a fresh nonce in response to an inbound `GET_NONCE`.
    fn generate_nonce(&mut self) -> Nonce;

    /// Signs `msg` in place using `nonce`. On success the signer is
    /// expected to set the signed flag and append a signature suffix
    /// after the existing payload (the wire-level consequence: a signed
    /// message always transmits at `MAX_MESSAGE_LENGTH`). Returns `false`
    /// on failure, surfaced to the caller as [`crate::Error::SignFailed`].
    fn sign(&mut self, nonce: &Nonce, msg: &mut Message) -> bool;

    /// Verifies an inbound signed message. Only called when the message
    /// is addressed to us, isn't an ack, and isn't a handshake-exempt
    /// subtype.
    fn verify(&mut self, msg: &Message) -> bool;
}
