//! Key handling and intent-scoped signatures.
//!
//! Signatures here are deterministic Ed25519 and never draw from an RNG. The
//! gameplay randomness used when building purchases lives in
//! [`crate::transaction`] and must stay out of this module.

use crate::{
    error::{
        ClientError,
        Result,
    },
    types::{
        Address,
        TransactionDigest,
    },
};
use base64::{
    Engine,
    engine::general_purpose::STANDARD as BASE64,
};
use blake2::{
    Blake2b,
    Digest,
    digest::consts::U32,
};
use ed25519_dalek::{
    Signer as _,
    SigningKey,
    Verifier,
    VerifyingKey,
};
use std::fmt;

type Blake2b256 = Blake2b<U32>;

pub const ED25519_FLAG: u8 = 0x00;
pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const SIGNATURE_LENGTH: usize = 64;
const SERIALIZED_SIGNATURE_LENGTH: usize = 1 + SIGNATURE_LENGTH + PUBLIC_KEY_LENGTH;
const TRANSACTION_DATA_DOMAIN: &[u8] = b"TransactionData::";

/// Signing domain. The scope byte is part of the signed digest, so a
/// signature produced for one scope never verifies under another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IntentScope {
    TransactionData = 0,
    TransactionEffects = 1,
    CheckpointSummary = 2,
    PersonalMessage = 3,
}

impl IntentScope {
    fn intent_bytes(self) -> [u8; 3] {
        // [scope, version V0, app id Sui]
        [self as u8, 0, 0]
    }
}

pub fn blake2b256(chunks: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finalize().into()
}

fn uleb128(mut value: usize, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Digest actually signed for `message` under `scope`.
pub fn intent_digest(message: &[u8], scope: IntentScope) -> [u8; 32] {
    let intent = scope.intent_bytes();
    match scope {
        IntentScope::PersonalMessage => {
            let mut payload = Vec::with_capacity(message.len() + 5);
            uleb128(message.len(), &mut payload);
            payload.extend_from_slice(message);
            blake2b256(&[&intent, &payload])
        }
        _ => blake2b256(&[&intent, message]),
    }
}

/// Digest the node assigns to a transaction with these bytes.
pub fn transaction_digest(tx_bytes: &[u8]) -> TransactionDigest {
    TransactionDigest::from_bytes(blake2b256(&[TRANSACTION_DATA_DOMAIN, tx_bytes]))
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LENGTH]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    pub fn to_address(&self) -> Address {
        Address::from_bytes(blake2b256(&[&[ED25519_FLAG], &self.0]))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(0x{})", hex::encode(self.0))
    }
}

pub trait Signer: Send + Sync {
    fn public_key(&self) -> PublicKey;

    /// Plain Ed25519 over `message`, no intent prefix.
    fn sign_raw(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH];

    fn address(&self) -> Address {
        self.public_key().to_address()
    }
}

/// Ed25519 keypair held in memory only.
pub struct Ed25519Keypair {
    signing: SigningKey,
}

impl Ed25519Keypair {
    /// Accepts a bare 32-byte secret or the 33-byte `flag || secret` layout.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret = match bytes.len() {
            32 => bytes,
            33 if bytes[0] == ED25519_FLAG => &bytes[1..],
            33 => {
                return Err(ClientError::validation(format!(
                    "unsupported key scheme flag {:#04x}",
                    bytes[0]
                )));
            }
            n => {
                return Err(ClientError::validation(format!(
                    "ed25519 secret must be 32 bytes, got {n}"
                )));
            }
        };
        let mut raw = [0u8; 32];
        raw.copy_from_slice(secret);
        Ok(Self {
            signing: SigningKey::from_bytes(&raw),
        })
    }

    pub fn from_hex(secret: &str) -> Result<Self> {
        let trimmed = secret.trim();
        let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(body)
            .map_err(|e| ClientError::validation(format!("secret key is not hex: {e}")))?;
        Self::from_secret_bytes(&bytes)
    }
}

impl Signer for Ed25519Keypair {
    fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    fn sign_raw(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        self.signing.sign(message).to_bytes()
    }
}

impl fmt::Debug for Ed25519Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// `flag || signature || public key`, base64 encoded on the wire.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    signature: [u8; SIGNATURE_LENGTH],
    public_key: PublicKey,
}

impl Signature {
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn signature_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.signature
    }

    pub fn to_base64(&self) -> String {
        let mut bytes = Vec::with_capacity(SERIALIZED_SIGNATURE_LENGTH);
        bytes.push(ED25519_FLAG);
        bytes.extend_from_slice(&self.signature);
        bytes.extend_from_slice(self.public_key.as_bytes());
        BASE64.encode(bytes)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64.decode(encoded.trim()).map_err(|e| {
            ClientError::validation(format!("signature is not base64: {e}"))
        })?;
        if bytes.len() != SERIALIZED_SIGNATURE_LENGTH {
            return Err(ClientError::validation(format!(
                "serialized signature must be {SERIALIZED_SIGNATURE_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0] != ED25519_FLAG {
            return Err(ClientError::validation(format!(
                "unsupported signature scheme flag {:#04x}",
                bytes[0]
            )));
        }
        let mut signature = [0u8; SIGNATURE_LENGTH];
        signature.copy_from_slice(&bytes[1..1 + SIGNATURE_LENGTH]);
        let mut public_key = [0u8; PUBLIC_KEY_LENGTH];
        public_key.copy_from_slice(&bytes[1 + SIGNATURE_LENGTH..]);
        Ok(Self {
            signature,
            public_key: PublicKey(public_key),
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_base64())
    }
}

pub fn sign_message(signer: &impl Signer, message: &[u8], scope: IntentScope) -> Signature {
    let digest = intent_digest(message, scope);
    Signature {
        signature: signer.sign_raw(&digest),
        public_key: signer.public_key(),
    }
}

/// `Ok(false)` for a well-formed signature that does not match; `Err` only
/// when the embedded public key is not a valid curve point.
pub fn verify_signature(
    message: &[u8],
    signature: &Signature,
    scope: IntentScope,
) -> Result<bool> {
    let key = VerifyingKey::from_bytes(signature.public_key.as_bytes())
        .map_err(|e| ClientError::validation(format!("invalid public key: {e}")))?;
    let sig = ed25519_dalek::Signature::from_bytes(&signature.signature);
    let digest = intent_digest(message, scope);
    Ok(key.verify(&digest, &sig).is_ok())
}

/// Types followed by the little-endian nonce, the layout the contract checks.
pub fn zombie_types_payload(types: &[u8], nonce: u64) -> Vec<u8> {
    let mut payload = Vec::with_capacity(types.len() + 8);
    payload.extend_from_slice(types);
    payload.extend_from_slice(&nonce.to_le_bytes());
    payload
}

/// Raw Ed25519 over [`zombie_types_payload`], hex encoded.
pub fn sign_zombie_types(signer: &impl Signer, types: &[u8], nonce: u64) -> String {
    hex::encode(signer.sign_raw(&zombie_types_payload(types, nonce)))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn keypair() -> Ed25519Keypair {
        Ed25519Keypair::from_secret_bytes(&[7u8; 32]).unwrap()
    }

    #[test]
    fn sign_message__verifies_under_same_scope() {
        let kp = keypair();
        let message = b"Sign ME! 3234234";

        let signature = sign_message(&kp, message, IntentScope::PersonalMessage);

        assert!(verify_signature(message, &signature, IntentScope::PersonalMessage).unwrap());
    }

    #[test]
    fn sign_message__fails_across_scopes() {
        let kp = keypair();
        let message = b"transfer everything";

        let signature = sign_message(&kp, message, IntentScope::PersonalMessage);

        assert!(!verify_signature(message, &signature, IntentScope::TransactionData).unwrap());
    }

    #[test]
    fn verify_signature__rejects_tampered_message() {
        let kp = keypair();
        let signature = sign_message(&kp, b"abc", IntentScope::PersonalMessage);

        assert!(!verify_signature(b"abd", &signature, IntentScope::PersonalMessage).unwrap());
    }

    #[test]
    fn signature__base64_round_trip() {
        let kp = keypair();
        let signature = sign_message(&kp, b"abc", IntentScope::TransactionData);

        let decoded = Signature::from_base64(&signature.to_base64()).unwrap();

        assert_eq!(signature, decoded);
        assert_eq!(kp.public_key(), *decoded.public_key());
    }

    #[test]
    fn signature__rejects_wrong_flag() {
        let mut bytes = vec![0x01];
        bytes.extend_from_slice(&[0u8; 96]);

        let err = Signature::from_base64(&BASE64.encode(bytes)).unwrap_err();

        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn from_hex__accepts_prefixed_and_flagged_keys() {
        let plain = Ed25519Keypair::from_hex(&format!("0x{}", hex::encode([7u8; 32]))).unwrap();
        let mut flagged = vec![ED25519_FLAG];
        flagged.extend_from_slice(&[7u8; 32]);
        let flagged = Ed25519Keypair::from_secret_bytes(&flagged).unwrap();

        assert_eq!(plain.address(), flagged.address());
        assert!(Ed25519Keypair::from_secret_bytes(&[1u8; 31]).is_err());
    }

    #[test]
    fn address__is_hash_of_flag_and_key() {
        let kp = keypair();
        let expected = Address::from_bytes(blake2b256(&[
            &[ED25519_FLAG],
            kp.public_key().as_bytes(),
        ]));

        assert_eq!(expected, kp.address());
        assert_eq!(66, kp.address().as_str().len());
    }

    #[test]
    fn debug__does_not_leak_secret() {
        let rendered = format!("{:?}", keypair());
        assert!(!rendered.contains(&hex::encode([7u8; 32])));
    }

    #[test]
    fn intent_digest__personal_message_is_length_prefixed() {
        let message = vec![1u8; 200];
        let mut payload = vec![0xc8, 0x01];
        payload.extend_from_slice(&message);

        let expected = blake2b256(&[&[3, 0, 0], &payload]);

        assert_eq!(expected, intent_digest(&message, IntentScope::PersonalMessage));
    }

    #[test]
    fn transaction_digest__is_deterministic() {
        let a = transaction_digest(b"bytes");
        let b = transaction_digest(b"bytes");
        let c = transaction_digest(b"other");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn zombie_types_payload__appends_le_nonce() {
        let types = [2, 0, 3, 4, 3, 4, 2, 2, 1, 2];

        let payload = zombie_types_payload(&types, 101);

        assert_eq!(&types[..], &payload[..10]);
        assert_eq!(&[101, 0, 0, 0, 0, 0, 0, 0], &payload[10..]);
    }

    #[test]
    fn sign_zombie_types__verifies_as_raw_ed25519() {
        let kp = keypair();
        let types = [1, 2, 3];

        let sig_hex = sign_zombie_types(&kp, &types, 9);

        let bytes: [u8; 64] = hex::decode(sig_hex).unwrap().try_into().unwrap();
        let key = VerifyingKey::from_bytes(kp.public_key().as_bytes()).unwrap();
        let sig = ed25519_dalek::Signature::from_bytes(&bytes);
        assert!(key.verify(&zombie_types_payload(&types, 9), &sig).is_ok());
    }
}
