//! Cryptographic operations for gateway messages
//!
//! This module provides:
//! - secp256k1 key pair generation and hex (de)serialization
//! - ECDSA signing over the SHA-256 digest of a canonical payload
//! - Fail-closed verification against a hex-encoded public key

use crate::{
    canonical::signing_payload,
    messages::OdapMessage,
    Error, Result,
};
use k256::{
    ecdsa::{
        signature::hazmat::{PrehashSigner, PrehashVerifier},
        Signature, SigningKey, VerifyingKey,
    },
    elliptic_curve::sec1::ToEncodedPoint,
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// secp256k1 key pair identifying a gateway
#[derive(Debug, Clone)]
pub struct GatewayKeys {
    signing_key: SigningKey,
    public_key_hex: String,
}

impl GatewayKeys {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Create from a 32-byte secret scalar
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self> {
        let signing_key =
            SigningKey::from_slice(seed).map_err(|e| Error::InvalidKey(e.to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Create from a hex-encoded secret key
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| Error::InvalidKey(format!("secret key is not hex: {}", e)))?;
        let signing_key =
            SigningKey::from_slice(&bytes).map_err(|e| Error::InvalidKey(e.to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public_key_hex = encode_public_key(signing_key.verifying_key());
        Self {
            signing_key,
            public_key_hex,
        }
    }

    /// Compressed SEC1 public key, hex-encoded
    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    /// Secret key, hex-encoded (USE WITH CAUTION - should be protected)
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Sign a canonical payload
    pub fn sign(&self, payload: &str) -> Result<String> {
        sign(payload, &self.signing_key)
    }

    /// Sign a message in place over its blanked-signature form
    pub fn sign_message<M: OdapMessage>(&self, message: &mut M) -> Result<()> {
        let payload = signing_payload(message)?;
        let signature = self.sign(&payload)?;
        message.set_signature(signature);
        Ok(())
    }
}

fn encode_public_key(key: &VerifyingKey) -> String {
    hex::encode(key.to_encoded_point(true).as_bytes())
}

/// SHA-256 digest of a payload
pub fn digest(payload: &str) -> [u8; 32] {
    Sha256::digest(payload.as_bytes()).into()
}

/// Sign the SHA-256 digest of `payload`, returning the 64-byte compact
/// signature as hex
pub fn sign(payload: &str, key: &SigningKey) -> Result<String> {
    let signature: Signature = key.sign_prehash(&digest(payload))?;
    Ok(hex::encode(signature.to_bytes()))
}

/// Verify a hex signature over `payload` with a hex public key.
///
/// Any decoding or parsing failure counts as a failed verification.
pub fn verify(payload: &str, signature_hex: &str, public_key_hex: &str) -> bool {
    let Ok(key_bytes) = hex::decode(public_key_hex) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };

    verifying_key
        .verify_prehash(&digest(payload), &signature)
        .is_ok()
}

/// Verify a message's own signature against `public_key_hex`, with the
/// signature field blanked out of the pre-image
pub fn verify_message<M: OdapMessage>(message: &M, public_key_hex: &str) -> bool {
    match signing_payload(message) {
        Ok(payload) => verify(&payload, message.signature(), public_key_hex),
        Err(_) => false,
    }
}
