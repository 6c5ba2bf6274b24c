//! Signing keys and the key-kind → SU3 signature-type mapping.
//!
//! Private keys load from PEM (PKCS#8 for every kind, PKCS#1 for RSA, SEC1
//! for ECDSA) or, for Ed25519, from a hex-encoded 32-byte seed. Public keys
//! load from SPKI PEM.

use std::fmt;
use std::fs;
use std::path::Path;

use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey};
use ed25519_dalek::{Signer, Verifier};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15;
use rsa::signature::SignatureEncoding;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha512};

use crate::error::{FeedError, Result};
use crate::su3::SignatureType;

/// The concrete kind of a signing key, as far as SU3 cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind {
    /// RSA with the given modulus size in bits.
    Rsa(usize),
    EcdsaP256,
    EcdsaP384,
    EcdsaP521,
    Ed25519,
    Other(String),
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa(bits) => write!(f, "RSA-{bits}"),
            Self::EcdsaP256 => f.write_str("ECDSA P-256"),
            Self::EcdsaP384 => f.write_str("ECDSA P-384"),
            Self::EcdsaP521 => f.write_str("ECDSA P-521"),
            Self::Ed25519 => f.write_str("Ed25519"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Map a key kind to the SU3 signature algorithm it signs with.
pub fn signature_type_for(kind: &KeyKind) -> Result<SignatureType> {
    match kind {
        KeyKind::Rsa(2048 | 3072 | 4096) => Ok(SignatureType::RsaSha512),
        KeyKind::EcdsaP256 => Ok(SignatureType::EcdsaSha256P256),
        KeyKind::EcdsaP384 => Ok(SignatureType::EcdsaSha384P384),
        KeyKind::EcdsaP521 => Ok(SignatureType::EcdsaSha512P521),
        KeyKind::Ed25519 => Ok(SignatureType::EdDsaSha512Ed25519ph),
        other => Err(FeedError::UnsupportedKey(format!(
            "{other} has no SU3 signature type"
        ))),
    }
}

/// A signing primitive the SU3 packager can use.
///
/// Implementations must not mutate themselves while signing.
pub trait Su3Signer {
    fn key_kind(&self) -> KeyKind;

    /// Length in bytes of every signature this key produces.
    fn signature_len(&self) -> usize;

    /// Sign `data` with the algorithm [`signature_type_for`] selects for
    /// this key, returning the raw SU3 signature bytes.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn verifying_key(&self) -> Su3VerifyingKey;

    fn signature_type(&self) -> Result<SignatureType> {
        signature_type_for(&self.key_kind())
    }
}

/// A private key loaded from disk.
pub enum NewsSigningKey {
    Rsa(RsaPrivateKey),
    P256 {
        signing: p256::ecdsa::SigningKey,
        verifying: p256::ecdsa::VerifyingKey,
    },
    P384 {
        signing: p384::ecdsa::SigningKey,
        verifying: p384::ecdsa::VerifyingKey,
    },
    P521 {
        signing: p521::ecdsa::SigningKey,
        verifying: p521::ecdsa::VerifyingKey,
    },
    Ed25519(ed25519_dalek::SigningKey),
}

impl fmt::Debug for NewsSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NewsSigningKey").field(&self.key_kind()).finish()
    }
}

impl NewsSigningKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| FeedError::read("reading signing key", path, e))?;
        Self::from_pem(&text).map_err(|err| match err {
            FeedError::UnsupportedKey(detail) => {
                FeedError::UnsupportedKey(format!("'{}': {detail}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_pem(text: &str) -> Result<Self> {
        let text = text.trim();
        if !text.starts_with("-----BEGIN") {
            return Self::from_ed25519_hex(text);
        }

        if let Ok(key) = ed25519_dalek::SigningKey::from_pkcs8_pem(text) {
            return Ok(Self::Ed25519(key));
        }
        if let Some(secret) = p256::SecretKey::from_pkcs8_pem(text)
            .ok()
            .or_else(|| p256::SecretKey::from_sec1_pem(text).ok())
        {
            let signing = p256::ecdsa::SigningKey::from(secret);
            let verifying = p256::ecdsa::VerifyingKey::from(&signing);
            return Ok(Self::P256 { signing, verifying });
        }
        if let Some(secret) = p384::SecretKey::from_pkcs8_pem(text)
            .ok()
            .or_else(|| p384::SecretKey::from_sec1_pem(text).ok())
        {
            let signing = p384::ecdsa::SigningKey::from(secret);
            let verifying = p384::ecdsa::VerifyingKey::from(&signing);
            return Ok(Self::P384 { signing, verifying });
        }
        if let Some(secret) = p521::SecretKey::from_pkcs8_pem(text)
            .ok()
            .or_else(|| p521::SecretKey::from_sec1_pem(text).ok())
        {
            return Self::p521_from_secret(&secret);
        }
        if let Some(key) = RsaPrivateKey::from_pkcs8_pem(text)
            .ok()
            .or_else(|| RsaPrivateKey::from_pkcs1_pem(text).ok())
        {
            return Ok(Self::Rsa(key));
        }

        Err(FeedError::UnsupportedKey(
            "expected a PEM RSA, ECDSA (P-256/P-384/P-521) or Ed25519 private key".to_string(),
        ))
    }

    fn from_ed25519_hex(text: &str) -> Result<Self> {
        let bytes = hex::decode(text)
            .map_err(|e| FeedError::UnsupportedKey(format!("key is neither PEM nor hex: {e}")))?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            FeedError::UnsupportedKey(format!(
                "ed25519 seed must be 32 bytes (hex), got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed)))
    }

    pub(crate) fn p521_from_secret(secret: &p521::SecretKey) -> Result<Self> {
        let signing = p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes())
            .map_err(|e| FeedError::UnsupportedKey(format!("P-521 key: {e}")))?;
        let verifying = p521::ecdsa::VerifyingKey::from_sec1_bytes(&secret.public_key().to_sec1_bytes())
            .map_err(|e| FeedError::UnsupportedKey(format!("P-521 key: {e}")))?;
        Ok(Self::P521 { signing, verifying })
    }
}

impl Su3Signer for NewsSigningKey {
    fn key_kind(&self) -> KeyKind {
        match self {
            Self::Rsa(key) => KeyKind::Rsa(key.size() * 8),
            Self::P256 { .. } => KeyKind::EcdsaP256,
            Self::P384 { .. } => KeyKind::EcdsaP384,
            Self::P521 { .. } => KeyKind::EcdsaP521,
            Self::Ed25519(_) => KeyKind::Ed25519,
        }
    }

    fn signature_len(&self) -> usize {
        match self {
            Self::Rsa(key) => key.size(),
            Self::P256 { .. } => 64,
            Self::P384 { .. } => 96,
            Self::P521 { .. } => 132,
            Self::Ed25519(_) => 64,
        }
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let failed = |e: ed25519_dalek::SignatureError| FeedError::Signature(format!("{}: {e}", self.key_kind()));
        match self {
            Self::Rsa(key) => {
                signature_type_for(&self.key_kind())?;
                let signer = pkcs1v15::SigningKey::<Sha512>::new(key.clone());
                let signature: pkcs1v15::Signature = signer.try_sign(data).map_err(failed)?;
                Ok(signature.to_vec())
            }
            Self::P256 { signing, .. } => {
                let signature: p256::ecdsa::Signature = signing.try_sign(data).map_err(failed)?;
                Ok(signature.to_bytes().to_vec())
            }
            Self::P384 { signing, .. } => {
                let signature: p384::ecdsa::Signature = signing.try_sign(data).map_err(failed)?;
                Ok(signature.to_bytes().to_vec())
            }
            Self::P521 { signing, .. } => {
                let signature: p521::ecdsa::Signature = signing.try_sign(data).map_err(failed)?;
                Ok(signature.to_bytes().to_vec())
            }
            Self::Ed25519(signing) => {
                let digest = Sha512::digest(data);
                let signature = signing.try_sign(digest.as_slice()).map_err(failed)?;
                Ok(signature.to_bytes().to_vec())
            }
        }
    }

    fn verifying_key(&self) -> Su3VerifyingKey {
        match self {
            Self::Rsa(key) => Su3VerifyingKey::Rsa(key.to_public_key()),
            Self::P256 { verifying, .. } => Su3VerifyingKey::P256(verifying.clone()),
            Self::P384 { verifying, .. } => Su3VerifyingKey::P384(verifying.clone()),
            Self::P521 { verifying, .. } => Su3VerifyingKey::P521(verifying.clone()),
            Self::Ed25519(signing) => Su3VerifyingKey::Ed25519(signing.verifying_key()),
        }
    }
}

/// Public half of a signing key, used to check SU3 signatures.
#[derive(Clone)]
pub enum Su3VerifyingKey {
    Rsa(RsaPublicKey),
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
    P521(p521::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl fmt::Debug for Su3VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Su3VerifyingKey")
            .field(&self.signature_type())
            .finish()
    }
}

impl Su3VerifyingKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| FeedError::read("reading public key", path, e))?;
        Self::from_public_key_pem(&text)
    }

    /// Load an SPKI (`PUBLIC KEY`) PEM document.
    pub fn from_public_key_pem(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Ok(key) = ed25519_dalek::VerifyingKey::from_public_key_pem(text) {
            return Ok(Self::Ed25519(key));
        }
        if let Ok(key) = p256::PublicKey::from_public_key_pem(text) {
            return Ok(Self::P256(p256::ecdsa::VerifyingKey::from(&key)));
        }
        if let Ok(key) = p384::PublicKey::from_public_key_pem(text) {
            return Ok(Self::P384(p384::ecdsa::VerifyingKey::from(&key)));
        }
        if let Ok(key) = p521::PublicKey::from_public_key_pem(text) {
            let key = p521::ecdsa::VerifyingKey::from_sec1_bytes(&key.to_sec1_bytes())
                .map_err(|e| FeedError::UnsupportedKey(format!("P-521 public key: {e}")))?;
            return Ok(Self::P521(key));
        }
        if let Ok(key) = RsaPublicKey::from_public_key_pem(text) {
            return Ok(Self::Rsa(key));
        }
        Err(FeedError::UnsupportedKey(
            "expected a PEM (SPKI) RSA, ECDSA or Ed25519 public key".to_string(),
        ))
    }

    pub fn signature_type(&self) -> SignatureType {
        match self {
            Self::Rsa(_) => SignatureType::RsaSha512,
            Self::P256(_) => SignatureType::EcdsaSha256P256,
            Self::P384(_) => SignatureType::EcdsaSha384P384,
            Self::P521(_) => SignatureType::EcdsaSha512P521,
            Self::Ed25519(_) => SignatureType::EdDsaSha512Ed25519ph,
        }
    }

    /// Check `signature` over `data`.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let rejected = |e: ed25519_dalek::SignatureError| FeedError::Verification(e.to_string());
        match self {
            Self::Rsa(key) => {
                let verifier = pkcs1v15::VerifyingKey::<Sha512>::new(key.clone());
                let signature = pkcs1v15::Signature::try_from(signature).map_err(rejected)?;
                verifier.verify(data, &signature).map_err(rejected)
            }
            Self::P256(key) => {
                let signature = p256::ecdsa::Signature::from_slice(signature).map_err(rejected)?;
                key.verify(data, &signature).map_err(rejected)
            }
            Self::P384(key) => {
                let signature = p384::ecdsa::Signature::from_slice(signature).map_err(rejected)?;
                key.verify(data, &signature).map_err(rejected)
            }
            Self::P521(key) => {
                let signature = p521::ecdsa::Signature::from_slice(signature).map_err(rejected)?;
                key.verify(data, &signature).map_err(rejected)
            }
            Self::Ed25519(key) => {
                let signature = ed25519_dalek::Signature::from_slice(signature).map_err(rejected)?;
                key.verify(Sha512::digest(data).as_slice(), &signature)
                    .map_err(rejected)
            }
        }
    }
}
