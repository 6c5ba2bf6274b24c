//! SU3 signed-update container.
//!
//! ```text
//! 0   "I2Psu3"   6   0   7   format version (0)
//! 8   sig type (u16)      10  sig length (u16)
//! 12  0   13  version length   14  0   15  signer id length
//! 16  content length (u64)
//! 24  0   25  file type   26  0   27  content type   28..40 zero
//! 40  version (NUL padded) | signer id | content | signature
//! ```
//!
//! All integers are big-endian. The signature covers every byte before it.

pub mod keys;
pub mod sign;

use std::fmt;

use crate::error::{FeedError, Result};
use self::keys::{Su3Signer, Su3VerifyingKey};

pub const MAGIC: &[u8; 6] = b"I2Psu3";
pub const FORMAT_VERSION: u8 = 0;
pub const HEADER_LEN: usize = 40;
pub const MIN_VERSION_LEN: usize = 16;

pub const FILE_TYPE_ZIP: u8 = 0;
pub const FILE_TYPE_XML: u8 = 1;
pub const FILE_TYPE_HTML: u8 = 2;
pub const FILE_TYPE_XML_GZ: u8 = 3;
pub const FILE_TYPE_TXT_GZ: u8 = 4;

pub const CONTENT_TYPE_UNKNOWN: u8 = 0;
pub const CONTENT_TYPE_ROUTER: u8 = 1;
pub const CONTENT_TYPE_PLUGIN: u8 = 2;
pub const CONTENT_TYPE_RESEED: u8 = 3;
pub const CONTENT_TYPE_NEWS: u8 = 4;
pub const CONTENT_TYPE_BLOCKLIST: u8 = 5;

/// SU3 signature algorithms this crate can produce and check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureType {
    EcdsaSha256P256,
    EcdsaSha384P384,
    EcdsaSha512P521,
    RsaSha512,
    EdDsaSha512Ed25519ph,
}

impl SignatureType {
    pub fn code(self) -> u16 {
        match self {
            Self::EcdsaSha256P256 => 1,
            Self::EcdsaSha384P384 => 2,
            Self::EcdsaSha512P521 => 3,
            Self::RsaSha512 => 6,
            Self::EdDsaSha512Ed25519ph => 8,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::EcdsaSha256P256),
            2 => Some(Self::EcdsaSha384P384),
            3 => Some(Self::EcdsaSha512P521),
            6 => Some(Self::RsaSha512),
            8 => Some(Self::EdDsaSha512Ed25519ph),
            _ => None,
        }
    }

    /// Fixed signature length, or `None` when it follows the key size (RSA).
    pub fn fixed_signature_len(self) -> Option<usize> {
        match self {
            Self::EcdsaSha256P256 => Some(64),
            Self::EcdsaSha384P384 => Some(96),
            Self::EcdsaSha512P521 => Some(132),
            Self::RsaSha512 => None,
            Self::EdDsaSha512Ed25519ph => Some(64),
        }
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EcdsaSha256P256 => "ECDSA_SHA256_P256",
            Self::EcdsaSha384P384 => "ECDSA_SHA384_P384",
            Self::EcdsaSha512P521 => "ECDSA_SHA512_P521",
            Self::RsaSha512 => "RSA_SHA512",
            Self::EdDsaSha512Ed25519ph => "EdDSA_SHA512_Ed25519ph",
        };
        f.write_str(name)
    }
}

/// An unsigned SU3 envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Su3File {
    pub file_type: u8,
    pub content_type: u8,
    pub signature_type: SignatureType,
    /// Version string; news feeds use the generation time in UNIX seconds.
    pub version: String,
    pub signer_id: String,
    pub content: Vec<u8>,
}

impl Su3File {
    /// An XML news envelope.
    pub fn news(signature_type: SignatureType, version: String, signer_id: String, content: Vec<u8>) -> Self {
        Self {
            file_type: FILE_TYPE_XML,
            content_type: CONTENT_TYPE_NEWS,
            signature_type,
            version,
            signer_id,
            content,
        }
    }

    /// Encode the envelope and append `signer`'s signature over it.
    pub fn to_bytes(&self, signer: &dyn Su3Signer) -> Result<Vec<u8>> {
        let key_type = signer.signature_type()?;
        if key_type != self.signature_type {
            return Err(FeedError::Signature(format!(
                "envelope declares {} but the key signs {}",
                self.signature_type, key_type
            )));
        }
        if self.signer_id.is_empty() {
            return Err(FeedError::Signature("signer id must not be empty".to_string()));
        }
        let signer_id_len = u8::try_from(self.signer_id.len()).map_err(|_| {
            FeedError::Signature(format!(
                "signer id is {} bytes, at most 255 allowed",
                self.signer_id.len()
            ))
        })?;
        let version_len = self.version.len().max(MIN_VERSION_LEN);
        let version_len = u8::try_from(version_len).map_err(|_| {
            FeedError::Signature(format!(
                "version is {} bytes, at most 255 allowed",
                self.version.len()
            ))
        })?;
        let signature_len = signer.signature_len();
        let signature_len_field = u16::try_from(signature_len)
            .map_err(|_| FeedError::Signature(format!("signature length {signature_len} too large")))?;

        let mut out = Vec::with_capacity(
            HEADER_LEN + usize::from(version_len) + self.signer_id.len() + self.content.len() + signature_len,
        );
        out.extend_from_slice(MAGIC);
        out.push(0);
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&self.signature_type.code().to_be_bytes());
        out.extend_from_slice(&signature_len_field.to_be_bytes());
        out.push(0);
        out.push(version_len);
        out.push(0);
        out.push(signer_id_len);
        out.extend_from_slice(&(self.content.len() as u64).to_be_bytes());
        out.push(0);
        out.push(self.file_type);
        out.push(0);
        out.push(self.content_type);
        out.resize(HEADER_LEN, 0);

        out.extend_from_slice(self.version.as_bytes());
        out.resize(HEADER_LEN + usize::from(version_len), 0);
        out.extend_from_slice(self.signer_id.as_bytes());
        out.extend_from_slice(&self.content);

        let signature = signer.sign(&out)?;
        if signature.len() != signature_len {
            return Err(FeedError::Signature(format!(
                "key produced a {}-byte signature, expected {signature_len}",
                signature.len()
            )));
        }
        out.extend_from_slice(&signature);
        Ok(out)
    }
}

/// A decoded SU3 file with its signature still attached.
#[derive(Debug, Clone)]
pub struct SignedSu3 {
    pub file: Su3File,
    signed_len: usize,
    signature: Vec<u8>,
    raw: Vec<u8>,
}

impl SignedSu3 {
    /// Decode `bytes`. Structural problems are rejected here; the signature
    /// is only checked by [`SignedSu3::verify`].
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let malformed = FeedError::Su3Format;
        if bytes.len() < HEADER_LEN {
            return Err(malformed(format!(
                "{} bytes is shorter than the {HEADER_LEN}-byte header",
                bytes.len()
            )));
        }
        if &bytes[..6] != MAGIC {
            return Err(malformed("bad magic".to_string()));
        }
        if bytes[7] != FORMAT_VERSION {
            return Err(malformed(format!("unsupported format version {}", bytes[7])));
        }
        let code = u16::from_be_bytes([bytes[8], bytes[9]]);
        let signature_type = SignatureType::from_code(code)
            .ok_or_else(|| malformed(format!("unknown signature type {code}")))?;
        let signature_len = usize::from(u16::from_be_bytes([bytes[10], bytes[11]]));
        if let Some(expected) = signature_type.fixed_signature_len() {
            if signature_len != expected {
                return Err(malformed(format!(
                    "{signature_type} signature must be {expected} bytes, header says {signature_len}"
                )));
            }
        }
        let version_len = usize::from(bytes[13]);
        if version_len < MIN_VERSION_LEN {
            return Err(malformed(format!("version length {version_len} is below {MIN_VERSION_LEN}")));
        }
        let signer_id_len = usize::from(bytes[15]);
        let mut content_len_bytes = [0u8; 8];
        content_len_bytes.copy_from_slice(&bytes[16..24]);
        let content_len = usize::try_from(u64::from_be_bytes(content_len_bytes))
            .map_err(|_| malformed("content length overflows".to_string()))?;
        let file_type = bytes[25];
        let content_type = bytes[27];

        let signed_len = HEADER_LEN
            .checked_add(version_len)
            .and_then(|n| n.checked_add(signer_id_len))
            .and_then(|n| n.checked_add(content_len))
            .ok_or_else(|| malformed("lengths overflow".to_string()))?;
        let total = signed_len
            .checked_add(signature_len)
            .ok_or_else(|| malformed("lengths overflow".to_string()))?;
        if bytes.len() != total {
            return Err(malformed(format!(
                "file is {} bytes, header describes {total}",
                bytes.len()
            )));
        }

        let version_end = HEADER_LEN + version_len;
        let signer_end = version_end + signer_id_len;
        let version_bytes = &bytes[HEADER_LEN..version_end];
        let version_trimmed = version_bytes
            .iter()
            .rposition(|b| *b != 0)
            .map_or(&version_bytes[..0], |last| &version_bytes[..=last]);
        let version = String::from_utf8(version_trimmed.to_vec())
            .map_err(|_| malformed("version is not UTF-8".to_string()))?;
        let signer_id = String::from_utf8(bytes[version_end..signer_end].to_vec())
            .map_err(|_| malformed("signer id is not UTF-8".to_string()))?;

        Ok(Self {
            file: Su3File {
                file_type,
                content_type,
                signature_type,
                version,
                signer_id,
                content: bytes[signer_end..signed_len].to_vec(),
            },
            signed_len,
            signature: bytes[signed_len..].to_vec(),
            raw: bytes.to_vec(),
        })
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Check the trailing signature under `key`.
    pub fn verify(&self, key: &Su3VerifyingKey) -> Result<()> {
        if key.signature_type() != self.file.signature_type {
            return Err(FeedError::Verification(format!(
                "file is signed with {} but the key is {}",
                self.file.signature_type,
                key.signature_type()
            )));
        }
        key.verify(&self.raw[..self.signed_len], &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::su3::keys::NewsSigningKey;

    fn ed25519() -> NewsSigningKey {
        NewsSigningKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&[1u8; 32]))
    }

    fn envelope(content: &[u8]) -> Su3File {
        Su3File::news(
            SignatureType::EdDsaSha512Ed25519ph,
            "1700000000".to_string(),
            "news@example.i2p".to_string(),
            content.to_vec(),
        )
    }

    #[test]
    fn header_layout_is_bit_exact() {
        let bytes = envelope(b"<feed/>").to_bytes(&ed25519()).unwrap();

        assert_eq!(&bytes[..6], b"I2Psu3");
        assert_eq!(bytes[6], 0);
        assert_eq!(bytes[7], 0);
        assert_eq!(&bytes[8..10], &8u16.to_be_bytes());
        assert_eq!(&bytes[10..12], &64u16.to_be_bytes());
        assert_eq!(bytes[13], 16);
        assert_eq!(bytes[15], "news@example.i2p".len() as u8);
        assert_eq!(&bytes[16..24], &7u64.to_be_bytes());
        assert_eq!(bytes[25], FILE_TYPE_XML);
        assert_eq!(bytes[27], CONTENT_TYPE_NEWS);
        assert!(bytes[28..40].iter().all(|b| *b == 0));
        assert_eq!(&bytes[40..50], b"1700000000");
        assert!(bytes[50..56].iter().all(|b| *b == 0));
        assert_eq!(&bytes[56..72], b"news@example.i2p");
        assert_eq!(&bytes[72..79], b"<feed/>");
        assert_eq!(bytes.len(), 79 + 64);
    }

    #[test]
    fn parse_then_verify() {
        let key = ed25519();
        let bytes = envelope(b"<feed/>").to_bytes(&key).unwrap();
        let parsed = SignedSu3::parse(&bytes).unwrap();

        assert_eq!(parsed.file, envelope(b"<feed/>"));
        parsed.verify(&key.verifying_key()).unwrap();
    }

    #[test]
    fn tampered_content_fails_verification() {
        let key = ed25519();
        let mut bytes = envelope(b"<feed/>").to_bytes(&key).unwrap();
        bytes[73] ^= 0x20;
        let parsed = SignedSu3::parse(&bytes).unwrap();
        assert!(matches!(
            parsed.verify(&key.verifying_key()),
            Err(FeedError::Verification(_))
        ));
    }

    #[test]
    fn structural_errors_are_rejected() {
        let bytes = envelope(b"<feed/>").to_bytes(&ed25519()).unwrap();

        assert!(SignedSu3::parse(&bytes[..20]).is_err());
        assert!(SignedSu3::parse(&bytes[..bytes.len() - 1]).is_err());

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(SignedSu3::parse(&bad_magic).is_err());

        let mut bad_type = bytes.clone();
        bad_type[9] = 99;
        assert!(SignedSu3::parse(&bad_type).is_err());

        let mut bad_len = bytes.clone();
        bad_len[11] = 65;
        assert!(SignedSu3::parse(&bad_len).is_err());

        let mut bad_version = bytes;
        bad_version[7] = 1;
        assert!(SignedSu3::parse(&bad_version).is_err());
    }

    #[test]
    fn mismatched_key_and_envelope_are_refused() {
        let mut file = envelope(b"<feed/>");
        file.signature_type = SignatureType::EcdsaSha256P256;
        assert!(matches!(
            file.to_bytes(&ed25519()),
            Err(FeedError::Signature(_))
        ));
    }

    #[test]
    fn signer_id_limits() {
        let mut file = envelope(b"x");
        file.signer_id.clear();
        assert!(file.to_bytes(&ed25519()).is_err());
        file.signer_id = "a".repeat(256);
        assert!(file.to_bytes(&ed25519()).is_err());
    }

    #[test]
    fn signature_type_codes_round_trip() {
        for code in [1u16, 2, 3, 6, 8] {
            assert_eq!(SignatureType::from_code(code).unwrap().code(), code);
        }
        assert_eq!(SignatureType::from_code(7), None);
    }
}
