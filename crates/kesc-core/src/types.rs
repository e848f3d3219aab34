use std::fmt;
use std::num::NonZeroU64;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::{EscrowError, EscrowResult};

/// Raw length of a storage id, auth token, or content hash (SHA-256 output)
pub const DIGEST_SIZE: usize = 32;

/// Hex length of a storage id or auth token on the wire
pub const DIGEST_HEX_LEN: usize = 64;

/// AEAD tag length (AES-EAX, 128-bit)
pub const TAG_SIZE: usize = 16;

/// AEAD nonce length (AES-EAX, 128-bit)
pub const NONCE_SIZE: usize = 16;

/// Minimum ciphertext length of an escrowed session key
pub const MIN_WRAPPED_KEY_SIZE: usize = 32;

fn decode_digest(hex_str: &str, what: &str) -> EscrowResult<[u8; DIGEST_SIZE]> {
    if hex_str.len() != DIGEST_HEX_LEN {
        return Err(EscrowError::Validation(format!(
            "The length of {what} is invalid."
        )));
    }
    let mut out = [0u8; DIGEST_SIZE];
    hex::decode_to_slice(hex_str, &mut out)
        .map_err(|_| EscrowError::Validation(format!("{what} is not valid hex.")))?;
    Ok(out)
}

/// Public lookup key of an escrow entry (SU).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageId([u8; DIGEST_SIZE]);

impl StorageId {
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse the 64-char hex form used in request paths.
    pub fn from_hex(s: &str) -> EscrowResult<Self> {
        decode_digest(s, "SU").map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageId({})", self.short())
    }
}

/// Per-ciphertext proof of secret possession (ST).
#[derive(Clone, Copy)]
pub struct AuthToken([u8; DIGEST_SIZE]);

impl AuthToken {
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> EscrowResult<Self> {
        decode_digest(s, "ST").map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Constant-time comparison.
    pub fn matches(&self, other: &AuthToken) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthToken").field(&"[REDACTED]").finish()
    }
}

/// One AEAD encryption result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
    pub nonce: [u8; NONCE_SIZE],
}

impl Envelope {
    /// Build an envelope from untrusted parts, validating tag and nonce sizes.
    pub fn from_parts(ciphertext: Vec<u8>, tag: &[u8], nonce: &[u8]) -> EscrowResult<Self> {
        let tag: [u8; TAG_SIZE] = tag
            .try_into()
            .map_err(|_| EscrowError::Validation("Key WS/tag is invalid!".into()))?;
        let nonce: [u8; NONCE_SIZE] = nonce
            .try_into()
            .map_err(|_| EscrowError::Validation("Key WS/nonce is invalid!".into()))?;
        Ok(Self {
            ciphertext,
            tag,
            nonce,
        })
    }

    pub fn to_wire(&self) -> WireEnvelope {
        WireEnvelope {
            ct: STANDARD.encode(&self.ciphertext),
            tag: STANDARD.encode(self.tag),
            nonce: STANDARD.encode(self.nonce),
        }
    }
}

/// Textual `{ct, tag, nonce}` form of an [`Envelope`], Base64 encoded.
///
/// This is both the artifact a user keeps after encryption and the `WS`
/// object exchanged with the keystore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub ct: String,
    pub tag: String,
    pub nonce: String,
}

impl WireEnvelope {
    pub fn decode(&self) -> EscrowResult<Envelope> {
        let field = |name: &str, value: &str| {
            STANDARD
                .decode(value)
                .map_err(|_| EscrowError::Validation(format!("Key WS/{name} is invalid!")))
        };
        let ct = field("ct", &self.ct)?;
        let tag = field("tag", &self.tag)?;
        let nonce = field("nonce", &self.nonce)?;
        Envelope::from_parts(ct, &tag, &nonce)
    }
}

/// Bookkeeping metadata of an escrow entry. Never includes key material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    pub exists: bool,
    pub fail_count: u64,
    pub remove_after: Option<NonZeroU64>,
}

impl EntryInfo {
    pub fn absent() -> Self {
        Self {
            exists: false,
            fail_count: 0,
            remove_after: None,
        }
    }
}

// ── Wire bodies ───────────────────────────────────────────────────────────────

/// `PUT /api/add/{SU}` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddBody {
    #[serde(rename = "WS")]
    pub ws: WireEnvelope,
    #[serde(rename = "ST")]
    pub st: String,
    #[serde(rename = "RA")]
    pub ra: Option<u64>,
}

/// `POST /api/get/{SU}` and `DELETE /api/rem/{SU}` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBody {
    #[serde(rename = "ST")]
    pub st: String,
}

/// Plain success body: `{"msg": "ok"}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkBody {
    pub msg: String,
}

impl OkBody {
    pub fn ok() -> Self {
        Self { msg: "ok".into() }
    }
}

/// Successful fetch: `{"msg": "ok", "WS": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchBody {
    pub msg: String,
    #[serde(rename = "WS")]
    pub ws: WireEnvelope,
}

/// Failure body: `{"error": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// `GET /api/info/{SU}` body, for both the found and not-found cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoBody {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_after: Option<Option<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<EntryInfo> for InfoBody {
    fn from(info: EntryInfo) -> Self {
        if info.exists {
            Self {
                exists: true,
                fail: Some(info.fail_count),
                remove_after: Some(info.remove_after.map(NonZeroU64::get)),
                error: None,
            }
        } else {
            Self {
                exists: false,
                fail: None,
                remove_after: None,
                error: Some(crate::error::MSG_NOT_FOUND.into()),
            }
        }
    }
}

impl From<&InfoBody> for EntryInfo {
    fn from(body: &InfoBody) -> Self {
        if !body.exists {
            return EntryInfo::absent();
        }
        EntryInfo {
            exists: true,
            fail_count: body.fail.unwrap_or(0),
            remove_after: body.remove_after.flatten().and_then(NonZeroU64::new),
        }
    }
}
