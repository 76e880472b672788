//! `X-Hub-Signature` verification.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

use crate::{Error, Result};

/// Header carrying the body signature on hub notifications.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

/// Digest algorithms accepted in the signature header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
}

impl SignatureAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha256 => "sha256",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// Compute the header value `<algo>=<hex>` for `body`.
pub fn sign(algorithm: SignatureAlgorithm, secret: &[u8], body: &[u8]) -> Result<String> {
    let digest = match algorithm {
        SignatureAlgorithm::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(secret).map_err(invalid_key)?;
            mac.update(body);
            mac.finalize().into_bytes().to_vec()
        }
        SignatureAlgorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(invalid_key)?;
            mac.update(body);
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(format!("{}={}", algorithm.as_str(), hex::encode(digest)))
}

/// Check `header` against the HMAC of `body` under `secret`.
///
/// Every failure (missing header, unknown algorithm, malformed hex, mismatch)
/// is an [`Error::Integrity`]. The digest comparison is constant-time.
pub fn verify(secret: &[u8], body: &[u8], header: Option<&str>) -> Result<SignatureAlgorithm> {
    let header = header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::integrity("missing signature"))?;

    let (name, digest_hex) = header
        .split_once('=')
        .ok_or_else(|| Error::integrity("malformed signature header"))?;
    let algorithm = SignatureAlgorithm::parse(name)
        .ok_or_else(|| Error::integrity(format!("unsupported signature algorithm: {name}")))?;
    let expected =
        hex::decode(digest_hex).map_err(|_| Error::integrity("signature is not valid hex"))?;

    let verified = match algorithm {
        SignatureAlgorithm::Sha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(secret).map_err(invalid_key)?;
            mac.update(body);
            mac.verify_slice(&expected).is_ok()
        }
        SignatureAlgorithm::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(invalid_key)?;
            mac.update(body);
            mac.verify_slice(&expected).is_ok()
        }
    };

    if verified {
        Ok(algorithm)
    } else {
        Err(Error::integrity("signature mismatch"))
    }
}

fn invalid_key(e: hmac::digest::InvalidLength) -> Error {
    Error::integrity(format!("invalid signing key: {e}"))
}
