//! `X-Hub-Signature` computation and validation.
//!
//! A hub that was given a `hub.secret` signs every delivery with
//! `X-Hub-Signature: <algorithm>=<hex HMAC(secret, body)>`.

use std::{fmt, str::FromStr};

use hmac::{digest::KeyInit, Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature";

/// Hash functions a hub may sign deliveries with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// HMAC-SHA1
    Sha1,
    /// HMAC-SHA256
    Sha256,
    /// HMAC-SHA384 (the truncated SHA-512 variant)
    Sha384,
    /// HMAC-SHA512
    Sha512,
}

/// The algorithm name in a signature header is not supported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported signature algorithm: {0:?}")]
pub struct UnknownAlgorithm(pub String);

impl SignatureAlgorithm {
    /// Name used in the signature header.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha256 => "sha256",
            SignatureAlgorithm::Sha384 => "sha384",
            SignatureAlgorithm::Sha512 => "sha512",
        }
    }

    /// Compute `HMAC(secret, body)`.
    pub fn digest(&self, secret: &[u8], body: &[u8]) -> Vec<u8> {
        match self {
            SignatureAlgorithm::Sha1 => digest_with::<Hmac<Sha1>>(secret, body),
            SignatureAlgorithm::Sha256 => digest_with::<Hmac<Sha256>>(secret, body),
            SignatureAlgorithm::Sha384 => digest_with::<Hmac<Sha384>>(secret, body),
            SignatureAlgorithm::Sha512 => digest_with::<Hmac<Sha512>>(secret, body),
        }
    }

    /// Check `expected` against `HMAC(secret, body)` in constant time.
    pub fn verify(&self, secret: &[u8], body: &[u8], expected: &[u8]) -> bool {
        match self {
            SignatureAlgorithm::Sha1 => verify_with::<Hmac<Sha1>>(secret, body, expected),
            SignatureAlgorithm::Sha256 => verify_with::<Hmac<Sha256>>(secret, body, expected),
            SignatureAlgorithm::Sha384 => verify_with::<Hmac<Sha384>>(secret, body, expected),
            SignatureAlgorithm::Sha512 => verify_with::<Hmac<Sha512>>(secret, body, expected),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha1" => Ok(SignatureAlgorithm::Sha1),
            "sha256" => Ok(SignatureAlgorithm::Sha256),
            "sha384" => Ok(SignatureAlgorithm::Sha384),
            "sha512" => Ok(SignatureAlgorithm::Sha512),
            other => Err(UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Produce an `X-Hub-Signature` header value for `body`.
pub fn sign(algorithm: SignatureAlgorithm, secret: &str, body: &[u8]) -> String {
    format!(
        "{algorithm}={}",
        hex::encode(algorithm.digest(secret.as_bytes(), body))
    )
}

/// Validate an `X-Hub-Signature` header value against `body` and `secret`.
///
/// Returns `false` for a malformed header, an unsupported algorithm, a digest
/// that is not hex, or a digest that does not match.
pub fn validate_signature(body: &[u8], secret: &str, signature: &str) -> bool {
    let Some((algorithm, digest)) = signature.split_once('=') else {
        return false;
    };

    let Ok(algorithm) = algorithm.trim().parse::<SignatureAlgorithm>() else {
        return false;
    };

    let Ok(expected) = hex::decode(digest.trim()) else {
        return false;
    };

    algorithm.verify(secret.as_bytes(), body, &expected)
}

fn digest_with<M: Mac + KeyInit>(secret: &[u8], body: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let Ok(mut mac) = <M as Mac>::new_from_slice(secret) else {
        return Vec::new();
    };
    Mac::update(&mut mac, body);
    Mac::finalize(mac).into_bytes().to_vec()
}

fn verify_with<M: Mac + KeyInit>(secret: &[u8], body: &[u8], expected: &[u8]) -> bool {
    let Ok(mut mac) = <M as Mac>::new_from_slice(secret) else {
        return false;
    };
    Mac::update(&mut mac, body);
    Mac::verify_slice(mac, expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALGORITHMS: [SignatureAlgorithm; 4] = [
        SignatureAlgorithm::Sha1,
        SignatureAlgorithm::Sha256,
        SignatureAlgorithm::Sha384,
        SignatureAlgorithm::Sha512,
    ];

    const FOX: &[u8] = b"The quick brown fox jumps over the lazy dog";

    #[test]
    fn known_vectors() {
        assert_eq!(
            sign(SignatureAlgorithm::Sha1, "key", FOX),
            "sha1=de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9"
        );
        assert_eq!(
            sign(SignatureAlgorithm::Sha256, "key", FOX),
            "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    /// RFC 4231, test case 2.
    #[test]
    fn rfc4231_vectors() {
        let body = b"what do ya want for nothing?";

        assert_eq!(
            sign(SignatureAlgorithm::Sha384, "Jefe", body),
            "sha384=af45d2e376484031617f78d2b58a6b1b9c7ef464f5a01b47e42ec3736322445e8e2240ca5e69e2c78b3239ecfab21649"
        );
        assert_eq!(
            sign(SignatureAlgorithm::Sha512, "Jefe", body),
            "sha512=164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea2505549758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn digest_lengths() {
        assert_eq!(SignatureAlgorithm::Sha1.digest(b"k", FOX).len(), 20);
        assert_eq!(SignatureAlgorithm::Sha256.digest(b"k", FOX).len(), 32);
        assert_eq!(SignatureAlgorithm::Sha384.digest(b"k", FOX).len(), 48);
        assert_eq!(SignatureAlgorithm::Sha512.digest(b"k", FOX).len(), 64);
    }

    #[test]
    fn signed_bodies_validate() {
        for algorithm in ALGORITHMS {
            for (body, secret) in [(FOX, "key"), (&b""[..], "s"), (&[0u8, 255, 7][..], "")] {
                let header = sign(algorithm, secret, body);
                assert!(validate_signature(body, secret, &header), "{header}");
            }
        }
    }

    #[test]
    fn tampering_is_detected() {
        for algorithm in ALGORITHMS {
            let header = sign(algorithm, "key", FOX);

            let mut body = FOX.to_vec();
            body[4] ^= 0x01;
            assert!(!validate_signature(&body, "key", &header));

            assert!(!validate_signature(FOX, "kez", &header));
        }
    }

    #[test]
    fn algorithm_must_match_digest() {
        let sha1 = sign(SignatureAlgorithm::Sha1, "key", FOX);
        let relabelled = sha1.replacen("sha1", "sha256", 1);

        assert!(!validate_signature(FOX, "key", &relabelled));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let digest = hex::encode(SignatureAlgorithm::Sha256.digest(b"key", FOX));

        assert!(!validate_signature(FOX, "key", &format!("md5={digest}")));
        assert!(!validate_signature(FOX, "key", &format!("SHA256={digest}")));
        assert!(!validate_signature(FOX, "key", &format!("={digest}")));
    }

    #[test]
    fn malformed_headers_are_rejected() {
        assert!(!validate_signature(FOX, "key", ""));
        assert!(!validate_signature(FOX, "key", "sha256"));
        assert!(!validate_signature(FOX, "key", "sha256="));
        assert!(!validate_signature(FOX, "key", "sha256=not-hex"));
        assert!(!validate_signature(FOX, "key", "sha256=abcd"));
    }

    #[test]
    fn algorithm_names_round_trip() {
        for algorithm in ALGORITHMS {
            assert_eq!(algorithm.as_str().parse(), Ok(algorithm));
        }
        assert_eq!(
            "md5".parse::<SignatureAlgorithm>(),
            Err(UnknownAlgorithm("md5".into()))
        );
    }
}
