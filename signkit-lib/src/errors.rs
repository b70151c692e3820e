//! Error types for signing operations.
//!
//! Configuration mistakes (bad key material, missing keys, unrecognized
//! scheme tags) surface as distinct variants so deployments fail loud.
//! Verification outcomes are never errors; they resolve to `false` at the
//! public boundary (see `signer`).

/// Error type for key loading, signing, and encryption operations.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    /// A scheme tag outside the supported set was supplied.
    #[error("unknown sign type [{0}]")]
    UnknownSignType(String),

    /// Key material could not be decoded as PEM, DER, or base64-of-DER.
    #[error("malformed key material: {0}")]
    KeyFormat(String),

    /// A signing or decryption operation was requested without a private key.
    #[error("operation requires a private key, none is configured")]
    NoPrivateKey,

    /// RSA verification was requested without a counterparty public key.
    #[error("no verification public key is configured")]
    NoPublicKey,

    /// The keyed-hash scheme was used without a shared secret.
    #[error("no shared secret is configured")]
    NoSharedSecret,

    /// A cryptographic primitive failed (signing, OAEP padding, etc.).
    #[error("cryptographic operation failed: {0}")]
    Crypto(String),
}

impl SignError {
    /// Create an unknown-sign-type error from the offending tag.
    pub fn unknown_sign_type(tag: impl Into<String>) -> Self {
        Self::UnknownSignType(tag.into())
    }

    /// Create a key-format error from any decode failure.
    pub fn key_format(err: impl std::fmt::Display) -> Self {
        Self::KeyFormat(err.to_string())
    }

    /// Create a crypto error from any primitive failure.
    pub fn crypto(err: impl std::fmt::Display) -> Self {
        Self::Crypto(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sign_type_carries_the_tag() {
        let err = SignError::unknown_sign_type("HMAC");
        assert_eq!(err.to_string(), "unknown sign type [HMAC]");
    }

    #[test]
    fn key_format_wraps_the_cause() {
        let err = SignError::key_format("ASN.1 error");
        assert!(err.to_string().contains("ASN.1 error"));
    }
}
