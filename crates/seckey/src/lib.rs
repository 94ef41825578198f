// Copyright (C) Microsoft Corporation. All rights reserved.

//! Asymmetric keys and operations on the platform security service.
//!
//! This crate loads RSA, DSA and EC keys and X.509 certificates into the
//! platform's native security service and runs encryption, decryption,
//! signing and verification through it. It supports:
//!
//! - **Loading**: certificates, private keys, public keys and PKCS#12 bundles
//!   from encoded bytes, file paths or already parsed structures
//! - **RSA encryption**: PKCS#1 v1.5, OAEP (SHA-1) and raw
//! - **Signatures**: RSA PKCS#1 v1.5, RSA-PSS, DSA and ECDSA over
//!   MD5, SHA-1 and the SHA-2 family
//!
//! Every native object the crate creates, whether a long-lived key handle or
//! a short-lived transform, is released exactly once on every path.
//!
//! # Platform Support
//!
//! - macOS: Security.framework (`SecKey`, `SecCertificate`, `SecTransform`)
//! - Other targets: an OpenSSL-backed implementation of the same object service

mod certificate;
mod der;
mod handle;
mod key;
mod load;
mod native;
mod op;
mod policy;

#[cfg(test)]
mod test_support;

pub use certificate::*;
pub use der::*;
pub use key::*;
pub use load::*;
pub use op::*;
pub use policy::*;
use thiserror::Error;

/// Error type for every key, certificate and operation in this crate.
///
/// Contract violations (see [`CryptoError::is_contract_violation`]) are raised
/// before any native object is created. `NativeError` carries the status
/// reported by the security service. `SignatureInvalid` is kept apart from
/// native failures so callers can tell a bad signature from a broken call.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    // Contract violations
    /// Hash name is not one of md5, sha1, sha224, sha256, sha384, sha512.
    #[error(
        "hash algorithm must be one of \"md5\", \"sha1\", \"sha224\", \"sha256\", \"sha384\", \"sha512\", not {0:?}"
    )]
    UnsupportedHashAlgorithm(String),
    /// Key algorithm does not match the requested operation.
    #[error("key algorithm mismatch: operation requires {expected}, key is {actual}")]
    KeyAlgorithmMismatch {
        /// Algorithm the operation requires.
        expected: KeyAlgo,
        /// Algorithm of the key that was supplied.
        actual: KeyAlgo,
    },
    /// EC key is not on secp256r1, secp384r1 or secp521r1.
    #[error("only EC keys using the named curves secp256r1, secp384r1 and secp521r1 are supported, not {0}")]
    UnsupportedCurve(String),
    /// DSA key uses a SHA-2 sized subgroup.
    #[error("only DSA keys based on SHA1 are supported, this key is based on SHA2 and is {0} bits")]
    UnsupportedDsaKey(usize),
    /// Key is not RSA, DSA or EC.
    #[error("unsupported key algorithm {0}")]
    UnsupportedKeyAlgorithm(String),
    /// Handle was released before use.
    #[error("native handle has already been released")]
    HandleReleased,
    /// PKCS#12 passwords must be valid UTF-8.
    #[error("password is not valid UTF-8")]
    InvalidPassword,

    // Parser errors
    /// Source path could not be read.
    #[error("failed to read key source")]
    SourceReadError,
    /// Certificate could not be decoded.
    #[error("failed to parse certificate")]
    CertificateParseError,
    /// Private key could not be decoded or decrypted.
    #[error("failed to parse private key")]
    PrivateKeyParseError,
    /// Public key could not be decoded.
    #[error("failed to parse public key")]
    PublicKeyParseError,
    /// PKCS#12 container could not be decoded or decrypted.
    #[error("failed to parse PKCS#12 container")]
    Pkcs12ParseError,

    // Operation errors
    /// PSS encoding failed for a reason other than the hash algorithm.
    #[error("PSS padding error")]
    PssPaddingError,
    /// Signature did not verify.
    #[error("signature is invalid")]
    SignatureInvalid,
    /// Security service reported a failure.
    #[error("security service error {code}: {message}")]
    NativeError {
        /// Status code reported by the service.
        code: i64,
        /// Human readable description from the service.
        message: String,
    },
}

impl CryptoError {
    /// Returns true for caller errors detected before any native call.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            CryptoError::UnsupportedHashAlgorithm(_)
                | CryptoError::KeyAlgorithmMismatch { .. }
                | CryptoError::UnsupportedCurve(_)
                | CryptoError::UnsupportedDsaKey(_)
                | CryptoError::UnsupportedKeyAlgorithm(_)
                | CryptoError::HandleReleased
                | CryptoError::InvalidPassword
        )
    }
}

/// Picks the per-platform type behind a crate-wide name.
macro_rules! define_type {
    ($vis:vis $name: ident, $apple_type: ty, $ossl_type: ty) => {
        /// Native type for the current platform
        #[cfg(target_os = "macos")]
        $vis type $name = $apple_type;

        /// Native type for the current platform
        #[cfg(not(target_os = "macos"))]
        $vis type $name = $ossl_type;
    };
}

pub(crate) use define_type;
