// Copyright (C) Microsoft Corporation. All rights reserved.

//! Structured views of keys, certificates and PKCS#12 containers.
//!
//! Parsing happens entirely in software before anything is handed to the
//! security service. The resulting structures carry the metadata the crate
//! needs to vet a key (algorithm, size, DSA hash family, EC curve) and the
//! exact DER that is given to the service:
//!
//! - public keys: the SubjectPublicKeyInfo ([`PublicKeyInfo::dump`])
//! - private keys: the algorithm-specific structure inside the PKCS#8
//!   wrapper ([`PrivateKeyInfo::unwrapped`]): PKCS#1 for RSA, the OpenSSL
//!   `DSAPrivateKey` sequence for DSA, SEC1 `ECPrivateKey` for EC
//! - certificates: the full X.509 DER ([`CertificateInfo::dump`])

mod parse;
mod spki;

use std::fmt;

pub use parse::*;

use crate::CryptoError;


/// Asymmetric key algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyAlgo {
    /// RSA
    Rsa,
    /// DSA
    Dsa,
    /// Elliptic curve (ECDSA)
    Ec,
}

impl KeyAlgo {
    /// Lowercase name: `"rsa"`, `"dsa"` or `"ec"`.
    pub fn name(self) -> &'static str {
        match self {
            KeyAlgo::Rsa => "rsa",
            KeyAlgo::Dsa => "dsa",
            KeyAlgo::Ec => "ec",
        }
    }
}

impl fmt::Display for KeyAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hash family a DSA key's subgroup size is paired with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DsaHash {
    /// q is at most 160 bits
    Sha1,
    /// q is larger than 160 bits
    Sha2,
}

/// How an EC key names its domain parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CurveSpec {
    /// Named curve, e.g. `"secp256r1"`. Unknown OIDs use their dotted form.
    Named(String),
    /// Explicit `SpecifiedECDomain` parameters.
    Explicit,
    /// Parameters inherited from the issuer (`implicitCA`) or absent.
    ImplicitlyCa,
}

impl fmt::Display for CurveSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveSpec::Named(name) => f.write_str(name),
            CurveSpec::Explicit => f.write_str("explicit parameters"),
            CurveSpec::ImplicitlyCa => f.write_str("implicit parameters"),
        }
    }
}

/// Algorithm together with the parameters that decide whether the platform
/// accepts the key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyParams {
    /// RSA key
    Rsa,
    /// DSA key with its hash family
    Dsa(DsaHash),
    /// EC key with its curve
    Ec(CurveSpec),
}

impl KeyParams {
    /// Algorithm of the key.
    pub fn algo(&self) -> KeyAlgo {
        match self {
            KeyParams::Rsa => KeyAlgo::Rsa,
            KeyParams::Dsa(_) => KeyAlgo::Dsa,
            KeyParams::Ec(_) => KeyAlgo::Ec,
        }
    }
}

/// Parsed SubjectPublicKeyInfo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKeyInfo {
    params: KeyParams,
    bit_size: usize,
    der: Vec<u8>,
}

impl PublicKeyInfo {
    /// Algorithm parameters.
    pub fn params(&self) -> &KeyParams {
        &self.params
    }

    /// Key algorithm.
    pub fn algo(&self) -> KeyAlgo {
        self.params.algo()
    }

    /// Size of the key in bits: modulus for RSA, p for DSA, field for EC.
    pub fn bit_size(&self) -> usize {
        self.bit_size
    }

    /// Size of the key in bytes, rounded up.
    pub fn byte_size(&self) -> usize {
        self.bit_size.div_ceil(8)
    }

    /// DSA hash family. `None` for other algorithms.
    pub fn hash_algo(&self) -> Option<DsaHash> {
        match self.params {
            KeyParams::Dsa(hash) => Some(hash),
            _ => None,
        }
    }

    /// EC curve. `None` for other algorithms.
    pub fn curve(&self) -> Option<&CurveSpec> {
        match &self.params {
            KeyParams::Ec(curve) => Some(curve),
            _ => None,
        }
    }

    /// DER encoded SubjectPublicKeyInfo.
    pub fn dump(&self) -> &[u8] {
        &self.der
    }

    /// Big-endian RSA modulus. Fails for non-RSA keys.
    pub(crate) fn rsa_modulus(&self) -> Result<Vec<u8>, CryptoError> {
        spki::rsa_modulus(&self.der)
    }
}

/// Parsed private key.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKeyInfo {
    params: KeyParams,
    bit_size: usize,
    pkcs8: Vec<u8>,
    unwrapped: Vec<u8>,
}

impl PrivateKeyInfo {
    /// Algorithm parameters.
    pub fn params(&self) -> &KeyParams {
        &self.params
    }

    /// Key algorithm.
    pub fn algo(&self) -> KeyAlgo {
        self.params.algo()
    }

    /// Size of the key in bits.
    pub fn bit_size(&self) -> usize {
        self.bit_size
    }

    /// Size of the key in bytes, rounded up.
    pub fn byte_size(&self) -> usize {
        self.bit_size.div_ceil(8)
    }

    /// DSA hash family. `None` for other algorithms.
    pub fn hash_algo(&self) -> Option<DsaHash> {
        match self.params {
            KeyParams::Dsa(hash) => Some(hash),
            _ => None,
        }
    }

    /// EC curve. `None` for other algorithms.
    pub fn curve(&self) -> Option<&CurveSpec> {
        match &self.params {
            KeyParams::Ec(curve) => Some(curve),
            _ => None,
        }
    }

    /// DER encoded, unencrypted PKCS#8 PrivateKeyInfo.
    pub fn dump(&self) -> &[u8] {
        &self.pkcs8
    }

    /// DER of the algorithm-specific key inside the PKCS#8 wrapper.
    pub fn unwrapped(&self) -> &[u8] {
        &self.unwrapped
    }
}

impl fmt::Debug for PrivateKeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyInfo")
            .field("params", &self.params)
            .field("bit_size", &self.bit_size)
            .finish_non_exhaustive()
    }
}

/// Parsed X.509 certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertificateInfo {
    der: Vec<u8>,
    public_key: PublicKeyInfo,
}

impl CertificateInfo {
    /// The certificate's SubjectPublicKeyInfo.
    pub fn public_key(&self) -> &PublicKeyInfo {
        &self.public_key
    }

    /// Algorithm of the certified key.
    pub fn algo(&self) -> KeyAlgo {
        self.public_key.algo()
    }

    /// Size of the certified key in bits.
    pub fn bit_size(&self) -> usize {
        self.public_key.bit_size()
    }

    /// Size of the certified key in bytes.
    pub fn byte_size(&self) -> usize {
        self.public_key.byte_size()
    }

    /// DER encoded certificate.
    pub fn dump(&self) -> &[u8] {
        &self.der
    }
}

/// Decoded PKCS#12 container contents.
#[derive(Debug, Default)]
pub struct Pkcs12Info {
    /// Private key, if the container holds one.
    pub private_key: Option<PrivateKeyInfo>,
    /// Certificate matching the private key.
    pub certificate: Option<CertificateInfo>,
    /// Remaining certificates in decoder order.
    pub extra_certificates: Vec<CertificateInfo>,
}
