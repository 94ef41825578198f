// Copyright (C) Microsoft Corporation. All rights reserved.

//! Which hashes, curves and key shapes the security service accepts, and how
//! a hash name maps onto transform attributes.

use std::fmt;
use std::str::FromStr;

use crate::native::DigestType;
use crate::CryptoError;
use crate::CurveSpec;
use crate::DsaHash;
use crate::KeyAlgo;
use crate::KeyParams;

/// Named curves the security service can import.
pub const SUPPORTED_CURVES: [&str; 3] = ["secp256r1", "secp384r1", "secp521r1"];

/// Hash algorithm for signing and verification.
///
/// Parse one from its lowercase name with [`str::parse`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashAlgo {
    /// MD5
    Md5,
    /// SHA-1
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl HashAlgo {
    /// Lowercase name, e.g. `"sha256"`.
    pub fn name(self) -> &'static str {
        match self {
            HashAlgo::Md5 => "md5",
            HashAlgo::Sha1 => "sha1",
            HashAlgo::Sha224 => "sha224",
            HashAlgo::Sha256 => "sha256",
            HashAlgo::Sha384 => "sha384",
            HashAlgo::Sha512 => "sha512",
        }
    }

    pub(crate) fn digest_type(self) -> DigestType {
        match self {
            HashAlgo::Md5 => DigestType::Md5,
            HashAlgo::Sha1 => DigestType::Sha1,
            HashAlgo::Sha224 | HashAlgo::Sha256 | HashAlgo::Sha384 | HashAlgo::Sha512 => {
                DigestType::Sha2
            }
        }
    }

    /// Digest length attribute in bits. Only the SHA-2 family carries one.
    pub(crate) fn digest_length(self) -> Option<i32> {
        match self {
            HashAlgo::Sha224 => Some(224),
            HashAlgo::Sha256 => Some(256),
            HashAlgo::Sha384 => Some(384),
            HashAlgo::Sha512 => Some(512),
            HashAlgo::Md5 | HashAlgo::Sha1 => None,
        }
    }

    /// Hash length handed to the PSS encoder. MD5 has no entry and maps to 0;
    /// the encoder rejects it.
    pub(crate) fn pss_hash_len(self) -> usize {
        match self {
            HashAlgo::Sha1 => 20,
            HashAlgo::Sha224 => 28,
            HashAlgo::Sha256 => 32,
            HashAlgo::Sha384 => 48,
            HashAlgo::Sha512 => 64,
            HashAlgo::Md5 => 0,
        }
    }
}

impl FromStr for HashAlgo {
    type Err = CryptoError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "md5" => Ok(HashAlgo::Md5),
            "sha1" => Ok(HashAlgo::Sha1),
            "sha224" => Ok(HashAlgo::Sha224),
            "sha256" => Ok(HashAlgo::Sha256),
            "sha384" => Ok(HashAlgo::Sha384),
            "sha512" => Ok(HashAlgo::Sha512),
            _ => {
                tracing::error!(hash_algorithm = name, "unsupported hash algorithm");
                Err(CryptoError::UnsupportedHashAlgorithm(name.to_string()))
            }
        }
    }
}

impl fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rejects keys the security service cannot import: EC keys off the
/// supported named curves and DSA keys with a SHA-2 sized subgroup.
pub(crate) fn check_key_params(params: &KeyParams, bit_size: usize) -> Result<(), CryptoError> {
    match params {
        KeyParams::Rsa | KeyParams::Dsa(DsaHash::Sha1) => Ok(()),
        KeyParams::Dsa(DsaHash::Sha2) => {
            tracing::error!(bit_size, "DSA key uses a SHA-2 subgroup");
            Err(CryptoError::UnsupportedDsaKey(bit_size))
        }
        KeyParams::Ec(CurveSpec::Named(name)) if SUPPORTED_CURVES.contains(&name.as_str()) => {
            Ok(())
        }
        KeyParams::Ec(curve) => {
            tracing::error!(%curve, "EC key is not on a supported named curve");
            Err(CryptoError::UnsupportedCurve(curve.to_string()))
        }
    }
}

pub(crate) fn require_algo(actual: KeyAlgo, expected: KeyAlgo) -> Result<(), CryptoError> {
    if actual != expected {
        tracing::error!(%expected, %actual, "key algorithm mismatch");
        return Err(CryptoError::KeyAlgorithmMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_names_round_trip() {
        for hash in [
            HashAlgo::Md5,
            HashAlgo::Sha1,
            HashAlgo::Sha224,
            HashAlgo::Sha256,
            HashAlgo::Sha384,
            HashAlgo::Sha512,
        ] {
            assert_eq!(hash.name().parse::<HashAlgo>(), Ok(hash));
        }
    }

    #[test]
    fn test_unknown_hash_rejected() {
        for name in ["sha3_256", "SHA256", "", "md4", "sha-1"] {
            let err = name.parse::<HashAlgo>().expect_err("name should be rejected");
            assert_eq!(err, CryptoError::UnsupportedHashAlgorithm(name.to_string()));
            assert!(err.is_contract_violation());
        }
    }

    #[test]
    fn test_digest_attributes() {
        assert_eq!(HashAlgo::Md5.digest_type(), DigestType::Md5);
        assert_eq!(HashAlgo::Sha1.digest_type(), DigestType::Sha1);
        assert_eq!(HashAlgo::Sha1.digest_length(), None);
        assert_eq!(HashAlgo::Sha384.digest_type(), DigestType::Sha2);
        assert_eq!(HashAlgo::Sha384.digest_length(), Some(384));
        assert_eq!(HashAlgo::Sha224.digest_length(), Some(224));
    }

    #[test]
    fn test_pss_hash_len_defaults_to_zero() {
        assert_eq!(HashAlgo::Md5.pss_hash_len(), 0);
        assert_eq!(HashAlgo::Sha224.pss_hash_len(), 28);
        assert_eq!(HashAlgo::Sha512.pss_hash_len(), 64);
    }

    #[test]
    fn test_key_params_policy() {
        assert!(check_key_params(&KeyParams::Rsa, 2048).is_ok());
        assert!(check_key_params(&KeyParams::Dsa(DsaHash::Sha1), 1024).is_ok());
        assert_eq!(
            check_key_params(&KeyParams::Dsa(DsaHash::Sha2), 2048),
            Err(CryptoError::UnsupportedDsaKey(2048))
        );
        for name in SUPPORTED_CURVES {
            let params = KeyParams::Ec(CurveSpec::Named(name.to_string()));
            assert!(check_key_params(&params, 256).is_ok());
        }
        assert_eq!(
            check_key_params(&KeyParams::Ec(CurveSpec::Named("secp256k1".into())), 256),
            Err(CryptoError::UnsupportedCurve("secp256k1".into()))
        );
        assert!(matches!(
            check_key_params(&KeyParams::Ec(CurveSpec::Explicit), 256),
            Err(CryptoError::UnsupportedCurve(_))
        ));
    }

    #[test]
    fn test_require_algo() {
        assert!(require_algo(KeyAlgo::Rsa, KeyAlgo::Rsa).is_ok());
        assert_eq!(
            require_algo(KeyAlgo::Ec, KeyAlgo::Rsa),
            Err(CryptoError::KeyAlgorithmMismatch {
                expected: KeyAlgo::Rsa,
                actual: KeyAlgo::Ec,
            })
        );
    }
}
