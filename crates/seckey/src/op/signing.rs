// Copyright (C) Microsoft Corporation. All rights reserved.

use rsa_padding::PssError;

use super::pipeline::TransformPipeline;
use crate::native::PaddingKey;
use crate::native::TransformKind;
use crate::policy::require_algo;
use crate::rsa_raw_decrypt;
use crate::rsa_raw_encrypt;
use crate::CryptoError;
use crate::HasPublicKey;
use crate::HashAlgo;
use crate::KeyAlgo;
use crate::KeyMetadata;
use crate::PrivateKey;
use crate::PublicKey;

fn pss_error(err: PssError) -> CryptoError {
    match err {
        PssError::UnsupportedDigest(name) => CryptoError::UnsupportedHashAlgorithm(name),
        other => {
            tracing::error!("PSS encoding failed: {}", other);
            CryptoError::PssPaddingError
        }
    }
}

fn sign(private_key: &PrivateKey, data: &[u8], hash: HashAlgo) -> Result<Vec<u8>, CryptoError> {
    let key = private_key.native()?;

    let mut pipeline = TransformPipeline::new(TransformKind::Sign, key)?;
    pipeline.digest(hash)?;
    if private_key.algo() == KeyAlgo::Rsa {
        pipeline.padding(PaddingKey::Pkcs1)?;
    }
    pipeline.input(data)?;
    let signature = pipeline.execute()?;

    tracing::debug!(algo = %private_key.algo(), %hash, "[Sign] signature created");
    Ok(signature)
}

fn verify<K>(
    certificate_or_public_key: &K,
    signature: &[u8],
    data: &[u8],
    hash: HashAlgo,
) -> Result<(), CryptoError>
where
    K: HasPublicKey + ?Sized,
{
    let public_key = certificate_or_public_key.public_key()?;
    let key = public_key.native()?;

    let mut pipeline = TransformPipeline::verify(key, signature)?;
    pipeline.digest(hash)?;
    if public_key.algo() == KeyAlgo::Rsa {
        pipeline.padding(PaddingKey::Pkcs1)?;
    }
    pipeline.input(data)?;

    if !pipeline.execute_verdict()? {
        tracing::debug!(algo = %public_key.algo(), %hash, "[Verify] signature rejected");
        return Err(CryptoError::SignatureInvalid);
    }
    Ok(())
}

/// Signs `data` with RSA PKCS#1 v1.5.
///
/// `hash_algorithm` is one of `"md5"`, `"sha1"`, `"sha224"`, `"sha256"`,
/// `"sha384"` or `"sha512"`.
pub fn rsa_pkcs1v15_sign(
    private_key: &PrivateKey,
    data: &[u8],
    hash_algorithm: &str,
) -> Result<Vec<u8>, CryptoError> {
    require_algo(private_key.algo(), KeyAlgo::Rsa)?;
    let hash = hash_algorithm.parse::<HashAlgo>()?;
    sign(private_key, data, hash)
}

/// Verifies an RSA PKCS#1 v1.5 signature.
///
/// # Errors
///
/// [`CryptoError::SignatureInvalid`] if the signature does not match.
pub fn rsa_pkcs1v15_verify<K>(
    certificate_or_public_key: &K,
    signature: &[u8],
    data: &[u8],
    hash_algorithm: &str,
) -> Result<(), CryptoError>
where
    K: HasPublicKey + ?Sized,
{
    require_algo(certificate_or_public_key.algo(), KeyAlgo::Rsa)?;
    let hash = hash_algorithm.parse::<HashAlgo>()?;
    verify(certificate_or_public_key, signature, data, hash)
}

/// Signs `data` with RSASSA-PSS, MGF1 over the same hash, and a salt as
/// long as the digest.
pub fn rsa_pss_sign(
    private_key: &PrivateKey,
    data: &[u8],
    hash_algorithm: &str,
) -> Result<Vec<u8>, CryptoError> {
    require_algo(private_key.algo(), KeyAlgo::Rsa)?;
    let hash = hash_algorithm.parse::<HashAlgo>()?;

    let encoded = rsa_padding::add_pss_padding(
        hash.name(),
        hash.pss_hash_len(),
        private_key.bit_size(),
        data,
    )
    .map_err(pss_error)?;

    rsa_raw_decrypt(private_key, &encoded)
}

// A raw RSA signature is one modulus long and numerically below the modulus.
fn signature_in_range(public_key: &PublicKey, signature: &[u8]) -> Result<bool, CryptoError> {
    let modulus = public_key.info().rsa_modulus()?;
    Ok(signature.len() == modulus.len() && signature < modulus.as_slice())
}

/// Verifies an RSASSA-PSS signature produced by [`rsa_pss_sign`].
pub fn rsa_pss_verify<K>(
    certificate_or_public_key: &K,
    signature: &[u8],
    data: &[u8],
    hash_algorithm: &str,
) -> Result<(), CryptoError>
where
    K: HasPublicKey + ?Sized,
{
    require_algo(certificate_or_public_key.algo(), KeyAlgo::Rsa)?;
    let hash = hash_algorithm.parse::<HashAlgo>()?;

    let public_key = certificate_or_public_key.public_key()?;
    public_key.native()?;
    if !signature_in_range(public_key, signature)? {
        tracing::debug!(%hash, len = signature.len(), "[Verify] PSS signature out of range");
        return Err(CryptoError::SignatureInvalid);
    }

    let block = rsa_raw_encrypt(public_key, signature)?;
    let valid = rsa_padding::verify_pss_padding(
        hash.name(),
        hash.pss_hash_len(),
        public_key.bit_size(),
        data,
        &block,
    )
    .map_err(pss_error)?;

    if !valid {
        tracing::debug!(%hash, "[Verify] PSS signature rejected");
        return Err(CryptoError::SignatureInvalid);
    }
    Ok(())
}

/// Signs `data` with DSA.
pub fn dsa_sign(
    private_key: &PrivateKey,
    data: &[u8],
    hash_algorithm: &str,
) -> Result<Vec<u8>, CryptoError> {
    require_algo(private_key.algo(), KeyAlgo::Dsa)?;
    let hash = hash_algorithm.parse::<HashAlgo>()?;
    sign(private_key, data, hash)
}

/// Verifies a DER encoded DSA signature.
pub fn dsa_verify<K>(
    certificate_or_public_key: &K,
    signature: &[u8],
    data: &[u8],
    hash_algorithm: &str,
) -> Result<(), CryptoError>
where
    K: HasPublicKey + ?Sized,
{
    require_algo(certificate_or_public_key.algo(), KeyAlgo::Dsa)?;
    let hash = hash_algorithm.parse::<HashAlgo>()?;
    verify(certificate_or_public_key, signature, data, hash)
}

/// Signs `data` with ECDSA.
pub fn ecdsa_sign(
    private_key: &PrivateKey,
    data: &[u8],
    hash_algorithm: &str,
) -> Result<Vec<u8>, CryptoError> {
    require_algo(private_key.algo(), KeyAlgo::Ec)?;
    let hash = hash_algorithm.parse::<HashAlgo>()?;
    sign(private_key, data, hash)
}

/// Verifies a DER encoded ECDSA signature.
pub fn ecdsa_verify<K>(
    certificate_or_public_key: &K,
    signature: &[u8],
    data: &[u8],
    hash_algorithm: &str,
) -> Result<(), CryptoError>
where
    K: HasPublicKey + ?Sized,
{
    require_algo(certificate_or_public_key.algo(), KeyAlgo::Ec)?;
    let hash = hash_algorithm.parse::<HashAlgo>()?;
    verify(certificate_or_public_key, signature, data, hash)
}
