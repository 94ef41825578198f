// Copyright (C) Microsoft Corporation. All rights reserved.

use super::pipeline::TransformPipeline;
use crate::native;
use crate::native::FixedPadding;
use crate::native::NativeRef;
use crate::native::PaddingKey;
use crate::native::TransformKind;
use crate::policy::require_algo;
use crate::CryptoError;
use crate::HasPublicKey;
use crate::KeyAlgo;
use crate::KeyMetadata;
use crate::PrivateKey;

fn staged(
    kind: TransformKind,
    key: NativeRef,
    padding: PaddingKey,
    data: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let mut pipeline = TransformPipeline::new(kind, key)?;
    pipeline.padding(padding)?;
    pipeline.input(data)?;
    pipeline.execute()
}

/// Encrypts with RSA PKCS#1 v1.5 padding.
///
/// `data` may be at most `byte_size - 11` bytes long.
pub fn rsa_pkcs1v15_encrypt<K>(
    certificate_or_public_key: &K,
    data: &[u8],
) -> Result<Vec<u8>, CryptoError>
where
    K: HasPublicKey + ?Sized,
{
    require_algo(certificate_or_public_key.algo(), KeyAlgo::Rsa)?;
    let public_key = certificate_or_public_key.public_key()?;
    let key = public_key.native()?;

    let mut buffer = vec![0u8; public_key.byte_size()];
    let len = native::key_encrypt(key, FixedPadding::Pkcs1, data, &mut buffer)?;
    buffer.truncate(len);
    Ok(buffer)
}

/// Decrypts RSA PKCS#1 v1.5 ciphertext.
pub fn rsa_pkcs1v15_decrypt(
    private_key: &PrivateKey,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    require_algo(private_key.algo(), KeyAlgo::Rsa)?;
    let key = private_key.native()?;

    let mut buffer = vec![0u8; private_key.byte_size()];
    let len = native::key_decrypt(key, FixedPadding::Pkcs1, ciphertext, &mut buffer)?;
    buffer.truncate(len);
    Ok(buffer)
}

/// Encrypts with RSA-OAEP using SHA-1 and MGF1-SHA-1.
///
/// `data` may be at most `byte_size - 42` bytes long.
pub fn rsa_oaep_encrypt<K>(
    certificate_or_public_key: &K,
    data: &[u8],
) -> Result<Vec<u8>, CryptoError>
where
    K: HasPublicKey + ?Sized,
{
    require_algo(certificate_or_public_key.algo(), KeyAlgo::Rsa)?;
    let key = certificate_or_public_key.public_key()?.native()?;
    staged(TransformKind::Encrypt, key, PaddingKey::Oaep, data)
}

/// Decrypts RSA-OAEP (SHA-1) ciphertext.
pub fn rsa_oaep_decrypt(
    private_key: &PrivateKey,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    require_algo(private_key.algo(), KeyAlgo::Rsa)?;
    let key = private_key.native()?;
    staged(TransformKind::Decrypt, key, PaddingKey::Oaep, ciphertext)
}

/// Raw RSA public-key operation, without padding.
///
/// `data` is treated as a big-endian integer and must be smaller than the
/// modulus. The result is one modulus long.
pub fn rsa_raw_encrypt<K>(
    certificate_or_public_key: &K,
    data: &[u8],
) -> Result<Vec<u8>, CryptoError>
where
    K: HasPublicKey + ?Sized,
{
    require_algo(certificate_or_public_key.algo(), KeyAlgo::Rsa)?;
    let key = certificate_or_public_key.public_key()?.native()?;
    staged(TransformKind::Encrypt, key, PaddingKey::None, data)
}

/// Raw RSA private-key operation, without padding.
pub fn rsa_raw_decrypt(private_key: &PrivateKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    require_algo(private_key.algo(), KeyAlgo::Rsa)?;
    let key = private_key.native()?;
    staged(TransformKind::Decrypt, key, PaddingKey::None, data)
}
