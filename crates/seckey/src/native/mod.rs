// Copyright (C) Microsoft Corporation. All rights reserved.

//! Contract with the platform security service.
//!
//! The service hands out reference-counted objects: certificates, keys,
//! byte buffers, numbers, booleans and transforms. Every constructor returns
//! a reference the caller owns and must pass to [`release`] exactly once.
//!
//! Transforms follow a staged protocol: create one bound to a key, set
//! attributes one at a time, execute it, then read the output object.
//!
//! # Platform Support
//!
//! - **macOS**: `service_apple`, a thin FFI layer over Security.framework
//! - **Other targets**: `service_ossl`, an OpenSSL-backed object registry
//!   that honours the same ownership rules

mod error;

cfg_if::cfg_if! {
    if #[cfg(target_os = "macos")] {
        mod service_apple;
        use service_apple as service;
    } else {
        mod service_ossl;
        use service_ossl as service;
    }
}

pub(crate) use error::NativeError;

crate::define_type!(pub(crate) NativeRef, service_apple::AppleRef, service_ossl::RegistryRef);

#[cfg(all(test, not(target_os = "macos")))]
pub(crate) use service_ossl::created_objects;
#[cfg(all(test, not(target_os = "macos")))]
pub(crate) use service_ossl::live_objects;


/// Key algorithm tag stored in the key attribute dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KeyType {
    Rsa,
    Dsa,
    Ecdsa,
}

/// Key class tag stored in the key attribute dictionary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KeyClass {
    Public,
    Private,
}

/// Attribute dictionary used when constructing a native key.
#[derive(Clone, Copy, Debug)]
pub(crate) struct KeyAttributes {
    pub(crate) key_type: KeyType,
    pub(crate) key_class: KeyClass,
    pub(crate) can_sign: bool,
    pub(crate) can_verify: bool,
}

/// Padding accepted by the fixed-padding encrypt/decrypt calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FixedPadding {
    Pkcs1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TransformKind {
    Encrypt,
    Decrypt,
    Sign,
    Verify,
}

/// Digest family identifier. SHA-2 needs a separate length attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DigestType {
    Md5,
    Sha1,
    Sha2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PaddingKey {
    None,
    Pkcs1,
    Oaep,
}

/// One attribute assignment on a transform.
///
/// Object-valued attributes borrow a reference; the transform retains it.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Attribute {
    DigestType(DigestType),
    DigestLength(NativeRef),
    Padding(PaddingKey),
    Input(NativeRef),
}

/// Builds a native certificate from DER.
pub(crate) fn certificate_create(der: &[u8]) -> Result<NativeRef, NativeError> {
    service::certificate_create(der)
}

/// Derives the public key of a native certificate. Caller owns the result.
pub(crate) fn certificate_copy_public_key(cert: NativeRef) -> Result<NativeRef, NativeError> {
    service::certificate_copy_public_key(cert)
}

/// Builds a native key from DER: SubjectPublicKeyInfo for public keys,
/// the unwrapped PKCS#1/SEC1/DSA structure for private keys.
pub(crate) fn key_create(attrs: &KeyAttributes, der: &[u8]) -> Result<NativeRef, NativeError> {
    service::key_create(attrs, der)
}

/// Single-call encrypt. Returns the number of bytes written to `output`.
pub(crate) fn key_encrypt(
    key: NativeRef,
    padding: FixedPadding,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, NativeError> {
    service::key_encrypt(key, padding, input, output)
}

/// Single-call decrypt. Returns the number of bytes written to `output`.
pub(crate) fn key_decrypt(
    key: NativeRef,
    padding: FixedPadding,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, NativeError> {
    service::key_decrypt(key, padding, input, output)
}

pub(crate) fn data_create(bytes: &[u8]) -> Result<NativeRef, NativeError> {
    service::data_create(bytes)
}

pub(crate) fn number_create(value: i32) -> Result<NativeRef, NativeError> {
    service::number_create(value)
}

/// Creates a transform bound to `key`. `signature` is required for
/// [`TransformKind::Verify`] and ignored otherwise.
pub(crate) fn transform_create(
    kind: TransformKind,
    key: NativeRef,
    signature: Option<NativeRef>,
) -> Result<NativeRef, NativeError> {
    service::transform_create(kind, key, signature)
}

pub(crate) fn transform_set_attribute(
    transform: NativeRef,
    attribute: Attribute,
) -> Result<(), NativeError> {
    service::transform_set_attribute(transform, attribute)
}

/// Runs a configured transform. Caller owns the output object.
pub(crate) fn transform_execute(transform: NativeRef) -> Result<NativeRef, NativeError> {
    service::transform_execute(transform)
}

/// Copies the bytes out of a data object.
pub(crate) fn data_bytes(data: NativeRef) -> Result<Vec<u8>, NativeError> {
    service::data_bytes(data)
}

/// Reads a boolean object.
pub(crate) fn boolean_value(value: NativeRef) -> Result<bool, NativeError> {
    service::boolean_value(value)
}

/// Drops one ownership of `object`.
pub(crate) fn release(object: NativeRef) {
    service::release(object)
}
