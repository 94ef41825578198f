// Copyright (C) Microsoft Corporation. All rights reserved.

//! Handles to keys held by the security service.
//!
//! A key handle pairs one owned native key with the parsed metadata it was
//! built from. Size and algorithm queries read the metadata and never touch
//! the native object, so they keep working after [`PrivateKey::release`].

use crate::handle::NativeHandle;
use crate::native::NativeRef;
use crate::CryptoError;
use crate::KeyAlgo;
use crate::PrivateKeyInfo;
use crate::PublicKeyInfo;

/// Algorithm and size metadata shared by keys and certificates.
pub trait KeyMetadata {
    /// Key algorithm.
    fn algo(&self) -> KeyAlgo;

    /// Key size in bits.
    fn bit_size(&self) -> usize;

    /// Key size in bytes, rounded up.
    fn byte_size(&self) -> usize {
        self.bit_size().div_ceil(8)
    }
}

/// Anything that can supply a public key: a [`PublicKey`] itself, or a
/// [`crate::Certificate`], which derives one on first use.
pub trait HasPublicKey: KeyMetadata {
    /// The public key to encrypt or verify with.
    fn public_key(&self) -> Result<&PublicKey, CryptoError>;
}

/// Private key loaded into the security service.
#[derive(Debug)]
pub struct PrivateKey {
    handle: NativeHandle,
    info: PrivateKeyInfo,
}

impl PrivateKey {
    pub(crate) fn new(raw: NativeRef, info: PrivateKeyInfo) -> Self {
        Self {
            handle: NativeHandle::new(raw),
            info,
        }
    }

    /// Parsed structure the key was loaded from.
    pub fn info(&self) -> &PrivateKeyInfo {
        &self.info
    }

    /// Releases the native key. Further operations fail with
    /// [`CryptoError::HandleReleased`]. Calling this again does nothing.
    pub fn release(&mut self) {
        self.handle.release();
    }

    /// Whether [`PrivateKey::release`] has been called.
    pub fn is_released(&self) -> bool {
        self.handle.is_released()
    }

    pub(crate) fn native(&self) -> Result<NativeRef, CryptoError> {
        self.handle.get()
    }
}

impl KeyMetadata for PrivateKey {
    fn algo(&self) -> KeyAlgo {
        self.info.algo()
    }

    fn bit_size(&self) -> usize {
        self.info.bit_size()
    }
}

/// Public key loaded into the security service.
#[derive(Debug)]
pub struct PublicKey {
    handle: NativeHandle,
    info: PublicKeyInfo,
}

impl PublicKey {
    pub(crate) fn new(raw: NativeRef, info: PublicKeyInfo) -> Self {
        Self {
            handle: NativeHandle::new(raw),
            info,
        }
    }

    /// Parsed SubjectPublicKeyInfo the key was loaded from.
    pub fn info(&self) -> &PublicKeyInfo {
        &self.info
    }

    /// Releases the native key. Idempotent.
    pub fn release(&mut self) {
        self.handle.release();
    }

    /// Whether [`PublicKey::release`] has been called.
    pub fn is_released(&self) -> bool {
        self.handle.is_released()
    }

    pub(crate) fn native(&self) -> Result<NativeRef, CryptoError> {
        self.handle.get()
    }
}

impl KeyMetadata for PublicKey {
    fn algo(&self) -> KeyAlgo {
        self.info.algo()
    }

    fn bit_size(&self) -> usize {
        self.info.bit_size()
    }
}

impl HasPublicKey for PublicKey {
    fn public_key(&self) -> Result<&PublicKey, CryptoError> {
        Ok(self)
    }
}
