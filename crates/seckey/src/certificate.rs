// Copyright (C) Microsoft Corporation. All rights reserved.

use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::PoisonError;

use crate::handle::NativeHandle;
use crate::native;
use crate::native::NativeRef;
use crate::CertificateInfo;
use crate::CryptoError;
use crate::HasPublicKey;
use crate::KeyAlgo;
use crate::KeyMetadata;
use crate::PublicKey;

/// X.509 certificate loaded into the security service.
///
/// The certificate's public key is copied out of the native certificate the
/// first time it is needed and cached for the certificate's lifetime.
#[derive(Debug)]
pub struct Certificate {
    handle: NativeHandle,
    info: CertificateInfo,
    public_key: OnceLock<PublicKey>,
    derive_lock: Mutex<()>,
}

impl Certificate {
    pub(crate) fn new(raw: NativeRef, info: CertificateInfo) -> Self {
        Self {
            handle: NativeHandle::new(raw),
            info,
            public_key: OnceLock::new(),
            derive_lock: Mutex::new(()),
        }
    }

    /// Parsed certificate the handle was built from.
    pub fn info(&self) -> &CertificateInfo {
        &self.info
    }

    /// Releases the derived public key, if any, then the certificate.
    /// Idempotent.
    pub fn release(&mut self) {
        if let Some(mut public_key) = self.public_key.take() {
            public_key.release();
        }
        self.handle.release();
    }

    /// Whether [`Certificate::release`] has been called.
    pub fn is_released(&self) -> bool {
        self.handle.is_released()
    }

    fn derive_public_key(&self) -> Result<PublicKey, CryptoError> {
        let cert = self.handle.get()?;
        let raw = native::certificate_copy_public_key(cert)?;
        tracing::debug!(algo = %self.info.algo(), "[CertKey] copied public key from certificate");
        Ok(PublicKey::new(raw, self.info.public_key().clone()))
    }
}

impl KeyMetadata for Certificate {
    fn algo(&self) -> KeyAlgo {
        self.info.algo()
    }

    fn bit_size(&self) -> usize {
        self.info.bit_size()
    }
}

impl HasPublicKey for Certificate {
    fn public_key(&self) -> Result<&PublicKey, CryptoError> {
        if let Some(public_key) = self.public_key.get() {
            return Ok(public_key);
        }

        // Derivation happens at most once, even for concurrent first calls.
        let _guard = self
            .derive_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(public_key) = self.public_key.get() {
            return Ok(public_key);
        }
        let derived = self.derive_public_key()?;
        Ok(self.public_key.get_or_init(|| derived))
    }
}

impl Drop for Certificate {
    fn drop(&mut self) {
        self.release();
    }
}
