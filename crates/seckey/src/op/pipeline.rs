// Copyright (C) Microsoft Corporation. All rights reserved.

use crate::native;
use crate::native::Attribute;
use crate::native::NativeRef;
use crate::native::PaddingKey;
use crate::native::TransformKind;
use crate::CryptoError;
use crate::HashAlgo;

/// Native objects created for a single operation.
///
/// Released in reverse creation order when the scope is dropped, which
/// covers the success path and every early return alike.
pub(super) struct NativeScope {
    objects: Vec<NativeRef>,
}

impl NativeScope {
    pub(super) fn new() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    fn adopt(&mut self, object: NativeRef) -> NativeRef {
        self.objects.push(object);
        object
    }

    pub(super) fn data(&mut self, bytes: &[u8]) -> Result<NativeRef, CryptoError> {
        let data = native::data_create(bytes)?;
        Ok(self.adopt(data))
    }

    fn number(&mut self, value: i32) -> Result<NativeRef, CryptoError> {
        let number = native::number_create(value)?;
        Ok(self.adopt(number))
    }
}

impl Drop for NativeScope {
    fn drop(&mut self) {
        while let Some(object) = self.objects.pop() {
            native::release(object);
        }
    }
}

/// A transform being configured, plus everything created to configure it.
pub(super) struct TransformPipeline {
    scope: NativeScope,
    transform: NativeRef,
}

impl TransformPipeline {
    /// Encrypt, decrypt or sign transform bound to `key`.
    pub(super) fn new(kind: TransformKind, key: NativeRef) -> Result<Self, CryptoError> {
        Self::create(NativeScope::new(), kind, key, None)
    }

    /// Verify transform bound to `key` and `signature`.
    pub(super) fn verify(key: NativeRef, signature: &[u8]) -> Result<Self, CryptoError> {
        let mut scope = NativeScope::new();
        let signature = scope.data(signature)?;
        Self::create(scope, TransformKind::Verify, key, Some(signature))
    }

    fn create(
        mut scope: NativeScope,
        kind: TransformKind,
        key: NativeRef,
        signature: Option<NativeRef>,
    ) -> Result<Self, CryptoError> {
        let transform = native::transform_create(kind, key, signature)?;
        let transform = scope.adopt(transform);
        tracing::debug!(?kind, "[Transform] created");
        Ok(Self { scope, transform })
    }

    fn set(&mut self, attribute: Attribute) -> Result<(), CryptoError> {
        native::transform_set_attribute(self.transform, attribute)?;
        Ok(())
    }

    /// Sets the digest type, plus the digest length for the SHA-2 family.
    pub(super) fn digest(&mut self, hash: HashAlgo) -> Result<(), CryptoError> {
        self.set(Attribute::DigestType(hash.digest_type()))?;
        if let Some(bits) = hash.digest_length() {
            let length = self.scope.number(bits)?;
            self.set(Attribute::DigestLength(length))?;
        }
        Ok(())
    }

    pub(super) fn padding(&mut self, padding: PaddingKey) -> Result<(), CryptoError> {
        self.set(Attribute::Padding(padding))
    }

    pub(super) fn input(&mut self, bytes: &[u8]) -> Result<(), CryptoError> {
        let data = self.scope.data(bytes)?;
        self.set(Attribute::Input(data))
    }

    fn run(&mut self) -> Result<NativeRef, CryptoError> {
        let output = native::transform_execute(self.transform)?;
        Ok(self.scope.adopt(output))
    }

    /// Executes the transform and copies out its data output.
    pub(super) fn execute(mut self) -> Result<Vec<u8>, CryptoError> {
        let output = self.run()?;
        Ok(native::data_bytes(output)?)
    }

    /// Executes a verify transform and reads its verdict.
    pub(super) fn execute_verdict(mut self) -> Result<bool, CryptoError> {
        let output = self.run()?;
        Ok(native::boolean_value(output)?)
    }
}
