// Copyright (C) Microsoft Corporation. All rights reserved.

use crate::native;
use crate::native::NativeRef;
use crate::CryptoError;

/// Exclusive owner of one native reference.
///
/// The reference is released exactly once: on the first call to
/// [`NativeHandle::release`] or on drop, whichever comes first. There is no
/// `Clone`, so two owners of one reference cannot exist.
#[derive(Debug)]
pub(crate) struct NativeHandle {
    raw: Option<NativeRef>,
}

impl NativeHandle {
    pub(crate) fn new(raw: NativeRef) -> Self {
        Self { raw: Some(raw) }
    }

    /// Borrows the reference for a native call.
    pub(crate) fn get(&self) -> Result<NativeRef, CryptoError> {
        self.raw.ok_or(CryptoError::HandleReleased)
    }

    pub(crate) fn is_released(&self) -> bool {
        self.raw.is_none()
    }

    pub(crate) fn release(&mut self) {
        if let Some(raw) = self.raw.take() {
            native::release(raw);
        }
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        self.release();
    }
}
