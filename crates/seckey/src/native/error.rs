// Copyright (C) Microsoft Corporation. All rights reserved.

use crate::CryptoError;

/// Failure reported by the security service, either as an OSStatus from a
/// single-call API or as an error object from the transform APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NativeError {
    pub(crate) code: i64,
    pub(crate) message: String,
}

#[cfg_attr(target_os = "macos", allow(dead_code))]
impl NativeError {
    /// One or more parameters passed to a function were not valid.
    pub(crate) const PARAM: i64 = -50;
    /// Function or operation not implemented.
    pub(crate) const UNIMPLEMENTED: i64 = -4;
    /// Unable to decode the provided data.
    pub(crate) const DECODE: i64 = -26275;
    /// The buffer is too small.
    pub(crate) const BUFFER_TOO_SMALL: i64 = -25301;
    /// A reference to a key is invalid.
    pub(crate) const INVALID_KEY_REF: i64 = -67712;

    pub(crate) fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Builds an error from a bare status code, using the service's standard
    /// description for it.
    pub(crate) fn from_status(code: i64) -> Self {
        let message = match code {
            Self::PARAM => "One or more parameters passed to a function were not valid.",
            Self::UNIMPLEMENTED => "Function or operation not implemented.",
            Self::DECODE => "Unable to decode the provided data.",
            Self::BUFFER_TOO_SMALL => "The buffer is too small.",
            Self::INVALID_KEY_REF => "A reference to a key is invalid.",
            _ => "Unknown security service error.",
        };
        Self::new(code, message)
    }
}

impl From<NativeError> for CryptoError {
    fn from(err: NativeError) -> Self {
        tracing::error!(code = err.code, "security service error: {}", err.message);
        CryptoError::NativeError {
            code: err.code,
            message: err.message,
        }
    }
}
