// Copyright (C) Microsoft Corporation. All rights reserved.

//! Encryption, decryption, signing and verification.
//!
//! PKCS#1 v1.5 encryption maps onto the service's single-call encrypt and
//! decrypt. Everything else is staged through a native transform:
//!
//! 1. create the transform bound to a key (and, to verify, the signature)
//! 2. set the digest type, digest length, padding and input attributes
//! 3. execute it
//! 4. read the output data or verdict
//!
//! RSA-PSS is not offered by the transform API. It is built from a raw RSA
//! transform plus EMSA-PSS encoding done in software.
//!
//! Every function checks the key algorithm and hash name before creating any
//! native object.

mod encryption;
mod pipeline;
mod signing;

pub use encryption::*;
pub use signing::*;

#[cfg(test)]
mod tests;
