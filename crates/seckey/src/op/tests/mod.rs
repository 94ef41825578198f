// Copyright (C) Microsoft Corporation. All rights reserved.

//! Tests for encryption, signing and handle lifecycle.

mod lifecycle;

use openssl::nid::Nid;

use crate::test_support::*;
use crate::*;

/// Every hash name accepted by the signing functions.
const HASHES: [&str; 6] = ["md5", "sha1", "sha224", "sha256", "sha384", "sha512"];

/// Curves the security service accepts, with their field sizes.
const CURVES: [(Nid, usize); 3] = [
    (Nid::X9_62_PRIME256V1, 256),
    (Nid::SECP384R1, 384),
    (Nid::SECP521R1, 521),
];

fn tamper(signature: &[u8]) -> Vec<u8> {
    let mut tampered = signature.to_vec();
    if let Some(last) = tampered.last_mut() {
        *last ^= 0x01;
    }
    tampered
}
