// Copyright (C) Microsoft Corporation. All rights reserved.

//! Shared fixtures for unit tests: tracing setup, generated keys and
//! self-signed certificates.

use std::sync::Once;
use std::sync::OnceLock;

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::dsa::Dsa;
use openssl::ec::EcGroup;
use openssl::ec::EcKey;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::pkey::PKeyRef;
use openssl::pkey::Private;
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::x509::X509Builder;
use openssl::x509::X509NameBuilder;
use openssl::x509::X509;
use tracing::metadata::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

use crate::*;

/// Initializes `tracing` for tests. Honours `RUST_LOG`.
pub(crate) fn init_tracing() {
    static ONCE: Once = Once::new();

    ONCE.call_once(|| {
        let targets = std::env::var("RUST_LOG")
            .ok()
            .and_then(|var| var.parse::<Targets>().ok())
            .unwrap_or_else(|| Targets::new().with_default(LevelFilter::DEBUG));
        let _ = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_test_writer()
            .with_max_level(LevelFilter::TRACE)
            .with_thread_ids(true)
            .finish()
            .with(targets)
            .try_init();
    });
}

/// 2048-bit RSA key shared by all tests.
pub(crate) fn rsa_key() -> &'static PKey<Private> {
    init_tracing();
    static KEY: OnceLock<PKey<Private>> = OnceLock::new();
    KEY.get_or_init(|| {
        let rsa = Rsa::generate(2048).expect("RSA key generation");
        PKey::from_rsa(rsa).expect("RSA PKey")
    })
}

/// 1024-bit DSA key (160-bit q) shared by all tests.
pub(crate) fn dsa_key() -> &'static PKey<Private> {
    init_tracing();
    static KEY: OnceLock<PKey<Private>> = OnceLock::new();
    KEY.get_or_init(|| {
        let dsa = Dsa::generate(1024).expect("DSA key generation");
        PKey::from_dsa(dsa).expect("DSA PKey")
    })
}

/// 2048-bit DSA key. Its subgroup is larger than 160 bits.
pub(crate) fn dsa_sha2_key() -> &'static PKey<Private> {
    init_tracing();
    static KEY: OnceLock<PKey<Private>> = OnceLock::new();
    KEY.get_or_init(|| {
        let dsa = Dsa::generate(2048).expect("DSA key generation");
        PKey::from_dsa(dsa).expect("DSA PKey")
    })
}

/// Fresh EC key on the named curve.
pub(crate) fn ec_key(curve: Nid) -> PKey<Private> {
    init_tracing();
    let group = EcGroup::from_curve_name(curve).expect("EC group");
    let ec = EcKey::generate(&group).expect("EC key generation");
    PKey::from_ec_key(ec).expect("EC PKey")
}

pub(crate) fn private_pem(pkey: &PKeyRef<Private>) -> Vec<u8> {
    pkey.private_key_to_pem_pkcs8().expect("PKCS#8 PEM")
}

pub(crate) fn public_der(pkey: &PKeyRef<Private>) -> Vec<u8> {
    pkey.public_key_to_der().expect("SPKI DER")
}

/// Self-signed certificate for `pkey`.
pub(crate) fn self_signed(pkey: &PKeyRef<Private>, common_name: &str) -> X509 {
    let mut name = X509NameBuilder::new().expect("name builder");
    name.append_entry_by_nid(Nid::COMMONNAME, common_name)
        .expect("common name");
    let name = name.build();

    let serial = BigNum::from_u32(1)
        .and_then(|serial| serial.to_asn1_integer())
        .expect("serial");
    let not_before = Asn1Time::days_from_now(0).expect("not before");
    let not_after = Asn1Time::days_from_now(30).expect("not after");

    let mut builder = X509Builder::new().expect("certificate builder");
    builder.set_version(2).expect("version");
    builder.set_serial_number(&serial).expect("serial");
    builder.set_subject_name(&name).expect("subject");
    builder.set_issuer_name(&name).expect("issuer");
    builder.set_pubkey(pkey).expect("public key");
    builder.set_not_before(&not_before).expect("not before");
    builder.set_not_after(&not_after).expect("not after");
    builder
        .sign(pkey, MessageDigest::sha256())
        .expect("certificate signature");
    builder.build()
}

/// DER PKCS#12 container holding whichever of `pkey`, `cert` and `ca` are given.
pub(crate) fn pkcs12_der(
    pkey: Option<&PKey<Private>>,
    cert: Option<&X509>,
    ca: &[X509],
    password: &str,
) -> Vec<u8> {
    let mut stack = Stack::<X509>::new().expect("certificate stack");
    for extra in ca {
        stack.push(extra.clone()).expect("push certificate");
    }

    let mut builder = Pkcs12::builder();
    builder.name("seckey test");
    if let Some(pkey) = pkey {
        builder.pkey(pkey);
    }
    if let Some(cert) = cert {
        builder.cert(cert);
    }
    if !ca.is_empty() {
        builder.ca(stack);
    }
    builder
        .build2(password)
        .and_then(|pkcs12| pkcs12.to_der())
        .expect("PKCS#12 container")
}

pub(crate) fn load_private(pkey: &PKeyRef<Private>) -> PrivateKey {
    load_private_key(&private_pem(pkey), None).expect("load private key")
}

pub(crate) fn load_public(pkey: &PKeyRef<Private>) -> PublicKey {
    load_public_key(&public_der(pkey)).expect("load public key")
}

pub(crate) fn load_cert(pkey: &PKeyRef<Private>) -> Certificate {
    let der = self_signed(pkey, "seckey test").to_der().expect("certificate DER");
    load_certificate(&der).expect("load certificate")
}

/// Runs `f` and checks that it leaves no service objects behind.
pub(crate) fn assert_no_leaks<R>(f: impl FnOnce() -> R) -> R {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "macos")] {
            f()
        } else {
            let before = crate::native::live_objects();
            let result = f();
            assert_eq!(
                crate::native::live_objects(),
                before,
                "operation leaked security service objects"
            );
            result
        }
    }
}
