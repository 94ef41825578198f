// Copyright (C) Microsoft Corporation. All rights reserved.

use std::thread;

use super::*;

#[test]
fn test_released_private_key() {
    let mut private_key = load_private(rsa_key());
    private_key.release();
    assert!(private_key.is_released());

    // Metadata survives release.
    assert_eq!(private_key.algo(), KeyAlgo::Rsa);
    assert_eq!(private_key.byte_size(), 256);

    assert_no_leaks(|| {
        assert_eq!(
            rsa_pkcs1v15_sign(&private_key, b"data", "sha256"),
            Err(CryptoError::HandleReleased)
        );
        assert_eq!(
            rsa_pss_sign(&private_key, b"data", "sha256"),
            Err(CryptoError::HandleReleased)
        );
        assert_eq!(
            rsa_oaep_decrypt(&private_key, &[0u8; 256]),
            Err(CryptoError::HandleReleased)
        );
        assert_eq!(
            rsa_pkcs1v15_decrypt(&private_key, &[0u8; 256]),
            Err(CryptoError::HandleReleased)
        );
    });

    private_key.release();
    assert!(private_key.is_released());
}

#[test]
fn test_released_public_key() {
    let pkey = ec_key(Nid::X9_62_PRIME256V1);
    let private_key = load_private(&pkey);
    let mut public_key = load_public(&pkey);
    let signature = ecdsa_sign(&private_key, b"data", "sha256").expect("ECDSA sign");

    public_key.release();
    public_key.release();
    assert!(public_key.is_released());

    assert_no_leaks(|| {
        assert_eq!(
            ecdsa_verify(&public_key, &signature, b"data", "sha256"),
            Err(CryptoError::HandleReleased)
        );
    });
}

#[test]
fn test_released_certificate() {
    let mut cert = load_cert(rsa_key());
    cert.release();

    assert_eq!(cert.bit_size(), 2048);
    assert_no_leaks(|| {
        assert_eq!(
            rsa_oaep_encrypt(&cert, b"data"),
            Err(CryptoError::HandleReleased)
        );
        assert_eq!(
            rsa_pkcs1v15_verify(&cert, &[0u8; 256], b"data", "sha1"),
            Err(CryptoError::HandleReleased)
        );
    });
}

#[test]
fn test_contract_checks_precede_handle_checks() {
    let mut private_key = load_private(rsa_key());
    private_key.release();

    assert_eq!(
        ecdsa_sign(&private_key, b"data", "sha256"),
        Err(CryptoError::KeyAlgorithmMismatch {
            expected: KeyAlgo::Ec,
            actual: KeyAlgo::Rsa,
        })
    );
    assert_eq!(
        rsa_pkcs1v15_sign(&private_key, b"data", "sha3_256"),
        Err(CryptoError::UnsupportedHashAlgorithm("sha3_256".to_string()))
    );
}

#[test]
fn test_shared_keys_across_threads() {
    let pkey = ec_key(Nid::SECP384R1);
    let private_key = load_private(&pkey);
    let cert = load_cert(&pkey);
    let rsa_private = load_private(rsa_key());
    let rsa_public = load_public(rsa_key());

    // Derive up front so the cached key is owned by this thread.
    cert.public_key().expect("derive public key");

    thread::scope(|scope| {
        for worker in 0..4u8 {
            let (private_key, cert) = (&private_key, &cert);
            let (rsa_private, rsa_public) = (&rsa_private, &rsa_public);
            scope.spawn(move || {
                let data = [worker; 32];
                assert_no_leaks(|| {
                    for _ in 0..8 {
                        let signature =
                            ecdsa_sign(private_key, &data, "sha384").expect("ECDSA sign");
                        ecdsa_verify(cert, &signature, &data, "sha384").expect("ECDSA verify");

                        let signature =
                            rsa_pss_sign(rsa_private, &data, "sha256").expect("PSS sign");
                        rsa_pss_verify(rsa_public, &signature, &data, "sha256")
                            .expect("PSS verify");

                        let ciphertext =
                            rsa_oaep_encrypt(rsa_public, &data).expect("OAEP encrypt");
                        let plaintext =
                            rsa_oaep_decrypt(rsa_private, &ciphertext).expect("OAEP decrypt");
                        assert_eq!(plaintext, data);
                    }
                });
            });
        }
    });
}
