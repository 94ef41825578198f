// Copyright (C) Microsoft Corporation. All rights reserved.

use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::HasPublic;
use openssl::pkey::Id;
use openssl::pkey::PKey;
use openssl::pkey::PKeyRef;
use openssl::pkey::Private;
use openssl::pkey::Public;
use openssl::rsa::Rsa;
use openssl::x509::X509Ref;
use openssl::x509::X509;

use super::spki;
use super::*;
use crate::CryptoError;

const PEM_PREFIX: &[u8] = b"-----BEGIN";

fn is_pem(bytes: &[u8]) -> bool {
    bytes.trim_ascii_start().starts_with(PEM_PREFIX)
}

fn key_params<T: HasPublic>(pkey: &PKeyRef<T>, spki_der: &[u8]) -> Result<KeyParams, CryptoError> {
    match pkey.id() {
        Id::RSA => Ok(KeyParams::Rsa),
        Id::DSA => {
            let dsa = pkey.dsa().map_err(|e| {
                tracing::error!("failed to read DSA parameters: {}", e);
                CryptoError::PublicKeyParseError
            })?;
            let hash = if dsa.q().num_bits() <= 160 {
                DsaHash::Sha1
            } else {
                DsaHash::Sha2
            };
            Ok(KeyParams::Dsa(hash))
        }
        Id::EC => Ok(KeyParams::Ec(spki::ec_curve(spki_der)?)),
        other => {
            let name = Nid::from_raw(other.as_raw())
                .short_name()
                .map(str::to_string)
                .unwrap_or_else(|_| other.as_raw().to_string());
            tracing::error!(algorithm = %name, "unsupported key algorithm");
            Err(CryptoError::UnsupportedKeyAlgorithm(name))
        }
    }
}

pub(crate) fn public_key_info<T: HasPublic>(
    pkey: &PKeyRef<T>,
) -> Result<PublicKeyInfo, CryptoError> {
    let der = pkey.public_key_to_der().map_err(|e| {
        tracing::error!("failed to encode SubjectPublicKeyInfo: {}", e);
        CryptoError::PublicKeyParseError
    })?;
    let params = key_params(pkey, &der)?;
    Ok(PublicKeyInfo {
        params,
        bit_size: pkey.bits() as usize,
        der,
    })
}

fn private_key_info(pkey: &PKeyRef<Private>) -> Result<PrivateKeyInfo, CryptoError> {
    let public = public_key_info(pkey)?;

    let encode_error = |e: openssl::error::ErrorStack| {
        tracing::error!("failed to encode private key: {}", e);
        CryptoError::PrivateKeyParseError
    };
    let pkcs8 = pkey.private_key_to_pkcs8().map_err(encode_error)?;
    let unwrapped = match public.algo() {
        KeyAlgo::Rsa => pkey.rsa().and_then(|rsa| rsa.private_key_to_der()),
        KeyAlgo::Dsa => pkey.dsa().and_then(|dsa| dsa.private_key_to_der()),
        KeyAlgo::Ec => pkey.ec_key().and_then(|ec| ec.private_key_to_der()),
    }
    .map_err(encode_error)?;

    Ok(PrivateKeyInfo {
        params: public.params,
        bit_size: public.bit_size,
        pkcs8,
        unwrapped,
    })
}

fn certificate_info(cert: &X509Ref) -> Result<CertificateInfo, CryptoError> {
    let der = cert.to_der().map_err(|e| {
        tracing::error!("failed to encode certificate: {}", e);
        CryptoError::CertificateParseError
    })?;
    let pkey = cert.public_key().map_err(|e| {
        tracing::error!("failed to read certificate public key: {}", e);
        CryptoError::CertificateParseError
    })?;
    Ok(CertificateInfo {
        der,
        public_key: public_key_info(&pkey)?,
    })
}

/// Parses a PEM or DER X.509 certificate.
pub fn parse_certificate(bytes: &[u8]) -> Result<CertificateInfo, CryptoError> {
    let cert = if is_pem(bytes) {
        X509::from_pem(bytes)
    } else {
        X509::from_der(bytes)
    }
    .map_err(|e| {
        tracing::error!("[CertParse] failed to decode certificate: {}", e);
        CryptoError::CertificateParseError
    })?;
    certificate_info(&cert)
}

/// Parses a public key.
///
/// Accepts PEM or DER SubjectPublicKeyInfo, PKCS#1 `RSAPublicKey`, or a
/// certificate, in which case its SubjectPublicKeyInfo is used.
pub fn parse_public(bytes: &[u8]) -> Result<PublicKeyInfo, CryptoError> {
    let pkey = public_pkey(bytes).ok_or_else(|| {
        tracing::error!("[KeyParse] input is not a recognised public key encoding");
        CryptoError::PublicKeyParseError
    })?;
    public_key_info(&pkey)
}

fn public_pkey(bytes: &[u8]) -> Option<PKey<Public>> {
    if is_pem(bytes) {
        PKey::public_key_from_pem(bytes)
            .or_else(|_| Rsa::public_key_from_pem_pkcs1(bytes).and_then(PKey::from_rsa))
            .or_else(|_| X509::from_pem(bytes).and_then(|cert| cert.public_key()))
            .ok()
    } else {
        PKey::public_key_from_der(bytes)
            .or_else(|_| Rsa::public_key_from_der_pkcs1(bytes).and_then(PKey::from_rsa))
            .or_else(|_| X509::from_der(bytes).and_then(|cert| cert.public_key()))
            .ok()
    }
}

/// Parses a private key, decrypting it with `password` when it is encrypted.
///
/// Accepts PEM (PKCS#8, encrypted PKCS#8 and traditional OpenSSL formats)
/// and DER (PKCS#8, encrypted PKCS#8, PKCS#1, SEC1).
pub fn parse_private(bytes: &[u8], password: Option<&[u8]>) -> Result<PrivateKeyInfo, CryptoError> {
    let password = password.unwrap_or_default();
    let pkey = if is_pem(bytes) {
        PKey::private_key_from_pem_passphrase(bytes, password)
    } else {
        PKey::private_key_from_pkcs8_passphrase(bytes, password)
            .or_else(|_| PKey::private_key_from_der(bytes))
    }
    .map_err(|e| {
        tracing::error!("[KeyParse] failed to decode private key: {}", e);
        CryptoError::PrivateKeyParseError
    })?;
    private_key_info(&pkey)
}

/// Parses a DER PKCS#12 container.
///
/// The password must be valid UTF-8. Certificates that do not match the
/// private key are returned in `extra_certificates`, in decoder order.
pub fn parse_pkcs12(bytes: &[u8], password: Option<&[u8]>) -> Result<Pkcs12Info, CryptoError> {
    let password = std::str::from_utf8(password.unwrap_or_default()).map_err(|_| {
        tracing::error!("[Pkcs12Parse] password is not valid UTF-8");
        CryptoError::InvalidPassword
    })?;

    let parsed = Pkcs12::from_der(bytes)
        .and_then(|pkcs12| pkcs12.parse2(password))
        .map_err(|e| {
            tracing::error!("[Pkcs12Parse] failed to decode container: {}", e);
            CryptoError::Pkcs12ParseError
        })?;

    let private_key = parsed.pkey.as_deref().map(private_key_info).transpose()?;
    let certificate = parsed.cert.as_deref().map(certificate_info).transpose()?;
    let extra_certificates = parsed
        .ca
        .iter()
        .flatten()
        .map(certificate_info)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Pkcs12Info {
        private_key,
        certificate,
        extra_certificates,
    })
}
