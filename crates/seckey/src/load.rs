// Copyright (C) Microsoft Corporation. All rights reserved.

//! Loading keys, certificates and PKCS#12 bundles into the security service.
//!
//! Every loader accepts a [`Source`]: encoded bytes (PEM or DER), a path to
//! read them from, or a structure that was already parsed. Keys are vetted
//! against the import policy before any native object is created.

use std::path::Path;
use std::path::PathBuf;

use crate::native;
use crate::native::KeyAttributes;
use crate::native::KeyClass;
use crate::native::KeyType;
use crate::policy;
use crate::*;

/// Where a key or certificate comes from.
#[derive(Debug)]
pub enum Source<'a, T> {
    /// PEM or DER encoded bytes.
    Bytes(&'a [u8]),
    /// File holding PEM or DER encoded bytes.
    Path(&'a Path),
    /// Already parsed structure.
    Parsed(T),
}

/// Certificate source.
pub type CertificateSource<'a> = Source<'a, CertificateInfo>;
/// Private key source.
pub type PrivateKeySource<'a> = Source<'a, PrivateKeyInfo>;
/// Public key source.
pub type PublicKeySource<'a> = Source<'a, PublicKeyInfo>;
/// PKCS#12 source.
pub type Pkcs12Source<'a> = Source<'a, Pkcs12Info>;

macro_rules! impl_source_from {
    ($info:ty) => {
        impl<'a> From<&'a [u8]> for Source<'a, $info> {
            fn from(bytes: &'a [u8]) -> Self {
                Source::Bytes(bytes)
            }
        }

        impl<'a> From<&'a Vec<u8>> for Source<'a, $info> {
            fn from(bytes: &'a Vec<u8>) -> Self {
                Source::Bytes(bytes)
            }
        }

        impl<'a> From<&'a Path> for Source<'a, $info> {
            fn from(path: &'a Path) -> Self {
                Source::Path(path)
            }
        }

        impl<'a> From<&'a PathBuf> for Source<'a, $info> {
            fn from(path: &'a PathBuf) -> Self {
                Source::Path(path)
            }
        }

        impl<'a> From<$info> for Source<'a, $info> {
            fn from(info: $info) -> Self {
                Source::Parsed(info)
            }
        }
    };
}

impl_source_from!(CertificateInfo);
impl_source_from!(PrivateKeyInfo);
impl_source_from!(PublicKeyInfo);
impl_source_from!(Pkcs12Info);

impl<T> Source<'_, T> {
    fn resolve(
        self,
        parse: impl FnOnce(&[u8]) -> Result<T, CryptoError>,
    ) -> Result<T, CryptoError> {
        match self {
            Source::Bytes(bytes) => parse(bytes),
            Source::Path(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    tracing::error!(path = %path.display(), "failed to read key source: {}", e);
                    CryptoError::SourceReadError
                })?;
                parse(&bytes)
            }
            Source::Parsed(info) => Ok(info),
        }
    }
}

/// Password protecting a private key or PKCS#12 container.
///
/// Text is used as its UTF-8 encoding.
#[derive(Clone, Copy, Debug)]
pub enum Password<'a> {
    /// Raw password bytes.
    Bytes(&'a [u8]),
    /// Text password.
    Text(&'a str),
}

impl<'a> Password<'a> {
    /// Password bytes handed to the decoder.
    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            Password::Bytes(bytes) => bytes,
            Password::Text(text) => text.as_bytes(),
        }
    }
}

impl<'a> From<&'a str> for Password<'a> {
    fn from(text: &'a str) -> Self {
        Password::Text(text)
    }
}

impl<'a> From<&'a String> for Password<'a> {
    fn from(text: &'a String) -> Self {
        Password::Text(text)
    }
}

impl<'a> From<&'a [u8]> for Password<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Password::Bytes(bytes)
    }
}

/// Contents of a PKCS#12 container, loaded into the security service.
#[derive(Debug)]
pub struct Pkcs12Bundle {
    /// Private key, if the container holds one.
    pub private_key: Option<PrivateKey>,
    /// Certificate for the private key.
    pub certificate: Option<Certificate>,
    /// Other certificates, in container order.
    pub extra_certificates: Vec<Certificate>,
}

fn key_attributes(params: &KeyParams, key_class: KeyClass) -> KeyAttributes {
    let key_type = match params.algo() {
        KeyAlgo::Rsa => KeyType::Rsa,
        KeyAlgo::Dsa => KeyType::Dsa,
        KeyAlgo::Ec => KeyType::Ecdsa,
    };
    KeyAttributes {
        key_type,
        key_class,
        can_sign: true,
        can_verify: true,
    }
}

fn import_private_key(info: PrivateKeyInfo) -> Result<PrivateKey, CryptoError> {
    policy::check_key_params(info.params(), info.bit_size())?;
    let attrs = key_attributes(info.params(), KeyClass::Private);
    let raw = native::key_create(&attrs, info.unwrapped())?;
    tracing::debug!(
        "[KeyImport] loaded {} private key ({} bits)",
        info.algo(),
        info.bit_size()
    );
    Ok(PrivateKey::new(raw, info))
}

fn import_public_key(info: PublicKeyInfo) -> Result<PublicKey, CryptoError> {
    policy::check_key_params(info.params(), info.bit_size())?;
    let attrs = key_attributes(info.params(), KeyClass::Public);
    let raw = native::key_create(&attrs, info.dump())?;
    tracing::debug!(
        "[KeyImport] loaded {} public key ({} bits)",
        info.algo(),
        info.bit_size()
    );
    Ok(PublicKey::new(raw, info))
}

fn import_certificate(info: CertificateInfo) -> Result<Certificate, CryptoError> {
    let raw = native::certificate_create(info.dump())?;
    tracing::debug!("[CertImport] loaded certificate with {} key", info.algo());
    Ok(Certificate::new(raw, info))
}

/// Loads an X.509 certificate.
pub fn load_certificate<'a>(
    source: impl Into<CertificateSource<'a>>,
) -> Result<Certificate, CryptoError> {
    let info = source.into().resolve(parse_certificate)?;
    import_certificate(info)
}

/// Loads a private key, decrypting it with `password` if it is encrypted.
///
/// # Errors
///
/// - [`CryptoError::UnsupportedCurve`] for EC keys off the supported named curves
/// - [`CryptoError::UnsupportedDsaKey`] for DSA keys with a SHA-2 subgroup
/// - [`CryptoError::PrivateKeyParseError`] for undecodable input or a wrong password
pub fn load_private_key<'a>(
    source: impl Into<PrivateKeySource<'a>>,
    password: Option<Password<'_>>,
) -> Result<PrivateKey, CryptoError> {
    let password = password.as_ref().map(Password::as_bytes);
    let info = source.into().resolve(|bytes| parse_private(bytes, password))?;
    import_private_key(info)
}

/// Loads a public key.
pub fn load_public_key<'a>(
    source: impl Into<PublicKeySource<'a>>,
) -> Result<PublicKey, CryptoError> {
    let info = source.into().resolve(parse_public)?;
    import_public_key(info)
}

/// Loads every object in a PKCS#12 container.
///
/// The private key, its certificate and each extra certificate become
/// separate handles. If any of them fails to load, the ones already created
/// are released before the error is returned.
pub fn load_pkcs12<'a>(
    source: impl Into<Pkcs12Source<'a>>,
    password: Option<Password<'_>>,
) -> Result<Pkcs12Bundle, CryptoError> {
    let password = password.as_ref().map(Password::as_bytes);
    let info = source.into().resolve(|bytes| parse_pkcs12(bytes, password))?;

    let private_key = info.private_key.map(import_private_key).transpose()?;
    let certificate = info.certificate.map(import_certificate).transpose()?;
    let extra_certificates = info
        .extra_certificates
        .into_iter()
        .map(import_certificate)
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        has_key = private_key.is_some(),
        has_certificate = certificate.is_some(),
        extra = extra_certificates.len(),
        "[Pkcs12Import] loaded bundle"
    );

    Ok(Pkcs12Bundle {
        private_key,
        certificate,
        extra_certificates,
    })
}
