// Copyright (C) Microsoft Corporation. All rights reserved.

//! SubjectPublicKeyInfo inspection: EC domain parameters (RFC 5480) and the
//! RSA modulus (RFC 8017 Appendix A.1.1).

use super::CurveSpec;
use crate::CryptoError;

/// OID: 1.2.840.113549.1.1.1
const OID_RSA_ENCRYPTION: asn1::ObjectIdentifier = asn1::oid!(1, 2, 840, 113549, 1, 1, 1);

/// OID: 1.2.840.10045.2.1
const OID_EC_PUBLIC_KEY: asn1::ObjectIdentifier = asn1::oid!(1, 2, 840, 10045, 2, 1);

const NAMED_CURVES: [(asn1::ObjectIdentifier, &str); 6] = [
    (asn1::oid!(1, 2, 840, 10045, 3, 1, 1), "secp192r1"),
    (asn1::oid!(1, 3, 132, 0, 33), "secp224r1"),
    (asn1::oid!(1, 2, 840, 10045, 3, 1, 7), "secp256r1"),
    (asn1::oid!(1, 3, 132, 0, 34), "secp384r1"),
    (asn1::oid!(1, 3, 132, 0, 35), "secp521r1"),
    (asn1::oid!(1, 3, 132, 0, 10), "secp256k1"),
];

/// ```text
/// AlgorithmIdentifier ::= SEQUENCE {
///   algorithm   OBJECT IDENTIFIER,
///   parameters  ANY DEFINED BY algorithm OPTIONAL
/// }
/// ```
#[derive(asn1::Asn1Read)]
struct AlgorithmIdentifier<'a> {
    algorithm: asn1::ObjectIdentifier,
    parameters: Option<asn1::Tlv<'a>>,
}

#[derive(asn1::Asn1Read)]
struct SubjectPublicKeyInfo<'a> {
    algorithm: AlgorithmIdentifier<'a>,
    subject_public_key: asn1::BitString<'a>,
}

/// ```text
/// RSAPublicKey ::= SEQUENCE {
///   modulus         INTEGER,
///   publicExponent  INTEGER
/// }
/// ```
#[derive(asn1::Asn1Read)]
struct RsaPublicKey<'a> {
    modulus: asn1::BigUint<'a>,
    _public_exponent: asn1::BigUint<'a>,
}

fn parse_spki(spki_der: &[u8]) -> Result<SubjectPublicKeyInfo<'_>, CryptoError> {
    asn1::parse_single(spki_der).map_err(|e| {
        tracing::error!("failed to decode SubjectPublicKeyInfo: {:?}", e);
        CryptoError::PublicKeyParseError
    })
}

fn curve_name(oid: &asn1::ObjectIdentifier) -> String {
    NAMED_CURVES
        .iter()
        .find(|(known, _)| known == oid)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| oid.to_string())
}

/// Classifies the `ECParameters` of an EC SubjectPublicKeyInfo:
///
/// ```text
/// ECParameters ::= CHOICE {
///   namedCurve     OBJECT IDENTIFIER,
///   implicitCurve  NULL,
///   specifiedCurve SpecifiedECDomain
/// }
/// ```
pub(super) fn ec_curve(spki_der: &[u8]) -> Result<CurveSpec, CryptoError> {
    let spki = parse_spki(spki_der)?;

    if spki.algorithm.algorithm != OID_EC_PUBLIC_KEY {
        tracing::error!(
            "SubjectPublicKeyInfo algorithm {} is not id-ecPublicKey",
            spki.algorithm.algorithm
        );
        return Err(CryptoError::PublicKeyParseError);
    }

    let Some(parameters) = spki.algorithm.parameters else {
        return Ok(CurveSpec::ImplicitlyCa);
    };

    if let Ok(oid) = parameters.parse::<asn1::ObjectIdentifier>() {
        return Ok(CurveSpec::Named(curve_name(&oid)));
    }
    if parameters.parse::<asn1::Null>().is_ok() {
        return Ok(CurveSpec::ImplicitlyCa);
    }
    Ok(CurveSpec::Explicit)
}

/// Big-endian modulus of an `rsaEncryption` SubjectPublicKeyInfo, without
/// leading zero bytes.
pub(super) fn rsa_modulus(spki_der: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let spki = parse_spki(spki_der)?;
    if spki.algorithm.algorithm != OID_RSA_ENCRYPTION {
        tracing::error!(
            "SubjectPublicKeyInfo algorithm {} is not rsaEncryption",
            spki.algorithm.algorithm
        );
        return Err(CryptoError::PublicKeyParseError);
    }

    let key: RsaPublicKey<'_> = asn1::parse_single(spki.subject_public_key.as_bytes())
        .map_err(|e| {
            tracing::error!("failed to decode RSAPublicKey: {:?}", e);
            CryptoError::PublicKeyParseError
        })?;

    let modulus = key.modulus.as_bytes();
    let start = modulus
        .iter()
        .position(|&byte| byte != 0)
        .unwrap_or(modulus.len());
    Ok(modulus[start..].to_vec())
}
