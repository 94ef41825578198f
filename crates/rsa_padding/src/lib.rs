// Copyright (C) Microsoft Corporation. All rights reserved.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! EMSA-PSS signature padding (RFC 8017 Section 9.1) as a standalone primitive.
//!
//! The encoder produces the encoded message block that a raw (unpadded) RSA
//! private-key operation turns into a signature. The verifier checks a block
//! recovered by a raw public-key operation.
//!
//! Digest algorithms supported - SHA1, SHA2-224, SHA2-256, SHA2-384, SHA2-512

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Digest;
use thiserror::Error;

/// Smallest RSA modulus, in bits, accepted by the encoder and verifier.
const MIN_KEY_BITS: usize = 512;

/// Digest algorithm used for the message hash and for MGF1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PssDigestKind {
    /// SHA1
    Sha1,

    /// SHA224
    Sha224,

    /// SHA256
    Sha256,

    /// SHA384
    Sha384,

    /// SHA512
    Sha512,
}

impl PssDigestKind {
    /// Look up a digest by its lowercase name, e.g. `"sha256"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha1" => Some(Self::Sha1),
            "sha224" => Some(Self::Sha224),
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Output length of the digest in bytes.
    pub fn hash_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    fn hash(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => sha1::Sha1::digest(data).to_vec(),
            Self::Sha224 => sha2::Sha224::digest(data).to_vec(),
            Self::Sha256 => sha2::Sha256::digest(data).to_vec(),
            Self::Sha384 => sha2::Sha384::digest(data).to_vec(),
            Self::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }
}

/// Error type enum for PSS padding functions
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PssError {
    /// The named hash algorithm cannot be used with PSS
    #[error("hash algorithm {0:?} is not supported for PSS padding")]
    UnsupportedDigest(String),

    /// Key too small for the digest and salt
    #[error("key is not long enough to hold the PSS encoding")]
    KeyTooShort,

    /// Invalid parameter
    #[error("invalid parameter")]
    InvalidParameter,

    /// Salt generation failed
    #[error("RNG failure")]
    RngFailure,
}

/// Result type for PSS padding functions
pub type PssResult<T> = Result<T, PssError>;

/// Produce the EMSA-PSS encoded block for `message`.
///
/// Params:
/// hash_algorithm: one of "sha1", "sha224", "sha256", "sha384", "sha512".
///      Used both for the message hash and for MGF1.
/// salt_length: salt length in bytes, at most the digest length.
/// key_length: RSA modulus size in bits. The encoded block is
///      `ceil((key_length - 1) / 8)` bytes long.
///
/// Errors:
/// PssError::UnsupportedDigest for any other hash name (including "md5").
/// PssError::KeyTooShort if the block cannot fit digest and salt.
pub fn add_pss_padding(
    hash_algorithm: &str,
    salt_length: usize,
    key_length: usize,
    message: &[u8],
) -> PssResult<Vec<u8>> {
    let digest_kind = digest_kind(hash_algorithm)?;
    check_key_length(key_length)?;

    let mut salt = vec![0u8; salt_length];
    OsRng.try_fill_bytes(&mut salt).map_err(|e| {
        tracing::error!("failed to generate PSS salt: {}", e);
        PssError::RngFailure
    })?;

    let m_hash = digest_kind.hash(message);
    PssEncoding::encode(&m_hash, key_length - 1, digest_kind, &salt)
}

/// Check `signature`, the block recovered by a raw public-key operation,
/// against `message`.
///
/// The block may carry leading zero bytes beyond the encoded length, as a
/// raw RSA operation always yields a full modulus-sized buffer. A block that
/// does not decode is reported as `Ok(false)`. Only unusable parameters are
/// errors.
pub fn verify_pss_padding(
    hash_algorithm: &str,
    salt_length: usize,
    key_length: usize,
    message: &[u8],
    signature: &[u8],
) -> PssResult<bool> {
    let digest_kind = digest_kind(hash_algorithm)?;
    check_key_length(key_length)?;

    let em_bits = key_length - 1;
    let em_len = em_bits.div_ceil(8);

    let Some(mut encoded_message) = fit_block(signature, em_len) else {
        tracing::debug!(
            block_len = signature.len(),
            em_len = em_len,
            "PSS block length does not match key"
        );
        return Ok(false);
    };

    let m_hash = digest_kind.hash(message);
    Ok(PssEncoding::verify(
        &m_hash,
        &mut encoded_message,
        em_bits,
        digest_kind,
        salt_length,
    ))
}

fn digest_kind(hash_algorithm: &str) -> PssResult<PssDigestKind> {
    PssDigestKind::from_name(hash_algorithm).ok_or_else(|| {
        tracing::error!(hash_algorithm, "unsupported PSS hash algorithm");
        PssError::UnsupportedDigest(hash_algorithm.to_string())
    })
}

fn check_key_length(key_length: usize) -> PssResult<()> {
    if key_length < MIN_KEY_BITS {
        tracing::error!(key_length, "PSS key length below minimum");
        return Err(PssError::InvalidParameter);
    }
    Ok(())
}

// Trim (or reject) a raw RSA output down to exactly em_len bytes.
fn fit_block(block: &[u8], em_len: usize) -> Option<Vec<u8>> {
    if block.len() < em_len {
        return None;
    }
    let (prefix, tail) = block.split_at(block.len() - em_len);
    if prefix.iter().any(|&b| b != 0) {
        return None;
    }
    Some(tail.to_vec())
}

struct PssEncoding;

impl PssEncoding {
    /*
    byte-wise Xor of two vectors of same size.
    Result is stored in-place in the left operand.
     */
    fn xor_slices(a: &mut [u8], b: &[u8]) {
        debug_assert_eq!(a.len(), b.len());

        for (a_elem, b_elem) in a.iter_mut().zip(b.iter()) {
            *a_elem ^= *b_elem;
        }
    }

    fn zero_leftmost_x_bits(v: &mut [u8], x: usize) {
        let x_bytes = x / 8;
        let x_bits = x % 8;

        for byte in v.iter_mut().take(x_bytes) {
            *byte = 0;
        }

        if x_bits != 0 {
            if let Some(byte) = v.get_mut(x_bytes) {
                *byte &= 0xff >> x_bits;
            }
        }
    }

    fn leftmost_x_bits_are_zero(v: &[u8], x: usize) -> bool {
        let x_bytes = x / 8;
        let x_bits = x % 8;

        if v.iter().take(x_bytes).any(|&byte| byte != 0) {
            return false;
        }

        if x_bits > 0 {
            let last_byte = v.get(x_bytes).copied().unwrap_or(0);
            let mask = !(0xffu8 >> x_bits);
            if last_byte & mask != 0 {
                return false;
            }
        }

        true
    }

    fn mgf1(seed: &[u8], length: usize, digest_kind: PssDigestKind) -> Vec<u8> {
        let h_len = digest_kind.hash_len();

        let mut t = Vec::with_capacity(length + h_len);
        let mut counter: u32 = 0;
        while t.len() < length {
            let d = [seed, &counter.to_be_bytes()].concat();
            t.extend_from_slice(&digest_kind.hash(&d));
            counter += 1;
        }
        t.truncate(length);
        t
    }

    fn m_prime_hash(m_hash: &[u8], salt: &[u8], digest_kind: PssDigestKind) -> Vec<u8> {
        let mut m_dash: Vec<u8> = vec![0; 8 + m_hash.len() + salt.len()];
        m_dash[8..8 + m_hash.len()].copy_from_slice(m_hash);
        m_dash[8 + m_hash.len()..].copy_from_slice(salt);
        digest_kind.hash(&m_dash)
    }

    fn encode(
        m_hash: &[u8],
        em_bits: usize,
        digest_kind: PssDigestKind,
        salt: &[u8],
    ) -> PssResult<Vec<u8>> {
        let em_len = em_bits.div_ceil(8);
        let h_len = digest_kind.hash_len();
        let s_len = salt.len();

        // 0 <= s_len <= h_len (FIPS 186-5 Section 5.4 (g))
        if s_len > h_len {
            tracing::error!("Encoding error: salt length should not exceed hash length");
            return Err(PssError::InvalidParameter);
        }

        if em_len < h_len + s_len + 2 {
            tracing::error!(
                em_len = em_len,
                h_len = h_len,
                s_len = s_len,
                "Encoding error: em_len < h_len + s_len + 2",
            );
            return Err(PssError::KeyTooShort);
        }

        let h = Self::m_prime_hash(m_hash, salt, digest_kind);

        let mut encoded_message: Vec<u8> = vec![0; em_len];
        let db_size = em_len - h_len - 1;
        let db = &mut encoded_message[0..db_size];
        db[db_size - s_len - 1] = 0x1;
        db[db_size - s_len..].copy_from_slice(salt);

        let db_mask = Self::mgf1(&h, db_size, digest_kind);
        Self::xor_slices(db, &db_mask);
        Self::zero_leftmost_x_bits(db, 8 * em_len - em_bits);

        encoded_message[db_size..em_len - 1].copy_from_slice(&h);
        encoded_message[em_len - 1] = 0xbc;

        Ok(encoded_message)
    }

    fn verify(
        m_hash: &[u8],
        encoded_message: &mut [u8],
        em_bits: usize,
        digest_kind: PssDigestKind,
        salt_len: usize,
    ) -> bool {
        let em_len = em_bits.div_ceil(8);
        let h_len = digest_kind.hash_len();

        if encoded_message.len() != em_len || em_len < h_len + salt_len + 2 {
            tracing::debug!("Encoded message is too short");
            return false;
        }

        if encoded_message[em_len - 1] != 0xbc {
            tracing::debug!("Fixed byte 0xbc not found");
            return false;
        }

        let db_size = em_len - h_len - 1;
        let (masked_db, rest) = encoded_message.split_at_mut(db_size);
        let h = &rest[..h_len];

        let n_zero_bits = 8 * em_len - em_bits;
        if !Self::leftmost_x_bits_are_zero(masked_db, n_zero_bits) {
            return false;
        }

        let db_mask = Self::mgf1(h, db_size, digest_kind);
        Self::xor_slices(masked_db, &db_mask);
        let db = masked_db;
        Self::zero_leftmost_x_bits(db, n_zero_bits);

        let Some(fixed_db_byte_idx) = db.iter().position(|&x| x != 0) else {
            return false;
        };
        if db[fixed_db_byte_idx] != 0x01 {
            tracing::debug!("Invalid padding: padding string contains non-zero octets");
            return false;
        }

        let actual_salt_len = db_size - fixed_db_byte_idx - 1;
        if actual_salt_len != salt_len {
            tracing::debug!(
                expected = salt_len,
                actual = actual_salt_len,
                "Actual salt differs from expected salt"
            );
            return false;
        }

        let salt = &db[db_size - salt_len..];
        Self::m_prime_hash(m_hash, salt, digest_kind) == h
    }
}

#[cfg(test)]
mod tests {
    use openssl::bn::BigNum;
    use openssl::bn::BigNumContext;
    use openssl::hash::MessageDigest;
    use openssl::pkey::PKey;
    use openssl::rsa::Padding;
    use openssl::rsa::Rsa;
    use openssl::sign::RsaPssSaltlen;
    use openssl::sign::Signer;
    use openssl::sign::Verifier;

    use super::*;

    const KEYSZS: [u32; 2] = [2048, 3072];
    const DIGESTS: [PssDigestKind; 5] = [
        PssDigestKind::Sha1,
        PssDigestKind::Sha224,
        PssDigestKind::Sha256,
        PssDigestKind::Sha384,
        PssDigestKind::Sha512,
    ];

    fn name(digest_kind: PssDigestKind) -> &'static str {
        match digest_kind {
            PssDigestKind::Sha1 => "sha1",
            PssDigestKind::Sha224 => "sha224",
            PssDigestKind::Sha256 => "sha256",
            PssDigestKind::Sha384 => "sha384",
            PssDigestKind::Sha512 => "sha512",
        }
    }

    fn ossl_hash_equivalent(digest_kind: PssDigestKind) -> MessageDigest {
        match digest_kind {
            PssDigestKind::Sha1 => MessageDigest::sha1(),
            PssDigestKind::Sha224 => MessageDigest::sha224(),
            PssDigestKind::Sha256 => MessageDigest::sha256(),
            PssDigestKind::Sha384 => MessageDigest::sha384(),
            PssDigestKind::Sha512 => MessageDigest::sha512(),
        }
    }

    fn raw_private(rsa: &Rsa<openssl::pkey::Private>, block: &[u8]) -> Vec<u8> {
        let size = rsa.size() as usize;
        let mut input = vec![0u8; size - block.len()];
        input.extend_from_slice(block);
        let mut out = vec![0u8; size];
        let len = rsa
            .private_decrypt(&input, &mut out, Padding::NONE)
            .expect("raw private operation");
        out.truncate(len);
        out
    }

    fn raw_public(rsa: &Rsa<openssl::pkey::Private>, signature: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; rsa.size() as usize];
        let len = rsa
            .public_encrypt(signature, &mut out, Padding::NONE)
            .expect("raw public operation");
        out.truncate(len);
        out
    }

    #[test]
    fn test_pss_openssl_verifies_our_encoding() {
        let message = b"the quick brown fox";
        for bits in KEYSZS {
            let rsa = Rsa::generate(bits).expect("keygen");
            let pkey = PKey::from_rsa(rsa.clone()).expect("pkey");
            for digest_kind in DIGESTS {
                let h_len = digest_kind.hash_len();
                let em = add_pss_padding(name(digest_kind), h_len, bits as usize, message)
                    .expect("encode");
                assert_eq!(em.len(), (bits as usize - 1).div_ceil(8));

                let signature = raw_private(&rsa, &em);

                let md = ossl_hash_equivalent(digest_kind);
                let mut verifier = Verifier::new(md, &pkey).expect("verifier");
                verifier.set_rsa_padding(Padding::PKCS1_PSS).expect("pad");
                verifier.set_rsa_mgf1_md(md).expect("mgf1");
                verifier
                    .set_rsa_pss_saltlen(RsaPssSaltlen::custom(h_len as i32))
                    .expect("salt");
                verifier.update(message).expect("update");
                assert!(verifier.verify(&signature).expect("verify"));
            }
        }
    }

    #[test]
    fn test_pss_verifies_openssl_signature() {
        let message = b"jumps over the lazy dog";
        let rsa = Rsa::generate(2048).expect("keygen");
        let pkey = PKey::from_rsa(rsa.clone()).expect("pkey");
        for digest_kind in DIGESTS {
            let h_len = digest_kind.hash_len();
            let md = ossl_hash_equivalent(digest_kind);
            let mut signer = Signer::new(md, &pkey).expect("signer");
            signer.set_rsa_padding(Padding::PKCS1_PSS).expect("pad");
            signer.set_rsa_mgf1_md(md).expect("mgf1");
            signer
                .set_rsa_pss_saltlen(RsaPssSaltlen::custom(h_len as i32))
                .expect("salt");
            signer.update(message).expect("update");
            let signature = signer.sign_to_vec().expect("sign");

            let block = raw_public(&rsa, &signature);
            let ok = verify_pss_padding(name(digest_kind), h_len, 2048, message, &block)
                .expect("verify");
            assert!(ok);

            let ok = verify_pss_padding(name(digest_kind), h_len, 2048, b"other", &block)
                .expect("verify");
            assert!(!ok);
        }
    }

    // RSA key whose modulus is one bit longer than a whole number of bytes.
    fn odd_modulus_key() -> Rsa<openssl::pkey::Private> {
        let mut ctx = BigNumContext::new().expect("bn ctx");
        let one = BigNum::from_u32(1).expect("one");
        let e = BigNum::from_u32(65537).expect("e");
        loop {
            let mut p = BigNum::new().expect("p");
            p.generate_prime(513, false, None, None).expect("prime p");
            let mut q = BigNum::new().expect("q");
            q.generate_prime(512, false, None, None).expect("prime q");

            let mut n = BigNum::new().expect("n");
            n.checked_mul(&p, &q, &mut ctx).expect("n");
            if n.num_bits() % 8 != 1 {
                continue;
            }

            let p1 = &p - &one;
            let q1 = &q - &one;
            let mut phi = BigNum::new().expect("phi");
            phi.checked_mul(&p1, &q1, &mut ctx).expect("phi");
            let mut d = BigNum::new().expect("d");
            if d.mod_inverse(&e, &phi, &mut ctx).is_err() {
                continue;
            }

            let mut dmp1 = BigNum::new().expect("dmp1");
            dmp1.nnmod(&d, &p1, &mut ctx).expect("dmp1");
            let mut dmq1 = BigNum::new().expect("dmq1");
            dmq1.nnmod(&d, &q1, &mut ctx).expect("dmq1");
            let mut iqmp = BigNum::new().expect("iqmp");
            iqmp.mod_inverse(&q, &p, &mut ctx).expect("iqmp");

            return Rsa::from_private_components(
                n,
                BigNum::from_u32(65537).expect("e"),
                d,
                p,
                q,
                dmp1,
                dmq1,
                iqmp,
            )
            .expect("rsa from components");
        }
    }

    #[test]
    fn test_pss_odd_modulus_length() {
        let rsa = odd_modulus_key();
        let bits = rsa.n().num_bits() as usize;
        assert_eq!(bits % 8, 1);
        assert_eq!(rsa.size() as usize, bits.div_ceil(8));

        // Raw output is one byte longer than the encoded block.
        let message = b"odd sized modulus";
        let em = add_pss_padding("sha256", 32, bits, message).expect("encode");
        assert_eq!(em.len(), (bits - 1) / 8);

        let signature = raw_private(&rsa, &em);
        let block = raw_public(&rsa, &signature);
        assert_eq!(block.len(), em.len() + 1);
        assert_eq!(block[0], 0);
        assert!(verify_pss_padding("sha256", 32, bits, message, &block).expect("verify"));

        let mut shifted = block.clone();
        shifted[0] = 1;
        assert!(!verify_pss_padding("sha256", 32, bits, message, &shifted).expect("verify"));
    }

    #[test]
    fn test_pss_rejects_unknown_digest() {
        assert_eq!(
            add_pss_padding("md5", 0, 2048, b"data"),
            Err(PssError::UnsupportedDigest("md5".to_string()))
        );
        assert_eq!(
            verify_pss_padding("sha3", 0, 2048, b"data", &[0u8; 256]),
            Err(PssError::UnsupportedDigest("sha3".to_string()))
        );
    }

    #[test]
    fn test_pss_key_too_short() {
        assert_eq!(
            add_pss_padding("sha512", 64, 512, b"data"),
            Err(PssError::KeyTooShort)
        );
        assert_eq!(
            add_pss_padding("sha1", 20, 256, b"data"),
            Err(PssError::InvalidParameter)
        );
    }

    #[test]
    fn test_pss_malformed_block_is_not_an_error() {
        let em = add_pss_padding("sha256", 32, 2048, b"data").expect("encode");

        let mut tampered = em.clone();
        let last = tampered.len() - 1;
        tampered[last] = 0xbd;
        assert_eq!(
            verify_pss_padding("sha256", 32, 2048, b"data", &tampered),
            Ok(false)
        );

        assert_eq!(
            verify_pss_padding("sha256", 32, 2048, b"data", &em[1..]),
            Ok(false)
        );

        let mut prefixed = vec![1u8];
        prefixed.extend_from_slice(&em);
        assert_eq!(
            verify_pss_padding("sha256", 32, 2048, b"data", &prefixed),
            Ok(false)
        );

        assert_eq!(
            verify_pss_padding("sha256", 20, 2048, b"data", &em),
            Ok(false)
        );
    }
}
