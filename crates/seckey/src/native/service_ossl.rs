// Copyright (C) Microsoft Corporation. All rights reserved.

//! OpenSSL-backed security service.
//!
//! Objects live in a process-wide registry keyed by an opaque id. Each entry
//! carries a retain count. A transform retains its key, its signature and
//! every object-valued attribute, and drops them when it is freed, so callers
//! may release their own references in any order.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;
use std::sync::PoisonError;
#[cfg(test)]
use std::cell::Cell;
#[cfg(test)]
use std::thread;
#[cfg(test)]
use std::thread::ThreadId;

use openssl::ec::EcKey;
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::pkey::HasPublic;
use openssl::pkey::Id;
use openssl::pkey::PKey;
use openssl::pkey::PKeyRef;
use openssl::pkey::Private;
use openssl::pkey::Public;
use openssl::rsa::Padding;
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use openssl::sign::Verifier;
use openssl::x509::X509;

use super::Attribute;
use super::DigestType;
use super::FixedPadding;
use super::KeyAttributes;
use super::KeyClass;
use super::KeyType;
use super::NativeError;
use super::PaddingKey;
use super::TransformKind;

#[cfg(test)]
mod tests;

/// Opaque reference to a registry object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct RegistryRef(u64);

#[derive(Clone)]
enum KeyMaterial {
    Private(PKey<Private>),
    Public(PKey<Public>),
}

#[derive(Clone)]
struct KeyObject {
    material: KeyMaterial,
    can_sign: bool,
    can_verify: bool,
}

impl KeyObject {
    fn id(&self) -> Id {
        match &self.material {
            KeyMaterial::Private(pkey) => pkey.id(),
            KeyMaterial::Public(pkey) => pkey.id(),
        }
    }
}

struct TransformObject {
    kind: TransformKind,
    key: RegistryRef,
    signature: Option<RegistryRef>,
    digest_type: Option<DigestType>,
    digest_length: Option<RegistryRef>,
    padding: Option<PaddingKey>,
    input: Option<RegistryRef>,
}

impl TransformObject {
    fn retained(&self) -> impl Iterator<Item = RegistryRef> {
        [
            Some(self.key),
            self.signature,
            self.digest_length,
            self.input,
        ]
        .into_iter()
        .flatten()
    }
}

enum Object {
    Certificate(X509),
    Key(KeyObject),
    Data(Vec<u8>),
    Number(i64),
    Boolean(bool),
    Transform(TransformObject),
}

struct Entry {
    object: Object,
    retain_count: usize,
    #[cfg(test)]
    creator: ThreadId,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: HashMap<u64, Entry>,
}

fn registry() -> MutexGuard<'static, Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY
        .get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

impl Registry {
    fn insert(&mut self, object: Object) -> RegistryRef {
        #[cfg(test)]
        CREATED.with(|created| created.set(created.get() + 1));
        self.next_id += 1;
        self.entries.insert(
            self.next_id,
            Entry {
                object,
                retain_count: 1,
                #[cfg(test)]
                creator: thread::current().id(),
            },
        );
        RegistryRef(self.next_id)
    }

    fn object(&self, object: RegistryRef) -> Result<&Object, NativeError> {
        self.entries
            .get(&object.0)
            .map(|entry| &entry.object)
            .ok_or_else(|| NativeError::new(NativeError::PARAM, "unknown object reference"))
    }

    fn retain(&mut self, object: RegistryRef) -> Result<(), NativeError> {
        let entry = self
            .entries
            .get_mut(&object.0)
            .ok_or_else(|| NativeError::new(NativeError::PARAM, "unknown object reference"))?;
        entry.retain_count += 1;
        Ok(())
    }

    fn release(&mut self, object: RegistryRef) {
        let Some(entry) = self.entries.get_mut(&object.0) else {
            tracing::error!(id = object.0, "release of an unknown or freed object");
            debug_assert!(false, "release of an unknown or freed object");
            return;
        };

        entry.retain_count -= 1;
        if entry.retain_count > 0 {
            return;
        }

        if let Some(Entry {
            object: Object::Transform(transform),
            ..
        }) = self.entries.remove(&object.0)
        {
            for child in transform.retained() {
                self.release(child);
            }
        }
    }

    fn key(&self, key: RegistryRef) -> Result<&KeyObject, NativeError> {
        match self.object(key)? {
            Object::Key(key) => Ok(key),
            _ => Err(NativeError::from_status(NativeError::INVALID_KEY_REF)),
        }
    }

    fn data(&self, data: RegistryRef) -> Result<&[u8], NativeError> {
        match self.object(data)? {
            Object::Data(bytes) => Ok(bytes),
            _ => Err(NativeError::new(NativeError::PARAM, "object is not a data object")),
        }
    }

    fn number(&self, number: RegistryRef) -> Result<i64, NativeError> {
        match self.object(number)? {
            Object::Number(value) => Ok(*value),
            _ => Err(NativeError::new(NativeError::PARAM, "object is not a number")),
        }
    }

    fn transform(&self, transform: RegistryRef) -> Result<&TransformObject, NativeError> {
        match self.object(transform)? {
            Object::Transform(transform) => Ok(transform),
            _ => Err(NativeError::new(NativeError::PARAM, "object is not a transform")),
        }
    }

    fn transform_mut(
        &mut self,
        transform: RegistryRef,
    ) -> Result<&mut TransformObject, NativeError> {
        match self.entries.get_mut(&transform.0).map(|entry| &mut entry.object) {
            Some(Object::Transform(transform)) => Ok(transform),
            _ => Err(NativeError::new(NativeError::PARAM, "object is not a transform")),
        }
    }
}

fn decode_error(what: &str, err: ErrorStack) -> NativeError {
    tracing::error!("failed to decode {}: {}", what, err);
    NativeError::from_status(NativeError::DECODE)
}

fn operation_error(err: ErrorStack) -> NativeError {
    NativeError::new(NativeError::PARAM, err.to_string())
}

pub(crate) fn certificate_create(der: &[u8]) -> Result<RegistryRef, NativeError> {
    let cert = X509::from_der(der).map_err(|e| decode_error("certificate", e))?;
    Ok(registry().insert(Object::Certificate(cert)))
}

pub(crate) fn certificate_copy_public_key(cert: RegistryRef) -> Result<RegistryRef, NativeError> {
    let mut reg = registry();
    let pkey = match reg.object(cert)? {
        Object::Certificate(cert) => cert
            .public_key()
            .map_err(|e| decode_error("certificate public key", e))?,
        _ => return Err(NativeError::new(NativeError::PARAM, "object is not a certificate")),
    };
    Ok(reg.insert(Object::Key(KeyObject {
        material: KeyMaterial::Public(pkey),
        can_sign: false,
        can_verify: true,
    })))
}

fn private_key_from_der(key_type: KeyType, der: &[u8]) -> Result<PKey<Private>, ErrorStack> {
    match key_type {
        KeyType::Rsa => PKey::from_rsa(Rsa::private_key_from_der(der)?),
        // Traditional DSAPrivateKey DER is picked up by the generic decoder.
        KeyType::Dsa => PKey::private_key_from_der(der),
        KeyType::Ecdsa => PKey::from_ec_key(EcKey::private_key_from_der(der)?),
    }
}

pub(crate) fn key_create(attrs: &KeyAttributes, der: &[u8]) -> Result<RegistryRef, NativeError> {
    let material = match attrs.key_class {
        KeyClass::Private => KeyMaterial::Private(
            private_key_from_der(attrs.key_type, der).map_err(|e| decode_error("private key", e))?,
        ),
        KeyClass::Public => KeyMaterial::Public(
            PKey::public_key_from_der(der).map_err(|e| decode_error("public key", e))?,
        ),
    };
    let key = KeyObject {
        material,
        can_sign: attrs.can_sign,
        can_verify: attrs.can_verify,
    };

    let expected = match attrs.key_type {
        KeyType::Rsa => Id::RSA,
        KeyType::Dsa => Id::DSA,
        KeyType::Ecdsa => Id::EC,
    };
    if key.id() != expected {
        return Err(NativeError::new(
            NativeError::PARAM,
            "key data does not match the requested key type",
        ));
    }

    Ok(registry().insert(Object::Key(key)))
}

fn rsa_padding(padding: Option<PaddingKey>) -> Padding {
    match padding {
        Some(PaddingKey::None) => Padding::NONE,
        Some(PaddingKey::Pkcs1) | None => Padding::PKCS1,
        Some(PaddingKey::Oaep) => Padding::PKCS1_OAEP,
    }
}

fn fixed_padding(padding: FixedPadding) -> Padding {
    match padding {
        FixedPadding::Pkcs1 => Padding::PKCS1,
    }
}

// Unpadded input must be exactly one modulus long.
fn fit_raw_input(
    input: &[u8],
    size: usize,
    padding: Padding,
) -> Result<Cow<'_, [u8]>, NativeError> {
    if padding != Padding::NONE || input.len() == size {
        return Ok(Cow::Borrowed(input));
    }
    if input.len() > size {
        return Err(NativeError::new(
            NativeError::PARAM,
            "input is longer than the key modulus",
        ));
    }
    let mut block = vec![0u8; size - input.len()];
    block.extend_from_slice(input);
    Ok(Cow::Owned(block))
}

fn rsa_of<T>(pkey: &PKeyRef<T>) -> Result<Rsa<T>, NativeError> {
    pkey.rsa()
        .map_err(|_| NativeError::new(NativeError::INVALID_KEY_REF, "key is not an RSA key"))
}

fn rsa_public_encrypt<T: HasPublic>(
    rsa: &Rsa<T>,
    padding: Padding,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, NativeError> {
    let size = rsa.size() as usize;
    if output.len() < size {
        return Err(NativeError::from_status(NativeError::BUFFER_TOO_SMALL));
    }
    let input = fit_raw_input(input, size, padding)?;
    rsa.public_encrypt(&input, output, padding)
        .map_err(operation_error)
}

fn rsa_private_decrypt(
    key: &KeyObject,
    padding: Padding,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, NativeError> {
    let KeyMaterial::Private(pkey) = &key.material else {
        return Err(NativeError::new(
            NativeError::INVALID_KEY_REF,
            "decryption requires a private key",
        ));
    };
    let rsa = rsa_of(pkey)?;
    let size = rsa.size() as usize;
    if output.len() < size {
        return Err(NativeError::from_status(NativeError::BUFFER_TOO_SMALL));
    }
    let input = fit_raw_input(input, size, padding)?;
    rsa.private_decrypt(&input, output, padding)
        .map_err(operation_error)
}

fn encrypt_with(
    key: &KeyObject,
    padding: Padding,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, NativeError> {
    match &key.material {
        KeyMaterial::Private(pkey) => rsa_public_encrypt(&rsa_of(pkey)?, padding, input, output),
        KeyMaterial::Public(pkey) => rsa_public_encrypt(&rsa_of(pkey)?, padding, input, output),
    }
}

fn key_size(key: &KeyObject) -> usize {
    match &key.material {
        KeyMaterial::Private(pkey) => pkey.size(),
        KeyMaterial::Public(pkey) => pkey.size(),
    }
}

pub(crate) fn key_encrypt(
    key: RegistryRef,
    padding: FixedPadding,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, NativeError> {
    let key = registry().key(key)?.clone();
    encrypt_with(&key, fixed_padding(padding), input, output)
}

pub(crate) fn key_decrypt(
    key: RegistryRef,
    padding: FixedPadding,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, NativeError> {
    let key = registry().key(key)?.clone();
    rsa_private_decrypt(&key, fixed_padding(padding), input, output)
}

pub(crate) fn data_create(bytes: &[u8]) -> Result<RegistryRef, NativeError> {
    Ok(registry().insert(Object::Data(bytes.to_vec())))
}

pub(crate) fn number_create(value: i32) -> Result<RegistryRef, NativeError> {
    Ok(registry().insert(Object::Number(value.into())))
}

pub(crate) fn transform_create(
    kind: TransformKind,
    key: RegistryRef,
    signature: Option<RegistryRef>,
) -> Result<RegistryRef, NativeError> {
    let mut reg = registry();
    let key_object = reg.key(key)?;
    let is_private = matches!(key_object.material, KeyMaterial::Private(_));
    if matches!(kind, TransformKind::Sign | TransformKind::Decrypt) && !is_private {
        return Err(NativeError::new(
            NativeError::INVALID_KEY_REF,
            "transform requires a private key",
        ));
    }

    let signature = match kind {
        TransformKind::Verify => {
            let signature = signature.ok_or_else(|| {
                NativeError::new(NativeError::PARAM, "verify transform requires a signature")
            })?;
            reg.data(signature)?;
            Some(signature)
        }
        _ => None,
    };

    reg.retain(key)?;
    if let Some(signature) = signature {
        reg.retain(signature)?;
    }

    Ok(reg.insert(Object::Transform(TransformObject {
        kind,
        key,
        signature,
        digest_type: None,
        digest_length: None,
        padding: None,
        input: None,
    })))
}

pub(crate) fn transform_set_attribute(
    transform: RegistryRef,
    attribute: Attribute,
) -> Result<(), NativeError> {
    let mut reg = registry();

    let replaced = match attribute {
        Attribute::DigestType(digest_type) => {
            reg.transform_mut(transform)?.digest_type = Some(digest_type);
            None
        }
        Attribute::Padding(padding) => {
            let key = reg.transform(transform)?.key;
            if padding != PaddingKey::None && reg.key(key)?.id() != Id::RSA {
                return Err(NativeError::new(
                    NativeError::PARAM,
                    "padding is only defined for RSA keys",
                ));
            }
            reg.transform_mut(transform)?.padding = Some(padding);
            None
        }
        Attribute::DigestLength(number) => {
            reg.transform(transform)?;
            reg.number(number)?;
            reg.retain(number)?;
            reg.transform_mut(transform)?.digest_length.replace(number)
        }
        Attribute::Input(data) => {
            reg.transform(transform)?;
            reg.data(data)?;
            reg.retain(data)?;
            reg.transform_mut(transform)?.input.replace(data)
        }
    };

    if let Some(previous) = replaced {
        reg.release(previous);
    }
    Ok(())
}

fn message_digest(
    reg: &Registry,
    transform: &TransformObject,
) -> Result<MessageDigest, NativeError> {
    let length = transform
        .digest_length
        .map(|number| reg.number(number))
        .transpose()?;

    match (transform.digest_type.unwrap_or(DigestType::Sha1), length) {
        (DigestType::Md5, _) => Ok(MessageDigest::md5()),
        (DigestType::Sha1, _) => Ok(MessageDigest::sha1()),
        (DigestType::Sha2, Some(224)) => Ok(MessageDigest::sha224()),
        (DigestType::Sha2, Some(256)) => Ok(MessageDigest::sha256()),
        (DigestType::Sha2, Some(384)) => Ok(MessageDigest::sha384()),
        (DigestType::Sha2, Some(512) | None) => Ok(MessageDigest::sha512()),
        (DigestType::Sha2, Some(other)) => Err(NativeError::new(
            NativeError::PARAM,
            format!("unsupported SHA-2 digest length {other}"),
        )),
    }
}

fn signature_padding(id: Id, padding: Option<PaddingKey>) -> Result<Option<Padding>, NativeError> {
    match (id, padding) {
        (Id::RSA, Some(PaddingKey::Pkcs1) | None) => Ok(Some(Padding::PKCS1)),
        (Id::RSA, Some(_)) => Err(NativeError::from_status(NativeError::UNIMPLEMENTED)),
        (_, None) => Ok(None),
        (_, Some(_)) => Err(NativeError::new(
            NativeError::PARAM,
            "padding is only defined for RSA keys",
        )),
    }
}

fn sign(
    key: &KeyObject,
    md: MessageDigest,
    padding: Option<PaddingKey>,
    input: &[u8],
) -> Result<Vec<u8>, NativeError> {
    if !key.can_sign {
        return Err(NativeError::new(NativeError::PARAM, "key is not usable for signing"));
    }
    let KeyMaterial::Private(pkey) = &key.material else {
        return Err(NativeError::from_status(NativeError::INVALID_KEY_REF));
    };

    let mut signer = Signer::new(md, pkey).map_err(operation_error)?;
    if let Some(padding) = signature_padding(pkey.id(), padding)? {
        signer.set_rsa_padding(padding).map_err(operation_error)?;
    }
    signer.update(input).map_err(operation_error)?;
    signer.sign_to_vec().map_err(operation_error)
}

fn verify_with<T: HasPublic>(
    pkey: &PKeyRef<T>,
    md: MessageDigest,
    padding: Option<PaddingKey>,
    input: &[u8],
    signature: &[u8],
) -> Result<bool, NativeError> {
    let mut verifier = Verifier::new(md, pkey).map_err(operation_error)?;
    if let Some(padding) = signature_padding(pkey.id(), padding)? {
        verifier.set_rsa_padding(padding).map_err(operation_error)?;
    }
    verifier.update(input).map_err(operation_error)?;

    // A malformed signature is an invalid one.
    Ok(verifier.verify(signature).unwrap_or(false))
}

fn verify(
    key: &KeyObject,
    md: MessageDigest,
    padding: Option<PaddingKey>,
    input: &[u8],
    signature: &[u8],
) -> Result<bool, NativeError> {
    if !key.can_verify {
        return Err(NativeError::new(NativeError::PARAM, "key is not usable for verification"));
    }
    match &key.material {
        KeyMaterial::Private(pkey) => verify_with(pkey, md, padding, input, signature),
        KeyMaterial::Public(pkey) => verify_with(pkey, md, padding, input, signature),
    }
}

// Transform state copied out of the registry. Running it takes no lock.
struct PreparedTransform {
    kind: TransformKind,
    key: KeyObject,
    padding: Option<PaddingKey>,
    digest: Option<MessageDigest>,
    input: Vec<u8>,
    signature: Option<Vec<u8>>,
}

impl PreparedTransform {
    fn capture(reg: &Registry, transform: RegistryRef) -> Result<Self, NativeError> {
        let transform = reg.transform(transform)?;
        let input = transform
            .input
            .ok_or_else(|| NativeError::new(NativeError::PARAM, "transform input is not set"))?;

        let (digest, signature) = match transform.kind {
            TransformKind::Encrypt | TransformKind::Decrypt => (None, None),
            TransformKind::Sign => (Some(message_digest(reg, transform)?), None),
            TransformKind::Verify => {
                let signature = transform
                    .signature
                    .ok_or_else(|| NativeError::from_status(NativeError::PARAM))?;
                (
                    Some(message_digest(reg, transform)?),
                    Some(reg.data(signature)?.to_vec()),
                )
            }
        };

        Ok(Self {
            kind: transform.kind,
            key: reg.key(transform.key)?.clone(),
            padding: transform.padding,
            digest,
            input: reg.data(input)?.to_vec(),
            signature,
        })
    }

    fn run(self) -> Result<Object, NativeError> {
        let missing = || NativeError::from_status(NativeError::PARAM);
        match self.kind {
            TransformKind::Encrypt => {
                let mut output = vec![0u8; key_size(&self.key)];
                let padding = rsa_padding(self.padding);
                let len = encrypt_with(&self.key, padding, &self.input, &mut output)?;
                output.truncate(len);
                Ok(Object::Data(output))
            }
            TransformKind::Decrypt => {
                let mut output = vec![0u8; key_size(&self.key)];
                let padding = rsa_padding(self.padding);
                let len = rsa_private_decrypt(&self.key, padding, &self.input, &mut output)?;
                output.truncate(len);
                Ok(Object::Data(output))
            }
            TransformKind::Sign => {
                let md = self.digest.ok_or_else(missing)?;
                Ok(Object::Data(sign(&self.key, md, self.padding, &self.input)?))
            }
            TransformKind::Verify => {
                let md = self.digest.ok_or_else(missing)?;
                let signature = self.signature.as_deref().ok_or_else(missing)?;
                let valid = verify(&self.key, md, self.padding, &self.input, signature)?;
                Ok(Object::Boolean(valid))
            }
        }
    }
}

pub(crate) fn transform_execute(transform: RegistryRef) -> Result<RegistryRef, NativeError> {
    let prepared = PreparedTransform::capture(&registry(), transform)?;
    let output = prepared.run()?;
    Ok(registry().insert(output))
}

pub(crate) fn data_bytes(data: RegistryRef) -> Result<Vec<u8>, NativeError> {
    registry().data(data).map(<[u8]>::to_vec)
}

pub(crate) fn boolean_value(value: RegistryRef) -> Result<bool, NativeError> {
    match registry().object(value)? {
        Object::Boolean(value) => Ok(*value),
        _ => Err(NativeError::new(NativeError::PARAM, "object is not a boolean")),
    }
}

pub(crate) fn release(object: RegistryRef) {
    registry().release(object);
}

#[cfg(test)]
thread_local! {
    static CREATED: Cell<usize> = const { Cell::new(0) };
}

/// Number of objects the calling thread has ever created.
#[cfg(test)]
pub(crate) fn created_objects() -> usize {
    CREATED.with(Cell::get)
}

/// Number of live objects created by the calling thread.
#[cfg(test)]
pub(crate) fn live_objects() -> usize {
    let current = thread::current().id();
    registry()
        .entries
        .values()
        .filter(|entry| entry.creator == current)
        .count()
}
