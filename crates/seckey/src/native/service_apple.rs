// Copyright (C) Microsoft Corporation. All rights reserved.

//! Security.framework backend.
//!
//! Declares the small slice of Security.framework and CoreFoundation that the
//! crate drives. Every `Create`/`Copy` result is owned by the caller and
//! released with `CFRelease`.

use std::ffi::c_char;
use std::ffi::c_void;
use std::ptr;

use super::Attribute;
use super::DigestType;
use super::FixedPadding;
use super::KeyAttributes;
use super::KeyClass;
use super::KeyType;
use super::NativeError;
use super::PaddingKey;
use super::TransformKind;

type CFTypeRef = *const c_void;
type CFAllocatorRef = *const c_void;
type CFDataRef = *const c_void;
type CFDictionaryRef = *const c_void;
type CFStringRef = *const c_void;
type CFNumberRef = *const c_void;
type CFBooleanRef = *const c_void;
type CFErrorRef = *mut c_void;
type CFIndex = isize;
type CFNumberType = CFIndex;
type CFStringEncoding = u32;
type Boolean = u8;
type OSStatus = i32;
type SecKeyRef = *const c_void;
type SecCertificateRef = *const c_void;
type SecTransformRef = *const c_void;
type SecPadding = u32;

const K_CF_NUMBER_SINT32_TYPE: CFNumberType = 3;
const K_CF_STRING_ENCODING_UTF8: CFStringEncoding = 0x0800_0100;
const K_SEC_PADDING_PKCS1: SecPadding = 1;
const ERR_SEC_SUCCESS: OSStatus = 0;

#[repr(C)]
struct CFDictionaryCallBacks {
    _opaque: [u8; 0],
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    static kCFAllocatorDefault: CFAllocatorRef;
    static kCFBooleanTrue: CFBooleanRef;
    static kCFBooleanFalse: CFBooleanRef;
    static kCFTypeDictionaryKeyCallBacks: CFDictionaryCallBacks;
    static kCFTypeDictionaryValueCallBacks: CFDictionaryCallBacks;

    fn CFRelease(cf: CFTypeRef);
    fn CFDataCreate(allocator: CFAllocatorRef, bytes: *const u8, length: CFIndex) -> CFDataRef;
    fn CFDataGetLength(data: CFDataRef) -> CFIndex;
    fn CFDataGetBytePtr(data: CFDataRef) -> *const u8;
    fn CFDictionaryCreate(
        allocator: CFAllocatorRef,
        keys: *const *const c_void,
        values: *const *const c_void,
        num_values: CFIndex,
        key_callbacks: *const CFDictionaryCallBacks,
        value_callbacks: *const CFDictionaryCallBacks,
    ) -> CFDictionaryRef;
    fn CFNumberCreate(
        allocator: CFAllocatorRef,
        number_type: CFNumberType,
        value: *const c_void,
    ) -> CFNumberRef;
    fn CFBooleanGetValue(boolean: CFBooleanRef) -> Boolean;
    fn CFErrorGetCode(err: CFErrorRef) -> CFIndex;
    fn CFErrorCopyDescription(err: CFErrorRef) -> CFStringRef;
    fn CFStringGetLength(string: CFStringRef) -> CFIndex;
    fn CFStringGetMaximumSizeForEncoding(length: CFIndex, encoding: CFStringEncoding) -> CFIndex;
    fn CFStringGetCString(
        string: CFStringRef,
        buffer: *mut c_char,
        buffer_size: CFIndex,
        encoding: CFStringEncoding,
    ) -> Boolean;
}

#[link(name = "Security", kind = "framework")]
extern "C" {
    static kSecAttrKeyType: CFStringRef;
    static kSecAttrKeyTypeRSA: CFStringRef;
    static kSecAttrKeyTypeDSA: CFStringRef;
    static kSecAttrKeyTypeECDSA: CFStringRef;
    static kSecAttrKeyClass: CFStringRef;
    static kSecAttrKeyClassPublic: CFStringRef;
    static kSecAttrKeyClassPrivate: CFStringRef;
    static kSecAttrCanSign: CFStringRef;
    static kSecAttrCanVerify: CFStringRef;

    static kSecTransformInputAttributeName: CFStringRef;
    static kSecPaddingKey: CFStringRef;
    static kSecPaddingNoneKey: CFStringRef;
    static kSecPaddingPKCS1Key: CFStringRef;
    static kSecPaddingOAEPKey: CFStringRef;
    static kSecDigestTypeAttribute: CFStringRef;
    static kSecDigestLengthAttribute: CFStringRef;
    static kSecDigestMD5: CFStringRef;
    static kSecDigestSHA1: CFStringRef;
    static kSecDigestSHA2: CFStringRef;

    fn SecCertificateCreateWithData(
        allocator: CFAllocatorRef,
        data: CFDataRef,
    ) -> SecCertificateRef;
    fn SecCertificateCopyPublicKey(certificate: SecCertificateRef, key: *mut SecKeyRef) -> OSStatus;
    fn SecKeyCreateFromData(
        parameters: CFDictionaryRef,
        key_data: CFDataRef,
        error: *mut CFErrorRef,
    ) -> SecKeyRef;
    fn SecKeyEncrypt(
        key: SecKeyRef,
        padding: SecPadding,
        plain_text: *const u8,
        plain_text_len: usize,
        cipher_text: *mut u8,
        cipher_text_len: *mut usize,
    ) -> OSStatus;
    fn SecKeyDecrypt(
        key: SecKeyRef,
        padding: SecPadding,
        cipher_text: *const u8,
        cipher_text_len: usize,
        plain_text: *mut u8,
        plain_text_len: *mut usize,
    ) -> OSStatus;
    fn SecEncryptTransformCreate(key: SecKeyRef, error: *mut CFErrorRef) -> SecTransformRef;
    fn SecDecryptTransformCreate(key: SecKeyRef, error: *mut CFErrorRef) -> SecTransformRef;
    fn SecSignTransformCreate(key: SecKeyRef, error: *mut CFErrorRef) -> SecTransformRef;
    fn SecVerifyTransformCreate(
        key: SecKeyRef,
        signature: CFDataRef,
        error: *mut CFErrorRef,
    ) -> SecTransformRef;
    fn SecTransformSetAttribute(
        transform: SecTransformRef,
        key: CFStringRef,
        value: CFTypeRef,
        error: *mut CFErrorRef,
    ) -> Boolean;
    fn SecTransformExecute(transform: SecTransformRef, error: *mut CFErrorRef) -> CFTypeRef;
    fn SecCopyErrorMessageString(status: OSStatus, reserved: *mut c_void) -> CFStringRef;
}

/// Owned CoreFoundation reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct AppleRef(CFTypeRef);

// SAFETY: CoreFoundation reference counting is thread safe and the crate
// never mutates a shared object from two threads.
#[allow(unsafe_code)]
unsafe impl Send for AppleRef {}
#[allow(unsafe_code)]
unsafe impl Sync for AppleRef {}

/// Releases a temporary object at end of scope.
struct Owned(CFTypeRef);

impl Drop for Owned {
    #[allow(unsafe_code)]
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer came from a Create/Copy call and is released once.
            unsafe { CFRelease(self.0) };
        }
    }
}

#[allow(unsafe_code)]
fn string_to_owned(string: CFStringRef) -> Option<String> {
    if string.is_null() {
        return None;
    }
    let _guard = Owned(string);
    // SAFETY: `string` is a valid CFString for the duration of this call.
    unsafe {
        let length = CFStringGetLength(string);
        let capacity = CFStringGetMaximumSizeForEncoding(length, K_CF_STRING_ENCODING_UTF8) + 1;
        let mut buffer = vec![0u8; usize::try_from(capacity).ok()?];
        if CFStringGetCString(
            string,
            buffer.as_mut_ptr().cast(),
            capacity,
            K_CF_STRING_ENCODING_UTF8,
        ) == 0
        {
            return None;
        }
        let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
        buffer.truncate(end);
        String::from_utf8(buffer).ok()
    }
}

#[allow(unsafe_code)]
fn status_error(status: OSStatus) -> NativeError {
    // SAFETY: SecCopyErrorMessageString accepts any status and a null reserved pointer.
    let message = string_to_owned(unsafe { SecCopyErrorMessageString(status, ptr::null_mut()) });
    match message {
        Some(message) => NativeError::new(status.into(), message),
        None => NativeError::from_status(status.into()),
    }
}

#[allow(unsafe_code)]
fn cf_error(error: CFErrorRef) -> NativeError {
    let _guard = Owned(error);
    // SAFETY: `error` is a valid CFError returned through an out-parameter.
    let (code, description) = unsafe { (CFErrorGetCode(error), CFErrorCopyDescription(error)) };
    NativeError::new(
        code as i64,
        string_to_owned(description).unwrap_or_else(|| "unknown CFError".to_string()),
    )
}

// Checks the error out-parameter and the returned object of a Create call.
fn created(object: CFTypeRef, error: CFErrorRef, what: &str) -> Result<AppleRef, NativeError> {
    if !error.is_null() {
        if !object.is_null() {
            drop(Owned(object));
        }
        return Err(cf_error(error));
    }
    if object.is_null() {
        return Err(NativeError::new(NativeError::PARAM, format!("{what} returned no object")));
    }
    Ok(AppleRef(object))
}

#[allow(unsafe_code)]
fn cf_data(bytes: &[u8]) -> Result<Owned, NativeError> {
    // SAFETY: the pointer/length pair describes `bytes`, which CFDataCreate copies.
    let data = unsafe { CFDataCreate(kCFAllocatorDefault, bytes.as_ptr(), bytes.len() as CFIndex) };
    if data.is_null() {
        return Err(NativeError::new(NativeError::PARAM, "CFDataCreate failed"));
    }
    Ok(Owned(data))
}

#[allow(unsafe_code)]
pub(crate) fn certificate_create(der: &[u8]) -> Result<AppleRef, NativeError> {
    let data = cf_data(der)?;
    // SAFETY: `data` is a live CFData.
    let cert = unsafe { SecCertificateCreateWithData(kCFAllocatorDefault, data.0) };
    if cert.is_null() {
        return Err(NativeError::from_status(NativeError::DECODE));
    }
    Ok(AppleRef(cert))
}

#[allow(unsafe_code)]
pub(crate) fn certificate_copy_public_key(cert: AppleRef) -> Result<AppleRef, NativeError> {
    let mut key: SecKeyRef = ptr::null();
    // SAFETY: `cert` is a live SecCertificate and `key` a valid out-pointer.
    let status = unsafe { SecCertificateCopyPublicKey(cert.0, &mut key) };
    if status != ERR_SEC_SUCCESS {
        return Err(status_error(status));
    }
    created(key, ptr::null_mut(), "SecCertificateCopyPublicKey")
}

#[allow(unsafe_code)]
pub(crate) fn key_create(attrs: &KeyAttributes, der: &[u8]) -> Result<AppleRef, NativeError> {
    // SAFETY: reading immutable framework constants.
    let dictionary = unsafe {
        let key_type = match attrs.key_type {
            KeyType::Rsa => kSecAttrKeyTypeRSA,
            KeyType::Dsa => kSecAttrKeyTypeDSA,
            KeyType::Ecdsa => kSecAttrKeyTypeECDSA,
        };
        let key_class = match attrs.key_class {
            KeyClass::Public => kSecAttrKeyClassPublic,
            KeyClass::Private => kSecAttrKeyClassPrivate,
        };
        let flag = |value: bool| if value { kCFBooleanTrue } else { kCFBooleanFalse };

        let keys = [kSecAttrKeyType, kSecAttrKeyClass, kSecAttrCanSign, kSecAttrCanVerify];
        let values = [key_type, key_class, flag(attrs.can_sign), flag(attrs.can_verify)];
        Owned(CFDictionaryCreate(
            kCFAllocatorDefault,
            keys.as_ptr(),
            values.as_ptr(),
            keys.len() as CFIndex,
            &kCFTypeDictionaryKeyCallBacks,
            &kCFTypeDictionaryValueCallBacks,
        ))
    };
    if dictionary.0.is_null() {
        return Err(NativeError::new(NativeError::PARAM, "CFDictionaryCreate failed"));
    }

    let data = cf_data(der)?;
    let mut error: CFErrorRef = ptr::null_mut();
    // SAFETY: dictionary and data are live; `error` is a valid out-pointer.
    let key = unsafe { SecKeyCreateFromData(dictionary.0, data.0, &mut error) };
    created(key, error, "SecKeyCreateFromData")
}

fn sec_padding(padding: FixedPadding) -> SecPadding {
    match padding {
        FixedPadding::Pkcs1 => K_SEC_PADDING_PKCS1,
    }
}

#[allow(unsafe_code)]
pub(crate) fn key_encrypt(
    key: AppleRef,
    padding: FixedPadding,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, NativeError> {
    let mut written = output.len();
    // SAFETY: both buffers are valid for their lengths; `written` is in/out.
    let status = unsafe {
        SecKeyEncrypt(
            key.0,
            sec_padding(padding),
            input.as_ptr(),
            input.len(),
            output.as_mut_ptr(),
            &mut written,
        )
    };
    if status != ERR_SEC_SUCCESS {
        return Err(status_error(status));
    }
    Ok(written)
}

#[allow(unsafe_code)]
pub(crate) fn key_decrypt(
    key: AppleRef,
    padding: FixedPadding,
    input: &[u8],
    output: &mut [u8],
) -> Result<usize, NativeError> {
    let mut written = output.len();
    // SAFETY: both buffers are valid for their lengths; `written` is in/out.
    let status = unsafe {
        SecKeyDecrypt(
            key.0,
            sec_padding(padding),
            input.as_ptr(),
            input.len(),
            output.as_mut_ptr(),
            &mut written,
        )
    };
    if status != ERR_SEC_SUCCESS {
        return Err(status_error(status));
    }
    Ok(written)
}

pub(crate) fn data_create(bytes: &[u8]) -> Result<AppleRef, NativeError> {
    let data = cf_data(bytes)?;
    let object = AppleRef(data.0);
    std::mem::forget(data);
    Ok(object)
}

#[allow(unsafe_code)]
pub(crate) fn number_create(value: i32) -> Result<AppleRef, NativeError> {
    // SAFETY: `value` outlives the call and matches kCFNumberSInt32Type.
    let number = unsafe {
        CFNumberCreate(
            kCFAllocatorDefault,
            K_CF_NUMBER_SINT32_TYPE,
            (&value as *const i32).cast(),
        )
    };
    created(number, ptr::null_mut(), "CFNumberCreate")
}

#[allow(unsafe_code)]
pub(crate) fn transform_create(
    kind: TransformKind,
    key: AppleRef,
    signature: Option<AppleRef>,
) -> Result<AppleRef, NativeError> {
    let mut error: CFErrorRef = ptr::null_mut();
    // SAFETY: `key` and `signature` are live objects; `error` is a valid out-pointer.
    let transform = unsafe {
        match kind {
            TransformKind::Encrypt => SecEncryptTransformCreate(key.0, &mut error),
            TransformKind::Decrypt => SecDecryptTransformCreate(key.0, &mut error),
            TransformKind::Sign => SecSignTransformCreate(key.0, &mut error),
            TransformKind::Verify => {
                let Some(signature) = signature else {
                    return Err(NativeError::new(
                        NativeError::PARAM,
                        "verify transform requires a signature",
                    ));
                };
                SecVerifyTransformCreate(key.0, signature.0, &mut error)
            }
        }
    };
    created(transform, error, "transform create")
}

#[allow(unsafe_code)]
pub(crate) fn transform_set_attribute(
    transform: AppleRef,
    attribute: Attribute,
) -> Result<(), NativeError> {
    // SAFETY: reading immutable framework constants.
    let (name, value) = unsafe {
        match attribute {
            Attribute::DigestType(digest) => (
                kSecDigestTypeAttribute,
                match digest {
                    DigestType::Md5 => kSecDigestMD5,
                    DigestType::Sha1 => kSecDigestSHA1,
                    DigestType::Sha2 => kSecDigestSHA2,
                },
            ),
            Attribute::DigestLength(number) => (kSecDigestLengthAttribute, number.0),
            Attribute::Padding(padding) => (
                kSecPaddingKey,
                match padding {
                    PaddingKey::None => kSecPaddingNoneKey,
                    PaddingKey::Pkcs1 => kSecPaddingPKCS1Key,
                    PaddingKey::Oaep => kSecPaddingOAEPKey,
                },
            ),
            Attribute::Input(data) => (kSecTransformInputAttributeName, data.0),
        }
    };

    let mut error: CFErrorRef = ptr::null_mut();
    // SAFETY: transform, name and value are live objects; `error` is a valid out-pointer.
    let ok = unsafe { SecTransformSetAttribute(transform.0, name, value, &mut error) };
    if !error.is_null() {
        return Err(cf_error(error));
    }
    if ok == 0 {
        return Err(NativeError::new(NativeError::PARAM, "SecTransformSetAttribute failed"));
    }
    Ok(())
}

#[allow(unsafe_code)]
pub(crate) fn transform_execute(transform: AppleRef) -> Result<AppleRef, NativeError> {
    let mut error: CFErrorRef = ptr::null_mut();
    // SAFETY: `transform` is a live, configured transform.
    let output = unsafe { SecTransformExecute(transform.0, &mut error) };
    created(output, error, "SecTransformExecute")
}

#[allow(unsafe_code)]
pub(crate) fn data_bytes(data: AppleRef) -> Result<Vec<u8>, NativeError> {
    // SAFETY: `data` is a live CFData; the byte pointer is valid for its length.
    unsafe {
        let len = usize::try_from(CFDataGetLength(data.0))
            .map_err(|_| NativeError::from_status(NativeError::PARAM))?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let bytes = CFDataGetBytePtr(data.0);
        if bytes.is_null() {
            return Err(NativeError::from_status(NativeError::PARAM));
        }
        Ok(std::slice::from_raw_parts(bytes, len).to_vec())
    }
}

#[allow(unsafe_code)]
pub(crate) fn boolean_value(value: AppleRef) -> Result<bool, NativeError> {
    // SAFETY: `value` is a live CFBoolean returned by a verify transform.
    Ok(unsafe { CFBooleanGetValue(value.0) } != 0)
}

#[allow(unsafe_code)]
pub(crate) fn release(object: AppleRef) {
    if !object.0.is_null() {
        // SAFETY: each owned reference is released exactly once by its holder.
        unsafe { CFRelease(object.0) };
    }
}
