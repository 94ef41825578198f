// Copyright (C) Microsoft Corporation. All rights reserved.

use crate::test_support::*;

use super::*;

fn rsa_private_attrs() -> KeyAttributes {
    KeyAttributes {
        key_type: KeyType::Rsa,
        key_class: KeyClass::Private,
        can_sign: true,
        can_verify: true,
    }
}

#[test]
fn test_prepared_transform_runs_after_release() {
    let prepared = assert_no_leaks(|| {
        let info = crate::parse_private(&private_pem(rsa_key()), None).expect("parse RSA key");
        let key = key_create(&rsa_private_attrs(), info.unwrapped()).expect("create RSA key");
        let transform = transform_create(TransformKind::Sign, key, None).expect("sign transform");
        let input = data_create(b"detached payload").expect("data");
        transform_set_attribute(transform, Attribute::Input(input)).expect("input");

        let prepared = PreparedTransform::capture(&registry(), transform).expect("capture");
        release(input);
        release(transform);
        release(key);
        prepared
    });

    // Nothing in the registry backs the captured state any more.
    let Object::Data(signature) = prepared.run().expect("run") else {
        panic!("sign transform must produce data");
    };
    let mut verifier = Verifier::new(MessageDigest::sha1(), rsa_key()).expect("verifier");
    assert!(verifier
        .verify_oneshot(&signature, b"detached payload")
        .expect("OpenSSL verify"));
}
