use num_bigint::{BigInt, BigUint};
use proptest::prelude::*;
use unity_ledger::{
    decode, encode, hash_to_field, mod_inverse, mod_pow, FieldParams, Ntru, Pattern, Timestamp,
    TypedArray, Value,
};

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        "\\PC{0,12}".prop_map(Value::Text),
        any::<i128>().prop_map(|n| Value::Integer(BigInt::from(n))),
        (-1_000_000i64..1_000_000).prop_map(|n| Value::Number(n as f64 / 8.0)),
        Just(Value::NaN),
        Just(Value::Infinity),
        Just(Value::NegInfinity),
        (Timestamp::MIN_MILLIS..=Timestamp::MAX_MILLIS)
            .prop_map(|ms| Value::from(Timestamp::from_millis(ms).unwrap())),
        ("[a-z/]{1,6}", "g?i?m?").prop_map(|(s, f)| Value::from(Pattern::new(s, f).unwrap())),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::Buffer),
        prop::collection::vec(any::<u8>(), 0..8).prop_map(Value::SharedBuffer),
        prop::collection::vec(any::<i16>(), 0..4).prop_map(|v| Value::Typed(TypedArray::Int16(v))),
        prop::collection::vec(any::<u32>(), 0..4).prop_map(|v| Value::Typed(TypedArray::Uint32(v))),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner.clone(), 0..4).prop_map(Value::Record),
            prop::collection::btree_map("[a-z]{1,4}", inner.clone(), 0..4).prop_map(Value::Map),
            prop::collection::vec(inner, 0..4).prop_map(Value::set),
        ]
    })
}

proptest! {
    #[test]
    fn inverse_of_coprime_operand(a in 1u64..u64::MAX) {
        let p = FieldParams::default().p().clone();
        let a = BigUint::from(a);
        let inv = mod_inverse(&a, &p).unwrap();
        prop_assert_eq!((inv * &a) % &p, BigUint::from(1u8));
    }

    #[test]
    fn pow_matches_reference(base in any::<u64>(), exp in 0u64..10_000, modulus in 1u64..u64::MAX) {
        let (b, e, m) = (BigUint::from(base), BigUint::from(exp), BigUint::from(modulus));
        prop_assert_eq!(mod_pow(&b, &e, &m), b.modpow(&e, &m));
    }

    #[test]
    fn codec_round_trip(v in value()) {
        let text = encode(&v);
        let back = decode(&text).unwrap();
        prop_assert_eq!(encode(&back), text);
        prop_assert_eq!(back, v);
    }

    #[test]
    fn record_encoding_ignores_insertion_order(
        fields in prop::collection::btree_map("[a-z]{1,6}", leaf(), 1..6)
    ) {
        let forward: Vec<(String, Value)> = fields.clone().into_iter().collect();
        let mut reversed = forward.clone();
        reversed.reverse();
        let a = Value::record(forward);
        let b = Value::record(reversed);
        prop_assert_eq!(encode(&a), encode(&b));
        prop_assert_eq!(encode(&a), encode(&Value::Record(fields)));
    }

    #[test]
    fn hash_to_field_is_nonzero_and_reduced(v in leaf(), m in 2u64..1_000) {
        let m = BigUint::from(m);
        let h = hash_to_field(&v, &m);
        prop_assert!(h > BigUint::from(0u8) && h < m);
        prop_assert_eq!(h, hash_to_field(&v, &m));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn scalar_encryption_round_trip(scalar in 1u64..u64::MAX, m in any::<u64>()) {
        let scheme = Ntru::new(FieldParams::default());
        let keys = scheme.generate_keys(Some(&BigUint::from(scalar))).unwrap();
        let m = BigUint::from(m);
        let e = scheme.encrypt(&m, &keys.public, None);
        prop_assert_eq!(scheme.decrypt(&e, &keys.private).unwrap(), m);
    }

    #[test]
    fn envelope_round_trip(
        payload in prop::collection::btree_map("[a-z]{1,4}", leaf(), 0..4)
    ) {
        let scheme = Ntru::new(FieldParams::default());
        let keys = scheme.generate_keys(None).unwrap();
        let payload = Value::Record(payload);
        let sealed = scheme.seal(&payload, &keys.public, None);
        prop_assert_eq!(scheme.open(&sealed, &keys.private).unwrap(), payload);
    }

    #[test]
    fn signature_binds_key(a in 1u64..u64::MAX, b in 1u64..u64::MAX, msg in "\\PC{0,16}") {
        prop_assume!(a != b);
        let scheme = Ntru::new(FieldParams::default());
        let ka = scheme.generate_keys(Some(&BigUint::from(a))).unwrap();
        let kb = scheme.generate_keys(Some(&BigUint::from(b))).unwrap();
        let msg = Value::Text(msg);
        let sig = scheme.sign(&msg, &ka.private).unwrap();
        prop_assert!(scheme.verify(&msg, &sig, &ka.public));
        prop_assert!(!scheme.verify(&msg, &sig, &kb.public));
    }
}
