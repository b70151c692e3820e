//! Property-based tests for the canonical serializer and the keyed-hash
//! round trip.
//!
//! These tests use proptest to verify invariants across a wide range of
//! generated messages.

#[cfg(test)]
mod canonical_properties {
    use proptest::collection::btree_map;
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use signkit_lib::{CanonicalRules, Message};

    fn field_name() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9]{0,7}".prop_filter("signature field is reserved", |s| s != "sign")
    }

    fn scalar_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[a-z0-9]{1,12}".prop_map(Value::from),
            any::<u32>().prop_map(Value::from),
        ]
    }

    fn message() -> impl Strategy<Value = Message> {
        btree_map(field_name(), scalar_value(), 0..8)
            .prop_map(|m| m.into_iter().collect())
    }

    proptest! {
        /// Canonicalizing the same message twice yields identical strings.
        #[test]
        fn canonicalization_is_deterministic(data in message()) {
            let rules = CanonicalRules::new("sign");
            prop_assert_eq!(rules.canonical_string(&data), rules.canonical_string(&data));
        }

        /// Insertion order never affects the canonical string.
        #[test]
        fn insertion_order_is_irrelevant(data in message()) {
            let rules = CanonicalRules::new("sign");
            let reversed: Message = data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .rev()
                .collect();
            prop_assert_eq!(rules.canonical_string(&data), rules.canonical_string(&reversed));
        }

        /// Every eligible field appears exactly once, as `name=value`.
        #[test]
        fn output_covers_exactly_the_eligible_fields(data in message()) {
            let rules = CanonicalRules::new("sign");
            let canonical = rules.canonical_string(&data);
            let rendered = if canonical.is_empty() {
                0
            } else {
                canonical.split('&').count()
            };
            prop_assert_eq!(rendered, data.len());
            for (name, _) in &data {
                prop_assert!(canonical.split('&').any(|pair| {
                    pair.strip_prefix(name.as_str())
                        .is_some_and(|rest| rest.starts_with('='))
                }), "field missing from canonical string");
            }
        }

        /// Private-prefix, signature, empty, and nested fields leave the
        /// canonical string untouched.
        #[test]
        fn ineligible_fields_do_not_change_the_output(data in message(), noise in "[a-z0-9]{1,12}") {
            let rules = CanonicalRules::new("sign");
            let baseline = rules.canonical_string(&data);

            let mut extended = data.clone();
            extended.insert("_private".into(), Value::from(noise.clone()));
            extended.insert("sign".into(), Value::from(noise.clone()));
            extended.insert("empty".into(), json!(""));
            extended.insert("absent".into(), Value::Null);
            extended.insert("nested".into(), json!({ "k": noise }));
            extended.insert("listed".into(), json!([1, 2, 3]));
            prop_assert_eq!(rules.canonical_string(&extended), baseline);
        }

        /// Folded ordering never reorders the rendered names' values.
        #[test]
        fn ordering_is_sorted_under_case_fold(data in message()) {
            let rules = CanonicalRules::new("sign");
            let canonical = rules.canonical_string(&data);
            if canonical.is_empty() {
                return Ok(());
            }
            let names: Vec<String> = canonical
                .split('&')
                .map(|pair| pair.split('=').next().unwrap().to_lowercase())
                .collect();
            let mut sorted = names.clone();
            sorted.sort();
            prop_assert_eq!(names, sorted);
        }
    }
}

#[cfg(test)]
mod keyed_hash_properties {
    use proptest::collection::btree_map;
    use proptest::prelude::*;
    use serde_json::Value;
    use signkit_lib::{Message, SignScheme, Signer};

    fn field_name() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9]{0,7}".prop_filter("signature field is reserved", |s| s != "sign")
    }

    fn scalar_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[a-z0-9]{1,12}".prop_map(Value::from),
            any::<u32>().prop_map(Value::from),
        ]
    }

    fn signer() -> Signer {
        Signer::builder()
            .shared_secret("prop-secret")
            .build()
            .expect("building signer")
    }

    proptest! {
        /// Signing then verifying holds for every generated message.
        #[test]
        fn sign_verify_round_trip(entries in btree_map(field_name(), scalar_value(), 0..8)) {
            let signer = signer();
            let mut data: Message = entries.into_iter().collect();
            let sig = signer.sign(&data, SignScheme::Md5).unwrap();
            data.insert("sign".into(), sig.into());
            prop_assert!(signer.verify(&data, SignScheme::Md5));
        }

        /// Mutating any signed field invalidates the signature.
        #[test]
        fn mutation_invalidates(entries in btree_map(field_name(), scalar_value(), 1..8)) {
            let signer = signer();
            let mut data: Message = entries.into_iter().collect();
            let sig = signer.sign(&data, SignScheme::Md5).unwrap();
            data.insert("sign".into(), sig.into());

            let target = data
                .keys()
                .find(|k| k.as_str() != "sign")
                .unwrap()
                .clone();
            let mutated = match &data[&target] {
                Value::String(s) => format!("{s}x"),
                other => format!("{other}x"),
            };
            data.insert(target, mutated.into());
            prop_assert!(!signer.verify(&data, SignScheme::Md5));
        }
    }
}
