//! Property-based tests for keys and URL templates.
//!
//! # Properties Tested
//!
//! 1. **Canonical params**: collection keys ignore `null` params
//! 2. **Identity**: entity keys differ whenever ids differ
//! 3. **Optional elision**: an absent optional identifier never leaves `//` behind
//! 4. **Substitution**: a present identifier always lands in the path, never the query

use proptest::prelude::*;
use resource_kit::{CacheKey, Params, ResourceDefinition, UrlBuilder};
use serde_json::{json, Value};

fn param_name() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,8}"
}

fn param_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,12}".prop_map(|s| json!(s)),
        any::<bool>().prop_map(|b| json!(b)),
    ]
}

proptest! {
    #[test]
    fn prop_collection_key_ignores_null_params(
        pairs in prop::collection::vec((param_name(), param_value()), 0..8),
        noise in prop::collection::vec(param_name(), 0..4),
    ) {
        let forward: Params = pairs.iter().cloned().collect();

        let mut noisy = Params::new();
        for name in &noise {
            noisy.insert(format!("unset_{}", name), Value::Null);
        }
        for (name, value) in &pairs {
            noisy.insert(name.clone(), value.clone());
        }

        prop_assert_eq!(
            CacheKey::collection("node", &forward),
            CacheKey::collection("node", &noisy)
        );
    }

    #[test]
    fn prop_entity_keys_distinguish_ids(a in "[a-z0-9]{1,10}", b in "[a-z0-9]{1,10}") {
        let params = Params::new();
        let same = CacheKey::entity("user", &a, &params) == CacheKey::entity("user", &b, &params);
        prop_assert_eq!(same, a == b);
    }

    #[test]
    fn prop_optional_identifier_elides_cleanly(
        literal in "[a-z]{1,10}",
        facility in prop::option::of(1u32..10_000),
        trailing in any::<bool>(),
    ) {
        let template = format!("/:facility_id?/{}{}", literal, if trailing { "/" } else { "" });
        let def = ResourceDefinition::new("classroom")
            .optional_identifier("facility_id")
            .path(template);

        let mut params = Params::new();
        if let Some(id) = facility {
            params.insert("facility_id".to_string(), json!(id));
        }

        let url = UrlBuilder::default().build_url(&def, "list", None, &params).unwrap();
        prop_assert!(!url.contains("//"));
        prop_assert!(!url.contains('?'));

        let expected = match facility {
            Some(id) => format!("/{}/{}", id, literal),
            None => format!("/{}", literal),
        };
        prop_assert_eq!(url.trim_end_matches('/'), expected);
    }

    #[test]
    fn prop_required_identifier_lands_in_path(channel in "[a-z0-9]{1,12}", id in "[a-z0-9]{1,12}") {
        let def = ResourceDefinition::new("contentnode")
            .identifier("channel_id")
            .path("/:channel_id/contentnodes/");
        let mut params = Params::new();
        params.insert("channel_id".to_string(), json!(channel.clone()));

        let endpoint = UrlBuilder::new("/api").build(&def, "detail", Some(&id), &params).unwrap();
        prop_assert_eq!(endpoint.path, format!("/api/{}/contentnodes/{}/", channel, id));
        prop_assert!(endpoint.query.is_empty());
    }
}
