//! Property tests for JSON self-repair
//!
//! Each generated document is serialized, damaged with exactly one defect,
//! repaired, and compared with the original structure.

use modpilot::llm::repair_json;
use proptest::prelude::*;
use serde_json::{Map, Value};

fn key() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,7}"
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<u16>().prop_map(Value::from),
        "[a-z ]{0,10}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
    ]
}

fn object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(key(), scalar(), 1..5)
        .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>()))
}

fn repaired(broken: &str) -> Value {
    let result = repair_json(broken);
    serde_json::from_str(&result.text).unwrap_or_else(|e| {
        panic!("could not repair {:?} -> {:?}: {}", broken, result.text, e)
    })
}

proptest! {
    #[test]
    fn prop_valid_json_is_untouched(doc in object()) {
        let text = serde_json::to_string(&doc).unwrap();
        let result = repair_json(&text);
        prop_assert!(!result.repaired);
        prop_assert_eq!(result.text, text);
    }

    #[test]
    fn prop_trailing_comma(doc in object()) {
        let text = serde_json::to_string(&doc).unwrap();
        let broken = format!("{},}}", &text[..text.len() - 1]);
        prop_assert_eq!(repaired(&broken), doc);
    }

    #[test]
    fn prop_unquoted_key(doc in object()) {
        let text = serde_json::to_string(&doc).unwrap();
        let first = doc.as_object().unwrap().keys().next().unwrap().clone();
        let broken = text.replacen(&format!("\"{}\":", first), &format!("{}:", first), 1);
        prop_assert_ne!(&broken, &text);
        prop_assert_eq!(repaired(&broken), doc);
    }

    #[test]
    fn prop_single_quotes(doc in object()) {
        let broken = serde_json::to_string(&doc).unwrap().replace('"', "'");
        prop_assert_eq!(repaired(&broken), doc);
    }

    #[test]
    fn prop_missing_comma_between_siblings(a in object(), b in object()) {
        let doc = serde_json::json!({ "items": [a, b] });
        let text = serde_json::to_string(&doc).unwrap();
        let broken = text.replace("},{", "}{");
        prop_assert_ne!(&broken, &text);
        prop_assert_eq!(repaired(&broken), doc);
    }

    #[test]
    fn prop_missing_closing_brace(doc in object()) {
        let wrapped = serde_json::json!({ "steps": [doc] });
        let text = serde_json::to_string(&wrapped).unwrap();
        let broken = &text[..text.len() - 1];
        prop_assert_eq!(repaired(broken), wrapped);
    }

    #[test]
    fn prop_surrounding_prose(doc in object(), prose in "[A-Za-z ]{0,20}") {
        let text = serde_json::to_string(&doc).unwrap();
        let broken = format!("{}\n```json\n{}\n```\n{}", prose, text, prose);
        prop_assert_eq!(repaired(&broken), doc);
    }
}
