use std::collections::BTreeMap;
use std::sync::Arc;

use abi_contract::schema::{
    optional_properties, required_properties, schema_kind, AdditionalProperties, SchemaKind,
};
use abi_contract::validate::validate_value;
use abi_contract::{
    create_contract, parse_abi, resolve_json, CallOptions, Definitions, RecordingTransport, Shape,
};
use serde_json::{json, Value as JsonValue};

fn definitions(raw: JsonValue) -> Definitions {
    let map: BTreeMap<String, JsonValue> = serde_json::from_value(raw).unwrap();
    Definitions::from_raw(&map)
}

const NESTED_OBJECTS_ABI: &str = r##"{
  "schema_version": "0.3.0",
  "metadata": {},
  "body": {
    "functions": [
      {
        "name": "processDeepNesting",
        "kind": "call",
        "params": {
          "serialization_type": "json",
          "args": [{
            "name": "data",
            "type_schema": {
              "type": "object",
              "properties": {
                "level1": { "type": "object", "properties": {
                  "level2": { "type": "object", "properties": {
                    "level3": { "type": "object", "properties": {
                      "deepValue": { "type": "string" },
                      "deepArray": { "type": "array", "items": {
                        "type": "object", "properties": { "nested": { "type": "boolean" } }
                      } }
                    } },
                    "level2Value": { "type": "integer" }
                  } }
                } },
                "topLevel": { "type": "string" }
              }
            }
          }]
        },
        "result": {
          "serialization_type": "json",
          "type_schema": {
            "type": "object",
            "properties": {
              "processed": { "type": "object", "properties": {
                "summary": { "type": "object", "properties": {
                  "count": { "type": "integer" },
                  "status": { "enum": ["success", "failure"] }
                } }
              } }
            }
          }
        }
      }
    ],
    "root_schema": { "$schema": "http://json-schema.org/draft-07/schema#", "definitions": {} }
  }
}"##;

fn nested_data() -> JsonValue {
    json!({
        "level1": { "level2": {
            "level3": { "deepValue": "x", "deepArray": [{ "nested": true }, { "nested": false }] },
            "level2Value": 7
        } },
        "topLevel": "top"
    })
}

#[tokio::test]
async fn deeply_nested_arguments_validate_with_full_paths() {
    let doc = parse_abi(NESTED_OBJECTS_ABI).unwrap();
    let transport = Arc::new(RecordingTransport::new().respond(
        "processDeepNesting",
        json!({ "processed": { "summary": { "count": 2, "status": "success" } } }),
    ));
    let contract = create_contract(&doc, transport.clone(), "nested.testnet").unwrap();

    let out = contract
        .call(
            "processDeepNesting",
            CallOptions::with_args(json!({ "data": nested_data() })),
        )
        .await
        .unwrap();
    assert_eq!(out["processed"]["summary"]["status"], json!("success"));
    assert_eq!(transport.calls()[0].args["data"], nested_data());

    let mut bad = nested_data();
    bad["level1"]["level2"]["level3"]["deepArray"][1]["nested"] = json!("no");
    let err = contract
        .call("processDeepNesting", CallOptions::with_args(json!({ "data": bad })))
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .contains("args.data.level1.level2.level3.deepArray[1].nested"));
}

#[test]
fn properties_without_required_keyword_are_all_required() {
    let doc = parse_abi(NESTED_OBJECTS_ABI).unwrap();
    let contract =
        create_contract(&doc, Arc::new(RecordingTransport::new()), "nested.testnet").unwrap();
    let entry = contract.entry("processDeepNesting").unwrap();

    let data = entry.param_shape("data").and_then(Shape::as_object).unwrap();
    assert_eq!(data.required_names(), vec!["level1", "topLevel"]);
    assert!(data.optional_names().is_empty());

    let result = entry.result_shape().unwrap();
    let status = &result.as_object().unwrap().property("processed").unwrap().shape;
    let status = &status.as_object().unwrap().property("summary").unwrap().shape;
    let status = &status.as_object().unwrap().property("status").unwrap().shape;
    assert_eq!(
        status.closed_values(),
        Some(&[json!("success"), json!("failure")][..])
    );

    let schema = &doc.body.functions[0].parameters()[0].type_schema;
    assert_eq!(required_properties(schema), Vec::<&str>::new());
    assert!(optional_properties(schema).is_empty());
}

#[test]
fn shared_definitions_resolve_through_nested_references() {
    let defs = definitions(json!({
        "AccountId": { "type": "string", "minLength": 2, "maxLength": 64 },
        "U128": { "type": "string", "pattern": "^[0-9]+$" },
        "Balance": {
            "type": "object",
            "properties": {
                "owner": { "$ref": "#/definitions/AccountId" },
                "amount": { "$ref": "#/$defs/U128" },
                "memo": { "type": ["string", "null"] }
            },
            "required": ["owner", "amount"],
            "additionalProperties": false
        },
        "Ledger": { "type": "array", "items": { "$ref": "#/definitions/Balance" } }
    }));
    let ledger = resolve_json(&json!({ "$ref": "#/definitions/Ledger" }), &defs).unwrap();

    let Shape::List { items, .. } = &ledger else {
        panic!("expected list, got {ledger:?}");
    };
    let balance = items.as_object().unwrap();
    assert_eq!(balance.required_names(), vec!["owner", "amount"]);
    assert_eq!(balance.optional_names(), vec!["memo"]);
    assert_eq!(balance.additional, AdditionalProperties::Forbidden);
    assert!(matches!(
        &*balance.property("memo").unwrap().shape,
        Shape::Union(alts)
            if alts.len() == 2 && *alts[0] == Shape::String(Default::default()) && *alts[1] == Shape::Null
    ));

    let good = json!([{ "owner": "alice.near", "amount": "100" }, { "owner": "bob.near", "amount": "5", "memo": null }]);
    assert!(validate_value(&good, &ledger, "ledger").is_ok());

    let err = validate_value(&json!([{ "owner": "a", "amount": "100" }]), &ledger, "ledger").unwrap_err();
    assert!(err.to_string().contains("ledger[0].owner"));
    let err = validate_value(&json!([{ "owner": "alice", "amount": "1e3" }]), &ledger, "ledger").unwrap_err();
    assert!(err.to_string().contains("ledger[0].amount"));
}

#[test]
fn all_of_composes_left_to_right() {
    let defs = definitions(json!({
        "Base": {
            "type": "object",
            "properties": { "id": { "type": "string" }, "tag": { "type": "string" } },
            "required": ["id", "tag"]
        }
    }));
    let shape = resolve_json(
        &json!({ "allOf": [
            { "$ref": "#/definitions/Base" },
            { "type": "object", "properties": { "tag": { "type": "integer" } }, "required": [] }
        ] }),
        &defs,
    )
    .unwrap();

    let obj = shape.as_object().unwrap();
    assert_eq!(obj.required_names(), vec!["id"]);
    let tag = obj.property("tag").unwrap();
    assert!(!tag.required);
    assert!(matches!(*tag.shape, Shape::Number(_)));
}

#[test]
fn one_of_and_any_of_resolve_identically() {
    let defs = definitions(json!({}));
    let alternatives = json!([{ "type": "string" }, { "const": 0 }]);
    let one_of = resolve_json(&json!({ "oneOf": alternatives.clone() }), &defs).unwrap();
    let any_of = resolve_json(&json!({ "anyOf": alternatives }), &defs).unwrap();
    assert_eq!(one_of, any_of);
    assert!(one_of.accepts(&json!("x")));
    assert!(one_of.accepts(&json!(0)));
    assert!(!one_of.accepts(&json!(1)));
}

#[test]
fn unknown_fragments_accept_anything() {
    let defs = definitions(json!({}));
    for fragment in [json!({}), json!(true), json!({ "description": "opaque" })] {
        let shape = resolve_json(&fragment, &defs).unwrap();
        assert_eq!(shape, Shape::Any);
        assert!(shape.accepts(&json!({ "anything": [1, "two"] })));
    }
}

#[test]
fn schema_kind_classifies_fragments() {
    assert!(matches!(schema_kind(&json!({ "type": "string" })), SchemaKind::Type("string")));
    assert!(matches!(
        schema_kind(&json!({ "$ref": "#/definitions/Pair" })),
        SchemaKind::Ref("#/definitions/Pair")
    ));
    assert!(matches!(schema_kind(&json!({ "enum": [1, 2] })), SchemaKind::Enum));
    assert!(matches!(schema_kind(&json!({ "const": null })), SchemaKind::Const));
    assert!(matches!(schema_kind(&json!({ "oneOf": [] })), SchemaKind::Unknown));

    let profile = json!({
        "type": "object",
        "properties": { "name": {}, "bio": {}, "avatar_url": {} },
        "required": ["name"]
    });
    assert_eq!(required_properties(&profile), vec!["name"]);
    assert_eq!(optional_properties(&profile), vec!["bio", "avatar_url"]);
}

#[tokio::test]
async fn deep_shared_definitions_build_and_validate() {
    const DEPTH: usize = 40;
    let mut defs = serde_json::Map::new();
    for i in 0..DEPTH {
        let next = format!("#/definitions/Level{}", i + 1);
        defs.insert(
            format!("Level{i}"),
            json!({
                "type": "object",
                "properties": { "left": { "$ref": next }, "right": { "$ref": next } },
                "required": ["left"]
            }),
        );
    }
    defs.insert(format!("Level{DEPTH}"), json!({ "type": "integer", "minimum": 0 }));
    let input = json!({
        "schema_version": "0.4.0",
        "metadata": {},
        "body": {
            "functions": [{
                "name": "walk",
                "kind": "view",
                "params": { "serialization_type": "json",
                    "args": [{ "name": "tree", "type_schema": { "$ref": "#/definitions/Level0" } }] }
            }],
            "root_schema": { "definitions": defs }
        }
    });
    let doc = parse_abi(&input.to_string()).unwrap();
    let transport = Arc::new(RecordingTransport::new());
    let contract = create_contract(&doc, transport.clone(), "tree.testnet").unwrap();

    let chain = |leaf: JsonValue| {
        (0..DEPTH).fold(leaf, |inner, _| json!({ "left": inner }))
    };
    contract
        .call("walk", CallOptions::with_args(json!({ "tree": chain(json!(7)) })))
        .await
        .unwrap();

    let err = contract
        .call("walk", CallOptions::with_args(json!({ "tree": chain(json!(-1)) })))
        .await
        .unwrap_err();
    let expected = format!("args.tree{}", ".left".repeat(DEPTH));
    assert!(err.to_string().contains(&expected), "unexpected error '{err}'");
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn nullable_list_arguments_check_their_items() {
    let input = r##"{
      "schema_version": "0.4.0",
      "metadata": {},
      "body": {
        "functions": [{
          "name": "set_tags",
          "kind": "call",
          "params": { "serialization_type": "json",
            "args": [{ "name": "tags",
              "type_schema": { "type": ["array", "null"], "items": { "$ref": "#/definitions/Tag" } } }] }
        }],
        "root_schema": { "definitions": { "Tag": { "type": "string", "maxLength": 8 } } }
      }
    }"##;
    let doc = parse_abi(input).unwrap();
    let transport = Arc::new(RecordingTransport::new());
    let contract = create_contract(&doc, transport.clone(), "tags.testnet").unwrap();

    for tags in [json!(["rust", "near"]), json!(null)] {
        contract
            .call("set_tags", CallOptions::with_args(json!({ "tags": tags })))
            .await
            .unwrap();
    }
    for (tags, expected) in [
        (json!([1]), "args.tags"),
        (json!(["far-too-long-tag"]), "args.tags"),
        (json!({ "0": "rust" }), "args.tags"),
    ] {
        let err = contract
            .call("set_tags", CallOptions::with_args(json!({ "tags": tags })))
            .await
            .unwrap_err();
        assert!(err.to_string().contains(expected), "unexpected error '{err}'");
    }
    assert_eq!(transport.calls().len(), 2);

    let dangling = input.replace("#/definitions/Tag\"", "#/definitions/Label\"");
    let doc = parse_abi(&dangling).unwrap();
    let err = create_contract(&doc, transport, "tags.testnet").unwrap_err();
    assert!(err.to_string().contains("Label"));
}
