use proptest::prelude::*;
use reciprocity_dsl::schema::{extract_models, SchemaDocument};

fn model_name() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[A-Z][a-z]{1,8}").unwrap()
}

fn field_line() -> impl Strategy<Value = String> {
    (
        proptest::string::string_regex("[a-z][a-zA-Z0-9]{0,8}").unwrap(),
        prop_oneof![Just("String"), Just("Int"), Just("DateTime?"), Just("Json[]")],
        prop_oneof![
            Just(""),
            Just(" @id"),
            Just(" @default(\"{x}\")"),
            Just(" // trailing { comment"),
        ],
    )
        .prop_map(|(name, ty, attrs)| format!("  {name} {ty}{attrs}"))
}

fn schema_text() -> impl Strategy<Value = (Vec<String>, String)> {
    proptest::collection::vec(
        (model_name(), proptest::collection::vec(field_line(), 0..5)),
        0..6,
    )
    .prop_map(|models| {
        let mut text = String::new();
        let mut names = Vec::new();
        for (name, fields) in models {
            text.push_str(&format!("model {name} {{\n"));
            for field in fields {
                text.push_str(&field);
                text.push('\n');
            }
            text.push_str("}\n\n");
            names.push(name);
        }
        (names, text)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn tokenizer_round_trips_and_finds_every_model((names, text) in schema_text()) {
        let document = SchemaDocument::parse(&text);
        prop_assert_eq!(document.to_text(), text.clone());

        let models = extract_models(&text);
        for name in &names {
            prop_assert!(models.contains_key(name));
        }
        prop_assert_eq!(document.models.len(), names.len());
    }
}
