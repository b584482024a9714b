use chrono::NaiveDate;
use proptest::prelude::*;
use table_fixtures::{
    data::Value,
    registry::{Format, Registry, escape_yaml_scalar},
    schema::SemanticType,
};

fn dump(ty: SemanticType, value: Value, format: Format) -> Value {
    Registry::standard().dump(&ty, value, format).unwrap()
}

fn load(ty: SemanticType, raw: Value) -> Value {
    Registry::standard().load(&ty, raw).unwrap()
}

#[test]
fn yaml_null_token_short_circuits_before_coercion() {
    for ty in [
        SemanticType::Integer,
        SemanticType::Float,
        SemanticType::Boolean,
        SemanticType::Binary,
        SemanticType::String,
        SemanticType::Date,
    ] {
        assert_eq!(
            dump(ty.clone(), Value::Null, Format::Yaml),
            Value::from("null"),
            "{ty}"
        );
    }
    assert_eq!(
        dump(SemanticType::Timestamp, Value::from(""), Format::Yaml),
        Value::from("null")
    );
    assert_eq!(
        dump(SemanticType::Time, Value::Boolean(false), Format::Yaml),
        Value::from("null")
    );
}

#[test]
fn csv_dump_leaves_null_strings_empty() {
    assert_eq!(
        dump(SemanticType::Text, Value::Null, Format::Csv),
        Value::Null
    );
    assert_eq!(
        dump(SemanticType::Text, Value::from("a\r\nb\rc"), Format::Csv),
        Value::from("a\nb\nc")
    );
}

#[test]
fn numeric_dumps_zero_blanks_and_booleans() {
    assert_eq!(
        dump(SemanticType::Integer, Value::from(""), Format::Csv),
        Value::Integer(0)
    );
    assert_eq!(
        dump(SemanticType::Integer, Value::Boolean(true), Format::Yaml),
        Value::Integer(1)
    );
    assert_eq!(
        dump(SemanticType::Decimal, Value::Integer(3), Format::Csv),
        Value::Float(3.0)
    );
    assert_eq!(
        dump(SemanticType::Float, Value::from("2.5"), Format::Yaml),
        Value::Float(2.5)
    );
}

#[test]
fn blank_strings_are_quoted_in_yaml() {
    assert_eq!(
        dump(SemanticType::String, Value::from(""), Format::Yaml),
        Value::from("\"\"")
    );
    assert_eq!(
        dump(SemanticType::String, Value::from("a\tb"), Format::Yaml),
        Value::from("a  b")
    );
}

#[test]
fn binary_round_trips_through_base64() {
    let bytes = Value::Bytes(vec![0, 159, 146, 150]);
    let encoded = dump(SemanticType::Binary, bytes.clone(), Format::Csv);
    assert_eq!(encoded, Value::from("AJ+Slg=="));
    assert_eq!(load(SemanticType::Binary, encoded), bytes);
    assert_eq!(load(SemanticType::Binary, Value::Integer(7)), Value::Integer(7));
}

#[test]
fn binary_text_prefers_base64_over_integers() {
    assert_eq!(
        load(SemanticType::Binary, Value::from("1234")),
        Value::Bytes(vec![0xd7, 0x6d, 0xf8])
    );
    assert_eq!(load(SemanticType::Binary, Value::from("12")), Value::Integer(12));
}

#[test]
fn loads_parse_temporal_text() {
    assert_eq!(
        load(SemanticType::Date, Value::from("2024-02-29")),
        Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
    );
    let stamp = NaiveDate::from_ymd_opt(2024, 1, 5)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap();
    assert_eq!(
        load(SemanticType::DateTime, Value::from("2024-01-05 10:30:00")),
        Value::DateTime(stamp)
    );
    assert_eq!(load(SemanticType::Date, Value::from("")), Value::Null);
    assert!(
        Registry::standard()
            .load(&SemanticType::Timestamp, Value::from("not a time"))
            .is_err()
    );
}

#[test]
fn numeric_loads_reject_words() {
    let registry = Registry::standard();
    assert_eq!(load(SemanticType::Integer, Value::from("12")), Value::Integer(12));
    assert_eq!(load(SemanticType::Float, Value::from("1.25")), Value::Float(1.25));
    assert!(registry.load(&SemanticType::Integer, Value::from("twelve")).is_err());
    assert!(registry.load(&SemanticType::Float, Value::from("n/a")).is_err());
}

#[test]
fn defaults_follow_column_type() {
    let registry = Registry::standard();
    assert_eq!(registry.default_for(&SemanticType::Boolean), Some(Value::Boolean(false)));
    assert_eq!(registry.default_for(&SemanticType::Integer), Some(Value::Integer(0)));
    assert_eq!(registry.default_for(&SemanticType::Float), Some(Value::Float(0.0)));
    assert_eq!(registry.default_for(&SemanticType::Text), Some(Value::from("")));
    assert!(matches!(
        registry.default_for(&SemanticType::Timestamp),
        Some(Value::DateTime(_))
    ));
}

#[test]
fn custom_pipelines_replace_standard_ones() {
    let mut registry = Registry::standard();
    let upper = table_fixtures::rules::Rule::map("upper", |v| {
        Value::String(v.as_display().to_uppercase())
    });
    registry.set_dump_pipeline(SemanticType::String, Format::Csv, upper.into());
    assert_eq!(
        registry
            .dump(&SemanticType::String, Value::from("abc"), Format::Csv)
            .unwrap(),
        Value::from("ABC")
    );
}

proptest! {
    #[test]
    fn nonzero_integers_are_truthy(n in any::<i64>()) {
        let loaded = load(SemanticType::Boolean, Value::Integer(n));
        prop_assert_eq!(loaded, Value::Boolean(n != 0));
        let dumped = dump(SemanticType::Boolean, Value::Integer(n), Format::Csv);
        prop_assert_eq!(dumped, Value::Boolean(n != 0));
    }

    #[test]
    fn non_falsy_words_are_truthy(word in "[a-z1-9]{1,10}") {
        prop_assume!(word != "false");
        prop_assert_eq!(load(SemanticType::Boolean, Value::from(word.as_str())), Value::Boolean(true));
    }

    #[test]
    fn multiline_strings_survive_yaml(text in "[a-z]{1,8}(\n[a-z]{1,8}){1,4}") {
        let escaped = escape_yaml_scalar(&text);
        prop_assert!(escaped.starts_with("|-\n"));
        let document = format!("row:\n  text: {escaped}\n");
        let parsed: serde_json::Value = serde_yaml::from_str(&document).unwrap();
        prop_assert_eq!(parsed["row"]["text"].as_str(), Some(text.as_str()));
    }
}

#[test]
fn falsy_literals_load_false() {
    for raw in [
        Value::Integer(0),
        Value::from(""),
        Value::Boolean(false),
        Value::from("false"),
        Value::from("0"),
        Value::Null,
    ] {
        assert_eq!(
            load(SemanticType::Boolean, raw.clone()),
            Value::Boolean(false),
            "{raw:?}"
        );
    }
}
