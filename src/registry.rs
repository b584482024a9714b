//! Type coercion registry.
//!
//! For every [`SemanticType`] the registry holds a dump pipeline per
//! [`Format`], a load pipeline, and a default supplier used when a required
//! column is missing. Pipelines are assembled by name from the standard
//! [`RuleBook`] returned by [`standard_rules`].
//!
//! | type | yaml dump | csv dump |
//! |---|---|---|
//! | binary | `null_to_token` `base64` `yaml_quote` | `base64` |
//! | boolean | `null_to_token` `truthiness` | `truthiness` |
//! | date family | `temporal_null_to_token` `stringify` | `stringify` |
//! | decimal, float | `null_to_token` `blank_to_zero` `bool_to_digit` `to_float` | same without `null_to_token` |
//! | integer | as decimal with `to_integer` | as decimal with `to_integer` |
//! | string, text | `blank_to_quotes` `null_to_token` `yaml_escape` | `keep_null` `normalize_newlines` |

use std::{collections::HashMap, fmt, str::FromStr};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{Local, NaiveTime};

use crate::{
    data::{Value, parse_naive_date, parse_naive_datetime, parse_naive_time},
    error::RuleFault,
    rules::{Pipeline, Rule, RuleBook},
    schema::SemanticType,
};

/// Characters that force a YAML string into a block literal when leading.
pub const YAML_INDICATORS: &[char] = &[
    '[', ']', '{', '}', '|', '#', '@', '~', '!', '\'', '$', '&', '^', '<', '>', '?', '-', '+',
    '=', ';', ':', '.', ',', '*', '\\', '`', '(', ')',
];

/// Literal written for null values in YAML fixtures.
pub const YAML_NULL: &str = "null";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Csv,
    Yaml,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Yaml => "yml",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Format::Csv => "CSV",
            Format::Yaml => "YAML",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Format::Csv),
            "yml" | "yaml" => Ok(Format::Yaml),
            other => Err(format!("Unknown fixture format '{other}' (expected csv or yaml)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    rules: RuleBook,
    csv_dump: HashMap<SemanticType, Pipeline>,
    yaml_dump: HashMap<SemanticType, Pipeline>,
    load: HashMap<SemanticType, Pipeline>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::standard()
    }
}

impl Registry {
    pub fn standard() -> Self {
        let rules = standard_rules();
        let mut registry = Registry {
            rules,
            csv_dump: HashMap::new(),
            yaml_dump: HashMap::new(),
            load: HashMap::new(),
        };
        for ty in SemanticType::known() {
            let (yaml, csv, load) = standard_pipeline_names(ty);
            let yaml = registry.named(yaml);
            let csv = registry.named(csv);
            let load = registry.named(load);
            registry.yaml_dump.insert(ty.clone(), yaml);
            registry.csv_dump.insert(ty.clone(), csv);
            registry.load.insert(ty.clone(), load);
        }
        registry
    }

    fn named(&self, names: &[&str]) -> Pipeline {
        let pipeline = self.rules.pipeline(names);
        debug_assert!(pipeline.is_ok(), "standard pipeline {names:?}: {pipeline:?}");
        pipeline.unwrap_or_default()
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    /// Pipeline used to render `ty` into `format`. Unknown types get an empty
    /// (identity) pipeline.
    pub fn dump_pipeline(&self, ty: &SemanticType, format: Format) -> Pipeline {
        let table = match format {
            Format::Csv => &self.csv_dump,
            Format::Yaml => &self.yaml_dump,
        };
        table.get(ty).cloned().unwrap_or_default()
    }

    /// Whether `ty` has a registered pipeline for `format`. Values of types
    /// without one are written as they come.
    pub fn has_dump_pipeline(&self, ty: &SemanticType, format: Format) -> bool {
        match format {
            Format::Csv => self.csv_dump.contains_key(ty),
            Format::Yaml => self.yaml_dump.contains_key(ty),
        }
    }

    pub fn load_pipeline(&self, ty: &SemanticType) -> Pipeline {
        self.load.get(ty).cloned().unwrap_or_default()
    }

    pub fn set_dump_pipeline(&mut self, ty: SemanticType, format: Format, pipeline: Pipeline) {
        match format {
            Format::Csv => self.csv_dump.insert(ty, pipeline),
            Format::Yaml => self.yaml_dump.insert(ty, pipeline),
        };
    }

    pub fn set_load_pipeline(&mut self, ty: SemanticType, pipeline: Pipeline) {
        self.load.insert(ty, pipeline);
    }

    pub fn dump(&self, ty: &SemanticType, value: Value, format: Format) -> Result<Value, RuleFault> {
        let pipeline = match format {
            Format::Csv => self.csv_dump.get(ty),
            Format::Yaml => self.yaml_dump.get(ty),
        };
        match pipeline {
            Some(pipeline) => pipeline.run(value),
            None => Ok(value),
        }
    }

    pub fn load(&self, ty: &SemanticType, raw: Value) -> Result<Value, RuleFault> {
        match self.load.get(ty) {
            Some(pipeline) => pipeline.run(raw),
            None => Ok(raw),
        }
    }

    /// Value used to complete a missing required column. `None` for unknown types.
    pub fn default_for(&self, ty: &SemanticType) -> Option<Value> {
        Some(match ty {
            SemanticType::Binary => Value::Integer(0),
            SemanticType::Boolean => Value::Boolean(false),
            SemanticType::Date => Value::Date(Local::now().date_naive()),
            SemanticType::DateTime | SemanticType::Time | SemanticType::Timestamp => {
                Value::DateTime(Local::now().naive_local())
            }
            SemanticType::Decimal | SemanticType::Integer => Value::Integer(0),
            SemanticType::Float => Value::Float(0.0),
            SemanticType::String | SemanticType::Text => Value::String(String::new()),
            SemanticType::Other(_) => return None,
        })
    }
}

type PipelineNames = (&'static [&'static str], &'static [&'static str], &'static [&'static str]);

/// (yaml dump, csv dump, load) rule names per type.
fn standard_pipeline_names(ty: &SemanticType) -> PipelineNames {
    match ty {
        SemanticType::Binary => (
            &["null_to_token", "base64", "yaml_quote"],
            &["base64"],
            &["decode_binary"],
        ),
        SemanticType::Boolean => (
            &["null_to_token", "truthiness"],
            &["truthiness"],
            &["boolean_text", "truthiness"],
        ),
        SemanticType::Date => (
            &["temporal_null_to_token", "stringify"],
            &["stringify"],
            &["parse_date"],
        ),
        SemanticType::DateTime | SemanticType::Timestamp => (
            &["temporal_null_to_token", "stringify"],
            &["stringify"],
            &["parse_datetime"],
        ),
        SemanticType::Time => (
            &["temporal_null_to_token", "stringify"],
            &["stringify"],
            &["parse_time"],
        ),
        SemanticType::Decimal => (
            &["null_to_token", "blank_to_zero", "bool_to_digit", "to_float"],
            &["blank_to_zero", "bool_to_digit", "to_float"],
            &["to_integer"],
        ),
        SemanticType::Float => (
            &["null_to_token", "blank_to_zero", "bool_to_digit", "to_float"],
            &["blank_to_zero", "bool_to_digit", "to_float"],
            &["to_float"],
        ),
        SemanticType::Integer => (
            &["null_to_token", "blank_to_zero", "bool_to_digit", "to_integer"],
            &["blank_to_zero", "bool_to_digit", "to_integer"],
            &["to_integer"],
        ),
        SemanticType::String | SemanticType::Text => (
            &["blank_to_quotes", "null_to_token", "yaml_escape"],
            &["keep_null", "normalize_newlines"],
            &["to_string"],
        ),
        SemanticType::Other(_) => (&[], &[], &[]),
    }
}

/// The named rule vocabulary the standard pipelines are built from.
pub fn standard_rules() -> RuleBook {
    let mut book = RuleBook::new();

    book.register(Rule::finish_when("null_to_token", Value::is_null, |_| {
        Value::from(YAML_NULL)
    }));
    book.register(Rule::finish_when(
        "temporal_null_to_token",
        |v| v.is_null() || v.is_blank() || v == &Value::Boolean(false),
        |_| Value::from(YAML_NULL),
    ));
    book.register(Rule::finish_when("keep_null", Value::is_null, |v| v));
    book.register(Rule::replace_when("blank_to_zero", Value::is_blank, |_| {
        Value::Integer(0)
    }));
    book.register(Rule::replace_when(
        "blank_to_quotes",
        Value::is_blank,
        |_| Value::from("\"\""),
    ));
    book.register(Rule::map("bool_to_digit", |v| match v {
        Value::Boolean(b) => Value::Integer(i64::from(b)),
        other => other,
    }));
    book.register(Rule::try_map("to_integer", to_integer));
    book.register(Rule::try_map("to_float", to_float));
    book.register(Rule::map("truthiness", |v| Value::Boolean(!v.is_falsy())));
    book.register(Rule::map("boolean_text", boolean_text));
    book.register(Rule::map("stringify", |v| Value::String(v.as_display())));
    book.register(Rule::map("to_string", |v| Value::String(v.as_display())));
    book.register(Rule::map("base64", |v| {
        let encoded = match &v {
            Value::Bytes(bytes) => STANDARD.encode(bytes),
            other => STANDARD.encode(other.as_display()),
        };
        Value::String(encoded)
    }));
    book.register(Rule::try_map("decode_binary", decode_binary));
    book.register(Rule::map("normalize_newlines", |v| {
        Value::String(normalize_line_endings(&v.as_display()))
    }));
    book.register(Rule::map("yaml_escape", |v| {
        Value::String(escape_yaml_scalar(&v.as_display()))
    }));
    book.register(Rule::map("yaml_quote", |v| {
        Value::String(quote_yaml_scalar(&v.as_display()))
    }));
    book.register(Rule::try_map("parse_date", parse_date));
    book.register(Rule::try_map("parse_datetime", parse_datetime));
    book.register(Rule::try_map("parse_time", parse_time));
    book
}

pub fn normalize_line_endings(value: &str) -> String {
    if value.contains('\r') {
        value.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        value.to_string()
    }
}

/// Renders a string so it can be written after `key: ` in a YAML mapping.
pub fn escape_yaml_scalar(value: &str) -> String {
    let mut escaped = value.replace('\t', "  ");
    if escaped.starts_with(' ') {
        escaped = escaped.trim_start_matches(' ').to_string();
    }
    escaped = normalize_line_endings(&escaped);
    if escaped.contains('\n') || escaped.starts_with(YAML_INDICATORS) {
        format!("|-\n    {}", escaped.replace('\n', "\n    "))
    } else {
        escaped
    }
}

/// Double-quoted scalar. JSON string escapes are valid YAML escapes.
pub fn quote_yaml_scalar(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Makes a value that did not come out of a standard YAML pipeline safe to
/// write after `key: `. Numbers, booleans and null are left alone.
pub fn quote_for_yaml(value: Value) -> Value {
    match value {
        Value::Null | Value::Boolean(_) | Value::Integer(_) | Value::Float(_) => value,
        other => Value::String(quote_yaml_scalar(&other.as_display())),
    }
}

fn to_integer(value: Value) -> Result<Value, RuleFault> {
    let parsed = match value {
        Value::Null => 0,
        Value::Integer(i) => i,
        Value::Float(f) => f.trunc() as i64,
        Value::Boolean(b) => i64::from(b),
        Value::String(s) => parse_integer_text(&s)?,
        Value::Bytes(bytes) => parse_integer_text(&String::from_utf8_lossy(&bytes))?,
        other => {
            return Err(RuleFault::new(format!(
                "'{}' is not an integer",
                other.as_display()
            )));
        }
    };
    Ok(Value::Integer(parsed))
}

fn parse_integer_text(text: &str) -> Result<i64, RuleFault> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    if let Ok(parsed) = trimmed.parse::<i64>() {
        return Ok(parsed);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| f.trunc() as i64)
        .ok_or_else(|| RuleFault::new(format!("'{text}' is not an integer")))
}

fn to_float(value: Value) -> Result<Value, RuleFault> {
    let parsed = match value {
        Value::Null => 0.0,
        Value::Integer(i) => i as f64,
        Value::Float(f) => f,
        Value::Boolean(b) => f64::from(u8::from(b)),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed
                    .parse::<f64>()
                    .map_err(|_| RuleFault::new(format!("'{s}' is not a number")))?
            }
        }
        other => {
            return Err(RuleFault::new(format!(
                "'{}' is not a number",
                other.as_display()
            )));
        }
    };
    Ok(Value::Float(parsed))
}

/// CSV fields arrive as text; `false` and `0` are the falsy literals the
/// boolean dump writes, so they are read back as such.
fn boolean_text(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.eq_ignore_ascii_case("false") {
                Value::Boolean(false)
            } else if trimmed == "0" {
                Value::Integer(0)
            } else {
                Value::String(s)
            }
        }
        other => other,
    }
}

fn decode_binary(value: Value) -> Result<Value, RuleFault> {
    match value {
        Value::String(s) if s.is_empty() => Ok(Value::Bytes(Vec::new())),
        Value::String(s) => match STANDARD.decode(s.trim()) {
            Ok(bytes) => Ok(Value::Bytes(bytes)),
            Err(_) => parse_integer_text(&s).map(Value::Integer).map_err(|_| {
                RuleFault::new(format!("'{s}' is neither base64 nor an integer"))
            }),
        },
        Value::Bytes(bytes) => Ok(Value::Bytes(bytes)),
        other => to_integer(other),
    }
}

fn parse_date(value: Value) -> Result<Value, RuleFault> {
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
        Value::String(s) => parse_naive_date(&s).map(Value::Date),
        Value::Date(d) => Ok(Value::Date(d)),
        Value::DateTime(dt) => Ok(Value::Date(dt.date())),
        other => Err(RuleFault::new(format!(
            "'{}' is not a date",
            other.as_display()
        ))),
    }
}

fn parse_datetime(value: Value) -> Result<Value, RuleFault> {
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
        Value::String(s) => parse_naive_datetime(&s).map(Value::DateTime),
        Value::DateTime(dt) => Ok(Value::DateTime(dt)),
        Value::Date(d) => Ok(Value::DateTime(d.and_time(NaiveTime::MIN))),
        other => Err(RuleFault::new(format!(
            "'{}' is not a datetime",
            other.as_display()
        ))),
    }
}

fn parse_time(value: Value) -> Result<Value, RuleFault> {
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(Value::Null),
        Value::String(s) => parse_naive_time(&s)
            .map(Value::Time)
            .or_else(|_| parse_naive_datetime(&s).map(Value::DateTime)),
        Value::Time(t) => Ok(Value::Time(t)),
        Value::DateTime(dt) => Ok(Value::DateTime(dt)),
        other => Err(RuleFault::new(format!(
            "'{}' is not a time",
            other.as_display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_escape_replaces_tabs_without_block_literal() {
        assert_eq!(escape_yaml_scalar("a\tb"), "a  b");
    }

    #[test]
    fn yaml_escape_strips_leading_spaces_and_wraps_multiline() {
        assert_eq!(escape_yaml_scalar("   padded"), "padded");
        assert_eq!(escape_yaml_scalar("one\r\ntwo"), "|-\n    one\n    two");
        assert_eq!(escape_yaml_scalar("-dash"), "|-\n    -dash");
        assert_eq!(escape_yaml_scalar("plain: text"), "plain: text");
    }

    #[test]
    fn block_literal_drops_trailing_newlines() {
        let escaped = escape_yaml_scalar("a\n");
        assert_eq!(escaped, "|-\n    a\n    ");
        let document = format!("text: {escaped}\n");
        let parsed: serde_yaml::Value = serde_yaml::from_str(&document).unwrap();
        assert_eq!(parsed["text"].as_str(), Some("a"));
    }

    #[test]
    fn standard_pipeline_names_are_all_registered() {
        let registry = Registry::standard();
        for ty in SemanticType::known() {
            let (yaml, csv, load) = standard_pipeline_names(ty);
            for names in [yaml, csv, load] {
                let pipeline = registry.rules().pipeline(names).unwrap();
                assert_eq!(pipeline.len(), names.len(), "{ty}");
            }
        }
    }

    #[test]
    fn yaml_binary_dump_is_quoted_so_digits_stay_text() {
        let registry = Registry::standard();
        let bytes = Value::Bytes(vec![0xd7, 0x6d, 0xf8]);
        let dumped = registry
            .dump(&SemanticType::Binary, bytes.clone(), Format::Yaml)
            .unwrap();
        assert_eq!(dumped, Value::from("\"1234\""));

        let document = format!("b: {}\n", dumped.as_display());
        let node: serde_yaml::Value = serde_yaml::from_str(&document).unwrap();
        let reloaded = registry
            .load(&SemanticType::Binary, Value::from_yaml(&node["b"]))
            .unwrap();
        assert_eq!(reloaded, bytes);
    }

    #[test]
    fn every_known_type_has_pipelines() {
        let registry = Registry::standard();
        for ty in SemanticType::known() {
            assert!(!registry.dump_pipeline(ty, Format::Csv).is_empty(), "{ty}");
            assert!(!registry.dump_pipeline(ty, Format::Yaml).is_empty(), "{ty}");
            assert!(!registry.load_pipeline(ty).is_empty(), "{ty}");
            assert!(registry.default_for(ty).is_some(), "{ty}");
        }
    }

    #[test]
    fn unknown_types_pass_through_without_default() {
        let registry = Registry::standard();
        let ty = SemanticType::Other("jsonb".into());
        let raw = Value::from("{\"a\":1}");
        assert_eq!(registry.dump(&ty, raw.clone(), Format::Yaml).unwrap(), raw);
        assert_eq!(registry.load(&ty, raw.clone()).unwrap(), raw);
        assert_eq!(registry.default_for(&ty), None);
    }

    #[test]
    fn integer_text_truncates_fractions_and_rejects_words() {
        assert_eq!(parse_integer_text(" 42 ").unwrap(), 42);
        assert_eq!(parse_integer_text("3.9").unwrap(), 3);
        assert_eq!(parse_integer_text("").unwrap(), 0);
        assert!(parse_integer_text("forty").is_err());
    }
}
