use proptest::prelude::*;
use table_fixtures::{
    data::Value,
    error::{FixtureError, RuleFault},
    rules::{Pipeline, Rule, RuleBook, Step},
};

fn append(suffix: &'static str) -> Rule {
    Rule::map(suffix, move |value| {
        Value::String(format!("{}{suffix}", value.as_display()))
    })
}

#[test]
fn composition_runs_rules_left_to_right() {
    let pipeline = append("a") >> append("b") >> append("c");
    assert_eq!(pipeline.names(), vec!["a", "b", "c"]);
    assert_eq!(pipeline.run(Value::from(">")).unwrap(), Value::from(">abc"));
}

#[test]
fn then_and_shr_build_the_same_pipeline() {
    let chained = append("x").then(append("y")).then(append("z"));
    let operator = append("x") >> (append("y") >> append("z"));
    assert_eq!(chained.names(), operator.names());
    assert_eq!(
        chained.run(Value::Null).unwrap(),
        operator.run(Value::Null).unwrap()
    );
}

#[test]
fn short_circuit_skips_remaining_rules() {
    let pipeline = Rule::finish_when("stop_on_null", Value::is_null, |_| Value::from("stopped"))
        >> Rule::try_map("explode", |_| Err(RuleFault::new("must not run")));
    assert_eq!(pipeline.run(Value::Null).unwrap(), Value::from("stopped"));
    assert!(pipeline.run(Value::Integer(1)).is_err());
}

#[test]
fn failing_rule_stops_pipeline_with_its_fault() {
    let pipeline = Rule::try_map("reject", |v| Err(RuleFault::new(format!("bad {v}"))))
        >> append("never");
    let fault = pipeline.run(Value::Integer(9)).unwrap_err();
    assert_eq!(fault.0, "bad 9");
}

#[test]
fn empty_pipeline_is_identity() {
    let pipeline = Pipeline::new();
    assert!(pipeline.is_empty());
    assert_eq!(pipeline.run(Value::Float(1.5)).unwrap(), Value::Float(1.5));
    assert_eq!(Rule::identity().apply(Value::Null).unwrap(), Step::Continue(Value::Null));
}

#[test]
fn rulebook_assembles_pipelines_by_name() {
    let mut book = RuleBook::new();
    book.register(append("1"));
    book.register(append("2"));
    let pipeline = book.pipeline(&["2", "1", "2"]).unwrap();
    assert_eq!(pipeline.len(), 3);
    assert_eq!(pipeline.run(Value::from("")).unwrap(), Value::from("212"));
    assert!(book.pipeline(&["1", "missing"]).is_err());
}

#[test]
fn expression_rules_see_value_and_null_flag() {
    let doubled = Rule::expression("value * 2").unwrap();
    assert_eq!(
        Pipeline::from(doubled).run(Value::Integer(21)).unwrap(),
        Value::Integer(42)
    );

    let null_check = Rule::expression("is_null").unwrap();
    assert_eq!(
        null_check.apply(Value::Null).unwrap().into_value(),
        Value::Boolean(true)
    );

    let suffixed = Rule::expression("value + \"!\"").unwrap();
    assert_eq!(
        suffixed.apply(Value::from("hey")).unwrap().into_value(),
        Value::from("hey!")
    );
}

#[test]
fn inline_rules_compose_with_named_ones() {
    let shout = Rule::inline(|value| Value::String(value.as_display().to_uppercase()));
    let pipeline = shout >> append("!");
    assert_eq!(pipeline.names(), vec!["inline", "!"]);
    assert_eq!(pipeline.run(Value::from("hi")).unwrap(), Value::from("HI!"));
}

#[test]
fn malformed_expression_is_rejected_up_front() {
    let err = Rule::expression("(value").unwrap_err();
    assert!(matches!(err, FixtureError::Expression { .. }));
}

proptest! {
    #[test]
    fn composition_is_associative(start in "[a-z]{0,6}") {
        let left = (append("p") >> append("q")) >> append("r");
        let right = append("p") >> (append("q") >> append("r"));
        prop_assert_eq!(
            left.run(Value::from(start.as_str())).unwrap(),
            right.run(Value::from(start.as_str())).unwrap()
        );
    }
}
