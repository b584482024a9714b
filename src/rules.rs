//! Rule composition engine.
//!
//! A [`Rule`] maps one [`Value`] to a [`Step`]: either `Continue` with a value
//! for the next rule, or `Done` with the final value of the whole
//! [`Pipeline`]. Pipelines compose with [`Pipeline::then`] or the `>>`
//! operator; composing concatenates rule lists, so a `Done` from any operand
//! ends evaluation of the composite. Plain rules and short-circuiting rules
//! compose freely.
//!
//! Rules are shared behind `Arc` and hold no mutable state, so pipelines are
//! cheap to clone and evaluation is pure.

use std::{collections::BTreeMap, fmt, ops::Shr, sync::Arc};

use evalexpr::{ContextWithMutableVariables, HashMapContext, eval_with_context};

use crate::{
    data::{Value, value_from_evalexpr, value_to_evalexpr},
    error::{FixtureError, RuleFault},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Continue(Value),
    Done(Value),
}

impl Step {
    pub fn into_value(self) -> Value {
        match self {
            Step::Continue(value) | Step::Done(value) => value,
        }
    }
}

type RuleFn = dyn Fn(Value) -> Result<Step, RuleFault> + Send + Sync;

#[derive(Clone)]
pub struct Rule {
    name: Arc<str>,
    short_circuits: bool,
    func: Arc<RuleFn>,
}

impl Rule {
    /// A rule that may end the pipeline early.
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(Value) -> Result<Step, RuleFault> + Send + Sync + 'static,
    {
        Rule {
            name: Arc::from(name),
            short_circuits: true,
            func: Arc::new(func),
        }
    }

    /// A rule that always hands its result to the next rule.
    pub fn map<F>(name: &str, func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Rule {
            name: Arc::from(name),
            short_circuits: false,
            func: Arc::new(move |value| Ok(Step::Continue(func(value)))),
        }
    }

    pub fn try_map<F>(name: &str, func: F) -> Self
    where
        F: Fn(Value) -> Result<Value, RuleFault> + Send + Sync + 'static,
    {
        Rule {
            name: Arc::from(name),
            short_circuits: false,
            func: Arc::new(move |value| func(value).map(Step::Continue)),
        }
    }

    /// Ends the pipeline with `produce(value)` when `predicate` holds.
    pub fn finish_when<P, F>(name: &str, predicate: P, produce: F) -> Self
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Rule::new(name, move |value| {
            if predicate(&value) {
                Ok(Step::Done(produce(value)))
            } else {
                Ok(Step::Continue(value))
            }
        })
    }

    /// Replaces the value with `produce(value)` when `predicate` holds and keeps going.
    pub fn replace_when<P, F>(name: &str, predicate: P, produce: F) -> Self
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Rule::map(name, move |value| {
            if predicate(&value) {
                produce(value)
            } else {
                value
            }
        })
    }

    /// An anonymous one-shot rule.
    pub fn inline<F>(func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Rule::map("inline", func)
    }

    pub fn identity() -> Self {
        Rule::map("identity", |value| value)
    }

    pub fn constant(value: Value) -> Self {
        Rule::map("constant", move |_| value.clone())
    }

    /// Compiles an `evalexpr` expression into a rule. The incoming value is
    /// bound as `value`; `is_null` tells whether it was null.
    pub fn expression(expression: &str) -> Result<Self, FixtureError> {
        evalexpr::build_operator_tree::<evalexpr::DefaultNumericTypes>(expression).map_err(
            |err| FixtureError::Expression {
                expression: expression.to_string(),
                message: err.to_string(),
            },
        )?;
        let source: Arc<str> = Arc::from(expression);
        Ok(Rule::try_map(&format!("expr({expression})"), move |value| {
            let mut context: HashMapContext = HashMapContext::new();
            context
                .set_value("value".into(), value_to_evalexpr(&value))
                .map_err(|err| RuleFault::new(err.to_string()))?;
            context
                .set_value("is_null".into(), evalexpr::Value::Boolean(value.is_null()))
                .map_err(|err| RuleFault::new(err.to_string()))?;
            eval_with_context(&source, &context)
                .map(value_from_evalexpr)
                .map_err(|err| RuleFault::new(format!("Evaluating '{source}': {err}")))
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_circuits(&self) -> bool {
        self.short_circuits
    }

    pub fn apply(&self, value: Value) -> Result<Step, RuleFault> {
        (self.func)(value)
    }

    pub fn then(self, next: impl Into<Pipeline>) -> Pipeline {
        Pipeline::from(self).then(next)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("short_circuits", &self.short_circuits)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    rules: Vec<Rule>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline::default()
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Pipeline { rules }
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Composition: `self` runs first, then `next`.
    pub fn then(mut self, next: impl Into<Pipeline>) -> Pipeline {
        self.rules.extend(next.into().rules);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(Rule::name).collect()
    }

    /// Folds the rules over `input`, stopping at the first `Done`.
    pub fn run(&self, input: Value) -> Result<Value, RuleFault> {
        let mut acc = input;
        for rule in &self.rules {
            match rule.apply(acc)? {
                Step::Done(value) => return Ok(value),
                Step::Continue(value) => acc = value,
            }
        }
        Ok(acc)
    }
}

impl From<Rule> for Pipeline {
    fn from(rule: Rule) -> Self {
        Pipeline { rules: vec![rule] }
    }
}

impl<R: Into<Pipeline>> Shr<R> for Pipeline {
    type Output = Pipeline;

    fn shr(self, rhs: R) -> Pipeline {
        self.then(rhs)
    }
}

impl<R: Into<Pipeline>> Shr<R> for Rule {
    type Output = Pipeline;

    fn shr(self, rhs: R) -> Pipeline {
        self.then(rhs)
    }
}

/// Named, reusable rules.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: BTreeMap<String, Rule>,
}

impl RuleBook {
    pub fn new() -> Self {
        RuleBook::default()
    }

    /// Registers `rule` under its own name, returning any rule it replaced.
    pub fn register(&mut self, rule: Rule) -> Option<Rule> {
        self.rules.insert(rule.name().to_string(), rule)
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn pipeline(&self, names: &[&str]) -> Result<Pipeline, RuleFault> {
        names
            .iter()
            .map(|name| {
                self.get(name)
                    .cloned()
                    .ok_or_else(|| RuleFault::new(format!("Unknown rule '{name}'")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Pipeline::from_rules)
    }
}
