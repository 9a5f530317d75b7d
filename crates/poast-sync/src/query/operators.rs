//! Condition evaluation for the query engine.
//!
//! Comparison semantics follow SQL: any ordered or equality comparison with a
//! null side is false; only `IS` / `IS NOT` match null.

use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::error::QueryError;
use crate::types::Row;

use super::types::{Condition, Operator};

// ============================================================================
// Value Comparison
// ============================================================================

/// Compare two JSON values for ordering.
///
/// - Both Null → Equal
/// - a is Null → Greater (nulls sort to end)
/// - b is Null → Less
/// - Both numbers → f64 comparison (NaN treated as Equal)
/// - Both strings → lexicographic (codepoint order)
/// - Both booleans → false < true
/// - Cross-type → type rank: number(0), string(1), bool(2), other(3)
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(na), Value::Number(nb)) => {
            let fa = na.as_f64().unwrap_or(f64::NAN);
            let fb = nb.as_f64().unwrap_or(f64::NAN);
            fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
        }
        (Value::String(sa), Value::String(sb)) => sa.cmp(sb),
        (Value::Bool(ba), Value::Bool(bb)) => ba.cmp(bb),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Number(_) => 0,
        Value::String(_) => 1,
        Value::Bool(_) => 2,
        _ => 3,
    }
}

/// Equality that treats `1` and `1.0` as the same number.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Ordering::Equal,
        _ => a == b,
    }
}

// ============================================================================
// LIKE patterns
// ============================================================================

/// Translate a LIKE pattern into an anchored regex.
///
/// `%` matches any run of characters, `_` exactly one, and `\` makes the next
/// character literal. A trailing lone `\` is an error.
pub fn like_to_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, QueryError> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            '\\' => match chars.next() {
                Some(next) => re.push_str(&regex::escape(&next.to_string())),
                None => {
                    return Err(QueryError::InvalidPattern(format!(
                        "pattern ends with an escape character: {pattern}"
                    )))
                }
            },
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');

    RegexBuilder::new(&re)
        .case_insensitive(case_insensitive)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| QueryError::InvalidPattern(e.to_string()))
}

// ============================================================================
// Compiled Conditions
// ============================================================================

/// A condition with its LIKE pattern compiled once per execution.
#[derive(Debug)]
pub struct CompiledCondition<'a> {
    pub condition: &'a Condition,
    pattern: Option<Regex>,
}

impl<'a> CompiledCondition<'a> {
    pub fn compile(condition: &'a Condition) -> Result<Self, QueryError> {
        let pattern = match (condition.op, condition.value.as_str()) {
            (Operator::Like | Operator::NotLike, Some(p)) => Some(like_to_regex(p, false)?),
            (Operator::ILike | Operator::NotILike, Some(p)) => Some(like_to_regex(p, true)?),
            _ => None,
        };
        Ok(Self { condition, pattern })
    }

    /// Evaluate against a row. Missing columns read as null.
    pub fn matches(&self, row: &Row) -> bool {
        let value = row.get(&self.condition.column).unwrap_or(&Value::Null);
        let operand = &self.condition.value;

        match self.condition.op {
            Operator::Is => values_equal(value, operand),
            Operator::IsNot => !values_equal(value, operand),
            _ if value.is_null() || operand.is_null() => false,
            Operator::Eq => values_equal(value, operand),
            Operator::Ne => !values_equal(value, operand),
            Operator::Lt => compare_values(value, operand) == Ordering::Less,
            Operator::Le => compare_values(value, operand) != Ordering::Greater,
            Operator::Gt => compare_values(value, operand) == Ordering::Greater,
            Operator::Ge => compare_values(value, operand) != Ordering::Less,
            Operator::In => operand
                .as_array()
                .is_some_and(|items| items.iter().any(|item| values_equal(value, item))),
            Operator::NotIn => operand
                .as_array()
                .is_some_and(|items| !items.iter().any(|item| values_equal(value, item))),
            Operator::Like | Operator::ILike => self.pattern_matches(value),
            Operator::NotLike | Operator::NotILike => {
                value.is_string() && !self.pattern_matches(value)
            }
        }
    }

    fn pattern_matches(&self, value: &Value) -> bool {
        match (&self.pattern, value.as_str()) {
            (Some(re), Some(s)) => re.is_match(s),
            _ => false,
        }
    }
}

/// Compile every condition; fails on the first malformed pattern.
pub fn compile_conditions(conditions: &[Condition]) -> Result<Vec<CompiledCondition<'_>>, QueryError> {
    conditions.iter().map(CompiledCondition::compile).collect()
}

/// True if `row` satisfies every compiled condition.
pub fn matches_all(conditions: &[CompiledCondition<'_>], row: &Row) -> bool {
    conditions.iter().all(|c| c.matches(row))
}

// ============================================================================
// Tests
// ============================================================================
