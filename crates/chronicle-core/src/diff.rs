//! Path-addressed state diffs and the pure diff applier.
//!
//! A [`StateDiff`] is an atomic operation against a nested JSON value tree,
//! addressed by a dot-joined path of plain identifiers. Literal dots inside
//! a key are not supported (no escaping). [`apply_diff`] is pure and
//! side-effect-free with respect to everything but the tree it is handed,
//! which keeps event replay deterministic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// The operation a [`StateDiff`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffOp {
    /// Replace (or create) the addressed value.
    Set,
    /// Numeric addition; the addressed value must already be a number.
    Add,
    /// Numeric subtraction; the addressed value must already be a number.
    Subtract,
    /// Numeric multiplication; the addressed value must already be a number.
    Multiply,
    /// Push onto the addressed array, creating an empty array if absent.
    Append,
    /// Remove the first matching element from the addressed array.
    Remove,
    /// Delete the addressed leaf key.
    Delete,
}

impl std::fmt::Display for DiffOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Set => "set",
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Append => "append",
            Self::Remove => "remove",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// An atomic, path-addressed state operation.
///
/// Immutable once attached to a committed event. `previous_value` is
/// captured at apply time by the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDiff {
    /// Dot-addressed path into the state tree (e.g. `actors.ranger.hp`).
    pub path: String,
    /// The operation to perform.
    pub op: DiffOp,
    /// Operand for the operation.
    pub value: Value,
    /// Value at `path` before the operation was applied, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_value: Option<Value>,
}

impl StateDiff {
    /// Creates a diff with no captured previous value.
    #[must_use]
    pub fn new(path: impl Into<String>, op: DiffOp, value: Value) -> Self {
        Self {
            path: path.into(),
            op,
            value,
            previous_value: None,
        }
    }
}

fn path_error(path: &str, reason: impl Into<String>) -> EngineError {
    EngineError::PathError {
        path: path.to_owned(),
        reason: reason.into(),
    }
}

fn type_mismatch(path: &str, op: DiffOp, expected: &'static str) -> EngineError {
    EngineError::TypeMismatch {
        path: path.to_owned(),
        op,
        expected,
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, EngineError> {
    if path.is_empty() {
        return Err(path_error(path, "path must not be empty"));
    }
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(path_error(path, "path contains an empty segment"));
    }
    Ok(segments)
}

/// Reads the value at `path`, if present.
#[must_use]
pub fn lookup<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = tree;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Walks to the parent object of the leaf segment, creating intermediate
/// objects when `create` is set. Returns the parent map and the leaf key.
fn parent_object<'a>(
    tree: &'a mut Value,
    path: &str,
    segments: &[&str],
    create: bool,
) -> Result<(&'a mut serde_json::Map<String, Value>, String), EngineError> {
    let mut current = tree;
    for segment in &segments[..segments.len() - 1] {
        let map = current
            .as_object_mut()
            .ok_or_else(|| path_error(path, format!("segment '{segment}' is not an object")))?;
        if !map.contains_key(*segment) {
            if create {
                map.insert((*segment).to_owned(), Value::Object(serde_json::Map::new()));
            } else {
                return Err(path_error(path, format!("segment '{segment}' does not exist")));
            }
        }
        current = map
            .get_mut(*segment)
            .ok_or_else(|| path_error(path, format!("segment '{segment}' does not exist")))?;
    }
    let map = current
        .as_object_mut()
        .ok_or_else(|| path_error(path, "parent of leaf is not an object"))?;
    let leaf = (*segments
        .last()
        .ok_or_else(|| path_error(path, "path must not be empty"))?)
    .to_owned();
    Ok((map, leaf))
}

/// Applies the numeric operation `op` to `current` and `operand`.
///
/// Integer arithmetic is used when both sides are integers and the result
/// does not overflow; otherwise the computation falls back to `f64`.
fn numeric_result(
    path: &str,
    op: DiffOp,
    current: &Value,
    operand: &Value,
) -> Result<Value, EngineError> {
    if !current.is_number() {
        return Err(type_mismatch(path, op, "a numeric current value"));
    }
    if !operand.is_number() {
        return Err(type_mismatch(path, op, "a numeric operand"));
    }

    if let (Some(lhs), Some(rhs)) = (current.as_i64(), operand.as_i64()) {
        let computed = match op {
            DiffOp::Add => lhs.checked_add(rhs),
            DiffOp::Subtract => lhs.checked_sub(rhs),
            DiffOp::Multiply => lhs.checked_mul(rhs),
            _ => None,
        };
        if let Some(n) = computed {
            return Ok(Value::from(n));
        }
    }

    let lhs = current.as_f64().ok_or_else(|| type_mismatch(path, op, "a numeric current value"))?;
    let rhs = operand.as_f64().ok_or_else(|| type_mismatch(path, op, "a numeric operand"))?;
    let result = match op {
        DiffOp::Add => lhs + rhs,
        DiffOp::Subtract => lhs - rhs,
        DiffOp::Multiply => lhs * rhs,
        _ => return Err(type_mismatch(path, op, "a numeric operation")),
    };
    serde_json::Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| type_mismatch(path, op, "a finite numeric result"))
}

/// Applies one diff to the tree, returning the previous value at the path.
///
/// The tree is mutated in place only when the operation succeeds; on error
/// the tree is left exactly as it was.
///
/// # Errors
///
/// Returns [`EngineError::PathError`] when a required path segment is
/// missing, and [`EngineError::TypeMismatch`] when the addressed value's
/// type does not support the operation.
pub fn apply_diff(tree: &mut Value, diff: &StateDiff) -> Result<Option<Value>, EngineError> {
    let segments = split_path(&diff.path)?;
    let previous = lookup(tree, &diff.path).cloned();

    match diff.op {
        DiffOp::Set => {
            let (map, leaf) = parent_object(tree, &diff.path, &segments, true)?;
            map.insert(leaf, diff.value.clone());
        }
        DiffOp::Add | DiffOp::Subtract | DiffOp::Multiply => {
            let current = previous
                .as_ref()
                .ok_or_else(|| path_error(&diff.path, "numeric operation on a missing value"))?;
            let next = numeric_result(&diff.path, diff.op, current, &diff.value)?;
            let (map, leaf) = parent_object(tree, &diff.path, &segments, false)?;
            map.insert(leaf, next);
        }
        DiffOp::Append => {
            match &previous {
                Some(Value::Array(_)) | None => {}
                Some(_) => return Err(type_mismatch(&diff.path, diff.op, "an array")),
            }
            let (map, leaf) = parent_object(tree, &diff.path, &segments, true)?;
            let entry = map.entry(leaf).or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = entry {
                items.push(diff.value.clone());
            }
        }
        DiffOp::Remove => {
            match &previous {
                Some(Value::Array(_)) => {}
                Some(_) => return Err(type_mismatch(&diff.path, diff.op, "an array")),
                None => return Err(path_error(&diff.path, "remove from a missing array")),
            }
            let (map, leaf) = parent_object(tree, &diff.path, &segments, false)?;
            if let Some(Value::Array(items)) = map.get_mut(&leaf) {
                // Removing an element that is not present is a no-op.
                if let Some(index) = items.iter().position(|item| *item == diff.value) {
                    items.remove(index);
                }
            }
        }
        DiffOp::Delete => {
            if previous.is_none() {
                return Err(path_error(&diff.path, "delete of a missing value"));
            }
            let (map, leaf) = parent_object(tree, &diff.path, &segments, false)?;
            map.remove(&leaf);
        }
    }

    Ok(previous)
}
