//! Evaluation of decoded `where` / `sort` / `select` options against JSON
//! documents. Both store backends serialize records to `serde_json::Value`
//! and run them through here, so filtering behaves the same everywhere.

use std::cmp::Ordering;
use serde_json::{Map, Value};

/// A document filter: field conditions implicitly ANDed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Map<String, Value>);

impl Filter {
    pub fn new(conditions: Map<String, Value>) -> Self {
        Self(conditions)
    }

    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::all().and(field, value)
    }

    pub fn id_in(ids: &[String]) -> Self {
        Self::eq("_id", serde_json::json!({ "$in": ids }))
    }

    pub fn and(mut self, field: &str, condition: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), condition.into());
        self
    }

    pub fn matches(&self, document: &Value) -> bool {
        matches_conditions(&self.0, document)
    }
}

fn matches_conditions(conditions: &Map<String, Value>, document: &Value) -> bool {
    conditions.iter().all(|(key, condition)| match key.as_str() {
        "$and" => sub_filters(condition).map_or(false, |mut subs| subs.all(|c| matches_conditions(c, document))),
        "$or" => sub_filters(condition).map_or(false, |mut subs| subs.any(|c| matches_conditions(c, document))),
        field => field_matches(lookup(document, field), condition),
    })
}

fn sub_filters(condition: &Value) -> Option<impl Iterator<Item = &Map<String, Value>>> {
    let items = condition.as_array()?;
    if items.iter().any(|item| !item.is_object()) {
        return None;
    }
    Some(items.iter().filter_map(Value::as_object))
}

/// Resolves a dotted path such as `address.city` or `pendingTasks.0`.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn field_matches(actual: Option<&Value>, condition: &Value) -> bool {
    match condition {
        Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => {
            ops.iter().all(|(op, operand)| apply_operator(actual, op, operand))
        }
        expected => equals(actual, expected),
    }
}

fn apply_operator(actual: Option<&Value>, op: &str, operand: &Value) -> bool {
    match op {
        "$eq" => equals(actual, operand),
        "$ne" => !equals(actual, operand),
        "$gt" => ranged(actual, operand, |o| o == Ordering::Greater),
        "$gte" => ranged(actual, operand, |o| o != Ordering::Less),
        "$lt" => ranged(actual, operand, |o| o == Ordering::Less),
        "$lte" => ranged(actual, operand, |o| o != Ordering::Greater),
        "$in" => operand
            .as_array()
            .map_or(false, |choices| choices.iter().any(|c| equals(actual, c))),
        "$nin" => operand
            .as_array()
            .map_or(false, |choices| !choices.iter().any(|c| equals(actual, c))),
        "$exists" => actual.is_some() == truthy(operand),
        _ => false,
    }
}

fn equals(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => {
            items.iter().any(|item| same_value(item, expected))
        }
        Some(value) => same_value(value, expected),
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

// Range operators only compare values of the same type class
fn ranged(actual: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let check = |value: &Value| type_rank(value) == type_rank(operand) && accept(compare_values(value, operand));
    match actual {
        Some(Value::Array(items)) if !operand.is_array() => items.iter().any(check),
        Some(value) => check(value),
        None => false,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order over JSON values: null < number < string < object < array < bool.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| compare_values(l, r))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Sort keys applied in the order the client listed them.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort(Vec<(String, Direction)>);

impl Sort {
    pub fn from_object(object: Map<String, Value>) -> Self {
        let keys = object
            .into_iter()
            .map(|(field, direction)| {
                let descending = match &direction {
                    Value::Number(n) => n.as_f64().map_or(false, |d| d < 0.0),
                    Value::String(s) => matches!(s.as_str(), "-1" | "desc" | "descending"),
                    _ => false,
                };
                let direction = if descending { Direction::Descending } else { Direction::Ascending };
                (field, direction)
            })
            .collect();
        Self(keys)
    }

    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        static NULL: Value = Value::Null;
        self.0
            .iter()
            .map(|(field, direction)| {
                let ordering = compare_values(
                    lookup(a, field).unwrap_or(&NULL),
                    lookup(b, field).unwrap_or(&NULL),
                );
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ProjectionMode {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

/// Top-level field selection. `_id` survives unless excluded explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    mode: ProjectionMode,
    keep_id: bool,
}

impl Projection {
    pub fn from_object(object: Map<String, Value>) -> Self {
        let mut keep_id = true;
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        for (field, flag) in object {
            if field == "_id" {
                keep_id = truthy(&flag);
            } else if truthy(&flag) {
                included.push(field);
            } else {
                excluded.push(field);
            }
        }
        let mode = if included.is_empty() {
            ProjectionMode::Exclude(excluded)
        } else {
            ProjectionMode::Include(included)
        };
        Self { mode, keep_id }
    }

    pub fn apply(&self, document: Value) -> Value {
        let mut fields = match document {
            Value::Object(fields) => fields,
            other => return other,
        };
        let mut projected = match &self.mode {
            ProjectionMode::Include(keep) => {
                let mut selected = Map::new();
                if let Some(id) = fields.remove("_id") {
                    selected.insert("_id".to_string(), id);
                }
                for field in keep {
                    if let Some(value) = fields.remove(field) {
                        selected.insert(field.clone(), value);
                    }
                }
                selected
            }
            ProjectionMode::Exclude(drop) => {
                for field in drop {
                    fields.remove(field);
                }
                fields
            }
        };
        if !self.keep_id {
            projected.remove("_id");
        }
        Value::Object(projected)
    }
}

/// Everything a find-many call can be constrained by.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub filter: Filter,
    pub sort: Option<Sort>,
    pub projection: Option<Projection>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindOptions {
    /// Sorts, pages and projects documents that already passed the filter.
    pub fn shape(&self, mut documents: Vec<Value>) -> Vec<Value> {
        if let Some(sort) = &self.sort {
            documents.sort_by(|a, b| sort.compare(a, b));
        }
        let skip = self.skip.unwrap_or(0) as usize;
        let limit = self.limit.map_or(usize::MAX, |l| l as usize);
        documents
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| match &self.projection {
                Some(projection) => projection.apply(doc),
                None => doc,
            })
            .collect()
    }

    /// Size of the page `shape` would return for `matched` filtered documents.
    pub fn window(&self, matched: u64) -> u64 {
        let remaining = matched.saturating_sub(self.skip.unwrap_or(0));
        self.limit.map_or(remaining, |limit| remaining.min(limit))
    }
}
