use std::cmp::Ordering;

use serde_json::Value;

use crate::document::Document;
use crate::error::DocError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
struct FieldFilter {
    field: String,
    value: Value,
}

#[derive(Debug, Clone, PartialEq)]
struct OrderBy {
    field: String,
    direction: Direction,
}

/// A filtered, ordered read of one collection.
///
/// Filters are top-level field equality, combined with AND. When an order
/// field is set, documents that lack that field are excluded from the
/// result. Ties on the order field fall back to document id ascending.
///
/// ```ignore
/// let q = Query::collection("materials")
///     .where_eq("class", "CSE-2A")
///     .order_by("uploadDate", Direction::Descending);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: String,
    filters: Vec<FieldFilter>,
    order: Option<OrderBy>,
    limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    /// Reject queries the store cannot evaluate.
    pub fn validate(&self) -> Result<(), DocError> {
        if self.collection.is_empty() || self.collection.contains('/') {
            return Err(DocError::InvalidQuery(format!(
                "invalid collection name: {:?}",
                self.collection
            )));
        }
        if self.filters.iter().any(|f| f.field.is_empty()) {
            return Err(DocError::InvalidQuery("empty filter field".into()));
        }
        if matches!(&self.order, Some(o) if o.field.is_empty()) {
            return Err(DocError::InvalidQuery("empty order field".into()));
        }
        Ok(())
    }

    /// Whether a document passes the filters (and carries the order field).
    pub fn matches(&self, doc: &Document) -> bool {
        let filters_ok = self
            .filters
            .iter()
            .all(|f| doc.field(&f.field) == Some(&f.value));
        let order_ok = match &self.order {
            Some(o) => doc.field(&o.field).is_some(),
            None => true,
        };
        filters_ok && order_ok
    }

    /// Filter, sort and truncate a full collection scan.
    pub fn apply(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();

        match &self.order {
            Some(o) => out.sort_by(|a, b| {
                let null = Value::Null;
                let av = a.field(&o.field).unwrap_or(&null);
                let bv = b.field(&o.field).unwrap_or(&null);
                let primary = match o.direction {
                    Direction::Ascending => compare_values(av, bv),
                    Direction::Descending => compare_values(bv, av),
                };
                primary.then_with(|| a.id.cmp(&b.id))
            }),
            None => out.sort_by(|a, b| a.id.cmp(&b.id)),
        }

        if let Some(n) = self.limit {
            out.truncate(n);
        }
        out
    }
}

/// Total order over JSON values: null < bool < number < string < array < object.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xa, ya) in x.iter().zip(y.iter()) {
                let ord = compare_values(xa, ya);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}
