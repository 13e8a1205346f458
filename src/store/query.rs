use std::cmp::Ordering;

use serde_json::Value;

use super::{CollectionPath, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    NotEq,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter { field: field.into(), op: FilterOp::Eq, value: value.into() }
    }

    pub fn not_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter { field: field.into(), op: FilterOp::NotEq, value: value.into() }
    }

    fn matches(&self, doc: &Document) -> bool {
        match (self.op, doc.get(&self.field)) {
            (FilterOp::Eq, Some(v)) => *v == self.value,
            (FilterOp::Eq, None) => false,
            // documents without the field never satisfy `!=`
            (FilterOp::NotEq, Some(v)) => *v != self.value,
            (FilterOp::NotEq, None) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: CollectionPath,
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: CollectionPath) -> Self {
        Query { collection, filters: Vec::new(), order: None, limit: None }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some(OrderBy { field: field.into(), direction });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluates the query over every document of its collection.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs
            .into_iter()
            .filter(|doc| self.filters.iter().all(|f| f.matches(doc)))
            .collect();

        // Keys are time-ordered, so ties on the sort field fall back to
        // creation order in the declared direction.
        out.sort_by(|a, b| match &self.order {
            Some(OrderBy { field, direction }) => {
                let ord = compare_values(a.get(field), b.get(field)).then_with(|| a.id.cmp(&b.id));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            }
            None => a.id.cmp(&b.id),
        });

        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total order over JSON values: by type first, then by value.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Array(x)), Some(Value::Array(y))) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare_values(Some(l), Some(r));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::CollectionPath;

    fn doc(id: &str, data: Value) -> Document {
        Document { id: id.into(), data: data.as_object().cloned().unwrap() }
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    fn threads() -> Query {
        Query::new(CollectionPath::new(["forum-threads"]).unwrap())
    }

    #[test]
    fn orders_descending_with_id_tiebreak() {
        let docs = vec![
            doc("b", json!({ "createdAt": 10 })),
            doc("a", json!({ "createdAt": 10 })),
            doc("c", json!({ "createdAt": 30 })),
            doc("d", json!({})),
        ];
        let out = threads().order_by("createdAt", Direction::Descending).apply(docs);
        assert_eq!(ids(&out), ["c", "b", "a", "d"]);
    }

    #[test]
    fn same_timestamp_newest_first_follows_creation_order() {
        let docs = vec![
            doc("0192a1", json!({ "createdAt": 7 })),
            doc("0192a3", json!({ "createdAt": 7 })),
            doc("0192a2", json!({ "createdAt": 7 })),
        ];
        let newest = threads().order_by("createdAt", Direction::Descending).apply(docs.clone());
        assert_eq!(ids(&newest), ["0192a3", "0192a2", "0192a1"]);

        let oldest = threads().order_by("createdAt", Direction::Ascending).apply(docs);
        assert_eq!(ids(&oldest), ["0192a1", "0192a2", "0192a3"]);
    }

    #[test]
    fn missing_sort_keys_come_first_ascending() {
        let docs = vec![
            doc("x", json!({ "timestamp": 5 })),
            doc("y", json!({ "timestamp": null })),
        ];
        let out = threads().order_by("timestamp", Direction::Ascending).apply(docs);
        assert_eq!(ids(&out), ["y", "x"]);
    }

    #[test]
    fn not_eq_skips_documents_without_the_field() {
        let docs = vec![
            doc("me", json!({ "userId": "me" })),
            doc("you", json!({ "userId": "you" })),
            doc("ghost", json!({ "username": "?" })),
        ];
        let out = threads().filter(Filter::not_eq("userId", "me")).apply(docs);
        assert_eq!(ids(&out), ["you"]);
    }

    #[test]
    fn limit_applies_after_ordering() {
        let docs = (0..5).map(|i| doc(&format!("d{i}"), json!({ "n": i }))).collect::<Vec<_>>();
        let out = threads().order_by("n", Direction::Descending).limit(3).apply(docs);
        assert_eq!(ids(&out), ["d4", "d3", "d2"]);
    }

    #[test]
    fn values_compare_by_type_rank() {
        assert_eq!(compare_values(Some(&json!(1)), Some(&json!("1"))), Ordering::Less);
        assert_eq!(compare_values(None, Some(&json!(false))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!(2.5)), Some(&json!(2))), Ordering::Greater);
    }
}
