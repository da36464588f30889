use serde_json::{json, Value};

/// Typed filter for document listing.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Attribute equals one of `values`; on array attributes any element may match.
    Equal { attribute: String, values: Vec<Value> },
    /// Array attribute contains one of `values`.
    Contains { attribute: String, values: Vec<Value> },
    Limit(u32),
    Offset(u32),
    OrderDesc(String),
}

impl Query {
    pub fn equal(attribute: &str, value: impl Into<Value>) -> Self {
        Query::Equal {
            attribute: attribute.to_string(),
            values: vec![value.into()],
        }
    }

    pub fn contains(attribute: &str, value: impl Into<Value>) -> Self {
        Query::Contains {
            attribute: attribute.to_string(),
            values: vec![value.into()],
        }
    }

    pub fn limit(limit: u32) -> Self {
        Query::Limit(limit)
    }

    pub fn offset(offset: u32) -> Self {
        Query::Offset(offset)
    }

    pub fn order_desc(attribute: &str) -> Self {
        Query::OrderDesc(attribute.to_string())
    }

    /// Wire form expected in `queries[]` parameters.
    pub fn to_json(&self) -> Value {
        match self {
            Query::Equal { attribute, values } => json!({
                "method": "equal",
                "attribute": attribute,
                "values": values,
            }),
            Query::Contains { attribute, values } => json!({
                "method": "contains",
                "attribute": attribute,
                "values": values,
            }),
            Query::Limit(n) => json!({ "method": "limit", "values": [n] }),
            Query::Offset(n) => json!({ "method": "offset", "values": [n] }),
            Query::OrderDesc(attribute) => json!({
                "method": "orderDesc",
                "attribute": attribute,
            }),
        }
    }

    /// Whether `document` passes this filter. Paging and ordering always pass.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Query::Equal { attribute, values } => match document.get(attribute) {
                Some(Value::Array(items)) => items.iter().any(|item| values.contains(item)),
                Some(field) => values.contains(field),
                None => false,
            },
            Query::Contains { attribute, values } => match document.get(attribute) {
                Some(Value::Array(items)) => items.iter().any(|item| values.contains(item)),
                _ => false,
            },
            Query::Limit(_) | Query::Offset(_) | Query::OrderDesc(_) => true,
        }
    }
}
