//! Table query description shared by every [`DataService`](crate::DataService)
//! implementation.
//!
//! A [`Query`] names a table, optional equality / membership filters, an
//! ordering, a row limit, and related rows to embed. The HTTP backend renders
//! it as PostgREST query parameters; the in-memory backend evaluates it
//! directly against JSON rows.

use std::cmp::Ordering;

use serde_json::Value;

/// Table names of the remote store.
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const COURSES: &str = "courses";
    pub const CLASS_SESSIONS: &str = "class_sessions";
    pub const CLASS_RECORDS: &str = "class_records";
    pub const WORK_DETAILS: &str = "work_details";
    pub const WORK_ACTIVITIES: &str = "work_activities";
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    In(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A related row pulled in through a foreign key on the queried table.
///
/// The embedded object appears under the related table's name, e.g.
/// `{"courses": {"name": "..", "code": ".."}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embed {
    pub table: String,
    pub foreign_key: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
    pub embeds: Vec<Embed>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
            embeds: Vec::new(),
        }
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op: FilterOp::Eq(value.into()),
        });
        self
    }

    pub fn in_list<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filters.push(Filter {
            column: column.into(),
            op: FilterOp::In(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Newest rows first, the ordering every portal listing uses.
    pub fn newest_first(self) -> Self {
        self.order("created_at", false)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn embed(
        mut self,
        table: impl Into<String>,
        foreign_key: impl Into<String>,
        columns: &[&str],
    ) -> Self {
        self.embeds.push(Embed {
            table: table.into(),
            foreign_key: foreign_key.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    /// The PostgREST `select` parameter.
    pub fn select_clause(&self) -> String {
        let mut parts = vec!["*".to_string()];
        for embed in &self.embeds {
            parts.push(format!(
                "{}!{}({})",
                embed.table,
                embed.foreign_key,
                embed.columns.join(",")
            ));
        }
        parts.join(",")
    }

    /// Filter parameters only (`column=op.value`).
    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .map(|f| {
                let rendered = match &f.op {
                    FilterOp::Eq(v) => format!("eq.{}", render_value(v, false)),
                    FilterOp::In(vs) => {
                        let items: Vec<String> = vs.iter().map(|v| render_value(v, true)).collect();
                        format!("in.({})", items.join(","))
                    }
                };
                (f.column.clone(), rendered)
            })
            .collect()
    }

    /// Full parameter list for a read: select, filters, order, limit.
    pub fn read_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.select_clause())];
        params.extend(self.filter_params());
        if let Some(order) = &self.order {
            let dir = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{dir}", order.column)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    /// Whether `row` satisfies every filter.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| {
            let actual = row.get(&f.column).unwrap_or(&Value::Null);
            match &f.op {
                FilterOp::Eq(v) => values_equal(actual, v),
                FilterOp::In(vs) => vs.iter().any(|v| values_equal(actual, v)),
            }
        })
    }
}

/// Render a filter value. Inside `in.(..)` lists, values containing list
/// syntax are double-quoted.
fn render_value(value: &Value, in_list: bool) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    };
    if in_list && raw.contains([',', '(', ')', '"']) {
        format!("\"{}\"", raw.replace('"', "\\\""))
    } else {
        raw
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering used for `order` clauses: nulls last, numbers numerically,
/// everything else by its string form.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
