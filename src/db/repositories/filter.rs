//! WHERE-clause builder for list queries with optional filters

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Int(i64),
    Text(String),
    Bool(bool),
}

/// Accumulates `AND`-joined conditions and their bind values in order.
#[derive(Debug, Clone, Default)]
pub struct WhereClause {
    conditions: Vec<String>,
    binds: Vec<BindValue>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition with one placeholder per value
    pub fn push(&mut self, condition: impl Into<String>, values: impl IntoIterator<Item = BindValue>) -> &mut Self {
        self.conditions.push(condition.into());
        self.binds.extend(values);
        self
    }

    /// `column = ?` when a value is given
    pub fn eq_int(&mut self, column: &str, value: Option<i64>) -> &mut Self {
        if let Some(v) = value {
            self.push(format!("{} = ?", column), [BindValue::Int(v)]);
        }
        self
    }

    pub fn eq_bool(&mut self, column: &str, value: Option<bool>) -> &mut Self {
        if let Some(v) = value {
            self.push(format!("{} = ?", column), [BindValue::Bool(v)]);
        }
        self
    }

    pub fn eq_text(&mut self, column: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            self.push(format!("{} = ?", column), [BindValue::Text(v.to_string())]);
        }
        self
    }

    /// `(a LIKE ? OR b LIKE ? ...)` over the given columns; blank terms are ignored
    pub fn search(&mut self, columns: &[&str], term: Option<&str>) -> &mut Self {
        let term = match term.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return self,
        };
        let pattern = format!("%{}%", term);
        let condition = columns
            .iter()
            .map(|c| format!("{} LIKE ?", c))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.push(
            format!("({})", condition),
            columns.iter().map(|_| BindValue::Text(pattern.clone())),
        );
        self
    }

    /// The clause text, including the leading ` WHERE`, or empty
    pub fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn binds(&self) -> &[BindValue] {
        &self.binds
    }
}

/// Bind every value of a [`WhereClause`] onto a `sqlx::query`, in order.
macro_rules! bind_values {
    ($query:expr, $values:expr) => {{
        let mut query = $query;
        for value in $values {
            query = match value {
                $crate::db::repositories::filter::BindValue::Int(v) => query.bind(*v),
                $crate::db::repositories::filter::BindValue::Text(v) => query.bind(v.clone()),
                $crate::db::repositories::filter::BindValue::Bool(v) => query.bind(*v),
            };
        }
        query
    }};
}

pub(crate) use bind_values;
