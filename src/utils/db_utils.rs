use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::MySql;
use sqlx::mysql::MySqlArguments;
use sqlx::query::{Query, QueryAs, QueryScalar};

use crate::error::ApiError;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

/// Binds in order; one match per query kind since sqlx has no common trait.
pub fn bind_query<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::String(v) => query.bind(v.as_str()),
            SqlValue::U64(v) => query.bind(*v),
            SqlValue::I64(v) => query.bind(*v),
            SqlValue::F64(v) => query.bind(*v),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Date(v) => query.bind(*v),
            SqlValue::DateTime(v) => query.bind(*v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }
    query
}

pub fn bind_query_as<'q, O>(
    mut query: QueryAs<'q, MySql, O, MySqlArguments>,
    values: &'q [SqlValue],
) -> QueryAs<'q, MySql, O, MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::String(v) => query.bind(v.as_str()),
            SqlValue::U64(v) => query.bind(*v),
            SqlValue::I64(v) => query.bind(*v),
            SqlValue::F64(v) => query.bind(*v),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Date(v) => query.bind(*v),
            SqlValue::DateTime(v) => query.bind(*v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }
    query
}

pub fn bind_query_scalar<'q, O>(
    mut query: QueryScalar<'q, MySql, O, MySqlArguments>,
    values: &'q [SqlValue],
) -> QueryScalar<'q, MySql, O, MySqlArguments> {
    for value in values {
        query = match value {
            SqlValue::String(v) => query.bind(v.as_str()),
            SqlValue::U64(v) => query.bind(*v),
            SqlValue::I64(v) => query.bind(*v),
            SqlValue::F64(v) => query.bind(*v),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Date(v) => query.bind(*v),
            SqlValue::DateTime(v) => query.bind(*v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }
    query
}

/// ===============================
/// WHERE clause builder for list endpoints
/// ===============================
#[derive(Debug, Default)]
pub struct SqlFilter {
    conditions: Vec<String>,
    pub values: Vec<SqlValue>,
}

impl SqlFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = ?`; skipped when `value` is None.
    pub fn eq<V: Into<SqlValue>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.conditions.push(format!("{column} = ?"));
            self.values.push(v.into());
        }
        self
    }

    pub fn gte<V: Into<SqlValue>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.conditions.push(format!("{column} >= ?"));
            self.values.push(v.into());
        }
        self
    }

    pub fn lte<V: Into<SqlValue>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.conditions.push(format!("{column} <= ?"));
            self.values.push(v.into());
        }
        self
    }

    /// Raw condition with its own placeholders.
    pub fn push(&mut self, condition: &str, values: Vec<SqlValue>) -> &mut Self {
        self.conditions.push(condition.to_string());
        self.values.extend(values);
        self
    }

    pub fn where_sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}

/// ===============================
/// Pagination
/// ===============================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBounds {
    pub page: u32,
    pub per_page: u32,
    pub offset: u64,
}

pub fn page_bounds(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> PageBounds {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(default_per_page).clamp(1, 100);
    PageBounds {
        page,
        per_page,
        offset: (page as u64 - 1) * per_page as u64,
    }
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Build dynamic UPDATE SQL from a JSON object, restricted to `allowed`
/// columns so request keys never reach the SQL text unchecked.
/// ===============================
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    if let Some(bad) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ApiError::bad_request(format!("Field '{bad}' cannot be updated")));
    }

    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);

    for value in obj.values() {
        let v = match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    SqlValue::Date(d)
                } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                    SqlValue::DateTime(dt)
                } else {
                    SqlValue::String(s.clone())
                }
            }
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    SqlValue::U64(u)
                } else if let Some(i) = n.as_i64() {
                    SqlValue::I64(i)
                } else if let Some(f) = n.as_f64() {
                    SqlValue::F64(f)
                } else {
                    return Err(ApiError::bad_request("Unsupported number"));
                }
            }
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Null => SqlValue::Null,
            _ => return Err(ApiError::bad_request("Unsupported JSON value type")),
        };
        values.push(v);
    }

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update<'c, E>(executor: E, update: &SqlUpdate) -> Result<u64, sqlx::Error>
where
    E: sqlx::Executor<'c, Database = MySql>,
{
    let result = bind_query(sqlx::query(&update.sql), &update.values)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_sql_binds_values_in_key_order() {
        let payload = json!({"first_name": "Jane", "hire_date": "2026-01-05"});
        let update =
            build_update_sql("employees", &payload, &["first_name", "hire_date"], "id", 9).unwrap();

        assert_eq!(
            update.sql,
            "UPDATE employees SET first_name = ?, hire_date = ? WHERE id = ?"
        );
        assert_eq!(
            update.values,
            vec![
                SqlValue::String("Jane".into()),
                SqlValue::Date(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()),
                SqlValue::U64(9),
            ]
        );
    }

    #[test]
    fn update_sql_rejects_columns_outside_allow_list() {
        let payload = json!({"status = 'x'; --": 1});
        assert!(matches!(
            build_update_sql("employees", &payload, &["first_name"], "id", 1),
            Err(ApiError::BadRequest(_))
        ));
        assert!(build_update_sql("employees", &json!({}), &["first_name"], "id", 1).is_err());
        assert!(build_update_sql("employees", &json!([1]), &["first_name"], "id", 1).is_err());
    }

    #[test]
    fn filter_skips_missing_values() {
        let mut filter = SqlFilter::new();
        filter
            .eq("employee_id", Some(4u64))
            .eq::<&str>("status", None)
            .gte("date", Some(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));

        assert_eq!(filter.where_sql(), " WHERE employee_id = ? AND date >= ?");
        assert_eq!(filter.values.len(), 2);
        assert_eq!(SqlFilter::new().where_sql(), "");
    }

    #[test]
    fn page_bounds_are_clamped() {
        assert_eq!(
            page_bounds(None, None, 20),
            PageBounds { page: 1, per_page: 20, offset: 0 }
        );
        assert_eq!(
            page_bounds(Some(0), Some(1000), 20),
            PageBounds { page: 1, per_page: 100, offset: 0 }
        );
        assert_eq!(page_bounds(Some(3), Some(10), 20).offset, 20);
    }
}
