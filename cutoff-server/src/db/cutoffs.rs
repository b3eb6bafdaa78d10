//! Cutoff table operations

use cutoff_common::Result;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::models::{CutoffRecord, PredictFilters, PredictQuery, PredictedCollege};

const RECORD_COLUMNS: &str =
    "college_id, college_name, branch_id, branch_name, status, category, rank, percentile";

/// Filterable text column of `cutoff_data`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    CollegeName,
    BranchName,
    Category,
}

impl FilterField {
    pub const ALL: [FilterField; 3] = [
        FilterField::CollegeName,
        FilterField::BranchName,
        FilterField::Category,
    ];

    pub fn column(self) -> &'static str {
        match self {
            FilterField::CollegeName => "college_name",
            FilterField::BranchName => "branch_name",
            FilterField::Category => "category",
        }
    }

    /// Value of this field in a filter set
    pub fn value(self, filters: &PredictFilters) -> Option<&str> {
        match self {
            FilterField::CollegeName => filters.college_name.as_deref(),
            FilterField::BranchName => filters.branch_name.as_deref(),
            FilterField::Category => filters.category.as_deref(),
        }
    }

    /// Copy of `filters` with this field removed
    pub fn without(self, filters: &PredictFilters) -> PredictFilters {
        let mut relaxed = filters.clone();
        match self {
            FilterField::CollegeName => relaxed.college_name = None,
            FilterField::BranchName => relaxed.branch_name = None,
            FilterField::Category => relaxed.category = None,
        }
        relaxed
    }
}

/// Insert one validated record, skipping duplicates
///
/// Returns true when a row was written, false when the uniqueness key
/// already existed.
pub async fn insert_record(pool: &SqlitePool, record: &CutoffRecord) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO cutoff_data (
            college_id, college_name, branch_id, branch_name,
            status, category, rank, percentile
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.college_id)
    .bind(&record.college_name)
    .bind(&record.branch_id)
    .bind(&record.branch_name)
    .bind(&record.status)
    .bind(&record.category)
    .bind(&record.rank)
    .bind(record.percentile)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Total number of rows
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cutoff_data")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// One page of rows ordered by college name, then branch name
pub async fn list_page(pool: &SqlitePool, offset: i64, limit: i64) -> Result<Vec<CutoffRecord>> {
    let sql = format!(
        "SELECT {} FROM cutoff_data ORDER BY college_name, branch_name, id LIMIT ? OFFSET ?",
        RECORD_COLUMNS
    );
    let rows = sqlx::query_as::<_, CutoffRecord>(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Every row, in the same order as [`list_page`]
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<CutoffRecord>> {
    let sql = format!(
        "SELECT {} FROM cutoff_data ORDER BY college_name, branch_name, id",
        RECORD_COLUMNS
    );
    let rows = sqlx::query_as::<_, CutoffRecord>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

/// Distinct non-empty values of one column, sorted ascending
pub async fn distinct_values(pool: &SqlitePool, field: FilterField) -> Result<Vec<String>> {
    let column = field.column();
    let sql = format!(
        "SELECT DISTINCT {col} FROM cutoff_data WHERE {col} <> '' ORDER BY {col} ASC",
        col = column
    );
    let values = sqlx::query_scalar::<_, String>(&sql).fetch_all(pool).await?;
    Ok(values)
}

/// Delete every row; returns the number removed
pub async fn clear(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM cutoff_data").execute(pool).await?;
    Ok(result.rows_affected())
}

/// Escape LIKE wildcards in user input (escape char `\`)
fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Append the percentile window and filter predicates to a query
fn push_conditions(
    builder: &mut QueryBuilder<'_, Sqlite>,
    (low, high): (f64, f64),
    filters: &PredictFilters,
) {
    builder
        .push(" WHERE percentile BETWEEN ")
        .push_bind(low)
        .push(" AND ")
        .push_bind(high);

    if let Some(college) = filters.college_name.as_deref() {
        builder
            .push(" AND LOWER(college_name) LIKE LOWER(")
            .push_bind(like_pattern(college))
            .push(") ESCAPE '\\'");
    }
    if let Some(branch) = filters.branch_name.as_deref() {
        builder
            .push(" AND LOWER(branch_name) LIKE LOWER(")
            .push_bind(like_pattern(branch))
            .push(") ESCAPE '\\'");
    }
    if let Some(category) = filters.category.as_deref() {
        builder.push(" AND category = ").push_bind(category.to_string());
    }
}

/// Distinct matches for a query, highest percentile first
pub async fn predict(pool: &SqlitePool, query: &PredictQuery) -> Result<Vec<PredictedCollege>> {
    let mut builder = QueryBuilder::<Sqlite>::new(
        "SELECT DISTINCT college_name, branch_name, category, percentile FROM cutoff_data",
    );
    push_conditions(&mut builder, query.bounds(), &query.filters);
    builder.push(" ORDER BY percentile DESC, college_name ASC, branch_name ASC");

    let rows = builder
        .build_query_as::<PredictedCollege>()
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Up to `limit` distinct values of `field` matching `filters` in the query's window
pub async fn matching_values(
    pool: &SqlitePool,
    query: &PredictQuery,
    filters: &PredictFilters,
    field: FilterField,
    limit: usize,
) -> Result<Vec<String>> {
    let column = field.column();
    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT DISTINCT {} FROM cutoff_data",
        column
    ));
    push_conditions(&mut builder, query.bounds(), filters);
    builder
        .push(format!(" ORDER BY {} ASC LIMIT ", column))
        .push_bind(limit as i64);

    let values = builder
        .build_query_scalar::<String>()
        .fetch_all(pool)
        .await?;
    Ok(values)
}
