//! Scan record store: CRUD and aggregates over the `scan_history` table.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::models::scan::{ScanHistoryItem, ScanResult, ScanStatus, SummaryStats};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("scan with id {0} already exists")]
    Duplicate(String),

    #[error("scan {0} not found")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Conjunctive list filters; all optional.
#[derive(Debug, Default, Clone)]
pub struct ListFilter {
    /// Exact status match, already uppercased by the caller.
    pub status: Option<String>,
    /// Case-insensitive substring match on brand.
    pub brand: Option<String>,
    pub limit: Option<i64>,
}

const ITEM_COLUMNS: &str = "scan_id, date, thumbnail, product_name, brand, status, \
     confidence_score, reasoning, manufacturing_date, batch_code, \
     official_website, reporting_url, extracted_text";

/// Insert a new scan record. A unique-constraint violation on `scan_id` maps
/// to `Duplicate`; the store never silently overwrites.
pub async fn create_scan(
    pool: &PgPool,
    item: &ScanHistoryItem,
) -> Result<ScanHistoryItem, StoreError> {
    let date = parse_or_now(&item.date);

    let row = sqlx::query(&format!(
        r#"
        INSERT INTO scan_history
            (scan_id, date, thumbnail, product_name, brand, status, confidence_score,
             reasoning, manufacturing_date, batch_code, official_website, reporting_url,
             extracted_text)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {ITEM_COLUMNS}
        "#
    ))
    .bind(&item.id)
    .bind(date)
    .bind(&item.thumbnail)
    .bind(&item.result.product_name)
    .bind(&item.result.brand)
    .bind(item.result.status.to_string())
    .bind(item.result.confidence_score)
    .bind(&item.result.reasoning)
    .bind(&item.result.manufacturing_date)
    .bind(&item.result.batch_code)
    .bind(&item.result.official_website)
    .bind(&item.result.reporting_url)
    .bind(&item.result.extracted_text)
    .fetch_one(pool)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            StoreError::Duplicate(item.id.clone())
        }
        _ => StoreError::Database(e),
    })?;

    item_from_row(&row).map_err(StoreError::Database)
}

/// List scan records, newest first, with optional conjunctive filters.
pub async fn list_scans(
    pool: &PgPool,
    filter: &ListFilter,
) -> Result<Vec<ScanHistoryItem>, StoreError> {
    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {ITEM_COLUMNS} FROM scan_history"));

    let mut has_where = false;
    if let Some(status) = &filter.status {
        qb.push(" WHERE status = ").push_bind(status.clone());
        has_where = true;
    }
    if let Some(brand) = &filter.brand {
        qb.push(if has_where { " AND " } else { " WHERE " });
        qb.push("brand ILIKE ").push_bind(format!("%{brand}%"));
    }
    qb.push(" ORDER BY date DESC");
    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ").push_bind(limit.max(0));
    }

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter()
        .map(|row| item_from_row(row).map_err(StoreError::Database))
        .collect()
}

/// Fetch one scan by id.
pub async fn get_scan(pool: &PgPool, id: &str) -> Result<ScanHistoryItem, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM scan_history WHERE scan_id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => item_from_row(&row).map_err(StoreError::Database),
        None => Err(StoreError::NotFound(id.to_string())),
    }
}

/// Permanently delete one scan by id, returning the removed record.
pub async fn delete_scan(pool: &PgPool, id: &str) -> Result<ScanHistoryItem, StoreError> {
    let row = sqlx::query(&format!(
        "DELETE FROM scan_history WHERE scan_id = $1 RETURNING {ITEM_COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => item_from_row(&row).map_err(StoreError::Database),
        None => Err(StoreError::NotFound(id.to_string())),
    }
}

/// Aggregate counts for the stats endpoint.
pub async fn summary_stats(pool: &PgPool) -> Result<SummaryStats, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total,
               COUNT(*) FILTER (WHERE status IN ('FAKE', 'SUSPICIOUS')) AS fakes,
               COUNT(*) FILTER (WHERE status = 'AUTHENTIC') AS authentic
        FROM scan_history
        "#,
    )
    .fetch_one(pool)
    .await?;

    let total: i64 = row.try_get("total")?;
    let fakes: i64 = row.try_get("fakes")?;
    let authentic: i64 = row.try_get("authentic")?;

    Ok(SummaryStats {
        total_scans: total,
        fake_scans: fakes,
        authentic_scans: authentic,
        fake_percentage: fake_percentage(fakes, total),
    })
}

/// One-decimal percentage string; "0.0" for an empty store, never a
/// divide-by-zero.
fn fake_percentage(fakes: i64, total: i64) -> String {
    if total > 0 {
        format!("{:.1}", fakes as f64 / total as f64 * 100.0)
    } else {
        "0.0".to_string()
    }
}

/// Treat a caller-supplied timestamp leniently: RFC 3339 or "now".
fn parse_or_now(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn item_from_row(row: &PgRow) -> Result<ScanHistoryItem, sqlx::Error> {
    let date: DateTime<Utc> = row.try_get("date")?;
    let status: String = row.try_get("status")?;

    Ok(ScanHistoryItem {
        id: row.try_get("scan_id")?,
        date: date.to_rfc3339_opts(SecondsFormat::Millis, true),
        thumbnail: row.try_get("thumbnail")?,
        result: ScanResult {
            product_name: row.try_get("product_name")?,
            brand: row.try_get("brand")?,
            status: ScanStatus::coerce(&status),
            confidence_score: row.try_get("confidence_score")?,
            reasoning: row.try_get("reasoning")?,
            manufacturing_date: row.try_get("manufacturing_date")?,
            batch_code: row.try_get("batch_code")?,
            official_website: row.try_get("official_website")?,
            reporting_url: row.try_get("reporting_url")?,
            extracted_text: row.try_get("extracted_text")?,
        },
    })
}
