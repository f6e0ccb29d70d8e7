use crate::errors::ApiError;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use uuid::Uuid;

pub type Db = Pool<Sqlite>;

pub async fn connect(db_url: &str) -> Result<Db, ApiError> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .map_err(|_| ApiError::Internal)
}

pub async fn init_schema(db: &Db) -> Result<(), ApiError> {
    // Only the public side of an issuance is kept: no card data, no passport numbers.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS issuances (
  commitment TEXT PRIMARY KEY,
  session_id TEXT NOT NULL,
  issuer_mode TEXT NOT NULL,
  request_id TEXT,
  tx_hash TEXT,
  issued_at TEXT NOT NULL,
  expires_at TEXT NOT NULL
);
"#,
    )
    .execute(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceRecord {
    pub commitment: String,
    pub session_id: Uuid,
    pub issuer_mode: String,
    pub request_id: Option<String>,
    pub tx_hash: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub async fn insert_issuance(db: &Db, record: &IssuanceRecord) -> Result<(), ApiError> {
    sqlx::query(
        r#"INSERT INTO issuances (commitment, session_id, issuer_mode, request_id, tx_hash, issued_at, expires_at)
           VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&record.commitment)
    .bind(record.session_id.to_string())
    .bind(&record.issuer_mode)
    .bind(&record.request_id)
    .bind(&record.tx_hash)
    .bind(record.issued_at.to_rfc3339())
    .bind(record.expires_at.to_rfc3339())
    .execute(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    Ok(())
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, ApiError> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|_| ApiError::Internal)?
        .with_timezone(&Utc))
}

pub async fn get_issuance(db: &Db, commitment: &str) -> Result<Option<IssuanceRecord>, ApiError> {
    let row = sqlx::query(
        r#"SELECT commitment, session_id, issuer_mode, request_id, tx_hash, issued_at, expires_at
           FROM issuances WHERE commitment = ?"#,
    )
    .bind(commitment)
    .fetch_optional(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    let Some(row) = row else { return Ok(None); };

    let session_id: String = row.get(1);
    let issued_at: String = row.get(5);
    let expires_at: String = row.get(6);

    Ok(Some(IssuanceRecord {
        commitment: row.get(0),
        session_id: Uuid::parse_str(&session_id).map_err(|_| ApiError::Internal)?,
        issuer_mode: row.get(2),
        request_id: row.get(3),
        tx_hash: row.get(4),
        issued_at: parse_time(&issued_at)?,
        expires_at: parse_time(&expires_at)?,
    }))
}

pub async fn count_issuances(db: &Db) -> Result<u64, ApiError> {
    let row = sqlx::query(r#"SELECT COUNT(*) AS c FROM issuances"#)
        .fetch_one(db)
        .await
        .map_err(|_| ApiError::Internal)?;
    let c: i64 = row.get("c");
    Ok(c as u64)
}
