// src/storage/sqlite.rs

//! SQLite notice repository.

use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::error::{AppError, Result};
use crate::models::{BidAttachment, BidDetail, BidNotice};
use crate::storage::{LastSeen, Repository};

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS bid_notices (
        notice_code TEXT NOT NULL,
        degree TEXT NOT NULL,
        title TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT '게시',
        category TEXT,
        process_type TEXT,
        date_posted TEXT,
        bid_start_dt TEXT,
        bid_end_dt TEXT,
        opening_dt TEXT,
        contract_method TEXT,
        bid_method TEXT,
        succ_method TEXT,
        collected_at TEXT NOT NULL,
        PRIMARY KEY (notice_code, degree)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bid_notice_details (
        notice_code TEXT NOT NULL,
        degree TEXT NOT NULL,
        doc_number TEXT,
        manager_dept TEXT,
        manager_name TEXT,
        construction_name TEXT,
        completion_date TEXT,
        site_name TEXT,
        client_name TEXT,
        client_address TEXT,
        total_area TEXT,
        household_cnt TEXT,
        vat_include TEXT NOT NULL DEFAULT 'N',
        budget_amt INTEGER NOT NULL DEFAULT 0,
        base_price INTEGER NOT NULL DEFAULT 0,
        region_limit TEXT,
        license_limit TEXT,
        briefing_yn TEXT NOT NULL DEFAULT 'N',
        briefing_dt TEXT,
        briefing_place TEXT,
        rebid_allowed TEXT,
        PRIMARY KEY (notice_code, degree),
        FOREIGN KEY (notice_code, degree)
            REFERENCES bid_notices (notice_code, degree) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS bid_attachments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        notice_code TEXT NOT NULL,
        degree TEXT NOT NULL,
        position INTEGER NOT NULL,
        file_name TEXT NOT NULL,
        file_size TEXT,
        download_url TEXT,
        FOREIGN KEY (notice_code, degree)
            REFERENCES bid_notices (notice_code, degree) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_attachments_notice ON bid_attachments (notice_code, degree)",
];

const UPSERT_NOTICE: &str = r#"
    INSERT INTO bid_notices (
        notice_code, degree, title, status, category, process_type,
        date_posted, bid_start_dt, bid_end_dt, opening_dt,
        contract_method, bid_method, succ_method, collected_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (notice_code, degree) DO UPDATE SET
        title = excluded.title,
        status = excluded.status,
        category = excluded.category,
        process_type = excluded.process_type,
        date_posted = excluded.date_posted,
        bid_start_dt = excluded.bid_start_dt,
        bid_end_dt = excluded.bid_end_dt,
        opening_dt = excluded.opening_dt,
        contract_method = excluded.contract_method,
        bid_method = excluded.bid_method,
        succ_method = excluded.succ_method,
        collected_at = excluded.collected_at
"#;

const INSERT_DETAIL: &str = r#"
    INSERT INTO bid_notice_details (
        notice_code, degree, doc_number, manager_dept, manager_name,
        construction_name, completion_date, site_name, client_name, client_address,
        total_area, household_cnt, vat_include, budget_amt, base_price,
        region_limit, license_limit, briefing_yn, briefing_dt, briefing_place, rebid_allowed
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const INSERT_ATTACHMENT: &str = r#"
    INSERT INTO bid_attachments (notice_code, degree, position, file_name, file_size, download_url)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

/// Where the database lives.
#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    Memory,
}

/// Repository over a SQLite database, schema created on connect.
pub struct SqliteRepository {
    target: Target,
    pool: Option<SqlitePool>,
}

impl SqliteRepository {
    /// Database file, created (with parent directories) if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File(path.into()),
            pool: None,
        }
    }

    /// Private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            target: Target::Memory,
            pool: None,
        }
    }

    fn pool(&self) -> Result<&SqlitePool> {
        self.pool
            .as_ref()
            .ok_or(AppError::Database(sqlx::Error::PoolClosed))
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(pool).await?;
        }
        Ok(())
    }

    /// Load one notice with its detail and attachments.
    pub async fn find(&self, notice_code: &str, degree: &str) -> Result<Option<BidNotice>> {
        let pool = self.pool()?;
        let Some(row) = sqlx::query(
            "SELECT * FROM bid_notices WHERE notice_code = ? AND degree = ?",
        )
        .bind(notice_code)
        .bind(degree)
        .fetch_optional(pool)
        .await?
        else {
            return Ok(None);
        };
        let mut notice = notice_from_row(&row)?;

        let detail = sqlx::query(
            "SELECT * FROM bid_notice_details WHERE notice_code = ? AND degree = ?",
        )
        .bind(notice_code)
        .bind(degree)
        .fetch_optional(pool)
        .await?;
        notice.detail = detail.as_ref().map(detail_from_row).transpose()?;

        let attachments = sqlx::query(
            "SELECT file_name, file_size, download_url FROM bid_attachments \
             WHERE notice_code = ? AND degree = ? ORDER BY position",
        )
        .bind(notice_code)
        .bind(degree)
        .fetch_all(pool)
        .await?;
        notice.attachments = attachments
            .iter()
            .map(|row| {
                Ok(BidAttachment {
                    file_name: row.try_get("file_name")?,
                    file_size: row.try_get("file_size")?,
                    download_url: row.try_get("download_url")?,
                })
            })
            .collect::<std::result::Result<_, sqlx::Error>>()?;

        Ok(Some(notice))
    }

    /// Number of stored notices.
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM bid_notices")
            .fetch_one(self.pool()?)
            .await?;
        Ok(row.try_get("total")?)
    }

    async fn write_notice(
        tx: &mut Transaction<'_, Sqlite>,
        notice: &BidNotice,
        collected_at: &str,
    ) -> Result<()> {
        sqlx::query(UPSERT_NOTICE)
            .bind(&notice.notice_code)
            .bind(&notice.degree)
            .bind(&notice.title)
            .bind(&notice.status)
            .bind(notice.category.as_deref())
            .bind(notice.process_type.as_deref())
            .bind(notice.date_posted.as_deref())
            .bind(notice.bid_start_dt.as_deref())
            .bind(notice.bid_end_dt.as_deref())
            .bind(notice.opening_dt.as_deref())
            .bind(notice.contract_method.as_deref())
            .bind(notice.bid_method.as_deref())
            .bind(notice.succ_method.as_deref())
            .bind(collected_at)
            .execute(&mut **tx)
            .await?;

        // An upsert keeps the parent row, so owned rows are replaced explicitly.
        sqlx::query("DELETE FROM bid_notice_details WHERE notice_code = ? AND degree = ?")
            .bind(&notice.notice_code)
            .bind(&notice.degree)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM bid_attachments WHERE notice_code = ? AND degree = ?")
            .bind(&notice.notice_code)
            .bind(&notice.degree)
            .execute(&mut **tx)
            .await?;

        if let Some(detail) = &notice.detail {
            sqlx::query(INSERT_DETAIL)
                .bind(&notice.notice_code)
                .bind(&notice.degree)
                .bind(detail.doc_number.as_deref())
                .bind(detail.manager_dept.as_deref())
                .bind(detail.manager_name.as_deref())
                .bind(detail.construction_name.as_deref())
                .bind(detail.completion_date.as_deref())
                .bind(detail.site_name.as_deref())
                .bind(detail.client_name.as_deref())
                .bind(detail.client_address.as_deref())
                .bind(detail.total_area.as_deref())
                .bind(detail.household_cnt.as_deref())
                .bind(&detail.vat_include)
                .bind(detail.budget_amt)
                .bind(detail.base_price)
                .bind(detail.region_limit.as_deref())
                .bind(detail.license_limit.as_deref())
                .bind(&detail.briefing_yn)
                .bind(detail.briefing_dt.as_deref())
                .bind(detail.briefing_place.as_deref())
                .bind(detail.rebid_allowed.as_deref())
                .execute(&mut **tx)
                .await?;
        }

        for (position, attachment) in notice.attachments.iter().enumerate() {
            sqlx::query(INSERT_ATTACHMENT)
                .bind(&notice.notice_code)
                .bind(&notice.degree)
                .bind(position as i64)
                .bind(&attachment.file_name)
                .bind(attachment.file_size.as_deref())
                .bind(attachment.download_url.as_deref())
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn connect(&mut self) -> Result<()> {
        if self.pool.is_some() {
            return Ok(());
        }

        let (options, max_connections) = match &self.target {
            Target::File(path) => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .foreign_keys(true);
                (options, 4)
            }
            // Every connection to :memory: is its own database.
            Target::Memory => (
                SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true),
                1,
            ),
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Self::migrate(&pool).await?;

        log::info!("Repository connected ({:?})", self.target);
        self.pool = Some(pool);
        Ok(())
    }

    async fn upsert_batch(&self, notices: &[BidNotice]) -> Result<usize> {
        if let Some(bad) = notices.iter().find(|n| !n.has_identity()) {
            return Err(AppError::validation(format!(
                "notice '{}' has no notice code/degree",
                bad.title
            )));
        }

        let collected_at = Utc::now().to_rfc3339();
        let mut tx = self.pool()?.begin().await?;
        for notice in notices {
            // Dropping the transaction on error rolls it back.
            Self::write_notice(&mut tx, notice, &collected_at).await?;
        }
        tx.commit().await?;

        log::info!("Upserted {} notices", notices.len());
        Ok(notices.len())
    }

    async fn last_seen(&self) -> Result<Option<LastSeen>> {
        let row = sqlx::query("SELECT MAX(date_posted) AS last_date FROM bid_notices")
            .fetch_one(self.pool()?)
            .await?;
        let last_date: Option<String> = row.try_get("last_date")?;
        Ok(last_date.map(|last_date| LastSeen { last_date }))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            log::info!("Repository closed");
        }
        Ok(())
    }
}

fn notice_from_row(row: &SqliteRow) -> Result<BidNotice> {
    let mut notice = BidNotice::new(row.try_get::<&str, _>("title")?);
    notice.notice_code = row.try_get("notice_code")?;
    notice.degree = row.try_get("degree")?;
    notice.status = row.try_get("status")?;
    notice.category = row.try_get("category")?;
    notice.process_type = row.try_get("process_type")?;
    notice.date_posted = row.try_get("date_posted")?;
    notice.bid_start_dt = row.try_get("bid_start_dt")?;
    notice.bid_end_dt = row.try_get("bid_end_dt")?;
    notice.opening_dt = row.try_get("opening_dt")?;
    notice.contract_method = row.try_get("contract_method")?;
    notice.bid_method = row.try_get("bid_method")?;
    notice.succ_method = row.try_get("succ_method")?;
    Ok(notice)
}

fn detail_from_row(row: &SqliteRow) -> Result<BidDetail> {
    Ok(BidDetail {
        doc_number: row.try_get("doc_number")?,
        manager_dept: row.try_get("manager_dept")?,
        manager_name: row.try_get("manager_name")?,
        construction_name: row.try_get("construction_name")?,
        completion_date: row.try_get("completion_date")?,
        site_name: row.try_get("site_name")?,
        client_name: row.try_get("client_name")?,
        client_address: row.try_get("client_address")?,
        total_area: row.try_get("total_area")?,
        household_cnt: row.try_get("household_cnt")?,
        vat_include: row.try_get("vat_include")?,
        budget_amt: row.try_get("budget_amt")?,
        base_price: row.try_get("base_price")?,
        region_limit: row.try_get("region_limit")?,
        license_limit: row.try_get("license_limit")?,
        briefing_yn: row.try_get("briefing_yn")?,
        briefing_dt: row.try_get("briefing_dt")?,
        briefing_place: row.try_get("briefing_place")?,
        rebid_allowed: row.try_get("rebid_allowed")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice(code: &str, title: &str, posted: &str, files: &[&str]) -> BidNotice {
        let mut notice = BidNotice::new(title);
        notice.assign_identity(code);
        notice.date_posted = Some(posted.to_string());
        notice.detail = Some(BidDetail {
            budget_amt: 1_000,
            briefing_yn: "N".into(),
            vat_include: "Y".into(),
            ..BidDetail::default()
        });
        notice.attachments = files.iter().map(|f| BidAttachment::named(*f)).collect();
        notice
    }

    async fn repo() -> SqliteRepository {
        let mut repo = SqliteRepository::in_memory();
        repo.connect().await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let repo = repo().await;

        let first = notice("R24BK001-000", "승강기 교체", "2024-02-10", &["a.pdf"]);
        repo.upsert_batch(&[first]).await.unwrap();

        let mut second = notice("R24BK001-000", "승강기 교체(정정)", "2024-02-11", &[]);
        second.category = Some("공사".into());
        second.detail.as_mut().unwrap().budget_amt = 2_500;
        assert_eq!(repo.upsert_batch(&[second.clone()]).await.unwrap(), 1);

        assert_eq!(repo.count().await.unwrap(), 1);
        let stored = repo.find("R24BK001", "000").await.unwrap().unwrap();
        assert_eq!(stored, second);
    }

    #[tokio::test]
    async fn test_attachments_replaced_in_order() {
        let repo = repo().await;
        repo.upsert_batch(&[notice("A-00", "t", "2024-01-01", &["1.pdf", "2.pdf", "3.pdf"])])
            .await
            .unwrap();
        repo.upsert_batch(&[notice("A-00", "t", "2024-01-01", &["z.hwp", "y.hwp"])])
            .await
            .unwrap();

        let stored = repo.find("A", "00").await.unwrap().unwrap();
        let names: Vec<_> = stored.attachments.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, vec!["z.hwp", "y.hwp"]);
    }

    #[tokio::test]
    async fn test_degrees_are_distinct_rows() {
        let repo = repo().await;
        repo.upsert_batch(&[
            notice("A-000", "t", "2024-01-01", &[]),
            notice("A-001", "t", "2024-01-02", &[]),
        ])
        .await
        .unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_batch_without_identity_writes_nothing() {
        let repo = repo().await;
        let good = notice("A-000", "t", "2024-01-01", &[]);
        let bad = BidNotice::new("no code");
        assert!(repo.upsert_batch(&[good, bad]).await.is_err());
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_last_seen() {
        let repo = repo().await;
        assert_eq!(repo.last_seen().await.unwrap(), None);

        repo.upsert_batch(&[
            notice("A-000", "t", "2024-02-10", &[]),
            notice("B-000", "t", "2024-03-01", &[]),
        ])
        .await
        .unwrap();
        assert_eq!(
            repo.last_seen().await.unwrap(),
            Some(LastSeen {
                last_date: "2024-03-01".into()
            })
        );
    }

    #[tokio::test]
    async fn test_file_database_survives_reconnect() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("db/nuri.db");

        let mut repo = SqliteRepository::new(&path);
        repo.connect().await.unwrap();
        repo.upsert_batch(&[notice("A-000", "t", "2024-01-01", &["f.pdf"])])
            .await
            .unwrap();
        repo.close().await.unwrap();

        let mut repo = SqliteRepository::new(&path);
        repo.connect().await.unwrap();
        let stored = repo.find("A", "000").await.unwrap().unwrap();
        assert_eq!(stored.attachments.len(), 1);
        repo.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_not_connected() {
        let repo = SqliteRepository::in_memory();
        assert!(repo.upsert_batch(&[]).await.is_err());
    }
}
