//! Database Module
//!
//! # Interview Q&A
//!
//! Q: 왜 PostgreSQL을 선택했는가?
//! A: 대출 장부에 적합한 이유
//!
//!    1. ACID 트랜잭션: 레코드와 journal을 한 트랜잭션으로 기록
//!    2. JSONB: 이벤트 payload 저장 용이
//!    3. 인덱싱: 대출별, 시간별 조회 최적화
//!
//! Q: 커넥션 풀은 어떻게 관리하는가?
//! A: SQLx의 PgPool 사용
//!    - 최소/최대 커넥션 수 설정
//!    - 커넥션 재사용 (오버헤드 감소)
//!    - 타임아웃 처리
//!
//! Q: Ledger는 단일 writer인데 풀이 필요한가?
//! A: 쓰기는 ledger lock 안에서 직렬화되지만,
//!    history 조회와 health check는 lock 없이 병렬로 실행됨

mod models;
mod repository;

pub use models::*;
pub use repository::{LoanStore, MemoryLoanStore};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};

use crate::ledger::{JournalEntry, Loan};

/// 데이터베이스 연결 및 쿼리 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 10
    /// - min_connections: 1
    /// - acquire_timeout: 3초
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LoanStore for Database {
    async fn load_loans(&self) -> Result<Vec<Loan>> {
        let rows = sqlx::query_as::<_, LoanRow>(
            r#"
            SELECT
                id,
                lender,
                borrower,
                amount,
                interest_rate,
                collateral,
                due_date,
                completed
            FROM loans
            ORDER BY id ASC
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Loan::try_from).collect()
    }

    /// 레코드 upsert + 이벤트 insert (단일 트랜잭션)
    async fn save(&self, loan: &Loan, entry: &JournalEntry) -> Result<()> {
        let row = LoanRow::from_loan(loan)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO loans (
                id, lender, borrower, amount, interest_rate, collateral, due_date, completed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id)
            DO UPDATE SET
                borrower = EXCLUDED.borrower,
                interest_rate = EXCLUDED.interest_rate,
                completed = EXCLUDED.completed
            "#
        )
        .bind(row.id)
        .bind(&row.lender)
        .bind(&row.borrower)
        .bind(&row.amount)
        .bind(row.interest_rate)
        .bind(&row.collateral)
        .bind(row.due_date)
        .bind(row.completed)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO loan_events (loan_id, event_type, payload, recorded_at)
            VALUES ($1, $2, $3, $4)
            "#
        )
        .bind(row.id)
        .bind(entry.event.name())
        .bind(Json(&entry.event))
        .bind(entry.recorded_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// 대출 journal 조회 (페이지네이션)
    async fn history(&self, loan_id: u64, page: u32, limit: u32) -> Result<(Vec<JournalEntry>, u64)> {
        let loan_id = i64::try_from(loan_id)?;
        let offset = i64::from(page) * i64::from(limit);

        let rows = sqlx::query_as::<_, LoanEventRow>(
            r#"
            SELECT
                event_type,
                payload,
                recorded_at
            FROM loan_events
            WHERE loan_id = $1
            ORDER BY seq DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(loan_id)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        // 전체 개수
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM loan_events WHERE loan_id = $1"
        )
        .bind(loan_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((
            rows.into_iter().map(JournalEntry::from).collect(),
            count.0.max(0) as u64,
        ))
    }

    /// Health check
    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
