//! Repository Pattern Implementation
//!
//! `LoanStore` abstracts where loan records and the journal live:
//!
//! - `Database` (db/mod.rs): PostgreSQL
//! - `MemoryLoanStore`: 프로세스 내 저장소 (DATABASE_URL 미설정 시, 테스트)

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::ledger::{JournalEntry, Loan};

#[async_trait]
pub trait LoanStore: Send + Sync {
    /// 저장된 모든 대출 레코드 (id 오름차순)
    async fn load_loans(&self) -> Result<Vec<Loan>>;

    /// 레코드와 journal 항목을 원자적으로 저장
    async fn save(&self, loan: &Loan, entry: &JournalEntry) -> Result<()>;

    /// 대출별 journal (최신순, 페이지네이션) + 전체 개수
    async fn history(&self, loan_id: u64, page: u32, limit: u32) -> Result<(Vec<JournalEntry>, u64)>;

    async fn health_check(&self) -> Result<()>;
}

#[derive(Default)]
struct MemoryState {
    loans: HashMap<u64, Loan>,
    journal: HashMap<u64, Vec<JournalEntry>>,
}

#[derive(Default)]
pub struct MemoryLoanStore {
    state: RwLock<MemoryState>,
}

impl MemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoanStore for MemoryLoanStore {
    async fn load_loans(&self) -> Result<Vec<Loan>> {
        let state = self.state.read().map_err(|_| anyhow!("store poisoned"))?;
        let mut loans: Vec<Loan> = state.loans.values().cloned().collect();
        loans.sort_by_key(|loan| loan.id);
        Ok(loans)
    }

    async fn save(&self, loan: &Loan, entry: &JournalEntry) -> Result<()> {
        let mut state = self.state.write().map_err(|_| anyhow!("store poisoned"))?;
        state.loans.insert(loan.id, loan.clone());
        state.journal.entry(loan.id).or_default().push(entry.clone());
        Ok(())
    }

    async fn history(&self, loan_id: u64, page: u32, limit: u32) -> Result<(Vec<JournalEntry>, u64)> {
        let state = self.state.read().map_err(|_| anyhow!("store poisoned"))?;
        let Some(entries) = state.journal.get(&loan_id) else {
            return Ok((vec![], 0));
        };

        let offset = page as usize * limit as usize;
        let page_entries = entries
            .iter()
            .rev()
            .skip(offset)
            .take(limit as usize)
            .cloned()
            .collect();

        Ok((page_entries, entries.len() as u64))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
