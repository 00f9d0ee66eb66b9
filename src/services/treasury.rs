//! Treasury Service
//!
//! Value-transfer collaborator of the ledger: attached value moves from the
//! caller into the ledger's balance, and can be sent back out to a named
//! party.
//!
//! # Implementation Options
//!
//! 1. EscrowBook (현재): 프로세스 내 장부
//! 2. On-chain: 컨트랙트 잔고 / 트랜잭션 영수증 검증

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use ethers::types::Address;

use crate::types::Amount;

#[async_trait]
pub trait Treasury: Send + Sync {
    /// caller → ledger
    async fn receive(&self, from: Address, amount: Amount) -> Result<()>;

    /// ledger → 지정된 주소
    async fn send(&self, to: Address, amount: Amount) -> Result<()>;

    /// ledger가 보유한 총 잔고
    async fn balance(&self) -> Result<Amount>;
}

#[derive(Debug, Default)]
struct Book {
    balance: Amount,
    /// 주소별 누적 입금액
    received: HashMap<Address, Amount>,
    /// 주소별 누적 송금액
    sent: HashMap<Address, Amount>,
}

/// 프로세스 내 에스크로 장부
#[derive(Debug, Default)]
pub struct EscrowBook {
    book: RwLock<Book>,
}

impl EscrowBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// 주소별 (입금, 송금) 누계
    pub fn totals_for(&self, party: Address) -> (Amount, Amount) {
        let book = self.book.read().unwrap_or_else(|e| e.into_inner());
        (
            book.received.get(&party).copied().unwrap_or_default(),
            book.sent.get(&party).copied().unwrap_or_default(),
        )
    }
}

#[async_trait]
impl Treasury for EscrowBook {
    async fn receive(&self, from: Address, amount: Amount) -> Result<()> {
        let mut book = self.book.write().map_err(|_| anyhow!("escrow book poisoned"))?;

        let balance = book
            .balance
            .checked_add(amount)
            .ok_or_else(|| anyhow!("escrow balance overflow"))?;
        let received = book
            .received
            .get(&from)
            .copied()
            .unwrap_or_default()
            .checked_add(amount)
            .ok_or_else(|| anyhow!("escrow balance overflow"))?;

        book.balance = balance;
        book.received.insert(from, received);

        tracing::debug!(from = ?from, amount = %amount, "escrow received");
        Ok(())
    }

    async fn send(&self, to: Address, amount: Amount) -> Result<()> {
        let mut book = self.book.write().map_err(|_| anyhow!("escrow book poisoned"))?;

        let Some(balance) = book.balance.checked_sub(amount) else {
            bail!("insufficient escrow balance: have {}, need {}", book.balance, amount);
        };
        let sent = book
            .sent
            .get(&to)
            .copied()
            .unwrap_or_default()
            .checked_add(amount)
            .ok_or_else(|| anyhow!("escrow balance overflow"))?;

        book.balance = balance;
        book.sent.insert(to, sent);

        tracing::debug!(to = ?to, amount = %amount, "escrow sent");
        Ok(())
    }

    async fn balance(&self) -> Result<Amount> {
        let book = self.book.read().map_err(|_| anyhow!("escrow book poisoned"))?;
        Ok(book.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_receive_and_send() {
        let escrow = EscrowBook::new();
        let alice = Address::repeat_byte(0xa1);

        escrow.receive(alice, Amount::from_ether(10)).await.unwrap();
        assert_eq!(escrow.balance().await.unwrap(), Amount::from_ether(10));

        escrow.send(alice, Amount::from_ether(4)).await.unwrap();
        assert_eq!(escrow.balance().await.unwrap(), Amount::from_ether(6));
        assert_eq!(
            escrow.totals_for(alice),
            (Amount::from_ether(10), Amount::from_ether(4))
        );
    }

    #[tokio::test]
    async fn test_send_more_than_balance_fails() {
        let escrow = EscrowBook::new();
        let bob = Address::repeat_byte(0xb0);

        escrow.receive(bob, Amount::from_wei(5)).await.unwrap();
        assert!(escrow.send(bob, Amount::from_wei(6)).await.is_err());

        // 실패 시 잔고 변화 없음
        assert_eq!(escrow.balance().await.unwrap(), Amount::from_wei(5));
        assert_eq!(escrow.totals_for(bob).1, Amount::ZERO);
    }
}
