use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransactionKind {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    pub request: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Per-user balance plus the append-only log it is derived from.
/// Every balance change goes through the single add-transaction operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user: Uuid,
    pub balance: i64,
    pub reward_points: u64,
    pub transactions: Vec<WalletTransaction>,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user: Uuid) -> Self {
        Self {
            user,
            balance: 0,
            reward_points: 0,
            transactions: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
