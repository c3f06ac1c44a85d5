//! Lending transaction and payment models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::book::Book;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Issued,
    Returned,
}

/// Lending transaction. Fines are computed by the server on return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub book: Book,
    pub user: i64,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub return_date: Option<DateTime<Utc>>,
    pub fine_amount: Decimal,
    pub status: TransactionStatus,
}

impl Transaction {
    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.status == TransactionStatus::Issued && self.due_date < now
    }

    pub fn has_fine(&self) -> bool {
        self.fine_amount > Decimal::ZERO
    }
}

/// Payment recorded against a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub transaction: i64,
    #[serde(default)]
    pub payment_reference: Option<String>,
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct IssueRequest {
    pub book_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ReturnRequest {
    pub transaction_id: i64,
}

#[derive(Debug, Serialize)]
pub struct PayFineRequest {
    pub transaction_id: i64,
    pub amount: Decimal,
}
