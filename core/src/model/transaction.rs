use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Expense,
}

/// How a ledger entry feeds the monthly reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerClass {
    Deposit,
    CommonExpense,
    IndividualExpense,
    /// Negative-amount expense written to offset guest meals. Guest costs are
    /// already counted from the guest meal records, so these are skipped.
    GuestAdjustment,
}

/// Unified ledger entry for deposits and expenses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEntry {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    #[serde(default)]
    pub is_common: bool,
    pub member_id: Option<String>,
    pub member_name: Option<String>,
    pub date: NaiveDate,
    pub note: Option<String>,
}

impl TransactionEntry {
    pub fn deposit(member_id: String, member_name: String, amount: f64, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TransactionKind::Deposit,
            amount,
            is_common: false,
            member_id: Some(member_id),
            member_name: Some(member_name),
            date,
            note: None,
        }
    }

    pub fn expense(amount: f64, is_common: bool, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: TransactionKind::Expense,
            amount,
            is_common,
            member_id: None,
            member_name: None,
            date,
            note: None,
        }
    }

    pub fn classify(&self) -> LedgerClass {
        match self.kind {
            TransactionKind::Deposit => LedgerClass::Deposit,
            TransactionKind::Expense if self.amount < 0.0 => LedgerClass::GuestAdjustment,
            TransactionKind::Expense if self.is_common => LedgerClass::CommonExpense,
            TransactionKind::Expense => LedgerClass::IndividualExpense,
        }
    }
}
