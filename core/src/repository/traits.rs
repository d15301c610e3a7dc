use crate::model::guest_meal::GuestMealEntry;
use crate::model::meal::MealEntry;
use crate::model::member::Member;
use crate::model::stats::CachedSnapshot;
use crate::model::transaction::TransactionEntry;
use crate::time::MonthKey;
use anyhow::Result;
use async_trait::async_trait;

/// Per-mess record collections. Meals and transactions are stored per month;
/// guest meals are stored per mess and filtered by the reader.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_meals(&self, mess_id: &str, month: MonthKey) -> Result<Vec<MealEntry>>;
    async fn list_transactions(&self, mess_id: &str, month: MonthKey) -> Result<Vec<TransactionEntry>>;
    async fn list_guest_meals(&self, mess_id: &str) -> Result<Vec<GuestMealEntry>>;

    /// Replaces any entry for the same member and date.
    async fn upsert_meal(&self, mess_id: &str, entry: MealEntry) -> Result<()>;
    async fn add_transaction(&self, mess_id: &str, entry: TransactionEntry) -> Result<TransactionEntry>;
    async fn add_guest_meal(&self, mess_id: &str, entry: GuestMealEntry) -> Result<GuestMealEntry>;
}

#[async_trait]
pub trait RosterRepository: Send + Sync {
    async fn list_members(&self, mess_id: &str) -> Result<Vec<Member>>;
    async fn add_member(&self, mess_id: &str, member: Member) -> Result<Member>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub mess_id: String,
    pub month: MonthKey,
}

impl CacheKey {
    pub fn new(mess_id: &str, month: MonthKey) -> Self {
        Self {
            mess_id: mess_id.to_string(),
            month,
        }
    }
}

/// Best-effort snapshot store. Callers treat every error as a miss.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedSnapshot>>;
    async fn put(&self, key: &CacheKey, entry: &CachedSnapshot) -> Result<()>;
}
