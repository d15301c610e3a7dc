use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::feed::{ChangeFeed, Collection};
use crate::model::guest_meal::GuestMealEntry;
use crate::model::meal::MealEntry;
use crate::model::member::Member;
use crate::model::stats::CachedSnapshot;
use crate::model::transaction::TransactionEntry;
use crate::repository::traits::{CacheKey, RecordStore, RosterRepository, SnapshotCache};
use crate::time::MonthKey;

#[derive(Default)]
struct MessData {
    members: Vec<Member>,
    meals: Vec<MealEntry>,
    transactions: Vec<TransactionEntry>,
    guest_meals: Vec<GuestMealEntry>,
}

#[derive(Default)]
struct Inner {
    messes: HashMap<String, MessData>,
    cache: HashMap<CacheKey, CachedSnapshot>,
    failing: HashSet<Collection>,
    cache_failing: bool,
    delays: HashMap<MonthKey, Duration>,
    fetches: HashMap<Collection, usize>,
}

/// In-memory store implementing every repository trait.
///
/// Supports failure injection, per-month fetch latency and fetch counting
/// so aggregation and recalculation can be exercised without disk.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    feed: Option<ChangeFeed>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, feed: ChangeFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicked test thread must not wedge the others.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make every read of `collection` fail until `recover` is called.
    pub fn fail(&self, collection: Collection) {
        self.lock().failing.insert(collection);
    }

    pub fn recover(&self, collection: Collection) {
        self.lock().failing.remove(&collection);
    }

    pub fn fail_cache(&self, failing: bool) {
        self.lock().cache_failing = failing;
    }

    /// Delay meal reads for `month`.
    pub fn set_delay(&self, month: MonthKey, delay: Duration) {
        self.lock().delays.insert(month, delay);
    }

    pub fn fetch_count(&self, collection: Collection) -> usize {
        self.lock().fetches.get(&collection).copied().unwrap_or(0)
    }

    fn begin_read(&self, collection: Collection) -> Result<()> {
        let mut inner = self.lock();
        *inner.fetches.entry(collection).or_default() += 1;
        if inner.failing.contains(&collection) {
            return Err(anyhow!("{} unavailable", collection));
        }
        Ok(())
    }

    fn notify(&self, mess_id: &str, collection: Collection) {
        if let Some(feed) = &self.feed {
            feed.publish(mess_id, collection);
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list_meals(&self, mess_id: &str, month: MonthKey) -> Result<Vec<MealEntry>> {
        let delay = self.lock().delays.get(&month).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.begin_read(Collection::Meals)?;
        let inner = self.lock();
        Ok(inner
            .messes
            .get(mess_id)
            .map(|d| d.meals.iter().filter(|m| month.contains(m.date)).cloned().collect())
            .unwrap_or_default())
    }

    async fn list_transactions(&self, mess_id: &str, month: MonthKey) -> Result<Vec<TransactionEntry>> {
        self.begin_read(Collection::Transactions)?;
        let inner = self.lock();
        Ok(inner
            .messes
            .get(mess_id)
            .map(|d| d.transactions.iter().filter(|t| month.contains(t.date)).cloned().collect())
            .unwrap_or_default())
    }

    async fn list_guest_meals(&self, mess_id: &str) -> Result<Vec<GuestMealEntry>> {
        self.begin_read(Collection::GuestMeals)?;
        let inner = self.lock();
        Ok(inner.messes.get(mess_id).map(|d| d.guest_meals.clone()).unwrap_or_default())
    }

    async fn upsert_meal(&self, mess_id: &str, entry: MealEntry) -> Result<()> {
        {
            let mut inner = self.lock();
            let meals = &mut inner.messes.entry(mess_id.to_string()).or_default().meals;
            if let Some(pos) = meals.iter().position(|m| m.same_slot(&entry)) {
                meals[pos] = entry;
            } else {
                meals.push(entry);
            }
        }
        self.notify(mess_id, Collection::Meals);
        Ok(())
    }

    async fn add_transaction(&self, mess_id: &str, entry: TransactionEntry) -> Result<TransactionEntry> {
        self.lock()
            .messes
            .entry(mess_id.to_string())
            .or_default()
            .transactions
            .push(entry.clone());
        self.notify(mess_id, Collection::Transactions);
        Ok(entry)
    }

    async fn add_guest_meal(&self, mess_id: &str, entry: GuestMealEntry) -> Result<GuestMealEntry> {
        self.lock()
            .messes
            .entry(mess_id.to_string())
            .or_default()
            .guest_meals
            .push(entry.clone());
        self.notify(mess_id, Collection::GuestMeals);
        Ok(entry)
    }
}

#[async_trait]
impl RosterRepository for MemoryStore {
    async fn list_members(&self, mess_id: &str) -> Result<Vec<Member>> {
        self.begin_read(Collection::Members)?;
        let inner = self.lock();
        Ok(inner.messes.get(mess_id).map(|d| d.members.clone()).unwrap_or_default())
    }

    async fn add_member(&self, mess_id: &str, member: Member) -> Result<Member> {
        self.lock()
            .messes
            .entry(mess_id.to_string())
            .or_default()
            .members
            .push(member.clone());
        self.notify(mess_id, Collection::Members);
        Ok(member)
    }
}

#[async_trait]
impl SnapshotCache for MemoryStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedSnapshot>> {
        let inner = self.lock();
        if inner.cache_failing {
            return Err(anyhow!("cache unavailable"));
        }
        Ok(inner.cache.get(key).cloned())
    }

    async fn put(&self, key: &CacheKey, entry: &CachedSnapshot) -> Result<()> {
        let mut inner = self.lock();
        if inner.cache_failing {
            return Err(anyhow!("cache unavailable"));
        }
        inner.cache.insert(key.clone(), entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_reads_are_scoped_to_month() {
        let store = MemoryStore::new();
        let oct = NaiveDate::from_ymd_opt(2026, 10, 2).unwrap();
        let nov = NaiveDate::from_ymd_opt(2026, 11, 2).unwrap();
        store.upsert_meal("home", MealEntry::new("a".into(), oct, true, false, false)).await.unwrap();
        store.upsert_meal("home", MealEntry::new("a".into(), nov, true, false, false)).await.unwrap();

        let meals = store.list_meals("home", MonthKey::new(2026, 10).unwrap()).await.unwrap();
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].date, oct);
    }

    #[tokio::test]
    async fn test_failure_injection_and_counting() {
        let store = MemoryStore::new();
        store.fail(Collection::Transactions);
        let month = MonthKey::new(2026, 10).unwrap();

        assert!(store.list_transactions("home", month).await.is_err());
        store.recover(Collection::Transactions);
        assert!(store.list_transactions("home", month).await.is_ok());
        assert_eq!(store.fetch_count(Collection::Transactions), 2);
        assert_eq!(store.fetch_count(Collection::Meals), 0);
    }
}
