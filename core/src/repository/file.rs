use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;

use crate::config::default_data_dir;
use crate::feed::{ChangeFeed, Collection};
use crate::model::guest_meal::GuestMealEntry;
use crate::model::meal::MealEntry;
use crate::model::member::{find_by_name, manager_count, Member};
use crate::model::transaction::TransactionEntry;
use crate::repository::traits::{RecordStore, RosterRepository};
use crate::time::MonthKey;

const MEMBERS_FILE_NAME: &str = "members.json";
const GUEST_MEALS_FILE_NAME: &str = "guest_meals.json";

/// JSON-file record store, one directory per mess:
///
/// ```text
/// <base>/<mess>/members.json
/// <base>/<mess>/meals_YYYY_MM.json
/// <base>/<mess>/transactions_YYYY_MM.json
/// <base>/<mess>/guest_meals.json
/// ```
#[derive(Clone)]
pub struct FileRecordStore {
    base_dir: PathBuf,
    feed: Option<ChangeFeed>,
    write_lock: Arc<Mutex<()>>,
}

impl FileRecordStore {
    pub fn new(base_dir: Option<PathBuf>) -> Result<Self> {
        let path = match base_dir {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Could not create data directory {}", path.display()))?;

        Ok(FileRecordStore {
            base_dir: path,
            feed: None,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Publish a change event after every successful write.
    pub fn with_feed(mut self, feed: ChangeFeed) -> Self {
        self.feed = Some(feed);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn mess_dir(&self, mess_id: &str) -> Result<PathBuf> {
        if mess_id.is_empty()
            || mess_id == "."
            || mess_id == ".."
            || mess_id.contains(|c: char| c == '/' || c == '\\')
        {
            return Err(anyhow!("Invalid mess id: '{}'", mess_id));
        }
        Ok(self.base_dir.join(mess_id))
    }

    fn meals_path(&self, mess_id: &str, month: MonthKey) -> Result<PathBuf> {
        Ok(self.mess_dir(mess_id)?.join(format!("meals_{}.json", month.file_suffix())))
    }

    fn transactions_path(&self, mess_id: &str, month: MonthKey) -> Result<PathBuf> {
        Ok(self.mess_dir(mess_id)?.join(format!("transactions_{}.json", month.file_suffix())))
    }

    fn notify(&self, mess_id: &str, collection: Collection) {
        if let Some(feed) = &self.feed {
            feed.publish(mess_id, collection);
        }
    }
}

async fn read_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt record file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("Could not read {}", path.display())),
    }
}

async fn write_list<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_vec_pretty(items)?;
    fs::write(path, content)
        .await
        .with_context(|| format!("Could not write {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn list_meals(&self, mess_id: &str, month: MonthKey) -> Result<Vec<MealEntry>> {
        read_list(&self.meals_path(mess_id, month)?).await
    }

    async fn list_transactions(&self, mess_id: &str, month: MonthKey) -> Result<Vec<TransactionEntry>> {
        read_list(&self.transactions_path(mess_id, month)?).await
    }

    async fn list_guest_meals(&self, mess_id: &str) -> Result<Vec<GuestMealEntry>> {
        read_list(&self.mess_dir(mess_id)?.join(GUEST_MEALS_FILE_NAME)).await
    }

    async fn upsert_meal(&self, mess_id: &str, entry: MealEntry) -> Result<()> {
        let path = self.meals_path(mess_id, MonthKey::from_date(entry.date))?;
        {
            let _guard = self.write_lock.lock().await;
            let mut meals: Vec<MealEntry> = read_list(&path).await?;
            if let Some(pos) = meals.iter().position(|m| m.same_slot(&entry)) {
                meals[pos] = entry;
            } else {
                meals.push(entry);
            }
            write_list(&path, &meals).await?;
        }
        self.notify(mess_id, Collection::Meals);
        Ok(())
    }

    async fn add_transaction(&self, mess_id: &str, entry: TransactionEntry) -> Result<TransactionEntry> {
        let path = self.transactions_path(mess_id, MonthKey::from_date(entry.date))?;
        {
            let _guard = self.write_lock.lock().await;
            let mut entries: Vec<TransactionEntry> = read_list(&path).await?;
            entries.push(entry.clone());
            write_list(&path, &entries).await?;
        }
        self.notify(mess_id, Collection::Transactions);
        Ok(entry)
    }

    async fn add_guest_meal(&self, mess_id: &str, entry: GuestMealEntry) -> Result<GuestMealEntry> {
        let path = self.mess_dir(mess_id)?.join(GUEST_MEALS_FILE_NAME);
        {
            let _guard = self.write_lock.lock().await;
            let mut entries: Vec<GuestMealEntry> = read_list(&path).await?;
            entries.push(entry.clone());
            write_list(&path, &entries).await?;
        }
        self.notify(mess_id, Collection::GuestMeals);
        Ok(entry)
    }
}

#[async_trait]
impl RosterRepository for FileRecordStore {
    async fn list_members(&self, mess_id: &str) -> Result<Vec<Member>> {
        read_list(&self.mess_dir(mess_id)?.join(MEMBERS_FILE_NAME)).await
    }

    async fn add_member(&self, mess_id: &str, member: Member) -> Result<Member> {
        let path = self.mess_dir(mess_id)?.join(MEMBERS_FILE_NAME);
        {
            let _guard = self.write_lock.lock().await;
            let mut members: Vec<Member> = read_list(&path).await?;
            if find_by_name(&members, &member.name).is_some() {
                return Err(anyhow!("Member '{}' already exists", member.name));
            }
            members.push(member.clone());
            if manager_count(&members) > 1 {
                tracing::warn!(mess_id, "roster now has more than one manager");
            }
            write_list(&path, &members).await?;
        }
        self.notify(mess_id, Collection::Members);
        Ok(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::member::Role;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[tokio::test]
    async fn test_missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(Some(dir.path().to_path_buf())).unwrap();
        let month = MonthKey::new(2026, 10).unwrap();

        assert!(store.list_meals("home", month).await.unwrap().is_empty());
        assert!(store.list_transactions("home", month).await.unwrap().is_empty());
        assert!(store.list_guest_meals("home").await.unwrap().is_empty());
        assert!(store.list_members("home").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_meal_replaces_same_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(Some(dir.path().to_path_buf())).unwrap();
        let month = MonthKey::new(2026, 10).unwrap();

        store.upsert_meal("home", MealEntry::new("a".into(), day(1), true, true, true)).await.unwrap();
        store.upsert_meal("home", MealEntry::new("a".into(), day(1), false, true, false)).await.unwrap();
        store.upsert_meal("home", MealEntry::new("a".into(), day(2), false, false, true)).await.unwrap();

        let meals = store.list_meals("home", month).await.unwrap();
        assert_eq!(meals.len(), 2);
        assert_eq!(meals.iter().map(|m| m.meal_count()).sum::<u32>(), 2);
        assert!(dir.path().join("home").join("meals_2026_10.json").exists());
    }

    #[tokio::test]
    async fn test_transactions_are_filed_by_month() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(Some(dir.path().to_path_buf())).unwrap();

        store.add_transaction("home", TransactionEntry::expense(200.0, true, day(3))).await.unwrap();
        let sept = NaiveDate::from_ymd_opt(2026, 9, 30).unwrap();
        store.add_transaction("home", TransactionEntry::expense(80.0, false, sept)).await.unwrap();

        let oct = store.list_transactions("home", MonthKey::new(2026, 10).unwrap()).await.unwrap();
        let sep = store.list_transactions("home", MonthKey::new(2026, 9).unwrap()).await.unwrap();
        assert_eq!(oct.len(), 1);
        assert_eq!(sep.len(), 1);
        assert_eq!(sep[0].amount, 80.0);
    }

    #[tokio::test]
    async fn test_writes_publish_change_events() {
        let dir = tempfile::tempdir().unwrap();
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();
        let store = FileRecordStore::new(Some(dir.path().to_path_buf())).unwrap().with_feed(feed);

        store.add_member("home", Member::new("Alice".into(), Role::Manager)).await.unwrap();
        store.add_guest_meal("home", GuestMealEntry::new("a".into(), day(4), 60.0)).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().collection, Collection::Members);
        assert_eq!(rx.recv().await.unwrap().collection, Collection::GuestMeals);
    }

    #[tokio::test]
    async fn test_duplicate_member_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(Some(dir.path().to_path_buf())).unwrap();

        store.add_member("home", Member::new("Alice".into(), Role::Manager)).await.unwrap();
        assert!(store.add_member("home", Member::new("alice".into(), Role::Member)).await.is_err());
        store.add_member("home", Member::new("Émile".into(), Role::Member)).await.unwrap();
        assert!(store.add_member("home", Member::new("émile".into(), Role::Member)).await.is_err());
        assert_eq!(store.list_members("home").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_mess_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecordStore::new(Some(dir.path().to_path_buf())).unwrap();
        assert!(store.list_guest_meals("../escape").await.is_err());
        assert!(store.list_members("").await.is_err());
    }
}
