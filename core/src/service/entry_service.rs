use crate::input::NewEntry;
use crate::model::member::{find_by_name, manager_count, Member, Role};
use crate::repository::{RecordStore, RosterRepository};
use anyhow::{anyhow, Result};

/// Writes members and ledger entries for one mess.
pub struct EntryService<R: RecordStore + RosterRepository> {
    repo: R,
    mess_id: String,
}

impl<R: RecordStore + RosterRepository> EntryService<R> {
    pub fn new(repo: R, mess_id: String) -> Self {
        Self { repo, mess_id }
    }

    pub fn mess_id(&self) -> &str {
        &self.mess_id
    }

    pub async fn roster(&self) -> Result<Vec<Member>> {
        self.repo.list_members(&self.mess_id).await
    }

    /// The first member of a mess becomes its manager.
    pub async fn add_member(&self, name: &str, as_manager: bool) -> Result<Member> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow!("Member name is required"));
        }
        let roster = self.roster().await?;
        if find_by_name(&roster, name).is_some() {
            return Err(anyhow!("Member '{}' already exists", name));
        }
        let role = if as_manager || roster.is_empty() { Role::Manager } else { Role::Member };
        if role == Role::Manager && manager_count(&roster) > 0 {
            return Err(anyhow!("This mess already has a manager"));
        }
        self.repo.add_member(&self.mess_id, Member::new(name.to_string(), role)).await
    }

    pub async fn record(&self, entry: NewEntry) -> Result<()> {
        match entry {
            NewEntry::Meal(meal) => self.repo.upsert_meal(&self.mess_id, meal).await,
            NewEntry::Deposit(t) | NewEntry::Expense(t) => self.repo.add_transaction(&self.mess_id, t).await.map(|_| ()),
            NewEntry::GuestMeal(g) => self.repo.add_guest_meal(&self.mess_id, g).await.map(|_| ()),
        }
    }
}
