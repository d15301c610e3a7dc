use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::config::DEFAULT_CACHE_TTL_SECS;
use crate::error::{StatsError, StatsResult};
use crate::feed::Collection;
use crate::model::guest_meal::GuestMealEntry;
use crate::model::meal::MealEntry;
use crate::model::member::{manager_count, name_key, Member};
use crate::model::stats::{CachedSnapshot, HouseStats, MemberStat, MonthlySnapshot};
use crate::model::transaction::{LedgerClass, TransactionEntry};
use crate::repository::{CacheKey, RecordStore, RosterRepository, SnapshotCache};
use crate::time::MonthKey;

/// Month-wide sums the per-member rows are derived from.
#[derive(Debug, Default)]
struct Totals {
    meals: HashMap<String, u32>,
    deposits: HashMap<String, f64>,
    guest_costs: HashMap<String, f64>,
    total_meal: u32,
    total_deposit: f64,
    total_guest_meal: f64,
    total_common_expense: f64,
    total_individual_expense: f64,
}

impl Totals {
    fn reduce(
        month: MonthKey,
        roster: &[Member],
        meals: &[MealEntry],
        transactions: &[TransactionEntry],
        guest_meals: &[GuestMealEntry],
    ) -> Self {
        let mut totals = Totals::default();
        let on_roster = |id: &str| roster.iter().any(|m| m.id == id);

        for entry in meals {
            if !on_roster(&entry.member_id) {
                tracing::warn!(member_id = %entry.member_id, date = %entry.date, "meal entry for unknown member ignored");
                continue;
            }
            *totals.meals.entry(entry.member_id.clone()).or_default() += entry.meal_count();
            totals.total_meal += entry.meal_count();
        }

        for entry in guest_meals.iter().filter(|g| month.contains(g.date)) {
            if !on_roster(&entry.member_id) {
                tracing::warn!(member_id = %entry.member_id, date = %entry.date, "guest meal for unknown member ignored");
                continue;
            }
            *totals.guest_costs.entry(entry.member_id.clone()).or_default() += entry.total_amount;
            totals.total_guest_meal += entry.total_amount;
        }

        for entry in transactions {
            match entry.classify() {
                LedgerClass::Deposit => {
                    if let Some(member_id) = &entry.member_id {
                        *totals.deposits.entry(member_id.clone()).or_default() += entry.amount;
                    }
                    totals.total_deposit += entry.amount;
                }
                LedgerClass::CommonExpense => totals.total_common_expense += entry.amount,
                LedgerClass::IndividualExpense => totals.total_individual_expense += entry.amount,
                LedgerClass::GuestAdjustment => {}
            }
        }

        totals
    }

    fn common_charge_per_member(&self, member_count: usize) -> f64 {
        if member_count > 0 {
            self.total_common_expense / member_count as f64
        } else {
            0.0
        }
    }

    fn cost_per_meal(&self) -> f64 {
        if self.total_meal > 0 {
            ((self.total_individual_expense - self.total_guest_meal) / self.total_meal as f64).max(0.0)
        } else {
            0.0
        }
    }
}

/// Pure monthly reduction: record sets in, snapshot out.
///
/// Meals and guest meals are only counted for members on the roster, so the
/// house meal total always equals the sum of the member rows. Deposits count
/// toward the house total whoever made them.
pub fn compute_snapshot(
    mess_id: &str,
    month: MonthKey,
    roster: &[Member],
    meals: &[MealEntry],
    transactions: &[TransactionEntry],
    guest_meals: &[GuestMealEntry],
) -> MonthlySnapshot {
    let totals = Totals::reduce(month, roster, meals, transactions, guest_meals);
    let common_charge = totals.common_charge_per_member(roster.len());
    let cost_per_meal = totals.cost_per_meal();

    let mut members: Vec<MemberStat> = roster
        .iter()
        .map(|member| {
            let meal = totals.meals.get(&member.id).copied().unwrap_or(0);
            let deposit = totals.deposits.get(&member.id).copied().unwrap_or(0.0);
            let guest_meal_cost = totals.guest_costs.get(&member.id).copied().unwrap_or(0.0);
            let meal_cost = meal as f64 * cost_per_meal;
            let total_cost = common_charge + meal_cost + guest_meal_cost;
            MemberStat {
                id: member.id.clone(),
                name: member.name.clone(),
                meal,
                deposit,
                common_charge,
                meal_cost,
                guest_meal_cost,
                total_cost,
                balance: deposit - total_cost,
            }
        })
        .collect();
    members.sort_by_cached_key(|m| name_key(&m.name));

    let grand_total_expense = totals.total_common_expense + totals.total_individual_expense;
    let house = HouseStats {
        current_month: month.label(),
        total_meal: totals.total_meal,
        total_bazar: grand_total_expense,
        cost_per_meal,
        remaining_money: totals.total_deposit - grand_total_expense,
        total_guest_meal: totals.total_guest_meal,
        total_deposit: totals.total_deposit,
        total_common_expense: totals.total_common_expense,
        total_individual_expense: totals.total_individual_expense,
    };

    MonthlySnapshot {
        mess_id: mess_id.to_string(),
        month,
        house,
        members,
    }
}

/// Fetches a month's records and reduces them, with a best-effort cache in
/// front for optimistic display.
pub struct StatsAggregator<S, C> {
    store: Arc<S>,
    cache: Arc<C>,
    cache_ttl: Duration,
}

impl<S, C> Clone for StatsAggregator<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            cache_ttl: self.cache_ttl,
        }
    }
}

impl<S, C> StatsAggregator<S, C>
where
    S: RecordStore + RosterRepository,
    C: SnapshotCache,
{
    pub fn new(store: Arc<S>, cache: Arc<C>) -> Self {
        Self {
            store,
            cache,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn load_roster(&self, mess_id: &str) -> StatsResult<Vec<Member>> {
        let roster = self.store.list_members(mess_id).await.map_err(StatsError::Roster)?;
        let managers = manager_count(&roster);
        if !roster.is_empty() && managers != 1 {
            tracing::warn!(mess_id, managers, "mess should have exactly one manager");
        }
        Ok(roster)
    }

    /// Recomputes the month from scratch. Any fetch failure fails the whole
    /// run and nothing is cached.
    pub async fn aggregate(&self, mess_id: &str, month: MonthKey, roster: &[Member]) -> StatsResult<MonthlySnapshot> {
        let (meals, transactions, guest_meals) = tokio::try_join!(
            async {
                self.store
                    .list_meals(mess_id, month)
                    .await
                    .map_err(StatsError::fetch(Collection::Meals))
            },
            async {
                self.store
                    .list_transactions(mess_id, month)
                    .await
                    .map_err(StatsError::fetch(Collection::Transactions))
            },
            async {
                self.store
                    .list_guest_meals(mess_id)
                    .await
                    .map_err(StatsError::fetch(Collection::GuestMeals))
            },
        )?;

        let snapshot = compute_snapshot(mess_id, month, roster, &meals, &transactions, &guest_meals);
        tracing::debug!(
            mess_id,
            %month,
            total_meal = snapshot.house.total_meal,
            cost_per_meal = snapshot.house.cost_per_meal,
            "aggregated monthly stats"
        );

        let entry = CachedSnapshot {
            snapshot,
            written_at_millis: Utc::now().timestamp_millis(),
        };
        if let Err(e) = self.cache.put(&CacheKey::new(mess_id, month), &entry).await {
            tracing::warn!("Failed to cache snapshot for {mess_id} {month}: {e}");
        }
        Ok(entry.snapshot)
    }

    /// Loads the roster, then aggregates.
    pub async fn refresh(&self, mess_id: &str, month: MonthKey) -> StatsResult<MonthlySnapshot> {
        let roster = self.load_roster(mess_id).await?;
        self.aggregate(mess_id, month, &roster).await
    }

    pub async fn cached(&self, mess_id: &str, month: MonthKey) -> Option<MonthlySnapshot> {
        self.cached_at(mess_id, month, Utc::now().timestamp_millis()).await
    }

    /// Cached snapshot if it is within the freshness window at `now_millis`.
    pub async fn cached_at(&self, mess_id: &str, month: MonthKey, now_millis: i64) -> Option<MonthlySnapshot> {
        match self.cache.get(&CacheKey::new(mess_id, month)).await {
            Ok(Some(entry)) if entry.is_fresh(now_millis, self.cache_ttl.as_millis() as i64) => Some(entry.snapshot),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Failed to read cached snapshot for {mess_id} {month}: {e}");
                None
            }
        }
    }
}
