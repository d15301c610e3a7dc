use serde::{Deserialize, Serialize};

use crate::time::MonthKey;

/// House-wide totals for one mess and month.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct HouseStats {
    pub current_month: String,
    pub total_meal: u32,
    /// Grand total expense: common plus gross individual.
    pub total_bazar: f64,
    pub cost_per_meal: f64,
    pub remaining_money: f64,
    pub total_guest_meal: f64,
    pub total_deposit: f64,
    pub total_common_expense: f64,
    pub total_individual_expense: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemberStat {
    pub id: String,
    pub name: String,
    pub meal: u32,
    pub deposit: f64,
    pub common_charge: f64,
    pub meal_cost: f64,
    pub guest_meal_cost: f64,
    pub total_cost: f64,
    /// Negative means the member owes the mess.
    pub balance: f64,
}

/// Result of one aggregation. Replaced wholesale, never patched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySnapshot {
    pub mess_id: String,
    pub month: MonthKey,
    pub house: HouseStats,
    pub members: Vec<MemberStat>,
}

/// A snapshot as persisted in the cache.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedSnapshot {
    pub snapshot: MonthlySnapshot,
    pub written_at_millis: i64,
}

impl CachedSnapshot {
    pub fn is_fresh(&self, now_millis: i64, ttl_millis: i64) -> bool {
        now_millis - self.written_at_millis <= ttl_millis
    }
}
