use serde::{Serialize, Deserialize};
use crate::model::stats::{HouseStats, MemberStat, MonthlySnapshot};

/// Two-decimal rendering of a currency amount. Rounding happens here only.
pub fn format_money(amount: f64) -> String {
    // Avoid printing "-0.00" for tiny negative residues.
    if amount.abs() < 0.005 {
        return "0.00".to_string();
    }
    format!("{:.2}", amount)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HouseSummaryDto {
    pub month: String,
    pub total_meal: String,
    pub total_bazar: String,
    pub cost_per_meal: String,
    pub total_deposit: String,
    pub remaining_money: String,
    pub total_guest_meal: String,
}

impl HouseSummaryDto {
    pub fn from_stats(house: &HouseStats) -> Self {
        Self {
            month: house.current_month.clone(),
            total_meal: house.total_meal.to_string(),
            total_bazar: format_money(house.total_bazar),
            cost_per_meal: format_money(house.cost_per_meal),
            total_deposit: format_money(house.total_deposit),
            remaining_money: format_money(house.remaining_money),
            total_guest_meal: format_money(house.total_guest_meal),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MemberRowDto {
    pub name: String,
    pub meal: String,
    pub deposit: String,
    pub common_charge: String,
    pub meal_cost: String,
    pub guest_meal_cost: String,
    pub total_cost: String,
    pub balance: String,
    // Flattened for UI colouring
    pub owes: bool,
}

impl MemberRowDto {
    pub fn from_stat(stat: &MemberStat) -> Self {
        Self {
            name: stat.name.clone(),
            meal: stat.meal.to_string(),
            deposit: format_money(stat.deposit),
            common_charge: format_money(stat.common_charge),
            meal_cost: format_money(stat.meal_cost),
            guest_meal_cost: format_money(stat.guest_meal_cost),
            total_cost: format_money(stat.total_cost),
            balance: format_money(stat.balance),
            owes: stat.balance <= -0.005,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SnapshotDto {
    pub house: HouseSummaryDto,
    pub members: Vec<MemberRowDto>,
}

impl SnapshotDto {
    pub fn from_snapshot(snapshot: &MonthlySnapshot) -> Self {
        Self {
            house: HouseSummaryDto::from_stats(&snapshot.house),
            members: snapshot.members.iter().map(MemberRowDto::from_stat).collect(),
        }
    }
}
