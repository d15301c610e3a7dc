use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One member's meals on one day. Keyed by `(member_id, date)`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MealEntry {
    pub member_id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub breakfast: bool,
    #[serde(default)]
    pub lunch: bool,
    #[serde(default)]
    pub dinner: bool,
}

impl MealEntry {
    pub fn new(member_id: String, date: NaiveDate, breakfast: bool, lunch: bool, dinner: bool) -> Self {
        Self {
            member_id,
            date,
            breakfast,
            lunch,
            dinner,
        }
    }

    pub fn meal_count(&self) -> u32 {
        self.breakfast as u32 + self.lunch as u32 + self.dinner as u32
    }

    pub fn same_slot(&self, other: &MealEntry) -> bool {
        self.member_id == other.member_id && self.date == other.date
    }
}
