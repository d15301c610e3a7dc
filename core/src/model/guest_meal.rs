use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cost of meals served to a member's guests, billed to that member.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GuestMealEntry {
    pub id: Uuid,
    pub member_id: String,
    pub date: NaiveDate,
    pub total_amount: f64,
    pub note: Option<String>,
}

impl GuestMealEntry {
    pub fn new(member_id: String, date: NaiveDate, total_amount: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_id,
            date,
            total_amount,
            note: None,
        }
    }
}
