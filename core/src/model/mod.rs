pub mod guest_meal;
pub mod meal;
pub mod member;
pub mod stats;
pub mod transaction;
