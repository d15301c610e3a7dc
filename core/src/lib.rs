pub mod config;
pub mod error;
pub mod feed;
pub mod input;
pub mod model;
pub mod repository;
pub mod service;
pub mod time;

pub use config::AppConfig;
pub use error::{StatsError, StatsResult};
pub use feed::{ChangeEvent, ChangeFeed, Collection};
pub use input::{parse_args, parse_entry, expand_key, EntryKind, NewEntry, ParsedInput};
pub use model::member::{Member, Role};
pub use model::stats::{HouseStats, MemberStat, MonthlySnapshot};
pub use repository::{FileRecordStore, FileSnapshotCache, RecordStore, RosterRepository, SnapshotCache};
pub use service::aggregator::{compute_snapshot, StatsAggregator};
pub use service::dto::{format_money, SnapshotDto};
pub use service::entry_service::EntryService;
pub use service::recalc::{RecalcHandle, Recalculator};
pub use service::view::{StatsView, ViewState};
pub use time::{parse_entry_date, MonthKey};
