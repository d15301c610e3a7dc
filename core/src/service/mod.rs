pub mod aggregator;
pub mod dto;
pub mod entry_service;
pub mod recalc;
pub mod view;
