pub mod activities;
pub mod aggregation;
pub mod approval_webhook;
pub mod capabilities;
pub mod file_store;
pub mod portfolios;
pub mod sheet_cache;
pub mod sheet_log;
