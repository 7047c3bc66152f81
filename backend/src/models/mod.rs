pub mod user;
pub mod student;
pub mod faculty;
pub mod category;
pub mod activity;
pub mod portfolio;
pub mod sheet;
pub mod sheet_entry;
pub mod job_posting;
