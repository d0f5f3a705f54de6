//! Database queries

pub mod activity;
pub mod feedback;
pub mod profile;
pub mod report;
