pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod form;
pub mod format;
pub mod query;
pub mod schedule;
