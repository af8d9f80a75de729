// Shared library for the tender monitoring service

pub mod audit;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod dedup;
pub mod errors;
pub mod lease;
pub mod mailer;
pub mod models;
pub mod poll;
pub mod report;
pub mod retention;
pub mod schedule;
pub mod scheduler;
pub mod scraper;
pub mod telemetry;
