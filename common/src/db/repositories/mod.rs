// Repository layer for database operations

pub mod config;
pub mod job;
pub mod notification;
pub mod tender;

pub use config::ConfigRepository;
pub use job::{JobRepository, JobStatusCounts, JobStore};
pub use notification::{NotificationRepository, NotificationStore};
pub use tender::{TenderRepository, TenderSourceStats, TenderStore};

#[cfg(test)]
pub use job::MockJobStore;
#[cfg(test)]
pub use notification::MockNotificationStore;
#[cfg(test)]
pub use tender::MockTenderStore;
