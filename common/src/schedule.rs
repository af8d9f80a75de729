// Daily schedule calculation in the configured timezone

use crate::config::ScanConfig;
use crate::errors::ScheduleError;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::str::FromStr;

/// A fixed daily occurrence (hour:minute) evaluated in a named timezone
#[derive(Debug, Clone)]
pub struct DailySchedule {
    expression: String,
    schedule: CronSchedule,
    timezone: Tz,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32, timezone: &str) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::InvalidCronExpression {
                expression: format!("{}:{:02}", hour, minute),
                reason: "hour must be 0-23 and minute 0-59".to_string(),
            });
        }

        let tz: Tz = timezone
            .parse()
            .map_err(|_| ScheduleError::InvalidTimezone(timezone.to_string()))?;

        // sec min hour day-of-month month day-of-week
        let expression = format!("0 {} {} * * *", minute, hour);
        let schedule = CronSchedule::from_str(&expression).map_err(|e| {
            ScheduleError::InvalidCronExpression {
                expression: expression.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            expression,
            schedule,
            timezone: tz,
        })
    }

    /// The daily scan schedule from settings
    pub fn scan(config: &ScanConfig) -> Result<Self, ScheduleError> {
        Self::new(config.hour, config.minute, &config.timezone)
    }

    /// The nightly maintenance schedule from settings
    pub fn maintenance(config: &ScanConfig) -> Result<Self, ScheduleError> {
        Self::new(config.maintenance_hour, 0, &config.timezone)
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Next occurrence strictly after `after`, returned in UTC
    pub fn next_occurrence(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        let reference = after.with_timezone(&self.timezone);
        self.schedule
            .after(&reference)
            .next()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| ScheduleError::NoNextOccurrence(self.expression.clone()))
    }
}
