//! Cron schedule expressions.
//!
//! # Design
//! - Parsing is delegated to the `cron` crate; this wrapper only normalises input.
//! - Classic five-field expressions gain a leading seconds field of `0`.
//! - Fire times are evaluated in local time and reported in UTC.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use cron::Schedule;

use crate::error::{ConfigError, ConfigResult};

/// A parsed cron schedule along with the text it came from.
#[derive(Debug, Clone)]
pub struct ScheduleExpr {
    source: String,
    schedule: Schedule,
}

impl ScheduleExpr {
    /// Parse a schedule expression.
    ///
    /// Accepts `@daily`-style descriptors, five-field expressions
    /// (`min hour dom month dow`) and the six/seven-field forms understood by
    /// the `cron` crate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSchedule`] when the expression is rejected.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let trimmed = raw.trim();
        let normalised = if !trimmed.starts_with('@') && trimmed.split_whitespace().count() == 5 {
            format!("0 {trimmed}")
        } else {
            trimmed.to_string()
        };
        let schedule =
            Schedule::from_str(&normalised).map_err(|source| ConfigError::InvalidSchedule {
                value: raw.to_string(),
                source,
            })?;
        Ok(Self {
            source: trimmed.to_string(),
            schedule,
        })
    }

    /// The expression as configured.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Next fire time strictly after `after`, if the schedule has one.
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&after.with_timezone(&Local))
            .next()
            .map(|at| at.with_timezone(&Utc))
    }
}

impl Display for ScheduleExpr {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn five_field_expressions_are_accepted() -> anyhow::Result<()> {
        let expr = ScheduleExpr::parse("*/15 * * * *")?;
        assert_eq!(expr.as_str(), "*/15 * * * *");
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 2, 0).single();
        let now = now.ok_or_else(|| anyhow::anyhow!("invalid timestamp"))?;
        let next = expr
            .next_after(now)
            .ok_or_else(|| anyhow::anyhow!("expected a fire time"))?;
        assert!(next > now);
        assert!(next - now <= Duration::minutes(15));
        Ok(())
    }

    #[test]
    fn descriptors_fire_roughly_daily() -> anyhow::Result<()> {
        let expr = ScheduleExpr::parse("@daily")?;
        let now = Utc::now();
        let next = expr
            .next_after(now)
            .ok_or_else(|| anyhow::anyhow!("expected a fire time"))?;
        assert!(next > now);
        assert!(next - now <= Duration::hours(25));
        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            ScheduleExpr::parse("every tuesday"),
            Err(ConfigError::InvalidSchedule { .. })
        ));
    }
}
