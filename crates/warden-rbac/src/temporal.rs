//! Temporal constraint validation.
//!
//! Each [`TemporalConstraint`] field is checked by its own validator. Which
//! validators run is chosen by a [`TemporalPolicy`]; a disabled validator
//! never rejects.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_types::TemporalConstraint;

/// Error type for temporal validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemporalError {
    #[error("not valid before {begin}")]
    NotYetValid { begin: NaiveDate },

    #[error("expired on {end}")]
    Expired { end: NaiveDate },

    #[error("locked from {begin}{}", .end.map(|e| format!(" until {e}")).unwrap_or_default())]
    Locked {
        begin: NaiveDate,
        end: Option<NaiveDate>,
    },

    #[error("outside allowed time window {begin}-{end}")]
    OutsideTimeWindow { begin: NaiveTime, end: NaiveTime },

    #[error("not allowed on {day}")]
    DayNotAllowed { day: Weekday },

    #[error("idle for more than {minutes} minutes")]
    TimedOut { minutes: u32 },
}

/// Result type for temporal validation.
pub type Result<T> = std::result::Result<T, TemporalError>;

/// Selects which validators run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalPolicy {
    pub date: bool,
    pub lock_date: bool,
    pub time: bool,
    pub day: bool,
    pub timeout: bool,
}

impl TemporalPolicy {
    /// Every validator enabled.
    pub fn all() -> Self {
        Self {
            date: true,
            lock_date: true,
            time: true,
            day: true,
            timeout: true,
        }
    }

    /// Every validator disabled.
    pub fn none() -> Self {
        Self {
            date: false,
            lock_date: false,
            time: false,
            day: false,
            timeout: false,
        }
    }
}

impl Default for TemporalPolicy {
    fn default() -> Self {
        Self::all()
    }
}

/// Runs the enabled validators against a constraint at a point in time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalValidator {
    policy: TemporalPolicy,
}

impl TemporalValidator {
    pub fn new(policy: TemporalPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TemporalPolicy {
        self.policy
    }

    /// Validates `constraint` at `now`.
    ///
    /// `last_access` is the previous use of the owning session; it is only
    /// consulted by the timeout validator and is ignored when `None`.
    pub fn validate(
        &self,
        constraint: &TemporalConstraint,
        now: DateTime<Utc>,
        last_access: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let today = now.date_naive();

        if self.policy.date {
            check_dates(constraint, today)?;
        }
        if self.policy.lock_date {
            check_lock(constraint, today)?;
        }
        if self.policy.time {
            check_time(constraint, now.time())?;
        }
        if self.policy.day {
            check_day(constraint, today.weekday())?;
        }
        if self.policy.timeout {
            check_timeout(constraint, now, last_access)?;
        }
        Ok(())
    }

    /// Validates only the idle timeout. Used when re-checking live sessions.
    pub fn validate_timeout(
        &self,
        constraint: &TemporalConstraint,
        now: DateTime<Utc>,
        last_access: DateTime<Utc>,
    ) -> Result<()> {
        if !self.policy.timeout {
            return Ok(());
        }
        check_timeout(constraint, now, Some(last_access))
    }
}

fn check_dates(c: &TemporalConstraint, today: NaiveDate) -> Result<()> {
    if let Some(begin) = c.begin_date
        && today < begin
    {
        return Err(TemporalError::NotYetValid { begin });
    }
    if let Some(end) = c.end_date
        && today > end
    {
        return Err(TemporalError::Expired { end });
    }
    Ok(())
}

// A lock needs a start; a missing end leaves the lock open-ended.
fn check_lock(c: &TemporalConstraint, today: NaiveDate) -> Result<()> {
    let Some(begin) = c.begin_lock_date else {
        return Ok(());
    };
    let locked = today >= begin && c.end_lock_date.is_none_or(|end| today <= end);
    if locked {
        return Err(TemporalError::Locked {
            begin,
            end: c.end_lock_date,
        });
    }
    Ok(())
}

fn check_time(c: &TemporalConstraint, now: NaiveTime) -> Result<()> {
    let (Some(begin), Some(end)) = (c.begin_time, c.end_time) else {
        return Ok(());
    };
    let inside = if begin <= end {
        now >= begin && now <= end
    } else {
        now >= begin || now <= end
    };
    if inside {
        Ok(())
    } else {
        Err(TemporalError::OutsideTimeWindow { begin, end })
    }
}

fn check_day(c: &TemporalConstraint, day: Weekday) -> Result<()> {
    match c.day_mask {
        Some(mask) if !mask.contains(day) => Err(TemporalError::DayNotAllowed { day }),
        _ => Ok(()),
    }
}

fn check_timeout(
    c: &TemporalConstraint,
    now: DateTime<Utc>,
    last_access: Option<DateTime<Utc>>,
) -> Result<()> {
    let (Some(minutes), Some(last)) = (c.timeout_minutes, last_access) else {
        return Ok(());
    };
    if minutes == 0 {
        return Ok(());
    }
    if now - last > Duration::minutes(i64::from(minutes)) {
        return Err(TemporalError::TimedOut { minutes });
    }
    Ok(())
}
