//! Fetch windows over `date_received`.
//!
//! A window states which complaints a fetched batch claims to cover. Only
//! keys inside the window can be classified as deleted, so the window a
//! snapshot was fetched for and the window its baseline was read for must be
//! the same.

use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A span of `date_received` values: `after` is exclusive, `through` is
/// inclusive, and a missing bound is unbounded.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Window {
  pub after:   Option<NaiveDate>,
  pub through: Option<NaiveDate>,
}

impl Window {
  /// The whole upstream history. Used for the first run.
  pub const fn full() -> Self { Self { after: None, through: None } }

  /// Complaints received during the `days` days up to and including `today`.
  pub fn last_days(today: NaiveDate, days: u32) -> Self {
    let after = today
      .checked_sub_days(Days::new(u64::from(days)))
      .unwrap_or(NaiveDate::MIN);
    Self { after: Some(after), through: None }
  }

  /// A closed-above range `(after, through]`.
  pub fn between(after: NaiveDate, through: NaiveDate) -> Result<Self> {
    if after >= through {
      return Err(Error::InvalidWindow(format!(
        "lower bound {after} is not before upper bound {through}"
      )));
    }
    Ok(Self { after: Some(after), through: Some(through) })
  }

  pub fn contains(&self, date: NaiveDate) -> bool {
    self.after.is_none_or(|a| date > a) && self.through.is_none_or(|t| date <= t)
  }
}

impl fmt::Display for Window {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (self.after, self.through) {
      (None, None) => write!(f, "full history"),
      (Some(a), None) => write!(f, "received after {a}"),
      (None, Some(t)) => write!(f, "received through {t}"),
      (Some(a), Some(t)) => write!(f, "received in ({a}, {t}]"),
    }
  }
}
