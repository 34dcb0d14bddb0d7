//! Periodic display-name audit.
//!
//! Planning is pure so that repeated scheduler firings can be reasoned about:
//! a member warned inside the cooldown window is never planned for another warning.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::domain::member::{is_valid_name_format, Member};

pub const DEFAULT_COOLDOWN_SECS: i64 = 3 * 24 * 60 * 60;
const MAX_COOLDOWN_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NameCheckPolicy {
    pub cooldown: Duration,
}

impl Default for NameCheckPolicy {
    fn default() -> Self {
        Self { cooldown: Duration::seconds(DEFAULT_COOLDOWN_SECS) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameCheckVerdict {
    Valid,
    Warn,
    Cooldown,
}

impl NameCheckPolicy {
    pub fn from_secs(cooldown_secs: u64) -> Self {
        let secs =
            i64::try_from(cooldown_secs.min(MAX_COOLDOWN_SECS)).unwrap_or(DEFAULT_COOLDOWN_SECS);
        Self { cooldown: Duration::seconds(secs) }
    }

    pub fn evaluate(&self, member: &Member, now: DateTime<Utc>) -> NameCheckVerdict {
        if is_valid_name_format(&member.display_name) {
            return NameCheckVerdict::Valid;
        }
        if member.warned_within(self.cooldown, now) {
            return NameCheckVerdict::Cooldown;
        }
        NameCheckVerdict::Warn
    }

    pub fn plan<'a>(&self, members: &'a [Member], now: DateTime<Utc>) -> NameCheckPlan<'a> {
        let mut plan = NameCheckPlan::default();
        for member in members {
            match self.evaluate(member, now) {
                NameCheckVerdict::Valid => plan.valid += 1,
                NameCheckVerdict::Cooldown => plan.skipped_cooldown += 1,
                NameCheckVerdict::Warn => plan.to_warn.push(member),
            }
        }
        plan
    }
}

#[derive(Debug, Default)]
pub struct NameCheckPlan<'a> {
    pub to_warn: Vec<&'a Member>,
    pub skipped_cooldown: usize,
    pub valid: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameCheckReport {
    pub scanned: usize,
    pub warned: usize,
    pub skipped_cooldown: usize,
    pub valid: usize,
    pub failed: usize,
}
