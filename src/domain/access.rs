use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::account::AccountStatus;

/// Access decision derived at request time.
///
/// May differ from the stored status: a stored `Trial` whose deadline has
/// passed is `TrialExpired` until the gate persists the suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveStatus {
    Admin,
    Active,
    TrialValid,
    TrialExpired,
    Suspended,
    Pending,
}

impl EffectiveStatus {
    pub fn may_proceed(self) -> bool {
        matches!(
            self,
            EffectiveStatus::Admin
                | EffectiveStatus::Active
                | EffectiveStatus::TrialValid
                | EffectiveStatus::Pending
        )
    }

    /// Status that should be persisted for this decision, when it differs
    /// from what is stored.
    pub fn transition_from(self, stored: AccountStatus) -> Option<AccountStatus> {
        match (self, stored) {
            (EffectiveStatus::TrialExpired, AccountStatus::Trial) => Some(AccountStatus::Suspended),
            _ => None,
        }
    }
}

pub fn derive_effective_status(
    status: AccountStatus,
    trial_ends_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> EffectiveStatus {
    match status {
        AccountStatus::Active => EffectiveStatus::Active,
        AccountStatus::Suspended => EffectiveStatus::Suspended,
        AccountStatus::Pending => EffectiveStatus::Pending,
        AccountStatus::Trial if now > trial_ends_at => EffectiveStatus::TrialExpired,
        AccountStatus::Trial => EffectiveStatus::TrialValid,
    }
}

/// Shift a trial deadline by whole days.
///
/// An already-passed deadline restarts from `now`; a deadline still in the
/// future moves relative to itself.
pub fn adjust_trial_deadline(
    current: DateTime<Utc>,
    days: i64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let delta = Duration::days(days);
    if now > current {
        now + delta
    } else {
        current + delta
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionChange {
    pub status: Option<AccountStatus>,
    pub add_trial_days: i64,
}

/// Resulting (status, deadline) of an administrator subscription edit.
///
/// A day adjustment without an explicit status puts the account back on
/// trial, so the new deadline is what the gate evaluates.
pub fn apply_subscription_change(
    status: AccountStatus,
    trial_ends_at: DateTime<Utc>,
    change: SubscriptionChange,
    now: DateTime<Utc>,
) -> (AccountStatus, DateTime<Utc>) {
    let mut next_status = change.status.unwrap_or(status);
    let mut next_deadline = trial_ends_at;

    if change.add_trial_days != 0 {
        next_deadline = adjust_trial_deadline(trial_ends_at, change.add_trial_days, now);
        if change.status.is_none() {
            next_status = AccountStatus::Trial;
        }
    }

    (next_status, next_deadline)
}
