use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::access::{derive_effective_status, EffectiveStatus};

/// Trial window granted to self-registered accounts.
pub const TRIAL_WINDOW_HOURS: i64 = 24;
/// Access window granted to accounts created by an administrator.
pub const PROVISIONED_WINDOW_DAYS: i64 = 365;
/// Owner accounts never need to pay.
pub const OWNER_WINDOW_DAYS: i64 = 365 * 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccountStatus {
    Trial,
    Active,
    Suspended,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub telegram_id: Option<i64>,
    pub role: Role,
    pub status: AccountStatus,
    pub trial_ends_at: DateTime<Utc>,
    pub daily_limit: i64,
    pub alert_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The authenticated caller of a request.
///
/// Produced once from the bearer token and handed explicitly to every
/// component that needs identity. Status is never carried here; it is always
/// read fresh from the account store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub account_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BudgetSettings {
    pub daily_limit: i64,
    pub alert_message: Option<String>,
}

/// Partial edit of identity fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub telegram_id: Option<i64>,
    pub unlink_telegram: bool,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.password_hash.is_none()
            && self.telegram_id.is_none()
            && !self.unlink_telegram
    }
}

impl Account {
    fn base(
        username: String,
        password_hash: String,
        role: Role,
        status: AccountStatus,
        trial_ends_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            password_hash,
            telegram_id: None,
            role,
            status,
            trial_ends_at,
            daily_limit: 0,
            alert_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Self-registered account, starting its trial window now.
    pub fn new_trial(
        username: String,
        password_hash: String,
        trial_window: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self::base(
            username,
            password_hash,
            Role::User,
            AccountStatus::Trial,
            now + trial_window,
            now,
        )
    }

    /// Account created by an administrator: active from the start.
    pub fn new_provisioned(
        username: String,
        password_hash: String,
        telegram_id: Option<i64>,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let mut account = Self::base(
            username,
            password_hash,
            Role::User,
            AccountStatus::Active,
            now + window,
            now,
        );
        account.telegram_id = telegram_id;
        account
    }

    pub fn new_owner(username: String, password_hash: String, now: DateTime<Utc>) -> Self {
        Self::base(
            username,
            password_hash,
            Role::Admin,
            AccountStatus::Active,
            now + Duration::days(OWNER_WINDOW_DAYS),
            now,
        )
    }

    pub fn principal(&self) -> Principal {
        Principal {
            account_id: self.id,
            role: self.role,
        }
    }

    pub fn effective_status(&self, now: DateTime<Utc>) -> EffectiveStatus {
        if self.role == Role::Admin {
            return EffectiveStatus::Admin;
        }
        derive_effective_status(self.status, self.trial_ends_at, now)
    }

    /// Whole hours left in the trial window, zero once it has passed.
    pub fn trial_hours_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.trial_ends_at - now).num_hours().max(0)
    }

    pub fn budget(&self) -> BudgetSettings {
        BudgetSettings {
            daily_limit: self.daily_limit,
            alert_message: self.alert_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn registration_starts_a_day_long_trial() {
        let now = Utc::now();
        let account = Account::new_trial(
            "budi".to_string(),
            "hash".to_string(),
            Duration::hours(TRIAL_WINDOW_HOURS),
            now,
        );

        assert_eq!(account.status, AccountStatus::Trial);
        assert_eq!(account.role, Role::User);
        assert_eq!(account.trial_ends_at, now + Duration::hours(24));
        assert!(account.telegram_id.is_none());
        assert_eq!(account.daily_limit, 0);
    }

    #[test]
    fn provisioned_accounts_are_active_for_a_year() {
        let now = Utc::now();
        let account = Account::new_provisioned(
            "sari".to_string(),
            "hash".to_string(),
            Some(42),
            Duration::days(PROVISIONED_WINDOW_DAYS),
            now,
        );

        assert_eq!(account.status, AccountStatus::Active);
        assert_eq!(account.telegram_id, Some(42));
        assert!(account.trial_ends_at - now >= Duration::days(365));
    }

    #[test]
    fn owner_is_admin_and_always_effective_admin() {
        let now = Utc::now();
        let mut owner = Account::new_owner("root".to_string(), "hash".to_string(), now);
        owner.status = AccountStatus::Suspended;

        assert_eq!(owner.effective_status(now), EffectiveStatus::Admin);
        assert!(owner.principal().is_admin());
    }

    #[test]
    fn status_and_role_round_trip_through_text() {
        assert_eq!(AccountStatus::Pending.to_string(), "pending");
        assert_eq!(AccountStatus::from_str("suspended").unwrap(), AccountStatus::Suspended);
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert!(AccountStatus::from_str("vip").is_err());
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let account = Account::new_trial(
            "budi".to_string(),
            "secret-hash".to_string(),
            Duration::hours(1),
            Utc::now(),
        );
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("secret-hash"));
    }

    #[test]
    fn trial_hours_remaining_clamps_at_zero() {
        let now = Utc::now();
        let mut account =
            Account::new_trial("a".to_string(), "h".to_string(), Duration::hours(5), now);
        assert_eq!(account.trial_hours_remaining(now), 5);

        account.trial_ends_at = now - Duration::hours(3);
        assert_eq!(account.trial_hours_remaining(now), 0);
    }
}
