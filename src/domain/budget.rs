pub const DEFAULT_ALERT_MESSAGE: &str = "You have reached your daily spending limit!";

/// Warning to show once today's expenses reach the daily limit.
///
/// `spent_today` must already include the transaction that triggered the
/// evaluation. A limit of zero or less disables alerts.
pub fn budget_warning(
    daily_limit: i64,
    spent_today: i64,
    alert_message: Option<&str>,
) -> Option<String> {
    if daily_limit <= 0 || spent_today < daily_limit {
        return None;
    }

    let message = alert_message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_ALERT_MESSAGE);
    Some(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaching_the_limit_warns() {
        assert_eq!(
            budget_warning(100_000, 100_000, None).as_deref(),
            Some(DEFAULT_ALERT_MESSAGE)
        );
    }

    #[test]
    fn just_below_the_limit_is_silent() {
        assert!(budget_warning(100_000, 99_999, None).is_none());
    }

    #[test]
    fn disabled_limit_never_warns() {
        assert!(budget_warning(0, 1_000_000, Some("stop")).is_none());
    }

    #[test]
    fn custom_message_replaces_default() {
        assert_eq!(
            budget_warning(10, 11, Some("Hemat, bos!")).as_deref(),
            Some("Hemat, bos!")
        );
        assert_eq!(
            budget_warning(10, 11, Some("  ")).as_deref(),
            Some(DEFAULT_ALERT_MESSAGE)
        );
    }
}
