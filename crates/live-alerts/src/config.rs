//! Alert system configuration.
//!
//! Configuration is read at startup or on update and never changes during a
//! rotation cycle.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event::{Category, SlotRole};

/// Longest an alert may be displayed, in seconds.
pub const MAX_ALERT_SECONDS: u64 = 6000;

/// Allowed poll interval range, in seconds.
pub const MIN_REFRESH_SECONDS: u64 = 10;
pub const MAX_REFRESH_SECONDS: u64 = 300;

/// Rotator period used for a display duration of zero.
pub const MIN_TICK_PERIOD: Duration = Duration::from_millis(50);

const DEFAULT_REFRESH_SECONDS: u64 = 10;
const DEFAULT_DISPLAY_SECONDS: u64 = 10;

/// Names of the text slots an alert writes to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotNames {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SlotNames {
    pub fn name_for(&self, role: SlotRole) -> Option<&str> {
        let name = match role {
            SlotRole::Username => &self.username,
            SlotRole::Amount => &self.amount,
            SlotRole::Message => &self.message,
        };
        name.as_deref().filter(|n| !n.is_empty())
    }

    fn slot_mut(&mut self, role: SlotRole) -> &mut Option<String> {
        match role {
            SlotRole::Username => &mut self.username,
            SlotRole::Amount => &mut self.amount,
            SlotRole::Message => &mut self.message,
        }
    }
}

/// Per-category alert settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_display_seconds")]
    pub display_duration_seconds: u64,
    /// Text sources written for each alert.
    #[serde(default)]
    pub slots: SlotNames,
    /// Scene item whose visibility shows and hides the alert.
    #[serde(default)]
    pub toggle: String,
}

fn default_true() -> bool {
    true
}

fn default_display_seconds() -> u64 {
    DEFAULT_DISPLAY_SECONDS
}

impl CategoryConfig {
    /// Default settings for a category.
    pub fn defaults_for(category: Category) -> Self {
        let mut config = Self {
            enabled: true,
            display_duration_seconds: DEFAULT_DISPLAY_SECONDS,
            slots: SlotNames::default(),
            toggle: String::new(),
        };
        config.fill_defaults(category);
        config
    }

    /// Rotator tick period.
    pub fn display_period(&self) -> Duration {
        if self.display_duration_seconds == 0 {
            MIN_TICK_PERIOD
        } else {
            Duration::from_secs(self.display_duration_seconds)
        }
    }

    fn fill_defaults(&mut self, category: Category) {
        let label = match category {
            Category::Follower => "Follower",
            Category::Subscriber => "Subscriber",
            Category::Rant => "Rant",
        };

        for role in category.required_slots() {
            let slot = self.slots.slot_mut(*role);
            if slot.as_deref().is_none_or(str::is_empty) {
                let suffix = match role {
                    SlotRole::Username => "Username",
                    SlotRole::Amount => "Amount Dollars",
                    SlotRole::Message => "Message",
                };
                *slot = Some(format!("{label} {suffix}"));
            }
        }

        if self.toggle.is_empty() {
            self.toggle = format!("{label} Scene");
        }
    }

    fn validate(&self, category: Category) -> Result<()> {
        if self.display_duration_seconds > MAX_ALERT_SECONDS {
            return Err(Error::config(format!(
                "{category} display duration must be within 0..={MAX_ALERT_SECONDS} seconds, got {}",
                self.display_duration_seconds
            )));
        }

        for role in category.required_slots() {
            if self.slots.name_for(*role).is_none() {
                return Err(Error::config(format!(
                    "{category} alert needs a text source for its {role}"
                )));
            }
        }

        if self.toggle.is_empty() {
            return Err(Error::config(format!("{category} alert needs a scene source")));
        }

        Ok(())
    }
}

/// Complete alert system configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Live Stream API URL including its key. Empty disables polling.
    pub source_credential_url: String,
    pub refresh_interval_seconds: u64,
    /// Discard events that were already pending when polling starts.
    pub skip_backlog: bool,
    /// Cap on pending alerts per category; `None` keeps queues unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pending_per_category: Option<usize>,
    pub follower: CategoryConfig,
    pub subscriber: CategoryConfig,
    pub rant: CategoryConfig,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            source_credential_url: String::new(),
            refresh_interval_seconds: DEFAULT_REFRESH_SECONDS,
            skip_backlog: true,
            max_pending_per_category: None,
            follower: CategoryConfig::defaults_for(Category::Follower),
            subscriber: CategoryConfig::defaults_for(Category::Subscriber),
            rant: CategoryConfig::defaults_for(Category::Rant),
        }
    }
}

impl AlertConfig {
    pub fn category(&self, category: Category) -> &CategoryConfig {
        match category {
            Category::Follower => &self.follower,
            Category::Subscriber => &self.subscriber,
            Category::Rant => &self.rant,
        }
    }

    pub fn category_mut(&mut self, category: Category) -> &mut CategoryConfig {
        match category {
            Category::Follower => &mut self.follower,
            Category::Subscriber => &mut self.subscriber,
            Category::Rant => &mut self.rant,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }

    /// Whether a source URL has been provided at all.
    pub fn polling_configured(&self) -> bool {
        !self.source_credential_url.trim().is_empty()
    }

    /// Replace empty slot and toggle names with their defaults.
    pub fn fill_defaults(&mut self) {
        for category in Category::ALL {
            self.category_mut(category).fill_defaults(category);
        }
    }

    /// Check every range and naming rule.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_REFRESH_SECONDS..=MAX_REFRESH_SECONDS).contains(&self.refresh_interval_seconds) {
            return Err(Error::config(format!(
                "refresh interval must be within {MIN_REFRESH_SECONDS}..={MAX_REFRESH_SECONDS} seconds, got {}",
                self.refresh_interval_seconds
            )));
        }

        if self.max_pending_per_category == Some(0) {
            return Err(Error::config("max pending alerts per category must be at least 1"));
        }

        if self.polling_configured() {
            let url = url::Url::parse(self.source_credential_url.trim())
                .map_err(|e| Error::config(format!("invalid API URL: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::config(format!(
                    "API URL must use http or https, got {}",
                    url.scheme()
                )));
            }
        }

        for category in Category::ALL {
            self.category(category).validate(category)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_are_valid() {
        let config = AlertConfig::default();
        config.validate().unwrap();
        assert!(!config.polling_configured());
        assert_eq!(config.refresh_interval(), Duration::from_secs(10));
        assert_eq!(config.follower.toggle, "Follower Scene");
        assert_eq!(config.subscriber.slots.name_for(SlotRole::Amount), Some("Subscriber Amount Dollars"));
        assert_eq!(config.rant.slots.name_for(SlotRole::Message), Some("Rant Message"));
        assert_eq!(config.follower.slots.name_for(SlotRole::Amount), None);
    }

    #[rstest]
    #[case(9, false)]
    #[case(10, true)]
    #[case(300, true)]
    #[case(301, false)]
    fn test_refresh_interval_range(#[case] seconds: u64, #[case] valid: bool) {
        let config = AlertConfig {
            refresh_interval_seconds: seconds,
            ..Default::default()
        };
        assert_eq!(config.validate().is_ok(), valid);
    }

    #[rstest]
    #[case(0, true)]
    #[case(6000, true)]
    #[case(6001, false)]
    fn test_display_duration_range(#[case] seconds: u64, #[case] valid: bool) {
        let mut config = AlertConfig::default();
        config.rant.display_duration_seconds = seconds;
        assert_eq!(config.validate().is_ok(), valid);
    }

    #[rstest]
    #[case("https://rumble.com/-livestream-api/get-data?key=abc", true)]
    #[case("not a url", false)]
    #[case("ftp://rumble.com/data", false)]
    fn test_url_validation(#[case] url: &str, #[case] valid: bool) {
        let config = AlertConfig {
            source_credential_url: url.to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate().is_ok(), valid);
    }

    #[test]
    fn test_missing_required_slot_is_invalid() {
        let mut config = AlertConfig::default();
        config.subscriber.slots.amount = None;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("subscriber alert needs a text source for its amount"));

        config.fill_defaults();
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_duration_uses_min_period() {
        let mut config = CategoryConfig::defaults_for(Category::Follower);
        config.display_duration_seconds = 0;
        assert_eq!(config.display_period(), MIN_TICK_PERIOD);
        config.display_duration_seconds = 5;
        assert_eq!(config.display_period(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AlertConfig = serde_json::from_str(
            r#"{"refresh_interval_seconds": 20, "rant": {"enabled": false}}"#,
        )
        .unwrap();
        assert_eq!(config.refresh_interval_seconds, 20);
        assert!(!config.rant.enabled);
        assert_eq!(config.rant.display_duration_seconds, 10);
        assert!(config.rant.toggle.is_empty());
        assert!(config.follower.enabled);
    }
}
