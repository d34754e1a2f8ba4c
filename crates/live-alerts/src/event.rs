//! Audience events and alert categories.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Alert category. Each category has its own queue, timer and bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Follower,
    Subscriber,
    Rant,
}

impl Category {
    /// All categories, in display-configuration order.
    pub const ALL: [Category; 3] = [Category::Follower, Category::Subscriber, Category::Rant];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Follower => "follower",
            Category::Subscriber => "subscriber",
            Category::Rant => "rant",
        }
    }

    /// Text slots an alert of this category writes to.
    pub fn required_slots(&self) -> &'static [SlotRole] {
        match self {
            Category::Follower => &[SlotRole::Username],
            Category::Subscriber => &[SlotRole::Username, SlotRole::Amount],
            Category::Rant => &[SlotRole::Username, SlotRole::Message, SlotRole::Amount],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical text field of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotRole {
    Username,
    Amount,
    Message,
}

impl SlotRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotRole::Username => "username",
            SlotRole::Amount => "amount",
            SlotRole::Message => "message",
        }
    }
}

impl fmt::Display for SlotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audience event.
///
/// Events are immutable once produced by a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Event {
    /// Someone followed the channel.
    Follower { username: String },
    /// Someone bought a paid subscription.
    Subscriber { username: String, amount_cents: u64 },
    /// Someone sent a paid chat message.
    Rant {
        username: String,
        message_text: String,
        amount_cents: u64,
    },
}

impl Event {
    pub fn follower(username: impl Into<String>) -> Self {
        Self::Follower {
            username: username.into(),
        }
    }

    pub fn subscriber(username: impl Into<String>, amount_cents: u64) -> Self {
        Self::Subscriber {
            username: username.into(),
            amount_cents,
        }
    }

    pub fn rant(username: impl Into<String>, message_text: impl Into<String>, amount_cents: u64) -> Self {
        Self::Rant {
            username: username.into(),
            message_text: message_text.into(),
            amount_cents,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Event::Follower { .. } => Category::Follower,
            Event::Subscriber { .. } => Category::Subscriber,
            Event::Rant { .. } => Category::Rant,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Event::Follower { username }
            | Event::Subscriber { username, .. }
            | Event::Rant { username, .. } => username,
        }
    }

    /// Text for each slot of this event's category, in
    /// [`Category::required_slots`] order.
    pub fn render(&self) -> Vec<(SlotRole, String)> {
        match self {
            Event::Follower { username } => vec![(SlotRole::Username, username.clone())],
            Event::Subscriber {
                username,
                amount_cents,
            } => vec![
                (SlotRole::Username, username.clone()),
                (SlotRole::Amount, format_cents(*amount_cents)),
            ],
            Event::Rant {
                username,
                message_text,
                amount_cents,
            } => vec![
                (SlotRole::Username, username.clone()),
                (SlotRole::Message, message_text.clone()),
                (SlotRole::Amount, format_cents(*amount_cents)),
            ],
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Follower { username } => write!(f, "follower {username}"),
            Event::Subscriber {
                username,
                amount_cents,
            } => write!(f, "subscriber {username} ({})", format_cents(*amount_cents)),
            Event::Rant {
                username,
                amount_cents,
                ..
            } => write!(f, "rant from {username} ({})", format_cents(*amount_cents)),
        }
    }
}

/// Format an amount in cents as a dollar string, e.g. `550` → `"$5.50"`.
pub fn format_cents(amount_cents: u64) -> String {
    format!("${}.{:02}", amount_cents / 100, amount_cents % 100)
}

/// One value per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMap<T> {
    pub follower: T,
    pub subscriber: T,
    pub rant: T,
}

impl<T> CategoryMap<T> {
    /// Build a map by evaluating `f` for every category.
    pub fn from_fn(mut f: impl FnMut(Category) -> T) -> Self {
        Self {
            follower: f(Category::Follower),
            subscriber: f(Category::Subscriber),
            rant: f(Category::Rant),
        }
    }

    pub fn get(&self, category: Category) -> &T {
        match category {
            Category::Follower => &self.follower,
            Category::Subscriber => &self.subscriber,
            Category::Rant => &self.rant,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut T {
        match category {
            Category::Follower => &mut self.follower,
            Category::Subscriber => &mut self.subscriber,
            Category::Rant => &mut self.rant,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &T)> {
        Category::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "$0.00")]
    #[case(5, "$0.05")]
    #[case(100, "$1.00")]
    #[case(550, "$5.50")]
    #[case(123_456, "$1234.56")]
    fn test_format_cents(#[case] cents: u64, #[case] expected: &str) {
        assert_eq!(format_cents(cents), expected);
    }

    #[test]
    fn test_subscriber_render() {
        let event = Event::subscriber("ann", 550);
        assert_eq!(
            event.render(),
            vec![
                (SlotRole::Username, "ann".to_string()),
                (SlotRole::Amount, "$5.50".to_string()),
            ]
        );
    }

    #[test]
    fn test_rant_render() {
        let event = Event::rant("bo", "hi", 100);
        let rendered = event.render();
        assert_eq!(rendered.len(), 3);
        assert_eq!(rendered[1], (SlotRole::Message, "hi".to_string()));
        assert_eq!(rendered[2], (SlotRole::Amount, "$1.00".to_string()));
    }

    #[test]
    fn test_render_matches_required_slots() {
        let events = [
            Event::follower("a"),
            Event::subscriber("b", 1),
            Event::rant("c", "m", 2),
        ];
        for event in events {
            let roles: Vec<SlotRole> = event.render().into_iter().map(|(r, _)| r).collect();
            assert_eq!(roles, event.category().required_slots());
        }
    }

    #[test]
    fn test_event_serde_tagged() {
        let json = serde_json::to_value(Event::follower("ann")).unwrap();
        assert_eq!(json["kind"], "follower");
        assert_eq!(json["username"], "ann");
    }
}
