use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time_label::TimeBucket;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventRecord {
    pub id: u64,
    pub name: String,
    pub location: String,
    #[serde(rename = "type", default)]
    pub category: String,
    /// Day label as served by the backend, compared verbatim.
    pub date: String,
    /// 12-hour label such as `"7 PM"`.
    pub time: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub organizer: Option<String>,
}

impl EventRecord {
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CommunityRecord {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub member_count: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserRecord {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub community_ids: Vec<u64>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
}

/// Optional criteria narrowing an event list. Empty strings count as unset.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSpec {
    pub search: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
    pub time_of_day: Option<TimeBucket>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        set(&self.search).is_none()
            && set(&self.location).is_none()
            && set(&self.date).is_none()
            && self.time_of_day.is_none()
            && set(&self.event_type).is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
    }

    /// Query pairs for `GET /events`, skipping unset fields.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = set(&self.search) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(location) = set(&self.location) {
            pairs.push(("location", location.to_string()));
        }
        if let Some(date) = set(&self.date) {
            pairs.push(("date", date.to_string()));
        }
        if let Some(bucket) = self.time_of_day {
            pairs.push(("timeOfDay", bucket.label().to_string()));
        }
        if let Some(kind) = set(&self.event_type) {
            pairs.push(("type", kind.to_string()));
        }
        if let Some(min) = self.min_price {
            pairs.push(("minPrice", min.to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("maxPrice", max.to_string()));
        }
        pairs
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct CommunityFilter {
    pub search: Option<String>,
    pub interests: Vec<String>,
}

/// Items returned by the remote matcher plus its advisory text.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MatchResult<T> {
    pub response: String,
    pub items: Vec<T>,
}

impl<T> MatchResult<T> {
    pub fn empty() -> Self {
        Self {
            response: String::new(),
            items: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CommunityMatches {
    pub related_users: Vec<UserRecord>,
    pub related_communities: Vec<CommunityRecord>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ChatReply {
    pub response: String,
    pub events: Vec<EventRecord>,
}

impl From<ChatReply> for MatchResult<EventRecord> {
    fn from(reply: ChatReply) -> Self {
        Self {
            response: reply.response,
            items: reply.events,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub id: u64,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

pub(crate) fn set(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.is_empty())
}
