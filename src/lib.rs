//! Client core for an event, community, and people discovery app.
//!
//! The backend does the searching and matching; this crate narrows fetched
//! lists locally ([`filter`]), coalesces search-as-you-type into settled
//! remote requests ([`search`]), and wraps the HTTP surface ([`api`]).

pub mod api;
pub mod assistant;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod models;
pub mod paths;
pub mod preferences;
pub mod search;
pub mod time_label;

pub use api::ApiClient;
pub use assistant::{Assistant, AssistantTab};
pub use config::ClientConfig;
pub use error::{ApiError, TimeLabelError};
pub use filter::{distinct_interests, distinct_locations, filter_communities, filter_events};
pub use logging::init_logging;
pub use models::{
    ChatMessage, ChatReply, CommunityFilter, CommunityMatches, CommunityRecord, EventRecord,
    FilterSpec, MatchResult, UserRecord,
};
pub use preferences::{PreferenceStore, Theme};
pub use search::{
    CommunityMatcher, DebouncedSearch, EventInterestMatcher, MatchSource, SearchPhase,
    SearchSnapshot, UserMatcher,
};
pub use time_label::{parse_time_label, TimeBucket};
