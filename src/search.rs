//! Search-as-you-type against the remote matcher.
//!
//! A query is sent once it has held still for the quiet period. Each send is
//! tagged with a fresh token, and a response is applied only while its token
//! is still the latest one issued. Older responses are dropped without
//! touching visible state. In-flight requests are never aborted.
//!
//! All methods that schedule work must be called from inside a Tokio
//! runtime.

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::models::{CommunityRecord, EventRecord, MatchResult, UserRecord};

/// Remote lookup driven by a settled query.
pub trait MatchSource: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    /// Shown when the backend fails without a detail message.
    const FAILURE_MESSAGE: &'static str;

    fn fetch(
        &self,
        query: String,
    ) -> impl Future<Output = Result<MatchResult<Self::Item>, ApiError>> + Send;
}

pub struct CommunityMatcher {
    client: ApiClient,
}

impl CommunityMatcher {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl MatchSource for CommunityMatcher {
    type Item = CommunityRecord;
    const FAILURE_MESSAGE: &'static str = "An error occurred while searching for communities.";

    fn fetch(
        &self,
        query: String,
    ) -> impl Future<Output = Result<MatchResult<CommunityRecord>, ApiError>> + Send {
        async move { self.client.match_communities(&query).await }
    }
}

/// Matches people by a comma-separated interest list. When the typed list
/// has no usable entries the profile's own interests are sent instead.
pub struct UserMatcher {
    client: ApiClient,
    profile_interests: Vec<String>,
}

impl UserMatcher {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            profile_interests: Vec::new(),
        }
    }

    pub fn with_profile_interests(mut self, interests: Vec<String>) -> Self {
        self.profile_interests = interests;
        self
    }
}

impl MatchSource for UserMatcher {
    type Item = UserRecord;
    const FAILURE_MESSAGE: &'static str = "An error occurred while searching for users.";

    fn fetch(
        &self,
        query: String,
    ) -> impl Future<Output = Result<MatchResult<UserRecord>, ApiError>> + Send {
        async move {
            let mut shaped = interest_query(&query);
            if shaped.is_empty() {
                shaped = interest_query(&self.profile_interests.join(","));
            }
            if shaped.is_empty() {
                return Ok(MatchResult::empty());
            }
            self.client.match_users(&shaped).await
        }
    }
}

/// Suggests events for an interest query through the assistant endpoint.
pub struct EventInterestMatcher {
    client: ApiClient,
}

impl EventInterestMatcher {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

impl MatchSource for EventInterestMatcher {
    type Item = EventRecord;
    const FAILURE_MESSAGE: &'static str = "Failed to fetch suggested events";

    fn fetch(
        &self,
        query: String,
    ) -> impl Future<Output = Result<MatchResult<EventRecord>, ApiError>> + Send {
        async move { self.client.chat_query(&query).await.map(MatchResult::from) }
    }
}

/// Trims each comma-separated entry and drops the empty ones.
pub fn interest_query(raw: &str) -> String {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    /// Quiet-period timer armed.
    Pending,
    /// Latest request sent, no response yet.
    InFlight,
    Applied,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchSnapshot<T> {
    pub query: String,
    pub phase: SearchPhase,
    pub response: Option<String>,
    pub results: Vec<T>,
    pub error: Option<String>,
    pub latest_token: u64,
}

impl<T> Default for SearchSnapshot<T> {
    fn default() -> Self {
        Self {
            query: String::new(),
            phase: SearchPhase::Idle,
            response: None,
            results: Vec::new(),
            error: None,
            latest_token: 0,
        }
    }
}

impl<T> SearchSnapshot<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, SearchPhase::Pending | SearchPhase::InFlight)
    }

    fn clear_display(&mut self) {
        self.response = None;
        self.results.clear();
        self.error = None;
    }
}

struct Shared<S: MatchSource> {
    source: S,
    quiet: Duration,
    state: watch::Sender<SearchSnapshot<S::Item>>,
}

pub struct DebouncedSearch<S: MatchSource> {
    shared: Arc<Shared<S>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<S: MatchSource> DebouncedSearch<S> {
    pub fn new(source: S, quiet: Duration) -> Self {
        let (state, _) = watch::channel(SearchSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                source,
                quiet,
                state,
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn from_config(source: S, config: &ClientConfig) -> Self {
        Self::new(source, config.debounce)
    }

    pub fn snapshot(&self) -> SearchSnapshot<S::Item> {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot<S::Item>> {
        self.shared.state.subscribe()
    }

    /// Records a keystroke. Restarts the quiet-period timer, or clears the
    /// session without any request when the text is blank.
    pub fn set_query(&self, text: impl Into<String>) {
        let text = text.into();
        self.cancel_timer();

        if text.trim().is_empty() {
            self.shared.state.send_modify(|s| {
                s.query = text;
                // Outstanding responses must not repopulate the cleared view.
                s.latest_token += 1;
                s.phase = SearchPhase::Idle;
                s.clear_display();
            });
            debug!("blank query, match results cleared");
            return;
        }

        self.shared.state.send_modify(|s| {
            s.query = text.clone();
            s.phase = SearchPhase::Pending;
        });

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            sleep(shared.quiet).await;
            Shared::dispatch(&shared, text);
        });
        *self.timer.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Sends the pending query now instead of waiting out the timer.
    pub fn flush(&self) {
        let armed = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = armed else {
            return;
        };
        handle.abort();

        let pending = {
            let state = self.shared.state.borrow();
            (state.phase == SearchPhase::Pending).then(|| state.query.clone())
        };
        if let Some(query) = pending {
            Shared::dispatch(&self.shared, query);
        }
    }

    fn cancel_timer(&self) {
        if let Some(handle) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

impl<S: MatchSource> Drop for DebouncedSearch<S> {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

impl<S: MatchSource> Shared<S> {
    fn dispatch(shared: &Arc<Self>, query: String) {
        let mut issued = None;
        shared.state.send_if_modified(|s| {
            // A newer keystroke owns the session now.
            if s.query != query {
                return false;
            }
            s.latest_token += 1;
            s.phase = SearchPhase::InFlight;
            issued = Some(s.latest_token);
            true
        });
        let Some(token) = issued else {
            return;
        };

        let trimmed = query.trim().to_string();
        debug!(token, query = %trimmed, "sending match request");
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            let outcome = shared.source.fetch(trimmed).await;
            shared.apply(token, outcome);
        });
    }

    fn apply(&self, token: u64, outcome: Result<MatchResult<S::Item>, ApiError>) {
        self.state.send_if_modified(|s| {
            if token != s.latest_token {
                debug!(token, latest = s.latest_token, "discarding stale match response");
                return false;
            }
            let settling = s.phase == SearchPhase::InFlight;
            match outcome {
                Ok(result) => {
                    s.response = Some(result.response);
                    s.results = result.items;
                    s.error = None;
                    if settling {
                        s.phase = SearchPhase::Applied;
                    }
                }
                Err(err) => {
                    warn!(token, error = %err, "match request failed");
                    s.clear_display();
                    s.error = Some(err.user_message(S::FAILURE_MESSAGE));
                    if settling {
                        s.phase = SearchPhase::Error;
                    }
                }
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::oneshot;
    use tokio::time::Instant;

    type Reply = Result<MatchResult<String>, ApiError>;

    /// Answers immediately and records when each query arrived.
    struct Recording {
        started: Instant,
        calls: Arc<Mutex<Vec<(String, Duration)>>>,
    }

    impl MatchSource for Recording {
        type Item = String;
        const FAILURE_MESSAGE: &'static str = "lookup failed";

        fn fetch(&self, query: String) -> impl Future<Output = Reply> + Send {
            self.calls
                .lock()
                .unwrap()
                .push((query.clone(), self.started.elapsed()));
            async move {
                Ok(MatchResult {
                    response: format!("matches for {query}"),
                    items: vec![query],
                })
            }
        }
    }

    fn recording() -> (Recording, Arc<Mutex<Vec<(String, Duration)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let source = Recording {
            started: Instant::now(),
            calls: Arc::clone(&calls),
        };
        (source, calls)
    }

    /// Holds each query's response until the test releases it.
    struct Gated {
        gates: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
    }

    impl Gated {
        fn new(queries: &[&str]) -> (Self, HashMap<String, oneshot::Sender<Reply>>) {
            let mut gates = HashMap::new();
            let mut senders = HashMap::new();
            for query in queries {
                let (tx, rx) = oneshot::channel();
                gates.insert(query.to_string(), rx);
                senders.insert(query.to_string(), tx);
            }
            (
                Self {
                    gates: Mutex::new(gates),
                },
                senders,
            )
        }
    }

    impl MatchSource for Gated {
        type Item = String;
        const FAILURE_MESSAGE: &'static str = "lookup failed";

        fn fetch(&self, query: String) -> impl Future<Output = Reply> + Send {
            let gate = self.gates.lock().unwrap().remove(&query);
            async move {
                match gate {
                    Some(rx) => rx
                        .await
                        .unwrap_or_else(|_| Err(ApiError::Transport("gate dropped".into()))),
                    None => Ok(MatchResult::empty()),
                }
            }
        }
    }

    fn hits(query: &str) -> Reply {
        Ok(MatchResult {
            response: format!("matches for {query}"),
            items: vec![query.to_string()],
        })
    }

    async fn advance(ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }

    const QUIET: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn rapid_keystrokes_coalesce_into_one_request() {
        let (source, calls) = recording();
        let search = DebouncedSearch::new(source, QUIET);

        search.set_query("a");
        advance(100).await;
        search.set_query("ab");
        advance(300).await;
        search.set_query("abc");
        assert_eq!(search.snapshot().phase, SearchPhase::Pending);
        advance(2_000).await;

        let calls = calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "abc");
        assert!(calls[0].1 >= Duration::from_millis(900));
        assert!(calls[0].1 < Duration::from_millis(910));

        let snapshot = search.snapshot();
        assert_eq!(snapshot.phase, SearchPhase::Applied);
        assert_eq!(snapshot.results, vec!["abc".to_string()]);
        assert_eq!(snapshot.response.as_deref(), Some("matches for abc"));
        assert_eq!(snapshot.latest_token, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_longer_than_quiet_period_sends_intermediate_query() {
        let (source, calls) = recording();
        let search = DebouncedSearch::new(source, QUIET);

        search.set_query("a");
        advance(100).await;
        search.set_query("ab");
        advance(600).await;
        search.set_query("abc");
        advance(2_000).await;

        let calls = calls.lock().unwrap().clone();
        let queries: Vec<&str> = calls.iter().map(|(q, _)| q.as_str()).collect();
        assert_eq!(queries, vec!["ab", "abc"]);
        assert!(calls[0].1 >= Duration::from_millis(600) && calls[0].1 < Duration::from_millis(610));
        assert!(calls[1].1 >= Duration::from_millis(1_200) && calls[1].1 < Duration::from_millis(1_210));
        assert_eq!(search.snapshot().results, vec!["abc".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_response_never_overwrites_newer_results() {
        let (source, mut gates) = Gated::new(&["ab", "abc"]);
        let search = DebouncedSearch::new(source, QUIET);

        search.set_query("ab");
        advance(600).await;
        assert_eq!(search.snapshot().phase, SearchPhase::InFlight);
        assert_eq!(search.snapshot().latest_token, 1);

        search.set_query("abc");
        advance(600).await;
        assert_eq!(search.snapshot().latest_token, 2);

        gates.remove("abc").unwrap().send(hits("abc")).unwrap();
        advance(10).await;
        assert_eq!(search.snapshot().results, vec!["abc".to_string()]);

        gates.remove("ab").unwrap().send(hits("ab")).unwrap();
        advance(10).await;
        let snapshot = search.snapshot();
        assert_eq!(snapshot.results, vec!["abc".to_string()]);
        assert_eq!(snapshot.response.as_deref(), Some("matches for abc"));
        assert_eq!(snapshot.phase, SearchPhase::Applied);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_failure_is_discarded_silently() {
        let (source, mut gates) = Gated::new(&["ab", "abc"]);
        let search = DebouncedSearch::new(source, QUIET);

        search.set_query("ab");
        advance(600).await;
        search.set_query("abc");
        advance(600).await;

        gates.remove("abc").unwrap().send(hits("abc")).unwrap();
        gates
            .remove("ab")
            .unwrap()
            .send(Err(ApiError::Transport("reset".into())))
            .unwrap();
        advance(10).await;

        let snapshot = search.snapshot();
        assert_eq!(snapshot.error, None);
        assert_eq!(snapshot.results, vec!["abc".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_query_never_calls_and_clears_results() {
        let (source, calls) = recording();
        let search = DebouncedSearch::new(source, QUIET);

        search.set_query("chess");
        advance(1_000).await;
        assert_eq!(search.snapshot().results.len(), 1);

        search.set_query("   ");
        let snapshot = search.snapshot();
        assert_eq!(snapshot.phase, SearchPhase::Idle);
        assert!(snapshot.results.is_empty());
        assert_eq!(snapshot.response, None);

        search.set_query("");
        advance(2_000).await;
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(search.snapshot().results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn blank_query_discards_in_flight_response() {
        let (source, mut gates) = Gated::new(&["chess"]);
        let search = DebouncedSearch::new(source, QUIET);

        search.set_query("chess");
        advance(600).await;
        search.set_query("");
        gates.remove("chess").unwrap().send(hits("chess")).unwrap();
        advance(10).await;

        let snapshot = search.snapshot();
        assert_eq!(snapshot.phase, SearchPhase::Idle);
        assert!(snapshot.results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn latest_failure_surfaces_message_and_clears_results() {
        let (source, mut gates) = Gated::new(&["ab", "abc", "abcd"]);
        let search = DebouncedSearch::new(source, QUIET);

        search.set_query("ab");
        advance(600).await;
        gates.remove("ab").unwrap().send(hits("ab")).unwrap();
        advance(10).await;
        assert_eq!(search.snapshot().results, vec!["ab".to_string()]);

        search.set_query("abc");
        advance(600).await;
        gates
            .remove("abc")
            .unwrap()
            .send(Err(ApiError::Remote {
                status: 400,
                detail: Some("Query cannot be empty".into()),
            }))
            .unwrap();
        advance(10).await;

        let snapshot = search.snapshot();
        assert_eq!(snapshot.phase, SearchPhase::Error);
        assert_eq!(snapshot.error.as_deref(), Some("Query cannot be empty"));
        assert!(snapshot.results.is_empty());

        search.set_query("abcd");
        advance(600).await;
        gates
            .remove("abcd")
            .unwrap()
            .send(Err(ApiError::Remote {
                status: 500,
                detail: None,
            }))
            .unwrap();
        advance(10).await;
        assert_eq!(search.snapshot().error.as_deref(), Some("lookup failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn flush_sends_without_waiting() {
        let (source, calls) = recording();
        let search = DebouncedSearch::new(source, QUIET);

        search.set_query("  jazz ");
        advance(50).await;
        search.flush();
        advance(1).await;

        let calls = calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "jazz");
        assert!(calls[0].1 < Duration::from_millis(100));

        advance(1_000).await;
        assert_eq!(search.snapshot().latest_token, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_observe_applied_results() {
        let (source, _calls) = recording();
        let search = DebouncedSearch::new(source, QUIET);
        let mut rx = search.subscribe();

        search.set_query("hiking");
        loop {
            rx.changed().await.expect("sender alive");
            if rx.borrow().phase == SearchPhase::Applied {
                break;
            }
        }
        assert_eq!(rx.borrow().results, vec!["hiking".to_string()]);
    }

    #[test]
    fn interest_query_normalizes_entries() {
        assert_eq!(interest_query(" hiking, ,chess,  "), "hiking, chess");
        assert_eq!(interest_query(" , "), "");
        assert_eq!(interest_query("abc"), "abc");
    }

    mod remote {
        use super::*;
        use pretty_assertions::assert_eq;
        use serde_json::json;
        use wiremock::{
            matchers::{body_json, method, path},
            Mock, MockServer, ResponseTemplate,
        };

        fn config_for(server: &MockServer) -> ClientConfig {
            ClientConfig {
                debounce: Duration::from_millis(10),
                ..ClientConfig::default().with_base_url(server.uri())
            }
        }

        fn client_for(server: &MockServer) -> ApiClient {
            ApiClient::new(&config_for(server)).expect("client")
        }

        async fn settled<T: Clone>(
            rx: &mut watch::Receiver<SearchSnapshot<T>>,
        ) -> SearchSnapshot<T> {
            tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| !s.is_loading()))
                .await
                .expect("search settles")
                .expect("controller alive")
                .clone()
        }

        #[tokio::test]
        async fn user_matcher_falls_back_to_profile_interests() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/match/users"))
                .and(body_json(json!({ "query": "chess, hiking" })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "response": "Found 1 user",
                    "users": [{ "id": 9, "username": "rook", "interests": ["chess"] }]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let matcher = UserMatcher::new(client_for(&server))
                .with_profile_interests(vec!["chess".into(), " hiking ".into()]);
            let result = matcher.fetch(" , ".into()).await.expect("matches");
            assert_eq!(result.response, "Found 1 user");
            assert_eq!(result.items.len(), 1);
            assert_eq!(result.items[0].username, "rook");
        }

        #[tokio::test]
        async fn user_matcher_without_interests_skips_the_request() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/match/users"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "users": [] })))
                .expect(0)
                .mount(&server)
                .await;

            let matcher = UserMatcher::new(client_for(&server))
                .with_profile_interests(vec!["  ".into()]);
            let result = matcher.fetch(",,".into()).await.expect("no request");
            assert_eq!(result, MatchResult::empty());
        }

        #[tokio::test]
        async fn community_search_surfaces_fallback_message() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/match/communities"))
                .and(body_json(json!({ "query": "board games" })))
                .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
                .expect(1)
                .mount(&server)
                .await;

            let config = config_for(&server);
            let client = ApiClient::new(&config).expect("client");
            let search = DebouncedSearch::from_config(CommunityMatcher::new(client), &config);
            let mut rx = search.subscribe();

            search.set_query("  board games ");
            assert!(search.snapshot().is_loading());

            let snapshot = settled(&mut rx).await;
            assert_eq!(snapshot.phase, SearchPhase::Error);
            assert_eq!(
                snapshot.error.as_deref(),
                Some("An error occurred while searching for communities.")
            );
            assert!(snapshot.results.is_empty());
            assert_eq!(snapshot.latest_token, 1);
        }

        #[tokio::test]
        async fn event_suggestions_come_from_chat_reply() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/chatbot"))
                .and(body_json(json!({ "query": "jazz" })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "response": "Here is some jazz",
                    "events": [{
                        "id": 3,
                        "name": "Late Set",
                        "location": "Downtown",
                        "type": "Music",
                        "date": "Friday",
                        "time": "9 PM"
                    }]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let config = config_for(&server);
            let client = ApiClient::new(&config).expect("client");
            let search = DebouncedSearch::from_config(EventInterestMatcher::new(client), &config);
            let mut rx = search.subscribe();

            search.set_query("jazz");
            let snapshot = settled(&mut rx).await;
            assert_eq!(snapshot.phase, SearchPhase::Applied);
            assert!(!snapshot.is_loading());
            assert_eq!(snapshot.response.as_deref(), Some("Here is some jazz"));
            assert_eq!(snapshot.results.len(), 1);
            assert_eq!(snapshot.results[0].name, "Late Set");
        }
    }
}
