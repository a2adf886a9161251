use std::fmt;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::models::{
    ChatReply, CommunityMatches, CommunityRecord, EventRecord, FilterSpec, HealthStatus,
    MatchResult, UserRecord,
};

const BARE_COMMUNITY_MATCH_RESPONSE: &str =
    "Here are some communities that match your interests:";
const WRAPPED_COMMUNITY_MATCH_RESPONSE: &str = "Found matching communities";
const NO_COMMUNITY_MATCH_RESPONSE: &str = "No matching communities found";

/// Stateless JSON client for the discovery backend. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListPayload<T> {
    Bare(Vec<T>),
    Wrapped { items: Vec<T> },
}

impl<T> ListPayload<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListPayload::Bare(items) | ListPayload::Wrapped { items } => items,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommunityMatchPayload {
    Bare(Vec<CommunityRecord>),
    Wrapped {
        #[serde(default)]
        response: Option<String>,
        #[serde(default)]
        communities: Option<Vec<CommunityRecord>>,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UserMatchPayload {
    response: String,
    users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedPayload {
    Mixed(Vec<Value>),
    Split {
        #[serde(default)]
        related_users: Vec<UserRecord>,
        #[serde(default)]
        related_communities: Vec<CommunityRecord>,
    },
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| ApiError::Transport(format!("failed to build http client: {err}")))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch_events(&self, spec: &FilterSpec) -> Result<Vec<EventRecord>, ApiError> {
        let request = self.client.get(self.url("/events")).query(&spec.query_pairs());
        let payload: ListPayload<EventRecord> = self.send(request).await?;
        Ok(payload.into_vec())
    }

    pub async fn event(&self, id: u64) -> Result<EventRecord, ApiError> {
        self.send(self.client.get(self.url(&format!("/events/{id}"))))
            .await
    }

    pub async fn chat_query(&self, query: &str) -> Result<ChatReply, ApiError> {
        self.send(self.post("/chatbot", &QueryBody { query })).await
    }

    pub async fn match_communities(
        &self,
        query: &str,
    ) -> Result<MatchResult<CommunityRecord>, ApiError> {
        let payload: CommunityMatchPayload = self
            .send(self.post("/match/communities", &QueryBody { query }))
            .await?;
        Ok(normalize_community_matches(payload))
    }

    pub async fn match_users(&self, query: &str) -> Result<MatchResult<UserRecord>, ApiError> {
        let payload: UserMatchPayload = self
            .send(self.post("/match/users", &QueryBody { query }))
            .await?;
        Ok(MatchResult {
            response: payload.response,
            items: payload.users,
        })
    }

    pub async fn communities(&self) -> Result<Vec<CommunityRecord>, ApiError> {
        let payload: ListPayload<CommunityRecord> =
            self.send(self.client.get(self.url("/communities"))).await?;
        Ok(payload.into_vec())
    }

    pub async fn community(&self, id: u64) -> Result<CommunityRecord, ApiError> {
        self.send(self.client.get(self.url(&format!("/communities/{id}"))))
            .await
    }

    /// Users and communities related to a community's interests. An empty
    /// interest list short-circuits to no matches.
    pub async fn community_matches(
        &self,
        id: u64,
        interests: &[String],
    ) -> Result<CommunityMatches, ApiError> {
        if interests.is_empty() {
            return Ok(CommunityMatches::default());
        }
        let payload: RelatedPayload = self
            .send(self.post(
                &format!("/communities/{id}/match"),
                &json!({ "interests": interests }),
            ))
            .await?;
        normalize_related(payload)
    }

    pub async fn user(&self, id: u64) -> Result<UserRecord, ApiError> {
        self.send(self.client.get(self.url(&format!("/users/{id}"))))
            .await
    }

    pub async fn add_interest(&self, user_id: u64, interest: &str) -> Result<(), ApiError> {
        let interest = interest.trim();
        if interest.is_empty() {
            return Err(ApiError::InvalidInput("Interest cannot be empty.".into()));
        }
        let _: Value = self
            .send(self.post(
                &format!("/users/{user_id}/interests"),
                &json!({ "user_id": user_id, "new_interest": interest }),
            ))
            .await?;
        Ok(())
    }

    pub async fn add_friend(&self, user_id: u64, friend_id: u64) -> Result<(), ApiError> {
        let _: Value = self
            .send(self.post(
                "/add-friend",
                &json!({ "user_id": user_id, "friend_id": friend_id }),
            ))
            .await?;
        Ok(())
    }

    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.send(self.client.get(self.url("/health"))).await
    }
}

impl ApiClient {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> RequestBuilder {
        self.client.post(self.url(path)).json(body)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response
            .text()
            .await
            .map_err(|err| body_read_error(status, &url, err))?;

        if !status.is_success() {
            let detail = extract_detail(&body);
            warn!(status = status.as_u16(), path = %url, ?detail, "backend request failed");
            return Err(ApiError::Remote {
                status: status.as_u16(),
                detail,
            });
        }

        debug!(status = status.as_u16(), path = %url, bytes = body.len(), "backend response");
        serde_json::from_str(&body).map_err(|err| ApiError::Decode(format!("{url}: {err}")))
    }
}

/// A body that breaks off after the status line arrived is the server's
/// failure, not an unreachable host.
fn body_read_error(status: StatusCode, path: &str, err: impl fmt::Display) -> ApiError {
    if status.is_success() {
        return ApiError::Decode(format!("{path}: {err}"));
    }
    warn!(status = status.as_u16(), path, error = %err, "unreadable error body");
    ApiError::Remote {
        status: status.as_u16(),
        detail: None,
    }
}

fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn normalize_community_matches(payload: CommunityMatchPayload) -> MatchResult<CommunityRecord> {
    match payload {
        CommunityMatchPayload::Bare(items) => MatchResult {
            response: BARE_COMMUNITY_MATCH_RESPONSE.to_string(),
            items,
        },
        CommunityMatchPayload::Wrapped {
            response,
            communities: Some(items),
        } => MatchResult {
            response: response
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| WRAPPED_COMMUNITY_MATCH_RESPONSE.to_string()),
            items,
        },
        CommunityMatchPayload::Wrapped {
            communities: None, ..
        } => MatchResult {
            response: NO_COMMUNITY_MATCH_RESPONSE.to_string(),
            items: Vec::new(),
        },
    }
}

fn normalize_related(payload: RelatedPayload) -> Result<CommunityMatches, ApiError> {
    match payload {
        RelatedPayload::Split {
            related_users,
            related_communities,
        } => Ok(CommunityMatches {
            related_users,
            related_communities,
        }),
        RelatedPayload::Mixed(items) => {
            let mut matches = CommunityMatches::default();
            for item in items {
                if item.get("username").is_some() {
                    matches.related_users.push(decode_item(item)?);
                } else if item.get("name").is_some() {
                    matches.related_communities.push(decode_item(item)?);
                }
            }
            Ok(matches)
        }
    }
}

fn decode_item<T: DeserializeOwned>(item: Value) -> Result<T, ApiError> {
    serde_json::from_value(item).map_err(|err| ApiError::Decode(err.to_string()))
}
