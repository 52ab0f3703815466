//! Connector client: POST activities, create conversations, and list team channels via the v3 API.

use crate::auth::{AuthError, TokenProvider};
use crate::channels::traits::{ActivitySender, TeamsDirectory};
use crate::schema::{
    Activity, ActivityType, ChannelInfo, ConversationList, ConversationParameters,
    ConversationResourceResponse, ResourceResponse, EMULATOR_CHANNEL,
};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("connector request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("connector api error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("connector auth failed: {0}")]
    Auth(#[from] AuthError),
    #[error("invalid service url: {0}")]
    InvalidServiceUrl(String),
    #[error("activity has no {0}")]
    MissingAddress(&'static str),
    #[error("invalid connector response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Client for the Bot Framework connector REST API. Service URL is per call (it comes from the
/// inbound activity or from configuration).
#[derive(Clone)]
pub struct ConnectorClient {
    tokens: TokenProvider,
    client: reqwest::Client,
}

/// Join path segments onto a service URL, percent-encoding each segment.
fn endpoint(service_url: &str, segments: &[&str]) -> Result<Url, ConnectorError> {
    let mut url = Url::parse(service_url)
        .map_err(|e| ConnectorError::InvalidServiceUrl(format!("{}: {}", service_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| ConnectorError::InvalidServiceUrl(service_url.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

impl ConnectorClient {
    pub fn new(tokens: TokenProvider) -> Self {
        Self {
            tokens,
            client: reqwest::Client::new(),
        }
    }

    /// POST /v3/conversations/{conversationId}/activities
    pub async fn send_to_conversation(
        &self,
        service_url: &str,
        conversation_id: &str,
        activity: &Activity,
    ) -> Result<ResourceResponse, ConnectorError> {
        let url = endpoint(
            service_url,
            &["v3", "conversations", conversation_id, "activities"],
        )?;
        self.post_json(url, activity).await
    }

    /// POST /v3/conversations/{conversationId}/activities/{activityId}
    pub async fn reply_to_activity(
        &self,
        service_url: &str,
        conversation_id: &str,
        activity_id: &str,
        activity: &Activity,
    ) -> Result<ResourceResponse, ConnectorError> {
        let url = endpoint(
            service_url,
            &["v3", "conversations", conversation_id, "activities", activity_id],
        )?;
        self.post_json(url, activity).await
    }

    /// POST /v3/conversations
    pub async fn create_conversation(
        &self,
        service_url: &str,
        params: &ConversationParameters,
    ) -> Result<ConversationResourceResponse, ConnectorError> {
        let url = endpoint(service_url, &["v3", "conversations"])?;
        self.post_json(url, params).await
    }

    /// GET /v3/teams/{teamId}/conversations
    pub async fn get_team_channels(
        &self,
        service_url: &str,
        team_id: &str,
    ) -> Result<Vec<ChannelInfo>, ConnectorError> {
        let url = endpoint(service_url, &["v3", "teams", team_id, "conversations"])?;
        let mut req = self.client.get(url);
        if let Some(token) = self.tokens.access_token().await? {
            req = req.bearer_auth(token);
        }
        let list: ConversationList = read_body(req.send().await?).await?;
        Ok(list.conversations)
    }

    async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T, ConnectorError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        log::debug!("connector POST {}", url);
        let mut req = self.client.post(url).json(body);
        if let Some(token) = self.tokens.access_token().await? {
            req = req.bearer_auth(token);
        }
        read_body(req.send().await?).await
    }
}

/// Map non-2xx to `Api`; an empty 2xx body decodes as `T::default()`.
async fn read_body<T: DeserializeOwned + Default>(res: reqwest::Response) -> Result<T, ConnectorError> {
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        return Err(ConnectorError::Api {
            status: status.as_u16(),
            body,
        });
    }
    if body.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl ActivitySender for ConnectorClient {
    /// Replies when `replyToId` is set, otherwise posts to the conversation. Trace activities only
    /// reach the emulator; other channels drop them here.
    async fn send_activity(&self, activity: &Activity) -> Result<ResourceResponse, ConnectorError> {
        if activity.is_type(&ActivityType::Trace) && activity.channel() != EMULATOR_CHANNEL {
            log::debug!("dropping trace activity for channel {}", activity.channel());
            return Ok(ResourceResponse::default());
        }
        let service_url = activity
            .service_url
            .as_deref()
            .ok_or(ConnectorError::MissingAddress("service url"))?;
        let conversation_id = activity
            .conversation_id()
            .ok_or(ConnectorError::MissingAddress("conversation"))?;
        match activity.reply_to_id.as_deref() {
            Some(reply_to) => {
                self.reply_to_activity(service_url, conversation_id, reply_to, activity)
                    .await
            }
            None => {
                self.send_to_conversation(service_url, conversation_id, activity)
                    .await
            }
        }
    }
}

/// Connector bound to one service URL, for Teams roster and proactive sends.
#[derive(Clone)]
pub struct TeamsClient {
    connector: ConnectorClient,
    service_url: String,
}

impl TeamsClient {
    pub fn new(connector: ConnectorClient, service_url: impl Into<String>) -> Self {
        Self {
            connector,
            service_url: service_url.into(),
        }
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }
}

#[async_trait]
impl TeamsDirectory for TeamsClient {
    async fn team_channels(&self, team_id: &str) -> Result<Vec<ChannelInfo>, ConnectorError> {
        self.connector
            .get_team_channels(&self.service_url, team_id)
            .await
    }

    async fn create_conversation(
        &self,
        params: &ConversationParameters,
    ) -> Result<ConversationResourceResponse, ConnectorError> {
        self.connector
            .create_conversation(&self.service_url, params)
            .await
    }
}
