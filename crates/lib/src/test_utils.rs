//! In-memory fakes for the channel seams, shared by unit tests.

use crate::channels::{ActivitySender, ConnectorError, TeamsDirectory};
use crate::schema::{
    Activity, ChannelInfo, ConversationParameters, ConversationResourceResponse, ResourceResponse,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

/// Records every activity it is asked to send. `failing()` rejects every send instead.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Activity>>,
    fail: bool,
}

impl RecordingSender {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Activity> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivitySender for RecordingSender {
    async fn send_activity(&self, activity: &Activity) -> Result<ResourceResponse, ConnectorError> {
        if self.fail {
            return Err(ConnectorError::Api {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(activity.clone());
        Ok(ResourceResponse {
            id: Some(format!("out-{}", self.sent.lock().unwrap().len())),
        })
    }
}

/// Team with a fixed channel list; channels in `failing` reject conversation creation.
#[derive(Default)]
pub struct FakeDirectory {
    channels: Vec<ChannelInfo>,
    failing: HashSet<String>,
    lookup_fails: bool,
    created: Mutex<Vec<ConversationParameters>>,
}

impl FakeDirectory {
    pub fn with_channels(ids: &[&str]) -> Self {
        Self {
            channels: ids
                .iter()
                .map(|id| ChannelInfo {
                    id: id.to_string(),
                    name: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, ids: &[&str]) -> Self {
        self.failing = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn lookup_failing(mut self) -> Self {
        self.lookup_fails = true;
        self
    }

    /// Every create_conversation call, including the failed ones, in call order.
    pub fn created(&self) -> Vec<ConversationParameters> {
        self.created.lock().unwrap().clone()
    }
}

pub fn target_channel(params: &ConversationParameters) -> String {
    params
        .channel_data
        .as_ref()
        .and_then(|d| d["channel"]["id"].as_str())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl TeamsDirectory for FakeDirectory {
    async fn team_channels(&self, _team_id: &str) -> Result<Vec<ChannelInfo>, ConnectorError> {
        if self.lookup_fails {
            return Err(ConnectorError::Api {
                status: 403,
                body: "bot not in team".to_string(),
            });
        }
        Ok(self.channels.clone())
    }

    async fn create_conversation(
        &self,
        params: &ConversationParameters,
    ) -> Result<ConversationResourceResponse, ConnectorError> {
        self.created.lock().unwrap().push(params.clone());
        let channel = target_channel(params);
        if self.failing.contains(&channel) {
            return Err(ConnectorError::Api {
                status: 500,
                body: format!("cannot post to {}", channel),
            });
        }
        Ok(ConversationResourceResponse {
            id: format!("{};messageid=1", channel),
            ..Default::default()
        })
    }
}
