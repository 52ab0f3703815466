//! Team broadcast: post the same message as a new thread in every channel of a team.

use crate::channels::{ConnectorError, TeamsDirectory};
use crate::config::{BroadcastConfig, ExecSumConfig, FailurePolicy};
use crate::schema::{Activity, Attachment, ConversationParameters};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// What gets posted to each channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastMessage {
    /// Image attachment referenced by URL.
    Image { url: String, content_type: String },
    /// Adaptive card announcing an exec summary, with one button linking to it.
    ExecSum(ExecSumConfig),
}

impl BroadcastMessage {
    pub fn image(config: &BroadcastConfig) -> Self {
        BroadcastMessage::Image {
            url: config.image_url.clone(),
            content_type: config.image_content_type.clone(),
        }
    }

    pub fn execsum(config: &BroadcastConfig) -> Self {
        BroadcastMessage::ExecSum(config.execsum.clone())
    }

    pub fn to_activity(&self) -> Activity {
        match self {
            BroadcastMessage::Image { url, content_type } => {
                Activity::message_attachment(Attachment::content_url(url, content_type))
            }
            BroadcastMessage::ExecSum(execsum) => {
                Activity::message_attachment(Attachment::adaptive_card(execsum_card(execsum)))
            }
        }
    }
}

/// AdaptiveCard 1.0: a text block and an `Action.OpenUrl` button.
pub fn execsum_card(execsum: &ExecSumConfig) -> serde_json::Value {
    json!({
        "type": "AdaptiveCard",
        "version": "1.0",
        "body": [
            { "type": "TextBlock", "text": execsum.text }
        ],
        "actions": [
            { "type": "Action.OpenUrl", "title": execsum.action_title, "url": execsum.action_url }
        ]
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelFailure {
    pub channel_id: String,
    pub error: String,
}

/// Per-channel outcome of one broadcast. Channel ids appear in lookup order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastReport {
    pub team_id: String,
    pub attempted: usize,
    pub delivered: Vec<String>,
    pub failed: Vec<ChannelFailure>,
    /// Channels not attempted because an earlier send failed under `FailurePolicy::Abort`.
    pub skipped: Vec<String>,
}

impl BroadcastReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

pub struct Broadcaster {
    directory: Arc<dyn TeamsDirectory>,
    policy: FailurePolicy,
}

impl Broadcaster {
    pub fn new(directory: Arc<dyn TeamsDirectory>, policy: FailurePolicy) -> Self {
        Self { directory, policy }
    }

    /// List the team's channels and start one conversation per channel carrying `message`.
    /// Only the channel lookup failing is an error; per-channel failures land in the report.
    pub async fn broadcast(
        &self,
        team_id: &str,
        message: &BroadcastMessage,
    ) -> Result<BroadcastReport, ConnectorError> {
        let channels = self.directory.team_channels(team_id).await?;
        log::info!("broadcasting to {} channel(s) of team {}", channels.len(), team_id);

        let activity = message.to_activity();
        let mut report = BroadcastReport {
            team_id: team_id.to_string(),
            ..Default::default()
        };
        let mut channels = channels.into_iter();
        while let Some(channel) = channels.next() {
            let params = ConversationParameters {
                is_group: true,
                channel_data: Some(json!({ "channel": { "id": channel.id } })),
                activity: Some(activity.clone()),
                ..Default::default()
            };
            report.attempted += 1;
            match self.directory.create_conversation(&params).await {
                Ok(created) => {
                    log::debug!("posted to channel {} (conversation {})", channel.id, created.id);
                    report.delivered.push(channel.id);
                }
                Err(e) => {
                    log::error!("broadcast to channel {} failed: {}", channel.id, e);
                    report.failed.push(ChannelFailure {
                        channel_id: channel.id,
                        error: e.to_string(),
                    });
                    if self.policy == FailurePolicy::Abort {
                        report.skipped.extend(channels.by_ref().map(|c| c.id));
                        break;
                    }
                }
            }
        }
        Ok(report)
    }
}
