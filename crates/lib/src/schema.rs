//! Bot Framework activity schema: the subset of the v3 connector REST types the bridge reads and writes.
//!
//! Wire format is camelCase JSON. Unknown fields are ignored and absent optionals are omitted.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Channel id used by the Bot Framework Emulator.
pub const EMULATOR_CHANNEL: &str = "emulator";
/// Channel id used by Microsoft Teams.
pub const MSTEAMS_CHANNEL: &str = "msteams";
/// valueType of the trace activity carrying a turn error.
pub const ERROR_VALUE_TYPE: &str = "https://www.botframework.com/schemas/error";
pub const ADAPTIVE_CARD_CONTENT_TYPE: &str = "application/vnd.microsoft.card.adaptive";

/// Activity type. Unknown types are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityType {
    Message,
    ConversationUpdate,
    Invoke,
    Trace,
    Typing,
    Event,
    MessageReaction,
    InstallationUpdate,
    Other(String),
}

impl ActivityType {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityType::Message => "message",
            ActivityType::ConversationUpdate => "conversationUpdate",
            ActivityType::Invoke => "invoke",
            ActivityType::Trace => "trace",
            ActivityType::Typing => "typing",
            ActivityType::Event => "event",
            ActivityType::MessageReaction => "messageReaction",
            ActivityType::InstallationUpdate => "installationUpdate",
            ActivityType::Other(s) => s,
        }
    }
}

impl From<&str> for ActivityType {
    fn from(s: &str) -> Self {
        match s {
            "message" => ActivityType::Message,
            "conversationUpdate" => ActivityType::ConversationUpdate,
            "invoke" => ActivityType::Invoke,
            "trace" => ActivityType::Trace,
            "typing" => ActivityType::Typing,
            "event" => ActivityType::Event,
            "messageReaction" => ActivityType::MessageReaction,
            "installationUpdate" => ActivityType::InstallationUpdate,
            other => ActivityType::Other(other.to_string()),
        }
    }
}

impl Serialize for ActivityType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ActivityType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ActivityType::from(s.as_str()))
    }
}

/// One conversational event, inbound or outbound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<ActivityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// RFC 3339 UTC timestamp, kept as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_added: Option<Vec<ChannelAccount>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members_removed: Option<Vec<ChannelAccount>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<Value>,
}

impl Activity {
    /// Plain text message.
    pub fn message_text(text: impl Into<String>) -> Self {
        Self {
            activity_type: Some(ActivityType::Message),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Message carrying a single attachment.
    pub fn message_attachment(attachment: Attachment) -> Self {
        Self {
            activity_type: Some(ActivityType::Message),
            attachments: Some(vec![attachment]),
            ..Default::default()
        }
    }

    /// Trace activity (shown by the emulator, dropped by other channels).
    pub fn trace(
        name: impl Into<String>,
        label: impl Into<String>,
        value: Value,
        value_type: impl Into<String>,
    ) -> Self {
        Self {
            activity_type: Some(ActivityType::Trace),
            name: Some(name.into()),
            label: Some(label.into()),
            value: Some(value),
            value_type: Some(value_type.into()),
            ..Default::default()
        }
    }

    pub fn is_type(&self, activity_type: &ActivityType) -> bool {
        self.activity_type.as_ref() == Some(activity_type)
    }

    pub fn channel(&self) -> &str {
        self.channel_id.as_deref().unwrap_or("")
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation.as_ref().map(|c| c.id.as_str())
    }

    /// Teams-specific channel data, when present and well-formed.
    pub fn teams_channel_data(&self) -> Option<TeamsChannelData> {
        self.channel_data
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Address this (outbound) activity as a reply to `inbound`: same channel, service and conversation,
    /// sender and recipient swapped. Fields already set on `self` are kept.
    pub fn reply_to(mut self, inbound: &Activity) -> Self {
        if self.channel_id.is_none() {
            self.channel_id = inbound.channel_id.clone();
        }
        if self.service_url.is_none() {
            self.service_url = inbound.service_url.clone();
        }
        if self.conversation.is_none() {
            self.conversation = inbound.conversation.clone();
        }
        if self.from.is_none() {
            self.from = inbound.recipient.clone();
        }
        if self.recipient.is_none() {
            self.recipient = inbound.from.clone();
        }
        if self.reply_to_id.is_none() {
            self.reply_to_id = inbound.id.clone();
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Attachment {
    /// Media referenced by URL (image, file).
    pub fn content_url(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            content_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn adaptive_card(card: Value) -> Self {
        Self {
            content_type: ADAPTIVE_CARD_CONTENT_TYPE.to_string(),
            content: Some(card),
            ..Default::default()
        }
    }
}

/// `channelData` of activities sent by Teams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamsChannelData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aad_group_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantInfo {
    #[serde(default)]
    pub id: String,
}

/// Body of POST /v3/conversations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationParameters {
    #[serde(default)]
    pub is_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<ChannelAccount>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_data: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResourceResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
}

/// Body of GET /v3/teams/{teamId}/conversations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationList {
    #[serde(default)]
    pub conversations: Vec<ChannelInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Status + body returned to the channel for invoke activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl InvokeResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    pub fn not_implemented() -> Self {
        Self::new(501, None)
    }
}
