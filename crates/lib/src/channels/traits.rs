//! Async seams over the channel service.

use crate::channels::ConnectorError;
use crate::schema::{
    Activity, ChannelInfo, ConversationParameters, ConversationResourceResponse, ResourceResponse,
};
use async_trait::async_trait;

/// Delivers an activity into the conversation it is addressed to (service URL + conversation id).
#[async_trait]
pub trait ActivitySender: Send + Sync {
    async fn send_activity(&self, activity: &Activity) -> Result<ResourceResponse, ConnectorError>;
}

/// Team roster and proactive conversation creation, bound to one service URL.
#[async_trait]
pub trait TeamsDirectory: Send + Sync {
    /// Channels of a team, in the order the service returns them.
    async fn team_channels(&self, team_id: &str) -> Result<Vec<ChannelInfo>, ConnectorError>;

    async fn create_conversation(
        &self,
        params: &ConversationParameters,
    ) -> Result<ConversationResourceResponse, ConnectorError>;
}
