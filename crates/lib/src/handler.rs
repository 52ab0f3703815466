//! Activity handlers: one extension point per activity kind, dispatched from `on_turn`.
//!
//! Every method defaults to a no-op, so an implementation overrides only what it cares about.
//! Errors propagate to the adapter's turn-error hook.

use crate::schema::{ActivityType, ChannelAccount, InvokeResponse, TeamInfo, MSTEAMS_CHANNEL};
use crate::turn::TurnContext;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ActivityHandler: Send + Sync {
    /// Entry point for one inbound activity. Calls exactly one extension point (or none, for a
    /// conversation update without membership changes). Returns the invoke response for invoke activities.
    async fn on_turn(&self, ctx: &TurnContext) -> Result<Option<InvokeResponse>> {
        let activity = ctx.activity();
        match activity.activity_type.as_ref() {
            Some(ActivityType::Message) => {
                self.on_message_activity(ctx).await?;
            }
            Some(ActivityType::ConversationUpdate) => {
                self.on_conversation_update_activity(ctx).await?;
            }
            Some(ActivityType::Invoke) => {
                return self.on_invoke_activity(ctx).await.map(Some);
            }
            _ => {
                self.on_unrecognized_activity_type(ctx).await?;
            }
        }
        Ok(None)
    }

    /// Routes membership changes; the bot's own join/leave is filtered out.
    async fn on_conversation_update_activity(&self, ctx: &TurnContext) -> Result<()> {
        let activity = ctx.activity();
        let bot_id = activity.recipient.as_ref().map(|r| r.id.as_str());
        let others = |members: &Option<Vec<ChannelAccount>>| -> Vec<ChannelAccount> {
            members
                .iter()
                .flatten()
                .filter(|m| Some(m.id.as_str()) != bot_id)
                .cloned()
                .collect()
        };
        let added = others(&activity.members_added);
        let removed = others(&activity.members_removed);

        if !added.is_empty() {
            if activity.channel() == MSTEAMS_CHANNEL {
                let team = activity.teams_channel_data().and_then(|d| d.team);
                return self.on_teams_members_added(&added, team.as_ref(), ctx).await;
            }
            return self.on_members_added_activity(&added, ctx).await;
        }
        if !removed.is_empty() {
            return self.on_members_removed_activity(&removed, ctx).await;
        }
        Ok(())
    }

    async fn on_message_activity(&self, _ctx: &TurnContext) -> Result<()> {
        Ok(())
    }

    async fn on_members_added_activity(
        &self,
        _members_added: &[ChannelAccount],
        _ctx: &TurnContext,
    ) -> Result<()> {
        Ok(())
    }

    /// Teams roster event. Defaults to the generic members-added handler.
    async fn on_teams_members_added(
        &self,
        members_added: &[ChannelAccount],
        _team: Option<&TeamInfo>,
        ctx: &TurnContext,
    ) -> Result<()> {
        self.on_members_added_activity(members_added, ctx).await
    }

    async fn on_members_removed_activity(
        &self,
        _members_removed: &[ChannelAccount],
        _ctx: &TurnContext,
    ) -> Result<()> {
        Ok(())
    }

    /// Default: 501, matching a bot that implements no invoke operations.
    async fn on_invoke_activity(&self, _ctx: &TurnContext) -> Result<InvokeResponse> {
        Ok(InvokeResponse::not_implemented())
    }

    async fn on_unrecognized_activity_type(&self, _ctx: &TurnContext) -> Result<()> {
        Ok(())
    }
}

/// The bridge's bot: logs roster and message events, does nothing else.
#[derive(Debug, Default, Clone)]
pub struct LoggingBot {
    app_id: String,
}

impl LoggingBot {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }
}

#[async_trait]
impl ActivityHandler for LoggingBot {
    async fn on_teams_members_added(
        &self,
        members_added: &[ChannelAccount],
        team: Option<&TeamInfo>,
        _ctx: &TurnContext,
    ) -> Result<()> {
        log::info!(
            "on_teams_members_added: {} member(s), team {}",
            members_added.len(),
            team.map(|t| t.id.as_str()).unwrap_or("-")
        );
        Ok(())
    }

    async fn on_members_added_activity(
        &self,
        members_added: &[ChannelAccount],
        _ctx: &TurnContext,
    ) -> Result<()> {
        log::info!("on_members_added_activity: {} member(s)", members_added.len());
        Ok(())
    }

    async fn on_message_activity(&self, ctx: &TurnContext) -> Result<()> {
        log::info!(
            "on_message_activity: channel {} conversation {}",
            ctx.activity().channel(),
            ctx.activity().conversation_id().unwrap_or("-")
        );
        Ok(())
    }
}
