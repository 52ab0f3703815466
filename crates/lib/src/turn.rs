//! Turn context: the inbound activity being processed and a way to answer into its conversation.

use crate::channels::{ActivitySender, ConnectorError};
use crate::schema::{Activity, ResourceResponse};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lives for one inbound request; dropped once the handler (and error hook, if any) returns.
pub struct TurnContext {
    activity: Activity,
    sender: Arc<dyn ActivitySender>,
    responded: AtomicBool,
}

impl TurnContext {
    pub fn new(activity: Activity, sender: Arc<dyn ActivitySender>) -> Self {
        Self {
            activity,
            sender,
            responded: AtomicBool::new(false),
        }
    }

    /// The inbound activity.
    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    /// Send an activity back into the inbound conversation (addressing filled from the inbound activity).
    pub async fn send_activity(&self, activity: Activity) -> Result<ResourceResponse, ConnectorError> {
        let outbound = activity.reply_to(&self.activity);
        let res = self.sender.send_activity(&outbound).await?;
        self.responded.store(true, Ordering::SeqCst);
        Ok(res)
    }

    pub async fn send_text(&self, text: &str) -> Result<ResourceResponse, ConnectorError> {
        self.send_activity(Activity::message_text(text)).await
    }

    /// True once at least one activity was sent successfully during this turn.
    pub fn responded(&self) -> bool {
        self.responded.load(Ordering::SeqCst)
    }
}
