//! Bot adapter: authenticates an inbound activity, runs the handler, and catches handler errors.
//!
//! A handler error never reaches the HTTP layer. It goes to the turn-error hook, which by default
//! logs it and tells the conversation something went wrong.

use crate::auth::{AuthError, JwtValidator};
use crate::channels::ActivitySender;
use crate::handler::ActivityHandler;
use crate::schema::{Activity, ActivityType, InvokeResponse, EMULATOR_CHANNEL, ERROR_VALUE_TYPE};
use crate::turn::TurnContext;
use async_trait::async_trait;
use std::sync::Arc;

/// First message sent to the conversation when a turn fails.
pub const TURN_ERROR_MESSAGE: &str = "The bot encountered an error or bug.";
/// Second message sent to the conversation when a turn fails.
pub const TURN_ERROR_FIX_MESSAGE: &str = "To continue to run this bot, please fix the bot source code.";

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),
}

/// Called once when a handler returns an error. Must not fail; problems are logged.
#[async_trait]
pub trait OnTurnError: Send + Sync {
    async fn on_turn_error(&self, ctx: &TurnContext, error: &anyhow::Error);
}

/// Logs the error, sends the two fixed messages, and on the emulator a `TurnError` trace.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTurnErrorHook;

#[async_trait]
impl OnTurnError for DefaultTurnErrorHook {
    async fn on_turn_error(&self, ctx: &TurnContext, error: &anyhow::Error) {
        log::error!("[on_turn_error] unhandled error: {}", error);
        log::error!("{:?}", error);

        for text in [TURN_ERROR_MESSAGE, TURN_ERROR_FIX_MESSAGE] {
            if let Err(e) = ctx.send_text(text).await {
                log::warn!("[on_turn_error] could not notify conversation: {}", e);
            }
        }

        if ctx.activity().channel() == EMULATOR_CHANNEL {
            let mut trace = Activity::trace(
                "on_turn_error Trace",
                "TurnError",
                serde_json::Value::String(error.to_string()),
                ERROR_VALUE_TYPE,
            );
            trace.timestamp = Some(
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            );
            if let Err(e) = ctx.send_activity(trace).await {
                log::warn!("[on_turn_error] could not send trace activity: {}", e);
            }
        }
    }
}

pub struct BotAdapter {
    validator: Arc<JwtValidator>,
    sender: Arc<dyn ActivitySender>,
    on_error: Arc<dyn OnTurnError>,
}

impl BotAdapter {
    pub fn new(validator: Arc<JwtValidator>, sender: Arc<dyn ActivitySender>) -> Self {
        Self {
            validator,
            sender,
            on_error: Arc::new(DefaultTurnErrorHook),
        }
    }

    pub fn with_error_hook(mut self, hook: Arc<dyn OnTurnError>) -> Self {
        self.on_error = hook;
        self
    }

    /// Authenticate and run one turn. Returns the invoke response for invoke activities (501 when the
    /// turn failed or produced none), `None` for everything else.
    pub async fn process_activity(
        &self,
        activity: Activity,
        auth_header: &str,
        handler: &dyn ActivityHandler,
    ) -> Result<Option<InvokeResponse>, AdapterError> {
        self.validator.authenticate(auth_header, &activity).await?;

        let is_invoke = activity.is_type(&ActivityType::Invoke);
        let ctx = TurnContext::new(activity, self.sender.clone());
        let invoke_response = match handler.on_turn(&ctx).await {
            Ok(res) => res,
            Err(e) => {
                self.on_error.on_turn_error(&ctx, &e).await;
                None
            }
        };
        if is_invoke {
            return Ok(Some(
                invoke_response.unwrap_or_else(InvokeResponse::not_implemented),
            ));
        }
        Ok(None)
    }
}
