use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::blocks::{guide_message, suggestion_modal};
use crate::envelope::SlashCommandPayload;
use crate::handler::{HandlerContext, HandlerError, HandlerResult};

pub const GUIDE_COMMAND: &str = "/가이드";
pub const SUGGESTION_COMMAND: &str = "/건의";

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        command: &SlashCommandPayload,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, HandlerError>;
}

/// Slash commands keyed by their exact name, leading slash included.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, command: impl Into<String>, handler: H)
    where
        H: CommandHandler + 'static,
    {
        self.handlers.insert(command.into(), Arc::new(handler));
    }

    pub fn resolve(&self, command: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(command).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

pub fn default_command_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register(GUIDE_COMMAND, GuideCommand);
    registry.register(SUGGESTION_COMMAND, SuggestionCommand);
    registry
}

pub struct GuideCommand;

#[async_trait]
impl CommandHandler for GuideCommand {
    async fn handle(
        &self,
        command: &SlashCommandPayload,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, HandlerError> {
        info!(
            event_name = "slack.command.guide",
            correlation_id = %ctx.correlation_id,
            user_id = %command.user_id,
            "guide requested"
        );
        Ok(HandlerResult::Responded(guide_message()))
    }
}

/// Opens the anonymous suggestion modal.
pub struct SuggestionCommand;

#[async_trait]
impl CommandHandler for SuggestionCommand {
    async fn handle(
        &self,
        command: &SlashCommandPayload,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, HandlerError> {
        if command.trigger_id.is_empty() {
            return Err(HandlerError::InvalidPayload("slash command without trigger_id".into()));
        }

        ctx.slack.open_view(&command.trigger_id, &suggestion_modal()).await?;
        info!(
            event_name = "slack.command.suggestion_modal_opened",
            correlation_id = %ctx.correlation_id,
            "suggestion modal opened"
        );
        Ok(HandlerResult::Processed)
    }
}
