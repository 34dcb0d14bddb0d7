use thiserror::Error;
use tracing::{debug, info, warn};

use crate::actions::{default_action_registry, ActionRegistry};
use crate::commands::{default_command_registry, CommandRegistry};
use crate::envelope::{SlackEnvelope, SlackEvent};
use crate::events::{default_lifecycle_registry, LifecycleRegistry};
use crate::handler::{HandlerContext, HandlerError, HandlerResult};

#[derive(Debug, Error)]
#[error("handler for `{discriminator}` failed: {source}")]
pub struct DispatchError {
    pub discriminator: String,
    #[source]
    pub source: HandlerError,
}

/// Routes each envelope to at most one handler.
pub struct SlackDispatcher {
    commands: CommandRegistry,
    lifecycle: LifecycleRegistry,
    actions: ActionRegistry,
}

impl Default for SlackDispatcher {
    fn default() -> Self {
        Self::new(
            default_command_registry(),
            default_lifecycle_registry(),
            default_action_registry(),
        )
    }
}

impl SlackDispatcher {
    pub fn new(
        commands: CommandRegistry,
        lifecycle: LifecycleRegistry,
        actions: ActionRegistry,
    ) -> Self {
        Self { commands, lifecycle, actions }
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &HandlerContext,
    ) -> Result<HandlerResult, DispatchError> {
        let (discriminator, outcome) = match &envelope.event {
            SlackEvent::SlashCommand(payload) => {
                let Some(handler) = self.commands.resolve(&payload.command) else {
                    return Ok(dropped(envelope, &payload.command, ctx));
                };
                (payload.command.as_str(), handler.handle(payload, ctx).await)
            }
            SlackEvent::Lifecycle(event) => {
                let Some(handler) = self.lifecycle.resolve(event.event_type()) else {
                    return Ok(dropped(envelope, event.event_type(), ctx));
                };
                (event.event_type(), handler.handle(event, ctx).await)
            }
            SlackEvent::BlockAction(action) => {
                let Some(handler) = self.actions.resolve(&action.action_id) else {
                    return Ok(dropped(envelope, &action.action_id, ctx));
                };
                (action.action_id.as_str(), handler.handle(action, ctx).await)
            }
            SlackEvent::ViewSubmission(view) => {
                let Some(handler) = self.actions.resolve_view(&view.callback_id) else {
                    return Ok(dropped(envelope, &view.callback_id, ctx));
                };
                (view.callback_id.as_str(), handler.handle(view, ctx).await)
            }
            SlackEvent::Unsupported { event_type } => {
                return Ok(dropped(envelope, event_type, ctx));
            }
        };

        match outcome {
            Ok(result) => {
                info!(
                    event_name = "slack.dispatch.handled",
                    correlation_id = %ctx.correlation_id,
                    envelope_id = %envelope.envelope_id,
                    kind = envelope.event.kind(),
                    discriminator,
                    "envelope handled"
                );
                Ok(result)
            }
            Err(source) => {
                warn!(
                    event_name = "slack.dispatch.failed",
                    correlation_id = %ctx.correlation_id,
                    envelope_id = %envelope.envelope_id,
                    kind = envelope.event.kind(),
                    discriminator,
                    error = %source,
                    "envelope handler failed"
                );
                Err(DispatchError { discriminator: discriminator.to_string(), source })
            }
        }
    }
}

fn dropped(envelope: &SlackEnvelope, discriminator: &str, ctx: &HandlerContext) -> HandlerResult {
    debug!(
        event_name = "slack.dispatch.dropped",
        correlation_id = %ctx.correlation_id,
        envelope_id = %envelope.envelope_id,
        kind = envelope.event.kind(),
        discriminator,
        "no handler registered; dropping envelope"
    );
    HandlerResult::Ignored
}
