//! Slack interface for the club bot.
//!
//! - **Envelopes** (`envelope`) - slash command, Events API and interactivity payloads
//! - **Registries** (`commands`, `events`, `actions`) - discriminator to handler tables
//! - **Dispatch** (`dispatch`) - routes one envelope to at most one handler
//! - **Block Kit** (`blocks`) - message and modal builders
//! - **Web API** (`api`) - `SlackApi` seam with HTTP and in-memory clients
//! - **Signing** (`signature`) - `X-Slack-Signature` verification
//!
//! # Flow
//!
//! ```text
//! HTTP ingress → envelope::parse_* → SlackDispatcher → Registry → Handler
//!                                                         ↓
//!                                   Repositories + SlackApi (HandlerContext)
//! ```
//!
//! Envelopes without a registered handler are dropped with a debug log.

pub mod actions;
pub mod api;
pub mod blocks;
pub mod commands;
pub mod dispatch;
pub mod envelope;
pub mod events;
pub mod handler;
pub mod signature;
pub mod warnings;

pub use api::{HttpSlackApi, InMemorySlackApi, SlackApi, SlackApiError, SlackChannel};
pub use dispatch::{DispatchError, SlackDispatcher};
pub use envelope::{SlackEnvelope, SlackEvent};
pub use handler::{HandlerContext, HandlerError, HandlerResult};
pub use signature::{SignatureError, SignatureVerifier};
