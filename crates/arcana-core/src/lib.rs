//! Arcana Core Library
//!
//! Client-side connection manager for the Arcana backend: a single
//! persistent WebSocket connection with bounded reconnection, a
//! type-routed message dispatcher, correlated request/response
//! handling, and an observable repository-sync state machine.
//!
//! # Quick Start
//!
//! ```text
//! let client = ArcanaClient::connect(config.client_config());
//!
//! let repo = RepoData { repo_id: 1, name: "x".into(), owner: "o".into(),
//!                       url: "https://github.com/o/x".into(), branch: None };
//! let workspace = client.select_github_repo(repo, "token").await?;
//! ```
//!
//! # Modules
//!
//! - `client`: the public handle (main entry point)
//! - `protocol`: JSON wire message types
//! - `listener`: message-type listener registry
//! - `session`: sync progress state machine
//! - `config`: application configuration
//! - `error`: correlated request errors

pub mod client;
pub mod config;
pub mod error;
pub mod listener;
pub mod protocol;
pub mod session;

mod connection;
mod pending;

pub use client::{ArcanaClient, ClientConfig};
pub use config::{Config, DEFAULT_ENDPOINT};
pub use connection::ConnectionState;
pub use error::RequestError;
pub use listener::{ListenerRegistry, Subscription};
pub use protocol::{ClientMessage, RepoData, ResponseStatus, ServerMessage, WorkspaceSelection};
pub use session::{SyncSnapshot, SyncStatus};
