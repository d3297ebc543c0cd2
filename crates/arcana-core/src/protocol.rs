//! Wire protocol message types
//!
//! Messages exchanged with the Arcana backend as JSON text frames.
//! Every frame carries a `type` tag; the remaining fields use camelCase
//! names to match the backend's conventions.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type tag for outbound liveness probes
pub const TYPE_PING: &str = "ping";
/// Type tag for liveness probe replies
pub const TYPE_PONG: &str = "pong";
/// Type tag for the GitHub workspace selection request
pub const TYPE_WORKSPACE_SELECT_GITHUB: &str = "workspace_select_github";
/// Type tag for workspace selection responses and progress updates
pub const TYPE_WORKSPACE_SELECT_GITHUB_RESPONSE: &str = "workspace_select_github_response";

/// Current time as epoch milliseconds, the timestamp format the backend expects
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A GitHub repository selected for workspace synchronization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoData {
    pub repo_id: i64,
    pub name: String,
    pub owner: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Status carried by a workspace selection response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// Repository clone/sync in progress
    Cloning,
    /// Sync finished, workspace is ready
    Success,
    /// Sync failed
    Error,
}

/// Result payload of a successful workspace selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSelection {
    /// Identifier of the synchronized workspace on the backend
    pub workspace_id: String,
}

/// Messages sent to the backend
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Liveness probe, sent immediately after connecting
    #[serde(rename = "ping")]
    Ping {
        #[serde(rename = "clientId")]
        client_id: String,
        #[serde(rename = "clientTimestamp")]
        client_timestamp: i64,
    },

    /// Request to clone and index a GitHub repository
    #[serde(rename = "workspace_select_github")]
    WorkspaceSelectGithub {
        #[serde(rename = "messageId")]
        message_id: Uuid,
        #[serde(rename = "repoData")]
        repo_data: RepoData,
        #[serde(rename = "accessToken")]
        access_token: String,
        #[serde(rename = "clientTimestamp")]
        client_timestamp: i64,
    },
}

/// Messages received from the backend that the client handles itself
///
/// Frames with other `type` tags are still routed to registered
/// listeners; they just have no built-in handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Reply to a liveness probe
    #[serde(rename = "pong")]
    Pong {
        #[serde(rename = "clientTimestamp")]
        client_timestamp: i64,
        #[serde(rename = "serverTimestamp")]
        server_timestamp: i64,
    },

    /// Response or progress update for a workspace selection request
    #[serde(rename = "workspace_select_github_response")]
    WorkspaceSelectGithubResponse {
        #[serde(rename = "messageId")]
        message_id: Uuid,
        status: ResponseStatus,
        #[serde(default)]
        progress: Option<i64>,
        #[serde(default)]
        message: Option<String>,
        #[serde(rename = "workspaceId", default)]
        workspace_id: Option<String>,
    },
}

impl ClientMessage {
    /// Create a liveness probe
    pub fn ping(client_id: &str) -> Self {
        ClientMessage::Ping {
            client_id: client_id.to_string(),
            client_timestamp: epoch_millis(),
        }
    }

    /// Create a workspace selection request
    pub fn select_github(message_id: Uuid, repo_data: RepoData, access_token: &str) -> Self {
        ClientMessage::WorkspaceSelectGithub {
            message_id,
            repo_data,
            access_token: access_token.to_string(),
            client_timestamp: epoch_millis(),
        }
    }

    /// Encode message to a JSON text frame
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("JSON encoding failed")
    }
}

impl ServerMessage {
    /// Decode a message from a JSON value
    pub fn decode(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}
