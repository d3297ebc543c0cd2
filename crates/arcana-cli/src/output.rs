//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use arcana_core::{SyncSnapshot, SyncStatus};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print an informational message (human output only)
    pub fn message(&self, msg: &str) {
        if self.format == OutputFormat::Human {
            println!("{}", msg);
        }
    }

    /// Print a success message (human output only)
    pub fn success(&self, msg: &str) {
        if self.format == OutputFormat::Human {
            println!("✓ {}", msg);
        }
    }

    /// Print one sync progress line (human output only)
    pub fn sync_progress(&self, snap: &SyncSnapshot) {
        if self.format != OutputFormat::Human {
            return;
        }
        match snap.status {
            SyncStatus::Idle => {}
            SyncStatus::Error => {
                let reason = snap.error.as_deref().unwrap_or("unknown error");
                println!("✗ Sync failed: {}", reason);
            }
            _ => {
                let label = snap.message.as_deref().unwrap_or("Syncing");
                println!("[{:>3}%] {}", snap.progress, label);
            }
        }
    }
}
