#![allow(clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::Mutex;

use tempfile::TempDir;

use wangr_core::config::Config;
use wangr_core::config::ConfigOverrides;
use wangr_core::config::ConfigToml;
use wangr_core::protocol::ToolOutput;
use wangr_core::resolver::ContinueOutcome;
use wangr_core::resolver::Continuation;

/// Returns a default `Config` whose on-disk state is confined to the provided
/// temporary directories. Using per-test directories keeps tests hermetic and
/// avoids clobbering a developer's real `~/.wangr`.
pub fn load_default_config_for_test(
    wangr_home: &TempDir,
    workspace: &TempDir,
    chat_api_url: Option<String>,
) -> Config {
    Config::load_from_base_config_with_overrides(
        ConfigToml::default(),
        ConfigOverrides {
            chat_api_url,
            api_key: Some("test-key".to_string()),
            cwd: Some(workspace.path().to_path_buf()),
        },
        wangr_home.path().to_path_buf(),
    )
    .expect("defaults for test should always succeed")
}

/// Builds an NDJSON response body, one event object per line.
pub fn ndjson_body(events: &[serde_json::Value]) -> String {
    events
        .iter()
        .map(|event| format!("{event}\n"))
        .collect()
}

/// A [`Continuation`] that records every call and replays canned outcomes. Once the
/// canned outcomes run out it answers with an empty response and no next batch.
#[derive(Default)]
pub struct RecordingContinuation {
    calls: Mutex<Vec<(String, Vec<ToolOutput>)>>,
    outcomes: Mutex<VecDeque<ContinueOutcome>>,
}

impl RecordingContinuation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: Vec<ContinueOutcome>) -> Self {
        Self {
            calls: Mutex::default(),
            outcomes: Mutex::new(outcomes.into()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<ToolOutput>)> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

impl Continuation for RecordingContinuation {
    fn continue_pending(
        &self,
        pending_id: &str,
        tool_outputs: Vec<ToolOutput>,
    ) -> impl Future<Output = wangr_core::error::Result<ContinueOutcome>> + Send {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push((pending_id.to_string(), tool_outputs));
        let outcome = self
            .outcomes
            .lock()
            .expect("outcomes lock poisoned")
            .pop_front()
            .unwrap_or_default();
        std::future::ready(Ok(outcome))
    }
}
