//! Legacy QA script as an answer back-end
//!
//! The script is run once per question:
//! `<interpreter> <script> --action query --json <index> --question <text>`
//! and must print a single JSON object with at least an `answer` field.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use super::AnswerService;
use crate::config::LegacyConfig;
use crate::protocol::{AnswerResponse, QueryRequest};
use crate::{Result, SmartChatError};

#[derive(Debug, Clone)]
pub struct LegacyQaProcess {
    interpreter: PathBuf,
    script: PathBuf,
    index: PathBuf,
}

impl LegacyQaProcess {
    pub fn new(interpreter: PathBuf, script: PathBuf, index: PathBuf) -> Self {
        Self {
            interpreter,
            script,
            index,
        }
    }

    pub fn from_config(config: &LegacyConfig) -> Result<Self> {
        let missing = |field: &str| {
            SmartChatError::Config(format!("legacy backend needs `legacy.{field}`"))
        };
        Ok(Self::new(
            config.interpreter.clone().ok_or_else(|| missing("interpreter"))?,
            config.script.clone().ok_or_else(|| missing("script"))?,
            config.index.clone().ok_or_else(|| missing("index"))?,
        ))
    }

    fn command(&self, question: &str) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&self.script)
            .args(["--action", "query", "--json"])
            .arg(&self.index)
            .arg("--question")
            .arg(question)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Interpret the script's stdout
fn parse_output(stdout: &str) -> Result<AnswerResponse> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(SmartChatError::LegacyProcess("no output".to_string()));
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| {
        SmartChatError::LegacyProcess(format!("output is not JSON ({e}): {}", truncate(trimmed, 200)))
    })?;

    if value.get("answer").is_none() {
        return Err(SmartChatError::LegacyProcess(
            "output has no `answer` field".to_string(),
        ));
    }

    // The script never reports source pages.
    Ok(AnswerResponse {
        answer: AnswerResponse::from_json(&value).answer,
        pages: Vec::new(),
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[async_trait]
impl AnswerService for LegacyQaProcess {
    async fn ask(&self, request: &QueryRequest) -> Result<AnswerResponse> {
        debug!("Running legacy QA script {}", self.script.display());
        let output = self
            .command(&request.question)
            .output()
            .await
            .map_err(|e| SmartChatError::LegacyProcess(format!("cannot start interpreter: {e}")))?;

        if !output.status.success() {
            warn!(
                "Legacy QA script exited with {}: {}",
                output.status,
                truncate(String::from_utf8_lossy(&output.stderr).trim(), 200)
            );
        }

        parse_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn name(&self) -> &str {
        "legacy"
    }
}
