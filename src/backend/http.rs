//! Remote answer service over HTTP

use async_trait::async_trait;
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::AnswerService;
use crate::config::SmartChatConfig;
use crate::protocol::{AnswerResponse, FeedbackReport, QueryRequest};
use crate::{Result, SmartChatError};

const USER_AGENT: &str = concat!("smartchat/", env!("CARGO_PKG_VERSION"));

fn build_client(config: &SmartChatConfig) -> Result<Client> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| SmartChatError::Config(format!("cannot build HTTP client: {e}")))
}

fn map_reqwest_error(e: reqwest::Error) -> SmartChatError {
    if e.is_timeout() {
        SmartChatError::Transport(format!("timeout: {e}"))
    } else if e.is_connect() {
        SmartChatError::Transport(format!("network: {e}"))
    } else {
        SmartChatError::Transport(e.to_string())
    }
}

/// `POST /chatback/query/` client
pub struct HttpAnswerService {
    client: Client,
    url: String,
}

impl HttpAnswerService {
    pub fn new(config: &SmartChatConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            url: config.query_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AnswerService for HttpAnswerService {
    async fn ask(&self, request: &QueryRequest) -> Result<AnswerResponse> {
        debug!("POST {} ({} chars)", self.url, request.question.chars().count());

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SmartChatError::Status {
                status: status.as_u16(),
            });
        }

        // A 2xx body that does not parse is an absent answer, not a failure.
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(AnswerResponse::from_body(&body))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Posts finished feedback without waiting for the result
#[derive(Clone)]
pub struct FeedbackReporter {
    client: Client,
    url: String,
}

impl FeedbackReporter {
    /// `None` when no feedback URL is configured
    pub fn from_config(config: &SmartChatConfig) -> Result<Option<Self>> {
        let Some(url) = config.feedback_url.clone() else {
            return Ok(None);
        };
        Ok(Some(Self {
            client: build_client(config)?,
            url,
        }))
    }

    /// Send one report and wait for it
    pub async fn send(&self, report: &FeedbackReport) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(report)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SmartChatError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Fire-and-forget: failures are logged and otherwise ignored
    pub fn report(&self, report: FeedbackReport) -> JoinHandle<()> {
        let reporter = self.clone();
        tokio::spawn(async move {
            if let Err(e) = reporter.send(&report).await {
                warn!("Feedback report dropped: {}", e);
            }
        })
    }
}
