//! Answer back-ends
//!
//! The widget only needs something that turns a [`QueryRequest`] into an
//! [`AnswerResponse`] or an error. Two implementations exist:
//! - [`HttpAnswerService`]: the remote `/chatback/query/` endpoint
//! - [`LegacyQaProcess`]: the older local script that answers from a QA index

mod http;
mod legacy;

pub use http::{FeedbackReporter, HttpAnswerService};
pub use legacy::LegacyQaProcess;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{BackendKind, SmartChatConfig};
use crate::protocol::{AnswerResponse, QueryRequest};
use crate::Result;

/// Something that answers questions
#[async_trait]
pub trait AnswerService: Send + Sync {
    /// Resolve one question. Any error is a failed settlement; no retries.
    async fn ask(&self, request: &QueryRequest) -> Result<AnswerResponse>;

    /// Short name for logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: AnswerService + ?Sized> AnswerService for Arc<T> {
    async fn ask(&self, request: &QueryRequest) -> Result<AnswerResponse> {
        (**self).ask(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the back-end selected by the configuration
pub fn from_config(config: &SmartChatConfig) -> Result<Arc<dyn AnswerService>> {
    match config.backend {
        BackendKind::Http => Ok(Arc::new(HttpAnswerService::new(config)?)),
        BackendKind::Legacy => Ok(Arc::new(LegacyQaProcess::from_config(&config.legacy)?)),
    }
}

/// Run one question on a background task and deliver the outcome on `tx`.
///
/// The UI loop keeps handling input meanwhile and settles the widget when
/// the outcome arrives.
pub fn spawn_query(
    service: Arc<dyn AnswerService>,
    request: QueryRequest,
    tx: mpsc::UnboundedSender<Result<AnswerResponse>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(backend = service.name(), "Issuing question");
        let outcome = service.ask(&request).await;
        // The receiver only disappears when the host is shutting down.
        let _ = tx.send(outcome);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SmartChatError;

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl AnswerService for Fixed {
        async fn ask(&self, _request: &QueryRequest) -> Result<AnswerResponse> {
            match self.0 {
                Some(text) => Ok(AnswerResponse::new(text, Vec::new())),
                None => Err(SmartChatError::Transport("down".to_string())),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_spawn_query_delivers_outcome() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service: Arc<dyn AnswerService> = Arc::new(Fixed(Some("好")));
        spawn_query(service, QueryRequest::new("q", "m"), tx);
        let outcome = rx.recv().await.unwrap().unwrap();
        assert_eq!(outcome.answer.as_deref(), Some("好"));
    }

    #[tokio::test]
    async fn test_spawn_query_delivers_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service: Arc<dyn AnswerService> = Arc::new(Fixed(None));
        spawn_query(service, QueryRequest::new("q", "m"), tx);
        assert!(rx.recv().await.unwrap().is_err());
    }

    #[test]
    fn test_from_config_legacy_requires_paths() {
        let config = SmartChatConfig::default().with_backend(BackendKind::Legacy);
        assert!(matches!(from_config(&config), Err(SmartChatError::Config(_))));
    }
}
