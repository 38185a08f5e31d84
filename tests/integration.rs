//! Integration tests for the chat widget against a scripted answer service

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use smartchat::backend::spawn_query;
use smartchat::chat::{
    ChatWidget, FeedbackPhase, FeedbackView, GateState, Submission, Transcript, DEFAULT_ANSWER,
    DETAIL_THANKS_TEXT, ERROR_TEXT, THANKS_TEXT,
};
use smartchat::protocol::{PageRef, Verdict, QUERY_PATH};
use smartchat::{AnswerService, FeedbackReporter, HttpAnswerService, SmartChatConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

#[derive(Clone)]
struct ScriptedResponse {
    status: u16,
    body: String,
    delay_ms: u64,
}

fn respond(status: u16, body: &str) -> ScriptedResponse {
    ScriptedResponse {
        status,
        body: body.to_string(),
        delay_ms: 0,
    }
}

fn respond_after(delay_ms: u64, status: u16, body: &str) -> ScriptedResponse {
    ScriptedResponse {
        delay_ms,
        ..respond(status, body)
    }
}

#[derive(Debug, Clone)]
struct SeenRequest {
    path: String,
    body: String,
}

/// Local HTTP server answering requests from a script; the last entry repeats
struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener.local_addr().expect("resolved local listener address");
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn({
            let scripts = Arc::clone(&scripts);
            let request_count = Arc::clone(&request_count);
            let seen = Arc::clone(&seen);

            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    let seen = Arc::clone(&seen);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count, seen).await;
                    });
                }
            }
        });

        Self {
            base_url,
            request_count,
            seen,
            handle,
        }
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Acquire)
    }

    fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    fn config(&self) -> SmartChatConfig {
        SmartChatConfig::default().with_service_url(self.base_url.clone())
    }

    fn service(&self) -> HttpAnswerService {
        HttpAnswerService::new(&self.config()).expect("http client")
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<ScriptedResponse>>,
    request_count: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if let Some(end) = find_header_end(&buf) {
            break end;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    seen.lock().unwrap().push(SeenRequest {
        path: head.split_whitespace().nth(1).unwrap_or_default().to_string(),
        body: String::from_utf8_lossy(&buf[header_end..header_end + content_length]).into_owned(),
    });

    let script = scripts
        .get(index)
        .or_else(|| scripts.last())
        .cloned()
        .unwrap_or_else(|| respond(200, "{}"));

    if script.delay_ms > 0 {
        sleep(Duration::from_millis(script.delay_ms)).await;
    }

    let response = format!(
        "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        script.status,
        script.body.len(),
        script.body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn widget() -> ChatWidget<Transcript> {
    let mut w = ChatWidget::new(Transcript::recording());
    w.greet();
    w
}

#[tokio::test]
async fn test_answer_with_sources() {
    let server = ScriptedServer::new(vec![respond(
        200,
        r#"{"answer":"道路已恢復通車","pages":[12,13]}"#,
    )])
    .await;
    let service = server.service();
    let mut w = widget();

    let id = w.submit("國道五號現在塞嗎？", &service).await.unwrap();

    let msg = w.thread().get(id).unwrap();
    assert_eq!(msg.text(), "道路已恢復通車");
    assert_eq!(msg.source_refs(), &[PageRef::Number(12), PageRef::Number(13)]);
    assert_eq!(msg.source_annotation(), "（第 12, 13 頁）");
    assert_eq!(w.gate_state(), GateState::Idle);
    assert!(w.sink().input_enabled);
    assert_eq!(w.feedback().target(), Some(id));
    assert_eq!(server.request_count(), 1);

    server.shutdown();
}

#[tokio::test]
async fn test_request_shape() {
    let server = ScriptedServer::new(vec![respond(200, r#"{"answer":"ok"}"#)]).await;
    let service = server.service();
    let mut w = ChatWidget::new(Transcript::new()).with_menu_label("路況QA");

    w.submit("  服務區在哪  ", &service).await.unwrap();

    let seen = server.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, QUERY_PATH);
    let body: Value = serde_json::from_str(&seen[0].body).unwrap();
    assert_eq!(body, json!({"question": "服務區在哪", "menu": "路況QA"}));

    server.shutdown();
}

#[tokio::test]
async fn test_server_error_becomes_error_message() {
    let server = ScriptedServer::new(vec![respond(500, "internal error")]).await;
    let service = server.service();
    let mut w = widget();

    let id = w.submit("q", &service).await.unwrap();

    assert_eq!(w.thread().get(id).unwrap().text(), ERROR_TEXT);
    assert!(w.thread().get(id).unwrap().source_refs().is_empty());
    assert!(w.sink().input_enabled);
    assert_eq!(w.gate_state(), GateState::Idle);
    assert_eq!(w.feedback().target(), Some(id));

    server.shutdown();
}

#[tokio::test]
async fn test_malformed_body_uses_default_answer() {
    let server = ScriptedServer::new(vec![
        respond(200, "<html>oops</html>"),
        respond(200, r#"{"pages":[3]}"#),
        respond(200, r#"{"answer":""}"#),
    ])
    .await;
    let service = server.service();
    let mut w = widget();

    for _ in 0..3 {
        let id = w.submit("q", &service).await.unwrap();
        assert_eq!(w.thread().get(id).unwrap().text(), DEFAULT_ANSWER);
    }
    assert_eq!(server.request_count(), 3);

    server.shutdown();
}

#[tokio::test]
async fn test_unreachable_service_becomes_error_message() {
    // Grab a free port, then close it
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = SmartChatConfig::default().with_service_url(format!("http://{addr}"));
    let service = HttpAnswerService::new(&config).unwrap();
    let mut w = widget();

    let id = w.submit("q", &service).await.unwrap();
    assert_eq!(w.thread().get(id).unwrap().text(), ERROR_TEXT);
    assert!(w.sink().input_enabled);
}

#[tokio::test]
async fn test_request_timeout_settles_as_failure() {
    let server = ScriptedServer::new(vec![respond_after(3000, 200, r#"{"answer":"late"}"#)]).await;
    let config = server.config().with_request_timeout(Some(1));
    let service = HttpAnswerService::new(&config).unwrap();
    let mut w = widget();

    let id = w.submit("q", &service).await.unwrap();
    assert_eq!(w.thread().get(id).unwrap().text(), ERROR_TEXT);
    assert_eq!(w.gate_state(), GateState::Idle);

    server.shutdown();
}

#[tokio::test]
async fn test_rapid_submissions_send_one_request() {
    let server = ScriptedServer::new(vec![respond_after(200, 200, r#"{"answer":"第一題答案"}"#)]).await;
    let service: Arc<dyn AnswerService> = Arc::new(server.service());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut w = widget();

    let pending = match w.submit_text("第一題") {
        Submission::Pending(p) => p,
        other => panic!("expected pending, got {other:?}"),
    };
    spawn_query(Arc::clone(&service), pending.request().clone(), tx.clone());

    for text in ["第二題", "第三題", "常見問題"] {
        assert!(matches!(w.submit_text(text), Submission::Blocked));
    }
    assert!(matches!(w.select_shortcut("交通路況"), Submission::Blocked));

    let outcome = rx.recv().await.unwrap();
    let id = w.settle(pending, outcome);

    assert_eq!(w.thread().get(id).unwrap().text(), "第一題答案");
    // Greeting, one user message, one answer
    assert_eq!(w.thread().len(), 3);
    assert_eq!(server.request_count(), 1);

    server.shutdown();
}

#[tokio::test]
async fn test_shortcut_makes_no_request() {
    let server = ScriptedServer::new(vec![respond(200, r#"{"answer":"x"}"#)]).await;
    let service = server.service();
    let mut w = widget();

    let id = w.submit("常見問題", &service).await.unwrap();
    let id2 = match w.select_shortcut("交通路況") {
        Submission::Shortcut { reply, .. } => reply,
        other => panic!("expected shortcut, got {other:?}"),
    };

    assert_eq!(server.request_count(), 0);
    assert!(w.thread().get(id).unwrap().is_system());
    assert_eq!(w.feedback().target(), Some(id2));

    server.shutdown();
}

#[tokio::test]
async fn test_feedback_is_a_singleton_across_answers() {
    let server = ScriptedServer::new(vec![respond(200, r#"{"answer":"a"}"#)]).await;
    let service = server.service();
    let mut w = widget();

    let mut last = None;
    for i in 0..4 {
        last = w.submit(&format!("問題 {i}"), &service).await;
        assert_eq!(w.sink().live_feedback_count(), 1);
    }
    assert_eq!(w.feedback().target(), last);
    assert_eq!(w.sink().live_feedback.as_ref().map(|v| v.target()), last);

    server.shutdown();
}

#[tokio::test]
async fn test_feedback_lifecycle() {
    let server = ScriptedServer::new(vec![respond(200, r#"{"answer":"a"}"#)]).await;
    let service = server.service();
    let mut w = widget();

    // Reject then cancel: back to the prompt, text cleared, still one widget
    let first = w.submit("q1", &service).await.unwrap();
    assert!(w.reject_feedback());
    assert_eq!(w.feedback().phase(), Some(FeedbackPhase::DetailFormOpen));
    assert!(w.edit_feedback("看不懂"));
    assert!(w.cancel_feedback());
    let state = w.feedback().state().unwrap();
    assert_eq!(state.phase, FeedbackPhase::Prompted);
    assert_eq!(state.target, first);
    assert!(state.detail.is_empty());
    assert_eq!(w.sink().live_feedback_count(), 1);
    assert_eq!(
        w.sink().live_feedback,
        Some(FeedbackView::Prompt { target: first })
    );
    assert_eq!(w.sink().acknowledgment_for(first), None);

    // Reject then submit an empty detail
    let second = w.submit("q2", &service).await.unwrap();
    assert!(w.reject_feedback());
    let report = w.submit_feedback_detail("").unwrap();
    assert_eq!(report.verdict, Verdict::NotHelpful);
    assert_eq!(report.content, "");
    assert_eq!(w.sink().acknowledgment_for(second), Some(DETAIL_THANKS_TEXT));

    // Nothing left to act on
    assert!(w.accept_feedback().is_none());
    assert!(!w.reject_feedback());

    server.shutdown();
}

#[tokio::test]
async fn test_empty_submit_changes_nothing() {
    let server = ScriptedServer::new(vec![respond(200, r#"{"answer":"a"}"#)]).await;
    let service = server.service();
    let mut w = widget();
    let events_before = w.sink().events.len();

    assert_eq!(w.submit("   ", &service).await, None);
    assert_eq!(w.thread().len(), 1);
    assert_eq!(w.sink().events.len(), events_before);
    assert_eq!(server.request_count(), 0);

    server.shutdown();
}

#[tokio::test]
async fn test_feedback_report_is_posted() {
    let server = ScriptedServer::new(vec![respond(200, r#"{"answer":"道路已恢復通車"}"#)]).await;
    let service = server.service();
    let config = server
        .config()
        .with_feedback_url(Some(format!("{}/chatback/feedback/", server.base_url)));
    let reporter = FeedbackReporter::from_config(&config).unwrap().unwrap();
    let mut w = widget();

    w.submit("q", &service).await.unwrap();
    let report = w.accept_feedback().unwrap();
    reporter.send(&report).await.unwrap();

    let seen = server.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].path, "/chatback/feedback/");
    let body: Value = serde_json::from_str(&seen[1].body).unwrap();
    assert_eq!(body["answer"], "道路已恢復通車");
    assert_eq!(body["verdict"], "helpful");

    server.shutdown();
}

#[tokio::test]
async fn test_failed_feedback_report_keeps_acknowledgment() {
    let server = ScriptedServer::new(vec![
        respond(200, r#"{"answer":"a"}"#),
        respond(503, "unavailable"),
    ])
    .await;
    let service = server.service();
    let config = server
        .config()
        .with_feedback_url(Some(format!("{}/chatback/feedback/", server.base_url)));
    let reporter = FeedbackReporter::from_config(&config).unwrap().unwrap();
    let mut w = widget();

    let id = w.submit("q", &service).await.unwrap();
    let report = w.accept_feedback().unwrap();
    reporter.report(report).await.unwrap();

    assert_eq!(server.request_count(), 2);
    assert_eq!(w.sink().acknowledgment_for(id), Some(THANKS_TEXT));
    assert!(w.feedback().state().is_none());

    server.shutdown();
}
