//! Wire format of the remote answer service
//!
//! The request body is a plain `{question, menu}` object. Response bodies are
//! parsed leniently: anything that is not a JSON object with a usable
//! `answer` is treated as "answer absent", never as a failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Path of the question endpoint, relative to the service base URL
pub const QUERY_PATH: &str = "/chatback/query/";

/// Menu label sent with every typed question
pub const DEFAULT_MENU: &str = "系統QA";

/// Body of `POST /chatback/query/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    pub menu: String,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>, menu: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            menu: menu.into(),
        }
    }
}

/// Identifier of a source page cited by an answer.
///
/// The service usually sends page numbers, but string labels are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRef {
    Number(u64),
    Label(String),
}

impl PageRef {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(PageRef::Number),
            Value::String(s) if !s.trim().is_empty() => Some(PageRef::Label(s.trim().to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRef::Number(n) => write!(f, "{n}"),
            PageRef::Label(s) => f.write_str(s),
        }
    }
}

impl From<u64> for PageRef {
    fn from(n: u64) -> Self {
        PageRef::Number(n)
    }
}

/// Successful answer payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default)]
    pub pages: Vec<PageRef>,
}

impl AnswerResponse {
    pub fn new(answer: impl Into<String>, pages: Vec<PageRef>) -> Self {
        Self {
            answer: Some(answer.into()),
            pages,
        }
    }

    /// Parse a success body. Malformed bodies yield an empty response.
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body.trim()) {
            Ok(value) => Self::from_json(&value),
            Err(_) => Self::default(),
        }
    }

    pub fn from_json(json: &Value) -> Self {
        let answer = json
            .get("answer")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(String::from);

        let pages = json
            .get("pages")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(PageRef::from_value).collect())
            .unwrap_or_default();

        Self { answer, pages }
    }
}

/// Feedback verdict chosen on the satisfaction prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    Helpful,
    NotHelpful,
}

/// Body of the optional fire-and-forget feedback report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackReport {
    /// The answer text the feedback refers to
    pub answer: String,
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_request_shape() {
        let req = QueryRequest::new("國道一號塞車嗎", DEFAULT_MENU);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value, json!({"question": "國道一號塞車嗎", "menu": "系統QA"}));
    }

    #[test]
    fn test_answer_with_numeric_pages() {
        let resp = AnswerResponse::from_body(r#"{"answer":"道路已恢復通車","pages":[12,13]}"#);
        assert_eq!(resp.answer.as_deref(), Some("道路已恢復通車"));
        assert_eq!(resp.pages, vec![PageRef::Number(12), PageRef::Number(13)]);
    }

    #[test]
    fn test_answer_with_mixed_pages() {
        let resp = AnswerResponse::from_body(r#"{"answer":"ok","pages":[3,"附錄A",null,-1]}"#);
        assert_eq!(
            resp.pages,
            vec![PageRef::Number(3), PageRef::Label("附錄A".to_string())]
        );
    }

    #[test]
    fn test_missing_pages_is_empty() {
        let resp = AnswerResponse::from_body(r#"{"answer":"ok","pages":null}"#);
        assert!(resp.pages.is_empty());
    }

    #[test]
    fn test_malformed_body_is_answer_absent() {
        assert_eq!(AnswerResponse::from_body("<html>oops</html>"), AnswerResponse::default());
        assert_eq!(AnswerResponse::from_body(""), AnswerResponse::default());
        assert_eq!(AnswerResponse::from_body("[1,2]"), AnswerResponse::default());
    }

    #[test]
    fn test_answer_text_kept_verbatim() {
        let resp = AnswerResponse::from_body("{\"answer\":\"  第一行\\n第二行\\n\"}");
        assert_eq!(resp.answer.as_deref(), Some("  第一行\n第二行\n"));
    }

    #[test]
    fn test_blank_answer_is_absent() {
        let resp = AnswerResponse::from_body(r#"{"answer":"   "}"#);
        assert!(resp.answer.is_none());
    }

    #[test]
    fn test_feedback_report_skips_empty_content() {
        let report = FeedbackReport {
            answer: "a".to_string(),
            verdict: Verdict::Helpful,
            content: String::new(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value, json!({"answer": "a", "verdict": "helpful"}));
    }
}
