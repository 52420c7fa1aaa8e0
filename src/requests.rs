//! Request bodies for the question-answering stream endpoints.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::StreamRequest;

/// Segment used by smart-QA when the caller does not pick one.
pub const DEFAULT_SMART_QA_SEGMENT: &str = "analysis";

/// A student's question to the tutor about one exam segment.
///
/// Sent to `POST /tutoring/ask-stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutoringQuestion {
    pub user_id: i64,
    pub segment_id: String,
    pub question_type: String,
    /// The segment's document, as the JSON string the exam service stores
    pub document: String,
    pub user_answers: Vec<Value>,
    pub question: String,
}

impl StreamRequest for TutoringQuestion {
    fn path(&self) -> Cow<'_, str> {
        Cow::Borrowed("/tutoring/ask-stream")
    }
}

/// A free-form question about the student's exam analysis.
///
/// Sent to `POST /smart-qa/ask-stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartQaQuestion {
    pub user_id: i64,
    pub question: String,
    pub segment_id: String,
}

impl SmartQaQuestion {
    /// Question against the default `analysis` segment.
    pub fn new(user_id: i64, question: impl Into<String>) -> Self {
        Self {
            user_id,
            question: question.into(),
            segment_id: DEFAULT_SMART_QA_SEGMENT.to_string(),
        }
    }

    pub fn with_segment(mut self, segment_id: impl Into<String>) -> Self {
        self.segment_id = segment_id.into();
        self
    }
}

impl StreamRequest for SmartQaQuestion {
    fn path(&self) -> Cow<'_, str> {
        Cow::Borrowed("/smart-qa/ask-stream")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tutoring_question_body() {
        let question = TutoringQuestion {
            user_id: 7,
            segment_id: "seg-1".to_string(),
            question_type: "reading".to_string(),
            document: "{\"passage\":\"...\"}".to_string(),
            user_answers: vec![json!("A"), json!("C")],
            question: "Why is B wrong?".to_string(),
        };
        assert_eq!(question.path(), "/tutoring/ask-stream");
        assert_eq!(
            serde_json::to_value(&question).unwrap(),
            json!({
                "user_id": 7,
                "segment_id": "seg-1",
                "question_type": "reading",
                "document": "{\"passage\":\"...\"}",
                "user_answers": ["A", "C"],
                "question": "Why is B wrong?"
            })
        );
    }

    #[test]
    fn test_smart_qa_default_segment() {
        let question = SmartQaQuestion::new(3, "Where did I lose points?");
        assert_eq!(question.segment_id, DEFAULT_SMART_QA_SEGMENT);
        assert_eq!(question.path(), "/smart-qa/ask-stream");

        let question = question.with_segment("listening");
        assert_eq!(
            serde_json::to_value(&question).unwrap(),
            json!({"user_id": 3, "question": "Where did I lose points?", "segment_id": "listening"})
        );
    }
}
