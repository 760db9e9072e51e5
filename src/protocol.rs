//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{FailureKind, Lesson, SourceTier, Subject};
use crate::pipeline::GenerationSession;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    NewLesson {
        culture: String,
        subject: Subject,
        #[serde(default)]
        topic: String,
        #[serde(rename = "clientId", default)]
        client_id: Option<String>,
    },
    SubmitAnswer {
        #[serde(rename = "lessonId")]
        lesson_id: String,
        #[serde(rename = "questionId")]
        question_id: String,
        #[serde(rename = "selectedIndex")]
        selected_index: usize,
    },
    TutorMessage {
        culture: String,
        subject: Subject,
        #[serde(default)]
        topic: String,
        text: String,
        #[serde(rename = "clientId", default)]
        client_id: Option<String>,
    },
}

impl ClientWsMessage {
    /// Wire tag, for logging without the payload.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientWsMessage::Ping => "ping",
            ClientWsMessage::NewLesson { .. } => "new_lesson",
            ClientWsMessage::SubmitAnswer { .. } => "submit_answer",
            ClientWsMessage::TutorMessage { .. } => "tutor_message",
        }
    }
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Lesson {
        lesson: LessonOut,
    },
    AnswerResult(AnswerOut),
    TutorReply(TutorOut),
    Busy {
        action: String,
    },
    Error {
        message: String,
    },
}

/// Question as delivered to the learner; the answer stays on the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    pub id: String,
    pub question_text: String,
    pub options: Vec<String>,
}

/// DTO used by both WS and HTTP for lesson delivery.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonOut {
    pub id: String,
    pub culture: String,
    pub subject: Subject,
    pub topic: String,
    pub topic_name: String,
    pub narrative: String,
    pub questions: Vec<QuestionOut>,
    pub source_tier: SourceTier,
    pub notice: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<GenerationSession>,
}

pub fn to_out(lesson: &Lesson, session: Option<GenerationSession>) -> LessonOut {
    LessonOut {
        id: lesson.id.clone(),
        culture: lesson.culture.clone(),
        subject: lesson.subject,
        topic: lesson.topic.clone(),
        topic_name: lesson.topic_name.clone(),
        narrative: lesson.narrative.clone(),
        questions: lesson
            .questions
            .iter()
            .map(|q| QuestionOut {
                id: q.id.clone(),
                question_text: q.question_text.clone(),
                options: q.options.clone(),
            })
            .collect(),
        source_tier: lesson.source_tier,
        notice: lesson.notice(),
        session,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonIn {
    pub culture: String,
    pub subject: Subject,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerIn {
    pub lesson_id: String,
    pub question_id: String,
    pub selected_index: usize,
}
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOut {
    pub correct: bool,
    pub correct_index: usize,
    pub explanation: String,
    pub feedback: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorIn {
    pub culture: String,
    pub subject: Subject,
    #[serde(default)]
    pub topic: String,
    pub text: String,
    #[serde(default)]
    pub client_id: Option<String>,
}
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorOut {
    pub text: String,
    pub source_tier: SourceTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

#[derive(Debug, Deserialize)]
pub struct TopicsQuery {
    pub subject: Subject,
    pub level: Option<String>,
}
#[derive(Debug, Serialize)]
pub struct TopicOut {
    pub key: &'static str,
    pub name: String,
}
#[derive(Debug, Serialize)]
pub struct TopicsOut {
    pub subject: Subject,
    pub level: String,
    pub topics: Vec<TopicOut>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIn {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub culture: String,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "elementary".into()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteIn {
    pub user_id: String,
    pub lesson_id: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct BusyOut {
    pub busy: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

/// Progress rows for one user, newest first.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOut {
    pub user_id: String,
    pub records: Vec<crate::domain::ProgressRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}
