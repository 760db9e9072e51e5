//! Domain models used by the backend: lesson requests, quiz questions, lessons,
//! and the user/progress records reported to the store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// School subject a lesson is about.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
  Math,
  Science,
  History,
  Literature,
}

impl Subject {
  pub const ALL: [Subject; 4] = [Subject::Math, Subject::Science, Subject::History, Subject::Literature];

  pub fn as_str(&self) -> &'static str {
    match self {
      Subject::Math => "math",
      Subject::Science => "science",
      Subject::History => "history",
      Subject::Literature => "literature",
    }
  }
}

impl fmt::Display for Subject {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
  #[error("culture must not be empty")]
  EmptyCulture,
}

/// One generation attempt's input. Built once, never mutated.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct LessonRequest {
  culture: String,
  subject: Subject,
  topic: String,
}

impl LessonRequest {
  pub fn new(culture: &str, subject: Subject, topic: &str) -> Result<Self, RequestError> {
    let culture = culture.trim();
    if culture.is_empty() {
      return Err(RequestError::EmptyCulture);
    }
    Ok(Self { culture: culture.to_string(), subject, topic: topic.trim().to_string() })
  }

  pub fn culture(&self) -> &str { &self.culture }
  pub fn subject(&self) -> Subject { self.subject }
  pub fn topic(&self) -> &str { &self.topic }
}

/// A validated multiple-choice question. `options` always has exactly 4 entries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuestion {
  pub id: String,
  pub question_text: String,
  pub options: Vec<String>,
  pub correct_option_index: usize,
  pub explanation: String,
}

impl ParsedQuestion {
  pub const OPTION_COUNT: usize = 4;

  pub fn is_well_formed(&self) -> bool {
    self.options.len() == Self::OPTION_COUNT && self.correct_option_index < Self::OPTION_COUNT
  }
}

/// Maps an answer letter (A-D, either case) to a zero-based option index.
pub fn letter_to_index(letter: char) -> Option<usize> {
  match letter.to_ascii_uppercase() {
    'A' => Some(0),
    'B' => Some(1),
    'C' => Some(2),
    'D' => Some(3),
    _ => None,
  }
}

/// Where did the lesson content come from?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
  Generated, // external generator output, parsed
  Fallback,  // static catalog
}

impl SourceTier {
  /// Informational notice shown to the learner. Never an error.
  pub fn notice(&self) -> &'static str {
    match self {
      SourceTier::Generated => "AI-enhanced lesson",
      SourceTier::Fallback => "Using offline content",
    }
  }
}

/// Every way a generation attempt can end up on the fallback path.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  NetworkError,
  Timeout,
  ApiError,
  EmptyResponse,
  ParseError,
}

/// The unit of content handed to the UI layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
  pub id: String,
  pub culture: String,
  pub subject: Subject,
  pub topic: String,
  pub topic_name: String,
  pub narrative: String,
  pub questions: Vec<ParsedQuestion>,
  pub source_tier: SourceTier,
}

impl Lesson {
  pub fn notice(&self) -> &'static str {
    self.source_tier.notice()
  }

  pub fn question(&self, id: &str) -> Option<&ParsedQuestion> {
    self.questions.iter().find(|q| q.id == id)
  }
}

/// Learner profile as persisted by the record store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
  pub id: String,
  pub name: String,
  pub culture: String,
  #[serde(default)] pub subjects: Vec<Subject>,
  #[serde(default)] pub topics: Vec<String>,
  pub level: String,
  pub created_at: DateTime<Utc>,
}

/// Lessons completed per (user, subject, topic).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
  pub id: String,
  pub user_id: String,
  pub subject: Subject,
  pub topic: String,
  pub lessons_completed: u32,
  pub updated_at: DateTime<Utc>,
}
