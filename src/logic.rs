//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Generating lessons (guarded against duplicate submission)
//!   - Checking answers against stored lessons
//!   - Tutor chat replies (Gemini when available, offline replies otherwise)
//!   - Recording lesson completion in the record store

use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::catalog::{answer_feedback, tutor_fallback_reply};
use crate::domain::{FailureKind, LessonRequest, ParsedQuestion, ProgressRecord, SourceTier};
use crate::gemini::GeneratorStatus;
use crate::inflight::{lesson_key, tutor_key};
use crate::pipeline::LessonOutcome;
use crate::prompt::build_tutor_prompt;
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum LogicError {
  #[error("a {0} request is already in progress")]
  Busy(&'static str),
  #[error("unknown lesson {0}")]
  UnknownLesson(String),
  #[error("unknown question {0}")]
  UnknownQuestion(String),
  #[error("option index {0} is out of range")]
  OptionOutOfRange(usize),
  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Who is submitting: the explicit client id, else the request itself.
pub fn submitter(client_id: Option<&str>, request: &LessonRequest) -> String {
  client_id
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string)
    .unwrap_or_else(|| format!("{}/{}/{}", request.culture().to_lowercase(), request.subject(), request.topic()))
}

#[instrument(level = "info", skip(state, request), fields(topic = %request.topic()))]
pub async fn generate_lesson(state: &AppState, request: &LessonRequest, client: &str) -> Result<LessonOutcome, LogicError> {
  let Some(_guard) = state.inflight.try_acquire(lesson_key(client)) else {
    return Err(LogicError::Busy("lesson"));
  };
  let outcome = state.pipeline().run(request).await;
  state.insert_lesson(outcome.lesson.clone()).await;
  Ok(outcome)
}

#[derive(Debug)]
pub struct AnswerOutcome {
  pub correct: bool,
  pub correct_index: usize,
  pub explanation: String,
  pub feedback: String,
}

#[instrument(level = "info", skip(state))]
pub async fn check_answer(state: &AppState, lesson_id: &str, question_id: &str, selected: usize) -> Result<AnswerOutcome, LogicError> {
  if selected >= ParsedQuestion::OPTION_COUNT {
    return Err(LogicError::OptionOutOfRange(selected));
  }
  let lesson = state.get_lesson(lesson_id).await.ok_or_else(|| LogicError::UnknownLesson(lesson_id.to_string()))?;
  let question = lesson.question(question_id).ok_or_else(|| LogicError::UnknownQuestion(question_id.to_string()))?;

  let correct = question.correct_option_index == selected;
  debug!(target: "lesson", %correct, "Answer checked");
  Ok(AnswerOutcome {
    correct,
    correct_index: question.correct_option_index,
    explanation: question.explanation.clone(),
    feedback: answer_feedback(&lesson, correct),
  })
}

#[derive(Debug)]
pub struct TutorReply {
  pub text: String,
  pub source_tier: SourceTier,
  pub failure: Option<FailureKind>,
}

#[instrument(level = "info", skip(state, request, message), fields(message_len = message.len()))]
pub async fn tutor_reply(state: &AppState, request: &LessonRequest, message: &str, client: &str) -> Result<TutorReply, LogicError> {
  let Some(_guard) = state.inflight.try_acquire(tutor_key(client)) else {
    return Err(LogicError::Busy("tutor"));
  };

  let Some(gemini) = &state.gemini else {
    debug!(target: "lesson", "Tutor reply via offline content.");
    return Ok(TutorReply { text: tutor_fallback_reply(request, message), source_tier: SourceTier::Fallback, failure: None });
  };

  let prompt = build_tutor_prompt(&state.config.prompts, request, message);
  let settings = state.config.chat.call_settings(&state.config.generation);
  match gemini.generate_with(&prompt, &settings).await {
    Ok(text) => Ok(TutorReply { text: text.trim().to_string(), source_tier: SourceTier::Generated, failure: None }),
    Err(e) => {
      error!(target: "lesson", error = %e, "Tutor reply failed; using offline reply.");
      Ok(TutorReply { text: tutor_fallback_reply(request, message), source_tier: SourceTier::Fallback, failure: Some(e.kind()) })
    }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn complete_lesson(state: &AppState, user_id: &str, lesson_id: &str) -> Result<ProgressRecord, LogicError> {
  let lesson = state.get_lesson(lesson_id).await.ok_or_else(|| LogicError::UnknownLesson(lesson_id.to_string()))?;
  let record = state.store.upsert_progress(user_id, lesson.subject, &lesson.topic).await?;
  info!(target: "lesson", %user_id, topic = %lesson.topic, completed = record.lessons_completed, "Lesson completion recorded");
  Ok(record)
}

pub async fn generator_status(state: &AppState) -> GeneratorStatus {
  match &state.gemini {
    Some(g) => g.probe().await,
    None => GeneratorStatus { working: false, model: String::new(), error: Some("GEMINI_API_KEY is not configured".into()) },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::TutorConfig;
  use crate::domain::Subject;
  use crate::store::NewUser;

  fn offline() -> AppState {
    AppState::with_parts(TutorConfig::default(), None)
  }

  fn req() -> LessonRequest {
    LessonRequest::new("tamil", Subject::Math, "algebra_basics").unwrap()
  }

  #[test]
  fn submitter_prefers_client_id() {
    assert_eq!(submitter(Some(" tab-1 "), &req()), "tab-1");
    assert_eq!(submitter(Some(""), &req()), "tamil/math/algebra_basics");
    assert_eq!(submitter(None, &req()), "tamil/math/algebra_basics");
  }

  #[tokio::test]
  async fn generated_lesson_is_stored_and_answerable() {
    let state = offline();
    let out = generate_lesson(&state, &req(), "c1").await.unwrap();
    let id = out.lesson.id.clone();
    let q = &out.lesson.questions[0];

    let right = check_answer(&state, &id, &q.id, q.correct_option_index).await.unwrap();
    assert!(right.correct);
    assert_eq!(right.feedback, "Great job! Your Algebra Basics answer reflects tamil traditions!");

    let wrong = check_answer(&state, &id, &q.id, (q.correct_option_index + 1) % 4).await.unwrap();
    assert!(!wrong.correct);
    assert!(wrong.feedback.starts_with("Try again!"));
  }

  #[tokio::test]
  async fn answer_errors() {
    let state = offline();
    assert!(matches!(check_answer(&state, "nope", "q1", 0).await, Err(LogicError::UnknownLesson(_))));
    assert!(matches!(check_answer(&state, "nope", "q1", 4).await, Err(LogicError::OptionOutOfRange(4))));
    let id = generate_lesson(&state, &req(), "c1").await.unwrap().lesson.id;
    assert!(matches!(check_answer(&state, &id, "q9", 0).await, Err(LogicError::UnknownQuestion(_))));
  }

  #[tokio::test]
  async fn duplicate_lesson_submission_is_busy() {
    let state = offline();
    let _held = state.inflight.try_acquire(lesson_key("c1")).unwrap();
    assert!(matches!(generate_lesson(&state, &req(), "c1").await, Err(LogicError::Busy("lesson"))));
    assert!(generate_lesson(&state, &req(), "c2").await.is_ok());
  }

  #[tokio::test]
  async fn offline_tutor_reply() {
    let state = offline();
    let reply = tutor_reply(&state, &req(), "What can you do?", "c1").await.unwrap();
    assert_eq!(reply.source_tier, SourceTier::Fallback);
    assert!(reply.text.starts_with("I'm your tamil cultural learning assistant"));
  }

  #[tokio::test]
  async fn completion_goes_to_the_store() {
    let state = offline();
    let user = state
      .store
      .insert_user(NewUser { id: None, name: "Arun".into(), culture: "tamil".into(), subjects: vec![], topics: vec![], level: "elementary".into() })
      .await
      .unwrap();
    let lesson = generate_lesson(&state, &req(), "c1").await.unwrap().lesson;
    complete_lesson(&state, &user.id, &lesson.id).await.unwrap();
    let again = complete_lesson(&state, &user.id, &lesson.id).await.unwrap();
    assert_eq!(again.lessons_completed, 2);
    assert!(matches!(complete_lesson(&state, "ghost", &lesson.id).await, Err(LogicError::Store(StoreError::UnknownUser(_)))));
  }

  #[tokio::test]
  async fn status_without_generator() {
    let status = generator_status(&offline()).await;
    assert!(!status.working);
    assert!(status.error.is_some());
  }
}
