//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::domain::{LessonRequest, RequestError};
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;
use crate::store::{NewUser, StoreError};
use crate::subtopics::{subtopics, topic_name, LEVELS};

/// Handler error → status code + JSON body.
pub struct ApiError(LogicError);

impl From<LogicError> for ApiError {
  fn from(e: LogicError) -> Self { ApiError(e) }
}
impl From<StoreError> for ApiError {
  fn from(e: StoreError) -> Self { ApiError(LogicError::Store(e)) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let message = self.0.to_string();
    let status = match &self.0 {
      LogicError::Busy(_) => {
        return (StatusCode::CONFLICT, Json(BusyOut { busy: true, message })).into_response();
      }
      LogicError::UnknownLesson(_) | LogicError::UnknownQuestion(_) => StatusCode::NOT_FOUND,
      LogicError::OptionOutOfRange(_) => StatusCode::BAD_REQUEST,
      LogicError::Store(StoreError::UnknownUser(_)) => StatusCode::NOT_FOUND,
      LogicError::Store(StoreError::DuplicateUser(_)) => StatusCode::CONFLICT,
      LogicError::Store(StoreError::Invalid(_)) => StatusCode::BAD_REQUEST,
    };
    (status, Json(ErrorOut { error: message })).into_response()
  }
}

fn bad_request(e: RequestError) -> Response {
  (StatusCode::BAD_REQUEST, Json(ErrorOut { error: e.to_string() })).into_response()
}

fn not_found(what: &str) -> Response {
  (StatusCode::NOT_FOUND, Json(ErrorOut { error: format!("unknown {}", what) })).into_response()
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_ai_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(generator_status(&state).await)
}

#[instrument(level = "info", skip(state, body), fields(culture = %body.culture, subject = %body.subject, topic = %body.topic))]
pub async fn http_post_lesson(
  State(state): State<Arc<AppState>>,
  Json(body): Json<LessonIn>,
) -> Response {
  let request = match LessonRequest::new(&body.culture, body.subject, &body.topic) {
    Ok(r) => r,
    Err(e) => return bad_request(e),
  };
  let client = submitter(body.client_id.as_deref(), &request);
  match generate_lesson(&state, &request, &client).await {
    Ok(out) => {
      info!(target: "lesson", id = %out.lesson.id, tier = ?out.lesson.source_tier, "HTTP lesson served");
      Json(to_out(&out.lesson, Some(out.session))).into_response()
    }
    Err(e) => ApiError::from(e).into_response(),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_lesson(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Response {
  match state.get_lesson(&id).await {
    Some(lesson) => Json(to_out(&lesson, None)).into_response(),
    None => not_found("lesson"),
  }
}

#[instrument(level = "info", skip(state, body), fields(lesson_id = %body.lesson_id, question_id = %body.question_id))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<AnswerOut>, ApiError> {
  let r = check_answer(&state, &body.lesson_id, &body.question_id, body.selected_index).await?;
  info!(target: "lesson", id = %body.lesson_id, correct = r.correct, "HTTP answer checked");
  Ok(Json(AnswerOut { correct: r.correct, correct_index: r.correct_index, explanation: r.explanation, feedback: r.feedback }))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_tutor_message(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TutorIn>,
) -> Response {
  let request = match LessonRequest::new(&body.culture, body.subject, &body.topic) {
    Ok(r) => r,
    Err(e) => return bad_request(e),
  };
  let client = submitter(body.client_id.as_deref(), &request);
  match tutor_reply(&state, &request, &body.text, &client).await {
    Ok(r) => Json(TutorOut { text: r.text, source_tier: r.source_tier, failure: r.failure }).into_response(),
    Err(e) => ApiError::from(e).into_response(),
  }
}

#[instrument(level = "info")]
pub async fn http_get_topics(Query(q): Query<TopicsQuery>) -> impl IntoResponse {
  let level = q.level.unwrap_or_else(|| LEVELS[0].to_string());
  let topics = subtopics(q.subject, &level)
    .iter()
    .map(|&key| TopicOut { key, name: topic_name(key) })
    .collect();
  Json(TopicsOut { subject: q.subject, level, topics })
}

#[instrument(level = "info", skip(state, body), fields(name = %body.name))]
pub async fn http_post_user(
  State(state): State<Arc<AppState>>,
  Json(body): Json<UserIn>,
) -> Result<impl IntoResponse, ApiError> {
  let user = state
    .store
    .insert_user(NewUser {
      id: body.id,
      name: body.name,
      culture: body.culture,
      subjects: body.subjects,
      topics: body.topics,
      level: body.level,
    })
    .await?;
  Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_user(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Response {
  match state.store.get_user(&id).await {
    Some(user) => Json(user).into_response(),
    None => not_found("user"),
  }
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, lesson_id = %body.lesson_id))]
pub async fn http_post_complete(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CompleteIn>,
) -> Result<impl IntoResponse, ApiError> {
  let record = complete_lesson(&state, &body.user_id, &body.lesson_id).await?;
  Ok(Json(record))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  Path(user_id): Path<String>,
) -> impl IntoResponse {
  let records = state.store.select_progress(&user_id).await;
  let last_updated = records.first().map(|r| r.updated_at);
  Json(ProgressOut { user_id, records, last_updated })
}
