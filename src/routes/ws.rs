//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::domain::LessonRequest;
use crate::logic::*;
use crate::protocol::{to_out, AnswerOut, ClientWsMessage, ServerWsMessage, TutorOut};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "tutor_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state), fields(conn = tracing::field::Empty))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let conn = Uuid::new_v4().to_string();
  tracing::Span::current().record("conn", conn.as_str());
  info!(target: "tutor_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "tutor_backend", kind = incoming.kind(), "WS received");
            handle_client_ws(incoming, &state, &conn).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "tutor_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "tutor_backend", "WebSocket disconnected");
}

fn busy_or_error(e: LogicError) -> ServerWsMessage {
  match e {
    LogicError::Busy(action) => ServerWsMessage::Busy { action: action.to_string() },
    other => ServerWsMessage::Error { message: other.to_string() },
  }
}

/// One request, one reply. `conn` identifies the socket when no clientId is sent.
#[instrument(level = "info", skip(msg, state), fields(kind = msg.kind()))]
pub async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, conn: &str) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::NewLesson { culture, subject, topic, client_id } => {
      let request = match LessonRequest::new(&culture, subject, &topic) {
        Ok(r) => r,
        Err(e) => return ServerWsMessage::Error { message: e.to_string() },
      };
      let client = client_id.unwrap_or_else(|| conn.to_string());
      match generate_lesson(state, &request, &client).await {
        Ok(out) => {
          info!(target: "lesson", id = %out.lesson.id, tier = ?out.lesson.source_tier, "WS new_lesson served");
          ServerWsMessage::Lesson { lesson: to_out(&out.lesson, Some(out.session)) }
        }
        Err(e) => busy_or_error(e),
      }
    }

    ClientWsMessage::SubmitAnswer { lesson_id, question_id, selected_index } => {
      match check_answer(state, &lesson_id, &question_id, selected_index).await {
        Ok(r) => {
          info!(target: "lesson", id = %lesson_id, correct = r.correct, "WS submit_answer checked");
          ServerWsMessage::AnswerResult(AnswerOut {
            correct: r.correct,
            correct_index: r.correct_index,
            explanation: r.explanation,
            feedback: r.feedback,
          })
        }
        Err(e) => busy_or_error(e),
      }
    }

    ClientWsMessage::TutorMessage { culture, subject, topic, text, client_id } => {
      let request = match LessonRequest::new(&culture, subject, &topic) {
        Ok(r) => r,
        Err(e) => return ServerWsMessage::Error { message: e.to_string() },
      };
      let client = client_id.unwrap_or_else(|| conn.to_string());
      match tutor_reply(state, &request, &text, &client).await {
        Ok(r) => ServerWsMessage::TutorReply(TutorOut { text: r.text, source_tier: r.source_tier, failure: r.failure }),
        Err(e) => busy_or_error(e),
      }
    }
  }
}
