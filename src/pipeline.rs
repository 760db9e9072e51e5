//! One lesson-generation attempt as an explicit state machine:
//!
//! ```text
//! Idle -> Prompting -> Awaiting -> Parsing -> Done(Generated)
//!             |            |           |
//!             +------------+-----------+----> Done(Fallback)
//! ```
//!
//! Every failure is recovered here; callers always get a complete lesson.
//! No retries, no state is revisited.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::catalog::FallbackCatalog;
use crate::config::{NarrativeOnlyPolicy, Prompts};
use crate::domain::{FailureKind, Lesson, LessonRequest, SourceTier};
use crate::gemini::GeminiClient;
use crate::lesson::assemble;
use crate::parser::{parse_response, ParseOutcome};
use crate::prompt::build_prompt;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
  Idle,
  Prompting,
  Awaiting,
  Parsing,
  Done(SourceTier),
}

impl PipelineState {
  pub fn can_advance_to(self, next: PipelineState) -> bool {
    use PipelineState::*;
    matches!(
      (self, next),
      (Idle, Prompting)
        | (Prompting, Awaiting)
        | (Prompting, Done(SourceTier::Fallback))
        | (Awaiting, Parsing)
        | (Awaiting, Done(SourceTier::Fallback))
        | (Parsing, Done(_))
    )
  }
}

/// Per-attempt state, serializable so it can be logged or returned to clients.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSession {
  pub state: PipelineState,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failure: Option<FailureKind>,
  pub dropped_blocks: usize,
  pub supplemented: bool,
  pub elapsed_ms: u64,
}

impl Default for GenerationSession {
  fn default() -> Self {
    Self { state: PipelineState::Idle, failure: None, dropped_blocks: 0, supplemented: false, elapsed_ms: 0 }
  }
}

impl GenerationSession {
  /// Refuses illegal transitions and leaves the state unchanged.
  pub fn advance(&mut self, next: PipelineState) -> bool {
    if self.state.can_advance_to(next) {
      self.state = next;
      true
    } else {
      warn!(target: "lesson", from = ?self.state, to = ?next, "Refusing illegal pipeline transition");
      false
    }
  }
}

#[derive(Clone, Debug)]
pub struct LessonOutcome {
  pub lesson: Lesson,
  pub session: GenerationSession,
}

/// Borrowed view of everything one attempt needs.
pub struct LessonPipeline<'a> {
  pub generator: Option<&'a GeminiClient>,
  pub prompts: &'a Prompts,
  pub catalog: &'a FallbackCatalog,
  pub narrative_only: NarrativeOnlyPolicy,
}

impl<'a> LessonPipeline<'a> {
  #[instrument(level = "info", skip(self, request), fields(culture = %request.culture(), subject = %request.subject(), topic = %request.topic()))]
  pub async fn run(&self, request: &LessonRequest) -> LessonOutcome {
    let start = Instant::now();
    let mut session = GenerationSession::default();
    session.advance(PipelineState::Prompting);

    let Some(client) = self.generator else {
      debug!(target: "lesson", "No generator configured; serving catalog lesson");
      return self.fallback(request, session, None, start);
    };
    let prompt = build_prompt(self.prompts, request);

    session.advance(PipelineState::Awaiting);
    let raw = match client.generate(&prompt).await {
      Ok(raw) => raw,
      Err(e) => {
        warn!(target: "lesson", kind = ?e.kind(), error = %e, "Generation failed; falling back");
        return self.fallback(request, session, Some(e.kind()), start);
      }
    };

    session.advance(PipelineState::Parsing);
    let parsed = match parse_response(&raw) {
      Ok(parsed) => parsed,
      Err(e) => {
        warn!(target: "lesson", error = %e, "Unusable quiz in generator output; falling back");
        return self.fallback(request, session, Some(FailureKind::ParseError), start);
      }
    };
    session.dropped_blocks = parsed.dropped_blocks;

    if parsed.narrative.trim().is_empty() {
      warn!(target: "lesson", "Generator output has no narrative; falling back");
      return self.fallback(request, session, Some(FailureKind::ParseError), start);
    }

    let questions = match (parsed.outcome, self.narrative_only) {
      (ParseOutcome::Complete | ParseOutcome::Partial, _) => parsed.questions,
      (ParseOutcome::NarrativeOnly, NarrativeOnlyPolicy::Supplement) => {
        debug!(target: "lesson", "Narrative without quiz; supplementing catalog questions");
        session.supplemented = true;
        self.catalog.fallback_questions(request)
      }
      (ParseOutcome::NarrativeOnly, NarrativeOnlyPolicy::Fallback) => {
        warn!(target: "lesson", "Narrative without quiz; falling back");
        return self.fallback(request, session, Some(FailureKind::ParseError), start);
      }
    };

    let lesson = assemble(request, parsed.narrative, questions, SourceTier::Generated);
    self.finish(lesson, session, start)
  }

  fn fallback(&self, request: &LessonRequest, mut session: GenerationSession, failure: Option<FailureKind>, start: Instant) -> LessonOutcome {
    session.failure = failure;
    let lesson = self.catalog.resolve(request);
    self.finish(lesson, session, start)
  }

  fn finish(&self, lesson: Lesson, mut session: GenerationSession, start: Instant) -> LessonOutcome {
    session.advance(PipelineState::Done(lesson.source_tier));
    session.elapsed_ms = start.elapsed().as_millis() as u64;
    info!(
      target: "lesson",
      lesson_id = %lesson.id,
      tier = ?lesson.source_tier,
      questions = lesson.questions.len(),
      failure = ?session.failure,
      elapsed_ms = session.elapsed_ms,
      "Lesson ready"
    );
    LessonOutcome { lesson, session }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use axum::{http::StatusCode, Json, Router};
  use tokio::net::TcpListener;

  use super::*;
  use crate::domain::Subject;
  use crate::gemini::{CallSettings, DEFAULT_MODEL};

  const GENERATED: &str = "Meera sat beside her paati as the sun rose over Madurai. Together they drew a kolam, \
counting dots in rows of five and joining them into loops.\n\nQuestions:\n\
1. What did Meera draw?\nA) A kite\nB) A kolam\nC) A boat\nD) A map\nCorrect Answer: B\n\n\
2. How many dots were in each row?\nA) Five\nB) Two\nC) Ten\nD) Seven\nCorrect Answer: A\n\n\
3. Who drew with Meera?\nA) Her teacher\nB) Her brother\nC) Her paati\nD) Her friend\nCorrect Answer: C\n";

  fn request() -> LessonRequest {
    LessonRequest::new("tamil", Subject::Math, "algebra_basics").unwrap()
  }

  fn client(base: String, timeout: Duration) -> GeminiClient {
    let settings = CallSettings { timeout, min_response_chars: 100, max_output_tokens: 800, temperature: 0.8, top_p: 0.9 };
    GeminiClient::new("test-key".into(), base, DEFAULT_MODEL.into(), settings)
  }

  async fn serve_text(text: &'static str) -> String {
    let body = serde_json::json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] });
    serve(Router::new().fallback(move || {
      let body = body.clone();
      async move { Json(body) }
    }))
    .await
  }

  async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
      let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
  }

  async fn run_with(generator: Option<&GeminiClient>, policy: NarrativeOnlyPolicy) -> LessonOutcome {
    let prompts = Prompts::default();
    let catalog = FallbackCatalog::default();
    let pipeline = LessonPipeline { generator, prompts: &prompts, catalog: &catalog, narrative_only: policy };
    pipeline.run(&request()).await
  }

  #[test]
  fn transitions_follow_the_diagram() {
    use PipelineState::*;
    assert!(Idle.can_advance_to(Prompting));
    assert!(Awaiting.can_advance_to(Done(SourceTier::Fallback)));
    assert!(Parsing.can_advance_to(Done(SourceTier::Generated)));
    assert!(!Awaiting.can_advance_to(Done(SourceTier::Generated)));
    assert!(!Parsing.can_advance_to(Awaiting));
    assert!(!Done(SourceTier::Fallback).can_advance_to(Idle));

    let mut s = GenerationSession::default();
    assert!(!s.advance(Parsing));
    assert_eq!(s.state, Idle);
  }

  #[test]
  fn session_serializes() {
    let s = GenerationSession { state: PipelineState::Done(SourceTier::Fallback), failure: Some(FailureKind::Timeout), ..Default::default() };
    let v = serde_json::to_value(&s).unwrap();
    assert_eq!(v["state"]["done"], "fallback");
    assert_eq!(v["failure"], "timeout");
    assert_eq!(v["droppedBlocks"], 0);
  }

  #[tokio::test]
  async fn without_generator_serves_catalog() {
    let out = run_with(None, NarrativeOnlyPolicy::Supplement).await;
    assert_eq!(out.session.state, PipelineState::Done(SourceTier::Fallback));
    assert_eq!(out.session.failure, None);
    assert_eq!(out.lesson.source_tier, SourceTier::Fallback);
    assert!(out.lesson.narrative.contains("tamil"));
    assert_eq!(out.lesson.questions.len(), 3);
  }

  #[tokio::test]
  async fn well_formed_output_is_generated() {
    let c = client(serve_text(GENERATED).await, Duration::from_secs(5));
    let out = run_with(Some(&c), NarrativeOnlyPolicy::Supplement).await;
    assert_eq!(out.session.state, PipelineState::Done(SourceTier::Generated));
    assert_eq!(out.lesson.source_tier, SourceTier::Generated);
    assert_eq!(out.lesson.questions.len(), 3);
    assert_eq!(out.lesson.questions[2].correct_option_index, 2);
    assert!(out.lesson.narrative.ends_with("joining them into loops."));
  }

  #[tokio::test]
  async fn unusable_quiz_falls_back_with_parse_error() {
    const BROKEN: &str = "A long enough story about counting mangoes at the market with grandmother, full of detail.\n\
Questions:\n1. How many?\nA) one\nB) two\n";
    let c = client(serve_text(BROKEN).await, Duration::from_secs(5));
    let out = run_with(Some(&c), NarrativeOnlyPolicy::Supplement).await;
    assert_eq!(out.session.failure, Some(FailureKind::ParseError));
    assert_eq!(out.lesson.source_tier, SourceTier::Fallback);
    assert_eq!(out.lesson.questions.len(), 3);
  }

  #[tokio::test]
  async fn api_error_falls_back() {
    let base = serve(Router::new().fallback(|| async { StatusCode::INTERNAL_SERVER_ERROR })).await;
    let out = run_with(Some(&client(base, Duration::from_secs(5))), NarrativeOnlyPolicy::Supplement).await;
    assert_eq!(out.session.failure, Some(FailureKind::ApiError));
    assert_eq!(out.session.state, PipelineState::Done(SourceTier::Fallback));
  }

  #[tokio::test]
  async fn unreachable_generator_falls_back_with_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let out = run_with(Some(&client(format!("http://{}", addr), Duration::from_secs(5))), NarrativeOnlyPolicy::Supplement).await;
    assert_eq!(out.session.failure, Some(FailureKind::NetworkError));
    assert_eq!(out.session.state, PipelineState::Done(SourceTier::Fallback));
    assert_eq!(out.lesson.source_tier, SourceTier::Fallback);
    assert!(out.lesson.narrative.contains("tamil"));
    assert_eq!(out.lesson.questions.len(), 3);
    assert!(out.lesson.questions.iter().all(|q| q.options.len() == 4));
  }

  #[tokio::test]
  async fn silent_generator_times_out_into_fallback() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let c = client(base, Duration::from_millis(300));

    let started = Instant::now();
    let out = run_with(Some(&c), NarrativeOnlyPolicy::Supplement).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(out.session.failure, Some(FailureKind::Timeout));
    assert_eq!(out.lesson.source_tier, SourceTier::Fallback);
    drop(listener);
  }

  const STORY_ONLY: &str = "Meera and her paati walked to the temple tank and counted the steps down to the water, \
one by one, until the numbers felt like a song.";

  #[tokio::test]
  async fn narrative_only_is_supplemented_by_default() {
    let c = client(serve_text(STORY_ONLY).await, Duration::from_secs(5));
    let out = run_with(Some(&c), NarrativeOnlyPolicy::Supplement).await;
    assert!(out.session.supplemented);
    assert_eq!(out.lesson.source_tier, SourceTier::Generated);
    assert_eq!(out.lesson.narrative, STORY_ONLY);
    assert_eq!(out.lesson.questions.len(), 3);
  }

  #[tokio::test]
  async fn narrative_only_can_fall_back() {
    let c = client(serve_text(STORY_ONLY).await, Duration::from_secs(5));
    let out = run_with(Some(&c), NarrativeOnlyPolicy::Fallback).await;
    assert!(!out.session.supplemented);
    assert_eq!(out.session.failure, Some(FailureKind::ParseError));
    assert_eq!(out.lesson.source_tier, SourceTier::Fallback);
  }
}
