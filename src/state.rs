//! Application state: configuration, fallback catalog, optional Gemini client,
//! the lessons served so far, the in-flight registry and the record store.
//!
//! Everything here is cheap to share behind an `Arc`; mutable parts carry
//! their own locks.

use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::catalog::FallbackCatalog;
use crate::config::{load_config_from_env, TutorConfig};
use crate::domain::Lesson;
use crate::gemini::GeminiClient;
use crate::inflight::InFlight;
use crate::pipeline::LessonPipeline;
use crate::store::RecordStore;

pub struct AppState {
    pub config: TutorConfig,
    pub catalog: FallbackCatalog,
    pub gemini: Option<GeminiClient>,
    lessons: RwLock<ServedLessons>,
    pub inflight: InFlight,
    pub store: RecordStore,
}

impl AppState {
    /// Build state from env: load config, build the catalog, init Gemini.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_config_from_env().unwrap_or_default();
        let gemini = GeminiClient::from_env(config.generation.call_settings());
        if let Some(g) = &gemini {
            info!(target: "tutor_backend", base_url = %g.base_url, model = %g.model, "Gemini enabled.");
        } else {
            info!(target: "tutor_backend", "Gemini disabled (no GEMINI_API_KEY). Serving catalog lessons.");
        }
        Self::with_parts(config, gemini)
    }

    pub fn with_parts(config: TutorConfig, gemini: Option<GeminiClient>) -> Self {
        let catalog = FallbackCatalog::from_config(&config.lessons);
        Self {
            lessons: RwLock::new(ServedLessons::new(config.storage.max_lessons)),
            config,
            catalog,
            gemini,
            inflight: InFlight::default(),
            store: RecordStore::default(),
        }
    }

    pub fn pipeline(&self) -> LessonPipeline<'_> {
        LessonPipeline {
            generator: self.gemini.as_ref(),
            prompts: &self.config.prompts,
            catalog: &self.catalog,
            narrative_only: self.config.policy.narrative_only,
        }
    }

    #[instrument(level = "debug", skip(self, lesson), fields(id = %lesson.id))]
    pub async fn insert_lesson(&self, lesson: Lesson) {
        if let Some(evicted) = self.lessons.write().await.insert(lesson) {
            debug!(target: "lesson", %evicted, "Evicted oldest served lesson");
        }
    }

    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_lesson(&self, id: &str) -> Option<Lesson> {
        self.lessons.read().await.by_id.get(id).cloned()
    }
}

/// Served lessons kept for answer checks and progress, bounded FIFO.
struct ServedLessons {
    by_id: HashMap<String, Lesson>,
    order: VecDeque<String>,
    cap: usize,
}

impl ServedLessons {
    fn new(cap: usize) -> Self {
        Self { by_id: HashMap::new(), order: VecDeque::new(), cap: cap.max(1) }
    }

    /// Returns the id evicted to make room, if any.
    fn insert(&mut self, lesson: Lesson) -> Option<String> {
        let id = lesson.id.clone();
        if self.by_id.insert(id.clone(), lesson).is_some() {
            return None;
        }
        self.order.push_back(id);
        if self.order.len() <= self.cap {
            return None;
        }
        let oldest = self.order.pop_front()?;
        self.by_id.remove(&oldest);
        Some(oldest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::{LessonRequest, Subject};

    async fn serve_one(state: &AppState) -> String {
        let request = LessonRequest::new("tamil", Subject::Math, "geometry").unwrap();
        let out = state.pipeline().run(&request).await;
        let id = out.lesson.id.clone();
        state.insert_lesson(out.lesson).await;
        id
    }

    #[tokio::test]
    async fn oldest_lesson_is_evicted_past_the_cap() {
        let mut config = TutorConfig::default();
        config.storage.max_lessons = 2;
        let state = AppState::with_parts(config, None);

        let first = serve_one(&state).await;
        let second = serve_one(&state).await;
        let third = serve_one(&state).await;

        assert!(state.get_lesson(&first).await.is_none());
        assert!(state.get_lesson(&second).await.is_some());
        assert!(state.get_lesson(&third).await.is_some());
        assert_eq!(state.lessons.read().await.order.len(), 2);
    }

    #[tokio::test]
    async fn reinserting_a_lesson_does_not_grow_the_queue() {
        let mut config = TutorConfig::default();
        config.storage.max_lessons = 2;
        let state = AppState::with_parts(config, None);

        let id = serve_one(&state).await;
        let again = state.get_lesson(&id).await.unwrap();
        state.insert_lesson(again).await;
        assert_eq!(state.lessons.read().await.order.len(), 1);
    }
}
