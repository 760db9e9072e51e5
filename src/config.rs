//! Loading tutor configuration (generation settings, prompts, policy, and an
//! optional lesson bank) from TOML.
//!
//! Every section is optional; see `TutorConfig` for the expected schema.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Subject;
use crate::gemini::CallSettings;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TutorConfig {
  #[serde(default)]
  pub generation: GenerationSettings,
  #[serde(default)]
  pub chat: ChatSettings,
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub policy: Policy,
  #[serde(default)]
  pub storage: StorageSettings,
  #[serde(default)]
  pub lessons: Vec<LessonCfg>,
}

/// Lesson generation call. The timeout applies to every generator call site.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
  pub timeout_secs: u64,
  pub min_response_chars: usize,
  pub max_output_tokens: u32,
  pub temperature: f32,
  pub top_p: f32,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self { timeout_secs: 15, min_response_chars: 100, max_output_tokens: 800, temperature: 0.8, top_p: 0.9 }
  }
}

impl GenerationSettings {
  pub fn call_settings(&self) -> CallSettings {
    CallSettings {
      timeout: Duration::from_secs(self.timeout_secs),
      min_response_chars: self.min_response_chars,
      max_output_tokens: self.max_output_tokens,
      temperature: self.temperature,
      top_p: self.top_p,
    }
  }
}

/// Tutor chat call. Shorter answers are acceptable here.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
  pub min_response_chars: usize,
  pub max_output_tokens: u32,
  pub temperature: f32,
  pub top_p: f32,
}

impl Default for ChatSettings {
  fn default() -> Self {
    Self { min_response_chars: 50, max_output_tokens: 600, temperature: 0.7, top_p: 0.9 }
  }
}

impl ChatSettings {
  /// Chat shares the lesson call's timeout budget.
  pub fn call_settings(&self, generation: &GenerationSettings) -> CallSettings {
    CallSettings {
      timeout: Duration::from_secs(generation.timeout_secs),
      min_response_chars: self.min_response_chars,
      max_output_tokens: self.max_output_tokens,
      temperature: self.temperature,
      top_p: self.top_p,
    }
  }
}

/// Role/style blocks sent to the generator. Placeholders: {culture}, {subject}, {topic_name}.
/// The quiz output-format block is not configurable; the parser depends on it.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub story_role: String,
  pub tutor_role: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      story_role: "You are a fun and engaging cultural storytelling tutor for children. Create a short, exciting educational story about {topic_name} from {culture} cultural perspective.\n\nRequirements:\n- Write the story in ENGLISH only\n- Make it FUN and ENGAGING for children (ages 8-15)\n- Keep it SHORT (2-3 paragraphs maximum)\n- Use simple, clear language that children can understand\n- Include cultural elements from {culture} traditions\n- Focus on {subject} concepts through {culture} cultural lens\n- Use vivid descriptions and child-friendly examples".into(),
      tutor_role: "You are a friendly and encouraging cultural storytelling tutor for children (ages 8-15). The student is learning about {topic_name} from a {culture} cultural perspective.\n\nGuidelines:\n- Be EXCITING and ENCOURAGING!\n- Keep responses SHORT and EASY to understand\n- Connect everything to {culture} culture and traditions\n- Be patient and supportive, learning is a journey\n- Use examples that children can relate to".into(),
    }
  }
}

/// What to do when the generator returns a narrative but no quiz section.
#[derive(Clone, Copy, Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeOnlyPolicy {
  /// Keep the generated narrative, take the questions from the catalog.
  #[default]
  Supplement,
  /// Discard the narrative and serve a full fallback lesson.
  Fallback,
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct Policy {
  pub narrative_only: NarrativeOnlyPolicy,
}

/// In-memory retention. Served lessons past `max_lessons` are evicted oldest first.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
  pub max_lessons: usize,
}

impl Default for StorageSettings {
  fn default() -> Self {
    Self { max_lessons: 1000 }
  }
}

/// Lesson bank entry accepted in TOML configuration.
/// `culture` omitted means the entry serves every culture.
#[derive(Clone, Debug, Deserialize)]
pub struct LessonCfg {
  #[serde(default)] pub culture: Option<String>,
  pub subject: Subject,
  pub topic: String,
  pub narrative: String,
  #[serde(default)] pub questions: Vec<QuestionCfg>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
  pub question: String,
  pub options: Vec<String>,
  /// Answer letter, "A".."D".
  pub answer: String,
  #[serde(default)] pub explanation: Option<String>,
}

pub fn parse_config(s: &str) -> Result<TutorConfig, toml::de::Error> {
  toml::from_str::<TutorConfig>(s)
}

/// Attempt to load `TutorConfig` from TUTOR_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<TutorConfig> {
  let path = std::env::var("TUTOR_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "tutor_backend", %path, lessons = cfg.lessons.len(), "Loaded tutor config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "tutor_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "tutor_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
