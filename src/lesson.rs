//! Lesson assembly: the single place a `Lesson` is built.

use tracing::warn;
use uuid::Uuid;

use crate::domain::{Lesson, LessonRequest, ParsedQuestion, SourceTier};
use crate::subtopics::topic_name;

/// Combine narrative and questions into a lesson with a fresh id.
/// Questions that are not well-formed never reach the learner.
pub fn assemble(request: &LessonRequest, narrative: String, questions: Vec<ParsedQuestion>, tier: SourceTier) -> Lesson {
  let before = questions.len();
  let questions: Vec<ParsedQuestion> = questions.into_iter().filter(ParsedQuestion::is_well_formed).collect();
  if questions.len() != before {
    warn!(target: "lesson", dropped = before - questions.len(), "Dropped malformed questions during assembly");
  }

  Lesson {
    id: Uuid::new_v4().to_string(),
    culture: request.culture().to_string(),
    subject: request.subject(),
    topic: request.topic().to_string(),
    topic_name: topic_name(request.topic()),
    narrative: narrative.trim().to_string(),
    questions,
    source_tier: tier,
  }
}
