//! Canned content that keeps the app useful without the generator:
//! fallback lessons, offline tutor replies, and answer feedback.
//!
//! Lookup order for a lesson, most specific first:
//!   1. configured bank entry for (culture, subject, topic)
//!   2. configured bank entry for (any culture, subject, topic)
//!   3. built-in narrative template for (subject, topic)
//!   4. generic template built from the topic's readable name
//!
//! Every path yields exactly 3 well-formed questions.

use std::collections::HashMap;

use tracing::{debug, error, info, instrument};

use crate::config::LessonCfg;
use crate::domain::{letter_to_index, Lesson, LessonRequest, ParsedQuestion, SourceTier, Subject};
use crate::lesson::assemble;
use crate::subtopics::topic_name;
use crate::util::fill_template;

pub const FALLBACK_QUESTION_COUNT: usize = 3;

const BUILTIN_NARRATIVES: &[(Subject, &str, &str)] = &[
  (Subject::Math, "algebra_basics", "In {culture} culture, algebra is more than just solving equations. It's a way of understanding patterns and relationships that our ancestors discovered through careful observation. When our {culture} grandmothers create traditional patterns, they're using algebraic thinking to create beautiful designs. The mathematical precision in our cultural art forms shows how {culture} people have always been brilliant mathematicians."),
  (Subject::Math, "geometry", "Geometry in {culture} culture is everywhere you look! From the sacred geometry of our temples to the geometric patterns in our traditional art, {culture} ancestors understood the mathematical principles that create beauty and harmony. Our traditional crafts use geometric precision to create objects of both function and beauty."),
  (Subject::Math, "fractions", "Fractions in {culture} culture are about sharing and community. In our traditional celebrations, we often need to divide things equally among family members. Our ancestors used this understanding in cooking, farming, and even in temple rituals where offerings needed to be divided fairly."),
  (Subject::Science, "energy_and_heat", "Energy and heat in {culture} culture are part of our daily lives and traditions. When we cook traditional {culture} dishes, we're witnessing energy and heat in action! The fire from our traditional stoves transfers heat energy to the cooking pot, making the water molecules move faster and creating steam that cooks our food."),
  (Subject::Science, "plants_and_animals", "Plants and animals in {culture} culture are deeply connected to our farming traditions and respect for nature. Our ancestors were master biologists who understood the life cycles of plants and animals through generations of careful observation. In {culture} farming, we learn how seeds grow into plants, how plants produce food, and how animals interact with their environment."),
  (Subject::Science, "matter_and_energy", "Matter and energy in {culture} culture show up in our daily rituals and celebrations. Think about how butter melts in the sun during our festivals, or how water turns to steam when we cook traditional dishes. These are all examples of matter changing states due to energy, something our ancestors understood and used every day."),
  (Subject::History, "ancient_civilizations", "Ancient {culture} civilization was incredibly advanced, with deep knowledge of mathematics, science, art, and philosophy. Our ancestors built magnificent temples, created beautiful art, and developed complex social systems. By studying ancient civilizations, we learn how our cultural values and traditions grew over thousands of years."),
  (Subject::History, "freedom_struggle", "The freedom struggle in {culture} culture is a story of courage, sacrifice, and the fight to keep our cultural identity. Our ancestors didn't just fight for political freedom. They fought for the right to speak our language, practice our traditions, and preserve our heritage."),
  (Subject::History, "cultural_heritage", "Our {culture} cultural heritage is a treasure trove of wisdom, art, and traditions passed down through generations. Every part of our heritage, from traditional crafts to classical literature and from festival celebrations to daily rituals, tells a story about who we are and where we come from."),
  (Subject::Literature, "poetry_basics", "Poetry in {culture} culture is more than just words; it's the heartbeat of our cultural expression. Our traditional poetry carries the wisdom, emotions, and stories of our ancestors. {culture} poetry teaches us about rhythm, metaphor, and the power of language to carry deep meaning."),
  (Subject::Literature, "folk_tales", "Folk tales in {culture} culture are windows into our cultural soul, carrying the wisdom, values, and imagination of our ancestors. These stories aren't just entertainment. They are teaching tools that have taught generations about kindness, courage, and life lessons."),
  (Subject::Literature, "cultural_stories", "Cultural stories in {culture} culture are the threads that weave together our community's identity and experiences. These stories reflect our cultural practices, celebrate our traditions, and keep the wisdom of our ancestors alive."),
];

const GENERIC_NARRATIVE: &str = "In {culture} culture, {topic_name} is deeply connected to our traditions and daily life. Our ancestors understood these principles through generations of observation and practice, applying them in ways that preserved our cultural heritage while solving practical problems. This wisdom continues to inspire and guide us today.";

/// (question, options, correct index, explanation). Placeholders: {culture}, {subject}, {topic_name}.
const GENERIC_QUESTIONS: [(&str, [&str; 4], usize, &str); FALLBACK_QUESTION_COUNT] = [
  (
    "What is the main concept of {topic_name} in {culture} culture?",
    ["Traditional {topic_name} practices", "Modern {topic_name} applications", "Cultural significance of {topic_name}", "All of the above"],
    3,
    "This question tests your understanding of how {topic_name} relates to {culture} culture.",
  ),
  (
    "How does {topic_name} connect to {subject} principles?",
    ["Through scientific methods", "Through cultural traditions", "Through practical applications", "Through historical context"],
    2,
    "This question explores the practical applications of {topic_name} in {subject}.",
  ),
  (
    "What makes {topic_name} culturally significant in {culture} traditions?",
    ["Its historical importance", "Its modern relevance", "Its educational value", "All of the above"],
    3,
    "This question examines the cultural significance of {topic_name} in {culture} context.",
  ),
];

#[derive(Clone, Debug)]
struct QuestionTpl {
  text: String,
  options: Vec<String>,
  correct: usize,
  explanation: String,
}

#[derive(Clone, Debug)]
struct BankEntry {
  narrative: String,
  questions: Vec<QuestionTpl>,
}

/// Which catalog layer served a request. Logged, never shown to the learner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogSource {
  Bank,
  Builtin,
  Generic,
}

type BankKey = (Option<String>, Subject, String);

/// Read-only after construction; safe to share without locking.
#[derive(Clone, Debug, Default)]
pub struct FallbackCatalog {
  bank: HashMap<BankKey, BankEntry>,
}

impl FallbackCatalog {
  /// Build from configured bank entries. Entries that would break the
  /// 3-questions / 4-options guarantee are skipped.
  #[instrument(level = "info", skip_all, fields(entries = entries.len()))]
  pub fn from_config(entries: &[LessonCfg]) -> Self {
    let mut bank = HashMap::new();
    for cfg in entries {
      match validate_entry(cfg) {
        Ok(entry) => {
          let culture = cfg.culture.as_ref().map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty());
          bank.insert((culture, cfg.subject, cfg.topic.trim().to_string()), entry);
        }
        Err(reason) => {
          error!(target: "lesson", subject = %cfg.subject, topic = %cfg.topic, %reason, "Skipping bank lesson");
        }
      }
    }
    info!(target: "lesson", bank = bank.len(), builtin = BUILTIN_NARRATIVES.len(), "Fallback catalog ready");
    Self { bank }
  }

  fn bank_entry(&self, request: &LessonRequest) -> Option<&BankEntry> {
    let culture = request.culture().to_lowercase();
    let topic = request.topic().to_string();
    self.bank
      .get(&(Some(culture), request.subject(), topic.clone()))
      .or_else(|| self.bank.get(&(None, request.subject(), topic)))
  }

  /// Canned lesson for the request. Never fails.
  #[instrument(level = "info", skip(self), fields(culture = %request.culture(), subject = %request.subject(), topic = %request.topic()))]
  pub fn resolve(&self, request: &LessonRequest) -> Lesson {
    let (narrative, questions, source) = self.lookup(request);
    debug!(target: "lesson", ?source, "Fallback lesson resolved");
    assemble(request, narrative, questions, SourceTier::Fallback)
  }

  /// Questions only, for a generated narrative that came without a quiz.
  pub fn fallback_questions(&self, request: &LessonRequest) -> Vec<ParsedQuestion> {
    self.lookup(request).1
  }

  fn lookup(&self, request: &LessonRequest) -> (String, Vec<ParsedQuestion>, CatalogSource) {
    let name = topic_name(request.topic());
    let pairs = [("culture", request.culture()), ("subject", request.subject().as_str()), ("topic_name", name.as_str())];

    if let Some(entry) = self.bank_entry(request) {
      let questions = entry.questions.iter().enumerate().map(|(i, q)| render_question(i, q, &pairs)).collect();
      return (fill_template(&entry.narrative, &pairs), questions, CatalogSource::Bank);
    }

    let questions = GENERIC_QUESTIONS
      .iter()
      .enumerate()
      .map(|(i, (text, options, correct, explanation))| {
        let tpl = QuestionTpl {
          text: (*text).to_string(),
          options: options.iter().map(|o| (*o).to_string()).collect(),
          correct: *correct,
          explanation: (*explanation).to_string(),
        };
        render_question(i, &tpl, &pairs)
      })
      .collect();

    match BUILTIN_NARRATIVES.iter().find(|(s, t, _)| *s == request.subject() && *t == request.topic()) {
      Some((_, _, tpl)) => (fill_template(tpl, &pairs), questions, CatalogSource::Builtin),
      None => (fill_template(GENERIC_NARRATIVE, &pairs), questions, CatalogSource::Generic),
    }
  }
}

fn render_question(i: usize, q: &QuestionTpl, pairs: &[(&str, &str)]) -> ParsedQuestion {
  ParsedQuestion {
    id: format!("q{}", i + 1),
    question_text: fill_template(&q.text, pairs),
    options: q.options.iter().map(|o| fill_template(o, pairs)).collect(),
    correct_option_index: q.correct,
    explanation: fill_template(&q.explanation, pairs),
  }
}

fn validate_entry(cfg: &LessonCfg) -> Result<BankEntry, String> {
  if cfg.narrative.trim().is_empty() {
    return Err("empty narrative".into());
  }
  if cfg.topic.trim().is_empty() {
    return Err("empty topic".into());
  }
  if cfg.questions.len() != FALLBACK_QUESTION_COUNT {
    return Err(format!("expected {} questions, found {}", FALLBACK_QUESTION_COUNT, cfg.questions.len()));
  }
  let mut questions = Vec::with_capacity(FALLBACK_QUESTION_COUNT);
  for (i, q) in cfg.questions.iter().enumerate() {
    if q.question.trim().is_empty() {
      return Err(format!("question {} has no text", i + 1));
    }
    if q.options.len() != ParsedQuestion::OPTION_COUNT || q.options.iter().any(|o| o.trim().is_empty()) {
      return Err(format!("question {} needs exactly 4 non-empty options", i + 1));
    }
    let mut letters = q.answer.trim().chars();
    let correct = match (letters.next(), letters.next()) {
      (Some(l), None) => letter_to_index(l),
      _ => None,
    }
    .ok_or_else(|| format!("question {} has invalid answer {:?}", i + 1, q.answer))?;
    questions.push(QuestionTpl {
      text: q.question.trim().to_string(),
      options: q.options.iter().map(|o| o.trim().to_string()).collect(),
      correct,
      explanation: q
        .explanation
        .clone()
        .unwrap_or_else(|| "This question tests your understanding of {topic_name}.".into()),
    });
  }
  Ok(BankEntry { narrative: cfg.narrative.clone(), questions })
}

fn mentions(message: &str, keys: &[&str]) -> bool {
  keys.iter().any(|k| message.contains(k))
}

/// Offline tutor reply, picked by what the learner seems to be asking for.
pub fn tutor_fallback_reply(request: &LessonRequest, message: &str) -> String {
  let name = topic_name(request.topic());
  let culture = request.culture();
  let subject = request.subject().as_str();
  let m = message.to_lowercase();

  if mentions(&m, &["connection", "relate", "culture"]) {
    format!(
      "Great question about the connection to {culture} culture! {name} is woven into our {culture} traditions and daily life. \
Our ancestors used these ideas in cooking, farming, and festivals long before they were written in textbooks. \
Learning {name} through {culture} culture connects big ideas to real experiences. Keep asking questions, that's how we learn and grow!"
    )
  } else if mentions(&m, &["what can you do", "help", "assist"]) {
    format!(
      "I'm your {culture} cultural learning assistant, and I can help you with {name}! \
I can explain ideas in simple words using examples from {culture} traditions, show how {name} appears in festivals and daily life, \
and share wisdom passed down through generations. What part of {name} would you like to explore today?"
    )
  } else if mentions(&m, &["explain", "simpler", "understand"]) {
    format!(
      "Let me explain {name} in simpler terms! Think of it like learning a traditional {culture} recipe: \
you need to know the ingredients, the measurements, and the steps. {name} gives us the building blocks of {subject} in the same way. \
Start with what you already know from your {culture} traditions and build from there. Which part should I explain further?"
    )
  } else if mentions(&m, &["example", "real world", "daily life"]) {
    format!(
      "Here are some real-world examples of {name} in {culture} culture! In traditional cooking we use heat to transform ingredients. \
Farmers use their knowledge to choose the best time for planting. In festivals, the lamps we light and the patterns we draw all show these ideas at work. \
{name} isn't just textbook knowledge, it's part of our {culture} heritage!"
    )
  } else {
    format!(
      "That's a great question about {name} in {culture} culture! {name} is a way of understanding the world that our {culture} ancestors \
practiced for generations, in cooking, art, and celebrations. Could you tell me more about what you'd like to know? I'd love to help you explore it further!"
    )
  }
}

/// Feedback for a checked answer.
pub fn answer_feedback(lesson: &Lesson, correct: bool) -> String {
  if correct {
    format!("Great job! Your {} answer reflects {} traditions!", lesson.topic_name, lesson.culture)
  } else {
    format!("Try again! Review {} in {} context.", lesson.topic_name, lesson.culture)
  }
}
