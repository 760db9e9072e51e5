//! Prompt assembly for the generator: role block, culture language hooks,
//! and the fixed quiz output-format block the parser expects.

use crate::config::Prompts;
use crate::domain::{LessonRequest, Subject};
use crate::subtopics::topic_name;
use crate::util::fill_template;

/// Literal that separates the narrative from the quiz in generator output.
pub const QUESTIONS_MARKER: &str = "Questions:";

/// Expressions a story should weave in for one culture.
pub struct CultureHints {
  pub greeting: &'static str,
  pub excitement: &'static str,
  pub wisdom: &'static str,
  pub encouragement: &'static str,
}

static GENERIC_HINTS: CultureHints = CultureHints {
  greeting: "Hello, friend!",
  excitement: "Wonderful!",
  wisdom: "wisdom of our elders",
  encouragement: "You are doing great!",
};

const CULTURE_HINTS: &[(&str, CultureHints)] = &[
  ("tamil", CultureHints {
    greeting: "வணக்கம்! (Vanakkam!)",
    excitement: "அருமை! (Arumai!)",
    wisdom: "ஞானம் (Gnanam)",
    encouragement: "நன்றாக செய்கிறாய்! (Nandraga seykiray!)",
  }),
  ("hindi", CultureHints {
    greeting: "नमस्ते! (Namaste!)",
    excitement: "बहुत बढ़िया! (Bahut badhiya!)",
    wisdom: "ज्ञान (Gyan)",
    encouragement: "बहुत अच्छा! (Bahut accha!)",
  }),
  ("bengali", CultureHints {
    greeting: "নমস্কার! (Nomoskar!)",
    excitement: "খুব ভালো! (Khub bhalo!)",
    wisdom: "জ্ঞান (Gyan)",
    encouragement: "অসাধারণ! (Osadharon!)",
  }),
  ("telugu", CultureHints {
    greeting: "నమస్కారం! (Namaskaram!)",
    excitement: "చాలా బాగుంది! (Chala bagundi!)",
    wisdom: "జ్ఞానం (Gnanam)",
    encouragement: "చాలా మంచిది! (Chala manchidi!)",
  }),
  ("marathi", CultureHints {
    greeting: "नमस्कार! (Namaskar!)",
    excitement: "खूप छान! (Khoop chaan!)",
    wisdom: "ज्ञान (Gyan)",
    encouragement: "अतिशय चांगले! (Atishay changle!)",
  }),
  ("kannada", CultureHints {
    greeting: "ನಮಸ್ಕಾರ! (Namaskara!)",
    excitement: "ಚೆನ್ನಾಗಿದೆ! (Chennagide!)",
    wisdom: "ಜ್ಞಾನ (Gnyana)",
    encouragement: "ಅತ್ಯುತ್ತಮ! (Atyuttama!)",
  }),
  ("gujarati", CultureHints {
    greeting: "નમસ્તે! (Namaste!)",
    excitement: "ખૂબ સરસ! (Khoob saras!)",
    wisdom: "જ્ઞાન (Gyan)",
    encouragement: "બહુ સરસ! (Bahu saras!)",
  }),
  ("punjabi", CultureHints {
    greeting: "ਸਤ ਸ੍ਰੀ ਅਕਾਲ! (Sat Sri Akal!)",
    excitement: "ਬਹੁਤ ਵਧੀਆ! (Bahut vadhia!)",
    wisdom: "ਗਿਆਨ (Gyan)",
    encouragement: "ਬਹੁਤ ਚੰਗਾ! (Bahut changa!)",
  }),
  ("malayalam", CultureHints {
    greeting: "നമസ്കാരം! (Namaskaram!)",
    excitement: "വളരെ നല്ലത്! (Valare nallath!)",
    wisdom: "ജ്ഞാനം (Gnanam)",
    encouragement: "അതിശയം! (Athishayam!)",
  }),
  ("odia", CultureHints {
    greeting: "ନମସ୍କାର! (Namaskar!)",
    excitement: "ବହୁତ ଭଲ! (Bahut bhala!)",
    wisdom: "ଜ୍ଞାନ (Gyan)",
    encouragement: "ଅତି ଭଲ! (Ati bhala!)",
  }),
];

/// Case-insensitive lookup; unknown cultures get the generic set.
pub fn culture_hints(culture: &str) -> &'static CultureHints {
  CULTURE_HINTS
    .iter()
    .find(|(key, _)| key.eq_ignore_ascii_case(culture))
    .map(|(_, hints)| hints)
    .unwrap_or(&GENERIC_HINTS)
}

const FORMAT_BLOCK: &str = r#"After the story, create 3 simple multiple choice questions (MCQs) that test understanding. Format the questions exactly like this:

Questions:
1. [Simple question text]
A) [Option A]
B) [Option B]
C) [Option C]
D) [Option D]
Correct Answer: [A/B/C/D]

2. [Simple question text]
A) [Option A]
B) [Option B]
C) [Option C]
D) [Option D]
Correct Answer: [A/B/C/D]

3. [Simple question text]
A) [Option A]
B) [Option B]
C) [Option C]
D) [Option D]
Correct Answer: [A/B/C/D]

Make the questions simple and relevant to the story content. Write everything in English."#;

fn hooks_block(culture: &str) -> String {
  let h = culture_hints(culture);
  format!(
    "Cultural Language Hooks (use these expressions naturally):\n- Use \"{}\" for greetings\n- Use \"{}\" for excitement\n- Use \"{}\" for wisdom\n- Use \"{}\" for encouragement",
    h.greeting, h.excitement, h.wisdom, h.encouragement
  )
}

fn role_block(tpl: &str, request: &LessonRequest) -> String {
  let name = topic_name(request.topic());
  fill_template(
    tpl,
    &[("culture", request.culture()), ("subject", request.subject().as_str()), ("topic_name", &name)],
  )
}

/// Lesson prompt: role block, culture hooks, optional math note, quiz format.
pub fn build_prompt(prompts: &Prompts, request: &LessonRequest) -> String {
  let mut sections = vec![role_block(&prompts.story_role, request), hooks_block(request.culture())];
  if request.subject() == Subject::Math {
    sections.push(
      "IMPORTANT: If this involves mathematical concepts, include the proper formulas in a clear, easy-to-understand format. For example: \"The area of a circle = π × radius²\"".into(),
    );
  }
  sections.push(FORMAT_BLOCK.to_string());
  sections.join("\n\n")
}

/// Chat prompt for a learner's free-form question about the current topic.
pub fn build_tutor_prompt(prompts: &Prompts, request: &LessonRequest, message: &str) -> String {
  let mut sections = vec![role_block(&prompts.tutor_role, request), hooks_block(request.culture())];
  if request.subject() == Subject::Math {
    sections.push(
      "IMPORTANT: If explaining mathematical concepts, use clear formulas and simple examples. For example: \"To find the area of a rectangle, multiply length × width!\"".into(),
    );
  }
  sections.push(format!("The student asked: \"{}\"", message.trim()));
  sections.push(format!(
    "Respond in a fun, educational way that helps them understand {} better through a {} cultural lens. Write in English only.",
    topic_name(request.topic()),
    request.culture()
  ));
  sections.join("\n\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn req(culture: &str, subject: Subject, topic: &str) -> LessonRequest {
    LessonRequest::new(culture, subject, topic).unwrap()
  }

  #[test]
  fn prompt_is_deterministic() {
    let p = Prompts::default();
    let r = req("tamil", Subject::Math, "algebra_basics");
    assert_eq!(build_prompt(&p, &r), build_prompt(&p, &r));
  }

  #[test]
  fn prompt_carries_culture_topic_and_format_contract() {
    let p = build_prompt(&Prompts::default(), &req("Tamil", Subject::Math, "algebra_basics"));
    assert!(p.contains("Algebra Basics"));
    assert!(p.contains("Vanakkam"));
    assert!(p.contains(QUESTIONS_MARKER));
    assert!(p.contains("Correct Answer: [A/B/C/D]"));
    assert!(p.contains("π × radius²"));
  }

  #[test]
  fn unknown_culture_uses_generic_hints() {
    let p = build_prompt(&Prompts::default(), &req("maori", Subject::History, "world_wars"));
    assert!(p.contains(GENERIC_HINTS.greeting));
    assert!(!p.contains("π × radius²"));
  }

  #[test]
  fn tutor_prompt_quotes_the_question() {
    let p = build_tutor_prompt(&Prompts::default(), &req("hindi", Subject::Science, "light_and_sound"), " why is the sky blue? ");
    assert!(p.contains("The student asked: \"why is the sky blue?\""));
    assert!(p.contains("Namaste"));
    assert!(!p.contains(QUESTIONS_MARKER));
  }
}
