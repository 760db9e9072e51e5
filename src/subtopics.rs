//! Topic taxonomy: which subtopics exist per subject and school level, and
//! their human-readable names.

use crate::domain::Subject;
use crate::util::title_case_slug;

pub const LEVELS: [&str; 3] = ["elementary", "middle school", "high school"];

const MATH: [&[&str]; 3] = [
  &["addition_and_subtraction", "multiplication_and_division", "fractions", "decimals",
    "basic_geometry", "measurement", "time_and_money", "patterns_and_sequences"],
  &["algebra_basics", "geometry", "fractions_and_decimals", "percentages",
    "ratios_and_proportions", "data_and_statistics", "basic_trigonometry", "number_systems"],
  &["advanced_algebra", "calculus_basics", "trigonometry", "probability_and_statistics",
    "coordinate_geometry", "mathematical_modeling", "number_theory", "linear_programming"],
];

const SCIENCE: [&[&str]; 3] = [
  &["plants_and_animals", "weather_and_climate", "simple_machines", "matter_and_energy",
    "earth_and_space", "human_body", "ecosystems", "forces_and_motion"],
  &["chemistry_basics", "physics_fundamentals", "biology_cells", "earth_science",
    "energy_and_heat", "light_and_sound", "genetics_basics", "environmental_science"],
  &["organic_chemistry", "advanced_physics", "molecular_biology", "astronomy",
    "thermodynamics", "electromagnetism", "evolution", "biotechnology"],
];

const HISTORY: [&[&str]; 3] = [
  &["ancient_civilizations", "medieval_periods", "exploration_and_discovery", "independence_movements",
    "world_wars", "cultural_heritage", "famous_leaders", "important_events"],
  &["ancient_india", "medieval_india", "colonial_period", "freedom_struggle",
    "world_history", "cultural_evolution", "social_movements", "economic_history"],
  &["ancient_civilizations", "medieval_history", "modern_history", "independence_movements",
    "world_wars", "cold_war", "globalization", "contemporary_issues"],
];

const LITERATURE: [&[&str]; 3] = [
  &["folk_tales", "poetry_basics", "story_elements", "character_development",
    "reading_comprehension", "creative_writing", "cultural_stories", "moral_tales"],
  &["classical_literature", "poetry_analysis", "drama_and_theater", "short_stories",
    "literary_devices", "cultural_poetry", "biographies", "essay_writing"],
  &["world_literature", "advanced_poetry", "drama_analysis", "novel_study",
    "literary_criticism", "creative_writing", "cultural_texts", "modern_literature"],
];

// Only names that differ from the title-cased key need an entry.
const CURATED_NAMES: &[(&str, &str)] = &[
  ("biology_cells", "Biology - Cells"),
];

/// Subtopic keys for a subject at a level. Unknown level yields an empty list.
pub fn subtopics(subject: Subject, level: &str) -> &'static [&'static str] {
  let Some(idx) = LEVELS.iter().position(|l| l.eq_ignore_ascii_case(level.trim())) else {
    return &[];
  };
  let table = match subject {
    Subject::Math => &MATH,
    Subject::Science => &SCIENCE,
    Subject::History => &HISTORY,
    Subject::Literature => &LITERATURE,
  };
  table[idx]
}

/// True if `topic` is a taxonomy key under any level of any subject.
pub fn is_known_topic(topic: &str) -> bool {
  Subject::ALL
    .iter()
    .any(|s| LEVELS.iter().any(|l| subtopics(*s, l).contains(&topic)))
}

/// Human-readable name for a topic key. Free-text topics are returned unchanged.
pub fn topic_name(topic: &str) -> String {
  if let Some((_, name)) = CURATED_NAMES.iter().find(|(k, _)| *k == topic) {
    return (*name).to_string();
  }
  let looks_like_slug = !topic.is_empty()
    && !topic.contains(' ')
    && topic.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
  if is_known_topic(topic) || looks_like_slug {
    title_case_slug(topic)
  } else {
    topic.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lists_subtopics_per_level() {
    let keys = subtopics(Subject::Math, "middle school");
    assert_eq!(keys.len(), 8);
    assert!(keys.contains(&"algebra_basics"));
    assert!(subtopics(Subject::History, "university").is_empty());
  }

  #[test]
  fn names_known_and_custom_topics() {
    assert_eq!(topic_name("algebra_basics"), "Algebra Basics");
    assert_eq!(topic_name("biology_cells"), "Biology - Cells");
    assert_eq!(topic_name("medieval_history"), "Medieval History");
    assert_eq!(topic_name("Why do kites fly?"), "Why do kites fly?");
  }
}
