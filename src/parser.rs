//! Generator output → narrative + validated quiz questions.
//!
//! Expected shape (see `prompt::build_prompt`):
//!
//! ```text
//! <narrative>
//! Questions:
//! 1. <question>
//! A) <option>
//! B) <option>
//! C) <option>
//! D) <option>
//! Correct Answer: <A-D>
//! ```
//!
//! Malformed question blocks are dropped; the parse only fails when a quiz
//! section is present and nothing in it survives validation.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::domain::{letter_to_index, ParsedQuestion};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
  #[error("quiz section present but none of its {blocks} question blocks are well-formed")]
  NoValidQuestions { blocks: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseOutcome {
  /// Every question block was valid.
  Complete,
  /// Some blocks were dropped.
  Partial,
  /// No quiz section (marker missing or nothing after it).
  NarrativeOnly,
}

#[derive(Clone, Debug)]
pub struct ParsedResponse {
  pub narrative: String,
  pub questions: Vec<ParsedQuestion>,
  pub dropped_blocks: usize,
  pub outcome: ParseOutcome,
}

impl ParsedResponse {
  fn narrative_only(narrative: &str) -> Self {
    Self { narrative: narrative.to_string(), questions: Vec::new(), dropped_blocks: 0, outcome: ParseOutcome::NarrativeOnly }
  }
}

/// The `Questions:` marker, with any bold/heading markup around it.
fn marker_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"[*#_]*[ \t]*Questions[*_]*[ \t]*:[*_]*").expect("valid regex"))
}

fn block_start_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*[*#]*[ \t]*\d+\.[ \t]*").expect("valid regex"))
}

fn option_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"^[ \t]*\**([A-D])\)[ \t]*(.*)$").expect("valid regex"))
}

fn answer_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"(?i)correct\s+answer\**\s*:?\s*\**\s*\(?([A-D])\b").expect("valid regex"))
}

fn clean(s: &str) -> String {
  s.trim().trim_matches('*').trim().to_string()
}

/// Split generator output into narrative and questions at the first marker.
pub fn parse_response(raw: &str) -> Result<ParsedResponse, ParseError> {
  let Some(marker) = marker_re().find(raw) else {
    return Ok(ParsedResponse::narrative_only(raw.trim_end()));
  };
  let narrative = raw[..marker.start()].trim_end();
  let quiz = &raw[marker.end()..];
  if quiz.trim().is_empty() {
    return Ok(ParsedResponse::narrative_only(narrative));
  }

  let blocks = split_blocks(quiz);
  let questions: Vec<ParsedQuestion> = blocks
    .iter()
    .enumerate()
    .filter_map(|(i, block)| parse_block(i + 1, block))
    .collect();

  if questions.is_empty() {
    return Err(ParseError::NoValidQuestions { blocks: blocks.len() });
  }

  let dropped_blocks = blocks.len() - questions.len();
  Ok(ParsedResponse {
    narrative: narrative.to_string(),
    questions,
    dropped_blocks,
    outcome: if dropped_blocks == 0 { ParseOutcome::Complete } else { ParseOutcome::Partial },
  })
}

/// One slice per numbered line, running up to the next numbered line.
/// Text before the first numbered line is ignored.
fn split_blocks(quiz: &str) -> Vec<&str> {
  let starts: Vec<(usize, usize)> = block_start_re().find_iter(quiz).map(|m| (m.start(), m.end())).collect();
  starts
    .iter()
    .enumerate()
    .map(|(i, &(_, body_start))| {
      let end = starts.get(i + 1).map(|&(next, _)| next).unwrap_or(quiz.len());
      &quiz[body_start..end]
    })
    .collect()
}

fn parse_block(position: usize, block: &str) -> Option<ParsedQuestion> {
  let mut lines = block.lines().map(str::trim).filter(|l| !l.is_empty());

  let first = lines.next()?;
  if option_re().is_match(first) || answer_re().is_match(first) {
    return None;
  }
  let question_text = clean(first);
  if question_text.is_empty() {
    return None;
  }

  let mut letters = Vec::with_capacity(ParsedQuestion::OPTION_COUNT);
  let mut options = Vec::with_capacity(ParsedQuestion::OPTION_COUNT);
  let mut answer = None;
  for line in lines {
    if let Some(caps) = option_re().captures(line) {
      letters.push(caps[1].chars().next()?);
      options.push(clean(&caps[2]));
    } else if answer.is_none() {
      answer = answer_re()
        .captures(line)
        .and_then(|caps| caps[1].chars().next())
        .and_then(letter_to_index);
    }
  }

  let in_order = letters == ['A', 'B', 'C', 'D'];
  if !in_order || options.iter().any(|o| o.is_empty()) {
    return None;
  }
  let correct_option_index = answer?;

  Some(ParsedQuestion {
    id: format!("q{}", position),
    explanation: format!("This question tests your understanding of {}", question_text.to_lowercase()),
    question_text,
    options,
    correct_option_index,
  })
}
