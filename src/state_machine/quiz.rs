//! Quiz question parsing, fallback, and grading
//!
//! Generated question JSON is untrusted. [`parse_question`] either yields a
//! fully validated [`MultipleChoice`] or a [`QuestionParseError`]; callers
//! substitute [`fallback_question`] on error.

use super::state::{ChoiceLetter, Grade, MultipleChoice};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionParseError {
    #[error("response is not a JSON object: {0}")]
    NotJson(String),
    #[error("question text is missing or empty")]
    MissingQuestion,
    #[error("expected 4 choices, found {0}")]
    WrongChoiceCount(usize),
    #[error("choice {0} is not a non-empty string")]
    NonStringChoice(usize),
    #[error("correct_letter is missing or not one of A-D")]
    InvalidLetter,
}

/// Remove a surrounding markdown code fence, if present
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Narrow to the outermost `{...}` span when prose surrounds the object
fn object_span(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => text.get(start..=end).unwrap_or(text),
        _ => text,
    }
}

pub fn parse_question(raw: &str) -> Result<MultipleChoice, QuestionParseError> {
    let text = object_span(strip_code_fence(raw));
    let value: Value =
        serde_json::from_str(text).map_err(|e| QuestionParseError::NotJson(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(QuestionParseError::NotJson("top-level value is not an object".to_string()));
    };

    let question = obj
        .get("question")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or(QuestionParseError::MissingQuestion)?;

    let choices = obj
        .get("choices")
        .and_then(Value::as_array)
        .ok_or(QuestionParseError::WrongChoiceCount(0))?;
    if choices.len() != 4 {
        return Err(QuestionParseError::WrongChoiceCount(choices.len()));
    }
    let mut parsed: [String; 4] = Default::default();
    for (i, choice) in choices.iter().enumerate() {
        let text = choice
            .as_str()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(QuestionParseError::NonStringChoice(i))?;
        parsed[i] = text.to_string();
    }

    let correct_letter = obj
        .get("correct_letter")
        .and_then(Value::as_str)
        .and_then(parse_answer)
        .ok_or(QuestionParseError::InvalidLetter)?;

    Ok(MultipleChoice {
        question: question.to_string(),
        choices: parsed,
        correct_letter,
    })
}

/// The deterministic question used whenever generation or parsing fails
pub fn fallback_question() -> MultipleChoice {
    MultipleChoice {
        question: "What is one key point from the summary?".to_string(),
        choices: [
            "A short statement that aligns with the summary".to_string(),
            "An unrelated claim".to_string(),
            "A contradictory claim".to_string(),
            "An extreme or unsafe recommendation".to_string(),
        ],
        correct_letter: ChoiceLetter::A,
    }
}

/// Question text, a blank line, then one lettered line per choice
pub fn format_question(mc: &MultipleChoice) -> String {
    let lines: Vec<String> = ChoiceLetter::ALL
        .iter()
        .map(|letter| format!("{letter}. {}", mc.choice(*letter)))
        .collect();
    format!("{}\n\n{}", mc.question, lines.join("\n"))
}

/// Accepts exactly one letter A-D, case-insensitive, surrounding whitespace ignored
pub fn parse_answer(input: &str) -> Option<ChoiceLetter> {
    let mut chars = input.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => ChoiceLetter::from_char(c),
        _ => None,
    }
}

pub fn grade(mc: &MultipleChoice, answer: ChoiceLetter) -> Grade {
    if answer == mc.correct_letter {
        Grade::Correct
    } else {
        Grade::Incorrect
    }
}

/// Explanation used when the generation service is unavailable
pub fn fallback_explanation(mc: &MultipleChoice, grade: Grade) -> String {
    match grade {
        Grade::Correct => "Excellent! You selected the correct answer. The information from the summary supports this choice.".to_string(),
        Grade::Incorrect => format!(
            "Not quite right. The correct answer was {}: {}. Review the summary for more details.",
            mc.correct_letter,
            mc.correct_choice()
        ),
    }
}
