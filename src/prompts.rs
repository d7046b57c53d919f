//! Instructions and prompts for the three generation calls
//!
//! Summary, quiz question, and answer explanation each get a fixed system
//! instruction and a user prompt assembled from conversation state.

use crate::state_machine::state::{ChoiceLetter, Grade, SearchResult};
use std::fmt::Write;

/// Per-source content budget in the summary prompt, in characters
pub const SOURCE_CONTENT_LIMIT: usize = 1500;

/// Role statement recorded at the start of every session transcript
pub const ROLE_STATEMENT: &str = "You are a medical education assistant helping patients learn about health topics. Your role is to:
1. Search for up-to-date medical information from trusted sources
2. Create patient-friendly summaries with citations
3. Generate comprehension questions to test understanding
4. Provide educational feedback with explanations
5. Guide patients through the learning process

Always be accurate, educational, and encouraging. Never give medical advice.";

pub const SUMMARY_SYSTEM: &str = "You are a careful medical educator. Write at a 7th–9th grade reading level. Include citations as [1], [2], etc. referencing the sources list order.";

pub const QUESTION_SYSTEM: &str =
    "Generate a single multiple-choice question that tests understanding of the medical information provided.";

pub const EXPLANATION_SYSTEM: &str =
    "You are a medical educator providing feedback on a student's answer. Be encouraging and educational.";

/// Numbered source list, in citation order
pub fn sources_block(sources: &[SearchResult]) -> String {
    let mut out = String::new();
    for (i, source) in sources.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        let content: String = source.content.chars().take(SOURCE_CONTENT_LIMIT).collect();
        let _ = write!(
            out,
            "Source {}: {} — {}\n{}",
            i + 1,
            source.title.trim(),
            source.url.trim(),
            content
        );
    }
    out
}

pub fn summary_prompt(topic: &str, sources: &[SearchResult]) -> String {
    format!(
        "Summarize the most relevant, evidence-based information for a patient about the topic: '{topic}'.
- Be accurate and neutral; avoid giving medical advice.
- Use short paragraphs and clear language.
- Add a 'Key Points' section at the end.
- Include in-text citation markers like [1], [2] that map to the sources list order.
- Keep the summary comprehensive but readable (aim for 300-500 words).

Sources (ordered):
{}
",
        sources_block(sources)
    )
}

pub fn question_prompt(topic: &str, summary: &str) -> String {
    format!(
        "Based on the following educational summary about '{topic}', create ONE multiple-choice question with 4 choices (A-D) and mark the correct answer.
The question should test understanding of key concepts from the summary.
Return strict JSON with keys: question, choices (list of 4 strings), correct_letter (A-D).
Make sure the question is clear and the choices are plausible but only one is correct.

Summary:
{summary}"
    )
}

pub fn explanation_prompt(
    user_answer: ChoiceLetter,
    correct_letter: ChoiceLetter,
    correct_answer: &str,
    grade: Grade,
    summary: &str,
) -> String {
    let grade = match grade {
        Grade::Correct => "Correct",
        Grade::Incorrect => "Incorrect",
    };
    format!(
        "Student selected: {user_answer}
Correct answer: {correct_letter} ({correct_answer})
Grade: {grade}

Summary with citations:
{summary}

Provide a 2-3 sentence explanation that:
1. Confirms if they were correct or explains why they were wrong
2. References relevant information from the summary using citations [1], [2], etc.
3. Reinforces the key learning points
4. Is encouraging and educational

Return only the explanation text, no JSON formatting."
    )
}
