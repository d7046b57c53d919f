//! Step functions
//!
//! Each step is a pure function of the current state and, for steps that
//! need one, the result of an external call. The engine asks
//! [`effect_for`] which call to make, performs it, then runs [`step`].

use super::citations::{citations_for, fallback_source, normalize_hits, strip_unaligned_markers};
use super::effect::{Effect, Purpose, Reply};
use super::quiz::{fallback_explanation, fallback_question, format_question, grade, parse_answer, parse_question};
use super::state::{
    ConfirmationPrompt, ConversationState, Grade, ResponseType, Role, SearchResult, Status,
};
use crate::prompts;
use crate::search::SearchRequest;
use std::fmt;

pub const EMPTY_TOPIC_PROMPT: &str = "I didn't catch that. What health topic would you like to learn about?";
pub const MISSING_TOPIC_PROMPT: &str = "I need a health topic to search for. What would you like to learn about?";
pub const SUMMARY_APOLOGY: &str = "Unable to generate summary due to technical issues. Please try again later.";
pub const QUIZ_READY_PROMPT: &str = "When you're ready for a quick comprehension check, click the button below.";
pub const QUESTION_INTRO: &str = "Here's a quick comprehension check:\n\n";
pub const ANSWER_PROMPT: &str = "Please answer with a single letter: A, B, C, or D.";
pub const RESTART_QUESTION: &str = "Would you like to learn about another health topic? Reply 'yes' or 'no'.";
pub const QUIZ_DECLINED: &str = "No problem, we can skip the quiz.";
pub const RESTART_ACCEPTED: &str = "Great! What health topic or medical condition would you like to learn about?";
pub const CLOSING_MESSAGE: &str = "Thanks for learning with HealthBot! Take care and stay healthy! 👋";
pub const RESTART_UNRECOGNIZED: &str =
    "I didn't understand. Would you like to learn about another health topic? Reply 'yes' or 'no'.";

const CONFIRM_TOKENS: &[&str] = &["true", "yes", "y", "ready", "r", "ok", "go", "i'm ready", "ready for quiz"];
const DECLINE_TOKENS: &[&str] = &["false", "no", "n", "not ready", "not yet", "skip"];
const RESTART_YES_TOKENS: &[&str] = &["yes", "y", "restart", "again", "another", "new topic"];
const RESTART_NO_TOKENS: &[&str] = &["no", "n", "end", "exit", "quit", "stop"];

/// The fixed set of processing steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepId {
    CollectTopic,
    Search,
    ExecuteSearchTool,
    Summarize,
    PresentSummary,
    GenerateQuestion,
    PresentQuestion,
    Evaluate,
    HandleRestart,
}

impl StepId {
    /// The step a session resumes at when no new input arrives.
    /// `None` for the terminal status.
    pub fn for_status(status: Status) -> Option<StepId> {
        match status {
            Status::CollectingTopic => Some(StepId::CollectTopic),
            Status::Searching => Some(StepId::Search),
            Status::Summarizing => Some(StepId::Summarize),
            Status::PresentingSummary => Some(StepId::PresentSummary),
            Status::GenerateQuestion => Some(StepId::GenerateQuestion),
            Status::PresentQuestion => Some(StepId::PresentQuestion),
            Status::Evaluating => Some(StepId::Evaluate),
            Status::AskRestart => Some(StepId::HandleRestart),
            Status::Ended => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepId::CollectTopic => "collect_topic",
            StepId::Search => "search",
            StepId::ExecuteSearchTool => "execute_search_tool",
            StepId::Summarize => "summarize",
            StepId::PresentSummary => "present_summary",
            StepId::GenerateQuestion => "generate_question",
            StepId::PresentQuestion => "present_question",
            StepId::Evaluate => "evaluate",
            StepId::HandleRestart => "handle_restart",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's reply to a yes/no style prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Decline,
    Unrecognized,
}

/// What a step reports back to its router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Work done, the pipeline may continue
    Advanced,
    /// Nothing more can happen without new user input
    AwaitingInput,
    /// User input classified against an acceptance set
    Decided(Decision),
}

fn classify(input: &str, accept: &[&str], decline: &[&str]) -> Decision {
    let normalized = input.trim().to_lowercase();
    if accept.contains(&normalized.as_str()) {
        Decision::Accept
    } else if decline.contains(&normalized.as_str()) {
        Decision::Decline
    } else {
        Decision::Unrecognized
    }
}

/// Take the pending input and record it in the transcript
fn consume_input(state: &mut ConversationState) -> String {
    let input = state.take_user_message();
    if !input.is_empty() {
        state.push_transcript(Role::User, input.clone());
    }
    input
}

/// Sources the summary is written from. Never empty.
fn summary_sources(state: &ConversationState) -> Vec<SearchResult> {
    if state.search_results.is_empty() {
        vec![fallback_source()]
    } else {
        state.search_results.clone()
    }
}

/// Generated text from a reply, or `None` when the call failed or was blank
fn generated_text(reply: Option<Reply>) -> Option<String> {
    match reply {
        Some(Reply::Generated(Ok(text))) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

/// The external call `id` needs before it can run, if any
pub fn effect_for(id: StepId, state: &ConversationState) -> Option<Effect> {
    match id {
        StepId::ExecuteSearchTool => state.pending_search.clone().map(Effect::Search),
        StepId::Summarize => Some(Effect::Generate {
            purpose: Purpose::Summary,
            system: prompts::SUMMARY_SYSTEM.to_string(),
            prompt: prompts::summary_prompt(&state.topic, &summary_sources(state)),
        }),
        StepId::GenerateQuestion if state.multiple_choice.is_none() => Some(Effect::Generate {
            purpose: Purpose::Question,
            system: prompts::QUESTION_SYSTEM.to_string(),
            prompt: prompts::question_prompt(&state.topic, &state.summary),
        }),
        StepId::Evaluate => {
            let mc = state.multiple_choice.as_ref()?;
            let answer = parse_answer(&state.user_answer)?;
            let graded = grade(mc, answer);
            Some(Effect::Generate {
                purpose: Purpose::Explanation,
                system: prompts::EXPLANATION_SYSTEM.to_string(),
                prompt: prompts::explanation_prompt(
                    answer,
                    mc.correct_letter,
                    mc.correct_choice(),
                    graded,
                    &state.summary,
                ),
            })
        }
        _ => None,
    }
}

/// Run one step against `state`
pub fn step(id: StepId, state: &mut ConversationState, reply: Option<Reply>) -> StepOutcome {
    match id {
        StepId::CollectTopic => collect_topic(state),
        StepId::Search => search(state),
        StepId::ExecuteSearchTool => execute_search_tool(state, reply),
        StepId::Summarize => summarize(state, reply),
        StepId::PresentSummary => present_summary(state),
        StepId::GenerateQuestion => generate_question(state, reply),
        StepId::PresentQuestion => present_question(state),
        StepId::Evaluate => evaluate(state, reply),
        StepId::HandleRestart => handle_restart(state),
    }
}

fn collect_topic(state: &mut ConversationState) -> StepOutcome {
    if !state.has_input() {
        state.user_message.clear();
        state.reply(EMPTY_TOPIC_PROMPT, ResponseType::Text);
        return StepOutcome::AwaitingInput;
    }

    if state.transcript.is_empty() {
        state.push_transcript(Role::System, prompts::ROLE_STATEMENT);
    }
    let topic = consume_input(state);

    state.clear_cycle();
    state.reply(
        format!(
            "Got it! I'll search for trusted, up-to-date medical information on: {topic}. This may take a moment..."
        ),
        ResponseType::Text,
    );
    state.topic = topic;
    state.status = Status::Searching;
    StepOutcome::Advanced
}

fn search(state: &mut ConversationState) -> StepOutcome {
    let topic = state.topic.trim().to_string();
    if topic.is_empty() {
        state.status = Status::CollectingTopic;
        state.reply(MISSING_TOPIC_PROMPT, ResponseType::Text);
        return StepOutcome::AwaitingInput;
    }

    state.pending_search = Some(SearchRequest::trusted(topic));
    state.status = Status::Searching;
    StepOutcome::Advanced
}

fn execute_search_tool(state: &mut ConversationState, reply: Option<Reply>) -> StepOutcome {
    let hits = match reply {
        Some(Reply::Search(Ok(hits))) => hits,
        _ => Vec::new(),
    };

    let mut results = normalize_hits(&hits);
    if results.is_empty() {
        results.push(fallback_source());
    }

    state.pending_search = None;
    state.citations = citations_for(&results);
    state.search_results = results;
    state.status = Status::Summarizing;
    StepOutcome::Advanced
}

fn summarize(state: &mut ConversationState, reply: Option<Reply>) -> StepOutcome {
    if state.search_results.is_empty() {
        state.search_results = summary_sources(state);
    }
    state.citations = citations_for(&state.search_results);

    state.summary = match generated_text(reply) {
        Some(text) => strip_unaligned_markers(&text, state.citations.len()),
        None => SUMMARY_APOLOGY.to_string(),
    };
    state.reply(state.summary.clone(), ResponseType::Text);
    state.status = Status::PresentingSummary;
    StepOutcome::Advanced
}

fn present_summary(state: &mut ConversationState) -> StepOutcome {
    if !state.has_input() {
        state.user_message.clear();
        state.confirmation_prompt = Some(ConfirmationPrompt {
            message: QUIZ_READY_PROMPT.to_string(),
            requires_confirmation: true,
        });
        state.reply(
            format!(
                "{}\n\n---\n\nI've provided you with comprehensive information about your health topic. {QUIZ_READY_PROMPT}",
                state.summary
            ),
            ResponseType::Confirmation,
        );
        state.status = Status::PresentingSummary;
        return StepOutcome::AwaitingInput;
    }

    let input = consume_input(state);
    let decision = classify(&input, CONFIRM_TOKENS, DECLINE_TOKENS);
    match decision {
        Decision::Accept => {
            state.confirmation_prompt = None;
            state.status = Status::GenerateQuestion;
        }
        Decision::Decline => {
            state.confirmation_prompt = None;
            state.status = Status::AskRestart;
        }
        Decision::Unrecognized => {
            state.reply(QUIZ_READY_PROMPT, ResponseType::Confirmation);
        }
    }
    StepOutcome::Decided(decision)
}

fn generate_question(state: &mut ConversationState, reply: Option<Reply>) -> StepOutcome {
    state.user_message.clear();

    let mc = match state.multiple_choice.take() {
        Some(existing) => existing,
        None => generated_text(reply)
            .and_then(|raw| parse_question(&raw).ok())
            .unwrap_or_else(fallback_question),
    };

    state.question = format_question(&mc);
    state.correct_answer = mc.correct_choice().to_string();
    state.multiple_choice = Some(mc);
    state.status = Status::PresentQuestion;
    StepOutcome::Advanced
}

fn present_question(state: &mut ConversationState) -> StepOutcome {
    if state.multiple_choice.is_none() {
        state.status = Status::GenerateQuestion;
        return StepOutcome::Advanced;
    }

    if !state.has_input() {
        state.user_message.clear();
        state.reply(format!("{QUESTION_INTRO}{}", state.question), ResponseType::MultipleChoice);
        state.status = Status::PresentQuestion;
        return StepOutcome::AwaitingInput;
    }

    let input = consume_input(state);
    match parse_answer(&input) {
        Some(letter) => {
            state.user_answer = letter.to_string();
            state.status = Status::Evaluating;
            StepOutcome::Advanced
        }
        None => {
            state.reply(format!("{ANSWER_PROMPT}\n\n{}", state.question), ResponseType::MultipleChoice);
            StepOutcome::AwaitingInput
        }
    }
}

fn evaluate(state: &mut ConversationState, reply: Option<Reply>) -> StepOutcome {
    state.user_message.clear();

    let (Some(mc), Some(answer)) = (state.multiple_choice.clone(), parse_answer(&state.user_answer)) else {
        // Nothing gradable: go back to waiting for an answer
        state.user_answer.clear();
        state.status = Status::PresentQuestion;
        state.reply(format!("{QUESTION_INTRO}{}", state.question), ResponseType::MultipleChoice);
        return StepOutcome::AwaitingInput;
    };

    let graded = grade(&mc, answer);
    let explanation = generated_text(reply).map_or_else(
        || fallback_explanation(&mc, graded),
        |text| strip_unaligned_markers(&text, state.citations.len()),
    );
    let verdict = match graded {
        Grade::Correct => "✅ Correct!",
        Grade::Incorrect => "❌ Incorrect.",
    };

    state.reply(format!("{verdict} {explanation}\n\n{RESTART_QUESTION}"), ResponseType::Text);
    state.user_answer = answer.to_string();
    state.grade = Some(graded);
    state.explanation = explanation;
    state.status = Status::AskRestart;
    StepOutcome::AwaitingInput
}

fn handle_restart(state: &mut ConversationState) -> StepOutcome {
    if !state.has_input() {
        state.user_message.clear();
        let message = if state.grade.is_none() {
            format!("{QUIZ_DECLINED} {RESTART_QUESTION}")
        } else {
            RESTART_QUESTION.to_string()
        };
        state.reply(message, ResponseType::Text);
        state.status = Status::AskRestart;
        return StepOutcome::AwaitingInput;
    }

    let input = consume_input(state);
    let decision = classify(&input, RESTART_YES_TOKENS, RESTART_NO_TOKENS);
    match decision {
        Decision::Accept => {
            state.reset_for_restart();
            state.reply(RESTART_ACCEPTED, ResponseType::Text);
        }
        Decision::Decline => {
            state.status = Status::Ended;
            state.reply(CLOSING_MESSAGE, ResponseType::Text);
        }
        Decision::Unrecognized => {
            state.reply(RESTART_UNRECOGNIZED, ResponseType::Text);
        }
    }
    StepOutcome::Decided(decision)
}
