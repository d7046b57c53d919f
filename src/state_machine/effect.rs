//! External calls requested by steps, and their results

use crate::llm::LlmError;
use crate::search::{SearchError, SearchHit, SearchRequest};

/// Which generation call a step is making
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Summary,
    Question,
    Explanation,
}

impl Purpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::Summary => "summary",
            Purpose::Question => "question",
            Purpose::Explanation => "explanation",
        }
    }
}

/// An external call the engine performs before a step runs
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Execute a web search
    Search(SearchRequest),

    /// Generate text from system instructions and a user prompt
    Generate {
        purpose: Purpose,
        system: String,
        prompt: String,
    },
}

/// Outcome of an [`Effect`], handed to the step that requested it.
/// Failures are data here: steps turn them into fallback content.
#[derive(Debug)]
pub enum Reply {
    Search(Result<Vec<SearchHit>, SearchError>),
    Generated(Result<String, LlmError>),
}

impl Reply {
    pub fn is_failure(&self) -> bool {
        match self {
            Reply::Search(r) => r.is_err(),
            Reply::Generated(r) => r.is_err(),
        }
    }
}
