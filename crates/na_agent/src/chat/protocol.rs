//! The plain-text action protocol spoken by the chat model.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    SearchForNews,
    SummarizeAllAndSynthesize,
    SummarizeOneArticle,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::SearchForNews, Tool::SummarizeAllAndSynthesize, Tool::SummarizeOneArticle];

    pub fn as_str(self) -> &'static str {
        match self {
            Tool::SearchForNews => "search_for_news",
            Tool::SummarizeAllAndSynthesize => "summarize_all_and_synthesize",
            Tool::SummarizeOneArticle => "summarize_one_article",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Tool::SearchForNews => "find recent articles on a topic. Input: the search query.",
            Tool::SummarizeAllAndSynthesize => {
                "summarize every article from the last search and synthesize key takeaways. Input: none."
            }
            Tool::SummarizeOneArticle => {
                "detailed summary of one article from the last search. Input: its number in the list."
            }
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_matches('`').to_lowercase();
        Tool::ALL
            .into_iter()
            .find(|tool| tool.as_str() == name)
            .ok_or_else(|| format!("Unknown tool `{}`", s.trim()))
    }
}

/// What the model asked for in one reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Action { tool: String, input: String },
    Answer(String),
}

fn action_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*ACTION:\s*([^|\n]*?)\s*(?:\|\s*(.*?))?\s*$").expect("valid action pattern"))
}

fn answer_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*ANSWER:\s*").expect("valid answer pattern"))
}

/// Reads the first `ACTION:` or `ANSWER:` marker, whichever comes first.
/// Text with neither marker is the answer itself.
pub fn parse_reply(text: &str) -> Reply {
    let answer = answer_pattern().find(text);

    if let Some(caps) = action_pattern().captures(text) {
        let action_start = caps.get(0).map_or(0, |m| m.start());
        if !answer.is_some_and(|a| a.start() < action_start) {
            return Reply::Action {
                tool: caps[1].trim().to_string(),
                input: caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
            };
        }
    }

    match answer {
        Some(answer) => Reply::Answer(text[answer.end()..].trim().to_string()),
        None => Reply::Answer(text.trim().to_string()),
    }
}
