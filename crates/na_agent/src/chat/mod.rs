//! Conversational news assistant with per-thread memory.
//!
//! The model drives a small tool loop: each reply is either an `ACTION:` line
//! naming one of the [`Tool`]s or an `ANSWER:`. Tool output is fed back to the
//! model as an observation until it answers or runs out of steps.

pub mod protocol;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use na_core::config::{PipelineConfig, SummaryStrategy};
use na_core::{Article, ArticleSource, GenerationOptions, InferenceModel, Result, SourceError};
use na_inference::parse::first_number;
use na_inference::Summarizer;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

pub use protocol::{parse_reply, Reply, Tool};

/// Turns kept per thread.
pub const MAX_HISTORY: usize = 20;
pub const DEFAULT_MAX_STEPS: usize = 4;
/// Threads kept in memory; the least recently used one is dropped past this.
pub const DEFAULT_MAX_THREADS: usize = 1000;
const LISTING_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Default)]
struct Thread {
    history: Vec<Turn>,
    articles: Vec<Article>,
}

/// Thread registry. Each thread has its own lock, held for a whole turn, so
/// turns on one thread run one after another while other threads proceed.
#[derive(Debug, Default)]
struct Threads {
    slots: HashMap<String, Slot>,
    clock: u64,
}

#[derive(Debug)]
struct Slot {
    thread: Arc<Mutex<Thread>>,
    last_used: u64,
}

impl Threads {
    fn checkout(&mut self, thread_id: &str, max_threads: usize) -> Arc<Mutex<Thread>> {
        self.clock += 1;
        let clock = self.clock;
        if let Some(slot) = self.slots.get_mut(thread_id) {
            slot.last_used = clock;
            return slot.thread.clone();
        }

        while self.slots.len() >= max_threads.max(1) {
            let Some(oldest) = self.slots.iter().min_by_key(|(_, s)| s.last_used).map(|(id, _)| id.clone()) else {
                break;
            };
            debug!("Dropping idle chat thread {}", oldest);
            self.slots.remove(&oldest);
        }

        let thread = Arc::new(Mutex::new(Thread::default()));
        self.slots.insert(thread_id.to_string(), Slot { thread: thread.clone(), last_used: clock });
        thread
    }
}

pub struct ChatAgent {
    model: Arc<dyn InferenceModel>,
    source: Arc<dyn ArticleSource>,
    synthesizer: Summarizer,
    summarizer: Summarizer,
    max_steps: usize,
    max_threads: usize,
    threads: Mutex<Threads>,
}

impl fmt::Debug for ChatAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatAgent")
            .field("model", &self.model.name())
            .field("source", &self.source.name())
            .field("max_steps", &self.max_steps)
            .field("max_threads", &self.max_threads)
            .finish()
    }
}

impl ChatAgent {
    pub fn new(source: Arc<dyn ArticleSource>, model: Arc<dyn InferenceModel>, config: &PipelineConfig) -> Self {
        Self {
            synthesizer: Summarizer::new(model.clone(), config).with_strategy(SummaryStrategy::Batch),
            summarizer: Summarizer::new(model.clone(), config).with_strategy(SummaryStrategy::PerArticle),
            model,
            source,
            max_steps: DEFAULT_MAX_STEPS,
            max_threads: DEFAULT_MAX_THREADS,
            threads: Mutex::new(Threads::default()),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Conversation so far for `thread_id`, oldest first. Waits for a turn
    /// in progress on that thread.
    pub async fn history(&self, thread_id: &str) -> Vec<Turn> {
        let thread = {
            let threads = self.threads.lock().await;
            threads.slots.get(thread_id).map(|slot| slot.thread.clone())
        };
        match thread {
            Some(thread) => thread.lock().await.history.clone(),
            None => Vec::new(),
        }
    }

    /// Handle one user message. Status lines and the final answer are pushed
    /// to `sink` as they become available; the answer is also returned.
    ///
    /// Only a failing model call is an error. Tool failures are reported to
    /// the model as observations.
    pub async fn respond(&self, thread_id: &str, message: &str, sink: &mpsc::Sender<String>) -> Result<String> {
        let thread = self.threads.lock().await.checkout(thread_id, self.max_threads);
        let mut thread = thread.lock().await;
        info!("💬 Thread {}: {}", thread_id, message);

        let options = GenerationOptions::with_temperature(0.0);
        let mut scratchpad = Vec::new();
        let mut answer = None;

        for step in 0..=self.max_steps {
            let prompt = build_prompt(&thread.history, message, &scratchpad);
            let reply = self.model.generate(&prompt, &options).await?;

            match parse_reply(&reply) {
                Reply::Answer(text) => {
                    answer = Some(text);
                    break;
                }
                Reply::Action { .. } if step == self.max_steps => {
                    warn!("Thread {} exhausted {} tool calls", thread_id, self.max_steps);
                    break;
                }
                Reply::Action { tool, input } => {
                    debug!("Step {}: {} | {}", step + 1, tool, input);
                    emit(sink, status_line(&tool, &input)).await;
                    let observation = self.run_tool(&mut thread, &tool, &input).await;
                    scratchpad.push(format!("ACTION: {} | {}\nOBSERVATION: {}", tool, input, observation));
                }
            }
        }

        let answer = answer.unwrap_or_else(|| {
            format!("Sorry, I could not finish that request within {} tool calls.", self.max_steps)
        });
        emit(sink, answer.clone()).await;

        thread.history.push(Turn { role: Role::User, content: message.to_string() });
        thread.history.push(Turn { role: Role::Assistant, content: answer.clone() });
        let excess = thread.history.len().saturating_sub(MAX_HISTORY);
        thread.history.drain(..excess);
        Ok(answer)
    }

    async fn run_tool(&self, thread: &mut Thread, tool: &str, input: &str) -> String {
        let tool = match tool.parse::<Tool>() {
            Ok(tool) => tool,
            Err(e) => {
                let names: Vec<_> = Tool::ALL.iter().map(|t| t.as_str()).collect();
                return format!("Error: {}. Available tools: {}", e, names.join(", "));
            }
        };

        match tool {
            Tool::SearchForNews => match self.source.search(input).await {
                Ok(articles) => {
                    let listing = list_articles(&articles);
                    thread.articles = articles;
                    listing
                }
                Err(SourceError::NoResults) => "No articles found for that topic.".to_string(),
                Err(e) => format!("Error searching for news: {}", e),
            },
            Tool::SummarizeAllAndSynthesize => {
                if thread.articles.is_empty() {
                    return "Error: there are no articles to summarize yet. Search for news first.".to_string();
                }
                match self.synthesizer.summarize(&thread.articles).await {
                    Ok(out) => {
                        let mut text = numbered(&out.summaries);
                        if let Some(takeaways) = out.takeaways {
                            text.push_str(&format!("\n\nKey Takeaways: {}", takeaways));
                        }
                        text
                    }
                    Err(e) => format!("Error processing articles: {}", e),
                }
            }
            Tool::SummarizeOneArticle => {
                let index = first_number(input).map(|n| n as usize);
                match index.and_then(|n| n.checked_sub(1)).and_then(|i| thread.articles.get(i)) {
                    Some(article) => {
                        let summary = self.summarizer.summarize_each(std::slice::from_ref(article)).await;
                        format!("{}: {}", article.title, summary.concat())
                    }
                    None => format!(
                        "Error: no article number {:?}; the last search returned {} articles.",
                        input,
                        thread.articles.len()
                    ),
                }
            }
        }
    }
}

async fn emit(sink: &mpsc::Sender<String>, fragment: String) {
    if sink.send(fragment).await.is_err() {
        debug!("Chat listener went away");
    }
}

fn status_line(tool: &str, input: &str) -> String {
    if input.is_empty() {
        format!("🔧 {}\n", tool)
    } else {
        format!("🔧 {}: {}\n", tool, input)
    }
}

fn list_articles(articles: &[Article]) -> String {
    articles
        .iter()
        .enumerate()
        .map(|(i, a)| format!("[{}] {} ({})\n{}\n{}", i + 1, a.title, a.source, a.url, a.preview(LISTING_PREVIEW_CHARS)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(history: &[Turn], message: &str, scratchpad: &[String]) -> String {
    let tools = Tool::ALL
        .iter()
        .map(|t| format!("- {}: {}", t.as_str(), t.description()))
        .collect::<Vec<_>>()
        .join("\n");
    let conversation = history
        .iter()
        .map(|turn| match turn.role {
            Role::User => format!("User: {}", turn.content),
            Role::Assistant => format!("Assistant: {}", turn.content),
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "You are a helpful news assistant. Give users accurate and concise news information.\n\n\
         Tools:\n{}\n\n\
         When the user asks about a news topic, search first and list the article titles with their URLs, \
         then offer to summarize them. Do not make up information; stick to what the tools return.\n\n\
         To use a tool reply with exactly one line: ACTION: <tool> | <input>\n\
         To reply to the user write: ANSWER: <text>\n\n",
        tools
    );
    if !conversation.is_empty() {
        prompt.push_str(&format!("Conversation so far:\n{}\n\n", conversation));
    }
    prompt.push_str(&format!("User: {}\n", message));
    for entry in scratchpad {
        prompt.push_str(&format!("\n{}\n", entry));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use na_inference::models::DummyModel;
    use std::time::Duration;

    /// Answers with the latest user message after a short pause.
    #[derive(Debug)]
    struct SlowEchoModel;

    #[async_trait]
    impl InferenceModel for SlowEchoModel {
        fn name(&self) -> &str {
            "slow-echo"
        }

        async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let message = prompt.lines().filter_map(|l| l.strip_prefix("User: ")).last().unwrap_or_default();
            Ok(format!("ANSWER: echo {}", message))
        }
    }

    struct FixedSource(Vec<Article>);

    #[async_trait]
    impl ArticleSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn search(&self, query: &str) -> std::result::Result<Vec<Article>, SourceError> {
            if query == "nothing" {
                return Err(SourceError::NoResults);
            }
            Ok(self.0.clone())
        }
    }

    fn agent(model: Arc<DummyModel>) -> ChatAgent {
        agent_with(model)
    }

    fn agent_with(model: Arc<dyn InferenceModel>) -> ChatAgent {
        let source = Arc::new(FixedSource(vec![
            Article::new("AI act passes", "The EU passed the AI act.", "Reuters", "http://a"),
            Article::new("Chip exports", "New chip export rules.", "AP", "http://b"),
        ]));
        ChatAgent::new(source, model, &PipelineConfig::default())
    }

    async fn drain(mut rx: mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(fragment) = rx.recv().await {
            out.push(fragment);
        }
        out
    }

    #[tokio::test]
    async fn test_search_then_answer() {
        let model = Arc::new(DummyModel::with_replies([
            "ACTION: search_for_news | AI regulation",
            "ANSWER: I found 2 articles: AI act passes and Chip exports.",
        ]));
        let agent = agent(model.clone());
        let (tx, rx) = mpsc::channel(16);

        let answer = agent.respond("t1", "What's new on AI regulation?", &tx).await.unwrap();
        drop(tx);
        assert_eq!(answer, "I found 2 articles: AI act passes and Chip exports.");
        assert_eq!(drain(rx).await, vec!["🔧 search_for_news: AI regulation\n".to_string(), answer.clone()]);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("OBSERVATION: [1] AI act passes (Reuters)"));
    }

    #[tokio::test]
    async fn test_thread_memory() {
        let model = Arc::new(DummyModel::with_replies([
            "ACTION: search_for_news | chips",
            "ANSWER: Two articles found.",
            "ACTION: summarize_one_article | 2",
            "The chip rules tighten exports.",
            "ANSWER: Article 2 says exports tighten.",
        ]));
        let agent = agent(model.clone());
        let (tx, _rx) = mpsc::channel(16);

        agent.respond("t1", "chips news?", &tx).await.unwrap();
        let answer = agent.respond("t1", "tell me more about the second", &tx).await.unwrap();
        assert_eq!(answer, "Article 2 says exports tighten.");

        let prompts = model.prompts();
        assert!(prompts[2].contains("User: chips news?\nAssistant: Two articles found."));
        assert!(prompts[4].contains("OBSERVATION: Chip exports: The chip rules tighten exports."));

        let history = agent.history("t1").await;
        assert_eq!(history.len(), 4);
        assert!(agent.history("t2").await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_turns_on_one_thread_keep_history() {
        let agent = agent_with(Arc::new(SlowEchoModel));
        let (tx, _rx) = mpsc::channel(16);

        let (first, second) = tokio::join!(agent.respond("t1", "first", &tx), agent.respond("t1", "second", &tx));
        assert_eq!(first.unwrap(), "echo first");
        assert_eq!(second.unwrap(), "echo second");

        let history: Vec<_> = agent.history("t1").await.into_iter().map(|t| t.content).collect();
        assert_eq!(history, vec!["first", "echo first", "second", "echo second"]);
    }

    #[tokio::test]
    async fn test_respond_on_spawned_task() {
        let model = Arc::new(DummyModel::with_replies([
            "ACTION: search_for_news | chips",
            "ACTION: summarize_one_article | 1",
            "The EU passed it.",
            "ANSWER: Done.",
        ]));
        let agent = Arc::new(agent(model));
        let (tx, rx) = mpsc::channel(16);

        let task = tokio::spawn({
            let agent = agent.clone();
            async move { agent.respond("t1", "chips?", &tx).await }
        });
        let fragments = drain(rx).await;
        assert_eq!(task.await.unwrap().unwrap(), "Done.");
        assert_eq!(fragments.last().map(String::as_str), Some("Done."));
        assert_eq!(agent.history("t1").await.len(), 2);
    }

    #[tokio::test]
    async fn test_least_recently_used_thread_is_dropped() {
        let model = Arc::new(DummyModel::new().respond_when("User:", "ANSWER: ok"));
        let agent = agent(model).with_max_threads(2);
        let (tx, _rx) = mpsc::channel(16);

        agent.respond("t1", "one", &tx).await.unwrap();
        agent.respond("t2", "two", &tx).await.unwrap();
        agent.respond("t1", "one again", &tx).await.unwrap();
        agent.respond("t3", "three", &tx).await.unwrap();

        assert_eq!(agent.history("t1").await.len(), 4);
        assert!(agent.history("t2").await.is_empty());
        assert_eq!(agent.history("t3").await.len(), 2);
    }

    #[tokio::test]
    async fn test_tool_errors_become_observations() {
        let model = Arc::new(DummyModel::with_replies([
            "ACTION: summarize_all_and_synthesize",
            "ACTION: browse_web | x",
            "ACTION: search_for_news | nothing",
            "ANSWER: I could not find anything.",
        ]));
        let agent = agent(model.clone());
        let (tx, _rx) = mpsc::channel(16);

        let answer = agent.respond("t1", "anything?", &tx).await.unwrap();
        assert_eq!(answer, "I could not find anything.");

        let prompts = model.prompts();
        assert!(prompts[1].contains("OBSERVATION: Error: there are no articles to summarize yet."));
        assert!(prompts[2].contains("Unknown tool `browse_web`"));
        assert!(prompts[3].contains("OBSERVATION: No articles found for that topic."));
    }

    #[tokio::test]
    async fn test_step_limit() {
        let model = Arc::new(DummyModel::new().respond_when("User:", "ACTION: search_for_news | loop"));
        let agent = agent(model.clone()).with_max_steps(2);
        let (tx, _rx) = mpsc::channel(16);

        let answer = agent.respond("t1", "loop forever", &tx).await.unwrap();
        assert!(answer.contains("within 2 tool calls"));
        assert_eq!(model.prompts().len(), 3);
    }

    #[tokio::test]
    async fn test_plain_reply_is_answer() {
        let model = Arc::new(DummyModel::with_replies(["Hello! Ask me about the news."]));
        let agent = agent(model);
        let (tx, _rx) = mpsc::channel(16);
        assert_eq!(agent.respond("t1", "hi", &tx).await.unwrap(), "Hello! Ask me about the news.");
    }

    #[tokio::test]
    async fn test_model_failure_is_error() {
        let model = DummyModel::new();
        model.push_failure("quota exceeded");
        let agent = agent(Arc::new(model));
        let (tx, _rx) = mpsc::channel(16);
        assert!(agent.respond("t1", "hi", &tx).await.is_err());
        assert!(agent.history("t1").await.is_empty());
    }
}
