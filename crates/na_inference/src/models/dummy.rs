use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use na_core::{Error, GenerationOptions, InferenceModel, Result};

type Reply = std::result::Result<String, String>;

/// Offline model. Answers from keyword rules first, then from a queue of
/// scripted replies, and otherwise echoes the first 20 words of the prompt.
#[derive(Default)]
pub struct DummyModel {
    rules: Vec<(String, Reply)>,
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").field("rules", &self.rules.len()).finish()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue replies handed out in call order.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::default();
        model.push_replies(replies.into_iter().map(|r| Ok(r.into())));
        model
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.push_replies([Ok(reply.into())]);
    }

    /// Queue a failed generation call.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.push_replies([Err(message.into())]);
    }

    fn push_replies(&self, replies: impl IntoIterator<Item = Reply>) {
        if let Ok(mut queue) = self.replies.lock() {
            queue.extend(replies);
        }
    }

    /// Answer `reply` to any prompt containing `needle`.
    pub fn respond_when(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Ok(reply.into())));
        self
    }

    /// Fail any prompt containing `needle`.
    pub fn fail_when(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push((needle.into(), Err(message.into())));
        self
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn next_reply(&self, prompt: &str) -> Reply {
        if let Some((_, reply)) = self.rules.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
            return reply.clone();
        }
        if let Some(reply) = self.replies.lock().ok().and_then(|mut q| q.pop_front()) {
            return reply;
        }
        Ok(prompt.split_whitespace().take(20).collect::<Vec<_>>().join(" "))
    }
}

#[async_trait::async_trait]
impl InferenceModel for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.next_reply(prompt).map_err(Error::Inference)
    }
}
