//! Deterministic LLM client for tests in this and downstream crates.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::llm::LlmClient;

/// Replays queued replies in order and records every `(system, prompt)` pair.
/// An `Err` entry is returned as a model failure.
#[derive(Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlmClient {
    pub fn new(replies: impl IntoIterator<Item = Result<String, String>>) -> Self {
        Self { replies: Mutex::new(replies.into_iter().collect()), calls: Mutex::default() }
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        lock(&self.replies).push_back(Ok(reply.into()));
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        lock(&self.calls).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        lock(&self.calls).push((system.to_string(), prompt.to_string()));
        match lock(&self.replies).pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted client has no replies left")),
        }
    }
}
