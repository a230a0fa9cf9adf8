//! Shared test helpers.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use maitred_core::error::ProviderError;
use maitred_core::provider::{Provider, ProviderRequest, ProviderResponse};

/// A provider that replays scripted replies and records every request.
///
/// With a fallback set, it answers with the fallback once the script runs
/// out; otherwise it panics.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: Option<String>,
    delay: Duration,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Ok(t.into())).collect())
    }

    /// Answer every request with the same text.
    pub fn always(text: &str) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.fallback = Some(text.to_string());
        provider
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.script.lock().unwrap().pop_front();
        let content = match (next, &self.fallback) {
            (Some(reply), _) => reply?,
            (None, Some(fallback)) => fallback.clone(),
            (None, None) => panic!("ScriptedProvider: no more replies"),
        };

        Ok(ProviderResponse {
            content,
            usage: None,
            model: "scripted-model".into(),
        })
    }
}
