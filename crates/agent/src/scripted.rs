//! A completion provider that replays a fixed list of decisions.
//!
//! Used by `webpilot replay` and by tests. Each call to `decide` returns
//! the next decision in order; once the list runs out the provider
//! answers with [`ProviderError::NotConfigured`], which is not retried.
//! Check verdicts are scripted separately and run dry the same way.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use webpilot_core::{CheckRequest, CompletionProvider, Decision, DecisionRequest, ProviderError};

type Step = Result<Decision, ProviderError>;
type Verdict = Result<bool, ProviderError>;

pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    verdicts: Mutex<VecDeque<Verdict>>,
    requests: Mutex<Vec<DecisionRequest>>,
    checks: Mutex<Vec<CheckRequest>>,
    call_count: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self::from_steps(decisions.into_iter().map(Ok).collect())
    }

    /// Interleave errors with decisions, e.g. to exercise provider retry.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            verdicts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            checks: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
        }
    }

    /// Parse a JSON array of decisions (`[{"thought": .., "action": {..}}, ..]`).
    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        let raw: Vec<serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| ProviderError::MalformedResponse(format!("decision script: {e}")))?;
        let decisions = raw
            .into_iter()
            .map(Decision::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(decisions))
    }

    /// Answer checks with `verdicts`, in order.
    pub fn with_verdicts(self, verdicts: Vec<bool>) -> Self {
        self.with_verdict_steps(verdicts.into_iter().map(Ok).collect())
    }

    pub fn with_verdict_steps(mut self, verdicts: Vec<Verdict>) -> Self {
        self.verdicts = Mutex::new(verdicts.into());
        self
    }

    /// Decisions and checks answered so far.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Decisions not yet handed out.
    pub fn remaining(&self) -> usize {
        self.steps.lock().map(|steps| steps.len()).unwrap_or_default()
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<DecisionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Every check seen so far, oldest first.
    pub fn checks(&self) -> Vec<CheckRequest> {
        self.checks
            .lock()
            .map(|checks| checks.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn decide(&self, request: DecisionRequest) -> Result<Decision, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let next = self
            .steps
            .lock()
            .map_err(|_| ProviderError::NotConfigured("decision script is poisoned".into()))?
            .pop_front();
        next.unwrap_or_else(|| {
            Err(ProviderError::NotConfigured(
                "decision script is exhausted".into(),
            ))
        })
    }

    async fn evaluate_check(&self, request: CheckRequest) -> Result<bool, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut checks) = self.checks.lock() {
            checks.push(request);
        }
        let next = self
            .verdicts
            .lock()
            .map_err(|_| ProviderError::NotConfigured("check script is poisoned".into()))?
            .pop_front();
        next.unwrap_or_else(|| {
            Err(ProviderError::NotConfigured(
                "check script is exhausted".into(),
            ))
        })
    }
}
