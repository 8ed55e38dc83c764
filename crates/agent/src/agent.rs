//! The agent loop: observe, decide, act, until the task completes or fails.

use chrono::Utc;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use webpilot_connectors::TaskConnector;
use webpilot_core::{
    Action, ActionContext, ActionOutcome, ActionRegistry, AgentError, AgentEvent, AgentState,
    CheckRequest, CompletionProvider, ConfigurationError, Connector, Decision, DecisionRequest,
    Error, EventBus, Exponential, FailureVariant, MemoryContext, Observation, ProviderError,
    Result, Retry, RetryPolicy, StepOptions, TestData,
};
use webpilot_memory::{AgentMemory, DEFAULT_THOUGHT_LIMIT, Turn};

use crate::outcome::{AgentOutcome, AgentStatus, FailureRecord, classify};

pub const DEFAULT_MAX_STEPS: u32 = 50;

/// Budgets and policies for one agent.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Most actions one task may take
    pub max_steps: Option<u32>,

    /// Wall-clock budget for one task, checked between steps
    pub max_duration: Option<Duration>,

    /// Thoughts shown to the provider, newest first
    pub thought_limit: usize,

    /// Retry policy for completion requests
    pub provider_retry: RetryPolicy,

    /// Contribute `task:done` and `task:fail`
    pub task_actions: bool,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_steps: Some(DEFAULT_MAX_STEPS),
            max_duration: None,
            thought_limit: DEFAULT_THOUGHT_LIMIT,
            provider_retry: RetryPolicy::new(3)
                .with_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(30))
                .with_exponential(Exponential::Enabled(true)),
            task_actions: true,
        }
    }
}

/// Merge the action spaces of `connectors`, in order.
///
/// Fails on a repeated connector id or action name. Nothing is started.
pub fn merge_action_space(
    connectors: &[Arc<dyn Connector>],
) -> std::result::Result<ActionRegistry, ConfigurationError> {
    let mut ids = HashSet::new();
    for connector in connectors {
        if !ids.insert(connector.id()) {
            return Err(ConfigurationError::DuplicateConnectorId(
                connector.id().to_string(),
            ));
        }
    }

    let mut registry = ActionRegistry::new();
    for connector in connectors {
        for definition in connector.action_space() {
            registry.register(connector.id(), definition)?;
        }
    }
    Ok(registry)
}

/// Drives a set of connectors toward a task with a completion provider.
///
/// One decision and one action are in flight at a time. Every connector
/// started by [`start`](Self::start) is stopped exactly once by
/// [`stop`](Self::stop), whichever way the task ended.
pub struct Agent {
    run_id: String,

    /// The decision service
    provider: Arc<dyn CompletionProvider>,

    /// In start order
    connectors: Vec<Arc<dyn Connector>>,

    /// How many leading connectors are currently started
    started: usize,

    /// Merged action space, built by `start`
    registry: ActionRegistry,

    memory: AgentMemory,
    options: AgentOptions,
    events: Arc<EventBus>,
    cancel: CancellationToken,
    status: AgentStatus,
}

impl Agent {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        let options = AgentOptions::default();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            provider,
            connectors: Vec::new(),
            started: 0,
            registry: ActionRegistry::new(),
            memory: AgentMemory::new().with_thought_limit(options.thought_limit),
            options,
            events: Arc::new(EventBus::default()),
            cancel: CancellationToken::new(),
            status: AgentStatus::Idle,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors.push(connector);
        self
    }

    pub fn with_connectors(
        mut self,
        connectors: impl IntoIterator<Item = Arc<dyn Connector>>,
    ) -> Self {
        self.connectors.extend(connectors);
        self
    }

    pub fn with_options(mut self, options: AgentOptions) -> Self {
        self.memory = AgentMemory::new().with_thought_limit(options.thought_limit);
        self.options = options;
        self
    }

    /// Publish lifecycle events on a shared bus.
    pub fn with_event_bus(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Cancel the task from outside. Checked between steps and while
    /// waiting on the provider; a running action always finishes.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start every connector and record the baseline state.
    ///
    /// The action space is merged before any connector starts, so a name
    /// collision never leaves anything running. If a connector fails to
    /// start, the ones already started are stopped in reverse order.
    pub async fn start(&mut self) -> Result<()> {
        if self.status != AgentStatus::Idle {
            return Err(ConfigurationError::InvalidState {
                state: self.status.to_string(),
                expected: AgentStatus::Idle.to_string(),
            }
            .into());
        }

        let mut connectors: Vec<Arc<dyn Connector>> = Vec::new();
        if self.options.task_actions {
            connectors.push(Arc::new(TaskConnector::new()?));
        }
        connectors.extend(self.connectors.iter().cloned());
        self.registry = merge_action_space(&connectors)?;
        self.connectors = connectors;

        for index in 0..self.connectors.len() {
            let connector = Arc::clone(&self.connectors[index]);
            debug!(connector = connector.id(), "Starting connector");
            if let Err(error) = connector.on_start().await {
                warn!(connector = connector.id(), error = %error, "Connector failed to start");
                self.shutdown().await;
                return Err(error);
            }
            self.started += 1;
        }

        match self.observe().await {
            Ok((state, observations)) => {
                self.memory.inscribe_initial_state(state, observations, None);
            }
            Err(error) => {
                warn!(error = %error, "Failed to capture baseline state");
                self.shutdown().await;
                return Err(error);
            }
        }

        self.status = AgentStatus::Started;
        let connectors: Vec<String> = self.connectors.iter().map(|c| c.id().to_string()).collect();
        info!(
            run_id = %self.run_id,
            connectors = ?connectors,
            actions = self.registry.len(),
            "Agent started"
        );
        self.events.publish(AgentEvent::Started {
            run_id: self.run_id.clone(),
            connectors,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Work on `task` until it completes, fails or runs out of budget.
    ///
    /// Errors only when the agent is not ready; everything that goes wrong
    /// inside the loop becomes [`AgentOutcome::Failed`].
    pub async fn act(&mut self, task: &str) -> Result<AgentOutcome> {
        self.act_with(task, StepOptions::default()).await
    }

    /// Like [`act`](Self::act), handing `options.data` to every decision
    /// of this task.
    pub async fn act_with(&mut self, task: &str, options: StepOptions) -> Result<AgentOutcome> {
        self.ensure_ready()?;

        info!(run_id = %self.run_id, task, "Task started");
        self.events.publish(AgentEvent::TaskStarted {
            run_id: self.run_id.clone(),
            task: task.to_string(),
            timestamp: Utc::now(),
        });

        let data = options.test_data();
        let deadline = self.options.max_duration.map(|budget| Instant::now() + budget);
        match self.drive(task, &data, deadline).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => Ok(self.fail(error)),
        }
    }

    /// Ask the provider whether `description` holds for the current state.
    ///
    /// A check that does not hold ends in a `check_failed` failure. A check
    /// that holds leaves the agent ready for the next task or check.
    pub async fn check(&mut self, description: &str) -> Result<AgentOutcome> {
        self.ensure_ready()?;

        info!(run_id = %self.run_id, check = description, "Check started");
        self.events.publish(AgentEvent::CheckStarted {
            run_id: self.run_id.clone(),
            check: description.to_string(),
            timestamp: Utc::now(),
        });

        let ready = self.status;
        self.status = AgentStatus::Deciding;
        match self.evaluate(description).await {
            Ok(true) => {
                self.status = ready;
                info!(run_id = %self.run_id, check = description, "Check passed");
                self.events.publish(AgentEvent::CheckPassed {
                    run_id: self.run_id.clone(),
                    check: description.to_string(),
                    timestamp: Utc::now(),
                });
                Ok(AgentOutcome::Passed {
                    check: description.to_string(),
                })
            }
            Ok(false) => {
                let error = AgentError::check_failed(format!("Check failed: {description}"));
                Ok(self.fail(error))
            }
            Err(error) => Ok(self.fail(error)),
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        if !matches!(self.status, AgentStatus::Started | AgentStatus::Completed) {
            return Err(ConfigurationError::InvalidState {
                state: self.status.to_string(),
                expected: AgentStatus::Started.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Start, work on `task`, and stop, whatever the outcome.
    pub async fn run(&mut self, task: &str) -> Result<AgentOutcome> {
        self.run_with(task, StepOptions::default()).await
    }

    pub async fn run_with(&mut self, task: &str, options: StepOptions) -> Result<AgentOutcome> {
        self.start().await?;
        let outcome = self.act_with(task, options).await;
        if let Err(error) = self.stop().await {
            warn!(run_id = %self.run_id, error = %error, "Connector failed to stop cleanly");
        }
        outcome
    }

    /// Stop every started connector, in reverse start order. Idempotent.
    ///
    /// Every connector is asked to stop even if an earlier one fails; the
    /// first failure is returned.
    pub async fn stop(&mut self) -> Result<()> {
        if self.status == AgentStatus::Stopped {
            return Ok(());
        }
        match self.shutdown().await {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn shutdown(&mut self) -> Option<Error> {
        let mut first_error = None;
        while self.started > 0 {
            self.started -= 1;
            let connector = &self.connectors[self.started];
            debug!(connector = connector.id(), "Stopping connector");
            if let Err(error) = connector.on_stop().await {
                warn!(connector = connector.id(), error = %error, "Connector failed to stop");
                first_error.get_or_insert(error);
            }
        }

        self.status = AgentStatus::Stopped;
        info!(run_id = %self.run_id, "Agent stopped");
        self.events.publish(AgentEvent::Stopped {
            run_id: self.run_id.clone(),
            timestamp: Utc::now(),
        });
        first_error
    }

    async fn drive(
        &mut self,
        task: &str,
        data: &TestData,
        deadline: Option<Instant>,
    ) -> std::result::Result<AgentOutcome, AgentError> {
        let mut steps: u32 = 0;
        loop {
            self.check_budgets(steps, deadline)?;

            self.status = AgentStatus::Deciding;
            let Decision { thought, action } = self.decide(task, data).await?;
            if let Some(thought) = thought {
                debug!(run_id = %self.run_id, thought = %thought, "Thought recorded");
                self.memory.record_thought(thought.clone(), None);
                self.events.publish(AgentEvent::ThoughtRecorded {
                    run_id: self.run_id.clone(),
                    thought,
                    timestamp: Utc::now(),
                });
            }

            self.status = AgentStatus::Acting;
            let step = steps;
            steps += 1;
            let description = self.registry.describe(&action);
            info!(run_id = %self.run_id, step, action = %action.name, "{description}");
            self.events.publish(AgentEvent::ActionStarted {
                run_id: self.run_id.clone(),
                step,
                action: action.clone(),
                description: description.clone(),
                timestamp: Utc::now(),
            });

            let ctx = ActionContext {
                last_thought: self.memory.last_thought_message().map(str::to_string),
                step,
                action: action.name.clone(),
            };
            let began = Instant::now();
            let outcome = self
                .registry
                .dispatch(&action, ctx)
                .await
                .map_err(|e| attribute(e, &action))?;

            let turn = Turn::new(action.clone(), description);
            let evidence = match outcome {
                ActionOutcome::Continue(mut observations) => {
                    let (state, fresh) = self.observe().await.map_err(|e| attribute(e, &action))?;
                    observations.extend(fresh);
                    self.memory
                        .record_turn(turn.with_observations(observations).with_state(state), None);
                    None
                }
                ActionOutcome::Complete { evidence } => {
                    self.memory.record_turn(turn, None);
                    Some(evidence)
                }
            };

            self.events.publish(AgentEvent::ActionDone {
                run_id: self.run_id.clone(),
                step,
                action,
                duration_ms: began.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            });

            if let Some(evidence) = evidence {
                self.status = AgentStatus::Completed;
                info!(run_id = %self.run_id, steps, evidence = %evidence, "Task completed");
                self.events.publish(AgentEvent::Completed {
                    run_id: self.run_id.clone(),
                    evidence: evidence.clone(),
                    steps,
                    timestamp: Utc::now(),
                });
                return Ok(AgentOutcome::Completed { evidence, steps });
            }
        }
    }

    fn check_budgets(
        &self,
        steps: u32,
        deadline: Option<Instant>,
    ) -> std::result::Result<(), AgentError> {
        if self.cancel.is_cancelled() {
            return Err(AgentError::new(
                FailureVariant::Cancelled,
                format!("Cancelled after {steps} steps"),
            ));
        }
        if let Some(max) = self.options.max_steps {
            if steps >= max {
                return Err(AgentError::new(
                    FailureVariant::BudgetExhausted,
                    format!("Step budget of {max} exhausted"),
                ));
            }
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                let budget = self.options.max_duration.unwrap_or_default();
                return Err(AgentError::new(
                    FailureVariant::BudgetExhausted,
                    format!("Time budget of {}s exhausted", budget.as_secs_f64()),
                ));
            }
        }
        Ok(())
    }

    async fn decide(
        &self,
        task: &str,
        data: &TestData,
    ) -> std::result::Result<Decision, AgentError> {
        let context = self.context().await?;
        let request = DecisionRequest {
            task: task.to_string(),
            instructions: self.instructions(),
            context,
            actions: self.registry.specs(),
            schema: self.registry.decision_schema(),
            data: data.clone(),
        };
        debug!(
            provider = self.provider.name(),
            history = request.context.history.len(),
            images = request.context.image_count(),
            "Requesting decision"
        );

        let provider = &self.provider;
        self.ask("decision", move || provider.decide(request.clone())).await
    }

    async fn evaluate(&self, check: &str) -> std::result::Result<bool, AgentError> {
        let request = CheckRequest {
            check: check.to_string(),
            instructions: self.instructions(),
            context: self.context().await?,
        };
        debug!(
            provider = self.provider.name(),
            images = request.context.image_count(),
            "Requesting check verdict"
        );

        let provider = &self.provider;
        self.ask("check", move || provider.evaluate_check(request.clone())).await
    }

    async fn context(&self) -> std::result::Result<MemoryContext, AgentError> {
        self.memory
            .build_context(&self.connectors)
            .await
            .map_err(classify)
    }

    fn instructions(&self) -> Vec<String> {
        self.connectors.iter().filter_map(|c| c.instructions()).collect()
    }

    /// Call the provider under the retry policy, giving up on cancellation.
    async fn ask<T, F, Fut>(&self, what: &str, call: F) -> std::result::Result<T, AgentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, ProviderError>>,
    {
        let provider = self.provider.name();
        let retry = Retry::new(self.options.provider_retry.clone())
            .retry_if(ProviderError::is_retryable)
            .on_retry(|error, attempt| {
                warn!(provider, attempt, error = %error, "Provider {what} failed, retrying");
            });

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(AgentError::new(
                FailureVariant::Cancelled,
                format!("Cancelled while waiting for a {what}"),
            )),
            answer = retry.call(call) => answer.map_err(|e| classify(e.into())),
        }
    }

    /// Current state and fresh observations from every connector.
    async fn observe(&self) -> Result<(AgentState, Vec<Observation>)> {
        let mut state = AgentState::new();
        let mut observations = Vec::new();
        for connector in &self.connectors {
            state.merge(connector.capture_state().await?);
            observations.extend(connector.collect_observations().await?);
        }
        Ok((state, observations))
    }

    fn fail(&mut self, error: AgentError) -> AgentOutcome {
        self.status = AgentStatus::Failed;
        warn!(
            run_id = %self.run_id,
            variant = %error.variant,
            action = ?error.action.as_ref().map(|a| a.name.as_str()),
            "Task failed: {}",
            error.message
        );
        self.events.publish(AgentEvent::Failed {
            run_id: self.run_id.clone(),
            variant: error.variant,
            reason: error.message.clone(),
            timestamp: Utc::now(),
        });
        AgentOutcome::Failed(FailureRecord::from(error))
    }
}

/// Classify `error` and blame `action` unless something more specific was named.
fn attribute(error: Error, action: &Action) -> AgentError {
    let mut error = classify(error);
    if error.action.is_none() {
        error.action = Some(action.clone());
    }
    error
}
