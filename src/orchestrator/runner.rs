//! The step loop.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, warn};

use super::events::{ConversationEventEmitter, ConversationEventPayload, ConversationEventSink};
use super::tooling::{error_result, execute_tool_call, ToolExecutionOutcome};
use super::types::{OrchestratorConfig, TurnOutcome};
use crate::conversation::{Conversation, FoldEffect, TurnStatus};
use crate::error::ToolStreamError;
use crate::tools::{ExecutionMode, ToolExecutionContext, ToolRegistry};
use crate::transport::{sanitize_history, ChatRequest, Transport};
use crate::types::{InvocationPhase, MessageStatus, StreamEvent, ToolInvocation};

/// How a single request/stream cycle ended.
enum StepEnd {
    /// Stream terminated and every client handler settled.
    Settled,
    /// The turn was canceled mid-step.
    Interrupted,
}

/// What to do after a settled step.
enum Decision {
    Finish(TurnStatus),
    Continue,
}

/// Client handlers running for the current step, keyed by task so a task
/// that dies without reporting can still be matched to its call.
#[derive(Default)]
struct RunningTools {
    tasks: JoinSet<ToolExecutionOutcome>,
    calls: HashMap<Id, (String, String)>,
}

/// A handler task that finished, successfully or not.
struct FinishedTool {
    tool_call_id: String,
    tool_name: String,
    joined: Result<ToolExecutionOutcome, JoinError>,
}

impl RunningTools {
    fn spawn<F>(&mut self, tool_call_id: &str, tool_name: &str, task: F)
    where
        F: Future<Output = ToolExecutionOutcome> + Send + 'static,
    {
        let handle = self.tasks.spawn(task);
        self.calls
            .insert(handle.id(), (tool_call_id.to_string(), tool_name.to_string()));
    }

    fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn abort_all(&mut self) {
        self.tasks.abort_all();
    }

    async fn join_next(&mut self) -> Option<FinishedTool> {
        let (id, joined) = match self.tasks.join_next_with_id().await? {
            Ok((id, outcome)) => (id, Ok(outcome)),
            Err(err) => (err.id(), Err(err)),
        };
        let (tool_call_id, tool_name) = self.calls.remove(&id).unwrap_or_default();
        Some(FinishedTool {
            tool_call_id,
            tool_name,
            joined,
        })
    }
}

/// Drives a conversation through generation steps until the turn settles.
///
/// Stateless between calls: all turn state lives in the [`Conversation`]
/// passed in, so one orchestrator can serve many conversations.
pub struct StepOrchestrator {
    transport: Arc<dyn Transport>,
    registry: Arc<ToolRegistry>,
    config: OrchestratorConfig,
    event_sink: Option<ConversationEventSink>,
}

impl StepOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<ToolRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            config,
            event_sink: None,
        }
    }

    pub fn with_event_sink(mut self, sink: ConversationEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run a new turn, starting at step 0, after a user message was pushed.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<TurnOutcome, ToolStreamError> {
        match conversation.status() {
            TurnStatus::Idle => {}
            TurnStatus::AwaitingConfirmation => {
                return Err(ToolStreamError::InvalidState(format!(
                    "turn is waiting on {} confirmation(s); submit results instead",
                    conversation.pending_confirmations().len()
                )))
            }
            other => {
                return Err(ToolStreamError::InvalidState(format!(
                    "turn is {other}; push a new message to start another"
                )))
            }
        }
        if conversation.messages().is_empty() {
            return Err(ToolStreamError::InvalidArgument(
                "conversation has no messages".into(),
            ));
        }
        let emitter = self.emitter(conversation);
        self.drive(conversation, &emitter).await
    }

    /// Bind an externally supplied result. When it resolves the last pending
    /// confirmation of a suspended turn, the turn resumes and its outcome is
    /// returned; otherwise `None`.
    pub async fn submit_result(
        &self,
        conversation: &mut Conversation,
        tool_call_id: &str,
        result: Value,
    ) -> Result<Option<TurnOutcome>, ToolStreamError> {
        conversation.submit_result(tool_call_id, result)?;
        let emitter = self.emitter(conversation);
        if emitter.is_enabled() {
            if let Some(message) = conversation
                .messages()
                .iter()
                .rev()
                .find(|message| message.tool_invocation(tool_call_id).is_some())
            {
                emitter.emit(ConversationEventPayload::MessageUpdated {
                    message: message.clone(),
                });
            }
        }
        if conversation.status() == TurnStatus::AwaitingConfirmation
            && conversation.pending_confirmations().is_empty()
        {
            return self.continue_suspended(conversation, &emitter).await.map(Some);
        }
        Ok(None)
    }

    /// Resume a suspended turn whose confirmations were all bound through
    /// [`Conversation::submit_result`].
    pub async fn resume(&self, conversation: &mut Conversation) -> Result<TurnOutcome, ToolStreamError> {
        if conversation.status() != TurnStatus::AwaitingConfirmation {
            return Err(ToolStreamError::InvalidState(format!(
                "turn is {}, not awaiting confirmation",
                conversation.status()
            )));
        }
        let pending = conversation.pending_confirmations();
        if !pending.is_empty() {
            return Err(ToolStreamError::InvalidState(format!(
                "{} confirmation(s) still pending",
                pending.len()
            )));
        }
        let emitter = self.emitter(conversation);
        self.continue_suspended(conversation, &emitter).await
    }

    fn emitter(&self, conversation: &Conversation) -> ConversationEventEmitter {
        ConversationEventEmitter::new(conversation.id(), self.event_sink.clone())
    }

    /// The suspended step already earned its continuation; issue it.
    async fn continue_suspended(
        &self,
        conversation: &mut Conversation,
        emitter: &ConversationEventEmitter,
    ) -> Result<TurnOutcome, ToolStreamError> {
        debug!(conversation_id = %conversation.id(), step = conversation.step(), "resuming after confirmation");
        conversation.advance_step();
        self.drive(conversation, emitter).await
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        emitter: &ConversationEventEmitter,
    ) -> Result<TurnOutcome, ToolStreamError> {
        loop {
            if conversation.abort_handle().is_aborted() {
                // A fresh turn has no response of its own yet.
                if conversation.status() != TurnStatus::Idle {
                    conversation.interrupt_last_response();
                }
                return Ok(self.finish(conversation, TurnStatus::Interrupted, emitter));
            }

            let step = conversation.step();
            debug!(conversation_id = %conversation.id(), step, "step start");
            emitter.emit(ConversationEventPayload::StepStarted { step });

            let ended = self.run_step(conversation, emitter).await;
            let decision = match ended {
                Ok(StepEnd::Interrupted) => {
                    conversation.commit_response(Some(MessageStatus::Interrupted));
                    emitter.emit(ConversationEventPayload::StepFinished { step });
                    return Ok(self.finish(conversation, TurnStatus::Interrupted, emitter));
                }
                Ok(StepEnd::Settled) => self.decide(conversation),
                Err(err) => Err(err),
            };

            let decision = match decision {
                Ok(decision) => decision,
                Err(err) => {
                    conversation.commit_response(Some(MessageStatus::Failed));
                    emitter.emit(ConversationEventPayload::StepFinished { step });
                    self.fail(conversation, &err, emitter);
                    return Err(err);
                }
            };
            conversation.commit_response(None);
            emitter.emit(ConversationEventPayload::StepFinished { step });

            match decision {
                Decision::Finish(status) => {
                    return Ok(self.finish(conversation, status, emitter));
                }
                Decision::Continue => {
                    debug!(conversation_id = %conversation.id(), step, "all tool calls resolved; continuing");
                    conversation.advance_step();
                }
            }
        }
    }

    async fn run_step(
        &self,
        conversation: &mut Conversation,
        emitter: &ConversationEventEmitter,
    ) -> Result<StepEnd, ToolStreamError> {
        let request = ChatRequest::new(
            conversation.id(),
            sanitize_history(conversation.messages()),
            conversation.step(),
        );
        conversation.begin_response()?;
        let cancel = conversation.cancellation_token();

        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StepEnd::Interrupted),
            sent = self.transport.send(&request) => sent?,
        };

        // Dropping the set aborts any handler still running.
        let mut handlers = RunningTools::default();
        let mut stream_open = true;

        while stream_open || !handlers.is_empty() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    stream.cancel();
                    handlers.abort_all();
                    debug!(conversation_id = %conversation.id(), step = request.step, "step canceled");
                    return Ok(StepEnd::Interrupted);
                }
                Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                    self.bind_handler_outcome(conversation, finished, emitter);
                }
                next = stream.next(), if stream_open => match next {
                    Some(Ok(event)) => {
                        if let Err(err) = self.apply(conversation, event, &mut handlers, emitter) {
                            stream.cancel();
                            return Err(err);
                        }
                    }
                    Some(Err(err)) => {
                        warn!(conversation_id = %conversation.id(), step = request.step, error = %err, "response stream failed");
                        stream.cancel();
                        return Err(err);
                    }
                    None => {
                        stream_open = false;
                        let terminated = conversation
                            .active()
                            .is_some_and(|fold| fold.is_done() || fold.error().is_some());
                        if !terminated {
                            return Err(ToolStreamError::Transport(
                                "response stream ended before a done or error event".into(),
                            ));
                        }
                    }
                },
            }
        }
        Ok(StepEnd::Settled)
    }

    fn apply(
        &self,
        conversation: &mut Conversation,
        event: StreamEvent,
        handlers: &mut RunningTools,
        emitter: &ConversationEventEmitter,
    ) -> Result<(), ToolStreamError> {
        let applied = emitter.is_enabled().then(|| event.clone());
        let effect = match conversation.apply_event(event) {
            Ok(effect) => effect,
            Err(ToolStreamError::DuplicateResolution { tool_call_id }) => {
                warn!(
                    conversation_id = %conversation.id(),
                    %tool_call_id,
                    "tool call already resolved; streamed result dropped"
                );
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        if let Some(event) = applied {
            emitter.emit(ConversationEventPayload::EventApplied { event });
        }
        match &effect {
            FoldEffect::Ignored => return Ok(()),
            FoldEffect::ToolCallReady { tool_call_id, .. } => {
                self.dispatch(conversation, tool_call_id, handlers, emitter);
            }
            _ => {}
        }
        self.emit_streaming_snapshot(conversation, emitter);
        Ok(())
    }

    /// Route a call that just reached `call` state by its execution mode.
    fn dispatch(
        &self,
        conversation: &Conversation,
        tool_call_id: &str,
        handlers: &mut RunningTools,
        emitter: &ConversationEventEmitter,
    ) {
        let Some(call) = conversation
            .streaming_message()
            .and_then(|message| message.tool_invocation(tool_call_id))
        else {
            return;
        };
        let Some(entry) = self.registry.get(call.tool_name()) else {
            warn!(tool_call_id, tool = call.tool_name(), "no tool registered under this name");
            return;
        };

        match entry.mode() {
            ExecutionMode::ServerAuto => {
                debug!(tool_call_id, tool = call.tool_name(), "awaiting server-side result");
            }
            ExecutionMode::ClientConfirm => {
                emitter.emit(ConversationEventPayload::ConfirmationRequired {
                    tool_call_id: tool_call_id.to_string(),
                    tool_name: call.tool_name().to_string(),
                    args: call.args().clone(),
                });
            }
            ExecutionMode::ClientAuto => {
                let Some(tool) = entry.handler().cloned() else {
                    warn!(tool_call_id, tool = call.tool_name(), "client tool has no handler");
                    return;
                };
                emitter.emit(ConversationEventPayload::ToolExecutionStarted {
                    tool_call_id: tool_call_id.to_string(),
                    tool_name: call.tool_name().to_string(),
                    args: call.args().clone(),
                });
                let ctx = ToolExecutionContext::new(conversation.id(), tool_call_id, conversation.step());
                let timeout = entry.timeout().or(self.config.tool_timeout);
                handlers.spawn(
                    tool_call_id,
                    call.tool_name(),
                    execute_tool_call(tool, call.args().clone(), ctx, timeout),
                );
            }
        }
    }

    fn bind_handler_outcome(
        &self,
        conversation: &mut Conversation,
        finished: FinishedTool,
        emitter: &ConversationEventEmitter,
    ) {
        let outcome = match finished.joined {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    conversation_id = %conversation.id(),
                    tool_call_id = %finished.tool_call_id,
                    error = %err,
                    "tool task ended without a result"
                );
                ToolExecutionOutcome {
                    tool_call_id: finished.tool_call_id,
                    tool_name: finished.tool_name,
                    result: error_result(format!("Tool task failed: {err}")),
                    is_error: true,
                }
            }
        };
        emitter.emit(ConversationEventPayload::ToolExecutionFinished {
            tool_call_id: outcome.tool_call_id.clone(),
            tool_name: outcome.tool_name.clone(),
            result: outcome.result.clone(),
            is_error: outcome.is_error,
        });
        match conversation.submit_result(&outcome.tool_call_id, outcome.result) {
            Ok(()) => self.emit_streaming_snapshot(conversation, emitter),
            Err(ToolStreamError::DuplicateResolution { tool_call_id }) => {
                warn!(%tool_call_id, "tool call already resolved; handler result dropped");
            }
            Err(err) => {
                warn!(tool_call_id = %outcome.tool_call_id, error = %err, "could not bind handler result");
            }
        }
    }

    fn decide(&self, conversation: &Conversation) -> Result<Decision, ToolStreamError> {
        let fold = conversation
            .active()
            .ok_or_else(|| ToolStreamError::InvalidState("no response to settle".into()))?;
        let calls: Vec<&ToolInvocation> = fold.message().tool_invocations().collect();

        if let Some(call) = calls
            .iter()
            .find(|call| call.phase() == InvocationPhase::PartialCall)
        {
            return Err(ToolStreamError::IncompleteToolCall {
                tool_call_id: call.tool_call_id().to_string(),
            });
        }
        if let Some(message) = fold.error() {
            return Err(ToolStreamError::Stream(message.to_string()));
        }
        if calls.is_empty() {
            return Ok(Decision::Finish(TurnStatus::Completed));
        }

        let unresolved: Vec<&ToolInvocation> = calls
            .iter()
            .copied()
            .filter(|call| call.phase() == InvocationPhase::Call)
            .collect();
        if let Some(call) = unresolved
            .iter()
            .find(|call| !self.registry.contains(call.tool_name()))
        {
            return Err(ToolStreamError::UnregisteredTool {
                tool_name: call.tool_name().to_string(),
                tool_call_id: call.tool_call_id().to_string(),
            });
        }
        if !self.config.budget.allows_continuation(conversation.step()) {
            debug!(
                conversation_id = %conversation.id(),
                step = conversation.step(),
                max_steps = self.config.max_steps(),
                unresolved = unresolved.len(),
                "step limit reached"
            );
            return Ok(Decision::Finish(TurnStatus::StepLimitReached));
        }
        if let Some(call) = unresolved
            .iter()
            .find(|call| self.registry.mode(call.tool_name()) == Some(ExecutionMode::ServerAuto))
        {
            return Err(ToolStreamError::protocol(format!(
                "server-executed tool call {} ({}) finished without a result",
                call.tool_call_id(),
                call.tool_name()
            )));
        }
        if !unresolved.is_empty() {
            return Ok(Decision::Finish(TurnStatus::AwaitingConfirmation));
        }
        Ok(Decision::Continue)
    }

    fn finish(
        &self,
        conversation: &mut Conversation,
        status: TurnStatus,
        emitter: &ConversationEventEmitter,
    ) -> TurnOutcome {
        conversation.set_status(status);
        let pending = conversation.pending_confirmations();
        debug!(
            conversation_id = %conversation.id(),
            status = %status,
            steps = conversation.requests(),
            pending = pending.len(),
            "turn settled"
        );
        emitter.emit(ConversationEventPayload::TurnFinished {
            status,
            error: None,
        });
        TurnOutcome {
            status,
            steps: conversation.requests(),
            usage: conversation.turn_usage(),
            pending,
        }
    }

    fn fail(&self, conversation: &mut Conversation, err: &ToolStreamError, emitter: &ConversationEventEmitter) {
        conversation.set_status(TurnStatus::Failed);
        warn!(
            conversation_id = %conversation.id(),
            step = conversation.step(),
            error = %err,
            category = ?err.category(),
            "turn failed"
        );
        emitter.emit(ConversationEventPayload::TurnFinished {
            status: TurnStatus::Failed,
            error: Some(err.to_string()),
        });
    }

    fn emit_streaming_snapshot(&self, conversation: &Conversation, emitter: &ConversationEventEmitter) {
        if !emitter.is_enabled() {
            return;
        }
        if let Some(message) = conversation.streaming_message() {
            emitter.emit(ConversationEventPayload::MessageUpdated {
                message: message.clone(),
            });
        }
    }
}

impl std::fmt::Debug for StepOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepOrchestrator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
