use crate::context::{ConversationContext, Role};
use crate::dispatcher::MessageDispatcher;
use crate::error::Result;
use crate::generator::{ReplyGenerator, ReplyRequest};
use crate::observer::MessageObserver;
use crate::types::{IncomingMessage, OutgoingMessage, Profile};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    Opening,
    Waiting,
    Generating,
    Dispatching,
    Closing,
    Done,
    Failed,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversationState::Idle => "idle",
            ConversationState::Opening => "opening",
            ConversationState::Waiting => "waiting",
            ConversationState::Generating => "generating",
            ConversationState::Dispatching => "dispatching",
            ConversationState::Closing => "closing",
            ConversationState::Done => "done",
            ConversationState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Fixed inputs of one run.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub opener: String,
    pub turns: u32,
    pub user_profile: Profile,
    pub partner_profile: Profile,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub turns_completed: u32,
    pub last_partner_message: IncomingMessage,
}

pub struct Orchestrator {
    observer: MessageObserver,
    dispatcher: MessageDispatcher,
    generator: Box<dyn ReplyGenerator>,
    params: RunParams,
    context: ConversationContext,
    state: ConversationState,
    turns_completed: u32,
}

impl Orchestrator {
    pub fn new(
        observer: MessageObserver,
        dispatcher: MessageDispatcher,
        generator: Box<dyn ReplyGenerator>,
        params: RunParams,
    ) -> Self {
        Self {
            observer,
            dispatcher,
            generator,
            params,
            context: ConversationContext::new(),
            state: ConversationState::Idle,
            turns_completed: 0,
        }
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn turns_completed(&self) -> u32 {
        self.turns_completed
    }

    /// Drives the whole exchange once. Any error leaves the orchestrator in
    /// [`ConversationState::Failed`]; there is no resuming.
    pub async fn run(&mut self) -> Result<RunSummary> {
        match self.drive().await {
            Ok(summary) => {
                self.transition(ConversationState::Done);
                Ok(summary)
            }
            Err(err) => {
                tracing::error!(state = %self.state, error = %err, "conversation failed");
                self.transition(ConversationState::Failed);
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<RunSummary> {
        self.transition(ConversationState::Opening);
        let opener = OutgoingMessage::text(self.params.opener.clone());
        self.context.push(Role::User, self.params.opener.clone());
        self.dispatcher.dispatch(&opener).await?;

        let mut previous = IncomingMessage::default();
        for turn in 1..=self.params.turns {
            tracing::debug!(turn, of = self.params.turns, "turn started");

            self.transition(ConversationState::Waiting);
            previous = self.observer.observe(&previous).await?;

            self.transition(ConversationState::Generating);
            let request = ReplyRequest {
                partner_text: previous.text_or_empty(),
                user_profile: &self.params.user_profile,
                partner_profile: &self.params.partner_profile,
                has_image: previous.has_image,
            };
            let reply = self.generator.generate(&mut self.context, request).await?;
            reply.delivery()?;

            self.transition(ConversationState::Dispatching);
            self.dispatcher.dispatch(&reply).await?;
            self.turns_completed = turn;
        }

        self.transition(ConversationState::Closing);
        let last = self.observer.observe(&previous).await?;

        Ok(RunSummary {
            turns_completed: self.turns_completed,
            last_partner_message: last,
        })
    }

    fn transition(&mut self, next: ConversationState) {
        tracing::debug!(from = %self.state, to = %next, "state change");
        self.state = next;
    }
}
