use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Error, Result, bail};

use super::prompt;
use crate::core::AppConfig;
use crate::credentials::CredentialManager;
use crate::openai::{self, CompletionOptions, Role};
use crate::session::{Message, RequestId, SessionHandle};

/// Lifecycle of one AI request. There is no way back from a terminal
/// state and no retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    /// The triggering user message is in the list
    Sent,
    /// Placeholder shown, request in flight
    Awaiting,
    Resolved,
    Failed,
}

impl RequestState {
    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Idle, Sent) | (Sent, Awaiting) | (Awaiting, Resolved) | (Awaiting, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Resolved | RequestState::Failed)
    }
}

struct RequestTracker {
    id: RequestId,
    state: RequestState,
}

impl RequestTracker {
    fn new(id: RequestId) -> Self {
        Self {
            id,
            state: RequestState::Idle,
        }
    }

    fn advance(&mut self, next: RequestState) -> Result<(), Error> {
        if !self.state.can_transition_to(next) {
            bail!(
                "Illegal transition {:?} -> {:?} for {}",
                self.state,
                next,
                self.id
            );
        }
        tracing::debug!("{}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        Ok(())
    }
}

/// What `AiBridge::respond` ended up appending.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// No key configured, the advisory was posted
    Disabled(Message),
    Resolved(Message),
    Failed(Message),
}

impl Outcome {
    pub fn message(&self) -> &Message {
        match self {
            Outcome::Disabled(m) | Outcome::Resolved(m) | Outcome::Failed(m) => m,
        }
    }

    pub fn state(&self) -> RequestState {
        match self {
            Outcome::Disabled(_) => RequestState::Idle,
            Outcome::Resolved(_) => RequestState::Resolved,
            Outcome::Failed(_) => RequestState::Failed,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub api_hostname: String,
    pub system_message: String,
    /// How many prior messages are sent along as context
    pub context_window: usize,
    pub options: CompletionOptions,
}

impl From<&AppConfig> for BridgeConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_hostname: config.openai_api_hostname.clone(),
            system_message: config.system_message.clone(),
            context_window: config.context_window,
            options: CompletionOptions {
                model: config.openai_model.clone(),
                max_tokens: Some(config.max_tokens),
                temperature: Some(config.temperature),
                timeout: Duration::from_secs(config.request_timeout_secs),
            },
        }
    }
}

/// Forwards user messages to the chat completion API and posts the
/// replies back into the session.
///
/// Cloning is cheap and clones share the request id counter, so
/// overlapping calls to `respond` never hand out the same id.
#[derive(Clone)]
pub struct AiBridge {
    config: BridgeConfig,
    credentials: CredentialManager,
    next_id: Arc<AtomicU64>,
}

impl AiBridge {
    pub fn new(config: BridgeConfig, credentials: CredentialManager) -> Self {
        Self {
            config,
            credentials,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// The role tagged transcript for a request: the last
    /// `context_window` settled messages followed by `trigger`.
    pub fn build_context(&self, history: &[Message], trigger: &Message) -> Vec<openai::Message> {
        let settled: Vec<&Message> = history.iter().filter(|m| !m.is_placeholder()).collect();
        let start = settled.len().saturating_sub(self.config.context_window);

        let mut context: Vec<openai::Message> = settled[start..]
            .iter()
            .map(|m| {
                let role = if m.is_ai() { Role::Assistant } else { Role::User };
                openai::Message::new(role, &prompt::context_line(m))
            })
            .collect();
        context.push(openai::Message::new(
            Role::User,
            &prompt::context_line(trigger),
        ));
        context
    }

    async fn request_reply(
        &self,
        api_key: &str,
        context: Vec<openai::Message>,
    ) -> Result<String, Error> {
        let mut messages = vec![openai::Message::new(
            Role::System,
            &self.config.system_message,
        )];
        messages.extend(context);

        let resp = openai::completion(
            &messages,
            &self.config.options,
            &self.config.api_hostname,
            api_key,
        )
        .await?;

        let text = openai::first_choice_content(&resp)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(prompt::NO_RESPONSE_FALLBACK);
        Ok(text.to_string())
    }

    /// Answer `trigger`, which must already be in the session. Network
    /// and API failures end up in the chat as an error message rather
    /// than as an `Err`; only storage failures are returned.
    pub async fn respond(&self, session: &SessionHandle, trigger: &Message) -> Result<Outcome, Error> {
        let Some(api_key) = self.credentials.resolve().await? else {
            let advisory = Message::ai(prompt::DISABLED_ADVISORY);
            session.append(advisory.clone()).await?;
            return Ok(Outcome::Disabled(advisory));
        };

        let mut tracker = RequestTracker::new(self.next_request_id());
        tracker.advance(RequestState::Sent)?;

        let history = session.messages().await;
        let context = self.build_context(&history, trigger);

        session
            .append(Message::placeholder(tracker.id, prompt::THINKING))
            .await?;
        tracker.advance(RequestState::Awaiting)?;

        let (reply, state) = match self.request_reply(&api_key, context).await {
            Ok(text) => (Message::ai(&text), RequestState::Resolved),
            Err(e) => {
                tracing::error!("AI request {} failed: {}", tracker.id, e);
                (
                    Message::ai(&prompt::error_reply(&e.to_string())),
                    RequestState::Failed,
                )
            }
        };

        // The placeholder must not outlive the request, even when the
        // reply can't be saved
        if let Err(e) = session.replace_placeholder(tracker.id, reply.clone()).await {
            session.discard_placeholder(tracker.id).await;
            return Err(e);
        }
        tracker.advance(state)?;

        Ok(match state {
            RequestState::Resolved => Outcome::Resolved(reply),
            _ => Outcome::Failed(reply),
        })
    }
}
