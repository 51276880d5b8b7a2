use async_trait::async_trait;
use log::{ info, warn };
use std::sync::Arc;

use crate::config::prompt::PromptConfig;
use crate::error::{ ExchangeError, SessionError };
use crate::models::chat::ChatMessage;
use crate::models::conversation::{ ConversationTurn, Part };

/// Produces the model's next reply for a conversation.
#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn reply(
        &self,
        history: &[ConversationTurn],
        text: &str
    ) -> Result<String, ExchangeError>;
}

/// An exchange that has been rendered but not yet answered. Carries the history as it
/// was when the user submitted, so the request can run without holding the state.
#[derive(Debug)]
pub struct PendingExchange {
    pub text: String,
    pub history: Arc<Vec<ConversationTurn>>,
}

/// History and transcript of one chat session.
///
/// `history` is what gets replayed to the model; `transcript` is what gets rendered. The
/// seed pair lives only in `history`. Both are append-only until the state is dropped.
#[derive(Debug, Clone)]
pub struct ConversationState {
    history: Vec<ConversationTurn>,
    transcript: Vec<ChatMessage>,
    in_flight: bool,
    apology: String,
}

impl ConversationState {
    /// Seeds the history with the image so later turns never re-send it.
    pub fn seeded(image_base64: &str, prompts: &PromptConfig) -> Self {
        let history = vec![
            ConversationTurn::user(vec![
                Part::jpeg(image_base64),
                Part::text(prompts.seed_caption.clone())
            ]),
            ConversationTurn::model_text(prompts.seed_acknowledgment.clone())
        ];
        Self {
            history,
            transcript: Vec::new(),
            in_flight: false,
            apology: prompts.chat_apology.clone(),
        }
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Renders the user's message and marks the session busy.
    pub fn begin_exchange(&mut self, text: &str) -> Result<PendingExchange, SessionError> {
        if self.in_flight {
            return Err(SessionError::Busy);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        self.in_flight = true;
        self.transcript.push(ChatMessage::user(text));
        Ok(PendingExchange {
            text: text.to_string(),
            history: Arc::new(self.history.clone()),
        })
    }

    /// Applies the outcome of a pending exchange and returns the rendered model entry.
    /// A failed exchange renders the apology and leaves the history as it was.
    pub fn complete_exchange(
        &mut self,
        pending: PendingExchange,
        outcome: Result<String, ExchangeError>
    ) -> &ChatMessage {
        self.in_flight = false;
        match outcome {
            Ok(reply) => {
                self.history.push(ConversationTurn::user_text(pending.text));
                self.history.push(ConversationTurn::model_text(reply.clone()));
                self.transcript.push(ChatMessage::model(reply));
                info!("Chat exchange complete, history now {} turns", self.history.len());
            }
            Err(e) => {
                warn!("Chat exchange failed, history left unchanged: {}", e);
                self.transcript.push(ChatMessage::model(self.apology.clone()));
            }
        }
        &self.transcript[self.transcript.len() - 1]
    }

    /// Runs one full exchange against `responder`.
    pub async fn exchange<R: ChatResponder + ?Sized>(
        &mut self,
        responder: &R,
        text: &str
    ) -> Result<&ChatMessage, SessionError> {
        let pending = self.begin_exchange(text)?;
        let outcome = responder.reply(&pending.history, &pending.text).await;
        Ok(self.complete_exchange(pending, outcome))
    }
}
