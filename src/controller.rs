//! Conversation controller
//!
//! Drives the pure state machine: applies user actions and transport signals,
//! publishes each new snapshot, then executes the resulting effects.

use crate::config::ClientConfig;
use crate::conversation::{
    transition, ConvContext, ConversationState, Effect, Event, TransitionError,
};
use crate::transport::{
    ChatBackend, ChatRequest, ExchangeId, HttpBackend, StreamTransport, TransportError,
    TransportSignal,
};
use tokio::sync::{broadcast, mpsc, watch};

/// Capacity of the notice channel; slow receivers miss old notices
const NOTICE_CAPACITY: usize = 32;

/// Transient messages shown next to the transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The answer ended with an error
    Error { message: String },
    /// A user action was refused
    Rejected { message: String },
}

/// Owns one conversation session and its transport
pub struct ConversationController<B: ChatBackend + 'static> {
    context: ConvContext,
    state: ConversationState,
    transport: StreamTransport<B>,
    signal_tx: mpsc::UnboundedSender<TransportSignal>,
    signal_rx: mpsc::UnboundedReceiver<TransportSignal>,
    state_tx: watch::Sender<ConversationState>,
    notice_tx: broadcast::Sender<Notice>,
}

impl ConversationController<HttpBackend> {
    /// Controller talking to the configured server over HTTP
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let backend = HttpBackend::new(config)?;
        tracing::info!(
            url = %backend.url(),
            kb_id = %config.kb_id,
            timeout_secs = config.timeout.as_secs(),
            "Chat client configured"
        );
        Ok(Self::with_transport(
            ConvContext::new(config.kb_id.clone(), config.surface),
            StreamTransport::new(backend).with_timeout(config.timeout),
        ))
    }
}

impl<B: ChatBackend + 'static> ConversationController<B> {
    pub fn new(context: ConvContext, backend: B) -> Self {
        Self::with_transport(context, StreamTransport::new(backend))
    }

    pub fn with_transport(context: ConvContext, transport: StreamTransport<B>) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConversationState::default());
        let (notice_tx, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            context,
            state: ConversationState::default(),
            transport,
            signal_tx,
            signal_rx,
            state_tx,
            notice_tx,
        }
    }

    pub fn context(&self) -> &ConvContext {
        &self.context
    }

    /// Current snapshot
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe_state(&self) -> watch::Receiver<ConversationState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    /// Ask a question.
    ///
    /// Refused while another question is being answered or when `text` is
    /// blank. `reset_history` drops all previous turns first.
    pub async fn submit_question(
        &mut self,
        text: impl Into<String>,
        reset_history: bool,
    ) -> Result<(), TransitionError> {
        self.dispatch(Event::UserQuestion {
            text: text.into(),
            reset_history,
        })
        .await
    }

    /// Stop the answer in flight, keeping what arrived so far
    pub async fn cancel(&mut self) {
        if let Err(e) = self.dispatch(Event::UserCancel).await {
            tracing::warn!(error = %e, "Cancel refused");
        }
    }

    /// Forget the transcript and the server-side session
    pub async fn new_conversation(&mut self) {
        if let Err(e) = self.dispatch(Event::NewConversation).await {
            tracing::warn!(error = %e, "New conversation refused");
        }
    }

    /// Wait for the next transport signal and apply it
    pub async fn process_next_signal(&mut self) {
        if let Some(signal) = self.signal_rx.recv().await {
            self.apply_signal(signal).await;
        }
    }

    /// Apply transport signals until no question is in flight
    pub async fn run_until_idle(&mut self) {
        while self.state.is_in_flight() {
            self.process_next_signal().await;
        }
    }

    async fn apply_signal(&mut self, signal: TransportSignal) {
        let exchange = signal.exchange();
        match self.process_event(signal.into()).await {
            Ok(()) => {}
            Err(TransitionError::StaleExchange(_)) => {
                tracing::debug!(exchange, "Dropping signal of stale exchange");
            }
            Err(e) => {
                tracing::warn!(exchange, error = %e, "Signal refused");
            }
        }
    }

    /// User actions report refusals as notices as well as errors
    async fn dispatch(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = self.process_event(event).await;
        if let Err(e) = &result {
            let _ = self.notice_tx.send(Notice::Rejected {
                message: e.to_string(),
            });
        }
        result
    }

    async fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = transition(&self.state, &self.context, event)?;

        self.state = result.new_state;
        self.state_tx.send_replace(self.state.clone());

        for effect in result.effects {
            self.execute_effect(effect).await;
        }
        Ok(())
    }

    async fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::OpenStream { exchange, request } => self.open_stream(exchange, request).await,
            Effect::AbortStream => {
                if self.transport.unsubscribe() {
                    tracing::info!("Answer cancelled");
                }
            }
            Effect::Notify { message } => {
                let _ = self.notice_tx.send(Notice::Error { message });
            }
        }
    }

    async fn open_stream(&mut self, exchange: ExchangeId, request: ChatRequest) {
        tracing::info!(
            exchange,
            kb_id = %self.context.kb_id,
            question_len = request.message.len(),
            "Question submitted"
        );
        // Let observers render the new turn before the first fragment lands
        tokio::task::yield_now().await;
        self.transport.subscribe(exchange, request, self.signal_tx.clone());
    }
}
