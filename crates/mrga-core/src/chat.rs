//! Streaming Recommendation Consumer.
//!
//! One prompt opens one streaming request under a fresh token.  A spawned
//! reader pulls chunks, paces the reveal and reports back over the consumer's
//! channel; the consumer applies a report only while its token is current, so
//! a newer prompt silently supersedes an older one.

use std::sync::Arc;

use futures_util::StreamExt;
use mrga_proto::error::StreamTransportError;
use mrga_proto::protocol::{ChatMessage, Provider, Station};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::matcher::{match_stations, split_reply};
use crate::reveal::{RevealPace, RevealPacer, StreamBuffer};
use crate::token::{Token, TokenSource};
use crate::transport::ChatTransport;

pub const GREETING: &str = "Hey there! 👋 Tell me what kind of radio station you're in the mood for - maybe a genre, country, vibe, or even how you're feeling right now!";

pub const APOLOGY: &str = "Oops! Had a little technical difficulty there. Mind trying again?";

const UPDATE_CAPACITY: usize = 256;

#[derive(Debug)]
pub enum TurnEvent {
    /// Revealed prefix so far.
    Partial(String),
    /// Stream closed and fully revealed.
    Finished(String),
    Failed(StreamTransportError),
}

#[derive(Debug)]
pub struct TurnReport {
    pub token: Token,
    pub event: TurnEvent,
}

#[derive(Debug, Clone)]
pub enum ChatUpdate {
    Message(ChatMessage),
    Streaming(String),
    /// Matched stations for a finished turn; may be empty.
    Recommended(Vec<Arc<Station>>),
}

#[derive(Debug)]
struct InFlight {
    token: Token,
    provider: Provider,
    revealed: String,
}

pub struct ChatConsumer<T: ChatTransport> {
    transport: Arc<T>,
    tokens: TokenSource,
    pace: RevealPace,
    provider: Provider,
    messages: Vec<ChatMessage>,
    in_flight: Option<InFlight>,
    recommended: Vec<Arc<Station>>,
    reports_tx: mpsc::UnboundedSender<TurnReport>,
    reports_rx: mpsc::UnboundedReceiver<TurnReport>,
    updates: broadcast::Sender<ChatUpdate>,
}

impl<T: ChatTransport> ChatConsumer<T> {
    pub fn new(transport: Arc<T>, provider: Provider, pace: RevealPace) -> Self {
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            transport,
            tokens: TokenSource::new(),
            pace,
            provider,
            messages: vec![ChatMessage::assistant(GREETING, None)],
            in_flight: None,
            recommended: Vec::new(),
            reports_tx,
            reports_rx,
            updates,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatUpdate> {
        self.updates.subscribe()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn set_provider(&mut self, provider: Provider) {
        if self.provider != provider {
            info!("ChatConsumer: provider → {}", provider.label());
            self.provider = provider;
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Currently revealed text of the in-flight reply.
    pub fn streaming_text(&self) -> Option<&str> {
        self.in_flight.as_ref().map(|f| f.revealed.as_str())
    }

    pub fn recommended(&self) -> &[Arc<Station>] {
        &self.recommended
    }

    pub fn clear_recommendations(&mut self) {
        if !self.recommended.is_empty() {
            info!("ChatConsumer: clearing {} recommendations", self.recommended.len());
            self.recommended.clear();
            let _ = self.updates.send(ChatUpdate::Recommended(Vec::new()));
        }
    }

    /// Start a new turn.  Blank prompts are ignored.
    pub fn submit(&mut self, prompt: &str) -> Option<Token> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return None;
        }

        let token = self.tokens.issue();
        if let Some(prev) = self.in_flight.take() {
            debug!("ChatConsumer: turn {} superseded by {}", prev.token, token);
        }
        info!(
            "ChatConsumer: turn {} via {} ({} chars)",
            token,
            self.provider.label(),
            prompt.len()
        );
        self.push_message(ChatMessage::user(prompt));
        self.in_flight = Some(InFlight {
            token,
            provider: self.provider,
            revealed: String::new(),
        });

        tokio::spawn(read_turn(
            Arc::clone(&self.transport),
            prompt.to_string(),
            self.provider,
            self.pace,
            token,
            self.tokens.clone(),
            self.reports_tx.clone(),
        ));
        Some(token)
    }

    /// Wait for the next report from a reader task.  Cancel-safe.
    pub async fn next_report(&mut self) -> Option<TurnReport> {
        self.reports_rx.recv().await
    }

    /// Apply a reader report; `catalog` is matched against on completion.
    pub fn apply_report(&mut self, report: TurnReport, catalog: &[Arc<Station>]) {
        if !self.tokens.is_current(report.token) {
            debug!("ChatConsumer: dropping stale report for {}", report.token);
            return;
        }

        match report.event {
            TurnEvent::Partial(text) => {
                if let Some(turn) = self.in_flight.as_mut() {
                    turn.revealed = text.clone();
                }
                let _ = self.updates.send(ChatUpdate::Streaming(text));
            }
            TurnEvent::Finished(full_text) => {
                let provider = self.end_turn();
                let (message, names) = split_reply(&full_text);
                let matched = match_stations(&names, catalog);
                info!(
                    "ChatConsumer: reply complete, {} names → {} stations",
                    names.len(),
                    matched.len()
                );
                self.push_message(ChatMessage::assistant(message, provider));
                if !matched.is_empty() {
                    self.recommended = matched.clone();
                }
                let _ = self.updates.send(ChatUpdate::Recommended(matched));
            }
            TurnEvent::Failed(e) => {
                warn!("ChatConsumer: stream failed: {}", e);
                self.end_turn();
                self.push_message(ChatMessage::assistant(APOLOGY, None));
            }
        }
    }

    /// Wait for one report and apply it.
    pub async fn pump(&mut self, catalog: &[Arc<Station>]) {
        if let Some(report) = self.next_report().await {
            self.apply_report(report, catalog);
        }
    }

    fn end_turn(&mut self) -> Option<Provider> {
        self.tokens.revoke();
        self.in_flight.take().map(|turn| turn.provider)
    }

    fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message.clone());
        let _ = self.updates.send(ChatUpdate::Message(message));
    }
}

/// Reader task for one turn: pull chunks and reveal them at a steady pace
/// until the stream closes and everything received is visible.
async fn read_turn<T: ChatTransport>(
    transport: Arc<T>,
    prompt: String,
    provider: Provider,
    pace: RevealPace,
    token: Token,
    tokens: TokenSource,
    tx: mpsc::UnboundedSender<TurnReport>,
) {
    let send = |event: TurnEvent| {
        let _ = tx.send(TurnReport { token, event });
    };

    let mut stream = match transport.open(&prompt, provider).await {
        Ok(stream) => stream,
        Err(e) => {
            send(TurnEvent::Failed(e));
            return;
        }
    };

    let mut buffer = StreamBuffer::new();
    let mut pacer = RevealPacer::new(pace.step_chars);
    let mut ticker = tokio::time::interval(pace.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut open = true;

    loop {
        if !tokens.is_current(token) {
            debug!("ChatConsumer: reader {} abandoned", token);
            return;
        }
        tokio::select! {
            chunk = stream.next(), if open => match chunk {
                Some(Ok(bytes)) => buffer.push(&bytes),
                Some(Err(e)) => {
                    send(TurnEvent::Failed(e));
                    return;
                }
                None => {
                    buffer.finish();
                    open = false;
                }
            },
            _ = ticker.tick() => {
                if pacer.step(buffer.text()) {
                    send(TurnEvent::Partial(pacer.visible(buffer.text()).to_string()));
                }
                if !open && pacer.caught_up(buffer.text()) {
                    break;
                }
            }
        }
    }

    send(TurnEvent::Finished(buffer.into_text()));
}
