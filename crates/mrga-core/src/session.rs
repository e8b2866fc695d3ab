//! SessionCore: single-owner event loop for one listening session.
//!
//! Owns the catalog, the filter criteria and the three controllers.  Every
//! user action arrives as a `SessionEvent`; controller completions arrive on
//! the controllers' own channels.  After each step the loop rebuilds the
//! `SessionSnapshot` (bumping `rev`) and broadcasts `StateUpdated`, plus the
//! finer-grained controller updates for listeners that want them.
use std::sync::Arc;
use std::time::Duration;

use mrga_proto::config::Config;
use mrga_proto::protocol::{ChatMessage, FilterCriteria, Provider, Station};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::catalog::CatalogClient;
use crate::chat::{ChatConsumer, ChatUpdate};
use crate::filter;
use crate::loader::{ListLoader, ListSnapshot};
use crate::playback::{PlaybackController, PlaybackDevice, PlaybackSnapshot, PlaybackUpdate};
use crate::reveal::RevealPace;
use crate::transport::ChatTransport;

// ── events ────────────────────────────────────────────────────────────────────

/// All inputs into the SessionCore loop.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Station by catalog id.
    Select(u64),
    TogglePlayPause,
    Retry,
    SetVolume(u8),
    SetMuted(bool),
    ClosePlayer,
    Submit { prompt: String },
    SetProvider(Provider),
    ClearRecommendations,
    SetFilter(FilterCriteria),
    LoadMore,
    MarkerVisible,
    ReloadCatalog,
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// The snapshot changed; fetch it from the state manager.
    StateUpdated,
    Playback(PlaybackUpdate),
    Chat(ChatUpdate),
    List(ListSnapshot),
}

// ── snapshot ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub rev: u64,
    pub playback: PlaybackSnapshot,
    pub status_line: Option<String>,
    pub play_control_enabled: bool,
    pub provider: Provider,
    pub messages: Vec<ChatMessage>,
    pub streaming_text: Option<String>,
    pub filter: FilterCriteria,
    pub genres: Vec<String>,
    pub countries: Vec<String>,
    pub list: ListSnapshot,
    /// True when `stations` is the recommended set rather than the list page.
    pub showing_recommendations: bool,
    pub stations: Vec<Arc<Station>>,
}

/// Shared read side of the session, written only by SessionCore.
pub struct StateManager {
    state: RwLock<Option<SessionSnapshot>>,
}

impl StateManager {
    fn new() -> Self {
        Self {
            state: RwLock::new(None),
        }
    }

    /// Latest snapshot; `None` until the loop has published once.
    pub async fn get_state(&self) -> Option<SessionSnapshot> {
        self.state.read().await.clone()
    }

    async fn set(&self, snapshot: SessionSnapshot) {
        *self.state.write().await = Some(snapshot);
    }
}

// ── options ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub default_volume: u8,
    pub provider: Provider,
    pub pace: RevealPace,
    pub page_size: usize,
    pub load_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_volume: 70,
            provider: Provider::default(),
            pace: RevealPace::default(),
            page_size: 20,
            load_delay: Duration::ZERO,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_volume: config.playback.default_volume,
            provider: config.chat.default_provider,
            pace: RevealPace {
                step_chars: config.chat.reveal_step_chars,
                interval: config.chat.reveal_interval(),
            },
            page_size: config.list.page_size,
            load_delay: config.list.load_delay(),
        }
    }
}

// ── SessionCore ───────────────────────────────────────────────────────────────

pub struct SessionCore<D: PlaybackDevice, T: ChatTransport> {
    catalog: Vec<Arc<Station>>,
    criteria: FilterCriteria,
    playback: PlaybackController<D>,
    chat: ChatConsumer<T>,
    loader: ListLoader,
    catalog_client: Option<CatalogClient>,
    catalog_tx: mpsc::UnboundedSender<Vec<Arc<Station>>>,
    catalog_rx: mpsc::UnboundedReceiver<Vec<Arc<Station>>>,
    playback_updates: broadcast::Receiver<PlaybackUpdate>,
    chat_updates: broadcast::Receiver<ChatUpdate>,
    list_updates: broadcast::Receiver<ListSnapshot>,
    broadcast_tx: broadcast::Sender<SessionUpdate>,
    state_manager: Arc<StateManager>,
    rev: u64,
}

impl<D: PlaybackDevice, T: ChatTransport> SessionCore<D, T> {
    pub fn new(
        options: SessionOptions,
        device: Arc<D>,
        transport: Arc<T>,
        catalog: Vec<Arc<Station>>,
        catalog_client: Option<CatalogClient>,
        broadcast_tx: broadcast::Sender<SessionUpdate>,
    ) -> Self {
        let playback = PlaybackController::new(device, options.default_volume);
        let chat = ChatConsumer::new(transport, options.provider, options.pace);
        let loader = ListLoader::new(options.page_size, options.load_delay);
        let (catalog_tx, catalog_rx) = mpsc::unbounded_channel();

        let mut core = Self {
            playback_updates: playback.subscribe(),
            chat_updates: chat.subscribe(),
            list_updates: loader.subscribe(),
            catalog: Vec::new(),
            criteria: FilterCriteria::default(),
            playback,
            chat,
            loader,
            catalog_client,
            catalog_tx,
            catalog_rx,
            broadcast_tx,
            state_manager: Arc::new(StateManager::new()),
            rev: 0,
        };
        core.set_catalog(catalog);
        core
    }

    /// Borrow the state manager (for use by the HTTP server).
    pub fn state_manager(&self) -> Arc<StateManager> {
        Arc::clone(&self.state_manager)
    }

    /// Run the event loop.  Returns on `Shutdown` or when every event sender
    /// is gone; the player is closed on the way out.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<SessionEvent>) {
        info!(
            "SessionCore: starting event loop with {} stations",
            self.catalog.len()
        );
        self.publish().await;

        loop {
            tokio::select! {
                evt = event_rx.recv() => match evt {
                    None => {
                        info!("SessionCore: event channel closed, shutting down");
                        break;
                    }
                    Some(SessionEvent::Shutdown) => {
                        info!("SessionCore: shutdown requested");
                        break;
                    }
                    Some(evt) => {
                        debug!("SessionCore: event {:?}", evt);
                        self.handle_event(evt).await;
                    }
                },
                Some(report) = self.playback.next_report() => {
                    self.playback.apply_report(report);
                }
                Some(report) = self.chat.next_report() => {
                    self.chat.apply_report(report, &self.catalog);
                }
                Some(ready) = self.loader.next_ready() => {
                    self.loader.apply_ready(ready);
                }
                Some(catalog) = self.catalog_rx.recv() => {
                    self.set_catalog(catalog);
                }
            }
            self.publish().await;
        }

        self.playback.close().await;
        self.publish().await;
    }

    async fn handle_event(&mut self, evt: SessionEvent) {
        match evt {
            SessionEvent::Select(id) => match self.find_station(id) {
                Some(station) => self.playback.select(station).await,
                None => warn!("SessionCore: no station with id {}", id),
            },
            SessionEvent::TogglePlayPause => self.playback.toggle_play_pause().await,
            SessionEvent::Retry => self.playback.retry().await,
            SessionEvent::SetVolume(v) => self.playback.set_volume(v).await,
            SessionEvent::SetMuted(m) => self.playback.set_muted(m).await,
            SessionEvent::ClosePlayer => self.playback.close().await,
            SessionEvent::Submit { prompt } => {
                self.chat.submit(&prompt);
            }
            SessionEvent::SetProvider(p) => self.chat.set_provider(p),
            SessionEvent::ClearRecommendations => self.chat.clear_recommendations(),
            SessionEvent::SetFilter(criteria) => {
                if criteria == self.criteria {
                    debug!("SessionCore: filter unchanged, keeping loaded pages");
                } else {
                    info!("SessionCore: filter {:?}", criteria);
                    self.criteria = criteria;
                    self.refilter();
                }
            }
            SessionEvent::LoadMore => {
                self.loader.load_more();
            }
            SessionEvent::MarkerVisible => {
                self.loader.on_marker_visible();
            }
            SessionEvent::ReloadCatalog => self.reload_catalog(),
            SessionEvent::Shutdown => {}
        }
    }

    fn find_station(&self, id: u64) -> Option<Arc<Station>> {
        self.catalog.iter().find(|s| s.id == id).cloned()
    }

    fn reload_catalog(&self) {
        let Some(client) = self.catalog_client.clone() else {
            debug!("SessionCore: no catalog client, reload ignored");
            return;
        };
        let tx = self.catalog_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(client.fetch().await);
        });
    }

    fn set_catalog(&mut self, catalog: Vec<Arc<Station>>) {
        info!("SessionCore: catalog now {} stations", catalog.len());
        self.catalog = catalog;
        self.refilter();
    }

    fn refilter(&mut self) {
        let filtered = filter::apply(&self.criteria, &self.catalog);
        self.loader.set_collection(filtered);
    }

    fn snapshot(&self) -> SessionSnapshot {
        let playback = self.playback.snapshot();
        let recommended = self.chat.recommended();
        let showing_recommendations = !recommended.is_empty();
        let stations = if showing_recommendations {
            recommended.to_vec()
        } else {
            self.loader.displayed().to_vec()
        };
        SessionSnapshot {
            rev: self.rev,
            status_line: playback.status_line(),
            play_control_enabled: playback.play_control_enabled(),
            playback,
            provider: self.chat.provider(),
            messages: self.chat.messages().to_vec(),
            streaming_text: self.chat.streaming_text().map(str::to_string),
            filter: self.criteria.clone(),
            genres: filter::genres(&self.catalog),
            countries: filter::countries(&self.catalog),
            list: self.loader.snapshot(),
            showing_recommendations,
            stations,
        }
    }

    async fn publish(&mut self) {
        self.rev += 1;
        self.state_manager.set(self.snapshot()).await;

        while let Ok(update) = self.playback_updates.try_recv() {
            let _ = self.broadcast_tx.send(SessionUpdate::Playback(update));
        }
        while let Ok(update) = self.chat_updates.try_recv() {
            let _ = self.broadcast_tx.send(SessionUpdate::Chat(update));
        }
        while let Ok(update) = self.list_updates.try_recv() {
            let _ = self.broadcast_tx.send(SessionUpdate::List(update));
        }
        let _ = self.broadcast_tx.send(SessionUpdate::StateUpdated);
    }
}
