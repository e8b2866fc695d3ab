//! Playback Controller: one audio session at a time, with a bounded retry ladder.
//!
//! ```text
//!   Idle ──select──▶ Loading ──ready──▶ Playing ◀──toggle──▶ Paused
//!                      │                   │                   │
//!                      └──────fail─────────┴───────fail────────┘
//!                                          ▼
//!                 Loading ◀──retry── Error ──ladder exhausted──▶ Disabled
//!
//!   any ──close──▶ Closed
//! ```
//!
//! Device commands are issued inline from the entry points, so they reach the
//! device in call order.  Whether a load actually produced audio is reported
//! later through a [`DeviceReporter`] bound to the session token; reports for a
//! superseded token are dropped when applied.

use std::sync::Arc;

use async_trait::async_trait;
use mrga_proto::error::DeviceError;
use mrga_proto::protocol::Station;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::token::{Token, TokenSource};

pub const MAX_RETRIES: u32 = 3;

const UPDATE_CAPACITY: usize = 256;

// ── state machine ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
    /// Retries exhausted for this station; only a new selection leaves it.
    Disabled,
    Closed,
}

impl PlaybackState {
    /// The full transition table.
    pub fn can_transition_to(self, next: PlaybackState) -> bool {
        use PlaybackState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, Loading) => true,
            (Loading, Playing) | (Loading, Error) => true,
            (Playing, Paused) | (Paused, Playing) => true,
            (Playing, Error) | (Paused, Error) => true,
            (Error, Loading) | (Error, Disabled) => true,
            _ => false,
        }
    }
}

/// Bounded retry counter owned by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryLadder {
    count: u32,
    max: u32,
}

impl Default for RetryLadder {
    fn default() -> Self {
        Self {
            count: 0,
            max: MAX_RETRIES,
        }
    }
}

impl RetryLadder {
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_exhausted(&self) -> bool {
        self.count >= self.max
    }

    /// Take one rung.  Returns false when the ladder is already exhausted.
    fn climb(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.count += 1;
        true
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

// ── device capability ─────────────────────────────────────────────────────────

/// Outcome of a device load, or a later stream failure.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportKind {
    /// Audio is flowing.
    Ready,
    Failed(DeviceError),
}

#[derive(Debug, Clone)]
pub struct DeviceReport {
    pub token: Token,
    pub kind: ReportKind,
}

/// Handed to the device with every load; reports back under the session token.
#[derive(Debug, Clone)]
pub struct DeviceReporter {
    token: Token,
    tx: mpsc::UnboundedSender<DeviceReport>,
}

impl DeviceReporter {
    pub fn token(&self) -> Token {
        self.token
    }

    pub fn ready(&self) {
        self.send(ReportKind::Ready);
    }

    pub fn failed(&self, error: DeviceError) {
        self.send(ReportKind::Failed(error));
    }

    fn send(&self, kind: ReportKind) {
        // Receiver gone means the controller was dropped; nothing left to tell.
        let _ = self.tx.send(DeviceReport {
            token: self.token,
            kind,
        });
    }
}

/// The audio output the environment provides.
#[async_trait]
pub trait PlaybackDevice: Send + Sync + 'static {
    /// Begin loading and playing `url`, replacing whatever was loaded.
    /// Returns once the command is accepted; readiness and any later stream
    /// failure go through `reporter`.
    async fn start(
        &self,
        url: &str,
        volume: f32,
        reporter: DeviceReporter,
    ) -> Result<(), DeviceError>;

    async fn set_paused(&self, paused: bool) -> Result<(), DeviceError>;

    /// `volume` is 0.0..=1.0.
    async fn set_volume(&self, volume: f32) -> Result<(), DeviceError>;

    async fn stop(&self) -> Result<(), DeviceError>;
}

// ── session ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PlaybackSession {
    station: Arc<Station>,
    state: PlaybackState,
    ladder: RetryLadder,
    volume: u8,
    muted: bool,
    token: Token,
}

impl PlaybackSession {
    pub fn station(&self) -> &Arc<Station> {
        &self.station
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn ladder(&self) -> RetryLadder {
        self.ladder
    }

    pub fn token(&self) -> Token {
        self.token
    }

    fn device_volume(&self) -> f32 {
        effective_volume(self.volume, self.muted)
    }
}

fn effective_volume(volume: u8, muted: bool) -> f32 {
    if muted {
        0.0
    } else {
        f32::from(volume.min(100)) / 100.0
    }
}

/// Read-only view for the presentation layer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlaybackSnapshot {
    pub station_id: Option<u64>,
    pub station_name: Option<String>,
    pub state: PlaybackState,
    pub retry_count: u32,
    pub max_retries: u32,
    pub volume: u8,
    pub muted: bool,
}

impl PlaybackSnapshot {
    pub fn status_line(&self) -> Option<String> {
        match self.state {
            PlaybackState::Loading => Some("Loading...".to_string()),
            PlaybackState::Error => Some(format!(
                "Playback failed ({}/{} retries), click to retry",
                self.retry_count, self.max_retries
            )),
            PlaybackState::Disabled => {
                Some("Station unavailable. Please try another station.".to_string())
            }
            _ => None,
        }
    }

    pub fn play_control_enabled(&self) -> bool {
        !matches!(
            self.state,
            PlaybackState::Loading | PlaybackState::Disabled | PlaybackState::Closed
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackUpdate {
    State(PlaybackSnapshot),
    /// Playback failed; anything showing "playing" for this station should
    /// flip to paused.
    ReflectPaused { station_id: u64 },
}

// ── controller ────────────────────────────────────────────────────────────────

pub struct PlaybackController<D: PlaybackDevice> {
    device: Arc<D>,
    tokens: TokenSource,
    session: Option<PlaybackSession>,
    /// Volume/mute used for the next session when none is active.
    volume: u8,
    muted: bool,
    closed: bool,
    reports_tx: mpsc::UnboundedSender<DeviceReport>,
    reports_rx: mpsc::UnboundedReceiver<DeviceReport>,
    updates: broadcast::Sender<PlaybackUpdate>,
}

impl<D: PlaybackDevice> PlaybackController<D> {
    pub fn new(device: Arc<D>, default_volume: u8) -> Self {
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            device,
            tokens: TokenSource::new(),
            session: None,
            volume: default_volume.min(100),
            muted: false,
            closed: false,
            reports_tx,
            reports_rx,
            updates,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackUpdate> {
        self.updates.subscribe()
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        match &self.session {
            Some(s) => s.state,
            None if self.closed => PlaybackState::Closed,
            None => PlaybackState::Idle,
        }
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        match &self.session {
            Some(s) => PlaybackSnapshot {
                station_id: Some(s.station.id),
                station_name: Some(s.station.name.clone()),
                state: s.state,
                retry_count: s.ladder.count(),
                max_retries: s.ladder.max(),
                volume: s.volume,
                muted: s.muted,
            },
            None => PlaybackSnapshot {
                station_id: None,
                station_name: None,
                state: self.state(),
                retry_count: 0,
                max_retries: MAX_RETRIES,
                volume: self.volume,
                muted: self.muted,
            },
        }
    }

    // ── entry points ──────────────────────────────────────────────────────────

    /// Select a station.  Re-selecting the current station toggles play/pause.
    pub async fn select(&mut self, station: Arc<Station>) {
        if let Some(current) = &self.session {
            if current.station == station {
                debug!(
                    "PlaybackController: '{}' already selected, toggling",
                    station.name
                );
                self.toggle_play_pause().await;
                return;
            }
        }

        let (volume, muted) = match &self.session {
            Some(prev) => (prev.volume, prev.muted),
            None => (self.volume, self.muted),
        };
        let token = self.tokens.issue();
        info!(
            "PlaybackController: new session {} for '{}' ({})",
            token,
            station.name,
            station.location_line()
        );

        self.closed = false;
        self.session = Some(PlaybackSession {
            station,
            state: PlaybackState::Idle,
            ladder: RetryLadder::default(),
            volume,
            muted,
            token,
        });
        self.transition(PlaybackState::Loading);
        self.start_device().await;
    }

    /// Playing ⇄ Paused.  Ignored in every other state.
    pub async fn toggle_play_pause(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let (pause, next) = match session.state {
            PlaybackState::Playing => (true, PlaybackState::Paused),
            PlaybackState::Paused => (false, PlaybackState::Playing),
            other => {
                debug!("PlaybackController: toggle ignored in {:?}", other);
                return;
            }
        };

        match self.device.set_paused(pause).await {
            Ok(()) => self.transition(next),
            Err(e) => {
                warn!("PlaybackController: set_paused({}) failed: {}", pause, e);
                self.fail(e);
            }
        }
    }

    /// Re-attempt the current station under the same token.
    pub async fn retry(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state != PlaybackState::Error {
            debug!("PlaybackController: retry ignored in {:?}", session.state);
            return;
        }
        if !session.ladder.climb() {
            debug!("PlaybackController: retry ignored, ladder exhausted");
            return;
        }
        info!(
            "PlaybackController: retry {}/{} for '{}'",
            session.ladder.count(),
            session.ladder.max(),
            session.station.name
        );
        self.transition(PlaybackState::Loading);
        self.start_device().await;
    }

    pub async fn set_volume(&mut self, volume: u8) {
        let volume = volume.min(100);
        let muted = if volume > 0 { false } else { self.current_muted() };
        self.apply_volume(volume, muted).await;
    }

    pub async fn set_muted(&mut self, muted: bool) {
        let volume = self.session.as_ref().map_or(self.volume, |s| s.volume);
        self.apply_volume(volume, muted).await;
    }

    /// Release the device and discard the session.
    pub async fn close(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        info!(
            "PlaybackController: closing session {} ('{}')",
            session.token, session.station.name
        );
        self.volume = session.volume;
        self.muted = session.muted;
        self.tokens.revoke();
        if let Err(e) = self.device.stop().await {
            warn!("PlaybackController: device stop failed: {}", e);
        }
        self.transition(PlaybackState::Closed);
        self.session = None;
        self.closed = true;
    }

    // ── device reports ────────────────────────────────────────────────────────

    /// Wait for the next device report.  Cancel-safe.
    pub async fn next_report(&mut self) -> Option<DeviceReport> {
        self.reports_rx.recv().await
    }

    /// Apply a device report if its token is still current.
    pub fn apply_report(&mut self, report: DeviceReport) {
        if !self.tokens.is_current(report.token) {
            debug!(
                "PlaybackController: dropping stale {:?} for {}",
                report.kind, report.token
            );
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match (report.kind, session.state) {
            (ReportKind::Ready, PlaybackState::Loading) => {
                session.ladder.reset();
                self.transition(PlaybackState::Playing);
            }
            (ReportKind::Ready, state) => {
                debug!("PlaybackController: ready ignored in {:?}", state);
            }
            (ReportKind::Failed(e), state) => {
                if matches!(
                    state,
                    PlaybackState::Loading | PlaybackState::Playing | PlaybackState::Paused
                ) {
                    self.fail(e);
                } else {
                    debug!("PlaybackController: failure ignored in {:?}: {}", state, e);
                }
            }
        }
    }

    /// Wait for one report and apply it.
    pub async fn pump(&mut self) {
        if let Some(report) = self.next_report().await {
            self.apply_report(report);
        }
    }

    // ── internals ─────────────────────────────────────────────────────────────

    async fn start_device(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let reporter = DeviceReporter {
            token: session.token,
            tx: self.reports_tx.clone(),
        };
        let url = session.station.stream_url.clone();
        let volume = session.device_volume();
        if let Err(e) = self.device.start(&url, volume, reporter).await {
            warn!("PlaybackController: device rejected '{}': {}", url, e);
            self.fail(e);
        }
    }

    fn fail(&mut self, error: DeviceError) {
        let Some(session) = &self.session else {
            return;
        };
        let station_id = session.station.id;
        warn!(
            "PlaybackController: '{}' failed ({}/{}): {}",
            session.station.name,
            session.ladder.count(),
            session.ladder.max(),
            error
        );
        self.transition(PlaybackState::Error);
        if self.session.as_ref().is_some_and(|s| s.ladder.is_exhausted()) {
            self.transition(PlaybackState::Disabled);
        }
        let _ = self
            .updates
            .send(PlaybackUpdate::ReflectPaused { station_id });
    }

    fn transition(&mut self, next: PlaybackState) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state == next {
            return;
        }
        if !session.state.can_transition_to(next) {
            warn!(
                "PlaybackController: refusing {:?} → {:?}",
                session.state, next
            );
            return;
        }
        info!("PlaybackController: state {:?} → {:?}", session.state, next);
        session.state = next;
        let _ = self.updates.send(PlaybackUpdate::State(self.snapshot()));
    }

    fn current_muted(&self) -> bool {
        self.session.as_ref().map_or(self.muted, |s| s.muted)
    }

    async fn apply_volume(&mut self, volume: u8, muted: bool) {
        match self.session.as_mut() {
            Some(session) => {
                session.volume = volume;
                session.muted = muted;
                let level = session.device_volume();
                if let Err(e) = self.device.set_volume(level).await {
                    warn!("PlaybackController: set_volume({:.2}) failed: {}", level, e);
                }
            }
            None => {
                self.volume = volume;
                self.muted = muted;
            }
        }
        let _ = self.updates.send(PlaybackUpdate::State(self.snapshot()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum DeviceCall {
        Start(String),
        Pause(bool),
        Volume(f32),
        Stop,
    }

    /// Device double: records calls, keeps every reporter so tests decide
    /// when (and in which order) loads complete.
    #[derive(Default)]
    pub struct MockDevice {
        pub calls: Mutex<Vec<DeviceCall>>,
        pub reporters: Mutex<Vec<DeviceReporter>>,
        pub reject_start: Mutex<bool>,
    }

    impl MockDevice {
        pub fn reporter(&self, idx: usize) -> DeviceReporter {
            self.reporters.lock().unwrap()[idx].clone()
        }

        pub fn calls(&self) -> Vec<DeviceCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlaybackDevice for MockDevice {
        async fn start(
            &self,
            url: &str,
            _volume: f32,
            reporter: DeviceReporter,
        ) -> Result<(), DeviceError> {
            self.calls.lock().unwrap().push(DeviceCall::Start(url.to_string()));
            if *self.reject_start.lock().unwrap() {
                return Err(DeviceError::Unavailable("no player".into()));
            }
            self.reporters.lock().unwrap().push(reporter);
            Ok(())
        }

        async fn set_paused(&self, paused: bool) -> Result<(), DeviceError> {
            self.calls.lock().unwrap().push(DeviceCall::Pause(paused));
            Ok(())
        }

        async fn set_volume(&self, volume: f32) -> Result<(), DeviceError> {
            self.calls.lock().unwrap().push(DeviceCall::Volume(volume));
            Ok(())
        }

        async fn stop(&self) -> Result<(), DeviceError> {
            self.calls.lock().unwrap().push(DeviceCall::Stop);
            Ok(())
        }
    }

    pub fn station(id: u64, name: &str) -> Arc<Station> {
        Arc::new(Station {
            id,
            name: name.to_string(),
            stream_url: format!("https://streams.example/{}", id),
            ..Default::default()
        })
    }

    fn controller() -> (PlaybackController<MockDevice>, Arc<MockDevice>) {
        let device = Arc::new(MockDevice::default());
        (PlaybackController::new(device.clone(), 70), device)
    }

    fn load_error() -> DeviceError {
        DeviceError::Load("connection refused".into())
    }

    #[tokio::test]
    async fn test_select_then_ready_plays() {
        let (mut pc, device) = controller();
        pc.select(station(1, "BBC Radio 1")).await;
        assert_eq!(pc.state(), PlaybackState::Loading);
        assert_eq!(
            device.calls(),
            vec![DeviceCall::Start("https://streams.example/1".into())]
        );

        device.reporter(0).ready();
        pc.pump().await;
        assert_eq!(pc.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn test_only_last_selection_outcome_applies() {
        let (mut pc, device) = controller();
        pc.select(station(1, "A")).await;
        pc.select(station(2, "B")).await;
        pc.select(station(3, "C")).await;

        // Complete out of order: C first, then the superseded A and B.
        device.reporter(2).ready();
        device.reporter(0).failed(load_error());
        device.reporter(1).ready();
        for _ in 0..3 {
            pc.pump().await;
        }

        let snap = pc.snapshot();
        assert_eq!(snap.station_id, Some(3));
        assert_eq!(snap.state, PlaybackState::Playing);
        assert_eq!(snap.retry_count, 0);
    }

    #[tokio::test]
    async fn test_stale_failure_cannot_touch_new_session() {
        let (mut pc, device) = controller();
        pc.select(station(1, "A")).await;
        pc.select(station(2, "B")).await;
        device.reporter(0).failed(load_error());
        pc.pump().await;
        assert_eq!(pc.state(), PlaybackState::Loading);
        assert_eq!(pc.snapshot().station_id, Some(2));
    }

    #[tokio::test]
    async fn test_reselect_toggles_instead_of_new_session() {
        let (mut pc, device) = controller();
        let s = station(1, "A");
        pc.select(s.clone()).await;
        let token = pc.session().unwrap().token();
        device.reporter(0).ready();
        pc.pump().await;

        pc.select(s.clone()).await;
        assert_eq!(pc.state(), PlaybackState::Paused);
        assert_eq!(pc.session().unwrap().token(), token);
        pc.select(s).await;
        assert_eq!(pc.state(), PlaybackState::Playing);
        assert_eq!(
            device.calls()[1..],
            [DeviceCall::Pause(true), DeviceCall::Pause(false)]
        );
    }

    #[tokio::test]
    async fn test_toggle_is_noop_while_loading_or_error() {
        let (mut pc, device) = controller();
        pc.select(station(1, "A")).await;
        pc.toggle_play_pause().await;
        assert_eq!(pc.state(), PlaybackState::Loading);

        device.reporter(0).failed(load_error());
        pc.pump().await;
        pc.toggle_play_pause().await;
        assert_eq!(pc.state(), PlaybackState::Error);
        assert!(!device.calls().iter().any(|c| matches!(c, DeviceCall::Pause(_))));
    }

    #[tokio::test]
    async fn test_retry_ladder_ends_disabled() {
        let (mut pc, device) = controller();
        pc.select(station(1, "A")).await;
        let token = pc.session().unwrap().token();
        device.reporter(0).failed(load_error());
        pc.pump().await;
        assert_eq!(pc.state(), PlaybackState::Error);

        for attempt in 1..=MAX_RETRIES {
            pc.retry().await;
            assert_eq!(pc.state(), PlaybackState::Loading);
            assert_eq!(pc.snapshot().retry_count, attempt);
            assert_eq!(pc.session().unwrap().token(), token);
            device.reporter(attempt as usize).failed(load_error());
            pc.pump().await;
        }

        assert_eq!(pc.state(), PlaybackState::Disabled);
        assert!(!pc.snapshot().play_control_enabled());
        let starts = device.calls().len();
        pc.retry().await;
        pc.retry().await;
        assert_eq!(pc.state(), PlaybackState::Disabled);
        assert_eq!(device.calls().len(), starts);
    }

    #[tokio::test]
    async fn test_success_resets_ladder() {
        let (mut pc, device) = controller();
        pc.select(station(1, "A")).await;
        device.reporter(0).failed(load_error());
        pc.pump().await;
        pc.retry().await;
        pc.retry().await; // ignored: Loading
        assert_eq!(pc.snapshot().retry_count, 1);
        device.reporter(1).ready();
        pc.pump().await;
        assert_eq!(pc.state(), PlaybackState::Playing);
        assert_eq!(pc.snapshot().retry_count, 0);
    }

    #[tokio::test]
    async fn test_new_station_leaves_disabled() {
        let (mut pc, device) = controller();
        pc.select(station(1, "A")).await;
        device.reporter(0).failed(load_error());
        pc.pump().await;
        for attempt in 1..=MAX_RETRIES {
            pc.retry().await;
            device.reporter(attempt as usize).failed(load_error());
            pc.pump().await;
        }
        assert_eq!(pc.state(), PlaybackState::Disabled);

        // Same station is a toggle, which is ignored while disabled.
        pc.select(station(1, "A")).await;
        assert_eq!(pc.state(), PlaybackState::Disabled);

        pc.select(station(2, "B")).await;
        assert_eq!(pc.state(), PlaybackState::Loading);
        assert_eq!(pc.snapshot().retry_count, 0);
    }

    #[tokio::test]
    async fn test_device_fault_while_playing_reflects_paused() {
        let (mut pc, device) = controller();
        let mut updates = pc.subscribe();
        pc.select(station(4, "A")).await;
        device.reporter(0).ready();
        pc.pump().await;
        device.reporter(0).failed(DeviceError::Load("stream ended".into()));
        pc.pump().await;

        assert_eq!(pc.state(), PlaybackState::Error);
        let mut saw_reflect = false;
        while let Ok(update) = updates.try_recv() {
            if update == (PlaybackUpdate::ReflectPaused { station_id: 4 }) {
                saw_reflect = true;
            }
        }
        assert!(saw_reflect);
        assert_eq!(
            pc.snapshot().status_line().as_deref(),
            Some("Playback failed (0/3 retries), click to retry")
        );
    }

    #[tokio::test]
    async fn test_rejected_start_fails_immediately() {
        let (mut pc, device) = controller();
        *device.reject_start.lock().unwrap() = true;
        pc.select(station(1, "A")).await;
        assert_eq!(pc.state(), PlaybackState::Error);
    }

    #[tokio::test]
    async fn test_volume_and_mute() {
        let (mut pc, device) = controller();
        pc.set_volume(150).await;
        assert_eq!(pc.snapshot().volume, 100);
        assert!(device.calls().is_empty());

        pc.select(station(1, "A")).await;
        pc.set_muted(true).await;
        pc.set_volume(40).await;
        let snap = pc.snapshot();
        assert_eq!(snap.volume, 40);
        assert!(!snap.muted);
        assert_eq!(
            device.calls()[1..],
            [DeviceCall::Volume(0.0), DeviceCall::Volume(0.4)]
        );

        // Volume carries over into the next session.
        pc.select(station(2, "B")).await;
        assert_eq!(pc.snapshot().volume, 40);
    }

    #[tokio::test]
    async fn test_close_is_terminal_and_drops_late_reports() {
        let (mut pc, device) = controller();
        pc.select(station(1, "A")).await;
        pc.close().await;
        assert_eq!(pc.state(), PlaybackState::Closed);
        assert!(pc.session().is_none());
        assert_eq!(device.calls().last(), Some(&DeviceCall::Stop));

        device.reporter(0).ready();
        pc.pump().await;
        assert_eq!(pc.state(), PlaybackState::Closed);

        pc.toggle_play_pause().await;
        pc.retry().await;
        assert_eq!(pc.state(), PlaybackState::Closed);
    }

    #[test]
    fn test_transition_table() {
        use PlaybackState::*;
        assert!(Idle.can_transition_to(Loading));
        assert!(Error.can_transition_to(Disabled));
        assert!(Paused.can_transition_to(Error));
        assert!(!Idle.can_transition_to(Playing));
        assert!(!Disabled.can_transition_to(Loading));
        assert!(!Loading.can_transition_to(Paused));
        assert!(!Closed.can_transition_to(Loading));
        assert!(Disabled.can_transition_to(Closed));
    }
}
