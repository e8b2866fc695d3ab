/// mpv-backed playback device.
///
/// ```text
///   MpvDevice ── connect() on first use / after the process died
///         │
///         ├── writer_task   ← receives MpvRequest via mpsc, serialises → socket
///         ├── reader_task   ← reads JSON lines from socket
///         │                      ├── response (has request_id) → matched oneshot::Sender
///         │                      └── event / property-change   → event channel
///         └── watch_events  ← turns events into ready / failed reports for the
///                             reporter of the current load
/// ```
///
/// Audio counts as flowing once mpv has started the new file and `core-idle`
/// drops to false.  An `end-file` with reason `error`, a lost IPC connection,
/// or no audio within [`CONNECT_TIMEOUT`] is reported as a failure.
///
/// Platform notes:
/// - Unix:   Unix domain sockets
/// - Windows: Named pipes  \\.\pipe\<name>
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mrga_core::playback::{DeviceReporter, PlaybackDevice};
use mrga_proto::error::DeviceError;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

const OBS_CORE_IDLE: u64 = 1;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

// ── internal channel types ────────────────────────────────────────────────────

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An mpv event / property-change that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns `Some((obs_id, data))` if this is a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.event_name()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    /// Returns the event name, e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// Playlist entry a `start-file` / `end-file` event refers to.
    pub fn playlist_entry_id(&self) -> Option<u64> {
        self.raw.get("playlist_entry_id")?.as_u64()
    }

    /// `Some(reason)` for an `end-file` event that ended in an error.
    pub fn end_file_error(&self) -> Option<String> {
        if self.event_name()? != "end-file" || self.raw.get("reason")?.as_str()? != "error" {
            return None;
        }
        Some(
            self.raw
                .get("file_error")
                .and_then(Value::as_str)
                .unwrap_or("playback error")
                .to_string(),
        )
    }
}

// ── handle ────────────────────────────────────────────────────────────────────

/// Cloneable handle to the mpv writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Replace the current file with `url`.  Returns the playlist entry id
    /// when mpv reports one (0.38+).
    pub async fn load_stream(&self, url: &str, volume: f32) -> anyhow::Result<Option<u64>> {
        self.set_volume(volume).await?;
        let reply = self.send(json!(["loadfile", url, "replace"])).await?;
        Ok(reply
            .get("data")
            .and_then(|d| d.get("playlist_entry_id"))
            .and_then(Value::as_u64))
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    pub async fn set_volume(&self, vol: f32) -> anyhow::Result<()> {
        let vol_pct = (vol * 100.0).clamp(0.0, 100.0);
        self.send(json!(["set_property", "volume", vol_pct])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    /// Must be called after every fresh connection.
    pub async fn observe_properties(&self) {
        match self
            .send(json!(["observe_property", OBS_CORE_IDLE, "core-idle"]))
            .await
        {
            Ok(_) => debug!("mpv: observe_property id={} name=core-idle", OBS_CORE_IDLE),
            Err(e) => warn!("mpv: observe_property core-idle failed: {}", e),
        }
    }
}

// ── process ───────────────────────────────────────────────────────────────────

/// Owns the mpv child process.
struct MpvProcess {
    binary: Option<PathBuf>,
    socket_name: String,
    child: Option<tokio::process::Child>,
}

impl MpvProcess {
    fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary,
            socket_name: mrga_proto::platform::mpv_socket_name(),
            child: None,
        }
    }

    fn alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => child.try_wait().ok().flatten().is_none(),
            None => false,
        }
    }

    async fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
    }

    fn spawn(&mut self) -> anyhow::Result<()> {
        let binary = self
            .binary
            .clone()
            .or_else(mrga_proto::platform::find_mpv_binary)
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        info!("mpv: spawning {}", binary.display());
        let child = tokio::process::Command::new(binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg(mrga_proto::platform::mpv_socket_arg())
            .arg("--quiet")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        self.child = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;
        let socket_path = PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;
        self.spawn()?;

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(BufReader::new(read_half), write_half, event_tx))
    }

    #[cfg(windows)]
    async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;
        self.spawn()?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(BufReader::new(read_half), write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

fn start_io_tasks<R, W>(
    reader: BufReader<R>,
    writer: W,
    event_tx: mpsc::Sender<MpvEvent>,
) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);
    tokio::spawn(writer_task(writer, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(reader, pending, event_tx));
    MpvHandle { tx: cmd_tx }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: PendingMap,
    event_tx: mpsc::Sender<MpvEvent>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_pending(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(Value::as_u64) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error");
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else {
                    debug!("mpv reader: event {}", trimmed);
                    let _ = event_tx.send(MpvEvent { raw: val }).await;
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
}

async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can match the reply.
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── load watch ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    /// `loadfile` sent, waiting for mpv to start the file.
    Requested,
    /// File started, waiting for audio.
    Started,
    Playing,
}

/// Where events for the current load get reported.
///
/// Every `arm` is a new load.  `start-file` / `end-file` events are matched
/// to it by playlist entry id: mpv hands out entry ids in increasing order, so
/// anything below `floor` belongs to a replaced load, and once the entry is
/// known only that id counts.  Events without an entry id are ignored.
#[derive(Default)]
struct Watch {
    reporter: Option<DeviceReporter>,
    phase: Option<LoadPhase>,
    load: u64,
    entry: Option<u64>,
    floor: u64,
    highest_entry: u64,
}

impl Watch {
    /// Start watching a new load; returns its load number.
    fn arm(&mut self, reporter: DeviceReporter) -> u64 {
        self.load += 1;
        self.reporter = Some(reporter);
        self.phase = Some(LoadPhase::Requested);
        self.entry = None;
        self.floor = self.highest_entry + 1;
        self.load
    }

    /// Record the entry id from the `loadfile` reply of load `load`.
    fn bind(&mut self, load: u64, entry: u64) {
        self.highest_entry = self.highest_entry.max(entry);
        if load == self.load && self.phase.is_some() {
            self.entry = Some(entry);
        }
    }

    fn disarm(&mut self) {
        self.reporter = None;
        self.phase = None;
        self.entry = None;
    }

    fn fail(&mut self, error: DeviceError) {
        if let Some(reporter) = self.reporter.take() {
            reporter.failed(error);
        }
        self.phase = None;
    }

    /// No-audio timer of load `load` fired.  Returns whether it failed the load.
    fn expire(&mut self, load: u64) -> bool {
        let waiting = matches!(
            self.phase,
            Some(LoadPhase::Requested) | Some(LoadPhase::Started)
        );
        if load != self.load || !waiting {
            return false;
        }
        warn!("mpv: no audio after {:?} (load {})", CONNECT_TIMEOUT, load);
        self.fail(DeviceError::Timeout(CONNECT_TIMEOUT));
        true
    }

    fn is_current_entry(&self, entry: u64) -> bool {
        match self.entry {
            Some(current) => entry == current,
            None => entry >= self.floor,
        }
    }

    fn on_event(&mut self, evt: &MpvEvent) {
        if let Some((OBS_CORE_IDLE, data)) = evt.as_property_change() {
            // Only after the current load's start-file; idle flips of the
            // replaced file arrive before it.
            if data.as_bool() == Some(false) && self.phase == Some(LoadPhase::Started) {
                info!("mpv: audio flowing (load {})", self.load);
                self.phase = Some(LoadPhase::Playing);
                if let Some(reporter) = &self.reporter {
                    reporter.ready();
                }
            }
            return;
        }

        let name = evt.event_name();
        if !matches!(name, Some("start-file") | Some("end-file")) {
            return;
        }
        let Some(entry) = evt.playlist_entry_id() else {
            debug!("mpv: {:?} without playlist entry id ignored", name);
            return;
        };
        let current = self.phase.is_some() && self.is_current_entry(entry);
        self.highest_entry = self.highest_entry.max(entry);
        if !current {
            debug!("mpv: {:?} for replaced entry {} ignored", name, entry);
            return;
        }

        if let Some(reason) = evt.end_file_error() {
            warn!("mpv: end-file error on entry {}: {}", entry, reason);
            self.fail(DeviceError::Load(reason));
        } else if name == Some("start-file") && self.phase == Some(LoadPhase::Requested) {
            self.entry = Some(entry);
            self.phase = Some(LoadPhase::Started);
        }
    }
}

async fn watch_events(mut event_rx: mpsc::Receiver<MpvEvent>, watch: Arc<Mutex<Watch>>) {
    while let Some(evt) = event_rx.recv().await {
        watch.lock().await.on_event(&evt);
    }
    debug!("mpv: event stream ended");
    watch
        .lock()
        .await
        .fail(DeviceError::Ipc("mpv connection lost".into()));
}

// ── device ────────────────────────────────────────────────────────────────────

struct Connection {
    process: MpvProcess,
    handle: Option<MpvHandle>,
}

pub struct MpvDevice {
    conn: Mutex<Connection>,
    watch: Arc<Mutex<Watch>>,
}

impl MpvDevice {
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self {
            conn: Mutex::new(Connection {
                process: MpvProcess::new(binary),
                handle: None,
            }),
            watch: Arc::new(Mutex::new(Watch::default())),
        }
    }

    /// Live handle, spawning mpv if it is not running.
    async fn handle(&self) -> Result<MpvHandle, DeviceError> {
        let mut conn = self.conn.lock().await;
        if let Some(handle) = conn.handle.clone() {
            if conn.process.alive() {
                return Ok(handle);
            }
            warn!("mpv: process died, respawning");
        }

        let (event_tx, event_rx) = mpsc::channel(256);
        let handle = conn
            .process
            .spawn_and_connect(event_tx)
            .await
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;
        tokio::spawn(watch_events(event_rx, Arc::clone(&self.watch)));
        handle.observe_properties().await;
        conn.handle = Some(handle.clone());
        Ok(handle)
    }

    /// Handle only if mpv is already up.
    async fn existing_handle(&self) -> Option<MpvHandle> {
        self.conn.lock().await.handle.clone()
    }

    pub async fn shutdown(&self) {
        let mut conn = self.conn.lock().await;
        if let Some(handle) = conn.handle.take() {
            let _ = handle.send(json!(["quit"])).await;
        }
        conn.process.kill().await;
        self.watch.lock().await.disarm();
    }
}

fn ipc_error(e: anyhow::Error) -> DeviceError {
    DeviceError::Ipc(e.to_string())
}

#[async_trait]
impl PlaybackDevice for MpvDevice {
    async fn start(
        &self,
        url: &str,
        volume: f32,
        reporter: DeviceReporter,
    ) -> Result<(), DeviceError> {
        let handle = self.handle().await?;
        let token = reporter.token();
        let load = self.watch.lock().await.arm(reporter);

        let _ = handle.set_pause(false).await;
        match handle.load_stream(url, volume).await {
            Ok(Some(entry)) => self.watch.lock().await.bind(load, entry),
            Ok(None) => {}
            Err(e) => {
                self.watch.lock().await.disarm();
                return Err(DeviceError::Load(e.to_string()));
            }
        }
        info!("mpv: loading {} for {} (load {})", url, token, load);

        let watch = Arc::clone(&self.watch);
        tokio::spawn(async move {
            tokio::time::sleep(CONNECT_TIMEOUT).await;
            watch.lock().await.expire(load);
        });
        Ok(())
    }

    async fn set_paused(&self, paused: bool) -> Result<(), DeviceError> {
        let handle = self
            .existing_handle()
            .await
            .ok_or_else(|| DeviceError::Unavailable("mpv not running".into()))?;
        handle.set_pause(paused).await.map_err(ipc_error)
    }

    async fn set_volume(&self, volume: f32) -> Result<(), DeviceError> {
        match self.existing_handle().await {
            Some(handle) => handle.set_volume(volume).await.map_err(ipc_error),
            None => Ok(()),
        }
    }

    async fn stop(&self) -> Result<(), DeviceError> {
        self.watch.lock().await.disarm();
        match self.existing_handle().await {
            Some(handle) => handle.stop().await.map_err(ipc_error),
            None => Ok(()),
        }
    }
}
