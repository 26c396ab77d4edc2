//! `livepane dev`: host page, sandbox document and live reload.

use crate::{load_config, load_input, path_has_ignored_segment};
use axum::Router;
use axum::extract::State as AxumState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use livepane_web::{AxumPreviewAdapter, SandboxHost};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::time::Duration;

const RELOAD_WS_PATH: &str = "/__livepane/ws";

struct AppState {
    /// File or directory being previewed.
    target: PathBuf,
    /// Directory that is watched.
    root: PathBuf,
    version: Arc<AtomicU64>,
    reload_tx: broadcast::Sender<u64>,
    host: Arc<Mutex<SandboxHost>>,
}

pub(crate) async fn run_server(path: PathBuf, port: u16, watch: bool) -> Result<(), String> {
    let target = path
        .canonicalize()
        .map_err(|e| format!("failed to resolve {}: {e}", path.display()))?;
    let root = if target.is_dir() {
        target.clone()
    } else {
        target
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| format!("{} has no parent directory", target.display()))?
    };

    let mut host = SandboxHost::new(load_config(&target)?);
    if let Some(event) = host.load(load_input(&target)?) {
        tracing::warn!(event = ?event, "initial page was rejected");
    }
    let routes: Vec<String> = host
        .registry()
        .paths()
        .into_iter()
        .map(str::to_string)
        .collect();
    let host = Arc::new(Mutex::new(host));

    let state = Arc::new(AppState {
        target: target.clone(),
        root: root.clone(),
        version: Arc::new(AtomicU64::new(0)),
        reload_tx: broadcast::channel(256).0,
        host: Arc::clone(&host),
    });

    if watch {
        let watcher_state = Arc::clone(&state);
        tokio::spawn(async move {
            watch_loop(watcher_state).await;
        });
    }

    let mut adapter = AxumPreviewAdapter::new(host);
    if watch {
        adapter = adapter.with_reload_socket(RELOAD_WS_PATH);
    }
    let app = Router::new()
        .route(RELOAD_WS_PATH, get(ws_reload))
        .with_state(Arc::clone(&state))
        .merge(adapter.router());

    let bind = format!("0.0.0.0:{port}");
    tracing::info!(
        path = %target.display(),
        routes = ?routes,
        watch,
        url = %format!("http://localhost:{port}"),
        "livepane dev"
    );

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|e| format!("failed to bind {bind}: {e}"))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server failed: {e}"))?;

    Ok(())
}

/// Quiet period after the last filesystem event before a rebuild.
const SETTLE: Duration = Duration::from_millis(120);
/// Full-tree sweep that catches changes the watcher missed.
const SWEEP: Duration = Duration::from_millis(1500);

async fn watch_loop(state: Arc<AppState>) {
    let mut last = tree_fingerprint(&state.root);
    let mut sweep = tokio::time::interval(SWEEP);
    let (_watcher, mut events) = match spawn_watcher(&state.root) {
        Ok((watcher, events)) => {
            tracing::info!(root = %state.root.display(), "watching for changes");
            (Some(watcher), Some(events))
        }
        Err(err) => {
            tracing::warn!(error = %err, "no filesystem events, sweeping only");
            (None, None)
        }
    };

    loop {
        let Some(rx) = events.as_mut() else {
            sweep.tick().await;
            rebuild_if_changed(&state, &mut last).await;
            continue;
        };
        tokio::select! {
            _ = sweep.tick() => rebuild_if_changed(&state, &mut last).await,
            received = rx.recv() => {
                if received.is_none() {
                    tracing::warn!("filesystem event stream ended, sweeping only");
                    events = None;
                    continue;
                }
                settle(rx).await;
                rebuild_if_changed(&state, &mut last).await;
            }
        }
    }
}

/// Rebuilds the document under a new generation and tells every open host
/// page to reload its frame.
async fn rebuild_if_changed(state: &Arc<AppState>, last: &mut u64) {
    let root = state.root.clone();
    let now = tokio::task::spawn_blocking(move || tree_fingerprint(&root))
        .await
        .unwrap_or(*last);
    if now == *last {
        return;
    }
    *last = now;

    let target = state.target.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        Ok::<_, String>((load_config(&target)?, load_input(&target)?))
    })
    .await
    .map_err(|e| e.to_string())
    .and_then(|res| res);
    let (config, input) = match loaded {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(error = %err, "sources unreadable, keeping previous preview");
            return;
        }
    };

    let generation = match state.host.lock() {
        Ok(mut host) => {
            host.set_config(config);
            if let Some(event) = host.load(input) {
                tracing::warn!(event = ?event, "current page rejected after change");
            }
            host.session().generation()
        }
        Err(_) => {
            tracing::error!("preview host lock poisoned");
            return;
        }
    };

    let version = state.version.fetch_add(1, Ordering::SeqCst) + 1;
    let _ = state.reload_tx.send(version);
    tracing::info!(version, generation, "preview rebuilt");
}

/// Drains events until none arrive for [`SETTLE`].
async fn settle(rx: &mut mpsc::UnboundedReceiver<()>) {
    while let Ok(Some(())) = tokio::time::timeout(SETTLE, rx.recv()).await {}
}

fn spawn_watcher(root: &Path) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<()>), String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let relevant = match &res {
            Ok(event) => event_is_relevant(event),
            Err(_) => true,
        };
        if relevant {
            let _ = tx.send(());
        }
    })
    .map_err(|e| format!("cannot create watcher: {e}"))?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| format!("cannot watch {}: {e}", root.display()))?;
    Ok((watcher, rx))
}

fn event_is_relevant(event: &Event) -> bool {
    event
        .paths
        .iter()
        .filter(|path| !path_has_ignored_segment(path))
        .any(|path| path.is_dir() || is_watched_source(path))
}

/// Hash over every file's relative path, size and mtime under `root`, plus
/// the bytes of watched sources.
fn tree_fingerprint(root: &Path) -> u64 {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                if !path_has_ignored_segment(Path::new(&entry.file_name())) {
                    pending.push(path);
                }
            } else if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();

    let mut hasher = DefaultHasher::new();
    for path in &files {
        path.strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .hash(&mut hasher);
        if let Ok(meta) = fs::metadata(path) {
            meta.len().hash(&mut hasher);
            if let Ok(modified) = meta.modified()
                && let Ok(since) = modified.duration_since(std::time::UNIX_EPOCH)
            {
                since.as_nanos().hash(&mut hasher);
            }
        }
        // Same-size edits within one mtime tick are only visible in the bytes.
        if is_watched_source(path)
            && let Ok(bytes) = fs::read(path)
        {
            bytes.hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// Page sources and the config file.
fn is_watched_source(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext, "jsx" | "tsx" | "js" | "ts" | "json"))
}

async fn ws_reload(ws: WebSocketUpgrade, AxumState(state): AxumState<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| stream_versions(socket, state))
}

/// Sends the current reload version, then every new one until the page
/// goes away.
async fn stream_versions(mut socket: WebSocket, state: Arc<AppState>) {
    let mut updates = state.reload_tx.subscribe();
    let mut version = state.version.load(Ordering::SeqCst);
    loop {
        if socket
            .send(Message::Text(version.to_string().into()))
            .await
            .is_err()
        {
            return;
        }
        version = loop {
            tokio::select! {
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => {}
                },
                next = updates.recv() => match next {
                    Ok(next) => break next,
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            }
        };
    }
}
