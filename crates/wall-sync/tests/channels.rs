//! Channel and engine tests against an in-process collaborator.
//! Each test binds its own server on an ephemeral port.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use wall_core::{ConnectionStatus, FrameSnapshot, IdeaId, Renderer, Update};
use wall_sync::{
    ChannelMessage, ErrorKind, PollChannel, PushChannel, RunOptions, Source, WallConfig,
};

/// Sent on the broadcast channel to close every open socket.
const CLOSE: &str = "__close__";

#[derive(Clone)]
struct Collaborator {
    ideas: Arc<Mutex<Vec<Value>>>,
    header: Arc<Mutex<String>>,
    events: broadcast::Sender<String>,
    push_enabled: Arc<AtomicBool>,
    subscriptions: Arc<AtomicUsize>,
}

impl Collaborator {
    fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            ideas: Arc::new(Mutex::new(Vec::new())),
            header: Arc::new(Mutex::new("What ways can we use AI?".to_string())),
            events,
            push_enabled: Arc::new(AtomicBool::new(true)),
            subscriptions: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn add(&self, idea: Value) {
        self.ideas.lock().unwrap().push(idea.clone());
        let _ = self
            .events
            .send(json!({"type": "idea.new", "data": idea}).to_string());
    }

    /// Add to the collection without announcing it.
    fn add_silently(&self, idea: Value) {
        self.ideas.lock().unwrap().push(idea);
    }

    fn set_header(&self, text: &str) {
        *self.header.lock().unwrap() = text.to_string();
        let _ = self
            .events
            .send(json!({"type": "header.set", "data": text}).to_string());
    }

    fn broadcast_raw(&self, raw: &str) {
        let _ = self.events.send(raw.to_string());
    }
}

fn idea_json(id: u64, text: &str) -> Value {
    json!({
        "id": id,
        "author": "tester",
        "text": text,
        "created_at": "2025-03-01T09:30:00"
    })
}

async fn list_ideas(State(c): State<Collaborator>) -> Json<Value> {
    Json(Value::Array(c.ideas.lock().unwrap().clone()))
}

async fn get_header(State(c): State<Collaborator>) -> Json<Value> {
    Json(json!({"header": c.header.lock().unwrap().clone()}))
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!([]))
}

async fn broken() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn push_socket(ws: WebSocketUpgrade, State(c): State<Collaborator>) -> Response {
    if !c.push_enabled.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    c.subscriptions.fetch_add(1, Ordering::SeqCst);
    let rx = c.events.subscribe();
    let hello = json!({
        "type": "hello",
        "data": {
            "header": c.header.lock().unwrap().clone(),
            "ideas": c.ideas.lock().unwrap().clone(),
        }
    })
    .to_string();

    ws.on_upgrade(move |socket| relay(socket, hello, rx))
}

/// Send hello, then every broadcast, until the close sentinel.
async fn relay(socket: WebSocket, hello: String, mut rx: broadcast::Receiver<String>) {
    let outgoing = async_stream::stream! {
        yield Ok::<_, axum::Error>(Message::Text(hello.into()));
        while let Ok(msg) = rx.recv().await {
            if msg == CLOSE {
                yield Ok(Message::Close(None));
                break;
            }
            yield Ok(Message::Text(msg.into()));
        }
    };
    let (sink, _incoming) = socket.split();
    let _ = outgoing.forward(sink).await;
}

async fn spawn_collaborator(collab: Collaborator) -> String {
    let app = Router::new()
        .route("/ideas", get(list_ideas))
        .route("/header", get(get_header))
        .route("/ws", get(push_socket))
        .route("/slow", get(slow))
        .route("/broken", get(broken))
        .with_state(collab);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config_for(base_url: &str) -> WallConfig {
    let mut config = WallConfig::default();
    config.api.base_url = base_url.to_string();
    config.poll.interval_ms = 100;
    config.poll.timeout_ms = 1_000;
    config.push.connect_timeout_ms = 1_000;
    config.push.backoff_base_ms = 20;
    config.push.backoff_max_ms = 80;
    config.display.fps = 100;
    config
}

fn rng() -> rand::rngs::SmallRng {
    use rand::SeedableRng;
    rand::rngs::SmallRng::seed_from_u64(5)
}

async fn next_update(rx: &mut mpsc::Receiver<ChannelMessage>) -> (Source, Update) {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for an update")
            .expect("channel closed");
        if let ChannelMessage::Update { source, update } = message {
            return (source, update);
        }
    }
}

// ---------------------------------------------------------------------------
// Poll channel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn poll_fetch_reads_collection_and_header() {
    let collab = Collaborator::new();
    collab.add_silently(idea_json(1, "Reduce meetings"));
    collab.add_silently(idea_json(2, "Async standups"));
    *collab.header.lock().unwrap() = "Ideas for the offsite?".into();
    let base = spawn_collaborator(collab).await;

    let poll = PollChannel::new(&config_for(&base)).unwrap();
    let outcome = poll.fetch().await.unwrap();
    assert_eq!(outcome.ideas.ideas.len(), 2);
    assert!(outcome.ideas.is_complete());
    assert_eq!(outcome.header.as_deref(), Some("Ideas for the offsite?"));

    match outcome.into_update() {
        Update::Snapshot { authoritative, .. } => assert!(authoritative),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn poll_with_malformed_entry_is_not_authoritative() {
    let collab = Collaborator::new();
    collab.add_silently(idea_json(1, "fine"));
    collab.add_silently(json!({"id": 2, "text": "", "created_at": "2025-03-01T09:30:00"}));
    let base = spawn_collaborator(collab).await;

    let outcome = PollChannel::new(&config_for(&base))
        .unwrap()
        .fetch()
        .await
        .unwrap();
    assert_eq!(outcome.ideas.rejected, 1);
    match outcome.into_update() {
        Update::Snapshot {
            ideas,
            authoritative,
            ..
        } => {
            assert_eq!(ideas.len(), 1);
            assert!(!authoritative);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn poll_against_dead_address_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let poll = PollChannel::new(&config_for(&format!("http://{addr}"))).unwrap();
    let err = poll.fetch().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn poll_times_out() {
    let base = spawn_collaborator(Collaborator::new()).await;
    let mut config = config_for(&base);
    config.api.ideas_path = "/slow".into();
    config.poll.timeout_ms = 100;

    let err = PollChannel::new(&config).unwrap().fetch().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn poll_run_counts_failures_and_keeps_going() {
    let base = spawn_collaborator(Collaborator::new()).await;
    let mut config = config_for(&base);
    config.api.ideas_path = "/broken".into();
    config.poll.interval_ms = 20;

    let (tx, mut rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(PollChannel::new(&config).unwrap().run(tx, cancel.clone()));

    let mut last = 0;
    while last < 3 {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(ChannelMessage::PollFailed { failures })) => {
                assert_eq!(failures, last + 1);
                last = failures;
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    cancel.cancel();
    task.await.unwrap();
}

// ---------------------------------------------------------------------------
// Push channel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn push_delivers_hello_then_events() {
    let collab = Collaborator::new();
    collab.add_silently(idea_json(1, "Reduce meetings"));
    let base = spawn_collaborator(collab.clone()).await;

    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let push = PushChannel::new(&config_for(&base), rng()).unwrap();
    let task = tokio::spawn(push.run(tx, cancel.clone()));

    let (source, update) = next_update(&mut rx).await;
    assert_eq!(source, Source::Push);
    match update {
        Update::Hello { ideas, header } => {
            assert_eq!(ideas.len(), 1);
            assert_eq!(header.as_deref(), Some("What ways can we use AI?"));
        }
        other => panic!("unexpected {other:?}"),
    }

    collab.broadcast_raw("this is not json");
    collab.broadcast_raw(r#"{"type":"ping","data":null}"#);
    collab.add(idea_json(2, "Async standups"));
    collab.set_header("New question");

    let (_, update) = next_update(&mut rx).await;
    assert!(matches!(update, Update::IdeaAdded(ref i) if i.id == IdeaId(2)));
    let (_, update) = next_update(&mut rx).await;
    assert_eq!(update, Update::HeaderChanged("New question".into()));

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn push_backs_off_then_recovers() {
    let collab = Collaborator::new();
    collab.push_enabled.store(false, Ordering::SeqCst);
    let base = spawn_collaborator(collab.clone()).await;

    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let push = PushChannel::new(&config_for(&base), rng()).unwrap();
    let task = tokio::spawn(push.run(tx, cancel.clone()));

    let mut max_retry = 0;
    let mut delays_ok = true;
    let mut previous_due = None;
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let ChannelMessage::Connection(state) = message else {
            continue;
        };
        match state.status {
            ConnectionStatus::Backoff => {
                max_retry = max_retry.max(state.retry_count);
                if let (Some(prev), Some(due)) = (previous_due, state.next_retry_at) {
                    delays_ok &= due > prev;
                }
                previous_due = state.next_retry_at;
                if max_retry == 4 {
                    collab.push_enabled.store(true, Ordering::SeqCst);
                }
            }
            ConnectionStatus::Connected => {
                assert_eq!(state.retry_count, 0);
                break;
            }
            _ => {}
        }
    }
    assert!(max_retry >= 4);
    assert!(delays_ok);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn push_resubscribes_after_server_closes_socket() {
    let collab = Collaborator::new();
    let base = spawn_collaborator(collab.clone()).await;

    let (tx, mut rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();
    let push = PushChannel::new(&config_for(&base), rng()).unwrap();
    let task = tokio::spawn(push.run(tx, cancel.clone()));

    let (_, first) = next_update(&mut rx).await;
    assert!(matches!(first, Update::Hello { .. }));

    collab.add_silently(idea_json(3, "missed while closed"));
    collab.broadcast_raw(CLOSE);

    let (_, second) = next_update(&mut rx).await;
    match second {
        Update::Hello { ideas, .. } => assert!(ideas.iter().any(|i| i.id == IdeaId(3))),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(collab.subscriptions.load(Ordering::SeqCst), 2);

    cancel.cancel();
    task.await.unwrap();
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Cancels the run once `done` holds for a presented snapshot.
struct StopWhen<F> {
    cancel: CancellationToken,
    done: F,
    last: Option<FrameSnapshot>,
    saw_degraded: bool,
}

impl<F: FnMut(&FrameSnapshot) -> bool> StopWhen<F> {
    fn new(cancel: CancellationToken, done: F) -> Self {
        Self {
            cancel,
            done,
            last: None,
            saw_degraded: false,
        }
    }
}

impl<F: FnMut(&FrameSnapshot) -> bool> Renderer for StopWhen<F> {
    fn present(&mut self, snapshot: &FrameSnapshot) {
        if matches!(
            snapshot.connection,
            ConnectionStatus::Backoff | ConnectionStatus::Connecting
        ) {
            self.saw_degraded = true;
        }
        if (self.done)(snapshot) {
            self.cancel.cancel();
        }
        self.last = Some(snapshot.clone());
    }
}

#[tokio::test]
async fn engine_merges_both_channels() {
    let collab = Collaborator::new();
    collab.add_silently(idea_json(1, "Reduce meetings"));
    collab.add_silently(idea_json(2, "Async standups"));
    let base = spawn_collaborator(collab.clone()).await;
    let config = config_for(&base);

    let pusher = {
        let collab = collab.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            collab.add(idea_json(3, "Demo day every month"));
            collab.set_header("Ideas for Friday?");
        })
    };

    let cancel = CancellationToken::new();
    let mut renderer = StopWhen::new(cancel.clone(), |s: &FrameSnapshot| {
        s.idea_count == 3 && s.header == "Ideas for Friday?" && s.actors.len() == 3
    });
    let options = RunOptions {
        max_frames: None,
        seed: Some(11),
    };
    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        wall_sync::run(&config, &mut renderer, cancel, options),
    )
    .await
    .expect("engine did not converge")
    .unwrap();
    pusher.await.unwrap();

    assert_eq!(summary.ideas, 3);
    assert_eq!(summary.conflicts, 0);
    assert_eq!(summary.header, "Ideas for Friday?");
    let last = renderer.last.unwrap();
    let ids: Vec<IdeaId> = last.actors.iter().map(|a| a.idea_id).collect();
    assert_eq!(ids, vec![IdeaId(1), IdeaId(2), IdeaId(3)]);
    assert!(last.spotlight.is_some());
}

#[tokio::test]
async fn engine_stays_consistent_while_push_is_down() {
    let collab = Collaborator::new();
    collab.push_enabled.store(false, Ordering::SeqCst);
    collab.add_silently(idea_json(1, "first"));
    let base = spawn_collaborator(collab.clone()).await;
    let config = config_for(&base);

    let feeder = {
        let collab = collab.clone();
        tokio::spawn(async move {
            for id in 2..=4 {
                tokio::time::sleep(Duration::from_millis(150)).await;
                collab.add_silently(idea_json(id, "via poll only"));
            }
        })
    };

    let cancel = CancellationToken::new();
    let mut renderer = StopWhen::new(cancel.clone(), |s: &FrameSnapshot| s.idea_count == 4);
    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        wall_sync::run(&config, &mut renderer, cancel, RunOptions::default()),
    )
    .await
    .expect("poll fallback did not converge")
    .unwrap();
    feeder.await.unwrap();

    assert_eq!(summary.ideas, 4);
    assert!(renderer.saw_degraded);
    assert_eq!(collab.subscriptions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn engine_stops_after_max_frames() {
    let base = spawn_collaborator(Collaborator::new()).await;
    let config = config_for(&base);
    let cancel = CancellationToken::new();
    let mut renderer = StopWhen::new(cancel.clone(), |_: &FrameSnapshot| false);
    let options = RunOptions {
        max_frames: Some(5),
        seed: Some(1),
    };
    let summary = wall_sync::run(&config, &mut renderer, cancel, options)
        .await
        .unwrap();
    assert_eq!(summary.frames, 5);
    assert_eq!(renderer.last.unwrap().frame, 5);
}
