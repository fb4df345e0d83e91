//! Mock Hermes and venue servers for integration tests.
//!
//! Both bind `127.0.0.1:0` and record what they receive.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const FEED_ID: &str = "0x44465e17d2e9d390e70c999d5a11fda4f092847fcd2e3e5aa089d96c98a30e67";

/// What the mock feed answers with.
#[derive(Debug, Clone)]
pub enum FeedReply {
    Price {
        price: String,
        expo: i32,
        publish_time: i64,
    },
    Status(u16),
}

struct FeedState {
    reply: Mutex<FeedReply>,
    requests: AtomicUsize,
}

/// Mock Hermes `latest_price_feeds` endpoint.
pub struct MockFeedServer {
    url: String,
    state: Arc<FeedState>,
    handle: JoinHandle<()>,
}

impl MockFeedServer {
    pub async fn start(reply: FeedReply) -> Self {
        let state = Arc::new(FeedState {
            reply: Mutex::new(reply),
            requests: AtomicUsize::new(0),
        });
        let app = Router::new()
            .route("/latest_price_feeds", get(latest_price_feeds))
            .with_state(state.clone());
        let (url, handle) = serve(app).await;
        Self { url, state, handle }
    }

    pub fn url(&self) -> String {
        self.url.clone()
    }

    pub fn set_reply(&self, reply: FeedReply) {
        *self.state.reply.lock() = reply;
    }

    pub fn set_price(&self, price: &str, expo: i32, publish_time: i64) {
        self.set_reply(FeedReply::Price {
            price: price.to_string(),
            expo,
            publish_time,
        });
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }
}

impl Drop for MockFeedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn latest_price_feeds(State(state): State<Arc<FeedState>>) -> (StatusCode, String) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let reply = state.reply.lock().clone();
    match reply {
        FeedReply::Price {
            price,
            expo,
            publish_time,
        } => {
            let body = json!([{
                "id": FEED_ID.trim_start_matches("0x"),
                "price": {
                    "price": price,
                    "conf": "1",
                    "expo": expo,
                    "publish_time": publish_time,
                },
            }]);
            (StatusCode::OK, body.to_string())
        }
        FeedReply::Status(code) => (
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "upstream unavailable".to_string(),
        ),
    }
}

struct VenueState {
    posts: Mutex<Vec<Value>>,
    reply: Mutex<(u16, String)>,
}

/// Mock venue action endpoint at `/exchange`.
pub struct MockVenueServer {
    url: String,
    state: Arc<VenueState>,
    handle: JoinHandle<()>,
}

impl MockVenueServer {
    pub async fn start() -> Self {
        let state = Arc::new(VenueState {
            posts: Mutex::new(Vec::new()),
            reply: Mutex::new((
                200,
                r#"{"status":"ok","response":{"type":"default"}}"#.to_string(),
            )),
        });
        let app = Router::new()
            .route("/exchange", post(exchange))
            .with_state(state.clone());
        let (url, handle) = serve(app).await;
        Self { url, state, handle }
    }

    pub fn url(&self) -> String {
        self.url.clone()
    }

    pub fn set_reply(&self, status: u16, body: &str) {
        *self.state.reply.lock() = (status, body.to_string());
    }

    pub fn posts(&self) -> Vec<Value> {
        self.state.posts.lock().clone()
    }

    pub fn post_count(&self) -> usize {
        self.state.posts.lock().len()
    }
}

impl Drop for MockVenueServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn exchange(State(state): State<Arc<VenueState>>, Json(body): Json<Value>) -> (StatusCode, String) {
    state.posts.lock().push(body);
    let (status, body) = state.reply.lock().clone();
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        body,
    )
}

async fn serve(app: Router) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), handle)
}
