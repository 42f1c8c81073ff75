//! DevTools WebSocket connection.
//!
//! Requests are correlated with responses by id. Each pending request owns a
//! oneshot sender that the read loop completes; events are fanned out on a
//! broadcast channel so page-level waiters can subscribe before they act.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bankscrape_protocol::{Event, Message, Request};
use futures_util::{SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tracing::{debug, trace, warn};

use crate::error::{DriverError, Result};

const EVENT_CAPACITY: usize = 512;

struct Pending {
	method: String,
	tx: oneshot::Sender<Result<Value>>,
}

/// State shared between the connection handle and its read loop.
struct Shared {
	pending: Mutex<HashMap<u64, Pending>>,
	events: broadcast::Sender<Event>,
}

impl Shared {
	fn new() -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		Self {
			pending: Mutex::new(HashMap::new()),
			events,
		}
	}

	fn dispatch(&self, message: Message) -> Result<()> {
		match message {
			Message::Response(response) => {
				let pending = self.pending.lock().remove(&response.id).ok_or_else(|| DriverError::Protocol {
					method: "<unknown>".to_string(),
					message: format!("Cannot find request to respond: id={}", response.id),
				})?;

				let result = match response.error {
					Some(error) => Err(DriverError::Protocol {
						method: pending.method,
						message: error.to_string(),
					}),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};

				let _ = pending.tx.send(result);
				Ok(())
			}
			Message::Event(event) => {
				trace!(target = "bankscrape.cdp", method = %event.method, "event");
				// No subscribers is fine.
				let _ = self.events.send(event);
				Ok(())
			}
		}
	}

	fn fail_all(&self) {
		let drained: Vec<Pending> = self.pending.lock().drain().map(|(_, pending)| pending).collect();
		for pending in drained {
			let _ = pending.tx.send(Err(DriverError::ChannelClosed));
		}
	}
}

/// A live DevTools session to one browser.
pub struct CdpConnection {
	next_id: AtomicU64,
	shared: Arc<Shared>,
	outbound: mpsc::UnboundedSender<String>,
	timeout: Duration,
	tasks: Vec<JoinHandle<()>>,
}

impl CdpConnection {
	/// Opens the browser-level WebSocket at `ws_url`.
	///
	/// `timeout` bounds every request sent through this connection.
	pub async fn connect(ws_url: &str, timeout: Duration) -> Result<Self> {
		let (socket, _) = tokio_tungstenite::connect_async(ws_url)
			.await
			.map_err(|e| DriverError::Connection(format!("WebSocket handshake with {} failed: {}", ws_url, e)))?;
		let (mut sink, stream) = socket.split();

		let shared = Arc::new(Shared::new());
		let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();

		let writer = tokio::spawn(async move {
			while let Some(text) = outbound_rx.recv().await {
				if let Err(e) = sink.send(WsMessage::Text(text)).await {
					warn!(target = "bankscrape.cdp", error = %e, "failed to write frame");
					break;
				}
			}
			let _ = sink.close().await;
		});
		let reader = tokio::spawn(read_loop(stream, Arc::clone(&shared)));

		debug!(target = "bankscrape.cdp", url = %ws_url, "connected");
		Ok(Self {
			next_id: AtomicU64::new(1),
			shared,
			outbound,
			timeout,
			tasks: vec![writer, reader],
		})
	}

	/// Sends `method` and waits for its result.
	///
	/// `params` are never logged.
	pub async fn send(&self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value> {
		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.shared.pending.lock().insert(
			id,
			Pending {
				method: method.to_string(),
				tx,
			},
		);

		let request = Request {
			id,
			method: method.to_string(),
			params,
			session_id: session_id.map(str::to_string),
		};
		let text = serde_json::to_string(&request)?;
		trace!(target = "bankscrape.cdp", id, method, "send");

		if self.outbound.send(text).is_err() {
			self.shared.pending.lock().remove(&id);
			return Err(DriverError::ChannelClosed);
		}

		match tokio::time::timeout(self.timeout, rx).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(DriverError::ChannelClosed),
			Err(_) => {
				self.shared.pending.lock().remove(&id);
				Err(DriverError::timeout(self.timeout, format!("response to {}", method)))
			}
		}
	}

	/// Subscribes to every event received after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		self.shared.events.subscribe()
	}
}

impl Drop for CdpConnection {
	fn drop(&mut self) {
		for task in &self.tasks {
			task.abort();
		}
		self.shared.fail_all();
	}
}

async fn read_loop<S>(mut stream: S, shared: Arc<Shared>)
where
	S: Stream<Item = std::result::Result<WsMessage, tungstenite::Error>> + Unpin,
{
	while let Some(frame) = stream.next().await {
		let text = match frame {
			Ok(WsMessage::Text(text)) => text,
			Ok(WsMessage::Close(_)) => break,
			Ok(_) => continue,
			Err(e) => {
				warn!(target = "bankscrape.cdp", error = %e, "read failed");
				break;
			}
		};

		match serde_json::from_str::<Message>(&text) {
			Ok(message) => {
				if let Err(e) = shared.dispatch(message) {
					warn!(target = "bankscrape.cdp", error = %e, "dispatch failed");
				}
			}
			Err(e) => warn!(target = "bankscrape.cdp", error = %e, "unparseable frame"),
		}
	}

	debug!(target = "bankscrape.cdp", "read loop ended");
	shared.fail_all();
}

#[cfg(test)]
mod tests {
	use bankscrape_protocol::{Response, ResponseError};
	use serde_json::json;

	use super::*;

	fn pending(shared: &Shared, id: u64, method: &str) -> oneshot::Receiver<Result<Value>> {
		let (tx, rx) = oneshot::channel();
		shared.pending.lock().insert(
			id,
			Pending {
				method: method.to_string(),
				tx,
			},
		);
		rx
	}

	#[tokio::test]
	async fn dispatch_response_success() {
		let shared = Shared::new();
		let rx = pending(&shared, 1, "Page.navigate");

		shared
			.dispatch(Message::Response(Response {
				id: 1,
				result: Some(json!({"frameId": "F1"})),
				error: None,
				session_id: None,
			}))
			.unwrap();

		let result = rx.await.unwrap().unwrap();
		assert_eq!(result["frameId"], "F1");
	}

	#[tokio::test]
	async fn dispatch_response_error_names_method() {
		let shared = Shared::new();
		let rx = pending(&shared, 2, "DOM.focus");

		shared
			.dispatch(Message::Response(Response {
				id: 2,
				result: None,
				error: Some(ResponseError {
					code: -32000,
					message: "Element is not focusable".to_string(),
					data: None,
				}),
				session_id: None,
			}))
			.unwrap();

		match rx.await.unwrap().unwrap_err() {
			DriverError::Protocol { method, message } => {
				assert_eq!(method, "DOM.focus");
				assert!(message.contains("not focusable"));
			}
			other => panic!("expected protocol error, got {other:?}"),
		}
	}

	#[test]
	fn dispatch_unknown_id_fails() {
		let shared = Shared::new();
		let err = shared
			.dispatch(Message::Response(Response {
				id: 999,
				result: None,
				error: None,
				session_id: None,
			}))
			.unwrap_err();
		assert!(err.to_string().contains("Cannot find request"));
	}

	#[tokio::test]
	async fn events_reach_subscribers() {
		let shared = Shared::new();
		let mut events = shared.events.subscribe();

		shared
			.dispatch(Message::Event(Event {
				method: "Page.lifecycleEvent".to_string(),
				params: json!({"name": "load"}),
				session_id: Some("S1".to_string()),
			}))
			.unwrap();

		let event = events.recv().await.unwrap();
		assert_eq!(event.params["name"], "load");
	}

	#[tokio::test]
	async fn read_loop_fails_pending_requests_when_stream_ends() {
		let shared = Arc::new(Shared::new());
		let answered = pending(&shared, 1, "Target.createTarget");
		let orphaned = pending(&shared, 2, "Page.navigate");

		let frames = vec![
			Ok(WsMessage::Text(r#"{"id": 1, "result": {"targetId": "T1"}}"#.to_string())),
			Ok(WsMessage::Text("not json".to_string())),
		];
		read_loop(futures_util::stream::iter(frames), Arc::clone(&shared)).await;

		assert_eq!(answered.await.unwrap().unwrap()["targetId"], "T1");
		assert!(matches!(orphaned.await.unwrap(), Err(DriverError::ChannelClosed)));
	}
}
