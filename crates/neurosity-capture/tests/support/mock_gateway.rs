//! WebSocket server speaking the gateway's JSON-RPC dialect on localhost.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const STEP_TIMEOUT: Duration = Duration::from_secs(3);

pub fn rpc_id(request: &Value) -> u64 {
    request
        .get("id")
        .and_then(Value::as_u64)
        .expect("request missing numeric id")
}

enum ConnectionCommand {
    SendJson(Value),
    ForceClose,
}

pub struct MockConnection {
    request_rx: mpsc::Receiver<Value>,
    command_tx: mpsc::Sender<ConnectionCommand>,
}

impl MockConnection {
    pub async fn recv_request(&mut self) -> Value {
        timeout(STEP_TIMEOUT, self.request_rx.recv())
            .await
            .expect("timed out waiting for request")
            .expect("mock connection request channel closed")
    }

    pub async fn recv_request_method(&mut self, expected_method: &str) -> Value {
        let request = self.recv_request().await;
        let method = request.get("method").and_then(Value::as_str);
        assert_eq!(method, Some(expected_method), "unexpected method request");
        request
    }

    pub async fn send_json(&self, value: Value) {
        self.command_tx
            .send(ConnectionCommand::SendJson(value))
            .await
            .expect("failed to send command to mock connection");
    }

    pub async fn send_result(&self, id: u64, result: Value) {
        self.send_json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
        }))
        .await;
    }

    pub async fn send_error(&self, id: u64, code: i32, message: &str) {
        self.send_json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {
                "code": code,
                "message": message,
            }
        }))
        .await;
    }

    /// Push a metric frame the way the gateway does for subscriptions.
    pub async fn push_metric(&self, method: &str, subscription_id: &str, data: Value) {
        self.send_json(json!({
            "metric": method,
            "subscriptionId": subscription_id,
            "data": data,
        }))
        .await;
    }

    /// Answer the next `login` request with `token`.
    pub async fn accept_login(&mut self, token: &str) -> Value {
        let request = self.recv_request_method("login").await;
        self.send_result(rpc_id(&request), json!({ "token": token }))
            .await;
        request
    }

    pub async fn force_close(&self) {
        let _ = self.command_tx.send(ConnectionCommand::ForceClose).await;
    }
}

pub struct MockGateway {
    addr: SocketAddr,
    connection_rx: mpsc::Receiver<MockConnection>,
    server_task: JoinHandle<()>,
}

/// Pump one WebSocket: client requests go to the test, test commands go out.
async fn serve(stream: TcpStream, connections: mpsc::Sender<MockConnection>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut outgoing, mut incoming) = ws.split();
    let (request_tx, request_rx) = mpsc::channel(64);
    let (command_tx, mut commands) = mpsc::channel(64);

    // The loop keeps its own sender so the socket outlives the test's handle.
    let connection = MockConnection {
        request_rx,
        command_tx: command_tx.clone(),
    };
    if connections.send(connection).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ConnectionCommand::SendJson(value)) => {
                    let frame = Message::Text(value.to_string().into());
                    if outgoing.send(frame).await.is_err() {
                        break;
                    }
                }
                Some(ConnectionCommand::ForceClose) | None => break,
            },
            message = incoming.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(request) = serde_json::from_str::<Value>(&text) {
                        let _ = request_tx.send(request).await;
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

impl MockGateway {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        let (connection_tx, connection_rx) = mpsc::channel(16);

        let server_task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, connection_tx.clone()));
            }
        });

        Ok(Self {
            addr,
            connection_rx,
            server_task,
        })
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn accept_connection(&mut self) -> MockConnection {
        timeout(STEP_TIMEOUT, self.connection_rx.recv())
            .await
            .expect("timed out waiting for client connection")
            .expect("mock server connection channel closed")
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.server_task.abort();
    }
}
