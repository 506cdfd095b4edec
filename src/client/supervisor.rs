//! 연결 감시자
//!
//! 서버 생존 확인 후 실시간 채널을 열고, 끊기면 지수 백오프로 재연결한다.
//! 상태 변화는 watch 채널로 공개한다.

use crate::config::{ClientConfig, ReconnectConfig};
use crate::error::{ConnectivityError, TransportError};
use crate::protocol::{ClientMessage, ServerMessage};
use futures::{SinkExt, StreamExt};
use reqwest::header::CACHE_CONTROL;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Reconnecting { attempt: u32 },
    Disconnected,
    /// 재연결 시도 소진. 더 이상 시도하지 않는다.
    Failed,
}

/// `delay × 2^(attempt-1)`, 상한 `delay_max`
pub fn reconnect_delay(attempt: u32, policy: &ReconnectConfig) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    policy.delay.saturating_mul(factor).min(policy.delay_max)
}

pub struct ConnectionSupervisor {
    config: ClientConfig,
    http: reqwest::Client,
}

impl ConnectionSupervisor {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 생존 확인 후 채널 연결
    pub async fn connect(&self, greeting: Option<ClientMessage>) -> Result<Channel, ConnectivityError> {
        self.probe().await?;
        self.open_channel(greeting).await
    }

    /// 서버 루트에 GET. 응답이 오면 상태 코드와 무관하게 살아 있는 것으로 본다.
    pub async fn probe(&self) -> Result<(), ConnectivityError> {
        let url = self.config.probe_url();
        let policy = &self.config.probe;

        for attempt in 0..policy.attempts {
            let result = self
                .http
                .get(&url)
                .header(CACHE_CONTROL, "no-store")
                .timeout(policy.timeout)
                .send()
                .await;

            match result {
                Ok(response) => {
                    tracing::debug!(url = %url, status = %response.status(), "Server is reachable");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(url = %url, attempt = attempt + 1, error = %e, "Server probe failed");
                }
            }

            if attempt + 1 < policy.attempts {
                tokio::time::sleep(policy.backoff_step * (attempt + 1)).await;
            }
        }

        tracing::error!(url = %url, attempts = policy.attempts, "Server unreachable");
        Err(ConnectivityError::Unreachable {
            attempts: policy.attempts,
        })
    }

    /// 생존 확인 없이 채널만 연다
    pub async fn open_channel(
        &self,
        greeting: Option<ClientMessage>,
    ) -> Result<Channel, ConnectivityError> {
        let url = self.config.ws_url();
        let policy = self.config.reconnect.clone();
        let socket = dial(&url, policy.connect_timeout).await?;
        tracing::info!(url = %url, "Realtime channel connected");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let link = Link {
            url,
            policy,
            greeting,
            outbound: outbound_rx,
            inbound: inbound_tx,
            state: state_tx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(supervise(socket, link));

        Ok(Channel {
            outbound: outbound_tx,
            inbound: inbound_rx,
            state: state_rx,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// 실시간 채널 핸들. 드롭하면 감시 작업과 소켓이 정리된다.
pub struct Channel {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    inbound: mpsc::UnboundedReceiver<ServerMessage>,
    state: watch::Receiver<ConnectionState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Channel {
    /// 재연결 중 보낸 메시지는 다음 연결에서 순서대로 전송된다
    pub fn sender(&self) -> mpsc::UnboundedSender<ClientMessage> {
        self.outbound.clone()
    }

    pub fn send(&self, message: ClientMessage) -> bool {
        if self.state() == ConnectionState::Failed {
            return false;
        }
        self.outbound.send(message).is_ok()
    }

    pub async fn recv(&mut self) -> Option<ServerMessage> {
        self.inbound.recv().await
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// 소켓을 닫고 감시 작업 종료를 기다린다
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = (&mut self.task).await;
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 감시 작업이 소유하는 채널 반대편
struct Link {
    url: String,
    policy: ReconnectConfig,
    greeting: Option<ClientMessage>,
    outbound: mpsc::UnboundedReceiver<ClientMessage>,
    inbound: mpsc::UnboundedSender<ServerMessage>,
    state: watch::Sender<ConnectionState>,
    shutdown: oneshot::Receiver<()>,
}

enum PumpExit {
    Closed,
    Dropped,
}

async fn dial(url: &str, timeout: Duration) -> Result<Socket, TransportError> {
    match tokio::time::timeout(timeout, connect_async(url)).await {
        Ok(Ok((socket, _response))) => Ok(socket),
        Ok(Err(e)) => Err(TransportError::WebSocket(e)),
        Err(_) => Err(TransportError::Timeout(timeout)),
    }
}

async fn supervise(mut socket: Socket, mut link: Link) {
    loop {
        match pump(socket, &mut link).await {
            PumpExit::Closed => {
                link.state.send_replace(ConnectionState::Disconnected);
                tracing::info!(url = %link.url, "Realtime channel closed");
                return;
            }
            PumpExit::Dropped => {
                link.state.send_replace(ConnectionState::Disconnected);
                tracing::warn!(url = %link.url, "Realtime channel dropped");
            }
        }

        socket = match reconnect(&mut link).await {
            Some(socket) => socket,
            None => return,
        };
        link.state.send_replace(ConnectionState::Connected);
        tracing::info!(url = %link.url, "Realtime channel reconnected");
    }
}

async fn reconnect(link: &mut Link) -> Option<Socket> {
    for attempt in 1..=link.policy.attempts {
        link.state
            .send_replace(ConnectionState::Reconnecting { attempt });

        let delay = reconnect_delay(attempt, &link.policy);
        let timeout = link.policy.connect_timeout;
        let url = link.url.clone();
        let attempt_dial = async move {
            tokio::time::sleep(delay).await;
            dial(&url, timeout).await
        };

        tokio::select! {
            result = attempt_dial => match result {
                Ok(socket) => return Some(socket),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Reconnect attempt failed");
                }
            },
            _ = &mut link.shutdown => {
                link.state.send_replace(ConnectionState::Disconnected);
                return None;
            }
        }
    }

    tracing::error!(attempts = link.policy.attempts, "Reconnect attempts exhausted");
    link.state.send_replace(ConnectionState::Failed);
    None
}

/// 연결 하나를 끊길 때까지 중계. 인사 메시지가 항상 먼저 나간다.
async fn pump(socket: Socket, link: &mut Link) -> PumpExit {
    let (mut sink, mut stream) = socket.split();

    if let Some(greeting) = &link.greeting {
        if send_json(&mut sink, greeting).await.is_err() {
            return PumpExit::Dropped;
        }
    }

    loop {
        tokio::select! {
            _ = &mut link.shutdown => {
                let _ = sink.send(Message::Close(None)).await;
                return PumpExit::Closed;
            }
            outgoing = link.outbound.recv() => match outgoing {
                Some(message) => {
                    if send_json(&mut sink, &message).await.is_err() {
                        return PumpExit::Dropped;
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    return PumpExit::Closed;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => {
                        if link.inbound.send(message).is_err() {
                            return PumpExit::Closed;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Ignoring undecodable server frame"),
                },
                Some(Ok(Message::Close(_))) | None => return PumpExit::Dropped,
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "WebSocket receive error");
                    return PumpExit::Dropped;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn send_json<S>(sink: &mut S, message: &ClientMessage) -> Result<(), TransportError>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode client message");
            return Ok(());
        }
    };
    sink.send(Message::Text(text)).await?;
    Ok(())
}
