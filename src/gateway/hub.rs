//! Hub：WebSocket 服务器
//!
//! 每个连接一个任务：读任务把帧转为 Inbound，写任务把 Outbound 转为帧，
//! 中间由 SessionController 顺序处理用户消息。连接数由信号量限制，
//! 超出上限的连接在握手后以 1013 关闭。

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use super::auth::{credential_from_query, IdentityResolver};
use super::message::{
    Inbound, Outbound, CLOSE_INTERNAL_ERROR, CLOSE_NORMAL, CLOSE_TRY_AGAIN_LATER,
    CLOSE_UNSUPPORTED_DATA,
};
use super::session::SessionController;
use crate::config::AppConfig;
use crate::core::{GatewayError, Orchestrator};

/// 每个连接的事件队列长度
const CHANNEL_CAPACITY: usize = 32;

/// Hub 配置
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// WebSocket 监听地址
    pub bind_addr: String,
    /// 最大并发连接数
    pub max_connections: usize,
    /// 每个会话保留的最近轮数
    pub max_context_turns: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for HubConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            bind_addr: cfg.gateway.bind_addr.clone(),
            max_connections: cfg.gateway.max_connections,
            max_context_turns: cfg.app.max_context_turns,
        }
    }
}

pub struct Hub {
    config: HubConfig,
    orchestrator: Arc<Orchestrator>,
    resolver: Arc<dyn IdentityResolver>,
    limiter: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
    /// 所有连接的父取消令牌
    connections: CancellationToken,
}

impl Hub {
    pub fn new(
        config: HubConfig,
        orchestrator: Arc<Orchestrator>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            limiter: Arc::new(Semaphore::new(config.max_connections)),
            config,
            orchestrator,
            resolver,
            shutdown: shutdown_tx,
            connections: CancellationToken::new(),
        }
    }

    /// 启动网关，返回实际监听地址
    pub async fn start(&self) -> Result<SocketAddr, GatewayError> {
        let addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .map_err(|e| GatewayError::InvalidAddress(format!("{}: {}", self.config.bind_addr, e)))?;

        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Gateway listening on ws://{}", local_addr);

        let mut shutdown_rx = self.shutdown.subscribe();
        let orchestrator = Arc::clone(&self.orchestrator);
        let resolver = Arc::clone(&self.resolver);
        let limiter = Arc::clone(&self.limiter);
        let connections = self.connections.clone();
        let max_context_turns = self.config.max_context_turns;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                let permit = Arc::clone(&limiter).try_acquire_owned().ok();
                                let orchestrator = Arc::clone(&orchestrator);
                                let resolver = Arc::clone(&resolver);
                                let cancel = connections.child_token();

                                tokio::spawn(async move {
                                    if let Err(e) = handle_connection(
                                        stream,
                                        peer,
                                        orchestrator,
                                        resolver,
                                        permit,
                                        cancel,
                                        max_context_turns,
                                    ).await {
                                        tracing::error!("Connection error from {}: {}", peer, e);
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                            }
                        }
                    }
                }
            }
            tracing::info!("Gateway stopped accepting connections");
        });

        Ok(local_addr)
    }

    /// 停止接受新连接，并取消所有进行中的会话
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        self.connections.cancel();
    }

    /// 当前活跃连接数
    pub fn connection_count(&self) -> usize {
        self.config.max_connections - self.limiter.available_permits()
    }
}

fn close_frame(code: u16, reason: String) -> WsMessage {
    WsMessage::Close(Some(CloseFrame {
        code: CloseCode::from(code),
        reason: reason.into(),
    }))
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    orchestrator: Arc<Orchestrator>,
    resolver: Arc<dyn IdentityResolver>,
    permit: Option<OwnedSemaphorePermit>,
    cancel: CancellationToken,
    max_context_turns: usize,
) -> Result<(), GatewayError> {
    let mut query: Option<String> = None;
    let capture_query = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        query = req.uri().query().map(str::to_string);
        Ok(resp)
    };
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, capture_query)
        .await
        .map_err(|e| GatewayError::Handshake(e.to_string()))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let Some(_permit) = permit else {
        tracing::warn!("Connection limit reached, rejecting {}", peer);
        let _ = ws_tx
            .send(close_frame(CLOSE_TRY_AGAIN_LATER, "too many connections".into()))
            .await;
        return Ok(());
    };

    let user = credential_from_query(query.as_deref()).and_then(|c| resolver.resolve(&c));
    tracing::info!("New WebSocket connection from {}", peer);

    let (in_tx, in_rx) = mpsc::channel::<Inbound>(CHANNEL_CAPACITY);
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(CHANNEL_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(out) = out_rx.recv().await {
            let frame = match out {
                Outbound::Close { code, reason } => close_frame(code, reason),
                other => match other.to_text() {
                    Some(text) => WsMessage::Text(text),
                    None => continue,
                },
            };
            let closing = matches!(frame, WsMessage::Close(_));
            if ws_tx.send(frame).await.is_err() || closing {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let reader_cancel = cancel.clone();
    let reader = tokio::spawn(async move {
        while let Some(frame) = ws_rx.next().await {
            let event = match frame {
                Ok(WsMessage::Text(text)) => Inbound::Utterance(text),
                Ok(WsMessage::Binary(_)) => Inbound::Fault {
                    code: CLOSE_UNSUPPORTED_DATA,
                    reason: "binary frames are not supported".to_string(),
                },
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("WebSocket receive error: {}", e);
                    break;
                }
            };
            let fault = matches!(event, Inbound::Fault { .. });
            if in_tx.send(event).await.is_err() || fault {
                return;
            }
        }
        reader_cancel.cancel();
    });

    let session_out = out_tx.clone();
    let session_cancel = cancel.clone();
    let session = tokio::spawn(async move {
        let mut controller =
            SessionController::new(orchestrator, user).with_max_context_turns(max_context_turns);
        controller.run(in_rx, session_out, session_cancel).await
    });

    match session.await {
        Ok(summary) => {
            if summary.close_code.is_none() && !reader.is_finished() {
                let _ = out_tx
                    .send(Outbound::Close {
                        code: CLOSE_NORMAL,
                        reason: "server shutting down".to_string(),
                    })
                    .await;
            }
        }
        Err(e) => {
            tracing::error!("Session task for {} failed: {}", peer, e);
            let _ = out_tx.send(Outbound::error_notice("internal server error")).await;
            let _ = out_tx
                .send(Outbound::Close {
                    code: CLOSE_INTERNAL_ERROR,
                    reason: "internal error".to_string(),
                })
                .await;
        }
    }

    drop(out_tx);
    let _ = writer.await;
    reader.abort();

    tracing::info!("WebSocket connection closed: {}", peer);
    Ok(())
}
