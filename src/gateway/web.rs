//! FAQ 的 HTTP 接口（需启用 `web` feature）
//!
//! - `GET /`：全部 FAQ，`{"faq": [...]}`
//! - `GET /faq/search?q=...&k=5`：检索，k 取 1..=20，`{"results": [...]}`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::core::GatewayError;
use crate::tools::{FaqItem, FaqStore};

/// 检索接口允许的最大 k
pub const MAX_SEARCH_K: usize = 20;

#[derive(Debug, Serialize)]
struct InformationPage {
    faq: Vec<FaqItem>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<FaqItem>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
    #[serde(default = "default_k")]
    k: usize,
}

fn default_k() -> usize {
    5
}

type FaqState = Arc<dyn FaqStore>;

pub fn router(store: FaqState) -> Router {
    Router::new()
        .route("/", get(information))
        .route("/faq/search", get(search))
        .with_state(store)
}

async fn information(
    State(store): State<FaqState>,
) -> Result<Json<InformationPage>, (StatusCode, String)> {
    let faq = store
        .list()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))?;
    Ok(Json(InformationPage { faq }))
}

async fn search(
    State(store): State<FaqState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    if !(1..=MAX_SEARCH_K).contains(&query.k) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("k must be between 1 and {}", MAX_SEARCH_K),
        ));
    }
    let results = store.search(&query.q, query.k).await.map_err(|e| {
        tracing::warn!("FAQ search failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e)
    })?;
    Ok(Json(SearchResponse { results }))
}

/// 启动 FAQ HTTP 服务，shutdown 被取消时优雅退出；返回实际监听地址
pub async fn serve(
    bind_addr: &str,
    store: FaqState,
    shutdown: CancellationToken,
) -> Result<SocketAddr, GatewayError> {
    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| GatewayError::InvalidAddress(format!("{}: {}", bind_addr, e)))?;
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("FAQ API listening on http://{}", local_addr);

    tokio::spawn(async move {
        let result = axum::serve(listener, router(store))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!("FAQ API stopped with error: {}", e);
        }
    });

    Ok(local_addr)
}
