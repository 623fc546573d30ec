//! 网关：连接生命周期与 WebSocket 传输
//!
//! - **message**: 会话与传输之间的事件、回复格式与关闭码
//! - **auth**: 连接凭证到用户身份的解析（失败即匿名）
//! - **session**: 会话控制器，持有跨轮历史并驱动编排器
//! - **hub**: WebSocket 服务器（需启用 `gateway` feature）
//! - **web**: FAQ 列表与检索的 HTTP 接口（需启用 `web` feature）

pub mod auth;
#[cfg(feature = "gateway")]
mod hub;
pub mod message;
pub mod session;
#[cfg(feature = "web")]
pub mod web;

pub use auth::{credential_from_query, AnonymousResolver, IdentityResolver, JwtIdentityResolver, UserIdentity};
#[cfg(feature = "gateway")]
pub use hub::{Hub, HubConfig};
pub use message::{AgentReply, Inbound, Outbound};
pub use session::{SessionController, SessionSummary, DEFAULT_MAX_CONTEXT_TURNS};
