//! 连接身份解析
//!
//! 凭证来自连接 URL 的 token 查询参数，格式 "<AuthType> <Token>" 或直接是 token。
//! 解析失败（缺失、签名错误、过期、字段缺失）一律视为匿名，从不拒绝连接。

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// 已认证用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: i64,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    id: i64,
    username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<u64>,
}

/// 身份解析能力；无法解析时返回 None（匿名）
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, credential: &str) -> Option<UserIdentity>;
}

/// 不校验任何凭证，所有会话都是匿名的（未配置 jwt_secret 时使用）
pub struct AnonymousResolver;

impl IdentityResolver for AnonymousResolver {
    fn resolve(&self, _credential: &str) -> Option<UserIdentity> {
        None
    }
}

/// HS256 JWT 校验
pub struct JwtIdentityResolver {
    secret: Vec<u8>,
}

impl JwtIdentityResolver {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Option<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).ok()
    }

    /// 为用户签发 token；ttl 为 None 时不设置过期时间
    pub fn issue_token(&self, user: &UserIdentity, ttl: Option<Duration>) -> Option<String> {
        let now = unix_now();
        let claims = Claims {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            exp: ttl.map(|t| now + t.as_secs()),
            iat: Some(now),
        };
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).ok()?);
        let signing_input = format!("{}.{}", header, payload);

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Some(format!("{}.{}", signing_input, signature))
    }

    fn verify(&self, token: &str) -> Option<Claims> {
        let mut parts = token.split('.');
        let (header, payload, signature) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }

        let header: serde_json::Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).ok()?).ok()?;
        if header.get("alg").and_then(|a| a.as_str()) != Some("HS256") {
            return None;
        }

        let mut mac = self.mac()?;
        mac.update(token[..token.rfind('.')?].as_bytes());
        mac.verify_slice(&URL_SAFE_NO_PAD.decode(signature).ok()?).ok()?;

        let claims: Claims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).ok()?).ok()?;
        if claims.exp.is_some_and(|exp| exp <= unix_now()) {
            return None;
        }
        Some(claims)
    }
}

impl IdentityResolver for JwtIdentityResolver {
    fn resolve(&self, credential: &str) -> Option<UserIdentity> {
        let token = strip_auth_type(credential);
        if token.is_empty() {
            return None;
        }
        let claims = self.verify(token)?;
        Some(UserIdentity {
            id: claims.id,
            username: claims.username,
            email: claims.email,
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// "<AuthType> <Token>" 取 Token；没有空格时整体即 token
fn strip_auth_type(credential: &str) -> &str {
    let credential = credential.trim();
    match credential.split_once(' ') {
        Some((_, token)) => token.trim(),
        None => credential,
    }
}

/// 从连接 URL 的查询串中取出 token 参数
pub fn credential_from_query(query: Option<&str>) -> Option<String> {
    form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .filter(|v| !v.trim().is_empty())
}
