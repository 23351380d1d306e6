/// Auth 服务端响应的数据结构
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// `GET /providers` 成功响应
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersResponse {
    pub providers: Vec<String>,
}

/// `GET /token` 成功响应
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer Token（服务端可能不返回）
    pub token: Option<String>,

    /// Token 绑定的邮箱
    pub email: Option<String>,

    /// 过期时间（Unix 秒，可能带小数）
    pub exp: f64,
}

impl TokenResponse {
    /// 将 `exp` 转换为绝对过期时间
    ///
    /// 超出可表示范围时返回 None
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if !self.exp.is_finite() {
            return None;
        }
        DateTime::from_timestamp_millis((self.exp * 1000.0).round() as i64)
    }
}

/// 失败响应 `{ error?: string }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
}
