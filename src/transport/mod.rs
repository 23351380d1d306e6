/// HTTP Transport 抽象
///
/// Session Manager 只通过这个 trait 访问网络：给定 URL 和选项，
/// 异步返回带 ok 标志、status text 和 JSON 响应体的 Response
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::TransportError;

pub mod http_client;

pub use http_client::ReqwestTransport;

/// HTTP 方法（Session Manager 只使用 GET）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// 是否携带凭据（cookies）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    /// 跨域请求也携带 cookies
    #[default]
    Include,
    /// 不携带 cookies
    Omit,
}

/// 请求选项
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub credentials: Credentials,
}

impl RequestOptions {
    /// 带凭据的 GET 请求
    pub fn credentialed_get() -> Self {
        Self {
            method: Method::Get,
            credentials: Credentials::Include,
        }
    }
}

/// Transport 返回的响应
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }

    /// 状态码是否为 2xx
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 将响应体解析为 JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// 注入式 HTTP Transport
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn fetch(
        &self,
        url: &Url,
        options: RequestOptions,
    ) -> Result<TransportResponse, TransportError>;
}
