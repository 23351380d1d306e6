/// 基于 reqwest 的 HTTP Transport
///
/// 目的：
/// 1. 复用 TCP 连接和连接池（每个 Transport 持有一个长期 Client）
/// 2. 在内存 cookie jar 中保存会话 cookie，实现"带凭据"的请求
/// 3. 统一超时、重定向和 User-Agent 配置
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use super::{Credentials, HttpTransport, Method, RequestOptions, TransportResponse};
use crate::error::TransportError;

const USER_AGENT: &str = concat!("kingdom-auth/", env!("CARGO_PKG_VERSION"));

/// 构建 HTTP 客户端
///
/// # Arguments
/// * `cookies` - 是否启用 cookie store
fn build_client(cookies: bool) -> Result<Client, reqwest::Error> {
    Client::builder()
        // 连接池配置
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(300))
        // 超时配置
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        // 重定向配置
        .redirect(reqwest::redirect::Policy::limited(5))
        .cookie_store(cookies)
        .user_agent(USER_AGENT)
        .build()
}

/// reqwest Transport
///
/// `Credentials::Include` 的请求走带 cookie jar 的客户端，
/// `Credentials::Omit` 走不保存也不发送 cookie 的客户端
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    credentialed: Client,
    anonymous: Client,
}

impl ReqwestTransport {
    /// 创建 Transport（拥有独立的 cookie jar）
    ///
    /// # Errors
    /// - TLS 后端初始化失败
    pub fn new() -> Result<Self, TransportError> {
        let credentialed =
            build_client(true).map_err(|e| TransportError::Client(e.to_string()))?;
        let anonymous = build_client(false).map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            credentialed,
            anonymous,
        })
    }

    fn client_for(&self, credentials: Credentials) -> &Client {
        match credentials {
            Credentials::Include => &self.credentialed,
            Credentials::Omit => &self.anonymous,
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn fetch(
        &self,
        url: &Url,
        options: RequestOptions,
    ) -> Result<TransportResponse, TransportError> {
        let client = self.client_for(options.credentials);
        let request = match options.method {
            Method::Get => client.get(url.clone()),
            Method::Post => client.post(url.clone()),
        };

        tracing::debug!("{} {}", options.method.as_str(), url);

        let response = request.send().await.map_err(|e| TransportError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request {
                url: url.to_string(),
                message: format!("读取响应体失败: {}", e),
            })?;

        tracing::debug!("{} {} -> {}", options.method.as_str(), url, status);

        Ok(TransportResponse::new(status.as_u16(), status_text, body.to_vec()))
    }
}
