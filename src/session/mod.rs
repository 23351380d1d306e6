/// Session Manager - Provider 发现、弹窗登录与 Token 生命周期
///
/// 会话状态只保存在内存中：
/// - 读取 Token 时惰性检查是否临近过期（安全余量 10 秒）
/// - 刷新成功后在过期前 10 秒自动再次刷新
/// - 刷新失败或登出后回到未登录状态
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::error::AuthError;
use crate::popup::{PopupController, PopupFeatures};
use crate::transport::{HttpTransport, RequestOptions, TransportResponse};

mod state;
pub mod types;

use state::{PendingRefresh, SessionState};
use types::{ErrorBody, ProvidersResponse, TokenResponse};

/// 登录窗口关闭检测间隔
pub const POPUP_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Token 安全余量：剩余有效期不足该值即视为过期，自动刷新也提前该值触发
pub const REFRESH_MARGIN: Duration = Duration::from_secs(10);

/// 安全余量上限，超出时按上限处理
pub const MAX_REFRESH_MARGIN: Duration = Duration::from_secs(24 * 60 * 60);

/// 自动刷新的最小延迟
pub const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

/// Session Manager 可调参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub poll_interval: Duration,
    pub refresh_margin: Duration,
    pub min_refresh_delay: Duration,
    pub popup: PopupFeatures,

    /// 刷新成功后是否排期后台自动刷新
    pub auto_refresh: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll_interval: POPUP_POLL_INTERVAL,
            refresh_margin: REFRESH_MARGIN,
            min_refresh_delay: MIN_REFRESH_DELAY,
            popup: PopupFeatures::default(),
            auto_refresh: true,
        }
    }
}

/// Session Manager 构建器
pub struct SessionManagerBuilder {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    popup: Arc<dyn PopupController>,
    clock: Arc<dyn Clock>,
    options: SessionOptions,
}

impl SessionManagerBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(mut self) -> SessionManager {
        if self.options.refresh_margin > MAX_REFRESH_MARGIN {
            tracing::warn!(
                "⚠️ 安全余量 {:?} 超过上限，按 {:?} 处理",
                self.options.refresh_margin,
                MAX_REFRESH_MARGIN
            );
            self.options.refresh_margin = MAX_REFRESH_MARGIN;
        }

        let base_url = self
            .base_url
            .strip_suffix('/')
            .unwrap_or(&self.base_url)
            .to_string();
        let (token_tx, _) = watch::channel(None);

        SessionManager {
            inner: Arc::new(Inner {
                base_url,
                transport: self.transport,
                popup: self.popup,
                clock: self.clock,
                options: self.options,
                state: Mutex::new(SessionState::default()),
                token_tx,
            }),
        }
    }
}

/// Session Manager
///
/// 克隆后共享同一份会话状态
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: String,
    transport: Arc<dyn HttpTransport>,
    popup: Arc<dyn PopupController>,
    clock: Arc<dyn Clock>,
    options: SessionOptions,
    state: Mutex<SessionState>,
    token_tx: watch::Sender<Option<String>>,
}

impl SessionManager {
    /// 创建 Session Manager（系统时钟、默认参数）
    ///
    /// # Arguments
    /// * `base_url` - Auth 服务根地址，末尾的 `/` 会被去掉
    /// * `transport` - HTTP Transport
    /// * `popup` - 登录弹窗控制器
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        popup: Arc<dyn PopupController>,
    ) -> Self {
        Self::builder(base_url, transport, popup).build()
    }

    pub fn builder(
        base_url: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        popup: Arc<dyn PopupController>,
    ) -> SessionManagerBuilder {
        SessionManagerBuilder {
            base_url: base_url.into(),
            transport,
            popup,
            clock: Arc::new(SystemClock),
            options: SessionOptions::default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// 加载 Provider 列表，失败时返回空列表
    ///
    /// 失败只记录日志，已缓存的列表保持不变
    pub async fn list_providers(&self) -> Vec<String> {
        match self.try_list_providers().await {
            Ok(providers) => providers,
            Err(e) => {
                tracing::warn!("⚠️ 加载 Provider 列表失败: {}", e);
                Vec::new()
            }
        }
    }

    /// 加载 Provider 列表并缓存
    ///
    /// # Errors
    /// - 网络失败
    /// - 服务端返回非 2xx（消息取自响应体的 `error` 字段）
    /// - 响应体缺少 `providers`
    pub async fn try_list_providers(&self) -> Result<Vec<String>, AuthError> {
        const ACTION: &str = "load providers";

        let url = self.inner.endpoint("/providers")?;
        let response = self.inner.get(&url, ACTION).await?;
        let body: ProvidersResponse = response
            .json()
            .map_err(|source| AuthError::InvalidBody {
                action: ACTION,
                source,
            })?;

        tracing::info!("✅ 已加载 {} 个 Provider: {:?}", body.providers.len(), body.providers);
        self.inner.state.lock().providers = Some(body.providers.clone());

        Ok(body.providers)
    }

    /// 通过弹窗登录指定 Provider
    ///
    /// 弹窗关闭后刷新一次 Token 再返回；窗口关闭既可能是登录完成也可能是
    /// 用户取消，调用方应通过 [`SessionManager::get_token`] 确认结果
    ///
    /// 返回耗时包含这次 `/token` 请求（其失败不影响返回值）
    ///
    /// # Errors
    /// - Provider 列表无法加载
    /// - Provider 不在列表中
    /// - 弹窗无法打开
    pub async fn authenticate(&self, provider: &str) -> Result<(), AuthError> {
        let cached = self.inner.state.lock().providers.clone();
        let providers = match cached {
            Some(providers) => providers,
            None => match self.try_list_providers().await {
                Ok(providers) => providers,
                Err(e) => {
                    tracing::warn!("⚠️ 登录前加载 Provider 列表失败: {}", e);
                    return Err(AuthError::ProvidersUnavailable);
                }
            },
        };

        if !providers.iter().any(|p| p == provider) {
            return Err(AuthError::UnknownProvider(provider.to_string()));
        }

        let url = self.inner.endpoint(&format!("/auth/begin/{}", provider))?;
        tracing::info!("🔐 开始登录: provider={}", provider);

        let mut window = self.inner.popup.open(&url, self.inner.options.popup)?;
        window.focus();

        let period = self.inner.options.poll_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            ticker.tick().await;
            if window.is_closed() {
                break;
            }
        }
        drop(window);

        tracing::info!("登录窗口已关闭，刷新 Token");
        if let Err(e) = self.inner.refresh().await {
            tracing::warn!("⚠️ 登录窗口关闭后刷新 Token 失败: {}", e);
        }

        Ok(())
    }

    /// 获取有效 Token
    ///
    /// 剩余有效期大于安全余量时直接返回缓存，否则刷新一次；
    /// 刷新失败返回 None
    pub async fn get_token(&self) -> Option<String> {
        let now = self.inner.clock.now();
        let cached = self.inner.state.lock().fresh_token(now, self.inner.margin());
        if cached.is_some() {
            return cached;
        }

        if let Err(e) = self.inner.refresh().await {
            tracing::warn!("⚠️ 刷新 Token 失败: {}", e);
        }

        self.inner.state.lock().token.clone()
    }

    /// 立即刷新 Token
    ///
    /// 失败时会话状态被重置
    ///
    /// # Errors
    /// - 网络失败
    /// - 服务端返回非 2xx
    /// - 响应体格式错误或 Token 已过期
    pub async fn refresh(&self) -> Result<(), AuthError> {
        self.inner.refresh().await
    }

    /// 登出
    ///
    /// # Errors
    /// - 网络失败或服务端返回非 2xx（会话状态保持不变）
    pub async fn logout(&self) -> Result<(), AuthError> {
        let url = self.inner.endpoint("/auth/logout")?;
        self.inner.get(&url, "logout").await?;

        self.inner.reset();
        tracing::info!("✅ 已登出");

        Ok(())
    }

    /// 当前 Token 绑定的邮箱
    pub fn email(&self) -> Option<String> {
        self.inner.state.lock().email.clone()
    }

    /// 当前 Token 的过期时间（未登录时为 Unix 纪元）
    pub fn expiry(&self) -> DateTime<Utc> {
        self.inner.state.lock().expiry
    }

    /// 已缓存的 Provider 列表
    pub fn cached_providers(&self) -> Option<Vec<String>> {
        self.inner.state.lock().providers.clone()
    }

    /// 订阅 Token 变化（刷新成功、失败重置、登出）
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.inner.token_tx.subscribe()
    }
}

impl Inner {
    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        let raw = format!("{}{}", self.base_url, path);
        Url::parse(&raw).map_err(|source| AuthError::InvalidUrl { url: raw, source })
    }

    fn margin(&self) -> chrono::Duration {
        // build() 已把余量限制在 MAX_REFRESH_MARGIN 以内
        chrono::Duration::from_std(self.options.refresh_margin).unwrap_or(chrono::Duration::MAX)
    }

    /// 带凭据 GET，非 2xx 转换为 [`AuthError::Status`]
    async fn get(&self, url: &Url, action: &'static str) -> Result<TransportResponse, AuthError> {
        let response = self
            .transport
            .fetch(url, RequestOptions::credentialed_get())
            .await?;

        if !response.ok() {
            let message = response
                .json::<ErrorBody>()
                .ok()
                .and_then(|body| body.error)
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| response.status_text.clone());

            return Err(AuthError::Status {
                action,
                status: response.status,
                message,
            });
        }

        Ok(response)
    }

    async fn refresh(self: &Arc<Self>) -> Result<(), AuthError> {
        match self.fetch_token().await {
            Ok((token, email, expiry)) => {
                tracing::info!(
                    "✅ Token 刷新成功: email={}, 过期时间={}",
                    email.as_deref().unwrap_or("-"),
                    expiry
                );

                self.state.lock().set_session(token.clone(), email, expiry);
                self.publish(token);

                if self.options.auto_refresh {
                    self.schedule_refresh(expiry);
                }
                Ok(())
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    async fn fetch_token(
        &self,
    ) -> Result<(Option<String>, Option<String>, DateTime<Utc>), AuthError> {
        const ACTION: &str = "get token";

        let url = self.endpoint("/token")?;
        let response = self.get(&url, ACTION).await?;
        let body: TokenResponse = response
            .json()
            .map_err(|source| AuthError::InvalidBody {
                action: ACTION,
                source,
            })?;

        let now = self.clock.now();
        let expiry = body
            .expires_at()
            .filter(|expiry| *expiry > now)
            .ok_or(AuthError::ExpiredToken { exp: body.exp })?;

        Ok((body.token, body.email, expiry))
    }

    /// 排期自动刷新：过期前 `refresh_margin` 触发，最少延迟 `min_refresh_delay`
    fn schedule_refresh(self: &Arc<Self>, expiry: DateTime<Utc>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("⚠️ 没有 Tokio 运行时，跳过自动刷新");
            return;
        };

        let delay = (expiry - self.clock.now())
            .checked_sub(&self.margin())
            .and_then(|d| d.to_std().ok())
            .unwrap_or(Duration::ZERO)
            .max(self.options.min_refresh_delay);

        let mut state = self.state.lock();
        let generation = state.next_generation();
        let weak = Arc::downgrade(self);
        let handle = runtime.spawn(scheduled_refresh(weak, generation, delay));

        state.replace_pending(PendingRefresh {
            generation,
            handle: handle.abort_handle(),
        });

        tracing::debug!("已排期自动刷新: {:?} 后 (#{})", delay, generation);
    }

    fn reset(&self) {
        self.state.lock().clear_session();
        self.publish(None);
    }

    fn publish(&self, token: Option<String>) {
        self.token_tx.send_if_modified(|current| {
            if *current == token {
                return false;
            }
            *current = token;
            true
        });
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.state.get_mut().cancel_pending();
    }
}

/// 自动刷新任务：只持有弱引用，Session Manager 释放后任务直接结束
async fn scheduled_refresh(inner: Weak<Inner>, generation: u64, delay: Duration) {
    tokio::time::sleep(delay).await;

    let Some(inner) = inner.upgrade() else {
        return;
    };

    let owned = inner.state.lock().take_pending_if(generation);
    if !owned {
        return;
    }

    tracing::info!("⏰ 自动刷新 Token (#{})", generation);
    if let Err(e) = inner.refresh().await {
        tracing::warn!("⚠️ 自动刷新 Token 失败: {}", e);
    }
}
