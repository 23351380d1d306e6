/// 错误类型定义
///
/// 库内所有操作都返回带类型的错误，由调用方决定是否静默降级
use thiserror::Error;

/// HTTP Transport 层错误（网络失败、请求被拒绝等）
#[derive(Debug, Error)]
pub enum TransportError {
    /// 请求未能发出或响应未能读取
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// HTTP 客户端初始化失败
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// 弹出窗口创建失败
#[derive(Debug, Error)]
pub enum PopupError {
    /// 浏览器进程无法启动
    #[error("failed to launch browser `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// 系统默认浏览器无法打开
    #[error("failed to open system browser: {0}")]
    SystemBrowser(String),

    /// 宿主环境拦截了窗口（测试替身或无界面环境）
    #[error("popup was blocked")]
    Blocked,
}

/// Session Manager 的统一错误
#[derive(Debug, Error)]
pub enum AuthError {
    /// 网络层失败
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 服务端返回非 2xx 状态
    ///
    /// `message` 优先取响应体中的 `error` 字段，否则为 status text
    #[error("Failed to {action}: {message}")]
    Status {
        action: &'static str,
        status: u16,
        message: String,
    },

    /// 响应体不是预期的 JSON 结构
    #[error("Failed to {action}: malformed response body: {source}")]
    InvalidBody {
        action: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// 服务端签发的 Token 已经过期
    #[error("token endpoint returned an already expired token (exp={exp})")]
    ExpiredToken { exp: f64 },

    /// Provider 不在已知列表中
    #[error("Provider \"{0}\" is not known.")]
    UnknownProvider(String),

    /// 加载后 Provider 列表仍不可用
    #[error("identity providers could not be loaded")]
    ProvidersUnavailable,

    /// 登录窗口无法打开（通常是被拦截）
    #[error("Failed to open authentication window: {0}")]
    PopupBlocked(#[from] PopupError),

    /// 配置的 base URL 无法用于拼接端点
    #[error("invalid endpoint url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl AuthError {
    /// 是否为网络/协议层失败（而不是参数校验失败）
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Status { .. } | Self::InvalidBody { .. }
        )
    }
}
