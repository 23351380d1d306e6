//! Kingdom Auth 客户端
//!
//! 发现 Auth 服务提供的身份 Provider，通过弹窗完成 OAuth 登录，
//! 并在内存中维护自动续期的短期 Access Token。
//!
//! 网络和窗口都是注入的能力：
//! - [`transport::HttpTransport`]：带凭据的 HTTP 请求
//! - [`popup::PopupController`]：打开登录窗口并报告是否已关闭

pub mod clock;
pub mod config;
pub mod error;
pub mod popup;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{AuthError, PopupError, TransportError};
pub use session::{SessionManager, SessionOptions};
