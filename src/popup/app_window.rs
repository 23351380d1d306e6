/// 以"应用窗口"模式启动浏览器作为登录弹窗
///
/// Chromium 系浏览器支持 `--app=<url>` 打开无地址栏的独立窗口，
/// 窗口关闭时进程退出，因此进程退出即视为弹窗关闭
use std::process::{Child, Command, Stdio};
use url::Url;

use super::{PopupController, PopupFeatures, PopupWindow};
use crate::error::PopupError;

/// 应用窗口弹窗控制器
#[derive(Debug, Clone)]
pub struct AppWindowPopup {
    /// 浏览器可执行文件
    program: String,

    /// 附加参数（例如 `--user-data-dir=...` 以强制独立进程）
    extra_args: Vec<String>,
}

impl AppWindowPopup {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    fn command(&self, url: &Url, features: PopupFeatures) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(format!("--app={}", url))
            .arg(format!("--window-size={},{}", features.width, features.height))
            .args(&self.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }
}

impl PopupController for AppWindowPopup {
    fn open(&self, url: &Url, features: PopupFeatures) -> Result<Box<dyn PopupWindow>, PopupError> {
        let child = self
            .command(url, features)
            .spawn()
            .map_err(|source| PopupError::Launch {
                program: self.program.clone(),
                source,
            })?;

        tracing::info!(
            "✅ 登录窗口已打开: {} (pid={}, {}x{})",
            url,
            child.id(),
            features.width,
            features.height
        );

        Ok(Box::new(AppWindow {
            child,
            closed: false,
        }))
    }
}

/// 浏览器进程句柄
struct AppWindow {
    child: Child,
    closed: bool,
}

impl PopupWindow for AppWindow {
    fn is_closed(&mut self) -> bool {
        if self.closed {
            return true;
        }

        self.closed = match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!("登录窗口进程已退出: {}", status);
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("无法查询登录窗口进程状态，视为已关闭: {}", e);
                true
            }
        };

        self.closed
    }

    fn focus(&mut self) {
        // 新启动的窗口由窗口管理器置于前台
        tracing::debug!("登录窗口 pid={} 获得焦点", self.child.id());
    }
}

impl Drop for AppWindow {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // 已退出的进程在此回收，仍在运行的窗口保留给用户
        match self.child.try_wait() {
            Ok(Some(status)) => tracing::debug!("登录窗口进程已回收: {}", status),
            Ok(None) => tracing::debug!("登录窗口 pid={} 仍在运行", self.child.id()),
            Err(e) => tracing::warn!("无法回收登录窗口进程: {}", e),
        }
    }
}
