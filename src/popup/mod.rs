/// 登录弹窗抽象
///
/// 宿主平台负责打开一个固定尺寸的顶层窗口并返回句柄，
/// Session Manager 通过轮询句柄的 closed 状态判断登录流程是否结束
use url::Url;

use crate::error::PopupError;

pub mod app_window;
pub mod system_browser;

pub use app_window::AppWindowPopup;
pub use system_browser::SystemBrowserPopup;

/// 弹窗尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupFeatures {
    pub width: u32,
    pub height: u32,
}

impl Default for PopupFeatures {
    fn default() -> Self {
        Self {
            width: 500,
            height: 600,
        }
    }
}

/// 已打开的弹窗句柄
pub trait PopupWindow: Send {
    /// 窗口是否已关闭
    fn is_closed(&mut self) -> bool;

    /// 将窗口置于前台
    fn focus(&mut self);
}

/// 弹窗控制器
pub trait PopupController: Send + Sync {
    /// 打开弹窗
    ///
    /// # Errors
    /// - 窗口无法创建（被拦截、浏览器不可用等）
    fn open(&self, url: &Url, features: PopupFeatures) -> Result<Box<dyn PopupWindow>, PopupError>;
}
