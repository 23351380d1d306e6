/// 使用系统默认浏览器作为登录弹窗
///
/// 默认浏览器的标签页无法被外部观察，因此由用户在终端按回车确认
/// "窗口已关闭"，轮询逻辑与应用窗口模式保持一致
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

use super::{PopupController, PopupFeatures, PopupWindow};
use crate::error::PopupError;

/// 系统浏览器弹窗控制器
#[derive(Debug, Clone, Default)]
pub struct SystemBrowserPopup;

impl SystemBrowserPopup {
    pub fn new() -> Self {
        Self
    }
}

impl PopupController for SystemBrowserPopup {
    fn open(&self, url: &Url, features: PopupFeatures) -> Result<Box<dyn PopupWindow>, PopupError> {
        webbrowser::open(url.as_str()).map_err(|e| PopupError::SystemBrowser(e.to_string()))?;

        tracing::info!("✅ 浏览器已打开，等待用户授权...");
        tracing::debug!(
            "系统浏览器忽略窗口尺寸 {}x{}",
            features.width,
            features.height
        );
        eprintln!("完成登录后关闭浏览器页面，并在此按回车继续");

        Ok(Box::new(ConfirmedWindow {
            closed: watch_reader(std::io::BufReader::new(std::io::stdin())),
        }))
    }
}

/// 在后台线程读取一行输入，读到（或输入结束）后置位 closed 标志
fn watch_reader<R>(mut reader: R) -> Arc<AtomicBool>
where
    R: BufRead + Send + 'static,
{
    let closed = Arc::new(AtomicBool::new(false));
    let flag = closed.clone();

    std::thread::spawn(move || {
        let mut line = String::new();
        if let Err(e) = reader.read_line(&mut line) {
            tracing::warn!("读取终端输入失败，视为窗口已关闭: {}", e);
        }
        flag.store(true, Ordering::SeqCst);
    });

    closed
}

/// 由用户确认关闭的窗口
struct ConfirmedWindow {
    closed: Arc<AtomicBool>,
}

impl PopupWindow for ConfirmedWindow {
    fn is_closed(&mut self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn focus(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn wait_closed(window: &mut ConfirmedWindow) -> bool {
        for _ in 0..200 {
            if window.is_closed() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_enter_closes_window() {
        let mut window = ConfirmedWindow {
            closed: watch_reader(Cursor::new(b"\n".to_vec())),
        };
        assert!(wait_closed(&mut window));
    }

    #[test]
    fn test_eof_closes_window() {
        let mut window = ConfirmedWindow {
            closed: watch_reader(Cursor::new(Vec::new())),
        };
        assert!(wait_closed(&mut window));
    }
}
