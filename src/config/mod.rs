/// 配置读取模块
///
/// 优先级（从高到低）：
/// 1. 命令行参数（由 main.rs 处理）
/// 2. 环境变量：`KINGDOM_AUTH_BASE_URL`
/// 3. 配置文件：`<config_dir>/KingdomAuth/config.toml`
/// 4. 默认值（首次运行时写入配置文件）
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::popup::PopupFeatures;
use crate::session::SessionOptions;

/// base URL 环境变量
pub const BASE_URL_ENV: &str = "KINGDOM_AUTH_BASE_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// 安全余量上限（秒），Token 有效期远小于该值
const MAX_REFRESH_MARGIN_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub popup: PopupConfig,
}

/// Auth 服务地址
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,
}

/// Token 生命周期参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 登录窗口关闭检测间隔（毫秒）
    pub poll_interval_ms: u64,

    /// 过期安全余量（秒）
    pub refresh_margin_secs: u64,

    /// 是否在过期前自动刷新
    pub auto_refresh: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            refresh_margin_secs: 10,
            auto_refresh: true,
        }
    }
}

/// 登录窗口
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupConfig {
    pub width: u32,
    pub height: u32,

    /// 以应用窗口模式启动的浏览器（例如 `chromium`）；未设置时使用系统默认浏览器
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,

    /// 传给浏览器的附加参数
    pub browser_args: Vec<String>,
}

impl Default for PopupConfig {
    fn default() -> Self {
        let features = PopupFeatures::default();
        Self {
            width: features.width,
            height: features.height,
            browser: None,
            browser_args: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
            },
            session: SessionConfig::default(),
            popup: PopupConfig::default(),
        }
    }
}

impl Config {
    /// 用环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            tracing::info!("✅ 从环境变量加载 base URL");
            self.server.base_url = base_url.trim().to_string();
        }
    }

    /// 是否仍为默认地址
    pub fn is_placeholder(&self) -> bool {
        self.server.base_url == DEFAULT_BASE_URL
    }

    /// 转换为 Session Manager 参数
    ///
    /// # Errors
    /// - 轮询间隔为 0
    /// - 安全余量超过一天
    /// - 窗口尺寸为 0
    pub fn session_options(&self) -> Result<SessionOptions> {
        if self.session.poll_interval_ms == 0 {
            anyhow::bail!("session.poll_interval_ms 必须大于 0");
        }
        if self.session.refresh_margin_secs > MAX_REFRESH_MARGIN_SECS {
            anyhow::bail!(
                "session.refresh_margin_secs 不能超过 {} 秒: {}",
                MAX_REFRESH_MARGIN_SECS,
                self.session.refresh_margin_secs
            );
        }
        if self.popup.width == 0 || self.popup.height == 0 {
            anyhow::bail!(
                "popup 尺寸无效: {}x{}",
                self.popup.width,
                self.popup.height
            );
        }

        Ok(SessionOptions {
            poll_interval: Duration::from_millis(self.session.poll_interval_ms),
            refresh_margin: Duration::from_secs(self.session.refresh_margin_secs),
            popup: PopupFeatures {
                width: self.popup.width,
                height: self.popup.height,
            },
            auto_refresh: self.session.auto_refresh,
            ..SessionOptions::default()
        })
    }
}

/// 获取配置文件路径
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("无法获取配置目录"))?
        .join("KingdomAuth");

    Ok(config_dir.join("config.toml"))
}

/// 加载默认位置的配置
pub fn load() -> Result<Config> {
    load_from(&config_path()?)
}

/// 从指定文件加载配置
///
/// 文件不存在时写入默认配置
///
/// # Errors
/// - 文件读取或解析失败
/// - 默认配置写入失败
pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::info!("配置文件不存在，写入默认配置: {}", path.display());
        let config = Config::default();
        save_to(&config, path)?;
        return Ok(config);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("解析配置文件失败: {}", path.display()))?;

    tracing::debug!("已加载配置: {}", path.display());
    Ok(config)
}

/// 保存配置到指定文件
pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).context("创建配置目录失败")?;
    }
    let content = toml::to_string_pretty(config).context("序列化配置失败")?;
    std::fs::write(path, content)
        .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("kingdom-auth-test-{}-{}", name, std::process::id()))
            .join("config.toml")
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.is_placeholder());
        assert_eq!(config.session.poll_interval_ms, 500);
        assert_eq!(config.session.refresh_margin_secs, 10);
        assert!(config.session.auto_refresh);
        assert_eq!((config.popup.width, config.popup.height), (500, 600));
        assert!(config.popup.browser.is_none());
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [server]
            base_url = "https://auth.example.com/"

            [session]
            auto_refresh = false

            [popup]
            browser = "chromium"
            browser_args = ["--user-data-dir=/tmp/kingdom"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.base_url, "https://auth.example.com/");
        assert!(!config.session.auto_refresh);
        assert_eq!(config.session.poll_interval_ms, 500);
        assert_eq!(config.popup.browser.as_deref(), Some("chromium"));
        assert_eq!(config.popup.width, 500);
        assert!(!config.is_placeholder());
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        config.apply_overrides_from(|key| {
            (key == BASE_URL_ENV).then(|| " https://env.example.com ".to_string())
        });
        assert_eq!(config.server.base_url, "https://env.example.com");

        let mut config = Config::default();
        config.apply_overrides_from(|_| Some("  ".to_string()));
        assert!(config.is_placeholder());
    }

    #[test]
    fn test_session_options() {
        let mut config = Config::default();
        config.session.poll_interval_ms = 250;
        config.session.auto_refresh = false;

        let options = config.session_options().unwrap();
        assert_eq!(options.poll_interval, Duration::from_millis(250));
        assert_eq!(options.refresh_margin, Duration::from_secs(10));
        assert!(!options.auto_refresh);

        config.session.poll_interval_ms = 0;
        assert!(config.session_options().is_err());
    }

    #[test]
    fn test_session_options_rejects_oversized_margin() {
        let mut config = Config::default();
        config.session.refresh_margin_secs = MAX_REFRESH_MARGIN_SECS;
        assert!(config.session_options().is_ok());

        config.session.refresh_margin_secs = MAX_REFRESH_MARGIN_SECS + 1;
        assert!(config.session_options().is_err());

        config.session.refresh_margin_secs = 10_000_000_000_000;
        assert!(config.session_options().is_err());
    }

    #[test]
    fn test_load_writes_default_then_reads_back() {
        let path = temp_config_path("load");
        let _ = std::fs::remove_file(&path);

        let created = load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, Config::default());

        let mut changed = created.clone();
        changed.server.base_url = "https://auth.example.com".to_string();
        save_to(&changed, &path).unwrap();
        assert_eq!(load_from(&path).unwrap(), changed);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
