/// 会话状态
///
/// 由 Session Manager 独占，锁只在同步代码段内持有
use chrono::{DateTime, Duration, Utc};
use tokio::task::AbortHandle;

/// 已排期的自动刷新任务
#[derive(Debug)]
pub(crate) struct PendingRefresh {
    /// 排期序号，用于识别任务自身
    pub generation: u64,
    pub handle: AbortHandle,
}

#[derive(Debug)]
pub(crate) struct SessionState {
    pub token: Option<String>,
    pub email: Option<String>,

    /// 未设置时为 Unix 纪元（即"已过期"）
    pub expiry: DateTime<Utc>,

    /// 首次加载前为 None，加载后不再变化
    pub providers: Option<Vec<String>>,

    pub pending_refresh: Option<PendingRefresh>,

    next_generation: u64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            token: None,
            email: None,
            expiry: DateTime::<Utc>::UNIX_EPOCH,
            providers: None,
            pending_refresh: None,
            next_generation: 0,
        }
    }
}

impl SessionState {
    /// 距过期仍大于 `margin` 时返回当前 Token
    pub fn fresh_token(&self, now: DateTime<Utc>, margin: Duration) -> Option<String> {
        match &self.token {
            Some(token)
                if now
                    .checked_add_signed(margin)
                    .is_some_and(|deadline| self.expiry > deadline) =>
            {
                Some(token.clone())
            }
            _ => None,
        }
    }

    /// 写入刷新结果
    pub fn set_session(
        &mut self,
        token: Option<String>,
        email: Option<String>,
        expiry: DateTime<Utc>,
    ) {
        self.token = token;
        self.email = email;
        self.expiry = expiry;
    }

    /// 清空 Token/邮箱/过期时间并取消自动刷新（Provider 缓存保留）
    pub fn clear_session(&mut self) {
        self.token = None;
        self.email = None;
        self.expiry = DateTime::<Utc>::UNIX_EPOCH;
        self.cancel_pending();
    }

    /// 分配新的排期序号
    pub fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// 替换自动刷新任务，旧任务会被取消
    pub fn replace_pending(&mut self, pending: PendingRefresh) {
        self.cancel_pending();
        self.pending_refresh = Some(pending);
    }

    /// 仅当排期序号匹配时移除任务（任务触发时调用）
    pub fn take_pending_if(&mut self, generation: u64) -> bool {
        match &self.pending_refresh {
            Some(pending) if pending.generation == generation => {
                self.pending_refresh = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending_refresh.take() {
            pending.handle.abort();
        }
    }
}
