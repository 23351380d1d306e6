/// 测试替身：脚本化 Transport、可拦截的弹窗、手动时钟
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

use crate::clock::Clock;
use crate::error::{PopupError, TransportError};
use crate::popup::{PopupController, PopupFeatures, PopupWindow};
use crate::transport::{HttpTransport, RequestOptions, TransportResponse};

pub(crate) type Scripted = Result<TransportResponse, TransportError>;

pub(crate) fn json_ok(value: serde_json::Value) -> Scripted {
    Ok(TransportResponse::new(200, "OK", value.to_string()))
}

pub(crate) fn status(code: u16, text: &str, body: &str) -> Scripted {
    Ok(TransportResponse::new(code, text, body))
}

pub(crate) fn network_error(url: &str) -> Scripted {
    Err(TransportError::Request {
        url: url.to_string(),
        message: "connection refused".to_string(),
    })
}

fn clone_scripted(scripted: &Scripted) -> Scripted {
    match scripted {
        Ok(resp) => Ok(resp.clone()),
        Err(TransportError::Request { url, message }) => Err(TransportError::Request {
            url: url.clone(),
            message: message.clone(),
        }),
        Err(TransportError::Client(msg)) => Err(TransportError::Client(msg.clone())),
    }
}

/// 按路径脚本化响应的 Transport
///
/// 一次性响应（`push`）优先于常驻响应（`respond`）
#[derive(Default)]
pub(crate) struct FakeTransport {
    once: Mutex<HashMap<String, VecDeque<Scripted>>>,
    always: Mutex<HashMap<String, Scripted>>,
    requests: Mutex<Vec<(Url, RequestOptions)>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, response: Scripted) {
        self.always.lock().insert(path.to_string(), response);
    }

    pub fn push(&self, path: &str, response: Scripted) {
        self.once
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn calls(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|(url, _)| url.path() == path)
            .count()
    }

    pub fn requests(&self) -> Vec<(Url, RequestOptions)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn fetch(
        &self,
        url: &Url,
        options: RequestOptions,
    ) -> Result<TransportResponse, TransportError> {
        self.requests.lock().push((url.clone(), options));
        let path = url.path().to_string();

        if let Some(next) = self.once.lock().get_mut(&path).and_then(VecDeque::pop_front) {
            return next;
        }

        match self.always.lock().get(&path) {
            Some(scripted) => clone_scripted(scripted),
            None => status(404, "Not Found", "{}"),
        }
    }
}

/// 弹窗替身：窗口在被轮询 `close_after` 次后关闭
pub(crate) struct FakePopup {
    blocked: bool,
    close_after: usize,
    opened: Mutex<Vec<(Url, PopupFeatures)>>,
    focused: Arc<AtomicUsize>,
    polls: Arc<AtomicUsize>,
}

impl FakePopup {
    pub fn closing_after(close_after: usize) -> Arc<Self> {
        Arc::new(Self {
            blocked: false,
            close_after,
            opened: Mutex::new(Vec::new()),
            focused: Arc::new(AtomicUsize::new(0)),
            polls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn blocked() -> Arc<Self> {
        Arc::new(Self {
            blocked: true,
            close_after: 0,
            opened: Mutex::new(Vec::new()),
            focused: Arc::new(AtomicUsize::new(0)),
            polls: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn opened(&self) -> Vec<(Url, PopupFeatures)> {
        self.opened.lock().clone()
    }

    pub fn focused(&self) -> usize {
        self.focused.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

impl PopupController for FakePopup {
    fn open(&self, url: &Url, features: PopupFeatures) -> Result<Box<dyn PopupWindow>, PopupError> {
        if self.blocked {
            return Err(PopupError::Blocked);
        }
        self.opened.lock().push((url.clone(), features));

        Ok(Box::new(FakeWindow {
            close_after: self.close_after,
            focused: self.focused.clone(),
            polls: self.polls.clone(),
        }))
    }
}

struct FakeWindow {
    close_after: usize,
    focused: Arc<AtomicUsize>,
    polls: Arc<AtomicUsize>,
}

impl PopupWindow for FakeWindow {
    fn is_closed(&mut self) -> bool {
        let polled = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        polled >= self.close_after
    }

    fn focus(&mut self) {
        self.focused.fetch_add(1, Ordering::SeqCst);
    }
}

/// 手动推进的时钟
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
