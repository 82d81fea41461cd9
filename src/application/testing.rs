//! 测试用的脚本化传输实现和响应构造工具

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::errors::{WxpayError, WxpayResult};
use crate::domain::fields::FieldBag;
use crate::domain::sign::{self, SIGN_FIELD};
use crate::domain::xml;
use crate::infrastructure::config::WxpayConfig;
use crate::ports::TransportPort;

type Handler = Box<dyn Fn(usize, &str, &str) -> WxpayResult<String> + Send + Sync>;

/// 脚本化的TransportPort实现，记录每次调用并按闭包返回响应
pub(crate) struct MockTransport {
    handler: Handler,
    calls: Mutex<Vec<(String, String, bool)>>,
    counter: AtomicUsize,
}

impl MockTransport {
    /// 闭包参数为（本次调用序号，url，请求体）
    pub fn with_handler(
        handler: impl Fn(usize, &str, &str) -> WxpayResult<String> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        })
    }

    /// 每次调用都返回同一响应
    pub fn always(response: WxpayResult<String>) -> Arc<Self> {
        Self::with_handler(move |_, _, _| match &response {
            Ok(body) => Ok(body.clone()),
            Err(e) => Err(WxpayError::Transport(e.to_string())),
        })
    }

    pub fn call_count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransportPort for MockTransport {
    async fn post(
        &self,
        url: &str,
        body: &str,
        use_cert: bool,
        _timeout: Duration,
    ) -> WxpayResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), body.to_string(), use_cert));
        let index = self.counter.fetch_add(1, Ordering::SeqCst);
        (self.handler)(index, url, body)
    }
}

/// 构造一份带有效签名的网关响应报文
pub(crate) fn signed_response(config: &WxpayConfig, fields: &[(&str, &str)]) -> String {
    let mut bag: FieldBag = fields.iter().copied().collect();
    let digest = sign::sign(&bag, &config.key, config.sign_type);
    bag.set(SIGN_FIELD, digest);
    xml::encode(&bag)
}
