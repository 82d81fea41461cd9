use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::WxpayResult;

/// HTTP传输端口接口
///
/// 网关交互统一为一次XML报文的POST。退款、撤销等接口要求商户证书，
/// 由`use_cert`标记，各接口的超时时间不同，由调用方传入。
#[async_trait]
pub trait TransportPort: Send + Sync {
    /// 提交报文并返回响应体
    async fn post(
        &self,
        url: &str,
        body: &str,
        use_cert: bool,
        timeout: Duration,
    ) -> WxpayResult<String>;
}
