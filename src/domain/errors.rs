use thiserror::Error;

/// SDK错误类型
#[derive(Error, Debug)]
pub enum WxpayError {
    /// 缺少必填参数
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// 签名验证失败
    #[error("signature verification failed")]
    InvalidSignature,

    /// 网关响应无法解析
    #[error("malformed gateway response: {0}")]
    MalformedResponse(String),

    /// 网络/传输错误
    #[error("transport error: {0}")]
    Transport(String),

    /// 网关明确返回的业务错误
    #[error("gateway error: {0}")]
    Gateway(String),

    /// 支付被拒绝（刷卡支付确认流程的终态）
    #[error("payment denied: {0}")]
    PaymentDenied(String),

    /// 撤销订单失败（刷卡支付确认流程的终态）
    #[error("order cancellation failed")]
    CancellationFailed,

    /// 配置错误
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for WxpayError {
    fn from(err: reqwest::Error) -> Self {
        WxpayError::Transport(err.to_string())
    }
}

/// SDK结果类型
pub type WxpayResult<T> = Result<T, WxpayError>;
