//! 微信支付V2商户接口SDK
//!
//! 封装统一下单、订单查询、退款、刷卡支付、撤销订单、对账单下载、
//! 支付结果通知等商户接口。报文为单层XML，签名支持MD5和HMAC-SHA256。
//!
//! ```no_run
//! use std::sync::Arc;
//! use wxpay_rs::{FieldBag, MicroPay, ReqwestTransport, WxpayApi, WxpayConfig};
//!
//! # async fn demo() -> wxpay_rs::WxpayResult<()> {
//! let config = WxpayConfig::from_env();
//! let transport = Arc::new(ReqwestTransport::new(config.clone())?);
//! let api = WxpayApi::new(config, transport);
//!
//! let mut input = FieldBag::new();
//! input
//!     .set("out_trade_no", "20260829001")
//!     .set("body", "门店消费")
//!     .set("total_fee", 100)
//!     .set("auth_code", "120061098828009406");
//! let _outcome = MicroPay::new(api).pay(input).await?;
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use application::{
    JsSignature, JsapiTicketService, MicroPay, NativePay, Notify, PaymentOutcome, TicketCache,
    WxpayApi,
};
pub use domain::{FieldBag, ReportLevel, SignType, TradeState, TradeType, WxpayError, WxpayResult};
pub use infrastructure::{ReqwestTransport, WxpayConfig};
pub use ports::TransportPort;
