use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::WxpayError;

/// 签名算法
///
/// 微信支付V2同一商户只会启用其中一种，属于商户级配置。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignType {
    /// MD5签名
    Md5,
    /// HMAC-SHA256签名
    HmacSha256,
}

impl fmt::Display for SignType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignType::Md5 => write!(f, "MD5"),
            SignType::HmacSha256 => write!(f, "HMAC-SHA256"),
        }
    }
}

impl FromStr for SignType {
    type Err = WxpayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MD5" => Ok(SignType::Md5),
            "HMAC-SHA256" => Ok(SignType::HmacSha256),
            other => Err(WxpayError::Configuration(format!(
                "unknown sign type: {}",
                other
            ))),
        }
    }
}

/// 交易类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeType {
    /// 公众号/小程序支付
    Jsapi,
    /// 扫码支付
    Native,
    /// APP支付
    App,
    /// 刷卡支付
    Micropay,
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::Jsapi => write!(f, "JSAPI"),
            TradeType::Native => write!(f, "NATIVE"),
            TradeType::App => write!(f, "APP"),
            TradeType::Micropay => write!(f, "MICROPAY"),
        }
    }
}

/// 订单查询返回的交易状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeState {
    /// 支付成功
    Success,
    /// 转入退款
    Refund,
    /// 已关闭
    Closed,
    /// 已撤销（刷卡支付）
    Revoked,
    /// 支付失败（如银行返回失败）
    PayError,
    /// 用户支付中
    UserPaying,
    /// 未支付
    NotPay,
    /// 其他未识别状态
    Unknown,
}

impl TradeState {
    pub fn parse(s: &str) -> Self {
        match s {
            "SUCCESS" => TradeState::Success,
            "REFUND" => TradeState::Refund,
            "CLOSED" => TradeState::Closed,
            "REVOKED" => TradeState::Revoked,
            "PAYERROR" => TradeState::PayError,
            "USERPAYING" => TradeState::UserPaying,
            "NOTPAY" => TradeState::NotPay,
            _ => TradeState::Unknown,
        }
    }
}

/// 测速上报级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportLevel {
    /// 关闭上报
    Off,
    /// 仅失败上报
    FailureOnly,
    /// 全量上报
    Always,
}

impl ReportLevel {
    pub fn from_env_value(v: u8) -> Self {
        match v {
            1 => ReportLevel::FailureOnly,
            2 => ReportLevel::Always,
            _ => ReportLevel::Off,
        }
    }
}
