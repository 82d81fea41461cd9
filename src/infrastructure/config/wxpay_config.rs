use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::value_objects::{ReportLevel, SignType};

/// 微信支付商户配置
///
/// 进程级只读配置，初始化后不再修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WxpayConfig {
    /// 公众账号ID
    pub appid: String,

    /// 公众账号密钥（获取access_token用）
    pub appsecret: String,

    /// 商户号
    pub mch_id: String,

    /// 子商户号（服务商模式，可为空）
    pub sub_mch_id: String,

    /// 商户支付密钥
    pub key: String,

    /// 签名算法
    pub sign_type: SignType,

    /// 商户证书路径（PEM，退款/撤销接口必需）
    pub sslcert_path: Option<String>,

    /// 商户证书私钥路径（PEM）
    pub sslkey_path: Option<String>,

    /// 异步通知回调URL
    pub notify_url: String,

    /// 代理服务器地址，`0.0.0.0`表示不使用代理
    pub proxy_host: String,

    /// 代理服务器端口，0表示不使用代理
    pub proxy_port: u16,

    /// 测速上报级别
    pub report_level: ReportLevel,

    /// 终端IP（spbill_create_ip / user_ip）
    pub terminal_ip: String,

    /// 支付网关基础URL
    pub base_url: String,
}

impl WxpayConfig {
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        let sign_type = std::env::var("WXPAY_SIGN_TYPE")
            .unwrap_or_else(|_| "MD5".to_string())
            .parse()
            .expect("WXPAY_SIGN_TYPE must be MD5 or HMAC-SHA256");

        let report_level = std::env::var("WXPAY_REPORT_LEVEL")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .map(ReportLevel::from_env_value)
            .unwrap_or(ReportLevel::FailureOnly);

        Arc::new(Self {
            appid: std::env::var("WXPAY_APPID").expect("WXPAY_APPID must be set"),
            appsecret: std::env::var("WXPAY_APPSECRET").unwrap_or_else(|_| String::new()),
            mch_id: std::env::var("WXPAY_MCH_ID").expect("WXPAY_MCH_ID must be set"),
            sub_mch_id: std::env::var("WXPAY_SUB_MCH_ID").unwrap_or_else(|_| String::new()),
            key: std::env::var("WXPAY_KEY").expect("WXPAY_KEY must be set"),
            sign_type,
            sslcert_path: std::env::var("WXPAY_SSLCERT_PATH").ok(),
            sslkey_path: std::env::var("WXPAY_SSLKEY_PATH").ok(),
            notify_url: std::env::var("WXPAY_NOTIFY_URL").unwrap_or_else(|_| String::new()),
            proxy_host: std::env::var("WXPAY_PROXY_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            proxy_port: std::env::var("WXPAY_PROXY_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            report_level,
            terminal_ip: std::env::var("WXPAY_TERMINAL_IP")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            base_url: std::env::var("WXPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.mch.weixin.qq.com".to_string()),
        })
    }

    /// 是否配置了代理
    pub fn proxy_enabled(&self) -> bool {
        self.proxy_host != "0.0.0.0" && self.proxy_port != 0
    }
}

#[cfg(test)]
impl WxpayConfig {
    /// 测试用配置
    pub fn for_tests() -> Arc<Self> {
        Arc::new(Self {
            appid: "wx1234567890".to_string(),
            appsecret: "secret".to_string(),
            mch_id: "10000100".to_string(),
            sub_mch_id: String::new(),
            key: "192006250b4c09247ec02edce69f6a2d".to_string(),
            sign_type: SignType::Md5,
            sslcert_path: None,
            sslkey_path: None,
            notify_url: "https://example.com/notify".to_string(),
            proxy_host: "0.0.0.0".to_string(),
            proxy_port: 0,
            report_level: ReportLevel::Off,
            terminal_ip: "127.0.0.1".to_string(),
            base_url: "https://api.mch.weixin.qq.com".to_string(),
        })
    }
}
