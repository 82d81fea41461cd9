use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::domain::errors::{WxpayError, WxpayResult};
use crate::domain::fields::FieldBag;
use crate::domain::sign;
use crate::infrastructure::config::WxpayConfig;

const TOKEN_URL: &str = "https://api.weixin.qq.com/cgi-bin/token";
const TICKET_URL: &str = "https://api.weixin.qq.com/cgi-bin/ticket/getticket";

/// JS-SDK签名参数，返回给前端调起wx.config
#[derive(Debug, Clone, Serialize)]
pub struct JsSignature {
    pub timestamp: String,
    pub nonce_str: String,
    pub signature: String,
}

struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// access_token / jsapi_ticket缓存
///
/// 按凭证身份（appid）加条目名组合键存储，每条带过期时间。
/// 显式注入使用，进程内可被多个服务实例共享。
#[derive(Default)]
pub struct TicketCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl TicketCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Utc::now())
            .map(|entry| entry.value.clone())
    }

    pub fn put(&self, key: &str, value: String, ttl_secs: i64) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Utc::now() + Duration::seconds(ttl_secs),
            },
        );
    }
}

/// JSAPI凭证服务
///
/// 获取公众号access_token和jsapi_ticket并生成JS-SDK签名。
/// 两种凭证都有网关侧的有效期，过期前60秒即视为失效。
pub struct JsapiTicketService {
    config: Arc<WxpayConfig>,
    cache: Arc<TicketCache>,
    client: reqwest::Client,
}

impl JsapiTicketService {
    pub fn new(config: Arc<WxpayConfig>, cache: Arc<TicketCache>) -> Self {
        Self {
            config,
            cache,
            client: reqwest::Client::new(),
        }
    }

    pub async fn access_token(&self) -> WxpayResult<String> {
        let cache_key = format!("access_token/{}", self.config.appid);
        if let Some(token) = self.cache.get(&cache_key) {
            return Ok(token);
        }

        let json: serde_json::Value = self
            .client
            .get(TOKEN_URL)
            .query(&[
                ("grant_type", "client_credential"),
                ("appid", &self.config.appid),
                ("secret", &self.config.appsecret),
            ])
            .send()
            .await?
            .json()
            .await?;
        check_errcode(&json)?;

        let token = json["access_token"]
            .as_str()
            .ok_or_else(|| WxpayError::MalformedResponse("missing access_token".to_string()))?
            .to_string();
        let ttl = json["expires_in"].as_i64().unwrap_or(7200) - 60;
        self.cache.put(&cache_key, token.clone(), ttl);
        debug!("access token refreshed for {}", self.config.appid);

        Ok(token)
    }

    pub async fn jsapi_ticket(&self) -> WxpayResult<String> {
        let cache_key = format!("jsapi_ticket/{}", self.config.appid);
        if let Some(ticket) = self.cache.get(&cache_key) {
            return Ok(ticket);
        }

        let access_token = self.access_token().await?;
        let json: serde_json::Value = self
            .client
            .get(TICKET_URL)
            .query(&[("type", "jsapi"), ("access_token", &access_token)])
            .send()
            .await?
            .json()
            .await?;
        check_errcode(&json)?;

        let ticket = json["ticket"]
            .as_str()
            .ok_or_else(|| WxpayError::MalformedResponse("missing ticket".to_string()))?
            .to_string();
        let ttl = json["expires_in"].as_i64().unwrap_or(7200) - 60;
        self.cache.put(&cache_key, ticket.clone(), ttl);

        Ok(ticket)
    }

    /// 生成JS-SDK签名
    ///
    /// 签名串为按键排序的`k=v`用`&`连接，SHA-1小写十六进制输出，
    /// 与支付接口的签名规则不同。
    pub async fn js_signature(&self, url: &str) -> WxpayResult<JsSignature> {
        let timestamp = Utc::now().timestamp().to_string();
        let nonce_str = sign::nonce_str(16);
        let ticket = self.jsapi_ticket().await?;

        let fields: FieldBag = [
            ("timestamp", timestamp.as_str()),
            ("noncestr", nonce_str.as_str()),
            ("jsapi_ticket", ticket.as_str()),
            ("url", url),
        ]
        .into_iter()
        .collect();

        let base = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha1::new();
        hasher.update(base.as_bytes());
        let signature = hex::encode(hasher.finalize());

        Ok(JsSignature {
            timestamp,
            nonce_str,
            signature,
        })
    }
}

fn check_errcode(json: &serde_json::Value) -> WxpayResult<()> {
    let errcode = json.get("errcode").and_then(|v| v.as_i64()).unwrap_or(0);
    if errcode != 0 {
        let errmsg = json
            .get("errmsg")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        return Err(WxpayError::Gateway(format!("{errcode}: {errmsg}")));
    }
    Ok(())
}
