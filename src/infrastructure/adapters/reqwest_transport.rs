use async_trait::async_trait;
use reqwest::{Client, Identity, Proxy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::domain::errors::{WxpayError, WxpayResult};
use crate::infrastructure::config::WxpayConfig;
use crate::ports::TransportPort;

/// 基于reqwest的传输适配器
///
/// 构造时准备两个客户端：普通客户端和加载了商户证书的双向TLS客户端，
/// 后者仅在配置了证书路径时创建。代理设置对两者同时生效。
#[derive(Clone)]
pub struct ReqwestTransport {
    plain: Client,
    with_cert: Option<Client>,
}

impl ReqwestTransport {
    pub fn new(config: Arc<WxpayConfig>) -> WxpayResult<Self> {
        let proxy = if config.proxy_enabled() {
            let url = format!("http://{}:{}", config.proxy_host, config.proxy_port);
            Some(Proxy::all(url).map_err(|e| WxpayError::Configuration(e.to_string()))?)
        } else {
            None
        };

        let mut builder = Client::builder().use_rustls_tls();
        if let Some(proxy) = proxy.clone() {
            builder = builder.proxy(proxy);
        }
        let plain = builder
            .build()
            .map_err(|e| WxpayError::Configuration(e.to_string()))?;

        let with_cert = match (&config.sslcert_path, &config.sslkey_path) {
            (Some(cert_path), Some(key_path)) => {
                let identity = load_identity(cert_path, key_path)?;
                let mut builder = Client::builder().use_rustls_tls().identity(identity);
                if let Some(proxy) = proxy {
                    builder = builder.proxy(proxy);
                }
                Some(
                    builder
                        .build()
                        .map_err(|e| WxpayError::Configuration(e.to_string()))?,
                )
            }
            _ => None,
        };

        Ok(Self { plain, with_cert })
    }
}

/// 读取cert和key两个PEM文件并合并为客户端身份
fn load_identity(cert_path: &str, key_path: &str) -> WxpayResult<Identity> {
    let mut pem = std::fs::read(cert_path).map_err(|e| {
        WxpayError::Configuration(format!("failed to read {}: {}", cert_path, e))
    })?;
    let key = std::fs::read(key_path).map_err(|e| {
        WxpayError::Configuration(format!("failed to read {}: {}", key_path, e))
    })?;
    pem.extend_from_slice(&key);
    Identity::from_pem(&pem).map_err(|e| WxpayError::Configuration(e.to_string()))
}

#[async_trait]
impl TransportPort for ReqwestTransport {
    async fn post(
        &self,
        url: &str,
        body: &str,
        use_cert: bool,
        timeout: Duration,
    ) -> WxpayResult<String> {
        let client = if use_cert {
            self.with_cert.as_ref().ok_or_else(|| {
                WxpayError::Configuration(
                    "merchant certificate required but not configured".to_string(),
                )
            })?
        } else {
            &self.plain
        };

        debug!("POST {} ({} bytes)", url, body.len());

        let response = client
            .post(url)
            .header("Content-Type", "text/xml")
            .timeout(timeout)
            .body(body.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("gateway returned {}: {}", status, text);
            return Err(WxpayError::Transport(format!(
                "gateway returned {}",
                status
            )));
        }

        Ok(response.text().await?)
    }
}
