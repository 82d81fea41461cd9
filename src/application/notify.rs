use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::errors::WxpayResult;
use crate::domain::fields::FieldBag;
use crate::domain::sign::{self, SIGN_FIELD};
use crate::domain::xml;
use crate::infrastructure::config::WxpayConfig;

/// 支付结果通知处理器
///
/// 网关以POST方式推送XML报文，处理流程：解码、验签、交给业务回调，
/// 最终返回应答报文。验签失败时直接应答失败，不触发业务回调。
pub struct Notify {
    config: Arc<WxpayConfig>,
}

impl Notify {
    pub fn new(config: Arc<WxpayConfig>) -> Self {
        Self { config }
    }

    /// 回调入口，返回应答XML
    ///
    /// `callback`收到解析并验签通过的通知数据，返回`Err(msg)`时
    /// 以msg应答失败。`need_sign`控制成功应答是否携带签名。
    pub fn handle<F>(&self, body: &str, need_sign: bool, callback: F) -> String
    where
        F: FnOnce(&FieldBag) -> Result<(), String>,
    {
        let notification = match self.parse(body) {
            Ok(bag) => bag,
            Err(e) => {
                warn!("rejecting notification: {}", e);
                return self.reply_fail(&e.to_string());
            }
        };

        match callback(&notification) {
            Ok(()) => self.reply_success(need_sign),
            Err(msg) => {
                debug!("notification callback rejected: {}", msg);
                self.reply_fail(&msg)
            }
        }
    }

    /// 解码并验签通知报文；return_code非SUCCESS的报文不要求签名
    fn parse(&self, body: &str) -> WxpayResult<FieldBag> {
        let bag = xml::decode(body)?;
        if bag.get("return_code") == Some("SUCCESS") {
            sign::verify(&bag, &self.config.key, self.config.sign_type)?;
        }
        Ok(bag)
    }

    fn reply_success(&self, need_sign: bool) -> String {
        let mut reply = FieldBag::new();
        reply.set("return_code", "SUCCESS").set("return_msg", "OK");
        if need_sign {
            let digest = sign::sign(&reply, &self.config.key, self.config.sign_type);
            reply.set(SIGN_FIELD, digest);
        }
        xml::encode(&reply)
    }

    fn reply_fail(&self, msg: &str) -> String {
        let mut reply = FieldBag::new();
        reply.set("return_code", "FAIL").set("return_msg", msg);
        xml::encode(&reply)
    }
}
