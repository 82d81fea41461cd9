use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::errors::{WxpayError, WxpayResult};
use crate::domain::fields::FieldBag;
use crate::domain::sign::{self, NONCE_LENGTH, SIGN_FIELD};
use crate::domain::value_objects::ReportLevel;
use crate::domain::xml;
use crate::infrastructure::config::WxpayConfig;
use crate::ports::TransportPort;

/// 默认超时时间（提交被扫支付为10s，测速上报为1s，其他均为6s）
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(6);
const MICROPAY_TIMEOUT: Duration = Duration::from_secs(10);
const REPORT_TIMEOUT: Duration = Duration::from_secs(1);

/// 接口访问类，包含所有微信支付API列表的封装
///
/// 每个接口遵循同一套流程：校验必填参数、注入商户身份和随机串、
/// 签名、编码XML、提交传输层、解码并验签响应。
pub struct WxpayApi<T: TransportPort> {
    config: Arc<WxpayConfig>,
    transport: Arc<T>,
}

impl<T: TransportPort> Clone for WxpayApi<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T: TransportPort> WxpayApi<T> {
    pub fn new(config: Arc<WxpayConfig>, transport: Arc<T>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &WxpayConfig {
        &self.config
    }

    /// 统一下单
    ///
    /// out_trade_no、body、total_fee、trade_type必填；
    /// trade_type为JSAPI时openid必填，为NATIVE时product_id必填。
    /// appid、mch_id、nonce_str等不需要填入。
    pub async fn unified_order(&self, mut input: FieldBag) -> WxpayResult<FieldBag> {
        require(&input, "out_trade_no")?;
        require(&input, "body")?;
        require(&input, "total_fee")?;
        require(&input, "trade_type")?;

        // 关联参数
        match input.get("trade_type") {
            Some("JSAPI") if !input.is_set("openid") => {
                return Err(WxpayError::MissingField("openid"));
            }
            Some("NATIVE") if !input.is_set("product_id") => {
                return Err(WxpayError::MissingField("product_id"));
            }
            _ => {}
        }

        // 异步通知url未填则使用配置中的url
        if !input.is_set("notify_url") {
            input.set("notify_url", &self.config.notify_url);
        }
        if !input.is_set("spbill_create_ip") {
            input.set("spbill_create_ip", &self.config.terminal_ip);
        }

        self.execute("/pay/unifiedorder", input, false, DEFAULT_TIMEOUT)
            .await
    }

    /// 查询订单，out_trade_no、transaction_id至少填一个
    pub async fn order_query(&self, input: FieldBag) -> WxpayResult<FieldBag> {
        require_order_id(&input)?;
        self.execute("/pay/orderquery", input, false, DEFAULT_TIMEOUT)
            .await
    }

    /// 关闭订单，out_trade_no必填
    pub async fn close_order(&self, input: FieldBag) -> WxpayResult<FieldBag> {
        require(&input, "out_trade_no")?;
        self.execute("/pay/closeorder", input, false, DEFAULT_TIMEOUT)
            .await
    }

    /// 申请退款
    ///
    /// out_trade_no、transaction_id至少填一个，且out_refund_no、
    /// total_fee、refund_fee、op_user_id必填。需要商户证书。
    pub async fn refund(&self, input: FieldBag) -> WxpayResult<FieldBag> {
        require_order_id(&input)?;
        require(&input, "out_refund_no")?;
        require(&input, "total_fee")?;
        require(&input, "refund_fee")?;
        require(&input, "op_user_id")?;
        self.execute("/secapi/pay/refund", input, true, DEFAULT_TIMEOUT)
            .await
    }

    /// 查询退款
    ///
    /// out_refund_no、out_trade_no、transaction_id、refund_id四个参数必填一个。
    pub async fn refund_query(&self, input: FieldBag) -> WxpayResult<FieldBag> {
        if !input.is_set("out_refund_no")
            && !input.is_set("out_trade_no")
            && !input.is_set("transaction_id")
            && !input.is_set("refund_id")
        {
            return Err(WxpayError::MissingField(
                "out_refund_no/out_trade_no/transaction_id/refund_id",
            ));
        }
        self.execute("/pay/refundquery", input, false, DEFAULT_TIMEOUT)
            .await
    }

    /// 下载对账单，bill_date必填
    ///
    /// 成功时网关直接返回文本格式的账单；返回XML文档说明出错，
    /// 此时解析其中的错误信息并作为`Gateway`错误返回。
    pub async fn download_bill(&self, input: FieldBag) -> WxpayResult<String> {
        require(&input, "bill_date")?;
        let response = self
            .execute_raw("/pay/downloadbill", input, false, DEFAULT_TIMEOUT)
            .await?;

        if response.trim_start().starts_with("<xml") {
            let result = xml::decode(&response)?;
            let message = result
                .get("return_msg")
                .or_else(|| result.get("err_code_des"))
                .unwrap_or("download bill failed")
                .to_string();
            return Err(WxpayError::Gateway(message));
        }
        Ok(response)
    }

    /// 提交被扫支付
    ///
    /// 收银设备读取用户刷卡授权码后由商户侧调用。
    /// body、out_trade_no、total_fee、auth_code必填。
    pub async fn micropay(&self, mut input: FieldBag) -> WxpayResult<FieldBag> {
        require(&input, "body")?;
        require(&input, "out_trade_no")?;
        require(&input, "total_fee")?;
        require(&input, "auth_code")?;

        if !input.is_set("spbill_create_ip") {
            input.set("spbill_create_ip", &self.config.terminal_ip);
        }

        self.execute("/pay/micropay", input, false, MICROPAY_TIMEOUT)
            .await
    }

    /// 撤销订单，out_trade_no、transaction_id至少填一个。需要商户证书。
    pub async fn reverse(&self, input: FieldBag) -> WxpayResult<FieldBag> {
        require_order_id(&input)?;
        self.execute("/secapi/pay/reverse", input, true, DEFAULT_TIMEOUT)
            .await
    }

    /// 测速上报
    ///
    /// interface_url、return_code、result_code、execute_time_必填，
    /// user_ip和time由本方法注入。响应不做验签，原样返回。
    pub async fn report(&self, mut input: FieldBag) -> WxpayResult<String> {
        input.set("user_ip", &self.config.terminal_ip);
        input.set(
            "time",
            chrono::Local::now().format("%Y%m%d%H%M%S").to_string(),
        );

        require(&input, "interface_url")?;
        require(&input, "return_code")?;
        require(&input, "result_code")?;
        require(&input, "user_ip")?;
        require(&input, "execute_time_")?;

        self.execute_raw("/payitil/report", input, false, REPORT_TIMEOUT)
            .await
    }

    /// 转换短链接
    ///
    /// 用于将扫码模式一的二维码链接转成`weixin://wxpay/s/XXXXXX`短链接，
    /// 减小二维码数据量。long_url必填。
    pub async fn short_url(&self, input: FieldBag) -> WxpayResult<FieldBag> {
        require(&input, "long_url")?;
        self.execute("/tools/shorturl", input, false, DEFAULT_TIMEOUT)
            .await
    }

    /// 生成扫码模式一的二维码参数，product_id必填
    ///
    /// 本接口不发起网络请求，仅注入身份参数、时间戳并签名。
    pub fn biz_pay_url(&self, mut input: FieldBag) -> WxpayResult<FieldBag> {
        require(&input, "product_id")?;
        self.inject_identity(&mut input);
        input.set("time_stamp", chrono::Utc::now().timestamp());
        let digest = sign::sign(&input, &self.config.key, self.config.sign_type);
        input.set(SIGN_FIELD, digest);
        Ok(input)
    }

    /// 注入商户身份参数和随机串
    fn inject_identity(&self, input: &mut FieldBag) {
        input.set("appid", &self.config.appid);
        input.set("mch_id", &self.config.mch_id);
        input.set("sub_mch_id", &self.config.sub_mch_id);
        input.set("nonce_str", sign::nonce_str(NONCE_LENGTH));
    }

    /// 接口调用通用流程，响应解码验签后返回
    async fn execute(
        &self,
        path: &str,
        input: FieldBag,
        use_cert: bool,
        timeout: Duration,
    ) -> WxpayResult<FieldBag> {
        let url = format!("{}{}", self.config.base_url, path);
        let started = Instant::now();
        let response = self.post_signed(&url, input, use_cert, timeout).await?;
        let result = self.parse_response(&response)?;
        self.report_cost_time(&url, started.elapsed(), &result).await;
        Ok(result)
    }

    /// 接口调用通用流程，响应原样返回（对账单、测速上报）
    async fn execute_raw(
        &self,
        path: &str,
        input: FieldBag,
        use_cert: bool,
        timeout: Duration,
    ) -> WxpayResult<String> {
        let url = format!("{}{}", self.config.base_url, path);
        self.post_signed(&url, input, use_cert, timeout).await
    }

    async fn post_signed(
        &self,
        url: &str,
        mut input: FieldBag,
        use_cert: bool,
        timeout: Duration,
    ) -> WxpayResult<String> {
        self.inject_identity(&mut input);
        let digest = sign::sign(&input, &self.config.key, self.config.sign_type);
        input.set(SIGN_FIELD, digest);
        let body = xml::encode(&input);

        info!("calling wxpay gateway: {}", url);
        self.transport.post(url, &body, use_cert, timeout).await
    }

    /// 解码响应；return_code为SUCCESS时才要求签名有效，
    /// 失败响应允许不带签名，由调用方检查失败原因。
    fn parse_response(&self, response: &str) -> WxpayResult<FieldBag> {
        let bag = xml::decode(response)?;
        if bag.get("return_code") == Some("SUCCESS") {
            sign::verify(&bag, &self.config.key, self.config.sign_type)?;
        }
        Ok(bag)
    }

    /// 上报接口耗时，上报级别决定是否上报，任何失败一律吞掉
    async fn report_cost_time(&self, url: &str, elapsed: Duration, result: &FieldBag) {
        match self.config.report_level {
            ReportLevel::Off => return,
            ReportLevel::FailureOnly => {
                if result.get("return_code") == Some("SUCCESS")
                    && result.get("result_code") == Some("SUCCESS")
                {
                    return;
                }
            }
            ReportLevel::Always => {}
        }

        let mut report = FieldBag::new();
        report.set("interface_url", url);
        report.set("execute_time_", elapsed.as_millis());
        for field in [
            "return_code",
            "return_msg",
            "result_code",
            "err_code",
            "err_code_des",
            "out_trade_no",
            "device_info",
        ] {
            if let Some(value) = result.get(field) {
                report.set(field, value);
            }
        }

        if let Err(e) = self.report(report).await {
            debug!("cost report swallowed: {}", e);
        }
    }
}

fn require(input: &FieldBag, field: &'static str) -> WxpayResult<()> {
    if input.is_set(field) {
        Ok(())
    } else {
        Err(WxpayError::MissingField(field))
    }
}

fn require_order_id(input: &FieldBag) -> WxpayResult<()> {
    if input.is_set("out_trade_no") || input.is_set("transaction_id") {
        Ok(())
    } else {
        Err(WxpayError::MissingField("out_trade_no/transaction_id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{signed_response, MockTransport};
    use crate::domain::sign;
    use crate::domain::value_objects::ReportLevel;

    fn api(transport: Arc<MockTransport>) -> WxpayApi<MockTransport> {
        WxpayApi::new(WxpayConfig::for_tests(), transport)
    }

    fn order_query_input() -> FieldBag {
        let mut input = FieldBag::new();
        input.set("out_trade_no", "20260829001");
        input
    }

    #[tokio::test]
    async fn test_missing_field_fails_before_transport() {
        let transport = MockTransport::always(Ok("<xml></xml>".to_string()));
        let api = api(transport.clone());

        let mut input = FieldBag::new();
        input
            .set("out_trade_no", "20260829001")
            .set("body", "test")
            .set("trade_type", "JSAPI");
        let err = api.unified_order(input).await.unwrap_err();
        assert!(matches!(err, WxpayError::MissingField("total_fee")));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_jsapi_requires_openid() {
        let transport = MockTransport::always(Ok("<xml></xml>".to_string()));
        let api = api(transport.clone());

        let mut input = FieldBag::new();
        input
            .set("out_trade_no", "20260829001")
            .set("body", "test")
            .set("total_fee", 1)
            .set("trade_type", "JSAPI");
        let err = api.unified_order(input).await.unwrap_err();
        assert!(matches!(err, WxpayError::MissingField("openid")));

        let mut input = FieldBag::new();
        input
            .set("out_trade_no", "20260829001")
            .set("body", "test")
            .set("total_fee", 1)
            .set("trade_type", "NATIVE");
        let err = api.unified_order(input).await.unwrap_err();
        assert!(matches!(err, WxpayError::MissingField("product_id")));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_order_query_requires_order_id() {
        let transport = MockTransport::always(Ok("<xml></xml>".to_string()));
        let api = api(transport.clone());

        let err = api.order_query(FieldBag::new()).await.unwrap_err();
        assert!(matches!(err, WxpayError::MissingField(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_request_is_injected_and_signed() {
        let config = WxpayConfig::for_tests();
        let response = signed_response(
            &config,
            &[("return_code", "SUCCESS"), ("result_code", "SUCCESS")],
        );
        let transport = MockTransport::always(Ok(response));
        let api = api(transport.clone());

        api.order_query(order_query_input()).await.unwrap();

        let (url, body, use_cert) = transport.calls()[0].clone();
        assert!(url.ends_with("/pay/orderquery"));
        assert!(!use_cert);

        let sent = xml::decode(&body).unwrap();
        assert_eq!(sent.get("appid"), Some("wx1234567890"));
        assert_eq!(sent.get("mch_id"), Some("10000100"));
        assert_eq!(sent.get("nonce_str").map(str::len), Some(32));
        assert!(sign::verify(&sent, &config.key, config.sign_type).is_ok());
    }

    #[tokio::test]
    async fn test_nonce_differs_between_calls() {
        let config = WxpayConfig::for_tests();
        let response = signed_response(
            &config,
            &[("return_code", "SUCCESS"), ("result_code", "SUCCESS")],
        );
        let transport = MockTransport::always(Ok(response));
        let api = api(transport.clone());

        api.order_query(order_query_input()).await.unwrap();
        api.order_query(order_query_input()).await.unwrap();

        let calls = transport.calls();
        let first = xml::decode(&calls[0].1).unwrap();
        let second = xml::decode(&calls[1].1).unwrap();
        assert_ne!(first.get("nonce_str"), second.get("nonce_str"));
    }

    #[tokio::test]
    async fn test_response_signature_is_verified() {
        let transport = MockTransport::always(Ok(
            "<xml><return_code>SUCCESS</return_code><sign>DEADBEEF</sign></xml>".to_string(),
        ));
        let api = api(transport);

        let err = api.order_query(order_query_input()).await.unwrap_err();
        assert!(matches!(err, WxpayError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_failed_response_skips_signature_check() {
        let transport = MockTransport::always(Ok(
            "<xml><return_code><![CDATA[FAIL]]></return_code><return_msg><![CDATA[appid不存在]]></return_msg></xml>"
                .to_string(),
        ));
        let api = api(transport);

        let result = api.order_query(order_query_input()).await.unwrap();
        assert_eq!(result.get("return_code"), Some("FAIL"));
        assert_eq!(result.get("return_msg"), Some("appid不存在"));
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let transport = MockTransport::always(Ok("<html>502 Bad Gateway</html>".to_string()));
        let api = api(transport);

        let err = api.order_query(order_query_input()).await.unwrap_err();
        assert!(matches!(err, WxpayError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_refund_and_reverse_use_certificate() {
        let config = WxpayConfig::for_tests();
        let response = signed_response(
            &config,
            &[("return_code", "SUCCESS"), ("result_code", "SUCCESS")],
        );
        let transport = MockTransport::always(Ok(response));
        let api = api(transport.clone());

        let mut input = FieldBag::new();
        input
            .set("out_trade_no", "20260829001")
            .set("out_refund_no", "R20260829001")
            .set("total_fee", 100)
            .set("refund_fee", 100)
            .set("op_user_id", "10000100");
        api.refund(input).await.unwrap();
        api.reverse(order_query_input()).await.unwrap();

        let calls = transport.calls();
        assert!(calls[0].0.ends_with("/secapi/pay/refund") && calls[0].2);
        assert!(calls[1].0.ends_with("/secapi/pay/reverse") && calls[1].2);
    }

    #[tokio::test]
    async fn test_report_level_off_never_reports() {
        let config = WxpayConfig::for_tests();
        // 失败响应也不触发上报
        let transport = MockTransport::always(Ok(
            "<xml><return_code>FAIL</return_code></xml>".to_string(),
        ));
        let api = WxpayApi::new(config, transport.clone());

        api.order_query(order_query_input()).await.unwrap();
        assert!(transport
            .calls()
            .iter()
            .all(|(url, _, _)| !url.contains("/payitil/report")));
    }

    #[tokio::test]
    async fn test_report_level_always_reports_and_swallows_failure() {
        let mut config = (*WxpayConfig::for_tests()).clone();
        config.report_level = ReportLevel::Always;
        let config = Arc::new(config);

        let response = signed_response(
            &config,
            &[("return_code", "SUCCESS"), ("result_code", "SUCCESS")],
        );
        let transport = MockTransport::with_handler(move |_, url, _| {
            if url.contains("/payitil/report") {
                Err(WxpayError::Transport("report endpoint down".to_string()))
            } else {
                Ok(response.clone())
            }
        });
        let api = WxpayApi::new(config, transport.clone());

        // 上报失败不影响主调用
        api.order_query(order_query_input()).await.unwrap();
        assert!(transport
            .calls()
            .iter()
            .any(|(url, _, _)| url.contains("/payitil/report")));
    }

    #[tokio::test]
    async fn test_download_bill_returns_raw_text() {
        let transport =
            MockTransport::always(Ok("交易时间,公众账号ID,商户号\n`2026-08-29,...".to_string()));
        let api = api(transport);

        let mut input = FieldBag::new();
        input.set("bill_date", "20260828");
        let bill = api.download_bill(input).await.unwrap();
        assert!(bill.starts_with("交易时间"));
    }

    #[tokio::test]
    async fn test_download_bill_error_document() {
        let transport = MockTransport::always(Ok(
            "<xml><return_code><![CDATA[FAIL]]></return_code><return_msg><![CDATA[No Bill Exist]]></return_msg></xml>"
                .to_string(),
        ));
        let api = api(transport);

        let mut input = FieldBag::new();
        input.set("bill_date", "20260828");
        let err = api.download_bill(input).await.unwrap_err();
        match err {
            WxpayError::Gateway(msg) => assert_eq!(msg, "No Bill Exist"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_biz_pay_url_is_signed_offline() {
        let config = WxpayConfig::for_tests();
        let transport = MockTransport::always(Ok(String::new()));
        let api = WxpayApi::new(config.clone(), transport.clone());

        let mut input = FieldBag::new();
        input.set("product_id", "888");
        let values = api.biz_pay_url(input).unwrap();

        assert_eq!(transport.call_count(), 0);
        assert!(values.is_set("time_stamp"));
        assert!(sign::verify(&values, &config.key, config.sign_type).is_ok());
    }
}
