use crate::application::api::WxpayApi;
use crate::domain::errors::WxpayResult;
use crate::domain::fields::FieldBag;
use crate::ports::TransportPort;

/// 扫码支付实现类
pub struct NativePay<T: TransportPort> {
    api: WxpayApi<T>,
}

impl<T: TransportPort> NativePay<T> {
    pub fn new(api: WxpayApi<T>) -> Self {
        Self { api }
    }

    /// 生成扫码支付URL，模式一
    ///
    /// 商户预先按product_id生成二维码，用户扫码后网关回调商户下单。
    /// 不发起网络请求。
    pub fn get_prepay_url(&self, product_id: &str) -> WxpayResult<String> {
        let mut input = FieldBag::new();
        input.set("product_id", product_id);
        let values = self.api.biz_pay_url(input)?;

        let query = values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        Ok(format!("weixin://wxpay/bizpayurl?{}", query))
    }

    /// 生成直接支付url，模式二，支付url有效期为2小时
    ///
    /// trade_type由本方法固定为NATIVE，其余参数同统一下单。
    pub async fn get_pay_url(&self, mut input: FieldBag) -> WxpayResult<FieldBag> {
        input.set("trade_type", "NATIVE");
        self.api.unified_order(input).await
    }
}
