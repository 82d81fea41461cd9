use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::application::api::WxpayApi;
use crate::domain::errors::{WxpayError, WxpayResult};
use crate::domain::fields::FieldBag;
use crate::domain::value_objects::TradeState;
use crate::ports::TransportPort;

/// 轮询确认的默认时间预算
const DEFAULT_POLL_BUDGET: Duration = Duration::from_secs(30);
/// 两次查询之间的等待时间
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// 撤销订单的最大重试次数
const DEFAULT_CANCEL_ATTEMPTS: u32 = 10;

/// 刷卡支付确认流程的终态
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    /// 支付成功，携带查询接口返回的订单数据
    Confirmed(FieldBag),
    /// 结果迟迟未定，订单已成功撤销
    Cancelled,
}

/// 刷卡支付实现类
///
/// 提交被扫支付后网关可能返回"用户支付中"等非终态，流程如下：
/// 1、提交刷卡支付；
/// 2、结果不明确时在时间预算内反复查询订单；
/// 3、预算耗尽仍无结果则发起撤销，撤销失败循环重试（上限10次）。
///
/// 整个流程是异步的，调用方可用`tokio::time::timeout`包装或直接
/// 丢弃future来提前中断轮询。
pub struct MicroPay<T: TransportPort> {
    api: WxpayApi<T>,
    poll_budget: Duration,
    poll_interval: Duration,
    cancel_attempts: u32,
}

/// 单次订单查询的分类结果
enum Disposition {
    /// 订单交易成功
    Paid(FieldBag),
    /// 订单交易失败
    Failed(String),
    /// 状态未定，继续等待
    Pending,
}

impl<T: TransportPort> MicroPay<T> {
    pub fn new(api: WxpayApi<T>) -> Self {
        Self {
            api,
            poll_budget: DEFAULT_POLL_BUDGET,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel_attempts: DEFAULT_CANCEL_ATTEMPTS,
        }
    }

    pub fn poll_budget(mut self, budget: Duration) -> Self {
        self.poll_budget = budget;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn cancel_attempts(mut self, attempts: u32) -> Self {
        self.cancel_attempts = attempts;
        self
    }

    /// 提交刷卡支付并确认结果，接口比较慢
    ///
    /// 最坏耗时为整个轮询预算加上最多10次撤销调用。
    pub async fn pay(&self, input: FieldBag) -> WxpayResult<PaymentOutcome> {
        let out_trade_no = input
            .get("out_trade_no")
            .map(str::to_string)
            .ok_or(WxpayError::MissingField("out_trade_no"))?;

        // ①、提交被扫支付
        let result = self.api.micropay(input).await?;

        if !result.is_set("return_code") || !result.is_set("result_code") {
            return Err(WxpayError::Transport(
                "gateway returned no status".to_string(),
            ));
        }

        // ②、接口调用成功但明确返回失败，USERPAYING和SYSTEMERROR除外
        if result.get("return_code") == Some("SUCCESS")
            && result.get("result_code") == Some("FAIL")
        {
            let err_code = result.get("err_code").unwrap_or_default();
            if err_code != "USERPAYING" && err_code != "SYSTEMERROR" {
                let desc = result
                    .get("err_code_des")
                    .unwrap_or(err_code)
                    .to_string();
                return Err(WxpayError::PaymentDenied(desc));
            }
            debug!("micropay pending ({}), entering query loop", err_code);
        }

        // ③、确认支付是否成功，时间预算内反复查询
        let started = Instant::now();
        while started.elapsed() <= self.poll_budget {
            match self.query_once(&out_trade_no).await {
                Disposition::Paid(result) => {
                    info!("micropay confirmed: {}", out_trade_no);
                    return Ok(PaymentOutcome::Confirmed(result));
                }
                Disposition::Failed(desc) => {
                    warn!("micropay denied: {}: {}", out_trade_no, desc);
                    return Err(WxpayError::PaymentDenied(desc));
                }
                Disposition::Pending => sleep(self.poll_interval).await,
            }
        }

        // ④、确认超时，撤销订单
        info!("micropay unconfirmed after budget, reversing: {}", out_trade_no);
        if self.cancel(&out_trade_no).await? {
            Ok(PaymentOutcome::Cancelled)
        } else {
            Err(WxpayError::CancellationFailed)
        }
    }

    /// 查询一次订单并分类结果
    ///
    /// 查询本身的网络或系统错误按"状态未定"处理，继续轮询。
    async fn query_once(&self, out_trade_no: &str) -> Disposition {
        let mut input = FieldBag::new();
        input.set("out_trade_no", out_trade_no);

        let result = match self.api.order_query(input).await {
            Ok(result) => result,
            Err(e) => {
                debug!("order query failed, keep polling: {}", e);
                return Disposition::Pending;
            }
        };

        if result.get("return_code") != Some("SUCCESS")
            || result.get("result_code") != Some("SUCCESS")
        {
            return Disposition::Pending;
        }

        match TradeState::parse(result.get("trade_state").unwrap_or_default()) {
            TradeState::Success => Disposition::Paid(result),
            TradeState::Refund
            | TradeState::Closed
            | TradeState::Revoked
            | TradeState::PayError => {
                let desc = result
                    .get("trade_state_desc")
                    .or_else(|| result.get("trade_state"))
                    .unwrap_or("trade failed")
                    .to_string();
                Disposition::Failed(desc)
            }
            TradeState::UserPaying | TradeState::NotPay | TradeState::Unknown => {
                Disposition::Pending
            }
        }
    }

    /// 撤销订单，失败时重复调用，上限`cancel_attempts`次
    ///
    /// 网关约定：result_code非SUCCESS且recall为N表示无需再次撤销，
    /// 视为撤销成功。该映射是网关文档语义，按原样保留。
    async fn cancel(&self, out_trade_no: &str) -> WxpayResult<bool> {
        for attempt in 1..=self.cancel_attempts {
            let mut input = FieldBag::new();
            input.set("out_trade_no", out_trade_no);

            let result = match self.api.reverse(input).await {
                Ok(result) => result,
                Err(WxpayError::Transport(e)) => {
                    debug!("reverse attempt {} transport error: {}", attempt, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            // 接口调用失败，重试
            if result.get("return_code") != Some("SUCCESS") {
                continue;
            }

            if result.get("result_code") != Some("SUCCESS")
                && result.get("recall") == Some("N")
            {
                return Ok(true);
            } else if result.get("recall") == Some("Y") {
                continue;
            }
            return Ok(false);
        }
        Ok(false)
    }
}
