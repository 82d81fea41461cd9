pub mod wxpay_config;

pub use wxpay_config::WxpayConfig;
