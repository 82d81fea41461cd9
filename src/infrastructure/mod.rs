pub mod adapters;
pub mod config;

pub use adapters::ReqwestTransport;
pub use config::WxpayConfig;
