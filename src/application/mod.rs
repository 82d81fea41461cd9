pub mod api;
pub mod jsapi;
pub mod micro;
pub mod native;
pub mod notify;

#[cfg(test)]
pub(crate) mod testing;

pub use api::WxpayApi;
pub use jsapi::{JsSignature, JsapiTicketService, TicketCache};
pub use micro::{MicroPay, PaymentOutcome};
pub use native::NativePay;
pub use notify::Notify;
