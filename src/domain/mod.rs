pub mod errors;
pub mod fields;
pub mod sign;
pub mod value_objects;
pub mod xml;

pub use errors::{WxpayError, WxpayResult};
pub use fields::FieldBag;
pub use value_objects::{ReportLevel, SignType, TradeState, TradeType};
