//! Channel-routing delivery engine: selector resolution and the
//! multi-backend notification dispatcher.

pub mod deliver;
pub mod dispatcher;
pub mod error;
pub mod resolver;
pub mod severity;

pub use deliver::{Deliver, DispatchDriver};
pub use dispatcher::{DeliveryUrl, DispatchReport, Dispatcher, Endpoint, EndpointResult};
pub use error::DeliveryError;
pub use resolver::{resolve_channels, Resolution, SmtpAccount, SmtpFallback};
pub use severity::Severity;
