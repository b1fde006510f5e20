//! Login request handling independent of HTTP.

mod service;
mod validation;

pub use service::{LoginAccepted, LoginService, INVALID_EMAIL_MESSAGE, QUEUED_MESSAGE};
pub use validation::{EmailValidator, EMAIL_INVALID, EMAIL_REQUIRED};
