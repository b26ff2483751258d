pub mod client;
pub mod request;

pub use client::{DarajaClient, DarajaError, StkPushResponse};
pub use request::{StkPushRequest, RequestError};
