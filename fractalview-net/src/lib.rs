pub mod error;
pub mod http;

pub use error::NetError;
pub use http::{decode_body, HttpTransport};
