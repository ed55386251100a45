//! Browser implementations of the core seams.

pub mod http;
pub mod location;
pub mod socket;
pub mod storage;

pub use http::HttpBackend;
pub use socket::WebSocketConnector;
pub use storage::BrowserStorage;
