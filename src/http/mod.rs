//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → endpoint.rs (decode → handle → encode)
//!     → Send to client
//! ```

pub mod endpoint;
pub mod request;
pub mod server;

pub use endpoint::{encode_json, BaseEndpoint, Endpoint, EndpointError};
pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::HttpServer;
