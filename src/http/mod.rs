//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Unix socket connection
//!     → server.rs (hyper http1 connection, timeouts, Axum router)
//!     → request.rs (request ID, span, completion log)
//!     → body.rs (body peeker handed to the access policy)
//!     → server.rs proxy_handler (policy check, upstream call)
//!     → response.rs (error responses, relayed body)
//!     → Send to client
//! ```

pub mod body;
pub mod request;
pub mod response;
pub mod server;

pub use body::{BodyPeeker, InspectionError, PeekedBody};
pub use request::RequestId;
pub use server::HttpServer;
