//! AssistNow parameter wire format.
//!
//! Both sides of the relay speak the same tiny protocol: a request is a list of
//! `key=value` pairs joined by `;`, and the response is the raw AGPS payload
//! terminated by the peer closing its half of the connection.
//!
//! ## Architecture
//!
//! ```text
//! +----------+                        +-------+                        +----------+
//! |  Device  |  --- lat=..;lon=.. --> | Relay |  --- lat=..;lon=.. --> | Upstream |
//! |  (GNSS)  |  <-- payload, close --- |       |  <-- payload, close --- | (u-blox) |
//! +----------+                        +-------+                        +----------+
//!               ^                 ^
//!               |  RequestCodec   |
//!               +-----------------+
//! ```
//!
//! ## Terminology
//!
//! - **Params**: decoded `key=value` mapping, forwarded upstream as-is
//! - **RequestCodec**: framing for the client socket (one request per connection)

pub mod codec;
pub mod error;
pub mod params;

pub use codec::{DEFAULT_MAX_REQUEST_SIZE, RequestCodec};
pub use error::ProtocolError;
pub use params::Params;
