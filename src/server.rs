//! TCP front end for AGPS clients.
//!
//! ## Architecture
//!
//! ```text
//! +--------+
//! | Server |  <- Accepts TCP connections
//! +--------+
//!      |
//!      v
//! +---------+     +----------+
//! | Session | --> | GeoCache |  <- Shared by every session
//! +---------+     +----------+
//! ```
//!
//! ## Terminology
//!
//! - **Server**: TCP listener that spawns one session per connection
//! - **Session**: Reads one request, answers it, closes the connection

pub mod listener;
pub mod session;

pub use listener::Server;
pub use session::{Session, SessionError, SessionState};
