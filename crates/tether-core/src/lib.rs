//! Tether protocol core.
//!
//! Pure protocol pieces with no I/O. The server driver composes them with a
//! room registry; the runtime supplies real implementations of the two seams:
//!
//! - [`Environment`]: randomness and wall-clock time
//! - [`ConnectionHandle`]: the outbound half of one duplex connection
//!
//! Test and simulation code supplies deterministic implementations of both
//! (see `tether-harness`).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod error;
pub mod handle;
pub mod secret;
pub mod session;

pub use env::Environment;
pub use error::{SendError, SessionError};
pub use handle::ConnectionHandle;
pub use secret::RoomSecret;
pub use session::{Role, Session, SessionState};
