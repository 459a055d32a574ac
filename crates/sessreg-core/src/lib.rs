//! sessreg-core: registry of live interactive terminal sessions.
//!
//! Tracks who is connected to each session, the terminal geometry in use,
//! and whether the session is still live, on top of any key-value
//! [`Backend`](backend::Backend). Proxies, nodes and auditors share one
//! registry to find, join or reap sessions.

pub mod backend;
pub mod clock;
pub mod error;
pub mod id;
pub mod registry;
pub mod session;

// Re-export commonly used items at crate root.
pub use backend::{Backend, BackendError, BackendResult, DirBackend, MemoryBackend};
pub use clock::{Clock, FrozenClock, SystemClock};
pub use error::{RegistryError, RegistryResult};
pub use id::Id;
pub use registry::{Registry, ACTIVE_SESSION_TTL};
pub use session::{Party, Session, TerminalParams, UpdateRequest, MAX_TERMINAL_SIZE};
