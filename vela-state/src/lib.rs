//! Vela State Management
//!
//! Persists the mapping from declared resources to their remote
//! identifiers, with locking for safe concurrent access. The state file is
//! the only place the tool remembers which cloud objects it owns; losing
//! an identifier orphans the object, keeping a stale one makes the next
//! read address something that no longer exists.
//!
//! The pieces:
//!
//! - **StateFile**: versioned, serial-numbered container of resource states
//! - **StateBackend**: storage trait (currently local files)
//! - **LockInfo**: who holds the state and for which operation
//!
//! # Example
//!
//! ```ignore
//! use vela_state::{create_backend, BackendConfig};
//!
//! let config = BackendConfig {
//!     backend_type: "local".to_string(),
//!     attributes: [
//!         ("path".to_string(), Value::String("prod/vela.state.json".to_string())),
//!     ].into_iter().collect(),
//! };
//!
//! let backend = create_backend(&config).await?;
//!
//! let lock = backend.acquire_lock("apply").await?;
//! let state = backend.read_state().await?;
//!
//! // ... reconcile resources ...
//!
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::create_backend;
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
