//! Common imports shared by most modules in this crate, mirroring the teacher's own
//! `prelude.rs` grouping of the standard-library and `anyhow` types used almost everywhere, minus
//! the tokio-specific channel/select re-exports (networking in this build is blocking-thread, see
//! `SPEC_FULL.md` section C).

pub use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
pub use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use anyhow::{anyhow, bail, Context, Result};
pub use hashbrown::HashMap;
pub use tracing::{debug, error, info, trace, warn};
