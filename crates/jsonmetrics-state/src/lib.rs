//! jsonmetrics-state — the in-memory metric state engine.
//!
//! [`MetricState`] keeps the latest accepted [`Sample`] per rendered
//! metric name, plus an optional debounce window per name.
//!
//! # Rules
//!
//! - **Ordering**: an update is published only when its timestamp is
//!   strictly after the published one. Stale and duplicate updates are
//!   dropped, never applied retroactively.
//! - **Debounce**: a debounced metric that changes value (or is seen for
//!   the first time) opens a window. Until the window closes, reads
//!   return the value observed when it opened, stamped with the time it
//!   opened. Flaps inside an open window do not move it.
//!
//! # Concurrency
//!
//! One `RwLock` guards both maps. `update` takes the write lock for the
//! whole update, `get` takes the read lock; neither holds it across I/O.
//! `MetricState` is `Clone` (shared `Arc`) and can be handed to the
//! ingestion task and every scrape handler.

pub mod clock;
pub mod engine;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::MetricState;
pub use types::{Sample, UpdateOutcome};
