//! Application logic controller module
//!
//! The session controller sits between the front-end and everything else: it
//! owns the settings and the live profile store, dispatches workers, and turns
//! their events into status, progress and console state for display.
//!
//! # Event Flow
//!
//! ```text
//! front-end ─► SessionController ─► ProcessWorker ─┐
//!                   ▲                              │
//!                   └──── WorkerEvent ◄────────────┤
//!                   │                              │
//!                   └─► PostProcessWorker ─────────┘
//! ```
//!
//! A successful stitch whose profile enables post-processing chains the
//! post-process worker; the start button stays disabled until the last worker
//! of the chain reports back.

pub mod session;

pub use session::{Progress, SessionController, Status, UpdateNotice};
