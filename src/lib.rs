//! Cross-view task consistency engine.
//!
//! One shared task collection, many derived views (board, today, inbox,
//! canvas, ...). This crate keeps those views honest: a staged pure
//! [`filter`] pipeline derives them deterministically, the
//! [`monitor::ConsistencyMonitor`] continuously checks declared cross-view
//! invariants without ever destabilizing the host, and the
//! [`history::HistoryManager`] provides checkpointed undo/redo over
//! repository mutations. [`engine::ViewEngine`] is the composition root a
//! host application owns.
//!
//! Rendering, gesture handling, persistence, and authentication live in the
//! host; this crate only sees tasks through the narrow
//! [`source::TaskSource`] capability trait.

pub mod capture;
pub mod engine;
pub mod filter;
pub mod history;
pub mod model;
pub mod monitor;
pub mod source;

pub use engine::{ChangeEvent, ViewEngine};
pub use filter::{FilterOutcome, FilterTrace, apply as apply_filter};
pub use history::HistoryManager;
pub use model::filter::FilterConfig;
pub use model::mismatch::{HealthStatus, Mismatch, MismatchKind, MonitorSummary, Severity};
pub use model::snapshot::ViewSnapshot;
pub use model::task::{Instance, Subtask, Task, TaskPriority, TaskStatus};
pub use monitor::{ConsistencyMonitor, ViewDeclaration};
pub use source::{MutationError, TaskMutation, TaskRepository, TaskSource};
