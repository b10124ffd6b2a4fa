pub mod filter;
pub mod mismatch;
pub mod snapshot;
pub mod task;

pub use filter::*;
pub use mismatch::*;
pub use snapshot::*;
pub use task::*;
