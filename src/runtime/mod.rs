//! Single-writer session runtime and change notifications.

/// Event stream types emitted by the runtime.
pub mod events;
/// Handle and command loop implementation.
#[allow(missing_docs)]
pub mod handle;
