//! 협업 에디터 클라이언트 측 동기화

pub mod debounce;
pub mod execution;
pub mod presence;
pub mod reconciler;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;

pub use debounce::Debouncer;
pub use execution::{ExecutionClient, ExecutionReport};
pub use presence::{CursorState, CursorStyle, OverlaySurface, PresenceOverlay, PALETTE};
pub use reconciler::{EditorSurface, RoomNotice, Selection, SyncReconciler, SyncTimings};
pub use supervisor::{reconnect_delay, Channel, ConnectionState, ConnectionSupervisor};
