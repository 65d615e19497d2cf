//! Export lifecycle and server-side dispatch

mod dispatch;
#[allow(clippy::module_inception)]
mod exporter;
mod object_table;

pub use dispatch::CallDispatcher;
pub use exporter::Exporter;
pub use object_table::{impl_key, CallGuard, ExportRecord, ImplKey, ListenerKey, ObjectTable};
