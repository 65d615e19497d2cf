//! Remote references
//!
//! - [`RemoteRef`]: how a caller reaches one remote object
//! - [`Endpoint`] and [`LiveRef`]: where that object lives
//! - [`UnicastRef`] / [`UnicastServerRef`]: the connection-per-call
//!   reference family and its server-side counterpart
//! - [`protocol`]: call and return message bodies

mod endpoint;
mod live_ref;
pub mod protocol;
mod remote_ref;
mod unicast;

pub use endpoint::Endpoint;
pub use live_ref::LiveRef;
pub use protocol::{CallMessage, ReturnMessage, ReturnStatus};
pub use remote_ref::RemoteRef;
pub use unicast::{live_ref_of, UnicastRef, UnicastServerRef};
