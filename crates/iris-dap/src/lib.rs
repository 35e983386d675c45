//! # Iris DAP
//!
//! The editor-facing contract of the bridge: the Debug Adapter Protocol
//! entities the session produces and consumes. The DAP transport framing is
//! owned by the editor integration; this crate only defines the shapes.

mod events;
mod types;

pub use events::*;
pub use types::*;
