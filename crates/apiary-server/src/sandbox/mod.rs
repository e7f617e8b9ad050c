//! Isolated execution of service modules.
//!
//! Each module runs in its own boa context. The only globals a module sees
//! are the ones [`bindings`] installs from the [`crate::capabilities::CapabilitySet`];
//! there is no ambient access to the host process, filesystem or network.
//! Contexts are not thread-safe, so a fresh one is instantiated from the
//! cached module source for every invocation.

pub mod bindings;
pub mod context;
pub mod conversions;


pub use context::ServiceContext;
