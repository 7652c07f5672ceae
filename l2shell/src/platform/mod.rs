//! Multi-vendor support.
//!
//! A [`Dialect`] captures the shell conventions of a switch family and is
//! looked up by name in the [`DialectRegistry`]. [`L2Api`] is the
//! vendor-neutral operation surface drivers implement on top of a
//! [`CommandExecutor`](crate::driver::CommandExecutor), and
//! [`CachedL2Api`] puts a result cache in front of any driver.

mod dialect;
mod l2api;
mod registry;
pub mod vendors;

pub use dialect::Dialect;
pub use l2api::{CachedL2Api, L2Api, Records, default_operation_table, op};
pub use registry::DialectRegistry;
