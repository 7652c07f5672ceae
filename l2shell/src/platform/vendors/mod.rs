//! Built-in vendor dialects.

pub mod brocade;
pub mod dell;
pub mod hp;
