//! # l2shell
//!
//! Async CLI session engine for layer 2 switch automation.
//!
//! l2shell drives the interactive shell of a network switch over SSH or
//! Telnet: it connects lazily, logs in, runs commands (optionally walking a
//! multi-step configuration dialog) and returns the cleaned output.
//! Vendor drivers build on top of it through the [`L2Api`] trait, and
//! [`CachedL2Api`] keeps their read results for a configurable time.
//!
//! ## Features
//!
//! - Async SSH via russh and raw Telnet with option refusal
//! - Prompt-mark and error-mark driven command completion
//! - Ordered interaction scripts for configuration dialogs
//! - Transparent reconnect and retry of transient failures
//! - Dialect presets for Brocade, Dell and HP switches
//! - TTL result cache with write-driven invalidation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use l2shell::{InteractionScript, SessionBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), l2shell::Error> {
//!     let mut session = SessionBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .dialect("dell_force10")
//!         .build()?;
//!
//!     let transcript = session.send_command("show vlan brief").await?;
//!     println!("{}", transcript);
//!
//!     let script = InteractionScript::from_pairs([
//!         (r"\(conf\)#", "interface vlan 10"),
//!         (r"\(conf-if-vl-10\)#", "end"),
//!     ])
//!     .map_err(l2shell::error::ConfigError::from)?;
//!     session.execute("configure", &script).await?;
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod channel;
pub mod driver;
pub mod error;
pub mod platform;
pub mod transport;

// Re-export main types for convenience
pub use cache::{AutoCache, CacheKey, Cacheable, OperationDescriptor, OperationTable};
pub use driver::{
    CommandExecutor, Interaction, InteractionBuilder, InteractionScript, Session, SessionBuilder,
    SharedSession, Transcript,
};
pub use error::{Error, Result};
pub use platform::{CachedL2Api, Dialect, DialectRegistry, L2Api, Records};
pub use transport::{HostKeyVerification, LineEnding, Protocol, SessionConfig};
