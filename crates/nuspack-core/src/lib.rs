//! nuspack-core - NUS package assembly and encryption engine.
//!
//! Converts a decrypted title tree (`code/`, `content/`, `meta/`) into a
//! signed-placeholder, encrypted, installable NUS package: a Title
//! Metadata file, a Ticket, one encrypted `.app` payload per content, and
//! a certificate-chain passthrough.
//!
//! # Architecture
//!
//! - **Content rules** ([`rules`]): a pure table mapping `(group id,
//!   parent id)` to ordered content templates, resolved against the input
//!   tree into dense-indexed descriptors.
//! - **Crypto** ([`crypto`]): title-key generation and wrapping, plus
//!   streaming AES-128-CBC content encryption with index-derived IVs.
//! - **Digests** ([`digest`]): whole-ciphertext SHA-1 for plain contents,
//!   a block-chained hash tree for hashed contents.
//! - **Orchestrator** ([`package`]): drives one build end to end; owns the
//!   transient working directory and moves a complete, internally
//!   consistent set of outputs into place or nothing at all.

pub mod app_xml;
pub mod config;
pub mod content;
pub mod crypto;
pub mod digest;
pub mod error;
pub mod package;
pub mod rules;

// Re-exports for convenience
pub use config::{PackageConfig, TitleIdentity};
pub use content::{ContentDescriptor, ContentResult};
pub use error::PackError;
pub use package::{NusPackage, TicketSummary};
