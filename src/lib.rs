//! An IRC client session engine.
//!
//! Tokenizes server lines, negotiates capabilities and authenticates,
//! tracks channels and users, and keeps the connection alive,
//! reporting everything a presentation layer needs as [`client::Event`]s.
#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]
#![deny(clippy::redundant_else)]
#![deny(clippy::semicolon_if_nothing_returned)]
#![deny(rustdoc::bare_urls)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::invalid_codeblock_attributes)]
#![deny(rustdoc::invalid_html_tags)]
#![deny(rustdoc::invalid_rust_codeblocks)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod client;
pub mod config;
pub mod error;
pub mod ircmsg;
pub mod state;
