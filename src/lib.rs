//! Split-horizon DNS views.
//!
//! Queries are classified by source address into named client groups; each
//! group maps query names to its own CNAME target, which is then optionally
//! resolved through an upstream. Group and record tables are reloaded
//! periodically from local files or HTTP endpoints and swapped atomically.

pub mod acl;
pub mod chain;
pub mod config;
pub mod error;
pub mod handler;
pub mod loader;
pub mod reload;
pub mod resolver;
pub mod snapshot;
pub mod source;
pub mod upstream;
pub mod zones;
