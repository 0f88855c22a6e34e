//! Content fingerprints and cache-busting mappings for static files.
//!
//! A [`FileGroup`] lists source files relative to a base directory. The
//! [`GroupProcessor`] fingerprints every file (a truncated content digest or
//! a metadata "etag"), copies it to a fingerprinted name under the group's
//! destination and writes a JSON mapping from original to fingerprinted
//! paths.
//!
//! ## Building blocks
//!
//! - Templates (`template::Renderer`): the small `{{= name}}` language used
//!   for rename targets, mapping keys and values, mapping file paths and
//!   etags
//! - Fingerprints (`fingerprint::Fingerprinter`): streaming digests with
//!   optional text decoding and salt
//! - Path derivation (`derive::PathDeriver`)
//! - Aggregation (`mapping::Aggregator`, `mapping::Mapping`)
//! - Storage (`AssetStore`); implementations live in `filehash_store_local`
//!   and `filehash_store_memory`

pub mod derive;
pub mod encoding;
pub mod fingerprint;
pub mod group;
pub mod mapping;
pub mod materialize;
pub mod options;
pub mod store;
pub mod template;

// Test utilities (behind feature flag)
#[cfg(feature = "testutil")]
pub mod testutil;

pub use derive::{PathDeriver, PathPlan};
pub use encoding::TextEncoding;
pub use fingerprint::{ContentHasher, Fingerprinter};
pub use group::{FileGroup, GroupProcessor, GroupReport};
pub use mapping::{FileFailure, FileRecord, Mapping};
pub use options::{Algorithm, Options, OptionsError, Settings, TemplateSetting};
pub use store::{AssetStore, ByteStream, FileStat, StoreResult};
pub use template::{Delimiters, Renderer, Template, TemplateError, Vars};
