//! # fdr-core: feeder model primitives
//!
//! Shared building blocks for the feeder calibration toolkit:
//!
//! - [`ObjectTree`] / [`Record`]: the ordered record store every MDL file is
//!   parsed into and printed from
//! - [`ObjectLibrary`]: registry of object kinds with their canonical
//!   attribute order
//! - [`topology::FeederGraph`]: petgraph view used for island and
//!   parallel-link analysis
//! - [`FdrError`] and [`Diagnostics`]: error taxonomy and recoverable-issue
//!   collection
//!
//! ```rust
//! use fdr_core::{ObjectLibrary, ObjectTree};
//!
//! let lib = ObjectLibrary::global();
//! let mut tree = ObjectTree::new();
//! let node = lib.build("node", &["n1", "", "ABCN", "7200", ""]).unwrap();
//! tree.push(node);
//! assert_eq!(tree.count_kind("node"), 1);
//! ```

pub mod diagnostics;
pub mod error;
pub mod library;
pub mod season;
pub mod topology;
pub mod tree;

pub use diagnostics::{DiagnosticIssue, Diagnostics, ImportStats, Severity};
pub use error::{FdrError, FdrResult};
pub use library::{KindClass, KindSpec, ObjectLibrary};
pub use season::Season;
pub use tree::{ObjectTree, Record, RecordKind};
