//! Links protobuf source files across packages, and prints linked files back as canonical
//! source text.
//!
//! A [`Resolver`] compiles a requested file together with every other source file of its local
//! package, loads its imports from other local packages or from a
//! [`DependencyProvider`](file::DependencyProvider), and links every reference to a single
//! declaration. The resulting [`CompiledFile`]s can be rendered with [`print_file()`].
//!
//! # Examples
//!
//! ```
//! # let tempdir = tempfile::tempdir().unwrap();
//! # std::fs::create_dir(tempdir.path().join("shapes")).unwrap();
//! # std::fs::write(tempdir.path().join("shapes/shape.proto"), "
//! #     syntax = 'proto3';
//! #     package shapes;
//! #     import 'google/protobuf/timestamp.proto';
//! #     import 'shapes/point.proto';
//! #     message Shape { repeated Point points = 1; google.protobuf.Timestamp created = 2; }
//! # ").unwrap();
//! # std::fs::write(tempdir.path().join("shapes/point.proto"), "
//! #     syntax = 'proto3';
//! #     package shapes;
//! #     message Point { int32 x = 1; int32 y = 2; }
//! # ").unwrap();
//! use protolink::{file::{ChainProvider, DirectoryProvider}, print_file, Resolver};
//!
//! let resolver = Resolver::new(DirectoryProvider::new(tempdir.path()), ChainProvider::new());
//! let files = resolver.compile("shapes/shape.proto")?;
//!
//! assert_eq!(print_file(&files[0])?, "\
//! syntax = \"proto3\";
//! package shapes;
//!
//! import \"google/protobuf/timestamp.proto\";
//! import \"shapes/point.proto\";
//!
//! message Shape {
//!   repeated Point points = 1;
//!   google.protobuf.Timestamp created = 2;
//! }
//! ");
//! # Ok::<(), protolink::Error>(())
//! ```
//!
//! ### Error messages
//!
//! Errors implement [`miette::Diagnostic`]. Parse errors carry the source of the file they
//! occurred in, so returning a [`miette::Result`] with the `fancy` feature enabled shows them
//! with context.
#![warn(missing_debug_implementations, missing_docs)]
#![deny(unsafe_code)]

pub mod file;
pub mod ir;
pub mod options;

mod case;
mod error;
mod fmt;
mod print;
mod resolve;

pub use {prost, prost_reflect, prost_types};

pub use self::error::Error;
pub use self::ir::CompiledFile;
pub use self::print::{group_extensions, print_file};
pub use self::resolve::Resolver;
