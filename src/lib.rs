//! # Upload Imaging
//!
//! Post-processing for uploaded images. An integrator registers an ordered
//! list of declarative operations once, and every upload is run through it:
//! decoded once, mutated in order, written back once.
//!
//! ```no_run
//! use upload_imaging::source::LocalFile;
//! use upload_imaging::{Gravity, Pipeline, Recipe};
//!
//! let recipe = Recipe::new()
//!     .auto_orient()
//!     .resize_to_fill(400, 500, Gravity::North)
//!     .strip()
//!     .convert("webp");
//!
//! let mut upload = LocalFile::new("uploads/portrait.jpg");
//! let written = Pipeline::new(recipe).process(&mut upload)?;
//! // uploads/portrait.webp, exactly 400x500, no metadata
//! # Ok::<(), upload_imaging::ProcessingError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! Recipe ──► Pipeline::process ──► SourceFile::resolve_local_path
//!                 │                         │
//!                 │                 ImageHandle::open  (decode + metadata)
//!                 │                         │
//!                 ├── for each step: apply operation, then run its hook
//!                 │                         │
//!                 └──────────────► writer::flush  (encode, temp file, rename)
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`operation`] | [`Operation`], [`Gravity`], hooks, and the ordered [`Recipe`] |
//! | [`imaging`] | [`ImageHandle`](imaging::ImageHandle): decode, transforms, encode, metadata |
//! | [`pipeline`] | [`Pipeline`] executor and the single [`ProcessingError`] |
//! | [`writer`] | Output path resolution and atomic flush |
//! | [`source`] | [`SourceFile`](source::SourceFile) collaborators: local and stored files |
//! | [`config`] | `imaging.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Handle, One Flush
//!
//! Operations never touch the filesystem. They mutate an owned
//! [`ImageHandle`](imaging::ImageHandle), and the writer consumes the handle,
//! so "flushed exactly once" is enforced by ownership rather than a flag.
//!
//! ## Hooks as Functions
//!
//! A hook is a `Fn(ImageHandle) -> Result<ImageHandle, HookError>` attached to
//! a step. It receives the handle after the step's own transform and hands it
//! back, so custom work composes with the built-in operations without
//! subclassing anything.
//!
//! ## All or Nothing
//!
//! Any failure aborts the run before the writer is reached, and the writer
//! renames a fully-written temp file into place. A failed upload leaves the
//! original bytes untouched.

pub mod config;
pub mod imaging;
pub mod operation;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod writer;

pub use operation::{Gravity, Hook, HookError, Operation, Recipe};
pub use pipeline::{ErrorKind, Pipeline, ProcessingError};

#[cfg(test)]
pub(crate) mod test_helpers;
