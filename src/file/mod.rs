//! Byte source abstraction and binary parsing primitives.
//!
//! This module provides the data-access layer the PE parsers are built on. It abstracts
//! over different data sources (files, memory) and provides bounds-checked primitives for
//! reading the binary structures PE images are made of.
//!
//! # Architecture
//!
//! The module is built around several components that work together:
//!
//! - **Backend system** - Pluggable data sources (disk files, memory buffers)
//! - **I/O primitives** - Endian-aware, bounds-checked reads and writes
//! - **Cursor parser** - Sequential, seekable structure decoding
//!
//! # Key Components
//!
//! ## Core Types
//! - [`crate::file::Backend`] - Trait for different data sources (disk files, memory buffers)
//! - [`crate::file::Physical`] - Memory-mapped file backend for disk access
//! - [`crate::file::Memory`] - In-memory buffer backend
//!
//! ## Parsing Infrastructure
//! - [`crate::file::parser::Parser`] - Cursor-based parsing interface for structure extraction
//! - [`crate::file::io`] - Low-level I/O utilities for reading PE structures
//!
//! # Data Sources
//!
//! The module supports multiple data sources through the [`crate::file::Backend`] trait:
//! - **Physical files** - Memory-mapped files for efficient disk access
//! - **Memory buffers** - In-memory PE data supplied by the caller
//!
//! Ownership follows ordinary Rust move semantics: a backend constructed from a path is
//! owned exclusively by its [`crate::pe::PeImage`] and released exactly once on drop; a
//! caller-supplied backend is moved into the image, making the ownership transfer explicit
//! in the constructor signature.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pescope::file::{Backend, Memory};
//!
//! let data = std::fs::read("application.exe")?;
//! let backend = Memory::new(data);
//!
//! // Check the DOS signature
//! let dos = backend.data_slice(0, 2)?;
//! assert_eq!(dos, b"MZ");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Integration
//!
//! This module integrates with:
//! - [`crate::pe`] - All header, resource, icon and version-info parsing reads through
//!   a [`crate::file::Backend`]
//!
//! # Thread Safety
//!
//! Backends are immutable once constructed and require `Send + Sync`; the parsers built
//! on top of them keep their own cursors.

pub mod io;
pub mod parser;

mod memory;
mod physical;

pub use memory::Memory;
pub use physical::Physical;

use crate::Result;

/// Backend trait for file data sources.
///
/// This trait abstracts over the source of PE data, allowing for both in-memory and on-disk
/// representations. All implementations must be thread-safe.
///
/// The trait provides a common interface for accessing PE file data regardless of whether
/// it's loaded from a file on disk or from a memory buffer. This enables flexible handling
/// of different data sources while maintaining performance.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// This method provides bounds-checked access to the underlying data.
    /// It's used internally by [`crate::pe::PeImage`] to safely read portions
    /// of the PE file data.
    ///
    /// # Arguments
    ///
    /// * `offset` - The starting offset within the data.
    /// * `len` - The length of the slice in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    ///
    /// This provides access to the complete PE file data as a single slice.
    /// For file-based backends, this typically maps the entire file into memory.
    /// For memory-based backends, this returns the underlying buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    ///
    /// This is equivalent to `self.data().len()` but may be more efficient
    /// for some backend implementations.
    fn len(&self) -> usize;
}
