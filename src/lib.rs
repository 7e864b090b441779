// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # pescope
//!
//! [![Crates.io](https://img.shields.io/crates/v/pescope.svg)](https://crates.io/crates/pescope)
//! [![Documentation](https://docs.rs/pescope/badge.svg)](https://docs.rs/pescope)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/pescope/blob/main/LICENSE-APACHE)
//!
//! A cross-platform library for extracting structural metadata from Windows Portable
//! Executable (PE) files — EXE and DLL — directly from raw bytes. `pescope` reads the
//! header chain, the section table, the embedded resource tree, reconstructs standalone
//! icon files, and decodes version information, all without involving the operating
//! system's module loader.
//!
//! ## Features
//!
//! - **📦 Efficient memory access** - Memory-mapped file access with bounds-checked parsing
//! - **🔍 Header analysis** - COFF header, PE32/PE32+ optional header, data directories, sections
//! - **🗂 Resource extraction** - The full `.rsrc` directory tree and a flattened lookup table
//! - **🖼 Icon reconstruction** - Loadable single- and multi-image ICO containers rebuilt
//!   from group-icon and icon resources, including PNG-compressed images
//! - **🏷 Version information** - `VS_VERSIONINFO` decoding with best-effort degradation
//! - **🔧 Cross-platform** - Works on Windows, Linux, macOS, and any Rust-supported platform
//! - **🛡️ Memory safe** - Built in Rust with comprehensive error handling
//!
//! ## Quick Start
//!
//! Add `pescope` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! pescope = "0.2"
//! ```
//!
//! ### Using the Prelude
//!
//! For convenient access to the most commonly used types, import the prelude:
//!
//! ```rust,no_run
//! use pescope::prelude::*;
//!
//! let image = PeImage::from_file("C:/Windows/System32/notepad.exe".as_ref())?;
//! if let Some(header) = image.header()? {
//!     println!("{} sections", header.sections.len());
//! }
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! ### Basic Usage
//!
//! ```rust,no_run
//! use pescope::PeImage;
//! use std::path::Path;
//!
//! let image = PeImage::from_file(Path::new("application.exe"))?;
//!
//! // Header metadata — a non-PE input simply yields None here
//! if let Some(header) = image.header()? {
//!     println!("machine: 0x{:04X}", header.machine);
//!     println!("dll: {}", header.is_dll());
//! }
//!
//! // Version information, decorative and never fatal
//! let info = image.version_info()?;
//! if let Some(product) = info.product_name() {
//!     println!("product: {}", product);
//! }
//!
//! // The application icon as a standalone .ico file
//! if let Some(ico) = image.default_icon() {
//!     std::fs::write("application.ico", ico)?;
//! }
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `pescope` is organized into two layers:
//!
//! - [`file`] - Byte-source abstraction ([`file::Backend`], memory-mapped and in-memory
//!   backends) and bounds-checked binary parsing primitives
//! - [`pe`] - The domain layer: headers, resource tree/table, icon reconstruction,
//!   version information, and the [`PeImage`] entry object
//!
//! Derived artifacts are computed lazily on first access and memoized for the image's
//! lifetime; raw resource payloads are read on demand and deliberately not cached.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Absence and corruption are kept
//! apart throughout: a file that is not a PE image, has no `.rsrc` section, or carries
//! no version resource is an ordinary outcome, not an error; a file that violates the
//! format it claims to follow fails with [`Error::Malformed`].
//!
//! ```rust,no_run
//! use pescope::{Error, PeImage};
//!
//! match PeImage::from_file(std::path::Path::new("application.exe")) {
//!     Ok(image) => println!("opened {} bytes", image.len()),
//!     Err(Error::FileError(e)) => println!("I/O error: {}", e),
//!     Err(Error::Malformed { message, .. }) => println!("malformed file: {}", message),
//!     Err(e) => println!("other error: {}", e),
//! }
//! ```
//!
//! ## Scope
//!
//! `pescope` never executes, relocates, or loads an image, does not validate digital
//! signatures, and does not write or mutate PE files. Parsing is synchronous and
//! single-threaded over one seekable byte source; callers needing concurrent access
//! open independent images.

#[macro_use]
pub(crate) mod error;

/// Byte source abstraction and binary parsing primitives.
///
/// Provides the [`file::Backend`] trait with memory-mapped ([`file::Physical`]) and
/// in-memory ([`file::Memory`]) implementations, plus the endian-aware I/O helpers
/// and the cursor [`Parser`] everything else is built on.
pub mod file;

/// PE structural-metadata extraction.
///
/// Headers, the resource directory tree and its flattened table, icon
/// reconstruction, version information, and the [`PeImage`] entry object.
pub mod pe;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use pescope::prelude::*;
///
/// let image = PeImage::from_file("application.exe".as_ref())?;
/// let info = image.version_info()?;
/// # Ok::<(), pescope::Error>(())
/// ```
pub mod prelude;

/// `pescope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always
/// [`Error`]. This is used consistently throughout the crate for all fallible
/// operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `pescope` Error type
///
/// The main error type for all operations in this crate. Provides detailed error
/// information for file access and PE structure parsing.
pub use error::Error;

/// Main entry point for working with PE images.
///
/// See [`pe::PeImage`] for the full API.
pub use pe::PeImage;

/// Cursor-based binary parser for PE structures.
///
/// See [`file::parser::Parser`].
pub use file::parser::Parser;
