//! # pescope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the pescope library. Import this module to get quick access to the essential
//! types for PE metadata extraction.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all pescope operations
pub use crate::Error;

/// The result type used throughout pescope
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Main entry point for PE image analysis
pub use crate::PeImage;

/// Low-level binary parsing utility
pub use crate::Parser;

/// Byte source abstraction and its built-in backends
pub use crate::file::{Backend, Memory, Physical};

// ================================================================================================
// Header Types
// ================================================================================================

/// Decoded PE header with COFF fields, optional header, and sections
pub use crate::pe::{Characteristics, DirectoryKind, Machine, OptionalHeader, PeHeader, Section};

// ================================================================================================
// Resource Types
// ================================================================================================

/// Resource identity and the parsed/flattened resource structures
pub use crate::pe::{
    CpInfo, NameInfo, ResourceDirectory, ResourceId, ResourceNode, ResourceTable, TypeInfo,
};

/// Well-known resource type ids
pub use crate::pe::{RT_GROUP_ICON, RT_ICON, RT_VERSION};

// ================================================================================================
// Icon and Version Types
// ================================================================================================

/// Icon group decoding results
pub use crate::pe::{GroupIcon, IconShape};

/// Decoded version information
pub use crate::pe::{FileFlags, FileVersionInfo, VersionInfoStatus, VersionQuad};
