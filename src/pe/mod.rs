//! PE structural-metadata extraction.
//!
//! This module contains the domain layer of the crate: everything that turns the raw
//! bytes of a Windows PE image (EXE/DLL) into structured metadata, without involving
//! the operating system's module loader.
//!
//! # Architecture
//!
//! The components build on each other in a strict order, leaves first:
//!
//! 1. **Headers** ([`headers`]) - the MZ/PE signature walk, COFF file header,
//!    PE32/PE32+ optional header with its data directories, and the section table.
//! 2. **Resource tree** ([`resources`]) - the nested directory structure rooted in
//!    the `.rsrc` section, decoded with a bounded worklist.
//! 3. **Resource table** ([`resources`]) - the flattened three-level
//!    (type → name → code-page) view used for lookups.
//! 4. **Icon reconstruction** ([`icon`]) - standalone ICO container synthesis from
//!    group-icon and icon resources.
//! 5. **Version information** ([`version`]) - the `VS_VERSIONINFO` block decoded
//!    inside a recovery boundary.
//!
//! [`PeImage`] ties the layers together: it owns the byte source and derives each
//! artifact lazily, memoizing successes for its lifetime.
//!
//! # Error Philosophy
//!
//! Absence and corruption are distinct throughout:
//!
//! - Not being a PE image, having no `.rsrc` section, or having no version
//!   resource are ordinary, non-error outcomes (`None` / `Absent`).
//! - Violating the format after claiming to follow it is corruption and fails
//!   hard ([`crate::Error::Malformed`]).
//! - Decorative artifacts (version info, the icon conveniences) degrade
//!   best-effort instead of failing.

pub mod headers;
pub mod icon;
pub mod image;
pub mod resources;
pub mod version;

pub use headers::{
    Characteristics, DataDirectory, DirectoryKind, Machine, OptionalHeader, OptionalKind,
    PeHeader, Section,
};
pub use icon::{GroupIcon, IconShape};
pub use image::PeImage;
pub use resources::{
    CpInfo, NameInfo, ResourceData, ResourceDirectory, ResourceEntry, ResourceId, ResourceNode,
    ResourceTable, TypeInfo, MAX_RESOURCE_DEPTH, RT_GROUP_ICON, RT_ICON, RT_VERSION,
};
pub use version::{FileFlags, FileVersionInfo, VersionInfoStatus, VersionQuad};
