//! Resource directory tree parsing and the flattened resource table.
//!
//! This module decodes the nested resource directory structure rooted in a PE image's
//! `.rsrc` section into a navigable tree of typed/named nodes and leaf data locations,
//! and flattens that tree into the conventional three-level (type → name → code-page
//! variant) table used for lookups.
//!
//! # Architecture
//!
//! The on-disk format is a tree of directories, each holding entries keyed by either a
//! numeric id or a UTF-16 name. Entries either descend into a child directory or point
//! at a data-entry record describing a leaf's virtual address, size and code page.
//!
//! Directory traversal uses an explicit worklist instead of recursing per nesting level:
//! a crafted image controls the nesting depth, so descent is bounded by
//! [`MAX_RESOURCE_DEPTH`] and reports [`crate::Error::RecursionLimit`] when exceeded
//! rather than exhausting the call stack.
//!
//! Leaf virtual addresses are translated to file offsets as
//! `rsrc_file_offset + (virtual_address - resource_directory_rva)`. This assumes the
//! resource section's RVA space begins exactly at the resource data directory's declared
//! address, which holds for conventional linker output; see
//! [`ResourceDirectory::parse`]. A leaf whose `offset + size` exceeds the byte source's
//! length fails the parse with [`crate::Error::Malformed`] — the directory itself is
//! declaring data the file cannot contain.
//!
//! # Key Components
//!
//! - [`ResourceId`] - Entry identity: absent, numeric, or case-insensitive name
//! - [`ResourceDirectory`] / [`ResourceEntry`] / [`ResourceNode`] - The parsed tree
//! - [`ResourceTable`] / [`TypeInfo`] / [`NameInfo`] / [`CpInfo`] - The flattened view
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use pescope::PeImage;
//! use std::path::Path;
//!
//! let image = PeImage::from_file(Path::new("shell32.dll"))?;
//! if let Some(table) = image.resource_table()? {
//!     for type_info in &table.types {
//!         println!("resource type {}: {} entries", type_info.id, type_info.names.len());
//!     }
//!     if let Some(icons) = table.numeric_type(pescope::pe::RT_GROUP_ICON) {
//!         println!("{} icon groups", icons.names.len());
//!     }
//! }
//! # Ok::<(), pescope::Error>(())
//! ```

use std::cmp::Ordering;
use std::fmt;

use crate::{file::parser::Parser, Result};

/// Resource type id of standalone icon images (`RT_ICON`).
pub const RT_ICON: i64 = 3;
/// Resource type id of group-icon directories (`RT_GROUP_ICON`).
pub const RT_GROUP_ICON: i64 = 14;
/// Resource type id of version-information blocks (`RT_VERSION`).
pub const RT_VERSION: i64 = 16;

/// Maximum directory nesting the tree parser will follow.
///
/// Conventional images nest exactly three levels (type, name, language); the limit
/// only exists to bound traversal of hostile input.
pub const MAX_RESOURCE_DEPTH: usize = 32;

/// High bit marking an entry field as an offset rather than an immediate value.
const SUBDIR_FLAG: u32 = 0x8000_0000;

/// Identity of a resource directory entry.
///
/// Each level of the resource tree keys its entries by either a numeric id or a
/// UTF-16 name; `Absent` is the distinguished identity of the (unkeyed) root and of
/// levels a query leaves unspecified.
///
/// Named identities compare case-insensitively, for both equality and ordering.
/// The variants order as `Absent < Named < Numeric`.
#[derive(Debug, Clone)]
pub enum ResourceId {
    /// No identity
    Absent,
    /// Case-insensitive name
    Named(String),
    /// Numeric id
    Numeric(i64),
}

impl ResourceId {
    fn rank(&self) -> u8 {
        match self {
            ResourceId::Absent => 0,
            ResourceId::Named(_) => 1,
            ResourceId::Numeric(_) => 2,
        }
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ResourceId::Absent, ResourceId::Absent) => true,
            (ResourceId::Named(a), ResourceId::Named(b)) => {
                a.to_lowercase() == b.to_lowercase()
            }
            (ResourceId::Numeric(a), ResourceId::Numeric(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ResourceId {}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ResourceId::Named(a), ResourceId::Named(b)) => {
                a.to_lowercase().cmp(&b.to_lowercase())
            }
            (ResourceId::Numeric(a), ResourceId::Numeric(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceId::Absent => write!(f, "<absent>"),
            ResourceId::Named(name) => write!(f, "{}", name),
            ResourceId::Numeric(id) => write!(f, "#{}", id),
        }
    }
}

/// One parsed directory level of the resource tree.
#[derive(Debug, Clone)]
pub struct ResourceDirectory {
    /// The directory's entries, in on-disk order
    pub entries: Vec<ResourceEntry>,
}

/// One keyed entry of a [`ResourceDirectory`].
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    /// The entry's identity at this level
    pub id: ResourceId,
    /// Child directory or leaf data location
    pub node: ResourceNode,
}

/// A resource tree node: an internal directory or a leaf data location.
#[derive(Debug, Clone)]
pub enum ResourceNode {
    /// Internal node with its own keyed entries
    Directory(ResourceDirectory),
    /// Leaf describing where the resource's bytes live in the file
    Data(ResourceData),
}

/// Location of a leaf's raw bytes inside the byte source.
///
/// The offset is absolute within the file; `offset + size` was validated against the
/// source's length when the tree was parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceData {
    /// Absolute file offset of the resource bytes
    pub offset: u64,
    /// Declared size in bytes
    pub size: u32,
    /// Code page declared by the data entry
    pub code_page: u32,
}

impl ResourceDirectory {
    /// Parses the resource tree rooted at `dir_offset` relative to the `.rsrc`
    /// section's file data.
    ///
    /// # Arguments
    /// * `data` - The complete image bytes
    /// * `rsrc_file_offset` - The `.rsrc` section's pointer-to-raw-data
    /// * `directory_rva` - The resource data directory's declared address
    ///
    /// Leaf virtual addresses translate to file offsets as
    /// `rsrc_file_offset + (virtual_address - directory_rva)`; the translation
    /// assumes the resource RVA space starts at `directory_rva`, which is how
    /// conventional linkers lay the section out but is not cross-checked against
    /// the section's own virtual-address field.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for structurally invalid directories or
    /// leaves whose declared bytes fall outside the source, and
    /// [`crate::Error::RecursionLimit`] when nesting exceeds [`MAX_RESOURCE_DEPTH`].
    pub fn parse(data: &[u8], rsrc_file_offset: u32, directory_rva: u32) -> Result<Self> {
        let base = rsrc_file_offset as usize;

        let mut stack = vec![Frame {
            slot_id: ResourceId::Absent,
            raw_entries: read_directory_entries(data, base, 0)?,
            next: 0,
            built: Vec::new(),
        }];

        loop {
            let frame = stack
                .last_mut()
                .ok_or_else(|| malformed_error!("Resource worklist underflow"))?;

            if frame.next < frame.raw_entries.len() {
                let (id, target) = frame.raw_entries[frame.next].clone();
                frame.next += 1;

                if target & SUBDIR_FLAG != 0 {
                    if stack.len() >= MAX_RESOURCE_DEPTH {
                        return Err(crate::Error::RecursionLimit(MAX_RESOURCE_DEPTH));
                    }

                    let child = read_directory_entries(data, base, target & !SUBDIR_FLAG)?;
                    stack.push(Frame {
                        slot_id: id,
                        raw_entries: child,
                        next: 0,
                        built: Vec::new(),
                    });
                } else {
                    let leaf =
                        read_data_entry(data, base, target, rsrc_file_offset, directory_rva)?;
                    frame.built.push(ResourceEntry {
                        id,
                        node: ResourceNode::Data(leaf),
                    });
                }
            } else {
                let done = match stack.pop() {
                    Some(frame) => frame,
                    None => return Err(malformed_error!("Resource worklist underflow")),
                };
                let directory = ResourceDirectory {
                    entries: done.built,
                };

                match stack.last_mut() {
                    Some(parent) => parent.built.push(ResourceEntry {
                        id: done.slot_id,
                        node: ResourceNode::Directory(directory),
                    }),
                    None => return Ok(directory),
                }
            }
        }
    }
}

/// One pending directory on the traversal worklist.
struct Frame {
    /// Identity under which the finished directory joins its parent
    slot_id: ResourceId,
    /// This directory's raw entries: (identity, raw offsetToData field)
    raw_entries: Vec<(ResourceId, u32)>,
    /// Index of the next raw entry to process
    next: usize,
    /// Entries finished so far
    built: Vec<ResourceEntry>,
}

/// Reads a directory header and its entry identities at `dir_offset` relative to the
/// tree base.
fn read_directory_entries(
    data: &[u8],
    base: usize,
    dir_offset: u32,
) -> Result<Vec<(ResourceId, u32)>> {
    let mut parser = Parser::new(data);
    parser.seek(base + dir_offset as usize)?;

    // characteristics, timestamp, major/minor version
    parser.advance_by(12)?;
    let named_count = parser.read_le::<u16>()?;
    let id_count = parser.read_le::<u16>()?;
    let total = named_count as usize + id_count as usize;

    let mut raw = Vec::with_capacity(total);
    for _ in 0..total {
        let name = parser.read_le::<u32>()?;
        let offset_to_data = parser.read_le::<u32>()?;
        raw.push((name, offset_to_data));
    }

    let mut entries = Vec::with_capacity(total);
    for (name, offset_to_data) in raw {
        let id = if name & SUBDIR_FLAG != 0 {
            let mut name_parser = Parser::new(data);
            name_parser.seek(base + (name & !SUBDIR_FLAG) as usize)?;
            ResourceId::Named(name_parser.read_prefixed_string_utf16()?)
        } else {
            ResourceId::Numeric(i64::from(name))
        };
        entries.push((id, offset_to_data));
    }

    Ok(entries)
}

/// Reads a data-entry record and resolves its absolute file offset.
fn read_data_entry(
    data: &[u8],
    base: usize,
    entry_offset: u32,
    rsrc_file_offset: u32,
    directory_rva: u32,
) -> Result<ResourceData> {
    let mut parser = Parser::new(data);
    parser.seek(base + entry_offset as usize)?;

    let virtual_address = parser.read_le::<u32>()?;
    let size = parser.read_le::<u32>()?;
    let code_page = parser.read_le::<u32>()?;
    // reserved
    parser.advance_by(4)?;

    let file_offset =
        i64::from(rsrc_file_offset) + (i64::from(virtual_address) - i64::from(directory_rva));
    if file_offset < 0 {
        return Err(malformed_error!(
            "Resource data entry resolves before file start - va 0x{:X}, directory rva 0x{:X}",
            virtual_address,
            directory_rva
        ));
    }

    let file_offset = file_offset as u64;
    if file_offset + u64::from(size) > data.len() as u64 {
        return Err(malformed_error!(
            "Resource data entry exceeds file - offset 0x{:X}, size 0x{:X}, file length 0x{:X}",
            file_offset,
            size,
            data.len()
        ));
    }

    Ok(ResourceData {
        offset: file_offset,
        size,
        code_page,
    })
}

/// Flattened three-level view over a parsed resource tree.
///
/// Built by walking the tree exactly once; repeated queries never re-parse. The
/// raw bytes of a leaf are read on demand through
/// [`crate::pe::PeImage::resource_bytes`], deliberately uncached — resource
/// payloads may be large and are accessed selectively.
#[derive(Debug, Clone)]
pub struct ResourceTable {
    /// First-level (resource type) entries
    pub types: Vec<TypeInfo>,
}

/// First level of the flattened table: one resource type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// The type's identity
    pub id: ResourceId,
    /// Second-level entries under this type
    pub names: Vec<NameInfo>,
}

/// Second level of the flattened table: one named/numbered resource.
#[derive(Debug, Clone)]
pub struct NameInfo {
    /// The resource's identity
    pub id: ResourceId,
    /// Third-level entries: one per code-page/language variant
    pub code_pages: Vec<CpInfo>,
}

/// Third level of the flattened table: one concrete resource variant.
#[derive(Debug, Clone)]
pub struct CpInfo {
    /// The variant's identity (conventionally the language id)
    pub id: ResourceId,
    /// Code page declared by the data entry
    pub code_page: u32,
    /// Absolute file offset of the resource bytes
    pub offset: u64,
    /// Declared size in bytes
    pub size: u32,
    /// Set when flatten-time re-validation of `offset`/`size` failed
    pub diagnostic: Option<String>,
}

impl ResourceTable {
    /// Builds the flattened table from a parsed tree.
    ///
    /// `source_len` is the byte source's total length; each leaf's location is
    /// re-checked against it and a failing leaf carries a diagnostic instead of
    /// being dropped. Tree construction already validated the same bound, so a
    /// populated diagnostic indicates the table was built against a different
    /// source than the tree.
    #[must_use]
    pub fn from_tree(tree: &ResourceDirectory, source_len: u64) -> Self {
        let mut types = Vec::with_capacity(tree.entries.len());

        for type_entry in &tree.entries {
            let mut names = Vec::new();

            match &type_entry.node {
                ResourceNode::Directory(name_dir) => {
                    for name_entry in &name_dir.entries {
                        let mut code_pages = Vec::new();

                        match &name_entry.node {
                            ResourceNode::Directory(cp_dir) => {
                                for cp_entry in &cp_dir.entries {
                                    if let ResourceNode::Data(data) = &cp_entry.node {
                                        code_pages.push(Self::cp_info(
                                            cp_entry.id.clone(),
                                            data,
                                            source_len,
                                        ));
                                    }
                                }
                            }
                            // Data directly at the name level, without a
                            // language directory under it.
                            ResourceNode::Data(data) => {
                                code_pages.push(Self::cp_info(
                                    ResourceId::Absent,
                                    data,
                                    source_len,
                                ));
                            }
                        }

                        names.push(NameInfo {
                            id: name_entry.id.clone(),
                            code_pages,
                        });
                    }
                }
                ResourceNode::Data(data) => {
                    names.push(NameInfo {
                        id: ResourceId::Absent,
                        code_pages: vec![Self::cp_info(ResourceId::Absent, data, source_len)],
                    });
                }
            }

            types.push(TypeInfo {
                id: type_entry.id.clone(),
                names,
            });
        }

        ResourceTable { types }
    }

    fn cp_info(id: ResourceId, data: &ResourceData, source_len: u64) -> CpInfo {
        let diagnostic = match data.offset.checked_add(u64::from(data.size)) {
            Some(end) if end <= source_len => None,
            _ => Some(format!(
                "resource bytes at 0x{:X}+0x{:X} exceed source length 0x{:X}",
                data.offset, data.size, source_len
            )),
        };

        CpInfo {
            id,
            code_page: data.code_page,
            offset: data.offset,
            size: data.size,
            diagnostic,
        }
    }

    /// Finds the first-level entry with the given identity.
    #[must_use]
    pub fn find_type(&self, id: &ResourceId) -> Option<&TypeInfo> {
        self.types.iter().find(|t| &t.id == id)
    }

    /// Finds the first-level entry with the given numeric id.
    #[must_use]
    pub fn numeric_type(&self, id: i64) -> Option<&TypeInfo> {
        self.find_type(&ResourceId::Numeric(id))
    }
}

impl TypeInfo {
    /// Finds the second-level entry with the given identity.
    #[must_use]
    pub fn find_name(&self, id: &ResourceId) -> Option<&NameInfo> {
        self.names.iter().find(|n| &n.id == id)
    }
}

impl NameInfo {
    /// The first code-page variant, if any.
    #[must_use]
    pub fn first_code_page(&self) -> Option<&CpInfo> {
        self.code_pages.first()
    }

    /// Finds the code-page variant with the given identity.
    #[must_use]
    pub fn find_code_page(&self, id: &ResourceId) -> Option<&CpInfo> {
        self.code_pages.iter().find(|cp| &cp.id == id)
    }
}
