//! The `PeImage` entry object: lazy, memoized access to all derived artifacts.
//!
//! [`PeImage`] owns one byte source and derives everything else from it on demand:
//! the PE header chain, the resource directory tree, the flattened resource table,
//! icon reconstructions, and version information. Each derived artifact is computed
//! at most once and cached for the image's lifetime; none is mutated after
//! construction.
//!
//! # Architecture
//!
//! The image wraps a [`crate::file::Backend`] and a set of `OnceLock` memoization
//! cells. Successful parses are cached; a failed parse propagates its error to the
//! caller without being cached, and a later call re-attempts it — the input is
//! immutable, so the outcome is deterministic either way.
//!
//! Ownership of the byte source follows Rust move semantics. Constructed from a
//! path, the image exclusively owns the mapping and releases it exactly once on
//! drop. A caller-supplied backend is moved in through
//! [`PeImage::from_backend`], making the transfer explicit in the signature.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use pescope::PeImage;
//! use std::path::Path;
//!
//! let image = PeImage::from_file(Path::new("application.exe"))?;
//!
//! if let Some(header) = image.header()? {
//!     println!("{} sections", header.sections.len());
//! }
//!
//! let info = image.version_info()?;
//! if let Some(product) = info.product_name() {
//!     println!("product: {}", product);
//! }
//!
//! if let Some(ico) = image.default_icon() {
//!     std::fs::write("application.ico", ico)?;
//! }
//! # Ok::<(), pescope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! All parsing is synchronous and CPU/I-O bound over the one byte source. The
//! memoization cells make concurrent reads of already-derived artifacts safe, but
//! the core promises no internal parallelism.

use std::path::Path;
use std::sync::OnceLock;

use crate::{
    file::{Backend, Memory, Physical},
    pe::{
        headers::{self, DirectoryKind, PeHeader},
        icon::{self, GroupIcon},
        resources::{CpInfo, NameInfo, ResourceDirectory, ResourceTable, RT_GROUP_ICON, RT_VERSION},
        version::FileVersionInfo,
    },
    Error::Empty,
    Result,
};

/// A PE image opened for structural-metadata extraction.
///
/// This is the crate's main entry point. See the [module documentation](self) for
/// the lifecycle and ownership contract.
pub struct PeImage {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
    header: OnceLock<Option<PeHeader>>,
    resource_tree: OnceLock<Option<ResourceDirectory>>,
    resource_table: OnceLock<Option<ResourceTable>>,
    version_info: OnceLock<FileVersionInfo>,
}

impl PeImage {
    /// Opens a PE image from the given path.
    ///
    /// The file is memory-mapped read-only with shared read access; the image
    /// exclusively owns the mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped, or is empty.
    /// A file that is not a PE image opens fine — its [`PeImage::header`] is
    /// simply `None`.
    pub fn from_file(file: &Path) -> Result<PeImage> {
        let input = Physical::new(file)?;

        Self::load(Box::new(input))
    }

    /// Opens a PE image over a memory buffer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Empty`] when the buffer is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<PeImage> {
        let input = Memory::new(data);

        Self::load(Box::new(input))
    }

    /// Opens a PE image over a caller-supplied backend.
    ///
    /// The backend is moved into the image; it is released together with the
    /// image, exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Empty`] when the backend holds no data.
    pub fn from_backend(data: Box<dyn Backend>) -> Result<PeImage> {
        Self::load(data)
    }

    fn load(data: Box<dyn Backend>) -> Result<PeImage> {
        if data.len() == 0 {
            return Err(Empty);
        }

        Ok(PeImage {
            data,
            header: OnceLock::new(),
            resource_tree: OnceLock::new(),
            resource_table: OnceLock::new(),
            version_info: OnceLock::new(),
        })
    }

    /// Returns the total size of the byte source in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the byte source holds no data.
    ///
    /// Construction rejects empty input, so this is `false` for any live image.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Returns the complete raw bytes of the image.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns a bounds-checked slice of the image's bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the requested range exceeds the
    /// byte source.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }

    /// The parsed PE header, or `None` when the input is not a PE image.
    ///
    /// Parsed on first access and memoized.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] when the signatures check out but the
    /// header structures behind them are corrupt.
    pub fn header(&self) -> Result<Option<&PeHeader>> {
        if let Some(cached) = self.header.get() {
            return Ok(cached.as_ref());
        }

        let parsed = headers::parse(self.data.data())?;
        Ok(self.header.get_or_init(|| parsed).as_ref())
    }

    /// The parsed resource directory tree, or `None` when the image has no
    /// `.rsrc` section (or is not a PE image at all).
    ///
    /// Parsed on first access and memoized.
    ///
    /// # Errors
    /// Propagates header errors, and returns [`crate::Error::Malformed`] or
    /// [`crate::Error::RecursionLimit`] for corrupt or hostile trees.
    pub fn resource_tree(&self) -> Result<Option<&ResourceDirectory>> {
        if let Some(cached) = self.resource_tree.get() {
            return Ok(cached.as_ref());
        }

        let tree = match self.header()? {
            Some(header) => match header.rsrc_section() {
                Some(section) => {
                    let directory_rva = header
                        .optional_header
                        .as_ref()
                        .map_or(0, |opt| opt.directory(DirectoryKind::Resource).address);

                    Some(ResourceDirectory::parse(
                        self.data.data(),
                        section.pointer_to_raw_data,
                        directory_rva,
                    )?)
                }
                None => None,
            },
            None => None,
        };

        Ok(self.resource_tree.get_or_init(|| tree).as_ref())
    }

    /// The flattened (type → name → code-page) resource table, or `None` when the
    /// image has no resource tree.
    ///
    /// Built from the tree in one walk on first access and memoized; repeated
    /// queries never re-parse.
    ///
    /// # Errors
    /// Propagates resource-tree errors.
    pub fn resource_table(&self) -> Result<Option<&ResourceTable>> {
        if let Some(cached) = self.resource_table.get() {
            return Ok(cached.as_ref());
        }

        let source_len = self.data.len() as u64;
        let table = self
            .resource_tree()?
            .map(|tree| ResourceTable::from_tree(tree, source_len));

        Ok(self.resource_table.get_or_init(|| table).as_ref())
    }

    /// Reads the raw bytes of one resource table entry.
    ///
    /// Deliberately uncached: resource payloads may be large and are accessed
    /// selectively. Reads exactly `entry.size` bytes at `entry.offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the entry's location exceeds the
    /// byte source.
    pub fn resource_bytes(&self, entry: &CpInfo) -> Result<Vec<u8>> {
        Ok(self
            .data
            .data_slice(entry.offset as usize, entry.size as usize)?
            .to_vec())
    }

    /// The decoded version information.
    ///
    /// A missing version resource yields a result whose status is
    /// [`crate::pe::VersionInfoStatus::Absent`]; a structurally damaged version
    /// resource degrades to a partial result. Neither raises — version metadata
    /// is decorative. Decoded on first access and memoized.
    ///
    /// # Errors
    /// Propagates resource-table errors; the version decode itself never fails.
    pub fn version_info(&self) -> Result<&FileVersionInfo> {
        if let Some(cached) = self.version_info.get() {
            return Ok(cached);
        }

        let bytes = match self.resource_table()? {
            Some(table) => table
                .numeric_type(RT_VERSION)
                .and_then(|versions| versions.names.first())
                .and_then(NameInfo::first_code_page)
                .map(|cp| self.data.data_slice(cp.offset as usize, cp.size as usize))
                .transpose()?,
            None => None,
        };

        let info = FileVersionInfo::from_resource(bytes);
        Ok(self.version_info.get_or_init(|| info))
    }

    /// All icon groups of the image, each with its shapes resolved to pixel data.
    ///
    /// An image without icon resources yields an empty list.
    ///
    /// # Errors
    /// Propagates resource-table errors and the hard structural errors of group
    /// enumeration (header mismatches, dangling icon ids).
    pub fn group_icons(&self) -> Result<Vec<GroupIcon>> {
        let Some(table) = self.resource_table()? else {
            return Ok(Vec::new());
        };

        let Some(groups) = table.numeric_type(RT_GROUP_ICON) else {
            return Ok(Vec::new());
        };

        let mut result = Vec::with_capacity(groups.names.len());
        for group in &groups.names {
            result.push(icon::parse_group(table, self.data.as_ref(), group)?);
        }
        Ok(result)
    }

    /// The image's default icon as standalone ICO container bytes.
    ///
    /// Prefers the first icon group; on any failure falls back to single-image
    /// synthesis from the first standalone icon resource; yields `None` when
    /// neither works out. This convenience never reports an error.
    #[must_use]
    pub fn default_icon(&self) -> Option<Vec<u8>> {
        let table = self.resource_table().ok().flatten()?;
        icon::default_icon(table, self.data.as_ref())
    }

    /// Size-targeted icon extraction as standalone ICO container bytes.
    ///
    /// Selects from the 1-based group `index` the shape whose width is closest to
    /// the 16 px (small) or 32 px (large) target and synthesizes a single-image
    /// container for it. Out-of-range indices and all failures yield `None`; this
    /// convenience never reports an error.
    #[must_use]
    pub fn icon_at(&self, index: usize, large: bool) -> Option<Vec<u8>> {
        let table = self.resource_table().ok().flatten()?;
        icon::icon_at(table, self.data.as_ref(), index, large)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pe::resources::ResourceId;
    use crate::pe::version::VersionInfoStatus;
    use crate::test::{
        dib_payload, group_icon_bytes, GroupEntry, PeBuilder, Res, RsrcId, VersionBuilder,
    };

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(PeImage::from_mem(vec![]), Err(Empty)));
    }

    #[test]
    fn non_pe_input_has_absent_artifacts() {
        let image = PeImage::from_mem(b"not an executable at all".to_vec()).unwrap();

        assert!(image.header().unwrap().is_none());
        assert!(image.resource_tree().unwrap().is_none());
        assert!(image.resource_table().unwrap().is_none());
        assert_eq!(
            image.version_info().unwrap().status,
            VersionInfoStatus::Absent
        );
        assert!(image.default_icon().is_none());
        assert!(image.group_icons().unwrap().is_empty());
    }

    #[test]
    fn header_is_memoized() {
        let image =
            PeImage::from_mem(PeBuilder::pe32().section(".text", 0x1000, 0x10, 0x400).build())
                .unwrap();

        let first = image.header().unwrap().unwrap() as *const PeHeader;
        let second = image.header().unwrap().unwrap() as *const PeHeader;
        assert_eq!(first, second);
    }

    #[test]
    fn resource_chain_end_to_end() {
        let tree = Res::dir(vec![(
            RsrcId::Id(10),
            Res::dir(vec![(
                RsrcId::Name("DATA".into()),
                Res::dir(vec![(
                    RsrcId::Id(1033),
                    Res::data(vec![0x11, 0x22, 0x33, 0x44], 1252),
                )]),
            )]),
        )]);
        let image = PeImage::from_mem(PeBuilder::pe32().rsrc(&tree).build()).unwrap();

        let table = image.resource_table().unwrap().unwrap();
        let cp = table
            .numeric_type(10)
            .unwrap()
            .find_name(&ResourceId::Named("data".to_string()))
            .unwrap()
            .first_code_page()
            .unwrap();

        assert_eq!(cp.size, 4);
        assert!(cp.diagnostic.is_none());
        assert_eq!(image.resource_bytes(cp).unwrap(), vec![0x11, 0x22, 0x33, 0x44]);

        // memoized table: same allocation on repeat access
        let again = image.resource_table().unwrap().unwrap() as *const ResourceTable;
        assert_eq!(again, table as *const ResourceTable);
    }

    #[test]
    fn missing_rsrc_section_is_soft_absent() {
        let image =
            PeImage::from_mem(PeBuilder::pe32().section(".text", 0x1000, 0x10, 0x400).build())
                .unwrap();

        assert!(image.header().unwrap().is_some());
        assert!(image.resource_tree().unwrap().is_none());
    }

    #[test]
    fn version_info_through_image() {
        let version = VersionBuilder::new()
            .file_version(2, 4, 100, 0)
            .string("ProductName", "Sample")
            .build();
        let tree = Res::dir(vec![(
            RsrcId::Id(RT_VERSION as u32),
            Res::dir(vec![(
                RsrcId::Id(1),
                Res::dir(vec![(RsrcId::Id(1033), Res::data(version, 1252))]),
            )]),
        )]);
        let image = PeImage::from_mem(PeBuilder::pe32().rsrc(&tree).build()).unwrap();

        let info = image.version_info().unwrap();
        assert_eq!(info.status, VersionInfoStatus::Parsed);
        assert_eq!(info.file_version.major, 2);
        assert_eq!(info.product_name(), Some("Sample"));

        // memoized
        let again = image.version_info().unwrap() as *const FileVersionInfo;
        assert_eq!(again, info as *const FileVersionInfo);
    }

    #[test]
    fn icons_through_image() {
        let group = group_icon_bytes(&[GroupEntry {
            width: 16,
            height: 16,
            color_count: 0,
            bit_count: 8,
            icon_id: 1,
        }]);
        let payload = dib_payload(16, 32, 1, 8, 24);
        let tree = Res::dir(vec![
            (
                RsrcId::Id(3),
                Res::dir(vec![(
                    RsrcId::Id(1),
                    Res::dir(vec![(RsrcId::Id(1033), Res::data(payload.clone(), 0))]),
                )]),
            ),
            (
                RsrcId::Id(RT_GROUP_ICON as u32),
                Res::dir(vec![(
                    RsrcId::Id(1),
                    Res::dir(vec![(RsrcId::Id(1033), Res::data(group, 0))]),
                )]),
            ),
        ]);
        let image = PeImage::from_mem(PeBuilder::pe32().rsrc(&tree).build()).unwrap();

        let groups = image.group_icons().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].shapes[0].0.width, 16);

        let ico = image.default_icon().unwrap();
        assert_eq!(&ico[..6], &[0, 0, 1, 0, 1, 0]);

        let single = image.icon_at(1, false).unwrap();
        assert_eq!(&single[22..], &payload[..]);
        assert!(image.icon_at(2, false).is_none());
    }

    #[test]
    fn corrupt_resource_leaf_raises_from_tree() {
        let tree = Res::dir(vec![(
            RsrcId::Id(10),
            Res::dir(vec![(
                RsrcId::Id(1),
                Res::dir(vec![(RsrcId::Id(0), Res::data_at(0x00FF_0000, 0x100, 0))]),
            )]),
        )]);
        let image = PeImage::from_mem(PeBuilder::pe32().rsrc(&tree).build()).unwrap();

        assert!(matches!(
            image.resource_tree(),
            Err(crate::Error::Malformed { .. })
        ));
        // conveniences swallow the same failure
        assert!(image.default_icon().is_none());
    }
}
