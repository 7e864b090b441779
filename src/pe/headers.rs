//! PE/COFF header and section table parsing.
//!
//! This module decodes the headers a PE image starts with: the legacy MS-DOS stub
//! signature, the PE signature it points at, the COFF file header, the PE32/PE32+
//! optional header with its data-directory array, and the section table.
//!
//! # Architecture
//!
//! Parsing is a single forward walk over the raw bytes with a [`crate::file::parser::Parser`]
//! cursor. Header absence and header corruption are kept strictly apart:
//!
//! - A file without the `MZ` or `PE\0\0` signatures is simply not a PE image — the
//!   parse yields `None` and no error is raised.
//! - A file that passes the signature checks but violates the format afterwards (for
//!   example an unknown optional-header magic) is corrupt — the parse raises
//!   [`crate::Error::Malformed`].
//!
//! # Key Components
//!
//! - [`crate::pe::headers::PeHeader`] - Decoded COFF header, optional header and sections
//! - [`crate::pe::headers::OptionalHeader`] - PE32/PE32+ fields and the 17-slot directory array
//! - [`crate::pe::headers::DirectoryKind`] - Data-directory index enumeration
//! - [`crate::pe::headers::Section`] - One 40-byte section table record
//! - [`crate::pe::headers::Machine`] - Known machine-type codes
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use pescope::{PeImage, pe::DirectoryKind};
//! use std::path::Path;
//!
//! let image = PeImage::from_file(Path::new("application.exe"))?;
//! if let Some(header) = image.header()? {
//!     println!("machine: 0x{:04X}", header.machine);
//!     println!("sections: {}", header.sections.len());
//!     println!("has resources: {}", header.has_table(DirectoryKind::Resource));
//! }
//! # Ok::<(), pescope::Error>(())
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bitflags::bitflags;
use strum::{EnumCount, EnumIter, FromRepr};

use crate::{file::parser::Parser, Result};

/// The `MZ` signature every DOS-compatible executable starts with.
pub const DOS_SIGNATURE: u16 = 0x5A4D;
/// The `PE\0\0` signature located at the offset stored at `0x3C`.
pub const PE_SIGNATURE: u32 = 0x0000_4550;
/// Optional-header magic for 32-bit images.
pub const OPTIONAL_MAGIC_PE32: u16 = 0x10B;
/// Optional-header magic for 64-bit images.
pub const OPTIONAL_MAGIC_PE32_PLUS: u16 = 0x20B;

/// File offset of the 32-bit pointer to the PE signature.
const PE_POINTER_OFFSET: usize = 0x3C;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// COFF file-header characteristics flags
    pub struct Characteristics: u16 {
        /// Relocation information was stripped from the file
        const RELOCS_STRIPPED = 0x0001;
        /// The file is executable (no unresolved external references)
        const EXECUTABLE_IMAGE = 0x0002;
        /// COFF line numbers were stripped
        const LINE_NUMS_STRIPPED = 0x0004;
        /// COFF local symbols were stripped
        const LOCAL_SYMS_STRIPPED = 0x0008;
        /// Aggressively trim the working set (obsolete)
        const AGGRESSIVE_WS_TRIM = 0x0010;
        /// The image can handle addresses beyond 2 GB
        const LARGE_ADDRESS_AWARE = 0x0020;
        /// Little-endian byte order (obsolete)
        const BYTES_REVERSED_LO = 0x0080;
        /// The target machine is 32-bit
        const MACHINE_32BIT = 0x0100;
        /// Debugging information was stripped
        const DEBUG_STRIPPED = 0x0200;
        /// Copy to swap when run from removable media
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;
        /// Copy to swap when run from the network
        const NET_RUN_FROM_SWAP = 0x0800;
        /// System file, not a user program
        const SYSTEM = 0x1000;
        /// The image is a dynamic-link library
        const DLL = 0x2000;
        /// Run only on a uniprocessor machine
        const UP_SYSTEM_ONLY = 0x4000;
        /// Big-endian byte order (obsolete)
        const BYTES_REVERSED_HI = 0x8000;
    }
}

/// Known machine-type codes from the COFF file header.
///
/// The raw code is kept on [`PeHeader::machine`]; this enumeration covers the
/// codes current toolchains emit. Unlisted codes simply resolve to `None` via
/// [`PeHeader::machine_kind`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumIter, FromRepr)]
#[repr(u16)]
pub enum Machine {
    /// Applicable to any machine type
    Unknown = 0x0,
    /// Intel 386 or later
    I386 = 0x14C,
    /// ARM little endian
    Arm = 0x1C0,
    /// ARM Thumb-2 little endian
    ArmNt = 0x1C4,
    /// Intel Itanium
    Ia64 = 0x200,
    /// x64
    Amd64 = 0x8664,
    /// ARM64 little endian
    Arm64 = 0xAA64,
}

/// Index enumeration for the 17-slot data-directory array.
///
/// The discriminants are the directory indices defined by the PE format; the
/// array in [`OptionalHeader::data_directories`] is indexed by them directly.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumCount, EnumIter, FromRepr)]
#[repr(usize)]
pub enum DirectoryKind {
    /// Export table
    Export = 0,
    /// Import table
    Import = 1,
    /// Resource table
    Resource = 2,
    /// Exception table
    Exception = 3,
    /// Certificate table
    Certificate = 4,
    /// Base relocation table
    BaseRelocation = 5,
    /// Debug data
    Debug = 6,
    /// Architecture-specific data (reserved)
    Architecture = 7,
    /// Reserved
    Reserved1 = 8,
    /// Global pointer register value
    GlobalPointer = 9,
    /// Thread local storage table
    Tls = 10,
    /// Load configuration table
    LoadConfig = 11,
    /// Bound import table
    BoundImport = 12,
    /// Import address table
    Iat = 13,
    /// Delay import descriptor
    DelayImport = 14,
    /// CLR runtime header
    ClrRuntimeHeader = 15,
    /// Reserved
    Reserved2 = 16,
}

/// One (address, size) pair from the optional header's directory array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    /// Relative virtual address of the table
    pub address: u32,
    /// Size of the table in bytes
    pub size: u32,
}

/// Which of the two optional-header layouts the image uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalKind {
    /// 32-bit layout (magic `0x10B`)
    Pe32,
    /// 64-bit layout (magic `0x20B`)
    Pe32Plus,
}

/// The decoded PE32/PE32+ optional header.
///
/// Only the fields this crate consumes are retained; the Windows-specific data
/// region between `base_of_code` and `NumberOfRvaAndSizes` is skipped during
/// parsing.
#[derive(Debug, Clone)]
pub struct OptionalHeader {
    /// PE32 or PE32+
    pub kind: OptionalKind,
    /// Linker version as (major, minor)
    pub linker_version: (u8, u8),
    /// Entry-point RVA; a stored value of 0 means the image has no entry point
    pub entry_point: Option<u32>,
    /// RVA of the beginning of the code section
    pub base_of_code: u32,
    /// The data-directory array, indexed by [`DirectoryKind`].
    ///
    /// Slots beyond the image's declared `NumberOfRvaAndSizes` stay zeroed.
    pub data_directories: [DataDirectory; DirectoryKind::COUNT],
}

impl OptionalHeader {
    /// Returns the directory pair for the given kind.
    #[must_use]
    pub fn directory(&self, kind: DirectoryKind) -> &DataDirectory {
        &self.data_directories[kind as usize]
    }

    /// Reports whether the directory of the given kind has a non-zero address.
    #[must_use]
    pub fn has_table(&self, kind: DirectoryKind) -> bool {
        self.directory(kind).address != 0
    }
}

/// One record from the section table.
///
/// Only the fields needed for file-offset resolution are retained; the section's
/// virtual addresses, relocation pointers and characteristics are skipped.
#[derive(Debug, Clone)]
pub struct Section {
    /// Section name, NUL-truncated from the 8 raw bytes
    pub name: String,
    /// Size of the section's data on disk
    pub size_of_raw_data: u32,
    /// File offset of the section's data
    pub pointer_to_raw_data: u32,
}

/// The decoded PE header: COFF fields, optional header, and the section table.
///
/// Produced by [`crate::pe::PeImage::header`]. A `None` result from that accessor
/// means the input is not a PE image at all (missing `MZ` or `PE\0\0` signature);
/// a present `PeHeader` means the signatures checked out.
#[derive(Debug, Clone)]
pub struct PeHeader {
    /// Machine-type code from the COFF header
    pub machine: u16,
    /// Image creation time, seconds since the Unix epoch (UTC)
    pub timestamp: u32,
    /// COFF characteristics flags
    pub characteristics: Characteristics,
    /// The optional header, absent when the COFF header declares size 0
    pub optional_header: Option<OptionalHeader>,
    /// The section table, in file order
    pub sections: Vec<Section>,
}

impl PeHeader {
    /// The machine-type code resolved to a known [`Machine`], if it is one.
    #[must_use]
    pub fn machine_kind(&self) -> Option<Machine> {
        Machine::from_repr(self.machine)
    }

    /// The creation timestamp as a [`SystemTime`].
    #[must_use]
    pub fn timestamp_systemtime(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(u64::from(self.timestamp))
    }

    /// Whether the image is a DLL.
    #[must_use]
    pub fn is_dll(&self) -> bool {
        self.characteristics.contains(Characteristics::DLL)
    }

    /// Reports whether the data directory of the given kind has a non-zero address.
    ///
    /// Returns `false` when the image has no optional header.
    #[must_use]
    pub fn has_table(&self, kind: DirectoryKind) -> bool {
        self.optional_header
            .as_ref()
            .is_some_and(|opt| opt.has_table(kind))
    }

    /// Returns the section named `.rsrc`, if present.
    ///
    /// Its `pointer_to_raw_data` is the base file offset of the resource
    /// directory tree.
    #[must_use]
    pub fn rsrc_section(&self) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == ".rsrc")
    }
}

/// Parses the PE header chain from raw image bytes.
///
/// Returns `Ok(None)` when the `MZ` or `PE\0\0` signature is missing — many valid
/// files are simply not PE images. Once both signatures check out, any further
/// violation of the format is a hard [`crate::Error::Malformed`].
pub(crate) fn parse(data: &[u8]) -> Result<Option<PeHeader>> {
    let mut parser = Parser::new(data);

    let Ok(dos_magic) = parser.read_le::<u16>() else {
        return Ok(None);
    };
    if dos_magic != DOS_SIGNATURE {
        return Ok(None);
    }

    if parser.seek(PE_POINTER_OFFSET).is_err() {
        return Ok(None);
    }
    let Ok(pe_offset) = parser.read_le::<u32>() else {
        return Ok(None);
    };

    if parser.seek(pe_offset as usize).is_err() {
        return Ok(None);
    }
    let Ok(signature) = parser.read_le::<u32>() else {
        return Ok(None);
    };
    if signature != PE_SIGNATURE {
        return Ok(None);
    }

    let machine = parser.read_le::<u16>()?;
    let number_of_sections = parser.read_le::<u16>()?;
    let timestamp = parser.read_le::<u32>()?;
    // PointerToSymbolTable + NumberOfSymbols, deprecated for images
    parser.advance_by(8)?;
    let optional_header_size = parser.read_le::<u16>()?;
    let characteristics = Characteristics::from_bits_retain(parser.read_le::<u16>()?);

    let optional_header = if optional_header_size > 0 {
        Some(parse_optional_header(&mut parser)?)
    } else {
        None
    };

    let mut sections = Vec::with_capacity(number_of_sections as usize);
    for _ in 0..number_of_sections {
        sections.push(parse_section(&mut parser)?);
    }

    Ok(Some(PeHeader {
        machine,
        timestamp,
        characteristics,
        optional_header,
        sections,
    }))
}

fn parse_optional_header(parser: &mut Parser) -> Result<OptionalHeader> {
    let magic = parser.read_le::<u16>()?;
    let kind = match magic {
        OPTIONAL_MAGIC_PE32 => OptionalKind::Pe32,
        OPTIONAL_MAGIC_PE32_PLUS => OptionalKind::Pe32Plus,
        _ => {
            return Err(malformed_error!(
                "Invalid optional header magic - 0x{:X}",
                magic
            ))
        }
    };

    let linker_version = (parser.read_le::<u8>()?, parser.read_le::<u8>()?);
    // SizeOfCode + SizeOfInitializedData + SizeOfUninitializedData
    parser.advance_by(12)?;

    let entry_point = match parser.read_le::<u32>()? {
        0 => None,
        rva => Some(rva),
    };
    let base_of_code = parser.read_le::<u32>()?;

    // The Windows-specific region between here and NumberOfRvaAndSizes is fixed
    // size per layout: PE32 carries BaseOfData plus 64 further bytes, PE32+ goes
    // straight into 84 bytes of wider fields.
    match kind {
        OptionalKind::Pe32 => parser.advance_by(4 + 64)?,
        OptionalKind::Pe32Plus => parser.advance_by(84)?,
    }

    let number_of_rva_and_sizes = parser.read_le::<u32>()?;
    let present = (number_of_rva_and_sizes as usize).min(DirectoryKind::COUNT);

    let mut data_directories = [DataDirectory::default(); DirectoryKind::COUNT];
    for slot in data_directories.iter_mut().take(present) {
        slot.address = parser.read_le::<u32>()?;
        slot.size = parser.read_le::<u32>()?;
    }

    Ok(OptionalHeader {
        kind,
        linker_version,
        entry_point,
        base_of_code,
        data_directories,
    })
}

fn parse_section(parser: &mut Parser) -> Result<Section> {
    let raw_name = parser.read_bytes(8)?;
    let end = raw_name.iter().position(|&b| b == 0).unwrap_or(8);
    let name = String::from_utf8_lossy(&raw_name[..end]).into_owned();

    // VirtualSize + VirtualAddress
    parser.advance_by(8)?;
    let size_of_raw_data = parser.read_le::<u32>()?;
    let pointer_to_raw_data = parser.read_le::<u32>()?;
    // relocation/line-number pointers and counts, characteristics
    parser.advance_by(16)?;

    Ok(Section {
        name,
        size_of_raw_data,
        pointer_to_raw_data,
    })
}
