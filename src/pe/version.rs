//! Version-information resource decoding.
//!
//! A PE image's version metadata lives in an `RT_VERSION` resource holding a
//! `VS_VERSIONINFO` block: a fixed-size `VS_FIXEDFILEINFO` record with numeric
//! version quads and file flags, followed by nested `StringFileInfo` /
//! `VarFileInfo` child blocks carrying a string dictionary keyed by well-known
//! names.
//!
//! # Architecture
//!
//! Version metadata is decorative — it must never abort an extraction. The entire
//! decode therefore runs inside one recovery boundary: any structural violation
//! stops the parse and is reported through [`VersionInfoStatus`] instead of an
//! error. The three outcomes are kept apart:
//!
//! - [`VersionInfoStatus::Absent`] - the image has no version resource at all
//! - [`VersionInfoStatus::Parsed`] - the block decoded to its natural end
//! - [`VersionInfoStatus::Partial`] - a violation aborted the decode; whatever was
//!   extracted up to that point is retained, and the diagnostic names the cause
//!
//! Every block boundary inside the format re-aligns to 4 bytes. A position with
//! remainder 2 must be followed by one zero padding word; any other misalignment
//! is itself a structural violation.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use pescope::PeImage;
//! use std::path::Path;
//!
//! let image = PeImage::from_file(Path::new("application.exe"))?;
//! let info = image.version_info()?;
//! if !info.is_empty() {
//!     let fv = &info.file_version;
//!     println!("file version {}.{}.{}.{}", fv.major, fv.minor, fv.build, fv.private);
//!     if let Some(description) = info.file_description() {
//!         println!("description: {}", description);
//!     }
//! }
//! # Ok::<(), pescope::Error>(())
//! ```

use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::{file::parser::Parser, Result};

/// `VS_FIXEDFILEINFO` signature.
const FIXEDFILEINFO_SIGNATURE: u32 = 0xFEEF_04BD;
/// Root key every version block starts with.
const ROOT_KEY: &str = "VS_VERSION_INFO";

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// File flags from `VS_FIXEDFILEINFO`, after masking with the flag mask.
    ///
    /// Bit `0x10` (`VS_FF_INFOINFERRED`) is deliberately not represented here;
    /// it describes the metadata block itself rather than the file.
    pub struct FileFlags: u32 {
        /// The file contains debugging information
        const DEBUG = 0x1;
        /// The file is a development (pre-release) version
        const PRERELEASE = 0x2;
        /// The file has been patched relative to its released form
        const PATCHED = 0x4;
        /// The file was built privately, not by standard release procedure
        const PRIVATE_BUILD = 0x8;
        /// The file is a variation of the standard build
        const SPECIAL_BUILD = 0x20;
    }
}

/// A four-component version number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionQuad {
    /// Major component
    pub major: u16,
    /// Minor component
    pub minor: u16,
    /// Build component
    pub build: u16,
    /// Private component
    pub private: u16,
}

/// Outcome of decoding the version resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionInfoStatus {
    /// The image carries no version resource
    Absent,
    /// The block decoded completely
    Parsed,
    /// A structural violation aborted the decode; the diagnostic names it
    Partial(String),
}

/// Decoded version metadata of a PE image.
///
/// Produced by [`crate::pe::PeImage::version_info`]. Fields keep whatever the
/// decode extracted before its outcome in [`FileVersionInfo::status`] was
/// reached; check [`FileVersionInfo::is_empty`] before trusting them.
#[derive(Debug, Clone)]
pub struct FileVersionInfo {
    /// How far the decode got
    pub status: VersionInfoStatus,
    /// File version from `VS_FIXEDFILEINFO`
    pub file_version: VersionQuad,
    /// Product version from `VS_FIXEDFILEINFO`
    pub product_version: VersionQuad,
    /// 8-character language/code-page string from `StringFileInfo`
    pub lang_codepage: String,
    flags: FileFlags,
    strings: BTreeMap<String, String>,
}

impl Default for FileVersionInfo {
    fn default() -> Self {
        FileVersionInfo {
            status: VersionInfoStatus::Absent,
            file_version: VersionQuad::default(),
            product_version: VersionQuad::default(),
            lang_codepage: String::new(),
            flags: FileFlags::empty(),
            strings: BTreeMap::new(),
        }
    }
}

impl FileVersionInfo {
    /// Decodes a version resource's raw bytes.
    ///
    /// `None` input yields an [`VersionInfoStatus::Absent`] result; a present blob
    /// is decoded inside the recovery boundary described in the module docs. This
    /// function never fails.
    #[must_use]
    pub fn from_resource(bytes: Option<&[u8]>) -> FileVersionInfo {
        let mut info = FileVersionInfo::default();

        let Some(bytes) = bytes else {
            return info;
        };

        match decode(bytes, &mut info) {
            Ok(()) => info.status = VersionInfoStatus::Parsed,
            Err(error) => info.status = VersionInfoStatus::Partial(error.to_string()),
        }

        info
    }

    /// `true` unless the entire block parsed without structural violation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status != VersionInfoStatus::Parsed
    }

    /// The masked file flags.
    #[must_use]
    pub fn flags(&self) -> FileFlags {
        self.flags
    }

    /// Whether the file carries debugging information.
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.flags.contains(FileFlags::DEBUG)
    }

    /// Whether the file is a pre-release build.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.flags.contains(FileFlags::PRERELEASE)
    }

    /// Whether the file has been patched.
    #[must_use]
    pub fn is_patched(&self) -> bool {
        self.flags.contains(FileFlags::PATCHED)
    }

    /// Whether the file is a private build.
    #[must_use]
    pub fn is_private_build(&self) -> bool {
        self.flags.contains(FileFlags::PRIVATE_BUILD)
    }

    /// Whether the file is a special build.
    #[must_use]
    pub fn is_special_build(&self) -> bool {
        self.flags.contains(FileFlags::SPECIAL_BUILD)
    }

    /// The language id resolved from the first four hex digits of
    /// [`FileVersionInfo::lang_codepage`], or `None` when that fails in any way.
    #[must_use]
    pub fn language_id(&self) -> Option<u16> {
        self.lang_codepage
            .get(..4)
            .and_then(|hex| u16::from_str_radix(hex, 16).ok())
    }

    /// The decoded string dictionary.
    #[must_use]
    pub fn strings(&self) -> &BTreeMap<String, String> {
        &self.strings
    }

    /// Looks up one entry of the string dictionary.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.strings.get(key).map(String::as_str)
    }

    /// The `CompanyName` entry.
    #[must_use]
    pub fn company_name(&self) -> Option<&str> {
        self.value("CompanyName")
    }

    /// The `FileDescription` entry.
    #[must_use]
    pub fn file_description(&self) -> Option<&str> {
        self.value("FileDescription")
    }

    /// The `FileVersion` entry.
    #[must_use]
    pub fn file_version_string(&self) -> Option<&str> {
        self.value("FileVersion")
    }

    /// The `InternalName` entry.
    #[must_use]
    pub fn internal_name(&self) -> Option<&str> {
        self.value("InternalName")
    }

    /// The `LegalCopyright` entry.
    #[must_use]
    pub fn legal_copyright(&self) -> Option<&str> {
        self.value("LegalCopyright")
    }

    /// The `LegalTrademarks` entry.
    #[must_use]
    pub fn legal_trademarks(&self) -> Option<&str> {
        self.value("LegalTrademarks")
    }

    /// The `OriginalFilename` entry.
    #[must_use]
    pub fn original_filename(&self) -> Option<&str> {
        self.value("OriginalFilename")
    }

    /// The `PrivateBuild` entry.
    #[must_use]
    pub fn private_build(&self) -> Option<&str> {
        self.value("PrivateBuild")
    }

    /// The `ProductName` entry.
    #[must_use]
    pub fn product_name(&self) -> Option<&str> {
        self.value("ProductName")
    }

    /// The `ProductVersion` entry.
    #[must_use]
    pub fn product_version_string(&self) -> Option<&str> {
        self.value("ProductVersion")
    }

    /// The `SpecialBuild` entry.
    #[must_use]
    pub fn special_build(&self) -> Option<&str> {
        self.value("SpecialBuild")
    }

    /// The `Comments` entry.
    #[must_use]
    pub fn comments(&self) -> Option<&str> {
        self.value("Comments")
    }
}

/// Re-aligns the cursor to a 4-byte boundary.
///
/// A remainder of 2 requires one zero padding word; any other misalignment means
/// the surrounding structure is corrupt, since every field in the format is
/// 16-bit granular.
fn realign(parser: &mut Parser) -> Result<()> {
    match parser.pos() % 4 {
        0 => Ok(()),
        2 => {
            let padding = parser.read_le::<u16>()?;
            if padding != 0 {
                return Err(malformed_error!(
                    "Version info padding word is not zero - 0x{:X}",
                    padding
                ));
            }
            Ok(())
        }
        other => Err(malformed_error!(
            "Version info misaligned - position remainder {}",
            other
        )),
    }
}

/// Decodes the `VS_VERSIONINFO` block into `info`.
///
/// Any returned error is caught by [`FileVersionInfo::from_resource`] and turned
/// into a [`VersionInfoStatus::Partial`] outcome.
fn decode(bytes: &[u8], info: &mut FileVersionInfo) -> Result<()> {
    let mut parser = Parser::new(bytes);

    let top_length = parser.read_le::<u16>()? as usize;
    let fixed_length = parser.read_le::<u16>()?;
    // type
    parser.advance_by(2)?;

    let root_key = parser.read_prefixed_string_utf16()?;
    if root_key != ROOT_KEY {
        return Err(malformed_error!(
            "Version info root key mismatch - '{}'",
            root_key
        ));
    }
    realign(&mut parser)?;

    if fixed_length > 0 {
        decode_fixed_info(&mut parser, fixed_length, info)?;
        realign(&mut parser)?;
    }

    while parser.pos() < top_length {
        let child_length = parser.read_le::<u16>()?;
        if child_length == 0 {
            break;
        }
        // unused at this level, then type
        parser.advance_by(4)?;

        let key = parser.read_prefixed_string_utf16()?;
        if key.is_empty() {
            break;
        }
        realign(&mut parser)?;

        let block_start = parser.pos();
        let block_length = parser.read_le::<u16>()? as usize;
        if block_length < 4 {
            break;
        }
        let block_end = block_start + block_length;

        let zero = parser.read_le::<u16>()?;
        if zero != 0 {
            return Err(malformed_error!(
                "Version info child block field is not zero - 0x{:X}",
                zero
            ));
        }
        // type
        parser.advance_by(2)?;
        realign(&mut parser)?;

        if key == "StringFileInfo" {
            decode_string_table(&mut parser, block_end, info)?;
        } else {
            // VarFileInfo and anything unrecognized carry nothing this crate
            // surfaces; jump over the block.
            parser.seek(block_end)?;
            realign(&mut parser)?;
        }
    }

    Ok(())
}

/// Decodes `VS_FIXEDFILEINFO`.
///
/// A signature mismatch stops this section without failing the whole decode;
/// the remainder of the record is skipped so child parsing can continue.
fn decode_fixed_info(
    parser: &mut Parser,
    fixed_length: u16,
    info: &mut FileVersionInfo,
) -> Result<()> {
    let signature = parser.read_le::<u32>()?;
    if signature != FIXEDFILEINFO_SIGNATURE {
        parser.advance_by((fixed_length as usize).saturating_sub(4))?;
        return Ok(());
    }

    // struct version
    parser.advance_by(4)?;

    info.file_version = read_version_quad(parser)?;
    info.product_version = read_version_quad(parser)?;

    let mask = parser.read_le::<u32>()?;
    let flags = parser.read_le::<u32>()?;
    info.flags = FileFlags::from_bits_truncate(mask & flags);

    // OS, type, sub-type, and the two date words
    parser.advance_by(5 * 4)?;

    Ok(())
}

/// Reads one packed version pair: the first word holds (minor | major << 16),
/// the second (private | build << 16).
fn read_version_quad(parser: &mut Parser) -> Result<VersionQuad> {
    let ms = parser.read_le::<u32>()?;
    let ls = parser.read_le::<u32>()?;

    Ok(VersionQuad {
        major: (ms >> 16) as u16,
        minor: (ms & 0xFFFF) as u16,
        build: (ls >> 16) as u16,
        private: (ls & 0xFFFF) as u16,
    })
}

/// Decodes the string table of a `StringFileInfo` block up to `block_end`.
fn decode_string_table(
    parser: &mut Parser,
    block_end: usize,
    info: &mut FileVersionInfo,
) -> Result<()> {
    let lang = parser.read_prefixed_string_utf16()?;
    if lang.chars().count() != 8 {
        return Err(malformed_error!(
            "Language/code-page string is not 8 characters - '{}'",
            lang
        ));
    }
    info.lang_codepage = lang;
    realign(parser)?;

    while parser.pos() < block_end {
        // entry length, advance-only
        parser.advance_by(2)?;
        let value_length = parser.read_le::<u16>()?;
        // type
        parser.advance_by(2)?;

        let key = parser.read_prefixed_string_utf16()?;
        realign(parser)?;

        let value = if value_length > 0 {
            let value = parser.read_prefixed_string_utf16()?;
            realign(parser)?;
            value
        } else {
            String::new()
        };

        info.strings.entry(key).or_insert(value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::VersionBuilder;

    #[test]
    fn absent_resource() {
        let info = FileVersionInfo::from_resource(None);
        assert_eq!(info.status, VersionInfoStatus::Absent);
        assert!(info.is_empty());
        assert!(info.strings().is_empty());
    }

    #[test]
    fn full_decode() {
        let blob = VersionBuilder::new()
            .file_version(3, 1, 400, 2)
            .product_version(3, 1, 0, 0)
            .flags(0x3F, FileFlags::DEBUG.bits() | FileFlags::PRERELEASE.bits())
            .string("CompanyName", "Contoso")
            .string("FileDescription", "Sample Tool")
            .string("Comments", "")
            .build();

        let info = FileVersionInfo::from_resource(Some(&blob));
        assert_eq!(info.status, VersionInfoStatus::Parsed);
        assert!(!info.is_empty());

        assert_eq!(
            info.file_version,
            VersionQuad {
                major: 3,
                minor: 1,
                build: 400,
                private: 2
            }
        );
        assert_eq!(info.product_version.major, 3);

        assert!(info.is_debug());
        assert!(info.is_prerelease());
        assert!(!info.is_patched());

        assert_eq!(info.lang_codepage, "040904E4");
        assert_eq!(info.language_id(), Some(0x0409));

        assert_eq!(info.company_name(), Some("Contoso"));
        assert_eq!(info.file_description(), Some("Sample Tool"));
        assert_eq!(info.comments(), Some(""));
        assert_eq!(info.product_name(), None);
    }

    #[test]
    fn flag_mask_is_applied() {
        let blob = VersionBuilder::new()
            .flags(0x1, FileFlags::DEBUG.bits() | FileFlags::PATCHED.bits())
            .build();

        let info = FileVersionInfo::from_resource(Some(&blob));
        assert!(info.is_debug());
        assert!(!info.is_patched());
    }

    #[test]
    fn info_inferred_bit_not_surfaced() {
        let blob = VersionBuilder::new().flags(0xFF, 0x10).build();

        let info = FileVersionInfo::from_resource(Some(&blob));
        assert_eq!(info.status, VersionInfoStatus::Parsed);
        assert_eq!(info.flags(), FileFlags::empty());
    }

    #[test]
    fn wrong_root_key_degrades() {
        let blob = VersionBuilder::new().root_key("VS_VERSION_INFX").build();

        let info = FileVersionInfo::from_resource(Some(&blob));
        assert!(matches!(info.status, VersionInfoStatus::Partial(_)));
        assert!(info.is_empty());
    }

    #[test]
    fn seven_char_language_string_degrades() {
        let blob = VersionBuilder::new()
            .lang("040904E")
            .string("CompanyName", "Contoso")
            .build();

        let info = FileVersionInfo::from_resource(Some(&blob));
        assert!(info.is_empty());
        assert!(info.strings().is_empty());
    }

    #[test]
    fn truncated_blob_degrades_without_raising() {
        let blob = VersionBuilder::new()
            .string("CompanyName", "Contoso")
            .build();

        for cut in [1usize, 8, 16, 40, blob.len() - 2] {
            let info = FileVersionInfo::from_resource(Some(&blob[..cut]));
            assert!(info.is_empty(), "cut at {} should not parse fully", cut);
        }
    }

    #[test]
    fn fixed_info_signature_mismatch_keeps_strings() {
        let blob = VersionBuilder::new()
            .fixed_signature(0xDEAD_BEEF)
            .file_version(9, 9, 9, 9)
            .string("CompanyName", "Contoso")
            .build();

        let info = FileVersionInfo::from_resource(Some(&blob));
        assert_eq!(info.status, VersionInfoStatus::Parsed);
        // fixed info was skipped, strings still decoded
        assert_eq!(info.file_version, VersionQuad::default());
        assert_eq!(info.company_name(), Some("Contoso"));
    }

    #[test]
    fn first_occurrence_wins() {
        let blob = VersionBuilder::new()
            .string("CompanyName", "First")
            .string("CompanyName", "Second")
            .build();

        let info = FileVersionInfo::from_resource(Some(&blob));
        assert_eq!(info.company_name(), Some("First"));
    }

    #[test]
    fn var_file_info_is_skipped() {
        let blob = VersionBuilder::new()
            .string("ProductName", "Sample")
            .var_file_info()
            .build();

        let info = FileVersionInfo::from_resource(Some(&blob));
        assert_eq!(info.status, VersionInfoStatus::Parsed);
        assert_eq!(info.product_name(), Some("Sample"));
    }

    #[test]
    fn language_id_defensive_resolution() {
        let mut info = FileVersionInfo::default();
        info.lang_codepage = "zzzz04E4".to_string();
        assert_eq!(info.language_id(), None);

        info.lang_codepage = "04".to_string();
        assert_eq!(info.language_id(), None);
    }
}
