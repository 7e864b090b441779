//! Icon reconstruction from group-icon and icon resources.
//!
//! PE images do not embed `.ico` files. The pieces of an icon are spread over two
//! resource types: a group-icon directory (`RT_GROUP_ICON`) listing the available
//! shapes (size and color-depth variants), and one standalone icon resource
//! (`RT_ICON`) per shape holding the raw pixel data — a classic DIB or, for large
//! modern icons, a complete PNG. This module stitches those pieces back into
//! standalone, loadable ICO container bytes.
//!
//! # Architecture
//!
//! - **Group enumeration** decodes a `GRPICONDIR` and resolves every listed shape to
//!   the resource entry holding its pixel data. A group entry referencing an icon id
//!   with no matching resource is corrupt input and fails hard.
//! - **Synthesis** emits the 6-byte `ICONDIR` header, one 16-byte `ICONDIRENTRY` per
//!   image, and the unmodified payload bytes. Single-image synthesis sniffs the
//!   payload (DIB header or PNG signature) for the entry's dimensions; multi-image
//!   synthesis uses the shapes the group declared.
//! - **Convenience policies** ([`crate::pe::PeImage::default_icon`] and
//!   [`crate::pe::PeImage::icon_at`]) catch all failures and yield no icon instead —
//!   extracting a decorative icon must never abort an analysis.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use pescope::PeImage;
//! use std::path::Path;
//!
//! let image = PeImage::from_file(Path::new("application.exe"))?;
//! if let Some(ico) = image.default_icon() {
//!     std::fs::write("application.ico", ico)?;
//! }
//! # Ok::<(), pescope::Error>(())
//! ```

use crate::{
    file::{parser::Parser, Backend},
    pe::resources::{CpInfo, NameInfo, ResourceId, ResourceTable, RT_GROUP_ICON, RT_ICON},
    Result,
};

use crate::file::io::write_le_at;

/// The PNG file signature.
const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
/// `BITMAPINFOHEADER` structure size, used as the DIB sniffing magic.
const DIB_HEADER_SIZE: u32 = 0x28;
/// Size of the `ICONDIR` header.
const ICONDIR_SIZE: usize = 6;
/// Size of one `ICONDIRENTRY`.
const ICONDIRENTRY_SIZE: usize = 16;

/// One image "shape" inside an icon group: its dimensions and color depth.
///
/// A raw value of 0 in the group entry's width/height byte denotes 256.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IconShape {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Bits per pixel
    pub bpp: u16,
}

/// A decoded group-icon directory: each listed shape resolved to the resource
/// entry supplying its pixel data.
///
/// Shapes keep the group's declaration order; when the group declares the same
/// shape twice, the first occurrence wins.
#[derive(Debug, Clone)]
pub struct GroupIcon {
    /// (shape, pixel-data location) pairs in declaration order
    pub shapes: Vec<(IconShape, CpInfo)>,
}

/// Decodes a group-icon resource and resolves its entries against the table.
///
/// The group's first code-page variant supplies the `GRPICONDIR` bytes: reserved
/// (must be 0), type (must be 1), count, then `count` 14-byte entries. A zero
/// `bit_count` field falls back to the color count (2 → 1 bpp, 16 → 4 bpp; anything
/// else is corrupt). Every entry's icon id must resolve to a standalone `RT_ICON`
/// resource.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for header mismatches, unresolvable icon
/// ids, or unrecognized bpp/color-count combinations.
pub(crate) fn parse_group(
    table: &ResourceTable,
    backend: &dyn Backend,
    group: &NameInfo,
) -> Result<GroupIcon> {
    let Some(cp) = group.first_code_page() else {
        return Err(malformed_error!("Group icon resource has no data variant"));
    };

    let bytes = backend.data_slice(cp.offset as usize, cp.size as usize)?;
    let mut parser = Parser::new(bytes);

    let reserved = parser.read_le::<u16>()?;
    if reserved != 0 {
        return Err(malformed_error!(
            "Group icon reserved field is not zero - {}",
            reserved
        ));
    }
    let kind = parser.read_le::<u16>()?;
    if kind != 1 {
        return Err(malformed_error!("Group icon type is not 1 - {}", kind));
    }
    let count = parser.read_le::<u16>()?;

    let mut shapes: Vec<(IconShape, CpInfo)> = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let width = parser.read_le::<u8>()?;
        let height = parser.read_le::<u8>()?;
        let color_count = parser.read_le::<u8>()?;
        // reserved
        parser.advance_by(1)?;
        // planes
        parser.advance_by(2)?;
        let bit_count = parser.read_le::<u16>()?;
        // the size the group claims for the image; the icon resource itself is authoritative
        parser.advance_by(4)?;
        let icon_id = parser.read_le::<u16>()?;

        let bpp = if bit_count != 0 {
            bit_count
        } else {
            match color_count {
                2 => 1,
                16 => 4,
                other => {
                    return Err(malformed_error!(
                        "Cannot infer icon bit depth from color count - {}",
                        other
                    ))
                }
            }
        };

        let shape = IconShape {
            width: if width == 0 { 256 } else { u32::from(width) },
            height: if height == 0 { 256 } else { u32::from(height) },
            bpp,
        };

        let icon = table
            .numeric_type(RT_ICON)
            .and_then(|icons| icons.find_name(&ResourceId::Numeric(i64::from(icon_id))))
            .and_then(NameInfo::first_code_page);
        let Some(icon) = icon else {
            return Err(malformed_error!(
                "Group icon references missing icon resource - {}",
                icon_id
            ));
        };

        if !shapes.iter().any(|(existing, _)| *existing == shape) {
            shapes.push((shape, icon.clone()));
        }
    }

    Ok(GroupIcon { shapes })
}

/// Dimensions sniffed from a raw icon payload.
struct PayloadInfo {
    width: u32,
    height: u32,
    planes: u16,
    bpp: u16,
}

/// Sniffs a raw icon payload for its dimensions.
///
/// A payload starting with a `u32` of `0x28` is a classic DIB: width and doubled
/// height (the DIB covers image plus transparency mask) follow, then planes and
/// bpp. A payload starting with the PNG signature carries its dimensions in the
/// `IHDR` chunk, whose tag is matched with the case bit of the third byte masked.
/// Anything else is not icon pixel data.
fn sniff_payload(payload: &[u8]) -> Result<PayloadInfo> {
    let mut parser = Parser::new(payload);

    if parser.remaining() >= 4 {
        let first = parser.read_le::<u32>()?;
        if first == DIB_HEADER_SIZE {
            let width = parser.read_le::<u32>()?;
            let height = parser.read_le::<u32>()? / 2;
            let planes = parser.read_le::<u16>()?;
            let bpp = parser.read_le::<u16>()?;
            return Ok(PayloadInfo {
                width,
                height,
                planes,
                bpp,
            });
        }
    }

    if payload.len() >= 8 && payload[..8] == PNG_SIGNATURE {
        let mut parser = Parser::new(payload);
        // signature + chunk length
        parser.advance_by(12)?;
        let tag = parser.read_bytes(4)?;
        if tag[0] == b'I' && tag[1] == b'H' && (tag[2] & 0xDF) == b'D' && tag[3] == b'R' {
            let width = parser.read_be::<u32>()?;
            let height = parser.read_be::<u32>()?;
            let bit_depth = parser.read_le::<u8>()?;
            return Ok(PayloadInfo {
                width,
                height,
                planes: 1,
                bpp: u16::from(bit_depth),
            });
        }
        return Err(malformed_error!("PNG icon payload does not start with IHDR"));
    }

    Err(malformed_error!("Unrecognized icon payload signature"))
}

/// Synthesizes a single-image ICO container from one raw icon payload.
///
/// The payload is embedded unmodified after a 6-byte `ICONDIR` header and one
/// 16-byte `ICONDIRENTRY` whose dimensions come from sniffing the payload; the
/// payload offset is therefore always 22.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] when the payload is neither a DIB nor a PNG.
pub fn synthesize_single(payload: &[u8]) -> Result<Vec<u8>> {
    let info = sniff_payload(payload)?;

    let mut out = vec![0u8; ICONDIR_SIZE + ICONDIRENTRY_SIZE];
    let mut pos = 0;
    write_le_at(&mut out, &mut pos, 0u16)?;
    write_le_at(&mut out, &mut pos, 1u16)?;
    write_le_at(&mut out, &mut pos, 1u16)?;

    write_le_at(&mut out, &mut pos, info.width as u8)?;
    write_le_at(&mut out, &mut pos, info.height as u8)?;
    write_le_at(&mut out, &mut pos, 0u8)?;
    write_le_at(&mut out, &mut pos, 0u8)?;
    write_le_at(&mut out, &mut pos, info.planes)?;
    write_le_at(&mut out, &mut pos, info.bpp)?;
    write_le_at(&mut out, &mut pos, payload.len() as u32)?;
    write_le_at(&mut out, &mut pos, (ICONDIR_SIZE + ICONDIRENTRY_SIZE) as u32)?;

    out.extend_from_slice(payload);
    Ok(out)
}

/// Synthesizes a multi-image ICO container from a decoded group.
///
/// Emits one directory entry per shape in map order, with payload offsets computed
/// cumulatively starting right after the directory, followed by the concatenated
/// payloads.
///
/// # Errors
/// Returns an error when a payload cannot be read from the byte source.
pub(crate) fn synthesize_multi(group: &GroupIcon, backend: &dyn Backend) -> Result<Vec<u8>> {
    let count = group.shapes.len();

    let mut payloads = Vec::with_capacity(count);
    for (_, cp) in &group.shapes {
        payloads.push(backend.data_slice(cp.offset as usize, cp.size as usize)?);
    }

    let directory_size = ICONDIR_SIZE + ICONDIRENTRY_SIZE * count;
    let mut out = vec![0u8; directory_size];
    let mut pos = 0;
    write_le_at(&mut out, &mut pos, 0u16)?;
    write_le_at(&mut out, &mut pos, 1u16)?;
    write_le_at(&mut out, &mut pos, count as u16)?;

    let mut payload_offset = directory_size as u32;
    for ((shape, _), payload) in group.shapes.iter().zip(&payloads) {
        write_le_at(&mut out, &mut pos, shape.width as u8)?;
        write_le_at(&mut out, &mut pos, shape.height as u8)?;
        write_le_at(&mut out, &mut pos, 0u8)?;
        write_le_at(&mut out, &mut pos, 0u8)?;
        write_le_at(&mut out, &mut pos, 1u16)?;
        write_le_at(&mut out, &mut pos, shape.bpp)?;
        write_le_at(&mut out, &mut pos, payload.len() as u32)?;
        write_le_at(&mut out, &mut pos, payload_offset)?;
        payload_offset += payload.len() as u32;
    }

    for payload in payloads {
        out.extend_from_slice(payload);
    }

    Ok(out)
}

/// The default-icon policy: first icon group, falling back to the first
/// standalone icon, never raising.
pub(crate) fn default_icon(table: &ResourceTable, backend: &dyn Backend) -> Option<Vec<u8>> {
    if let Some(groups) = table.numeric_type(RT_GROUP_ICON) {
        for group in &groups.names {
            if let Ok(parsed) = parse_group(table, backend, group) {
                if let Ok(ico) = synthesize_multi(&parsed, backend) {
                    return Some(ico);
                }
            }
            break;
        }
    }

    let icons = table.numeric_type(RT_ICON)?;
    let cp = icons.names.first().and_then(NameInfo::first_code_page)?;
    let payload = backend.data_slice(cp.offset as usize, cp.size as usize).ok()?;
    synthesize_single(payload).ok()
}

/// Size-targeted extraction: picks the shape whose width is numerically closest
/// to the 16 px (small) or 32 px (large) target from the 1-based group `index`,
/// and synthesizes a single-image container for it.
///
/// Out-of-range indices and all decode failures yield `None`.
pub(crate) fn icon_at(
    table: &ResourceTable,
    backend: &dyn Backend,
    index: usize,
    large: bool,
) -> Option<Vec<u8>> {
    let groups = table.numeric_type(RT_GROUP_ICON)?;
    if index == 0 || index > groups.names.len() {
        return None;
    }

    let group = parse_group(table, backend, &groups.names[index - 1]).ok()?;
    let target: u32 = if large { 32 } else { 16 };

    // strictly-less comparison so the first minimal match wins on ties
    let mut best: Option<&CpInfo> = None;
    let mut best_delta = u32::MAX;
    for (shape, cp) in &group.shapes {
        let delta = shape.width.abs_diff(target);
        if delta < best_delta {
            best = Some(cp);
            best_delta = delta;
        }
    }
    let cp = best?;

    let payload = backend.data_slice(cp.offset as usize, cp.size as usize).ok()?;
    synthesize_single(payload).ok()
}
