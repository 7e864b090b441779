//! End-to-end extraction scenarios over synthetic PE images, exercising only the
//! public API.

use pescope::prelude::*;

/// Minimal builders for the synthetic images these tests run against. Entries are
/// numeric-id keyed throughout, which is all the scenarios need.
mod factory {
    fn w16(buf: &mut Vec<u8>, value: u16) {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    fn w32(buf: &mut Vec<u8>, value: u32) {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    fn wstr(buf: &mut Vec<u8>, s: &str) {
        let units: Vec<u16> = s.encode_utf16().collect();
        w16(buf, units.len() as u16);
        for unit in units {
            w16(buf, unit);
        }
    }

    fn pad4(buf: &mut Vec<u8>) {
        if buf.len() % 4 == 2 {
            w16(buf, 0);
        }
    }

    fn patch16(buf: &mut [u8], at: usize, value: u16) {
        buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// One resource: type id → resource id → language id → payload.
    pub struct Entry {
        pub type_id: u32,
        pub id: u32,
        pub lang: u32,
        pub bytes: Vec<u8>,
    }

    pub const RSRC_RVA: u32 = 0x3000;
    pub const RSRC_FILE_OFFSET: u32 = 0x400;

    /// Serializes a three-level, id-keyed resource tree.
    pub fn build_rsrc(entries: &[Entry]) -> Vec<u8> {
        // group by type, then by id, preserving declaration order
        let mut types: Vec<(u32, Vec<&Entry>)> = Vec::new();
        for entry in entries {
            match types.iter_mut().find(|(t, _)| *t == entry.type_id) {
                Some((_, list)) => list.push(entry),
                None => types.push((entry.type_id, vec![entry])),
            }
        }

        // layout: root dir, one dir per type, one dir per (type, id), then
        // data-entry records, then payloads
        let mut cursor = 16 + 8 * types.len() as u32;
        let mut type_dir_offsets: Vec<u32> = Vec::new();
        for (_, list) in &types {
            type_dir_offsets.push(cursor);
            cursor += 16 + 8 * list.len() as u32;
        }
        let mut name_dir_offsets: Vec<Vec<u32>> = Vec::new();
        for (_, list) in &types {
            let mut per_type = Vec::new();
            for _ in list.iter() {
                per_type.push(cursor);
                cursor += 16 + 8; // one language entry each
            }
            name_dir_offsets.push(per_type);
        }
        let descs_base = cursor;
        let raw_base = descs_base + 16 * entries.len() as u32;

        let mut buf = Vec::new();

        // root directory
        buf.extend_from_slice(&[0u8; 12]);
        w16(&mut buf, 0);
        w16(&mut buf, types.len() as u16);
        for (index, (type_id, _)) in types.iter().enumerate() {
            w32(&mut buf, *type_id);
            w32(&mut buf, 0x8000_0000 | type_dir_offsets[index]);
        }

        // type directories
        let mut desc_index = 0u32;
        let mut desc_plan: Vec<&Entry> = Vec::new();
        for (type_index, (_, list)) in types.iter().enumerate() {
            buf.extend_from_slice(&[0u8; 12]);
            w16(&mut buf, 0);
            w16(&mut buf, list.len() as u16);
            for (name_index, entry) in list.iter().enumerate() {
                w32(&mut buf, entry.id);
                w32(
                    &mut buf,
                    0x8000_0000 | name_dir_offsets[type_index][name_index],
                );
            }
        }

        // language directories
        for (_, list) in &types {
            for entry in list {
                buf.extend_from_slice(&[0u8; 12]);
                w16(&mut buf, 0);
                w16(&mut buf, 1);
                w32(&mut buf, entry.lang);
                w32(&mut buf, descs_base + 16 * desc_index);
                desc_index += 1;
                desc_plan.push(entry);
            }
        }

        // data-entry records
        let mut raw_cursor = raw_base;
        for entry in &desc_plan {
            w32(&mut buf, RSRC_RVA + raw_cursor);
            w32(&mut buf, entry.bytes.len() as u32);
            w32(&mut buf, 1252);
            w32(&mut buf, 0);
            raw_cursor += entry.bytes.len() as u32;
        }

        // payloads
        for entry in &desc_plan {
            buf.extend_from_slice(&entry.bytes);
        }

        buf
    }

    /// Builds a minimal PE32 image with one `.rsrc` section holding `entries`.
    pub fn build_pe32(entries: &[Entry]) -> Vec<u8> {
        let rsrc = build_rsrc(entries);

        let mut buf = vec![0u8; 0x80];
        buf[0] = 0x4D;
        buf[1] = 0x5A;
        buf[0x3C] = 0x80;

        w32(&mut buf, 0x0000_4550);
        w16(&mut buf, 0x14C);
        w16(&mut buf, 1); // one section
        w32(&mut buf, 0); // timestamp
        w32(&mut buf, 0);
        w32(&mut buf, 0);
        w16(&mut buf, 0xE0);
        w16(&mut buf, 0x0102);

        w16(&mut buf, 0x10B);
        buf.push(14);
        buf.push(0);
        w32(&mut buf, 0);
        w32(&mut buf, 0);
        w32(&mut buf, 0);
        w32(&mut buf, 0x1000); // entry point
        w32(&mut buf, 0x1000); // base of code
        w32(&mut buf, 0x2000); // base of data
        buf.extend_from_slice(&[0u8; 64]);
        w32(&mut buf, 16);
        for index in 0..16u32 {
            if index == 2 {
                w32(&mut buf, RSRC_RVA);
                w32(&mut buf, rsrc.len() as u32);
            } else {
                w32(&mut buf, 0);
                w32(&mut buf, 0);
            }
        }

        let mut name = [0u8; 8];
        name[..5].copy_from_slice(b".rsrc");
        buf.extend_from_slice(&name);
        w32(&mut buf, rsrc.len() as u32);
        w32(&mut buf, RSRC_RVA);
        w32(&mut buf, rsrc.len() as u32);
        w32(&mut buf, RSRC_FILE_OFFSET);
        buf.extend_from_slice(&[0u8; 16]);

        buf.resize(RSRC_FILE_OFFSET as usize, 0);
        buf.extend_from_slice(&rsrc);
        buf
    }

    /// Serializes a `GRPICONDIR` with one entry per (width, height, color count,
    /// bit count, icon id) tuple.
    pub fn group_icon(entries: &[(u8, u8, u8, u16, u16)]) -> Vec<u8> {
        let mut buf = Vec::new();
        w16(&mut buf, 0);
        w16(&mut buf, 1);
        w16(&mut buf, entries.len() as u16);
        for (width, height, color_count, bit_count, icon_id) in entries {
            buf.push(*width);
            buf.push(*height);
            buf.push(*color_count);
            buf.push(0);
            w16(&mut buf, 1);
            w16(&mut buf, *bit_count);
            w32(&mut buf, 0);
            w16(&mut buf, *icon_id);
        }
        buf
    }

    /// A minimal DIB icon payload with the height doubled for the mask.
    pub fn dib(width: u32, doubled_height: u32, planes: u16, bpp: u16) -> Vec<u8> {
        let mut buf = Vec::new();
        w32(&mut buf, 0x28);
        w32(&mut buf, width);
        w32(&mut buf, doubled_height);
        w16(&mut buf, planes);
        w16(&mut buf, bpp);
        buf.resize(64, 0);
        buf
    }

    /// A `VS_VERSIONINFO` block with the given language string and string pairs.
    pub fn version_info(lang: &str, strings: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        w16(&mut buf, 0); // top length, patched below
        w16(&mut buf, 52);
        w16(&mut buf, 0);
        wstr(&mut buf, "VS_VERSION_INFO");
        pad4(&mut buf);

        w32(&mut buf, 0xFEEF_04BD);
        w32(&mut buf, 0x0001_0000);
        w32(&mut buf, (6 << 16) | 2); // file version 6.2
        w32(&mut buf, (9200 << 16) | 0);
        w32(&mut buf, (6 << 16) | 2);
        w32(&mut buf, (9200 << 16) | 0);
        w32(&mut buf, 0x3F); // mask
        w32(&mut buf, 0x0); // flags
        buf.extend_from_slice(&[0u8; 20]);
        pad4(&mut buf);

        let block_at = buf.len();
        w16(&mut buf, 0);
        w16(&mut buf, 0);
        w16(&mut buf, 1);
        wstr(&mut buf, "StringFileInfo");
        pad4(&mut buf);

        let table_at = buf.len();
        w16(&mut buf, 0);
        w16(&mut buf, 0);
        w16(&mut buf, 1);
        pad4(&mut buf);
        wstr(&mut buf, lang);
        pad4(&mut buf);

        for (key, value) in strings {
            let entry_at = buf.len();
            w16(&mut buf, 0);
            w16(&mut buf, value.encode_utf16().count() as u16);
            w16(&mut buf, 1);
            wstr(&mut buf, key);
            pad4(&mut buf);
            if !value.is_empty() {
                wstr(&mut buf, value);
                pad4(&mut buf);
            }
            let entry_len = (buf.len() - entry_at) as u16;
            patch16(&mut buf, entry_at, entry_len);
        }

        let table_len = (buf.len() - table_at) as u16;
        patch16(&mut buf, table_at, table_len);
        let block_len = (buf.len() - block_at) as u16;
        patch16(&mut buf, block_at, block_len);
        let total = buf.len() as u16;
        patch16(&mut buf, 0, total);
        buf
    }
}

use factory::*;

#[test]
fn resource_leaf_bytes_round_trip() {
    // Minimal PE32 with one type -> name -> code-page chain ending in 4 bytes
    let image = PeImage::from_mem(build_pe32(&[Entry {
        type_id: 10,
        id: 1,
        lang: 1033,
        bytes: vec![0xCA, 0xFE, 0xBA, 0xBE],
    }]))
    .unwrap();

    let header = image.header().unwrap().expect("valid PE32");
    assert!(header.has_table(DirectoryKind::Resource));
    assert_eq!(header.rsrc_section().unwrap().name, ".rsrc");

    let table = image.resource_table().unwrap().expect("resource table");
    let cp = table
        .numeric_type(10)
        .unwrap()
        .find_name(&ResourceId::Numeric(1))
        .unwrap()
        .first_code_page()
        .unwrap();

    assert_eq!(cp.size, 4);
    assert_eq!(
        image.resource_bytes(cp).unwrap(),
        vec![0xCA, 0xFE, 0xBA, 0xBE]
    );
}

#[test]
fn every_tree_leaf_appears_in_table() {
    let entries = vec![
        Entry {
            type_id: 10,
            id: 1,
            lang: 1033,
            bytes: vec![1, 2, 3],
        },
        Entry {
            type_id: 10,
            id: 2,
            lang: 1031,
            bytes: vec![4, 5],
        },
        Entry {
            type_id: 24,
            id: 1,
            lang: 0,
            bytes: vec![6; 32],
        },
    ];
    let image = PeImage::from_mem(build_pe32(&entries)).unwrap();

    let table = image.resource_table().unwrap().unwrap();
    for entry in &entries {
        let cp = table
            .numeric_type(i64::from(entry.type_id))
            .unwrap()
            .find_name(&ResourceId::Numeric(i64::from(entry.id)))
            .unwrap()
            .find_code_page(&ResourceId::Numeric(i64::from(entry.lang)))
            .unwrap();
        assert_eq!(cp.size as usize, entry.bytes.len());
        assert_eq!(image.resource_bytes(cp).unwrap(), entry.bytes);
    }
}

#[test]
fn repeated_access_is_memoized() {
    let image = PeImage::from_mem(build_pe32(&[Entry {
        type_id: 10,
        id: 1,
        lang: 1033,
        bytes: vec![9, 9, 9, 9],
    }]))
    .unwrap();

    let header_first = image.header().unwrap().unwrap() as *const PeHeader;
    let header_second = image.header().unwrap().unwrap() as *const PeHeader;
    assert_eq!(header_first, header_second);

    let table_first = image.resource_table().unwrap().unwrap() as *const ResourceTable;
    let table_second = image.resource_table().unwrap().unwrap() as *const ResourceTable;
    assert_eq!(table_first, table_second);

    let info_first = image.version_info().unwrap() as *const FileVersionInfo;
    let info_second = image.version_info().unwrap() as *const FileVersionInfo;
    assert_eq!(info_first, info_second);
}

#[test]
fn group_icon_reconstruction() {
    // One 16x16 shape, 16 colors, bit-count field zero, referencing icon id 7
    // whose payload is a DIB claiming width 16 and doubled height 32.
    let payload = dib(16, 32, 1, 4);
    let image = PeImage::from_mem(build_pe32(&[
        Entry {
            type_id: RT_GROUP_ICON as u32,
            id: 1,
            lang: 1033,
            bytes: group_icon(&[(16, 16, 16, 0, 7)]),
        },
        Entry {
            type_id: RT_ICON as u32,
            id: 7,
            lang: 1033,
            bytes: payload.clone(),
        },
    ]))
    .unwrap();

    let groups = image.group_icons().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].shapes[0].0,
        IconShape {
            width: 16,
            height: 16,
            bpp: 4
        }
    );

    let ico = image.icon_at(1, false).expect("single-image icon");
    assert_eq!(&ico[..6], &[0, 0, 1, 0, 1, 0]);
    assert_eq!(ico[6], 16);
    assert_eq!(ico[7], 16);
    assert_eq!(u32::from_le_bytes(ico[18..22].try_into().unwrap()), 22);
    assert_eq!(&ico[22..], &payload[..]);
}

#[test]
fn dangling_icon_reference_is_structural_error() {
    let image = PeImage::from_mem(build_pe32(&[Entry {
        type_id: RT_GROUP_ICON as u32,
        id: 1,
        lang: 1033,
        bytes: group_icon(&[(16, 16, 0, 8, 42)]),
    }]))
    .unwrap();

    assert!(matches!(
        image.group_icons(),
        Err(Error::Malformed { .. })
    ));

    // the convenience path swallows the same failure
    assert!(image.default_icon().is_none());
}

#[test]
fn version_info_end_to_end() {
    let image = PeImage::from_mem(build_pe32(&[Entry {
        type_id: RT_VERSION as u32,
        id: 1,
        lang: 1033,
        bytes: version_info(
            "040904B0",
            &[("ProductName", "Widget"), ("CompanyName", "Contoso")],
        ),
    }]))
    .unwrap();

    let info = image.version_info().unwrap();
    assert_eq!(info.status, VersionInfoStatus::Parsed);
    assert!(!info.is_empty());
    assert_eq!(info.file_version.major, 6);
    assert_eq!(info.file_version.minor, 2);
    assert_eq!(info.file_version.build, 9200);
    assert_eq!(info.lang_codepage, "040904B0");
    assert_eq!(info.language_id(), Some(0x0409));
    assert_eq!(info.product_name(), Some("Widget"));
    assert_eq!(info.company_name(), Some("Contoso"));
}

#[test]
fn seven_char_language_string_yields_empty_info() {
    let image = PeImage::from_mem(build_pe32(&[Entry {
        type_id: RT_VERSION as u32,
        id: 1,
        lang: 1033,
        bytes: version_info("040904B", &[("ProductName", "Widget")]),
    }]))
    .unwrap();

    let info = image.version_info().unwrap();
    assert!(info.is_empty());
    assert!(info.strings().is_empty());
    assert!(matches!(info.status, VersionInfoStatus::Partial(_)));
}

#[test]
fn missing_version_resource_is_absent() {
    let image = PeImage::from_mem(build_pe32(&[Entry {
        type_id: 10,
        id: 1,
        lang: 1033,
        bytes: vec![1],
    }]))
    .unwrap();

    let info = image.version_info().unwrap();
    assert_eq!(info.status, VersionInfoStatus::Absent);
    assert!(info.is_empty());
}
