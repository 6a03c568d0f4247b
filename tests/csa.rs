//! Byte-level scenarios for the Siemens CSA header parser.

use dicom2nii::{CsaHeader, Error};

/// Serialize one tag of a synthetic SV10 container.
struct TagSpec<'a> {
    name: &'a str,
    vr: &'a str,
    vm: u32,
    sync: u32,
    values: &'a [&'a [u8]],
}

impl<'a> TagSpec<'a> {
    fn new(name: &'a str, vr: &'a str, values: &'a [&'a [u8]]) -> Self {
        TagSpec {
            name,
            vr,
            vm: 0,
            sync: 77,
            values,
        }
    }
}

fn build_csa(tags: &[TagSpec<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"SV10");
    out.extend_from_slice(&0x0102_0304u32.to_le_bytes());
    out.extend_from_slice(&(tags.len() as u32).to_le_bytes());
    out.extend_from_slice(&77u32.to_le_bytes());

    for tag in tags {
        let mut name_area = [0u8; 64];
        name_area[..tag.name.len()].copy_from_slice(tag.name.as_bytes());
        out.extend_from_slice(&name_area);

        out.extend_from_slice(&tag.vm.to_le_bytes());

        let mut vr_area = [0u8; 4];
        vr_area[..tag.vr.len()].copy_from_slice(tag.vr.as_bytes());
        out.extend_from_slice(&vr_area);

        out.extend_from_slice(&0u32.to_le_bytes()); // syngodt
        out.extend_from_slice(&(tag.values.len() as u32).to_le_bytes());
        out.extend_from_slice(&tag.sync.to_le_bytes());

        for value in tag.values {
            out.extend_from_slice(&(value.len() as u32).to_le_bytes());
            out.extend_from_slice(&(value.len() as u32).to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(value);
            while out.len() % 4 != 0 {
                out.push(0);
            }
        }
    }
    out
}

#[test]
fn parses_a_well_formed_header() {
    let buffer = build_csa(&[
        TagSpec::new(
            "NumberOfImagesInMosaic",
            "IS",
            &[b"30 \0"],
        ),
        TagSpec::new(
            "SliceNormalVector",
            "DS",
            &[b"0.0\0", b"0.0\0", b"1.0\0"],
        ),
    ]);

    let csa = CsaHeader::parse(&buffer).unwrap();
    assert_eq!(csa.len(), 2);
    assert!(csa.has_tag("NumberOfImagesInMosaic"));
    assert_eq!(csa.parse_u32("NumberOfImagesInMosaic"), Some(30));

    let normal = csa.tag("SliceNormalVector").unwrap();
    assert_eq!(normal.vr(), "DS");
    assert_eq!(normal.parse_vector(), Some(vec![0.0, 0.0, 1.0]));

    let names: Vec<&str> = csa.tag_names().collect();
    assert_eq!(names, vec!["NumberOfImagesInMosaic", "SliceNormalVector"]);
}

#[test]
fn string_values_stop_at_the_first_nul() {
    let buffer = build_csa(&[TagSpec::new("Comment", "LO", &[b"abc\0garbage"])]);
    let csa = CsaHeader::parse(&buffer).unwrap();
    assert_eq!(csa.tag("Comment").unwrap().string_value(0).unwrap(), "abc");
}

#[test]
fn value_multiplicity_limits_retention() {
    let mut spec = TagSpec::new("MultiValued", "DS", &[b"1\0", b"2\0", b"3\0"]);
    spec.vm = 2;
    let csa = CsaHeader::parse(&build_csa(&[spec])).unwrap();

    // the third item is skipped, not stored
    let tag = csa.tag("MultiValued").unwrap();
    assert_eq!(tag.len(), 2);
    assert_eq!(tag.parse_vector(), Some(vec![1.0, 2.0]));
}

#[test]
fn duplicate_tag_names_are_rejected() {
    let buffer = build_csa(&[
        TagSpec::new("EchoLinePosition", "IS", &[b"64\0"]),
        TagSpec::new("EchoLinePosition", "IS", &[b"64\0"]),
    ]);

    match CsaHeader::parse(&buffer) {
        Err(Error::BadFileFormat(reason)) => {
            assert!(reason.contains("EchoLinePosition"), "{}", reason);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn alternate_sync_marker_is_accepted() {
    let mut spec = TagSpec::new("EchoLinePosition", "IS", &[b"64\0"]);
    spec.sync = 205;
    assert!(CsaHeader::parse(&build_csa(&[spec])).is_ok());

    let mut spec = TagSpec::new("EchoLinePosition", "IS", &[b"64\0"]);
    spec.sync = 42;
    assert!(CsaHeader::parse(&build_csa(&[spec])).is_err());
}

#[test]
fn bad_signature_is_rejected() {
    let mut buffer = build_csa(&[TagSpec::new("EchoLinePosition", "IS", &[b"64\0"])]);
    buffer[0] = b'X';
    assert!(CsaHeader::parse(&buffer).is_err());
}

#[test]
fn tag_count_must_be_in_range() {
    let mut buffer = build_csa(&[TagSpec::new("EchoLinePosition", "IS", &[b"64\0"])]);
    buffer[8..12].copy_from_slice(&0u32.to_le_bytes());
    assert!(CsaHeader::parse(&buffer).is_err());

    buffer[8..12].copy_from_slice(&129u32.to_le_bytes());
    assert!(CsaHeader::parse(&buffer).is_err());
}

#[test]
fn truncated_buffers_are_rejected() {
    let buffer = build_csa(&[TagSpec::new("EchoLinePosition", "IS", &[b"64\0"])]);
    for len in [0, 4, 12, 16, 40, buffer.len() - 1] {
        assert!(
            CsaHeader::parse(&buffer[..len]).is_err(),
            "a {} byte prefix should not parse",
            len
        );
    }
}

#[test]
fn oversized_names_are_rejected() {
    // A 63-character name fills the whole name area, leaving no NUL
    // inside it; the name then swallows the following fields and the
    // layout cannot be consistent anymore.
    let name = "N".repeat(63);
    let spec = TagSpec::new(&name, "IS", &[b"64\0"]);
    assert!(CsaHeader::parse(&build_csa(&[spec])).is_err());
}
