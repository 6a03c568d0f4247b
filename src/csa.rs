//! Parser for the Siemens CSA header, the proprietary binary container
//! embedded in DICOM tag (0029,1010).
//!
//! The layout is the "SV10" format described at
//! <https://nipy.org/nibabel/dicom/siemens_csa.html>.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::reader::BufferReader;
use crate::util::{parse_double, parse_u32};

const MAGIC_SV10: u32 = 0x3031_5653;

/// One tag of a CSA header: a value representation code and an ordered
/// list of binary values.
#[derive(Debug, Clone)]
pub struct CsaTag {
    vr: String,
    values: Vec<Vec<u8>>,
}

impl CsaTag {
    pub fn new(vr: impl Into<String>) -> Self {
        CsaTag {
            vr: vr.into(),
            values: Vec::new(),
        }
    }

    /// The value representation code of this tag.
    pub fn vr(&self) -> &str {
        &self.vr
    }

    /// The number of values stored in this tag.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Append one binary value.
    pub fn add_value(&mut self, value: Vec<u8>) -> &mut Self {
        self.values.push(value);
        self
    }

    /// The raw bytes of value `index`.
    pub fn binary_value(&self, index: usize) -> Result<&[u8]> {
        self.values.get(index).map(Vec::as_slice).ok_or_else(|| {
            Error::ParameterOutOfRange(format!(
                "no value {} in CSA tag of {} value(s)",
                index,
                self.values.len()
            ))
        })
    }

    /// The bytes of value `index` cropped at the first NUL, as text.
    pub fn string_value(&self, index: usize) -> Result<String> {
        let raw = self.binary_value(index)?;
        let cropped = match raw.iter().position(|&b| b == 0) {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        Ok(String::from_utf8_lossy(cropped).into_owned())
    }

    /// Coerce value `index` to an unsigned 32-bit integer.
    /// Failure is reported as `None`, never as an error.
    pub fn parse_u32(&self, index: usize) -> Option<u32> {
        parse_u32(&self.string_value(index).ok()?)
    }

    /// Coerce value `index` to a floating-point number.
    pub fn parse_f64(&self, index: usize) -> Option<f64> {
        parse_double(&self.string_value(index).ok()?)
    }

    /// Coerce all values to floating-point numbers.
    pub fn parse_vector(&self) -> Option<Vec<f64>> {
        (0..self.values.len()).map(|i| self.parse_f64(i)).collect()
    }
}

/// A CSA header: a mapping from unique tag name to tag.
/// Insertion order is irrelevant.
#[derive(Debug, Clone, Default)]
pub struct CsaHeader {
    content: BTreeMap<String, CsaTag>,
}

impl CsaHeader {
    pub fn new() -> Self {
        CsaHeader::default()
    }

    /// Decode the raw bytes of the CSA private tag.
    pub fn parse(buffer: &[u8]) -> Result<Self> {
        let mut reader = BufferReader::new(buffer);

        if reader.read_u32()? != MAGIC_SV10 {
            return Err(Error::BadFileFormat(
                "missing SV10 signature in CSA header".to_owned(),
            ));
        }

        reader.read_u32()?; // unused, often equals 0x01020304

        let n_tags = reader.read_u32()?;
        if n_tags == 0 || n_tags > 128 {
            // This should be in the range 1..128
            return Err(Error::BadFileFormat(format!(
                "invalid number of tags in CSA header: {}",
                n_tags
            )));
        }

        if reader.read_u32()? != 77 {
            return Err(Error::BadFileFormat(
                "invalid layout marker in CSA header".to_owned(),
            ));
        }

        let mut content = BTreeMap::new();

        for _ in 0..n_tags {
            let name = reader.read_null_terminated()?;
            if name.len() >= 63 {
                return Err(Error::BadFileFormat(
                    "tag name too long in CSA header".to_owned(),
                ));
            }
            let name = String::from_utf8_lossy(name).into_owned();
            reader.skip(64 - name.len() - 1)?;

            let vm = reader.read_u32()?;

            let vr = reader.read_null_terminated()?;
            if vr.len() >= 4 {
                return Err(Error::BadFileFormat(
                    "tag VR too long in CSA header".to_owned(),
                ));
            }
            let vr = String::from_utf8_lossy(vr).into_owned();
            reader.skip(4 - vr.len() - 1)?;

            reader.read_u32()?; // "syngodt" = syngo.via data type
            let n_items = reader.read_u32()?;
            let sync = reader.read_u32()?;
            if sync != 77 && sync != 205 {
                return Err(Error::BadFileFormat(format!(
                    "invalid synchronization marker in CSA header: {}",
                    sync
                )));
            }

            let mut tag = CsaTag::new(vr);

            for j in 0..n_items {
                reader.read_u32()?;
                let item_len = reader.read_u32()? as usize;
                reader.read_u32()?;
                reader.read_u32()?;

                if vm == 0 || j < vm {
                    tag.add_value(reader.read_block(item_len)?.to_vec());
                } else {
                    reader.skip(item_len)?;
                }

                // Set the stream position to the next 4 byte boundary
                if reader.position() % 4 != 0 {
                    reader.skip(4 - reader.position() % 4)?;
                }
            }

            if content.contains_key(&name) {
                return Err(Error::BadFileFormat(format!(
                    "Tag is repeated in CSA header: {}",
                    name
                )));
            }
            content.insert(name, tag);
        }

        Ok(CsaHeader { content })
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.content.contains_key(name)
    }

    /// Access a tag by name.
    pub fn tag(&self, name: &str) -> Result<&CsaTag> {
        self.content
            .get(name)
            .ok_or_else(|| Error::InexistentItem(format!("no such tag in CSA header: {}", name)))
    }

    /// The names of all tags, in deterministic order.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.content.keys().map(String::as_str)
    }

    /// Insert a new tag, for programmatic construction.
    pub fn add_tag(&mut self, name: impl Into<String>, vr: impl Into<String>) -> Result<&mut CsaTag> {
        let name = name.into();
        if self.content.contains_key(&name) {
            return Err(Error::ParameterOutOfRange(format!(
                "Tag already exists: {}",
                name
            )));
        }
        Ok(self.content.entry(name).or_insert_with(|| CsaTag::new(vr)))
    }

    /// Coerce the single value of the named tag to an unsigned 32-bit
    /// integer. Missing tag, wrong multiplicity and textual coercion
    /// failure are all reported as `None`.
    pub fn parse_u32(&self, name: &str) -> Option<u32> {
        let tag = self.content.get(name)?;
        if tag.len() != 1 {
            return None;
        }
        tag.parse_u32(0)
    }
}
