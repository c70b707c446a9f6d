use std::io::{Read, Seek};

use super::constants::MAX_RAW_TABLES;
use super::error::StoreError;
use super::record::{ColumnVisitor, Columnar};
use super::store::TableReader;

/// Row offsets of the first row an activity wrote to each of its tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityOffsets {
    /// Indexed by [`RawTable::index`](crate::category::RawTable::index)
    pub raw: [u64; MAX_RAW_TABLES],
    pub result: u64,
}

/// Marks an activity as already reduced, and where its rows start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityFingerprint {
    pub hic_id: u32,
    pub act_id: u32,
    /// Mask bit of the activity class
    pub mask: u16,
    pub offsets: ActivityOffsets,
}

impl ActivityFingerprint {
    pub fn new(hic_id: u32, act_id: u32, mask: u16, offsets: ActivityOffsets) -> Self {
        Self {
            hic_id,
            act_id,
            mask,
            offsets,
        }
    }
}

impl Columnar for ActivityFingerprint {
    fn visit_columns(&mut self, v: &mut dyn ColumnVisitor) -> Result<(), StoreError> {
        v.visit("hicID", (&mut self.hic_id).into())?;
        v.visit("actID", (&mut self.act_id).into())?;
        v.visit("actMask", (&mut self.mask).into())?;
        v.visit("actOffs", (&mut self.offsets.raw[0]).into())?;
        v.visit("actTunOff", (&mut self.offsets.raw[1]).into())?;
        v.visit("actResOff", (&mut self.offsets.result).into())?;
        Ok(())
    }
}

/// The fingerprints of one store, in the order they were recorded.
///
/// Lookups are a linear scan. The index holds one entry per activity of a single
/// test campaign, so it stays small.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintIndex {
    entries: Vec<ActivityFingerprint>,
}

impl FingerprintIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every fingerprint of a stored fingerprint table
    pub fn load<R: Read + Seek>(reader: &mut TableReader<R>) -> Result<Self, StoreError> {
        let mut entries = Vec::with_capacity(reader.rows() as usize);
        for row in 0..reader.rows() {
            let mut entry = ActivityFingerprint::default();
            reader.read_row(row, &mut entry)?;
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    pub fn find(&self, hic_id: u32, act_id: u32, mask: u16) -> Option<&ActivityFingerprint> {
        self.entries
            .iter()
            .find(|e| e.hic_id == hic_id && e.act_id == act_id && e.mask == mask)
    }

    pub fn is_processed(&self, hic_id: u32, act_id: u32, mask: u16) -> bool {
        self.find(hic_id, act_id, mask).is_some()
    }

    pub fn push(&mut self, fingerprint: ActivityFingerprint) {
        self.entries.push(fingerprint);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityFingerprint> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ColumnKind;
    use crate::store::{TableHeader, TableKind, TableWriter};
    use std::io::Cursor;
    use std::path::Path;

    #[test]
    fn test_layout() {
        let layout = ActivityFingerprint::default().layout();
        let names: Vec<&str> = layout.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            ["hicID", "actID", "actMask", "actOffs", "actTunOff", "actResOff"]
        );
        assert_eq!(layout[2].kind, ColumnKind::U16);
        assert_eq!(layout[5].kind, ColumnKind::U64);
    }

    #[test]
    fn test_find_matches_mask() {
        let mut index = FingerprintIndex::new();
        index.push(ActivityFingerprint::new(10, 200, 1, ActivityOffsets::default()));
        index.push(ActivityFingerprint::new(
            10,
            201,
            2,
            ActivityOffsets {
                raw: [5, 0],
                result: 1,
            },
        ));
        assert!(index.is_processed(10, 200, 1));
        assert!(!index.is_processed(10, 200, 2));
        assert!(!index.is_processed(11, 200, 1));
        assert_eq!(index.find(10, 201, 2).map(|f| f.offsets.raw[0]), Some(5));
    }

    #[test]
    fn test_load_from_table() {
        let header = TableHeader::new(
            "actFastListTree",
            TableKind::Fingerprint,
            &mut ActivityFingerprint::default(),
        );
        let mut writer = TableWriter::new(Cursor::new(Vec::new()), header).unwrap();
        let stored = [
            ActivityFingerprint::new(1, 2, 4, ActivityOffsets::default()),
            ActivityFingerprint::new(
                1,
                3,
                4,
                ActivityOffsets {
                    raw: [1024, 12],
                    result: 4,
                },
            ),
        ];
        for mut entry in stored {
            writer.append(&mut entry).unwrap();
        }
        let bytes = writer.finish().unwrap().into_inner();

        let mut reader = TableReader::new(Cursor::new(bytes), Path::new("memory")).unwrap();
        let index = FingerprintIndex::load(&mut reader).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.iter().copied().collect::<Vec<_>>(), stored);
    }
}
