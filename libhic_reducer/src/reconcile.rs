use std::io::{Read, Seek, Write};

use super::category::{ActivityClass, RawTable};
use super::constants::MAX_RAW_TABLES;
use super::error::ReconcileError;
use super::fingerprint::{ActivityFingerprint, ActivityOffsets};
use super::store::{row_ids, StoreArchive, StoreSet, TableReader, TableWriter};

/// Where a reconciled activity landed in the new store, and how much was copied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub offsets: ActivityOffsets,
    pub raw_rows: [u64; MAX_RAW_TABLES],
    pub result_rows: u64,
}

impl CopyReport {
    pub fn total_rows(&self) -> u64 {
        self.raw_rows.iter().sum::<u64>() + self.result_rows
    }
}

/// Fail unless the row at `offset` belongs to the activity
fn verify_start<R: Read + Seek>(
    reader: &mut TableReader<R>,
    offset: u64,
    hic_id: u32,
    act_id: u32,
) -> Result<(), ReconcileError> {
    let belongs = offset < reader.rows() && reader.read_ids(offset)? == (hic_id, act_id);
    if belongs {
        Ok(())
    } else {
        Err(ReconcileError::OffsetMismatch {
            table: reader.name().to_string(),
            offset,
            hic_id,
            act_id,
        })
    }
}

/// Copy the contiguous block of rows of one activity, starting at `offset`, until a
/// row of another activity or the end of the table. Returns the number of rows copied.
pub fn copy_block<R, W>(
    reader: &mut TableReader<R>,
    writer: &mut TableWriter<W>,
    offset: u64,
    hic_id: u32,
    act_id: u32,
) -> Result<u64, ReconcileError>
where
    R: Read + Seek,
    W: Write,
{
    if offset >= reader.rows() {
        return Ok(0);
    }
    reader.seek_to_row(offset)?;
    let mut buffer = Vec::with_capacity(reader.header().row_width());
    let mut copied = 0;
    while reader.read_next_row_bytes(&mut buffer)? {
        if row_ids(&buffer) != Some((hic_id, act_id)) {
            break;
        }
        writer.append_raw(&buffer)?;
        copied += 1;
    }
    Ok(copied)
}

/// Copy every row of an already reduced activity from the previous store into the
/// new one.
///
/// All tables are checked before anything is written: if the first row at any stored
/// offset belongs to another activity the archive cannot be trusted for it, and
/// `OffsetMismatch` is returned with the new store untouched.
pub fn copy_activity(
    fingerprint: &ActivityFingerprint,
    class: ActivityClass,
    archive: &mut StoreArchive,
    store: &mut StoreSet,
) -> Result<CopyReport, ReconcileError> {
    let category = store.category();
    let (hic_id, act_id) = (fingerprint.hic_id, fingerprint.act_id);
    let raw_tables: &[RawTable] = category.raw_tables();

    for table in raw_tables {
        let offset = fingerprint.offsets.raw[table.index()];
        verify_start(archive.raw_table(class, *table)?, offset, hic_id, act_id)?;
    }
    verify_start(
        archive.result_table(class)?,
        fingerprint.offsets.result,
        hic_id,
        act_id,
    )?;

    let mut report = CopyReport {
        offsets: store.offsets(class),
        ..Default::default()
    };
    for table in raw_tables {
        let offset = fingerprint.offsets.raw[table.index()];
        let reader = archive.raw_table(class, *table)?;
        let writer = store.raw_table(class, *table)?;
        report.raw_rows[table.index()] = copy_block(reader, writer, offset, hic_id, act_id)?;
    }
    let reader = archive.result_table(class)?;
    let writer = store.result_table(class)?;
    report.result_rows = copy_block(reader, writer, fingerprint.offsets.result, hic_id, act_id)?;

    log::debug!(
        "Copied {} rows of HIC {} activity {}",
        report.total_rows(),
        hic_id,
        act_id
    );
    Ok(report)
}
