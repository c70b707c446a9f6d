use byteorder::{ByteOrder, LittleEndian};
use hdf5::types::VarLenUnicode;
use hdf5::{File, H5Type};
use ndarray::Array2;
use std::path::Path;
use std::str::FromStr;

use super::category::TestCategory;
use super::constants::STORE_EXTENSION;
use super::error::HDF5WriterError;
use super::record::{Column, ColumnKind};
use super::store::FileTableReader;

/// This is the version of the output format
const FORMAT_VERSION: &str = "1.0";

// Structure
// <store>.h5 - test, version
// |---- <table name> - rows
// |    |---- <column name>(dset) rows, or rows x len for array columns

/// A simple struct which wraps around the hdf5-rust library.
///
/// Opens an HDF5 file and writes every table of a store into it, one group per
/// table and one dataset per column.
#[derive(Debug)]
pub struct HDFWriter {
    file_handle: File,
}

impl HDFWriter {
    /// Create the writer, opening a file at path and tagging it with the test category
    pub fn new(path: &Path, category: TestCategory) -> Result<Self, HDF5WriterError> {
        let file_handle = File::create(path)?;
        let version = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);

        file_handle
            .new_attr::<VarLenUnicode>()
            .create("version")?
            .write_scalar(&VarLenUnicode::from_str(&version)?)?;
        file_handle
            .new_attr::<VarLenUnicode>()
            .create("test")?
            .write_scalar(&VarLenUnicode::from_str(category.label())?)?;

        Ok(Self { file_handle })
    }

    /// Copy a whole table into its own group
    pub fn write_table(&mut self, reader: &mut FileTableReader) -> Result<(), HDF5WriterError> {
        let header = reader.header().clone();
        let rows = reader.rows();
        let row_width = header.row_width();

        let mut data = Vec::with_capacity(rows as usize * row_width);
        let mut buffer = Vec::with_capacity(row_width);
        reader.seek_to_row(0)?;
        while reader.read_next_row_bytes(&mut buffer)? {
            data.extend_from_slice(&buffer);
        }

        let group = self.file_handle.create_group(&header.name)?;
        group.new_attr::<u64>().create("rows")?.write_scalar(&rows)?;

        let mut offset = 0;
        for column in header.columns.iter() {
            let cells = ColumnCells {
                column,
                offset,
                row_width,
                rows: rows as usize,
            };
            match column.kind {
                ColumnKind::U8 => cells.write(&group, &data, |b| b[0])?,
                ColumnKind::I8 => cells.write(&group, &data, |b| b[0] as i8)?,
                ColumnKind::U16 => cells.write(&group, &data, LittleEndian::read_u16)?,
                ColumnKind::I32 => cells.write(&group, &data, LittleEndian::read_i32)?,
                ColumnKind::U32 => cells.write(&group, &data, LittleEndian::read_u32)?,
                ColumnKind::U64 => cells.write(&group, &data, LittleEndian::read_u64)?,
                ColumnKind::F32 => cells.write(&group, &data, LittleEndian::read_f32)?,
                ColumnKind::F64 => cells.write(&group, &data, LittleEndian::read_f64)?,
            }
            offset += column.width();
        }
        log::debug!("Exported {} rows of {}", rows, header.name);
        Ok(())
    }

    pub fn close(self) -> Result<(), HDF5WriterError> {
        self.file_handle.close()?;
        Ok(())
    }
}

/// Where one column lives inside the packed rows of a table
struct ColumnCells<'a> {
    column: &'a Column,
    offset: usize,
    row_width: usize,
    rows: usize,
}

impl ColumnCells<'_> {
    fn write<T: H5Type>(
        &self,
        group: &hdf5::Group,
        data: &[u8],
        decode: impl Fn(&[u8]) -> T,
    ) -> Result<(), HDF5WriterError> {
        let size = self.column.kind.size();
        let end = self.offset + self.column.width();
        let values: Vec<T> = data
            .chunks_exact(self.row_width)
            .flat_map(|row| row[self.offset..end].chunks_exact(size).map(&decode))
            .collect();

        let builder = group.new_dataset_builder();
        if self.column.len == 1 {
            builder
                .with_data(values.as_slice())
                .create(self.column.name.as_str())?;
        } else {
            let matrix = Array2::from_shape_vec((self.rows, self.column.len as usize), values)?;
            builder
                .with_data(&matrix)
                .create(self.column.name.as_str())?;
        }
        Ok(())
    }
}

/// Export every table of a store directory into one HDF5 file
pub fn export_store(
    directory: &Path,
    category: TestCategory,
    hdf_path: &Path,
) -> Result<(), HDF5WriterError> {
    let mut tables = Vec::new();
    for entry in std::fs::read_dir(directory)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == STORE_EXTENSION) {
            tables.push(path);
        }
    }
    tables.sort();

    let mut writer = HDFWriter::new(hdf_path, category)?;
    for path in tables.iter() {
        let mut reader = FileTableReader::open(path)?;
        writer.write_table(&mut reader)?;
    }
    writer.close()?;
    log::info!(
        "Exported {} tables of {} to {}",
        tables.len(),
        directory.display(),
        hdf_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::ActivityClass;
    use crate::record::ResultRecord;
    use crate::store::StoreSet;

    #[test]
    fn test_export_store() {
        let dir = tempfile::tempdir().unwrap();
        let store_dir = dir.path().join("store");
        let mut store = StoreSet::create(&store_dir, TestCategory::NoiseScan).unwrap();
        let mut record = ResultRecord::new(TestCategory::NoiseScan);
        record.identity.hic_id = 4;
        record.chips.temp_end[2] = 31.5;
        store
            .result_table(ActivityClass::Qualification)
            .unwrap()
            .append(&mut record)
            .unwrap();
        store.close().unwrap();

        let hdf_path = dir.path().join("store.h5");
        export_store(&store_dir, TestCategory::NoiseScan, &hdf_path).unwrap();

        let file = File::open(&hdf_path).unwrap();
        let group = file.group("hicQualResTree").unwrap();
        let ids = group.dataset("hicID").unwrap().read_1d::<u32>().unwrap();
        assert_eq!(ids.to_vec(), vec![4]);
        let temps = group.dataset("chipTempEnd").unwrap().read_2d::<f32>().unwrap();
        assert_eq!(temps[[0, 2]], 31.5);
        assert!(file.group("hicQualTree").is_ok());
    }
}
