use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use fxhash::FxHashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::category::{ActivityClass, RawTable, TestCategory};
use super::constants::{
    FINGERPRINT_TABLE_NAME, MAX_RAW_TABLES, STORE_EXTENSION, STORE_FORMAT_VERSION, STORE_MAGIC,
};
use super::error::StoreError;
use super::fingerprint::{ActivityFingerprint, ActivityOffsets, FingerprintIndex};
use super::record::{
    Column, ColumnKind, ColumnVisitor, Columnar, FieldMut, MeasurementKind, RawRow, ResultRecord,
};

// Store file layout
// magic "HICT" | version u16 | name | kind u8 | sub-kind u8 | n columns u16
// |---- column: name | type code u8 | length u16   (repeated)
// rows: fixed width, columns in layout order, little endian
// Strings are a u16 byte count followed by UTF-8.

/// What the rows of a table are
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Raw(MeasurementKind),
    Result(TestCategory),
    Fingerprint,
}

impl TableKind {
    fn codes(&self) -> (u8, u8) {
        match self {
            Self::Raw(kind) => (0, kind.code()),
            Self::Result(category) => (1, category.code()),
            Self::Fingerprint => (2, 0),
        }
    }

    fn from_codes(table: &str, kind: u8, sub_kind: u8) -> Result<Self, StoreError> {
        let parsed = match kind {
            0 => MeasurementKind::from_code(sub_kind).map(Self::Raw),
            1 => TestCategory::from_code(sub_kind).map(Self::Result),
            2 => Some(Self::Fingerprint),
            _ => None,
        };
        parsed.ok_or_else(|| StoreError::UnknownTableKind(table.to_string(), kind))
    }
}

/// Self-describing header at the start of every table file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeader {
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<Column>,
}

impl TableHeader {
    /// Header for a table holding rows shaped like `row`
    pub fn new<C: Columnar + ?Sized>(name: &str, kind: TableKind, row: &mut C) -> Self {
        Self {
            name: name.to_string(),
            kind,
            columns: row.layout(),
        }
    }

    pub fn row_width(&self) -> usize {
        self.columns.iter().map(|c| c.width()).sum()
    }

    /// Size of the encoded header in bytes; rows start right after it
    pub fn encoded_len(&self) -> u64 {
        let fixed = STORE_MAGIC.len() + 2 + 2 + self.name.len() + 1 + 1 + 2;
        let columns: usize = self.columns.iter().map(|c| 2 + c.name.len() + 1 + 2).sum();
        (fixed + columns) as u64
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), StoreError> {
        writer.write_all(STORE_MAGIC)?;
        writer.write_u16::<LittleEndian>(STORE_FORMAT_VERSION)?;
        write_string(writer, &self.name)?;
        let (kind, sub_kind) = self.kind.codes();
        writer.write_u8(kind)?;
        writer.write_u8(sub_kind)?;
        writer.write_u16::<LittleEndian>(self.columns.len() as u16)?;
        for column in self.columns.iter() {
            write_string(writer, &column.name)?;
            writer.write_u8(column.kind.code())?;
            writer.write_u16::<LittleEndian>(column.len)?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(reader: &mut R, origin: &Path) -> Result<Self, StoreError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(StoreError::BadMagic(origin.to_path_buf()));
        }
        let version = reader.read_u16::<LittleEndian>()?;
        if version != STORE_FORMAT_VERSION {
            return Err(StoreError::BadVersion(origin.to_path_buf(), version));
        }
        let name = read_string(reader)?;
        let kind = reader.read_u8()?;
        let sub_kind = reader.read_u8()?;
        let kind = TableKind::from_codes(&name, kind, sub_kind)?;
        let n_columns = reader.read_u16::<LittleEndian>()?;
        let mut columns = Vec::with_capacity(n_columns as usize);
        for _ in 0..n_columns {
            let column_name = read_string(reader)?;
            let code = reader.read_u8()?;
            let column_kind = ColumnKind::from_code(code)
                .ok_or_else(|| StoreError::UnknownColumnKind(name.clone(), code))?;
            let len = reader.read_u16::<LittleEndian>()?;
            columns.push(Column {
                name: column_name,
                kind: column_kind,
                len,
            });
        }
        Ok(Self {
            name,
            kind,
            columns,
        })
    }

    /// Fails unless both headers describe the same row layout
    pub fn check_layout(&self, expected: &[Column]) -> Result<(), StoreError> {
        if self.columns.len() != expected.len() {
            let column = expected
                .get(self.columns.len())
                .or(self.columns.get(expected.len()))
                .map(|c| c.name.clone())
                .unwrap_or_default();
            return Err(StoreError::LayoutMismatch {
                table: self.name.clone(),
                column,
            });
        }
        match self.columns.iter().zip(expected).find(|(a, b)| a != b) {
            Some((found, _)) => Err(StoreError::LayoutMismatch {
                table: self.name.clone(),
                column: found.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<(), StoreError> {
    writer.write_u16::<LittleEndian>(value.len() as u16)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn read_string<R: Read>(reader: &mut R) -> Result<String, StoreError> {
    let len = reader.read_u16::<LittleEndian>()?;
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Path of a table file inside a store directory
pub fn table_path(directory: &Path, name: &str) -> PathBuf {
    directory.join(format!("{name}.{STORE_EXTENSION}"))
}

struct RowEncoder<'w, W: Write> {
    writer: &'w mut W,
}

impl<W: Write> ColumnVisitor for RowEncoder<'_, W> {
    fn visit(&mut self, _name: &'static str, field: FieldMut<'_>) -> Result<(), StoreError> {
        match field {
            FieldMut::U8(values) => self.writer.write_all(values)?,
            FieldMut::I8(values) => {
                for value in values.iter() {
                    self.writer.write_i8(*value)?;
                }
            }
            FieldMut::U16(values) => {
                for value in values.iter() {
                    self.writer.write_u16::<LittleEndian>(*value)?;
                }
            }
            FieldMut::I32(values) => {
                for value in values.iter() {
                    self.writer.write_i32::<LittleEndian>(*value)?;
                }
            }
            FieldMut::U32(values) => {
                for value in values.iter() {
                    self.writer.write_u32::<LittleEndian>(*value)?;
                }
            }
            FieldMut::U64(values) => {
                for value in values.iter() {
                    self.writer.write_u64::<LittleEndian>(*value)?;
                }
            }
            FieldMut::F32(values) => {
                for value in values.iter() {
                    self.writer.write_f32::<LittleEndian>(*value)?;
                }
            }
            FieldMut::F64(values) => {
                for value in values.iter() {
                    self.writer.write_f64::<LittleEndian>(*value)?;
                }
            }
        }
        Ok(())
    }
}

struct RowDecoder<'r, R: Read> {
    reader: &'r mut R,
}

impl<R: Read> ColumnVisitor for RowDecoder<'_, R> {
    fn visit(&mut self, _name: &'static str, field: FieldMut<'_>) -> Result<(), StoreError> {
        match field {
            FieldMut::U8(values) => self.reader.read_exact(values)?,
            FieldMut::I8(values) => self.reader.read_i8_into(values)?,
            FieldMut::U16(values) => self.reader.read_u16_into::<LittleEndian>(values)?,
            FieldMut::I32(values) => self.reader.read_i32_into::<LittleEndian>(values)?,
            FieldMut::U32(values) => self.reader.read_u32_into::<LittleEndian>(values)?,
            FieldMut::U64(values) => self.reader.read_u64_into::<LittleEndian>(values)?,
            FieldMut::F32(values) => self.reader.read_f32_into::<LittleEndian>(values)?,
            FieldMut::F64(values) => self.reader.read_f64_into::<LittleEndian>(values)?,
        }
        Ok(())
    }
}

/// Appends fixed-width rows to one table
#[derive(Debug)]
pub struct TableWriter<W: Write> {
    header: TableHeader,
    writer: W,
    rows: u64,
    scratch: Vec<u8>,
}

pub type FileTableWriter = TableWriter<BufWriter<File>>;
pub type FileTableReader = TableReader<BufReader<File>>;

impl FileTableWriter {
    /// Create (or truncate) the table file in a store directory
    pub fn create(directory: &Path, header: TableHeader) -> Result<Self, StoreError> {
        let file = File::create(table_path(directory, &header.name))?;
        Self::new(BufWriter::new(file), header)
    }
}

impl<W: Write> TableWriter<W> {
    pub fn new(mut writer: W, header: TableHeader) -> Result<Self, StoreError> {
        header.write_to(&mut writer)?;
        Ok(Self {
            header,
            writer,
            rows: 0,
            scratch: Vec::new(),
        })
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Number of rows appended so far; also the row index of the next row
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn size_bytes(&self) -> u64 {
        self.header.encoded_len() + self.rows * self.header.row_width() as u64
    }

    pub fn append<C: Columnar + ?Sized>(&mut self, row: &mut C) -> Result<(), StoreError> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        row.visit_columns(&mut RowEncoder {
            writer: &mut scratch,
        })?;
        let result = self.append_raw(&scratch);
        self.scratch = scratch;
        result
    }

    /// Append an already encoded row, as read by [`TableReader::read_row_bytes`]
    pub fn append_raw(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        if bytes.len() != self.header.row_width() {
            return Err(StoreError::LayoutMismatch {
                table: self.header.name.clone(),
                column: String::from("<row width>"),
            });
        }
        self.writer.write_all(bytes)?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and hand back the underlying writer
    pub fn finish(mut self) -> Result<W, StoreError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Reader position after a failed read
const UNKNOWN_ROW: u64 = u64::MAX;

/// Random and sequential access to the rows of one table
///
/// Every read leaves the underlying reader on a row boundary, so
/// [`TableReader::read_next_row_bytes`] continues after the last row read
/// without seeking.
#[derive(Debug)]
pub struct TableReader<R> {
    header: TableHeader,
    reader: R,
    header_len: u64,
    rows: u64,
    next_row: u64,
    scratch: Vec<u8>,
}

impl FileTableReader {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file), path)
    }
}

impl<R: Read + Seek> TableReader<R> {
    pub fn new(mut reader: R, origin: &Path) -> Result<Self, StoreError> {
        reader.seek(SeekFrom::Start(0))?;
        let header = TableHeader::read_from(&mut reader, origin)?;
        let header_len = header.encoded_len();
        let end = reader.seek(SeekFrom::End(0))?;
        let width = header.row_width() as u64;
        // A partially written last row is not counted
        let rows = match width {
            0 => 0,
            _ => end.saturating_sub(header_len) / width,
        };
        Ok(Self {
            header,
            reader,
            header_len,
            rows,
            next_row: rows,
            scratch: Vec::new(),
        })
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn byte_offset(&self, row: u64) -> u64 {
        self.header_len + row * self.header.row_width() as u64
    }

    fn seek_row(&mut self, row: u64) -> Result<(), StoreError> {
        if row >= self.rows {
            return Err(StoreError::RowOutOfRange {
                table: self.header.name.clone(),
                row,
                rows: self.rows,
            });
        }
        self.seek_to_row(row)
    }

    /// Position the reader so the next sequential read returns `row`.
    /// `row == rows()` is allowed and leaves nothing to read.
    pub fn seek_to_row(&mut self, row: u64) -> Result<(), StoreError> {
        if row > self.rows {
            return Err(StoreError::RowOutOfRange {
                table: self.header.name.clone(),
                row,
                rows: self.rows,
            });
        }
        if row != self.next_row {
            let offset = self.byte_offset(row);
            self.reader.seek(SeekFrom::Start(offset))?;
            self.next_row = row;
        }
        Ok(())
    }

    /// The hicID and actID every row starts with
    pub fn read_ids(&mut self, row: u64) -> Result<(u32, u32), StoreError> {
        let mut scratch = std::mem::take(&mut self.scratch);
        let read = self.read_row_bytes(row, &mut scratch);
        let ids = row_ids(&scratch);
        self.scratch = scratch;
        read?;
        ids.ok_or_else(|| StoreError::LayoutMismatch {
            table: self.header.name.clone(),
            column: String::from("hicID"),
        })
    }

    /// Read the encoded bytes of a row into `buffer`, replacing its contents
    pub fn read_row_bytes(&mut self, row: u64, buffer: &mut Vec<u8>) -> Result<(), StoreError> {
        self.seek_row(row)?;
        self.read_current(buffer)
    }

    /// Read the row after the last one read (or the one given to
    /// [`TableReader::seek_to_row`]). Returns false once the table is exhausted.
    pub fn read_next_row_bytes(&mut self, buffer: &mut Vec<u8>) -> Result<bool, StoreError> {
        if self.next_row >= self.rows {
            return Ok(false);
        }
        self.read_current(buffer)?;
        Ok(true)
    }

    fn read_current(&mut self, buffer: &mut Vec<u8>) -> Result<(), StoreError> {
        buffer.resize(self.header.row_width(), 0);
        if let Err(error) = self.reader.read_exact(buffer) {
            self.next_row = UNKNOWN_ROW;
            return Err(error.into());
        }
        self.next_row += 1;
        Ok(())
    }

    /// Decode a row into `target`, which must have the table's layout
    pub fn read_row<C: Columnar + ?Sized>(&mut self, row: u64, target: &mut C) -> Result<(), StoreError> {
        self.header.check_layout(&target.layout())?;
        self.seek_row(row)?;
        let mut decoder = RowDecoder {
            reader: &mut self.reader,
        };
        let decoded = target.visit_columns(&mut decoder);
        match decoded {
            Ok(()) => self.next_row += 1,
            Err(_) => self.next_row = UNKNOWN_ROW,
        }
        decoded
    }
}

/// The hicID and actID at the start of an encoded row
pub fn row_ids(bytes: &[u8]) -> Option<(u32, u32)> {
    let hic_id = bytes.get(0..4)?;
    let act_id = bytes.get(4..8)?;
    Some((LittleEndian::read_u32(hic_id), LittleEndian::read_u32(act_id)))
}

fn raw_header(category: TestCategory, class: ActivityClass, table: RawTable) -> TableHeader {
    let kind = category.measurement_kind();
    TableHeader::new(
        &class.raw_table_name(category, table),
        TableKind::Raw(kind),
        &mut RawRow::empty(kind),
    )
}

fn result_header(category: TestCategory, class: ActivityClass) -> TableHeader {
    TableHeader::new(
        &class.result_table_name(category),
        TableKind::Result(category),
        &mut ResultRecord::new(category),
    )
}

fn fingerprint_header() -> TableHeader {
    TableHeader::new(
        FINGERPRINT_TABLE_NAME,
        TableKind::Fingerprint,
        &mut ActivityFingerprint::default(),
    )
}

/// The tables a run writes: raw and result tables for every activity class of the
/// test category, plus the fingerprint table. Dropping the set closes every file.
#[derive(Debug)]
pub struct StoreSet {
    directory: PathBuf,
    category: TestCategory,
    raw: FxHashMap<(ActivityClass, RawTable), FileTableWriter>,
    results: FxHashMap<ActivityClass, FileTableWriter>,
    fingerprints: FileTableWriter,
}

impl StoreSet {
    pub fn create(directory: &Path, category: TestCategory) -> Result<Self, StoreError> {
        std::fs::create_dir_all(directory)?;
        let mut raw = FxHashMap::default();
        let mut results = FxHashMap::default();
        for class in category.classes() {
            for table in category.raw_tables() {
                let writer = FileTableWriter::create(directory, raw_header(category, *class, *table))?;
                raw.insert((*class, *table), writer);
            }
            let writer = FileTableWriter::create(directory, result_header(category, *class))?;
            results.insert(*class, writer);
        }
        let fingerprints = FileTableWriter::create(directory, fingerprint_header())?;
        Ok(Self {
            directory: directory.to_path_buf(),
            category,
            raw,
            results,
            fingerprints,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn category(&self) -> TestCategory {
        self.category
    }

    pub fn raw_table(
        &mut self,
        class: ActivityClass,
        table: RawTable,
    ) -> Result<&mut FileTableWriter, StoreError> {
        let category = self.category;
        self.raw
            .get_mut(&(class, table))
            .ok_or_else(|| StoreError::MissingTable(class.raw_table_name(category, table)))
    }

    pub fn result_table(&mut self, class: ActivityClass) -> Result<&mut FileTableWriter, StoreError> {
        let category = self.category;
        self.results
            .get_mut(&class)
            .ok_or_else(|| StoreError::MissingTable(class.result_table_name(category)))
    }

    pub fn fingerprints(&mut self) -> &mut FileTableWriter {
        &mut self.fingerprints
    }

    /// Current row counts of a class's tables, i.e. where the next activity starts
    pub fn offsets(&self, class: ActivityClass) -> ActivityOffsets {
        let mut offsets = ActivityOffsets {
            raw: [0; MAX_RAW_TABLES],
            result: self.results.get(&class).map(|w| w.rows()).unwrap_or(0),
        };
        for table in self.category.raw_tables() {
            if let Some(writer) = self.raw.get(&(class, *table)) {
                offsets.raw[table.index()] = writer.rows();
            }
        }
        offsets
    }

    /// Flush every table and return the total size written
    pub fn close(self) -> Result<u64, StoreError> {
        let mut total = 0;
        let writers = self
            .raw
            .into_values()
            .chain(self.results.into_values())
            .chain(std::iter::once(self.fingerprints));
        for writer in writers {
            let size = writer.size_bytes();
            log::debug!(
                "Table {} closed with {} rows ({})",
                writer.name(),
                writer.rows(),
                human_bytes::human_bytes(size as f64)
            );
            total += size;
            writer.finish()?;
        }
        log::info!(
            "Store {} written: {}",
            self.directory.display(),
            human_bytes::human_bytes(total as f64)
        );
        Ok(total)
    }
}

/// Readers over the store of a previous run, used as the copy source of reconciliation.
/// Tables which do not exist are simply absent.
#[derive(Debug)]
pub struct StoreArchive {
    directory: PathBuf,
    category: TestCategory,
    raw: FxHashMap<(ActivityClass, RawTable), FileTableReader>,
    results: FxHashMap<ActivityClass, FileTableReader>,
    fingerprints: FingerprintIndex,
}

impl StoreArchive {
    /// Open every table of a previous store. Tables whose layout differs from the
    /// current one make the whole archive unusable.
    pub fn open(directory: &Path, category: TestCategory) -> Result<Self, StoreError> {
        let mut raw = FxHashMap::default();
        let mut results = FxHashMap::default();
        for class in category.classes() {
            for table in category.raw_tables() {
                let expected = raw_header(category, *class, *table);
                if let Some(reader) = Self::open_table(directory, &expected)? {
                    raw.insert((*class, *table), reader);
                }
            }
            let expected = result_header(category, *class);
            if let Some(reader) = Self::open_table(directory, &expected)? {
                results.insert(*class, reader);
            }
        }
        let fingerprints = match Self::open_table(directory, &fingerprint_header())? {
            Some(mut reader) => FingerprintIndex::load(&mut reader)?,
            None => FingerprintIndex::new(),
        };
        log::info!(
            "Opened archived store {} with {} fingerprints",
            directory.display(),
            fingerprints.len()
        );
        Ok(Self {
            directory: directory.to_path_buf(),
            category,
            raw,
            results,
            fingerprints,
        })
    }

    fn open_table(directory: &Path, expected: &TableHeader) -> Result<Option<FileTableReader>, StoreError> {
        let path = table_path(directory, &expected.name);
        if !path.exists() {
            return Ok(None);
        }
        let reader = FileTableReader::open(&path)?;
        reader.header().check_layout(&expected.columns)?;
        Ok(Some(reader))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn fingerprints(&self) -> &FingerprintIndex {
        &self.fingerprints
    }

    pub fn raw_table(
        &mut self,
        class: ActivityClass,
        table: RawTable,
    ) -> Result<&mut FileTableReader, StoreError> {
        let category = self.category;
        self.raw
            .get_mut(&(class, table))
            .ok_or_else(|| StoreError::MissingTable(class.raw_table_name(category, table)))
    }

    pub fn result_table(&mut self, class: ActivityClass) -> Result<&mut FileTableReader, StoreError> {
        let category = self.category;
        self.results
            .get_mut(&class)
            .ok_or_else(|| StoreError::MissingTable(class.result_table_name(category)))
    }
}
