use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Could not open activity catalog because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Activity catalog failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Activity catalog failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Activity {0} has an invalid start date: {1}")]
    BadStartDate(u32, String),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{routine}: cannot open input file {path:?}")]
    CannotOpen { routine: &'static str, path: PathBuf },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Store file {0:?} does not start with a table header")]
    BadMagic(PathBuf),
    #[error("Store file {0:?} has unsupported format version {1}")]
    BadVersion(PathBuf, u16),
    #[error("Store table {0} has an unknown column type code {1}")]
    UnknownColumnKind(String, u8),
    #[error("Store table {0} has an unknown table kind code {1}")]
    UnknownTableKind(String, u8),
    #[error("Store table {table} does not have the expected layout (column {column})")]
    LayoutMismatch { table: String, column: String },
    #[error("Store table {0} was not found in the archive")]
    MissingTable(String),
    #[error("Store row {row} requested beyond the end of table {table} ({rows} rows)")]
    RowOutOfRange { table: String, row: u64, rows: u64 },
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Reconciliation failed due to store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Row {offset} of table {table} does not belong to HIC {hic_id} activity {act_id}")]
    OffsetMismatch {
        table: String,
        offset: u64,
        hic_id: u32,
        act_id: u32,
    },
}

#[cfg(feature = "hdf5")]
#[derive(Debug, Error)]
pub enum HDF5WriterError {
    #[error("HDF5Writer failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("HDF5Writer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("HDF5Writer failed due to string conversion error: {0}")]
    StringError(#[from] hdf5::types::StringError),
    #[error("HDF5Writer failed due to array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
    #[error("HDF5Writer failed due to store error: {0}")]
    StoreError(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Catalog error: {0}")]
    CatalogError(#[from] CatalogError),
    #[error("Processor failed due to Store error: {0}")]
    StoreError(#[from] StoreError),
    #[error("Processor failed due to Reconcile error: {0}")]
    ReconcileError(#[from] ReconcileError),
    #[cfg(feature = "hdf5")]
    #[error("Processor failed due to HDF5Writer error: {0}")]
    HDFError(#[from] HDF5WriterError),
    #[error("Processor failed because the refresh interval {0} is invalid")]
    BadRefreshInterval(usize),
    #[error("Processor failed because component {0} was not found in the catalog")]
    UnknownComponent(u32),
    #[error("Processor failed because activity {1} was not found for component {0}")]
    UnknownActivity(u32, u32),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
