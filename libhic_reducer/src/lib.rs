//! # hic_reducer
//!
//! hic_reducer is the data reduction tool for the test results of the ALICE ITS Hybrid
//! Integrated Circuits (HICs), written in Rust. It walks the test activities recorded in
//! an activity catalog, reads the result and raw data files the test system left on EOS,
//! and reduces them into compact binary tables: one result table and one or two raw
//! tables per activity class, plus a fingerprint table which makes later runs
//! incremental.
//!
//! ## Installation
//!
//! The only method of install is from source. If you have not used Rust before, see the
//! [Rust docs](https://www.rust-lang.org/tools/install) for installation instructions.
//!
//! To build and install the CLI use `cargo install --path ./hic_reducer_cli` from the top
//! level repository. The optional HDF5 export is enabled with `--features hdf5`, which
//! requires an HDF5 install the hdf5 crate can find (set `HDF5_DIR` in
//! `.cargo/config.toml` for a custom location).
//!
//! ## Configuration
//!
//! A configuration is a YAML file:
//!
//! ```yml
//! catalog_path: /data/catalog.yml
//! output_path: /data/reduced
//! hic_type: OB
//! test: ThresholdScan
//! resume: true
//! all_threshold_scans: false
//! refresh_interval: 50
//! hdf_path: null
//! ```
//!
//! - `catalog_path`: the activity catalog manifest, see [`catalog::ManifestCatalog`]
//! - `output_path`: directory the stores are written to
//! - `hic_type`: `OB` (14 chips) or `IB` (9 chips)
//! - `test`: one of `PowerTest`, `DigitalScan`, `ThresholdScan`, `NoiseScan`, `DctrlTest`
//! - `resume`: reconcile against the existing store instead of reducing everything again
//! - `all_threshold_scans`: also reduce the untuned threshold scans
//! - `refresh_interval`: number of components between catalog refreshes, at least 1
//! - `hdf_path`: directory for an HDF5 copy of the store (needs the `hdf5` feature)
//!
//! ## Output
//!
//! A run writes the store `<output_path>/<OB|IB>HIC_<test>_AllHICs/`, one `.tbl` file per
//! table. With `resume` the previous store is moved to `..._AllHICs_old` and every
//! activity found in its fingerprint table is copied instead of parsed, so an unchanged
//! catalog reproduces the store byte for byte.
//!
//! ### Table Format
//!
//! ```text
//! "HICT" | version u16 | name | table kind | column count u16 | columns...
//! rows: fixed width, little endian, every row starts with hicID u32, actID u32
//! ```
//!
//! Tables are named after the activity class (`hicQual`, `hicRecp`, `hicHS`, `hicStave`,
//! `hicStaveQual`, `hicStaveRecp`) with the suffix `Tree` (raw), `TunTree` (threshold
//! tuning) or `ResTree` (results). The fingerprints live in `actFastListTree`.
pub mod catalog;
pub mod category;
pub mod chip;
pub mod condition;
pub mod config;
pub mod constants;
pub mod error;
pub mod fingerprint;
#[cfg(feature = "hdf5")]
pub mod hdf_writer;
pub mod process;
pub mod raw;
pub mod reconcile;
pub mod record;
pub mod scanner;
pub mod store;
pub mod text;
pub mod worker_status;
