use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use super::catalog::{Activity, ActivityCatalog, Component, FileRequest, WaferTable};
use super::category::{classify, ActivityClass, StaveLayer, TestCategory};
use super::condition::Condition;
use super::config::Config;
use super::error::{ProcessorError, ReconcileError, ScanError, StoreError};
use super::fingerprint::ActivityFingerprint;
#[cfg(feature = "hdf5")]
use super::hdf_writer::export_store;
use super::raw::{iv_curve, DigitalRaster, DriverSettingRows, NoisyPixelRows, ThresholdRows};
use super::reconcile::copy_activity;
use super::record::{Identity, Measurement, RawRow, ResultRecord};
use super::scanner::ResultScanner;
use super::store::{StoreArchive, StoreSet};
use super::text::read_lines;
use super::worker_status::{OutcomeCounts, WorkerStatus};

/// How a single activity ended up in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// Reduced from its files
    Parsed,
    /// Copied from the previous store
    Reconciled,
    /// The activity has no EOS directory
    SkippedEmptyPath,
    /// Reading the files added no rows to at least one table; not fingerprinted
    SkippedParseFailure,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: ActivityOutcome) {
        match outcome {
            ActivityOutcome::Parsed => self.parsed += 1,
            ActivityOutcome::Reconciled => self.reconciled += 1,
            ActivityOutcome::SkippedEmptyPath => self.skipped_empty_path += 1,
            ActivityOutcome::SkippedParseFailure => self.skipped_parse_failure += 1,
        }
    }
}

/// What a run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub store_directory: PathBuf,
    pub components: usize,
    pub counts: OutcomeCounts,
    pub store_bytes: u64,
}

/// Everything about one activity that ends up in the identity columns
struct ActivityContext<'a> {
    component: &'a Component,
    activity: &'a Activity,
    class: ActivityClass,
    position: i8,
    wafers: &'a WaferTable,
}

impl ActivityContext<'_> {
    fn identity(&self, condition: Condition) -> Identity {
        Identity {
            hic_id: self.component.id,
            act_id: self.activity.id,
            loc_id: self.activity.location_id,
            start_date: self.activity.start_date,
            cond_vb: condition.code(),
            hic_position: self.position,
            stave_layer: StaveLayer::from_type_name(&self.activity.type_name).code(),
            hic_class: self.activity.grade(),
        }
    }
}

fn first_file<C: ActivityCatalog + ?Sized>(
    catalog: &C,
    activity: &Activity,
    request: &FileRequest,
    eos_path: &Path,
) -> Option<PathBuf> {
    catalog
        .file_names(activity, request)
        .into_iter()
        .next()
        .map(|name| eos_path.join(name))
}

/// Read every raw file of the activity into the raw tables of its class
fn fill_raw_tables<C: ActivityCatalog + ?Sized>(
    config: &Config,
    catalog: &C,
    ctx: &ActivityContext,
    eos_path: &Path,
    store: &mut StoreSet,
) -> Result<(), ProcessorError> {
    let remap = config.hic_type.remap();
    for step in config
        .test
        .raw_steps(config.hic_type, config.all_threshold_scans)
    {
        let Some(path) = first_file(catalog, ctx.activity, &step.request, eos_path) else {
            continue;
        };
        let lines = match read_lines(&path) {
            Ok(lines) => lines,
            Err(_) => {
                let error = ScanError::CannotOpen {
                    routine: "fill_raw_tables",
                    path,
                };
                log::warn!("{error}");
                continue;
            }
        };
        let identity = ctx.identity(step.request.condition);
        let chip = step.slot.unwrap_or(0) as u8;
        let table = store.raw_table(ctx.class, step.table)?;
        let mut append = |measurement: Measurement| -> Result<(), StoreError> {
            table.append(&mut RawRow::new(identity, measurement))
        };

        match config.test {
            TestCategory::PowerTest => append(Measurement::IvCurve(iv_curve(&lines)))?,
            TestCategory::DigitalScan => {
                for hit in DigitalRaster::new(lines.iter(), chip) {
                    append(Measurement::DigitalHit(hit))?;
                }
            }
            TestCategory::ThresholdScan => {
                let wafer = ctx.wafers.lookup(chip as usize);
                for mut pixel in ThresholdRows::new(lines.iter(), chip) {
                    (pixel.wafer_number, pixel.wafer_position) = wafer;
                    append(Measurement::ThresholdPixel(pixel))?;
                }
            }
            TestCategory::NoiseScan => {
                for pixel in NoisyPixelRows::new(lines.iter(), remap) {
                    append(Measurement::NoisyPixel(pixel))?;
                }
            }
            TestCategory::DctrlTest => {
                for setting in DriverSettingRows::new(lines.iter(), remap) {
                    append(Measurement::DriverSetting(setting))?;
                }
            }
        }
    }
    Ok(())
}

/// Scan the result file of every condition into the result table of the class
fn fill_result_table<C: ActivityCatalog + ?Sized>(
    config: &Config,
    catalog: &C,
    ctx: &ActivityContext,
    eos_path: &Path,
    store: &mut StoreSet,
) -> Result<(), ProcessorError> {
    let scanner = ResultScanner::new(config.test, config.hic_type.remap());
    let mut record = ResultRecord::new(config.test);
    for condition in config.test.result_conditions() {
        let request = FileRequest::result(*condition);
        let Some(path) = first_file(catalog, ctx.activity, &request, eos_path) else {
            continue;
        };
        record.identity = ctx.identity(*condition);
        if let Err(e) = scanner.scan_file(&path, &mut record) {
            log::warn!("{e}");
            continue;
        }
        scanner.fill_classification(&ctx.activity.parameters, *condition, &mut record);
        store.result_table(ctx.class)?.append(&mut record)?;
    }
    Ok(())
}

/// Reduce one activity from its files and fingerprint it if every table got rows
fn parse_activity<C: ActivityCatalog + ?Sized>(
    config: &Config,
    catalog: &C,
    ctx: &ActivityContext,
    store: &mut StoreSet,
) -> Result<ActivityOutcome, ProcessorError> {
    let Some(eos_path) = catalog.eos_path(ctx.activity) else {
        log::warn!(
            "EOS for this activity does not exist: {} {}",
            ctx.activity.name,
            ctx.activity.type_name
        );
        return Ok(ActivityOutcome::SkippedEmptyPath);
    };

    let before = store.offsets(ctx.class);
    fill_raw_tables(config, catalog, ctx, &eos_path, store)?;
    fill_result_table(config, catalog, ctx, &eos_path, store)?;
    let after = store.offsets(ctx.class);

    let raw_filled = config
        .test
        .raw_tables()
        .iter()
        .all(|table| after.raw[table.index()] > before.raw[table.index()]);
    if !raw_filled || after.result == before.result {
        log::warn!("Trees not filled for activity {}", ctx.activity.name);
        return Ok(ActivityOutcome::SkippedParseFailure);
    }

    let mut fingerprint = ActivityFingerprint::new(
        ctx.component.id,
        ctx.activity.id,
        ctx.class.mask(),
        before,
    );
    store.fingerprints().append(&mut fingerprint)?;
    log::debug!(
        "Parsed activity {} of HIC {}",
        ctx.activity.name,
        ctx.component.name
    );
    Ok(ActivityOutcome::Parsed)
}

/// Copy an activity from the previous store. Returns None when the archive cannot
/// be trusted for it and the activity has to be parsed again.
fn reconcile_activity(
    ctx: &ActivityContext,
    fingerprint: &ActivityFingerprint,
    archive: &mut StoreArchive,
    store: &mut StoreSet,
) -> Result<Option<ActivityOutcome>, ProcessorError> {
    match copy_activity(fingerprint, ctx.class, archive, store) {
        Ok(report) => {
            let mut fingerprint = ActivityFingerprint::new(
                fingerprint.hic_id,
                fingerprint.act_id,
                fingerprint.mask,
                report.offsets,
            );
            store.fingerprints().append(&mut fingerprint)?;
            log::info!(
                "Activity already in store, copied {} rows of {}",
                report.total_rows(),
                ctx.activity.name
            );
            Ok(Some(ActivityOutcome::Reconciled))
        }
        Err(e @ ReconcileError::OffsetMismatch { .. })
        | Err(e @ ReconcileError::StoreError(StoreError::MissingTable(_))) => {
            log::warn!("{e}. Parsing activity {} again.", ctx.activity.name);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Run one activity through the state machine: classify, then reconcile or parse.
/// Returns None for activities which belong to none of the classes.
fn process_activity<C: ActivityCatalog + ?Sized>(
    config: &Config,
    catalog: &C,
    component: &Component,
    activity: &Activity,
    wafers: &WaferTable,
    archive: Option<&mut StoreArchive>,
    store: &mut StoreSet,
) -> Result<Option<ActivityOutcome>, ProcessorError> {
    let Some(class) = classify(&activity.type_name, config.test) else {
        return Ok(None);
    };
    let ctx = ActivityContext {
        component,
        activity,
        class,
        position: catalog.position(component),
        wafers,
    };

    if let Some(archive) = archive {
        let found = archive
            .fingerprints()
            .find(component.id, activity.id, class.mask())
            .copied();
        if let Some(fingerprint) = found {
            if let Some(outcome) = reconcile_activity(&ctx, &fingerprint, archive, store)? {
                return Ok(Some(outcome));
            }
        }
    }

    parse_activity(config, catalog, &ctx, store).map(Some)
}

/// Move an existing store out of the way. With `resume` it becomes the archive
/// reconciliation copies from, otherwise it is discarded.
fn prepare_store(config: &Config) -> Result<Option<StoreArchive>, ProcessorError> {
    let store_dir = config.get_store_directory();
    if !store_dir.exists() {
        return Ok(None);
    }
    if !config.resume {
        log::info!("Redoing {} from scratch", store_dir.display());
        std::fs::remove_dir_all(&store_dir)?;
        return Ok(None);
    }

    let old_dir = config.get_old_store_directory();
    if old_dir.exists() {
        std::fs::remove_dir_all(&old_dir)?;
    }
    std::fs::rename(&store_dir, &old_dir)?;
    log::info!("Existing store moved to {}", old_dir.display());
    match StoreArchive::open(&old_dir, config.test) {
        Ok(archive) => Ok(Some(archive)),
        Err(e) => {
            log::warn!(
                "Cannot reconcile against {} ({e}), every activity will be parsed",
                old_dir.display()
            );
            Ok(None)
        }
    }
}

/// The main loop of hic_reducer.
///
/// Reduces every activity of the configured test category, for every component of
/// the catalog, into the store directory of the configuration. Progress is reported
/// at the start, after every activity and once more after every component.
pub fn process<C: ActivityCatalog + ?Sized>(
    config: &Config,
    catalog: &mut C,
    tx: &Sender<WorkerStatus>,
) -> Result<RunSummary, ProcessorError> {
    if !config.is_refresh_interval_valid() {
        return Err(ProcessorError::BadRefreshInterval(config.refresh_interval));
    }

    let mut archive = prepare_store(config)?;
    let store_dir = config.get_store_directory();
    let mut store = StoreSet::create(&store_dir, config.test)?;
    let remap = config.hic_type.remap();

    let components = catalog.components();
    let total = components.len().max(1) as f32;
    let mut counts = OutcomeCounts::default();
    log::info!(
        "Reducing {} of {} components into {}",
        config.test,
        components.len(),
        store_dir.display()
    );

    tx.send(WorkerStatus::new(0.0, 0, counts))?;
    for (index, component) in components.iter().enumerate() {
        let wafers = WaferTable::new(&component.children, remap);
        let activities = catalog.activities(component, config.test);
        let per_activity = 1.0 / activities.len().max(1) as f32;
        for (done, activity) in activities.iter().enumerate() {
            let outcome = process_activity(
                config,
                &*catalog,
                component,
                activity,
                &wafers,
                archive.as_mut(),
                &mut store,
            )?;
            if let Some(outcome) = outcome {
                counts.record(outcome);
            }
            let progress = (index as f32 + (done + 1) as f32 * per_activity) / total;
            tx.send(WorkerStatus::new(progress, component.id, counts))?;
        }
        tx.send(WorkerStatus::new(
            (index + 1) as f32 / total,
            component.id,
            counts,
        ))?;

        if (index + 1) % config.refresh_interval == 0 {
            log::info!("{} components done, refreshing the catalog", index + 1);
            catalog.refresh()?;
        }
    }

    let store_bytes = store.close()?;
    log::info!(
        "Store {} filled with {} activities ({} copied, {} skipped)",
        store_dir.display(),
        counts.recorded(),
        counts.reconciled,
        counts.skipped()
    );

    #[cfg(feature = "hdf5")]
    if let Some(hdf_path) = config.get_hdf_file_name()? {
        export_store(&store_dir, config.test, &hdf_path)?;
    }

    Ok(RunSummary {
        store_directory: store_dir,
        components: components.len(),
        counts,
        store_bytes,
    })
}

/// Reduce a single activity into a store of its own, named after the activity.
/// Nothing is reconciled; an existing directory of that name is replaced.
pub fn process_single_activity<C: ActivityCatalog + ?Sized>(
    config: &Config,
    catalog: &C,
    hic_id: u32,
    act_id: u32,
) -> Result<RunSummary, ProcessorError> {
    let component = catalog
        .components()
        .into_iter()
        .find(|c| c.id == hic_id)
        .ok_or(ProcessorError::UnknownComponent(hic_id))?;
    let activity = catalog
        .activities(&component, config.test)
        .into_iter()
        .find(|a| a.id == act_id)
        .ok_or(ProcessorError::UnknownActivity(hic_id, act_id))?;

    let store_dir = config.get_activity_directory(&activity.name);
    if store_dir.exists() {
        std::fs::remove_dir_all(&store_dir)?;
    }
    let mut store = StoreSet::create(&store_dir, config.test)?;
    let wafers = WaferTable::new(&component.children, config.hic_type.remap());

    let mut counts = OutcomeCounts::default();
    match process_activity(config, catalog, &component, &activity, &wafers, None, &mut store)? {
        Some(outcome) => counts.record(outcome),
        None => log::warn!(
            "Activity {} of type {} is not a {} activity of any known class",
            activity.name,
            activity.type_name,
            config.test
        ),
    }
    let store_bytes = store.close()?;

    Ok(RunSummary {
        store_directory: store_dir,
        components: 1,
        counts,
        store_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ManifestCatalog;
    use crate::chip::HicType;
    use crate::error::CatalogError;
    use crate::record::{MeasurementKind, Payload, ThresholdPixel};
    use crate::store::{table_path, FileTableReader};
    use std::sync::mpsc;

    const MANIFEST: &str = r#"
components:
  - id: 1
    name: OBHIC-A01
    position: 3
    activities:
      - id: 11
        name: OBHIC-A01 Qualification
        type_name: OB-HIC Qualification Test
        start_date: "2019-03-08T10:00:00Z"
        result: OK, gold
        categories: [PowerTest]
        eos_path: eos/act11
        parameters:
          - name: Classification Version
            value: 2
          - name: Classification Power Test
            value: 1
        files:
          - kind: Data
            names: [IVbias.dat]
          - kind: Result
            names: [PowerTestResult.dat]
      - id: 12
        name: OBHIC-A01 Reception
        type_name: OB-HIC Reception Test
        start_date: "2019-04-01T08:00:00Z"
        categories: [PowerTest]
        eos_path: eos/missing
      - id: 13
        name: OBHIC-A01 Requalification
        type_name: OB-HIC Qualification Test
        start_date: "2019-05-01T08:00:00Z"
        categories: [PowerTest]
        eos_path: eos/act13
      - id: 14
        name: OBHIC-A01 Impedance
        type_name: OB-HIC Impedance Test
        start_date: "2019-05-02T08:00:00Z"
        categories: [PowerTest]
        eos_path: eos/act11
"#;

    const RESULT_FILE: &str = "Power test result\nHIC: OBHIC-A01\n\n\
IDDD at switchon: 0.25\nIBias at 0V: 0.02\nTemp (end): 25.5\nBoard registers\nIBias at 3V: 9.9\n";

    struct Fixture {
        dir: tempfile::TempDir,
        config: Config,
        catalog: ManifestCatalog,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let act11 = dir.path().join("eos/act11");
        std::fs::create_dir_all(&act11).unwrap();
        std::fs::create_dir_all(dir.path().join("eos/act13")).unwrap();
        std::fs::write(act11.join("IVbias.dat"), "0.0 1.5\n-0.1 1.75\n").unwrap();
        std::fs::write(act11.join("PowerTestResult.dat"), RESULT_FILE).unwrap();
        let catalog = ManifestCatalog::from_yaml(MANIFEST, dir.path()).unwrap();
        let config = Config {
            output_path: dir.path().join("out"),
            hic_type: HicType::Outer,
            test: TestCategory::PowerTest,
            resume: true,
            ..Default::default()
        };
        Fixture {
            dir,
            config,
            catalog,
        }
    }

    fn run(fixture: &mut Fixture) -> RunSummary {
        let (tx, rx) = mpsc::channel();
        let summary = process(&fixture.config, &mut fixture.catalog, &tx).unwrap();
        let last = rx.try_iter().last().unwrap();
        assert_eq!(last.progress, 1.0);
        assert_eq!(last.counts, summary.counts);
        summary
    }

    fn store_files(directory: &Path) -> Vec<(String, Vec<u8>)> {
        let mut files: Vec<(String, Vec<u8>)> = std::fs::read_dir(directory)
            .unwrap()
            .map(|entry| {
                let path = entry.unwrap().path();
                let name = path.file_name().unwrap().to_string_lossy().into_owned();
                (name, std::fs::read(&path).unwrap())
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn test_fresh_run_outcomes() {
        let mut fixture = fixture();
        let summary = run(&mut fixture);
        assert_eq!(summary.components, 1);
        assert_eq!(
            summary.counts,
            OutcomeCounts {
                parsed: 1,
                reconciled: 0,
                skipped_empty_path: 1,
                skipped_parse_failure: 1,
            }
        );

        let dir = &summary.store_directory;
        assert!(dir.ends_with("OBHIC_PowerTest_AllHICs"));
        let mut results = FileTableReader::open(&table_path(dir, "hicQualResTree")).unwrap();
        assert_eq!(results.rows(), 1);
        let mut record = ResultRecord::new(TestCategory::PowerTest);
        results.read_row(0, &mut record).unwrap();
        assert_eq!(record.identity.hic_id, 1);
        assert_eq!(record.identity.act_id, 11);
        assert_eq!(record.identity.start_date, 1552039200);
        assert_eq!(record.identity.hic_position, 3);
        assert_eq!(record.identity.hic_class, 1);
        assert_eq!(record.supply.temp_end, 25.5);
        assert_eq!(record.classification.version, 2.0);
        assert_eq!(record.classification.grade, 1.0);
        match record.payload {
            Payload::Power(p) => {
                assert_eq!(p.iddd_switch_on, 0.25);
                assert_eq!(p.ibias_0v, 0.02);
                assert_eq!(p.ibias_3v, 0.0);
            }
            _ => panic!("wrong payload"),
        }

        let raw = FileTableReader::open(&table_path(dir, "hicQualTree")).unwrap();
        assert_eq!(raw.rows(), 1);
        let fingerprints = FileTableReader::open(&table_path(dir, "actFastListTree")).unwrap();
        assert_eq!(fingerprints.rows(), 1);
    }

    #[test]
    fn test_second_run_is_identical() {
        let mut fixture = fixture();
        let first = run(&mut fixture);
        let before = store_files(&first.store_directory);

        let second = run(&mut fixture);
        assert_eq!(second.counts.reconciled, 1);
        assert_eq!(second.counts.parsed, 0);
        assert_eq!(second.counts.skipped(), 2);
        assert_eq!(store_files(&second.store_directory), before);
        assert!(fixture.config.get_old_store_directory().exists());

        let third = run(&mut fixture);
        assert_eq!(third.counts.reconciled, 1);
        assert_eq!(store_files(&third.store_directory), before);
    }

    #[test]
    fn test_status_after_every_activity() {
        let mut fixture = fixture();
        let (tx, rx) = mpsc::channel();
        process(&fixture.config, &mut fixture.catalog, &tx).unwrap();
        let statuses: Vec<WorkerStatus> = rx.try_iter().collect();

        // start, four activities, end of component
        assert_eq!(statuses.len(), 6);
        let progress: Vec<f32> = statuses.iter().map(|s| s.progress).collect();
        assert_eq!(progress, vec![0.0, 0.25, 0.5, 0.75, 1.0, 1.0]);
        assert_eq!(statuses[1].counts.parsed, 1);
        assert_eq!(statuses[2].counts.skipped_empty_path, 1);
        assert_eq!(statuses[3].counts.skipped_parse_failure, 1);
        // The impedance test belongs to no class but still ticks
        assert_eq!(statuses[4].counts, statuses[3].counts);
        assert!(statuses[1..].iter().all(|s| s.hic_id == 1));
    }

    #[test]
    fn test_redo_from_scratch() {
        let mut fixture = fixture();
        run(&mut fixture);
        fixture.config.resume = false;
        let summary = run(&mut fixture);
        assert_eq!(summary.counts.parsed, 1);
        assert_eq!(summary.counts.reconciled, 0);
        assert!(!fixture.config.get_old_store_directory().exists());
    }

    #[test]
    fn test_corrupt_archive_falls_back_to_parsing() {
        let mut fixture = fixture();
        let first = run(&mut fixture);
        // Drop the result row so the fingerprint points past the end
        let result_path = table_path(&first.store_directory, "hicQualResTree");
        let header_only = {
            let reader = FileTableReader::open(&result_path).unwrap();
            reader.byte_offset(0)
        };
        let bytes = std::fs::read(&result_path).unwrap();
        std::fs::write(&result_path, &bytes[..header_only as usize]).unwrap();

        let summary = run(&mut fixture);
        assert_eq!(summary.counts.parsed, 1);
        assert_eq!(summary.counts.reconciled, 0);
    }

    #[test]
    fn test_unreadable_archive_is_ignored() {
        let mut fixture = fixture();
        let first = run(&mut fixture);
        std::fs::write(table_path(&first.store_directory, "hicRecpResTree"), b"junk").unwrap();

        let summary = run(&mut fixture);
        assert_eq!(summary.counts.parsed, 1);
        assert_eq!(summary.counts.reconciled, 0);
    }

    #[test]
    fn test_bad_refresh_interval() {
        let mut fixture = fixture();
        fixture.config.refresh_interval = 0;
        let (tx, _rx) = mpsc::channel();
        assert!(matches!(
            process(&fixture.config, &mut fixture.catalog, &tx),
            Err(ProcessorError::BadRefreshInterval(0))
        ));
    }

    const THRESHOLD_FILES: &str = r#"
        files:
          - { kind: Data, chip: 0, condition: 200, names: [ThresholdScan_200_chip0.dat] }
          - { kind: Data, chip: 8, condition: 200, names: [ThresholdScan_200_chip8.dat] }
          - { kind: Data, chip: 8, condition: 203, names: [ThresholdScan_203_chip8.dat] }
          - { kind: Data, chip: 0, condition: 100, names: [ThresholdScan_100_chip0.dat] }
          - { kind: IthrTune, chip: 0, condition: 100, names: [IthrTune_chip0.dat] }
          - { kind: VcasnTune, chip: 8, condition: 200, names: [VcasnTune_chip8.dat] }
          - { kind: Result, condition: 100, names: [ThresholdScanResult_100.dat] }
          - { kind: Result, condition: 200, names: [ThresholdScanResult_200.dat] }
"#;

    const THRESHOLD_MANIFEST: &str = r#"
components:
  - id: 5
    name: OBHIC-B02
    position: 2
    children:
      - { position: 0, wafer_number: 12, wafer_position: 40 }
      - { position: 8, wafer_number: 12, wafer_position: 41 }
    activities:
      - id: 51
        name: OBHIC-B02 Qualification
        type_name: OB-HIC Qualification Test
        start_date: "2019-06-03T09:00:00Z"
        result: OK, silver
        categories: [ThresholdScan]
        eos_path: eos/act51
"#;

    const SECOND_COMPONENT: &str = r#"
  - id: 6
    name: OBHIC-B03
    activities:
      - id: 61
        name: OBHIC-B03 Qualification
        type_name: OB-HIC Qualification Test
        start_date: "2019-06-04T09:00:00Z"
        categories: [ThresholdScan]
        eos_path: eos/act51
"#;

    fn threshold_fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let act51 = dir.path().join("eos/act51");
        std::fs::create_dir_all(&act51).unwrap();
        let files = [
            ("ThresholdScan_200_chip0.dat", "0 0 10.5 2.25 1.0\n1 0 11,25 2,5 0.9\n"),
            ("ThresholdScan_200_chip8.dat", "5 3 9.5 1.75 0.8\n"),
            ("ThresholdScan_203_chip8.dat", "# col row thr noise chisq\n6 3 8.0 1.5 0.7\n"),
            ("ThresholdScan_100_chip0.dat", "9 9 99.0 9.0 9.0\n"),
            ("IthrTune_chip0.dat", "2 2 50.0 3.0 1.1\n"),
            ("VcasnTune_chip8.dat", "4 4 60.0 3.5 1.2\n"),
            (
                "ThresholdScanResult_100.dat",
                "Threshold scan result\nHIC: OBHIC-B02\n\nTimeouts: 1\nNumber of chips: 2\n\
Result chip 0:\nAv. Threshold: 10.5\nResult chip 8:\nAv. Threshold: 9.5\n",
            ),
            (
                "ThresholdScanResult_200.dat",
                "Threshold scan result\nHIC: OBHIC-B02\n\nNumber of chips: 2\n\
Result chip 0:\nAv. Threshold: 5.25\n",
            ),
        ];
        for (name, content) in files {
            std::fs::write(act51.join(name), content).unwrap();
        }

        let manifest = format!(
            "{THRESHOLD_MANIFEST}{THRESHOLD_FILES}{SECOND_COMPONENT}{THRESHOLD_FILES}"
        );
        let catalog = ManifestCatalog::from_yaml(&manifest, dir.path()).unwrap();
        let config = Config {
            output_path: dir.path().join("out"),
            hic_type: HicType::Outer,
            test: TestCategory::ThresholdScan,
            resume: true,
            ..Default::default()
        };
        Fixture {
            dir,
            config,
            catalog,
        }
    }

    fn threshold_row(reader: &mut FileTableReader, row: u64) -> (Identity, ThresholdPixel) {
        let mut raw = RawRow::empty(MeasurementKind::ThresholdPixel);
        reader.read_row(row, &mut raw).unwrap();
        match raw.measurement {
            Measurement::ThresholdPixel(pixel) => (raw.identity, pixel),
            _ => panic!("wrong measurement"),
        }
    }

    #[test]
    fn test_threshold_scan_run() {
        let mut fixture = threshold_fixture();
        let first = run(&mut fixture);
        assert_eq!(first.components, 2);
        assert_eq!(first.counts.parsed, 2);
        let dir = &first.store_directory;

        // Tuned scans only: 200 for both chips, 203 for chip 8. Chip 8 is slot 7.
        let mut scans = FileTableReader::open(&table_path(dir, "hicQualTree")).unwrap();
        assert_eq!(scans.rows(), 8);
        let expected = [
            (200, 0, (12, 40), 1050, 225),
            (200, 0, (12, 40), 1125, 250),
            (200, 7, (12, 41), 950, 175),
            (203, 7, (12, 41), 800, 150),
        ];
        for (row, (cond, chip, wafer, threshold, noise)) in expected.into_iter().enumerate() {
            let (identity, pixel) = threshold_row(&mut scans, row as u64);
            assert_eq!(identity.hic_id, 5);
            assert_eq!(identity.cond_vb, cond);
            assert_eq!(identity.hic_position, 2);
            assert_eq!(identity.hic_class, 2);
            assert_eq!(pixel.chip, chip);
            assert_eq!((pixel.wafer_number, pixel.wafer_position), wafer);
            assert_eq!((pixel.threshold, pixel.noise), (threshold, noise));
        }
        let (identity, pixel) = threshold_row(&mut scans, 4);
        assert_eq!(identity.hic_id, 6);
        assert_eq!((pixel.wafer_number, pixel.wafer_position), (-1, -1));

        let mut tuning = FileTableReader::open(&table_path(dir, "hicQualTunTree")).unwrap();
        assert_eq!(tuning.rows(), 4);
        let (identity, pixel) = threshold_row(&mut tuning, 0);
        assert_eq!((identity.cond_vb, pixel.chip, pixel.threshold), (100, 0, 5000));
        assert_eq!((pixel.wafer_number, pixel.wafer_position), (12, 40));
        let (identity, pixel) = threshold_row(&mut tuning, 1);
        assert_eq!((identity.cond_vb, pixel.chip, pixel.threshold), (200, 7, 6000));
        assert_eq!((pixel.wafer_number, pixel.wafer_position), (12, 41));

        let mut results = FileTableReader::open(&table_path(dir, "hicQualResTree")).unwrap();
        assert_eq!(results.rows(), 4);
        let mut record = ResultRecord::new(TestCategory::ThresholdScan);
        results.read_row(0, &mut record).unwrap();
        assert_eq!(record.identity.cond_vb, 100);
        match record.payload {
            Payload::Threshold(p) => {
                assert_eq!(p.timeouts, 1);
                assert_eq!(p.average_threshold[0], 10.5);
                assert_eq!(p.average_threshold[7], 9.5);
            }
            _ => panic!("wrong payload"),
        }
        results.read_row(1, &mut record).unwrap();
        assert_eq!(record.identity.cond_vb, 200);
        match record.payload {
            Payload::Threshold(p) => {
                assert_eq!(p.timeouts, 0);
                assert_eq!(p.average_threshold[0], 5.25);
                assert_eq!(p.average_threshold[7], 0.0);
            }
            _ => panic!("wrong payload"),
        }

        let mut fingerprints = FileTableReader::open(&table_path(dir, "actFastListTree")).unwrap();
        assert_eq!(fingerprints.rows(), 2);
        let mut fingerprint = ActivityFingerprint::default();
        fingerprints.read_row(1, &mut fingerprint).unwrap();
        assert_eq!((fingerprint.hic_id, fingerprint.act_id), (6, 61));
        assert_eq!(fingerprint.offsets.raw, [4, 2]);
        assert_eq!(fingerprint.offsets.result, 2);

        let before = store_files(dir);
        let second = run(&mut fixture);
        assert_eq!(second.counts.reconciled, 2);
        assert_eq!(second.counts.parsed, 0);
        assert_eq!(store_files(&second.store_directory), before);
    }

    struct CountingCatalog {
        inner: ManifestCatalog,
        refreshes: usize,
    }

    impl ActivityCatalog for CountingCatalog {
        fn components(&self) -> Vec<Component> {
            self.inner.components()
        }
        fn activities(&self, component: &Component, category: TestCategory) -> Vec<Activity> {
            self.inner.activities(component, category)
        }
        fn eos_path(&self, activity: &Activity) -> Option<PathBuf> {
            self.inner.eos_path(activity)
        }
        fn file_names(&self, activity: &Activity, request: &FileRequest) -> Vec<String> {
            self.inner.file_names(activity, request)
        }
        fn position(&self, component: &Component) -> i8 {
            self.inner.position(component)
        }
        fn refresh(&mut self) -> Result<(), CatalogError> {
            self.refreshes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_refresh_every_interval() {
        let fixture = fixture();
        let config = Config {
            refresh_interval: 1,
            ..fixture.config.clone()
        };
        let mut catalog = CountingCatalog {
            inner: fixture.catalog.clone(),
            refreshes: 0,
        };
        let (tx, _rx) = mpsc::channel();
        let summary = process(&config, &mut catalog, &tx).unwrap();
        assert_eq!(catalog.refreshes, 1);
        assert_eq!(summary.counts.parsed, 1);
    }

    #[test]
    fn test_single_activity() {
        let fixture = fixture();
        let summary =
            process_single_activity(&fixture.config, &fixture.catalog, 1, 11).unwrap();
        assert_eq!(summary.counts.parsed, 1);
        assert!(summary
            .store_directory
            .ends_with("OBHIC_PowerTest_OBHIC_A01_Qualification"));
        assert!(summary.store_directory.starts_with(fixture.dir.path()));

        assert!(matches!(
            process_single_activity(&fixture.config, &fixture.catalog, 2, 11),
            Err(ProcessorError::UnknownComponent(2))
        ));
        assert!(matches!(
            process_single_activity(&fixture.config, &fixture.catalog, 1, 99),
            Err(ProcessorError::UnknownActivity(1, 99))
        ));
    }
}
