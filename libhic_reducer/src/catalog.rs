use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::category::TestCategory;
use super::chip::ChipRemap;
use super::condition::Condition;
use super::error::CatalogError;

/// A chip mounted on a HIC, with the wafer it was cut from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildChip {
    /// Physical chip id on the HIC
    pub position: u32,
    pub wafer_number: i8,
    pub wafer_position: i8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub children: Vec<ChildChip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityParameter {
    pub name: String,
    pub value: f32,
}

/// One recorded test run against a component
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: u32,
    pub name: String,
    pub type_name: String,
    pub location_id: i32,
    /// Seconds since the Unix epoch
    pub start_date: u64,
    pub result_name: String,
    pub parameters: Vec<ActivityParameter>,
}

impl Activity {
    /// Value of the first parameter with exactly this name
    pub fn parameter(&self, name: &str) -> Option<f32> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value)
    }

    /// HIC grade encoded from the activity result
    pub fn grade(&self) -> i8 {
        grade_from_result(&self.result_name)
    }
}

/// Map an activity result name onto the HIC grade stored with raw rows
pub fn grade_from_result(result_name: &str) -> i8 {
    let lowered = result_name.to_ascii_lowercase();
    if lowered.contains("gold") {
        1
    } else if lowered.contains("silver") {
        2
    } else if lowered.contains("bronze") {
        3
    } else {
        -1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Data,
    Result,
    IthrTune,
    VcasnTune,
}

/// A request for the names of the files of one kind, chip and condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileRequest {
    pub kind: FileKind,
    pub chip: Option<u32>,
    pub condition: Condition,
}

impl FileRequest {
    pub fn new(kind: FileKind, chip: Option<u32>, condition: Condition) -> Self {
        Self {
            kind,
            chip,
            condition,
        }
    }

    pub fn result(condition: Condition) -> Self {
        Self::new(FileKind::Result, None, condition)
    }
}

/// Everything the reducer needs from the component/activity database and the
/// file system layout of the test results.
pub trait ActivityCatalog {
    fn components(&self) -> Vec<Component>;

    /// Activities of a component which ran a test of this category
    fn activities(&self, component: &Component, category: TestCategory) -> Vec<Activity>;

    /// Directory holding the activity's files, None if it cannot be found
    fn eos_path(&self, activity: &Activity) -> Option<PathBuf>;

    /// Candidate file names for a request; the first one is used
    fn file_names(&self, activity: &Activity, request: &FileRequest) -> Vec<String>;

    /// Position of the HIC in its half-stave or stave, -1 if not mounted
    fn position(&self, component: &Component) -> i8;

    /// Renew credentials or connections. Called periodically during long runs.
    fn refresh(&mut self) -> Result<(), CatalogError> {
        Ok(())
    }
}

/// Wafer number and position of every chip slot of one HIC, built once per component
#[derive(Debug, Clone, Default)]
pub struct WaferTable {
    slots: FxHashMap<usize, (i8, i8)>,
}

impl WaferTable {
    pub fn new(children: &[ChildChip], remap: ChipRemap) -> Self {
        let mut slots = FxHashMap::default();
        for child in children {
            if let Some(slot) = remap.logical_slot(child.position as i64) {
                slots.insert(slot, (child.wafer_number, child.wafer_position));
            }
        }
        Self { slots }
    }

    /// (wafer number, wafer position), -1 for chips without a known wafer
    pub fn lookup(&self, slot: usize) -> (i8, i8) {
        self.slots.get(&slot).copied().unwrap_or((-1, -1))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestFiles {
    kind: FileKind,
    #[serde(default)]
    chip: Option<u32>,
    #[serde(default)]
    condition: u8,
    names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestActivity {
    id: u32,
    name: String,
    type_name: String,
    #[serde(default)]
    location_id: i32,
    start_date: String,
    #[serde(default)]
    result: String,
    categories: Vec<TestCategory>,
    #[serde(default)]
    eos_path: Option<PathBuf>,
    #[serde(default)]
    parameters: Vec<ActivityParameter>,
    #[serde(default)]
    files: Vec<ManifestFiles>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestComponent {
    id: u32,
    name: String,
    #[serde(default = "unmounted")]
    position: i8,
    #[serde(default)]
    children: Vec<ChildChip>,
    #[serde(default)]
    activities: Vec<ManifestActivity>,
}

fn unmounted() -> i8 {
    -1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    components: Vec<ManifestComponent>,
}

#[derive(Debug, Clone)]
struct ActivityEntry {
    activity: Activity,
    categories: Vec<TestCategory>,
    eos_path: Option<PathBuf>,
    files: FxHashMap<FileRequest, Vec<String>>,
}

/// An activity catalog read from a YAML manifest.
///
/// Relative EOS paths are resolved against the directory of the manifest.
///
/// ```yml
/// components:
///   - id: 7
///     name: OBHIC-AL000123
///     position: 3            # -1 (default) when not mounted
///     children:
///       - { position: 0, wafer_number: 12, wafer_position: 40 }
///     activities:
///       - id: 1001
///         name: OBHIC-AL000123 Qualification
///         type_name: OB HIC Qualification Test
///         start_date: "2019-03-08T10:00:00Z"
///         result: GOLD
///         categories: [ThresholdScan]
///         eos_path: eos/1001
///         parameters:
///           - { name: Classification Version, value: 2.0 }
///         files:
///           - { kind: Result, condition: 100, names: [ThresholdScanResult_100.dat] }
///           - { kind: Data, chip: 0, condition: 200, names: [ThresholdScan_200_chip0.dat] }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManifestCatalog {
    components: Vec<Component>,
    positions: FxHashMap<u32, i8>,
    activities: FxHashMap<u32, Vec<ActivityEntry>>,
}

impl ManifestCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::BadFilePath(path.to_path_buf()));
        }
        let yaml_str = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or(Path::new("."));
        Self::from_yaml(&yaml_str, base)
    }

    pub fn from_yaml(yaml_str: &str, base: &Path) -> Result<Self, CatalogError> {
        let manifest: Manifest = serde_yaml::from_str(yaml_str)?;
        let mut catalog = Self::default();
        for comp in manifest.components {
            let mut entries = Vec::with_capacity(comp.activities.len());
            for act in comp.activities {
                entries.push(Self::convert_activity(act, base)?);
            }
            catalog.positions.insert(comp.id, comp.position);
            catalog.activities.insert(comp.id, entries);
            catalog.components.push(Component {
                id: comp.id,
                name: comp.name,
                children: comp.children,
            });
        }
        Ok(catalog)
    }

    fn convert_activity(act: ManifestActivity, base: &Path) -> Result<ActivityEntry, CatalogError> {
        let start_date = OffsetDateTime::parse(&act.start_date, &Rfc3339)
            .map_err(|e| CatalogError::BadStartDate(act.id, e.to_string()))?
            .unix_timestamp()
            .max(0) as u64;
        let files = act
            .files
            .into_iter()
            .map(|f| {
                (
                    FileRequest::new(f.kind, f.chip, Condition::new(f.condition)),
                    f.names,
                )
            })
            .collect();
        Ok(ActivityEntry {
            activity: Activity {
                id: act.id,
                name: act.name,
                type_name: act.type_name,
                location_id: act.location_id,
                start_date,
                result_name: act.result,
                parameters: act.parameters,
            },
            categories: act.categories,
            eos_path: act.eos_path.map(|p| base.join(p)),
            files,
        })
    }

    fn entry(&self, activity: &Activity) -> Option<&ActivityEntry> {
        self.activities
            .values()
            .flatten()
            .find(|e| e.activity.id == activity.id)
    }
}

impl ActivityCatalog for ManifestCatalog {
    fn components(&self) -> Vec<Component> {
        self.components.clone()
    }

    fn activities(&self, component: &Component, category: TestCategory) -> Vec<Activity> {
        self.activities
            .get(&component.id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.categories.contains(&category))
                    .map(|e| e.activity.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn eos_path(&self, activity: &Activity) -> Option<PathBuf> {
        self.entry(activity)?
            .eos_path
            .clone()
            .filter(|path| path.is_dir())
    }

    fn file_names(&self, activity: &Activity, request: &FileRequest) -> Vec<String> {
        self.entry(activity)
            .and_then(|e| e.files.get(request).cloned())
            .unwrap_or_default()
    }

    fn position(&self, component: &Component) -> i8 {
        self.positions.get(&component.id).copied().unwrap_or(-1)
    }
}
