use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::catalog::{FileKind, FileRequest};
use super::chip::HicType;
use super::condition::Condition;
use super::record::MeasurementKind;

/// The five kinds of HIC test whose results are reduced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestCategory {
    #[default]
    PowerTest,
    DigitalScan,
    ThresholdScan,
    NoiseScan,
    DctrlTest,
}

const DIGITAL_CONDITIONS: [Condition; 4] = [
    Condition::new(100),
    Condition::new(103),
    Condition::new(90),
    Condition::new(110),
];

const SCAN_CONDITIONS: [Condition; 4] = [
    Condition::new(100),
    Condition::new(200),
    Condition::new(103),
    Condition::new(203),
];

const SINGLE_CONDITION: [Condition; 1] = [Condition::UNCONDITIONED];

impl TestCategory {
    pub const ALL: [TestCategory; 5] = [
        Self::PowerTest,
        Self::DigitalScan,
        Self::ThresholdScan,
        Self::NoiseScan,
        Self::DctrlTest,
    ];

    /// Name used in output directory names
    pub fn label(&self) -> &'static str {
        match self {
            Self::PowerTest => "PowerTest",
            Self::DigitalScan => "DigitalScan",
            Self::ThresholdScan => "ThresholdScan",
            Self::NoiseScan => "NoiseScan",
            Self::DctrlTest => "DCTRLTest",
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::PowerTest => 0,
            Self::DigitalScan => 1,
            Self::ThresholdScan => 2,
            Self::NoiseScan => 3,
            Self::DctrlTest => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Threshold and noise scans keep a single stave table for both stave test types
    pub fn splits_stave_tests(&self) -> bool {
        !matches!(self, Self::ThresholdScan | Self::NoiseScan)
    }

    pub fn classes(&self) -> &'static [ActivityClass] {
        if self.splits_stave_tests() {
            &ActivityClass::ALL
        } else {
            &ActivityClass::ALL[..4]
        }
    }

    pub fn measurement_kind(&self) -> MeasurementKind {
        match self {
            Self::PowerTest => MeasurementKind::IvCurve,
            Self::DigitalScan => MeasurementKind::DigitalHit,
            Self::ThresholdScan => MeasurementKind::ThresholdPixel,
            Self::NoiseScan => MeasurementKind::NoisyPixel,
            Self::DctrlTest => MeasurementKind::DriverSetting,
        }
    }

    /// Raw tables kept per activity class. Only threshold scans have a tuning table.
    pub fn raw_tables(&self) -> &'static [RawTable] {
        match self {
            Self::ThresholdScan => &[RawTable::Scan, RawTable::Tuning],
            _ => &[RawTable::Scan],
        }
    }

    /// Conditions under which a result file may exist, in fill order
    pub fn result_conditions(&self) -> &'static [Condition] {
        match self {
            Self::DigitalScan => &DIGITAL_CONDITIONS,
            Self::ThresholdScan | Self::NoiseScan => &SCAN_CONDITIONS,
            Self::PowerTest | Self::DctrlTest => &SINGLE_CONDITION,
        }
    }

    /// Whether a "Number of chips" line opens a per-chip summary section in result files
    pub fn has_chip_summary(&self) -> bool {
        matches!(self, Self::ThresholdScan | Self::NoiseScan | Self::DctrlTest)
    }

    /// Column holding the test classification in result tables
    pub fn classification_column(&self) -> &'static str {
        match self {
            Self::PowerTest => "classificPowTest",
            Self::DigitalScan => "classificDigiScan",
            Self::ThresholdScan => "classificThreScan",
            Self::NoiseScan => "classificNoisScan",
            Self::DctrlTest => "classifDctrlTest",
        }
    }

    /// Name of the activity parameter holding the classification for a condition
    pub fn classification_parameter(&self, condition: Condition) -> Option<&'static str> {
        match (self, condition.code()) {
            (Self::PowerTest, _) => Some("Classification Power Test"),
            (Self::DctrlTest, _) => Some("Classification Dctrl Measurement"),
            (Self::DigitalScan, 100) => Some("Classification Digital Scan BB 0"),
            (Self::DigitalScan, 103) => Some("Classification Digital Scan BB 3"),
            (Self::DigitalScan, 90) => Some("Classification Digital Scan BB 0, V -10%"),
            (Self::DigitalScan, 110) => Some("Classification Digital Scan BB 0, V +10%"),
            (Self::ThresholdScan, 100 | 200) => Some("Classification Threshold Scan 0.0 V"),
            (Self::ThresholdScan, 103 | 203) => Some("Classification Threshold Scan 3.0 V"),
            (Self::NoiseScan, 100) => Some("Classification Noise Occupancy 0.0 V"),
            (Self::NoiseScan, 103) => Some("Classification Noise Occupancy 3.0 V"),
            (Self::NoiseScan, 200) => Some("Classification Noise Occupancy 0.0 V, masked"),
            (Self::NoiseScan, 203) => Some("Classification Noise Occupancy 3.0 V, masked"),
            _ => None,
        }
    }

    /// Every raw file read for one activity, in the order the rows are appended.
    ///
    /// Per-chip files are requested with the physical chip id; the step carries the
    /// logical slot the rows are tagged with.
    pub fn raw_steps(&self, hic_type: HicType, all_threshold_scans: bool) -> Vec<RawStep> {
        let remap = hic_type.remap();
        let per_chip = |table: RawTable, kind: FileKind, condition: Condition| {
            hic_type
                .chip_ids()
                .into_iter()
                .filter_map(move |id| {
                    remap.logical_slot(id as i64).map(|slot| RawStep {
                        table,
                        request: FileRequest::new(kind, Some(id), condition),
                        slot: Some(slot),
                    })
                })
                .collect::<Vec<_>>()
        };
        let whole_hic = |condition: Condition| RawStep {
            table: RawTable::Scan,
            request: FileRequest::new(FileKind::Data, None, condition),
            slot: None,
        };

        match self {
            Self::PowerTest | Self::DctrlTest => vec![whole_hic(Condition::UNCONDITIONED)],
            Self::NoiseScan => SCAN_CONDITIONS.iter().map(|c| whole_hic(*c)).collect(),
            Self::DigitalScan => DIGITAL_CONDITIONS
                .iter()
                .flat_map(|c| per_chip(RawTable::Scan, FileKind::Data, *c))
                .collect(),
            Self::ThresholdScan => {
                let mut steps: Vec<RawStep> = SCAN_CONDITIONS
                    .iter()
                    .filter(|c| all_threshold_scans || c.is_tuned())
                    .flat_map(|c| per_chip(RawTable::Scan, FileKind::Data, *c))
                    .collect();
                steps.extend(per_chip(
                    RawTable::Tuning,
                    FileKind::IthrTune,
                    Condition::new(100),
                ));
                steps.extend(per_chip(
                    RawTable::Tuning,
                    FileKind::VcasnTune,
                    Condition::new(200),
                ));
                steps
            }
        }
    }
}

impl Display for TestCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Which raw table of an activity class a step fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawTable {
    Scan,
    Tuning,
}

impl RawTable {
    pub fn index(&self) -> usize {
        match self {
            Self::Scan => 0,
            Self::Tuning => 1,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Self::Scan => "",
            Self::Tuning => "Tun",
        }
    }
}

/// One raw file to read for an activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStep {
    pub table: RawTable,
    pub request: FileRequest,
    pub slot: Option<usize>,
}

/// Test campaign an activity belongs to. Each class has its own tables and its own
/// bit in the fingerprint mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityClass {
    Qualification,
    Reception,
    HalfStave,
    StaveQualification,
    StaveReception,
}

impl ActivityClass {
    pub const ALL: [ActivityClass; 5] = [
        Self::Qualification,
        Self::Reception,
        Self::HalfStave,
        Self::StaveQualification,
        Self::StaveReception,
    ];

    pub fn index(&self) -> usize {
        match self {
            Self::Qualification => 0,
            Self::Reception => 1,
            Self::HalfStave => 2,
            Self::StaveQualification => 3,
            Self::StaveReception => 4,
        }
    }

    pub fn mask(&self) -> u16 {
        match self {
            Self::Qualification => 1,
            Self::Reception => 2,
            Self::HalfStave => 4,
            Self::StaveQualification => 8,
            Self::StaveReception => 16,
        }
    }

    fn prefix(&self, category: TestCategory) -> &'static str {
        match self {
            Self::Qualification => "hicQual",
            Self::Reception => "hicRecp",
            Self::HalfStave => "hicHS",
            Self::StaveQualification if category.splits_stave_tests() => "hicStaveQual",
            Self::StaveQualification => "hicStave",
            Self::StaveReception => "hicStaveRecp",
        }
    }

    pub fn raw_table_name(&self, category: TestCategory, table: RawTable) -> String {
        format!("{}{}Tree", self.prefix(category), table.suffix())
    }

    pub fn result_table_name(&self, category: TestCategory) -> String {
        format!("{}ResTree", self.prefix(category))
    }
}

/// Sort an activity into its class from the activity type name.
///
/// The checks run in a fixed order and a later match overrides an earlier one, so
/// a stave test on a half-stave ("HS ... Stave ...") ends up as a stave test.
pub fn classify(type_name: &str, category: TestCategory) -> Option<ActivityClass> {
    let has = |pattern: &str| type_name.contains(pattern);
    let layered = has("ML") || has("OL");

    let mut class = None;
    if has("HIC") && has("Qualification") {
        class = Some(ActivityClass::Qualification);
    }
    if has("HIC") && has("Reception") {
        class = Some(ActivityClass::Reception);
    }
    if has("HS") && layered {
        class = Some(ActivityClass::HalfStave);
    }
    if has("Stave") && layered {
        if !category.splits_stave_tests() {
            class = Some(ActivityClass::StaveQualification);
        } else {
            if has("Qualification") {
                class = Some(ActivityClass::StaveQualification);
            }
            if has("Reception") {
                class = Some(ActivityClass::StaveReception);
            }
        }
    }
    class
}

/// Barrel layer of a (half-)stave test. Stored as 0 (none), 1 (ML) or 2 (OL).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StaveLayer {
    #[default]
    None,
    Middle,
    Outer,
}

impl StaveLayer {
    pub fn from_type_name(type_name: &str) -> Self {
        let staved = type_name.contains("HS") || type_name.contains("Stave");
        if staved && type_name.contains("ML") {
            Self::Middle
        } else if staved && type_name.contains("OL") {
            Self::Outer
        } else {
            Self::None
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Middle => 1,
            Self::Outer => 2,
        }
    }
}
