use std::slice;

use super::category::TestCategory;
use super::constants::{NUMBER_OF_CHIPS, NUMBER_OF_IV_POINTS};
use super::error::StoreError;

/// Primitive type of a stored column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    U8,
    I8,
    U16,
    I32,
    U32,
    U64,
    F32,
    F64,
}

impl ColumnKind {
    pub fn code(&self) -> u8 {
        match self {
            Self::U8 => 0,
            Self::I8 => 1,
            Self::U16 => 2,
            Self::I32 => 3,
            Self::U32 => 4,
            Self::U64 => 5,
            Self::F32 => 6,
            Self::F64 => 7,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::U8),
            1 => Some(Self::I8),
            2 => Some(Self::U16),
            3 => Some(Self::I32),
            4 => Some(Self::U32),
            5 => Some(Self::U64),
            6 => Some(Self::F32),
            7 => Some(Self::F64),
            _ => None,
        }
    }

    /// Size of one element in bytes
    pub fn size(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::U64 | Self::F64 => 8,
        }
    }
}

/// One named column of a table layout. `len` is 1 for scalars and the array length otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub len: u16,
}

impl Column {
    pub fn width(&self) -> usize {
        self.kind.size() * self.len as usize
    }
}

/// Mutable view of one column of a record. Scalars are exposed as one-element slices.
#[derive(Debug)]
pub enum FieldMut<'a> {
    U8(&'a mut [u8]),
    I8(&'a mut [i8]),
    U16(&'a mut [u16]),
    I32(&'a mut [i32]),
    U32(&'a mut [u32]),
    U64(&'a mut [u64]),
    F32(&'a mut [f32]),
    F64(&'a mut [f64]),
}

impl FieldMut<'_> {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::U8(_) => ColumnKind::U8,
            Self::I8(_) => ColumnKind::I8,
            Self::U16(_) => ColumnKind::U16,
            Self::I32(_) => ColumnKind::I32,
            Self::U32(_) => ColumnKind::U32,
            Self::U64(_) => ColumnKind::U64,
            Self::F32(_) => ColumnKind::F32,
            Self::F64(_) => ColumnKind::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::I8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::U64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a parsed number at `index`, converting it to the column type.
    /// Returns false if the index is out of range.
    pub fn set(&mut self, index: usize, value: f64) -> bool {
        if index >= self.len() {
            return false;
        }
        match self {
            Self::U8(v) => v[index] = value as u8,
            Self::I8(v) => v[index] = value as i8,
            Self::U16(v) => v[index] = value as u16,
            Self::I32(v) => v[index] = value as i32,
            Self::U32(v) => v[index] = value as u32,
            Self::U64(v) => v[index] = value as u64,
            Self::F32(v) => v[index] = value as f32,
            Self::F64(v) => v[index] = value,
        }
        true
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        match self {
            Self::U8(v) => v.get(index).map(|x| *x as f64),
            Self::I8(v) => v.get(index).map(|x| *x as f64),
            Self::U16(v) => v.get(index).map(|x| *x as f64),
            Self::I32(v) => v.get(index).map(|x| *x as f64),
            Self::U32(v) => v.get(index).map(|x| *x as f64),
            Self::U64(v) => v.get(index).map(|x| *x as f64),
            Self::F32(v) => v.get(index).map(|x| *x as f64),
            Self::F64(v) => v.get(index).copied(),
        }
    }
}

macro_rules! impl_field_from {
    ($($variant:ident => $ty:ty),*) => {
        $(
            impl<'a> From<&'a mut $ty> for FieldMut<'a> {
                fn from(value: &'a mut $ty) -> Self {
                    FieldMut::$variant(slice::from_mut(value))
                }
            }

            impl<'a, const N: usize> From<&'a mut [$ty; N]> for FieldMut<'a> {
                fn from(value: &'a mut [$ty; N]) -> Self {
                    FieldMut::$variant(value.as_mut_slice())
                }
            }
        )*
    };
}

impl_field_from!(U8 => u8, I8 => i8, U16 => u16, I32 => i32, U32 => u32, U64 => u64, F32 => f32, F64 => f64);

/// Receives the columns of a record in layout order
pub trait ColumnVisitor {
    fn visit(&mut self, name: &'static str, field: FieldMut<'_>) -> Result<(), StoreError>;
}

/// A record with a fixed, named column layout. Implementors hand every column to the
/// visitor, always in the same order; the store codec, the layout and the by-name
/// setters used by the result scanner are all built on that walk.
pub trait Columnar {
    fn visit_columns(&mut self, visitor: &mut dyn ColumnVisitor) -> Result<(), StoreError>;

    fn layout(&mut self) -> Vec<Column> {
        let mut collector = LayoutCollector::default();
        // The collector never fails
        let _ = self.visit_columns(&mut collector);
        collector.columns
    }

    /// Assign a value to element `index` of the named column
    fn assign(&mut self, name: &str, index: usize, value: f64) -> bool {
        let mut assign = Assign {
            name,
            index,
            value,
            done: false,
        };
        let _ = self.visit_columns(&mut assign);
        assign.done
    }

    fn value(&mut self, name: &str, index: usize) -> Option<f64> {
        let mut lookup = Lookup {
            name,
            index,
            found: None,
        };
        let _ = self.visit_columns(&mut lookup);
        lookup.found
    }
}

#[derive(Debug, Default)]
struct LayoutCollector {
    columns: Vec<Column>,
}

impl ColumnVisitor for LayoutCollector {
    fn visit(&mut self, name: &'static str, field: FieldMut<'_>) -> Result<(), StoreError> {
        self.columns.push(Column {
            name: name.to_string(),
            kind: field.kind(),
            len: field.len() as u16,
        });
        Ok(())
    }
}

struct Assign<'n> {
    name: &'n str,
    index: usize,
    value: f64,
    done: bool,
}

impl ColumnVisitor for Assign<'_> {
    fn visit(&mut self, name: &'static str, mut field: FieldMut<'_>) -> Result<(), StoreError> {
        if !self.done && name == self.name {
            self.done = field.set(self.index, self.value);
        }
        Ok(())
    }
}

struct Lookup<'n> {
    name: &'n str,
    index: usize,
    found: Option<f64>,
}

impl ColumnVisitor for Lookup<'_> {
    fn visit(&mut self, name: &'static str, field: FieldMut<'_>) -> Result<(), StoreError> {
        if self.found.is_none() && name == self.name {
            self.found = field.get(self.index);
        }
        Ok(())
    }
}

/// Who and when: shared by every row written to the store. The first two columns
/// (hicID, actID) are what reconciliation uses to recognise an activity's rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity {
    pub hic_id: u32,
    pub act_id: u32,
    pub loc_id: i32,
    pub start_date: u64,
    pub cond_vb: u8,
    pub hic_position: i8,
    pub stave_layer: u8,
    pub hic_class: i8,
}

impl Identity {
    fn visit(&mut self, v: &mut dyn ColumnVisitor) -> Result<(), StoreError> {
        v.visit("hicID", (&mut self.hic_id).into())?;
        v.visit("actID", (&mut self.act_id).into())?;
        v.visit("locID", (&mut self.loc_id).into())?;
        v.visit("startDate", (&mut self.start_date).into())?;
        v.visit("condVB", (&mut self.cond_vb).into())?;
        v.visit("hicPos", (&mut self.hic_position).into())?;
        v.visit("staveOLML", (&mut self.stave_layer).into())?;
        v.visit("hicClass", (&mut self.hic_class).into())?;
        Ok(())
    }
}

/// HIC-level supply readings taken at start and end of a test
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SupplyReadings {
    pub vddd_start: f32,
    pub vddd_end: f32,
    pub vdda_start: f32,
    pub vdda_end: f32,
    pub vddd_set_start: f32,
    pub vddd_set_end: f32,
    pub vdda_set_start: f32,
    pub vdda_set_end: f32,
    pub iddd_start: f32,
    pub iddd_end: f32,
    pub idda_start: f32,
    pub idda_end: f32,
    pub analogue_supply_start: f32,
    pub analogue_supply_end: f32,
    pub digital_supply_start: f32,
    pub digital_supply_end: f32,
    pub temp_start: f32,
    pub temp_end: f32,
}

impl SupplyReadings {
    fn visit(&mut self, v: &mut dyn ColumnVisitor) -> Result<(), StoreError> {
        v.visit("vdddStart", (&mut self.vddd_start).into())?;
        v.visit("vdddEnd", (&mut self.vddd_end).into())?;
        v.visit("vddaStart", (&mut self.vdda_start).into())?;
        v.visit("vddaEnd", (&mut self.vdda_end).into())?;
        v.visit("vdddSetStart", (&mut self.vddd_set_start).into())?;
        v.visit("vdddSetEnd", (&mut self.vddd_set_end).into())?;
        v.visit("vddaSetStart", (&mut self.vdda_set_start).into())?;
        v.visit("vddaSetEnd", (&mut self.vdda_set_end).into())?;
        v.visit("idddStart", (&mut self.iddd_start).into())?;
        v.visit("idddEnd", (&mut self.iddd_end).into())?;
        v.visit("iddaStart", (&mut self.idda_start).into())?;
        v.visit("iddaEnd", (&mut self.idda_end).into())?;
        v.visit("anaSupVoltStart", (&mut self.analogue_supply_start).into())?;
        v.visit("anaSupVoltEnd", (&mut self.analogue_supply_end).into())?;
        v.visit("digSupVoltStart", (&mut self.digital_supply_start).into())?;
        v.visit("digSupVoltEnd", (&mut self.digital_supply_end).into())?;
        v.visit("tempStart", (&mut self.temp_start).into())?;
        v.visit("tempEnd", (&mut self.temp_end).into())?;
        Ok(())
    }
}

/// Per-chip supply readings, indexed by logical chip slot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChipReadings {
    pub analogue_start: [f32; NUMBER_OF_CHIPS],
    pub analogue_end: [f32; NUMBER_OF_CHIPS],
    pub digital_start: [f32; NUMBER_OF_CHIPS],
    pub digital_end: [f32; NUMBER_OF_CHIPS],
    pub temp_start: [f32; NUMBER_OF_CHIPS],
    pub temp_end: [f32; NUMBER_OF_CHIPS],
}

impl ChipReadings {
    fn visit(&mut self, v: &mut dyn ColumnVisitor) -> Result<(), StoreError> {
        v.visit("chipAnalVoltStart", (&mut self.analogue_start).into())?;
        v.visit("chipAnalVoltEnd", (&mut self.analogue_end).into())?;
        v.visit("chipDigiVoltStart", (&mut self.digital_start).into())?;
        v.visit("chipDigiVoltEnd", (&mut self.digital_end).into())?;
        v.visit("chipTempStart", (&mut self.temp_start).into())?;
        v.visit("chipTempEnd", (&mut self.temp_end).into())?;
        Ok(())
    }
}

/// Value of the status register (0x700) of every chip before and after the test
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterSnapshot {
    pub start: [u16; NUMBER_OF_CHIPS],
    pub end: [u16; NUMBER_OF_CHIPS],
}

impl RegisterSnapshot {
    fn visit(&mut self, v: &mut dyn ColumnVisitor) -> Result<(), StoreError> {
        v.visit("reg700Start", (&mut self.start).into())?;
        v.visit("reg700End", (&mut self.end).into())?;
        Ok(())
    }
}

/// Quality scores copied from the activity parameters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Classification {
    pub version: f32,
    pub grade: f32,
    pub working_chips: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerPayload {
    pub iddd_switch_on: f32,
    pub idda_switch_on: f32,
    pub iddd_with_clock: f32,
    pub idda_with_clock: f32,
    pub iddd_configured: f32,
    pub idda_configured: f32,
    pub ibias_0v: f32,
    pub ibias_3v: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigitalPayload {
    pub bad_pixels: i32,
    pub bad_double_columns: i32,
    pub stuck_pixels: i32,
    pub dead_pixels: i32,
    pub dead_increase: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThresholdPayload {
    pub errors_8b10b: i32,
    pub corrupt_events: i32,
    pub oversized_events: i32,
    pub timeouts: i32,
    pub pixels_without_hits: [i32; NUMBER_OF_CHIPS],
    pub pixels_without_threshold: [i32; NUMBER_OF_CHIPS],
    pub hot_pixels: [i32; NUMBER_OF_CHIPS],
    pub average_threshold: [f32; NUMBER_OF_CHIPS],
    pub threshold_rms: [f32; NUMBER_OF_CHIPS],
    pub deviation: [f32; NUMBER_OF_CHIPS],
    pub average_noise: [f32; NUMBER_OF_CHIPS],
    pub noise_rms: [f32; NUMBER_OF_CHIPS],
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NoisePayload {
    pub noisy_pixels_total: u32,
    pub occupancy_total: f64,
    pub noisy_pixels: [u32; NUMBER_OF_CHIPS],
    pub occupancy: [f64; NUMBER_OF_CHIPS],
}

/// DCTRL fit results for one polarity of the differential pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolarityFits {
    pub slope: [f32; NUMBER_OF_CHIPS],
    pub intercept: [f32; NUMBER_OF_CHIPS],
    pub chi_square: [f32; NUMBER_OF_CHIPS],
    pub correlation: [f32; NUMBER_OF_CHIPS],
    pub max_amplitude: [f32; NUMBER_OF_CHIPS],
    pub max_rise_time: [f64; NUMBER_OF_CHIPS],
    pub max_fall_time: [f64; NUMBER_OF_CHIPS],
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DctrlPayload {
    pub worst_max_amplitude: f32,
    pub worst_slope: f32,
    pub worst_slope_ratio: f32,
    pub worst_chi_square: f32,
    pub worst_chi_square_ratio: f32,
    pub worst_correlation: f32,
    pub worst_rise_time: f64,
    pub worst_fall_time: f64,
    pub positive: PolarityFits,
    pub negative: PolarityFits,
}

/// The test-specific part of a result record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    Power(PowerPayload),
    Digital(DigitalPayload),
    Threshold(ThresholdPayload),
    Noise(NoisePayload),
    Dctrl(DctrlPayload),
}

impl Payload {
    pub fn empty(category: TestCategory) -> Self {
        match category {
            TestCategory::PowerTest => Self::Power(PowerPayload::default()),
            TestCategory::DigitalScan => Self::Digital(DigitalPayload::default()),
            TestCategory::ThresholdScan => Self::Threshold(ThresholdPayload::default()),
            TestCategory::NoiseScan => Self::Noise(NoisePayload::default()),
            TestCategory::DctrlTest => Self::Dctrl(DctrlPayload::default()),
        }
    }

    fn visit(&mut self, v: &mut dyn ColumnVisitor) -> Result<(), StoreError> {
        match self {
            Self::Power(p) => {
                v.visit("idddSwitchOn", (&mut p.iddd_switch_on).into())?;
                v.visit("iddaSwitchOn", (&mut p.idda_switch_on).into())?;
                v.visit("idddWClock", (&mut p.iddd_with_clock).into())?;
                v.visit("iddaWClock", (&mut p.idda_with_clock).into())?;
                v.visit("idddConfig", (&mut p.iddd_configured).into())?;
                v.visit("iddaConfig", (&mut p.idda_configured).into())?;
                v.visit("ibias0V", (&mut p.ibias_0v).into())?;
                v.visit("ibias3V", (&mut p.ibias_3v).into())?;
            }
            Self::Digital(p) => {
                v.visit("badPixels", (&mut p.bad_pixels).into())?;
                v.visit("badDoubCols", (&mut p.bad_double_columns).into())?;
                v.visit("stuckPixels", (&mut p.stuck_pixels).into())?;
                v.visit("deadPixels", (&mut p.dead_pixels).into())?;
                v.visit("deadIncrease", (&mut p.dead_increase).into())?;
            }
            Self::Threshold(p) => {
                v.visit("n8b10bErr", (&mut p.errors_8b10b).into())?;
                v.visit("corruptEvts", (&mut p.corrupt_events).into())?;
                v.visit("oversizEvts", (&mut p.oversized_events).into())?;
                v.visit("timeouts", (&mut p.timeouts).into())?;
                v.visit("pixwohits", (&mut p.pixels_without_hits).into())?;
                v.visit("pixwothrs", (&mut p.pixels_without_threshold).into())?;
                v.visit("hotpix", (&mut p.hot_pixels).into())?;
                v.visit("avgthres", (&mut p.average_threshold).into())?;
                v.visit("rmsthres", (&mut p.threshold_rms).into())?;
                v.visit("deviation", (&mut p.deviation).into())?;
                v.visit("avgNoise", (&mut p.average_noise).into())?;
                v.visit("rmsnoise", (&mut p.noise_rms).into())?;
            }
            Self::Noise(p) => {
                v.visit("noisePixTot", (&mut p.noisy_pixels_total).into())?;
                v.visit("noiseOccTot", (&mut p.occupancy_total).into())?;
                v.visit("noisePixels", (&mut p.noisy_pixels).into())?;
                v.visit("noiseOccup", (&mut p.occupancy).into())?;
            }
            Self::Dctrl(p) => {
                v.visit("worsMaxAmpl", (&mut p.worst_max_amplitude).into())?;
                v.visit("worsSlope", (&mut p.worst_slope).into())?;
                v.visit("worsSlopeRat", (&mut p.worst_slope_ratio).into())?;
                v.visit("worsChiSq", (&mut p.worst_chi_square).into())?;
                v.visit("worsChiSqRat", (&mut p.worst_chi_square_ratio).into())?;
                v.visit("worsCorrel", (&mut p.worst_correlation).into())?;
                v.visit("worsRiseTim", (&mut p.worst_rise_time).into())?;
                v.visit("worsFallTim", (&mut p.worst_fall_time).into())?;
                for (fits, names) in [
                    (&mut p.positive, POSITIVE_FIT_COLUMNS),
                    (&mut p.negative, NEGATIVE_FIT_COLUMNS),
                ] {
                    v.visit(names[0], (&mut fits.slope).into())?;
                    v.visit(names[1], (&mut fits.intercept).into())?;
                    v.visit(names[2], (&mut fits.chi_square).into())?;
                    v.visit(names[3], (&mut fits.correlation).into())?;
                    v.visit(names[4], (&mut fits.max_amplitude).into())?;
                    v.visit(names[5], (&mut fits.max_rise_time).into())?;
                    v.visit(names[6], (&mut fits.max_fall_time).into())?;
                }
            }
        }
        Ok(())
    }
}

const POSITIVE_FIT_COLUMNS: [&str; 7] = [
    "slopePos",
    "intercPos",
    "chisqPos",
    "correlPos",
    "maxAmpPos",
    "maxRisePos",
    "maxFallPos",
];
const NEGATIVE_FIT_COLUMNS: [&str; 7] = [
    "slopeNeg",
    "intercNeg",
    "chisqNeg",
    "correlNeg",
    "maxAmpNeg",
    "maxRiseNeg",
    "maxFallNeg",
];

/// One row of a result table: everything extracted from a single result file
/// (one activity under one test condition).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultRecord {
    pub category: TestCategory,
    pub identity: Identity,
    pub supply: SupplyReadings,
    pub chips: ChipReadings,
    pub payload: Payload,
    pub registers: RegisterSnapshot,
    pub classification: Classification,
}

impl ResultRecord {
    pub fn new(category: TestCategory) -> Self {
        Self {
            category,
            identity: Identity::default(),
            supply: SupplyReadings::default(),
            chips: ChipReadings::default(),
            payload: Payload::empty(category),
            registers: RegisterSnapshot::default(),
            classification: Classification::default(),
        }
    }

    /// Zero every measured field. The identity is left alone; it is owned by the caller.
    pub fn reset_measurements(&mut self) {
        self.supply = SupplyReadings::default();
        self.chips = ChipReadings::default();
        self.payload = Payload::empty(self.category);
        self.registers = RegisterSnapshot::default();
        self.classification = Classification::default();
    }
}

impl Columnar for ResultRecord {
    fn visit_columns(&mut self, v: &mut dyn ColumnVisitor) -> Result<(), StoreError> {
        self.identity.visit(v)?;
        self.supply.visit(v)?;
        self.chips.visit(v)?;
        self.payload.visit(v)?;
        self.registers.visit(v)?;
        v.visit("classificVers", (&mut self.classification.version).into())?;
        v.visit(
            self.category.classification_column(),
            (&mut self.classification.grade).into(),
        )?;
        if self.category == TestCategory::DigitalScan {
            v.visit("numWorkChips", (&mut self.classification.working_chips).into())?;
        }
        Ok(())
    }
}

/// Which raw measurement a raw table holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    IvCurve,
    DigitalHit,
    ThresholdPixel,
    NoisyPixel,
    DriverSetting,
}

impl MeasurementKind {
    pub fn code(&self) -> u8 {
        match self {
            Self::IvCurve => 0,
            Self::DigitalHit => 1,
            Self::ThresholdPixel => 2,
            Self::NoisyPixel => 3,
            Self::DriverSetting => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::IvCurve),
            1 => Some(Self::DigitalHit),
            2 => Some(Self::ThresholdPixel),
            3 => Some(Self::NoisyPixel),
            4 => Some(Self::DriverSetting),
            _ => None,
        }
    }
}

/// IV curve of the back-bias: current at each voltage step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IvCurve {
    pub current: [f32; NUMBER_OF_IV_POINTS],
}

impl Default for IvCurve {
    fn default() -> Self {
        Self {
            current: [0.0; NUMBER_OF_IV_POINTS],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigitalHit {
    pub chip: u8,
    pub column: u16,
    pub row: u16,
    pub hits: u16,
}

/// Threshold and noise are fixed point, scaled by 100
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThresholdPixel {
    pub chip: u8,
    pub column: u16,
    pub row: u16,
    pub threshold: u16,
    pub noise: u16,
    pub wafer_number: i8,
    pub wafer_position: i8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoisyPixel {
    pub chip: u8,
    pub region: u16,
    pub double_column: u16,
    pub address: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriverSetting {
    pub chip: u8,
    pub setting: u8,
    pub peak_to_peak_p: f32,
    pub peak_to_peak_n: f32,
    pub amplitude_p: f32,
    pub amplitude_n: f32,
    pub rise_time_p: f64,
    pub rise_time_n: f64,
    pub fall_time_p: f64,
    pub fall_time_n: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement {
    IvCurve(IvCurve),
    DigitalHit(DigitalHit),
    ThresholdPixel(ThresholdPixel),
    NoisyPixel(NoisyPixel),
    DriverSetting(DriverSetting),
}

impl Measurement {
    pub fn empty(kind: MeasurementKind) -> Self {
        match kind {
            MeasurementKind::IvCurve => Self::IvCurve(IvCurve::default()),
            MeasurementKind::DigitalHit => Self::DigitalHit(DigitalHit::default()),
            MeasurementKind::ThresholdPixel => Self::ThresholdPixel(ThresholdPixel::default()),
            MeasurementKind::NoisyPixel => Self::NoisyPixel(NoisyPixel::default()),
            MeasurementKind::DriverSetting => Self::DriverSetting(DriverSetting::default()),
        }
    }

    pub fn kind(&self) -> MeasurementKind {
        match self {
            Self::IvCurve(_) => MeasurementKind::IvCurve,
            Self::DigitalHit(_) => MeasurementKind::DigitalHit,
            Self::ThresholdPixel(_) => MeasurementKind::ThresholdPixel,
            Self::NoisyPixel(_) => MeasurementKind::NoisyPixel,
            Self::DriverSetting(_) => MeasurementKind::DriverSetting,
        }
    }

    fn visit(&mut self, v: &mut dyn ColumnVisitor) -> Result<(), StoreError> {
        match self {
            Self::IvCurve(m) => {
                v.visit("ivCurrent", (&mut m.current).into())?;
            }
            Self::DigitalHit(m) => {
                v.visit("chipNum", (&mut m.chip).into())?;
                v.visit("colNum", (&mut m.column).into())?;
                v.visit("rowNum", (&mut m.row).into())?;
                v.visit("numHits", (&mut m.hits).into())?;
            }
            Self::ThresholdPixel(m) => {
                v.visit("chipNum", (&mut m.chip).into())?;
                v.visit("colNum", (&mut m.column).into())?;
                v.visit("rowNum", (&mut m.row).into())?;
                v.visit("thresh", (&mut m.threshold).into())?;
                v.visit("noise", (&mut m.noise).into())?;
                v.visit("waferNum", (&mut m.wafer_number).into())?;
                v.visit("waferPos", (&mut m.wafer_position).into())?;
            }
            Self::NoisyPixel(m) => {
                v.visit("chipNum", (&mut m.chip).into())?;
                v.visit("region", (&mut m.region).into())?;
                v.visit("doubcol", (&mut m.double_column).into())?;
                v.visit("address", (&mut m.address).into())?;
            }
            Self::DriverSetting(m) => {
                v.visit("chipNum", (&mut m.chip).into())?;
                v.visit("driverSet", (&mut m.setting).into())?;
                v.visit("pk2pkP", (&mut m.peak_to_peak_p).into())?;
                v.visit("pk2pkN", (&mut m.peak_to_peak_n).into())?;
                v.visit("ampliP", (&mut m.amplitude_p).into())?;
                v.visit("ampliN", (&mut m.amplitude_n).into())?;
                v.visit("risetimeP", (&mut m.rise_time_p).into())?;
                v.visit("risetimeN", (&mut m.rise_time_n).into())?;
                v.visit("falltimeP", (&mut m.fall_time_p).into())?;
                v.visit("falltimeN", (&mut m.fall_time_n).into())?;
            }
        }
        Ok(())
    }
}

/// One row of a raw table. Written once during a scanner pass and never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRow {
    pub identity: Identity,
    pub measurement: Measurement,
}

impl RawRow {
    pub fn empty(kind: MeasurementKind) -> Self {
        Self {
            identity: Identity::default(),
            measurement: Measurement::empty(kind),
        }
    }

    pub fn new(identity: Identity, measurement: Measurement) -> Self {
        Self {
            identity,
            measurement,
        }
    }
}

impl Columnar for RawRow {
    fn visit_columns(&mut self, v: &mut dyn ColumnVisitor) -> Result<(), StoreError> {
        self.identity.visit(v)?;
        self.measurement.visit(v)
    }
}
