use fxhash::FxHashSet;
use std::path::Path;

use super::catalog::ActivityParameter;
use super::category::TestCategory;
use super::chip::ChipRemap;
use super::condition::Condition;
use super::constants::{
    BOARD_REGISTERS_MARKER, HEADER_LINES, REGISTERS_END_MARKER, REGISTERS_HEADER,
    REGISTERS_START_MARKER, STATUS_REGISTER, SUMMARY_MARKER,
};
use super::error::ScanError;
use super::record::{Columnar, ResultRecord};
use super::text::{read_lines, scan};

/// Which registers snapshot a register dump belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterPhase {
    Start,
    End,
}

/// Part of a result file the scanner is in. Register dumps are terminal: once one
/// starts, every following line is read as a register line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Section {
    #[default]
    General,
    ChipRegisters(RegisterPhase),
    PerChipSummary,
}

/// What to do with a line matched by a rule
#[derive(Debug, Clone, Copy)]
enum Action {
    /// Take capture `capture` of `template` into a scalar column. Lines mentioning
    /// "on-chip" are read with the `on_chip` template instead, when there is one.
    Scalar {
        column: &'static str,
        template: &'static str,
        on_chip: Option<&'static str>,
        capture: usize,
    },
    /// Template captures (chip id, value); the value goes to the chip's slot
    PerChip {
        column: &'static str,
        template: &'static str,
    },
    /// Selects the chip the following summary lines refer to
    ChipHeader { template: &'static str },
    /// Value for the chip selected by the last header
    Summary {
        column: &'static str,
        template: &'static str,
    },
    /// Scalar whose ratio to the previous test follows on the next line
    WithRatio {
        column: &'static str,
        template: &'static str,
        ratio_column: &'static str,
    },
    Ignore,
}

/// A line matches when it contains every key. The first matching rule wins.
#[derive(Debug, Clone, Copy)]
struct FieldRule {
    keys: &'static [&'static str],
    /// Only the first matching line is used; later ones fall through to the next rules
    once: bool,
    action: Action,
}

const fn scalar(keys: &'static [&'static str], column: &'static str, template: &'static str) -> FieldRule {
    FieldRule {
        keys,
        once: false,
        action: Action::Scalar {
            column,
            template,
            on_chip: None,
            capture: 0,
        },
    }
}

const fn scalar_once(keys: &'static [&'static str], column: &'static str, template: &'static str) -> FieldRule {
    FieldRule {
        keys,
        once: true,
        action: Action::Scalar {
            column,
            template,
            on_chip: None,
            capture: 0,
        },
    }
}

const fn on_chip_scalar(
    keys: &'static [&'static str],
    column: &'static str,
    template: &'static str,
    on_chip: &'static str,
    capture: usize,
) -> FieldRule {
    FieldRule {
        keys,
        once: false,
        action: Action::Scalar {
            column,
            template,
            on_chip: Some(on_chip),
            capture,
        },
    }
}

const fn per_chip(keys: &'static [&'static str], column: &'static str, template: &'static str) -> FieldRule {
    FieldRule {
        keys,
        once: false,
        action: Action::PerChip { column, template },
    }
}

const fn summary(keys: &'static [&'static str], column: &'static str, template: &'static str) -> FieldRule {
    FieldRule {
        keys,
        once: false,
        action: Action::Summary { column, template },
    }
}

const fn header(keys: &'static [&'static str], template: &'static str) -> FieldRule {
    FieldRule {
        keys,
        once: false,
        action: Action::ChipHeader { template },
    }
}

const fn with_ratio(
    keys: &'static [&'static str],
    column: &'static str,
    template: &'static str,
    ratio_column: &'static str,
) -> FieldRule {
    FieldRule {
        keys,
        once: false,
        action: Action::WithRatio {
            column,
            template,
            ratio_column,
        },
    }
}

const fn ignore(keys: &'static [&'static str]) -> FieldRule {
    FieldRule {
        keys,
        once: false,
        action: Action::Ignore,
    }
}

const RATIO_TEMPLATE: &str = "ratio to previous: %f";

// Supply and temperature lines shared by every result file. Order is part of the
// file format contract: several keys are substrings of other lines.
const COMMON_RULES: &[FieldRule] = &[
    scalar(&["VDDD (start)"], "vdddStart", "VDDD (start): %f"),
    scalar(&["VDDD (end)"], "vdddEnd", "VDDD (end): %f"),
    scalar(&["VDDA (start)"], "vddaStart", "VDDA (start): %f"),
    scalar(&["VDDA (end)"], "vddaEnd", "VDDA (end): %f"),
    scalar(&["VDDD set (start)"], "vdddSetStart", "VDDD set (start): %f"),
    scalar(&["VDDD set (end)"], "vdddSetEnd", "VDDD set (end): %f"),
    scalar(&["VDDA set (start)"], "vddaSetStart", "VDDA set (start): %f"),
    scalar(&["VDDA set (end)"], "vddaSetEnd", "VDDA set (end): %f"),
    scalar(&["IDDD (start)"], "idddStart", "IDDD (start): %f"),
    scalar(&["IDDD (end)"], "idddEnd", "IDDD (end): %f"),
    scalar(&["IDDA (start)"], "iddaStart", "IDDA (start): %f"),
    scalar(&["IDDA (end)"], "iddaEnd", "IDDA (end): %f"),
    on_chip_scalar(
        &["Analogue Supply Voltage", "start"],
        "anaSupVoltStart",
        "Analogue Supply Voltage (start): %f",
        "Analogue Supply Voltage (on-chip, start): %f",
        0,
    ),
    on_chip_scalar(
        &["Analogue Supply Voltage", "end"],
        "anaSupVoltEnd",
        "Analogue Supply Voltage (end): %f",
        "Analogue Supply Voltage (on-chip, end): %f",
        0,
    ),
    on_chip_scalar(
        &["Digital Supply Voltage", "start"],
        "digSupVoltStart",
        "Digital Supply Voltage (saturating at %fV, start): %f",
        "Digital Supply Voltage (on-chip, saturating at %fV, start): %f",
        1,
    ),
    on_chip_scalar(
        &["Digital Supply Voltage", "end"],
        "digSupVoltEnd",
        "Digital Supply Voltage (saturating at %fV, end): %f",
        "Digital Supply Voltage (on-chip, saturating at %fV, end): %f",
        1,
    ),
    on_chip_scalar(
        &["Temp (", "start"],
        "tempStart",
        "Temp (start): %f",
        "Temp (on-chip, start): %f",
        0,
    ),
    on_chip_scalar(
        &["Temp (", "end"],
        "tempEnd",
        "Temp (end): %f",
        "Temp (on-chip, end): %f",
        0,
    ),
    per_chip(
        &["Analogue voltage (", "start"],
        "chipAnalVoltStart",
        "Analogue voltage (start) on chip %d: %f",
    ),
    per_chip(
        &["Analogue voltage (", "end"],
        "chipAnalVoltEnd",
        "Analogue voltage (end) on chip %d: %f",
    ),
    per_chip(
        &["Digital voltage (", "start"],
        "chipDigiVoltStart",
        "Digital voltage (start) on chip %d: %f",
    ),
    per_chip(
        &["Digital voltage (", "end"],
        "chipDigiVoltEnd",
        "Digital voltage (end) on chip %d: %f",
    ),
    per_chip(
        &["Temperature (", "start"],
        "chipTempStart",
        "Temperature (start) on chip %d: %f",
    ),
    per_chip(
        &["Temperature (", "end"],
        "chipTempEnd",
        "Temperature (end) on chip %d: %f",
    ),
];

const POWER_RULES: &[FieldRule] = &[
    scalar(&["IDDD at switchon"], "idddSwitchOn", "IDDD at switchon: %f"),
    scalar(&["IDDA at switchon"], "iddaSwitchOn", "IDDA at switchon: %f"),
    scalar(&["IDDD with clock"], "idddWClock", "IDDD with clock: %f"),
    scalar(&["IDDA with clock"], "iddaWClock", "IDDA with clock: %f"),
    scalar(&["IDDD configured"], "idddConfig", "IDDD configured: %f"),
    scalar(&["IDDA configured"], "iddaConfig", "IDDA configured: %f"),
    scalar(&["IBias at 0V"], "ibias0V", "IBias at 0V: %f"),
    scalar(&["IBias at 3V"], "ibias3V", "IBias at 3V: %f"),
];

// The pixel counts are repeated further down the file per region; only the HIC total counts
const DIGITAL_RULES: &[FieldRule] = &[
    scalar(&["Bad pixels"], "badPixels", "Bad pixels: %d"),
    scalar_once(&["Bad double cols:"], "badDoubCols", "Bad double cols: %d"),
    scalar_once(&["Stuck pixels:"], "stuckPixels", "Stuck pixels: %d"),
    scalar_once(&["Dead pixels:"], "deadPixels", "Dead pixels: %d"),
    scalar(&["   Increase:"], "deadIncrease", "Increase: %d"),
];

const THRESHOLD_RULES: &[FieldRule] = &[
    scalar(&["8b10b errors"], "n8b10bErr", "8b10b errors: %d"),
    scalar(&["Corrupt events"], "corruptEvts", "Corrupt events: %d"),
    scalar(&["Oversized events"], "oversizEvts", "Oversized events: %d"),
    scalar(&["Timeouts"], "timeouts", "Timeouts: %d"),
];

const THRESHOLD_SUMMARY_RULES: &[FieldRule] = &[
    header(&["Result chip"], "Result chip %d:"),
    summary(&["Pixels without hits"], "pixwohits", "Pixels without hits: %d"),
    summary(&["Pixels without threshold"], "pixwothrs", "Pixels without threshold: %d"),
    summary(&["Hot pixels"], "hotpix", "Hot pixels: %d"),
    summary(&["Av. Threshold"], "avgthres", "Av. Threshold: %f"),
    summary(&["Threshold RMS"], "rmsthres", "Threshold RMS: %f"),
    summary(&["Deviation"], "deviation", "Deviation: %f"),
    summary(&["Av. Noise"], "avgNoise", "Av. Noise: %f"),
    summary(&["Noise RMS"], "rmsnoise", "Noise RMS: %f"),
];

// Totals share their wording with the per-chip lines; section decides which one applies
const NOISE_RULES: &[FieldRule] = &[
    scalar(&["Noisy pixels"], "noisePixTot", "Noisy pixels: %d"),
    scalar(&["Noise occupancy"], "noiseOccTot", "Noise occupancy: %f"),
];

const NOISE_SUMMARY_RULES: &[FieldRule] = &[
    header(&["Results chip"], "Results chip %d:"),
    summary(&["Noisy pixels"], "noisePixels", "Noisy pixels: %d"),
    summary(&["Noise occupancy"], "noiseOccup", "Noise occupancy: %f"),
];

const DCTRL_SUMMARY_RULES: &[FieldRule] = &[
    ignore(&["positive polarity"]),
    ignore(&["negative polarity"]),
    header(&["Result chip"], "Result chip %d:"),
    scalar(&["Worst maximum amplitude"], "worsMaxAmpl", "Worst maximum amplitude: %f"),
    with_ratio(&["Worst slope"], "worsSlope", "Worst slope: %f", "worsSlopeRat"),
    with_ratio(
        &["Worst chi square"],
        "worsChiSq",
        "Worst chi square: %f",
        "worsChiSqRat",
    ),
    scalar(&["Worst correlation"], "worsCorrel", "Worst correlation: %f"),
    scalar(&["Worst rise time"], "worsRiseTim", "Worst rise time: %f"),
    scalar(&["Worst fall time"], "worsFallTim", "Worst fall time: %f"),
    summary(&["Slope p"], "slopePos", "Slope p: %f"),
    summary(&["Intercept p"], "intercPos", "Intercept p: %f"),
    summary(&["Chi sq p"], "chisqPos", "Chi sq p: %f"),
    summary(&["Correlation coeff p"], "correlPos", "Correlation coeff p: %f"),
    summary(&["Max. amplitude p"], "maxAmpPos", "Max. amplitude p: %f"),
    summary(&["Max. rise time p"], "maxRisePos", "Max. rise time p: %f"),
    summary(&["Max. fall time p"], "maxFallPos", "Max. fall time p: %f"),
    summary(&["Slope n"], "slopeNeg", "Slope n: %f"),
    summary(&["Intercept n"], "intercNeg", "Intercept n: %f"),
    summary(&["Chi sq n"], "chisqNeg", "Chi sq n: %f"),
    summary(&["Correlation coeff n"], "correlNeg", "Correlation coeff n: %f"),
    summary(&["Max. amplitude n"], "maxAmpNeg", "Max. amplitude n: %f"),
    summary(&["Max. rise time n"], "maxRiseNeg", "Max. rise time n: %f"),
    summary(&["Max. fall time n"], "maxFallNeg", "Max. fall time n: %f"),
];

/// Rules for lines outside any section, after the common ones
fn general_rules(category: TestCategory) -> &'static [FieldRule] {
    match category {
        TestCategory::PowerTest => POWER_RULES,
        TestCategory::DigitalScan => DIGITAL_RULES,
        TestCategory::ThresholdScan => THRESHOLD_RULES,
        TestCategory::NoiseScan => NOISE_RULES,
        TestCategory::DctrlTest => &[],
    }
}

/// Rules for the per-chip summary. General lines are checked against them too,
/// after the general rules.
fn summary_rules(category: TestCategory) -> &'static [FieldRule] {
    match category {
        TestCategory::PowerTest | TestCategory::DigitalScan => &[],
        TestCategory::ThresholdScan => THRESHOLD_SUMMARY_RULES,
        TestCategory::NoiseScan => NOISE_SUMMARY_RULES,
        TestCategory::DctrlTest => DCTRL_SUMMARY_RULES,
    }
}

/// Per-file scan state
#[derive(Debug, Default)]
struct ScanState {
    section: Section,
    current_chip: Option<usize>,
    used_once: FxHashSet<&'static str>,
}

/// Reads a test result file into a [`ResultRecord`].
///
/// Result files have drifted over the years and list their lines in no fixed order,
/// so every line is classified on its own by the ordered rule tables of the test
/// category. Values which fail to parse are left at zero.
#[derive(Debug, Clone, Copy)]
pub struct ResultScanner {
    category: TestCategory,
    remap: ChipRemap,
}

impl ResultScanner {
    pub fn new(category: TestCategory, remap: ChipRemap) -> Self {
        Self { category, remap }
    }

    pub fn category(&self) -> TestCategory {
        self.category
    }

    /// Read a result file from disk into the record
    pub fn scan_file(&self, path: &Path, record: &mut ResultRecord) -> Result<(), ScanError> {
        let lines = read_lines(path).map_err(|_| ScanError::CannotOpen {
            routine: "ResultScanner::scan_file",
            path: path.to_path_buf(),
        })?;
        self.scan_lines(&lines, record);
        Ok(())
    }

    /// Scan the lines of a result file, header included. The record's measurements
    /// are reset first; its identity is untouched.
    pub fn scan_lines<I>(&self, lines: I, record: &mut ResultRecord)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        record.reset_measurements();
        let mut state = ScanState::default();
        let mut lines = lines.into_iter().skip(HEADER_LINES);

        while let Some(line) = lines.next() {
            let line = line.as_ref();
            if line.len() < 2 {
                continue;
            }
            if line.contains(BOARD_REGISTERS_MARKER) {
                break;
            }
            if self.category.has_chip_summary() && line.contains(SUMMARY_MARKER) {
                if !matches!(state.section, Section::ChipRegisters(_)) {
                    state.section = Section::PerChipSummary;
                }
                continue;
            }
            if line.contains(REGISTERS_START_MARKER) {
                state.section = Section::ChipRegisters(RegisterPhase::Start);
                continue;
            }
            if line.contains(REGISTERS_END_MARKER) {
                state.section = Section::ChipRegisters(RegisterPhase::End);
                continue;
            }

            match state.section {
                Section::ChipRegisters(phase) => self.scan_register(line, phase, record),
                Section::PerChipSummary => {
                    self.apply_rules(summary_rules(self.category), line, &mut lines, &mut state, record);
                }
                Section::General => {
                    let matched = self.apply_rules(COMMON_RULES, line, &mut lines, &mut state, record)
                        || self.apply_rules(
                            general_rules(self.category),
                            line,
                            &mut lines,
                            &mut state,
                            record,
                        )
                        || self.apply_rules(
                            summary_rules(self.category),
                            line,
                            &mut lines,
                            &mut state,
                            record,
                        );
                    if !matched {
                        log::trace!("Unrecognised result line: {line}");
                    }
                }
            }
        }
    }

    /// Fill the classification fields from the activity parameters
    pub fn fill_classification(
        &self,
        parameters: &[ActivityParameter],
        condition: Condition,
        record: &mut ResultRecord,
    ) {
        let grade_name = self.category.classification_parameter(condition);
        for parameter in parameters {
            if parameter.name == "Classification Version" {
                record.classification.version = parameter.value;
            } else if Some(parameter.name.as_str()) == grade_name {
                record.classification.grade = parameter.value;
            } else if self.category == TestCategory::DigitalScan
                && parameter.name == "Number of Working Chips"
            {
                record.classification.working_chips = parameter.value;
            }
        }
    }

    /// Try the rules in order; returns true if one of them took the line
    fn apply_rules<I>(
        &self,
        rules: &[FieldRule],
        line: &str,
        rest: &mut I,
        state: &mut ScanState,
        record: &mut ResultRecord,
    ) -> bool
    where
        I: Iterator,
        I::Item: AsRef<str>,
    {
        for rule in rules {
            if !rule.keys.iter().all(|key| line.contains(key)) {
                continue;
            }
            if rule.once {
                if let Action::Scalar { column, .. } = rule.action {
                    if !state.used_once.insert(column) {
                        continue;
                    }
                }
            }
            self.apply_action(rule.action, line, rest, state, record);
            return true;
        }
        false
    }

    fn apply_action<I>(
        &self,
        action: Action,
        line: &str,
        rest: &mut I,
        state: &mut ScanState,
        record: &mut ResultRecord,
    ) where
        I: Iterator,
        I::Item: AsRef<str>,
    {
        match action {
            Action::Scalar {
                column,
                template,
                on_chip,
                capture,
            } => {
                let template = match on_chip {
                    Some(alternative) if line.contains("on-chip") => alternative,
                    _ => template,
                };
                if let Some(value) = scan(line, template).get(capture) {
                    record.assign(column, 0, *value);
                }
            }
            Action::PerChip { column, template } => {
                let values = scan(line, template);
                if values.len() == 2 {
                    if let Some(slot) = self.remap.logical_slot(values[0] as i64) {
                        record.assign(column, slot, values[1]);
                    }
                }
            }
            Action::ChipHeader { template } => {
                if let Some(chip) = scan(line, template).first() {
                    state.current_chip = self.remap.logical_slot(*chip as i64);
                }
            }
            Action::Summary { column, template } => {
                if let (Some(slot), Some(value)) = (state.current_chip, scan(line, template).first()) {
                    record.assign(column, slot, *value);
                }
            }
            Action::WithRatio {
                column,
                template,
                ratio_column,
            } => {
                if let Some(value) = scan(line, template).first() {
                    record.assign(column, 0, *value);
                }
                // The ratio line repeats for several fields, so it is only read here
                if let Some(next) = rest.next() {
                    if let Some(ratio) = scan(next.as_ref(), RATIO_TEMPLATE).first() {
                        record.assign(ratio_column, 0, *ratio);
                    }
                }
            }
            Action::Ignore => (),
        }
    }

    fn scan_register(&self, line: &str, phase: RegisterPhase, record: &mut ResultRecord) {
        if line.contains(REGISTERS_HEADER) {
            return;
        }
        let values = scan(line, "%d 0x%x 0x%x");
        if values.len() < 3 || values[1] as u32 != STATUS_REGISTER {
            return;
        }
        let Some(slot) = self.remap.hardware_slot(values[0] as i64) else {
            return;
        };
        let value = values[2] as u16;
        match phase {
            RegisterPhase::Start => record.registers.start[slot] = value,
            RegisterPhase::End => record.registers.end[slot] = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::HicType;
    use crate::record::Payload;

    const HEADER: [&str; 3] = ["Test result file", "Date: 08.03.2019", "Software: 1.2"];

    fn with_header(body: &[&str]) -> Vec<String> {
        HEADER.iter().chain(body).map(|s| s.to_string()).collect()
    }

    fn scan_body(category: TestCategory, hic: HicType, body: &[&str]) -> ResultRecord {
        let scanner = ResultScanner::new(category, hic.remap());
        let mut record = ResultRecord::new(category);
        scanner.scan_lines(with_header(body), &mut record);
        record
    }

    #[test]
    fn test_registers_and_board_stop() {
        let record = scan_body(
            TestCategory::DigitalScan,
            HicType::Outer,
            &[
                "Temp (end):   23.4",
                "Chip registers (start)",
                "3        0x700        0x05",
                "Chip registers (end)",
                "Board registers",
                "VDDD (start): 1.8",
            ],
        );
        assert_eq!(record.supply.temp_end, 23.4);
        assert_eq!(record.registers.start[3], 5);
        assert_eq!(record.supply.vddd_start, 0.0);
    }

    #[test]
    fn test_line_order_does_not_matter() {
        let body = [
            "VDDD (start): 1.82",
            "VDDA (start): 1.79",
            "IDDD (end):   0.31",
            "Temp (on-chip, start): 28.5",
        ];
        let reversed: Vec<&str> = body.iter().rev().copied().collect();
        let a = scan_body(TestCategory::PowerTest, HicType::Outer, &body);
        let b = scan_body(TestCategory::PowerTest, HicType::Outer, &reversed);
        assert_eq!(a, b);
        assert_eq!(a.supply.vddd_start, 1.82);
        assert_eq!(a.supply.vdda_start, 1.79);
        assert_eq!(a.supply.temp_start, 28.5);
    }

    #[test]
    fn test_header_lines_skipped() {
        let scanner = ResultScanner::new(TestCategory::PowerTest, HicType::Outer.remap());
        let mut record = ResultRecord::new(TestCategory::PowerTest);
        scanner.scan_lines(["VDDD (start): 1.8", "a", "b", "VDDA (start): 1.7"], &mut record);
        assert_eq!(record.supply.vddd_start, 0.0);
        assert_eq!(record.supply.vdda_start, 1.7);
    }

    #[test]
    fn test_on_chip_variants() {
        let record = scan_body(
            TestCategory::DigitalScan,
            HicType::Outer,
            &[
                "Digital Supply Voltage (on-chip, saturating at 1.9V, start): 1.81",
                "Digital Supply Voltage (saturating at 1.9V, end):   1.78",
                "Analogue Supply Voltage (on-chip, end):   1.75",
            ],
        );
        assert_eq!(record.supply.digital_supply_start, 1.81);
        assert_eq!(record.supply.digital_supply_end, 1.78);
        assert_eq!(record.supply.analogue_supply_end, 1.75);
    }

    #[test]
    fn test_per_chip_remap() {
        let record = scan_body(
            TestCategory::DigitalScan,
            HicType::Outer,
            &[
                "  Temperature (start) on chip 8: 30.5",
                "  Temperature (start) on chip 6: 29.5",
                "  Analogue voltage (end) on chip 14: 1.7",
                "  Analogue voltage (end) on chip 15: 9.9",
            ],
        );
        assert_eq!(record.chips.temp_start[7], 30.5);
        assert_eq!(record.chips.temp_start[6], 29.5);
        assert_eq!(record.chips.analogue_end[13], 1.7);
    }

    #[test]
    fn test_digital_first_occurrence() {
        let record = scan_body(
            TestCategory::DigitalScan,
            HicType::Outer,
            &[
                "Bad pixels:      12",
                "Stuck pixels:    4",
                "Dead pixels:     7",
                "   Increase:     2",
                "Region 1",
                "Stuck pixels:    1",
                "Dead pixels:     3",
            ],
        );
        match record.payload {
            Payload::Digital(p) => {
                assert_eq!(p.bad_pixels, 12);
                assert_eq!(p.stuck_pixels, 4);
                assert_eq!(p.dead_pixels, 7);
                assert_eq!(p.dead_increase, 2);
            }
            _ => panic!("wrong payload"),
        }
    }

    #[test]
    fn test_noise_totals_and_per_chip() {
        let record = scan_body(
            TestCategory::NoiseScan,
            HicType::Outer,
            &[
                "Noisy pixels:    25",
                "Noise occupancy: 1.5e-08",
                "Number of chips: 14",
                "Results chip 9:",
                "Noisy pixels:    3",
                "Noise occupancy: 2e-09",
            ],
        );
        match record.payload {
            Payload::Noise(p) => {
                assert_eq!(p.noisy_pixels_total, 25);
                assert_eq!(p.occupancy_total, 1.5e-8);
                assert_eq!(p.noisy_pixels[8], 3);
                assert_eq!(p.occupancy[8], 2e-9);
            }
            _ => panic!("wrong payload"),
        }
    }

    #[test]
    fn test_threshold_summary() {
        let record = scan_body(
            TestCategory::ThresholdScan,
            HicType::Inner,
            &[
                "8b10b errors:   1",
                "Timeouts:       2",
                "Number of chips: 9",
                "Result chip 2:",
                "Pixels without hits:      10",
                "Av. Threshold: 98.5",
                "Threshold RMS: 7.25",
                "Noise RMS:     0.5",
                "Chip registers (start)",
                "# Chip ID   Address   Value",
                "0x72        0x700        0x1f",
                "2        0x701        0x09",
            ],
        );
        match record.payload {
            Payload::Threshold(p) => {
                assert_eq!(p.errors_8b10b, 1);
                assert_eq!(p.timeouts, 2);
                assert_eq!(p.pixels_without_hits[2], 10);
                assert_eq!(p.average_threshold[2], 98.5);
                assert_eq!(p.threshold_rms[2], 7.25);
                assert_eq!(p.noise_rms[2], 0.5);
            }
            _ => panic!("wrong payload"),
        }
        // "0x72" is not a decimal chip id
        assert_eq!(record.registers.start, [0; 14]);
    }

    #[test]
    fn test_register_chip_masked() {
        let record = scan_body(
            TestCategory::PowerTest,
            HicType::Outer,
            &[
                "Chip registers (end)",
                "# Chip ID",
                "121        0x700        0x0a",
            ],
        );
        // 121 = 0x79, chip 9 on module 7
        assert_eq!(record.registers.end[8], 10);
    }

    #[test]
    fn test_dctrl_ratio_lines() {
        let record = scan_body(
            TestCategory::DctrlTest,
            HicType::Outer,
            &[
                "Worst slope:             0.85",
                "    ratio to previous:   1.1",
                "Worst chi square:        3.5",
                "    ratio to previous:   0.9",
                "Worst rise time:         2.5e-09",
                "Number of chips: 14",
                "Result chip 1:",
                "  positive polarity",
                "Slope p: 0.4",
                "Max. fall time n: 3e-09",
            ],
        );
        match record.payload {
            Payload::Dctrl(p) => {
                assert_eq!(p.worst_slope, 0.85);
                assert_eq!(p.worst_slope_ratio, 1.1);
                assert_eq!(p.worst_chi_square, 3.5);
                assert_eq!(p.worst_chi_square_ratio, 0.9);
                assert_eq!(p.worst_rise_time, 2.5e-9);
                assert_eq!(p.positive.slope[1], 0.4);
                assert_eq!(p.negative.max_fall_time[1], 3e-9);
            }
            _ => panic!("wrong payload"),
        }
    }

    #[test]
    fn test_reset_before_fill() {
        let scanner = ResultScanner::new(TestCategory::PowerTest, HicType::Outer.remap());
        let mut record = ResultRecord::new(TestCategory::PowerTest);
        scanner.scan_lines(with_header(&["IBias at 3V: 0.12"]), &mut record);
        scanner.scan_lines(with_header(&["IBias at 0V: 0.02"]), &mut record);
        match record.payload {
            Payload::Power(p) => {
                assert_eq!(p.ibias_3v, 0.0);
                assert_eq!(p.ibias_0v, 0.02);
            }
            _ => panic!("wrong payload"),
        }
    }

    #[test]
    fn test_classification_lookup() {
        let scanner = ResultScanner::new(TestCategory::DigitalScan, HicType::Outer.remap());
        let mut record = ResultRecord::new(TestCategory::DigitalScan);
        let parameters: Vec<ActivityParameter> = [
            ("Classification Version", 2.0),
            ("Classification Digital Scan BB 0", 1.0),
            ("Classification Digital Scan BB 0, V -10%", 3.0),
            ("Number of Working Chips", 14.0),
        ]
        .into_iter()
        .map(|(name, value)| ActivityParameter {
            name: name.to_string(),
            value,
        })
        .collect();
        scanner.fill_classification(&parameters, Condition::new(90), &mut record);
        assert_eq!(record.classification.version, 2.0);
        assert_eq!(record.classification.grade, 3.0);
        assert_eq!(record.classification.working_chips, 14.0);
    }

    #[test]
    fn test_missing_file() {
        let scanner = ResultScanner::new(TestCategory::PowerTest, HicType::Outer.remap());
        let mut record = ResultRecord::new(TestCategory::PowerTest);
        let result = scanner.scan_file(Path::new("/nonexistent/PowerTest.dat"), &mut record);
        assert!(matches!(result, Err(ScanError::CannotOpen { .. })));
    }
}
