use super::chip::ChipRemap;
use super::constants::{DIGITAL_NOMINAL_HITS, FIXED_POINT_SCALE, NUMBER_OF_IV_POINTS, PIXEL_COLUMNS};
use super::record::{DigitalHit, DriverSetting, IvCurve, NoisyPixel, ThresholdPixel};
use super::text::{sanitize_decimal_commas, scan};

/// Rebuilds the hit map of a digital scan from its sparse file.
///
/// The file lists (column, row, hits) for every pixel in increasing (row, column)
/// order but leaves out pixels which were never hit. Those are synthesized with zero
/// hits by following an expected-pixel cursor. Pixels which saw exactly the nominal
/// number of injections are the normal case and are not emitted at all.
///
/// Lines which go backwards, or name a column outside the matrix, are emitted as they
/// are without moving the cursor. Lines that do not hold three integers are skipped.
#[derive(Debug, Clone)]
pub struct DigitalRaster<I> {
    lines: I,
    chip: u8,
    expected: (u16, u16),
    pending: Option<DigitalHit>,
}

impl<I> DigitalRaster<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    pub fn new(lines: I, chip: u8) -> Self {
        Self {
            lines,
            chip,
            expected: (0, 0),
            pending: None,
        }
    }

    fn advance(&mut self) {
        let (row, column) = self.expected;
        if column + 1 >= PIXEL_COLUMNS {
            self.expected = (row.saturating_add(1), 0);
        } else {
            self.expected = (row, column + 1);
        }
    }
}

impl<I> Iterator for DigitalRaster<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = DigitalHit;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(hit) = self.pending {
                let position = (hit.row, hit.column);
                if hit.column < PIXEL_COLUMNS && position > self.expected {
                    let (row, column) = self.expected;
                    self.advance();
                    return Some(DigitalHit {
                        chip: self.chip,
                        column,
                        row,
                        hits: 0,
                    });
                }

                self.pending = None;
                if position == self.expected {
                    self.advance();
                }
                if hit.hits != DIGITAL_NOMINAL_HITS {
                    return Some(hit);
                }
                continue;
            }

            let line = self.lines.next()?;
            let values = scan(line.as_ref(), "%d %d %d");
            if values.len() < 3 || values.iter().any(|v| *v < 0.0) {
                continue;
            }
            self.pending = Some(DigitalHit {
                chip: self.chip,
                column: values[0] as u16,
                row: values[1] as u16,
                hits: values[2] as u16,
            });
        }
    }
}

/// Encode a threshold or noise value as fixed point
pub fn to_fixed_point(value: f64) -> u16 {
    (value * FIXED_POINT_SCALE).round() as u16
}

/// Pixel thresholds from a threshold scan or tuning file: `col row thr noise chisq`.
/// Decimal commas are rewritten before parsing; the chi square is not kept.
#[derive(Debug, Clone)]
pub struct ThresholdRows<I> {
    lines: I,
    chip: u8,
}

impl<I> ThresholdRows<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    pub fn new(lines: I, chip: u8) -> Self {
        Self { lines, chip }
    }
}

impl<I> Iterator for ThresholdRows<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = ThresholdPixel;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            let sanitized = sanitize_decimal_commas(line.as_ref());
            let values = scan(&sanitized, "%d %d %f %f %f");
            if values.len() < 4 {
                continue;
            }
            return Some(ThresholdPixel {
                chip: self.chip,
                column: values[0] as u16,
                row: values[1] as u16,
                threshold: to_fixed_point(values[2]),
                noise: to_fixed_point(values[3]),
                wafer_number: 0,
                wafer_position: 0,
            });
        }
    }
}

/// Noisy pixel list of a noise scan: `chip region dcol address`, one pixel per line
#[derive(Debug, Clone)]
pub struct NoisyPixelRows<I> {
    lines: I,
    remap: ChipRemap,
}

impl<I> NoisyPixelRows<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    pub fn new(lines: I, remap: ChipRemap) -> Self {
        Self { lines, remap }
    }
}

impl<I> Iterator for NoisyPixelRows<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = NoisyPixel;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            let values = scan(line.as_ref(), "%d %d %d %d");
            if values.len() < 4 {
                continue;
            }
            let Some(slot) = self.remap.hardware_slot(values[0] as i64) else {
                continue;
            };
            return Some(NoisyPixel {
                chip: slot as u8,
                region: values[1] as u16,
                double_column: values[2] as u16,
                address: values[3] as u16,
            });
        }
    }
}

/// DCTRL driver scan: one line per chip and driver setting with peak-to-peak,
/// amplitude, rise and fall time for both polarities
#[derive(Debug, Clone)]
pub struct DriverSettingRows<I> {
    lines: I,
    remap: ChipRemap,
}

impl<I> DriverSettingRows<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    pub fn new(lines: I, remap: ChipRemap) -> Self {
        Self { lines, remap }
    }
}

impl<I> Iterator for DriverSettingRows<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = DriverSetting;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            let v = scan(line.as_ref(), "%d %d %f %f %f %f %f %f %f %f");
            if v.len() < 10 {
                continue;
            }
            let Some(slot) = self.remap.hardware_slot(v[0] as i64) else {
                continue;
            };
            return Some(DriverSetting {
                chip: slot as u8,
                setting: v[1] as u8,
                peak_to_peak_p: v[2] as f32,
                peak_to_peak_n: v[3] as f32,
                amplitude_p: v[4] as f32,
                amplitude_n: v[5] as f32,
                rise_time_p: v[6],
                rise_time_n: v[7],
                fall_time_p: v[8],
                fall_time_n: v[9],
            });
        }
    }
}

/// Read the back-bias IV curve: (voltage, current) pairs, at most 41 of them.
/// Missing points stay at zero.
pub fn iv_curve<I>(lines: I) -> IvCurve
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut curve = IvCurve::default();
    let points = lines
        .into_iter()
        .filter_map(|line| {
            let values = scan(line.as_ref(), "%f %f");
            (values.len() == 2).then(|| values[1] as f32)
        })
        .take(NUMBER_OF_IV_POINTS);
    for (slot, current) in curve.current.iter_mut().zip(points) {
        *slot = current;
    }
    curve
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::HicType;

    fn hits(lines: &[&str]) -> Vec<(u16, u16, u16)> {
        DigitalRaster::new(lines.iter(), 3)
            .map(|h| (h.column, h.row, h.hits))
            .collect()
    }

    #[test]
    fn test_raster_fills_gaps() {
        let rows = hits(&["0 0 7", "2 0 7"]);
        assert_eq!(rows, vec![(0, 0, 7), (1, 0, 0), (2, 0, 7)]);
    }

    #[test]
    fn test_raster_skips_nominal_hits() {
        let rows = hits(&["0 0 50", "1 0 49", "3 0 50"]);
        assert_eq!(rows, vec![(1, 0, 49), (2, 0, 0)]);
    }

    #[test]
    fn test_raster_wraps_columns() {
        let rows = hits(&["1022 0 3", "0 1 3"]);
        assert_eq!(
            rows,
            vec![(0, 0, 0)]
                .into_iter()
                .chain((1..1022).map(|c| (c, 0, 0)))
                .chain([(1022, 0, 3), (1023, 0, 0), (0, 1, 3)])
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_raster_out_of_order_line() {
        let rows = hits(&["0 0 1", "1 0 2", "0 0 4", "2 0 5"]);
        assert_eq!(rows, vec![(0, 0, 1), (1, 0, 2), (0, 0, 4), (2, 0, 5)]);
    }

    #[test]
    fn test_raster_is_restartable() {
        let lines = ["0 0 7", "2 0 7"];
        let raster = DigitalRaster::new(lines.iter(), 0);
        let first: Vec<_> = raster.clone().collect();
        let second: Vec<_> = raster.collect();
        assert_eq!(first, second);
        assert_eq!(first[0].chip, 0);
    }

    #[test]
    fn test_threshold_fixed_point() {
        let lines = ["12 4 3,45 0,51 1,2", "13 4 3.45 0.51 1.2", "garbage"];
        let rows: Vec<_> = ThresholdRows::new(lines.iter(), 5).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].threshold, 345);
        assert_eq!(rows[1].threshold, 345);
        assert_eq!(rows[0].noise, 51);
        assert_eq!(rows[0].chip, 5);
        assert_eq!(rows[1].column, 13);
    }

    #[test]
    fn test_noisy_pixels_remapped() {
        let lines = ["9 3 12 100", "2 0 1 5", "15 1 1 1"];
        let rows: Vec<_> = NoisyPixelRows::new(lines.iter(), HicType::Outer.remap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].chip, 8);
        assert_eq!(rows[0].double_column, 12);
        assert_eq!(rows[1].chip, 2);
    }

    #[test]
    fn test_driver_settings() {
        let lines = ["1 4 0.5 0.6 0.25 0.3 1e-9 2e-9 3e-9 4e-9", "1 5 0.5"];
        let rows: Vec<_> = DriverSettingRows::new(lines.iter(), HicType::Inner.remap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].setting, 4);
        assert_eq!(rows[0].fall_time_n, 4e-9);
    }

    #[test]
    fn test_iv_curve_pads() {
        let curve = iv_curve(["0.0 1.5", "-0.1 1.7"]);
        assert_eq!(curve.current[0], 1.5);
        assert_eq!(curve.current[1], 1.7);
        assert!(curve.current[2..].iter().all(|c| *c == 0.0));

        let long: Vec<String> = (0..50).map(|i| format!("{i} {i}")).collect();
        let curve = iv_curve(&long);
        assert_eq!(curve.current[40], 40.0);
    }
}
