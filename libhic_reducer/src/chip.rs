use serde::{Deserialize, Serialize};

use super::constants::{
    CHIP_ID_MASK, NUMBER_OF_CHIPS, NUMBER_OF_CHIPS_IB, NUMBER_OF_CHIP_IDS_OB, OB_SKIPPED_CHIP,
};

/// The two HIC flavours. Outer barrel HICs carry 14 chips on 15 physical positions
/// (position 7 is empty), inner barrel HICs carry 9 chips numbered contiguously.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HicType {
    #[default]
    #[serde(rename = "OB")]
    Outer,
    #[serde(rename = "IB")]
    Inner,
}

impl HicType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Outer => "OB",
            Self::Inner => "IB",
        }
    }

    /// Number of chips actually mounted on the HIC
    pub fn number_of_chips(&self) -> usize {
        match self {
            Self::Outer => NUMBER_OF_CHIPS,
            Self::Inner => NUMBER_OF_CHIPS_IB,
        }
    }

    /// Raw chip ids above this value are shifted down by one
    pub fn remap_threshold(&self) -> Option<u32> {
        match self {
            Self::Outer => Some(OB_SKIPPED_CHIP),
            Self::Inner => None,
        }
    }

    /// All physical chip ids present on this HIC type, in increasing order
    pub fn chip_ids(&self) -> Vec<u32> {
        match self {
            Self::Outer => (0..NUMBER_OF_CHIP_IDS_OB)
                .filter(|id| *id != OB_SKIPPED_CHIP)
                .collect(),
            Self::Inner => (0..NUMBER_OF_CHIPS_IB as u32).collect(),
        }
    }

    pub fn remap(&self) -> ChipRemap {
        ChipRemap::new(self.remap_threshold())
    }
}

/// Maps raw chip identifiers found in result files onto logical slots 0..14.
///
/// Every per-chip array in a record, and every chip column of a raw row, is indexed
/// by the logical slot. Ids which would land outside the arrays yield None.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChipRemap {
    threshold: Option<u32>,
}

impl ChipRemap {
    pub fn new(threshold: Option<u32>) -> Self {
        Self { threshold }
    }

    /// Logical slot of a chip id as written in the per-chip lines of a result file
    pub fn logical_slot(&self, raw_id: i64) -> Option<usize> {
        if raw_id < 0 {
            return None;
        }
        let raw_id = raw_id as u32;
        let slot = match self.threshold {
            Some(threshold) if raw_id > threshold => raw_id - 1,
            _ => raw_id,
        } as usize;
        (slot < NUMBER_OF_CHIPS).then_some(slot)
    }

    /// Logical slot of a full hardware chip id (module bits included), as found in
    /// register dumps and noisy pixel lists. Only the lower 4 bits name the chip.
    pub fn hardware_slot(&self, raw_id: i64) -> Option<usize> {
        if raw_id < 0 {
            return None;
        }
        self.logical_slot((raw_id as u32 & CHIP_ID_MASK) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_remap() {
        let remap = HicType::Outer.remap();
        for raw in 0..=7 {
            assert_eq!(remap.logical_slot(raw), Some(raw as usize));
        }
        for raw in 8..=14 {
            assert_eq!(remap.logical_slot(raw), Some(raw as usize - 1));
        }
        assert_eq!(remap.logical_slot(15), None);
        assert_eq!(remap.logical_slot(-1), None);
    }

    #[test]
    fn test_inner_remap_is_identity() {
        let remap = HicType::Inner.remap();
        for raw in 0..9 {
            assert_eq!(remap.logical_slot(raw), Some(raw as usize));
        }
    }

    #[test]
    fn test_physical_ids_map_to_distinct_slots() {
        for hic in [HicType::Outer, HicType::Inner] {
            let remap = hic.remap();
            let mut slots: Vec<usize> = hic
                .chip_ids()
                .into_iter()
                .map(|id| remap.logical_slot(id as i64).unwrap())
                .collect();
            assert_eq!(slots.len(), hic.number_of_chips());
            slots.dedup();
            assert_eq!(slots.len(), hic.number_of_chips());
            assert_eq!(*slots.last().unwrap(), hic.number_of_chips() - 1);
        }
    }

    #[test]
    fn test_hardware_slot_masks_module_bits() {
        let remap = HicType::Outer.remap();
        assert_eq!(remap.hardware_slot(0x73), Some(3));
        assert_eq!(remap.hardware_slot(0x7a), Some(9));
    }
}
