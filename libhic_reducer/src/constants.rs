// Chip layout
pub const NUMBER_OF_CHIPS: usize = 14; // Logical chip slots per HIC (OB)
pub const NUMBER_OF_CHIPS_IB: usize = 9;
pub const NUMBER_OF_CHIP_IDS_OB: u32 = 15; // Physical ids 0..=14, id 7 does not exist
pub const OB_SKIPPED_CHIP: u32 = 7;
pub const CHIP_ID_MASK: u32 = 0x0f;

// Result files
pub const HEADER_LINES: usize = 3;
pub const STATUS_REGISTER: u32 = 0x700;
pub const BOARD_REGISTERS_MARKER: &str = "Board registers";
pub const REGISTERS_START_MARKER: &str = "Chip registers (start)";
pub const REGISTERS_END_MARKER: &str = "Chip registers (end)";
pub const REGISTERS_HEADER: &str = "# Chip ID";
pub const SUMMARY_MARKER: &str = "Number of chips";

// Raw files
pub const NUMBER_OF_IV_POINTS: usize = 41;
pub const DIGITAL_NOMINAL_HITS: u16 = 50; // Injections per pixel; pixels which saw all of them are omitted
pub const PIXEL_COLUMNS: u16 = 1024;
pub const FIXED_POINT_SCALE: f64 = 100.0;

// Fingerprints can point into at most this many raw tables (threshold scan + tuning)
pub const MAX_RAW_TABLES: usize = 2;

// Store file format
pub const STORE_MAGIC: &[u8; 4] = b"HICT";
pub const STORE_FORMAT_VERSION: u16 = 1;
pub const STORE_EXTENSION: &str = "tbl";
pub const FINGERPRINT_TABLE_NAME: &str = "actFastListTree";

pub const DEFAULT_REFRESH_INTERVAL: usize = 50;
