pub mod global;
pub mod packing;
pub mod patch;
pub mod sysex;

// SysEx framing //////////////////////////////////

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// Extended manufacturer ID assigned to Sigma instruments.
pub const MANUFACTURER_ID: [u8; 3] = [0x00, 0x21, 0x35];
/// Device family identifier for the Sigma VS line.
pub const FAMILY_ID: [u8; 2] = [0x53, 0x01];

/* Universal non-realtime (device inquiry) */
pub const UNIVERSAL_NON_REALTIME: u8 = 0x7E;
pub const SUB_ID_GENERAL_INFORMATION: u8 = 0x06;
pub const SUB_ID_IDENTITY_REQUEST: u8 = 0x01;
pub const SUB_ID_IDENTITY_REPLY: u8 = 0x02;

// Command bytes //////////////////////////////////

pub const CMD_GLOBAL_DUMP_REQUEST: u8 = 0x10;
pub const CMD_GLOBAL_DUMP: u8 = 0x11;
pub const CMD_GLOBAL_DUMP_RECEIVED: u8 = 0x12;

pub const CMD_EDIT_BUFFER_DUMP_REQUEST: u8 = 0x20;
pub const CMD_EDIT_BUFFER_DUMP: u8 = 0x21;
pub const CMD_PATCH_DUMP_REQUEST: u8 = 0x22;
pub const CMD_PATCH_DUMP: u8 = 0x23;
pub const CMD_PATTERN_DUMP_REQUEST: u8 = 0x24;
pub const CMD_PATTERN_DUMP: u8 = 0x25;
pub const CMD_SEQUENCER_DUMP_REQUEST: u8 = 0x26;
pub const CMD_SEQUENCER_DUMP: u8 = 0x27;
pub const CMD_PATCH_NAME_REQUEST: u8 = 0x28;
pub const CMD_PATCH_NAME: u8 = 0x29;
pub const CMD_PARAM_GET: u8 = 0x2A;
pub const CMD_PARAM_SET: u8 = 0x2B;

// Channel voice messages /////////////////////////

pub const STATUS_CONTROL_CHANGE: u8 = 0xB0;
pub const STATUS_PROGRAM_CHANGE: u8 = 0xC0;
pub const CC_BANK_SELECT_MSB: u8 = 0x00;

// Payload geometry ///////////////////////////////

pub const GLOBAL_PAYLOAD_LENGTH: usize = 32;
pub const PATCH_PAYLOAD_LENGTH: usize = 60;
pub const PATCH_NAME_LENGTH: usize = 20;

// Liveness ///////////////////////////////////////

pub const HEARTBEAT_INTERVAL_MS: u64 = 5000;
/// Liveness is lost after this many missed heartbeat intervals.
pub const HEARTBEAT_GRACE_FACTOR: u32 = 3;
