//! Global settings dump codec.
//!
//! The device transmits its global (non-patch) configuration as a fixed
//! 32-byte payload. Decoding masks each field down to its defined bits
//! and degrades out-of-range enumerated codes to a default variant, so
//! it never fails on malformed input. Encoding writes reserved offsets
//! as zero, which makes `decode(encode(r)) == r` hold while the
//! converse stays deliberately lossy on undefined bits.

use num_enum::{FromPrimitive, IntoPrimitive};
use serde::Serialize;

use crate::sigma as sg;
use crate::sigma::packing::{pack_12bit, unpack_12bit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum MessageRouting {
    #[num_enum(default)]
    Off = 0,
    ReceiveOnly = 1,
    TransmitOnly = 2,
    Both = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    /// Unrecognized clock-source codes decode to internal.
    #[num_enum(default)]
    Internal = 0,
    MidiClock = 1,
    External = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum PedalPolarity {
    #[num_enum(default)]
    Normal = 0,
    Inverted = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum VelocityCurve {
    #[num_enum(default)]
    Linear = 0,
    Soft = 1,
    Hard = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum NotePriority {
    #[num_enum(default)]
    LastNote = 0,
    LowNote = 1,
    HighNote = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum ClockDivision {
    #[num_enum(default)]
    Quarter = 0,
    Eighth = 1,
    Sixteenth = 2,
    ThirtySecond = 3,
}

/// The device-wide settings record, replaced wholesale on receipt of a
/// Global Dump.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalSettingsRecord {
    pub midi_channel: u8, // 1..=16
    pub device_id: u8,    // 0..=15
    pub patch_receive_mode: MessageRouting,
    pub cc_mode: MessageRouting,
    pub program_change_mode: MessageRouting,
    pub sysex_mode: MessageRouting,
    pub clock_source: ClockSource,
    pub internal_clock_rate: u16, // 12-bit
    pub pedal_polarity: PedalPolarity,
    pub sustain_enable: bool,
    pub master_tune: u8, // 0..=127, center 64
    pub transpose: u8,   // 0..=127, center 64
    pub velocity_curve: VelocityCurve,
    pub local_control: bool,
    pub pattern_level: u16, // 12-bit
    pub note_priority: NotePriority,
    pub aftertouch_enable: bool,
    pub midi_soft_thru: bool,
    pub pattern_clock_div: ClockDivision,
    pub memory_protect: bool,
    pub auto_tune: bool,
    pub start_stop_enable: bool,
}

impl Default for GlobalSettingsRecord {
    fn default() -> Self {
        Self {
            midi_channel: 1,
            device_id: 0,
            patch_receive_mode: MessageRouting::Off,
            cc_mode: MessageRouting::Off,
            program_change_mode: MessageRouting::Off,
            sysex_mode: MessageRouting::Off,
            clock_source: ClockSource::Internal,
            internal_clock_rate: 0,
            pedal_polarity: PedalPolarity::Normal,
            sustain_enable: false,
            master_tune: 64,
            transpose: 64,
            velocity_curve: VelocityCurve::Linear,
            local_control: true,
            pattern_level: 0,
            note_priority: NotePriority::LastNote,
            aftertouch_enable: false,
            midi_soft_thru: false,
            pattern_clock_div: ClockDivision::Quarter,
            memory_protect: false,
            auto_tune: false,
            start_stop_enable: false,
        }
    }
}

// Fixed byte offsets within the 32-byte payload /////////////////////

const OFS_MIDI_CHANNEL: usize = 0;
const OFS_DEVICE_ID: usize = 1;
const OFS_PATCH_RECEIVE_MODE: usize = 2;
const OFS_CC_MODE: usize = 3;
const OFS_PROGRAM_CHANGE_MODE: usize = 4;
const OFS_CLOCK_SOURCE: usize = 5;
const OFS_CLOCK_RATE_HI: usize = 6;
const OFS_CLOCK_RATE_LO: usize = 7;
const OFS_PEDAL_POLARITY: usize = 8;
const OFS_SUSTAIN_ENABLE: usize = 9;
const OFS_MASTER_TUNE: usize = 10;
const OFS_TRANSPOSE: usize = 11;
const OFS_VELOCITY_CURVE: usize = 12;
const OFS_LOCAL_CONTROL: usize = 13;
const OFS_PATTERN_LEVEL_HI: usize = 14;
const OFS_PATTERN_LEVEL_LO: usize = 15;
const OFS_NOTE_PRIORITY: usize = 16;
const OFS_AFTERTOUCH_ENABLE: usize = 17;
const OFS_MIDI_SOFT_THRU: usize = 18;
const OFS_PATTERN_CLOCK_DIV: usize = 19;
const OFS_MEMORY_PROTECT: usize = 20;
const OFS_SYSEX_MODE: usize = 21;
const OFS_AUTO_TUNE: usize = 22;
const OFS_START_STOP_ENABLE: usize = 23;
// offsets 24..=31 are reserved and always written as zero

pub fn encode(record: &GlobalSettingsRecord) -> [u8; sg::GLOBAL_PAYLOAD_LENGTH] {
    let mut payload = [0u8; sg::GLOBAL_PAYLOAD_LENGTH];
    payload[OFS_MIDI_CHANNEL] = record.midi_channel.clamp(1, 16) - 1;
    payload[OFS_DEVICE_ID] = record.device_id & 0x0F;
    payload[OFS_PATCH_RECEIVE_MODE] = u8::from(record.patch_receive_mode);
    payload[OFS_CC_MODE] = u8::from(record.cc_mode);
    payload[OFS_PROGRAM_CHANGE_MODE] = u8::from(record.program_change_mode);
    payload[OFS_CLOCK_SOURCE] = u8::from(record.clock_source);
    let clock_rate = unpack_12bit(record.internal_clock_rate);
    payload[OFS_CLOCK_RATE_HI] = clock_rate[0];
    payload[OFS_CLOCK_RATE_LO] = clock_rate[1];
    payload[OFS_PEDAL_POLARITY] = u8::from(record.pedal_polarity);
    payload[OFS_SUSTAIN_ENABLE] = record.sustain_enable as u8;
    payload[OFS_MASTER_TUNE] = record.master_tune & 0x7F;
    payload[OFS_TRANSPOSE] = record.transpose & 0x7F;
    payload[OFS_VELOCITY_CURVE] = u8::from(record.velocity_curve);
    payload[OFS_LOCAL_CONTROL] = record.local_control as u8;
    let pattern_level = unpack_12bit(record.pattern_level);
    payload[OFS_PATTERN_LEVEL_HI] = pattern_level[0];
    payload[OFS_PATTERN_LEVEL_LO] = pattern_level[1];
    payload[OFS_NOTE_PRIORITY] = u8::from(record.note_priority);
    payload[OFS_AFTERTOUCH_ENABLE] = record.aftertouch_enable as u8;
    payload[OFS_MIDI_SOFT_THRU] = record.midi_soft_thru as u8;
    payload[OFS_PATTERN_CLOCK_DIV] = u8::from(record.pattern_clock_div);
    payload[OFS_MEMORY_PROTECT] = record.memory_protect as u8;
    payload[OFS_SYSEX_MODE] = u8::from(record.sysex_mode);
    payload[OFS_AUTO_TUNE] = record.auto_tune as u8;
    payload[OFS_START_STOP_ENABLE] = record.start_stop_enable as u8;
    return payload;
}

/// Decodes a Global Dump payload. Short payloads are padded with zeros
/// so that every field still lands on a defined value.
pub fn decode(payload: &[u8]) -> GlobalSettingsRecord {
    let mut buffer = [0u8; sg::GLOBAL_PAYLOAD_LENGTH];
    let length = payload.len().min(sg::GLOBAL_PAYLOAD_LENGTH);
    buffer[..length].copy_from_slice(&payload[..length]);
    if payload.len() != sg::GLOBAL_PAYLOAD_LENGTH {
        log::warn!(
            "Global dump payload length {} differs from expected {}",
            payload.len(),
            sg::GLOBAL_PAYLOAD_LENGTH
        );
    }

    return GlobalSettingsRecord {
        midi_channel: (buffer[OFS_MIDI_CHANNEL] & 0x0F) + 1,
        device_id: buffer[OFS_DEVICE_ID] & 0x0F,
        patch_receive_mode: MessageRouting::from(buffer[OFS_PATCH_RECEIVE_MODE] & 0x03),
        cc_mode: MessageRouting::from(buffer[OFS_CC_MODE] & 0x03),
        program_change_mode: MessageRouting::from(buffer[OFS_PROGRAM_CHANGE_MODE] & 0x03),
        sysex_mode: MessageRouting::from(buffer[OFS_SYSEX_MODE] & 0x03),
        clock_source: ClockSource::from(buffer[OFS_CLOCK_SOURCE] & 0x03),
        internal_clock_rate: pack_12bit(buffer[OFS_CLOCK_RATE_HI], buffer[OFS_CLOCK_RATE_LO]),
        pedal_polarity: PedalPolarity::from(buffer[OFS_PEDAL_POLARITY] & 0x01),
        sustain_enable: buffer[OFS_SUSTAIN_ENABLE] != 0,
        master_tune: buffer[OFS_MASTER_TUNE] & 0x7F,
        transpose: buffer[OFS_TRANSPOSE] & 0x7F,
        velocity_curve: VelocityCurve::from(buffer[OFS_VELOCITY_CURVE] & 0x03),
        local_control: buffer[OFS_LOCAL_CONTROL] != 0,
        pattern_level: pack_12bit(buffer[OFS_PATTERN_LEVEL_HI], buffer[OFS_PATTERN_LEVEL_LO]),
        note_priority: NotePriority::from(buffer[OFS_NOTE_PRIORITY] & 0x03),
        aftertouch_enable: buffer[OFS_AFTERTOUCH_ENABLE] != 0,
        midi_soft_thru: buffer[OFS_MIDI_SOFT_THRU] != 0,
        pattern_clock_div: ClockDivision::from(buffer[OFS_PATTERN_CLOCK_DIV] & 0x03),
        memory_protect: buffer[OFS_MEMORY_PROTECT] != 0,
        auto_tune: buffer[OFS_AUTO_TUNE] != 0,
        start_stop_enable: buffer[OFS_START_STOP_ENABLE] != 0,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> GlobalSettingsRecord {
        GlobalSettingsRecord {
            midi_channel: 7,
            device_id: 3,
            patch_receive_mode: MessageRouting::ReceiveOnly,
            cc_mode: MessageRouting::Both,
            program_change_mode: MessageRouting::TransmitOnly,
            sysex_mode: MessageRouting::Both,
            clock_source: ClockSource::MidiClock,
            internal_clock_rate: 0x0ABC,
            pedal_polarity: PedalPolarity::Inverted,
            sustain_enable: true,
            master_tune: 70,
            transpose: 52,
            velocity_curve: VelocityCurve::Hard,
            local_control: false,
            pattern_level: 4095,
            note_priority: NotePriority::HighNote,
            aftertouch_enable: true,
            midi_soft_thru: true,
            pattern_clock_div: ClockDivision::Sixteenth,
            memory_protect: true,
            auto_tune: true,
            start_stop_enable: false,
        }
    }

    #[test]
    fn test_round_trip() {
        let record = sample_record();
        assert_eq!(decode(&encode(&record)), record);
        let default = GlobalSettingsRecord::default();
        assert_eq!(decode(&encode(&default)), default);
    }

    #[test]
    fn test_reserved_offsets_stay_zero() {
        let payload = encode(&sample_record());
        assert!(payload[24..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_decode_masks_undefined_bits() {
        let mut payload = encode(&GlobalSettingsRecord::default());
        payload[OFS_MIDI_CHANNEL] = 0xF6; // high nibble undefined
        payload[OFS_CLOCK_RATE_HI] = 0xFA;
        let record = decode(&payload);
        assert_eq!(record.midi_channel, 7);
        assert_eq!(record.internal_clock_rate & 0x0F00, 0x0A00);
    }

    #[test]
    fn test_out_of_range_clock_source_decodes_to_internal() {
        let mut payload = encode(&GlobalSettingsRecord::default());
        payload[OFS_CLOCK_SOURCE] = 0x03; // within the mask, but no such code
        assert_eq!(decode(&payload).clock_source, ClockSource::Internal);
    }

    #[test]
    fn test_short_payload_degrades_to_defaults() {
        let record = decode(&[0x05]);
        assert_eq!(record.midi_channel, 6);
        assert_eq!(record.clock_source, ClockSource::Internal);
        assert_eq!(record.pattern_level, 0);
    }

    #[test]
    fn test_enum_code_tables_are_exact_inverses() {
        for variant in [
            MessageRouting::Off,
            MessageRouting::ReceiveOnly,
            MessageRouting::TransmitOnly,
            MessageRouting::Both,
        ] {
            assert_eq!(MessageRouting::from(u8::from(variant)), variant);
        }
        for variant in [ClockSource::Internal, ClockSource::MidiClock, ClockSource::External] {
            assert_eq!(ClockSource::from(u8::from(variant)), variant);
        }
        for variant in [
            NotePriority::LastNote,
            NotePriority::LowNote,
            NotePriority::HighNote,
        ] {
            assert_eq!(NotePriority::from(u8::from(variant)), variant);
        }
        for variant in [
            ClockDivision::Quarter,
            ClockDivision::Eighth,
            ClockDivision::Sixteenth,
            ClockDivision::ThirtySecond,
        ] {
            assert_eq!(ClockDivision::from(u8::from(variant)), variant);
        }
    }
}
