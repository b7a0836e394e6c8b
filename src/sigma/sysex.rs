//! SysEx command classification and outbound frame builders.
//!
//! Classification is exact: a frame is legitimate only if its
//! manufacturer triplet, family pair and command byte all match the
//! Sigma constants. Anything else is reported as unrecognized so that
//! foreign traffic on a shared bus can be ignored safely.

use serde::Serialize;

use crate::sigma as sg;

/// Identity information extracted from a universal Identity Reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceIdentity {
    pub manufacturer: [u8; 3],
    pub family: [u8; 2],
    pub member: [u8; 2],
    pub program_version: (u8, u8),
    pub bootloader_version: u8,
    pub build_number: u8,
}

impl DeviceIdentity {
    /// True when the reply came from a Sigma device, as opposed to any
    /// other instrument answering the universal inquiry.
    pub fn is_sigma(&self) -> bool {
        return self.manufacturer == sg::MANUFACTURER_ID && self.family == sg::FAMILY_ID;
    }

    pub fn version_string(&self) -> String {
        return format!(
            "{}.{} (bootloader {}, build {})",
            self.program_version.0,
            self.program_version.1,
            self.bootloader_version,
            self.build_number
        );
    }
}

/// The fixed command taxonomy of the Sigma SysEx implementation.
#[derive(Debug, Clone, PartialEq)]
pub enum SysexCommand {
    IdentityRequest,
    IdentityReply(DeviceIdentity),
    GlobalDumpRequest,
    GlobalDump(Vec<u8>),
    GlobalDumpReceived,
    EditBufferDumpRequest,
    EditBufferDump(Vec<u8>),
    PatchDumpRequest { slot: u8 },
    PatchDump(Vec<u8>),
    PatternDumpRequest,
    PatternDump(Vec<u8>),
    SequencerDumpRequest,
    SequencerDump(Vec<u8>),
    PatchNameRequest,
    PatchName(Vec<u8>),
    ParamGet { param: u8 },
    ParamSet { param: u8, value: u8 },
}

/// Classifies one raw SysEx frame, or returns `None` for anything that
/// does not match a known command shape.
pub fn classify(bytes: &[u8]) -> Option<SysexCommand> {
    if bytes.len() < 2 || bytes[0] != sg::SYSEX_START || bytes[bytes.len() - 1] != sg::SYSEX_END {
        return None;
    }
    if bytes[1] == sg::UNIVERSAL_NON_REALTIME {
        return classify_universal(bytes);
    }
    return classify_device(bytes);
}

/// Universal non-realtime frames: `F0 7E <device-id> 06 <sub-id> ... F7`.
/// Recognized independent of manufacturer, so that device discovery can
/// happen before we know who is on the other end.
fn classify_universal(bytes: &[u8]) -> Option<SysexCommand> {
    if bytes.len() < 6 || bytes[3] != sg::SUB_ID_GENERAL_INFORMATION {
        return None;
    }
    match bytes[4] {
        sg::SUB_ID_IDENTITY_REQUEST => Some(SysexCommand::IdentityRequest),
        sg::SUB_ID_IDENTITY_REPLY => {
            // F0 7E dd 06 02 mm mm mm ff ff nn nn v1 v2 v3 v4 F7
            if bytes.len() < 17 {
                return None;
            }
            let identity = DeviceIdentity {
                manufacturer: [bytes[5], bytes[6], bytes[7]],
                family: [bytes[8], bytes[9]],
                member: [bytes[10], bytes[11]],
                program_version: (bytes[12], bytes[13]),
                bootloader_version: bytes[14],
                build_number: bytes[15],
            };
            Some(SysexCommand::IdentityReply(identity))
        }
        _ => None,
    }
}

/// Device-specific frames:
/// `F0 <mfr x3> <family x2> <device-id> <command> ...payload... F7`.
/// The device-id byte is a don't-care for matching.
fn classify_device(bytes: &[u8]) -> Option<SysexCommand> {
    if bytes.len() < 9 {
        return None;
    }
    if bytes[1..4] != sg::MANUFACTURER_ID || bytes[4..6] != sg::FAMILY_ID {
        return None;
    }
    let command = bytes[7];
    let payload = &bytes[8..bytes.len() - 1];
    return match command {
        sg::CMD_GLOBAL_DUMP_REQUEST => Some(SysexCommand::GlobalDumpRequest),
        sg::CMD_GLOBAL_DUMP => Some(SysexCommand::GlobalDump(payload.to_vec())),
        sg::CMD_GLOBAL_DUMP_RECEIVED => Some(SysexCommand::GlobalDumpReceived),
        sg::CMD_EDIT_BUFFER_DUMP_REQUEST => Some(SysexCommand::EditBufferDumpRequest),
        sg::CMD_EDIT_BUFFER_DUMP => Some(SysexCommand::EditBufferDump(payload.to_vec())),
        sg::CMD_PATCH_DUMP_REQUEST => Some(SysexCommand::PatchDumpRequest {
            slot: *payload.first()?,
        }),
        sg::CMD_PATCH_DUMP => Some(SysexCommand::PatchDump(payload.to_vec())),
        sg::CMD_PATTERN_DUMP_REQUEST => Some(SysexCommand::PatternDumpRequest),
        sg::CMD_PATTERN_DUMP => Some(SysexCommand::PatternDump(payload.to_vec())),
        sg::CMD_SEQUENCER_DUMP_REQUEST => Some(SysexCommand::SequencerDumpRequest),
        sg::CMD_SEQUENCER_DUMP => Some(SysexCommand::SequencerDump(payload.to_vec())),
        sg::CMD_PATCH_NAME_REQUEST => Some(SysexCommand::PatchNameRequest),
        sg::CMD_PATCH_NAME => Some(SysexCommand::PatchName(payload.to_vec())),
        sg::CMD_PARAM_GET => Some(SysexCommand::ParamGet {
            param: *payload.first()?,
        }),
        sg::CMD_PARAM_SET => {
            if payload.len() < 2 {
                return None;
            }
            Some(SysexCommand::ParamSet {
                param: payload[0],
                value: payload[1],
            })
        }
        _ => None,
    };
}

// Outbound frame builders ////////////////////////////////////////////

pub fn identity_request(device_id: u8) -> Vec<u8> {
    return vec![
        sg::SYSEX_START,
        sg::UNIVERSAL_NON_REALTIME,
        device_id & 0x0F,
        sg::SUB_ID_GENERAL_INFORMATION,
        sg::SUB_ID_IDENTITY_REQUEST,
        sg::SYSEX_END,
    ];
}

fn device_frame(device_id: u8, command: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(9 + payload.len());
    frame.push(sg::SYSEX_START);
    frame.extend_from_slice(&sg::MANUFACTURER_ID);
    frame.extend_from_slice(&sg::FAMILY_ID);
    frame.push(device_id & 0x0F);
    frame.push(command);
    frame.extend_from_slice(payload);
    frame.push(sg::SYSEX_END);
    return frame;
}

pub fn global_dump_request(device_id: u8) -> Vec<u8> {
    return device_frame(device_id, sg::CMD_GLOBAL_DUMP_REQUEST, &[]);
}

pub fn global_dump_received(device_id: u8) -> Vec<u8> {
    return device_frame(device_id, sg::CMD_GLOBAL_DUMP_RECEIVED, &[]);
}

pub fn edit_buffer_dump_request(device_id: u8) -> Vec<u8> {
    return device_frame(device_id, sg::CMD_EDIT_BUFFER_DUMP_REQUEST, &[]);
}

pub fn patch_dump_request(device_id: u8, slot: u8) -> Vec<u8> {
    return device_frame(device_id, sg::CMD_PATCH_DUMP_REQUEST, &[slot & 0x7F]);
}

pub fn pattern_dump_request(device_id: u8) -> Vec<u8> {
    return device_frame(device_id, sg::CMD_PATTERN_DUMP_REQUEST, &[]);
}

pub fn sequencer_dump_request(device_id: u8) -> Vec<u8> {
    return device_frame(device_id, sg::CMD_SEQUENCER_DUMP_REQUEST, &[]);
}

pub fn patch_name_request(device_id: u8) -> Vec<u8> {
    return device_frame(device_id, sg::CMD_PATCH_NAME_REQUEST, &[]);
}

/// Patch name set; the name is space-padded to the fixed 20-byte field.
pub fn patch_name_set(device_id: u8, name: &str) -> Vec<u8> {
    let mut payload = [0x20u8; sg::PATCH_NAME_LENGTH];
    for (i, b) in name.bytes().take(sg::PATCH_NAME_LENGTH).enumerate() {
        payload[i] = if (0x20..=0x7E).contains(&b) { b } else { 0x20 };
    }
    return device_frame(device_id, sg::CMD_PATCH_NAME, &payload);
}

pub fn param_get(device_id: u8, param: u8) -> Vec<u8> {
    return device_frame(device_id, sg::CMD_PARAM_GET, &[param & 0x7F]);
}

pub fn param_set(device_id: u8, param: u8, value: u8) -> Vec<u8> {
    return device_frame(device_id, sg::CMD_PARAM_SET, &[param & 0x7F, value & 0x7F]);
}

pub fn control_change(channel: u8, controller: u8, value: u8) -> Vec<u8> {
    return vec![
        sg::STATUS_CONTROL_CHANGE | (channel.saturating_sub(1) & 0x0F),
        controller & 0x7F,
        value & 0x7F,
    ];
}

pub fn program_change(channel: u8, program: u8) -> Vec<u8> {
    return vec![
        sg::STATUS_PROGRAM_CHANGE | (channel.saturating_sub(1) & 0x0F),
        program & 0x7F,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_reply_bytes() -> Vec<u8> {
        let mut bytes = vec![
            sg::SYSEX_START,
            sg::UNIVERSAL_NON_REALTIME,
            0x00,
            sg::SUB_ID_GENERAL_INFORMATION,
            sg::SUB_ID_IDENTITY_REPLY,
        ];
        bytes.extend_from_slice(&sg::MANUFACTURER_ID);
        bytes.extend_from_slice(&sg::FAMILY_ID);
        bytes.extend_from_slice(&[0x01, 0x00]); // family member
        bytes.extend_from_slice(&[1, 2, 3, 34]); // versions
        bytes.push(sg::SYSEX_END);
        return bytes;
    }

    #[test]
    fn test_classify_identity_reply() {
        let Some(SysexCommand::IdentityReply(identity)) = classify(&identity_reply_bytes()) else {
            panic!("expected an identity reply");
        };
        assert!(identity.is_sigma());
        assert_eq!(identity.program_version, (1, 2));
        assert_eq!(identity.bootloader_version, 3);
        assert_eq!(identity.build_number, 34);
        assert_eq!(identity.version_string(), "1.2 (bootloader 3, build 34)");
    }

    #[test]
    fn test_classify_identity_request() {
        let bytes = identity_request(0x00);
        assert_eq!(classify(&bytes), Some(SysexCommand::IdentityRequest));
    }

    #[test]
    fn test_foreign_identity_reply_is_still_classified() {
        // universal replies match on shape, not manufacturer
        let mut bytes = identity_reply_bytes();
        bytes[5] = 0x42;
        let Some(SysexCommand::IdentityReply(identity)) = classify(&bytes) else {
            panic!("expected an identity reply");
        };
        assert!(!identity.is_sigma());
    }

    #[test]
    fn test_classify_device_commands() {
        let cases = vec![
            (global_dump_request(0), SysexCommand::GlobalDumpRequest),
            (global_dump_received(0), SysexCommand::GlobalDumpReceived),
            (edit_buffer_dump_request(0), SysexCommand::EditBufferDumpRequest),
            (patch_dump_request(0, 5), SysexCommand::PatchDumpRequest { slot: 5 }),
            (pattern_dump_request(0), SysexCommand::PatternDumpRequest),
            (sequencer_dump_request(0), SysexCommand::SequencerDumpRequest),
            (patch_name_request(0), SysexCommand::PatchNameRequest),
            (param_get(0, 0x16), SysexCommand::ParamGet { param: 0x16 }),
            (
                param_set(0, 0x16, 90),
                SysexCommand::ParamSet { param: 0x16, value: 90 },
            ),
        ];
        for (bytes, expected) in cases {
            assert_eq!(classify(&bytes), Some(expected));
        }
    }

    #[test]
    fn test_classify_dump_payload() {
        let payload = vec![0x01u8; sg::GLOBAL_PAYLOAD_LENGTH];
        let frame = device_frame(0, sg::CMD_GLOBAL_DUMP, &payload);
        assert_eq!(classify(&frame), Some(SysexCommand::GlobalDump(payload)));
    }

    #[test]
    fn test_wrong_manufacturer_byte_never_partially_matches() {
        let mut frame = global_dump_request(0);
        frame[2] = 0x22;
        assert_eq!(classify(&frame), None);
    }

    #[test]
    fn test_wrong_family_fails_closed() {
        let mut frame = global_dump_request(0);
        frame[5] = 0x7F;
        assert_eq!(classify(&frame), None);
    }

    #[test]
    fn test_device_id_is_dont_care() {
        let mut frame = global_dump_request(0);
        frame[6] = 0x0C;
        assert_eq!(classify(&frame), Some(SysexCommand::GlobalDumpRequest));
    }

    #[test]
    fn test_garbage_is_unrecognized() {
        assert_eq!(classify(&[]), None);
        assert_eq!(classify(&[0xF0]), None);
        assert_eq!(classify(&[0xF0, 0x43, 0x00, 0xF7]), None);
        assert_eq!(classify(&[0x90, 0x40, 0x7F]), None);
        // known command byte but truncated payload
        let frame = device_frame(0, sg::CMD_PARAM_SET, &[0x16]);
        assert_eq!(classify(&frame), None);
    }

    #[test]
    fn test_patch_name_set_pads_and_sanitizes() {
        let frame = patch_name_set(0, "Lead\t1");
        let payload = &frame[8..frame.len() - 1];
        assert_eq!(payload.len(), sg::PATCH_NAME_LENGTH);
        assert_eq!(&payload[..6], b"Lead 1");
        assert!(payload[6..].iter().all(|b| *b == 0x20));
    }

    #[test]
    fn test_channel_voice_builders() {
        assert_eq!(control_change(1, 0x07, 90), vec![0xB0, 0x07, 90]);
        assert_eq!(control_change(3, 0x07, 200), vec![0xB2, 0x07, 72]);
        assert_eq!(program_change(1, 64), vec![0xC0, 64]);
    }
}
