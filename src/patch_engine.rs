//! Patch synchronization engine.
//!
//! Keeps the authoritative in-memory patch and decides, for every
//! change, which MIDI messages (if any) must go out to keep the device
//! in step. The core rule is echo suppression: only changes that
//! originate from a local edit are forwarded; changes that arrived FROM
//! the device are applied silently, so an inbound message can never
//! bounce back out.

use crate::sigma::patch::{ParamId, PatchRecord};
use crate::sigma::sysex;

/// Where a patch change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Local edit by the operator; must be forwarded to the device.
    UserEdit,
    /// Inbound control change from the device; applied silently.
    ControlChangeIn,
    /// Inbound dump or parameter message from the device; applied
    /// silently.
    SysexDumpIn,
}

pub struct PatchEngine {
    patch: PatchRecord,
    channel: u8,
    device_id: u8,
}

impl PatchEngine {
    pub fn new(channel: u8, device_id: u8) -> Self {
        Self {
            patch: PatchRecord::default(),
            channel,
            device_id,
        }
    }

    pub fn patch(&self) -> &PatchRecord {
        return &self.patch;
    }

    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel.clamp(1, 16);
    }

    pub fn set_device_id(&mut self, device_id: u8) {
        self.device_id = device_id & 0x0F;
    }

    /// Applies one parameter change and returns the frames to transmit.
    /// Non-local origins always return no frames, and so does a local
    /// edit that leaves the field unchanged.
    pub fn set_param(&mut self, param: ParamId, value: u8, origin: ChangeOrigin) -> Vec<Vec<u8>> {
        let value = value & 0x7F;
        let previous = self.patch.cc_get(param);
        self.patch.cc_set(param, value);
        if origin != ChangeOrigin::UserEdit {
            return vec![];
        }
        if self.patch.cc_get(param) == previous {
            return vec![];
        }
        if param.is_device_native() {
            return vec![sysex::param_set(self.device_id, param.cc(), value)];
        }
        return vec![sysex::control_change(self.channel, param.cc(), value)];
    }

    /// Renames the patch. A local rename goes out as a patch name
    /// message; remote renames and no-op renames are absorbed.
    pub fn set_name(&mut self, name: &str, origin: ChangeOrigin) -> Vec<Vec<u8>> {
        let previous = self.patch.name.clone();
        self.patch.set_name(name);
        if origin != ChangeOrigin::UserEdit || self.patch.name == previous {
            return vec![];
        }
        return vec![sysex::patch_name_set(self.device_id, &self.patch.name)];
    }

    /// Replaces the whole patch from an inbound dump payload. Dumps
    /// come from the device, so nothing is echoed.
    pub fn apply_dump(&mut self, payload: &[u8]) {
        self.patch = crate::sigma::patch::decode(payload);
        log::info!("Patch replaced from dump: \"{}\"", self.patch.name);
    }

    /// Routes an inbound control change from the device. Unmapped
    /// controllers are logged and dropped.
    pub fn handle_control_change(&mut self, controller: u8, value: u8) {
        match ParamId::from_cc(controller) {
            Some(param) => {
                self.set_param(param, value, ChangeOrigin::ControlChangeIn);
            }
            None => {
                log::debug!("Ignoring unmapped controller {:#04x}", controller);
            }
        }
    }

    /// Routes an inbound parameter-set message from the device.
    pub fn handle_param_set(&mut self, param_cc: u8, value: u8) {
        match ParamId::from_cc(param_cc) {
            Some(param) => {
                self.set_param(param, value, ChangeOrigin::SysexDumpIn);
            }
            None => {
                log::debug!("Ignoring unknown parameter number {:#04x}", param_cc);
            }
        }
    }

    /// Builds the bank-select + program-change pair for a patch
    /// address. Addresses are 1-based: group 1..=4, bank 1..=8,
    /// patch 1..=8; out-of-range components clamp to the edges. Two
    /// groups share one bank-select value, the odd group offset by 64
    /// program numbers.
    pub fn select_patch_address(&self, group: u8, bank: u8, patch: u8) -> Vec<Vec<u8>> {
        let group = group.clamp(1, 4) as u16 - 1;
        let bank = bank.clamp(1, 8) as u16 - 1;
        let patch = patch.clamp(1, 8) as u16 - 1;
        let bank_select = (group / 2) as u8;
        let program = ((group % 2) * 64 + bank * 8 + patch) as u8;
        return vec![
            sysex::control_change(self.channel, crate::sigma::CC_BANK_SELECT_MSB, bank_select),
            sysex::program_change(self.channel, program),
        ];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_edit_is_forwarded_once() {
        let mut engine = PatchEngine::new(1, 0);
        let frames = engine.set_param(ParamId::Volume, 90, ChangeOrigin::UserEdit);
        assert_eq!(frames, vec![vec![0xB0, 0x07, 90]]);
        assert_eq!(engine.patch().volume, 90);
    }

    #[test]
    fn test_unchanged_local_edit_is_not_sent() {
        let mut engine = PatchEngine::new(1, 0);
        // defaults: volume 100, name "Init"
        assert_eq!(engine.patch().volume, 100);
        assert!(engine.set_param(ParamId::Volume, 100, ChangeOrigin::UserEdit).is_empty());
        assert!(engine.set_name("Init", ChangeOrigin::UserEdit).is_empty());
        // an edit that quantizes to the current variant is also a no-op
        assert_eq!(engine.patch().key_assign, crate::sigma::patch::KeyAssign::LastNote);
        assert!(engine.set_param(ParamId::KeyAssign, 20, ChangeOrigin::UserEdit).is_empty());
        // a real change still goes out exactly once
        let frames = engine.set_param(ParamId::Volume, 99, ChangeOrigin::UserEdit);
        assert_eq!(frames, vec![vec![0xB0, 0x07, 99]]);
    }

    #[test]
    fn test_inbound_control_change_is_not_echoed() {
        let mut engine = PatchEngine::new(1, 0);
        let frames = engine.set_param(ParamId::Volume, 90, ChangeOrigin::ControlChangeIn);
        assert!(frames.is_empty());
        assert_eq!(engine.patch().volume, 90);
    }

    #[test]
    fn test_device_native_param_goes_out_as_sysex() {
        let mut engine = PatchEngine::new(1, 0);
        let frames = engine.set_param(ParamId::Osc1Range, 100, ChangeOrigin::UserEdit);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], sysex::param_set(0, ParamId::Osc1Range.cc(), 100));
    }

    #[test]
    fn test_channel_is_honored() {
        let mut engine = PatchEngine::new(5, 0);
        let frames = engine.set_param(ParamId::Cutoff, 64, ChangeOrigin::UserEdit);
        assert_eq!(frames, vec![vec![0xB4, 0x16, 64]]);
    }

    #[test]
    fn test_rename_echo_rules() {
        let mut engine = PatchEngine::new(1, 0);
        let frames = engine.set_name("Solo Lead", ChangeOrigin::UserEdit);
        assert_eq!(frames, vec![sysex::patch_name_set(0, "Solo Lead")]);
        assert!(engine.set_name("From Device", ChangeOrigin::SysexDumpIn).is_empty());
        assert_eq!(engine.patch().name, "From Device");
    }

    #[test]
    fn test_dump_replaces_silently() {
        let mut engine = PatchEngine::new(1, 0);
        engine.set_param(ParamId::Volume, 33, ChangeOrigin::UserEdit);
        let mut incoming = PatchRecord::default();
        incoming.volume = 120;
        incoming.name = "Strings".to_string();
        engine.apply_dump(&crate::sigma::patch::encode(&incoming));
        assert_eq!(engine.patch().volume, 120);
        assert_eq!(engine.patch().name, "Strings");
    }

    #[test]
    fn test_unmapped_controller_is_dropped() {
        let mut engine = PatchEngine::new(1, 0);
        let before = engine.patch().clone();
        engine.handle_control_change(0x7F, 90);
        assert_eq!(engine.patch(), &before);
    }

    #[test]
    fn test_patch_address_math() {
        let engine = PatchEngine::new(1, 0);
        // first patch of everything
        let frames = engine.select_patch_address(1, 1, 1);
        assert_eq!(frames, vec![vec![0xB0, 0x00, 0], vec![0xC0, 0]]);
        // second group shares bank-select 0 with an offset of 64
        let frames = engine.select_patch_address(2, 1, 1);
        assert_eq!(frames, vec![vec![0xB0, 0x00, 0], vec![0xC0, 64]]);
        // groups 3 and 4 live behind bank-select 1
        let frames = engine.select_patch_address(3, 2, 5);
        assert_eq!(frames, vec![vec![0xB0, 0x00, 1], vec![0xC0, 12]]);
        let frames = engine.select_patch_address(4, 8, 8);
        assert_eq!(frames, vec![vec![0xB0, 0x00, 1], vec![0xC0, 127]]);
    }

    #[test]
    fn test_patch_address_clamps() {
        let engine = PatchEngine::new(1, 0);
        assert_eq!(
            engine.select_patch_address(0, 0, 0),
            engine.select_patch_address(1, 1, 1)
        );
        assert_eq!(
            engine.select_patch_address(9, 99, 99),
            engine.select_patch_address(4, 8, 8)
        );
    }
}
