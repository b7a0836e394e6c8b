//! Patch dump codec, CC quantization tables and the controller map.
//!
//! The byte layout table in this module (`OFS_*` constants) is the
//! single source of truth for the patch format: every field of
//! [`PatchRecord`] is encoded and decoded through it symmetrically.
//!
//! Enumerated parameters ride on continuous controllers: each variant
//! owns a disjoint sub-range of [0,127]. Decoding picks the matching
//! range (first declared variant when nothing matches), encoding emits
//! the lower bound of the variant's range so that re-decoding is stable.

use std::collections::HashMap;

use lazy_static::lazy_static;
use num_enum::{FromPrimitive, IntoPrimitive};
use serde::Serialize;

use crate::sigma as sg;
use crate::sigma::packing::{pack_12bit, unpack_12bit};

// Enumerated parameters //////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum OscRange {
    #[num_enum(default)]
    Sixteen = 0, // 16'
    Eight = 1, // 8'
    Four = 2,  // 4'
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum DetuneMode {
    #[num_enum(default)]
    Off = 0,
    Fine = 1,
    Normal = 2,
    Wide = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum PwmSource {
    #[num_enum(default)]
    Manual = 0,
    Lfo1 = 1,
    Lfo2 = 2,
    Env1 = 3,
    Env2 = 4,
    Env1Inverted = 5,
    Env2Inverted = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum EnvSource {
    #[num_enum(default)]
    Env1 = 0,
    Env2 = 1,
    Env1Inverted = 2,
    Env2Inverted = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum LfoWave {
    #[num_enum(default)]
    Triangle = 0,
    Square = 1,
    Saw = 2,
    SampleHold = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum LfoTarget {
    #[num_enum(default)]
    Pitch = 0,
    Filter = 1,
    PulseWidth = 2,
    Amp = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[serde(rename_all = "snake_case")]
pub enum KeyAssign {
    #[num_enum(default)]
    LastNote = 0,
    LowNote = 1,
    HighNote = 2,
}

// CC quantization ////////////////////////////////////////////////////

/// One enumerated-over-continuous table: each variant owns an inclusive
/// sub-range of [0,127]. The ranges must partition the full controller
/// span; that is a static table invariant verified by tests, not a
/// runtime check.
pub struct QuantTable<T: 'static> {
    pub ranges: &'static [(T, u8, u8)],
}

impl<T: Copy + PartialEq> QuantTable<T> {
    pub fn from_cc(&self, value: u8) -> T {
        for (variant, lo, hi) in self.ranges {
            if value >= *lo && value <= *hi {
                return *variant;
            }
        }
        // values outside every range fold to the first-declared variant
        return self.ranges[0].0;
    }

    /// Canonical controller value for a variant: the lower bound of its
    /// range, so that `from_cc(to_cc(v)) == v` always holds.
    pub fn to_cc(&self, variant: T) -> u8 {
        for (candidate, lo, _) in self.ranges {
            if *candidate == variant {
                return *lo;
            }
        }
        return self.ranges[0].1;
    }
}

pub static OSC_RANGE_CC: QuantTable<OscRange> = QuantTable {
    ranges: &[
        (OscRange::Sixteen, 0, 42),
        (OscRange::Eight, 43, 85),
        (OscRange::Four, 86, 127),
    ],
};

pub static DETUNE_MODE_CC: QuantTable<DetuneMode> = QuantTable {
    ranges: &[
        (DetuneMode::Off, 0, 31),
        (DetuneMode::Fine, 32, 63),
        (DetuneMode::Normal, 64, 95),
        (DetuneMode::Wide, 96, 127),
    ],
};

pub static PWM_SOURCE_CC: QuantTable<PwmSource> = QuantTable {
    ranges: &[
        (PwmSource::Manual, 0, 18),
        (PwmSource::Lfo1, 19, 36),
        (PwmSource::Lfo2, 37, 54),
        (PwmSource::Env1, 55, 72),
        (PwmSource::Env2, 73, 90),
        (PwmSource::Env1Inverted, 91, 108),
        (PwmSource::Env2Inverted, 109, 127),
    ],
};

pub static ENV_SOURCE_CC: QuantTable<EnvSource> = QuantTable {
    ranges: &[
        (EnvSource::Env1, 0, 31),
        (EnvSource::Env2, 32, 63),
        (EnvSource::Env1Inverted, 64, 95),
        (EnvSource::Env2Inverted, 96, 127),
    ],
};

pub static LFO_WAVE_CC: QuantTable<LfoWave> = QuantTable {
    ranges: &[
        (LfoWave::Triangle, 0, 31),
        (LfoWave::Square, 32, 63),
        (LfoWave::Saw, 64, 95),
        (LfoWave::SampleHold, 96, 127),
    ],
};

pub static LFO_TARGET_CC: QuantTable<LfoTarget> = QuantTable {
    ranges: &[
        (LfoTarget::Pitch, 0, 31),
        (LfoTarget::Filter, 32, 63),
        (LfoTarget::PulseWidth, 64, 95),
        (LfoTarget::Amp, 96, 127),
    ],
};

pub static KEY_ASSIGN_CC: QuantTable<KeyAssign> = QuantTable {
    ranges: &[
        (KeyAssign::LastNote, 0, 42),
        (KeyAssign::LowNote, 43, 85),
        (KeyAssign::HighNote, 86, 127),
    ],
};

// Parameter identities ///////////////////////////////////////////////

/// Closed set of controllable patch parameters. The patch name is not a
/// controller parameter and is handled separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamId {
    Glide,
    Volume,
    Osc1Range,
    Osc2Range,
    Osc1SawOn,
    Osc1PulseOn,
    Osc2SawOn,
    Osc2PulseOn,
    Osc2Detune,
    Osc2Interval,
    DetuneMode,
    PulseWidth,
    PwmSource,
    Osc1Level,
    Osc2Level,
    NoiseLevel,
    Cutoff,
    Resonance,
    FilterEnvAmount,
    FilterKeyTrack,
    FilterEnvSource,
    Env1Attack,
    Env1Decay,
    Env1Sustain,
    Env1Release,
    Env2Attack,
    Env2Decay,
    Env2Sustain,
    Env2Release,
    AmpEnvSource,
    Lfo1Rate,
    Lfo1Amount,
    Lfo1Wave,
    Lfo1Target,
    Lfo2Rate,
    Lfo2Amount,
    Lfo2Wave,
    Lfo2Target,
    ChorusOn,
    ChorusDepth,
    ChorusRate,
    BendRange,
    ModWheelAmount,
    KeyAssign,
}

/// Controller assignment table: every parameter has exactly one
/// controller number and every controller number maps to at most one
/// parameter. Completeness is asserted when the lookup maps are built.
pub const CC_TABLE: &[(ParamId, u8)] = &[
    (ParamId::Glide, 0x05),
    (ParamId::Volume, 0x07),
    (ParamId::Osc1Range, 0x08),
    (ParamId::Osc2Range, 0x09),
    (ParamId::Osc1SawOn, 0x0A),
    (ParamId::Osc1PulseOn, 0x0B),
    (ParamId::Osc2SawOn, 0x0C),
    (ParamId::Osc2PulseOn, 0x0D),
    (ParamId::Osc2Detune, 0x0E),
    (ParamId::Osc2Interval, 0x0F),
    (ParamId::DetuneMode, 0x10),
    (ParamId::PulseWidth, 0x11),
    (ParamId::PwmSource, 0x12),
    (ParamId::Osc1Level, 0x13),
    (ParamId::Osc2Level, 0x14),
    (ParamId::NoiseLevel, 0x15),
    (ParamId::Cutoff, 0x16),
    (ParamId::Resonance, 0x17),
    (ParamId::FilterEnvAmount, 0x18),
    (ParamId::FilterKeyTrack, 0x19),
    (ParamId::FilterEnvSource, 0x1A),
    (ParamId::Env1Attack, 0x33),
    (ParamId::Env1Decay, 0x34),
    (ParamId::Env1Sustain, 0x35),
    (ParamId::Env1Release, 0x36),
    (ParamId::Env2Attack, 0x37),
    (ParamId::Env2Decay, 0x38),
    (ParamId::Env2Sustain, 0x39),
    (ParamId::Env2Release, 0x3A),
    (ParamId::AmpEnvSource, 0x3B),
    (ParamId::Lfo1Rate, 0x3C),
    (ParamId::Lfo1Amount, 0x3D),
    (ParamId::Lfo1Wave, 0x3E),
    (ParamId::Lfo1Target, 0x3F),
    (ParamId::Lfo2Rate, 0x40),
    (ParamId::Lfo2Amount, 0x41),
    (ParamId::Lfo2Wave, 0x42),
    (ParamId::Lfo2Target, 0x43),
    (ParamId::ChorusOn, 0x44),
    (ParamId::ChorusDepth, 0x45),
    (ParamId::ChorusRate, 0x46),
    (ParamId::BendRange, 0x47),
    (ParamId::ModWheelAmount, 0x48),
    (ParamId::KeyAssign, 0x49),
];

lazy_static! {
    static ref PARAM_BY_CC: HashMap<u8, ParamId> = {
        let mut map = HashMap::new();
        for (param, cc) in CC_TABLE {
            let previous = map.insert(*cc, *param);
            assert!(
                previous.is_none(),
                "controller {:#04x} assigned to both {:?} and {:?}",
                cc,
                previous.unwrap(),
                param
            );
        }
        map
    };
}

impl ParamId {
    pub const ALL: [ParamId; 44] = [
        ParamId::Glide,
        ParamId::Volume,
        ParamId::Osc1Range,
        ParamId::Osc2Range,
        ParamId::Osc1SawOn,
        ParamId::Osc1PulseOn,
        ParamId::Osc2SawOn,
        ParamId::Osc2PulseOn,
        ParamId::Osc2Detune,
        ParamId::Osc2Interval,
        ParamId::DetuneMode,
        ParamId::PulseWidth,
        ParamId::PwmSource,
        ParamId::Osc1Level,
        ParamId::Osc2Level,
        ParamId::NoiseLevel,
        ParamId::Cutoff,
        ParamId::Resonance,
        ParamId::FilterEnvAmount,
        ParamId::FilterKeyTrack,
        ParamId::FilterEnvSource,
        ParamId::Env1Attack,
        ParamId::Env1Decay,
        ParamId::Env1Sustain,
        ParamId::Env1Release,
        ParamId::Env2Attack,
        ParamId::Env2Decay,
        ParamId::Env2Sustain,
        ParamId::Env2Release,
        ParamId::AmpEnvSource,
        ParamId::Lfo1Rate,
        ParamId::Lfo1Amount,
        ParamId::Lfo1Wave,
        ParamId::Lfo1Target,
        ParamId::Lfo2Rate,
        ParamId::Lfo2Amount,
        ParamId::Lfo2Wave,
        ParamId::Lfo2Target,
        ParamId::ChorusOn,
        ParamId::ChorusDepth,
        ParamId::ChorusRate,
        ParamId::BendRange,
        ParamId::ModWheelAmount,
        ParamId::KeyAssign,
    ];

    pub fn cc(self) -> u8 {
        for (param, cc) in CC_TABLE {
            if *param == self {
                return *cc;
            }
        }
        // CC_TABLE covers every variant; verified by tests
        unreachable!("parameter {:?} missing from CC_TABLE", self);
    }

    pub fn from_cc(cc: u8) -> Option<ParamId> {
        return PARAM_BY_CC.get(&cc).copied();
    }

    /// Parameters the device exposes through its own parameter-set
    /// SysEx command rather than a plain controller.
    pub fn is_device_native(self) -> bool {
        return matches!(
            self,
            ParamId::Osc1Range
                | ParamId::Osc2Range
                | ParamId::Osc1SawOn
                | ParamId::Osc1PulseOn
                | ParamId::Osc2SawOn
                | ParamId::Osc2PulseOn
                | ParamId::Lfo1Target
                | ParamId::Lfo2Target
        );
    }

    pub fn name(self) -> &'static str {
        return match self {
            ParamId::Glide => "glide",
            ParamId::Volume => "volume",
            ParamId::Osc1Range => "osc1-range",
            ParamId::Osc2Range => "osc2-range",
            ParamId::Osc1SawOn => "osc1-saw",
            ParamId::Osc1PulseOn => "osc1-pulse",
            ParamId::Osc2SawOn => "osc2-saw",
            ParamId::Osc2PulseOn => "osc2-pulse",
            ParamId::Osc2Detune => "osc2-detune",
            ParamId::Osc2Interval => "osc2-interval",
            ParamId::DetuneMode => "detune-mode",
            ParamId::PulseWidth => "pulse-width",
            ParamId::PwmSource => "pwm-source",
            ParamId::Osc1Level => "osc1-level",
            ParamId::Osc2Level => "osc2-level",
            ParamId::NoiseLevel => "noise-level",
            ParamId::Cutoff => "cutoff",
            ParamId::Resonance => "resonance",
            ParamId::FilterEnvAmount => "filter-env-amount",
            ParamId::FilterKeyTrack => "filter-key-track",
            ParamId::FilterEnvSource => "filter-env-source",
            ParamId::Env1Attack => "env1-attack",
            ParamId::Env1Decay => "env1-decay",
            ParamId::Env1Sustain => "env1-sustain",
            ParamId::Env1Release => "env1-release",
            ParamId::Env2Attack => "env2-attack",
            ParamId::Env2Decay => "env2-decay",
            ParamId::Env2Sustain => "env2-sustain",
            ParamId::Env2Release => "env2-release",
            ParamId::AmpEnvSource => "amp-env-source",
            ParamId::Lfo1Rate => "lfo1-rate",
            ParamId::Lfo1Amount => "lfo1-amount",
            ParamId::Lfo1Wave => "lfo1-wave",
            ParamId::Lfo1Target => "lfo1-target",
            ParamId::Lfo2Rate => "lfo2-rate",
            ParamId::Lfo2Amount => "lfo2-amount",
            ParamId::Lfo2Wave => "lfo2-wave",
            ParamId::Lfo2Target => "lfo2-target",
            ParamId::ChorusOn => "chorus",
            ParamId::ChorusDepth => "chorus-depth",
            ParamId::ChorusRate => "chorus-rate",
            ParamId::BendRange => "bend-range",
            ParamId::ModWheelAmount => "mod-wheel-amount",
            ParamId::KeyAssign => "key-assign",
        };
    }

    pub fn from_name(name: &str) -> Option<ParamId> {
        return ParamId::ALL.iter().find(|p| p.name() == name).copied();
    }
}

// The patch record ///////////////////////////////////////////////////

/// The live patch. Continuous fields hold 0..=127; enumerated fields
/// always hold one of their declared variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchRecord {
    pub name: String,
    pub osc1_range: OscRange,
    pub osc1_saw_on: bool,
    pub osc1_pulse_on: bool,
    pub osc2_range: OscRange,
    pub osc2_saw_on: bool,
    pub osc2_pulse_on: bool,
    pub osc2_detune: u8,
    pub osc2_interval: u8,
    pub detune_mode: DetuneMode,
    pub pulse_width: u8,
    pub pwm_source: PwmSource,
    pub glide: u8,
    pub osc1_level: u8,
    pub osc2_level: u8,
    pub noise_level: u8,
    pub volume: u8,
    pub cutoff: u8,
    pub resonance: u8,
    pub filter_env_amount: u8,
    pub filter_key_track: u8,
    pub filter_env_source: EnvSource,
    pub env1_attack: u8,
    pub env1_decay: u8,
    pub env1_sustain: u8,
    pub env1_release: u8,
    pub env2_attack: u8,
    pub env2_decay: u8,
    pub env2_sustain: u8,
    pub env2_release: u8,
    pub amp_env_source: EnvSource,
    pub lfo1_rate: u8,
    pub lfo1_amount: u8,
    pub lfo1_wave: LfoWave,
    pub lfo1_target: LfoTarget,
    pub lfo2_rate: u8,
    pub lfo2_amount: u8,
    pub lfo2_wave: LfoWave,
    pub lfo2_target: LfoTarget,
    pub chorus_on: bool,
    pub chorus_depth: u8,
    pub chorus_rate: u8,
    pub bend_range: u8,
    pub mod_wheel_amount: u8,
    pub key_assign: KeyAssign,
}

impl Default for PatchRecord {
    fn default() -> Self {
        Self {
            name: "Init".to_string(),
            osc1_range: OscRange::Eight,
            osc1_saw_on: true,
            osc1_pulse_on: false,
            osc2_range: OscRange::Eight,
            osc2_saw_on: false,
            osc2_pulse_on: false,
            osc2_detune: 0,
            osc2_interval: 0,
            detune_mode: DetuneMode::Off,
            pulse_width: 64,
            pwm_source: PwmSource::Manual,
            glide: 0,
            osc1_level: 100,
            osc2_level: 0,
            noise_level: 0,
            volume: 100,
            cutoff: 127,
            resonance: 0,
            filter_env_amount: 0,
            filter_key_track: 0,
            filter_env_source: EnvSource::Env1,
            env1_attack: 0,
            env1_decay: 64,
            env1_sustain: 127,
            env1_release: 10,
            env2_attack: 0,
            env2_decay: 64,
            env2_sustain: 127,
            env2_release: 10,
            amp_env_source: EnvSource::Env2,
            lfo1_rate: 40,
            lfo1_amount: 0,
            lfo1_wave: LfoWave::Triangle,
            lfo1_target: LfoTarget::Pitch,
            lfo2_rate: 40,
            lfo2_amount: 0,
            lfo2_wave: LfoWave::Triangle,
            lfo2_target: LfoTarget::Filter,
            chorus_on: false,
            chorus_depth: 0,
            chorus_rate: 30,
            bend_range: 2,
            mod_wheel_amount: 0,
            key_assign: KeyAssign::LastNote,
        }
    }
}

impl PatchRecord {
    /// Reads a parameter as its controller-encoded value.
    pub fn cc_get(&self, param: ParamId) -> u8 {
        return match param {
            ParamId::Glide => self.glide,
            ParamId::Volume => self.volume,
            ParamId::Osc1Range => OSC_RANGE_CC.to_cc(self.osc1_range),
            ParamId::Osc2Range => OSC_RANGE_CC.to_cc(self.osc2_range),
            ParamId::Osc1SawOn => bool_to_cc(self.osc1_saw_on),
            ParamId::Osc1PulseOn => bool_to_cc(self.osc1_pulse_on),
            ParamId::Osc2SawOn => bool_to_cc(self.osc2_saw_on),
            ParamId::Osc2PulseOn => bool_to_cc(self.osc2_pulse_on),
            ParamId::Osc2Detune => self.osc2_detune,
            ParamId::Osc2Interval => self.osc2_interval,
            ParamId::DetuneMode => DETUNE_MODE_CC.to_cc(self.detune_mode),
            ParamId::PulseWidth => self.pulse_width,
            ParamId::PwmSource => PWM_SOURCE_CC.to_cc(self.pwm_source),
            ParamId::Osc1Level => self.osc1_level,
            ParamId::Osc2Level => self.osc2_level,
            ParamId::NoiseLevel => self.noise_level,
            ParamId::Cutoff => self.cutoff,
            ParamId::Resonance => self.resonance,
            ParamId::FilterEnvAmount => self.filter_env_amount,
            ParamId::FilterKeyTrack => self.filter_key_track,
            ParamId::FilterEnvSource => ENV_SOURCE_CC.to_cc(self.filter_env_source),
            ParamId::Env1Attack => self.env1_attack,
            ParamId::Env1Decay => self.env1_decay,
            ParamId::Env1Sustain => self.env1_sustain,
            ParamId::Env1Release => self.env1_release,
            ParamId::Env2Attack => self.env2_attack,
            ParamId::Env2Decay => self.env2_decay,
            ParamId::Env2Sustain => self.env2_sustain,
            ParamId::Env2Release => self.env2_release,
            ParamId::AmpEnvSource => ENV_SOURCE_CC.to_cc(self.amp_env_source),
            ParamId::Lfo1Rate => self.lfo1_rate,
            ParamId::Lfo1Amount => self.lfo1_amount,
            ParamId::Lfo1Wave => LFO_WAVE_CC.to_cc(self.lfo1_wave),
            ParamId::Lfo1Target => LFO_TARGET_CC.to_cc(self.lfo1_target),
            ParamId::Lfo2Rate => self.lfo2_rate,
            ParamId::Lfo2Amount => self.lfo2_amount,
            ParamId::Lfo2Wave => LFO_WAVE_CC.to_cc(self.lfo2_wave),
            ParamId::Lfo2Target => LFO_TARGET_CC.to_cc(self.lfo2_target),
            ParamId::ChorusOn => bool_to_cc(self.chorus_on),
            ParamId::ChorusDepth => self.chorus_depth,
            ParamId::ChorusRate => self.chorus_rate,
            ParamId::BendRange => self.bend_range,
            ParamId::ModWheelAmount => self.mod_wheel_amount,
            ParamId::KeyAssign => KEY_ASSIGN_CC.to_cc(self.key_assign),
        };
    }

    /// Writes a parameter from its controller-encoded value. The value
    /// is clamped to 7 bits; enumerated parameters quantize.
    pub fn cc_set(&mut self, param: ParamId, value: u8) {
        let value = value & 0x7F;
        match param {
            ParamId::Glide => self.glide = value,
            ParamId::Volume => self.volume = value,
            ParamId::Osc1Range => self.osc1_range = OSC_RANGE_CC.from_cc(value),
            ParamId::Osc2Range => self.osc2_range = OSC_RANGE_CC.from_cc(value),
            ParamId::Osc1SawOn => self.osc1_saw_on = cc_to_bool(value),
            ParamId::Osc1PulseOn => self.osc1_pulse_on = cc_to_bool(value),
            ParamId::Osc2SawOn => self.osc2_saw_on = cc_to_bool(value),
            ParamId::Osc2PulseOn => self.osc2_pulse_on = cc_to_bool(value),
            ParamId::Osc2Detune => self.osc2_detune = value,
            ParamId::Osc2Interval => self.osc2_interval = value,
            ParamId::DetuneMode => self.detune_mode = DETUNE_MODE_CC.from_cc(value),
            ParamId::PulseWidth => self.pulse_width = value,
            ParamId::PwmSource => self.pwm_source = PWM_SOURCE_CC.from_cc(value),
            ParamId::Osc1Level => self.osc1_level = value,
            ParamId::Osc2Level => self.osc2_level = value,
            ParamId::NoiseLevel => self.noise_level = value,
            ParamId::Cutoff => self.cutoff = value,
            ParamId::Resonance => self.resonance = value,
            ParamId::FilterEnvAmount => self.filter_env_amount = value,
            ParamId::FilterKeyTrack => self.filter_key_track = value,
            ParamId::FilterEnvSource => self.filter_env_source = ENV_SOURCE_CC.from_cc(value),
            ParamId::Env1Attack => self.env1_attack = value,
            ParamId::Env1Decay => self.env1_decay = value,
            ParamId::Env1Sustain => self.env1_sustain = value,
            ParamId::Env1Release => self.env1_release = value,
            ParamId::Env2Attack => self.env2_attack = value,
            ParamId::Env2Decay => self.env2_decay = value,
            ParamId::Env2Sustain => self.env2_sustain = value,
            ParamId::Env2Release => self.env2_release = value,
            ParamId::AmpEnvSource => self.amp_env_source = ENV_SOURCE_CC.from_cc(value),
            ParamId::Lfo1Rate => self.lfo1_rate = value,
            ParamId::Lfo1Amount => self.lfo1_amount = value,
            ParamId::Lfo1Wave => self.lfo1_wave = LFO_WAVE_CC.from_cc(value),
            ParamId::Lfo1Target => self.lfo1_target = LFO_TARGET_CC.from_cc(value),
            ParamId::Lfo2Rate => self.lfo2_rate = value,
            ParamId::Lfo2Amount => self.lfo2_amount = value,
            ParamId::Lfo2Wave => self.lfo2_wave = LFO_WAVE_CC.from_cc(value),
            ParamId::Lfo2Target => self.lfo2_target = LFO_TARGET_CC.from_cc(value),
            ParamId::ChorusOn => self.chorus_on = cc_to_bool(value),
            ParamId::ChorusDepth => self.chorus_depth = value,
            ParamId::ChorusRate => self.chorus_rate = value,
            ParamId::BendRange => self.bend_range = value,
            ParamId::ModWheelAmount => self.mod_wheel_amount = value,
            ParamId::KeyAssign => self.key_assign = KEY_ASSIGN_CC.from_cc(value),
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = sanitize_name(name);
    }
}

fn bool_to_cc(value: bool) -> u8 {
    return if value { 127 } else { 0 };
}

fn cc_to_bool(value: u8) -> bool {
    return value >= 64;
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .take(sg::PATCH_NAME_LENGTH)
        .map(|c| if (' '..='~').contains(&c) { c } else { ' ' })
        .collect();
    return cleaned.trim_end().to_string();
}

// Dump layout ////////////////////////////////////////////////////////
//
// Offsets into the 60-byte patch payload. Multi-field bytes:
//   OFS_OSC1_PACKED   bits 0-1 range, bit 2 saw, bit 3 pulse
//   OFS_OSC2_PACKED   bits 0-1 range, bit 2 saw, bit 3 pulse,
//                     bits 4-5 detune mode
//   OFS_ROUTING       bits 0-1 filter env source, bits 2-3 amp env
//                     source, bits 4-5 LFO1 target, bits 6-7 LFO2 target
//   OFS_CHORUS_FLAGS  bit 0 chorus on
// The 12-bit modulation amounts (filter env, LFO amounts) store the
// 7-bit surface value shifted left by 5; decoding narrows back.

const OFS_NAME: usize = 0; // ..20
const OFS_OSC1_PACKED: usize = 20;
const OFS_OSC2_PACKED: usize = 21;
const OFS_OSC2_DETUNE: usize = 22;
const OFS_OSC2_INTERVAL: usize = 23;
const OFS_PULSE_WIDTH: usize = 24;
const OFS_PWM_SOURCE: usize = 25;
const OFS_GLIDE: usize = 26;
const OFS_OSC1_LEVEL: usize = 27;
const OFS_OSC2_LEVEL: usize = 28;
const OFS_NOISE_LEVEL: usize = 29;
const OFS_VOLUME: usize = 30;
const OFS_CUTOFF: usize = 31;
const OFS_RESONANCE: usize = 32;
const OFS_FILTER_ENV_AMOUNT_HI: usize = 33;
const OFS_FILTER_ENV_AMOUNT_LO: usize = 34;
const OFS_FILTER_KEY_TRACK: usize = 35;
const OFS_ROUTING: usize = 36;
const OFS_ENV1_ATTACK: usize = 37;
const OFS_ENV1_DECAY: usize = 38;
const OFS_ENV1_SUSTAIN: usize = 39;
const OFS_ENV1_RELEASE: usize = 40;
const OFS_ENV2_ATTACK: usize = 41;
const OFS_ENV2_DECAY: usize = 42;
const OFS_ENV2_SUSTAIN: usize = 43;
const OFS_ENV2_RELEASE: usize = 44;
const OFS_LFO1_RATE: usize = 45;
const OFS_LFO1_AMOUNT_HI: usize = 46;
const OFS_LFO1_AMOUNT_LO: usize = 47;
const OFS_LFO1_WAVE: usize = 48;
const OFS_LFO2_RATE: usize = 49;
const OFS_LFO2_AMOUNT_HI: usize = 50;
const OFS_LFO2_AMOUNT_LO: usize = 51;
const OFS_LFO2_WAVE: usize = 52;
const OFS_CHORUS_FLAGS: usize = 53;
const OFS_CHORUS_DEPTH: usize = 54;
const OFS_CHORUS_RATE: usize = 55;
const OFS_BEND_RANGE: usize = 56;
const OFS_MOD_WHEEL_AMOUNT: usize = 57;
const OFS_KEY_ASSIGN: usize = 58;
// offset 59 is reserved and always written as zero

fn encode_mod_amount(payload: &mut [u8], hi: usize, lo: usize, value: u8) {
    // the device keeps 12 bits internally; the surface value occupies
    // the top 7 of them
    let wide = ((value & 0x7F) as u16) << 5;
    let bytes = unpack_12bit(wide);
    payload[hi] = bytes[0];
    payload[lo] = bytes[1];
}

fn decode_mod_amount(payload: &[u8], hi: usize, lo: usize) -> u8 {
    return (pack_12bit(payload[hi], payload[lo]) >> 5) as u8 & 0x7F;
}

pub fn encode(record: &PatchRecord) -> [u8; sg::PATCH_PAYLOAD_LENGTH] {
    let mut payload = [0u8; sg::PATCH_PAYLOAD_LENGTH];

    for slot in payload[OFS_NAME..OFS_NAME + sg::PATCH_NAME_LENGTH].iter_mut() {
        *slot = 0x20;
    }
    for (i, b) in record.name.bytes().take(sg::PATCH_NAME_LENGTH).enumerate() {
        payload[OFS_NAME + i] = b;
    }

    payload[OFS_OSC1_PACKED] = u8::from(record.osc1_range)
        | (record.osc1_saw_on as u8) << 2
        | (record.osc1_pulse_on as u8) << 3;
    payload[OFS_OSC2_PACKED] = u8::from(record.osc2_range)
        | (record.osc2_saw_on as u8) << 2
        | (record.osc2_pulse_on as u8) << 3
        | u8::from(record.detune_mode) << 4;
    payload[OFS_OSC2_DETUNE] = record.osc2_detune & 0x7F;
    payload[OFS_OSC2_INTERVAL] = record.osc2_interval & 0x7F;
    payload[OFS_PULSE_WIDTH] = record.pulse_width & 0x7F;
    payload[OFS_PWM_SOURCE] = u8::from(record.pwm_source);
    payload[OFS_GLIDE] = record.glide & 0x7F;
    payload[OFS_OSC1_LEVEL] = record.osc1_level & 0x7F;
    payload[OFS_OSC2_LEVEL] = record.osc2_level & 0x7F;
    payload[OFS_NOISE_LEVEL] = record.noise_level & 0x7F;
    payload[OFS_VOLUME] = record.volume & 0x7F;
    payload[OFS_CUTOFF] = record.cutoff & 0x7F;
    payload[OFS_RESONANCE] = record.resonance & 0x7F;
    encode_mod_amount(
        &mut payload,
        OFS_FILTER_ENV_AMOUNT_HI,
        OFS_FILTER_ENV_AMOUNT_LO,
        record.filter_env_amount,
    );
    payload[OFS_FILTER_KEY_TRACK] = record.filter_key_track & 0x7F;
    payload[OFS_ROUTING] = u8::from(record.filter_env_source)
        | u8::from(record.amp_env_source) << 2
        | u8::from(record.lfo1_target) << 4
        | u8::from(record.lfo2_target) << 6;
    payload[OFS_ENV1_ATTACK] = record.env1_attack & 0x7F;
    payload[OFS_ENV1_DECAY] = record.env1_decay & 0x7F;
    payload[OFS_ENV1_SUSTAIN] = record.env1_sustain & 0x7F;
    payload[OFS_ENV1_RELEASE] = record.env1_release & 0x7F;
    payload[OFS_ENV2_ATTACK] = record.env2_attack & 0x7F;
    payload[OFS_ENV2_DECAY] = record.env2_decay & 0x7F;
    payload[OFS_ENV2_SUSTAIN] = record.env2_sustain & 0x7F;
    payload[OFS_ENV2_RELEASE] = record.env2_release & 0x7F;
    payload[OFS_LFO1_RATE] = record.lfo1_rate & 0x7F;
    encode_mod_amount(
        &mut payload,
        OFS_LFO1_AMOUNT_HI,
        OFS_LFO1_AMOUNT_LO,
        record.lfo1_amount,
    );
    payload[OFS_LFO1_WAVE] = u8::from(record.lfo1_wave);
    payload[OFS_LFO2_RATE] = record.lfo2_rate & 0x7F;
    encode_mod_amount(
        &mut payload,
        OFS_LFO2_AMOUNT_HI,
        OFS_LFO2_AMOUNT_LO,
        record.lfo2_amount,
    );
    payload[OFS_LFO2_WAVE] = u8::from(record.lfo2_wave);
    payload[OFS_CHORUS_FLAGS] = record.chorus_on as u8;
    payload[OFS_CHORUS_DEPTH] = record.chorus_depth & 0x7F;
    payload[OFS_CHORUS_RATE] = record.chorus_rate & 0x7F;
    payload[OFS_BEND_RANGE] = record.bend_range & 0x7F;
    payload[OFS_MOD_WHEEL_AMOUNT] = record.mod_wheel_amount & 0x7F;
    payload[OFS_KEY_ASSIGN] = u8::from(record.key_assign);
    return payload;
}

/// Decodes a patch dump payload. Like the global codec this never
/// fails: short payloads are zero-padded, undefined bits are masked and
/// unknown enum codes fold to their default variant.
pub fn decode(payload: &[u8]) -> PatchRecord {
    let mut buffer = [0u8; sg::PATCH_PAYLOAD_LENGTH];
    let length = payload.len().min(sg::PATCH_PAYLOAD_LENGTH);
    buffer[..length].copy_from_slice(&payload[..length]);
    if payload.len() != sg::PATCH_PAYLOAD_LENGTH {
        log::warn!(
            "Patch dump payload length {} differs from expected {}",
            payload.len(),
            sg::PATCH_PAYLOAD_LENGTH
        );
    }

    let name_bytes = &buffer[OFS_NAME..OFS_NAME + sg::PATCH_NAME_LENGTH];
    let name: String = name_bytes
        .iter()
        .map(|b| if (0x20..=0x7E).contains(b) { *b as char } else { ' ' })
        .collect();

    let osc1 = buffer[OFS_OSC1_PACKED];
    let osc2 = buffer[OFS_OSC2_PACKED];
    let routing = buffer[OFS_ROUTING];

    return PatchRecord {
        name: name.trim_end().to_string(),
        osc1_range: OscRange::from(osc1 & 0x03),
        osc1_saw_on: osc1 & 0x04 != 0,
        osc1_pulse_on: osc1 & 0x08 != 0,
        osc2_range: OscRange::from(osc2 & 0x03),
        osc2_saw_on: osc2 & 0x04 != 0,
        osc2_pulse_on: osc2 & 0x08 != 0,
        osc2_detune: buffer[OFS_OSC2_DETUNE] & 0x7F,
        osc2_interval: buffer[OFS_OSC2_INTERVAL] & 0x7F,
        detune_mode: DetuneMode::from((osc2 >> 4) & 0x03),
        pulse_width: buffer[OFS_PULSE_WIDTH] & 0x7F,
        pwm_source: PwmSource::from(buffer[OFS_PWM_SOURCE] & 0x07),
        glide: buffer[OFS_GLIDE] & 0x7F,
        osc1_level: buffer[OFS_OSC1_LEVEL] & 0x7F,
        osc2_level: buffer[OFS_OSC2_LEVEL] & 0x7F,
        noise_level: buffer[OFS_NOISE_LEVEL] & 0x7F,
        volume: buffer[OFS_VOLUME] & 0x7F,
        cutoff: buffer[OFS_CUTOFF] & 0x7F,
        resonance: buffer[OFS_RESONANCE] & 0x7F,
        filter_env_amount: decode_mod_amount(
            &buffer,
            OFS_FILTER_ENV_AMOUNT_HI,
            OFS_FILTER_ENV_AMOUNT_LO,
        ),
        filter_key_track: buffer[OFS_FILTER_KEY_TRACK] & 0x7F,
        filter_env_source: EnvSource::from(routing & 0x03),
        env1_attack: buffer[OFS_ENV1_ATTACK] & 0x7F,
        env1_decay: buffer[OFS_ENV1_DECAY] & 0x7F,
        env1_sustain: buffer[OFS_ENV1_SUSTAIN] & 0x7F,
        env1_release: buffer[OFS_ENV1_RELEASE] & 0x7F,
        env2_attack: buffer[OFS_ENV2_ATTACK] & 0x7F,
        env2_decay: buffer[OFS_ENV2_DECAY] & 0x7F,
        env2_sustain: buffer[OFS_ENV2_SUSTAIN] & 0x7F,
        env2_release: buffer[OFS_ENV2_RELEASE] & 0x7F,
        amp_env_source: EnvSource::from((routing >> 2) & 0x03),
        lfo1_rate: buffer[OFS_LFO1_RATE] & 0x7F,
        lfo1_amount: decode_mod_amount(&buffer, OFS_LFO1_AMOUNT_HI, OFS_LFO1_AMOUNT_LO),
        lfo1_wave: LfoWave::from(buffer[OFS_LFO1_WAVE] & 0x03),
        lfo1_target: LfoTarget::from((routing >> 4) & 0x03),
        lfo2_rate: buffer[OFS_LFO2_RATE] & 0x7F,
        lfo2_amount: decode_mod_amount(&buffer, OFS_LFO2_AMOUNT_HI, OFS_LFO2_AMOUNT_LO),
        lfo2_wave: LfoWave::from(buffer[OFS_LFO2_WAVE] & 0x03),
        lfo2_target: LfoTarget::from((routing >> 6) & 0x03),
        chorus_on: buffer[OFS_CHORUS_FLAGS] & 0x01 != 0,
        chorus_depth: buffer[OFS_CHORUS_DEPTH] & 0x7F,
        chorus_rate: buffer[OFS_CHORUS_RATE] & 0x7F,
        bend_range: buffer[OFS_BEND_RANGE] & 0x7F,
        mod_wheel_amount: buffer[OFS_MOD_WHEEL_AMOUNT] & 0x7F,
        key_assign: KeyAssign::from(buffer[OFS_KEY_ASSIGN] & 0x03),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_partition<T: Copy + PartialEq + std::fmt::Debug>(table: &QuantTable<T>) {
        for value in 0..=127u8 {
            let owners = table
                .ranges
                .iter()
                .filter(|(_, lo, hi)| value >= *lo && value <= *hi)
                .count();
            assert_eq!(owners, 1, "controller value {} owned by {} ranges", value, owners);
        }
    }

    #[test]
    fn test_quantization_tables_partition_the_controller_span() {
        check_partition(&OSC_RANGE_CC);
        check_partition(&DETUNE_MODE_CC);
        check_partition(&PWM_SOURCE_CC);
        check_partition(&ENV_SOURCE_CC);
        check_partition(&LFO_WAVE_CC);
        check_partition(&LFO_TARGET_CC);
        check_partition(&KEY_ASSIGN_CC);
    }

    #[test]
    fn test_stable_re_encoding() {
        for (variant, _, _) in PWM_SOURCE_CC.ranges {
            assert_eq!(PWM_SOURCE_CC.from_cc(PWM_SOURCE_CC.to_cc(*variant)), *variant);
        }
        for (variant, _, _) in OSC_RANGE_CC.ranges {
            assert_eq!(OSC_RANGE_CC.from_cc(OSC_RANGE_CC.to_cc(*variant)), *variant);
        }
        for (variant, _, _) in LFO_TARGET_CC.ranges {
            assert_eq!(LFO_TARGET_CC.from_cc(LFO_TARGET_CC.to_cc(*variant)), *variant);
        }
    }

    #[test]
    fn test_pwm_source_range_bounds() {
        assert_eq!(PWM_SOURCE_CC.from_cc(0), PwmSource::Manual);
        assert_eq!(PWM_SOURCE_CC.from_cc(18), PwmSource::Manual);
        assert_eq!(PWM_SOURCE_CC.from_cc(19), PwmSource::Lfo1);
        assert_eq!(PWM_SOURCE_CC.from_cc(109), PwmSource::Env2Inverted);
        assert_eq!(PWM_SOURCE_CC.from_cc(127), PwmSource::Env2Inverted);
    }

    #[test]
    fn test_cc_table_is_complete_and_unambiguous() {
        assert_eq!(CC_TABLE.len(), ParamId::ALL.len());
        for param in ParamId::ALL {
            let cc = param.cc();
            assert_eq!(ParamId::from_cc(cc), Some(param));
            assert_eq!(ParamId::from_name(param.name()), Some(param));
        }
    }

    #[test]
    fn test_unmapped_controller_is_unknown() {
        assert_eq!(ParamId::from_cc(0x7F), None);
        assert_eq!(ParamId::from_name("flux-capacitor"), None);
    }

    fn sample_record() -> PatchRecord {
        let mut record = PatchRecord::default();
        record.name = "Brass Section".to_string();
        record.osc1_range = OscRange::Sixteen;
        record.osc1_saw_on = true;
        record.osc1_pulse_on = true;
        record.osc2_range = OscRange::Four;
        record.osc2_saw_on = true;
        record.osc2_detune = 12;
        record.osc2_interval = 7;
        record.detune_mode = DetuneMode::Wide;
        record.pulse_width = 90;
        record.pwm_source = PwmSource::Env2Inverted;
        record.glide = 15;
        record.cutoff = 88;
        record.resonance = 33;
        record.filter_env_amount = 101;
        record.filter_env_source = EnvSource::Env2Inverted;
        record.amp_env_source = EnvSource::Env2;
        record.env1_attack = 5;
        record.lfo1_amount = 77;
        record.lfo1_wave = LfoWave::SampleHold;
        record.lfo1_target = LfoTarget::PulseWidth;
        record.lfo2_target = LfoTarget::Amp;
        record.chorus_on = true;
        record.chorus_depth = 40;
        record.key_assign = KeyAssign::HighNote;
        return record;
    }

    #[test]
    fn test_dump_round_trip() {
        let record = sample_record();
        assert_eq!(decode(&encode(&record)), record);
        let default = PatchRecord::default();
        assert_eq!(decode(&encode(&default)), default);
    }

    #[test]
    fn test_name_is_padded_and_trimmed() {
        let payload = encode(&sample_record());
        assert_eq!(&payload[..13], b"Brass Section");
        assert!(payload[13..20].iter().all(|b| *b == 0x20));
        assert_eq!(decode(&payload).name, "Brass Section");
    }

    #[test]
    fn test_mod_amount_narrowing() {
        // device precision is 12 bits, the surface keeps the top 7
        let mut payload = encode(&PatchRecord::default());
        payload[OFS_FILTER_ENV_AMOUNT_HI] = 0x0F;
        payload[OFS_FILTER_ENV_AMOUNT_LO] = 0xFF;
        assert_eq!(decode(&payload).filter_env_amount, 127);
        payload[OFS_FILTER_ENV_AMOUNT_HI] = 0x00;
        payload[OFS_FILTER_ENV_AMOUNT_LO] = 0x1F; // below surface resolution
        assert_eq!(decode(&payload).filter_env_amount, 0);
    }

    #[test]
    fn test_packed_oscillator_byte() {
        let record = sample_record();
        let payload = encode(&record);
        assert_eq!(payload[OFS_OSC1_PACKED], 0b0000_1100); // 16', saw+pulse
        assert_eq!(payload[OFS_OSC2_PACKED], 0b0011_0110); // 4', saw, wide detune
    }

    #[test]
    fn test_routing_byte() {
        let payload = encode(&sample_record());
        // env2-inv filter source, env2 amp source, pw + amp LFO targets
        assert_eq!(payload[OFS_ROUTING], 0b1110_0111);
    }

    #[test]
    fn test_out_of_range_enum_code_decodes_to_default() {
        let mut payload = encode(&PatchRecord::default());
        payload[OFS_PWM_SOURCE] = 0x07; // within mask, no such code
        assert_eq!(decode(&payload).pwm_source, PwmSource::Manual);
        payload[OFS_KEY_ASSIGN] = 0x03;
        assert_eq!(decode(&payload).key_assign, KeyAssign::LastNote);
    }

    #[test]
    fn test_short_payload_degrades_per_field() {
        let record = decode(&[]);
        assert_eq!(record.name, "");
        assert_eq!(record.osc1_range, OscRange::Sixteen);
        assert_eq!(record.volume, 0);
    }

    #[test]
    fn test_cc_get_set_round_trip() {
        let mut record = PatchRecord::default();
        for param in ParamId::ALL {
            record.cc_set(param, 96);
            let read_back = record.cc_get(param);
            record.cc_set(param, read_back);
            assert_eq!(record.cc_get(param), read_back, "unstable {:?}", param);
        }
    }

    #[test]
    fn test_cc_set_clamps_to_seven_bits() {
        let mut record = PatchRecord::default();
        record.cc_set(ParamId::Cutoff, 0xFF);
        assert_eq!(record.cutoff, 0x7F);
    }

    #[test]
    fn test_set_name_sanitizes() {
        let mut record = PatchRecord::default();
        record.set_name("A very long patch name indeed");
        assert_eq!(record.name.len(), sg::PATCH_NAME_LENGTH);
        record.set_name("Tab\there");
        assert_eq!(record.name, "Tab here");
    }
}
