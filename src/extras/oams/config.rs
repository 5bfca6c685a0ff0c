// src/extras/oams/config.rs
// OAMS configuration and its translation into mcu config commands.

use std::time::Duration;

use serde::Serialize;

use crate::configfile::{ConfigError, Configfile};
use crate::msgproto::{Command, MessageFormat, MsgProtoError};

/// Channels per hall effect sensor bank.
pub const HES_CHANNELS: usize = 4;

pub const CONFIG_BUFFER_FMT: &str = "config_oams_buffer upper=%u lower=%u is_reversed=%u";
pub const CONFIG_F1S_HES_FMT: &str = "config_oams_f1s_hes on1=%u on2=%u on3=%u on4=%u is_above=%u";
pub const CONFIG_HUB_HES_FMT: &str = "config_oams_hub_hes on1=%u on2=%u on3=%u on4=%u is_above=%u";
pub const CONFIG_PTFE_FMT: &str = "config_oams_ptfe length=%u";

/// Reinterprets the IEEE-754 single precision bits of `f`. The firmware
/// turns the field back into a float with the inverse operation.
pub fn encode_float_as_u32(f: f32) -> u32 {
    f.to_bits()
}

pub fn decode_u32_as_float(bits: u32) -> f32 {
    f32::from_bits(bits)
}

fn encode_bool(b: bool) -> u32 {
    u32::from(b)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OamsConfig {
    pub mcu: String,
    pub fps_upper_threshold: f32,
    pub fps_lower_threshold: f32,
    pub fps_is_reversed: bool,
    pub f1s_hes_on: [f32; HES_CHANNELS],
    pub f1s_hes_is_above: bool,
    pub hub_hes_on: [f32; HES_CHANNELS],
    pub hub_hes_is_above: bool,
    pub filament_path_length: f64,
    #[serde(skip)]
    pub action_timeout: Option<Duration>,
}

impl OamsConfig {
    pub fn from_config(config: &Configfile, section: &str) -> Result<Self, ConfigError> {
        if !config.has_section(section) {
            return Err(ConfigError::SectionNotFound(section.to_string()));
        }
        let action_timeout = match config.getfloat(section, "action_timeout", Some(0.0), Some(0.0), None)? {
            t if t > 0.0 => Some(Duration::from_secs_f64(t)),
            _ => None,
        };
        Ok(OamsConfig {
            mcu: config.get(section, "mcu", Some("mcu"))?,
            fps_upper_threshold: single_float(config, section, "fps_upper_threshold")?,
            fps_lower_threshold: single_float(config, section, "fps_lower_threshold")?,
            fps_is_reversed: config.getboolean(section, "fps_is_reversed", None)?,
            f1s_hes_on: hes_levels(config, section, "f1s_hes_on")?,
            f1s_hes_is_above: config.getboolean(section, "f1s_hes_is_above", None)?,
            hub_hes_on: hes_levels(config, section, "hub_hes_on")?,
            hub_hes_is_above: config.getboolean(section, "hub_hes_is_above", None)?,
            filament_path_length: config.getfloat(section, "ptfe_length", None, Some(0.0), Some(u32::MAX as f64))?,
            action_timeout,
        })
    }

    pub fn build_buffer_config(&self) -> Result<Command, MsgProtoError> {
        MessageFormat::parse(CONFIG_BUFFER_FMT)?.encode(&[
            encode_float_as_u32(self.fps_upper_threshold),
            encode_float_as_u32(self.fps_lower_threshold),
            encode_bool(self.fps_is_reversed),
        ])
    }

    pub fn build_f1s_hes_config(&self) -> Result<Command, MsgProtoError> {
        build_hes_config(CONFIG_F1S_HES_FMT, &self.f1s_hes_on, self.f1s_hes_is_above)
    }

    pub fn build_hub_hes_config(&self) -> Result<Command, MsgProtoError> {
        build_hes_config(CONFIG_HUB_HES_FMT, &self.hub_hes_on, self.hub_hes_is_above)
    }

    /// The path length goes out as whole millimetres, truncated.
    pub fn build_ptfe_config(&self) -> Result<Command, MsgProtoError> {
        MessageFormat::parse(CONFIG_PTFE_FMT)?.encode(&[self.filament_path_length.trunc() as u32])
    }

    /// All config commands, in the order the firmware expects them.
    pub fn build_config(&self) -> Result<[Command; 4], MsgProtoError> {
        Ok([
            self.build_buffer_config()?,
            self.build_f1s_hes_config()?,
            self.build_hub_hes_config()?,
            self.build_ptfe_config()?,
        ])
    }
}

// Values the firmware receives as f32 bits must fit an f32.
fn to_single(section: &str, option: &str, value: f64) -> Result<f32, ConfigError> {
    if value.abs() > f32::MAX as f64 {
        return Err(ConfigError::ValidationError(format!(
            "Option '{}' in section '[{}]' ({}) is out of single precision range",
            option, section, value
        )));
    }
    Ok(value as f32)
}

fn single_float(config: &Configfile, section: &str, option: &str) -> Result<f32, ConfigError> {
    to_single(section, option, config.getfloat(section, option, None, None, None)?)
}

fn hes_levels(config: &Configfile, section: &str, option: &str) -> Result<[f32; HES_CHANNELS], ConfigError> {
    let mut levels = [0.0f32; HES_CHANNELS];
    let values = config.getfloatlist(section, option, Some(HES_CHANNELS))?;
    if values.len() != HES_CHANNELS {
        return Err(ConfigError::ValidationError(format!("'{}' needs {} values", option, HES_CHANNELS)));
    }
    for (level, value) in levels.iter_mut().zip(values) {
        *level = to_single(section, option, value)?;
    }
    Ok(levels)
}

fn build_hes_config(fmt: &str, levels: &[f32; HES_CHANNELS], is_above: bool) -> Result<Command, MsgProtoError> {
    let mut values: Vec<u32> = levels.iter().map(|&l| encode_float_as_u32(l)).collect();
    values.push(encode_bool(is_above));
    MessageFormat::parse(fmt)?.encode(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    const SAMPLE: &str = "
[oams]
fps_upper_threshold: 0.7
fps_lower_threshold: 0.3
fps_is_reversed: true
f1s_hes_on: 1.0, 2.0, 3.0, 4.0
f1s_hes_is_above: true
hub_hes_on: 0.85,0.85, 0.9 ,0.9
hub_hes_is_above: false
ptfe_length: 2046.9
";

    fn sample_config() -> OamsConfig {
        let mut cf = Configfile::new(None);
        cf.parse(SAMPLE).unwrap();
        OamsConfig::from_config(&cf, "oams").unwrap()
    }

    #[test]
    fn float_bits_round_trip() {
        for f in [0.0f32, -0.0, 1.0, -2.5, 0.1, f32::MIN_POSITIVE, f32::MAX, f32::MIN, 1.0e-45] {
            assert_eq!(decode_u32_as_float(encode_float_as_u32(f)).to_bits(), f.to_bits());
        }
        assert_eq!(encode_float_as_u32(1.0), 0x3F80_0000);
        assert_eq!(encode_float_as_u32(-2.0), 0xC000_0000);
        // Non-finite values pass through untouched.
        assert_eq!(encode_float_as_u32(f32::INFINITY), 0x7F80_0000);
        let nan = f32::from_bits(0x7FC0_1234);
        assert_eq!(encode_float_as_u32(nan), 0x7FC0_1234);
    }

    #[test]
    fn loads_sample_config() {
        let cfg = sample_config();
        assert_eq!(cfg.mcu, "mcu");
        assert_approx_eq!(f32, cfg.fps_upper_threshold, 0.7);
        assert_approx_eq!(f32, cfg.fps_lower_threshold, 0.3);
        assert!(cfg.fps_is_reversed);
        assert_eq!(cfg.f1s_hes_on, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(cfg.hub_hes_on, [0.85f64 as f32, 0.85f64 as f32, 0.9f64 as f32, 0.9f64 as f32]);
        assert!(!cfg.hub_hes_is_above);
        assert_approx_eq!(f64, cfg.filament_path_length, 2046.9);
        assert_eq!(cfg.action_timeout, None);
    }

    #[test]
    fn f1s_hes_command_fields() {
        let cmd = sample_config().build_f1s_hes_config().unwrap();
        assert_eq!(cmd.name(), "config_oams_f1s_hes");
        assert_eq!(cmd.get("on1"), Some(0x3F80_0000));
        assert_eq!(cmd.get("on2"), Some(0x4000_0000));
        assert_eq!(cmd.get("on3"), Some(0x4040_0000));
        assert_eq!(cmd.get("on4"), Some(0x4080_0000));
        assert_eq!(cmd.get("is_above"), Some(1));
    }

    #[test]
    fn buffer_and_ptfe_commands() {
        let cfg = sample_config();
        let buffer = cfg.build_buffer_config().unwrap();
        assert_eq!(buffer.get("upper"), Some((0.7f64 as f32).to_bits()));
        assert_eq!(buffer.get("lower"), Some((0.3f64 as f32).to_bits()));
        assert_eq!(buffer.get("is_reversed"), Some(1));

        let hub = cfg.build_hub_hes_config().unwrap();
        assert_eq!(hub.get("on3"), Some((0.9f64 as f32).to_bits()));
        assert_eq!(hub.get("is_above"), Some(0));

        assert_eq!(cfg.build_ptfe_config().unwrap().to_string(), "config_oams_ptfe length=2046");
    }

    #[test]
    fn build_config_order() {
        let names: Vec<String> = sample_config()
            .build_config()
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(
            names,
            ["config_oams_buffer", "config_oams_f1s_hes", "config_oams_hub_hes", "config_oams_ptfe"]
        );
    }

    fn load_with(option: &str, value: &str) -> Result<OamsConfig, ConfigError> {
        let mut cf = Configfile::new(None);
        cf.parse(SAMPLE).unwrap();
        cf.set("oams", option, value);
        OamsConfig::from_config(&cf, "oams")
    }

    #[test]
    fn rejects_bad_sensor_arrays() {
        assert!(matches!(load_with("f1s_hes_on", "1,2,3"), Err(ConfigError::ValidationError(_))));
        assert!(matches!(load_with("hub_hes_on", "1,2,3,4,5"), Err(ConfigError::ValidationError(_))));
        assert!(matches!(load_with("hub_hes_on", "1,2,three,4"), Err(ConfigError::ParseError(..))));
        assert!(matches!(load_with("hub_hes_on", "1e300, 1, 1, 1"), Err(ConfigError::ValidationError(_))));
        assert!(matches!(load_with("f1s_hes_on", "1, 1, 1, -4e38"), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn rejects_thresholds_beyond_single_precision() {
        assert!(matches!(load_with("fps_upper_threshold", "1e40"), Err(ConfigError::ValidationError(_))));
        assert!(matches!(load_with("fps_lower_threshold", "-1e39"), Err(ConfigError::ValidationError(_))));

        let cfg = load_with("fps_upper_threshold", "3.4e38").unwrap();
        let upper = cfg.build_buffer_config().unwrap().get("upper").unwrap();
        assert!(decode_u32_as_float(upper).is_finite());
    }

    #[test]
    fn rejects_missing_and_malformed_fields() {
        let mut cf = Configfile::new(None);
        cf.parse("[oams]\nfps_upper_threshold: 0.7\n").unwrap();
        assert!(matches!(OamsConfig::from_config(&cf, "oams"), Err(ConfigError::OptionNotFound(..))));
        assert!(matches!(OamsConfig::from_config(&cf, "oams x"), Err(ConfigError::SectionNotFound(_))));

        assert!(matches!(load_with("fps_is_reversed", "maybe"), Err(ConfigError::ParseError(..))));
        assert!(matches!(load_with("ptfe_length", "-1"), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn optional_action_timeout() {
        let cfg = load_with("action_timeout", "2.5").unwrap();
        assert_eq!(cfg.action_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(load_with("mcu", "oams_mcu").unwrap().mcu, "oams_mcu");
    }
}
