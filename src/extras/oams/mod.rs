// src/extras/oams/mod.rs
// Corresponds to klippy/extras/oams.py
// OAMS filament spool management board.
//
// Config section:
//
//   [oams]
//   #mcu: mcu
//   fps_upper_threshold: 0.7
//   fps_lower_threshold: 0.3
//   fps_is_reversed: true
//   f1s_hes_on: 0.1, 0.1, 0.1, 0.1
//   f1s_hes_is_above: true
//   hub_hes_on: 0.85, 0.85, 0.85, 0.85
//   hub_hes_is_above: true
//   ptfe_length: 2000
//   #action_timeout: 0

pub mod action;
pub mod config;
pub mod error;

use std::sync::{Arc, Weak};

use log::{error, info};
use serde_json::json;

pub use action::{ActionController, ActionKind, ActionOutcome, FollowerAck, FollowerDirection};
pub use config::OamsConfig;
pub use error::OamsError;

use crate::configfile::{ConfigError, Configfile};
use crate::core_traits::{Mcu, McuError, PrintKObject};
use crate::gcode::{CommandError, GCodeCommand, GCodeDispatcher};
use crate::msgproto::MessageParams;

pub const CMD_OAMS_LOAD_SPOOL_HELP: &str = "Load a new spool of filament";
pub const CMD_OAMS_UNLOAD_SPOOL_HELP: &str = "Unload a spool of filament";
pub const CMD_OAMS_FOLLOWER_HELP: &str = "Enable the follower";
pub const CMD_OAMS_STATUS_HELP: &str = "Report the OAMS driver state";

pub struct Oams {
    name: String,
    config: OamsConfig,
    mcu: Arc<dyn Mcu>,
    actions: ActionController,
}

impl Oams {
    /// Builds the driver and hooks it into `mcu`: the config phase callback
    /// and the status report handler are registered here. Fails when the mcu
    /// is already past its config phase.
    pub fn new(name: &str, config: OamsConfig, mcu: Arc<dyn Mcu>) -> Result<Arc<Self>, OamsError> {
        let actions = ActionController::new(Arc::clone(&mcu))?.with_timeout(config.action_timeout);
        let oams = Arc::new(Oams {
            name: name.to_string(),
            config,
            mcu: Arc::clone(&mcu),
            actions,
        });

        let weak: Weak<Oams> = Arc::downgrade(&oams);
        mcu.register_config_callback(Box::new(move || match weak.upgrade() {
            Some(oams) => oams.build_config().map_err(|e| {
                error!("{}: unable to configure mcu '{}': {}", oams.name, oams.mcu.get_name(), e);
                e
            }),
            None => Ok(()),
        }))?;

        let weak = Arc::downgrade(&oams);
        mcu.register_response(
            action::ACTION_STATUS_MSG,
            Box::new(move |params: &MessageParams| {
                if let Some(oams) = weak.upgrade() {
                    oams.actions.handle_action_status(params);
                }
            }),
        );
        Ok(oams)
    }

    /// Reads `section` and attaches to the mcu it names.
    pub fn load_config(
        config: &Configfile,
        section: &str,
        mcus: &[Arc<dyn Mcu>],
    ) -> Result<Arc<Self>, OamsError> {
        let oams_config = OamsConfig::from_config(config, section)?;
        let mcu = mcus
            .iter()
            .find(|m| m.get_name() == oams_config.mcu)
            .cloned()
            .ok_or_else(|| {
                ConfigError::ValidationError(format!("[{}]: unknown mcu '{}'", section, oams_config.mcu))
            })?;
        info!("{}: using mcu '{}'", section, oams_config.mcu);
        Oams::new(section, oams_config, mcu)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &OamsConfig {
        &self.config
    }

    pub fn actions(&self) -> &ActionController {
        &self.actions
    }

    /// Queues the config commands. Runs during the mcu config phase.
    pub fn build_config(&self) -> Result<(), McuError> {
        for cmd in self.config.build_config()? {
            self.mcu.add_config_cmd(cmd)?;
        }
        Ok(())
    }

    pub fn register_commands(self: &Arc<Self>, gcode: &GCodeDispatcher) {
        let oams = Arc::clone(self);
        gcode.register_command(
            "OAMS_LOAD_SPOOL",
            Box::new(move |gcmd: &GCodeCommand| oams.cmd_oams_load_spool(gcmd)),
            Some(CMD_OAMS_LOAD_SPOOL_HELP),
        );
        let oams = Arc::clone(self);
        gcode.register_command(
            "OAMS_UNLOAD_SPOOL",
            Box::new(move |gcmd: &GCodeCommand| oams.cmd_oams_unload_spool(gcmd)),
            Some(CMD_OAMS_UNLOAD_SPOOL_HELP),
        );
        let oams = Arc::clone(self);
        gcode.register_command(
            "OAMS_FOLLOWER",
            Box::new(move |gcmd: &GCodeCommand| oams.cmd_oams_follower(gcmd)),
            Some(CMD_OAMS_FOLLOWER_HELP),
        );
        let oams = Arc::clone(self);
        gcode.register_command(
            "OAMS_STATUS",
            Box::new(move |_gcmd: &GCodeCommand| Ok(oams.get_status(0.0).to_string())),
            Some(CMD_OAMS_STATUS_HELP),
        );
    }

    fn cmd_oams_load_spool(&self, gcmd: &GCodeCommand) -> Result<String, CommandError> {
        let spool = gcmd.get_int("SPOOL", None)?;
        let spool = u8::try_from(spool).map_err(|_| gcmd.error("Invalid SPOOL index"))?;
        self.actions.load_spool(spool)?.into_result()?;
        Ok("Spool loaded successfully".to_string())
    }

    fn cmd_oams_unload_spool(&self, _gcmd: &GCodeCommand) -> Result<String, CommandError> {
        self.actions.unload_spool()?.into_result()?;
        Ok("Spool unloaded successfully".to_string())
    }

    fn cmd_oams_follower(&self, gcmd: &GCodeCommand) -> Result<String, CommandError> {
        let enable = gcmd.get_int("ENABLE", None)?;
        let direction = gcmd.get_int("DIRECTION", None)?;
        let enable = match enable {
            0 => false,
            1 => true,
            _ => return Err(gcmd.error("ENABLE must be 0 or 1")),
        };
        let direction = u8::try_from(direction)
            .ok()
            .and_then(FollowerDirection::from_u8)
            .ok_or_else(|| gcmd.error("DIRECTION must be 0 (forward) or 1 (reverse)"))?;
        Ok(self.actions.set_follower(enable, direction)?.to_string())
    }
}

impl PrintKObject for Oams {
    fn get_status(&self, _eventtime: f64) -> serde_json::Value {
        json!({
            "name": self.name,
            "mcu": self.mcu.get_name(),
            "action": self.actions.snapshot(),
            "action_timeout": self.actions.timeout().map(|t| t.as_secs_f64()),
            "config": self.config,
        })
    }
}
