// src/extras/oams/error.rs

use std::time::Duration;

use thiserror::Error;

use super::action::ActionKind;
use crate::configfile::ConfigError;
use crate::core_traits::McuError;
use crate::gcode::CommandError;
use crate::msgproto::MsgProtoError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OamsError {
    #[error("invalid OAMS configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("OAMS {0} already in progress")]
    ActionInProgress(ActionKind),
    #[error("OAMS is busy")]
    DeviceBusy,
    #[error("Unknown error from OAMS (code {0})")]
    DeviceError(u8),
    #[error("no response from OAMS to {action} within {timeout:?}")]
    Timeout { action: ActionKind, timeout: Duration },
    #[error(transparent)]
    Mcu(#[from] McuError),
}

impl From<MsgProtoError> for OamsError {
    fn from(e: MsgProtoError) -> Self {
        OamsError::Mcu(McuError::Protocol(e))
    }
}

impl From<OamsError> for CommandError {
    fn from(e: OamsError) -> Self {
        CommandError(e.to_string())
    }
}
