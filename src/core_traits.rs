// src/core_traits.rs

use thiserror::Error;

use crate::msgproto::{Command, MessageParams, MsgProtoError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum McuError {
    #[error("mcu '{0}' is not connected")]
    NotConnected(String),
    #[error("mcu '{mcu}' does not accept config commands after connect ({cmd})")]
    ConfigAfterConnect { mcu: String, cmd: String },
    #[error("mcu '{0}' is already configured")]
    AlreadyConfigured(String),
    #[error("mcu '{mcu}' failed to transmit '{cmd}': {reason}")]
    Transmit { mcu: String, cmd: String, reason: String },
    #[error(transparent)]
    Protocol(#[from] MsgProtoError),
}

/// Handler for an asynchronous device->host message. May be invoked from the
/// transport's receive thread.
pub type ResponseCallback = Box<dyn Fn(&MessageParams) + Send + Sync>;

/// Run once when the mcu is being configured, before normal operation. An
/// error aborts the connect.
pub type ConfigCallback = Box<dyn FnOnce() -> Result<(), McuError> + Send>;

/// Represents a connection to a microcontroller.
pub trait Mcu: Send + Sync {
    fn get_name(&self) -> String;

    /// Queues a command for the configuration phase.
    fn add_config_cmd(&self, cmd: Command) -> Result<(), McuError>;

    /// Fails once the config phase is over, since the callback could no
    /// longer run.
    fn register_config_callback(&self, callback: ConfigCallback) -> Result<(), McuError>;

    /// Transmits a runtime command. Returns once the transport accepted it,
    /// not when the device acted on it.
    fn send(&self, cmd: Command) -> Result<(), McuError>;

    /// Routes messages named `msg_name` to `callback`.
    fn register_response(&self, msg_name: &str, callback: ResponseCallback);
}

/// Objects that report status to the host's introspection API.
pub trait PrintKObject: Send + Sync {
    fn get_status(&self, eventtime: f64) -> serde_json::Value;
}
