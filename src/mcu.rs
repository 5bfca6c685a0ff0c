// src/mcu.rs
// In-process mcu endpoint. It records the traffic the host produces and lets
// the caller inject device->host messages, which is all the OAMS driver needs
// from a link when no hardware is attached.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::core_traits::{ConfigCallback, Mcu, McuError, ResponseCallback};
use crate::msgproto::{Command, MessageParams};

type SharedCallback = Arc<dyn Fn(&MessageParams) + Send + Sync>;
type SendHook = Arc<dyn Fn(&Command) + Send + Sync>;

#[derive(Default)]
struct LinkState {
    connected: bool,
    config_cmds: Vec<Command>,
    sent: Vec<Command>,
    config_callbacks: Vec<ConfigCallback>,
}

pub struct SimulatedMcu {
    name: String,
    state: Mutex<LinkState>,
    responses: Mutex<HashMap<String, SharedCallback>>,
    send_hook: Mutex<Option<SendHook>>,
}

impl SimulatedMcu {
    pub fn new(name: &str) -> Self {
        SimulatedMcu {
            name: name.to_string(),
            state: Mutex::new(LinkState::default()),
            responses: Mutex::new(HashMap::new()),
            send_hook: Mutex::new(None),
        }
    }

    /// Called for every accepted runtime command, after it was recorded.
    /// Stands in for the device reacting to the command.
    pub fn set_send_hook(&self, hook: impl Fn(&Command) + Send + Sync + 'static) {
        let hook: SendHook = Arc::new(hook);
        *self.send_hook.lock() = Some(hook);
    }

    /// Runs the registered config callbacks, then switches to runtime mode.
    /// The first failing callback aborts the connect and the mcu stays
    /// unconfigured.
    pub fn connect(&self) -> Result<(), McuError> {
        let callbacks = std::mem::take(&mut self.state.lock().config_callbacks);
        for cb in callbacks {
            if let Err(e) = cb() {
                error!("mcu '{}': config failed: {}", self.name, e);
                return Err(e);
            }
        }
        let mut state = self.state.lock();
        for cmd in &state.config_cmds {
            debug!("mcu '{}': config {}", self.name, cmd);
        }
        state.connected = true;
        info!("mcu '{}': configured with {} commands", self.name, state.config_cmds.len());
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Delivers a device->host message to its registered handler.
    /// Returns false when nothing is registered for it.
    pub fn dispatch(&self, params: &MessageParams) -> bool {
        let callback = self.responses.lock().get(params.name()).cloned();
        match callback {
            Some(cb) => {
                debug!("mcu '{}': received {:?}", self.name, params);
                cb(params);
                true
            }
            None => {
                warn!("mcu '{}': no handler for message '{}'", self.name, params.name());
                false
            }
        }
    }

    pub fn config_cmds(&self) -> Vec<Command> {
        self.state.lock().config_cmds.clone()
    }

    pub fn sent_commands(&self) -> Vec<Command> {
        self.state.lock().sent.clone()
    }
}

impl Mcu for SimulatedMcu {
    fn get_name(&self) -> String {
        self.name.clone()
    }

    fn add_config_cmd(&self, cmd: Command) -> Result<(), McuError> {
        let mut state = self.state.lock();
        if state.connected {
            return Err(McuError::ConfigAfterConnect { mcu: self.name.clone(), cmd: cmd.to_string() });
        }
        state.config_cmds.push(cmd);
        Ok(())
    }

    fn register_config_callback(&self, callback: ConfigCallback) -> Result<(), McuError> {
        let mut state = self.state.lock();
        if state.connected {
            return Err(McuError::AlreadyConfigured(self.name.clone()));
        }
        state.config_callbacks.push(callback);
        Ok(())
    }

    fn send(&self, cmd: Command) -> Result<(), McuError> {
        {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(McuError::NotConnected(self.name.clone()));
            }
            debug!("mcu '{}': send {}", self.name, cmd);
            state.sent.push(cmd.clone());
        }
        let hook = self.send_hook.lock().clone();
        if let Some(hook) = hook {
            hook(&cmd);
        }
        Ok(())
    }

    fn register_response(&self, msg_name: &str, callback: ResponseCallback) {
        let callback: SharedCallback = Arc::from(callback);
        if self.responses.lock().insert(msg_name.to_string(), callback).is_some() {
            warn!("mcu '{}': replacing handler for '{}'", self.name, msg_name);
        }
    }
}
