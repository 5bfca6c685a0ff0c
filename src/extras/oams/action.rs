// src/extras/oams/action.rs
// Corresponds to klippy/extras/oams.py
// Load/unload/follower commands and the wait for their completion report.
//
// A load or unload is a two step exchange: the host sends the command, then
// the board reports `oams_action_status` once the spool has moved. The
// caller's thread blocks in between. Status reports arrive on whatever thread
// the transport delivers them on, so the handoff goes through `state` and
// the `completed` condition variable.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;

use super::error::OamsError;
use crate::core_traits::Mcu;
use crate::msgproto::{Command, MessageFormat, MessageParams};

pub const LOAD_SPOOL_FMT: &str = "oams_cmd_load_spool spool=%c";
pub const UNLOAD_SPOOL_FMT: &str = "oams_cmd_unload_spool";
pub const FOLLOWER_FMT: &str = "oams_cmd_follower enable=%c direction=%c";
pub const ACTION_STATUS_MSG: &str = "oams_action_status";

pub const SPOOL_COUNT: u8 = 4;

pub const OP_CODE_SUCCESS: u8 = 0;
pub const OP_CODE_ERROR_UNSPECIFIED: u8 = 1;
pub const OP_CODE_ERROR_BUSY: u8 = 2;

/// Status values the board uses. Only `Loading` and `Unloading` name
/// actions that report completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OamsStatus {
    Loading = 0,
    Unloading = 1,
    ForwardFollowing = 2,
    ReverseFollowing = 3,
    Coasting = 4,
    Stopped = 5,
}

impl OamsStatus {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(OamsStatus::Loading),
            1 => Some(OamsStatus::Unloading),
            2 => Some(OamsStatus::ForwardFollowing),
            3 => Some(OamsStatus::ReverseFollowing),
            4 => Some(OamsStatus::Coasting),
            5 => Some(OamsStatus::Stopped),
            _ => None,
        }
    }
}

/// Action tag of an `oams_action_status` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Loading,
    Unloading,
}

impl ActionKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match OamsStatus::from_u8(tag)? {
            OamsStatus::Loading => Some(ActionKind::Loading),
            OamsStatus::Unloading => Some(ActionKind::Unloading),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            ActionKind::Loading => OamsStatus::Loading as u8,
            ActionKind::Unloading => OamsStatus::Unloading as u8,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Loading => write!(f, "spool load"),
            ActionKind::Unloading => write!(f, "spool unload"),
        }
    }
}

/// What the board reported for a finished action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    Success,
    Busy,
    UnspecifiedError(u8),
}

impl ActionOutcome {
    pub fn from_code(code: u8) -> Self {
        match code {
            OP_CODE_SUCCESS => ActionOutcome::Success,
            OP_CODE_ERROR_BUSY => ActionOutcome::Busy,
            other => ActionOutcome::UnspecifiedError(other),
        }
    }

    pub fn into_result(self) -> Result<(), OamsError> {
        match self {
            ActionOutcome::Success => Ok(()),
            ActionOutcome::Busy => Err(OamsError::DeviceBusy),
            ActionOutcome::UnspecifiedError(code) => Err(OamsError::DeviceError(code)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerDirection {
    Forward,
    Reverse,
}

impl FollowerDirection {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(FollowerDirection::Forward),
            1 => Some(FollowerDirection::Reverse),
            _ => None,
        }
    }

    fn wire_value(self) -> u32 {
        match self {
            FollowerDirection::Forward => 0,
            FollowerDirection::Reverse => 1,
        }
    }
}

/// Follower mode that was requested. The board does not confirm it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerAck {
    Forward,
    Reverse,
    Disabled,
}

impl fmt::Display for FollowerAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FollowerAck::Forward => write!(f, "Follower enable in forward direction"),
            FollowerAck::Reverse => write!(f, "Follower enable in reverse direction"),
            FollowerAck::Disabled => write!(f, "Follower disabled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Awaiting(ActionKind),
    // Report received, waiter has not picked it up yet. New actions are
    // refused until it has.
    Completed(ActionKind, u8),
}

#[derive(Debug)]
struct ActionState {
    phase: Phase,
    last_result: Option<(ActionKind, u8)>,
    spurious_notifications: u64,
}

/// Point-in-time view for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSnapshot {
    pub pending_action: Option<ActionKind>,
    pub last_action: Option<ActionKind>,
    pub last_result_code: Option<u8>,
    pub last_outcome: Option<ActionOutcome>,
    pub spurious_notifications: u64,
}

pub struct ActionController {
    mcu: Arc<dyn Mcu>,
    load_spool_cmd: MessageFormat,
    unload_spool_cmd: MessageFormat,
    follower_cmd: MessageFormat,
    state: Mutex<ActionState>,
    completed: Condvar,
    timeout: Option<Duration>,
}

impl ActionController {
    pub fn new(mcu: Arc<dyn Mcu>) -> Result<Self, OamsError> {
        Ok(ActionController {
            mcu,
            load_spool_cmd: MessageFormat::parse(LOAD_SPOOL_FMT)?,
            unload_spool_cmd: MessageFormat::parse(UNLOAD_SPOOL_FMT)?,
            follower_cmd: MessageFormat::parse(FOLLOWER_FMT)?,
            state: Mutex::new(ActionState {
                phase: Phase::Idle,
                last_result: None,
                spurious_notifications: 0,
            }),
            completed: Condvar::new(),
            timeout: None,
        })
    }

    /// Bounds the wait for a completion report. `None`, the default, waits
    /// for as long as it takes.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn load_spool(&self, index: u8) -> Result<ActionOutcome, OamsError> {
        if index >= SPOOL_COUNT {
            return Err(OamsError::InvalidArgument(format!(
                "Invalid SPOOL index {} (must be 0..{})",
                index,
                SPOOL_COUNT - 1
            )));
        }
        let cmd = self.load_spool_cmd.encode(&[u32::from(index)])?;
        info!("OAMS: loading spool {}", index);
        self.run_action(ActionKind::Loading, cmd)
    }

    pub fn unload_spool(&self) -> Result<ActionOutcome, OamsError> {
        let cmd = self.unload_spool_cmd.encode(&[])?;
        info!("OAMS: unloading spool");
        self.run_action(ActionKind::Unloading, cmd)
    }

    /// Fire and forget: returns as soon as the command is handed to the mcu.
    pub fn set_follower(&self, enable: bool, direction: FollowerDirection) -> Result<FollowerAck, OamsError> {
        let cmd = self.follower_cmd.encode(&[u32::from(enable), direction.wire_value()])?;
        self.mcu.send(cmd)?;
        let ack = match (enable, direction) {
            (false, _) => FollowerAck::Disabled,
            (true, FollowerDirection::Forward) => FollowerAck::Forward,
            (true, FollowerDirection::Reverse) => FollowerAck::Reverse,
        };
        info!("OAMS: {}", ack);
        Ok(ack)
    }

    fn run_action(&self, kind: ActionKind, cmd: Command) -> Result<ActionOutcome, OamsError> {
        {
            let mut state = self.state.lock();
            match state.phase {
                Phase::Idle => state.phase = Phase::Awaiting(kind),
                Phase::Awaiting(other) | Phase::Completed(other, _) => {
                    return Err(OamsError::ActionInProgress(other));
                }
            }
        }

        // Not holding the lock: the report may be delivered from inside send().
        if let Err(e) = self.mcu.send(cmd) {
            let mut state = self.state.lock();
            if state.phase == Phase::Awaiting(kind) {
                state.phase = Phase::Idle;
            }
            error!("OAMS: unable to send {} command: {}", kind, e);
            return Err(e.into());
        }

        let code = self.wait_for_completion(kind)?;
        let outcome = ActionOutcome::from_code(code);
        match outcome {
            ActionOutcome::Success => info!("OAMS: {} finished", kind),
            ActionOutcome::Busy => warn!("OAMS: {} rejected, device busy", kind),
            ActionOutcome::UnspecifiedError(code) => warn!("OAMS: {} failed with code {}", kind, code),
        }
        Ok(outcome)
    }

    fn wait_for_completion(&self, kind: ActionKind) -> Result<u8, OamsError> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            match state.phase {
                Phase::Completed(done, code) if done == kind => {
                    state.phase = Phase::Idle;
                    return Ok(code);
                }
                Phase::Awaiting(_) => {}
                // Only this waiter moves the state out of Awaiting/Completed.
                other => {
                    error!("OAMS: unexpected state {:?} while waiting for {}", other, kind);
                    state.phase = Phase::Idle;
                    return Ok(OP_CODE_ERROR_UNSPECIFIED);
                }
            }
            match deadline {
                None => self.completed.wait(&mut state),
                Some(deadline) => {
                    if self.completed.wait_until(&mut state, deadline).timed_out()
                        && state.phase == Phase::Awaiting(kind)
                    {
                        state.phase = Phase::Idle;
                        let timeout = self.timeout.unwrap_or_default();
                        warn!("OAMS: no status report for {} after {:?}", kind, timeout);
                        return Err(OamsError::Timeout { action: kind, timeout });
                    }
                }
            }
        }
    }

    /// Handles an `oams_action_status` report.
    pub fn on_status_notification(&self, action_tag: u8, code: u8) {
        let mut state = self.state.lock();
        self.apply_status(&mut state, action_tag, code);
    }

    fn apply_status(&self, state: &mut ActionState, action_tag: u8, code: u8) {
        match (state.phase, ActionKind::from_tag(action_tag)) {
            (Phase::Awaiting(pending), Some(kind)) if pending == kind => {
                state.phase = Phase::Completed(kind, code);
                state.last_result = Some((kind, code));
                info!("OAMS: status received for {} with code {}", kind, code);
                self.completed.notify_all();
            }
            _ => {
                state.spurious_notifications += 1;
                error!(
                    "Spurious response from OAMS with code {} and action {} (state {:?})",
                    code, action_tag, state.phase
                );
            }
        }
    }

    /// Decodes a raw report from the transport and hands it on.
    pub fn handle_action_status(&self, params: &MessageParams) {
        match (params.get_u8("action"), params.get_u8("code")) {
            (Ok(action), Ok(code)) => self.on_status_notification(action, code),
            (Err(e), _) | (_, Err(e)) => {
                self.state.lock().spurious_notifications += 1;
                error!("OAMS: malformed {} report: {}", ACTION_STATUS_MSG, e);
            }
        }
    }

    pub fn pending_action(&self) -> Option<ActionKind> {
        match self.state.lock().phase {
            Phase::Awaiting(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> ActionSnapshot {
        let state = self.state.lock();
        ActionSnapshot {
            pending_action: match state.phase {
                Phase::Awaiting(kind) => Some(kind),
                _ => None,
            },
            last_action: state.last_result.map(|(kind, _)| kind),
            last_result_code: state.last_result.map(|(_, code)| code),
            last_outcome: state.last_result.map(|(_, code)| ActionOutcome::from_code(code)),
            spurious_notifications: state.spurious_notifications,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcu::SimulatedMcu;
    use crate::msgproto::ParamValue;
    use std::thread;

    fn connected_mcu() -> Arc<SimulatedMcu> {
        let mcu = Arc::new(SimulatedMcu::new("mcu"));
        mcu.connect().unwrap();
        mcu
    }

    fn controller(mcu: &Arc<SimulatedMcu>) -> Arc<ActionController> {
        let mcu: Arc<dyn Mcu> = mcu.clone();
        Arc::new(ActionController::new(mcu).unwrap())
    }

    /// Answers every load/unload command from the send path itself.
    fn reply_inline(mcu: &Arc<SimulatedMcu>, ctrl: &Arc<ActionController>, code: u8) {
        let ctrl = Arc::downgrade(ctrl);
        mcu.set_send_hook(move |cmd: &Command| {
            let tag = match cmd.name() {
                "oams_cmd_load_spool" => ActionKind::Loading.tag(),
                "oams_cmd_unload_spool" => ActionKind::Unloading.tag(),
                _ => return,
            };
            if let Some(ctrl) = ctrl.upgrade() {
                ctrl.on_status_notification(tag, code);
            }
        });
    }

    fn wait_until_pending(ctrl: &ActionController, kind: ActionKind) {
        let start = Instant::now();
        while ctrl.pending_action() != Some(kind) {
            assert!(start.elapsed() < Duration::from_secs(5), "action never became pending");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn result_code_mapping() {
        assert_eq!(ActionOutcome::from_code(0), ActionOutcome::Success);
        assert_eq!(ActionOutcome::from_code(1), ActionOutcome::UnspecifiedError(1));
        assert_eq!(ActionOutcome::from_code(2), ActionOutcome::Busy);
        assert_eq!(ActionOutcome::from_code(7), ActionOutcome::UnspecifiedError(7));
        assert_eq!(ActionOutcome::Busy.into_result(), Err(OamsError::DeviceBusy));
        assert_eq!(ActionOutcome::from_code(9).into_result(), Err(OamsError::DeviceError(9)));
    }

    #[test]
    fn action_tags() {
        assert_eq!(ActionKind::from_tag(0), Some(ActionKind::Loading));
        assert_eq!(ActionKind::from_tag(1), Some(ActionKind::Unloading));
        assert_eq!(ActionKind::from_tag(2), None); // forward following is not an action
        assert_eq!(ActionKind::from_tag(200), None);
        assert_eq!(OamsStatus::from_u8(5), Some(OamsStatus::Stopped));
    }

    #[test]
    fn load_rejects_bad_index_without_sending() {
        let mcu = connected_mcu();
        let ctrl = controller(&mcu);
        for index in [4u8, 5, 255] {
            assert!(matches!(ctrl.load_spool(index), Err(OamsError::InvalidArgument(_))));
        }
        assert!(mcu.sent_commands().is_empty());
        assert_eq!(ctrl.pending_action(), None);
    }

    #[test]
    fn load_success_from_inline_report() {
        let mcu = connected_mcu();
        let ctrl = controller(&mcu);
        reply_inline(&mcu, &ctrl, OP_CODE_SUCCESS);

        assert_eq!(ctrl.load_spool(2), Ok(ActionOutcome::Success));
        assert_eq!(ctrl.pending_action(), None);
        let sent = mcu.sent_commands();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_string(), "oams_cmd_load_spool spool=2");

        let snap = ctrl.snapshot();
        assert_eq!(snap.last_action, Some(ActionKind::Loading));
        assert_eq!(snap.last_outcome, Some(ActionOutcome::Success));
    }

    #[test]
    fn busy_code_is_busy_not_error() {
        let mcu = connected_mcu();
        let ctrl = controller(&mcu);
        reply_inline(&mcu, &ctrl, OP_CODE_ERROR_BUSY);
        let outcome = ctrl.load_spool(0).unwrap();
        assert_eq!(outcome, ActionOutcome::Busy);
        assert_eq!(outcome.into_result(), Err(OamsError::DeviceBusy));

        reply_inline(&mcu, &ctrl, OP_CODE_ERROR_UNSPECIFIED);
        assert_eq!(ctrl.unload_spool(), Ok(ActionOutcome::UnspecifiedError(1)));
    }

    #[test]
    fn load_waits_for_report_from_other_thread() {
        let mcu = connected_mcu();
        let ctrl = controller(&mcu);

        let waiter = {
            let ctrl = Arc::clone(&ctrl);
            thread::spawn(move || ctrl.load_spool(1))
        };
        wait_until_pending(&ctrl, ActionKind::Loading);
        ctrl.on_status_notification(ActionKind::Loading.tag(), OP_CODE_SUCCESS);

        assert_eq!(waiter.join().unwrap(), Ok(ActionOutcome::Success));
        assert_eq!(ctrl.pending_action(), None);
    }

    #[test]
    fn mismatched_report_is_spurious_and_keeps_waiting() {
        let mcu = connected_mcu();
        let ctrl = controller(&mcu);

        let waiter = {
            let ctrl = Arc::clone(&ctrl);
            thread::spawn(move || ctrl.load_spool(3))
        };
        wait_until_pending(&ctrl, ActionKind::Loading);

        ctrl.on_status_notification(ActionKind::Unloading.tag(), OP_CODE_SUCCESS);
        ctrl.on_status_notification(OamsStatus::Coasting as u8, OP_CODE_SUCCESS);
        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());
        assert_eq!(ctrl.pending_action(), Some(ActionKind::Loading));
        assert_eq!(ctrl.snapshot().spurious_notifications, 2);
        assert_eq!(ctrl.snapshot().last_result_code, None);

        ctrl.on_status_notification(ActionKind::Loading.tag(), OP_CODE_ERROR_BUSY);
        assert_eq!(waiter.join().unwrap(), Ok(ActionOutcome::Busy));
    }

    #[test]
    fn report_with_nothing_pending_is_ignored() {
        let mcu = connected_mcu();
        let ctrl = controller(&mcu);
        ctrl.on_status_notification(ActionKind::Loading.tag(), OP_CODE_SUCCESS);
        let snap = ctrl.snapshot();
        assert_eq!(snap.pending_action, None);
        assert_eq!(snap.last_result_code, None);
        assert_eq!(snap.spurious_notifications, 1);
    }

    #[test]
    fn second_action_refused_while_one_pending() {
        let mcu = connected_mcu();
        let ctrl = controller(&mcu);

        let waiter = {
            let ctrl = Arc::clone(&ctrl);
            thread::spawn(move || ctrl.load_spool(0))
        };
        wait_until_pending(&ctrl, ActionKind::Loading);

        assert_eq!(ctrl.unload_spool(), Err(OamsError::ActionInProgress(ActionKind::Loading)));
        assert_eq!(ctrl.load_spool(1), Err(OamsError::ActionInProgress(ActionKind::Loading)));
        assert_eq!(mcu.sent_commands().len(), 1);

        ctrl.on_status_notification(ActionKind::Loading.tag(), OP_CODE_SUCCESS);
        assert_eq!(waiter.join().unwrap(), Ok(ActionOutcome::Success));
    }

    #[test]
    fn optional_timeout_releases_the_caller() {
        let mcu = connected_mcu();
        let mcu_dyn: Arc<dyn Mcu> = mcu.clone();
        let ctrl = ActionController::new(mcu_dyn)
            .unwrap()
            .with_timeout(Some(Duration::from_millis(50)));

        assert_eq!(
            ctrl.unload_spool(),
            Err(OamsError::Timeout { action: ActionKind::Unloading, timeout: Duration::from_millis(50) })
        );
        assert_eq!(ctrl.pending_action(), None);

        // A late report for the abandoned action does not count as a result.
        ctrl.on_status_notification(ActionKind::Unloading.tag(), OP_CODE_SUCCESS);
        assert_eq!(ctrl.snapshot().spurious_notifications, 1);
        assert_eq!(ctrl.snapshot().last_result_code, None);
    }

    #[test]
    fn report_at_the_deadline_still_completes() {
        let mcu = connected_mcu();
        let mcu_dyn: Arc<dyn Mcu> = mcu.clone();
        let ctrl = Arc::new(
            ActionController::new(mcu_dyn)
                .unwrap()
                .with_timeout(Some(Duration::from_millis(50))),
        );
        let waiter = {
            let ctrl = Arc::clone(&ctrl);
            thread::spawn(move || ctrl.unload_spool())
        };
        wait_until_pending(&ctrl, ActionKind::Unloading);

        // Hold the state past the deadline so the wait times out with the
        // report already recorded.
        {
            let mut state = ctrl.state.lock();
            thread::sleep(Duration::from_millis(150));
            ctrl.apply_status(&mut state, ActionKind::Unloading.tag(), OP_CODE_ERROR_BUSY);
        }
        assert_eq!(waiter.join().unwrap(), Ok(ActionOutcome::Busy));
        assert_eq!(ctrl.pending_action(), None);
        assert_eq!(ctrl.snapshot().spurious_notifications, 0);
    }

    #[test]
    fn unconsumed_result_refuses_new_action() {
        let mcu = connected_mcu();
        let ctrl = controller(&mcu);
        let refused = Arc::new(Mutex::new(None));

        // The report lands inside send(), before the caller starts waiting.
        let hook_ctrl = Arc::downgrade(&ctrl);
        let hook_refused = Arc::clone(&refused);
        mcu.set_send_hook(move |cmd: &Command| {
            if cmd.name() != "oams_cmd_load_spool" {
                return;
            }
            if let Some(ctrl) = hook_ctrl.upgrade() {
                ctrl.on_status_notification(ActionKind::Loading.tag(), OP_CODE_ERROR_UNSPECIFIED);
                assert_eq!(ctrl.pending_action(), None);
                *hook_refused.lock() = Some(ctrl.unload_spool());
            }
        });

        assert_eq!(ctrl.load_spool(1), Ok(ActionOutcome::UnspecifiedError(1)));
        assert_eq!(*refused.lock(), Some(Err(OamsError::ActionInProgress(ActionKind::Loading))));
        let sent: Vec<String> = mcu.sent_commands().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(sent, ["oams_cmd_load_spool"]);

        // Consumed now; the next action goes through.
        mcu.set_send_hook(|_: &Command| {});
        let ctrl_dyn = Arc::clone(&ctrl);
        let waiter = thread::spawn(move || ctrl_dyn.unload_spool());
        wait_until_pending(&ctrl, ActionKind::Unloading);
        ctrl.on_status_notification(ActionKind::Unloading.tag(), OP_CODE_SUCCESS);
        assert_eq!(waiter.join().unwrap(), Ok(ActionOutcome::Success));
    }

    #[test]
    fn send_failure_rolls_back_pending_state() {
        let mcu = Arc::new(SimulatedMcu::new("mcu")); // never connected
        let ctrl = controller(&mcu);
        assert!(matches!(ctrl.load_spool(0), Err(OamsError::Mcu(_))));
        assert_eq!(ctrl.pending_action(), None);
        assert!(matches!(ctrl.unload_spool(), Err(OamsError::Mcu(_))));
    }

    #[test]
    fn follower_is_fire_and_forget() {
        let mcu = connected_mcu();
        let ctrl = controller(&mcu);

        assert_eq!(ctrl.set_follower(true, FollowerDirection::Forward), Ok(FollowerAck::Forward));
        assert_eq!(mcu.sent_commands().len(), 1);
        assert_eq!(ctrl.set_follower(true, FollowerDirection::Reverse), Ok(FollowerAck::Reverse));
        assert_eq!(mcu.sent_commands().len(), 2);
        assert_eq!(ctrl.set_follower(false, FollowerDirection::Forward), Ok(FollowerAck::Disabled));

        let sent: Vec<String> = mcu.sent_commands().iter().map(|c| c.to_string()).collect();
        assert_eq!(
            sent,
            [
                "oams_cmd_follower enable=1 direction=0",
                "oams_cmd_follower enable=1 direction=1",
                "oams_cmd_follower enable=0 direction=0",
            ]
        );
        assert_eq!(ctrl.pending_action(), None);
        assert_eq!(ctrl.snapshot().spurious_notifications, 0);
    }

    #[test]
    fn decodes_raw_status_params() {
        let mcu = connected_mcu();
        let ctrl = controller(&mcu);
        let good = MessageParams::new(ACTION_STATUS_MSG)
            .with("action", ParamValue::Int(0))
            .with("code", ParamValue::Int(0));
        let missing_code = MessageParams::new(ACTION_STATUS_MSG).with("action", ParamValue::Int(0));

        ctrl.handle_action_status(&missing_code);
        ctrl.handle_action_status(&good); // nothing pending either
        assert_eq!(ctrl.snapshot().spurious_notifications, 2);
    }
}
