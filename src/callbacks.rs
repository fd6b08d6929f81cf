//! Events a session reports to its host application
//!
//! Callbacks fire synchronously at the point of the triggering change, on
//! the thread driving the session. Implementations must return quickly.

use std::path::Path;

use crate::lib3270::transfer::TransferDirection;

/// Receiver for session events; every method defaults to doing nothing
pub trait SessionCallback {
    /// Screen contents changed after a host write
    fn screen_changed(&mut self) {}

    /// Whole screen should be redrawn (erase, size switch)
    fn repaint_requested(&mut self) {}

    fn keyboard_lock_changed(&mut self, _locked: bool) {}

    /// Informational text for a status line
    fn status_message(&mut self, _message: &str) {}

    /// Host set the alarm bit in a WCC
    fn alarm(&mut self) {}

    fn transfer_started(&mut self, _direction: TransferDirection, _path: &Path) {}

    fn transfer_progress(&mut self, _bytes: u64, _blocks: u32) {}

    fn transfer_complete(&mut self, _message: &str) {}

    fn transfer_error(&mut self, _message: &str) {}
}

/// Callback that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallback;

impl SessionCallback for NoopCallback {}
