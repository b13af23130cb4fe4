//! State of one update window.
use crate::devices::protocol::ErrorCode;
#[cfg(target_arch = "arm")]
use defmt::Format;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(Format))]
pub enum Transmission {
    Pending,
    Succeeded,
    Failed,
}

/// Mutable state of the window currently open. A fresh session is
/// created every time a window opens, and dropped when it closes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateSession {
    transmission: Transmission,
    timeout_expired: bool,
    last_error: Option<ErrorCode>,
    rearm_requested: bool,
}

impl Default for UpdateSession {
    fn default() -> Self { Self::new() }
}

impl UpdateSession {
    pub const fn new() -> Self {
        Self {
            transmission: Transmission::Pending,
            timeout_expired: false,
            last_error: None,
            rearm_requested: false,
        }
    }

    pub fn transmission(&self) -> Transmission { self.transmission }

    /// No effect once the transmission has an outcome.
    pub fn succeed(&mut self) {
        if self.transmission == Transmission::Pending {
            self.transmission = Transmission::Succeeded;
        }
    }

    /// No effect once the transmission has an outcome.
    pub fn fail(&mut self) {
        if self.transmission == Transmission::Pending {
            self.transmission = Transmission::Failed;
        }
    }

    /// Folds in the supervisor's expiry flag. Once latched, expiry stays
    /// latched for the rest of the session.
    pub fn latch_timeout(&mut self, expired: bool) { self.timeout_expired |= expired; }

    pub fn timeout_expired(&self) -> bool { self.timeout_expired }

    pub fn reject(&mut self, code: ErrorCode) { self.last_error = Some(code); }

    pub fn last_error(&self) -> Option<ErrorCode> { self.last_error }

    pub fn request_rearm(&mut self) { self.rearm_requested = true; }

    /// Consumes a pending re-arm request.
    pub fn take_rearm_request(&mut self) -> bool {
        core::mem::replace(&mut self.rearm_requested, false)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transmission_outcome_is_final() {
        let mut session = UpdateSession::new();
        session.succeed();
        session.fail();
        assert_eq!(session.transmission(), Transmission::Succeeded);

        let mut session = UpdateSession::new();
        session.fail();
        session.succeed();
        assert_eq!(session.transmission(), Transmission::Failed);
    }

    #[test]
    fn expiry_latch_is_monotone() {
        let mut session = UpdateSession::new();
        session.latch_timeout(false);
        assert!(!session.timeout_expired());
        session.latch_timeout(true);
        session.latch_timeout(false);
        assert!(session.timeout_expired());
    }

    #[test]
    fn rearm_request_is_consumed_once() {
        let mut session = UpdateSession::new();
        assert!(!session.take_rearm_request());
        session.request_rearm();
        session.request_rearm();
        assert!(session.take_rearm_request());
        assert!(!session.take_rearm_request());
    }

    #[test]
    fn last_error_tracks_latest_rejection() {
        let mut session = UpdateSession::default();
        session.reject(ErrorCode::Integrity);
        session.reject(ErrorCode::Sequence);
        assert_eq!(session.last_error(), Some(ErrorCode::Sequence));
    }
}
