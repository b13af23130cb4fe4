//! Update orchestration.
//!
//! The [`UpdateStateMachine`] is polled once per loop iteration. Each poll
//! handles at most one frame, then evaluates the session in a fixed
//! order: completion first, then expiry, then an aborted transfer. A
//! decision, once reached, is final.
use crate::{
    devices::{
        image::{FirmwareDescriptor, ImageStore, Slot},
        protocol::{parse_command, Ack, ErrorCode},
        traits::Transport,
        verification::Verifier,
    },
    error::Error,
};
#[cfg(target_arch = "arm")]
use defmt::Format;

pub mod receiver;
pub mod session;

use receiver::{Outcome, Receiver};
use session::{Transmission, UpdateSession};

/// Which image to hand control to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(Format))]
pub enum BootDecision {
    StayInBootloader,
    JumpToNew,
    JumpToOld,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_arch = "arm", derive(Format))]
pub enum Mode {
    /// No valid firmware. Waits for an update for as long as it takes.
    Idle,
    /// Valid firmware present. Accepts an update until the window expires.
    WindowOpen,
    /// Finalizing the headers of a received image.
    Committing,
    Decided(BootDecision),
}

pub struct UpdateStateMachine {
    mode: Mode,
    session: UpdateSession,
    receiver: Receiver,
    installed: FirmwareDescriptor,
    committed: Option<Slot>,
    polls: u32,
    frames: u32,
}

impl UpdateStateMachine {
    /// Opens a window if the descriptor names valid firmware, or starts
    /// waiting indefinitely for one otherwise.
    pub fn open(descriptor: FirmwareDescriptor) -> Self {
        let mode = if descriptor.valid { Mode::WindowOpen } else { Mode::Idle };
        Self {
            mode,
            session: UpdateSession::new(),
            receiver: Receiver::new(descriptor),
            installed: descriptor,
            committed: None,
            polls: 0,
            frames: 0,
        }
    }

    pub fn mode(&self) -> Mode { self.mode }
    pub fn session(&self) -> &UpdateSession { &self.session }
    pub fn session_mut(&mut self) -> &mut UpdateSession { &mut self.session }

    /// Firmware found when the machine was opened.
    pub fn installed(&self) -> FirmwareDescriptor { self.installed }

    /// Slot finalized by a successful commit. Set whenever the decision is
    /// `JumpToNew`.
    pub fn committed(&self) -> Option<Slot> { self.committed }

    /// Polls completed since the machine was opened.
    pub fn polls(&self) -> u32 { self.polls }

    /// Frames received since the machine was opened, accepted or not.
    pub fn frames(&self) -> u32 { self.frames }

    pub fn decision(&self) -> Option<BootDecision> {
        match self.mode {
            Mode::Decided(decision) => Some(decision),
            _ => None,
        }
    }

    /// Runs one iteration: handles the pending frame, if any, then
    /// evaluates the session. Never blocks.
    pub fn poll<T, V, S>(&mut self, transport: &mut T, verifier: &V, store: &mut S) -> Mode
    where
        T: Transport,
        V: Verifier,
        S: ImageStore,
    {
        if let Mode::Decided(_) = self.mode {
            return self.mode;
        }
        self.polls = self.polls.saturating_add(1);

        if transport.has_new_message() {
            self.process(transport, verifier, store);
        }

        self.mode = self.evaluate(store);
        self.mode
    }

    fn process<T, V, S>(&mut self, transport: &mut T, verifier: &V, store: &mut S)
    where
        T: Transport,
        V: Verifier,
        S: ImageStore,
    {
        // Any inbound frame extends the window, whether it verifies or not.
        self.session.request_rearm();
        self.frames = self.frames.saturating_add(1);

        let result = match transport.receive() {
            Ok(frame) if verifier.check_integrity(&frame) => parse_command(frame.payload())
                .and_then(|command| self.receiver.apply(command, store, verifier)),
            Ok(_) => Err(ErrorCode::Integrity),
            Err(error) => {
                log!(warn, "Failed to receive frame: {}", Error::from(error).description());
                Err(ErrorCode::Integrity)
            }
        };

        let ack = match result {
            Ok(Outcome::Continue) => Ack::Positive,
            Ok(Outcome::Completed) => {
                self.session.succeed();
                Ack::Positive
            }
            Ok(Outcome::Aborted) => {
                self.session.fail();
                Ack::Positive
            }
            Err(code) => {
                log!(debug, "Frame rejected: {}", code);
                self.session.reject(code);
                Ack::Negative(code)
            }
        };

        if let Err(error) = transport.send(ack) {
            log!(warn, "Failed to acknowledge frame: {}", Error::from(error).description());
        }
    }

    fn evaluate<S: ImageStore>(&mut self, store: &mut S) -> Mode {
        let window = self.mode == Mode::WindowOpen;
        match self.session.transmission() {
            Transmission::Succeeded => self.commit(store, window),
            _ if window && self.session.timeout_expired() => {
                log!(info, "Update window expired");
                Mode::Decided(BootDecision::JumpToOld)
            }
            Transmission::Failed if window => Mode::Decided(BootDecision::JumpToOld),
            Transmission::Failed => {
                self.restart();
                Mode::Idle
            }
            Transmission::Pending => self.mode,
        }
    }

    fn commit<S: ImageStore>(&mut self, store: &mut S, window: bool) -> Mode {
        self.mode = Mode::Committing;
        let candidate = store.candidate();
        if let Err(error) = store.update_headers(true) {
            log!(error, "Failed to commit new image: {}", error.description());
            return if window {
                Mode::Decided(BootDecision::JumpToOld)
            } else {
                self.restart();
                Mode::Idle
            };
        }

        self.committed = Some(candidate);

        if window {
            if let Err(error) = store.erase_old_header() {
                log!(warn, "Failed to invalidate superseded image: {}", error.description());
            }
        }
        Mode::Decided(BootDecision::JumpToNew)
    }

    /// Fresh session for another attempt while idle.
    fn restart(&mut self) {
        self.session = UpdateSession::new();
        self.receiver = Receiver::new(self.installed);
    }
}
