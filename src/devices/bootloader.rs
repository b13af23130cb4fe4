//! Generic Bootloader.
//!
//! This module contains all bootloader functionality, with
//! the exception of how to construct one. Construction is
//! left to the board entry point, as it depends on board
//! specific drivers.
use super::{
    boot_metrics::BootMetrics,
    image::{FirmwareDescriptor, ImageStore, Slot},
    interfaces::{boot::BootSelector, timeout::TimeoutSupervisor},
    traits::Transport,
    update::{BootDecision, Mode, UpdateStateMachine},
    verification::Verifier,
};
use crate::{configuration, error::Error, hal::time::Ticks};

pub struct Bootloader<S, T, V, TS, B>
where
    S: ImageStore,
    T: Transport,
    V: Verifier,
    TS: TimeoutSupervisor,
    B: BootSelector,
{
    pub(crate) store: S,
    pub(crate) transport: T,
    pub(crate) verifier: V,
    pub(crate) supervisor: TS,
    pub(crate) selector: B,
    pub(crate) window: Ticks,
    /// Slot resolved by the last closed window.
    pub(crate) target: Option<Slot>,
}

impl<S, T, V, TS, B> Bootloader<S, T, V, TS, B>
where
    S: ImageStore,
    T: Transport,
    V: Verifier,
    TS: TimeoutSupervisor,
    B: BootSelector,
{
    /// Bootloader with the update window fixed by the build configuration.
    pub fn new(store: S, transport: T, verifier: V, supervisor: TS, selector: B) -> Self {
        Self {
            store,
            transport,
            verifier,
            supervisor,
            selector,
            window: Ticks(configuration::UPDATE_WINDOW_TICKS),
            target: None,
        }
    }

    pub fn with_window(self, window: Ticks) -> Self { Self { window, ..self } }

    /// Main bootloader routine.
    ///
    /// Opens an update window if valid firmware is present, or waits for
    /// an update indefinitely otherwise, then boots whichever image the
    /// window decided on. Only comes back around if no image can be booted.
    pub fn run(mut self) -> ! {
        log!(info, "-- Bootloader initialised --");
        loop {
            let (decision, metrics) = self.decide();
            self.commit(decision, &metrics);
        }
    }

    /// Runs a full update window to its decision.
    ///
    /// `StayInBootloader` is only returned when the window decided on an
    /// image that turned out not to be bootable.
    pub fn decide(&mut self) -> (BootDecision, BootMetrics) {
        let mut machine = self.open_window();
        let decision = loop {
            if let Some(decision) = self.step(&mut machine) {
                break decision;
            }
        };
        self.close_window(&machine, decision)
    }

    /// Queries the newest firmware and opens the window accordingly.
    pub fn open_window(&mut self) -> UpdateStateMachine {
        let descriptor = self.store.latest_descriptor();
        let machine = UpdateStateMachine::open(descriptor);
        if machine.mode() == Mode::WindowOpen {
            log!(info, "Firmware v{} found, update window open", descriptor.version);
            self.supervisor.arm(self.window);
        } else {
            log!(warn, "No valid firmware, waiting for an update");
        }
        machine
    }

    /// One loop iteration: latches expiry, polls the state machine, and
    /// honours its re-arm request.
    pub fn step(&mut self, machine: &mut UpdateStateMachine) -> Option<BootDecision> {
        machine.session_mut().latch_timeout(self.supervisor.is_expired());
        machine.poll(&mut self.transport, &self.verifier, &mut self.store);
        if machine.session_mut().take_rearm_request() {
            self.supervisor.reset();
        }
        machine.decision()
    }

    /// Stops supervision and resolves the decision to a slot: the one the
    /// window committed for `JumpToNew`, the untouched current one for
    /// `JumpToOld`. Falls back to `StayInBootloader` if that slot no longer
    /// holds a valid image.
    pub fn close_window(
        &mut self,
        machine: &UpdateStateMachine,
        decision: BootDecision,
    ) -> (BootDecision, BootMetrics) {
        self.supervisor.disarm();
        let slot = match decision {
            BootDecision::JumpToNew => machine.committed(),
            BootDecision::JumpToOld => self.store.current(),
            BootDecision::StayInBootloader => None,
        };
        let booted = slot
            .map(|slot| (slot, self.store.descriptor(slot)))
            .filter(|(_, image)| image.valid);

        self.target = booted.map(|(slot, _)| slot);
        let (decision, version) = match booted {
            Some((_, image)) => (decision, image.version),
            None => (BootDecision::StayInBootloader, FirmwareDescriptor::ABSENT_VERSION),
        };
        log!(info, "Window closed after {} polls: {}", machine.polls(), decision);
        (decision, BootMetrics::new(decision, version, machine.polls(), machine.frames()))
    }

    /// Hands control to the slot resolved when the window closed. Returns
    /// only when staying in the bootloader.
    pub fn commit(&mut self, decision: BootDecision, metrics: &BootMetrics) {
        let slot = match (decision, self.target.take()) {
            (BootDecision::StayInBootloader, _) | (_, None) => {
                log!(error, "{}, staying in bootloader", Error::NoValidFirmware.description());
                return;
            }
            (_, Some(slot)) => slot,
        };
        self.selector.restore();
        let location = self.store.location(slot);
        log!(warn, "Jumping to slot {}. This will break `defmt`.", slot);
        self.selector.jump(location, metrics)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        devices::{
            boot_metrics::BootPath,
            image::{header::HEADER_SIZE, Bank, BankedImageStore},
            protocol::{Ack, ErrorCode, Frame},
            verification::CrcVerifier,
        },
        hal::{
            doubles::{
                boot::FakeBootSelector,
                flash::{Address, FakeFlash},
                timer::FakeTimer,
                transport::{corrupted, image_frames, MockTransport},
            },
            flash::ReadWrite,
            time::U32Ext,
        },
    };

    const BANK_SIZE: usize = 0x800;
    const BANK_A: Address = Address(0x1000);
    const BANK_B: Address = Address(0x2000);
    const OLD_IMAGE: [u8; 64] = [0x0D; 64];

    type TestBootloader =
        Bootloader<BankedImageStore<FakeFlash>, MockTransport, CrcVerifier, FakeTimer, FakeBootSelector>;

    fn blank_store() -> BankedImageStore<FakeFlash> {
        BankedImageStore::new(FakeFlash::new(Address(0)), [
            Bank { slot: Slot::A, location: BANK_A, size: BANK_SIZE },
            Bank { slot: Slot::B, location: BANK_B, size: BANK_SIZE },
        ])
    }

    fn bootloader(store: BankedImageStore<FakeFlash>) -> TestBootloader {
        Bootloader::new(
            store,
            MockTransport::default(),
            CrcVerifier,
            FakeTimer::default(),
            FakeBootSelector::default(),
        )
        .with_window(5.ticks())
    }

    fn store_with_firmware() -> BankedImageStore<FakeFlash> {
        let mut store = blank_store();
        store.begin(1, OLD_IMAGE.len()).unwrap();
        store.write(0, &OLD_IMAGE).unwrap();
        store.update_headers(true).unwrap();
        store
    }

    fn bootloader_with_firmware() -> TestBootloader { bootloader(store_with_firmware()) }

    fn header_writes(bootloader: &TestBootloader) -> usize {
        let flash = bootloader.store.flash();
        flash.writes_within(BANK_A + (BANK_SIZE - HEADER_SIZE), HEADER_SIZE)
            + flash.writes_within(BANK_B + (BANK_SIZE - HEADER_SIZE), HEADER_SIZE)
    }

    /// Advances the timer one period, delivers `frame` if any, and steps.
    fn tick(
        bootloader: &mut TestBootloader,
        machine: &mut UpdateStateMachine,
        frame: Option<Frame>,
    ) -> Option<BootDecision> {
        bootloader.supervisor.tick();
        if let Some(frame) = frame {
            bootloader.transport.push(frame);
        }
        bootloader.step(machine)
    }

    #[test]
    fn window_with_a_corrupt_then_complete_transfer_jumps_to_new() {
        // Given
        let mut bootloader = bootloader_with_firmware();
        let frames = image_frames(2, &[0x22; 100]);
        assert_eq!(frames.len(), 2);
        let header_writes_before = header_writes(&bootloader);
        let mut machine = bootloader.open_window();

        // When (tick 1: invalid, tick 2: valid partial, tick 3: valid final)
        let tick_1 = tick(&mut bootloader, &mut machine, Some(corrupted(frames[0])));
        let tick_2 = tick(&mut bootloader, &mut machine, Some(frames[0]));
        let tick_3 = tick(&mut bootloader, &mut machine, Some(frames[1]));

        // Then
        assert_eq!((tick_1, tick_2), (None, None));
        assert_eq!(tick_3, Some(BootDecision::JumpToNew));
        assert_eq!(bootloader.transport.sent, vec![
            Ack::Negative(ErrorCode::Integrity),
            Ack::Positive,
            Ack::Positive
        ]);
        // New header written, old header invalidated once.
        assert_eq!(header_writes(&bootloader), header_writes_before + 2);
        assert_eq!(
            bootloader.store.flash().writes_within(BANK_A + (BANK_SIZE - HEADER_SIZE), HEADER_SIZE),
            2
        );

        let (decision, metrics) = bootloader.close_window(&machine, tick_3.unwrap());
        assert_eq!(decision, BootDecision::JumpToNew);
        assert_eq!(bootloader.target, Some(Slot::B));
        assert_eq!(metrics.boot_path, BootPath::Updated { version: 2 });
        assert_eq!(metrics.window_polls, 3);
        assert!(!bootloader.supervisor.armed);
    }

    #[test]
    fn quiet_window_jumps_to_old_on_expiry() {
        // Given
        let mut bootloader = bootloader_with_firmware();
        let header_writes_before = header_writes(&bootloader);
        let mut machine = bootloader.open_window();

        // When
        let decisions: Vec<_> = (1..=5).map(|_| tick(&mut bootloader, &mut machine, None)).collect();

        // Then
        assert_eq!(decisions, vec![None, None, None, None, Some(BootDecision::JumpToOld)]);
        assert_eq!(header_writes(&bootloader), header_writes_before);
        assert!(bootloader.transport.sent.is_empty());

        let (_, metrics) = bootloader.close_window(&machine, BootDecision::JumpToOld);
        assert_eq!(bootloader.target, Some(Slot::A));
        assert_eq!(metrics.boot_path, BootPath::Direct);
    }

    #[test]
    fn rejected_frame_restores_a_full_window() {
        // Given
        let mut bootloader = bootloader_with_firmware();
        let mut machine = bootloader.open_window();
        (0..3).for_each(|_| assert_eq!(tick(&mut bootloader, &mut machine, None), None));
        assert_eq!(bootloader.supervisor.remaining(), 2);

        // When
        bootloader.transport.push(corrupted(Frame::abort()));
        bootloader.step(&mut machine);

        // Then
        assert_eq!(bootloader.supervisor.remaining(), 5);
        assert_eq!(bootloader.supervisor.resets, 1);
        let decisions: Vec<_> = (1..=5).map(|_| tick(&mut bootloader, &mut machine, None)).collect();
        assert_eq!(decisions, vec![None, None, None, None, Some(BootDecision::JumpToOld)]);
    }

    #[test]
    fn final_frame_wins_over_simultaneous_expiry() {
        // Given
        let mut bootloader = bootloader_with_firmware();
        let frames = image_frames(2, &[0x33; 16]);
        let mut machine = bootloader.open_window();
        tick(&mut bootloader, &mut machine, Some(frames[0]));

        // When the window expires with the final frame already pending
        (0..5).for_each(|_| bootloader.supervisor.tick());
        assert!(bootloader.supervisor.is_expired());
        bootloader.transport.push(frames[1]);

        // Then
        assert_eq!(bootloader.step(&mut machine), Some(BootDecision::JumpToNew));
    }

    #[test]
    fn missing_firmware_waits_without_a_window() {
        // Given
        let mut bootloader = bootloader(blank_store());
        let mut machine = bootloader.open_window();

        // When
        let quiet: Vec<_> = (0..50).map(|_| tick(&mut bootloader, &mut machine, None)).collect();

        // Then
        assert!(quiet.iter().all(Option::is_none));
        assert_eq!(machine.mode(), Mode::Idle);
        assert!(!bootloader.supervisor.armed);

        // When an image finally arrives
        image_frames(1, &[0x44; 300]).into_iter().for_each(|f| bootloader.transport.push(f));

        // Then
        let (decision, metrics) = bootloader.decide();
        assert_eq!(decision, BootDecision::JumpToNew);
        assert_eq!(metrics.boot_path, BootPath::Updated { version: 1 });
        assert_eq!(bootloader.store.latest_descriptor(), FirmwareDescriptor::new(1, true));
    }

    #[test]
    fn decide_runs_the_window_to_completion() {
        let mut bootloader = bootloader_with_firmware();
        image_frames(7, &[0x55; 10]).into_iter().for_each(|f| bootloader.transport.push(f));

        let (decision, metrics) = bootloader.decide();

        assert_eq!(decision, BootDecision::JumpToNew);
        assert_eq!(metrics.frames_received, 2);
        assert_eq!(bootloader.store.current(), Some(Slot::B));
    }

    #[test]
    fn staying_in_bootloader_does_not_jump() {
        let mut bootloader = bootloader(blank_store());
        bootloader.commit(BootDecision::JumpToOld, &BootMetrics::default());
        bootloader.commit(BootDecision::StayInBootloader, &BootMetrics::default());
        assert!(!bootloader.selector.restored);
    }

    #[test]
    #[should_panic(expected = "Jump to 0x2000 via Updated { version: 3 }")]
    fn run_boots_the_updated_image() {
        let mut bootloader = bootloader_with_firmware();
        image_frames(3, &[0x66; 40]).into_iter().for_each(|f| bootloader.transport.push(f));
        bootloader.run();
    }

    #[test]
    #[should_panic(expected = "Jump to 0x1000 via Recovered { version: 1 }")]
    fn run_falls_back_to_old_image_after_abort() {
        let mut bootloader = bootloader_with_firmware();
        bootloader.transport.push(image_frames(3, &[0x66; 40])[0]);
        bootloader.transport.push(Frame::abort());
        bootloader.run();
    }

    #[test]
    fn old_image_that_went_bad_keeps_the_bootloader_running() {
        // Given
        let mut bootloader = bootloader_with_firmware();
        let machine = bootloader.open_window();
        let header = BANK_A + (BANK_SIZE - HEADER_SIZE);
        bootloader.store.flash_mut().write(header, &[0u8; HEADER_SIZE]).unwrap();

        // When
        let (decision, _) = bootloader.close_window(&machine, BootDecision::JumpToOld);

        // Then
        assert_eq!(decision, BootDecision::StayInBootloader);
        assert_eq!(bootloader.target, None);
    }

    #[test]
    fn new_image_boots_even_if_the_old_header_survives() {
        // Given
        let store = OldHeaderSticks { inner: store_with_firmware() };
        let mut bootloader = Bootloader::new(
            store,
            MockTransport::default(),
            CrcVerifier,
            FakeTimer::default(),
            FakeBootSelector::default(),
        )
        .with_window(5.ticks());
        image_frames(2, &[0x77; 100]).into_iter().for_each(|f| bootloader.transport.push(f));

        // When
        let (decision, metrics) = bootloader.decide();

        // Then
        assert_eq!(decision, BootDecision::JumpToNew);
        assert_eq!(metrics.boot_path, BootPath::Updated { version: 2 });
        assert_eq!(bootloader.target, Some(Slot::B));
        assert_eq!(bootloader.store.inner.descriptor(Slot::A), FirmwareDescriptor::new(1, true));
    }

    #[test]
    #[should_panic(expected = "Jump to 0x2000 via Updated { version: 2 }")]
    fn run_boots_the_committed_slot_when_the_old_header_survives() {
        let store = OldHeaderSticks { inner: store_with_firmware() };
        let mut bootloader = Bootloader::new(
            store,
            MockTransport::default(),
            CrcVerifier,
            FakeTimer::default(),
            FakeBootSelector::default(),
        )
        .with_window(5.ticks());
        image_frames(2, &[0x77; 100]).into_iter().for_each(|f| bootloader.transport.push(f));
        bootloader.run();
    }

    /// Store whose superseded header can never be invalidated.
    struct OldHeaderSticks {
        inner: BankedImageStore<FakeFlash>,
    }

    impl ImageStore for OldHeaderSticks {
        type Bytes<'a> = <BankedImageStore<FakeFlash> as ImageStore>::Bytes<'a> where Self: 'a;

        fn latest_descriptor(&mut self) -> FirmwareDescriptor { self.inner.latest_descriptor() }
        fn descriptor(&mut self, slot: Slot) -> FirmwareDescriptor { self.inner.descriptor(slot) }
        fn current(&self) -> Option<Slot> { self.inner.current() }
        fn capacity(&self) -> usize { self.inner.capacity() }
        fn location(&self, slot: Slot) -> usize { self.inner.location(slot) }
        fn begin(&mut self, version: u32, size: usize) -> Result<(), Error> {
            self.inner.begin(version, size)
        }
        fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Error> {
            self.inner.write(offset, bytes)
        }
        fn candidate_bytes(&mut self, size: usize) -> Self::Bytes<'_> {
            self.inner.candidate_bytes(size)
        }
        fn update_headers(&mut self, new_valid: bool) -> Result<(), Error> {
            self.inner.update_headers(new_valid)
        }
        fn erase_old_header(&mut self) -> Result<(), Error> {
            Err(Error::DeviceError("Header write failed"))
        }
    }
}
