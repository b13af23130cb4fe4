//! Applies decoded commands to the image store.
use crate::devices::{
    image::{FirmwareDescriptor, ImageStore},
    protocol::{Command, ErrorCode, MAX_PROOF_SIZE},
    verification::Verifier,
};

/// Effect of a successfully applied command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Progress, or nothing to do. The transfer carries on.
    Continue,
    /// The last image byte arrived and the image authenticated.
    Completed,
    /// The sender abandoned the transfer.
    Aborted,
}

#[derive(Clone, Copy, Debug)]
enum Reception {
    AwaitingStart,
    Receiving(Transfer),
}

#[derive(Clone, Copy, Debug)]
struct Transfer {
    size: usize,
    written: usize,
    next_sequence: u16,
    proof: [u8; MAX_PROOF_SIZE],
    proof_length: usize,
}

impl Transfer {
    fn proof(&self) -> &[u8] { &self.proof[..self.proof_length] }

    /// Sequence number of the last chunk written, if any.
    fn previous_sequence(&self) -> Option<u16> {
        (self.written > 0).then(|| self.next_sequence.wrapping_sub(1))
    }
}

/// Receiving end of the update protocol.
#[derive(Clone, Copy, Debug)]
pub struct Receiver {
    reception: Reception,
    installed: FirmwareDescriptor,
}

impl Default for Receiver {
    fn default() -> Self { Self::new(FirmwareDescriptor::absent()) }
}

impl Receiver {
    /// Receiver accepting only images newer than `installed`, if it is valid.
    pub fn new(installed: FirmwareDescriptor) -> Self {
        Self { reception: Reception::AwaitingStart, installed }
    }

    pub fn is_receiving(&self) -> bool { matches!(self.reception, Reception::Receiving(_)) }

    pub fn apply<S, V>(
        &mut self,
        command: Command,
        store: &mut S,
        verifier: &V,
    ) -> Result<Outcome, ErrorCode>
    where
        S: ImageStore,
        V: Verifier,
    {
        match command {
            Command::Start { version, size, proof } => {
                self.reception = Reception::AwaitingStart;
                let transfer = self.start(version, size as usize, proof, store)?;
                log!(info, "Receiving image v{} ({} bytes)", version, size);
                self.reception = Reception::Receiving(transfer);
                Ok(Outcome::Continue)
            }
            Command::Data { sequence, chunk } => self.data(sequence, chunk, store, verifier),
            Command::Abort => {
                log!(warn, "Transfer aborted by the sender");
                self.reception = Reception::AwaitingStart;
                Ok(Outcome::Aborted)
            }
        }
    }

    fn start<S: ImageStore>(
        &self,
        version: u32,
        size: usize,
        proof: &[u8],
        store: &mut S,
    ) -> Result<Transfer, ErrorCode> {
        if size == 0 || proof.is_empty() || version == FirmwareDescriptor::ABSENT_VERSION {
            return Err(ErrorCode::Malformed);
        }
        if self.installed.valid && version <= self.installed.version {
            log!(warn, "Refusing image v{}, v{} is installed", version, self.installed.version);
            return Err(ErrorCode::Downgrade);
        }
        if size > store.capacity() {
            return Err(ErrorCode::ImageTooBig);
        }
        store.begin(version, size)?;

        let mut transfer = Transfer {
            size,
            written: 0,
            next_sequence: 0,
            proof: [0u8; MAX_PROOF_SIZE],
            proof_length: proof.len(),
        };
        transfer.proof[..proof.len()].copy_from_slice(proof);
        Ok(transfer)
    }

    fn data<S: ImageStore, V: Verifier>(
        &mut self,
        sequence: u16,
        chunk: &[u8],
        store: &mut S,
        verifier: &V,
    ) -> Result<Outcome, ErrorCode> {
        let transfer = match &mut self.reception {
            Reception::Receiving(transfer) => transfer,
            Reception::AwaitingStart => return Err(ErrorCode::NotReceiving),
        };

        if sequence != transfer.next_sequence {
            // The sender missed our acknowledgement and repeated itself.
            return match transfer.previous_sequence() {
                Some(previous) if previous == sequence => Ok(Outcome::Continue),
                _ => Err(ErrorCode::Sequence),
            };
        }
        if transfer.written + chunk.len() > transfer.size {
            return Err(ErrorCode::Overflow);
        }

        store.write(transfer.written, chunk)?;
        transfer.written += chunk.len();
        transfer.next_sequence = transfer.next_sequence.wrapping_add(1);
        if transfer.written < transfer.size {
            return Ok(Outcome::Continue);
        }

        let transfer = *transfer;
        self.reception = Reception::AwaitingStart;
        if store.authenticate_candidate(verifier, transfer.size, transfer.proof()) {
            log!(info, "Image received and authenticated");
            Ok(Outcome::Completed)
        } else {
            log!(error, "Received image failed authentication");
            if let Err(error) = store.update_headers(false) {
                log!(error, "Failed to invalidate rejected image: {}", error.description());
            }
            Err(ErrorCode::Authenticity)
        }
    }
}
