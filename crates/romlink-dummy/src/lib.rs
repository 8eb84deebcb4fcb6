//! romlink-dummy - In-memory remote memory device for testing
//!
//! This crate provides a [`Link`] implementation that plays the device side
//! of the protocol: it parses the frame at the start of every session,
//! stores loaded bytes in a memory array, serves save sessions from it and
//! tracks the reset register. Every session is logged so tests can check
//! exactly what went over the wire.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use romlink_core::error::{Error, Result};
use romlink_core::frame::{
    ControlFrame, FrameBytes, CONTROL_ADDRESS, LOAD_HEADER_LEN, SAVE_HEADER_LEN, SAVE_OPCODE,
};
use romlink_core::link::LinkInfo;
#[cfg(feature = "alloc")]
use romlink_core::link::{Link, SelectState};
use romlink_core::reset::ResetState;

/// Default emulated memory size
pub const DEFAULT_SIZE: usize = 4 * 1024 * 1024;

/// Registry entry for the dummy link
pub const LINK_INFO: LinkInfo = LinkInfo {
    name: "dummy",
    aliases: &["emulator"],
    description: "In-memory device emulator [size=<bytes>,fill=<byte>]",
};

/// Configuration for the dummy device
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Memory size in bytes
    pub size: usize,
    /// Value of never-written memory
    pub fill: u8,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            fill: 0x00,
        }
    }
}

impl DummyConfig {
    /// Parse `key=value` link options
    ///
    /// Recognised keys: `size` (decimal, `0x` hex, optional `K`/`M`
    /// suffix) and `fill`.
    pub fn from_options<'a, I>(options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = Self::default();
        for (key, value) in options {
            match key {
                "size" => config.size = parse_size(value).ok_or(Error::ConfigError)?,
                "fill" => {
                    config.fill = parse_size(value)
                        .and_then(|v| u8::try_from(v).ok())
                        .ok_or(Error::ConfigError)?
                }
                _ => {
                    log::error!("dummy: unknown option '{}'", key);
                    return Err(Error::ConfigError);
                }
            }
        }
        if config.size == 0 {
            return Err(Error::ConfigError);
        }
        Ok(config)
    }
}

fn parse_size(s: &str) -> Option<usize> {
    let s = s.trim();
    let (digits, scale) = match s.as_bytes().last()? {
        b'K' | b'k' => (&s[..s.len() - 1], 1024),
        b'M' | b'm' => (&s[..s.len() - 1], 1024 * 1024),
        _ => (s, 1),
    };
    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        usize::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<usize>().ok()?
    };
    value.checked_mul(scale)
}

/// What the device is doing with bytes inside the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Collecting frame bytes
    Header,
    /// Storing payload at `cursor`
    Loading { cursor: u32 },
    /// Emitting memory from `cursor`
    Saving { cursor: u32 },
    /// Waiting for the register value byte
    Register,
    /// Register written; further bytes are ignored
    Done,
    /// Frame could not be parsed; the rest of the session is ignored
    Rejected,
}

/// One select/deselect bracket as seen by the device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecord {
    /// Decoded frame, if a complete one arrived
    pub frame: Option<ControlFrame>,
    /// Raw frame bytes
    pub frame_bytes: FrameBytes,
    /// Payload bytes received after the frame
    pub payload_bytes: usize,
    /// Payload bytes served to the host
    pub bytes_served: usize,
    /// Number of `write` calls
    pub writes: usize,
    /// Number of `read` calls
    pub reads: usize,
    /// Sizes of each payload-carrying `write` call
    #[cfg(feature = "alloc")]
    pub write_sizes: Vec<usize>,
    /// Sizes of each `read` call
    #[cfg(feature = "alloc")]
    pub read_sizes: Vec<usize>,
}

/// Fault to inject on a later transport call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// Fail the n-th `write` call (0-based, counted over the device's life)
    pub on_write: usize,
    /// Error to return
    pub error: Error,
}

/// Emulated remote memory device
///
/// Memory outside `0..size` is not backed: loads there are dropped and
/// saves read the fill value.
#[cfg(feature = "alloc")]
pub struct DummyDevice {
    config: DummyConfig,
    memory: Vec<u8>,
    select: SelectState,
    phase: Phase,
    sessions: Vec<SessionRecord>,
    register_writes: Vec<u8>,
    reset: ResetState,
    selects: usize,
    deselects: usize,
    total_writes: usize,
    dropped: usize,
    fault: Option<Fault>,
}

#[cfg(feature = "alloc")]
impl DummyDevice {
    /// Create a device with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let memory = vec![config.fill; config.size];
        Self {
            config,
            memory,
            select: SelectState::Deselected,
            phase: Phase::Header,
            sessions: Vec::new(),
            register_writes: Vec::new(),
            reset: ResetState::Released,
            selects: 0,
            deselects: 0,
            total_writes: 0,
            dropped: 0,
            fault: None,
        }
    }

    /// Create a device with the default 4 MiB memory
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a device whose memory starts with `data` at `address`
    pub fn with_data(config: DummyConfig, address: u32, data: &[u8]) -> Self {
        let mut device = Self::new(config);
        let start = (address as usize).min(device.memory.len());
        let len = data.len().min(device.memory.len() - start);
        device.memory[start..start + len].copy_from_slice(&data[..len]);
        device
    }

    /// Device memory
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// `len` bytes of memory from `address`, clipped to the backed range
    pub fn memory_at(&self, address: u32, len: usize) -> &[u8] {
        let start = (address as usize).min(self.memory.len());
        let end = start.saturating_add(len).min(self.memory.len());
        &self.memory[start..end]
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Closed and in-progress sessions, oldest first
    pub fn sessions(&self) -> &[SessionRecord] {
        &self.sessions
    }

    /// Values written to the control register, oldest first
    pub fn register_writes(&self) -> &[u8] {
        &self.register_writes
    }

    /// Current level of the emulated reset line
    pub fn reset_state(&self) -> ResetState {
        self.reset
    }

    /// Number of select edges
    pub fn selects(&self) -> usize {
        self.selects
    }

    /// Number of deselect edges
    pub fn deselects(&self) -> usize {
        self.deselects
    }

    /// Payload bytes that fell outside backed memory
    pub fn dropped_bytes(&self) -> usize {
        self.dropped
    }

    /// Whether the device is currently selected
    pub fn is_selected(&self) -> bool {
        self.select == SelectState::Selected
    }

    /// Arrange for a later `write` call to fail
    pub fn inject_fault(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    /// Forget the session log and counters, keeping memory
    pub fn clear_log(&mut self) {
        self.sessions.clear();
        self.register_writes.clear();
        self.selects = 0;
        self.deselects = 0;
    }

    fn current(&mut self) -> Result<&mut SessionRecord> {
        if self.select != SelectState::Selected {
            log::error!("dummy: transfer while deselected");
            return Err(Error::TransferFailed);
        }
        self.sessions.last_mut().ok_or(Error::TransferFailed)
    }

    fn store(&mut self, cursor: u32, data: &[u8]) -> u32 {
        let start = cursor as usize;
        let backed = self.memory.len().saturating_sub(start).min(data.len());
        if backed > 0 {
            self.memory[start..start + backed].copy_from_slice(&data[..backed]);
        }
        if backed < data.len() {
            log::warn!(
                "dummy: {} bytes beyond memory end at 0x{:08X}",
                data.len() - backed,
                cursor
            );
            self.dropped += data.len() - backed;
        }
        cursor.wrapping_add(data.len() as u32)
    }

    fn write_register(&mut self, value: u8) {
        self.register_writes.push(value);
        if value == ResetState::Asserted.register_value() {
            self.reset = ResetState::Asserted;
        } else if value == ResetState::Released.register_value() {
            self.reset = ResetState::Released;
        } else {
            log::warn!("dummy: unknown control register value 0x{:02X}", value);
        }
        log::debug!("dummy: control register <- 0x{:02X}", value);
    }

    /// Feed header bytes, returning how many of `data` were consumed
    fn take_header(&mut self, data: &[u8]) -> Result<usize> {
        let record = self.current()?;
        let mut used = 0;
        while used < data.len() {
            let needed = match record.frame_bytes.first() {
                Some(&SAVE_OPCODE) => SAVE_HEADER_LEN,
                _ => LOAD_HEADER_LEN,
            };
            if record.frame_bytes.len() >= needed {
                break;
            }
            // Never exceeds MAX_FRAME_LEN
            let _ = record.frame_bytes.push(data[used]);
            used += 1;
        }

        let bytes = record.frame_bytes.clone();
        let complete = match bytes.first() {
            Some(&SAVE_OPCODE) => bytes.len() == SAVE_HEADER_LEN,
            Some(_) => bytes.len() == LOAD_HEADER_LEN,
            None => false,
        };
        if !complete {
            return Ok(used);
        }

        match ControlFrame::decode(&bytes) {
            Ok((frame, _)) => {
                log::debug!("dummy: frame {:?}", frame);
                self.phase = match frame {
                    ControlFrame::Load { address } if address == CONTROL_ADDRESS => Phase::Register,
                    ControlFrame::Load { address } => Phase::Loading { cursor: address },
                    ControlFrame::Save { address } => Phase::Saving { cursor: address },
                    ControlFrame::RegisterWrite { value } => {
                        self.write_register(value);
                        Phase::Done
                    }
                };
                let frame = match self.phase {
                    Phase::Register => None,
                    _ => Some(frame),
                };
                self.current()?.frame = frame;
            }
            Err(e) => {
                log::warn!("dummy: rejected frame {:02X?}", bytes.as_slice());
                self.phase = Phase::Rejected;
                return Err(e);
            }
        }
        Ok(used)
    }
}

#[cfg(feature = "alloc")]
impl Link for DummyDevice {
    fn select(&mut self) -> Result<()> {
        if self.select == SelectState::Selected {
            log::error!("dummy: select while a session is open");
            return Err(Error::SessionActive);
        }
        self.select = SelectState::Selected;
        self.selects += 1;
        self.phase = Phase::Header;
        self.sessions.push(SessionRecord::default());
        log::trace!("dummy: selected (session {})", self.sessions.len());
        Ok(())
    }

    fn deselect(&mut self) -> Result<()> {
        if self.select == SelectState::Deselected {
            log::warn!("dummy: deselect without a session");
        }
        self.select = SelectState::Deselected;
        self.deselects += 1;
        self.phase = Phase::Header;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let call = self.total_writes;
        self.total_writes += 1;
        if let Some(fault) = self.fault {
            if fault.on_write == call {
                self.fault = None;
                log::debug!("dummy: injected {:?} on write {}", fault.error, call);
                return Err(fault.error);
            }
        }

        self.current()?.writes += 1;

        let mut rest = data;
        if self.phase == Phase::Header {
            let used = self.take_header(rest)?;
            rest = &rest[used..];
        }
        if rest.is_empty() {
            return Ok(());
        }

        match self.phase {
            Phase::Loading { cursor } => {
                let next = self.store(cursor, rest);
                self.phase = Phase::Loading { cursor: next };
                let record = self.current()?;
                record.payload_bytes += rest.len();
                record.write_sizes.push(rest.len());
            }
            Phase::Register => {
                self.write_register(rest[0]);
                let record = self.current()?;
                record.frame = Some(ControlFrame::register(rest[0]));
                record.payload_bytes += rest.len();
                self.phase = Phase::Done;
            }
            Phase::Header => {}
            Phase::Saving { .. } | Phase::Done | Phase::Rejected => {
                log::debug!("dummy: ignoring {} stray bytes", rest.len());
            }
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        let served = match self.phase {
            Phase::Saving { cursor } => {
                let start = cursor as usize;
                for (i, byte) in buf.iter_mut().enumerate() {
                    *byte = start
                        .checked_add(i)
                        .and_then(|at| self.memory.get(at))
                        .copied()
                        .unwrap_or(self.config.fill);
                }
                self.phase = Phase::Saving {
                    cursor: cursor.wrapping_add(buf.len() as u32),
                };
                buf.len()
            }
            _ => {
                buf.fill(0xFF);
                0
            }
        };

        let record = self.current()?;
        record.reads += 1;
        record.read_sizes.push(buf.len());
        record.bytes_served += served;
        Ok(())
    }
}
