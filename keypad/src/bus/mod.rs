//! I²C master interface.
//!
//! The [I2cMaster] trait mirrors the blocking primitives a vendor I²C master driver exposes: an
//! explicit start condition, status polling, blocking byte transfers and a stop condition. The
//! [write_transaction] and [read_transaction] helpers combine them into the fixed three-phase
//! sequence device drivers in this crate use.
//!
//! For the memory-mapped implementation, see [raw::RawI2cMaster].

pub mod raw;

use std::fmt::{Debug, Display, Formatter};
use std::hint::spin_loop;
use std::time::{Duration, Instant};
use log::trace;
use crate::{I2cError, I2cResult};

/// Identifies a physical I²C bus of the host controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ChannelId(pub u8);

impl ChannelId {
    /// The first I²C bus.
    pub const I2C0: ChannelId = ChannelId(0);
    /// The second I²C bus.
    pub const I2C1: ChannelId = ChannelId(1);

    /// All channels present on the reference board.
    pub const ALL: [ChannelId; 2] = [ChannelId::I2C0, ChannelId::I2C1];
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "I2C{}", self.0)
    }
}

/// Direction bit sent with the address after a start condition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Write,
    Read,
}

/// Snapshot of the master status register.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct StatusFlags {
    /// The master has a transfer staged and is ready for data.
    pub pending: bool,
    /// The last transfer was not acknowledged.
    pub nak: bool,
    /// The slave stretched the clock for too long.
    pub clock_stretch_timeout: bool,
}

/// Master mode settings applied by [I2cMaster::master_init].
///
/// The defaults match the usual vendor defaults: master enabled, standard mode (100 kHz), no
/// clock stretch timeout.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MasterConfig {
    pub enable_master: bool,
    pub baud_rate_hz: u32,
    pub enable_timeout: bool,
}

impl Default for MasterConfig {
    fn default() -> Self {
        MasterConfig {
            enable_master: true,
            baud_rate_hz: 100_000,
            enable_timeout: false,
        }
    }
}

/// Blocking I²C master.
///
/// Every fallible call reports errors from the shared [I2cError] space, which device drivers
/// pass through unchanged.
pub trait I2cMaster: Debug {
    /// Gets the bus this master drives.
    fn channel(&self) -> ChannelId;

    /// Configures master mode on the bus.
    ///
    /// `src_clock_hz` is the frequency of the clock feeding the controller, used to derive the
    /// divider for [MasterConfig::baud_rate_hz].
    fn master_init(&mut self, config: &MasterConfig, src_clock_hz: u32) -> I2cResult<()>;

    /// Issues a start condition followed by the 7-bit `address` and the direction bit.
    fn start(&mut self, address: u8, direction: Direction) -> I2cResult<()>;

    /// Reads the current status flags.
    fn status_flags(&self) -> StatusFlags;

    /// Writes `data` to the addressed device, blocking until every byte is sent.
    fn write_blocking(&mut self, data: &[u8]) -> I2cResult<()>;

    /// Reads `buf.len()` bytes from the addressed device, blocking until all arrive.
    fn read_blocking(&mut self, buf: &mut [u8]) -> I2cResult<()>;

    /// Issues a stop condition.
    fn stop(&mut self) -> I2cResult<()>;
}

/// Busy-waits until the master reports [StatusFlags::pending].
///
/// Fails early if the master flags a missing acknowledge or a clock stretch timeout. With
/// `timeout` set to `None` this never gives up otherwise, so an unresponsive bus hangs the caller.
pub fn wait_ready<B: I2cMaster + ?Sized>(bus: &B, timeout: Option<Duration>) -> I2cResult<()> {
    let started = Instant::now();
    loop {
        let status = bus.status_flags();
        if status.nak {
            return Err(I2cError::Nak);
        }
        if status.clock_stretch_timeout {
            return Err(I2cError::ClockStretchTimeout);
        }
        if status.pending {
            return Ok(());
        }
        if let Some(timeout) = timeout {
            if started.elapsed() >= timeout {
                trace!("{}: bus not ready after {:?}", bus.channel(), timeout);
                return Err(I2cError::Timeout);
            }
        }
        spin_loop();
    }
}

/// Start, wait for ready, write `data`, stop.
///
/// A failed transfer returns immediately, without the stop condition.
pub fn write_transaction<B: I2cMaster + ?Sized>(
    bus: &mut B,
    address: u8,
    data: &[u8],
    ready_timeout: Option<Duration>,
) -> I2cResult<()> {
    trace!("{}: write {:02X?} to {:#04x}", bus.channel(), data, address);
    bus.start(address, Direction::Write)?;
    wait_ready(bus, ready_timeout)?;
    bus.write_blocking(data)?;
    bus.stop()
}

/// Start, wait for ready, read into `buf`, stop.
///
/// A failed transfer returns immediately, without the stop condition.
pub fn read_transaction<B: I2cMaster + ?Sized>(
    bus: &mut B,
    address: u8,
    buf: &mut [u8],
    ready_timeout: Option<Duration>,
) -> I2cResult<()> {
    bus.start(address, Direction::Read)?;
    wait_ready(bus, ready_timeout)?;
    bus.read_blocking(buf)?;
    bus.stop()?;
    trace!("{}: read {:02X?} from {:#04x}", bus.channel(), buf, address);
    Ok(())
}
