//! Scripted in-memory I²C master.
//!
//! [SimI2cMaster] answers transfers from queues filled in advance and records every bus phase, so
//! device drivers can be exercised without hardware.

use std::collections::VecDeque;
use log::trace;
use crate::bus::{ChannelId, Direction, I2cMaster, MasterConfig, StatusFlags};
use crate::{I2cError, I2cResult};

/// One recorded bus phase.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SimTransfer {
    Init { baud_rate_hz: u32, src_clock_hz: u32 },
    Start(u8, Direction),
    Write(Vec<u8>),
    Read(usize),
    Stop,
}

#[derive(Debug)]
pub struct SimI2cMaster {
    channel: ChannelId,
    staged: Option<Direction>,
    never_ready: bool,
    nak: bool,
    clock_stretch_timeout: bool,
    init_result: I2cResult<()>,
    writes: VecDeque<I2cResult<()>>,
    reads: VecDeque<I2cResult<u8>>,
    transfers: Vec<SimTransfer>,
}

impl SimI2cMaster {
    /// Creates a bus for `channel` on which every write succeeds and every read returns `0`.
    pub fn new(channel: ChannelId) -> Self {
        SimI2cMaster {
            channel,
            staged: None,
            never_ready: false,
            nak: false,
            clock_stretch_timeout: false,
            init_result: Ok(()),
            writes: VecDeque::new(),
            reads: VecDeque::new(),
            transfers: Vec::new(),
        }
    }

    /// Queues the outcome of the next unscripted write.
    pub fn script_write(&mut self, result: I2cResult<()>) -> &mut Self {
        self.writes.push_back(result);
        self
    }

    /// Queues the outcome of the next unscripted read. `Ok` carries the byte to return.
    pub fn script_read(&mut self, result: I2cResult<u8>) -> &mut Self {
        self.reads.push_back(result);
        self
    }

    /// Sets the result of [I2cMaster::master_init].
    pub fn set_init_result(&mut self, result: I2cResult<()>) {
        self.init_result = result;
    }

    /// Makes the bus never report ready, like an unresponsive slave holding the lines.
    pub fn set_never_ready(&mut self, never_ready: bool) {
        self.never_ready = never_ready;
    }

    /// Sets the error bits reported by [I2cMaster::status_flags].
    pub fn set_error_flags(&mut self, nak: bool, clock_stretch_timeout: bool) {
        self.nak = nak;
        self.clock_stretch_timeout = clock_stretch_timeout;
    }

    /// Gets every bus phase recorded so far.
    pub fn transfers(&self) -> &[SimTransfer] {
        &self.transfers
    }

    /// Forgets recorded phases.
    pub fn clear_transfers(&mut self) {
        self.transfers.clear();
    }

    fn expect_staged(&self, direction: Direction) -> I2cResult<()> {
        match self.staged {
            Some(staged) if staged == direction => Ok(()),
            _ => Err(I2cError::Other(format!("no {:?} transfer started", direction))),
        }
    }
}

impl I2cMaster for SimI2cMaster {
    fn channel(&self) -> ChannelId {
        self.channel
    }

    fn master_init(&mut self, config: &MasterConfig, src_clock_hz: u32) -> I2cResult<()> {
        self.transfers.push(SimTransfer::Init {
            baud_rate_hz: config.baud_rate_hz,
            src_clock_hz,
        });
        self.init_result.clone()
    }

    fn start(&mut self, address: u8, direction: Direction) -> I2cResult<()> {
        if address > 0x7F {
            return Err(I2cError::InvalidArgument);
        }
        self.transfers.push(SimTransfer::Start(address, direction));
        self.staged = Some(direction);
        Ok(())
    }

    fn status_flags(&self) -> StatusFlags {
        StatusFlags {
            pending: self.staged.is_some() && !self.never_ready,
            nak: self.nak,
            clock_stretch_timeout: self.clock_stretch_timeout,
        }
    }

    fn write_blocking(&mut self, data: &[u8]) -> I2cResult<()> {
        self.expect_staged(Direction::Write)?;
        self.transfers.push(SimTransfer::Write(data.to_vec()));
        let result = self.writes.pop_front().unwrap_or(Ok(()));
        trace!("{}: simulated write {:02X?} -> {:?}", self.channel, data, result);
        result
    }

    fn read_blocking(&mut self, buf: &mut [u8]) -> I2cResult<()> {
        self.expect_staged(Direction::Read)?;
        self.transfers.push(SimTransfer::Read(buf.len()));
        for byte in buf.iter_mut() {
            *byte = self.reads.pop_front().unwrap_or(Ok(0))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> I2cResult<()> {
        self.transfers.push(SimTransfer::Stop);
        self.staged = None;
        Ok(())
    }
}
