//! Raw BSC (Broadcom Serial Controller) I²C master driver.

use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use log::trace;
use memmap2::{MmapOptions, MmapRaw};
use crate::bus::{ChannelId, Direction, I2cMaster, MasterConfig, StatusFlags};
use crate::{I2cError, I2cResult};

/// Raw BSC I²C master driver.
///
/// Drives one of the BCM283x BSC controllers directly through its registers, mapped from
/// `/dev/mem`. The pins must already be switched to their I²C alternate function.
///
/// # Registers
///
/// Every controller has eight 32-bit registers: `C` (control, `0x00`), `S` (status, `0x04`),
/// `DLEN` (data length, `0x08`), `A` (slave address, `0x0C`), `FIFO` (`0x10`), `DIV` (clock divider,
/// `0x14`), `DEL` (data delay, `0x18`) and `CLKT` (clock stretch timeout, `0x1C`).
///
/// # Transfers
///
/// The controller sends start, address and stop by itself once `C.ST` is set, for exactly `DLEN`
/// bytes. [I2cMaster::start] therefore only stages the address and direction, the blocking
/// transfers set the length and kick off the transfer, and [I2cMaster::stop] acknowledges the
/// finished transfer. Errors are reported through `S.ERR` (no acknowledge) and `S.CLKT`.
pub struct RawI2cMaster {
    mmap: MmapRaw,
    channel: ChannelId,
    staged: Option<Direction>,
}

impl RawI2cMaster {
    /// The base address of BSC0 in the BCM2837.
    pub const BSC0_BASE: u32 = 0x3F205000;
    /// The base address of BSC1 in the BCM2837.
    pub const BSC1_BASE: u32 = 0x3F804000;

    const REG_C: usize = 0x00 / 4;
    const REG_S: usize = 0x04 / 4;
    const REG_DLEN: usize = 0x08 / 4;
    const REG_A: usize = 0x0C / 4;
    const REG_FIFO: usize = 0x10 / 4;
    const REG_DIV: usize = 0x14 / 4;
    const REG_CLKT: usize = 0x1C / 4;

    const C_I2CEN: u32 = 1 << 15;
    const C_ST: u32 = 1 << 7;
    const C_CLEAR: u32 = 0b11 << 4;
    const C_READ: u32 = 1 << 0;

    const S_CLKT: u32 = 1 << 9;
    const S_ERR: u32 = 1 << 8;
    const S_RXD: u32 = 1 << 5;
    const S_TXD: u32 = 1 << 4;
    const S_DONE: u32 = 1 << 1;
    const S_TA: u32 = 1 << 0;

    /// Default clock stretch timeout, in SCL cycles.
    const DEFAULT_CLKT: u32 = 0x40;

    /// Maps the registers of the BSC controller behind `channel`.
    ///
    /// Fails with [I2cError::InvalidArgument] for channels other than [ChannelId::I2C0] and
    /// [ChannelId::I2C1].
    pub fn new(channel: ChannelId) -> I2cResult<Self> {
        let base = match channel {
            ChannelId::I2C0 => Self::BSC0_BASE,
            ChannelId::I2C1 => Self::BSC1_BASE,
            _ => return Err(I2cError::InvalidArgument),
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/mem")?;

        let mmap = MmapOptions::new()
            .offset(base as u64)
            .len(0x20)
            .map_raw(&file)?;

        Ok(RawI2cMaster {
            mmap,
            channel,
            staged: None,
        })
    }

    /// Computes the `DIV` register value for `baud_rate_hz` from `src_clock_hz`.
    ///
    /// The controller ignores the lowest bit, so odd divisors are rounded down. Fails with
    /// [I2cError::InvalidArgument] if the divisor does not fit into 16 bits or is below 2.
    pub fn divisor(src_clock_hz: u32, baud_rate_hz: u32) -> I2cResult<u32> {
        if baud_rate_hz == 0 {
            return Err(I2cError::InvalidArgument);
        }

        let divisor = (src_clock_hz / baud_rate_hz) & !1;
        if !(2..=0xFFFE).contains(&divisor) {
            return Err(I2cError::InvalidArgument);
        }

        Ok(divisor)
    }

    fn read_reg(&self, index: usize) -> u32 {
        let mmap = self.mmap.as_ptr() as *const u32;
        unsafe { mmap.add(index).read_volatile() }
    }

    fn write_reg(&self, index: usize, value: u32) {
        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        unsafe { mmap.add(index).write_volatile(value) }
    }

    /// Clears the sticky status bits.
    fn clear_status(&self) {
        self.write_reg(Self::REG_S, Self::S_CLKT | Self::S_ERR | Self::S_DONE);
    }

    fn expect_staged(&self, direction: Direction) -> I2cResult<()> {
        match self.staged {
            Some(staged) if staged == direction => Ok(()),
            _ => Err(I2cError::InvalidArgument),
        }
    }

    fn begin(&self, len: usize, read: bool) -> I2cResult<()> {
        if len == 0 || len > 0xFFFF {
            return Err(I2cError::InvalidArgument);
        }
        self.write_reg(Self::REG_DLEN, len as u32);
        let mut control = Self::C_I2CEN | Self::C_ST;
        if read {
            control |= Self::C_READ;
        }
        self.write_reg(Self::REG_C, control);
        Ok(())
    }

    /// Maps the error bits of `status` to an error, clearing them.
    fn check_errors(&self, status: u32) -> I2cResult<()> {
        if status & Self::S_ERR != 0 {
            self.clear_status();
            return Err(I2cError::Nak);
        }
        if status & Self::S_CLKT != 0 {
            self.clear_status();
            return Err(I2cError::ClockStretchTimeout);
        }
        Ok(())
    }
}

impl Debug for RawI2cMaster {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawI2cMaster({})", self.channel)
    }
}

impl I2cMaster for RawI2cMaster {
    fn channel(&self) -> ChannelId {
        self.channel
    }

    fn master_init(&mut self, config: &MasterConfig, src_clock_hz: u32) -> I2cResult<()> {
        if !config.enable_master {
            self.write_reg(Self::REG_C, 0);
            return Ok(());
        }

        let divisor = Self::divisor(src_clock_hz, config.baud_rate_hz)?;
        trace!("{}: BSC divisor {} for {} Hz", self.channel, divisor, config.baud_rate_hz);

        self.write_reg(Self::REG_C, 0);
        self.write_reg(Self::REG_DIV, divisor);
        self.write_reg(
            Self::REG_CLKT,
            if config.enable_timeout { Self::DEFAULT_CLKT } else { 0 },
        );
        self.clear_status();
        self.write_reg(Self::REG_C, Self::C_I2CEN | Self::C_CLEAR);
        Ok(())
    }

    fn start(&mut self, address: u8, direction: Direction) -> I2cResult<()> {
        if address > 0x7F {
            return Err(I2cError::InvalidArgument);
        }

        self.write_reg(Self::REG_A, address as u32);
        self.write_reg(Self::REG_C, Self::C_I2CEN | Self::C_CLEAR);
        self.clear_status();
        self.staged = Some(direction);
        Ok(())
    }

    fn status_flags(&self) -> StatusFlags {
        let status = self.read_reg(Self::REG_S);
        StatusFlags {
            pending: self.staged.is_some() && status & Self::S_TA == 0,
            nak: status & Self::S_ERR != 0,
            clock_stretch_timeout: status & Self::S_CLKT != 0,
        }
    }

    fn write_blocking(&mut self, data: &[u8]) -> I2cResult<()> {
        self.expect_staged(Direction::Write)?;
        self.begin(data.len(), false)?;

        let mut bytes = data.iter();
        loop {
            let status = self.read_reg(Self::REG_S);
            self.check_errors(status)?;
            if status & Self::S_DONE != 0 {
                break;
            }
            if status & Self::S_TXD != 0 {
                if let Some(&byte) = bytes.next() {
                    self.write_reg(Self::REG_FIFO, byte as u32);
                }
            }
        }

        if bytes.next().is_some() {
            return Err(I2cError::Other("transfer finished with bytes left in the buffer".to_string()));
        }
        Ok(())
    }

    fn read_blocking(&mut self, buf: &mut [u8]) -> I2cResult<()> {
        self.expect_staged(Direction::Read)?;
        self.begin(buf.len(), true)?;

        let mut received = 0;
        loop {
            let status = self.read_reg(Self::REG_S);
            self.check_errors(status)?;
            if status & Self::S_RXD != 0 && received < buf.len() {
                buf[received] = self.read_reg(Self::REG_FIFO) as u8;
                received += 1;
                continue;
            }
            if status & Self::S_DONE != 0 {
                break;
            }
        }

        while received < buf.len() && self.read_reg(Self::REG_S) & Self::S_RXD != 0 {
            buf[received] = self.read_reg(Self::REG_FIFO) as u8;
            received += 1;
        }

        if received < buf.len() {
            return Err(I2cError::Other(format!("received {} of {} bytes", received, buf.len())));
        }
        Ok(())
    }

    fn stop(&mut self) -> I2cResult<()> {
        self.write_reg(Self::REG_S, Self::S_DONE);
        self.staged = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisor_for_standard_mode() {
        assert_eq!(RawI2cMaster::divisor(250_000_000, 100_000), Ok(2500));
        assert_eq!(RawI2cMaster::divisor(12_000_000, 100_000), Ok(120));
    }

    #[test]
    fn odd_divisor_is_rounded_down() {
        assert_eq!(RawI2cMaster::divisor(12_300_000, 100_000), Ok(122));
    }

    #[test]
    fn divisor_out_of_range() {
        assert_eq!(RawI2cMaster::divisor(12_000_000, 0), Err(I2cError::InvalidArgument));
        assert_eq!(RawI2cMaster::divisor(100_000, 100_000), Err(I2cError::InvalidArgument));
        assert_eq!(RawI2cMaster::divisor(250_000_000, 1_000), Err(I2cError::InvalidArgument));
    }

    #[test]
    fn unknown_channel_is_rejected() {
        assert_eq!(RawI2cMaster::new(ChannelId(2)).err(), Some(I2cError::InvalidArgument));
    }
}
