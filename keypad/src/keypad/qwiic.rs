use std::fmt::{Debug, Formatter};
use std::thread::sleep;
use log::debug;
use crate::bus::{read_transaction, write_transaction, ChannelId, I2cMaster};
use crate::config::KeypadConfig;
use crate::keypad::{ButtonCallback, Keypad};
use crate::{I2cError, I2cResult};

/// Registers of the keypad firmware used by the driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Register {
    /// The oldest unread key press, `0` when there is none.
    Button = 0x03,
    /// Writing `1` loads the next key press into [Register::Button].
    UpdateFifo = 0x06,
}

/// Driver for the SparkFun Qwiic Keypad.
///
/// Each read latches the keypad's next key press with [Register::UpdateFifo], selects
/// [Register::Button] and reads it back, then waits [KeypadConfig::settle_time] so the keypad
/// is ready before it is addressed again. The whole sequence blocks the calling thread.
///
/// Instances are created through a [KeypadRegistry](crate::keypad::KeypadRegistry), which keeps
/// a single driver per bus.
pub struct QwiicKeypad<B: I2cMaster> {
    bus: B,
    listeners: Vec<ButtonCallback>,
    config: KeypadConfig,
}

impl<B: I2cMaster> QwiicKeypad<B> {
    /// 7-bit bus address of the keypad.
    pub const ADDRESS: u8 = 0x4B;
    /// Value the keypad returns when it has no valid key state.
    pub const ERROR_SENTINEL: u8 = 0xFF;

    /// Configures master mode on `bus` and wraps it.
    pub(crate) fn new(mut bus: B, config: KeypadConfig) -> I2cResult<Self> {
        bus.master_init(&config.master, config.source_clock_hz)?;
        debug!(
            "{}: keypad driver at {:#04x}, {} Hz bus",
            bus.channel(),
            Self::ADDRESS,
            config.master.baud_rate_hz,
        );
        Ok(QwiicKeypad {
            bus,
            listeners: Vec::new(),
            config,
        })
    }

    /// Gets the bus this keypad is connected to.
    pub fn channel(&self) -> ChannelId {
        self.bus.channel()
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    #[cfg(test)]
    pub(crate) fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn write(&mut self, data: &[u8]) -> I2cResult<()> {
        write_transaction(&mut self.bus, Self::ADDRESS, data, self.config.ready_timeout)
    }

    fn read_button(&mut self) -> I2cResult<u8> {
        let mut rx = [0u8; 1];
        read_transaction(&mut self.bus, Self::ADDRESS, &mut rx, self.config.ready_timeout)?;
        Ok(rx[0])
    }
}

impl<B: I2cMaster> Debug for QwiicKeypad<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "QwiicKeypad({:?}, {} listeners)", self.bus, self.listeners.len())
    }
}

impl<B: I2cMaster> Keypad for QwiicKeypad<B> {
    fn read_key(&mut self) -> I2cResult<Option<u8>> {
        let button = self
            .write(&[Register::UpdateFifo as u8, 0x01])
            .and_then(|_| self.write(&[Register::Button as u8]))
            .and_then(|_| self.read_button())
            .inspect_err(|err| debug!("{}: keypad poll aborted: {}", self.bus.channel(), err))?;

        sleep(self.config.settle_time);

        match button {
            sentinel if sentinel == Self::ERROR_SENTINEL => {
                debug!("{}: keypad reported an invalid state", self.bus.channel());
                Err(I2cError::UnexpectedState)
            }
            0 => Ok(None),
            key => Ok(Some(key)),
        }
    }

    fn add_listener(&mut self, on_button_press: ButtonCallback) {
        self.listeners.push(on_button_press);
    }

    fn dispatch(&mut self, key: u8) {
        for listener in self.listeners.iter_mut() {
            listener(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;
    use crate::bus::Direction;
    use crate::sim::{SimI2cMaster, SimTransfer};

    type Calls = Rc<RefCell<Vec<(usize, u8)>>>;

    fn keypad() -> QwiicKeypad<SimI2cMaster> {
        let config = KeypadConfig::default().with_settle_time(Duration::ZERO);
        QwiicKeypad::new(SimI2cMaster::new(ChannelId::I2C0), config).unwrap()
    }

    fn add_recording_listeners(keypad: &mut QwiicKeypad<SimI2cMaster>, ids: &[usize], calls: &Calls) {
        for &id in ids {
            let calls = calls.clone();
            keypad.on_press(move |key| calls.borrow_mut().push((id, key)));
        }
    }

    #[test]
    fn construction_configures_master_mode() {
        let keypad = keypad();
        assert_eq!(
            keypad.bus().transfers(),
            &[SimTransfer::Init { baud_rate_hz: 100_000, src_clock_hz: 12_000_000 }]
        );
    }

    #[test]
    fn construction_propagates_init_error() {
        let mut bus = SimI2cMaster::new(ChannelId::I2C0);
        bus.set_init_result(Err(I2cError::NotSupported));
        let result = QwiicKeypad::new(bus, KeypadConfig::default());
        assert_eq!(result.err(), Some(I2cError::NotSupported));
    }

    #[test]
    fn poll_sends_exact_register_sequence() {
        let mut keypad = keypad();
        keypad.bus_mut().clear_transfers();
        keypad.poll().unwrap();

        assert_eq!(
            keypad.bus().transfers(),
            &[
                SimTransfer::Start(0x4B, Direction::Write),
                SimTransfer::Write(vec![0x06, 0x01]),
                SimTransfer::Stop,
                SimTransfer::Start(0x4B, Direction::Write),
                SimTransfer::Write(vec![0x03]),
                SimTransfer::Stop,
                SimTransfer::Start(0x4B, Direction::Read),
                SimTransfer::Read(1),
                SimTransfer::Stop,
            ]
        );
    }

    #[test]
    fn first_write_failure_is_returned_unchanged() {
        let mut keypad = keypad();
        let calls = Calls::default();
        add_recording_listeners(&mut keypad, &[0], &calls);
        keypad.bus_mut().clear_transfers();
        keypad.bus_mut().script_write(Err(I2cError::Nak)).script_read(Ok(0x05));

        assert_eq!(keypad.poll(), Err(I2cError::Nak));
        assert!(calls.borrow().is_empty());
        assert_eq!(
            keypad.bus().transfers(),
            &[
                SimTransfer::Start(0x4B, Direction::Write),
                SimTransfer::Write(vec![0x06, 0x01]),
            ]
        );
    }

    #[test]
    fn second_write_failure_aborts_before_read() {
        let mut keypad = keypad();
        let calls = Calls::default();
        add_recording_listeners(&mut keypad, &[0], &calls);
        keypad.bus_mut().clear_transfers();
        keypad
            .bus_mut()
            .script_write(Ok(()))
            .script_write(Err(I2cError::ArbitrationLost))
            .script_read(Ok(0x05));

        assert_eq!(keypad.poll(), Err(I2cError::ArbitrationLost));
        assert!(calls.borrow().is_empty());
        assert!(!keypad.bus().transfers().contains(&SimTransfer::Read(1)));
    }

    #[test]
    fn read_failure_is_returned_unchanged() {
        let mut keypad = keypad();
        let calls = Calls::default();
        add_recording_listeners(&mut keypad, &[0], &calls);
        keypad.bus_mut().script_read(Err(I2cError::Other("bus fault".to_string())));

        assert_eq!(keypad.poll(), Err(I2cError::Other("bus fault".to_string())));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn zero_means_no_key() {
        let mut keypad = keypad();
        let calls = Calls::default();
        add_recording_listeners(&mut keypad, &[0, 1], &calls);
        keypad.bus_mut().script_read(Ok(0x00));

        assert_eq!(keypad.poll(), Ok(()));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn sentinel_is_unexpected_state() {
        let mut keypad = keypad();
        let calls = Calls::default();
        add_recording_listeners(&mut keypad, &[0, 1], &calls);
        keypad.bus_mut().script_read(Ok(0xFF));

        assert_eq!(keypad.poll(), Err(I2cError::UnexpectedState));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn key_press_reaches_every_listener_in_order() {
        let mut keypad = keypad();
        let calls = Calls::default();
        add_recording_listeners(&mut keypad, &[0, 1, 2], &calls);
        keypad.bus_mut().script_read(Ok(0x05));

        assert_eq!(keypad.poll(), Ok(()));
        assert_eq!(*calls.borrow(), vec![(0, 0x05), (1, 0x05), (2, 0x05)]);
    }

    #[test]
    fn late_listeners_only_see_later_presses() {
        let mut keypad = keypad();
        let calls = Calls::default();
        add_recording_listeners(&mut keypad, &[0], &calls);
        keypad.bus_mut().script_read(Ok(0x31)).script_read(Ok(0x32));

        keypad.poll().unwrap();
        add_recording_listeners(&mut keypad, &[1], &calls);
        keypad.poll().unwrap();

        assert_eq!(*calls.borrow(), vec![(0, 0x31), (0, 0x32), (1, 0x32)]);
    }

    #[test]
    fn duplicate_listeners_are_all_kept() {
        let mut keypad = keypad();
        let calls = Calls::default();
        add_recording_listeners(&mut keypad, &[7, 7, 7, 7], &calls);
        keypad.bus_mut().script_read(Ok(0x23));

        keypad.poll().unwrap();

        assert_eq!(keypad.listener_count(), 4);
        assert_eq!(calls.borrow().len(), 4);
        assert!(calls.borrow().iter().all(|&call| call == (7, 0x23)));
    }

    #[test]
    fn read_key_does_not_dispatch() {
        let mut keypad = keypad();
        let calls = Calls::default();
        add_recording_listeners(&mut keypad, &[0], &calls);
        keypad.bus_mut().script_read(Ok(0x2A));

        assert_eq!(keypad.read_key(), Ok(Some(0x2A)));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn unresponsive_bus_times_out_when_bounded() {
        let config = KeypadConfig::default()
            .with_settle_time(Duration::ZERO)
            .with_ready_timeout(Some(Duration::from_millis(2)));
        let mut keypad = QwiicKeypad::new(SimI2cMaster::new(ChannelId::I2C1), config).unwrap();
        keypad.bus_mut().set_never_ready(true);

        assert_eq!(keypad.poll(), Err(I2cError::Timeout));
    }
}
