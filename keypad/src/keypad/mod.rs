mod qwiic;
mod registry;

use std::fmt::Debug;
use crate::I2cResult;
pub use qwiic::*;
pub use registry::*;

/// A function invoked with the raw key code of every detected key press.
pub type ButtonCallback = Box<dyn FnMut(u8)>;

/// The `Keypad` trait defines the interface for polled keypads that report one key at a time.
pub trait Keypad: Debug {
    /// Reads the most recently pressed key, if any, without notifying listeners.
    fn read_key(&mut self) -> I2cResult<Option<u8>>;

    /// Registers a listener to be invoked on every key press, after the ones already registered.
    fn add_listener(&mut self, on_button_press: ButtonCallback);

    /// Invokes every registered listener with `key`, in registration order.
    fn dispatch(&mut self, key: u8);

    /// Reads the keypad once and, if a key was pressed, notifies every listener.
    fn poll(&mut self) -> I2cResult<()> {
        if let Some(key) = self.read_key()? {
            self.dispatch(key);
        }
        Ok(())
    }

    fn on_press(&mut self, on_button_press: impl FnMut(u8) + 'static)
    where
        Self: Sized,
    {
        self.add_listener(Box::new(on_button_press));
    }
}
