use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use log::trace;
use crate::bus::{ChannelId, I2cMaster};
use crate::config::KeypadConfig;
use crate::keypad::QwiicKeypad;
use crate::I2cResult;

/// Keeps at most one [QwiicKeypad] per I²C channel.
///
/// The registry knows a fixed set of channels from construction on. Drivers are created the first
/// time their channel is requested and live as long as the registry.
pub struct KeypadRegistry<B: I2cMaster> {
    instances: BTreeMap<ChannelId, Option<Box<QwiicKeypad<B>>>>,
    config: KeypadConfig,
}

impl<B: I2cMaster> KeypadRegistry<B> {
    /// Creates a registry for `channels` using [KeypadConfig::default] for new drivers.
    pub fn new(channels: impl IntoIterator<Item = ChannelId>) -> Self {
        Self::with_config(channels, KeypadConfig::default())
    }

    /// Creates a registry for `channels` using `config` for new drivers.
    pub fn with_config(channels: impl IntoIterator<Item = ChannelId>, config: KeypadConfig) -> Self {
        KeypadRegistry {
            instances: channels.into_iter().map(|channel| (channel, None)).collect(),
            config,
        }
    }

    /// Gets the driver for the channel `bus` is connected to, creating it from `bus` if there is
    /// none yet. When a driver already exists, `bus` is dropped.
    ///
    /// The bus must already be initialized by the platform. Creating a driver configures master mode
    /// on it; if that fails, the error is returned and nothing is recorded.
    ///
    /// # Panics
    /// If the channel of `bus` is not one the registry was created with.
    pub fn get_or_create(&mut self, bus: B) -> I2cResult<&mut QwiicKeypad<B>> {
        let channel = bus.channel();
        let Some(slot) = self.instances.get_mut(&channel) else {
            panic!("{} is not a known I2C channel", channel);
        };

        let keypad = match slot {
            Some(keypad) => {
                trace!("{}: reusing keypad driver", channel);
                &mut **keypad
            }
            None => &mut **slot.insert(Box::new(QwiicKeypad::new(bus, self.config)?)),
        };
        Ok(keypad)
    }

    /// Gets the driver for `channel`, if it was created already.
    pub fn get(&self, channel: ChannelId) -> Option<&QwiicKeypad<B>> {
        self.instances.get(&channel)?.as_deref()
    }

    /// Gets the channels this registry accepts.
    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.instances.keys().copied()
    }
}

impl<B: I2cMaster> Debug for KeypadRegistry<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.instances.iter())
            .finish()
    }
}
