use std::env::var;
use std::thread::sleep;
use std::time::Duration;
use dotenv::dotenv;
use log::{debug, info, warn};
use qwiic_keypad::bus::raw::RawI2cMaster;
use qwiic_keypad::bus::{ChannelId, I2cMaster};
use qwiic_keypad::config::KeypadConfig;
use qwiic_keypad::keypad::{Keypad, KeypadRegistry};
use qwiic_keypad::sim::SimI2cMaster;
use qwiic_keypad::I2cError;
use sysinfo::System;

/// Key presses fed to the simulated bus, each followed by an idle poll.
const SIMULATED_KEYS: &[u8] = b"1234#";

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> eyre::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Ok(value) => Ok(value.trim().parse()?),
        Err(_) => Ok(default),
    }
}

fn load_config() -> eyre::Result<KeypadConfig> {
    let ready_timeout = match var("QWIIC_KEYPAD_READY_TIMEOUT_MS") {
        Ok(ms) => Some(Duration::from_millis(ms.trim().parse()?)),
        Err(_) => None,
    };

    Ok(KeypadConfig::default()
        .with_source_clock_hz(env_or("QWIIC_KEYPAD_SOURCE_CLOCK", 250_000_000)?)
        .with_baud_rate_hz(env_or("QWIIC_KEYPAD_BAUD", 100_000)?)
        .with_ready_timeout(ready_timeout))
}

fn run<B: I2cMaster>(
    bus: B,
    config: KeypadConfig,
    poll_period: Duration,
    max_polls: Option<usize>,
) -> eyre::Result<()> {
    let channel = bus.channel();
    let mut registry = KeypadRegistry::with_config(ChannelId::ALL, config);

    let keypad = registry.get_or_create(bus)?;
    keypad.on_press(|key| info!("Key pressed: {:?} ({:#04x})", key as char, key));
    keypad.on_press(move |key| debug!("{}: dispatched {:#04x}", channel, key));

    debug!("{:?} initialized.", keypad);

    info!("Polling keypad on {} every {:?}...", channel, poll_period);

    let mut polls = 0;
    while max_polls.is_none_or(|max| polls < max) {
        match keypad.poll() {
            Ok(()) => {}
            Err(I2cError::UnexpectedState) => debug!("Keypad has no valid state yet"),
            Err(err) => warn!("Poll failed: {}", err),
        }
        polls += 1;
        sleep(poll_period);
    }

    Ok(())
}

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!("Architecture {}", System::cpu_arch());

    let channel = ChannelId(env_or("QWIIC_KEYPAD_BUS", 1u8)?);
    eyre::ensure!(ChannelId::ALL.contains(&channel), "no such I2C bus: {}", channel);
    let poll_period = Duration::from_millis(env_or("QWIIC_KEYPAD_POLL_MS", 50u64)?);
    let config = load_config()?;

    debug!("Using {:?}", config);

    if var("QWIIC_KEYPAD_SIMULATE").is_ok() {
        info!("Simulating keypad on {}", channel);
        let mut bus = SimI2cMaster::new(channel);
        for &key in SIMULATED_KEYS {
            bus.script_read(Ok(key)).script_read(Ok(0));
        }
        run(bus, config, poll_period, Some(SIMULATED_KEYS.len() * 2))
    } else {
        let bus = RawI2cMaster::new(channel)?;
        run(bus, config, poll_period, None)
    }
}
