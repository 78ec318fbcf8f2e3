use crate::defs::I2C_ADDR;

/// Minimum power-up settling time mandated by the datasheet, in microseconds.
pub const MIN_POWER_UP_DELAY_US: u32 = 1_000;

/// Driver-level settings that are not part of the device register map.
///
/// Register defaults applied after reset are compiled in (see
/// [`crate::SOFTWARE_DEFAULTS`]); this only covers how the driver reaches and
/// brings up the part.
///
/// # Example
/// ```no_run
/// use sx9324::Config;
///
/// let config = Config::default().with_address(0x29).with_power_up_delay_us(2_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
  /// 7-bit I²C address of the device.
  pub address: u8,
  /// Settling time applied after the rails come up, before readiness is checked.
  pub power_up_delay_us: u32,
}

impl Config {
  pub const fn new() -> Self {
    Self { address: I2C_ADDR, power_up_delay_us: MIN_POWER_UP_DELAY_US }
  }

  pub const fn with_address(mut self, address: u8) -> Self {
    self.address = address;
    self
  }

  /// Values below [`MIN_POWER_UP_DELAY_US`] are raised to the minimum.
  pub const fn with_power_up_delay_us(mut self, delay_us: u32) -> Self {
    self.power_up_delay_us = if delay_us < MIN_POWER_UP_DELAY_US { MIN_POWER_UP_DELAY_US } else { delay_us };
    self
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new()
  }
}
