use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::defs::IrqMask;
use crate::{Error, PowerRail, Reg, Sx9324};

/// Register values applied on top of the hardware reset state, in write order.
pub const SOFTWARE_DEFAULTS: [(Reg, u8); 4] = [
  (Reg::IrqMsk, IrqMask::new().with_close_any(true).with_far_any(true).into_bits()),
  // Tscan = 10 ms, Tdoze = 8 x Tscan
  (Reg::GnrlCtrl0, 0x45),
  // Phase 0: CS0 measured while CS1/CS2 are shielded
  (Reg::AfePh0, 0x29),
  // Only phase 0 enabled
  (Reg::GnrlCtrl1, 0x21),
];

/// Software default for `reg`, if the table defines one.
pub const fn software_default(reg: Reg) -> Option<u8> {
  let mut i = 0;
  while i < SOFTWARE_DEFAULTS.len() {
    if SOFTWARE_DEFAULTS[i].0 as u8 == reg as u8 {
      return Some(SOFTWARE_DEFAULTS[i].1);
    }
    i += 1;
  }
  None
}

impl<M, I2C, E, IRQ, VDD, PULLUP, D> Sx9324<M, I2C, IRQ, VDD, PULLUP, D>
where
  M: RawMutex,
  I2C: I2c<SevenBitAddress, Error = E>,
  IRQ: InputPin,
  VDD: PowerRail,
  PULLUP: PowerRail,
  D: DelayNs,
{
  /// Write every entry of [`SOFTWARE_DEFAULTS`] in order.
  ///
  /// Stops at the first failing register and reports it as
  /// [`Error::PartialFailure`]. Entries already written stay written.
  pub async fn apply_defaults(&self) -> Result<(), Error<E>> {
    for (reg, value) in SOFTWARE_DEFAULTS {
      match self.write_reg(reg, value).await {
        Ok(()) => trace!("default {:#x} <- {:#x}", u8::from(reg), value),
        Err(Error::I2c(source)) => {
          error!("failed to write register {:#x} with software default value", u8::from(reg));
          return Err(Error::PartialFailure { reg, source });
        }
        Err(err) => return Err(err),
      }
    }
    Ok(())
  }
}
