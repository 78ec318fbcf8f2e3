use core::str::FromStr;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::defs::{GeneralControl0, GeneralControl1};
use crate::{software_default, Error, PowerRail, Reg, Sx9324};

/// Phase enable value used when no software default covers `GNRL_CTRL_1`.
const ALL_PHASES_ENABLED: u8 = 0x0F;
/// Doze period used when no software default covers `GNRL_CTRL_0` (8 x scan period).
const DOZE_EIGHT_SCANS: u8 = 0x40;

/// Operational mode, always derived from the phase enable and doze period fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
  /// Enabled phases are scanned every scan period.
  Active = 0,
  /// Enabled phases are scanned at the reduced doze rate.
  Doze = 1,
  /// No phase is enabled.
  Sleep = 2,
}

impl Mode {
  pub const ALL: [Mode; 3] = [Mode::Active, Mode::Doze, Mode::Sleep];

  pub const fn as_str(&self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Doze => "doze",
      Self::Sleep => "sleep",
    }
  }
}

impl TryFrom<u8> for Mode {
  type Error = ();

  fn try_from(code: u8) -> Result<Self, Self::Error> {
    match code {
      0 => Ok(Self::Active),
      1 => Ok(Self::Doze),
      2 => Ok(Self::Sleep),
      _ => Err(()),
    }
  }
}

impl From<Mode> for u8 {
  fn from(v: Mode) -> Self {
    v as u8
  }
}

/// Accepts any input that starts with a mode name, so `"doze\n"` parses as doze.
impl FromStr for Mode {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL.into_iter().find(|mode| s.starts_with(mode.as_str())).ok_or(())
  }
}

impl core::fmt::Display for Mode {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.write_str(self.as_str())
  }
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
  /// Read the current operational mode from the device.
  pub async fn mode(&self) -> Result<Mode, Error<E>> {
    let ctrl1 = GeneralControl1::from_bits(self.read_reg(Reg::GnrlCtrl1).await?);
    if !ctrl1.any_phase_enabled() {
      return Ok(Mode::Sleep);
    }
    let ctrl0 = GeneralControl0::from_bits(self.read_reg(Reg::GnrlCtrl0).await?);
    if ctrl0.doze_period() != 0 {
      Ok(Mode::Doze)
    } else {
      Ok(Mode::Active)
    }
  }

  /// Switch to `mode`.
  ///
  /// Active and doze re-enable the default phases and then adjust the doze
  /// period. Both register updates are attempted even if the first one fails;
  /// the first failure is returned and nothing is rolled back. Sleep only
  /// disables all phases.
  pub async fn set_mode(&self, mode: Mode) -> Result<(), Error<E>> {
    let result = match mode {
      Mode::Active | Mode::Doze => {
        let phases = software_default(Reg::GnrlCtrl1).unwrap_or(ALL_PHASES_ENABLED);
        let enable = self.update_bits(Reg::GnrlCtrl1, GeneralControl1::PHASE_ENABLE_MASK, phases).await;

        let doze = match mode {
          Mode::Doze => software_default(Reg::GnrlCtrl0).unwrap_or(DOZE_EIGHT_SCANS),
          _ => 0,
        };
        let timing = self.update_bits(Reg::GnrlCtrl0, GeneralControl0::DOZE_PERIOD_MASK, doze).await;

        enable.and(timing)
      }
      Mode::Sleep => self.update_bits(Reg::GnrlCtrl1, GeneralControl1::PHASE_ENABLE_MASK, 0).await,
    };

    match &result {
      Ok(()) => debug!("mode set to {:?}", mode),
      Err(_) => error!("failed to set mode {:?}", mode),
    }
    result
  }

  /// Switch to the mode with raw code `code` (0 active, 1 doze, 2 sleep).
  pub async fn set_mode_raw(&self, code: u8) -> Result<(), Error<E>> {
    let mode = Mode::try_from(code).map_err(|_| Error::InvalidArgument)?;
    self.set_mode(mode).await
  }
}
