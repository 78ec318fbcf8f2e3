use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::{self, Error as _, InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::defs::RESET_COMMAND;
use crate::{Error, Reg, Sx9324};

/// The two supplies the host controls for the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rail {
  /// Primary `VDD` supply.
  Vdd,
  /// Pull-up supply of the I²C and NIRQ lines.
  Pullup,
}

/// A switchable supply rail.
///
/// Implementations only need to switch the rail. The driver keeps a shadow
/// copy of the state and never asks for a transition that is already in place.
#[allow(async_fn_in_trait)]
pub trait PowerRail {
  type Error: digital::Error;

  async fn enable(&mut self) -> Result<(), Self::Error>;

  async fn disable(&mut self) -> Result<(), Self::Error>;
}

/// [`PowerRail`] backed by the enable pin of a load switch or LDO.
pub struct SwitchRail<P> {
  pin: P,
  active_low: bool,
}

impl<P: OutputPin> SwitchRail<P> {
  /// Rail switched on by driving `pin` high.
  pub fn active_high(pin: P) -> Self {
    Self { pin, active_low: false }
  }

  /// Rail switched on by driving `pin` low.
  pub fn active_low(pin: P) -> Self {
    Self { pin, active_low: true }
  }

  /// Give the enable pin back, leaving it at its current level.
  pub fn release(self) -> P {
    self.pin
  }
}

impl<P: OutputPin> PowerRail for SwitchRail<P> {
  type Error = P::Error;

  async fn enable(&mut self) -> Result<(), Self::Error> {
    self.pin.set_state((!self.active_low).into())
  }

  async fn disable(&mut self) -> Result<(), Self::Error> {
    self.pin.set_state(self.active_low.into())
  }
}

/// Peripherals handed back by [`Sx9324::detach`].
pub struct Parts<I2C, IRQ, VDD, PULLUP, D> {
  pub i2c: I2C,
  pub nirq: IRQ,
  pub vdd: VDD,
  pub pullup: PULLUP,
  pub delay: D,
}

pub(crate) struct Power<IRQ, VDD, PULLUP, D> {
  nirq: IRQ,
  vdd: VDD,
  vdd_enabled: bool,
  pullup: PULLUP,
  pullup_enabled: bool,
  delay: D,
}

impl<IRQ, VDD, PULLUP, D> Power<IRQ, VDD, PULLUP, D>
where
  IRQ: InputPin,
  VDD: PowerRail,
  PULLUP: PowerRail,
  D: DelayNs,
{
  pub(crate) fn new(nirq: IRQ, vdd: VDD, pullup: PULLUP, delay: D) -> Self {
    Self { nirq, vdd, vdd_enabled: false, pullup, pullup_enabled: false, delay }
  }

  async fn switch(&mut self, rail: Rail, on: bool) -> Result<(), digital::ErrorKind> {
    match rail {
      Rail::Vdd => switch_rail(&mut self.vdd, &mut self.vdd_enabled, on).await,
      Rail::Pullup => switch_rail(&mut self.pullup, &mut self.pullup_enabled, on).await,
    }
  }

  fn is_enabled(&self, rail: Rail) -> bool {
    match rail {
      Rail::Vdd => self.vdd_enabled,
      Rail::Pullup => self.pullup_enabled,
    }
  }

  /// NIRQ is active low, so a high level means nothing is pending.
  fn line_inactive(&mut self) -> Result<bool, digital::ErrorKind> {
    self.nirq.is_high().map_err(|e| e.kind())
  }
}

async fn switch_rail<R: PowerRail>(rail: &mut R, enabled: &mut bool, on: bool) -> Result<(), digital::ErrorKind> {
  if *enabled == on {
    return Ok(());
  }
  let result = if on { rail.enable().await } else { rail.disable().await };
  result.map_err(|e| e.kind())?;
  *enabled = on;
  Ok(())
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
  /// Power the device up and bring it into its software-default state.
  ///
  /// Enables the pull-up and `VDD` rails, waits for the power-up time, checks
  /// readiness on NIRQ and writes [`crate::SOFTWARE_DEFAULTS`]. If the rails
  /// cannot both be enabled, both are switched off again.
  pub async fn initialize(&self) -> Result<(), Error<E>> {
    let pullup = self.enable_rail(Rail::Pullup, true).await;
    let vdd = self.enable_rail(Rail::Vdd, true).await;
    if let Err(err) = pullup.and(vdd) {
      error!("failed to enable the power supply");
      let _ = self.enable_rail(Rail::Vdd, false).await;
      let _ = self.enable_rail(Rail::Pullup, false).await;
      return Err(err);
    }

    if let Err(err) = self.power_up_reset().await {
      error!("failed to reset the chip on power-up");
      return Err(err);
    }

    self.apply_defaults().await?;
    self.dump.lock().await.clear();

    info!("sx9324 initialized");
    Ok(())
  }

  /// Switch `rail` on or off. Does nothing if it is already in that state.
  pub async fn enable_rail(&self, rail: Rail, on: bool) -> Result<(), Error<E>> {
    let mut power = self.power.lock().await;
    power.switch(rail, on).await.map_err(|kind| {
      error!("failed to switch {:?} rail to {}", rail, on);
      Error::Rail(rail, kind)
    })
  }

  /// Last successfully applied state of `rail`.
  pub async fn is_rail_enabled(&self, rail: Rail) -> bool {
    self.power.lock().await.is_enabled(rail)
  }

  /// Wait for the power-up time, then verify that the device is ready.
  ///
  /// Call this once both rails are enabled.
  pub async fn power_up_reset(&self) -> Result<(), Error<E>> {
    let mut power = self.power.lock().await;
    let delay_us = self.config.power_up_delay_us;
    power.delay.delay_us(delay_us).await;
    self.verify_ready(&mut power).await
  }

  /// Issue the reset command and verify that the device comes back.
  pub async fn software_reset(&self) -> Result<(), Error<E>> {
    if let Err(err) = self.write_reg(Reg::Reset, RESET_COMMAND).await {
      error!("failed to perform a software reset");
      return Err(err);
    }
    let mut power = self.power.lock().await;
    self.verify_ready(&mut power).await
  }

  /// NIRQ must be idle, reading `IRQ_SRC` clears whatever reset latched, and
  /// NIRQ must still be idle afterwards.
  async fn verify_ready(&self, power: &mut Power<IRQ, VDD, PULLUP, D>) -> Result<(), Error<E>> {
    if !power.line_inactive().map_err(Error::Line)? {
      error!("NIRQ asserted before status clear, chip not ready");
      return Err(Error::NotReady);
    }

    if let Err(err) = self.read_reg(Reg::IrqSrc).await {
      error!("chip is not ready for operation");
      return Err(err);
    }

    if !power.line_inactive().map_err(Error::Line)? {
      error!("NIRQ did not deassert after status clear");
      return Err(Error::NotReady);
    }

    debug!("chip ready");
    Ok(())
  }

  /// Drain pending interrupt work, switch both rails off and hand the
  /// peripherals back.
  ///
  /// Rail failures are logged; the peripherals are returned regardless.
  pub async fn detach(self) -> Parts<I2C, IRQ, VDD, PULLUP, D> {
    self.drain_interrupts().await;

    if self.enable_rail(Rail::Vdd, false).await.is_err() {
      warn!("vdd left enabled on detach");
    }
    if self.enable_rail(Rail::Pullup, false).await.is_err() {
      warn!("pull-up left enabled on detach");
    }

    let power = self.power.into_inner();
    Parts {
      i2c: self.bus.into_inner(),
      nirq: power.nirq,
      vdd: power.vdd,
      pullup: power.pullup,
      delay: power.delay,
    }
  }
}
