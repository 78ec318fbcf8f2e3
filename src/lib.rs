#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Async, `no_std` driver for the Semtech SX9324 capacitive SAR / proximity
//! controller.
//!
//! The SX9324 measures capacitance on up to four independently configured
//! sensing phases and reports proximity, body and table detection per phase.
//! This crate exposes the control core of the part on top of the raw register
//! map:
//!
//! - Power sequencing of the `vdd` and bus pull-up rails, power-up and software
//!   reset with NIRQ based readiness verification
//! - A compiled-in table of software defaults applied after reset
//! - Active / doze / sleep mode control derived from live register state
//! - Consistent four-phase snapshots of useful, average and difference counts
//!   together with the decoded status flags
//! - A non-blocking interrupt top half feeding an in-order deferred worker
//! - Raw register access for bring-up and debugging, guarded by the datasheet
//!   access-direction policy
//!
//! All operations take `&self`, so a single device handle can be shared by an
//! application task and the interrupt worker. The host picks the
//! [`RawMutex`] flavour that matches its executor.
//!
//! ```no_run
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//! use embedded_hal::digital::{InputPin, OutputPin};
//! use embedded_hal_async::{delay::DelayNs, i2c::{I2c, SevenBitAddress}};
//! use sx9324::{Config, Mode, SwitchRail, Sx9324};
//!
//! async fn example<I2C, NIRQ, EN, D, E>(i2c: I2C, nirq: NIRQ, vdd_en: EN, pullup_en: EN, delay: D) -> Result<(), sx9324::Error<E>>
//! where
//!   I2C: I2c<SevenBitAddress, Error = E>,
//!   NIRQ: InputPin,
//!   EN: OutputPin,
//!   D: DelayNs,
//! {
//!   let sensor: Sx9324<CriticalSectionRawMutex, _, _, _, _, _> = Sx9324::new(
//!     i2c,
//!     nirq,
//!     SwitchRail::active_high(vdd_en),
//!     SwitchRail::active_high(pullup_en),
//!     delay,
//!     Config::default(),
//!   );
//!
//!   sensor.initialize().await?;
//!   sensor.set_mode(Mode::Doze).await?;
//!   let snapshot = sensor.acquire_snapshot().await?;
//!   for data in snapshot.valid() {
//!     let _ = (data.phase, data.difference, data.status.prox);
//!   }
//!   Ok(())
//! }
//! ```

#[cfg(test)]
extern crate std;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

mod config;
mod defaults;
mod defs;
mod irq;
#[cfg(test)]
mod mock;
mod mode;
mod phase;
mod power;
mod registers;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embedded_hal::digital::{self, InputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};
use heapless::Vec;

pub use config::*;
pub use defaults::*;
pub use defs::{
  is_readable, is_writeable, GeneralControl0, GeneralControl1, IrqMask, IrqSource, PhaseFlags, Reg, PHASES,
};
pub use irq::*;
pub use mode::*;
pub use phase::*;
pub use power::*;
pub use registers::*;

use defs::signed_from_pair;
use power::Power;

/// Errors that can occur while interacting with the controller.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
  /// I²C bus transaction failed with the underlying driver error.
  I2c(E),
  /// The device failed readiness verification after a reset.
  NotReady,
  /// Unsupported mode or malformed management request.
  InvalidArgument,
  /// Applying the software defaults stopped at `reg`. Entries before it were written.
  PartialFailure { reg: Reg, source: E },
  /// The address is not readable according to the register map.
  NotReadable(u8),
  /// The address is not writeable according to the register map.
  NotWriteable(u8),
  /// Switching a power rail failed. The rail keeps its previous state.
  Rail(Rail, digital::ErrorKind),
  /// Sampling the NIRQ line level failed.
  Line(digital::ErrorKind),
}

/// Driver for one Semtech SX9324.
///
/// The handle owns the I²C bus, the NIRQ input, both power rails and a delay
/// provider. Create it with [`Sx9324::new`], then call
/// [`Sx9324::initialize`] to power the part up and load the software defaults.
/// Tear it down with [`Sx9324::detach`] to get the peripherals back.
pub struct Sx9324<M: RawMutex, I2C, IRQ, VDD, PULLUP, D> {
  bus: Mutex<M, I2C>,
  power: Mutex<M, Power<IRQ, VDD, PULLUP, D>>,
  snapshot: Mutex<M, Snapshot>,
  dump: Mutex<M, Vec<u8, MAX_REQUESTS>>,
  irq_queue: Channel<M, (), IRQ_QUEUE_DEPTH>,
  config: Config,
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
  /// Create a new driver instance with the provided peripherals.
  ///
  /// Nothing is sent to the device and no rail is switched until
  /// [`Sx9324::initialize`] is called.
  pub fn new(i2c: I2C, nirq: IRQ, vdd: VDD, pullup: PULLUP, delay: D, config: Config) -> Self {
    Self {
      bus: Mutex::new(i2c),
      power: Mutex::new(Power::new(nirq, vdd, pullup, delay)),
      snapshot: Mutex::new(Snapshot::new()),
      dump: Mutex::new(Vec::new()),
      irq_queue: Channel::new(),
      config,
    }
  }

  /// Configuration the driver was created with.
  pub fn config(&self) -> &Config {
    &self.config
  }

  // Typed helpers
  pub(crate) async fn read_reg(&self, reg: Reg) -> Result<u8, Error<E>> {
    self.read_addr(reg.into()).await
  }

  pub(crate) async fn write_reg(&self, reg: Reg, value: u8) -> Result<(), Error<E>> {
    self.write_addr(reg.into(), value).await
  }

  /// Read an MSB/LSB pair, MSB first, as a signed 16-bit quantity.
  pub(crate) async fn read_signed_pair(&self, msb: Reg, lsb: Reg) -> Result<i16, Error<E>> {
    let hi = self.read_reg(msb).await?;
    let lo = self.read_reg(lsb).await?;
    Ok(signed_from_pair(hi, lo))
  }

  /// Read-modify-write of the bits selected by `mask`. The write is skipped
  /// when nothing would change.
  pub(crate) async fn update_bits(&self, reg: Reg, mask: u8, value: u8) -> Result<(), Error<E>> {
    let current = self.read_reg(reg).await?;
    let next = (current & !mask) | (value & mask);
    if next == current {
      return Ok(());
    }
    self.write_reg(reg, next).await
  }

  pub(crate) async fn read_addr(&self, addr: u8) -> Result<u8, Error<E>> {
    if !is_readable(addr) {
      return Err(Error::NotReadable(addr));
    }
    let mut buf = [0u8; 1];
    let mut bus = self.bus.lock().await;
    bus.write_read(self.config.address, &[addr], &mut buf).await.map_err(Error::I2c)?;
    Ok(buf[0])
  }

  pub(crate) async fn write_addr(&self, addr: u8, value: u8) -> Result<(), Error<E>> {
    if !is_writeable(addr) {
      return Err(Error::NotWriteable(addr));
    }
    let mut bus = self.bus.lock().await;
    bus.write(self.config.address, &[addr, value]).await.map_err(Error::I2c)
  }
}
