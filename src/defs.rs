/******************************************************************************
 * Refer to SX9324 datasheet for more information, available here:           *
 * - https://www.semtech.com/products/smart-sensing/sar-sensors/sx9324        *
 * ========================================================================== *
 *                        SX9324 - Registers & Memory Map                     *
*******************************************************************************/

use bitfield_struct::bitfield;

use crate::Phase;

pub(crate) const I2C_ADDR: u8 = 0x28;

/// Command byte that triggers a software reset when written to [`Reg::Reset`].
pub(crate) const RESET_COMMAND: u8 = 0xDE;

/// Number of sensing phases on the device.
pub const PHASES: usize = 4;

#[allow(dead_code)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reg {
  // Interrupt and status (0x00..0x08)
  IrqSrc = 0x00,
  Stat0 = 0x01,
  Stat1 = 0x02,
  Stat2 = 0x03,
  Stat3 = 0x04,
  IrqMsk = 0x05,
  IrqCfg0 = 0x06,
  IrqCfg1 = 0x07,
  IrqCfg2 = 0x08,

  // General control (0x10..0x15)
  GnrlCtrl0 = 0x10,
  GnrlCtrl1 = 0x11,
  I2cAddr = 0x14,
  ClkSprd = 0x15,

  // Analog front end (0x20..0x2D)
  AfeCtrl0 = 0x20,
  AfeCtrl1 = 0x21,
  AfeCtrl2 = 0x22,
  AfeCtrl3 = 0x23,
  AfeCtrl4 = 0x24,
  AfeCtrl5 = 0x25,
  AfeCtrl6 = 0x26,
  AfeCtrl7 = 0x27,
  AfePh0 = 0x28,
  AfePh1 = 0x29,
  AfePh2 = 0x2A,
  AfePh3 = 0x2B,
  AfeCtrl8 = 0x2C,
  AfeCtrl9 = 0x2D,

  // Main digital processing (0x30..0x37)
  ProxCtrl0 = 0x30,
  ProxCtrl1 = 0x31,
  ProxCtrl2 = 0x32,
  ProxCtrl3 = 0x33,
  ProxCtrl4 = 0x34,
  ProxCtrl5 = 0x35,
  ProxCtrl6 = 0x36,
  ProxCtrl7 = 0x37,

  // Advanced digital processing (0x40..0x54)
  AdvCtrl0 = 0x40,
  AdvCtrl1 = 0x41,
  AdvCtrl2 = 0x42,
  AdvCtrl3 = 0x43,
  AdvCtrl4 = 0x44,
  AdvCtrl5 = 0x45,
  AdvCtrl6 = 0x46,
  AdvCtrl7 = 0x47,
  AdvCtrl8 = 0x48,
  AdvCtrl9 = 0x49,
  AdvCtrl10 = 0x4A,
  AdvCtrl11 = 0x4B,
  AdvCtrl12 = 0x4C,
  AdvCtrl13 = 0x4D,
  AdvCtrl14 = 0x4E,
  AdvCtrl15 = 0x4F,
  AdvCtrl16 = 0x50,
  AdvCtrl17 = 0x51,
  AdvCtrl18 = 0x52,
  AdvCtrl19 = 0x53,
  AdvCtrl20 = 0x54,

  // Phase data readback (0x60..0x6A)
  PhaseSel = 0x60,
  UseMsb = 0x61,
  UseLsb = 0x62,
  AvgMsb = 0x63,
  AvgLsb = 0x64,
  DiffMsb = 0x65,
  DiffLsb = 0x66,
  OffsetMsb = 0x67,
  OffsetLsb = 0x68,
  SarMsb = 0x69,
  SarLsb = 0x6A,

  // Miscellaneous
  Reset = 0x9F,
  WhoAmI = 0xFA,
  Rev = 0xFE,
}

impl From<Reg> for u8 {
  #[inline]
  fn from(r: Reg) -> Self {
    r as u8
  }
}

/// Registers that accept writes. Everything else is rejected before touching the bus.
pub const fn is_writeable(addr: u8) -> bool {
  matches!(
    addr,
    0x05..=0x08
      | 0x10
      | 0x11
      | 0x14
      | 0x15
      | 0x20
      | 0x23
      | 0x24
      | 0x26..=0x2D
      | 0x30..=0x37
      | 0x40..=0x54
      | 0x60
      | 0x67
      | 0x68
      | 0x9F
  )
}

/// Registers that may be read. Everything else is rejected before touching the bus.
pub const fn is_readable(addr: u8) -> bool {
  matches!(
    addr,
    0x00..=0x08
      | 0x10
      | 0x11
      | 0x14
      | 0x15
      | 0x20
      | 0x23
      | 0x24
      | 0x26..=0x2D
      | 0x30..=0x37
      | 0x40..=0x54
      | 0x60..=0x6A
      | 0xFA
      | 0xFE
  )
}

/// Latched interrupt sources, cleared on read (`IRQ_SRC`).
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct IrqSource {
  pub prog0: bool,
  pub prog1: bool,
  pub prog2: bool,
  pub conv_done: bool,
  pub comp_done: bool,
  pub far_any: bool,
  pub close_any: bool,
  pub reset: bool,
}

/// Interrupt enables (`IRQ_MSK`).
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct IrqMask {
  pub prog0: bool,
  pub prog1: bool,
  pub prog2: bool,
  pub conv_done: bool,
  pub comp_done: bool,
  pub far_any: bool,
  pub close_any: bool,
  #[bits(1)]
  __: u8,
}

/// Scan timing (`GNRL_CTRL_0`).
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct GeneralControl0 {
  /// Scan period, in steps of the internal oscillator.
  #[bits(5)]
  pub scan_period: u8,
  /// Doze period as a multiple of the scan period. Zero disables doze.
  #[bits(2)]
  pub doze_period: u8,
  pub pause_irq: bool,
}

impl GeneralControl0 {
  /// Register mask covering the doze period field.
  pub(crate) const DOZE_PERIOD_MASK: u8 = 0b0110_0000;
}

/// Phase enables (`GNRL_CTRL_1`).
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct GeneralControl1 {
  #[bits(4)]
  pub phase_enable: u8,
  #[bits(4)]
  __: u8,
}

impl GeneralControl1 {
  /// Register mask covering the phase enable field.
  pub(crate) const PHASE_ENABLE_MASK: u8 = 0b0000_1111;

  pub const fn is_phase_enabled(&self, phase: Phase) -> bool {
    self.phase_enable() & (1 << phase.index()) != 0
  }

  pub const fn any_phase_enabled(&self) -> bool {
    self.phase_enable() != 0
  }
}

/// Per-phase flag pairs as laid out in `STAT_0..STAT_2`: bit `i` in the low
/// nibble and bit `i + 4` in the high nibble belong to phase `i`.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct PhaseFlags {
  #[bits(4)]
  pub low: u8,
  #[bits(4)]
  pub high: u8,
}

impl PhaseFlags {
  pub const fn low_for(&self, phase: Phase) -> bool {
    (self.low() >> phase.index()) & 1 != 0
  }

  pub const fn high_for(&self, phase: Phase) -> bool {
    (self.high() >> phase.index()) & 1 != 0
  }
}

/// Reassemble an MSB/LSB register pair into a two's-complement value.
#[inline]
pub(crate) const fn signed_from_pair(msb: u8, lsb: u8) -> i16 {
  i16::from_be_bytes([msb, lsb])
}
