use core::ops::{Index, IndexMut};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::defs::{GeneralControl1, PhaseFlags, PHASES};
use crate::{Error, PowerRail, Reg, Sx9324};

/// One of the four sensing phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Phase {
  #[default]
  Ph0 = 0,
  Ph1 = 1,
  Ph2 = 2,
  Ph3 = 3,
}

impl Phase {
  pub const ALL: [Phase; PHASES] = [Phase::Ph0, Phase::Ph1, Phase::Ph2, Phase::Ph3];

  /// Position of the phase in [`Phase::ALL`] and in a [`Snapshot`].
  pub const fn index(self) -> usize {
    self as usize
  }
}

impl TryFrom<u8> for Phase {
  type Error = ();

  fn try_from(index: u8) -> Result<Self, Self::Error> {
    match index {
      0 => Ok(Self::Ph0),
      1 => Ok(Self::Ph1),
      2 => Ok(Self::Ph2),
      3 => Ok(Self::Ph3),
      _ => Err(()),
    }
  }
}

impl From<Phase> for u8 {
  fn from(v: Phase) -> Self {
    v as u8
  }
}

/// Per-phase status flags decoded from `STAT_0..STAT_2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseStatus {
  /// Proximity state has settled.
  pub steady: bool,
  /// Proximity detected.
  pub prox: bool,
  /// Table (inanimate object) detected.
  pub table: bool,
  /// Body detected.
  pub body: bool,
  /// Compensation failed.
  pub fail: bool,
  /// Compensation pending.
  pub comp: bool,
}

impl PhaseStatus {
  /// Pick `phase`'s flags out of the three status registers.
  pub fn decode(phase: Phase, stat0: PhaseFlags, stat1: PhaseFlags, stat2: PhaseFlags) -> Self {
    Self {
      steady: stat0.high_for(phase),
      prox: stat0.low_for(phase),
      table: stat1.high_for(phase),
      body: stat1.low_for(phase),
      fail: stat2.high_for(phase),
      comp: stat2.low_for(phase),
    }
  }
}

/// Measurement and status of one phase as of one acquisition.
///
/// The counts and status are only meaningful when `valid` is set; invalid
/// entries are always left at their zero defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhaseData {
  pub phase: Phase,
  /// The phase was enabled when the snapshot was taken.
  pub valid: bool,
  pub useful: i16,
  pub average: i16,
  pub difference: i16,
  pub status: PhaseStatus,
}

impl PhaseData {
  const fn invalid(phase: Phase) -> Self {
    Self {
      phase,
      valid: false,
      useful: 0,
      average: 0,
      difference: 0,
      status: PhaseStatus { steady: false, prox: false, table: false, body: false, fail: false, comp: false },
    }
  }
}

/// Consistent view of all four phases, taken under the acquisition lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
  phases: [PhaseData; PHASES],
}

impl Snapshot {
  /// All phases invalid.
  pub const fn new() -> Self {
    Self {
      phases: [
        PhaseData::invalid(Phase::Ph0),
        PhaseData::invalid(Phase::Ph1),
        PhaseData::invalid(Phase::Ph2),
        PhaseData::invalid(Phase::Ph3),
      ],
    }
  }

  pub fn phases(&self) -> &[PhaseData; PHASES] {
    &self.phases
  }

  /// Iterate over the phases that carry valid data.
  pub fn valid(&self) -> impl Iterator<Item = &PhaseData> {
    self.phases.iter().filter(|data| data.valid)
  }
}

impl Default for Snapshot {
  fn default() -> Self {
    Self::new()
  }
}

impl Index<Phase> for Snapshot {
  type Output = PhaseData;

  fn index(&self, phase: Phase) -> &Self::Output {
    &self.phases[phase.index()]
  }
}

impl IndexMut<Phase> for Snapshot {
  fn index_mut(&mut self, phase: Phase) -> &mut Self::Output {
    &mut self.phases[phase.index()]
  }
}

/// Tabular dump, one row per valid phase.
impl core::fmt::Display for Snapshot {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    writeln!(f, "PH Useful Avg Diff Steady Prox Table Body Fail Comp")?;
    writeln!(f, "===================================================")?;
    for data in self.valid() {
      let s = &data.status;
      writeln!(
        f,
        "{} {} {} {} {} {} {} {} {} {}",
        data.phase.index(),
        data.useful,
        data.average,
        data.difference,
        u8::from(s.steady),
        u8::from(s.prox),
        u8::from(s.table),
        u8::from(s.body),
        u8::from(s.fail),
        u8::from(s.comp),
      )?;
    }
    Ok(())
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
  /// Read a fresh snapshot of every enabled phase.
  ///
  /// The whole sequence runs under the acquisition lock, so no other
  /// acquisition or raw register request can move `PHASE_SEL` between
  /// selecting a phase and reading its counts. On a bus failure the phases read so far stay valid, the rest
  /// are invalid, and the partial snapshot replaces the stored one before the
  /// error is returned.
  pub async fn acquire_snapshot(&self) -> Result<Snapshot, Error<E>> {
    let mut stored = self.snapshot.lock().await;
    let mut next = Snapshot::new();
    let result = self.read_phases(&mut next).await;
    *stored = next;
    drop(stored);

    if result.is_err() {
      error!("phase data readback aborted");
    }
    result.map(|()| next)
  }

  /// Snapshot stored by the most recent acquisition, without bus traffic.
  pub async fn last_snapshot(&self) -> Snapshot {
    *self.snapshot.lock().await
  }

  async fn read_phases(&self, out: &mut Snapshot) -> Result<(), Error<E>> {
    let enabled = GeneralControl1::from_bits(self.read_reg(Reg::GnrlCtrl1).await?);
    if !enabled.any_phase_enabled() {
      return Ok(());
    }

    let stat0 = PhaseFlags::from_bits(self.read_reg(Reg::Stat0).await?);
    let stat1 = PhaseFlags::from_bits(self.read_reg(Reg::Stat1).await?);
    let stat2 = PhaseFlags::from_bits(self.read_reg(Reg::Stat2).await?);

    for phase in Phase::ALL {
      if !enabled.is_phase_enabled(phase) {
        continue;
      }

      self.write_reg(Reg::PhaseSel, phase.into()).await?;
      let useful = self.read_signed_pair(Reg::UseMsb, Reg::UseLsb).await?;
      let average = self.read_signed_pair(Reg::AvgMsb, Reg::AvgLsb).await?;
      let difference = self.read_signed_pair(Reg::DiffMsb, Reg::DiffLsb).await?;

      out[phase] = PhaseData {
        phase,
        valid: true,
        useful,
        average,
        difference,
        status: PhaseStatus::decode(phase, stat0, stat1, stat2),
      };
    }

    Ok(())
  }
}
