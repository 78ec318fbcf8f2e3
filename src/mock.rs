//! In-memory stand-ins for the bus, NIRQ line, rails and delay, all sharing one
//! [`Hw`] record so tests can script faults and inspect the traffic.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal::digital::{self, ErrorType as DigitalErrorType, InputPin};
use embedded_hal::i2c::{self, ErrorType as I2cErrorType, Operation};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use crate::{Config, Phase, PowerRail, Rail, Reg, Sx9324};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
  Read(u8),
  Write(u8, u8),
  RailOn(Rail),
  RailOff(Rail),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BusFault;

impl i2c::Error for BusFault {
  fn kind(&self) -> i2c::ErrorKind {
    i2c::ErrorKind::Other
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RailFault;

impl digital::Error for RailFault {
  fn kind(&self) -> digital::ErrorKind {
    digital::ErrorKind::Other
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineFault;

impl digital::Error for LineFault {
  fn kind(&self) -> digital::ErrorKind {
    digital::ErrorKind::Other
  }
}

pub(crate) struct Hw {
  regs: [u8; 256],
  phase_data: [[u8; 6]; 4],
  /// Successful bus transfers and rail switches, in order.
  pub events: Vec<Event>,
  fail_reads: Vec<u8>,
  /// `(addr, successful writes left before failing)`
  fail_writes: Vec<(u8, usize)>,
  rail_faults: [bool; 2],
  rail_calls: [usize; 2],
  nirq: VecDeque<bool>,
  nirq_fault: bool,
  pub nirq_reads: usize,
  pub delay_ns: u64,
  /// Yield to the executor before every bus transfer.
  pub yield_on_access: bool,
}

impl Hw {
  fn new() -> Self {
    Self {
      regs: [0; 256],
      phase_data: [[0; 6]; 4],
      events: Vec::new(),
      fail_reads: Vec::new(),
      fail_writes: Vec::new(),
      rail_faults: [false; 2],
      rail_calls: [0; 2],
      nirq: VecDeque::from([true]),
      nirq_fault: false,
      nirq_reads: 0,
      delay_ns: 0,
      yield_on_access: false,
    }
  }

  pub fn reg(&self, reg: Reg) -> u8 {
    self.regs[u8::from(reg) as usize]
  }

  pub fn set_reg(&mut self, reg: Reg, value: u8) {
    self.regs[u8::from(reg) as usize] = value;
  }

  /// `USE`, `AVG` and `DIFF` MSB/LSB bytes exposed while `phase` is selected.
  pub fn set_phase_data(&mut self, phase: Phase, bytes: [u8; 6]) {
    self.phase_data[phase.index()] = bytes;
  }

  pub fn fail_read(&mut self, addr: u8) {
    self.fail_reads.push(addr);
  }

  pub fn fail_write(&mut self, addr: u8) {
    self.fail_write_after(addr, 0);
  }

  pub fn fail_write_after(&mut self, addr: u8, successes: usize) {
    self.fail_writes.push((addr, successes));
  }

  pub fn fail_rail(&mut self, rail: Rail) {
    self.rail_faults[rail_slot(rail)] = true;
  }

  pub fn heal_rails(&mut self) {
    self.rail_faults = [false; 2];
  }

  pub fn rail_calls(&self, rail: Rail) -> usize {
    self.rail_calls[rail_slot(rail)]
  }

  /// Levels returned by successive NIRQ reads; the last one sticks.
  pub fn script_nirq(&mut self, levels: &[bool]) {
    self.nirq = levels.iter().copied().collect();
  }

  /// Every following NIRQ sample fails.
  pub fn fail_nirq(&mut self) {
    self.nirq_fault = true;
  }

  fn read(&mut self, addr: u8) -> Result<u8, BusFault> {
    if self.fail_reads.contains(&addr) {
      return Err(BusFault);
    }
    self.events.push(Event::Read(addr));
    let value = match addr {
      0x61..=0x66 => {
        let phase = (self.regs[Reg::PhaseSel as usize] & 0x03) as usize;
        self.phase_data[phase][(addr - 0x61) as usize]
      }
      _ => self.regs[addr as usize],
    };
    Ok(value)
  }

  fn write(&mut self, addr: u8, value: u8) -> Result<(), BusFault> {
    if let Some(slot) = self.fail_writes.iter_mut().find(|(a, _)| *a == addr) {
      if slot.1 == 0 {
        return Err(BusFault);
      }
      slot.1 -= 1;
    }
    self.events.push(Event::Write(addr, value));
    self.regs[addr as usize] = value;
    Ok(())
  }
}

fn rail_slot(rail: Rail) -> usize {
  match rail {
    Rail::Vdd => 0,
    Rail::Pullup => 1,
  }
}

pub(crate) struct FakeBus(Rc<RefCell<Hw>>);

impl I2cErrorType for FakeBus {
  type Error = BusFault;
}

impl I2c for FakeBus {
  async fn transaction(&mut self, _address: u8, operations: &mut [Operation<'_>]) -> Result<(), Self::Error> {
    if self.0.borrow().yield_on_access {
      embassy_futures::yield_now().await;
    }

    let mut hw = self.0.borrow_mut();
    let mut pointer = 0u8;
    for op in operations {
      match op {
        Operation::Write(bytes) => {
          pointer = bytes[0];
          if let Some(&value) = bytes.get(1) {
            hw.write(pointer, value)?;
          }
        }
        Operation::Read(buf) => {
          for b in buf.iter_mut() {
            *b = hw.read(pointer)?;
          }
        }
      }
    }
    Ok(())
  }
}

pub(crate) struct FakeLine(Rc<RefCell<Hw>>);

impl DigitalErrorType for FakeLine {
  type Error = LineFault;
}

impl InputPin for FakeLine {
  fn is_high(&mut self) -> Result<bool, Self::Error> {
    let mut hw = self.0.borrow_mut();
    hw.nirq_reads += 1;
    if hw.nirq_fault {
      return Err(LineFault);
    }
    let level = if hw.nirq.len() > 1 { hw.nirq.pop_front() } else { hw.nirq.front().copied() };
    Ok(level.unwrap_or(true))
  }

  fn is_low(&mut self) -> Result<bool, Self::Error> {
    self.is_high().map(|high| !high)
  }
}

pub(crate) struct FakeRail {
  hw: Rc<RefCell<Hw>>,
  rail: Rail,
}

impl FakeRail {
  fn switch(&mut self, on: bool) -> Result<(), RailFault> {
    let mut hw = self.hw.borrow_mut();
    let slot = rail_slot(self.rail);
    hw.rail_calls[slot] += 1;
    if hw.rail_faults[slot] {
      return Err(RailFault);
    }
    hw.events.push(if on { Event::RailOn(self.rail) } else { Event::RailOff(self.rail) });
    Ok(())
  }
}

impl PowerRail for FakeRail {
  type Error = RailFault;

  async fn enable(&mut self) -> Result<(), Self::Error> {
    self.switch(true)
  }

  async fn disable(&mut self) -> Result<(), Self::Error> {
    self.switch(false)
  }
}

pub(crate) struct FakeDelay(Rc<RefCell<Hw>>);

impl DelayNs for FakeDelay {
  async fn delay_ns(&mut self, ns: u32) {
    self.0.borrow_mut().delay_ns += u64::from(ns);
  }
}

pub(crate) type TestDevice = Sx9324<NoopRawMutex, FakeBus, FakeLine, FakeRail, FakeRail, FakeDelay>;

/// A device wired to fresh fake hardware. NIRQ idles high.
pub(crate) fn rig() -> (Rc<RefCell<Hw>>, TestDevice) {
  let hw = Rc::new(RefCell::new(Hw::new()));
  let dev = Sx9324::new(
    FakeBus(hw.clone()),
    FakeLine(hw.clone()),
    FakeRail { hw: hw.clone(), rail: Rail::Vdd },
    FakeRail { hw: hw.clone(), rail: Rail::Pullup },
    FakeDelay(hw.clone()),
    Config::default(),
  );
  (hw, dev)
}
