use core::str::FromStr;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};
use heapless::Vec;

use crate::{Error, PowerRail, Reg, Sx9324};

/// Maximum number of registers in one management request.
pub const MAX_REQUESTS: usize = 8;

/// One entry of a raw register request: read `addr`, optionally writing `value` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterRequest {
  pub addr: u8,
  pub value: Option<u8>,
}

impl RegisterRequest {
  pub const fn read(addr: u8) -> Self {
    Self { addr, value: None }
  }

  pub const fn write(addr: u8, value: u8) -> Self {
    Self { addr, value: Some(value) }
  }

  /// Parse whitespace separated `reg[=value]` tokens, both in hex, e.g. `"10=45 11 0x60"`.
  pub fn parse_list(s: &str) -> Result<Vec<Self, MAX_REQUESTS>, ()> {
    let mut list = Vec::new();
    for token in s.split_whitespace() {
      list.push(token.parse()?).map_err(|_| ())?;
    }
    Ok(list)
  }
}

fn parse_hex(s: &str) -> Result<u8, ()> {
  let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
  // `from_str_radix` would also take a leading sign.
  if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
    return Err(());
  }
  u8::from_str_radix(digits, 16).map_err(|_| ())
}

/// `PHASE_SEL` and the phase data it multiplexes.
const fn in_phase_window(addr: u8) -> bool {
  matches!(addr, 0x60..=0x6A)
}

impl FromStr for RegisterRequest {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.split_once('=') {
      Some((addr, value)) => Ok(Self::write(parse_hex(addr)?, parse_hex(value)?)),
      None => Ok(Self::read(parse_hex(s)?)),
    }
  }
}

/// Result of one register access.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterAccess<E> {
  pub addr: u8,
  pub result: Result<u8, Error<E>>,
}

/// Identification registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipInfo {
  pub who_am_i: u8,
  pub revision: u8,
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
  /// Write (when a value is given) and read back each requested register.
  ///
  /// The requested addresses become the dump list used by
  /// [`Sx9324::dump_registers`]. Each entry reports its own outcome; addresses
  /// outside the access policy fail without bus traffic. Requests touching
  /// `PHASE_SEL` or the phase data hold the acquisition lock throughout.
  pub async fn read_write_registers(
    &self,
    requests: &[RegisterRequest],
  ) -> Result<Vec<RegisterAccess<E>, MAX_REQUESTS>, Error<E>> {
    if requests.len() > MAX_REQUESTS {
      return Err(Error::InvalidArgument);
    }

    let _window = if requests.iter().any(|req| in_phase_window(req.addr)) {
      Some(self.snapshot.lock().await)
    } else {
      None
    };

    let mut selected = Vec::new();
    let mut out = Vec::new();
    for req in requests {
      let result = self.access(*req).await;
      if result.is_err() {
        error!("failed accessing register {:#x}", req.addr);
      }
      // Both fit: the request length was checked above.
      let _ = selected.push(req.addr);
      let _ = out.push(RegisterAccess { addr: req.addr, result });
    }

    *self.dump.lock().await = selected;
    Ok(out)
  }

  /// Parse a textual request (see [`RegisterRequest::parse_list`]) and run it.
  pub async fn execute_register_command(&self, command: &str) -> Result<Vec<RegisterAccess<E>, MAX_REQUESTS>, Error<E>> {
    let requests = RegisterRequest::parse_list(command).map_err(|_| Error::InvalidArgument)?;
    self.read_write_registers(&requests).await
  }

  /// Read back every register of the last request.
  pub async fn dump_registers(&self) -> Vec<RegisterAccess<E>, MAX_REQUESTS> {
    let selected = self.dump.lock().await.clone();
    let _window = if selected.iter().any(|&addr| in_phase_window(addr)) {
      Some(self.snapshot.lock().await)
    } else {
      None
    };

    let mut out = Vec::new();
    for addr in selected {
      let result = self.read_addr(addr).await;
      if result.is_err() {
        error!("failed reading register {:#x}", addr);
      }
      let _ = out.push(RegisterAccess { addr, result });
    }
    out
  }

  /// Management alias for [`Sx9324::software_reset`].
  pub async fn trigger_software_reset(&self) -> Result<(), Error<E>> {
    self.software_reset().await
  }

  pub async fn chip_info(&self) -> Result<ChipInfo, Error<E>> {
    let who_am_i = self.read_reg(Reg::WhoAmI).await?;
    let revision = self.read_reg(Reg::Rev).await?;
    Ok(ChipInfo { who_am_i, revision })
  }

  async fn access(&self, req: RegisterRequest) -> Result<u8, Error<E>> {
    if let Some(value) = req.value {
      self.write_addr(req.addr, value).await?;
      debug!("wrote register {:#x} with value {:#x}", req.addr, value);
    }
    self.read_addr(req.addr).await
  }
}

#[cfg(test)]
mod tests {
  use embassy_futures::{block_on, join::join, yield_now};

  use super::*;
  use crate::mock::{rig, Event};

  #[test]
  fn parse_accepts_reads_and_writes() {
    let list = RegisterRequest::parse_list("  10=45 11\t0x60=0x2 ").unwrap();
    assert_eq!(
      list.as_slice(),
      [RegisterRequest::write(0x10, 0x45), RegisterRequest::read(0x11), RegisterRequest::write(0x60, 0x02)]
    );
    assert!(RegisterRequest::parse_list("").unwrap().is_empty());
  }

  #[test]
  fn parse_rejects_malformed_and_oversized() {
    assert_eq!(RegisterRequest::parse_list("zz"), Err(()));
    assert_eq!(RegisterRequest::parse_list("10=100"), Err(()));
    assert_eq!(RegisterRequest::parse_list("10="), Err(()));
    assert_eq!(RegisterRequest::parse_list("+10=+5"), Err(()));
    assert_eq!(RegisterRequest::parse_list("0x"), Err(()));
    assert_eq!(RegisterRequest::parse_list("1 2 3 4 5 6 7 8 9"), Err(()));
  }

  #[test]
  fn write_then_read_back() {
    let (hw, dev) = rig();
    let out = block_on(dev.read_write_registers(&[RegisterRequest::write(0x30, 0x12), RegisterRequest::read(0x11)])).unwrap();
    assert_eq!(out[0], RegisterAccess { addr: 0x30, result: Ok(0x12) });
    assert_eq!(out[1], RegisterAccess { addr: 0x11, result: Ok(0x00) });
    assert_eq!(hw.borrow().events, [Event::Write(0x30, 0x12), Event::Read(0x30), Event::Read(0x11)]);
  }

  #[test]
  fn policy_rejects_before_bus_traffic() {
    let (hw, dev) = rig();
    let out = block_on(dev.read_write_registers(&[
      RegisterRequest::write(0x61, 0x01),
      RegisterRequest::read(Reg::Reset.into()),
      RegisterRequest::read(0x21),
    ]))
    .unwrap();
    assert_eq!(out[0].result, Err(Error::NotWriteable(0x61)));
    assert_eq!(out[1].result, Err(Error::NotReadable(0x9F)));
    assert_eq!(out[2].result, Err(Error::NotReadable(0x21)));
    assert!(hw.borrow().events.is_empty());
  }

  #[test]
  fn too_many_requests_is_invalid() {
    let (_hw, dev) = rig();
    let requests = [RegisterRequest::read(0x10); MAX_REQUESTS + 1];
    assert_eq!(block_on(dev.read_write_registers(&requests)), Err(Error::InvalidArgument));
    assert_eq!(block_on(dev.execute_register_command("nope")), Err(Error::InvalidArgument));
  }

  #[test]
  fn dump_rereads_last_selection() {
    let (hw, dev) = rig();
    block_on(dev.execute_register_command("10=45 fa")).unwrap();
    hw.borrow_mut().set_reg(Reg::GnrlCtrl0, 0x46);
    hw.borrow_mut().set_reg(Reg::WhoAmI, 0x23);
    let dump = block_on(dev.dump_registers());
    assert_eq!(dump.as_slice(), [RegisterAccess { addr: 0x10, result: Ok(0x46) }, RegisterAccess { addr: 0xFA, result: Ok(0x23) }]);
  }

  #[test]
  fn chip_info_reads_identity() {
    let (hw, dev) = rig();
    hw.borrow_mut().set_reg(Reg::WhoAmI, 0x23);
    hw.borrow_mut().set_reg(Reg::Rev, 0x11);
    assert_eq!(block_on(dev.chip_info()), Ok(ChipInfo { who_am_i: 0x23, revision: 0x11 }));
  }

  #[test]
  fn phase_select_waits_for_acquisition_lock() {
    let (hw, dev) = rig();
    let ((), out) = block_on(join(
      async {
        let guard = dev.snapshot.lock().await;
        for _ in 0..4 {
          yield_now().await;
        }
        // Unrelated registers are not held back.
        assert!(hw.borrow().events.contains(&Event::Read(0x10)));
        assert!(!hw.borrow().events.iter().any(|e| matches!(e, Event::Write(0x60, _))));
        drop(guard);
      },
      async {
        let plain = dev.read_write_registers(&[RegisterRequest::read(0x10)]).await;
        assert!(plain.is_ok());
        dev.execute_register_command("60=3 61").await
      },
    ));
    let out = out.unwrap();
    assert_eq!(out[0], RegisterAccess { addr: 0x60, result: Ok(0x03) });
    assert!(hw.borrow().events.ends_with(&[Event::Write(0x60, 0x03), Event::Read(0x60), Event::Read(0x61)]));
  }

  #[test]
  fn dump_of_phase_window_waits_for_acquisition_lock() {
    let (hw, dev) = rig();
    block_on(dev.execute_register_command("60 61")).unwrap();
    hw.borrow_mut().events.clear();

    let ((), dump) = block_on(join(
      async {
        let guard = dev.snapshot.lock().await;
        for _ in 0..4 {
          yield_now().await;
        }
        assert!(hw.borrow().events.is_empty());
        drop(guard);
      },
      dev.dump_registers(),
    ));
    assert_eq!(dump.len(), 2);
    assert_eq!(hw.borrow().events, [Event::Read(0x60), Event::Read(0x61)]);
  }
}
