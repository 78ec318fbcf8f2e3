use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::defs::IrqSource;
use crate::{PowerRail, Reg, Sx9324};

/// Interrupts queued for the worker before further edges are coalesced.
pub const IRQ_QUEUE_DEPTH: usize = 4;

/// Outcome reported by the interrupt top half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqReturn {
  Handled,
}

/// Interrupt top half, safe to call from the NIRQ falling-edge handler.
///
/// It never blocks and never touches the bus; it only queues work for
/// [`Sx9324::service_interrupt`].
pub struct IrqHandler<'a, M: RawMutex> {
  queue: &'a Channel<M, (), IRQ_QUEUE_DEPTH>,
}

impl<M: RawMutex> IrqHandler<'_, M> {
  pub fn on_interrupt(&self) -> IrqReturn {
    // A full queue already guarantees a pending IRQ_SRC read.
    if self.queue.try_send(()).is_err() {
      trace!("interrupt coalesced");
    }
    IrqReturn::Handled
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
  pub fn irq_handler(&self) -> IrqHandler<'_, M> {
    IrqHandler { queue: &self.irq_queue }
  }

  /// Interrupts waiting for the worker.
  pub fn pending_interrupts(&self) -> usize {
    self.irq_queue.len()
  }

  /// Wait for one queued interrupt and log its sources.
  ///
  /// Errors are logged and swallowed; `None` means `IRQ_SRC` could not be read.
  pub async fn service_interrupt(&self) -> Option<IrqSource> {
    self.irq_queue.receive().await;
    self.read_irq_source().await
  }

  /// Deferred interrupt worker. Handles queued interrupts one at a time, in
  /// arrival order, forever.
  pub async fn run_interrupt_worker(&self) -> ! {
    loop {
      self.service_interrupt().await;
    }
  }

  pub(crate) async fn drain_interrupts(&self) {
    while self.irq_queue.try_receive().is_ok() {
      self.read_irq_source().await;
    }
  }

  async fn read_irq_source(&self) -> Option<IrqSource> {
    match self.read_reg(Reg::IrqSrc).await {
      Ok(bits) => {
        let src = IrqSource::from_bits(bits);
        debug!(
          "IRQ SRC: {:#x}; Reset={}, Close={}, Far={}",
          bits,
          u8::from(src.reset()),
          u8::from(src.close_any()),
          u8::from(src.far_any())
        );
        Some(src)
      }
      Err(_) => {
        error!("failed to read register IRQ_SRC");
        None
      }
    }
  }
}
