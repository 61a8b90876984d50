use crate::Directive;

/// The register-level two-wire peripheral the controller drives.
///
/// Bit timing, clock generation and line sampling happen behind this trait. The controller is
/// its only user; nothing else may touch the peripheral once it has been handed over.
pub trait Peripheral {
    /// Programs the SCL frequency.
    fn set_frequency(&mut self, frequency: u32);

    /// Loads the next byte to shift out.
    fn write_data(&mut self, byte: u8);

    /// The last byte shifted in.
    fn read_data(&mut self) -> u8;

    /// Own address register: 7-bit address in the upper bits, general call enable in bit 0.
    fn own_address(&self) -> u8;

    fn set_own_address(&mut self, sla: u8);

    /// A previously requested stop condition has not been put on the bus yet.
    fn stop_pending(&self) -> bool;

    /// Tells the peripheral how to proceed.
    fn proceed(&mut self, directive: Directive);
}

/// Source of completion timestamps, in microseconds.
pub trait Clock {
    fn now_micros(&self) -> u32;
}

impl<F: Fn() -> u32> Clock for F {
    fn now_micros(&self) -> u32 {
        self()
    }
}

/// For setups that have no use for completion timestamps; always reports zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    fn now_micros(&self) -> u32 {
        0
    }
}
