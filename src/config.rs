use crate::TransferKind;

pub const DEFAULT_FREQUENCY: u32 = 400_000;

/// SCL frequency range accepted by `init`; anything outside is clamped.
pub const MIN_FREQUENCY: u32 = 10_000;
pub const MAX_FREQUENCY: u32 = 1_000_000;

/// Attempts at getting a target to acknowledge its address before giving up.
pub const DEFAULT_ADDRESS_ATTEMPTS: u8 = 3;

/// Attempts at winning the bus (against other masters or our own slave engagement).
pub const DEFAULT_ARBITRATION_ATTEMPTS: u8 = 10;

/// Single byte answered to a read when no default response is configured.
pub(crate) const FALLBACK_RESPONSE: &[u8] = &[0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MasterConfig {
    pub address_attempts: u8,
    pub arbitration_attempts: u8,
}

impl MasterConfig {
    pub const fn new() -> Self {
        Self {
            address_attempts: DEFAULT_ADDRESS_ATTEMPTS,
            arbitration_attempts: DEFAULT_ARBITRATION_ATTEMPTS,
        }
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// SCL frequency in Hz.
    pub frequency: u32,
    pub master: MasterConfig,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_FREQUENCY,
            master: MasterConfig::new(),
        }
    }
}

/// Called from the event handler when this node gets addressed.
///
/// For [`TransferKind::TransmitToMaster`] the slice is the slave send buffer: fill it and
/// return the number of valid bytes, or `None` to answer with the default response.
/// For the receive kinds the slice is the slave receive buffer: return how many bytes to accept,
/// or `None` to acknowledge and discard whatever comes in.
pub type OnAddressed = fn(TransferKind, &mut [u8]) -> Option<usize>;

/// Called from the event handler when a slave exchange ends, with the bytes sent or received.
pub type OnCompleted = fn(TransferKind, &[u8]);

/// Slave identity of this node.
#[derive(Clone, Copy)]
pub struct SlaveConfig {
    pub(crate) address: u8,
    pub(crate) general_call: bool,
    pub(crate) default_response: &'static [u8],
    pub(crate) on_addressed: Option<OnAddressed>,
    pub(crate) on_completed: Option<OnCompleted>,
}

impl SlaveConfig {
    pub const fn new(address: u8) -> Self {
        Self {
            address,
            general_call: false,
            default_response: FALLBACK_RESPONSE,
            on_addressed: None,
            on_completed: None,
        }
    }

    /// No own address and no general call: the node never answers as a slave.
    pub const fn disabled() -> Self {
        Self::new(0)
    }

    pub const fn general_call(mut self, enabled: bool) -> Self {
        self.general_call = enabled;
        self
    }

    /// Answer used when `on_addressed` supplies nothing. An empty slice restores the single
    /// zero byte default.
    pub const fn default_response(mut self, response: &'static [u8]) -> Self {
        self.default_response = if response.is_empty() {
            FALLBACK_RESPONSE
        } else {
            response
        };
        self
    }

    pub const fn on_addressed(mut self, callback: OnAddressed) -> Self {
        self.on_addressed = Some(callback);
        self
    }

    pub const fn on_completed(mut self, callback: OnCompleted) -> Self {
        self.on_completed = Some(callback);
        self
    }

    pub const fn address(&self) -> u8 {
        self.address
    }

    /// Own address register value.
    pub const fn sla(&self) -> u8 {
        (self.address << 1) | self.general_call as u8
    }
}

impl core::fmt::Debug for SlaveConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SlaveConfig")
            .field("address", &self.address)
            .field("general_call", &self.general_call)
            .field("default_response", &self.default_response)
            .finish_non_exhaustive()
    }
}
