// Licensed under the Apache-2.0 license

//! Common types and constants for the two-wire slave driver.
//!
//! This module provides the bus condition codes reported by the peripheral,
//! the control register flags, the write-side protocol state, and the
//! driver configuration.

use bitflags::bitflags;
use core::fmt;
use embedded_hal::i2c::{ErrorKind, SevenBitAddress};

/// Bits of the status register that carry the condition code.
pub const STATUS_MASK: u8 = 0xF8;

/// Slave address answered when no other address is configured.
pub const DEFAULT_SLAVE_ADDRESS: SevenBitAddress = 34;

/// Highest valid 7-bit slave address.
pub const MAX_SLAVE_ADDRESS: SevenBitAddress = 0x7F;

/// Address register bit that enables recognition of the general call address.
pub const GENERAL_CALL_ENABLE: u8 = 0x01;

bitflags! {
    /// Control register of the two-wire peripheral.
    ///
    /// `INT` is write-one-to-clear: writing the register with `INT` set
    /// acknowledges the pending condition and lets the hardware continue.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct TwiControl: u8 {
        const INT = 0x80;
        const ENABLE_ACK = 0x40;
        const START = 0x20;
        const STOP = 0x10;
        const WRITE_COLLISION = 0x08;
        const ENABLE = 0x04;
        const INT_ENABLE = 0x01;
    }
}

/// Condition reported by the peripheral when `INT` is raised.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BusCondition {
    /// Illegal start or stop condition on the bus.
    BusError = 0x00,
    /// Own address + W received, ACK returned.
    AddressMatchWrite = 0x60,
    /// General call address received, ACK returned.
    AddressMatchGeneralCallWrite = 0x70,
    /// Data byte received after own address, ACK returned.
    DataReceivedAck = 0x80,
    /// Data byte received after general call, ACK returned.
    GeneralCallDataAck = 0x90,
    /// Stop or repeated start received while addressed.
    StopOrRestart = 0xA0,
    /// Own address + R received, ACK returned.
    AddressMatchRead = 0xA8,
    /// Data byte transmitted, ACK received.
    DataTransmittedAck = 0xB8,
    /// Data byte transmitted, NACK received.
    DataTransmittedNack = 0xC0,
    /// Last data byte transmitted, ACK received.
    LastDataAckPending = 0xC8,
}

impl BusCondition {
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for BusCondition {
    type Error = Error;

    /// Decodes a status register value. Prescaler bits are ignored.
    fn try_from(status: u8) -> Result<Self, Self::Error> {
        let code = status & STATUS_MASK;
        let condition = match code {
            0x00 => Self::BusError,
            0x60 => Self::AddressMatchWrite,
            0x70 => Self::AddressMatchGeneralCallWrite,
            0x80 => Self::DataReceivedAck,
            0x90 => Self::GeneralCallDataAck,
            0xA0 => Self::StopOrRestart,
            0xA8 => Self::AddressMatchRead,
            0xB8 => Self::DataTransmittedAck,
            0xC0 => Self::DataTransmittedNack,
            0xC8 => Self::LastDataAckPending,
            other => return Err(Error::UnrecognizedCondition(other)),
        };
        Ok(condition)
    }
}

/// How the next received data byte of a write transaction is interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum WriteState {
    #[default]
    AwaitingAddressHighByte,
    AwaitingAddressLowByte,
    StreamingDataByte,
}

impl WriteState {
    /// Next state after a data byte was consumed. `StreamingDataByte` is terminal.
    #[must_use]
    pub const fn advance(self) -> Self {
        match self {
            Self::AwaitingAddressHighByte => Self::AwaitingAddressLowByte,
            Self::AwaitingAddressLowByte | Self::StreamingDataByte => Self::StreamingDataByte,
        }
    }
}

/// Memory location selected by the host, sent high byte first.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TargetAddress(u16);

impl TargetAddress {
    /// Reserved value requesting bootloader exit instead of selecting memory.
    pub const SENTINEL: Self = Self(0xFFFF);

    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn from_bytes(high: u8, low: u8) -> Self {
        Self(u16::from_be_bytes([high, low]))
    }

    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn is_exit_request(self) -> bool {
        self.0 == Self::SENTINEL.0
    }
}

/// Electrical state of the SCL/SDA pins.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LineMode {
    /// Inputs with the internal pull-ups enabled, owned by the peripheral.
    PullUpInput,
    /// Handed back to the application; pull-ups off.
    #[default]
    Released,
}

/// What the driver does with the in-progress transaction on a bus error.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BusErrorPolicy {
    /// Only release the bus; write state and target address are kept.
    #[default]
    Preserve,
    /// Release the bus and restart address capture on the next write.
    ResetTransaction,
}

/// Errors surfaced by the slave driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Hardware reported an illegal bus condition.
    BusProtocol,
    /// Status register held a code the driver does not handle.
    UnrecognizedCondition(u8),
    /// Configured slave address does not fit in 7 bits.
    InvalidSlaveAddress(u8),
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::BusProtocol => ErrorKind::Bus,
            Error::UnrecognizedCondition(_) | Error::InvalidSlaveAddress(_) => ErrorKind::Other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BusProtocol => f.write_str("bus error condition"),
            Error::UnrecognizedCondition(code) => {
                write!(f, "unrecognized bus condition {code:#04x}")
            }
            Error::InvalidSlaveAddress(addr) => write!(f, "invalid slave address {addr:#04x}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Observable record of the conditions the driver swallowed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TwiDiagnostics {
    /// Number of conditions serviced since `initialize`.
    pub events: u32,
    /// Number of bus error conditions.
    pub bus_errors: u16,
    /// Number of status codes outside the handled set.
    pub unrecognized_conditions: u16,
    /// Most recent unhandled status code.
    pub last_unrecognized: Option<u8>,
    /// Most recent decoded condition.
    pub last_condition: Option<BusCondition>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TwiConfig {
    pub slave_address: SevenBitAddress,
    pub general_call: bool,
    pub bus_error_policy: BusErrorPolicy,
}

impl TwiConfig {
    /// Default configuration answering at `slave_address`.
    #[must_use]
    pub fn with_address(slave_address: SevenBitAddress) -> Self {
        TwiConfigBuilder::new().slave_address(slave_address).build()
    }

    /// Value programmed into the slave address register.
    #[must_use]
    pub fn address_register(&self) -> u8 {
        let gc = if self.general_call {
            GENERAL_CALL_ENABLE
        } else {
            0
        };
        (self.slave_address << 1) | gc
    }
}

impl Default for TwiConfig {
    fn default() -> Self {
        TwiConfigBuilder::new().build()
    }
}

pub struct TwiConfigBuilder {
    slave_address: SevenBitAddress,
    general_call: bool,
    bus_error_policy: BusErrorPolicy,
}

impl Default for TwiConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TwiConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slave_address: DEFAULT_SLAVE_ADDRESS,
            general_call: true,
            bus_error_policy: BusErrorPolicy::Preserve,
        }
    }
    #[must_use]
    pub fn slave_address(mut self, address: SevenBitAddress) -> Self {
        self.slave_address = address;
        self
    }
    #[must_use]
    pub fn general_call(mut self, enabled: bool) -> Self {
        self.general_call = enabled;
        self
    }
    #[must_use]
    pub fn bus_error_policy(mut self, policy: BusErrorPolicy) -> Self {
        self.bus_error_policy = policy;
        self
    }
    #[must_use]
    pub fn build(self) -> TwiConfig {
        TwiConfig {
            slave_address: self.slave_address,
            general_call: self.general_call,
            bus_error_policy: self.bus_error_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::Error as _;

    #[test]
    fn test_condition_codes_decode() {
        let all = [
            BusCondition::BusError,
            BusCondition::AddressMatchWrite,
            BusCondition::AddressMatchGeneralCallWrite,
            BusCondition::DataReceivedAck,
            BusCondition::GeneralCallDataAck,
            BusCondition::StopOrRestart,
            BusCondition::AddressMatchRead,
            BusCondition::DataTransmittedAck,
            BusCondition::DataTransmittedNack,
            BusCondition::LastDataAckPending,
        ];
        for condition in all {
            assert_eq!(BusCondition::try_from(condition.code()), Ok(condition));
        }
    }

    #[test]
    fn test_prescaler_bits_are_masked() {
        assert_eq!(
            BusCondition::try_from(0x80 | 0x03),
            Ok(BusCondition::DataReceivedAck)
        );
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        // 0xF8: no relevant state information available
        let err = BusCondition::try_from(0xF8).unwrap_err();
        assert_eq!(err, Error::UnrecognizedCondition(0xF8));
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(Error::BusProtocol.kind(), ErrorKind::Bus);
    }

    #[test]
    fn test_write_state_never_regresses() {
        let mut state = WriteState::default();
        assert_eq!(state, WriteState::AwaitingAddressHighByte);
        state = state.advance();
        assert_eq!(state, WriteState::AwaitingAddressLowByte);
        state = state.advance();
        assert_eq!(state, WriteState::StreamingDataByte);
        assert_eq!(state.advance(), WriteState::StreamingDataByte);
    }

    #[test]
    fn test_target_address_is_big_endian() {
        assert_eq!(TargetAddress::from_bytes(0x12, 0x34).value(), 0x1234);
        assert!(TargetAddress::from_bytes(0xFF, 0xFF).is_exit_request());
        assert!(!TargetAddress::from_bytes(0xFF, 0xFE).is_exit_request());
    }

    #[test]
    fn test_config_defaults() {
        let config = TwiConfig::default();
        assert_eq!(config.slave_address, DEFAULT_SLAVE_ADDRESS);
        assert!(config.general_call);
        assert_eq!(config.bus_error_policy, BusErrorPolicy::Preserve);
        assert_eq!(config.address_register(), (34 << 1) | 1);
    }

    #[test]
    fn test_address_register_without_general_call() {
        let config = TwiConfigBuilder::new()
            .slave_address(0x10)
            .general_call(false)
            .build();
        assert_eq!(config.address_register(), 0x20);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", Error::UnrecognizedCondition(0x68)),
            "unrecognized bus condition 0x68"
        );
    }
}
