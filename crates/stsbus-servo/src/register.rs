//! Register map of the STS servo control table.
//!
//! Only the registers the bus verbs touch are listed. Multi-byte registers
//! are little-endian.

use std::fmt;

/// A register in the servo control table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Device id (EPROM).
    Id,
    /// Which instructions get a reply (EPROM).
    ResponseLevel,
    /// Torque limit (EPROM).
    MaxTorque,
    /// Goal position (RAM).
    TargetPosition,
    /// EPROM write protection: 0 = unlocked, 1 = locked.
    LockFlag,
    /// Present position (read only).
    CurrentPosition,
    /// Present load (read only).
    CurrentLoad,
}

impl Register {
    pub const ALL: [Register; 7] = [
        Register::Id,
        Register::ResponseLevel,
        Register::MaxTorque,
        Register::TargetPosition,
        Register::LockFlag,
        Register::CurrentPosition,
        Register::CurrentLoad,
    ];

    /// Control table address.
    pub const fn address(self) -> u8 {
        match self {
            Register::Id => 5,
            Register::ResponseLevel => 8,
            Register::MaxTorque => 16,
            Register::TargetPosition => 42,
            Register::LockFlag => 55,
            Register::CurrentPosition => 56,
            Register::CurrentLoad => 60,
        }
    }

    /// Width in bytes (1 or 2).
    pub const fn width(self) -> u8 {
        match self {
            Register::Id | Register::ResponseLevel | Register::LockFlag => 1,
            Register::MaxTorque
            | Register::TargetPosition
            | Register::CurrentPosition
            | Register::CurrentLoad => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::Id => "ID",
            Register::ResponseLevel => "RESPONSE_LEVEL",
            Register::MaxTorque => "MAX_TORQUE",
            Register::TargetPosition => "TARGET_POS",
            Register::LockFlag => "LOCK_FLAG",
            Register::CurrentPosition => "CURRENT_POS",
            Register::CurrentLoad => "CURRENT_LOAD",
        }
    }

    /// Look up a register by its control table address.
    pub fn from_address(address: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|reg| reg.address() == address)
    }

    /// Largest value the register can hold.
    pub const fn max_value(self) -> u16 {
        match self.width() {
            1 => u8::MAX as u16,
            _ => u16::MAX,
        }
    }

    /// Serialize a value to the register's wire width.
    ///
    /// Returns `None` if the value does not fit.
    pub fn encode_value(self, value: u16) -> Option<Vec<u8>> {
        if value > self.max_value() {
            return None;
        }
        let bytes = value.to_le_bytes();
        Some(bytes[..self.width() as usize].to_vec())
    }

    /// Read a value of the register's width from the start of `bytes`.
    ///
    /// Returns `None` if `bytes` is too short.
    pub fn decode_value(self, bytes: &[u8]) -> Option<u16> {
        match (self.width(), bytes) {
            (1, [lo, ..]) => Some(*lo as u16),
            (2, [lo, hi, ..]) => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_and_width_table() {
        let table: Vec<(u8, u8)> = Register::ALL
            .iter()
            .map(|reg| (reg.address(), reg.width()))
            .collect();
        assert_eq!(
            table,
            vec![(5, 1), (8, 1), (16, 2), (42, 2), (55, 1), (56, 2), (60, 2)]
        );
    }

    #[test]
    fn lookup_by_address() {
        assert_eq!(Register::from_address(56), Some(Register::CurrentPosition));
        assert_eq!(Register::from_address(57), None);
    }

    #[test]
    fn encode_respects_width() {
        assert_eq!(Register::TargetPosition.encode_value(0x051A), Some(vec![0x1A, 0x05]));
        assert_eq!(Register::Id.encode_value(3), Some(vec![3]));
        assert_eq!(Register::Id.encode_value(256), None);
    }

    #[test]
    fn decode_little_endian() {
        assert_eq!(Register::CurrentPosition.decode_value(&[0x1A, 0x05]), Some(1306));
        assert_eq!(Register::ResponseLevel.decode_value(&[0x01, 0xFF]), Some(1));
        assert_eq!(Register::CurrentLoad.decode_value(&[0x01]), None);
        assert_eq!(Register::Id.decode_value(&[]), None);
    }
}
