//! Instruction codes and device status bits.
//!
//! Requests carry an instruction in the byte after the length; replies carry
//! the device status in the same position.

use std::fmt;

/// Highest addressable device id.
pub const MAX_DEVICE_ID: u8 = 0xFD;

/// Broadcast id. Every device executes the command, none replies.
pub const BROADCAST_ID: u8 = 0xFE;

/// Instruction codes understood by the servos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Instruction {
    /// Presence check; the device replies with its status only.
    Ping = 0x01,
    /// Read `len` bytes starting at a register address.
    ReadData = 0x02,
    /// Write bytes starting at a register address.
    WriteData = 0x03,
    /// Buffered write, applied on [`Instruction::Action`].
    RegWrite = 0x04,
    /// Apply buffered writes.
    Action = 0x05,
    /// Restore factory settings.
    Reset = 0x06,
    /// Write the same register range on several devices at once.
    SyncWrite = 0x83,
}

impl Instruction {
    /// Returns a human-readable name for the instruction.
    pub fn name(self) -> &'static str {
        match self {
            Instruction::Ping => "PING",
            Instruction::ReadData => "READ_DATA",
            Instruction::WriteData => "WRITE_DATA",
            Instruction::RegWrite => "REG_WRITE",
            Instruction::Action => "ACTION",
            Instruction::Reset => "RESET",
            Instruction::SyncWrite => "SYNC_WRITE",
        }
    }
}

impl From<Instruction> for u8 {
    fn from(instruction: Instruction) -> Self {
        instruction as u8
    }
}

impl TryFrom<u8> for Instruction {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0x01 => Ok(Instruction::Ping),
            0x02 => Ok(Instruction::ReadData),
            0x03 => Ok(Instruction::WriteData),
            0x04 => Ok(Instruction::RegWrite),
            0x05 => Ok(Instruction::Action),
            0x06 => Ok(Instruction::Reset),
            0x83 => Ok(Instruction::SyncWrite),
            other => Err(other),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Status byte of a device reply. Zero means no fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Status(u8);

impl Status {
    /// Input voltage out of range.
    pub const VOLTAGE: u8 = 0x01;
    /// Angle sensor fault.
    pub const ANGLE: u8 = 0x02;
    /// Overheating.
    pub const OVERHEAT: u8 = 0x04;
    /// Over-current.
    pub const OVERCURRENT: u8 = 0x08;
    /// Overload.
    pub const OVERLOAD: u8 = 0x20;

    const NAMED: [(u8, &'static str); 5] = [
        (Self::VOLTAGE, "voltage"),
        (Self::ANGLE, "angle"),
        (Self::OVERHEAT, "overheat"),
        (Self::OVERCURRENT, "overcurrent"),
        (Self::OVERLOAD, "overload"),
    ];

    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when the device reported no fault.
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// True when every bit in `flag` is set.
    pub const fn contains(self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    /// Names of the fault bits that are set, in bit order.
    pub fn faults(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl From<u8> for Status {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return f.write_str("ok");
        }
        let known = Self::NAMED.iter().fold(0u8, |acc, (bit, _)| acc | bit);
        let mut parts: Vec<String> = self.faults().into_iter().map(str::to_string).collect();
        let unknown = self.0 & !known;
        if unknown != 0 {
            parts.push(format!("0x{unknown:02X}"));
        }
        f.write_str(&parts.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_codes_roundtrip() {
        for instruction in [
            Instruction::Ping,
            Instruction::ReadData,
            Instruction::WriteData,
            Instruction::RegWrite,
            Instruction::Action,
            Instruction::Reset,
            Instruction::SyncWrite,
        ] {
            assert_eq!(Instruction::try_from(u8::from(instruction)), Ok(instruction));
        }
        assert_eq!(Instruction::try_from(0x07), Err(0x07));
    }

    #[test]
    fn instruction_wire_values() {
        assert_eq!(u8::from(Instruction::ReadData), 0x02);
        assert_eq!(u8::from(Instruction::SyncWrite), 0x83);
        assert_eq!(Instruction::WriteData.to_string(), "WRITE_DATA");
    }

    #[test]
    fn status_ok_and_faults() {
        assert!(Status::new(0).is_ok());
        assert_eq!(Status::new(0).to_string(), "ok");

        let status = Status::new(Status::OVERHEAT | Status::OVERLOAD);
        assert!(!status.is_ok());
        assert_eq!(status.faults(), vec!["overheat", "overload"]);
        assert_eq!(status.to_string(), "overheat|overload");
    }

    #[test]
    fn status_unknown_bits_shown_as_hex() {
        let status = Status::new(Status::VOLTAGE | 0x40);
        assert_eq!(status.to_string(), "voltage|0x40");
    }
}
