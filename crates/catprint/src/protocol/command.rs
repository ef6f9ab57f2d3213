//! Opcode table and constant payloads.

/// Printer opcodes. The set is fixed by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Steps to move the paper backwards.
    RetractPaper,
    /// Steps to move the paper forwards (u16).
    FeedPaper,
    /// One packed raster line. 1 bit = burn pixel.
    DrawBitmap,
    GetDevState,
    /// 0x31..=0x35.
    SetQuality,
    /// Eleven constant bytes, see [`Lattice`].
    ControlLattice,
    GetDevInfo,
    /// Heat energy, 1..=0xFFFF.
    SetEnergy,
    /// Device-specific speed byte, see [`PrintSpeed`].
    OtherFeedPaper,
    /// See [`DrawingMode`].
    DrawingMode,
}

impl Command {
    pub const ALL: [Command; 10] = [
        Command::RetractPaper,
        Command::FeedPaper,
        Command::DrawBitmap,
        Command::GetDevState,
        Command::SetQuality,
        Command::ControlLattice,
        Command::GetDevInfo,
        Command::SetEnergy,
        Command::OtherFeedPaper,
        Command::DrawingMode,
    ];

    /// The opcode byte sent on the wire.
    pub const fn code(self) -> u8 {
        match self {
            Command::RetractPaper => 0xa0,
            Command::FeedPaper => 0xa1,
            Command::DrawBitmap => 0xa2,
            Command::GetDevState => 0xa3,
            Command::SetQuality => 0xa4,
            Command::ControlLattice => 0xa6,
            Command::GetDevInfo => 0xa8,
            Command::SetEnergy => 0xaf,
            Command::OtherFeedPaper => 0xbd,
            Command::DrawingMode => 0xbe,
        }
    }

    /// Look up a command by opcode byte.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }
}

/// Lattice control payloads sent around the bitmap lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lattice {
    Print,
    Finish,
}

impl Lattice {
    pub const fn bytes(self) -> &'static [u8; 11] {
        match self {
            Lattice::Print => &[0xaa, 0x55, 0x17, 0x38, 0x44, 0x5f, 0x5f, 0x5f, 0x44, 0x38, 0x2c],
            Lattice::Finish => &[0xaa, 0x55, 0x17, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x17],
        }
    }
}

/// Speed value for [`Command::OtherFeedPaper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintSpeed {
    /// Used before drawing an image.
    Image,
    /// Used before feeding blank paper.
    Blank,
}

impl PrintSpeed {
    pub const fn byte(self) -> u8 {
        match self {
            PrintSpeed::Image => 0x23,
            PrintSpeed::Blank => 0x19,
        }
    }
}

/// Payload for [`Command::DrawingMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawingMode {
    Image,
    Text,
}

impl DrawingMode {
    pub const fn byte(self) -> u8 {
        match self {
            DrawingMode::Image => 0x00,
            DrawingMode::Text => 0x01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_table() {
        assert_eq!(Command::DrawBitmap.code(), 0xa2);
        assert_eq!(Command::SetEnergy.code(), 0xaf);
        assert_eq!(Command::OtherFeedPaper.code(), 0xbd);
    }

    #[test]
    fn test_from_code_roundtrips_every_opcode() {
        for cmd in Command::ALL {
            assert_eq!(Command::from_code(cmd.code()), Some(cmd));
        }
        assert_eq!(Command::from_code(0x00), None);
    }

    #[test]
    fn test_lattice_payloads_share_header() {
        assert_eq!(Lattice::Print.bytes()[..3], [0xaa, 0x55, 0x17]);
        assert_eq!(Lattice::Finish.bytes()[..3], [0xaa, 0x55, 0x17]);
        assert_ne!(Lattice::Print.bytes(), Lattice::Finish.bytes());
    }
}
