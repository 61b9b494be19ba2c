//! Flash programmer contract and firmware config record.

/// `{ type, version, blocks, crc }`. Compared byte-for-byte against the
/// stored copy to decide whether to open an OTA session.
#[cfg_attr(feature = "defmt", derive(defmt::Debug))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareConfig {
    pub fw_type: u16,
    pub version: u16,
    pub blocks: u16,
    pub crc: u16,
}

impl FirmwareConfig {
    pub const WIRE_LEN: usize = 8;

    pub fn to_bytes(self) -> [u8; Self::WIRE_LEN] {
        let mut out = [0u8; Self::WIRE_LEN];
        out[0..2].copy_from_slice(&self.fw_type.to_le_bytes());
        out[2..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..6].copy_from_slice(&self.blocks.to_le_bytes());
        out[6..8].copy_from_slice(&self.crc.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::WIRE_LEN {
            return None;
        }
        Some(FirmwareConfig {
            fw_type: u16::from_le_bytes(bytes[0..2].try_into().unwrap()),
            version: u16::from_le_bytes(bytes[2..4].try_into().unwrap()),
            blocks: u16::from_le_bytes(bytes[4..6].try_into().unwrap()),
            crc: u16::from_le_bytes(bytes[6..8].try_into().unwrap()),
        })
    }
}

/// Block-erase/write primitive for firmware image staging.
///
/// Layout: `[0..10)` is reserved for the bootloader header
/// (`"FLXIMG:" + size_hi + size_lo + ":"`); `[START_OFFSET..)` holds the
/// image. The CRC covers only the image region.
pub trait FlashProgrammer {
    /// Opens the flash session. `false` aborts the OTA session before
    /// anything is erased (`Error::FlashInitFailed`).
    fn init(&mut self) -> bool;

    fn erase(&mut self, offset: u32, len: u32) -> bool;

    fn write(&mut self, offset: u32, data: &[u8]) -> bool;

    fn read(&self, offset: u32, out: &mut [u8]);

    /// Reboots into the newly staged image. Never actually returns on
    /// real hardware; mock implementations just record the call.
    fn reboot(&mut self);
}
