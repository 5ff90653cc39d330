use binrw::binrw;

use crate::devices::SIGNATURE_WIDTH;

pub const MARKER: [u8; 2] = [0x55, 0xAA];
/// Both header sizes in use fit in this many leading bytes.
pub const HEADER_SEARCH_WINDOW: usize = 128;
/// Bytes per part in the table: offset, size and checksum words.
pub const PART_TABLE_STRIDE: usize = 12;
/// marker + signature + marker + five ID bytes
pub const IDENTITY_BLOCK_SIZE: usize = 2 + SIGNATURE_WIDTH + 2 + 5;

pub const UIMAGE_MAGIC: [u8; 4] = [0x27, 0x05, 0x19, 0x56];
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
pub const SQUASHFS_MAGICS: [&[u8; 4]; 2] = [b"hsqs", b"shsq"];
pub const SQUASHFS_MAGIC_OFFSET: usize = 0x800;
/// Most zero bytes a short part gets padded with. A slot reaching further past
/// the end of the image is treated as unreadable.
pub const MAX_ZERO_FILL: usize = 64 * 1024 * 1024;

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartEntry {
    pub offset: u32,
    pub size: u32,
}

/// Leading part table: every (offset, size) pair, then every checksum.
#[binrw]
#[brw(little)]
#[br(import(part_count: usize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartTable {
    #[br(count = part_count)]
    pub entries: Vec<PartEntry>,
    #[br(count = part_count)]
    pub checksums: Vec<u32>,
}

#[binrw]
#[brw(little, magic = b"\x55\xAA")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityBlock {
    pub signature: [u8; SIGNATURE_WIDTH],
    #[br(temp, assert(inner_marker == MARKER))]
    #[bw(calc = MARKER)]
    inner_marker: [u8; 2],
    pub product_id: u8,
    pub custom_id: u8,
    pub model_id: u8,
    pub hardware_id: u8,
    pub sub_id: u8,
}

/// Offset of the first `55 AA <8 bytes> 55 AA` run inside `window`.
pub fn find_marker(window: &[u8]) -> Option<usize> {
    let span = 2 + SIGNATURE_WIDTH + 2;
    window
        .windows(span)
        .position(|w| w[..2] == MARKER && w[span - 2..] == MARKER)
}
