pub mod build;
pub mod include;
pub mod split;
pub mod validate;

use std::fmt;
use std::io::Cursor;

use binrw::BinWrite;

use crate::devices::{signature_bytes, PartName};
use crate::error::{FirmwareError, Result};
use crate::utils::common;
use include::*;

/// Device identity fields stored in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub signature: String,
    pub product_id: u8,
    pub custom_id: u8,
    pub model_id: u8,
    pub hardware_id: u8,
    pub sub_id: u8,
}

impl Identity {
    fn to_block(&self) -> IdentityBlock {
        IdentityBlock {
            signature: signature_bytes(&self.signature),
            product_id: self.product_id,
            custom_id: self.custom_id,
            model_id: self.model_id,
            hardware_id: self.hardware_id,
            sub_id: self.sub_id,
        }
    }

    fn from_block(block: &IdentityBlock) -> Self {
        Self {
            signature: common::string_from_bytes(&block.signature),
            product_id: block.product_id,
            custom_id: block.custom_id,
            model_id: block.model_id,
            hardware_id: block.hardware_id,
            sub_id: block.sub_id,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Signature: {}, Product ID: {}, Custom ID: {}, Model ID: {}, Hardware ID: {}, Sub ID: {}",
            self.signature, self.product_id, self.custom_id, self.model_id, self.hardware_id, self.sub_id
        )
    }
}

/// One header slot. `kind` is `None` for slots of an unidentified device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSlot {
    pub name: String,
    pub kind: Option<PartName>,
    pub offset: u32,
    pub size: u32,
    pub checksum: u32,
}

impl PartSlot {
    pub fn named(kind: PartName) -> Self {
        Self { name: kind.to_string(), kind: Some(kind), offset: 0, size: 0, checksum: 0 }
    }

    pub fn anonymous(index: usize) -> Self {
        Self { name: format!("unknown{}", index), kind: None, offset: 0, size: 0, checksum: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareHeader {
    pub parts: Vec<PartSlot>,
    pub identity: Identity,
    pub header_size: usize,
}

impl FirmwareHeader {
    /// Part table plus identity block, before padding.
    pub fn min_size(part_count: usize) -> usize {
        PART_TABLE_STRIDE * part_count + IDENTITY_BLOCK_SIZE
    }

    /// Header size for layouts not tied to a known device: the minimum rounded up to 64.
    pub fn default_size(part_count: usize) -> usize {
        Self::min_size(part_count).div_ceil(64) * 64
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let min = Self::min_size(self.parts.len());
        if self.header_size < min {
            return Err(FirmwareError::Config(format!(
                "header size {} is too small for {} parts, need at least {}",
                self.header_size,
                self.parts.len(),
                min
            )));
        }

        let table = PartTable {
            entries: self.parts.iter().map(|p| PartEntry { offset: p.offset, size: p.size }).collect(),
            checksums: self.parts.iter().map(|p| p.checksum).collect(),
        };

        let mut writer = Cursor::new(Vec::with_capacity(self.header_size));
        table.write(&mut writer)?;
        self.identity.to_block().write(&mut writer)?;

        let mut bytes = writer.into_inner();
        bytes.resize(self.header_size, 0);
        Ok(bytes)
    }
}
