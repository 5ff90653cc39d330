use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::devices::{PartName, Registry, FOUR_PART_LAYOUT, THREE_PART_LAYOUT};
use crate::error::{FirmwareError, Result};
use crate::utils::{checksum, common};
use super::validate::check_magic;
use super::{FirmwareHeader, Identity, PartSlot};

/// Everything the `build` command was given.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub device: Option<String>,
    pub signature: Option<String>,
    pub product_id: Option<u8>,
    pub custom_id: Option<u8>,
    pub model_id: Option<u8>,
    pub hardware_id: Option<u8>,
    pub sub_id: Option<u8>,
    pub kernel: Option<PathBuf>,
    pub initrd: Option<PathBuf>,
    pub squashfs: Option<PathBuf>,
    pub defaults: Option<PathBuf>,
    pub output: PathBuf,
}

impl BuildOptions {
    pub fn source(&self, part: PartName) -> Option<&Path> {
        match part {
            PartName::Kernel => self.kernel.as_deref(),
            PartName::Initrd => self.initrd.as_deref(),
            PartName::Squashfs => self.squashfs.as_deref(),
            PartName::Defaults => self.defaults.as_deref(),
        }
    }
}

/// Identity, part order and header size of the image about to be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub identity: Identity,
    pub parts: Vec<PartName>,
    pub header_size: usize,
}

#[derive(Debug, Clone)]
pub struct BuiltImage {
    pub header: FirmwareHeader,
    pub bytes: Vec<u8>,
}

/// Explicit overrides win over the named device's profile. Without a device every
/// identity field has to be given.
pub fn resolve_layout(opts: &BuildOptions, registry: &Registry) -> Result<Layout> {
    let layout = match &opts.device {
        Some(name) => {
            let profile = registry.lookup(name)?;
            let identity = Identity {
                signature: opts.signature.clone().unwrap_or_else(|| profile.signature.to_string()),
                product_id: opts.product_id.unwrap_or(profile.product_id),
                custom_id: opts.custom_id.unwrap_or(profile.custom_id),
                model_id: opts.model_id.unwrap_or(profile.model_id),
                hardware_id: required(opts.hardware_id.or(profile.hardware_id), "hardware-id")?,
                sub_id: required(opts.sub_id.or(profile.sub_id), "sub-id")?,
            };
            Layout { identity, parts: profile.parts.to_vec(), header_size: profile.header_size }
        }
        None => {
            let identity = Identity {
                signature: required(opts.signature.clone(), "signature")?,
                product_id: required(opts.product_id, "product-id")?,
                custom_id: required(opts.custom_id, "custom-id")?,
                model_id: required(opts.model_id, "model-id")?,
                hardware_id: required(opts.hardware_id, "hardware-id")?,
                sub_id: required(opts.sub_id, "sub-id")?,
            };
            let parts = if opts.squashfs.is_some() { FOUR_PART_LAYOUT } else { THREE_PART_LAYOUT };
            Layout { identity, parts: parts.to_vec(), header_size: FirmwareHeader::default_size(parts.len()) }
        }
    };

    for part in PartName::ALL {
        if opts.source(part).is_some() && !layout.parts.contains(&part) {
            return Err(FirmwareError::Config(format!("this device has no {} part", part)));
        }
    }
    Ok(layout)
}

fn required<T>(value: Option<T>, flag: &str) -> Result<T> {
    value.ok_or_else(|| FirmwareError::Config(format!("no known device given and --{} is missing", flag)))
}

/// Computes offsets, sizes and checksums and concatenates header and parts.
/// `contents` follows `layout.parts`; `None` marks an absent part, which keeps
/// a zeroed slot and contributes no bytes.
pub fn assemble(layout: &Layout, contents: &[Option<Vec<u8>>]) -> Result<BuiltImage> {
    if contents.len() != layout.parts.len() {
        return Err(FirmwareError::Config(format!(
            "layout has {} parts but {} were supplied",
            layout.parts.len(),
            contents.len()
        )));
    }

    let mut offset = u32::try_from(layout.header_size)
        .map_err(|_| FirmwareError::Config(format!("header size {} does not fit in 32 bits", layout.header_size)))?;
    let mut slots = Vec::with_capacity(layout.parts.len());

    for (&part, data) in layout.parts.iter().zip(contents) {
        let mut slot = PartSlot::named(part);
        if let Some(data) = data {
            let size = u32::try_from(data.len())
                .map_err(|_| FirmwareError::Config(format!("{} is too large for a 32-bit size field", part)))?;
            slot.offset = offset;
            slot.size = size;
            slot.checksum = checksum::fold(data);
            offset = offset
                .checked_add(size)
                .ok_or_else(|| FirmwareError::Config("image exceeds 4 GiB".to_string()))?;
        }
        debug!("{}: offset {}, size {}, checksum {:#010x}", slot.name, slot.offset, slot.size, slot.checksum);
        slots.push(slot);
    }

    let header = FirmwareHeader { parts: slots, identity: layout.identity.clone(), header_size: layout.header_size };
    let mut bytes = header.to_bytes()?;
    for data in contents.iter().flatten() {
        bytes.extend_from_slice(data);
    }

    Ok(BuiltImage { header, bytes })
}

/// Resolves the layout, loads and checks every source, and only then writes the
/// image, so a failed gate leaves no output behind.
pub fn build_firmware(opts: &BuildOptions, registry: &Registry) -> Result<BuiltImage> {
    let layout = resolve_layout(opts, registry)?;

    for &part in &layout.parts {
        if part.is_mandatory() && opts.source(part).is_none() {
            return Err(FirmwareError::MissingInput(part));
        }
    }

    let mut contents = Vec::with_capacity(layout.parts.len());
    for &part in &layout.parts {
        let data = match opts.source(part) {
            Some(path) => {
                let data = common::read_input(path)?;
                check_magic(part, &data)?;
                Some(data)
            }
            None => None,
        };
        contents.push(data);
    }

    let image = assemble(&layout, &contents)?;
    common::write_output(&opts.output, &image.bytes)?;

    info!("Wrote {} bytes to {}", image.bytes.len(), opts.output.display());
    Ok(image)
}
