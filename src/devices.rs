use std::fmt;

use crate::error::{FirmwareError, Result};

/// Width of the signature field inside the identity block.
pub const SIGNATURE_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartName {
    Kernel,
    Initrd,
    Squashfs,
    Defaults,
}

impl PartName {
    pub const ALL: [PartName; 4] = [PartName::Kernel, PartName::Initrd, PartName::Squashfs, PartName::Defaults];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartName::Kernel => "kernel",
            PartName::Initrd => "initrd",
            PartName::Squashfs => "squashfs",
            PartName::Defaults => "defaults",
        }
    }

    /// Kernel and initrd must always be supplied when building.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, PartName::Kernel | PartName::Initrd)
    }
}

impl fmt::Display for PartName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const THREE_PART_LAYOUT: &[PartName] = &[PartName::Kernel, PartName::Initrd, PartName::Defaults];
pub const FOUR_PART_LAYOUT: &[PartName] = &[PartName::Kernel, PartName::Initrd, PartName::Squashfs, PartName::Defaults];

/// One supported hardware model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub signature: &'static str,
    pub product_id: u8,
    pub custom_id: u8,
    pub model_id: u8,
    /// Only needed when building, the parser takes these from the header.
    pub hardware_id: Option<u8>,
    pub sub_id: Option<u8>,
    pub parts: &'static [PartName],
    pub header_size: usize,
}

impl DeviceProfile {
    pub fn matches(&self, signature: &str, product_id: u8, custom_id: u8, model_id: u8) -> bool {
        signature_bytes(self.signature) == signature_bytes(signature)
            && self.product_id == product_id
            && self.custom_id == custom_id
            && self.model_id == model_id
    }
}

/// Null-pads or truncates a signature to its on-disk width.
pub fn signature_bytes(signature: &str) -> [u8; SIGNATURE_WIDTH] {
    let mut out = [0u8; SIGNATURE_WIDTH];
    let src = signature.as_bytes();
    let len = src.len().min(SIGNATURE_WIDTH);
    out[..len].copy_from_slice(&src[..len]);
    out
}

pub static KNOWN_DEVICES: &[DeviceProfile] = &[
    DeviceProfile {
        name: "DNS-323",
        signature: "FrodoII",
        product_id: 7,
        custom_id: 1,
        model_id: 1,
        hardware_id: Some(0),
        sub_id: Some(0),
        parts: THREE_PART_LAYOUT,
        header_size: 64,
    },
    DeviceProfile {
        name: "CH3SNAS",
        signature: "FrodoII",
        product_id: 7,
        custom_id: 2,
        model_id: 1,
        hardware_id: Some(0),
        sub_id: Some(0),
        parts: THREE_PART_LAYOUT,
        header_size: 64,
    },
    DeviceProfile {
        name: "DNS-321",
        signature: "Chopper",
        product_id: 10,
        custom_id: 1,
        model_id: 1,
        hardware_id: Some(0),
        sub_id: Some(0),
        parts: THREE_PART_LAYOUT,
        header_size: 64,
    },
    DeviceProfile {
        name: "DNS-343",
        signature: "Gandolf",
        product_id: 9,
        custom_id: 1,
        model_id: 1,
        hardware_id: Some(0),
        sub_id: Some(0),
        parts: THREE_PART_LAYOUT,
        header_size: 64,
    },
    DeviceProfile {
        name: "DNS-320",
        signature: "DNS320",
        product_id: 11,
        custom_id: 1,
        model_id: 1,
        hardware_id: Some(1),
        sub_id: Some(1),
        parts: FOUR_PART_LAYOUT,
        header_size: 128,
    },
    DeviceProfile {
        name: "DNS-325",
        signature: "DNS325",
        product_id: 12,
        custom_id: 1,
        model_id: 1,
        hardware_id: Some(1),
        sub_id: Some(1),
        parts: FOUR_PART_LAYOUT,
        header_size: 128,
    },
];

/// Outcome of matching a decoded identity tuple against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identification<'a> {
    Known(&'a DeviceProfile),
    Unknown,
    Ambiguous(Vec<&'a DeviceProfile>),
}

/// Immutable table of device profiles handed to the builder and parser.
#[derive(Debug, Clone)]
pub struct Registry {
    profiles: Vec<DeviceProfile>,
}

impl Registry {
    pub fn new(profiles: Vec<DeviceProfile>) -> Self {
        Self { profiles }
    }

    pub fn builtin() -> Self {
        Self::new(KNOWN_DEVICES.to_vec())
    }

    pub fn profiles(&self) -> &[DeviceProfile] {
        &self.profiles
    }

    pub fn lookup(&self, name: &str) -> Result<&DeviceProfile> {
        self.profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| FirmwareError::UnknownDevice(name.to_string()))
    }

    /// Every profile with this identity tuple. Zero or several hits are both valid answers.
    pub fn match_by_signature(&self, signature: &str, product_id: u8, custom_id: u8, model_id: u8) -> Vec<&DeviceProfile> {
        self.profiles
            .iter()
            .filter(|p| p.matches(signature, product_id, custom_id, model_id))
            .collect()
    }

    pub fn identify(&self, signature: &str, product_id: u8, custom_id: u8, model_id: u8) -> Identification<'_> {
        let mut hits = self.match_by_signature(signature, product_id, custom_id, model_id);
        match hits.len() {
            0 => Identification::Unknown,
            1 => Identification::Known(hits.remove(0)),
            _ => Identification::Ambiguous(hits),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::builtin()
    }
}
