use std::io::Cursor;
use std::path::PathBuf;

use binrw::BinRead;
use tracing::{debug, warn};

use crate::devices::{Identification, PartName, Registry};
use crate::error::{FirmwareError, Result};
use crate::utils::{checksum, common};
use super::include::*;
use super::validate::check_magic;
use super::{Identity, PartSlot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMatch {
    Known(String),
    Unknown,
    Ambiguous(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct ParsedPart {
    pub slot: PartSlot,
    pub data: Vec<u8>,
    /// The image ended before `offset + size` and `data` was zero-filled.
    pub truncated: bool,
    /// The slot points too far past the end of the image; `data` is empty.
    pub unreadable: bool,
    pub computed_checksum: u32,
}

impl ParsedPart {
    pub fn checksum_ok(&self) -> bool {
        self.computed_checksum == self.slot.checksum
    }
}

#[derive(Debug, Clone)]
pub struct ParsedImage {
    pub header_start: usize,
    pub identity: Identity,
    pub device: DeviceMatch,
    pub parts: Vec<ParsedPart>,
    /// Bytes after the end of the last part.
    pub trailing_bytes: usize,
}

impl ParsedImage {
    pub fn part(&self, name: &str) -> Option<&ParsedPart> {
        self.parts.iter().find(|p| p.slot.name.eq_ignore_ascii_case(name))
    }
}

/// Locates the identity marker, decodes the header in front of it and reads every part.
/// Checksum mismatches and truncation are logged, never fatal.
pub fn parse(image: &[u8], registry: &Registry) -> Result<ParsedImage> {
    let window = &image[..image.len().min(HEADER_SEARCH_WINDOW)];
    let header_start = find_marker(window).ok_or(FirmwareError::SignatureNotFound)?;

    let part_count = header_start / PART_TABLE_STRIDE;
    if header_start % PART_TABLE_STRIDE != 0 {
        warn!("Marker at offset {} is not a multiple of {}, assuming {} parts", header_start, PART_TABLE_STRIDE, part_count);
    }

    let (identity_bytes, _) = common::read_padded(image, header_start, IDENTITY_BLOCK_SIZE);
    let identity = Identity::from_block(&IdentityBlock::read(&mut Cursor::new(&identity_bytes))?);
    let table = PartTable::read_args(&mut Cursor::new(&image[..header_start]), (part_count,))?;

    let device = match registry.identify(&identity.signature, identity.product_id, identity.custom_id, identity.model_id) {
        Identification::Known(profile) if profile.parts.len() == part_count => {
            DeviceMatch::Known(profile.name.to_string())
        }
        Identification::Known(profile) => {
            warn!(
                "Header holds {} parts but {} declares {}, treating as unknown",
                part_count,
                profile.name,
                profile.parts.len()
            );
            DeviceMatch::Unknown
        }
        Identification::Unknown => DeviceMatch::Unknown,
        Identification::Ambiguous(hits) => {
            let candidates: Vec<String> = hits.iter().map(|p| p.name.to_string()).collect();
            warn!("{}", FirmwareError::AmbiguousDevice { candidates: candidates.clone() });
            DeviceMatch::Ambiguous(candidates)
        }
    };

    let (names, header_end): (Vec<Option<PartName>>, usize) = match &device {
        DeviceMatch::Known(name) => {
            let profile = registry.lookup(name)?;
            (profile.parts.iter().copied().map(Some).collect(), profile.header_size)
        }
        _ => (vec![None; part_count], header_start + IDENTITY_BLOCK_SIZE),
    };

    let mut parts = Vec::with_capacity(part_count);
    let mut end_of_parts = header_end;
    for (i, (entry, &stored)) in table.entries.iter().zip(&table.checksums).enumerate() {
        let mut slot = match names[i] {
            Some(kind) => PartSlot::named(kind),
            None => PartSlot::anonymous(i),
        };
        slot.offset = entry.offset;
        slot.size = entry.size;
        slot.checksum = stored;

        let part_end = (entry.offset as usize).saturating_add(entry.size as usize);
        let missing = part_end.saturating_sub(image.len());
        let unreadable = missing > MAX_ZERO_FILL;
        let (data, truncated) = if unreadable {
            warn!(
                "{} claims {} bytes at offset {} but the image is only {} bytes, not reading it",
                slot.name,
                entry.size,
                entry.offset,
                image.len()
            );
            (Vec::new(), true)
        } else {
            common::read_padded(image, entry.offset as usize, entry.size as usize)
        };
        if truncated && !unreadable {
            warn!(
                "Image ends before {} does ({} + {} > {}), padding with zeros",
                slot.name,
                entry.offset,
                entry.size,
                image.len()
            );
        }
        if !slot.is_empty() {
            end_of_parts = end_of_parts.max(part_end);
        }

        let computed_checksum = checksum::fold(&data);
        if computed_checksum != stored {
            warn!("{}", FirmwareError::ChecksumMismatch { part: slot.name.clone(), stored, computed: computed_checksum });
        }
        debug!("{}: offset {}, size {}, checksum {:#010x}", slot.name, slot.offset, slot.size, stored);

        parts.push(ParsedPart { slot, data, truncated, unreadable, computed_checksum });
    }

    let trailing_bytes = image.len().saturating_sub(end_of_parts);
    if trailing_bytes > 0 {
        warn!("{} bytes of trailing data after the last part", trailing_bytes);
    }

    Ok(ParsedImage { header_start, identity, device, parts, trailing_bytes })
}

/// Everything the `split` command was given. Outputs are keyed by part name.
#[derive(Debug, Clone, Default)]
pub struct SplitOptions {
    pub image: PathBuf,
    pub outputs: Vec<(String, PathBuf)>,
    /// Suppresses the report on stdout.
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct SplitReport {
    pub image: ParsedImage,
    pub written: Vec<(String, PathBuf)>,
}

pub fn split_firmware(opts: &SplitOptions, registry: &Registry) -> Result<SplitReport> {
    let data = common::read_input(&opts.image)?;
    let image = parse(&data, registry)?;
    if !opts.quiet {
        print_report(&image);
    }

    let mut written = Vec::new();
    for (name, path) in &opts.outputs {
        let Some(part) = image.part(name) else {
            warn!("Image has no part named {}, not writing {}", name, path.display());
            continue;
        };
        if part.unreadable {
            warn!("{} could not be read from the image, not writing {}", part.slot.name, path.display());
            continue;
        }

        common::write_output(path, &part.data)?;
        if !opts.quiet {
            println!("- Saved {} to {}", part.slot.name, path.display());
        }
        written.push((part.slot.name.clone(), path.clone()));

        match part.slot.kind {
            Some(_) if part.slot.is_empty() => warn!("{} is empty", part.slot.name),
            Some(kind) => {
                if let Err(e) = check_magic(kind, &part.data) {
                    warn!("{}", e);
                }
            }
            None => {}
        }
    }

    Ok(SplitReport { image, written })
}

pub fn print_report(image: &ParsedImage) {
    match &image.device {
        DeviceMatch::Known(name) => println!("Device: {}", name),
        DeviceMatch::Unknown => println!("Device: unknown NAS"),
        DeviceMatch::Ambiguous(names) => println!("Device: ambiguous ({})", names.join(", ")),
    }
    println!("{}", image.identity);
    println!("Header at offset {}, {} parts", image.header_start, image.parts.len());

    for (i, part) in image.parts.iter().enumerate() {
        println!(
            "\n({}/{}) - {}, Offset: {}, Size: {}, Checksum: {:#010x} ({}){}",
            i + 1,
            image.parts.len(),
            part.slot.name,
            part.slot.offset,
            part.slot.size,
            part.slot.checksum,
            if part.checksum_ok() { "OK" } else { "MISMATCH" },
            if part.unreadable {
                ", unreadable"
            } else if part.truncated {
                ", truncated"
            } else {
                ""
            }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::build::{assemble, Layout};
    use crate::firmware::FirmwareHeader;
    use crate::devices::{DeviceProfile, THREE_PART_LAYOUT};

    fn layout_for(name: &str) -> Layout {
        let registry = Registry::builtin();
        let p = registry.lookup(name).unwrap();
        Layout {
            identity: Identity {
                signature: p.signature.to_string(),
                product_id: p.product_id,
                custom_id: p.custom_id,
                model_id: p.model_id,
                hardware_id: p.hardware_id.unwrap_or(0),
                sub_id: p.sub_id.unwrap_or(0),
            },
            parts: p.parts.to_vec(),
            header_size: p.header_size,
        }
    }

    #[test]
    fn parses_dns320_image() {
        let contents = vec![Some(vec![0xaa; 100]), Some(vec![0x01; 50]), None, None];
        let built = assemble(&layout_for("DNS-320"), &contents).unwrap();
        let parsed = parse(&built.bytes, &Registry::builtin()).unwrap();

        assert_eq!(parsed.device, DeviceMatch::Known("DNS-320".to_string()));
        assert_eq!(parsed.header_start, 48);
        assert_eq!(parsed.parts.len(), 4);
        assert!(parsed.parts.iter().all(ParsedPart::checksum_ok));
        assert_eq!(parsed.part("kernel").unwrap().data, vec![0xaa; 100]);
        assert_eq!(parsed.part("initrd").unwrap().slot.offset, 228);
        for name in ["squashfs", "defaults"] {
            let part = parsed.part(name).unwrap();
            assert_eq!((part.slot.size, part.slot.checksum), (0, 0));
            assert!(part.data.is_empty());
        }
        assert_eq!(parsed.trailing_bytes, 0);
    }

    #[test]
    fn three_part_device_round_trip() {
        let contents = vec![Some(vec![7; 33]), Some(vec![9; 64]), Some(vec![0x1f, 0x8b, 3, 4, 5])];
        let built = assemble(&layout_for("DNS-343"), &contents).unwrap();
        let parsed = parse(&built.bytes, &Registry::builtin()).unwrap();

        assert_eq!(parsed.device, DeviceMatch::Known("DNS-343".to_string()));
        assert_eq!(parsed.header_start, 36);
        for (slot, part) in built.header.parts.iter().zip(&parsed.parts) {
            assert_eq!(slot, &part.slot);
            assert!(part.checksum_ok());
        }
    }

    #[test]
    fn unknown_signature_gets_synthesized_names() {
        let mut layout = layout_for("DNS-323");
        layout.identity.signature = "Mystery".to_string();
        let built = assemble(&layout, &[Some(vec![1; 8]), Some(vec![2; 8]), None]).unwrap();
        let parsed = parse(&built.bytes, &Registry::builtin()).unwrap();

        assert_eq!(parsed.device, DeviceMatch::Unknown);
        let names: Vec<&str> = parsed.parts.iter().map(|p| p.slot.name.as_str()).collect();
        assert_eq!(names, ["unknown0", "unknown1", "unknown2"]);
        assert_eq!(parsed.parts[1].slot.offset, 72);
        assert!(parsed.parts.iter().all(|p| p.slot.kind.is_none()));
    }

    #[test]
    fn ambiguous_registry_falls_back_to_unknown_names() {
        let base: DeviceProfile = Registry::builtin().lookup("DNS-323").unwrap().clone();
        let registry = Registry::new(vec![base.clone(), DeviceProfile { name: "CLONE", ..base }]);
        let built = assemble(&layout_for("DNS-323"), &[Some(vec![1; 4]), Some(vec![2; 4]), None]).unwrap();
        let parsed = parse(&built.bytes, &registry).unwrap();

        assert_eq!(parsed.device, DeviceMatch::Ambiguous(vec!["DNS-323".to_string(), "CLONE".to_string()]));
        assert_eq!(parsed.parts[0].slot.name, "unknown0");
    }

    #[test]
    fn truncated_image_is_zero_padded() {
        let contents = vec![Some(vec![0x11; 16]), Some(vec![0x22; 16]), Some(vec![0x33; 16])];
        let built = assemble(&layout_for("DNS-321"), &contents).unwrap();
        let cut = &built.bytes[..built.bytes.len() - 8];
        let parsed = parse(cut, &Registry::builtin()).unwrap();

        let last = parsed.part("defaults").unwrap();
        assert!(last.truncated);
        assert_eq!(last.data.len(), 16);
        assert_eq!(&last.data[8..], &[0u8; 8]);
        assert!(!last.checksum_ok());
        assert!(parsed.part("kernel").unwrap().checksum_ok());
    }

    #[test]
    fn corrupted_payload_is_only_a_warning() {
        let contents = vec![Some(vec![0x11; 16]), Some(vec![0x22; 16]), None];
        let mut bytes = assemble(&layout_for("DNS-321"), &contents).unwrap().bytes;
        bytes[64] ^= 0xff;
        let parsed = parse(&bytes, &Registry::builtin()).unwrap();
        assert!(!parsed.part("kernel").unwrap().checksum_ok());
        assert!(parsed.part("initrd").unwrap().checksum_ok());
    }

    #[test]
    fn oversized_slot_is_not_allocated() {
        let mut kernel = PartSlot::anonymous(0);
        kernel.offset = 64;
        kernel.size = 0xFFFF_FFF0;
        let header = FirmwareHeader {
            parts: vec![kernel, PartSlot::anonymous(1), PartSlot::anonymous(2)],
            identity: Identity {
                signature: "Mystery".to_string(),
                product_id: 1,
                custom_id: 2,
                model_id: 3,
                hardware_id: 0,
                sub_id: 0,
            },
            header_size: 64,
        };
        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), 64);

        let parsed = parse(&bytes, &Registry::builtin()).unwrap();
        let part = &parsed.parts[0];
        assert!(part.unreadable);
        assert!(part.truncated);
        assert!(part.data.is_empty());
        assert_eq!(part.slot.size, 0xFFFF_FFF0);
        assert!(!parsed.parts[1].unreadable);
    }

    #[test]
    fn short_tail_is_still_padded() {
        let contents = vec![Some(vec![0x11; 16]), Some(vec![0x22; 16]), Some(vec![0x33; 4096])];
        let built = assemble(&layout_for("DNS-321"), &contents).unwrap();
        let parsed = parse(&built.bytes[..built.bytes.len() - 4000], &Registry::builtin()).unwrap();
        let last = parsed.part("defaults").unwrap();
        assert!(last.truncated && !last.unreadable);
        assert_eq!(last.data.len(), 4096);
    }

    #[test]
    fn missing_marker_is_fatal() {
        assert!(matches!(parse(&[0u8; 256], &Registry::builtin()), Err(FirmwareError::SignatureNotFound)));
        assert!(matches!(parse(&[], &Registry::builtin()), Err(FirmwareError::SignatureNotFound)));
    }

    #[test]
    fn trailing_data_is_counted() {
        let mut bytes = assemble(&layout_for("DNS-323"), &[Some(vec![1; 4]), Some(vec![2; 4]), None]).unwrap().bytes;
        bytes.extend_from_slice(&[0xee; 10]);
        let parsed = parse(&bytes, &Registry::builtin()).unwrap();
        assert_eq!(parsed.trailing_bytes, 10);
    }

    #[test]
    fn synthetic_registry_profile() {
        static PROFILE: DeviceProfile = DeviceProfile {
            name: "LAB-1",
            signature: "LabBox",
            product_id: 0x42,
            custom_id: 0,
            model_id: 3,
            hardware_id: None,
            sub_id: None,
            parts: THREE_PART_LAYOUT,
            header_size: 64,
        };
        let layout = Layout {
            identity: Identity {
                signature: "LabBox".to_string(),
                product_id: 0x42,
                custom_id: 0,
                model_id: 3,
                hardware_id: 9,
                sub_id: 8,
            },
            parts: THREE_PART_LAYOUT.to_vec(),
            header_size: FirmwareHeader::default_size(3),
        };
        let built = assemble(&layout, &[Some(vec![5; 12]), Some(vec![6; 12]), Some(vec![7; 12])]).unwrap();
        let parsed = parse(&built.bytes, &Registry::new(vec![PROFILE.clone()])).unwrap();
        assert_eq!(parsed.device, DeviceMatch::Known("LAB-1".to_string()));
        assert_eq!((parsed.identity.hardware_id, parsed.identity.sub_id), (9, 8));
    }
}
