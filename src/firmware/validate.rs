use crate::devices::PartName;
use crate::error::{FirmwareError, Result};
use super::include::*;

/// Minimal content sniffing per part type: uImage magic for kernel and initrd,
/// gzip for defaults, squashfs superblock magic at 0x800.
pub fn check_magic(part: PartName, data: &[u8]) -> Result<()> {
    let fail = |reason: String| FirmwareError::Validation { part: part.to_string(), reason };

    match part {
        PartName::Kernel | PartName::Initrd => {
            if !data.starts_with(&UIMAGE_MAGIC) {
                return Err(fail(format!("expected uImage magic {:02x?}, found {:02x?}", UIMAGE_MAGIC, head(data, 4))));
            }
        }
        PartName::Defaults => {
            if !data.starts_with(&GZIP_MAGIC) {
                return Err(fail(format!("expected gzip magic {:02x?}, found {:02x?}", GZIP_MAGIC, head(data, 2))));
            }
        }
        PartName::Squashfs => {
            let magic = data.get(SQUASHFS_MAGIC_OFFSET..SQUASHFS_MAGIC_OFFSET + 4);
            if !magic.is_some_and(|m| SQUASHFS_MAGICS.iter().any(|s| m == s.as_slice())) {
                return Err(fail(format!("no squashfs magic (hsqs/shsq) at {:#x}", SQUASHFS_MAGIC_OFFSET)));
            }
        }
    }
    Ok(())
}

fn head(data: &[u8], n: usize) -> &[u8] {
    &data[..n.min(data.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uimage_parts() {
        assert!(check_magic(PartName::Kernel, &[0x27, 0x05, 0x19, 0x56, 0, 0]).is_ok());
        assert!(check_magic(PartName::Initrd, &[0x27, 0x05, 0x19, 0x56]).is_ok());
        assert!(matches!(check_magic(PartName::Kernel, &[0xaa; 100]), Err(FirmwareError::Validation { .. })));
        assert!(check_magic(PartName::Initrd, &[0x27, 0x05]).is_err());
    }

    #[test]
    fn defaults_must_be_gzip() {
        assert!(check_magic(PartName::Defaults, &[0x1f, 0x8b, 0x08, 0x00]).is_ok());
        assert!(check_magic(PartName::Defaults, b"PK\x03\x04").is_err());
        assert!(check_magic(PartName::Defaults, &[]).is_err());
    }

    #[test]
    fn squashfs_magic_at_0x800() {
        let mut image = vec![0u8; 0x1000];
        assert!(check_magic(PartName::Squashfs, &image).is_err());
        image[0x800..0x804].copy_from_slice(b"hsqs");
        assert!(check_magic(PartName::Squashfs, &image).is_ok());
        image[0x800..0x804].copy_from_slice(b"shsq");
        assert!(check_magic(PartName::Squashfs, &image).is_ok());
        assert!(check_magic(PartName::Squashfs, b"hsqs").is_err());
    }
}
