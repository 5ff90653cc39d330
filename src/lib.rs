pub mod devices;
pub mod error;
pub mod firmware;
pub mod utils;

pub use devices::{DeviceProfile, PartName, Registry};
pub use error::{FirmwareError, Result};
pub use firmware::build::{build_firmware, BuildOptions};
pub use firmware::split::{parse, split_firmware, ParsedImage, SplitOptions};
