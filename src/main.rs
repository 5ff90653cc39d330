use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::error;

use nasfw::devices::{PartName, Registry};
use nasfw::utils::logger;
use nasfw::{build_firmware, split_firmware, BuildOptions, SplitOptions};

#[derive(Parser, Debug)]
#[command(version, about = "Build and split NAS firmware images")]
struct Cli {
    /// More output, repeat for trace level
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a firmware image from its parts
    Build(BuildArgs),
    /// Show the header of a firmware image and extract its parts
    Split(SplitArgs),
    /// List the known devices
    Devices,
}

#[derive(Args, Debug)]
struct BuildArgs {
    #[arg(short, long)]
    kernel: Option<PathBuf>,
    #[arg(short, long)]
    initrd: Option<PathBuf>,
    #[arg(short, long)]
    squashfs: Option<PathBuf>,
    #[arg(short, long)]
    defaults: Option<PathBuf>,
    #[arg(short, long)]
    output: PathBuf,

    /// Known device to take the identity fields from
    #[arg(short = 'n', long)]
    device: Option<String>,
    #[arg(long)]
    signature: Option<String>,
    #[arg(long, value_parser = parse_byte)]
    product_id: Option<u8>,
    #[arg(long, value_parser = parse_byte)]
    custom_id: Option<u8>,
    #[arg(long, value_parser = parse_byte)]
    model_id: Option<u8>,
    #[arg(long, value_parser = parse_byte)]
    hardware_id: Option<u8>,
    #[arg(long, value_parser = parse_byte)]
    sub_id: Option<u8>,
}

#[derive(Args, Debug)]
struct SplitArgs {
    image: PathBuf,
    #[arg(short, long)]
    kernel: Option<PathBuf>,
    #[arg(short, long)]
    initrd: Option<PathBuf>,
    #[arg(short, long)]
    squashfs: Option<PathBuf>,
    #[arg(short, long)]
    defaults: Option<PathBuf>,

    /// Extra output as NAME=PATH, e.g. unknown0=part0.bin
    #[arg(long = "out-part", value_parser = parse_output)]
    out_parts: Vec<(String, PathBuf)>,
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex_str) => u8::from_str_radix(hex_str, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| format!("'{}' is not a byte value: {}", s, e))
}

fn parse_output(s: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = s.split_once('=').ok_or_else(|| format!("expected NAME=PATH, got '{}'", s))?;
    if name.is_empty() || path.is_empty() {
        return Err(format!("expected NAME=PATH, got '{}'", s));
    }
    Ok((name.to_string(), PathBuf::from(path)))
}

impl From<BuildArgs> for BuildOptions {
    fn from(args: BuildArgs) -> Self {
        BuildOptions {
            device: args.device,
            signature: args.signature,
            product_id: args.product_id,
            custom_id: args.custom_id,
            model_id: args.model_id,
            hardware_id: args.hardware_id,
            sub_id: args.sub_id,
            kernel: args.kernel,
            initrd: args.initrd,
            squashfs: args.squashfs,
            defaults: args.defaults,
            output: args.output,
        }
    }
}

impl From<SplitArgs> for SplitOptions {
    fn from(args: SplitArgs) -> Self {
        let named = [
            (PartName::Kernel, args.kernel),
            (PartName::Initrd, args.initrd),
            (PartName::Squashfs, args.squashfs),
            (PartName::Defaults, args.defaults),
        ];
        let mut outputs: Vec<(String, PathBuf)> = named
            .into_iter()
            .filter_map(|(part, path)| path.map(|p| (part.to_string(), p)))
            .collect();
        outputs.extend(args.out_parts);
        SplitOptions { image: args.image, outputs, quiet: false }
    }
}

fn split_options(args: SplitArgs, quiet: bool) -> SplitOptions {
    SplitOptions { quiet, ..SplitOptions::from(args) }
}

fn list_devices(registry: &Registry) {
    println!("{:<10} {:<9} {:>4} {:>4} {:>4} {:>4} {:>4} {:>6}  Parts", "Device", "Signature", "Prod", "Cust", "Mod", "Hw", "Sub", "Header");
    for p in registry.profiles() {
        let parts: Vec<&str> = p.parts.iter().map(PartName::as_str).collect();
        println!(
            "{:<10} {:<9} {:>4} {:>4} {:>4} {:>4} {:>4} {:>6}  {}",
            p.name,
            p.signature,
            p.product_id,
            p.custom_id,
            p.model_id,
            p.hardware_id.map_or("-".to_string(), |v| v.to_string()),
            p.sub_id.map_or("-".to_string(), |v| v.to_string()),
            p.header_size,
            parts.join(", ")
        );
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose, cli.quiet);

    let registry = Registry::builtin();
    let result = match cli.command {
        Command::Build(args) => build_firmware(&args.into(), &registry).map(|_| ()),
        Command::Split(args) => {
            let opts = split_options(args, cli.quiet);
            split_firmware(&opts, &registry).map(|_| ())
        }
        Command::Devices => {
            list_devices(&registry);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
