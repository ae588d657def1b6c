//! # qlprint CLI
//!
//! Command-line interface for Brother QL / PT label printers.
//!
//! ## Usage
//!
//! ```bash
//! # Show the printer status
//! qlprint --printer file:///dev/usb/lp0 status
//!
//! # Send a prepared instruction file and watch it print
//! qlprint send label.bin
//!
//! # Render the pages of an instruction file to PNG
//! qlprint analyze label.bin --filename-format 'page{counter:02}.png'
//!
//! # Queue page blocks and print them one by one with confirmation
//! qlprint --model QL-820NWB submit page1.bin page2.bin
//!
//! # Read and change printer settings
//! qlprint configure get auto-power-on
//! qlprint configure set power-off-delay 4
//!
//! # List supported models
//! qlprint info models
//! ```
//!
//! The printer and model can also be set with `QLPRINT_PRINTER` and
//! `QLPRINT_MODEL`.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use log::{debug, info, warn};

use qlprint::{
    Model, PrintQueue, QlError, device,
    device::SettingKey,
    protocol::{
        chunker::{UnknownOpcodePolicy, chunk},
        hex_format,
        merge::{MergeOptions, merge_instructions},
        opcodes::match_opcode,
        status::{MediaCategory, StatusFrame, UNKNOWN_MODEL},
    },
    raster::RawPageBuilder,
    reader,
    transport,
};

/// qlprint - Brother QL / PT label printer utility
#[derive(Parser, Debug)]
#[command(name = "qlprint")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Printer identifier: file:///dev/usb/lp0, /dev/usb/lp0 or tcp://host[:port]
    #[arg(short, long, env = "QLPRINT_PRINTER", default_value = "file:///dev/usb/lp0")]
    printer: String,

    /// Printer model
    #[arg(short, long, env = "QLPRINT_MODEL", default_value = "QL-800")]
    model: String,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Query the printer status
    Status {
        /// Print the decoded status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send an instruction file to the printer
    Send {
        file: PathBuf,

        /// Return right after writing instead of watching the printer
        #[arg(long)]
        no_wait: bool,
    },

    /// Render the pages of an instruction file to PNG images
    Analyze {
        file: PathBuf,

        /// Output file name pattern
        #[arg(short, long, default_value = reader::DEFAULT_FILENAME_FORMAT)]
        filename_format: String,

        /// Stop at the first unknown opcode instead of skipping it
        #[arg(long)]
        strict: bool,

        /// Print the merged instruction blocks
        #[arg(long)]
        dump: bool,
    },

    /// Print page block files one at a time, confirming each page
    Submit {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Drop pages that were not printed
        #[arg(long)]
        clear_on_failure: bool,
    },

    /// Read and modify printer settings
    Configure {
        #[arg(value_enum)]
        action: ConfigAction,

        /// power-off-delay or auto-power-on
        key: String,

        /// New value (set only)
        value: Option<u8>,
    },

    /// Show reference information
    Info {
        #[command(subcommand)]
        topic: InfoTopic,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ConfigAction {
    Get,
    Set,
}

#[derive(Subcommand, Debug)]
enum InfoTopic {
    /// List supported printer models
    Models,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), QlError> {
    match cli.command {
        Commands::Status { json } => {
            let mut printer = transport::open(&cli.printer)?;
            debug!("Sending status information request to the printer.");
            let status = device::get_status(&mut printer, false, None)?;
            if json {
                let out = serde_json::to_string_pretty(&status)
                    .map_err(|e| QlError::Usage(format!("Failed to serialize status: {}", e)))?;
                println!("{}", out);
            } else {
                print_status(&status);
            }
        }

        Commands::Send { file, no_wait } => {
            let data = std::fs::read(&file)?;
            let mut printer = transport::open(&cli.printer)?;
            let report = device::send(&mut printer, &data, !no_wait)?;
            info!("Outcome: {:?}", report.outcome);
        }

        Commands::Analyze {
            file,
            filename_format,
            strict,
            dump,
        } => {
            let data = std::fs::read(&file)?;
            let policy = if strict {
                UnknownOpcodePolicy::Abort
            } else {
                UnknownOpcodePolicy::Skip
            };

            if dump {
                let instructions = chunk(&data, policy)?;
                for block in merge_instructions(&instructions, MergeOptions::default()) {
                    let name = match_opcode(&block).map_or("?", |d| d.name);
                    println!("{:>16} ({:>6} bytes): {}", name, block.len(), preview(&block));
                }
            }

            let result = reader::reconstruct_stream_with(&data, policy, |page| {
                let name = reader::filename_for(&filename_format, page.number)?;
                page.save(&name)?;
                println!(
                    "Page saved as {} ({}x{} dots{})",
                    name,
                    page.width(),
                    page.height(),
                    if page.two_color { ", two-color" } else { "" }
                );
                Ok(())
            });
            if let Err(e) = result {
                warn!("Stopped reading {} after the pages above", file.display());
                return Err(e);
            }
        }

        Commands::Submit {
            files,
            clear_on_failure,
        } => {
            let model = Model::by_identifier(&cli.model)
                .ok_or_else(|| QlError::Usage(format!("Unknown model '{}'", cli.model)))?;
            let printer = transport::open(&cli.printer)?;
            let mut queue = PrintQueue::new(printer, RawPageBuilder::new(model));
            for file in &files {
                queue.queue_page(std::fs::read(file)?)?;
            }

            let completed = queue.submit(clear_on_failure)?;
            if completed {
                println!("Printed {} pages", files.len());
            } else {
                println!(
                    "Printing stopped, {} pages left in the queue",
                    queue.page_count()
                );
                if !queue.last_errors().is_empty() {
                    println!("Errors: {:?}", queue.last_errors());
                }
                std::process::exit(2);
            }
        }

        Commands::Configure { action, key, value } => {
            let key = SettingKey::parse(&key)?;
            let value = match (action, value) {
                (ConfigAction::Get, _) => None,
                (ConfigAction::Set, Some(v)) => Some(v),
                (ConfigAction::Set, None) => {
                    return Err(QlError::Usage("A value is required for 'set'".into()));
                }
            };
            let mut printer = transport::open(&cli.printer)?;
            match device::configure(&mut printer, key, value)? {
                Some(v) => println!("{}: {}", key.name(), v),
                None => println!("{}: not reported", key.name()),
            }
        }

        Commands::Info { topic } => match topic {
            InfoTopic::Models => {
                println!("Supported models:");
                for identifier in Model::identifiers() {
                    println!("  {}", identifier);
                }
            }
        },
    }

    Ok(())
}

fn print_status(status: &StatusFrame) {
    println!("Model: {}", status.model);
    if status.model == UNKNOWN_MODEL {
        println!("Unknown printer detected");
        println!("Series Code: 0x{:02x}", status.series_code);
        println!("Model Code: 0x{:02x}", status.model_code);
    }
    println!("Status type: {}", status.status_type);
    println!("Phase: {}", status.phase_type);
    if status.has_errors() {
        println!("Errors: {:?}", status.errors);
    }
    println!(
        "Media type: [{}] {}",
        status.media_category,
        status.media_type.unwrap_or("Unknown")
    );
    if status.media_category == MediaCategory::TZe {
        println!("Note: tape color information may be incorrect for aftermarket tape cartridges.");
        if let Some(color) = status.tape_color {
            println!("Tape color: {}", color);
        }
        if let Some(color) = status.text_color {
            println!("Text color: {}", color);
        }
    }
    println!(
        "Media size: {} x {} mm",
        status.media_width, status.media_length
    );
}

/// Hex of the first bytes of a block.
fn preview(block: &[u8]) -> String {
    const MAX: usize = 24;
    if block.len() > MAX {
        format!("{} ...", hex_format(&block[..MAX]))
    } else {
        hex_format(block)
    }
}
