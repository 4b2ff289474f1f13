use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};
use imprint_core::{SystemMount, UnmountPolicy, WriteRequest, write};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "imprint")]
#[command(about = "Write disk images to block devices, safely unmounting them first", version)]
struct Cli {
    /// Log pipeline stages (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an image to a device
    Write {
        /// Image file to write
        #[arg(required = true)]
        image: PathBuf,

        /// Target device, e.g. /dev/sdb
        #[arg(required = true)]
        device: PathBuf,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Run the unmount command even if the device looks unmounted
        #[arg(short = 'f', long)]
        force_unmount: bool,

        /// How often to refresh progress, in milliseconds
        #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: u64,
    },
    /// Unmount a device without writing to it
    Unmount {
        /// Device to unmount, e.g. /dev/sdb
        #[arg(required = true)]
        device: PathBuf,

        /// Run the unmount command even if the device looks unmounted
        #[arg(short = 'f', long)]
        force_unmount: bool,
    },
}

fn unmount_policy(force: bool) -> UnmountPolicy {
    if force {
        UnmountPolicy::Unconditional
    } else {
        UnmountPolicy::CheckThenAct
    }
}

/// Sends logs to stderr so they stay clear of the progress bar.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Presents a final "Yes/No" confirmation to the user.
fn confirm_operation(prompt: &str) -> Result<bool> {
    let confirmation = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;

    Ok(confirmation)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Write {
            image,
            device,
            yes,
            force_unmount,
            interval_ms,
        } => {
            println!(
                "{} This will erase all data on '{}'.",
                style("WARNING:").red().bold(),
                device.display(),
            );
            println!("  Device: {}", style(device.display()).cyan());
            println!("  Image:  {}", style(image.display()).cyan());
            println!();

            if !yes && !confirm_operation("Are you sure you want to proceed?")? {
                println!("Write operation cancelled.");
                return Ok(());
            }

            println!();

            let write_pb = ProgressBar::new(0);
            write_pb.set_prefix("Writing");
            write_pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{prefix:12} [{elapsed_precise}] [{bar:40.green/black}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                    )?
                    .progress_chars("■ "),
            );

            // Connects the core library's progress snapshots to the bar.
            let pb = write_pb.clone();
            let request = WriteRequest::new(&device, &image)
                .unmount_policy(unmount_policy(force_unmount))
                .progress_interval(Duration::from_millis(interval_ms))
                .on_progress(move |state| {
                    pb.set_length(state.total);
                    pb.set_position(state.transferred);
                });

            match write::run(request) {
                Ok(()) => {
                    write_pb.finish_with_message("Write complete.");
                    println!(
                        "\n✨ Successfully flashed {} with {}.",
                        style(device.display()).cyan(),
                        style(image.display()).cyan()
                    );
                }
                Err(e) => {
                    // Finish the bar to unblock the terminal before reporting.
                    write_pb.finish_and_clear();
                    return Err(e.into());
                }
            }
        }
        Commands::Unmount {
            device,
            force_unmount,
        } => {
            imprint_core::ensure_unmounted(&SystemMount, &device, unmount_policy(force_unmount))?;
            println!("{} is not mounted.", style(device.display()).cyan());
        }
    }

    Ok(())
}
