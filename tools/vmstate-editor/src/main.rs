#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vmstate_snapshot::{
    edit_image, load_vmstate, report_net_state, report_sections, report_vcpu_states,
    report_version, save_vmstate, EditOperation, RegisterId, SnapshotImage,
};

#[derive(Debug, Parser)]
#[command(
    name = "vmstate-editor",
    version,
    about = "Inspect and surgically edit hypervisor vmstate snapshot files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print information from a vmstate file.
    #[command(subcommand)]
    InfoVmstate(InfoVmstateCommand),
    /// Apply an edit to a vmstate file and write the result.
    #[command(subcommand)]
    EditVmstate(EditVmstateCommand),
}

#[derive(Debug, Subcommand)]
enum InfoVmstateCommand {
    /// Print the snapshot format version and target architecture.
    Version {
        #[arg(long)]
        vmstate_path: PathBuf,
    },
    /// List every section in file order.
    Sections {
        #[arg(long)]
        vmstate_path: PathBuf,
    },
    /// Print every vCPU register entry.
    VcpuStates {
        #[arg(long)]
        vmstate_path: PathBuf,
    },
    /// Print the device records, including network tap names.
    VmState {
        #[arg(long)]
        vmstate_path: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum EditVmstateCommand {
    /// Remove registers from every vCPU register bank.
    RemoveRegs {
        #[arg(long)]
        vmstate_path: PathBuf,
        #[arg(long)]
        output_path: PathBuf,
        /// Register ids to remove, as hexadecimal strings.
        #[arg(required = true, value_parser = parse_register_id)]
        register_ids: Vec<RegisterId>,
    },
    /// Rename the network device's host tap interface.
    RenameNetTap {
        #[arg(long)]
        vmstate_path: PathBuf,
        #[arg(long)]
        output_path: PathBuf,
        /// New tap interface name.
        #[arg(long)]
        iface_name: String,
    },
}

fn parse_register_id(s: &str) -> std::result::Result<RegisterId, String> {
    s.parse::<RegisterId>()
        .map_err(|e| format!("invalid hexadecimal register id {s:?}: {e}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::InfoVmstate(command) => info_vmstate(command),
        Command::EditVmstate(command) => edit_vmstate(command),
    }
}

fn load(path: &Path) -> Result<SnapshotImage> {
    load_vmstate(path).with_context(|| format!("failed to load vmstate {}", path.display()))
}

fn info_vmstate(command: InfoVmstateCommand) -> Result<()> {
    match command {
        InfoVmstateCommand::Version { vmstate_path } => {
            print!("{}", report_version(&load(&vmstate_path)?));
        }
        InfoVmstateCommand::Sections { vmstate_path } => {
            print!("{}", report_sections(&load(&vmstate_path)?));
        }
        InfoVmstateCommand::VcpuStates { vmstate_path } => {
            print!("{}", report_vcpu_states(&load(&vmstate_path)?)?);
        }
        InfoVmstateCommand::VmState { vmstate_path } => {
            print!("{}", report_net_state(&load(&vmstate_path)?)?);
        }
    }
    Ok(())
}

fn edit_vmstate(command: EditVmstateCommand) -> Result<()> {
    let (vmstate_path, output_path, op) = match command {
        EditVmstateCommand::RemoveRegs {
            vmstate_path,
            output_path,
            register_ids,
        } => {
            let ids: BTreeSet<RegisterId> = register_ids.into_iter().collect();
            (vmstate_path, output_path, EditOperation::RemoveRegs(ids))
        }
        EditVmstateCommand::RenameNetTap {
            vmstate_path,
            output_path,
            iface_name,
        } => (
            vmstate_path,
            output_path,
            EditOperation::RenameNetTap {
                tap_name: iface_name,
            },
        ),
    };

    let image = load(&vmstate_path)?;
    let edited = edit_image(&image, &op).context("edit rejected")?;
    save_vmstate(&edited, &output_path)
        .with_context(|| format!("failed to write vmstate {}", output_path.display()))?;
    tracing::info!(output = %output_path.display(), "vmstate written");
    Ok(())
}
