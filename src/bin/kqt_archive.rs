// Inspect, pack and unpack Kunquat archives
// Run with: cargo run --bin kqt-archive -- info song.kqt.gz

use clap::{Parser, Subcommand};
use kunquat_sheet::engine::CancelFlag;
use kunquat_sheet::project::archive::{self, ArchiveFormat, ArchiveKind};
use kunquat_sheet::project::{DirStore, MemoryStore, ProjectError, load_module};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "kqt-archive", version, about = "Kunquat archive tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the members of an archive
    Info { archive: PathBuf },
    /// Pack a store directory into an archive
    Export {
        dir: PathBuf,
        archive: PathBuf,
        /// Instrument or effect slot to pack (for .kqti and .kqte)
        #[arg(long, default_value_t = 0)]
        slot: usize,
    },
    /// Unpack an archive into a store directory
    Import {
        archive: PathBuf,
        dir: PathBuf,
        /// Instrument or effect slot to unpack into (for .kqti and .kqte)
        #[arg(long, default_value_t = 0)]
        slot: usize,
    },
    /// Load a module archive and report damaged entries
    Check { archive: PathBuf },
}

fn info(path: &Path) -> Result<bool, ProjectError> {
    let (format, members) = archive::list(path)?;
    println!("{}: {}", path.display(), format);
    let total: u64 = members.iter().map(|m| m.size).sum();
    for member in &members {
        let modified = member
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{:>10}  {:16}  {}", member.size, modified, member.key);
    }
    println!("{} members, {} bytes", members.len(), total);
    Ok(true)
}

fn check(path: &Path) -> Result<bool, ProjectError> {
    let format = ArchiveFormat::from_path(path)?;
    if format.kind != ArchiveKind::Module {
        println!("{}: {} archives carry no sheet data", path.display(), format);
        return Ok(true);
    }
    let mut store = MemoryStore::new();
    archive::import(path, &mut store, "", &CancelFlag::new())?;
    let report = load_module(&store)?;

    let module = &report.module;
    let triggers: usize = module.patterns().map(|(_, p)| p.trigger_count()).sum();
    println!(
        "{}: {} patterns, {} songs, {} triggers",
        path.display(),
        module.patterns().count(),
        module.songs().count(),
        triggers
    );
    for (id, _) in module.songs() {
        for (system, r) in module.dangling_refs(id) {
            println!("  song {} system {}: no pattern instance {:?}", id, system, r);
        }
    }
    for problem in &report.problems {
        println!("  {}", problem);
    }
    Ok(report.is_clean())
}

fn run(command: Command) -> Result<bool, ProjectError> {
    match command {
        Command::Info { archive } => info(&archive),
        Command::Export { dir, archive, slot } => {
            let format = ArchiveFormat::from_path(&archive)?;
            let store = DirStore::open(&dir)?;
            let count = archive::export(&store, &format.kind.prefix(slot), &archive, &CancelFlag::new())?;
            println!("{} members written to {}", count, archive.display());
            Ok(true)
        }
        Command::Import { archive, dir, slot } => {
            let format = ArchiveFormat::from_path(&archive)?;
            let mut store = DirStore::open(&dir)?;
            let count = archive::import(&archive, &mut store, &format.kind.prefix(slot), &CancelFlag::new())?;
            println!("{} members read into {}", count, dir.display());
            Ok(true)
        }
        Command::Check { archive } => check(&archive),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("kqt-archive: {}", e);
            ExitCode::from(2)
        }
    }
}
