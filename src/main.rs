use clap::arg_enum;
use log::error;
use patchset::{Error, PatchSession, PatchTypeRegistry, PatchUpdate, PatcherRunner};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::{mpsc, Arc};
use structopt::StructOpt;

arg_enum! {
    #[derive(Debug)]
    enum Format {
        Table,
        Json
    }
}

#[derive(Debug, StructOpt)]
#[structopt(name = "patchset", about = "Manage a patch set for the external patcher")]
struct Options {
    /// Patch set file, loaded first and written back after edits
    #[structopt(short, long, default_value = "patches.json", parse(from_os_str))]
    file: PathBuf,
    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Show the patches in the set
    List {
        #[structopt(
            short,
            long,
            possible_values = &Format::variants(),
            case_insensitive = true,
            default_value = "Table"
        )]
        format: Format,
    },
    /// Show the known patch types
    Types,
    /// Add a patch; the name gets a numeric suffix if it is taken
    Add {
        #[structopt(short = "t", long = "type")]
        patch_type: String,
        #[structopt(short, long, parse(try_from_str = parse_address))]
        address: u64,
        #[structopt(short, long)]
        name: String,
        /// Patch text, or @FILE to read it from FILE
        #[structopt(short, long)]
        data: String,
        /// Parse the data as a JSON value instead of taking it as text
        #[structopt(long)]
        json: bool,
    },
    /// Change fields of the patch at INDEX
    Edit {
        index: usize,
        #[structopt(short, long, parse(try_from_str = parse_address))]
        address: Option<u64>,
        #[structopt(short, long)]
        name: Option<String>,
        #[structopt(short, long)]
        data: Option<String>,
        #[structopt(long)]
        json: bool,
    },
    /// Remove the patch at INDEX
    Remove { index: usize },
    /// Apply the patch set to INPUT with the external patcher
    Run {
        #[structopt(short, long, parse(from_os_str))]
        input: PathBuf,
        #[structopt(short, long, parse(from_os_str))]
        output: PathBuf,
        #[structopt(long, env = "PATCHEREX_TOOL", default_value = "patcherex", parse(from_os_str))]
        tool: PathBuf,
        #[structopt(long, default_value = "reassembler_backend")]
        backend: String,
    },
}

fn parse_address(s: &str) -> Result<u64, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

fn parse_data(s: &str, json: bool) -> patchset::Result<Value> {
    let text = match s.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).map_err(|source| Error::ReadPatchData {
            path: PathBuf::from(path),
            source,
        })?,
        None => s.to_string(),
    };
    if json {
        serde_json::from_str(&text).map_err(|source| Error::PatchDataJson { source })
    } else {
        Ok(Value::String(text))
    }
}

fn execute(opt: Options) -> patchset::Result<()> {
    let registry = Arc::new(PatchTypeRegistry::with_builtin());
    let input = match &opt.command {
        Command::Run { input, .. } => input.clone(),
        _ => PathBuf::new(),
    };
    let mut session = PatchSession::new(registry.clone(), input);
    if opt.file.exists() {
        session.load(&opt.file)?;
    }

    match opt.command {
        Command::List { format } => match format {
            Format::Table => {
                for (i, row) in session.rows()?.iter().enumerate() {
                    println!(
                        "{:>4}  {:<22} {:>12}  {:<30} {}",
                        i, row.kind, row.address, row.name, row.data
                    );
                }
            }
            Format::Json => {
                let bytes = session.store().serialize()?;
                println!("{}", String::from_utf8_lossy(&bytes));
            }
        },
        Command::Types => {
            for (id, descriptor) in registry.descriptors() {
                println!("{:<18} {}", id, descriptor);
            }
        }
        Command::Add {
            patch_type,
            address,
            name,
            data,
            json,
        } => {
            let index = session.insert(&patch_type, address, &name, parse_data(&data, json)?)?;
            println!("{}  {}", index, session.store().get(index)?.name);
            session.save(&opt.file)?;
        }
        Command::Edit {
            index,
            address,
            name,
            data,
            json,
        } => {
            let update = PatchUpdate {
                address,
                name,
                data: data.as_deref().map(|d| parse_data(d, json)).transpose()?,
            };
            if !update.is_empty() {
                session.edit(index, update)?;
                session.save(&opt.file)?;
            }
        }
        Command::Remove { index } => {
            session.remove(index)?;
            session.save(&opt.file)?;
        }
        Command::Run {
            output,
            tool,
            backend,
            ..
        } => {
            let session = session.with_runner(
                PatcherRunner::default()
                    .with_tool(tool)
                    .with_backend(backend),
            );
            let (tx, rx) = mpsc::channel();
            session.run_patcher(&output, move |result| {
                let _ = tx.send(result);
            })?;
            match rx.recv() {
                Ok(result) => result?,
                Err(_) => {
                    error!("patcher worker exited without reporting a result");
                    process::exit(1);
                }
            }
            println!("Patched binary written to {}", output.display());
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let opt = Options::from_args();
    if let Err(e) = execute(opt) {
        error!("{}", e);
        eprintln!("{}", e);
        process::exit(1);
    }
}
