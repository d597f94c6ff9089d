//! `tree-orc`: a thin demo binary over `tree-orc-engine`. Exists only to
//! compile a source file, optionally run it to completion against the
//! built-in demo task set (`demo`), and print what happened — a smoke test
//! for the library, not a product in its own right.

mod demo;

use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tree_orc_engine::config::EngineConfig;
use tree_orc_engine::dispatcher::{Dispatcher, Mode};
use tree_orc_engine::value::FieldValue;

use demo::DemoState;

#[derive(Parser)]
#[command(name = "tree-orc", about = "Compile and run tree-orc source files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a source file and report its size and fingerprint.
    Compile {
        /// Path to a `.tree` source file, or `-` to read stdin.
        path: PathBuf,
    },
    /// Compile and run a source file to completion against the demo task set.
    Run {
        path: PathBuf,
        /// Dynamic arguments bound to `$0`, `$1`, ... as signed 32-bit integers.
        #[arg(long, value_delimiter = ',')]
        dyn_args: Vec<i32>,
    },
    /// Compile a source file and dump its parsed node list (the IR the
    /// layout compiler consumes) plus the compiled buffer's size and
    /// fingerprint, as JSON.
    Dump { path: PathBuf },
}

fn hex_fingerprint(bytes: &[u8; 32]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn read_source(path: &PathBuf) -> std::io::Result<String> {
    if path.as_os_str() == "-" {
        use std::io::Read;
        let mut s = String::new();
        std::io::stdin().read_to_string(&mut s)?;
        Ok(s)
    } else {
        fs::read_to_string(path)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let registry = Rc::new(demo::build_registry());

    match cli.command {
        Command::Compile { path } => {
            let source = read_source(&path)?;
            let buffer = tree_orc_engine::compile(&source, &registry)?;
            println!("bytes: {}", buffer.len());
            println!("fingerprint: {}", hex_fingerprint(&buffer.fingerprint()));
        }
        Command::Dump { path } => {
            let source = read_source(&path)?;
            let nodes = tree_orc_engine::compiler::parser::parse(&source, registry.type_index())?;
            let buffer = tree_orc_engine::compiler::layout::compile(&nodes)?;
            let dump = serde_json::json!({
                "nodes": nodes.nodes,
                "bytes": buffer.len(),
                "fingerprint": hex_fingerprint(&buffer.fingerprint()),
            });
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
        Command::Run { path, dyn_args } => {
            let source = read_source(&path)?;
            let dyn_args: Vec<FieldValue> = dyn_args.into_iter().map(FieldValue::I32).collect();

            let mut dispatcher = Dispatcher::new(EngineConfig::default());
            let mut state = DemoState::new(registry.clone());
            let completion =
                dispatcher.enqueue(registry.clone(), 0, Mode::Stepwise1, &source, dyn_args)?;

            while !completion.is_done() {
                dispatcher.run_once(&mut state)?;
                for pending in state.pending.drain(..) {
                    dispatcher.enqueue_pending(pending)?;
                }
            }

            for line in &state.log {
                println!("{line}");
            }
            println!("result: {:?}", completion.result().unwrap());
        }
    }

    Ok(())
}
