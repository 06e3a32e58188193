use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lua53_vm::{LuaError, LuaResult, VirtualMachine};
use tokio::fs::File;
use tokio::io::BufReader;
use tracing::{error, trace};
use tracing_subscriber::EnvFilter;

/// A pure Rust Lua 5.3 bytecode VM.
#[derive(Parser)]
#[command(name = "lua53vm", version, about)]
struct Args {
    /// Path to a pre-compiled Lua 5.3 chunk (luac output).
    chunk: PathBuf,

    /// Log every fetched instruction at trace level.
    #[arg(long)]
    trace: bool,

    /// Fire the instruction hook every N opcodes instead of every one.
    #[arg(long, default_value_t = 1)]
    hook_every: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let mut vm = VirtualMachine::new();
    if args.trace {
        vm = vm.with_hook(
            args.hook_every,
            Box::new(|pc| {
                trace!(pc, "instruction");
                Ok(())
            }),
        );
    }

    match run(&vm, &args.chunk).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(vm: &VirtualMachine, path: &std::path::Path) -> LuaResult<()> {
    let file = File::open(path).await.map_err(|_| LuaError::CorruptChunk("unable to open chunk file"))?;
    let reader = BufReader::new(file);
    let closure = vm.load(reader).await?;
    vm.execute(closure, &[])?;
    Ok(())
}
