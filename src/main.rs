//! Duck Machine - CLI Entry Point
//!
//! Commands:
//! - `duck run <object>` - Run an object code file
//! - `duck go <source>` - Assemble and run
//! - `duck asm <source>` - Assemble to object code
//! - `duck compile <source>` - Compile mallard to assembly
//! - `duck interp <source>` - Interpret mallard directly
//! - `duck disasm <object>` - Disassemble object code

use clap::{Args, Parser, Subcommand};
use duck::cpu::TraceObserver;
use duck::isa::Word;
use duck::{Cpu, MachineConfig};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "duck")]
#[command(version = "0.1.0")]
#[command(about = "Assembler, mallard compiler and simulator for the Duck Machine")]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an object code file until it halts
    Run {
        /// Path to the object file to execute
        program: PathBuf,
        #[command(flatten)]
        machine: MachineArgs,
    },
    /// Assemble a source file and run the result
    Go {
        /// Path to the assembly source
        source: PathBuf,
        #[command(flatten)]
        machine: MachineArgs,
    },
    /// Assemble source to object code
    Asm {
        /// Path to the source file
        source: PathBuf,
        /// Output object file (default: source with .obj extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compile a mallard program to assembly
    Compile {
        /// Path to the mallard source
        source: PathBuf,
        /// Output assembly file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Interpret a mallard program
    Interp {
        /// Path to the mallard source
        source: PathBuf,
    },
    /// Disassemble object code to readable text
    Disasm {
        /// Path to the object file
        object: PathBuf,
    },
}

#[derive(Args)]
struct MachineArgs {
    /// Pause for Enter before every instruction
    #[arg(long)]
    step: bool,
    /// Print each instruction as it executes
    #[arg(short, long)]
    trace: bool,
    /// Print the final CPU state as JSON
    #[arg(long)]
    json: bool,
    /// Maximum number of cycles to run
    #[arg(short, long)]
    max_cycles: Option<u64>,
    /// Machine configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run { program, machine } => run_object(&program, &machine),
        Commands::Go { source, machine } => assemble_and_run(&source, &machine),
        Commands::Asm { source, output } => assemble_file(&source, output),
        Commands::Compile { source, output } => compile_file(&source, output),
        Commands::Interp { source } => interpret_file(&source),
        Commands::Disasm { object } => disassemble_file(&object),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(e) = SimpleLogger::new().with_level(level).env().init() {
        eprintln!("⚠️  Logging unavailable: {}", e);
    }
}

/// Report a fatal error and exit.
fn die(what: &str, err: impl Display) -> ! {
    eprintln!("❌ {}: {}", what, err);
    std::process::exit(1);
}

fn read_source(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| die("Failed to read file", e))
}

fn run_object(path: &Path, machine: &MachineArgs) {
    eprintln!("🔧 Running: {}", path.display());

    let object = duck::load_object(path).unwrap_or_else(|e| die("Failed to load object file", e));
    eprintln!("📂 Loaded {} words", object.len());
    execute(&object.words, machine);
}

fn assemble_and_run(path: &Path, machine: &MachineArgs) {
    eprintln!("🔧 Running: {}", path.display());

    let source = read_source(path);
    let words = duck::assemble(&source).unwrap_or_else(|e| die("Assembly error", e));
    eprintln!("📝 Assembled {} words", words.len());
    execute(&words, machine);
}

/// Prompt on `out` and read an integer from `input`, asking again on
/// malformed lines. `None` once input is closed.
fn prompt_int(input: &mut impl BufRead, out: &mut impl Write) -> Option<Word> {
    loop {
        write!(out, "Quack! Gimme an int! ").ok()?;
        // A failed flush only delays the prompt
        out.flush().ok();
        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => match line.trim().parse() {
                Ok(value) => return Some(value),
                Err(_) => writeln!(out, "That's not an int, try again.").ok()?,
            },
        }
    }
}

fn read_stdin() -> Option<Word> {
    prompt_int(&mut io::stdin().lock(), &mut io::stdout())
}

/// Input port hook for the machine; the program cannot go on without a value.
fn read_port(addr: Word) -> Word {
    read_stdin().unwrap_or_else(|| die(&format!("Read from port {}", addr), "input closed"))
}

fn write_port(_addr: Word, value: Word) {
    println!("Quack!: {}", value);
}

fn execute(words: &[Word], machine: &MachineArgs) {
    let config = match &machine.config {
        Some(path) => MachineConfig::from_json_file(path).unwrap_or_else(|e| die("Failed to load config", e)),
        None => MachineConfig::default(),
    };
    let max_cycles = machine.max_cycles.or(config.max_cycles);

    let mut mem = config
        .build_memory(read_port, write_port)
        .unwrap_or_else(|e| die("Bad configuration", e));
    mem.load_program(0, words).unwrap_or_else(|e| die("Failed to load program", e));

    let mut cpu = Cpu::new(&mut mem);
    if machine.trace || machine.step {
        cpu.add_observer(TraceObserver::stderr());
    }
    if machine.step {
        cpu.set_pause_hook(|steps| {
            eprint!("[{} steps] press Enter to step ", steps);
            let mut line = String::new();
            if io::stdin().lock().read_line(&mut line).is_err() {
                log::warn!("could not read from stdin; continuing");
            }
        });
    }

    let result = match max_cycles {
        Some(limit) => cpu.run_limited(0, limit),
        None => cpu.run(0),
    };
    let steps = result.unwrap_or_else(|e| {
        let pc = cpu.registers().pc();
        die(&format!("CPU error at PC={}", pc), e)
    });

    if cpu.is_halted() {
        println!("Halted");
    } else if let Some(limit) = max_cycles {
        eprintln!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", limit);
    }
    log::info!("executed {} steps", steps);

    if machine.json {
        match serde_json::to_string_pretty(&cpu.snapshot()) {
            Ok(json) => println!("{}", json),
            Err(e) => die("Failed to serialize CPU state", e),
        }
    }
}

fn assemble_file(source_path: &Path, output: Option<PathBuf>) {
    let out_path = output.unwrap_or_else(|| source_path.with_extension("obj"));
    eprintln!("📝 Assembling: {} → {}", source_path.display(), out_path.display());

    let source = read_source(source_path);
    let words = duck::assemble(&source).unwrap_or_else(|e| die("Assembly error", e));
    eprintln!("✓ Assembled {} words", words.len());

    if let Err(e) = duck::save_object(&out_path, &words) {
        die("Failed to save object file", e);
    }
    eprintln!("✓ Saved to {}", out_path.display());
}

fn compile_file(source_path: &Path, output: Option<PathBuf>) {
    let source = read_source(source_path);
    let lines = duck::lang::compile(&source).unwrap_or_else(|e| die("Compilation failed", e));
    let text: String = lines.iter().map(|l| format!("{}\n", l)).collect();

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, text) {
                die("Failed to write assembly", e);
            }
            eprintln!("✓ Compiled {} → {}", source_path.display(), path.display());
        }
        None => print!("{}", text),
    }
}

fn interpret_file(source_path: &Path) {
    let source = read_source(source_path);
    let program = duck::lang::parse(&source).unwrap_or_else(|e| die("Syntax error", e));

    let mut interp = duck::lang::Interpreter::new(read_stdin, |v| write_port(0, v));
    if let Err(e) = interp.run(&program) {
        die("Runtime error", e);
    }
    eprintln!("✓ Interpretation complete");
}

fn disassemble_file(object_path: &Path) {
    eprintln!("📖 Disassembling: {}", object_path.display());

    let object = duck::load_object(object_path).unwrap_or_else(|e| die("Failed to load object file", e));
    print!("{}", duck::disassemble(&object.words));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_prompt_int_retries_until_valid() {
        let mut input = Cursor::new("duck\n 42 \n7\n");
        let mut out = Vec::new();
        assert_eq!(prompt_int(&mut input, &mut out), Some(42));
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Quack! Gimme an int!").count(), 2);
        assert!(text.contains("That's not an int"));
    }

    #[test]
    fn test_prompt_int_end_of_input() {
        let mut out = Vec::new();
        assert_eq!(prompt_int(&mut Cursor::new(""), &mut out), None);
        assert_eq!(prompt_int(&mut Cursor::new("nope\n"), &mut out), None);
    }
}
