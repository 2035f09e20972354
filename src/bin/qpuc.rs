//! qpuc command line driver.
//!
//! Reads a textual QIR program (from a file, or stdin when no file is
//! given), compiles it and prints the instruction words and uniform layout.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::Parser;
use qpuc::core::{CompilationSession, CompileOptions};
use qpuc::{compile_shader, parse_qir, DebugFlags};

#[derive(Parser, Debug)]
#[command(name = "qpuc", about = "Compile QIR to VideoCore IV QPU code")]
struct Args {
    /// QIR source file; stdin if omitted.
    input: Option<PathBuf>,

    /// Skip the optimizer.
    #[arg(long)]
    no_opt: bool,

    /// Treat reads of undefined temporaries as warnings.
    #[arg(long)]
    lenient: bool,

    /// Log the QIR before and after optimization.
    #[arg(long)]
    dump_qir: bool,

    /// Write the program as little-endian bytes to this file.
    #[arg(long = "bin", value_name = "OUT")]
    bin: Option<PathBuf>,

    /// Print session statistics.
    #[arg(long)]
    stats: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let text = match &args.input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let mut debug = DebugFlags::from_env();
    debug.dump_qir |= args.dump_qir;
    let options = CompileOptions::from_env()
        .with_optimize(!args.no_opt)
        .with_strict_undefined(!args.lenient)
        .with_debug(debug);
    let mut session = CompilationSession::new(options);

    let result = parse_qir(&text).and_then(|ir| compile_shader(&mut session, ir));
    let shader = match result {
        Ok(shader) => shader,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    for (i, word) in shader.insts.iter().enumerate() {
        println!("{:4}: 0x{:016x}", i, word);
    }
    for i in 0..shader.uniforms.len() {
        if let Some((contents, data)) = shader.uniforms.get(i as u32) {
            println!("uniform {:3}: {} 0x{:08x}", i, contents.name(), data);
        }
    }

    if let Some(path) = &args.bin {
        fs::write(path, shader.code_bytes())?;
    }
    if args.stats {
        print!("{}", session.finish());
    }
    Ok(())
}
