//! Owl-2820 guest runner.
//!
//! Loads a raw binary image into a fresh memory buffer and executes it.
//! Images are RV32I encoded by default; they can be executed directly,
//! transcoded to Owl-2820 first, or supplied already Owl-encoded.
//!
//! # Usage
//! ```text
//! owl-vm <image.bin> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `image.bin`: Guest binary image, 32-bit little-endian words, loaded at
//!   address 0. Execution begins at address 0.
//!
//! # Options
//! - `--owl`: The image is Owl-2820 encoded (default: RV32I)
//! - `--transcode`: Transcode the RV32I image to Owl-2820, then run that
//! - `--trace`: Disassemble each instruction to stderr as it executes
//! - `--memory <bytes>`: Memory buffer size (default 4096)
//!
//! The log level is read from the `OWL_LOG` environment variable
//! (`info`, `warn`, `error`).

use std::env;
use std::fs;
use std::process;

use owl_vm::cpu::Cpu;
use owl_vm::disassembler::Disassembler;
use owl_vm::errors::VmError;
use owl_vm::host::Console;
use owl_vm::isa::dispatch_owl;
use owl_vm::memory;
use owl_vm::rv32i::{dispatch_rv32i, transcode};
use owl_vm::utils::log;

/// Which encoding the memory image holds.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Rv32i,
    Owl,
}

struct Options {
    image_path: String,
    encoding: Encoding,
    transcode: bool,
    trace: bool,
    memory_size: usize,
}

fn main() {
    log::init_from_env();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 2 } else { 0 });
    }

    let options = parse_options(&args);

    let image = match load_image(&options.image_path) {
        Ok(words) => words,
        Err(e) => {
            log::error(&format!("failed to read {}: {}", options.image_path, e));
            process::exit(1);
        }
    };
    log::info(&format!(
        "loaded {} ({} words)",
        options.image_path,
        image.len()
    ));

    let (image, encoding) = if options.transcode {
        match transcode(&image) {
            Ok(owl) => {
                log::info("transcoded RV32I image to Owl-2820");
                (owl, Encoding::Owl)
            }
            Err(e) => {
                log::error(&format!("transcoding failed: {}", e));
                process::exit(1);
            }
        }
    } else {
        (image, options.encoding)
    };

    if image.len() * memory::WORD_SIZE as usize > options.memory_size {
        log::error(&format!(
            "image ({} bytes) does not fit in memory ({} bytes)",
            image.len() * memory::WORD_SIZE as usize,
            options.memory_size
        ));
        process::exit(1);
    }

    let mut mem = vec![0u8; options.memory_size];
    if let Err(e) = memory::load_words(&mut mem, &image) {
        log::error(&format!("failed to place image in memory: {}", e));
        process::exit(1);
    }

    let mut host = Console;
    let mut cpu = Cpu::new(&mut mem, &mut host);
    let result = if options.trace {
        run_traced(&mut cpu, encoding)
    } else {
        match encoding {
            Encoding::Owl => cpu.run(),
            Encoding::Rv32i => cpu.run_rv32i(),
        }
    };

    match result {
        Ok(()) => {}
        Err(e) => {
            log::error(&format!("guest fault at {:#010x}: {}", cpu.pc(), e));
            process::exit(1);
        }
    }
}

fn parse_options(args: &[String]) -> Options {
    let mut options = Options {
        image_path: args[1].clone(),
        encoding: Encoding::Rv32i,
        transcode: false,
        trace: false,
        memory_size: 4096,
    };

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--owl" => {
                options.encoding = Encoding::Owl;
                i += 1;
            }
            "--transcode" => {
                options.transcode = true;
                i += 1;
            }
            "--trace" => {
                options.trace = true;
                i += 1;
            }
            k @ "--memory" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("{k} requires an argument");
                    process::exit(1);
                }
                options.memory_size = match args[i].parse() {
                    Ok(n) => n,
                    Err(_) => {
                        eprintln!("invalid memory size: {}", args[i]);
                        process::exit(1);
                    }
                };
                i += 1;
            }
            other => {
                eprintln!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    if options.transcode && options.encoding == Encoding::Owl {
        eprintln!("--transcode expects an RV32I image; drop --owl");
        process::exit(1);
    }

    options
}

/// Reads a raw image file as little-endian words, zero-padding a trailing
/// partial word.
fn load_image(path: &str) -> Result<Vec<u32>, std::io::Error> {
    let bytes = fs::read(path)?;
    let mut words = Vec::with_capacity(bytes.len().div_ceil(4));
    for chunk in bytes.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        words.push(u32::from_le_bytes(word));
    }
    Ok(words)
}

/// The fetch/dispatch loop with a disassembly line per instruction.
fn run_traced(cpu: &mut Cpu<Console>, encoding: Encoding) -> Result<(), VmError> {
    let mut disasm = Disassembler::new();
    while !cpu.done() {
        let ins = match cpu.fetch() {
            Ok(ins) => ins,
            Err(e) => return Err(e),
        };
        let text = match encoding {
            Encoding::Owl => dispatch_owl(&mut disasm, ins),
            Encoding::Rv32i => dispatch_rv32i(&mut disasm, ins),
        };
        eprintln!("{:08x}: {}", cpu.pc(), text);
        match encoding {
            Encoding::Owl => dispatch_owl(cpu, ins),
            Encoding::Rv32i => dispatch_rv32i(cpu, ins),
        }
    }
    cpu.take_fault()
}

const USAGE: &str = "\
Owl-2820 guest runner

USAGE:
    {program} <image.bin> [OPTIONS]

ARGS:
    <image.bin>    Guest binary image (32-bit little-endian words)

OPTIONS:
    --owl               Image is Owl-2820 encoded (default: RV32I)
    --transcode         Transcode the RV32I image to Owl-2820 before running
    --trace             Disassemble each instruction as it executes
    --memory <bytes>    Memory buffer size (default 4096)
    -h, --help          Print this help message

EXAMPLES:
    # Run an RV32I guest directly
    {program} fib.bin

    # Transcode to Owl-2820 first, then run
    {program} fib.bin --transcode
";

fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
