//! Binary image disassembler CLI.
//!
//! Reads a guest binary image and prints an address-prefixed listing.
//!
//! # Usage
//! ```text
//! disassembler <image.bin> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `image.bin`: Binary image to disassemble (32-bit little-endian words)
//!
//! # Options
//! - `--owl`: Image is Owl-2820 encoded (default: RV32I)
//!
//! Zero words are skipped: without a symbol table there is no telling code
//! from data, and zero padding would otherwise drown the listing.

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use owl_vm::disassembler::Disassembler;
use owl_vm::isa::dispatch_owl;
use owl_vm::rv32i::dispatch_rv32i;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let input_path = &args[1];
    let mut owl = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--owl" => {
                owl = true;
                i += 1;
            }
            other => {
                eprintln!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    if !Path::new(input_path).exists() {
        eprintln!("Input file does not exist: {}", input_path);
        process::exit(1);
    }

    let bytes = match fs::read(input_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let mut disasm = Disassembler::new();
    let mut address = 0u32;
    for chunk in bytes.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let ins = u32::from_le_bytes(word);

        if ins != 0 {
            let text = if owl {
                dispatch_owl(&mut disasm, ins)
            } else {
                dispatch_rv32i(&mut disasm, ins)
            };
            println!("{:08x}: {}", address, text);
        }
        address += 4;
    }
}

const USAGE: &str = "\
Owl-2820 image disassembler

USAGE:
    {program} <image.bin> [OPTIONS]

ARGS:
    <image.bin>    Binary image to disassemble

OPTIONS:
    --owl          Image is Owl-2820 encoded (default: RV32I)
    -h, --help     Print this help message

EXAMPLES:
    # List an RV32I image
    {program} fib.bin

    # List an Owl-2820 image
    {program} fib-owl.bin --owl
";

fn print_usage(program: &str) {
    eprintln!("{}", USAGE.replace("{program}", program));
}
