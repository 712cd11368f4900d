//! Dissect a hex-encoded Ethernet frame from the command line.
//!
//! ```text
//! cargo run --example dissect -- ffffffffffff00112233445508060001080006040001...
//! ```
//!
//! With no argument a built-in DNS query frame is dissected.

use strata_core::{LinkType, LinkTypeKind, Packet};
use strata_packet::default_registry;

const SAMPLE: &str = "ffffffffffff001122334455\
                      08004500002600004000401100000a0000010a000002\
                      c000003500120000deadbeefdeadbeefdead\
                      0000000000000000";

fn parse_hex(input: &str) -> Option<Vec<u8>> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect()
}

fn print_tree(packet: &Packet, depth: usize) {
    let indent = "  ".repeat(depth);
    match packet {
        Packet::Layer {
            header, trailer, ..
        } => {
            print!("{indent}{} ({} header bytes", header.layer_name(), header.header_len());
            if trailer.is_empty() {
                println!(")");
            } else {
                println!(", {}-byte trailer)", trailer.len());
            }
            if let Some(payload) = packet.payload() {
                print_tree(payload, depth + 1);
            }
        }
        Packet::Unknown { raw } => {
            println!("{indent}unknown payload ({} bytes)", raw.len());
        }
        Packet::Illegal { raw, reason } => {
            println!("{indent}illegal bytes ({} bytes): {reason}", raw.len());
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let arg = std::env::args().nth(1);
    let hex = arg.as_deref().unwrap_or(SAMPLE);
    let frame = match parse_hex(hex) {
        Some(frame) => frame,
        None => {
            eprintln!("not a hex string: {hex}");
            std::process::exit(1);
        }
    };

    let registry = default_registry();
    match registry.decode::<LinkTypeKind>(&frame, 0, frame.len(), &[LinkType::EN10MB]) {
        Ok(packet) => {
            println!("{} bytes on the wire", frame.len());
            print_tree(&packet, 0);
        }
        Err(err) => {
            eprintln!("decode failed: {err}");
            std::process::exit(1);
        }
    }
}
