//! STRATA - LSM-Tree Key-Value Storage Engine
//! Interactive front end over the embedded engine.

use std::io::{self, BufRead, Write};

use strata::config::Config;
use strata::engine::Strata;

fn main() {
    env_logger::init();

    println!();
    println!("  STRATA Storage Engine");
    println!("  LSM-Tree Key-Value Store v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("  Commands:");
    println!("    set <key> <value>  - Store a key-value pair");
    println!("    get <key>          - Retrieve a value by key");
    println!("    del <key>          - Delete a key");
    println!("    info               - Show engine statistics");
    println!("    exit               - Shutdown engine");
    println!();

    let config = Config::default();
    let engine = match Strata::open(config) {
        Ok(e) => e,
        Err(err) => {
            eprintln!("[ERROR] Failed to open engine: {}", err);
            std::process::exit(1);
        }
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("strata> ");
        stdout.flush().unwrap();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap() == 0 {
            break; // EOF
        }

        let parts: Vec<&str> = line.trim().split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        match parts[0].to_lowercase().as_str() {
            "set" | "put" => {
                if parts.len() < 3 {
                    println!("  Usage: set <key> <value>");
                    continue;
                }
                let key = parts[1];
                let value = parts[2..].join(" ").into_bytes();
                match engine.set(key, value) {
                    Ok(()) => println!("  OK"),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "get" => {
                if parts.len() < 2 {
                    println!("  Usage: get <key>");
                    continue;
                }
                match engine.get(parts[1]) {
                    Ok(Some(value)) => match String::from_utf8(value) {
                        Ok(s) => println!("  \"{}\"", s),
                        Err(_) => println!("  <binary data>"),
                    },
                    Ok(None) => println!("  (nil)"),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "del" | "delete" => {
                if parts.len() < 2 {
                    println!("  Usage: del <key>");
                    continue;
                }
                match engine.delete(parts[1]) {
                    Ok(Some(_)) => println!("  OK (deleted)"),
                    Ok(None) => println!("  OK (no previous value)"),
                    Err(e) => println!("  ERROR: {}", e),
                }
            }
            "info" | "stats" => {
                println!("  Live memtable records: {}", engine.memtable_len());
                println!("{}", engine.metrics().report());
            }
            "exit" | "quit" | "q" => {
                println!("  Shutting down STRATA...");
                break;
            }
            _ => {
                println!("  Unknown command: '{}'. Type 'exit' to quit.", parts[0]);
            }
        }
    }

    engine.close();
}
