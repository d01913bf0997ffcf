//! # CLI — EmberKV interactive shell
//!
//! A REPL-style command-line interface over the embedded store. Reads
//! commands from stdin, executes them against a [`Db`] instance, and prints
//! results to stdout. Works interactively or scripted (pipe commands in).
//!
//! ## Commands
//!
//! ```text
//! SET key value          Insert or update a key-value pair
//! SETX key ttl_ms value  Insert with a time-to-live in milliseconds
//! GET key                Look up a key (prints value or "(nil)")
//! DEL key                Remove a key from the index
//! EXISTS key             Check whether a key is live
//! CLEANUP                Sweep expired index entries and idle file handles
//! STATS                  Print key count and active segment id
//! EXIT / QUIT            Shut down gracefully
//! ```
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! EMBER_DATA_DIR      Base data directory       (default: "data")
//! EMBER_SEGMENT_DIR   Segment directory         (default: "{data_dir}/segments")
//! EMBER_PREFIX        Segment filename prefix   (default: "segment")
//! EMBER_SEGMENT_MB    Max segment size in MiB   (default: 1024)
//! RUST_LOG            Log filter                (default: "info")
//! ```

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::Result;
use common::Options;
use engine::Db;
use tracing_subscriber::EnvFilter;

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let data_dir = env_or("EMBER_DATA_DIR", "data");
    let segment_dir = env_or("EMBER_SEGMENT_DIR", "");
    let prefix = env_or("EMBER_PREFIX", "segment");
    let segment_mb: u64 = env_or("EMBER_SEGMENT_MB", "1024").parse().unwrap_or(1024);

    let options = Options::default()
        .with_data_dir(&data_dir)
        .with_segment_dir(&segment_dir)
        .with_segment_prefix(&prefix)
        .with_segment_size(segment_mb * 1024 * 1024);

    let db = Db::open("emberkv-cli", options)?;
    println!(
        "EmberKV started (keys={}, segment={}, data_dir={})",
        db.key_count(),
        db.active_segment_id(),
        data_dir,
    );
    println!("Commands: SET key value | SETX key ttl_ms value | GET key | DEL key");
    println!("          EXISTS key | CLEANUP | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "SET" => match (parts.next(), parts.collect::<Vec<&str>>().join(" ")) {
                    (Some(key), value) if !value.is_empty() => {
                        report(db.set(key.as_bytes(), value.as_bytes()).map(|_| "OK".to_string()));
                    }
                    _ => println!("ERR usage: SET key value"),
                },
                "SETX" => {
                    let key = parts.next();
                    let ttl_ms = parts.next().and_then(|t| t.parse::<u64>().ok());
                    let value = parts.collect::<Vec<&str>>().join(" ");
                    match (key, ttl_ms) {
                        (Some(key), Some(ttl_ms)) if !value.is_empty() => {
                            report(
                                db.set_with_ttl(
                                    key.as_bytes(),
                                    value.as_bytes(),
                                    Duration::from_millis(ttl_ms),
                                )
                                .map(|_| "OK".to_string()),
                            );
                        }
                        _ => println!("ERR usage: SETX key ttl_ms value"),
                    }
                }
                "GET" => match parts.next() {
                    Some(key) => match db.get(key.as_bytes()) {
                        Ok(record) => {
                            println!("{}", String::from_utf8_lossy(&record.value));
                        }
                        Err(e) if e.is_not_found() => println!("(nil)"),
                        Err(e) => println!("ERR {e}"),
                    },
                    None => println!("ERR usage: GET key"),
                },
                "DEL" => match parts.next() {
                    Some(key) => match db.delete(key.as_bytes()) {
                        Ok(was_present) => println!("{}", u8::from(was_present)),
                        Err(e) => println!("ERR {e}"),
                    },
                    None => println!("ERR usage: DEL key"),
                },
                "EXISTS" => match parts.next() {
                    Some(key) => match db.exists(key.as_bytes()) {
                        Ok(exists) => println!("{}", u8::from(exists)),
                        Err(e) => println!("ERR {e}"),
                    },
                    None => println!("ERR usage: EXISTS key"),
                },
                "CLEANUP" => {
                    let result = db.cleanup_expired().and_then(|expired| {
                        db.evict_idle_handles()
                            .map(|handles| format!("expired={expired} handles={handles}"))
                    });
                    report(result);
                }
                "STATS" => {
                    println!(
                        "keys={} active_segment={}",
                        db.key_count(),
                        db.active_segment_id()
                    );
                }
                "EXIT" | "QUIT" => break,
                other => println!("ERR unknown command: {other}"),
            }
        }
        print!("> ");
        io::stdout().flush().ok();
    }

    db.close()?;
    println!("bye");
    Ok(())
}

fn report(result: common::Result<String>) {
    match result {
        Ok(message) => println!("{message}"),
        Err(e) => println!("ERR {e}"),
    }
}
