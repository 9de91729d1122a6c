//  Copyright 2024 Foyer Project Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

//! Replays a trace of cache operations against a [`refbit_cache::Cache`] and
//! prints a metrics summary. One operation per line, read from a file or
//! stdin:
//!
//! ```text
//! admit <key> <value>
//! access <key>
//! destroy
//! ```

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::Parser;
use refbit_cache::{Cache, CacheConfig};

#[derive(Debug, Parser)]
#[command(name = "refbit-cache", about = "replay a cache operation trace")]
struct Args {
    /// Number of slots in the cache.
    #[arg(short, long, default_value_t = 1024)]
    capacity: usize,

    /// Trace file to replay; reads stdin if omitted.
    #[arg(short, long)]
    trace: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cache: Cache = Cache::try_new(CacheConfig::new(args.capacity)).context("failed to create cache")?;

    let mut reader: Box<dyn Read> = match &args.trace {
        Some(path) => Box::new(std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?),
        None => Box::new(std::io::stdin()),
    };
    let mut input = String::new();
    reader.read_to_string(&mut input).context("reading trace")?;

    for (lineno, line) in BufReader::new(input.as_bytes()).lines().enumerate() {
        let line = line.context("reading trace line")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        run_line(&cache, line).with_context(|| format!("line {}: {line:?}", lineno + 1))?;
    }

    let metrics = cache.metrics();
    println!("{metrics:#?}");
    Ok(())
}

fn run_line(cache: &Cache, line: &str) -> Result<()> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("admit") => {
            let key = parts.next().context("admit requires a key")?;
            let value = parts.next().context("admit requires a value")?;
            match cache.admit(key.as_bytes(), Bytes::copy_from_slice(value.as_bytes())) {
                Some(_) => println!("admit {key} ok"),
                None => println!("admit {key} failed (allocation refused)"),
            }
        }
        Some("access") => {
            let key = parts.next().context("access requires a key")?;
            match cache.access(key.as_bytes()) {
                Some(handle) => println!("access {key} hit {:?}", handle.value()),
                None => println!("access {key} miss"),
            }
        }
        Some("destroy") => {
            cache.destroy();
            println!("destroyed");
        }
        Some(other) => bail!("unknown operation {other:?}"),
        None => {}
    }
    Ok(())
}
