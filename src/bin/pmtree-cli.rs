//! Minimal command-line front end over the library surface. Demonstrates
//! `PersistentPool`/`TreeObject` end to end; carries none of the crate's
//! invariants itself.

use clap::{Parser, Subcommand};
use pmtree::{Error, PersistentPool, Result, TreeObject, TreeSchema};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pmtree-cli", about = "Inspect and populate a pmtree pool file")]
struct Cli {
    /// Path to the pool file.
    #[arg(long)]
    pool: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new pool and install a tree with the given schema.
    Create {
        #[arg(long, default_value_t = 1 << 24)]
        size: u64,
        /// Ordered schema key names, e.g. --schema country --schema city.
        #[arg(long = "schema", required = true)]
        schema: Vec<String>,
    },
    /// Insert a data blob at a path described by key=value pairs.
    Insert {
        /// key=value pairs, one per schema key, any order.
        #[arg(long = "key", required = true)]
        keys: Vec<String>,
        /// The payload to store (read as raw bytes of this string).
        #[arg(long)]
        data: String,
    },
    /// Look up every leaf beneath a (possibly partial, schema-ordered) path.
    Lookup {
        #[arg(long = "key")]
        keys: Vec<String>,
    },
    /// Print the whole tree.
    Print,
}

fn parse_keyvals(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut map = HashMap::with_capacity(pairs.len());
    for pair in pairs {
        let (k, v) = pair
            .split_once('=')
            .ok_or_else(|| Error::UserError(format!("expected key=value, got \"{}\"", pair)))?;
        map.insert(k.to_string(), v.to_string());
    }
    Ok(map)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Create { size, schema } => {
            let pool = PersistentPool::create(&cli.pool, size, "pmtree-cli")?;
            TreeObject::create(&pool, TreeSchema::new(schema))?;
            println!("created {} ({} bytes)", cli.pool.display(), size);
        }
        Command::Insert { keys, data } => {
            let pool = PersistentPool::open(&cli.pool, "pmtree-cli")?;
            let mut tree = TreeObject::open(&pool)?;
            let keyvals = parse_keyvals(&keys)?;
            tree.add_node(&keyvals, data.as_bytes())?;
            println!("inserted {} bytes", data.len());
        }
        Command::Lookup { keys } => {
            let pool = PersistentPool::open(&cli.pool, "pmtree-cli")?;
            let tree = TreeObject::open(&pool)?;
            let keyvals = parse_keyvals(&keys)?;
            for blob in tree.lookup(&keyvals)? {
                println!("{}", String::from_utf8_lossy(&blob));
            }
        }
        Command::Print => {
            let pool = PersistentPool::open(&cli.pool, "pmtree-cli")?;
            let tree = TreeObject::open(&pool)?;
            print!("{}", tree.print_tree()?);
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("pmtree-cli: {}", e);
        std::process::exit(1);
    }
}
