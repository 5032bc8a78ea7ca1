//! `regionkv` - interactive shell over one region directory.
//!
//! ## Configuration
//!
//! ```text
//! REGIONKV_DATA_DIR    Region directory             (default: "data/region")
//! REGIONKV_FLUSH_KB    Flush threshold in KiB       (default: 1024 = 1 MiB)
//! REGIONKV_ROW_GROUP   Rows per PFile row group     (default: 1024)
//! REGIONKV_AUTO_FLUSH  Flush at the threshold       (default: "true")
//! RUST_LOG             Log filter, written to stderr (default: "warn")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! RegionKV started (data_dir=data/region, flush=1024KiB, files=0)
//! > PUT user1 info:name Alice
//! OK
//! > GET user1
//! info:name=Alice
//! > SCAN
//! user1 -> info:name=Alice
//! (1 rows)
//! > EXIT
//! bye
//! ```

use anyhow::Result;
use config::RegionConfig;
use region::Region;
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = RegionConfig::from_env()?;
    let region = Region::open(config)?;

    println!(
        "RegionKV started (data_dir={}, flush={}KiB, files={})",
        region.config().data_dir.display(),
        region.config().flush_threshold_kb(),
        region.file_count()
    );
    println!("Commands: PUT row family:qualifier value | GET row | DEL row");
    println!("          SCAN [start] [stop] [limit] | FLUSH | STATS | EXIT");

    let stdin = io::stdin();
    cli::shell::run(&region, stdin.lock(), io::stdout())
}
