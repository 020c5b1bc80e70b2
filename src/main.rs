//! `zenith-router` CLI.
//!
//! Compiles a routes directory into `<out-dir>/assets/router-manifest.json`,
//! the table the client router is built from.
//!
//! ```text
//! zenith-router --routes src/routes --out-dir dist
//! zenith-router --routes src/routes --out-dir dist --page-ext .zen --endpoint-ext .ts
//! ```

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use zenith_router::{compile_dir, ManifestConfig};

#[derive(Parser, Debug)]
#[command(name = "zenith-router", version, about = "Compile a Zenith routes directory to a router manifest")]
struct Args {
    /// Routes directory to walk.
    #[arg(long, default_value = "src/routes")]
    routes: PathBuf,

    /// Output directory; the manifest is written under `assets/`.
    #[arg(long)]
    out_dir: PathBuf,

    /// Page file extension (repeatable). Defaults to `.zen`.
    #[arg(long = "page-ext")]
    page_ext: Vec<String>,

    /// Server endpoint extension (repeatable). Defaults to `.js` and `.ts`.
    #[arg(long = "endpoint-ext")]
    endpoint_ext: Vec<String>,

    /// Print the manifest to stdout instead of writing it.
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn config(&self) -> ManifestConfig {
        let mut config = ManifestConfig {
            routes_dir: self.routes.clone(),
            ..Default::default()
        };
        if !self.page_ext.is_empty() {
            config.page_extensions = self.page_ext.iter().map(|e| dotted(e)).collect();
        }
        if !self.endpoint_ext.is_empty() {
            config.endpoint_extensions = self.endpoint_ext.iter().map(|e| dotted(e)).collect();
        }
        config
    }
}

fn dotted(ext: &str) -> String {
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Args::parse()) {
        eprintln!("[zenith-router] {err:#}");
        process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = args.config();
    let compiled = compile_dir(&config)
        .with_context(|| format!("failed to compile routes in '{}'", config.routes_dir.display()))?;

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&compiled.data)?);
        return Ok(());
    }

    let path = compiled
        .data
        .write_to(&args.out_dir)
        .with_context(|| format!("failed to write manifest under '{}'", args.out_dir.display()))?;
    info!(
        path = %path.display(),
        pages = compiled.data.pages.len(),
        endpoints = compiled.data.endpoints.len(),
        "router manifest written"
    );
    Ok(())
}
