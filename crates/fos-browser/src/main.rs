//! fOS Browser - Main Entry Point
//!
//! Usage: fos-browser [--width N] [--height N] [--out DIR] TARGET...
//!
//! Each target (a file path, file:// URL or about: page) is loaded through
//! the content cache and rendered to DIR/<n>.png.

use std::path::PathBuf;

use anyhow::{bail, Context};
use fos_browser::Browser;
use fos_content::{CacheConfig, Status};
use tracing_subscriber::EnvFilter;

struct Args {
    width: u32,
    height: u32,
    out: PathBuf,
    config: Option<PathBuf>,
    targets: Vec<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        width: 800,
        height: 600,
        out: PathBuf::from("."),
        config: None,
        targets: Vec::new(),
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = || iter.next().with_context(|| format!("{} needs a value", arg));
        match arg.as_str() {
            "--width" => args.width = value()?.parse().context("invalid --width")?,
            "--height" => args.height = value()?.parse().context("invalid --height")?,
            "--out" => args.out = PathBuf::from(value()?),
            "--config" => args.config = Some(PathBuf::from(value()?)),
            _ => args.targets.push(arg),
        }
    }

    if args.targets.is_empty() {
        args.targets.push("about:blank".to_string());
    }
    Ok(args)
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<CacheConfig> {
    let config = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            CacheConfig::from_json(&json)?
        }
        None => CacheConfig::default(),
    };
    Ok(config.from_env())
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting fOS Browser...");

    let args = parse_args()?;
    let config = load_config(args.config.as_ref())?;
    let browser = Browser::new(&config)?;
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    let mut failures = 0;
    for (n, target) in args.targets.iter().enumerate() {
        let handle = browser.open(target, args.width, args.height)?;
        if handle.status() != Status::Ready {
            tracing::error!("{}: {}", target, handle.borrow().status_message());
            failures += 1;
            continue;
        }

        let canvas = browser.render(&handle, args.width, args.height)?;
        let path = args.out.join(format!("{}.png", n));
        canvas.save_png(&path)?;

        let content = handle.borrow();
        tracing::info!(
            "{} -> {} ({}, {}x{}{})",
            target,
            path.display(),
            content.mime_type(),
            content.width(),
            content.height(),
            content.title().map(|t| format!(", \"{}\"", t)).unwrap_or_default()
        );
    }

    let stats = browser.cache().stats();
    tracing::info!(
        "Cache: {} entries, {} bytes, hit rate {:.0}%",
        stats.entries,
        stats.size_bytes,
        stats.hit_rate() * 100.0
    );
    browser.shutdown();

    if failures > 0 {
        bail!("{} of {} targets failed", failures, args.targets.len());
    }
    Ok(())
}
