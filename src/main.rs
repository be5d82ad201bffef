use anyhow::{bail, Context};
use std::sync::Arc;
use tracing::info;

use schema_scout::{load_config, AppState, BatchOptions, SchemaType};

#[derive(Debug, Default)]
struct CliArgs {
    urls: Vec<String>,
    concurrency: Option<usize>,
    timeout_ms: Option<u64>,
    target_types: Vec<SchemaType>,
    no_cache: bool,
}

fn parse_args(args: impl Iterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut args = args;

    while let Some(a) = args.next() {
        let (flag, inline) = match a.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (a.clone(), None),
        };
        let mut value = |name: &str| -> anyhow::Result<String> {
            match inline.clone().or_else(|| args.next()) {
                Some(v) => Ok(v),
                None => bail!("{} needs a value", name),
            }
        };

        match flag.as_str() {
            "--concurrency" => {
                out.concurrency = Some(
                    value("--concurrency")?
                        .parse()
                        .context("--concurrency must be a number")?,
                )
            }
            "--timeout-ms" => {
                out.timeout_ms = Some(
                    value("--timeout-ms")?
                        .parse()
                        .context("--timeout-ms must be a number")?,
                )
            }
            "--type" => {
                let raw = value("--type")?;
                match SchemaType::parse_str(&raw) {
                    Some(t) => out.target_types.push(t),
                    None => bail!("unknown schema type '{}'", raw),
                }
            }
            "--no-cache" => out.no_cache = true,
            other if other.starts_with("--") => bail!("unknown flag {}", other),
            _ => out.urls.push(a),
        }
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args(std::env::args().skip(1))?;
    if cli.urls.is_empty() {
        bail!("usage: schema-scout [--concurrency N] [--timeout-ms MS] [--type TYPE]... [--no-cache] URL...");
    }

    let config = load_config();
    let state = Arc::new(AppState::from_config(config).context("failed to initialise services")?);
    info!("Starting schema-scout for {} URL(s)", cli.urls.len());

    let mut opts = BatchOptions {
        concurrency: cli.concurrency,
        timeout_ms: cli.timeout_ms,
        ..Default::default()
    };
    opts.generate.target_types = cli.target_types;
    if cli.no_cache {
        opts.generate.use_cache = Some(false);
    }

    let report = schema_scout::batch_generate::generate_batch(&state, cli.urls, &opts).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.successful == 0 {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_flags_and_urls() {
        let cli = parse_args(args(&[
            "--concurrency",
            "4",
            "--type=recipe",
            "https://a.test/",
            "--no-cache",
            "https://b.test/",
        ]))
        .unwrap();
        assert_eq!(cli.concurrency, Some(4));
        assert_eq!(cli.target_types, vec![SchemaType::Recipe]);
        assert!(cli.no_cache);
        assert_eq!(cli.urls, vec!["https://a.test/", "https://b.test/"]);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(args(&["--type", "spaceship"])).is_err());
        assert!(parse_args(args(&["--concurrency"])).is_err());
        assert!(parse_args(args(&["--bogus"])).is_err());
    }
}
