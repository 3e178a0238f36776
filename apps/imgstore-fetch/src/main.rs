//! imgstore-fetch - fetch a source image through the storage readers.
//!
//! Resolves a source URL with the same scheme registry an image proxy uses,
//! prints the response status and headers to stderr and writes the body to
//! stdout or a file.
//!
//! # Usage
//!
//! ```text
//! IMGSTORE_USE_S3=true imgstore-fetch s3://bucket/image.png --range bytes=0-1023 -o head.bin
//! ```
//!
//! # Options
//!
//! | Option | Description |
//! |--------|-------------|
//! | `--range <value>` | Send a `Range` header |
//! | `--if-none-match <etag>` | Send an `If-None-Match` header |
//! | `--if-modified-since <date>` | Send an `If-Modified-Since` header |
//! | `-o`, `--output <path>` | Write the body to a file instead of stdout |
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `IMGSTORE_LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `IMGSTORE_LOG_LEVEL`) |
//!
//! Storage readers are configured by the variables documented on
//! `TransportConfig::from_env`.

use anyhow::{Context, Result, bail};
use http::header::{HeaderName, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH, RANGE};
use http::HeaderMap;
use imgstore_transport::{Transport, TransportConfig};
use tokio::fs::File;
use tokio::io::{self, AsyncWrite, AsyncWriteExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "usage: imgstore-fetch <url> [--range <value>] [--if-none-match <etag>] \
                     [--if-modified-since <date>] [-o <path>]";

/// Parsed command line.
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    url: String,
    headers: Vec<(HeaderName, String)>,
    output: Option<String>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .with_context(|| format!("{flag} needs a value\n{USAGE}"))
            };
            match arg.as_str() {
                "--range" => parsed.headers.push((RANGE, value("--range")?)),
                "--if-none-match" => parsed
                    .headers
                    .push((IF_NONE_MATCH, value("--if-none-match")?)),
                "--if-modified-since" => parsed
                    .headers
                    .push((IF_MODIFIED_SINCE, value("--if-modified-since")?)),
                "-o" | "--output" => parsed.output = Some(value("--output")?),
                flag if flag.starts_with('-') => bail!("unknown option {flag}\n{USAGE}"),
                _ if parsed.url.is_empty() => parsed.url.clone_from(&arg),
                _ => bail!("unexpected argument {arg}\n{USAGE}"),
            }
        }

        if parsed.url.is_empty() {
            bail!("{USAGE}");
        }
        Ok(parsed)
    }

    fn header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid {name} header value: {value:?}"))?;
            headers.insert(name.clone(), value);
        }
        Ok(headers)
    }
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to `log_level`.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Read the log level from the environment.
fn log_level() -> String {
    std::env::var("IMGSTORE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;
    let req_headers = args.header_map()?;

    init_tracing(&log_level())?;

    let config = TransportConfig::from_env();
    let transport = Transport::from_config(&config)
        .await
        .context("failed to initialize storage readers")?;
    info!(
        schemes = ?transport.schemes(),
        version = VERSION,
        "starting imgstore-fetch",
    );

    let response = transport
        .round_trip(&args.url, &req_headers)
        .await
        .with_context(|| format!("failed to fetch {}", args.url))?;

    let mut stderr = io::stderr();
    stderr
        .write_all(format!("{:?} {}\n", response.version(), response.status()).as_bytes())
        .await?;
    for (name, value) in response.headers() {
        let value = String::from_utf8_lossy(value.as_bytes());
        stderr
            .write_all(format!("{name}: {value}\n").as_bytes())
            .await?;
    }

    let mut body = response.into_body();
    let mut out: Box<dyn AsyncWrite + Unpin> = match &args.output {
        Some(path) => Box::new(
            File::create(path)
                .await
                .with_context(|| format!("can't create {path}"))?,
        ),
        None => Box::new(io::stdout()),
    };
    let written = io::copy(&mut body, &mut out).await?;
    out.flush().await?;

    info!(bytes = written, "body written");
    Ok(())
}
