//! Parse command - run the report parser on saved output
//!
//! Handy for checking a captured `kiro-cli` report without spawning the CLI:
//! `kiro-cli chat --no-interactive /usage > report.txt && kirobar parse report.txt`

use clap::Args;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt};

use kirobar::core::ProviderFetchResult;
use kirobar::providers::kiro::parser;
use kirobar::settings::Settings;

use super::usage::{render_text, ErrorPayload, ProviderPayload};
use super::{to_json, OutputOptions};

/// Arguments for the parse command
#[derive(Args, Debug, Default)]
pub struct ParseArgs {
    /// Report file to parse; reads stdin when omitted or "-"
    pub file: Option<PathBuf>,
}

/// Run the parse command
pub async fn run(args: ParseArgs, settings: &Settings, output: OutputOptions) -> anyhow::Result<()> {
    let (raw, source) = match args.file {
        Some(ref path) if path.as_os_str() != "-" => {
            let bytes = tokio::fs::read(path).await?;
            (String::from_utf8_lossy(&bytes).into_owned(), "file")
        }
        _ => (read_report(tokio::io::stdin()).await?, "stdin"),
    };

    tracing::debug!("Parsing {} bytes from {}", raw.len(), source);

    match parser::parse(&raw) {
        Ok(usage) => {
            let result = ProviderFetchResult::new(usage, source);
            if output.json {
                let payload = ProviderPayload {
                    provider: "kiro",
                    version: None,
                    result: &result,
                };
                println!("{}", to_json(&payload, output.pretty)?);
            } else {
                println!("{}", render_text(&result, settings, output.use_color));
            }
            Ok(())
        }
        Err(e) => {
            if output.json {
                println!("{}", to_json(&ErrorPayload::new(&e), output.pretty)?);
            }
            Err(e.into())
        }
    }
}

/// Read a whole report, replacing invalid UTF-8 like the live runner does
async fn read_report<R: AsyncRead + Unpin>(mut reader: R) -> std::io::Result<String> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
