// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! cspinject CLI
//!
//! Computes a Content-Security-Policy for a page on disk or on the web and
//! prints the header and the transformed document.

use std::env;
use std::fs;
use std::process::ExitCode;

use anyhow::{bail, Context};
use url::Url;

use cspinject::http::HttpClientConfig;
use cspinject::{CspConfig, CspInjector, HttpClient, InjectionMethod, InlineMethod};

struct Options {
    input: String,
    origin: Option<String>,
    config: CspConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cspinject=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        None => {
            print_usage();
            return ExitCode::from(1);
        }
        Some("--help" | "-h" | "help") => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        Some("--version" | "-v" | "version") => {
            println!("cspinject {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Some(_) => {}
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            print_usage();
            return ExitCode::from(1);
        }
    };

    match run(options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"cspinject - Content-Security-Policy generator

USAGE:
    cspinject <FILE|URL> [OPTIONS]

OPTIONS:
    --origin <URL>          Page URL for a local file (required for files)
    --inline <METHOD>       nonce, sha256, sha384 or sha512 (default: sha256)
    --method <METHOD>       headers or meta-tags (default: headers)
    --scan-external         Also fetch and scan scripts on other origins
    --config <FILE>         Load settings from a JSON file
    -h, --help              Show this help message
    -v, --version           Show version information

EXAMPLES:
    cspinject https://example.com/
    cspinject dist/index.html --origin https://example.com/ --method meta-tags
    cspinject page.html --origin https://example.com/ --inline nonce
"#
    );
}

fn parse_args(args: &[String]) -> anyhow::Result<Options> {
    let mut input = None;
    let mut origin = None;
    let mut config_file = None;
    let mut inline = None;
    let mut method = None;
    let mut scan_external = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--origin" => origin = Some(value(&mut iter, arg)?),
            "--inline" => inline = Some(value(&mut iter, arg)?),
            "--method" => method = Some(value(&mut iter, arg)?),
            "--config" => config_file = Some(value(&mut iter, arg)?),
            "--scan-external" => scan_external = true,
            flag if flag.starts_with("--") => bail!("unknown option: {}", flag),
            positional => {
                if input.replace(positional.to_string()).is_some() {
                    bail!("only one input may be given");
                }
            }
        }
    }

    // Flags override the config file
    let mut config = match config_file {
        Some(path) => CspConfig::from_file(&path)?,
        None => CspConfig::default(),
    };
    if let Some(inline) = inline {
        config = config.inline_method(inline.parse::<InlineMethod>()?);
    }
    if let Some(method) = method {
        config = config.injection_method(method.parse::<InjectionMethod>()?);
    }
    if scan_external {
        config = config.scan_external_origins(true);
    }

    Ok(Options {
        input: input.context("missing <FILE|URL>")?,
        origin,
        config,
    })
}

fn value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str) -> anyhow::Result<String> {
    iter.next()
        .cloned()
        .with_context(|| format!("{} needs a value", flag))
}

async fn run(options: Options) -> anyhow::Result<()> {
    let (page_url, html) = load_page(&options).await?;
    let injector = CspInjector::new(options.config)?;

    let page = injector.try_inject(&page_url, &html).await?;

    if page.report.timed_out {
        eprintln!("Warning: scan timed out, policy may be incomplete");
    }
    if let Some(header) = &page.header {
        println!("Content-Security-Policy: {}", header);
        println!();
    }
    println!("{}", page.body);

    Ok(())
}

async fn load_page(options: &Options) -> anyhow::Result<(Url, String)> {
    if let Ok(url) = Url::parse(&options.input) {
        if matches!(url.scheme(), "http" | "https") {
            let client =
                HttpClient::with_config(HttpClientConfig::from_csp_config(&options.config))?;
            let response = client.get(&url).await?;
            if !response.is_success() {
                bail!("{} answered {}", url, response.status_code());
            }
            if !response.is_html() {
                tracing::warn!(url = %url, content_type = ?response.content_type, "Input is not HTML");
            }
            let html = response.text()?;
            let page_url = match &options.origin {
                Some(origin) => Url::parse(origin).context("invalid --origin")?,
                None => response.url.clone(),
            };
            return Ok((page_url, html));
        }
    }

    let origin = options
        .origin
        .as_deref()
        .context("--origin is required when reading a file")?;
    let page_url = Url::parse(origin).context("invalid --origin")?;
    let html = fs::read_to_string(&options.input)
        .with_context(|| format!("failed to read {}", options.input))?;
    Ok((page_url, html))
}
