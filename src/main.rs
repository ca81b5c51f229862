//! emag-audit CLI entry point

use clap::Parser;
use emag_audit::{
    output, AuditConfig, AuditDocument, AuditEngine, Mode,
};
use miette::{IntoDiagnostic, Result};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "emag-audit")]
#[command(author, version, about = "Auditor de acessibilidade eMAG/WCAG para páginas web", long_about = None)]
struct Cli {
    /// Page to audit: an http(s) URL, an HTML file path, or "-" for stdin
    input: String,

    /// Rule set to run
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Config file path (default: auto-detect .emagauditrc.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run only this rule (can be used multiple times)
    #[arg(short, long = "rule", value_name = "RULE")]
    rules: Vec<String>,

    /// Disable specific rule (can be used multiple times)
    #[arg(short, long = "ignore", value_name = "RULE")]
    ignore: Vec<String>,

    /// Skip the link-reachability probes
    #[arg(long = "no-probe")]
    no_probe: bool,

    /// Base URL for resolving relative links of a local HTML file
    #[arg(long = "base-url", value_name = "URL")]
    base_url: Option<String>,

    /// Show summary statistics at the end
    #[arg(long)]
    statistics: bool,

    /// Verbose output (also list passing and inapplicable rules)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Emag,
    Wcag,
    Both,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Emag => Mode::Emag,
            ModeArg::Wcag => Mode::Wcag,
            ModeArg::Both => Mode::Both,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = if let Some(ref config_path) = cli.config {
        AuditConfig::from_file(config_path).into_diagnostic()?
    } else {
        let start_dir = std::env::current_dir().into_diagnostic()?;
        match AuditConfig::find_and_load(&start_dir) {
            Ok(Some((path, cfg))) => {
                if cli.verbose {
                    eprintln!("Usando configuração: {}", path.display());
                }
                cfg
            }
            Ok(None) => AuditConfig::default(),
            Err(e) => {
                eprintln!("Aviso: falha ao carregar configuração: {e}");
                AuditConfig::default()
            }
        }
    };

    let is_url = cli.input.starts_with("http://") || cli.input.starts_with("https://");
    config.merge_cli(emag_audit::config::CliOptions {
        mode: cli.mode.map(Mode::from),
        enabled_rules: if cli.rules.is_empty() {
            None
        } else {
            Some(cli.rules)
        },
        disabled_rules: cli.ignore,
        no_probe: cli.no_probe,
        base_url: cli
            .base_url
            .clone()
            .or_else(|| is_url.then(|| cli.input.clone())),
    });

    let html = read_input(&cli.input, is_url, config.probe.timeout)?;

    let engine = AuditEngine::with_defaults(config).into_diagnostic()?;
    if cli.verbose {
        eprintln!("{} regras carregadas", engine.rule_count());
    }

    let doc = AuditDocument::parse(&html);
    let result = engine.run_default(&doc);

    match cli.format {
        OutputFormat::Text => output::print_text(&result, cli.verbose),
        OutputFormat::Json => {
            println!("{}", output::format_json(&result).into_diagnostic()?);
        }
    }
    if cli.statistics {
        output::print_statistics(&result);
    }

    if result.violations.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

/// Load the page snapshot from a URL, file, or stdin
fn read_input(input: &str, is_url: bool, timeout: Duration) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .into_diagnostic()?;
        return Ok(buffer);
    }
    if is_url {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("emag-audit/", env!("CARGO_PKG_VERSION")))
            .build()
            .into_diagnostic()?;
        let response = client.get(input).send().into_diagnostic()?;
        return response.text().into_diagnostic();
    }
    std::fs::read_to_string(input).into_diagnostic()
}
