//! Formguard - secret scanning for form fields
//!
//! The `formguard` command runs the scanning pipeline against page snapshots
//! (JSON dumps of a page's form elements).
//!
//! ## Commands
//!
//! - `collect`: Serialize a page's fields into a scan document
//! - `chunk`: Split a scan document into size-bounded chunks
//! - `scan`: Scan a page, mark and redact fields holding secrets

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use formguard_client::HttpScanTransport;
use formguard_core::{
    chunk_document_with_limit, collect_form_data, FieldTracker, FileSettingsStore, LogControl,
    MemoryPage, ScanReport, ScanTransport, Settings, SettingsStore, MAX_CHUNK_SIZE, METRICS,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "formguard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find and redact secrets typed into form fields", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the scan document and field spans collected from a page
    Collect {
        /// Page snapshot (JSON)
        #[arg(short, long)]
        page: PathBuf,
    },

    /// Split a scan document into chunks
    Chunk {
        /// Serialized scan document
        #[arg(short, long)]
        input: PathBuf,

        /// Base name for chunk filenames
        #[arg(long, default_value = "form_data")]
        base_name: String,

        /// Maximum chunk size in bytes
        #[arg(long, default_value_t = MAX_CHUNK_SIZE)]
        max_bytes: usize,
    },

    /// Scan a page and apply the findings
    Scan {
        /// Page snapshot (JSON)
        #[arg(short, long)]
        page: PathBuf,

        /// Settings file (TOML)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Scan API base URL (overrides settings)
        #[arg(long, env = "FORMGUARD_API_URL")]
        api_url: Option<String>,

        /// Scan API key (overrides settings)
        #[arg(long, env = "FORMGUARD_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Mark fields but leave their values untouched
        #[arg(long)]
        no_redact: bool,

        /// Placeholder written over secrets
        #[arg(long)]
        redact_text: Option<String>,

        /// Write the updated page snapshot here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Command-line overrides applied on top of the settings file.
#[derive(Debug, Default)]
struct SettingsOverrides {
    api_url: Option<String>,
    api_key: Option<String>,
    no_redact: bool,
    redact_text: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_control = formguard_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Collect { page } => {
            print!("{}", cmd_collect(&page)?);
            Ok(())
        }
        Commands::Chunk {
            input,
            base_name,
            max_bytes,
        } => {
            print!("{}", cmd_chunk(&input, &base_name, max_bytes)?);
            Ok(())
        }
        Commands::Scan {
            page,
            settings,
            api_url,
            api_key,
            no_redact,
            redact_text,
            output,
        } => {
            let overrides = SettingsOverrides {
                api_url,
                api_key,
                no_redact,
                redact_text,
            };
            let settings = resolve_settings(settings.as_deref(), overrides).await?;
            cmd_scan(&log_control, &page, &settings, output.as_deref()).await
        }
    }
}

fn load_page(path: &Path) -> Result<MemoryPage> {
    MemoryPage::load(path).with_context(|| format!("Failed to load page snapshot: {:?}", path))
}

/// Serialize the page's fields and describe where each one landed
fn cmd_collect(page_path: &Path) -> Result<String> {
    let page = load_page(page_path)?;
    let mut out = String::new();

    let Some(form_data) = collect_form_data(&page) else {
        writeln!(out, "No scannable fields found")?;
        return Ok(out);
    };

    writeln!(out, "# {}", form_data.filename)?;
    out.push_str(&form_data.document);
    writeln!(out)?;
    writeln!(out, "Fields ({}):", form_data.span_map.len())?;
    for (id, span) in form_data.span_map.iter() {
        writeln!(
            out,
            "  {}  lines {}-{} (value from {})",
            id, span.start_line, span.end_line, span.value_start_line
        )?;
    }
    Ok(out)
}

/// Chunk a serialized document and list the chunks
fn cmd_chunk(input: &Path, base_name: &str, max_bytes: usize) -> Result<String> {
    let document = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read document: {:?}", input))?;
    let chunks = chunk_document_with_limit(&document, base_name, max_bytes);

    let mut out = String::new();
    writeln!(out, "{} chunk(s), limit {} bytes", chunks.len(), max_bytes)?;
    for chunk in &chunks {
        writeln!(
            out,
            "  {}  {} bytes  [{}]",
            chunk.filename,
            chunk.byte_size(),
            chunk.field_ids.join(", ")
        )?;
    }
    Ok(out)
}

/// Settings from the file (if any) with command-line overrides applied
async fn resolve_settings(path: Option<&Path>, overrides: SettingsOverrides) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => {
            let store = FileSettingsStore::open(path)
                .with_context(|| format!("Failed to load settings: {:?}", path))?;
            store.load().await?
        }
        None => Settings::default(),
    };

    if let Some(url) = overrides.api_url {
        settings.scan_endpoint_url = url;
    }
    if let Some(key) = overrides.api_key {
        settings.api_key = key;
    }
    if overrides.no_redact {
        settings.auto_redact = false;
    }
    if let Some(text) = overrides.redact_text {
        settings.redact_text = text;
    }
    Ok(settings)
}

/// Scan a page through the HTTP transport
async fn cmd_scan(
    log_control: &LogControl,
    page_path: &Path,
    settings: &Settings,
    output: Option<&Path>,
) -> Result<()> {
    log_control.apply(settings);

    let transport = HttpScanTransport::from_env().context("Failed to create HTTP client")?;
    let report = run_scan(transport, page_path, settings, output).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    METRICS.flush();
    Ok(())
}

/// Scan `page_path` with `transport`, optionally saving the updated page
async fn run_scan<T: ScanTransport>(
    transport: T,
    page_path: &Path,
    settings: &Settings,
    output: Option<&Path>,
) -> Result<ScanReport> {
    let page = load_page(page_path)?;
    let tracker = FieldTracker::from_settings(transport, settings);

    let report = match tracker.try_scan_all_fields(&page).await {
        Ok(report) => report.unwrap_or_default(),
        Err(err) if err.is_configuration() => {
            return Err(anyhow::Error::new(err).context(
                "Scan not configured: set --api-url and --api-key \
                 (or FORMGUARD_API_URL and FORMGUARD_API_KEY)",
            ));
        }
        Err(err) => return Err(anyhow::Error::new(err).context("Scan failed")),
    };

    info!(
        secrets = report.secret_fields.len(),
        redacted = report.redacted_fields.len(),
        "scan complete"
    );

    if let Some(path) = output {
        page.save(path)
            .with_context(|| format!("Failed to write page snapshot: {:?}", path))?;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use formguard_core::fakes::ScriptedTransport;
    use formguard_core::{
        ElementSnapshot, PageSnapshot, ScanError, NO_SECRET_CLASS, SECRET_FOUND_CLASS,
    };
    use serde_json::json;

    fn write_page(dir: &Path, elements: Vec<ElementSnapshot>) -> PathBuf {
        let path = dir.join("page.json");
        let snapshot = PageSnapshot { elements };
        std::fs::write(&path, serde_json::to_string(&snapshot).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_collect_lists_document_and_spans() {
        let dir = tempfile::tempdir().unwrap();
        let page = write_page(
            dir.path(),
            vec![
                ElementSnapshot::input("email", "user_email", "a@example.com"),
                ElementSnapshot::textarea("notes", "one\ntwo"),
            ],
        );

        let out = cmd_collect(&page).unwrap();
        assert!(out.contains("- field_id: input_email_user_email\n"));
        assert!(out.contains("input_email_user_email  lines 1-3 (value from 3)"));
        assert!(out.contains("textarea_textarea_notes  lines 4-7 (value from 6)"));
    }

    #[test]
    fn test_collect_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let page = write_page(dir.path(), vec![ElementSnapshot::input("checkbox", "c", "on")]);
        assert_eq!(cmd_collect(&page).unwrap(), "No scannable fields found\n");
    }

    #[test]
    fn test_collect_missing_page_has_context() {
        let err = cmd_collect(Path::new("/nonexistent/page.json")).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to load page snapshot"));
    }

    #[test]
    fn test_chunk_reports_each_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.yaml");
        let document = format!(
            "- field_id: a\n  value: |\n    {}\n- field_id: b\n  value: |\n    {}\n",
            "x".repeat(60),
            "y".repeat(60)
        );
        std::fs::write(&input, &document).unwrap();

        let out = cmd_chunk(&input, "form_data_1", 100).unwrap();
        assert!(out.starts_with("2 chunk(s), limit 100 bytes"));
        assert!(out.contains("form_data_1_chunk_0.yaml"));
        assert!(out.contains("[b]"));

        let whole = cmd_chunk(&input, "form_data_1", MAX_CHUNK_SIZE).unwrap();
        assert!(whole.contains("form_data_1.yaml"));
        assert!(whole.contains("[a, b]"));
    }

    #[tokio::test]
    async fn test_overrides_win_over_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "scan_endpoint_url = \"https://file.example.com\"\napi_key = \"file-key\"\nredact_text = \"***\"\n",
        )
        .unwrap();

        let settings = resolve_settings(
            Some(&path),
            SettingsOverrides {
                api_key: Some("cli-key".to_string()),
                no_redact: true,
                ..SettingsOverrides::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(settings.scan_endpoint_url, "https://file.example.com");
        assert_eq!(settings.api_key, "cli-key");
        assert_eq!(settings.redact_text, "***");
        assert!(!settings.auto_redact);
    }

    #[tokio::test]
    async fn test_run_scan_writes_updated_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let page = write_page(
            dir.path(),
            vec![
                ElementSnapshot::input("text", "user", "alice"),
                ElementSnapshot::input("password", "token", "ghp_abcdef123456"),
            ],
        );
        let output = dir.path().join("out.json");

        let transport = ScriptedTransport::new();
        transport.push_json(json!({
            "policy_break_count": 1,
            "policies": ["Secrets detection"],
            "policy_breaks": [{
                "type": "GitHub Token",
                "matches": [{"match": "ghp_abcdef123456", "line_start": 6, "line_end": 6}]
            }]
        }));

        let settings = Settings::new("https://api.example.com", "key");
        let report = run_scan(transport, &page, &settings, Some(&output)).await.unwrap();
        assert_eq!(report.secret_fields, vec!["input_password_token"]);

        let saved = MemoryPage::load(&output).unwrap().snapshot();
        assert_eq!(saved.elements[0].value, "alice");
        assert!(saved.elements[0].classes.contains(&NO_SECRET_CLASS.to_string()));
        assert_eq!(saved.elements[1].value, "REDACTED");
        assert!(saved.elements[1].classes.contains(&SECRET_FOUND_CLASS.to_string()));
    }

    #[tokio::test]
    async fn test_run_scan_without_credentials_fails() {
        let dir = tempfile::tempdir().unwrap();
        let page = write_page(dir.path(), vec![ElementSnapshot::input("text", "user", "alice")]);

        let err = run_scan(ScriptedTransport::new(), &page, &Settings::default(), None)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("Scan not configured"));
        assert!(matches!(
            err.downcast_ref::<ScanError>(),
            Some(ScanError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_run_scan_transport_error_is_a_scan_failure() {
        let dir = tempfile::tempdir().unwrap();
        let page = write_page(dir.path(), vec![ElementSnapshot::input("text", "user", "alice")]);
        let output = dir.path().join("out.json");

        let transport = ScriptedTransport::new();
        transport.push_error(ScanError::network("connection refused"));
        let settings = Settings::new("https://api.example.com", "key");

        let err = run_scan(transport, &page, &settings, Some(&output))
            .await
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Scan failed"));
        assert!(!message.contains("not configured"));
        assert!(!output.exists());
    }

    #[test]
    fn test_cli_parses_scan_flags() {
        let cli = Cli::try_parse_from([
            "formguard",
            "--verbose",
            "scan",
            "--page",
            "page.json",
            "--api-url",
            "https://api.example.com",
            "--no-redact",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Scan {
                api_url, no_redact, ..
            } => {
                assert_eq!(api_url.as_deref(), Some("https://api.example.com"));
                assert!(no_redact);
            }
            _ => panic!("expected scan command"),
        }
    }
}
