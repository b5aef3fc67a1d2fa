use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anchorpatch::config::{
    ConfigError, DEFAULT_MANIFEST_FILE, EffectiveConfig, Overrides, default_manifest_yaml,
    load_manifest, load_user_defaults, resolve_effective_config, user_defaults_path,
};
use anchorpatch::patch::Outcome;
use anchorpatch::runner::{FileReport, FileStatus, RunOptions, RunReport, Runner};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ANCHORPATCH_LOG";

#[derive(Debug)]
struct CliError {
    code: &'static str,
    message: String,
}

impl CliError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn io(code: &'static str, err: io::Error) -> Self {
        Self::new(code, err.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        let code = match &value {
            ConfigError::MissingRoot => "missing_root",
            _ => "config_error",
        };
        Self::new(code, value.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::new("json_error", value.to_string())
    }
}

#[derive(Parser, Debug)]
#[command(name = "anchorpatch")]
#[command(about = "Idempotent anchor-based text patches for a project tree")]
struct Cli {
    /// Emit one JSON object per file plus a JSON summary.
    #[arg(long, global = true)]
    json: bool,
    /// Raise diagnostic logging on stderr (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// User defaults file; defaults to ~/.anchorpatch/config.yml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply every patch in the manifest.
    Apply(RunArgs),
    /// Report what `apply` would do without writing.
    Check(RunArgs),
    /// Write a starter manifest.
    Init(InitArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(default_value = DEFAULT_MANIFEST_FILE)]
    manifest: PathBuf,
    #[arg(long)]
    root: Option<PathBuf>,
    #[arg(long, overrides_with = "no_fail_fast")]
    fail_fast: bool,
    #[arg(long, overrides_with = "fail_fast")]
    no_fail_fast: bool,
}

impl RunArgs {
    fn fail_fast_override(&self) -> Option<bool> {
        match (self.fail_fast, self.no_fail_fast) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(default_value = DEFAULT_MANIFEST_FILE)]
    path: PathBuf,
    #[arg(long)]
    force: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            let payload = json!({
                "error": {
                    "code": err.code,
                    "message": err.message,
                }
            });
            eprintln!("{payload}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool, CliError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let cwd = std::env::current_dir().map_err(|err| CliError::io("cwd_error", err))?;
    match cli.command {
        Command::Apply(args) => cmd_run(&cwd, cli.config.as_deref(), cli.json, args, false),
        Command::Check(args) => cmd_run(&cwd, cli.config.as_deref(), cli.json, args, true),
        Command::Init(args) => cmd_init(&cwd, cli.json, args).map(|()| true),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV)
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn cmd_run(
    cwd: &Path,
    user_config: Option<&Path>,
    as_json: bool,
    args: RunArgs,
    dry_run: bool,
) -> Result<bool, CliError> {
    let config = load_config(cwd, user_config, &args)?;
    if !config.root.is_dir() {
        return Err(CliError::new(
            "missing_root",
            format!("project root {} is not a directory", config.root.display()),
        ));
    }
    tracing::info!(
        root = %config.root.display(),
        patches = config.patches.len(),
        fail_fast = config.fail_fast,
        dry_run,
        "starting run"
    );

    let runner = Runner::new(
        config.root.clone(),
        RunOptions {
            fail_fast: config.fail_fast,
            dry_run,
        },
    );
    let mut print_error = None;
    let report = runner.run_with(&config.patches, |file| {
        let printed = if as_json {
            print_json(&file_to_json(file))
        } else {
            println!("{}", file.status_line());
            Ok(())
        };
        if let Err(err) = printed {
            print_error.get_or_insert(err);
        }
    });
    if let Some(err) = print_error {
        return Err(err);
    }

    if as_json {
        print_json(&summary_to_json(&report))?;
    } else {
        println!("{}", report.summary_line());
    }
    Ok(report.is_success())
}

fn load_config(
    cwd: &Path,
    user_config: Option<&Path>,
    args: &RunArgs,
) -> Result<EffectiveConfig, CliError> {
    let home = home_dir()?;
    let defaults_path = user_config
        .map(|path| cwd.join(path))
        .unwrap_or_else(|| user_defaults_path(&home));
    let defaults = load_user_defaults(&defaults_path, &home)?;

    let manifest_path = cwd.join(&args.manifest);
    if !manifest_path.is_file() {
        return Err(CliError::new(
            "missing_manifest",
            format!(
                "manifest {} not found; run `anchorpatch init` to create one",
                manifest_path.display()
            ),
        ));
    }
    let manifest = load_manifest(&manifest_path, &home)?;
    let overrides = Overrides {
        root: args.root.clone(),
        fail_fast: args.fail_fast_override(),
    };
    Ok(resolve_effective_config(manifest, &defaults, &overrides, cwd)?)
}

fn cmd_init(cwd: &Path, as_json: bool, args: InitArgs) -> Result<(), CliError> {
    let path = cwd.join(&args.path);
    let existed = path.exists();
    if existed && !args.force {
        return Err(CliError::new(
            "manifest_exists",
            format!("{} already exists; pass --force to overwrite", path.display()),
        ));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| CliError::io("mkdir_error", err))?;
    }
    fs::write(&path, default_manifest_yaml()).map_err(|err| CliError::io("write_error", err))?;

    if as_json {
        print_json(&json!({
            "status": "ok",
            "manifest": path,
            "overwritten": existed,
        }))
    } else {
        println!("wrote {}", path.display());
        Ok(())
    }
}

fn file_to_json(file: &FileReport) -> Value {
    let mut value = json!({
        "file": file.file,
        "label": file.label,
        "status": file.status_name(),
        "message": file.status_line(),
    });
    match &file.status {
        FileStatus::Done(patch) => {
            value["path"] = json!(patch.path);
            value["written"] = json!(patch.written);
            value["sha256_before"] = json!(patch.digest_before);
            value["sha256_after"] = json!(patch.digest_after);
            match &patch.outcome {
                Outcome::Patched { applied, skipped } => {
                    value["applied_edits"] = json!(applied);
                    value["skipped_edits"] = json!(skipped);
                }
                Outcome::AlreadyApplied { token } => {
                    value["guard_token"] = json!(token);
                }
                Outcome::AnchorNotFound { edit, anchor } => {
                    value["edit"] = json!(edit);
                    value["anchor"] = json!(anchor);
                }
                Outcome::GuardNotIntroduced { token } => {
                    value["guard_token"] = json!(token);
                }
            }
        }
        FileStatus::Failed(err) => {
            value["path"] = json!(err.path());
            value["error"] = json!({
                "code": err.code(),
                "message": err.to_string(),
            });
        }
    }
    value
}

fn summary_to_json(report: &RunReport) -> Value {
    let counts = report.counts();
    json!({
        "status": if report.is_success() { "ok" } else { "failed" },
        "root": report.root(),
        "dry_run": report.dry_run,
        "fail_fast": report.fail_fast,
        "aborted": report.aborted,
        "files": report.files.len(),
        "patched": counts.patched,
        "already_applied": counts.already_applied,
        "anchor_not_found": counts.anchor_not_found,
        "guard_not_introduced": counts.guard_not_introduced,
        "failed": counts.failed,
        "not_attempted": counts.not_attempted,
        "summary": report.summary_line(),
    })
}

fn home_dir() -> Result<PathBuf, CliError> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| CliError::new("home_error", "HOME environment variable is not set"))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string(value)?;
    println!("{rendered}");
    Ok(())
}
