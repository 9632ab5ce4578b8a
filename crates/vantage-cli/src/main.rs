use std::io::{self, ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use vantage_contracts::chat::{parse_command, CONSOLE_HELP_COMMANDS};
use vantage_contracts::errors::{ErrorKind, ServiceError};
use vantage_contracts::markers::{marker_color, marker_label};
use vantage_contracts::workflow::{clamp_zoom, SessionState, WorkflowState, DEFAULT_ZOOM};
use vantage_engine::{
    render_report_text, EngineConfig, Session, SessionProviders, ZoomOutcome, ANALYSIS_KEY_VARS,
    IMAGERY_KEY_VARS,
};

const EXIT_COMPLETE: i32 = 0;
const EXIT_WORKFLOW_ERROR: i32 = 2;
const EXIT_NOT_CONFIGURED: i32 = 3;

#[derive(Debug, Parser)]
#[command(
    name = "vantage",
    version,
    about = "Security camera placement from satellite imagery"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze one address and print the placement plan.
    Analyze(AnalyzeArgs),
    /// Interactive session.
    Console(ConsoleArgs),
    /// Show which API keys are configured.
    CheckConfig,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long)]
    address: String,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    zoom: Option<u8>,
    #[arg(long)]
    export: bool,
    #[arg(long)]
    dryrun: bool,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Parser)]
struct ConsoleArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    dryrun: bool,
    #[arg(long)]
    model: Option<String>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("vantage error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = EngineConfig::from_env();
    match cli.command {
        Command::Analyze(args) => run_analyze(args, &config),
        Command::Console(args) => run_console(args, &config),
        Command::CheckConfig => {
            print!("{}", config_report(&config));
            Ok(if config.missing_keys().is_empty() {
                EXIT_COMPLETE
            } else {
                EXIT_NOT_CONFIGURED
            })
        }
    }
}

/// Builds the session, or `None` after printing the not-configured screen.
fn open_session(
    config: &EngineConfig,
    out: &Path,
    events: Option<&PathBuf>,
    model: Option<&str>,
    dryrun: bool,
) -> Result<Option<Session>> {
    let (providers, selection) = match SessionProviders::from_config(config, out, model, dryrun) {
        Ok(pair) => pair,
        Err(err) if err.kind == ErrorKind::MissingConfiguration => {
            eprint!("{}", not_configured_text(&config.missing_keys()));
            return Ok(None);
        }
        Err(err) => bail!(describe_error(&err)),
    };
    if let (Some(reason), Some(_)) = (&selection.fallback_reason, &selection.requested) {
        eprintln!("{reason} Using {}.", selection.model.name);
    }
    let events_path = events
        .cloned()
        .unwrap_or_else(|| out.join("events.jsonl"));
    Ok(Some(Session::new(out, &events_path, config, providers)?))
}

fn run_analyze(args: AnalyzeArgs, config: &EngineConfig) -> Result<i32> {
    let Some(mut session) = open_session(
        config,
        &args.out,
        args.events.as_ref(),
        args.model.as_deref(),
        args.dryrun,
    )?
    else {
        return Ok(EXIT_NOT_CONFIGURED);
    };

    let result = analyze_once(&mut session, &args);
    session.finish()?;
    result
}

fn analyze_once(session: &mut Session, args: &AnalyzeArgs) -> Result<i32> {
    if session.submit(&args.address)? != WorkflowState::Complete {
        print_error_banner(session.state());
        return Ok(EXIT_WORKFLOW_ERROR);
    }

    if let Some(zoom) = args.zoom {
        let delta = i64::from(clamp_zoom(i64::from(zoom))) - i64::from(DEFAULT_ZOOM);
        if delta != 0 && session.change_zoom(delta)? == ZoomOutcome::Failed {
            print_error_banner(session.state());
        }
    }

    let state = session.state();
    if let Some(analysis) = &state.analysis {
        print!("{}", render_report_text(analysis, &state.address));
    }

    if args.export {
        match session.export()? {
            Some(path) => println!("Report exported to {}", path.display()),
            None => print_error_banner(session.state()),
        }
    }
    Ok(EXIT_COMPLETE)
}

fn run_console(args: ConsoleArgs, config: &EngineConfig) -> Result<i32> {
    let Some(mut session) = open_session(
        config,
        &args.out,
        args.events.as_ref(),
        args.model.as_deref(),
        args.dryrun,
    )?
    else {
        return Ok(EXIT_NOT_CONFIGURED);
    };

    let result = console_loop(&mut session);
    session.finish()?;
    result?;
    Ok(EXIT_COMPLETE)
}

fn console_loop(session: &mut Session) -> Result<()> {
    let stdin = io::stdin();
    let mut line = String::new();

    println!("Vantage console started. Enter an address, or /help for commands.");

    loop {
        print!("{}> ", session.state().workflow.as_str().to_ascii_lowercase());
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == IoErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        let intent = parse_command(input);
        match intent.action.as_str() {
            "noop" => continue,
            "help" => println!("Commands: {}", CONSOLE_HELP_COMMANDS.join(" ")),
            "quit" => break,
            "submit" => {
                let address = intent.address.unwrap_or_default();
                if session.state().is_loading {
                    println!("An analysis is already running.");
                    continue;
                }
                println!("Analyzing {address} ...");
                match session.submit(&address)? {
                    WorkflowState::Complete => {
                        print!("{}", format_status(session.state()));
                    }
                    WorkflowState::Error => print_error_banner(session.state()),
                    _ => {}
                }
            }
            "zoom" => {
                let delta = value_as_i64(intent.command_args.get("delta")).unwrap_or(0);
                let outcome = session.change_zoom(delta)?;
                match zoom_message(outcome, session.state()) {
                    Ok(message) => println!("{message}"),
                    Err(message) => eprintln!("{message}"),
                }
            }
            "hover" => {
                let index = value_as_index(intent.command_args.get("index"));
                if !session.hover(index) {
                    println!("No marker {}", index.map(marker_label).unwrap_or_default());
                }
            }
            "select" => {
                let Some(index) = value_as_index(intent.command_args.get("index")) else {
                    continue;
                };
                if session.select(index) {
                    match session.state().selected_marker {
                        Some(selected) => println!("Selected marker {}", marker_label(selected)),
                        None => println!("Marker deselected"),
                    }
                } else {
                    println!("No marker {}", marker_label(index));
                }
            }
            "export" => match session.export()? {
                Some(path) => println!("Report exported to {}", path.display()),
                None if session.state().error.is_some() => print_error_banner(session.state()),
                None => println!("Nothing to export yet."),
            },
            "report" => match &session.state().analysis {
                Some(analysis) => {
                    print!("{}", render_report_text(analysis, &session.state().address))
                }
                None => println!("No analysis yet."),
            },
            "status" => print!("{}", format_status(session.state())),
            "dismiss_error" => {
                if !session.dismiss_error() {
                    println!("No error to dismiss.");
                }
            }
            "reset" => {
                if session.reset()? {
                    println!("Ready for a new address.");
                } else {
                    println!("Nothing to reset.");
                }
            }
            "retry" => {
                if session.retry()? {
                    println!(
                        "Edit the address and submit again (last: {}).",
                        session.state().address
                    );
                } else {
                    println!("Retry is only available after an error.");
                }
            }
            "invalid" => {
                let reason = value_as_non_empty_string(intent.command_args.get("reason"))
                    .unwrap_or_else(|| "invalid arguments".to_string());
                println!("Invalid command: {reason}");
            }
            _ => {
                let command = value_as_non_empty_string(intent.command_args.get("command"))
                    .unwrap_or_default();
                println!("Unknown command /{command}. Type /help for commands.");
            }
        }
    }
    Ok(())
}

fn describe_error(err: &ServiceError) -> String {
    match &err.detail {
        Some(detail) => format!("{} ({detail})", err.message),
        None => err.message.clone(),
    }
}

/// Console line for a zoom attempt; `Err` goes to stderr.
fn zoom_message(outcome: ZoomOutcome, state: &SessionState) -> Result<String, String> {
    match outcome {
        ZoomOutcome::Applied => Ok(format!("Zoom {}", state.zoom)),
        ZoomOutcome::Ignored => Ok(format!("Zoom unchanged ({}).", state.zoom)),
        ZoomOutcome::Failed => Err(format!(
            "Error: {}",
            state.error.as_deref().unwrap_or("zoom failed")
        )),
    }
}

fn print_error_banner(state: &SessionState) {
    if let Some(error) = &state.error {
        eprintln!("Error: {error}");
    }
}

fn not_configured_text(missing: &[String]) -> String {
    let mut out = String::from("Vantage is not configured.\n");
    out.push_str(&format!("Missing: {}\n", missing.join(", ")));
    out.push_str(&format!(
        "Set {} (or {}) for geocoding and satellite imagery,\n",
        IMAGERY_KEY_VARS[0], IMAGERY_KEY_VARS[1]
    ));
    out.push_str(&format!(
        "and {} (or {}) for the analysis model.\n",
        ANALYSIS_KEY_VARS[0], ANALYSIS_KEY_VARS[1]
    ));
    out.push_str("Run with --dryrun to try it offline.\n");
    out
}

fn config_report(config: &EngineConfig) -> String {
    let mark = |value: &Option<String>| if value.is_some() { "set" } else { "missing" };
    let mut out = String::new();
    out.push_str(&format!(
        "{:<16} {}\n",
        IMAGERY_KEY_VARS[0],
        mark(&config.maps_api_key)
    ));
    out.push_str(&format!(
        "{:<16} {}\n",
        ANALYSIS_KEY_VARS[0],
        mark(&config.gemini_api_key)
    ));
    out.push_str(&format!("{:<16} {}\n", "maps base", config.maps_api_base));
    out.push_str(&format!("{:<16} {}\n", "gemini base", config.gemini_api_base));
    out.push_str(&format!("{:<16} {}\n", "model", config.analysis_model));
    out.push_str(&format!("{:<16} {}\n", "origin", config.origin));
    out
}

fn format_status(state: &SessionState) -> String {
    let mut out = format!("State: {}\n", state.workflow.as_str());
    if !state.address.is_empty() {
        out.push_str(&format!("Address: {}\n", state.address));
    }
    out.push_str(&format!("Zoom: {}\n", state.zoom));
    let mut busy = Vec::new();
    if state.is_loading {
        busy.push("analyzing");
    }
    if state.is_image_loading {
        busy.push("loading image");
    }
    if state.is_exporting {
        busy.push("exporting");
    }
    if !busy.is_empty() {
        out.push_str(&format!("Busy: {}\n", busy.join(", ")));
    }
    if let Some(analysis) = &state.analysis {
        let highlighted = state.highlighted_marker();
        for (idx, placement) in analysis.placements.iter().enumerate() {
            let flag = if highlighted == Some(idx) { "*" } else { " " };
            out.push_str(&format!(
                "{flag}[{}] {} {} ({:.0}%, {:.0}%)\n",
                marker_label(idx),
                marker_color(idx).hex(),
                placement.location,
                placement.coordinates.x,
                placement.coordinates.y
            ));
        }
    }
    if let Some(error) = &state.error {
        out.push_str(&format!("Error: {error}\n"));
    }
    if let Some(path) = &state.last_report {
        out.push_str(&format!("Last report: {}\n", path.display()));
    }
    out
}

fn value_as_i64(value: Option<&Value>) -> Option<i64> {
    value.and_then(Value::as_i64)
}

fn value_as_index(value: Option<&Value>) -> Option<usize> {
    value
        .and_then(Value::as_u64)
        .and_then(|index| usize::try_from(index).ok())
}

fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    let raw = value
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
