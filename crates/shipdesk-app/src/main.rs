use anyhow::Result;
use shipdesk_app::DeskSession;
use shipdesk_batch::{BatchProgress, BatchRun, PrintOutcome};
use shipdesk_domain::{CoreError, PostingNumber, PrintStatusFilter, StatusTab};
use shipdesk_listing::{FeedUpdate, ScanUpdate};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

const DEFAULT_CONTAINER_WIDTH: u32 = 1368;
const DEFAULT_PAGES: usize = 1;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = shipdesk_config::config_path_from_env()?;
    let config = shipdesk_config::load_from_path(&config_path)?;
    init_file_logging(&config_path)?;
    let cli = parse_cli_args(std::env::args().skip(1))?;
    if cli.command == Command::Help {
        print_cli_help();
        return Ok(());
    }

    let session = DeskSession::connect(&config, cli.width)?;
    let reporter = spawn_progress_reporter(session.progress().subscribe());

    match cli.command {
        Command::List => run_list(&session, cli.tab, cli.pages).await,
        Command::Scan { query } => run_scan(&session, &query, cli.print_status).await,
        Command::Print { postings } => {
            let outcome = session.print_postings(&postings).await;
            report_print(&outcome);
        }
        Command::Sync { postings } => {
            let run = session.sync_postings(postings).await;
            report_sync(&run);
        }
        Command::Help => {}
    }

    reporter.abort();
    Ok(())
}

fn init_file_logging(config_path: &Path) -> Result<(), CoreError> {
    let log_path = log_file_path(config_path);
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|error| {
                CoreError::Configuration(format!(
                    "failed to create shipdesk log directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|error| {
            CoreError::Configuration(format!(
                "failed to open shipdesk log file '{}': {error}",
                log_path.display()
            ))
        })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    Ok(())
}

fn log_file_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join("shipdesk.log")
}

fn spawn_progress_reporter(
    mut progress: broadcast::Receiver<BatchProgress>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match progress.recv().await {
                Ok(update) => eprintln!(
                    "[{}] {}/{} done, {} failed",
                    update.operation, update.completed, update.total, update.failed
                ),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "progress reporter lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn run_list(session: &DeskSession, tab: StatusTab, pages: usize) {
    session
        .feed()
        .with_coordinator(|coordinator| coordinator.set_status_tab(tab));
    for update in session.feed().load_pages(pages).await {
        if let FeedUpdate::Failed { notice } = update {
            eprintln!("{notice}");
        }
    }

    let snapshot = session.feed().snapshot();
    for shipment in &snapshot.shipments {
        println!(
            "{}\t{}\t{}",
            shipment.posting_number,
            shipment.operation_status.as_deref().unwrap_or(&shipment.status),
            shipment.tracking_number.as_deref().unwrap_or("-")
        );
    }
    println!(
        "{} of {} shipments loaded{}",
        snapshot.shipments.len(),
        snapshot.reported_total,
        if snapshot.has_more {
            " (more available)"
        } else {
            ""
        }
    );
}

async fn run_scan(session: &DeskSession, query: &str, print_status: PrintStatusFilter) {
    match session.scan().search(query, print_status).await {
        ScanUpdate::Failed { notice } => eprintln!("{notice}"),
        ScanUpdate::Idle => eprintln!("Nothing to look up."),
        _ => {}
    }
    for shipment in session.scan().results() {
        let printed = if shipment.is_label_printed() {
            "printed"
        } else {
            "unprinted"
        };
        println!("{}\t{}\t{printed}", shipment.posting_number, shipment.status);
    }
}

fn report_print(outcome: &PrintOutcome) {
    match outcome {
        PrintOutcome::AllSucceeded { pdf_urls, printed } => {
            println!("Printed {} labels.", printed.len());
            for url in pdf_urls {
                println!("{url}");
            }
        }
        PrintOutcome::Partial {
            pdf_urls,
            printed,
            failed,
        } => {
            println!("Printed {} labels, {} failed.", printed.len(), failed.len());
            for url in pdf_urls {
                println!("{url}");
            }
            for failure in failed {
                println!(
                    "{}: {} ({})",
                    failure.posting_number, failure.error, failure.suggestion
                );
            }
        }
        PrintOutcome::AllFailed { failed } => {
            println!("No labels printed.");
            for failure in failed {
                println!(
                    "{}: {} ({})",
                    failure.posting_number, failure.error, failure.suggestion
                );
            }
        }
        PrintOutcome::NotReady {
            message,
            retry_after,
        } => match retry_after {
            Some(wait) => println!("{message} Retry in {}s.", wait.as_secs()),
            None => println!("{message} Retry shortly."),
        },
        PrintOutcome::Unexpected { message } => eprintln!("Printing failed: {message}"),
    }
}

fn report_sync(run: &BatchRun<()>) {
    println!(
        "Synced {} of {} postings, {} failed.",
        run.succeeded, run.total, run.failed
    );
    for failure in &run.failures {
        println!("{}: {} ({})", failure.key, failure.reason, failure.suggestion);
    }
    if let Some(reason) = &run.aborted {
        eprintln!("Sync stopped early: {reason}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    List,
    Scan { query: String },
    Print { postings: Vec<PostingNumber> },
    Sync { postings: Vec<PostingNumber> },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    tab: StatusTab,
    width: u32,
    pages: usize,
    print_status: PrintStatusFilter,
    command: Command,
}

fn parse_cli_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs, CoreError> {
    let mut tab = StatusTab::default();
    let mut width = DEFAULT_CONTAINER_WIDTH;
    let mut pages = DEFAULT_PAGES;
    let mut print_status = PrintStatusFilter::All;
    let mut positional = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--tab" => {
                let value = read_cli_value(&arg, args.next())?;
                tab = StatusTab::from_key(&value).ok_or_else(|| {
                    CoreError::Configuration(format!(
                        "Unknown tab '{value}'. Use one of: {}.",
                        StatusTab::ALL
                            .iter()
                            .map(|tab| tab.as_key())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                })?;
            }
            "--width" => {
                let value = read_cli_value(&arg, args.next())?;
                width = value.parse().map_err(|_| {
                    CoreError::Configuration(format!(
                        "Flag '--width' expects a pixel count, got '{value}'."
                    ))
                })?;
            }
            "--pages" => {
                let value = read_cli_value(&arg, args.next())?;
                pages = value
                    .parse::<usize>()
                    .ok()
                    .filter(|pages| *pages > 0)
                    .ok_or_else(|| {
                        CoreError::Configuration(format!(
                            "Flag '--pages' expects a positive number, got '{value}'."
                        ))
                    })?;
            }
            "--print-status" => {
                let value = read_cli_value(&arg, args.next())?;
                print_status = match value.to_ascii_lowercase().as_str() {
                    "all" => PrintStatusFilter::All,
                    "printed" => PrintStatusFilter::Printed,
                    "unprinted" => PrintStatusFilter::Unprinted,
                    _ => {
                        return Err(CoreError::Configuration(format!(
                            "Unknown print status '{value}'. Use all, printed or unprinted."
                        )))
                    }
                };
            }
            "--help" | "-h" => {
                positional.clear();
                positional.push("help".to_owned());
                break;
            }
            value if value.starts_with("--") => {
                return Err(CoreError::Configuration(format!(
                    "Unknown flag '{value}'. Run with --help for valid flags."
                )));
            }
            _ => positional.push(arg),
        }
    }

    Ok(CliArgs {
        tab,
        width,
        pages,
        print_status,
        command: parse_command(positional)?,
    })
}

fn parse_command(positional: Vec<String>) -> Result<Command, CoreError> {
    let mut words = positional.into_iter();
    let Some(name) = words.next() else {
        return Ok(Command::List);
    };
    let rest = words.collect::<Vec<_>>();

    match name.as_str() {
        "list" => Ok(Command::List),
        "help" => Ok(Command::Help),
        "scan" => {
            let query = rest.join(" ");
            if query.trim().is_empty() {
                return Err(CoreError::Configuration(
                    "Command 'scan' requires a query. Use: shipdesk scan <query>.".to_owned(),
                ));
            }
            Ok(Command::Scan { query })
        }
        "print" | "sync" => {
            if rest.is_empty() {
                return Err(CoreError::Configuration(format!(
                    "Command '{name}' requires at least one posting number."
                )));
            }
            let postings = rest.into_iter().map(PostingNumber::from).collect();
            if name == "print" {
                Ok(Command::Print { postings })
            } else {
                Ok(Command::Sync { postings })
            }
        }
        unknown => Err(CoreError::Configuration(format!(
            "Unknown command '{unknown}'. Run with --help for valid commands."
        ))),
    }
}

fn read_cli_value(flag: &str, value: Option<String>) -> Result<String, CoreError> {
    let value = value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            CoreError::Configuration(format!("Flag '{flag}' requires a non-empty value."))
        })?;
    Ok(value)
}

fn print_cli_help() {
    println!("Usage: shipdesk [--tab <tab>] [--width <px>] [--pages <n>] [--print-status <filter>] <command>");
    println!();
    println!("Commands:");
    println!("  list                  Load shipments of the selected tab (default)");
    println!("  scan <query>          Look up shipments by scanned code");
    println!("  print <posting...>    Print shipping labels");
    println!("  sync <posting...>     Sync postings with the marketplace");
    println!();
    println!("  --tab <tab>               awaiting_stock, allocating, allocated, tracking_confirmed, shipping, printed");
    println!("  --width <px>              Width of the list container used to size pages");
    println!("  --pages <n>               Number of pages to load for `list`");
    println!("  --print-status <filter>   all, printed or unprinted for `scan`");
    println!("  --help                    Show this help message");
}
