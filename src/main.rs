use anyhow::Result;
use bypass_router::args::{Args, Command};
use bypass_router::{report, sqlite, utils};
use bypass_router::{init_default_service_map, ServiceMap, Session, SystemClock};
use clap::Parser;
use std::rc::Rc;
use std::time::Instant;
use tracing::{error, info};

fn open_session(args: &Args) -> Result<Session> {
    let store = sqlite::open_store(args.store.as_deref())?;
    let services = ServiceMap::load(args.services.as_deref())?;
    Ok(Session::new(services, store, Rc::new(SystemClock)))
}

fn run(args: &Args) -> Result<()> {
    let start_time = Instant::now();

    match &args.command {
        Command::Init => init_default_service_map()?,
        Command::Route { url } => {
            let mut session = open_session(args)?;
            let decision = session.route(url)?;
            report::print_route(&decision);
        }
        Command::Feedback {
            url,
            outcome,
            service,
        } => {
            let mut session = open_session(args)?;
            let service = session.feedback(url, *outcome, service.as_deref())?;
            let formatted = bypass_router::domain::format_url(url);
            report::print_feedback(&formatted, &service, session.cache_entry(&formatted));
        }
        Command::Stats { top, redact } => {
            let session = open_session(args)?;
            report::print_stats(session.analytics(), *top, *redact);
        }
        Command::Recent => {
            let session = open_session(args)?;
            report::print_recent(session.recent());
        }
        Command::ClearCache => {
            let mut session = open_session(args)?;
            let cleared = session.clear_cache();
            println!("Cleared {} cached results", utils::format_number(cleared as u64));
        }
    }

    info!(
        action = "complete",
        component = "command",
        duration_ms = start_time.elapsed().as_millis(),
        "Command completed"
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose);
    utils::validate_args(&args)?;

    match run(&args) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
