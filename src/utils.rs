use time::macros::format_description;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command};

/// Logs go to stderr so stdout only carries command output. `RUST_LOG`
/// takes precedence over `--verbose`.
pub fn setup_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "error" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let timer = LocalTime::new(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_writer(std::io::stderr)
        .init();
}

pub fn format_number(num: u64) -> String {
    num.to_string()
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(",")
}

/// Mask every label of a dashboard domain key except the TLD, keeping each
/// label's first character.
pub fn redact_domain(domain: &str) -> String {
    let Some((labels, tld)) = domain.rsplit_once('.') else {
        return domain.to_string();
    };

    let masked: Vec<String> = labels
        .split('.')
        .map(|label| {
            let mut chars = label.chars();
            match chars.next() {
                Some(first) => format!("{}{}", first, "*".repeat(chars.count())),
                None => String::new(),
            }
        })
        .collect();

    format!("{}.{}", masked.join("."), tld)
}

pub fn validate_args(args: &Args) -> anyhow::Result<()> {
    if let Command::Stats { top, .. } = &args.command {
        if *top == 0 {
            anyhow::bail!("--top must be greater than 0");
        }
    }

    if let Command::Route { url } | Command::Feedback { url, .. } = &args.command {
        if url.trim().is_empty() {
            anyhow::bail!("URL must not be empty");
        }
    }

    Ok(())
}
