mod records;
mod serve;

use anyhow::Result;
use console::style;
use std::sync::Arc;

use crate::core::constants::AppConstants;
use crate::core::llm;
use crate::core::orchestrator::Orchestrator;
use crate::core::router::RouterClient;
use crate::core::settings::AppSettings;
use crate::core::store::Store;
use crate::core::terminal::{self, print_error};
use crate::core::tools::{DomainTools, LedgerTools};

fn print_help() {
    terminal::print_banner();

    let section = |title: &str, rows: &[(&str, &str)]| {
        println!("{}", style(title).bold().underlined());
        for (cmd, desc) in rows {
            println!("  {:<32} {}", style(cmd).green(), desc);
        }
        println!();
    };

    section(
        "Server",
        &[
            ("serve [--host H] [--port P]", "Start the HTTP API and reminder scheduler"),
            ("scheduler [--once]", "Run the reminder scheduler on its own"),
        ],
    );
    section(
        "Records",
        &[
            ("chat <text>", "Propose drafts for a message and save them"),
            ("confirm <draft_id>...", "Commit saved drafts"),
            ("undo <undo_token>", "Reverse a commit or task action"),
            ("events [words] [--type T]...", "Search events (--from, --to, --limit, --offset)"),
            ("tasks [words] [--status S]", "Search tasks (--from, --to, --limit, --offset)"),
            ("today [--tz ZONE]", "Open tasks due today"),
            ("overdue [--tz ZONE]", "Open tasks past their due time"),
        ],
    );
    section(
        "Diagnostics",
        &[
            ("constants", "Print the effective constants"),
            ("help", "Show this help"),
        ],
    );

    println!(
        " {} {} [--verbose] <command> [args]\n",
        style("Usage:").bold(),
        style("companion").green()
    );
}

/// Everything a command needs, wired from config.
pub(crate) struct Runtime {
    pub settings: AppSettings,
    pub constants: Arc<AppConstants>,
    pub store: Store,
    pub tools: Arc<dyn DomainTools>,
    pub orchestrator: Arc<Orchestrator>,
    pub llm_configured: bool,
}

impl Runtime {
    pub async fn boot(settings: AppSettings) -> Result<Self> {
        let constants = settings.load_constants()?;
        let store = Store::open(settings.db_path()).await?;
        let provider = llm::load_provider(&settings.llm)?;
        let llm_configured = provider.is_some();
        let tools: Arc<dyn DomainTools> = Arc::new(LedgerTools::new(store.clone(), constants.clone()));
        let orchestrator = Orchestrator::new(
            Arc::new(RouterClient::new(provider).with_max_retries(settings.llm.max_retries)),
            Arc::new(store.clone()),
            tools.clone(),
            constants.clone(),
        );
        Ok(Self {
            settings,
            constants,
            store,
            tools,
            orchestrator: Arc::new(orchestrator),
            llm_configured,
        })
    }
}

/// Splits global flags from the command line. Returns the verbose flag and
/// the remaining arguments.
pub(crate) fn split_global_flags(args: &[String]) -> (bool, Vec<String>) {
    let mut verbose = false;
    let mut rest = Vec::with_capacity(args.len());
    for arg in args {
        match arg.as_str() {
            "--verbose" | "-v" => verbose = true,
            _ => rest.push(arg.clone()),
        }
    }
    (verbose, rest)
}

pub async fn run_main() -> Result<()> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let (verbose, args) = split_global_flags(&raw);

    let Some(cmd) = args.first().map(String::as_str) else {
        print_help();
        return Ok(());
    };
    if matches!(cmd, "help" | "--help" | "-h") {
        print_help();
        return Ok(());
    }

    let settings = AppSettings::load(AppSettings::default_path()).await?;
    crate::logging::init(&settings.logging.level, verbose);

    match cmd {
        "serve" => {
            let (host, port) = serve::parse_serve_flags(
                &args,
                1,
                settings.server.host.clone(),
                settings.server.port,
            );
            let runtime = Runtime::boot(settings).await?;
            serve::run_server(runtime, host, port).await
        }
        "scheduler" => {
            let once = args.iter().skip(1).any(|a| a == "--once");
            let runtime = Runtime::boot(settings).await?;
            serve::run_scheduler(runtime, once).await
        }
        "chat" => {
            let text = args[1..].join(" ");
            let runtime = Runtime::boot(settings).await?;
            records::chat(&runtime, &text).await
        }
        "confirm" => {
            let runtime = Runtime::boot(settings).await?;
            records::confirm(&runtime, &args[1..]).await
        }
        "undo" => {
            let Some(token) = args.get(1) else {
                print_error("Usage: companion undo <undo_token>");
                return Ok(());
            };
            let runtime = Runtime::boot(settings).await?;
            records::undo(&runtime, token).await
        }
        "events" | "tasks" | "today" | "overdue" => {
            let flags = records::parse_search_flags(&args[1..])?;
            let runtime = Runtime::boot(settings).await?;
            match cmd {
                "events" => records::events(&runtime, flags).await,
                "tasks" => records::tasks(&runtime, flags).await,
                _ => records::due(&runtime, cmd == "overdue", flags).await,
            }
        }
        "constants" => {
            let constants = settings.load_constants()?;
            records::show_constants(&constants)
        }
        other => {
            print_error(&format!("Unknown command: {}", other));
            print_help();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn verbose_flag_is_pulled_out_anywhere() {
        let (verbose, rest) = split_global_flags(&argv(&["chat", "--verbose", "午饭", "30"]));
        assert!(verbose);
        assert_eq!(rest, argv(&["chat", "午饭", "30"]));

        let (verbose, rest) = split_global_flags(&argv(&["serve"]));
        assert!(!verbose);
        assert_eq!(rest, argv(&["serve"]));
    }
}
