mod commands;
mod config;
mod output;

use std::path::PathBuf;
use std::process;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use lgdesk_interchange::{InstructionId, LgId, OwnerContact, SubscriptionStatus};
use lgdesk_orchestrator::{ActionPayload, LiquidationKind};
use rust_decimal::Decimal;
use time::macros::format_description;
use time::Date;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use commands::{actions, records, Globals};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Letter of Guarantee action desk.
#[derive(Parser)]
#[command(name = "lgdesk", version, about = "Letter of Guarantee action desk")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress notices and letter links
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to the configuration file (default: ./lgdesk.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subscription standing of the customer (active, grace or expired)
    #[arg(long, global = true, default_value = "active", value_parser = parse_subscription)]
    subscription: SubscriptionStatus,

    /// Log debug output to stderr (overrides LGDESK_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the portfolio and print every record with its available actions
    List,

    /// Show one LG with its instructions and their actions
    Show {
        /// LG record id
        id: u64,
    },

    /// Print the actions the catalog offers for a status (offline)
    Catalog {
        /// Status name, e.g. Valid, Active, Expired, Released
        status: String,
    },

    /// Extend the expiry date
    Extend {
        id: u64,
        /// New expiry date (YYYY-MM-DD), later than the current one
        #[arg(long, value_parser = parse_date)]
        expiry: Date,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Release the guarantee
    Release {
        id: u64,
        #[arg(long)]
        reason: Option<String>,
        /// Supporting document to upload
        #[arg(long)]
        document: Option<PathBuf>,
    },

    /// Liquidate the guarantee in full, or partially with --partial-amount
    Liquidate {
        id: u64,
        /// Amount to liquidate; omit for a full liquidation
        #[arg(long, value_parser = parse_amount)]
        partial_amount: Option<Decimal>,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        document: Option<PathBuf>,
    },

    /// Decrease the guaranteed amount
    DecreaseAmount {
        id: u64,
        /// Amount to decrease by
        #[arg(long, value_parser = parse_amount)]
        amount: Decimal,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        document: Option<PathBuf>,
    },

    /// Hand the LG to a new internal owner
    ChangeOwner {
        id: u64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Switch auto-renewal on or off
    #[command(group(ArgGroup::new("switch").required(true).args(["enable", "disable"])))]
    ToggleAutoRenewal {
        id: u64,
        #[arg(long)]
        enable: bool,
        #[arg(long)]
        disable: bool,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Record that an instruction was delivered to the bank
    RecordDelivery {
        lg_id: u64,
        instruction_id: u64,
        /// Delivery date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        date: Date,
        /// Delivery receipt
        #[arg(long)]
        document: Option<PathBuf>,
    },

    /// Record the bank's reply to an instruction
    RecordBankReply {
        lg_id: u64,
        instruction_id: u64,
        /// Reply date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        date: Date,
        #[arg(long)]
        details: Option<String>,
        #[arg(long)]
        document: Option<PathBuf>,
    },

    /// Send the bank a reminder about an unanswered instruction
    SendReminder { lg_id: u64, instruction_id: u64 },

    /// Run the portfolio-wide auto-renewal
    BulkRenewal,
}

fn parse_date(s: &str) -> Result<Date, String> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn parse_amount(s: &str) -> Result<Decimal, String> {
    s.trim()
        .parse::<Decimal>()
        .map_err(|e| format!("invalid amount '{}': {}", s, e))
}

fn parse_subscription(s: &str) -> Result<SubscriptionStatus, String> {
    s.parse()
}

fn init_logging(verbose: bool) {
    let directive = if verbose {
        "debug".to_string()
    } else {
        std::env::var("LGDESK_LOG").unwrap_or_else(|_| "warn".to_string())
    };
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let globals = Globals {
        output: cli.output,
        quiet: cli.quiet,
        config: cli.config,
        subscription: cli.subscription,
    };
    let g = &globals;

    match cli.command {
        Commands::List => records::cmd_list(g),
        Commands::Show { id } => records::cmd_show(LgId(id), g),
        Commands::Catalog { status } => records::cmd_catalog(&status, g),
        Commands::Extend { id, expiry, notes } => actions::cmd_record_action(
            LgId(id),
            ActionPayload::Extend {
                new_expiry_date: expiry,
                notes,
            },
            g,
        ),
        Commands::Release {
            id,
            reason,
            document,
        } => actions::cmd_record_action(
            LgId(id),
            ActionPayload::Release {
                reason,
                document: actions::read_document(document.as_deref(), g),
            },
            g,
        ),
        Commands::Liquidate {
            id,
            partial_amount,
            reason,
            document,
        } => {
            let kind = match partial_amount {
                Some(amount) => LiquidationKind::Partial { amount },
                None => LiquidationKind::Full,
            };
            actions::cmd_record_action(
                LgId(id),
                ActionPayload::Liquidate {
                    kind,
                    reason,
                    document: actions::read_document(document.as_deref(), g),
                },
                g,
            )
        }
        Commands::DecreaseAmount {
            id,
            amount,
            reason,
            document,
        } => actions::cmd_record_action(
            LgId(id),
            ActionPayload::DecreaseAmount {
                decrease_by: amount,
                reason,
                document: actions::read_document(document.as_deref(), g),
            },
            g,
        ),
        Commands::ChangeOwner {
            id,
            name,
            email,
            phone,
            reason,
        } => actions::cmd_record_action(
            LgId(id),
            ActionPayload::ChangeOwner {
                owner: OwnerContact { name, email, phone },
                reason,
            },
            g,
        ),
        Commands::ToggleAutoRenewal {
            id,
            enable,
            disable: _,
            reason,
        } => actions::cmd_record_action(
            LgId(id),
            ActionPayload::ToggleAutoRenewal { enable, reason },
            g,
        ),
        Commands::RecordDelivery {
            lg_id,
            instruction_id,
            date,
            document,
        } => actions::cmd_instruction_action(
            LgId(lg_id),
            InstructionId(instruction_id),
            ActionPayload::RecordDelivery {
                delivery_date: date,
                document: actions::read_document(document.as_deref(), g),
            },
            g,
        ),
        Commands::RecordBankReply {
            lg_id,
            instruction_id,
            date,
            details,
            document,
        } => actions::cmd_instruction_action(
            LgId(lg_id),
            InstructionId(instruction_id),
            ActionPayload::RecordBankReply {
                reply_date: date,
                details,
                document: actions::read_document(document.as_deref(), g),
            },
            g,
        ),
        Commands::SendReminder {
            lg_id,
            instruction_id,
        } => actions::cmd_instruction_action(
            LgId(lg_id),
            InstructionId(instruction_id),
            ActionPayload::SendReminder,
            g,
        ),
        Commands::BulkRenewal => actions::cmd_bulk_renewal(g),
    }
}

/// Report an error and exit 1.
pub(crate) fn fail(msg: &str, globals: &Globals) -> ! {
    report_error(msg, globals.output, globals.quiet);
    process::exit(1);
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn dates_must_be_iso() {
        assert_eq!(
            parse_date("2025-06-01").unwrap(),
            time::macros::date!(2025 - 06 - 01)
        );
        assert!(parse_date("01/06/2025").is_err());
    }

    #[test]
    fn toggle_needs_exactly_one_switch() {
        assert!(Cli::try_parse_from(["lgdesk", "toggle-auto-renewal", "42"]).is_err());
        assert!(
            Cli::try_parse_from(["lgdesk", "toggle-auto-renewal", "42", "--enable", "--disable"])
                .is_err()
        );
        let cli = Cli::try_parse_from(["lgdesk", "toggle-auto-renewal", "42", "--disable"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::ToggleAutoRenewal { enable: false, .. }
        ));
    }

    #[test]
    fn subscription_flag_is_global() {
        let cli = Cli::try_parse_from(["lgdesk", "list", "--subscription", "grace"]).unwrap();
        assert_eq!(cli.subscription, SubscriptionStatus::Grace);
        assert!(Cli::try_parse_from(["lgdesk", "list", "--subscription", "lapsed"]).is_err());
    }
}
