// paygrid CLI - headless payables ledger operations

use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use paygrid_core::{Column, GridSession, Ledger, StoreError, SyncOptions, TotalSource};
use paygrid_record_client::{delete_session, save_session, ApiClient, SavedSession};

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;
/// General error - network, store, or sync failure.
pub const EXIT_ERROR: u8 = 1;
/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

#[derive(Parser)]
#[command(name = "paygrid")]
#[command(about = "Accounts-payable ledger (CLI mode, headless)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a Data API session and save it locally
    Login {
        /// Data API base URL (e.g. https://fm.example.com/fmi/data/vLatest/databases/Payables)
        #[arg(long, env = "PAYGRID_BASE_URL")]
        base_url: String,

        /// Account username
        #[arg(long)]
        user: String,

        /// Account password (prompted when omitted and stdin is a TTY)
        #[arg(long, env = "PAYGRID_PASSWORD")]
        password: Option<String>,
    },

    /// Close the session and delete the saved token
    Logout,

    /// Load an entry and print its grid, total, and header status
    Show {
        /// Transaction reference of the entry
        trans_ref: String,
    },

    /// Evaluate a formula against ad-hoc cell values
    #[command(after_help = "\
Examples:
  paygrid eval '=SUM(B1:B3)' --cell 1,2=100 --cell 2,2=50 --cell 3,2=25
  paygrid eval '=A1+A2*2' --cell 1,1=5 --cell 2,1=3")]
    Eval {
        /// Formula to evaluate (must start with =)
        formula: String,

        /// Cell value as row,col=value (1-based). Repeatable.
        #[arg(long, value_name = "R,C=V")]
        cell: Vec<String>,
    },

    /// Load an entry, push local state to the store, print the report
    Sync {
        /// Transaction reference of the entry
        trans_ref: String,

        /// Do not mark the entry posted
        #[arg(long)]
        no_post: bool,

        /// Clear a rejection while posting
        #[arg(long)]
        repost: bool,
    },
}

#[derive(Debug)]
struct CliError {
    code: u8,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn usage(message: impl Into<String>) -> CliError {
        CliError {
            code: EXIT_USAGE,
            message: message.into(),
            hint: None,
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> CliError {
        let hint = match err {
            StoreError::NotAuthenticated => Some("run `paygrid login` first".to_string()),
            _ => None,
        };
        CliError {
            code: EXIT_ERROR,
            message: err.to_string(),
            hint,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        None => {
            eprintln!("Usage: paygrid <command> [options]");
            eprintln!("       paygrid --help for more information");
            Ok(())
        }
        Some(Commands::Login {
            base_url,
            user,
            password,
        }) => cmd_login(base_url, user, password),
        Some(Commands::Logout) => cmd_logout(),
        Some(Commands::Show { trans_ref }) => cmd_show(trans_ref),
        Some(Commands::Eval { formula, cell }) => cmd_eval(formula, cell),
        Some(Commands::Sync {
            trans_ref,
            no_post,
            repost,
        }) => cmd_sync(trans_ref, no_post, repost),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError {
            code,
            message,
            hint,
        }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ── Login / logout ──────────────────────────────────────────────────

fn cmd_login(base_url: String, user: String, password: Option<String>) -> Result<(), CliError> {
    // Resolve password: --password flag > PAYGRID_PASSWORD env (clap) >
    // interactive prompt
    let password = if let Some(p) = password {
        p
    } else if atty::is(atty::Stream::Stdin) {
        eprint!("Password for {}: ", user);
        io::stderr().flush().ok();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).map_err(|e| CliError {
            code: EXIT_ERROR,
            message: e.to_string(),
            hint: None,
        })?;
        let trimmed = buf.trim().to_string();
        if trimmed.is_empty() {
            return Err(CliError {
                code: EXIT_USAGE,
                message: "No password provided".into(),
                hint: Some("pass --password or set PAYGRID_PASSWORD".into()),
            });
        }
        trimmed
    } else {
        return Err(CliError {
            code: EXIT_USAGE,
            message: "No password provided and stdin is not a TTY".into(),
            hint: Some("pass --password or set PAYGRID_PASSWORD".into()),
        });
    };

    let client = ApiClient::login(&base_url, &user, &password)?;

    let session = SavedSession {
        token: client.token().to_string(),
        base_url: client.base_url().to_string(),
        username: Some(user.clone()),
    };
    save_session(&session).map_err(|e| CliError {
        code: EXIT_ERROR,
        message: e,
        hint: None,
    })?;

    eprintln!("Logged in as {}", user);
    Ok(())
}

fn cmd_logout() -> Result<(), CliError> {
    if let Ok(client) = ApiClient::from_saved_session() {
        client.logout();
    }
    delete_session().map_err(|e| CliError {
        code: EXIT_ERROR,
        message: e,
        hint: None,
    })?;
    eprintln!("Logged out");
    Ok(())
}

// ── Show ────────────────────────────────────────────────────────────

fn cmd_show(trans_ref: String) -> Result<(), CliError> {
    let client = ApiClient::from_saved_session()?;
    let mut ledger = Ledger::new();
    ledger.load_entry(&client, &trans_ref)?;

    print_grid(&ledger);

    let header = &ledger.header;
    if header.vendor.has_identity() {
        let vendor = if header.vendor.vendor_name.is_empty() {
            header.vendor.vendor_id.clone()
        } else {
            header.vendor.vendor_name.clone()
        };
        println!("Vendor:  {}", vendor);
    }
    if let Some(status) = header.status {
        println!("Status:  {}", status);
    }
    if header.posted {
        println!("Posted:  yes");
    }
    if let Some(reason) = &header.reject_reason {
        println!("Rejected: {}", reason);
    }
    match ledger.total_source() {
        TotalSource::Remote(total) => println!("Total:   {:.2}", total),
        TotalSource::Local(total) => println!("Total:   {:.2} (local)", total),
    }
    Ok(())
}

fn print_grid(ledger: &Ledger) {
    let widths: Vec<usize> = Column::ALL
        .iter()
        .map(|col| {
            ledger
                .rows()
                .iter()
                .map(|r| r.field(*col).len())
                .chain(std::iter::once(col.label().len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = Column::ALL
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("{:w$}", col.label(), w = w))
        .collect();
    println!("{}", header.join("  "));

    for row in ledger.rows() {
        let cells: Vec<String> = Column::ALL
            .iter()
            .zip(&widths)
            .map(|(col, w)| format!("{:w$}", row.field(*col), w = w))
            .collect();
        println!("{}", cells.join("  "));
    }
}

// ── Eval ────────────────────────────────────────────────────────────

fn cmd_eval(formula: String, cells: Vec<String>) -> Result<(), CliError> {
    let mut session = GridSession::new();
    for spec in &cells {
        let (row, col, value) = parse_cell_arg(spec)?;
        while session.row_count() <= row {
            session.ledger.add_row(None);
        }
        session.set_cell(row, col, value);
    }
    session.select_cell(0, 0);
    println!("{}", session.evaluate(&formula));
    Ok(())
}

/// Parse a `row,col=value` cell argument (1-based coordinates).
fn parse_cell_arg(spec: &str) -> Result<(usize, usize, &str), CliError> {
    let err = || CliError::usage(format!("invalid --cell '{}', expected row,col=value", spec));
    let (coords, value) = spec.split_once('=').ok_or_else(err)?;
    let (row, col) = coords.split_once(',').ok_or_else(err)?;
    let row: usize = row.trim().parse().map_err(|_| err())?;
    let col: usize = col.trim().parse().map_err(|_| err())?;
    if row == 0 || col == 0 || col > Column::ALL.len() {
        return Err(err());
    }
    Ok((row - 1, col - 1, value))
}

// ── Sync ────────────────────────────────────────────────────────────

fn cmd_sync(trans_ref: String, no_post: bool, repost: bool) -> Result<(), CliError> {
    let client = ApiClient::from_saved_session()?;
    let mut ledger = Ledger::new();
    ledger.load_entry(&client, &trans_ref)?;

    let options = SyncOptions {
        mark_posted: !no_post,
        clear_rejected: repost,
    };
    let report = ledger.sync(&client, options);

    println!(
        "created {}  updated {}  deleted {}",
        report.created, report.updated, report.deleted
    );
    if report.marked_posted {
        println!("marked posted");
    }
    if report.header_updated {
        println!("header updated");
    }

    match report.error {
        None => Ok(()),
        Some(message) => Err(CliError {
            code: EXIT_ERROR,
            message,
            hint: None,
        }),
    }
}
