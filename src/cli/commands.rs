use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::io::{self, Write};
use crate::board::{Board, BoardError, BoardRemote, Confirmation, ConfirmationRequest, DragOutcome, ErrorKind, LoadReport};
use crate::cli::error::{user_error, validate_deal_value, validate_lead_id, validate_non_empty, validate_segment};
use crate::cli::output::{format_board, format_history, get_terminal_width, is_tty};
use crate::config::Config;
use crate::db::DbConnection;
use crate::models::{EntityId, Lead, MoveIntent, SegmentKey, SideEffectData};
use crate::repo::{LeadRepo, SqliteRemote};
use anyhow::{Context, Result};

#[derive(Parser)]
#[command(name = "leadboard")]
#[command(about = "Lead pipeline board - paged kanban of leads with confirmed won/lost transitions")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the pipeline board, one column per stage
    Board {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
        /// Only show leads whose name or company contains this text
        #[arg(long)]
        search: Option<String>,
        /// Number of pages to load per stage
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Add a new lead
    Add {
        /// Company the lead belongs to
        #[arg(long)]
        company: Option<String>,
        /// Stage to create the lead in
        #[arg(long, default_value = "new")]
        stage: String,
        /// Lead name
        #[arg(required = true)]
        name: Vec<String>,
    },
    /// Move a lead to a stage (won/lost moves ask for confirmation)
    Move {
        /// Lead ID
        id: String,
        /// Destination stage
        stage: String,
        /// Position in the destination stage (0 = top)
        #[arg(long, default_value_t = 0)]
        index: usize,
        /// Deal value recorded when moving to won
        #[arg(long)]
        value: Option<f64>,
        /// Loss reason recorded when moving to lost
        #[arg(long)]
        reason: Option<String>,
        /// Notes recorded with the stage change
        #[arg(long)]
        notes: Option<String>,
        /// Confirm without prompting
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Reorder a stage by moving the lead at one position to another
    Reorder {
        /// Stage to reorder
        stage: String,
        /// Current position (0 = top)
        from: usize,
        /// New position
        to: usize,
    },
    /// Delete a lead
    Delete {
        /// Lead ID
        id: String,
        /// Delete without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Show the stage history of a lead
    History {
        /// Lead ID
        id: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.print()?;
            // Help and version are not errors
            if e.use_stderr() {
                std::process::exit(1);
            }
            return Ok(());
        }
    };

    handle_command(cli)
}

fn handle_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Board { json, search, pages } => handle_board(json, search, pages),
        Commands::Add { company, stage, name } => handle_lead_add(name, company, stage),
        Commands::Move { id, stage, index, value, reason, notes, yes } => {
            let data = SideEffectData {
                deal_value: value,
                loss_reason: reason,
                notes,
            };
            handle_lead_move(id, stage, index, data, yes)
        }
        Commands::Reorder { stage, from, to } => handle_reorder(stage, from, to),
        Commands::Delete { id, yes } => handle_lead_delete(id, yes),
        Commands::History { id, json } => handle_lead_history(id, json),
    }
}

/// Load the config and open the configured database
fn connect() -> Result<(Config, Connection)> {
    let config = Config::load().unwrap_or_else(|e| user_error(&format!("{:#}", e)));
    let conn = DbConnection::connect_at(&config.db_path())
        .context("Failed to connect to database")?;
    Ok((config, conn))
}

fn check_load(report: LoadReport) -> Result<()> {
    if let Some((segment, err)) = report.failed.into_iter().next() {
        return Err(anyhow::Error::new(err).context(format!("Failed to load stage {}", segment.label())));
    }
    Ok(())
}

/// Board errors caused by the arguments are user errors; the rest propagate
fn board_error(err: BoardError) -> anyhow::Error {
    match err.kind() {
        ErrorKind::InvariantViolation | ErrorKind::PagingRejected => user_error(&err.to_string()),
        ErrorKind::TransientFetch => anyhow::Error::new(err),
    }
}

/// Page a stage in until `done` holds or the stage has no more pages
fn load_until<R, F>(board: &mut Board<R>, segment: SegmentKey, done: F) -> Result<()>
where
    R: BoardRemote,
    F: Fn(&Board<R>) -> bool,
{
    while !done(board) && !board.segment_state(segment).is_exhausted {
        match board.request_next_page(segment) {
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(err) if err.kind() == ErrorKind::PagingRejected => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn find_lead(conn: &Connection, id_str: &str) -> Result<Lead> {
    let lead_id = validate_lead_id(id_str).unwrap_or_else(|e| user_error(&e));
    let lead = LeadRepo::get_by_id(conn, lead_id)?;
    Ok(lead.unwrap_or_else(|| user_error(&format!("Lead {} not found", lead_id))))
}

fn handle_board(json: bool, search: Option<String>, pages: u32) -> Result<()> {
    if pages == 0 {
        user_error("--pages must be at least 1");
    }
    let (config, conn) = connect()?;
    let mut board = Board::new(config.board, SqliteRemote::new(&conn));

    let report = match search.as_deref() {
        Some(query) => board.set_filter_query(query),
        None => board.load_all(),
    };
    check_load(report)?;

    for segment in SegmentKey::ALL {
        load_until(&mut board, segment, |b| b.segment_state(segment).loaded_page_count >= pages)?;
    }

    let columns: Vec<_> = SegmentKey::ALL.iter().map(|segment| board.snapshot(*segment)).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&columns)?);
    } else {
        print!("{}", format_board(&columns, get_terminal_width(), is_tty()));
    }
    Ok(())
}

fn handle_lead_add(name_args: Vec<String>, company: Option<String>, stage: String) -> Result<()> {
    let name = name_args.join(" ");
    if let Err(e) = validate_non_empty(&name, "Lead name") {
        user_error(&e);
    }
    let segment = validate_segment(&stage).unwrap_or_else(|e| user_error(&e));

    let (_, conn) = connect()?;
    let lead = LeadRepo::create(&conn, name.trim(), company.as_deref(), segment)
        .context("Failed to create lead")?;
    println!("Created lead {}: {} ({})", lead.id.unwrap_or_default(), lead.name, segment.label());
    Ok(())
}

fn handle_lead_move(id: String, stage: String, index: usize, data: SideEffectData, yes: bool) -> Result<()> {
    let to_segment = validate_segment(&stage).unwrap_or_else(|e| user_error(&e));
    if let Some(value) = data.deal_value {
        validate_deal_value(value).unwrap_or_else(|e| user_error(&e));
    }
    // Without a prompt there is nowhere to ask for the reason
    let has_reason = data.loss_reason.as_deref().is_some_and(|r| !r.trim().is_empty());
    if yes && to_segment == SegmentKey::Lost && !has_reason {
        user_error("--reason is required when moving to lost");
    }

    let (config, conn) = connect()?;
    let lead = find_lead(&conn, &id)?;
    let lead_id = lead.id.unwrap_or_default();
    let entity_id = EntityId::from(lead_id);

    let mut board = Board::new(config.board, SqliteRemote::new(&conn));
    check_load(board.load_all())?;
    load_until(&mut board, lead.segment, |b| b.store().locate(&entity_id).is_some())?;
    if board.store().locate(&entity_id).is_none() {
        anyhow::bail!("Failed to load lead {} from stage {}", lead_id, lead.segment.label());
    }

    let intent = MoveIntent::new(entity_id, lead.segment, to_segment, index);
    let mut confirmer = |request: &ConfirmationRequest| -> Result<Confirmation> {
        if yes {
            Ok(Confirmation::approved(data.clone()))
        } else {
            prompt_confirmation(&lead, request, &data)
        }
    };

    match board.drag_end_with(intent, &mut confirmer).map_err(board_error)? {
        DragOutcome::Ignored => {
            println!("Lead {} is already at position {} of {}.", lead_id, index, to_segment.label());
        }
        DragOutcome::Reordered(report) => {
            if !report.committed {
                anyhow::bail!("Failed to save order of stage {}", to_segment.label());
            }
            println!("Moved lead {} to position {} of {}.", lead_id, report.to_index, to_segment.label());
        }
        DragOutcome::Moved(report) => {
            if !report.committed() {
                anyhow::bail!(
                    "Failed to move lead {} to {}; stages {} and {} were reloaded",
                    lead_id,
                    to_segment.label(),
                    report.from_segment.label(),
                    report.to_segment.label()
                );
            }
            println!("Moved lead {} ({}) from {} to {}.", lead_id, lead.name, report.from_segment.label(), to_segment.label());
        }
        DragOutcome::Cancelled(_) | DragOutcome::AwaitingConfirmation(_) => {
            println!("Cancelled.");
        }
    }
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush()
        .map_err(|e| anyhow::anyhow!("Failed to flush stderr: {}", e))?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)
        .map_err(|e| anyhow::anyhow!("Failed to read input: {}", e))?;
    Ok(input.trim().to_string())
}

/// Ask before a gated move and collect what the destination stage records.
/// Values already given as flags are not asked for again.
fn prompt_confirmation(lead: &Lead, request: &ConfirmationRequest, flags: &SideEffectData) -> Result<Confirmation> {
    let to_segment = request.intent.to_segment;
    let answer = prompt_line(&format!(
        "Move lead {} ({}) to {}? (y/n): ",
        request.intent.entity_id, lead.name, to_segment.label()
    ))?;
    if !matches!(answer.to_lowercase().as_str(), "y" | "yes") {
        return Ok(Confirmation::cancelled());
    }

    let mut data = flags.clone();
    match to_segment {
        SegmentKey::Won if data.deal_value.is_none() => {
            let answer = prompt_line("Deal value (blank to skip): ")?;
            if !answer.is_empty() {
                let value: f64 = answer
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid deal value: '{}'", answer))?;
                data.deal_value = Some(validate_deal_value(value).map_err(anyhow::Error::msg)?);
            }
        }
        SegmentKey::Lost if data.loss_reason.is_none() => {
            let answer = prompt_line("Loss reason: ")?;
            if answer.is_empty() {
                eprintln!("A loss reason is required.");
                return Ok(Confirmation::cancelled());
            }
            data.loss_reason = Some(answer);
        }
        _ => {}
    }
    Ok(Confirmation::approved(data))
}

fn handle_reorder(stage: String, from: usize, to: usize) -> Result<()> {
    let segment = validate_segment(&stage).unwrap_or_else(|e| user_error(&e));

    let (config, conn) = connect()?;
    let mut board = Board::new(config.board, SqliteRemote::new(&conn));
    check_load(board.load_all())?;
    let needed = from.max(to) + 1;
    load_until(&mut board, segment, |b| b.store().len(segment) >= needed)?;

    let report = board.reorder_within_segment(segment, from, to).map_err(board_error)?;
    if !report.committed {
        anyhow::bail!("Failed to save order of stage {}", segment.label());
    }
    println!(
        "Moved lead {} from position {} to {} in {}.",
        report.entity_id, report.from_index, report.to_index, segment.label()
    );
    Ok(())
}

fn handle_lead_delete(id: String, yes: bool) -> Result<()> {
    let (_, conn) = connect()?;
    let lead = find_lead(&conn, &id)?;
    let lead_id = lead.id.unwrap_or_default();

    if !yes {
        print!("Delete lead {} ({})? (y/n): ", lead_id, lead.name);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input != "y" && input != "yes" {
            println!("Cancelled.");
            return Ok(());
        }
    }

    LeadRepo::delete(&conn, lead_id)
        .context("Failed to delete lead")?;
    println!("Deleted lead {}: {}", lead_id, lead.name);
    Ok(())
}

fn handle_lead_history(id: String, json: bool) -> Result<()> {
    let (_, conn) = connect()?;
    let lead = find_lead(&conn, &id)?;
    let entries = LeadRepo::history(&conn, lead.id.unwrap_or_default())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("No history for lead {}.", id);
    } else {
        print!("{}", format_history(&entries));
    }
    Ok(())
}
