//! Application orchestrator.
//! Loads/merges config, initializes logging, installs the Ctrl-C handler,
//! and dispatches the `free-space` and `move` commands.

use anyhow::Result;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

use part_move::cli::{Args, Command, FreeSpaceArgs, MoveArgs};
use part_move::config::{CONFIG_ENV, LoadResult, load_or_init};
use part_move::output as out;
use part_move::platform::SystemDevices;
use part_move::{
    CancelToken, Config, DiskDescriptor, MoveOutcome, MovePlan, MoveProgress, MoveRequest, Mover,
    PartMoveError, PartitionDescriptor, default_config_path, format_bytes, free_space_regions,
};

use crate::logging::init_tracing;

const EXIT_FAILED: u8 = 1;
const EXIT_USAGE: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Run the CLI application.
pub fn run(args: Args) -> ExitCode {
    match try_run(args) {
        Ok(code) => code,
        Err(e) => {
            out::print_error(&format!("{e:#}"));
            ExitCode::from(EXIT_FAILED)
        }
    }
}

fn try_run(args: Args) -> Result<ExitCode> {
    // Handle --print-config before logging init
    if args.print_config {
        print_config_location();
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = args.command.clone() else {
        out::print_error("no command given; run with --help for usage");
        return Ok(ExitCode::from(EXIT_USAGE));
    };

    let mut cfg = match load_or_init()? {
        LoadResult::Loaded(cfg, _) => cfg,
        LoadResult::CreatedTemplate(path) => {
            out::print_success(&format!(
                "A template part_move config was written to: {}",
                path.display()
            ));
            out::print_info(&format!(
                "Defaults apply until you edit it. To use a different location set {CONFIG_ENV}."
            ));
            Config::default()
        }
        LoadResult::Defaults => Config::default(),
    };
    args.apply_overrides(&mut cfg);
    cfg.validate()?;

    // The guard must outlive every log call so the file writer flushes
    let guard: Option<WorkerGuard> =
        init_tracing(cfg.log_level, cfg.log_file.as_deref(), args.json).inspect_err(|e| {
            out::print_error(&format!("Failed to initialize logging: {e}"));
        })?;

    debug!(?args, "starting part_move");

    let result = match &command {
        Command::FreeSpace(fs_args) => free_space(fs_args),
        Command::Move(move_args) => move_partition(move_args, &cfg),
    };

    drop(guard);

    result
}

fn print_config_location() {
    if let Some(cfg_env) = std::env::var_os(CONFIG_ENV) {
        out::print_info(&format!(
            "Using {CONFIG_ENV} (explicit):\n  {}\n",
            cfg_env.to_string_lossy()
        ));
        out::print_info(&format!(
            "To override, unset {CONFIG_ENV} or set it to another file."
        ));
        return;
    }
    match default_config_path() {
        Ok(p) => {
            out::print_info(&format!("Default part_move config path:\n  {}\n", p.display()));
            if p.exists() {
                out::print_info("A config file already exists at that location.");
            } else {
                out::print_info(
                    "No config file exists there yet. Run any command to create a template.",
                );
            }
        }
        Err(e) => out::print_error(&format!("Could not determine a default config path: {e}")),
    }
}

fn free_space(args: &FreeSpaceArgs) -> Result<ExitCode> {
    let disk = DiskDescriptor {
        number: 0,
        size_bytes: args.disk_size,
    };
    let partitions: Vec<PartitionDescriptor> = args
        .partitions
        .iter()
        .enumerate()
        .map(|(i, &(start, size))| PartitionDescriptor {
            partition_index: i as u32 + 1,
            ..PartitionDescriptor::extent(start, size)
        })
        .collect();

    let regions = free_space_regions(&disk, &partitions, args.min_size);
    info!(count = regions.len(), min_size = args.min_size, "free space computed");

    if args.json {
        out::print_user(&serde_json::to_string_pretty(&regions)?);
    } else if regions.is_empty() {
        out::print_warn(&format!(
            "No contiguous free space of at least {} on this disk.",
            format_bytes(args.min_size)
        ));
    } else {
        for r in &regions {
            out::print_user(&format!("{:>16} {:>16}  {}", r.start, r.size, r));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn move_partition(args: &MoveArgs, cfg: &Config) -> Result<ExitCode> {
    let request = MoveRequest {
        disk_number: args.disk,
        volume: args.volume.clone(),
        source_offset: args.from,
        destination_offset: args.to,
        size: args.size,
    };

    let mover = Mover::new(SystemDevices::new(cfg.layout_entries)).with_chunk_size(cfg.chunk_size)?;

    if args.dry_run {
        return Ok(match mover.plan(&request) {
            Ok(plan) => {
                print_plan(&request, &plan);
                ExitCode::SUCCESS
            }
            Err(e) => report_failure(&e),
        });
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            cancel.cancel();
            out::print_warn("Received interrupt; stopping after the current chunk...");
        }) {
            out::print_warn(&format!("Could not install Ctrl-C handler: {e}"));
        }
    }

    let mut last_print: Option<Instant> = None;
    let progress = move |p: MoveProgress| {
        let due = last_print.is_none_or(|t| t.elapsed() >= PROGRESS_INTERVAL);
        if due || p.bytes_copied == p.total_bytes {
            out::print_progress(&p);
            last_print = Some(Instant::now());
        }
    };

    let handle = mover.spawn(request.clone(), progress, cancel)?;
    let result = handle.join();
    out::finish_progress();

    match result {
        Ok(MoveOutcome::Done) => {
            out::print_success(&format!(
                "Moved {} on disk {} from offset {} to {}",
                format_bytes(request.size),
                request.disk_number,
                request.source_offset,
                request.destination_offset
            ));
            Ok(ExitCode::SUCCESS)
        }
        Ok(MoveOutcome::Cancelled) => {
            out::print_warn("Move cancelled; the partition table still points at the original location.");
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
        Err(e) => Ok(report_failure(&e)),
    }
}

fn report_failure(e: &PartMoveError) -> ExitCode {
    debug!(code = e.code(), kind = error_kind(e), os_code = ?e.os_code(), "move failed");
    out::print_error(&e.to_string());
    ExitCode::from(EXIT_FAILED)
}

fn print_plan(request: &MoveRequest, plan: &MovePlan) {
    out::print_info(&format!(
        "Dry-run: would move {} on disk {} from offset {} to {}",
        format_bytes(request.size),
        request.disk_number,
        request.source_offset,
        request.destination_offset
    ));
    out::print_info(&format!(
        "Copy order {}, {} chunk(s) of {}",
        plan.order,
        plan.chunks,
        format_bytes(plan.chunk_size as u64)
    ));
    match &request.volume {
        Some(v) => out::print_info(&format!("Volume {v} would be locked and dismounted")),
        None => out::print_info("No volume to lock"),
    }
}

fn error_kind(e: &PartMoveError) -> &'static str {
    match e {
        PartMoveError::Access { .. } => "access",
        PartMoveError::Io { .. } => "io",
        PartMoveError::LayoutMismatch { .. } => "layout_mismatch",
        PartMoveError::BufferTooSmall { .. } => "buffer_too_small",
        PartMoveError::Unsupported => "unsupported",
        PartMoveError::InvalidRequest(_) => "invalid_request",
    }
}
