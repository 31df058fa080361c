//! User-facing console output.
//! Colors are enabled only when the stream is a TTY.

use owo_colors::OwoColorize;
use std::io::{self, Write};

use crate::model::MoveProgress;

fn stdout_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

fn stderr_tty() -> bool {
    atty::is(atty::Stream::Stderr)
}

pub fn print_info(msg: &str) {
    if stdout_tty() {
        println!("{} {}", "info:".cyan().bold(), msg);
    } else {
        println!("info: {msg}");
    }
}

pub fn print_warn(msg: &str) {
    if stderr_tty() {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    } else {
        eprintln!("warn: {msg}");
    }
}

pub fn print_error(msg: &str) {
    if stderr_tty() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {msg}");
    }
}

pub fn print_success(msg: &str) {
    if stdout_tty() {
        println!("{} {}", "ok:".green().bold(), msg);
    } else {
        println!("ok: {msg}");
    }
}

/// Print a plain line (no prefix), for output users may script against.
pub fn print_user(msg: &str) {
    println!("{msg}");
}

/// Progress status. On a TTY the line is redrawn in place; otherwise one line per call.
pub fn print_progress(progress: &MoveProgress) {
    if stdout_tty() {
        print!(
            "\r{} {:>5.1}%  {}   ",
            "moving".cyan().bold(),
            progress.percent(),
            progress
        );
        let _ = io::stdout().flush();
    } else {
        println!("progress: {:.1}%  {}", progress.percent(), progress);
    }
}

/// End an in-place progress line.
pub fn finish_progress() {
    if stdout_tty() {
        println!();
    }
}
