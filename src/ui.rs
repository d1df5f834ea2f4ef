// UI layer: the few interactive bits of the CLI, built on `dialoguer` and
// `indicatif`. Everything else prints plain lines so output can be piped.

use crate::config::Config;
use crate::mturk::BatchSummary;
use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Ask for site URL, user and password, showing the current values.
/// Blank answers keep what is already configured.
pub fn prompt_config(current: &Config) -> Result<Config> {
    println!("Configure your client");
    let site_url: String = Input::new()
        .with_prompt(format!("What's your site_url url? ({})", current.site_url))
        .allow_empty(true)
        .interact_text()?;
    let user: String = Input::new()
        .with_prompt(format!("What's your username? ({})", current.user))
        .allow_empty(true)
        .interact_text()?;
    // `Password` hides input in terminal for passwords.
    let password: String = Password::new()
        .with_prompt("Input your password")
        .allow_empty_password(true)
        .interact()?;
    Ok(current.updated(&site_url, &user, &password))
}

/// Last check before money is spent.
pub fn confirm(prompt: &str) -> Result<bool> {
    Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
}

/// Spinner shown on stderr while a network call is running.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print per-item results of a batch, failures highlighted.
pub fn print_summary(action: &str, summary: &BatchSummary) {
    for id in &summary.succeeded {
        println!("{} {} {}", "ok".green(), action, id);
    }
    for failure in &summary.failed {
        println!(
            "{} {} {}: {}",
            "failed".red(),
            action,
            failure.id,
            failure.reason
        );
    }
    println!(
        "{} succeeded, {} failed",
        summary.succeeded.len(),
        summary.failed.len()
    );
}
