// `crowdaq-mturk`: HIT launching and worker qualifications on Mechanical Turk.

use crate::mturk::expire::expire_hit_group;
use crate::mturk::launch::{launch_exam, LaunchFile};
use crate::mturk::qualify::{
    grade_entries, grant_new_qualification, qualify_by_grade, revoke_all, revoke_qualification,
    GrantOptions,
};
use crate::mturk::sdk::MturkClient;
use crate::mturk::Marketplace;
use crate::{logging, ui};
use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "crowdaq-mturk", about = "Launch crowdaq exams and manage qualifications on MTurk")]
pub struct Cli {
    #[arg(long)]
    debug: bool,
    /// Which AWS profile to use.
    #[arg(long, short, default_value = "default")]
    profile: String,
    #[command(subcommand)]
    command: Command,
}

/// Endpoint and safety switches shared by the worker commands.
#[derive(Debug, Args, Clone, Copy)]
struct Target {
    /// Use the production marketplace instead of the sandbox
    #[arg(long)]
    real: bool,
    /// Print what would be done without changing anything
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create HITs pointing at an exam page
    LaunchExam {
        config_file: PathBuf,
        exam_page_url: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Expire every HIT of a HIT group
    ExpireHitGroup {
        groupid: String,
        /// Use the production marketplace instead of the sandbox
        #[arg(long)]
        real: bool,
    },
    /// Grant a qualification to the workers whose exam grade passes
    GrantQualification {
        /// Exam report, as printed by `crowdaq get-report`
        report: PathBuf,
        qualification: String,
        #[arg(long)]
        passing_grade: f64,
        /// Send workers a notification email
        #[arg(long)]
        notify: bool,
        #[command(flatten)]
        target: Target,
    },
    /// Create a new qualification type and grant it to a list of workers
    GrantNewQualification {
        /// One worker id per line
        workers_file: PathBuf,
        #[command(flatten)]
        target: Target,
    },
    /// Remove a qualification from a list of workers
    RevokeQualification {
        qualification: String,
        workers_file: PathBuf,
        #[command(flatten)]
        target: Target,
    },
    /// Remove a qualification from every worker holding it
    RevokeAllQualification {
        qualification: String,
        #[command(flatten)]
        target: Target,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        logging::init(self.debug);
        let profile = self.profile;
        let connect = |sandbox: bool| -> Result<MturkClient> {
            MturkClient::connect(&profile, sandbox).context("Failed to create MTurk client")
        };
        match self.command {
            Command::LaunchExam {
                config_file,
                exam_page_url,
                yes,
            } => {
                let conf = LaunchFile::load(&config_file)?.mturk_config;
                let market = connect(conf.sandbox)?;
                println!("Launching Exam on MTurk");
                println!("Available balance before launch: {}", market.account_balance()?);
                println!("External url is: {}", exam_page_url);
                if !yes && !ui::confirm("Please check if the page is correct. Continue?")? {
                    println!("Aborted.");
                    return Ok(());
                }
                let pb = ui::spinner("Creating HITs...");
                let outcome = launch_exam(&market, &conf, &exam_page_url);
                pb.finish_and_clear();
                let outcome = outcome?;
                println!("MTurk job url is:");
                for url in &outcome.preview_urls {
                    println!("{}", url);
                }
                println!("Available balance after launch: {}", market.account_balance()?);
                Ok(())
            }
            Command::ExpireHitGroup { groupid, real } => {
                println!("Expiring hit group {} on MTurk", groupid);
                let market = connect(!real)?;
                let outcome = expire_hit_group(&market, &groupid)?;
                for (hit_id, expiration) in &outcome.expirations {
                    println!("{} will now expire at {}", hit_id, format_epoch(*expiration));
                }
                ui::print_summary("expire", &outcome.summary);
                Ok(())
            }
            Command::GrantQualification {
                report,
                qualification,
                passing_grade,
                notify,
                target,
            } => {
                let entries = grade_entries(&read_json(&report)?)
                    .with_context(|| format!("{} has no worker grades", report.display()))?;
                let market = connect(!target.real)?;
                let opts = GrantOptions {
                    dry_run: target.dry_run,
                    notify,
                };
                let summary = qualify_by_grade(&market, &qualification, &entries, passing_grade, opts);
                ui::print_summary("qualify", &summary);
                Ok(())
            }
            Command::GrantNewQualification {
                workers_file,
                target,
            } => {
                let workers = read_worker_ids(&workers_file)?;
                let market = connect(!target.real)?;
                let opts = GrantOptions {
                    dry_run: target.dry_run,
                    notify: false,
                };
                let (qualification, summary) = grant_new_qualification(&market, &workers, opts)?;
                if let Some(qualification) = qualification {
                    println!("Created qualification type {}", qualification);
                }
                ui::print_summary("qualify", &summary);
                Ok(())
            }
            Command::RevokeQualification {
                qualification,
                workers_file,
                target,
            } => {
                let workers = read_worker_ids(&workers_file)?;
                let market = connect(!target.real)?;
                let summary = revoke_qualification(&market, &qualification, &workers, target.dry_run);
                ui::print_summary("revoke", &summary);
                Ok(())
            }
            Command::RevokeAllQualification {
                qualification,
                target,
            } => {
                let market = connect(!target.real)?;
                let summary = revoke_all(&market, &qualification, target.dry_run)?;
                ui::print_summary("revoke", &summary);
                Ok(())
            }
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Worker ids, one per line; blank lines are ignored.
pub fn read_worker_ids(path: &Path) -> Result<Vec<String>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(data
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn format_epoch(secs: Option<i64>) -> String {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string())
}
