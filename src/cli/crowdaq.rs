// `crowdaq`: resource management against the annotation service.

use crate::api::{unfinished_task_urls, ApiClient};
use crate::config::{expand_home, Config, DEFAULT_CONFIG_PATH};
use crate::resource::{
    resolve, resolve_with_name, CreateOutcome, ExamResources, Resolved, ResourceType,
};
use crate::sync::sync_responses;
use crate::{logging, ui};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "crowdaq", about = "Manage crowdaq instructions, tutorials, question sets and exams")]
pub struct Cli {
    /// Credentials file.
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_PATH)]
    config_file: String,
    #[arg(long)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Set site URL, user and password interactively
    Config,
    /// Log in and store the token in the config file
    Login,
    /// Log in, store the token and print it
    GetToken,
    /// Upload a resource definition unless it already exists
    Create {
        resource: String,
        file: PathBuf,
        #[arg(long, short)]
        overwrite: bool,
    },
    /// Print a single resource
    Get { resource: String },
    /// Print the names of all resources in a category
    List { resource: String },
    /// Download exam responses not yet present in a folder
    SyncResponse {
        resource: String,
        output_folder: PathBuf,
    },
    /// Print the grading report of an exam
    GetReport { resource: String },
    /// Authenticated POST to any URL
    Post {
        url: String,
        /// File whose contents are sent as the body
        #[arg(long, short)]
        body: Option<PathBuf>,
    },
    /// Authenticated GET to any URL
    GetUrl { url: String },
    /// Print a worker URL for every assignment a task is still missing
    GenUnfinishedUrls { taskname: String, targetcnt: u64 },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        logging::init(self.debug);
        let config_path = expand_home(&self.config_file);
        match self.command {
            Command::Config => {
                let current = Config::load_or_default(&config_path)?;
                ui::prompt_config(&current)?.save(&config_path)
            }
            Command::Login => login(&config_path).map(|_| ()),
            Command::GetToken => {
                let token = login(&config_path)?;
                println!("{}", token);
                Ok(())
            }
            Command::Create {
                resource,
                file,
                overwrite,
            } => with_client(&config_path, |api, _| create(api, &resource, &file, overwrite)),
            Command::Get { resource } => with_client(&config_path, |api, _| get(api, &resource)),
            Command::List { resource } => with_client(&config_path, |api, _| list(api, &resource)),
            Command::SyncResponse {
                resource,
                output_folder,
            } => with_client(&config_path, |api, _| sync(api, &resource, &output_folder)),
            Command::GetReport { resource } => {
                with_client(&config_path, |api, _| report(api, &resource))
            }
            Command::Post { url, body } => with_client(&config_path, |api, _| {
                let body = match body {
                    Some(path) => Some(
                        std::fs::read_to_string(&path)
                            .with_context(|| format!("Failed to read {}", path.display()))?,
                    ),
                    None => None,
                };
                let resp = api.raw_post(&url, body)?;
                println!("{}", resp.status);
                println!("{}", resp.body);
                Ok(())
            }),
            Command::GetUrl { url } => with_client(&config_path, |api, _| {
                let resp = api.raw_get(&url)?;
                eprintln!("{}", resp.status);
                println!("{}", resp.body);
                Ok(())
            }),
            Command::GenUnfinishedUrls {
                taskname,
                targetcnt,
            } => with_client(&config_path, |api, conf| {
                let progress = api.task_progress(&conf.user, &taskname)?;
                for url in unfinished_task_urls(api.site_url(), &conf.user, &taskname, &progress, targetcnt) {
                    println!("{}", url);
                }
                Ok(())
            }),
        }
    }
}

fn with_client<F>(config_path: &Path, f: F) -> Result<()>
where
    F: FnOnce(&ApiClient, &Config) -> Result<()>,
{
    let conf = Config::load(config_path)?;
    let api = ApiClient::from_config(&conf)?;
    f(&api, &conf)
}

fn login(config_path: &Path) -> Result<String> {
    let conf = Config::load(config_path)?;
    let api = ApiClient::from_config(&conf)?;
    let pb = ui::spinner("Logging in...");
    let token = api.login(&conf.user, &conf.password);
    pb.finish_and_clear();
    let token = token?;
    conf.with_token(token.clone()).save(config_path)?;
    Ok(token)
}

/// Body sent for a definition file. Instructions may be written in
/// markdown, in which case the text is wrapped as `{"document": ...}`.
pub fn definition_payload(kind: ResourceType, file: &Path, text: String) -> Result<String> {
    if kind != ResourceType::Instruction {
        return Ok(text);
    }
    match file.extension().and_then(|e| e.to_str()) {
        Some("md") => Ok(json!({ "document": text }).to_string()),
        Some("json") => Ok(text),
        _ => bail!("Instruction definition file must ends with either md or json"),
    }
}

fn create(api: &ApiClient, resource: &str, file: &Path, overwrite: bool) -> Result<()> {
    let resolved = resolve_with_name(resource, api)?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let definition = definition_payload(resolved.kind(), file, text)?;
    match resolved.resources.create(&resolved.name, &definition, overwrite)? {
        CreateOutcome::Stored(_) => println!("Stored {}", resource),
        CreateOutcome::AlreadyExists => println!("Resource already exists."),
    }
    Ok(())
}

fn print_json(v: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}

fn get(api: &ApiClient, resource: &str) -> Result<()> {
    let resolved = resolve_with_name(resource, api)?;
    eprintln!("Found the following resource under {}", resource);
    match resolved.resources.get(&resolved.name)? {
        Some(v) => print_json(&v),
        None => {
            println!("null");
            Ok(())
        }
    }
}

fn list(api: &ApiClient, resource: &str) -> Result<()> {
    let resources = resolve(resource, api)?;
    eprintln!("Found the following resource under {}", resource);
    let items = resources.list()?.unwrap_or(Value::Null);
    for item in items.as_array().into_iter().flatten() {
        if let Some(name) = item.get("name").and_then(Value::as_str) {
            println!("{}", name);
        }
    }
    Ok(())
}

fn exam_of<'r, 'a>(resolved: &'r Resolved<'a>, command: &str) -> Result<ExamResources<'r, 'a>> {
    resolved.resources.exam().ok_or_else(|| {
        anyhow!(
            "{} is not available for the resource type: {}",
            command,
            resolved.kind()
        )
    })
}

fn sync(api: &ApiClient, resource: &str, output_folder: &Path) -> Result<()> {
    let resolved = resolve_with_name(resource, api)?;
    let exam = exam_of(&resolved, "sync-response")?;
    println!("Loading existing files now.");
    let outcome = sync_responses(&exam, &resolved.name, output_folder, chrono::Local::now())?;
    for skipped in &outcome.skipped {
        println!("File {} cannot be loaded.", skipped.display());
    }
    println!("Found {} records downloaded.", outcome.local);
    println!("Server has total {} responses.", outcome.server);
    println!("{} records will be downloaded now.", outcome.fetched);
    if let Some(path) = outcome.written {
        println!("Wrote {}", path.display());
    }
    println!("Finished.");
    Ok(())
}

fn report(api: &ApiClient, resource: &str) -> Result<()> {
    let resolved = resolve_with_name(resource, api)?;
    let exam = exam_of(&resolved, "get-report")?;
    let pb = ui::spinner("Fetching report...");
    let report = exam.get_report(&resolved.name);
    pb.finish_and_clear();
    print_json(&report?.unwrap_or(Value::Null))
}
