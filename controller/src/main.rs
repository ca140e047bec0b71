mod client;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client::DmClient;
use deployment_core::{ApplicationDescription, InstanceDescription};
use serde_json::Value;
use std::fs;

#[derive(Parser)]
#[command(name = "controller")]
#[command(about = "CLI Controller for the Deployment Manager")]
struct Cli {
    /// Base URL of the DM REST API
    #[arg(long, default_value = "http://127.0.0.1:8181")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the managed applications
    Apps,
    /// Register an application from its JSON description
    Register {
        #[arg(short, long)]
        file: String,
    },
    /// List instances
    Instances {
        #[arg(short, long)]
        app: String,
        /// Parent instance (roots when omitted)
        #[arg(short, long)]
        path: Option<String>,
        /// Whole subtree instead of direct children
        #[arg(long)]
        all: bool,
    },
    /// deploy | start | stop | undeploy | remove | backup
    Action {
        #[arg(short, long)]
        app: String,
        action: String,
        #[arg(short, long)]
        path: String,
    },
    /// deploy-all | deploy-and-start-all | start-all | stop-all | undeploy-all
    Bulk {
        #[arg(short, long)]
        app: String,
        action: String,
        #[arg(short, long)]
        path: Option<String>,
    },
    /// Add an instance from its JSON description
    Add {
        #[arg(short, long)]
        app: String,
        /// Parent instance (new root when omitted)
        #[arg(short, long)]
        path: Option<String>,
        #[arg(short, long)]
        file: String,
    },
    /// Back up an instance and move it to a copy
    Migrate {
        #[arg(short, long)]
        app: String,
        #[arg(short, long)]
        path: String,
        #[arg(short, long)]
        dest: Option<String>,
        /// -1 (keep all), 0 (instance only) or 1 (whole root)
        #[arg(long, allow_hyphen_values = true)]
        delete_old_root: String,
    },
    /// Restore an instance to a destination path
    Restore {
        #[arg(short, long)]
        app: String,
        #[arg(short, long)]
        path: String,
        #[arg(short, long)]
        dest: String,
        #[arg(long, allow_hyphen_values = true)]
        delete_old_root: String,
    },
    /// Components that can be added under an instance
    Possibilities {
        #[arg(short, long)]
        app: String,
        #[arg(short, long)]
        path: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = DmClient::new(cli.url);

    let response = match cli.command {
        Commands::Apps => client.get("/applications", &[]).await?,
        Commands::Register { file } => {
            let content = fs::read_to_string(&file).context("Failed to read the description")?;
            let description: ApplicationDescription =
                serde_json::from_str(&content).context("Invalid application JSON")?;
            let route = format!("/applications/{}", description.name);
            client
                .post(&route, &[], Some(serde_json::to_value(&description)?))
                .await?
        }
        Commands::Instances { app, path, all } => {
            let all = all.then_some("true");
            client
                .get(
                    &format!("/app/{}/children", app),
                    &[("instance-path", path.as_deref()), ("all-children", all)],
                )
                .await?
        }
        Commands::Action { app, action, path } => {
            client
                .post(
                    &format!("/app/{}/{}", app, action),
                    &[("instance-path", Some(path.as_str()))],
                    None,
                )
                .await?
        }
        Commands::Bulk { app, action, path } => {
            client
                .post(
                    &format!("/app/{}/{}", app, action),
                    &[("instance-path", path.as_deref())],
                    None,
                )
                .await?
        }
        Commands::Add { app, path, file } => {
            let content = fs::read_to_string(&file).context("Failed to read the instance")?;
            let instance: InstanceDescription =
                serde_json::from_str(&content).context("Invalid instance JSON")?;
            client
                .post(
                    &format!("/app/{}/add", app),
                    &[("instance-path", path.as_deref())],
                    Some(serde_json::to_value(&instance)?),
                )
                .await?
        }
        Commands::Migrate {
            app,
            path,
            dest,
            delete_old_root,
        } => {
            client
                .post(
                    &format!("/app/{}/migrate", app),
                    &[
                        ("instance-path", Some(path.as_str())),
                        ("dest-path", dest.as_deref()),
                        ("delete-old-root", Some(delete_old_root.as_str())),
                    ],
                    None,
                )
                .await?
        }
        Commands::Restore {
            app,
            path,
            dest,
            delete_old_root,
        } => {
            client
                .post(
                    &format!("/app/{}/restore", app),
                    &[
                        ("instance-path", Some(path.as_str())),
                        ("dest-path", Some(dest.as_str())),
                        ("delete-old-root", Some(delete_old_root.as_str())),
                    ],
                    None,
                )
                .await?
        }
        Commands::Possibilities { app, path } => {
            client
                .get(
                    &format!("/app/{}/possibilities", app),
                    &[("instance-path", path.as_deref())],
                )
                .await?
        }
    };

    print_response(&response);
    Ok(())
}

fn print_response(response: &Value) {
    if let Some(instances) = response["instances"].as_array() {
        println!("{:<40} | {:<12} | {:<18}", "PATH", "COMPONENT", "STATUS");
        println!("{:-<40}-+-{:-<12}-+-{:-<18}", "", "", "");
        for instance in instances {
            println!(
                "{:<40} | {:<12} | {:<18}",
                instance["path"].as_str().unwrap_or_default(),
                instance["component"].as_str().unwrap_or_default(),
                instance["status"].as_str().unwrap_or_default()
            );
        }
    } else if let Some(msg) = response["msg"].as_str() {
        println!("SUCCESS: {}", msg);
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(response).unwrap_or_default()
        );
    }
}
