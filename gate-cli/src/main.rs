//! gate-cli - gate-bot 管理CLIツール
//!
//! 管理APIを叩いてコマンドの一覧・登録・削除を行う

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

/// gate-bot CLI
#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "CLI tool for gate-bot", long_about = None)]
struct Cli {
    /// API server URL (default: http://localhost:3000)
    #[arg(short, long, env = "GATE_API_URL", default_value = "http://localhost:3000")]
    url: String,

    /// API bearer token
    #[arg(short, long, env = "API_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage application commands
    Commands {
        #[command(subcommand)]
        command: CommandCommands,
    },
    /// Show or reset cooldowns
    Cooldowns {
        #[command(subcommand)]
        command: Option<CooldownCommands>,
    },
    /// Check API health
    Health,
}

#[derive(Subcommand)]
enum CommandCommands {
    /// List registered commands
    List,
    /// Register application commands with Discord
    Register {
        /// Guild ID (defaults to the bot's GUILD_ID, or global)
        #[arg(short, long)]
        guild: Option<u64>,
    },
    /// Remove all application commands from Discord
    Purge {
        /// Guild ID (defaults to the bot's GUILD_ID, or global)
        #[arg(short, long)]
        guild: Option<u64>,
    },
}

#[derive(Subcommand)]
enum CooldownCommands {
    /// Clear a user's cooldown for a command (name or alias)
    Reset {
        /// Command name or alias
        command: String,
        /// User ID
        user: u64,
    },
}

// ===== API Response Types =====

#[derive(Deserialize)]
struct CommandSummary {
    name: String,
    kind: String,
    description: String,
    aliases: Vec<String>,
    category: Option<String>,
    scope: String,
    admins_only: bool,
    cooldown_secs: f64,
    user_permissions: Vec<String>,
    remote: bool,
}

#[derive(Serialize)]
struct RegisterRequest {
    guild_id: Option<u64>,
}

#[derive(Deserialize)]
struct RegisteredCommand {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct RegisterResponse {
    scope: String,
    registered: Vec<RegisteredCommand>,
}

#[derive(Deserialize)]
struct PurgeResponse {
    scope: String,
}

#[derive(Deserialize)]
struct CooldownResponse {
    active: usize,
}

#[derive(Deserialize)]
struct CooldownResetResponse {
    command: String,
    user_id: String,
    reset: bool,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    commands: usize,
    buttons: usize,
    select_menus: usize,
}

/// Bearerトークン付きのAPIクライアント
struct Api {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl Api {
    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = Api {
        client: Client::new(),
        base_url: cli.url,
        token: cli.token,
    };

    match cli.command {
        Commands::Commands { command } => {
            handle_commands(&api, command).await?;
        }
        Commands::Cooldowns { command } => match command {
            Some(CooldownCommands::Reset { command, user }) => {
                reset_cooldown_command(&api, &command, user).await?;
            }
            None => cooldowns_command(&api).await?,
        },
        Commands::Health => {
            health_command(&api).await?;
        }
    }

    Ok(())
}

/// エラー応答を表示して失敗として返す（終了コードを非0にする）
async fn print_error(resp: Response) -> Result<()> {
    let status = resp.status();
    let text = resp.text().await?;
    eprintln!("{} ({}): {}", "Error".red(), status, text);
    Err(request_failed(status))
}

fn request_failed(status: StatusCode) -> anyhow::Error {
    anyhow!("request failed with status {}", status)
}

async fn handle_commands(api: &Api, command: CommandCommands) -> Result<()> {
    match command {
        CommandCommands::List => {
            let resp = api
                .request(api.client.get(api.url("/api/commands")))
                .send()
                .await?;

            if resp.status().is_success() {
                let commands: Vec<CommandSummary> = resp.json().await?;
                if commands.is_empty() {
                    println!("No commands registered.");
                } else {
                    println!("{}", "Commands:".green().bold());
                    for c in commands {
                        let mut flags = vec![c.scope.to_lowercase()];
                        if c.admins_only {
                            flags.push("admins".to_string());
                        }
                        if c.cooldown_secs > 0.0 {
                            flags.push(format!("cooldown {}s", c.cooldown_secs));
                        }
                        if !c.remote {
                            flags.push("local".to_string());
                        }
                        println!(
                            "  {} [{}] {} ({})",
                            c.name.yellow(),
                            c.kind.cyan(),
                            c.description,
                            flags.join(", ").dimmed()
                        );
                        if !c.aliases.is_empty() {
                            println!("    aliases: {}", c.aliases.join(", "));
                        }
                        if let Some(category) = c.category {
                            println!("    category: {}", category);
                        }
                        if !c.user_permissions.is_empty() {
                            println!("    requires: {}", c.user_permissions.join(", "));
                        }
                    }
                }
            } else {
                print_error(resp).await?;
            }
        }
        CommandCommands::Register { guild } => {
            let resp = api
                .request(api.client.post(api.url("/api/commands/register")))
                .json(&RegisterRequest { guild_id: guild })
                .send()
                .await?;

            if resp.status().is_success() {
                let result: RegisterResponse = resp.json().await?;
                println!(
                    "{} Registered {} commands ({})",
                    "✓".green(),
                    result.registered.len(),
                    result.scope.cyan()
                );
                for c in result.registered {
                    println!("  {} {}", c.id.yellow(), c.name);
                }
            } else {
                print_error(resp).await?;
            }
        }
        CommandCommands::Purge { guild } => {
            let path = match guild {
                Some(id) => format!("/api/commands?guild_id={}", id),
                None => "/api/commands".to_string(),
            };
            let resp = api
                .request(api.client.delete(api.url(&path)))
                .send()
                .await?;

            if resp.status().is_success() {
                let result: PurgeResponse = resp.json().await?;
                println!("{} Commands removed ({})", "✓".green(), result.scope.cyan());
            } else {
                print_error(resp).await?;
            }
        }
    }

    Ok(())
}

async fn cooldowns_command(api: &Api) -> Result<()> {
    let resp = api
        .request(api.client.get(api.url("/api/cooldowns")))
        .send()
        .await?;

    if resp.status().is_success() {
        let stats: CooldownResponse = resp.json().await?;
        println!("Active cooldowns: {}", stats.active.to_string().yellow());
    } else {
        print_error(resp).await?;
    }

    Ok(())
}

async fn reset_cooldown_command(api: &Api, command: &str, user: u64) -> Result<()> {
    let path = format!("/api/cooldowns/{}/{}", command, user);
    let resp = api
        .request(api.client.delete(api.url(&path)))
        .send()
        .await?;

    if resp.status().is_success() {
        let result: CooldownResetResponse = resp.json().await?;
        if result.reset {
            println!(
                "{} Cooldown cleared for {} (user {})",
                "✓".green(),
                result.command.yellow(),
                result.user_id
            );
        } else {
            println!(
                "No active cooldown for {} (user {})",
                result.command.yellow(),
                result.user_id
            );
        }
    } else {
        print_error(resp).await?;
    }

    Ok(())
}

async fn health_command(api: &Api) -> Result<()> {
    let resp = api.client.get(api.url("/api/health")).send().await?;

    if resp.status().is_success() {
        let health: HealthResponse = resp.json().await?;
        println!("{} API is healthy", "✓".green());
        println!("  Status: {}", health.status);
        println!("  Version: {}", health.version);
        println!(
            "  Handlers: {} commands, {} buttons, {} select menus",
            health.commands, health.buttons, health.select_menus
        );
    } else {
        print_error(resp).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_failed_reports_status() {
        let error = request_failed(StatusCode::UNAUTHORIZED);
        assert!(error.to_string().contains("401"));
    }
}
