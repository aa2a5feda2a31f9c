use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rustyline::DefaultEditor;

pub mod chat;

use crate::chat::{ChatClient, Exchange};
use crate::core::{AppConfig, logging};
use crate::credentials::CredentialChange;
use crate::render::{RenderContext, Renderer};
use crate::session::LoadStatus;

const CLEAR_PROMPT: &str =
    "Clear all local chat messages? This will remove them from local storage. [y/N] ";

#[derive(Subcommand)]
enum KeyAction {
    /// Store an API key. Prompts for it when not given; an empty key
    /// clears it
    Set { key: Option<String> },
    /// Forget the stored API key
    Clear {},
    /// Show which API key is in use
    Show {},
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat session
    Chat {},
    /// Join the chat under a display name
    Join { name: String },
    /// Forget the display name (messages are kept)
    Logout {},
    /// Send a message, optionally with an attachment
    Send {
        #[arg(default_value = "")]
        text: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Ask the AI, text only
    Ask { text: String },
    /// Print the chat history
    History {
        /// Only show this many of the newest rows
        #[arg(long)]
        rows: Option<usize>,
    },
    /// Clear all local chat messages
    Clear {
        #[arg(long, action, default_value = "false")]
        yes: bool,
    },
    /// Manage the OpenAI API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Save the attachment of a message (numbered as in `history`)
    Export { position: usize, path: PathBuf },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

/// Ask a yes/no question on the terminal. Anything but an explicit yes
/// is a no.
pub(crate) fn confirm(rl: &mut DefaultEditor, question: &str) -> bool {
    match rl.readline(question) {
        Ok(answer) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

pub(crate) fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Prompt for a key, prefilled with the stored one, and save it.
pub(crate) async fn prompt_for_key(rl: &mut DefaultEditor, client: &ChatClient) -> Result<()> {
    let credentials = client.credentials();
    let prefill = credentials.show().await?.unwrap_or_default();
    let input = match rl.readline_with_initial("OpenAI key (empty to clear): ", (prefill.as_str(), "")) {
        Ok(input) => input,
        Err(_) => {
            credentials.hide();
            return Ok(());
        }
    };
    report_key_change(&credentials.save(&input).await?);
    Ok(())
}

fn report_key_change(change: &CredentialChange) {
    match change {
        CredentialChange::Stored => println!(
            "OpenAI key saved locally in plaintext (for testing). Do not share this device."
        ),
        CredentialChange::Cleared => println!("OpenAI key cleared."),
    }
}

fn report_load_status(status: &LoadStatus) {
    if let LoadStatus::Recovered(reason) = status {
        eprintln!("Warning: {}. Starting with an empty chat.", reason);
    }
}

/// Print the assistant's side of an exchange.
pub(crate) async fn print_exchange(client: &ChatClient, exchange: &Exchange) {
    let display_name = client.display_name().await;
    let ctx = RenderContext {
        display_name: display_name.as_deref(),
        ..RenderContext::default()
    };
    let reply = exchange.outcome.message().clone();
    print!("{}", Renderer::new().to_terminal(&[reply], &ctx));
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    logging::init();

    let config = AppConfig::default();
    let (client, status) = ChatClient::open(&config).await?;
    report_load_status(&status);

    // Handle each sub command
    match args.command {
        Some(Command::Chat {}) => {
            chat::run(client).await?;
        }
        Some(Command::Join { name }) => {
            client.join(&name).await?;
            println!("Joined as {}", name.trim());
        }
        Some(Command::Logout {}) => {
            client.logout().await?;
            println!("Logged out.");
        }
        Some(Command::Send { text, file }) => {
            match client.send(&text, file.as_deref()).await? {
                Some(exchange) => print_exchange(&client, &exchange).await,
                None => eprintln!("Nothing to send"),
            }
        }
        Some(Command::Ask { text }) => {
            let exchange = client.ask(&text).await?;
            print_exchange(&client, &exchange).await;
        }
        Some(Command::History { rows }) => {
            print!("{}", client.render(rows).await?);
        }
        Some(Command::Clear { yes }) => {
            let cleared = if yes {
                client.clear_chat(|| true).await?
            } else {
                let mut rl = DefaultEditor::new()?;
                client.clear_chat(|| confirm(&mut rl, CLEAR_PROMPT)).await?
            };
            if cleared {
                println!("Chat cleared.");
            }
        }
        Some(Command::Key { action }) => match action {
            KeyAction::Set { key: Some(key) } => {
                report_key_change(&client.credentials().save(&key).await?);
            }
            KeyAction::Set { key: None } => {
                let mut rl = DefaultEditor::new()?;
                prompt_for_key(&mut rl, &client).await?;
            }
            KeyAction::Clear {} => {
                report_key_change(&client.credentials().save("").await?);
            }
            KeyAction::Show {} => match client.credentials().resolve().await? {
                Some(key) => println!("{}", mask_key(&key)),
                None => println!("No OpenAI key set"),
            },
        },
        Some(Command::Export { position, path }) => {
            let written = client.export_media(position, &path).await?;
            println!("Saved {}", written.display());
        }
        None => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send_with_file() {
        let cli = Cli::try_parse_from(["imptech", "send", "look at this", "--file", "cat.png"])
            .unwrap();
        match cli.command {
            Some(Command::Send { text, file }) => {
                assert_eq!(text, "look at this");
                assert_eq!(file, Some(PathBuf::from("cat.png")));
            }
            _ => panic!("Expected Send"),
        }
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("sk-1234567890abcd"), "sk-...abcd");
        assert_eq!(mask_key("short"), "*****");
    }
}
