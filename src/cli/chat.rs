use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use super::{CLEAR_PROMPT, confirm, print_exchange, prompt_for_key};
use crate::ai::prompt::THINKING;
use crate::chat::{ChatClient, ChatError};

const HISTORY_ROWS: usize = 40;

const HELP: &str = "\
Type a message and press enter to send it.
  /file <path> [text]  send a file, with optional text
  /ask <text>          ask the AI
  /key                 set or clear the OpenAI key
  /history             show the chat
  /clear               clear all messages
  /logout              leave and join under another name
  /quit                exit";

/// Ask for a display name until one is accepted. Returns `false` if
/// the user gave up.
async fn ensure_joined(rl: &mut DefaultEditor, client: &ChatClient) -> Result<bool> {
    if client.display_name().await.is_some() {
        return Ok(true);
    }
    loop {
        let name = match rl.readline("Display name: ") {
            Ok(name) => name,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        match client.join(&name).await {
            Ok(()) => return Ok(true),
            Err(e) if e.downcast_ref::<ChatError>() == Some(&ChatError::EmptyDisplayName) => {
                println!("{}", e)
            }
            Err(e) => return Err(e),
        }
    }
}

/// One line typed at the prompt.
#[derive(Debug, PartialEq)]
enum Input<'a> {
    Quit,
    Help,
    History,
    Key,
    Clear,
    Logout,
    Ask(&'a str),
    File { path: &'a str, text: &'a str },
    /// Slash command that isn't one of the above
    Unknown(&'a str),
    Say(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        "/quit" | "/exit" => Input::Quit,
        "/help" => Input::Help,
        "/history" => Input::History,
        "/key" => Input::Key,
        "/clear" => Input::Clear,
        "/logout" => Input::Logout,
        "/ask" => Input::Ask(rest),
        "/file" => match rest.split_once(char::is_whitespace) {
            Some((path, text)) => Input::File {
                path,
                text: text.trim(),
            },
            None => Input::File {
                path: rest,
                text: "",
            },
        },
        unknown if unknown.starts_with('/') => Input::Unknown(unknown),
        _ => Input::Say(line),
    }
}

/// Handle one line of input. Returns `false` when the session should
/// end.
async fn handle_line(rl: &mut DefaultEditor, client: &ChatClient, line: &str) -> Result<bool> {
    match parse_input(line) {
        Input::Quit => return Ok(false),
        Input::Help => println!("{}", HELP),
        Input::History => print!("{}", client.render(Some(HISTORY_ROWS)).await?),
        Input::Key => prompt_for_key(rl, client).await?,
        Input::Clear => {
            if client.clear_chat(|| confirm(rl, CLEAR_PROMPT)).await? {
                println!("Chat cleared.");
            }
        }
        Input::Logout => {
            client.logout().await?;
            println!("Logged out.");
            if !ensure_joined(rl, client).await? {
                return Ok(false);
            }
        }
        Input::Ask(text) => {
            println!("{}", THINKING.dimmed());
            let exchange = client.ask(text).await?;
            print_exchange(client, &exchange).await;
        }
        Input::File { path: "", .. } => println!("Usage: /file <path> [text]"),
        Input::File { path, text } => {
            println!("{}", THINKING.dimmed());
            if let Some(exchange) = client.send(text, Some(Path::new(path))).await? {
                print_exchange(client, &exchange).await;
            }
        }
        Input::Unknown(command) => println!("Unknown command {}\n{}", command, HELP),
        Input::Say(text) => {
            println!("{}", THINKING.dimmed());
            if let Some(exchange) = client.send(text, None).await? {
                print_exchange(client, &exchange).await;
            }
        }
    }
    Ok(true)
}

pub async fn run(client: ChatClient) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    if !ensure_joined(&mut rl, &client).await? {
        return Ok(());
    }
    print!("{}", client.render(Some(HISTORY_ROWS)).await?);
    println!("{}", "Type /help for commands.".dimmed());

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                // Errors are reported and the session carries on
                match handle_line(&mut rl, &client, &line).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        tracing::debug!("Command failed: {:?}", e);
                        println!("Error: {}", e);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("/history"), Input::History);
        assert_eq!(parse_input("/ask  what is this "), Input::Ask("what is this"));
        assert_eq!(
            parse_input("/file cat.png look at  this"),
            Input::File {
                path: "cat.png",
                text: "look at  this"
            }
        );
        assert_eq!(
            parse_input("/file"),
            Input::File {
                path: "",
                text: ""
            }
        );
    }

    #[test]
    fn test_unknown_slash_command_is_not_sent() {
        assert_eq!(parse_input("/hsitory"), Input::Unknown("/hsitory"));
        assert_eq!(parse_input("/hsitory please"), Input::Unknown("/hsitory"));
        assert_eq!(parse_input("hello /history"), Input::Say("hello /history"));
    }
}
