//! Command implementations for gaugyanctl

use crate::client::GauClient;
use crate::errors::ClientError;
use crate::image_file::load_image;
use crate::scorecard::Renderer;
use crate::session_file::{SessionFile, StoredSession};
use anyhow::{bail, Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use gaugyan_common::protocol::{LoginResponse, RelevantTraitsRequest};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::time::Duration;

/// Settings shared by every command
pub struct CommandContext {
    pub server: String,
    pub json: bool,
    pub session_file: SessionFile,
}

impl CommandContext {
    fn renderer(&self) -> Renderer {
        Renderer::new(io::stdout().is_terminal())
    }

    fn client(&self) -> Result<GauClient> {
        Ok(GauClient::new(&self.server)?)
    }

    /// Client carrying the stored session
    fn authed_client(&self) -> Result<GauClient> {
        let session = self
            .session_file
            .load(&self.server)?
            .ok_or(ClientError::NotLoggedIn)?;
        Ok(self.client()?.with_token(Some(session.token)))
    }

    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if io::stderr().is_terminal() {
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.green} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
    } else {
        spinner.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    spinner.set_message(message.to_string());
    spinner
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}: ", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// What a keystroke does to a hidden line being typed
#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Continue,
    Done,
    Cancelled,
}

fn apply_key(line: &mut String, key: KeyEvent) -> KeyOutcome {
    if key.kind != KeyEventKind::Press {
        return KeyOutcome::Continue;
    }
    match key.code {
        KeyCode::Enter => KeyOutcome::Done,
        KeyCode::Esc => KeyOutcome::Cancelled,
        KeyCode::Char('c') | KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            KeyOutcome::Cancelled
        }
        KeyCode::Backspace => {
            line.pop();
            KeyOutcome::Continue
        }
        KeyCode::Char(c) => {
            line.push(c);
            KeyOutcome::Continue
        }
        _ => KeyOutcome::Continue,
    }
}

fn read_hidden_line() -> Result<String> {
    let mut line = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            match apply_key(&mut line, key) {
                KeyOutcome::Continue => {}
                KeyOutcome::Done => return Ok(line),
                KeyOutcome::Cancelled => bail!("Password entry cancelled"),
            }
        }
    }
}

/// Read a secret without echoing it; piped input is read as a plain line
fn prompt_hidden(label: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        return prompt(label);
    }

    eprint!("{}: ", label);
    io::stderr().flush()?;
    terminal::enable_raw_mode()?;
    let result = read_hidden_line();
    terminal::disable_raw_mode()?;
    eprintln!();
    result
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => prompt_hidden("Password"),
    }
}

/// Parse `name=value` trait arguments
pub fn parse_traits(args: &[String]) -> Result<BTreeMap<String, f64>> {
    let mut traits = BTreeMap::new();
    for arg in args {
        let Some((name, value)) = arg.split_once('=') else {
            bail!("Invalid trait '{}': expected name=value", arg);
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("Invalid trait '{}': empty name", arg);
        }
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("Invalid trait '{}': value is not a number", arg))?;
        traits.insert(name.to_string(), value);
    }
    Ok(traits)
}

pub async fn health(ctx: &CommandContext) -> Result<()> {
    let health = ctx.client()?.health().await?;
    if ctx.json {
        return ctx.print_json(&health);
    }
    println!(
        "{} gaugyand v{} at {} (up {}s)",
        "●".bright_green(),
        health.version,
        ctx.server,
        health.uptime_seconds
    );
    Ok(())
}

pub async fn register(ctx: &CommandContext, name: String, email: String, password: Option<String>) -> Result<()> {
    let password = password_or_prompt(password)?;
    let response = ctx
        .client()?
        .register(&name, &email, &password)
        .await
        .context("Registration failed")?;

    if ctx.json {
        return ctx.print_json(&response);
    }
    println!("Registered {}. Run `gaugyanctl login` to sign in.", email);
    Ok(())
}

pub async fn login(
    ctx: &CommandContext,
    email: Option<String>,
    password: Option<String>,
    custom_token: Option<String>,
) -> Result<()> {
    let client = ctx.client()?;
    let response: LoginResponse = match (custom_token, email) {
        (Some(token), _) => client.login_with_token(&token).await,
        (None, Some(email)) => {
            let password = password_or_prompt(password)?;
            client.login(&email, &password).await
        }
        (None, None) => {
            let email = prompt("Email")?;
            let password = password_or_prompt(password)?;
            client.login(&email, &password).await
        }
    }
    .context("Login failed")?;

    ctx.session_file.save(&StoredSession {
        server: ctx.server.clone(),
        token: response.token.clone(),
        user_id: response.user_id.clone(),
        expires_at: response.expires_at,
    })?;

    if ctx.json {
        return ctx.print_json(&response);
    }
    println!(
        "Logged in as {} (session valid until {})",
        response.user_id,
        response.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}

pub async fn logout(ctx: &CommandContext) -> Result<()> {
    if let Some(session) = ctx.session_file.load(&ctx.server)? {
        let client = ctx.client()?.with_token(Some(session.token));
        // The local session is dropped even if the daemon is unreachable
        if let Err(e) = client.logout().await {
            eprintln!("warning: {}", e);
        }
    }
    ctx.session_file.clear()?;

    if !ctx.json {
        println!("Logged out.");
    }
    Ok(())
}

pub async fn analyze(ctx: &CommandContext, path: &Path) -> Result<()> {
    let image = load_image(path)?;
    let client = ctx.authed_client()?;

    let progress = spinner("Analyzing photo (extracting traits, scoring)...");
    let result = client.analyze(&image).await;
    progress.finish_and_clear();
    let result = result.context("Analysis failed")?;

    if ctx.json {
        return ctx.print_json(&result);
    }
    print!("{}", ctx.renderer().scorecard(&result));
    Ok(())
}

pub async fn history(ctx: &CommandContext, limit: Option<usize>) -> Result<()> {
    let mut records = ctx
        .authed_client()?
        .history()
        .await
        .context("Failed to load history")?;
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    if ctx.json {
        return ctx.print_json(&records);
    }
    print!("{}", ctx.renderer().history(&records));
    Ok(())
}

pub async fn clear_history(ctx: &CommandContext, yes: bool) -> Result<()> {
    let client = ctx.authed_client()?;

    if !yes {
        let answer = prompt("Delete all of your analysis history? [y/N]")?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let response = client.clear_history().await.context("Failed to clear history")?;
    if ctx.json {
        return ctx.print_json(&response);
    }
    println!("Removed {} records.", response.cleared);
    Ok(())
}

pub async fn relevant(ctx: &CommandContext, animal_type: String, score: f64, traits: &[String]) -> Result<()> {
    let request = RelevantTraitsRequest {
        animal_type,
        atc_score: score,
        trait_data: parse_traits(traits)?,
    };

    let client = ctx.authed_client()?;
    let progress = spinner("Asking which traits matter most...");
    let response = client.relevant_traits(&request).await;
    progress.finish_and_clear();
    let response = response.context("Relevant-traits request failed")?;

    if ctx.json {
        return ctx.print_json(&response);
    }
    print!("{}", ctx.renderer().relevant_traits(&response.relevant_traits));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_hidden_line_editing() {
        let mut line = String::new();
        for c in "secrex".chars() {
            assert_eq!(apply_key(&mut line, press(KeyCode::Char(c))), KeyOutcome::Continue);
        }
        apply_key(&mut line, press(KeyCode::Backspace));
        apply_key(&mut line, press(KeyCode::Char('t')));
        apply_key(&mut line, press(KeyCode::Char('1')));
        apply_key(&mut line, press(KeyCode::Left));

        assert_eq!(apply_key(&mut line, press(KeyCode::Enter)), KeyOutcome::Done);
        assert_eq!(line, "secret1");
    }

    #[test]
    fn test_hidden_line_cancel() {
        let mut line = String::from("abc");
        assert_eq!(
            apply_key(&mut line, KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            KeyOutcome::Cancelled
        );
        assert_eq!(apply_key(&mut line, press(KeyCode::Esc)), KeyOutcome::Cancelled);
        assert_eq!(line, "abc");
    }

    #[test]
    fn test_key_release_is_ignored() {
        let mut line = String::new();
        let mut release = press(KeyCode::Char('x'));
        release.kind = KeyEventKind::Release;
        assert_eq!(apply_key(&mut line, release), KeyOutcome::Continue);
        assert!(line.is_empty());
    }

    #[test]
    fn test_parse_traits() {
        let args = vec!["bodyLength=150".to_string(), " rumpAngle = 11.5".to_string()];
        let traits = parse_traits(&args).unwrap();
        assert_eq!(traits.get("bodyLength"), Some(&150.0));
        assert_eq!(traits.get("rumpAngle"), Some(&11.5));
    }

    #[test]
    fn test_parse_traits_rejects_malformed() {
        assert!(parse_traits(&["bodyLength".to_string()]).is_err());
        assert!(parse_traits(&["=3".to_string()]).is_err());
        assert!(parse_traits(&["bodyLength=long".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_authed_commands_need_session() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = CommandContext {
            server: "http://127.0.0.1:9".to_string(),
            json: true,
            session_file: SessionFile::new(dir.path().join("session.json")),
        };

        let err = history(&ctx, None).await.unwrap_err();
        assert_eq!(crate::errors::exit_code_for(&err), crate::errors::EXIT_NOT_AUTHENTICATED);
    }
}
