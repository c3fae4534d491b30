use std::process::{Child, Command, ExitStatus, Stdio};

use anyhow::{anyhow, Context, Result};

pub const URL_PLACEHOLDER: &str = "%URL%";
pub const TITLE_PLACEHOLDER: &str = "%TITLE%";

pub struct LaunchOptions<'a> {
    pub command: &'a [String],
    pub url: &'a str,
    pub title: &'a str,
}

/// A running external player. The process is killed when the session is
/// stopped or dropped.
pub struct PlayerSession {
    child: Option<Child>,
    url: String,
}

impl PlayerSession {
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    pub fn stop(mut self) -> Option<ExitStatus> {
        self.kill()
    }

    fn kill(&mut self) -> Option<ExitStatus> {
        let mut child = self.child.take()?;
        if let Ok(Some(status)) = child.try_wait() {
            return Some(status);
        }
        let _ = child.kill();
        let status = child.wait().ok();
        tracing::debug!(url = %self.url, ?status, "stopped external player");
        status
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Expands the placeholders of a command template. A template without
/// `%URL%` gets the url appended as the last argument.
pub fn build_args(template: &[String], url: &str, title: &str) -> Result<(String, Vec<String>)> {
    let (program, rest) = template
        .split_first()
        .ok_or_else(|| anyhow!("player command is empty"))?;
    if program.trim().is_empty() {
        return Err(anyhow!("player command is empty"));
    }

    let mut saw_url = false;
    let mut args: Vec<String> = rest
        .iter()
        .map(|arg| {
            if arg.contains(URL_PLACEHOLDER) {
                saw_url = true;
            }
            arg.replace(URL_PLACEHOLDER, url)
                .replace(TITLE_PLACEHOLDER, title)
        })
        .collect();
    if !saw_url {
        args.push(url.to_string());
    }
    Ok((program.clone(), args))
}

pub fn spawn(opts: LaunchOptions<'_>) -> Result<PlayerSession> {
    if opts.url.trim().is_empty() {
        return Err(anyhow!("video URL missing"));
    }

    let (program, args) = build_args(opts.command, opts.url, opts.title)?;
    let mut command = Command::new(&program);
    command.args(&args);
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());
    let child = command
        .spawn()
        .with_context(|| format!("launch {program} to play {}", opts.url))?;
    tracing::info!(%program, url = opts.url, pid = child.id(), "launched external player");

    Ok(PlayerSession {
        child: Some(child),
        url: opts.url.to_string(),
    })
}
