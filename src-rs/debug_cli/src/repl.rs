use std::io;
use std::thread;

use crate::client::HTTPClient;
use crate::models::CLIConfig;
use crate::render;

pub struct REPL {
    pub config: CLIConfig,
    pub client: HTTPClient,
}

impl REPL {
    pub fn new(config: CLIConfig, client: HTTPClient) -> Self {
        Self { config, client }
    }

    pub fn run(&mut self) {
        render::banner(&self.config);
        loop {
            render::prompt();
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('/') {
                if self.handle_command(&line) {
                    break;
                }
                continue;
            }
            self.generate(&line);
        }
    }

    fn handle_command(&mut self, line: &str) -> bool {
        let (cmd, rest) = split_command(line);
        match cmd {
            "exit" | "quit" => return true,
            "help" => render::help(),
            "status" => match self.client.status(rest) {
                Ok(status) => {
                    render::progress(&status);
                    if status.is_terminal() {
                        render::outcome(&status, self.config.verbose);
                    }
                }
                Err(err) => render::error(&err),
            },
            "tasks" => {
                let limit = rest.parse::<usize>().unwrap_or(10);
                match self.client.list_tasks(limit) {
                    Ok(tasks) => render::tasks(&tasks),
                    Err(err) => render::error(&err),
                }
            }
            "cancel" => match self.client.cancel(rest) {
                Ok(resp) if resp.cancelled => render::info("cancellation requested"),
                Ok(_) => render::info("task already finished"),
                Err(err) => render::error(&err),
            },
            "diagram" => self.download(rest),
            "verbose" => {
                if rest.is_empty() {
                    self.config.verbose = !self.config.verbose;
                    render::info(&format!("verbose: {}", self.config.verbose));
                } else if let Some(flag) = parse_on_off(rest) {
                    self.config.verbose = flag;
                    render::info(&format!("verbose: {}", self.config.verbose));
                } else {
                    render::error("invalid verbose flag");
                }
            }
            "config" => render::config(&self.config),
            "base" => {
                if rest.is_empty() {
                    render::info(&format!("base: {}", self.config.base_url));
                } else {
                    match HTTPClient::new(rest) {
                        Ok(client) => {
                            self.config.base_url = rest.to_string();
                            self.client = client;
                            render::info("base url updated");
                        }
                        Err(err) => render::error(&err),
                    }
                }
            }
            _ => render::info("unknown command, type /help"),
        }
        false
    }

    /// Submits `requirements` and follows the task until it finishes.
    fn generate(&self, requirements: &str) {
        let task_id = match self.client.start(requirements) {
            Ok(resp) => resp.task_id,
            Err(err) => {
                render::error(&err);
                return;
            }
        };
        render::info(&format!("task {}", task_id));

        let mut last = None;
        loop {
            let status = match self.client.status(&task_id) {
                Ok(status) => status,
                Err(err) => {
                    render::error(&err);
                    return;
                }
            };
            let seen = (status.progress, status.message.clone());
            if last.as_ref() != Some(&seen) {
                render::progress(&status);
                last = Some(seen);
            }
            if status.is_terminal() {
                render::outcome(&status, self.config.verbose);
                return;
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    fn download(&self, rest: &str) {
        let mut parts = rest.split_whitespace();
        let (Some(id), Some(file)) = (parts.next(), parts.next()) else {
            render::error("usage: /diagram <id> <file>");
            return;
        };
        match self.client.diagram(id) {
            Ok(bytes) => match std::fs::write(file, &bytes) {
                Ok(()) => render::info(&format!("wrote {} bytes to {}", bytes.len(), file)),
                Err(err) => render::error(&err.to_string()),
            },
            Err(err) => render::error(&err),
        }
    }
}

fn split_command(line: &str) -> (&str, &str) {
    let mut parts = line.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("").trim_start_matches('/');
    let rest = parts.next().unwrap_or("").trim();
    (cmd, rest)
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
