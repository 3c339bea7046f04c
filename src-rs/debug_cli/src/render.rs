use std::io::{self, Write};

use crate::models::{CLIConfig, ResultData, TaskStatus};

const TEMPLATE_PREVIEW_LINES: usize = 20;

pub fn banner(cfg: &CLIConfig) {
    println!("archgen debug CLI");
    println!("API: {}", cfg.base_url);
    println!("Describe an architecture to generate it. Type /help for commands.");
}

pub fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

pub fn help() {
    println!("Commands:");
    println!("  /help                    Show commands");
    println!("  /exit | /quit            Exit");
    println!("  /status <task_id>        Show a task");
    println!("  /tasks [limit]           List recent tasks");
    println!("  /cancel <task_id>        Cancel a running task");
    println!("  /diagram <id> <file>     Download a diagram");
    println!("  /verbose [on|off]        Toggle full template output");
    println!("  /config                  Show current config");
    println!("  /base <url>              Update base URL");
    println!("Any other line is submitted as requirements.");
}

pub fn progress(status: &TaskStatus) {
    println!("[{:>3}%] {:<10} {}", status.progress, status.status, status.message);
}

pub fn outcome(status: &TaskStatus, verbose: bool) {
    if let Some(err) = &status.error {
        println!("failed: {}", err);
        return;
    }
    match &status.data {
        Some(data) => result(data, verbose),
        None => println!("{} finished without a result", status.task_id),
    }
}

fn result(data: &ResultData, verbose: bool) {
    println!("--- template ---");
    let lines: Vec<&str> = data.template.lines().collect();
    let shown = if verbose {
        lines.len()
    } else {
        lines.len().min(TEMPLATE_PREVIEW_LINES)
    };
    for line in &lines[..shown] {
        println!("{}", line);
    }
    if shown < lines.len() {
        println!("... ({} more lines, /verbose to show all)", lines.len() - shown);
    }

    let pricing = &data.pricing;
    println!("--- pricing ({}, {}) ---", pricing.currency, pricing.region);
    for item in &pricing.breakdown {
        println!("  {:<30} {:>10.2}", item.service, item.cost);
    }
    println!(
        "  monthly {:.2}  annual {:.2}{}",
        pricing.total_monthly,
        pricing.annual,
        if pricing.estimated { "  (estimated)" } else { "" }
    );
    println!("diagram: {} ({})", data.diagram_id, data.diagram_url);
}

pub fn tasks(tasks: &[TaskStatus]) {
    if tasks.is_empty() {
        println!("no tasks");
        return;
    }
    for task in tasks {
        println!("[{:>9}] {} {:>3}% {}", task.status, task.task_id, task.progress, task.message);
    }
}

pub fn config(cfg: &CLIConfig) {
    println!("config:");
    println!("  base: {}", cfg.base_url);
    println!("  poll: {}ms", cfg.poll_interval.as_millis());
    println!("  verbose: {}", cfg.verbose);
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn error(msg: &str) {
    eprintln!("error: {}", msg);
}
