//! Operator console – inspects and edits the live object tree.
//!
//! Supported slash-commands:
//!   /help                         – show this list
//!   /get <path>                   – show one object
//!   /tree [path]                  – show a subtree (all roots by default)
//!   /add <parent> <doc | @file>   – attach a description document
//!   /remove <parent> <name>       – remove a child subtree
//!   /reset <path>                 – remove every child of an object
//!   /schema                       – print the description JSON Schema
//!   /quit | /exit                 – stop the daemon
//!
//! Mutations go through the [`Dispatcher`], exactly like remote calls.

use colored::Colorize;
use std::fs;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use frusvc_description::description_schema;
use frusvc_service::{Call, Dispatcher, Reply, Request};
use frusvc_types::{ObjectSnapshot, path};
use tokio::sync::watch;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Get(String),
    Tree(Option<String>),
    Add { parent: String, document: String },
    Remove { parent: String, name: String },
    Reset(String),
    Schema,
    Quit,
}

/// Read commands from stdin until `/quit`, EOF, or shutdown.
///
/// Leaving the console signals `stop`, which shuts the daemon down.
pub fn run(dispatcher: Arc<Dispatcher>, stop: Arc<watch::Sender<bool>>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if *stop.borrow() {
            break;
        }

        print!("{} ", "frusvc>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_command(line) {
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                break;
            }
            Ok(Command::Help) => cmd_help(),
            Ok(cmd) => match execute(&dispatcher, cmd) {
                Ok(out) => println!("{out}"),
                Err(e) => println!("{} {}", "✗".red().bold(), e),
            },
            Err(e) => println!("{} {}", "✗".red().bold(), e),
        }
    }

    stop.send_replace(true);
}

/// Parse one console line.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };
    let mut args = rest.split_whitespace();

    match cmd {
        "/help" => Ok(Command::Help),
        "/quit" | "/exit" => Ok(Command::Quit),
        "/schema" => Ok(Command::Schema),
        "/get" => match args.next() {
            Some(path) => Ok(Command::Get(path.to_string())),
            None => Err("usage: /get <path>".to_string()),
        },
        "/tree" => Ok(Command::Tree(args.next().map(String::from))),
        "/reset" => match args.next() {
            Some(path) => Ok(Command::Reset(path.to_string())),
            None => Err("usage: /reset <path>".to_string()),
        },
        "/remove" => match (args.next(), args.next()) {
            (Some(parent), Some(name)) => Ok(Command::Remove {
                parent: parent.to_string(),
                name: name.to_string(),
            }),
            _ => Err("usage: /remove <parent> <name>".to_string()),
        },
        "/add" => {
            let (parent, document) = rest
                .split_once(char::is_whitespace)
                .map(|(p, d)| (p, d.trim()))
                .unwrap_or((rest, ""));
            if parent.is_empty() || document.is_empty() {
                return Err("usage: /add <parent> <document | @file>".to_string());
            }
            Ok(Command::Add {
                parent: parent.to_string(),
                document: document.to_string(),
            })
        }
        other => Err(format!(
            "Unknown command '{}'. Type {} for available commands.",
            other,
            "/help".bold()
        )),
    }
}

/// Run a command and render its output.
pub fn execute(dispatcher: &Dispatcher, cmd: Command) -> Result<String, String> {
    match cmd {
        Command::Help | Command::Quit => Ok(String::new()),
        Command::Schema => serde_json::to_string_pretty(&description_schema())
            .map_err(|e| format!("schema encoding failed: {e}")),
        Command::Get(path) => {
            let snapshot = call(dispatcher, Call::GetObject { path })?
                .ok_or_else(|| "no object returned".to_string())?;
            Ok(render_object(&snapshot))
        }
        Command::Tree(path) => {
            let service = dispatcher.service();
            let starts = match path {
                Some(p) => vec![p],
                None => service.root_paths().map_err(|e| e.to_string())?,
            };
            let mut out = Vec::new();
            for start in starts {
                let nodes = service.subtree(&start).map_err(|e| e.to_string())?;
                out.extend(render_tree(&start, &nodes));
            }
            Ok(out.join("\n"))
        }
        Command::Add { parent, document } => {
            let description = match document.strip_prefix('@') {
                Some(file) => fs::read_to_string(file)
                    .map_err(|e| format!("cannot read {file}: {e}"))?,
                None => document,
            };
            let target = parent.clone();
            call(
                dispatcher,
                Call::AddFru {
                    parent_path: parent,
                    description,
                },
            )?;
            Ok(format!("{} attached under {}", "✓".green(), target.bold()))
        }
        Command::Remove { parent, name } => {
            let target = path::join(&parent, &name);
            call(
                dispatcher,
                Call::RemoveFru {
                    parent_path: parent,
                    name,
                },
            )?;
            Ok(format!("{} removed {}", "✓".green(), target.bold()))
        }
        Command::Reset(path) => {
            let target = path.clone();
            call(dispatcher, Call::ResetTree { path })?;
            Ok(format!("{} reset {}", "✓".green(), target.bold()))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn call(dispatcher: &Dispatcher, call: Call) -> Result<Option<ObjectSnapshot>, String> {
    match dispatcher.handle(Request::new(call)).reply {
        Reply::Ok { object } => Ok(object),
        Reply::Fault(fault) => Err(format!("{}: {}", fault.kind, fault.message)),
    }
}

fn render_object(snapshot: &ObjectSnapshot) -> String {
    let mut out = vec![snapshot.path.bold().to_string()];
    for (key, value) in &snapshot.properties {
        out.push(format!("  {} = {}", key.cyan(), value));
    }
    if snapshot.children.is_empty() {
        out.push(format!("  {}", "(no children)".dimmed()));
    } else {
        out.push(format!("  children: {}", snapshot.children.join(", ")));
    }
    out.join("\n")
}

/// One line per node, indented by depth below `start`.
fn render_tree(start: &str, nodes: &[ObjectSnapshot]) -> Vec<String> {
    let base = start.matches('/').count();
    nodes
        .iter()
        .map(|node| {
            let depth = node.path.matches('/').count().saturating_sub(base);
            let label = if depth == 0 {
                node.path.as_str()
            } else {
                node.path.rsplit('/').next().unwrap_or(&node.path)
            };
            let props: Vec<String> = node
                .properties
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            if props.is_empty() {
                format!("{}{}", "  ".repeat(depth), label)
            } else {
                format!(
                    "{}{}  {}",
                    "  ".repeat(depth),
                    label,
                    format!("{{{}}}", props.join(", ")).dimmed()
                )
            }
        })
        .collect()
}

fn cmd_help() {
    println!();
    println!("{}", "FRU Service Commands".bold().underline());
    println!("  {}                   – show one object", "/get <path>".bold().cyan());
    println!("  {}                 – show a subtree", "/tree [path]".bold().cyan());
    println!("  {}   – attach a description document", "/add <parent> <doc|@file>".bold().cyan());
    println!("  {}       – remove a child subtree", "/remove <parent> <name>".bold().cyan());
    println!("  {}                 – remove every child of an object", "/reset <path>".bold().cyan());
    println!("  {}                      – print the description JSON Schema", "/schema".bold().cyan());
    println!("  {}                – stop the daemon", "/quit  /exit".bold().cyan());
    println!();
}
