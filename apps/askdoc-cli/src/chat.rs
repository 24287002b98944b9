use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use askdoc_core::config::expand_path;
use askdoc_rag::Pipeline;

use crate::output::{print_answer, print_cost, print_ingest};

#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    Quit,
    Help,
    Load(PathBuf),
    Cost(PathBuf),
    Ask(String),
    Nothing,
}

pub fn parse_line(line: &str) -> ChatCommand {
    let line = line.trim();
    match line {
        "" => ChatCommand::Nothing,
        "quit" | "exit" | ":q" => ChatCommand::Quit,
        "help" | "?" => ChatCommand::Help,
        _ => {
            if let Some(path) = path_argument(line, "load ") {
                ChatCommand::Load(path)
            } else if let Some(path) = path_argument(line, "cost ") {
                ChatCommand::Cost(path)
            } else {
                ChatCommand::Ask(line.to_string())
            }
        }
    }
}

fn path_argument(line: &str, command: &str) -> Option<PathBuf> {
    let rest = line.strip_prefix(command)?.trim();
    (!rest.is_empty()).then(|| expand_path(rest))
}

fn print_help() {
    println!("Commands:");
    println!("  load <path>   ingest a .pdf or .docx file");
    println!("  cost <path>   estimate the embedding cost of a file without indexing it");
    println!("  help          show this message");
    println!("  quit          leave the chat");
    println!("Anything else is asked as a question about the loaded document.");
}

fn load(pipeline: &mut Pipeline, path: &Path) {
    match pipeline.ingest(path) {
        Ok(report) => print_ingest(&report),
        Err(err) => eprintln!("❌ {err}"),
    }
}

/// Read-eval loop on stdin; errors on individual lines are reported and the loop continues.
pub fn run(pipeline: &mut Pipeline, file: Option<&Path>) -> Result<()> {
    match file {
        Some(path) => load(pipeline, path),
        None if pipeline.resume()? => println!("Using existing index '{}'.", pipeline.options().index_name),
        None => println!("No document loaded yet. Use `load <path>`."),
    }
    print_help();

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("\n> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match parse_line(&line) {
            ChatCommand::Quit => break,
            ChatCommand::Help => print_help(),
            ChatCommand::Nothing => {}
            ChatCommand::Load(path) => load(pipeline, &path),
            ChatCommand::Cost(path) => match pipeline.estimate(&path) {
                Ok(report) => print_cost(report.chunks, &report.cost),
                Err(err) => eprintln!("❌ {err}"),
            },
            ChatCommand::Ask(question) => match pipeline.answer(&question) {
                Ok(answer) => print_answer(&answer),
                Err(err) => eprintln!("❌ {err}"),
            },
        }
    }
    Ok(())
}
