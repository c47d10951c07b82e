//! Line-oriented prompt for editing a selection tree.

use std::io::{BufRead, Write};
use std::path::Path;

use colored::Colorize;
use tracing::warn;

use super::tree::{NodeState, SelectionTree};
use super::SelectionError;

/// How the user left the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOutcome {
    Confirmed,
    Aborted,
}

const HELP: &str = "\
commands:
  ls [dir]      list entries (default: root)
  t <path>      toggle a file, or fully toggle a directory
  r <path>      toggle a directory and reset choices below it
  status        show selection totals
  done          accept the selection and continue
  quit          abort without analyzing";

/// Run the prompt until `done`, `quit` or end of input (which confirms).
pub fn run<R: BufRead, W: Write>(
    tree: &mut SelectionTree,
    mut input: R,
    out: &mut W,
) -> anyhow::Result<MenuOutcome> {
    writeln!(out, "{}", "Select files to analyze (type 'help' for commands)".bold())?;
    list(tree, Path::new(""), out)?;

    let mut line = String::new();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(MenuOutcome::Confirmed);
        }

        let trimmed = line.trim();
        let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (trimmed, ""),
        };

        match cmd {
            "" => {}
            "ls" => {
                if !arg.is_empty() {
                    if let Err(e) = tree.expand(arg) {
                        report_warning(out, &e)?;
                        continue;
                    }
                }
                list(tree, Path::new(arg), out)?;
            }
            "t" | "toggle" | "r" | "recursive" if arg.is_empty() => {
                writeln!(out, "usage: {} <path>", cmd)?;
            }
            "t" | "toggle" => apply(tree.toggle(arg), arg, out)?,
            "r" | "recursive" => apply(tree.toggle_recursive(arg), arg, out)?,
            "status" => {
                let counts = tree.counts();
                writeln!(
                    out,
                    "{} files included, {} excluded, {} partial directories",
                    counts.included_files, counts.excluded_files, counts.partial_dirs
                )?;
            }
            "help" | "?" => writeln!(out, "{}", HELP)?,
            "done" | "d" => return Ok(MenuOutcome::Confirmed),
            "quit" | "q" | "exit" => return Ok(MenuOutcome::Aborted),
            other => writeln!(out, "unknown command '{}', type 'help'", other)?,
        }
    }
}

fn apply<W: Write>(
    result: Result<NodeState, SelectionError>,
    arg: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    match result {
        Ok(state) => writeln!(out, "{} {}", colored_marker(state), arg)?,
        Err(e) => report_warning(out, &e)?,
    }
    Ok(())
}

fn report_warning<W: Write>(out: &mut W, err: &SelectionError) -> anyhow::Result<()> {
    warn!(error = %err, "selection command ignored");
    writeln!(out, "{} {}", "warning:".yellow(), err)?;
    Ok(())
}

fn list<W: Write>(tree: &SelectionTree, dir: &Path, out: &mut W) -> anyhow::Result<()> {
    let node = match tree.node(dir) {
        Some(n) => n,
        None => {
            writeln!(out, "{} no such path: {}", "warning:".yellow(), dir.display())?;
            return Ok(());
        }
    };
    if !node.is_dir() {
        writeln!(out, "{} {}", colored_marker(node.state()), dir.display())?;
        return Ok(());
    }

    for child in tree.children(dir) {
        let mut name = child.name();
        if child.is_dir() {
            name.push('/');
        }
        let explicit = if child.is_explicit() { " *" } else { "" };
        writeln!(out, "  {} {}{}", colored_marker(child.state()), name, explicit)?;
    }
    if node.is_dir() && !node.is_loaded() {
        writeln!(out, "  (not expanded; excluded by default)")?;
    }
    Ok(())
}

fn colored_marker(state: NodeState) -> colored::ColoredString {
    match state {
        NodeState::Included => state.marker().green(),
        NodeState::Excluded => state.marker().red(),
        NodeState::Partial => state.marker().yellow(),
    }
}
