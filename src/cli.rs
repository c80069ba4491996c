use crate::config::load_config;
use crate::interaction::ViewEvent;
use crate::ir::Diagram;
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::session::Session;
use crate::state::ViewState;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "blockview", version, about = "Lay out a block-and-interface diagram and dump the view as JSON")]
pub struct Args {
    /// Diagram JSON file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config file (JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Saved view state (JSON)
    #[arg(short = 's', long = "state")]
    pub state: Option<PathBuf>,

    /// Expand a node; repeatable
    #[arg(long = "expand")]
    pub expand: Vec<String>,

    /// Expand every node with children
    #[arg(long = "expand-all")]
    pub expand_all: bool,

    /// Focus on a node's subtree
    #[arg(long = "focus", conflicts_with = "connection_focus")]
    pub focus: Option<String>,

    /// Show a node together with everything it connects to
    #[arg(long = "connection-focus")]
    pub connection_focus: Option<String>,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let input = read_input(args.input.as_deref())?;
    let diagram = Diagram::from_json(&input).context("reading diagram")?;

    let mut state = match &args.state {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<ViewState>(&raw).with_context(|| format!("parsing {}", path.display()))?
        }
        None => ViewState::default(),
    };

    let mut session = Session::open(diagram, config)?;
    if args.expand_all {
        state.expanded.extend(session.index().containers());
    }
    for id in &args.expand {
        if !session.index().has_children(id) {
            log::warn!("--expand {id}: no such node with children");
        }
        state.expanded.insert(id.clone());
    }
    session.restore(state);

    if let Some(id) = args.focus {
        session.dispatch(ViewEvent::SetFocus(Some(id)));
    }
    if let Some(id) = args.connection_focus {
        session.dispatch(ViewEvent::EnterConnectionFocus(id));
    }

    let dump = LayoutDump::from_view(session.layout(), session.diagram(), session.index(), session.state());
    log::info!("{} blocks, {} edges laid out", dump.nodes.len(), dump.edges.len());
    write_layout_dump(args.output.as_deref(), &dump)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeatable_expand_flags() {
        let args = Args::parse_from(["blockview", "-i", "model.json", "--expand", "a", "--expand", "b", "--focus", "a"]);
        assert_eq!(args.expand, vec!["a", "b"]);
        assert_eq!(args.focus.as_deref(), Some("a"));
        assert!(!args.expand_all);
    }

    #[test]
    fn focus_modes_conflict() {
        let parsed = Args::try_parse_from(["blockview", "--focus", "a", "--connection-focus", "b"]);
        assert!(parsed.is_err());
    }
}
