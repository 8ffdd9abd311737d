//! Offline, deterministic argument parsing for the demonstration CLI.
//!
//! There is no manifest format here — the whole program is the hard-coded
//! one built by [`crate::demo`]; these flags only pick which query to run
//! against it and how chatty to be about the run.

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "ground",
    about = "Grounds a query against a small hard-coded probabilistic-logic program"
)]
pub struct Args {
    /// Functor of the query goal, e.g. `grandparent`.
    #[arg(long, default_value = "grandparent")]
    pub functor: String,

    /// Query arguments, in order. `_` (repeatable) stands for an unbound
    /// variable; anything else is read as an atom.
    #[arg(long = "arg", num_args = 0..)]
    pub args: Vec<String>,

    /// Fail silently (zero solutions) instead of erroring on an
    /// undefined predicate.
    #[arg(long)]
    pub unknown_fails: bool,

    /// Attach a name to every ground node the query derives, not just the
    /// ones reachable from its own proofs.
    #[arg(long)]
    pub label_all: bool,

    /// Raise the tracing verbosity (`-v` debug, `-vv` trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print the full ground formula (every gate derived), not just the
    /// query's own solutions.
    #[arg(long)]
    pub dump_formula: bool,
}

pub fn parse() -> Args {
    Args::parse()
}
