// crates/ground_cli/src/main.rs
//
// Offline demonstration CLI for the grounding engine.
// Builds a small hard-coded program and grounds one query against it.

mod args;
mod demo;

use std::process::ExitCode;

use args::Args;
use ground_core::Term;
use ground_io::GroundFormula;
use ground_pipeline::{call, EngineConfig, UnknownPolicy};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ground: error: {e}");
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let db = demo::build();
    let query_args = parse_terms(&args.args);

    let config = EngineConfig {
        unknown: if args.unknown_fails { UnknownPolicy::Fail } else { UnknownPolicy::Error },
        label_all: args.label_all,
        trace: args.verbose >= 2,
        debug: args.verbose >= 1,
    };

    let mut formula = GroundFormula::new();
    let results = call(&db, &mut formula, config, &args.functor, query_args.len(), query_args)?;

    if results.is_empty() {
        println!("ground: no solutions for {}/{}", args.functor, args.args.len());
    } else {
        println!("ground: {} solution(s) for {}:", results.len(), args.functor);
        for (ctx, node) in &results {
            let bindings: Vec<String> = ctx.iter().map(|t| t.to_string()).collect();
            println!("  {}({}) = {}", args.functor, bindings.join(", "), formula.describe(*node));
        }
    }

    if args.dump_formula {
        println!("ground: {} ground node(s) derived", formula.len());
        for (name, node, label) in formula.names() {
            println!("  {name} [{label:?}] = {}", formula.describe(node));
        }
    }

    Ok(ExitCode::from(0))
}

/// `_` becomes a fresh unbound variable; anything else is read as an atom.
/// Never fails — any string is a valid atom name.
fn parse_terms(raw: &[String]) -> Vec<Term> {
    raw.iter()
        .map(|s| if s == "_" { Term::var() } else { Term::atom(s.clone()) })
        .collect()
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

