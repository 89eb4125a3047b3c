//! Runs a mock script outside the server.
//!
//! Usage:
//!   mokapi-script <file.js>          # Run a script until its jobs are done
//!   mokapi-script -e "code"          # Evaluate a snippet and print the result
//!
//! `RUST_LOG` controls logging, `MOKAPI_SEED` makes generated data
//! reproducible.

use std::env;
use std::path::Path;
use std::process;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use mokapi_engine::config::RuntimeConfig;
use mokapi_engine::runtime::ScriptRuntime;
use serde_json::Value;

const IDLE_POLL: Duration = Duration::from_millis(500);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let outcome = match args.len() {
        2 if args[1] == "-h" || args[1] == "--help" => {
            print_usage();
            return;
        }
        2 => run_file(Path::new(&args[1])),
        3 if args[1] == "-e" || args[1] == "--eval" => eval_code(&args[2]),
        _ => {
            print_usage();
            process::exit(1);
        }
    };
    if let Err(e) = outcome {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn print_usage() {
    eprintln!("mokapi-script - run mock scripts");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  mokapi-script <file.js>         Run a script until its jobs are done");
    eprintln!("  mokapi-script -e \"code\"         Evaluate code and print the result");
    eprintln!("  mokapi-script --eval \"code\"     Evaluate code and print the result");
}

fn run_file(path: &Path) -> Result<()> {
    let path = path
        .canonicalize()
        .with_context(|| format!("cannot open {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("invalid script path {}", path.display()))?
        .to_string();
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let config = RuntimeConfig::from_env().with_script_name(name).with_working_dir(dir);
    let (runtime, host) = ScriptRuntime::with_default_host(config)?;

    let result = runtime.run_main(&path)?;
    print_value(&result);

    runtime.start();
    loop {
        let idle = runtime.wait_idle(IDLE_POLL);
        if idle && host.scheduler().jobs().is_empty() {
            break;
        }
    }
    host.close();
    runtime.stop();
    Ok(())
}

fn eval_code(code: &str) -> Result<()> {
    let (runtime, _host) = ScriptRuntime::with_default_host(RuntimeConfig::from_env())?;
    runtime.start();
    let result = runtime.eval(code)?;
    print_value(&result);
    runtime.stop();
    Ok(())
}

fn print_value(value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => println!("{}", s),
        other => match serde_json::to_string_pretty(other) {
            Ok(s) => println!("{}", s),
            Err(e) => log::warn!("cannot print result: {}", e),
        },
    }
}
