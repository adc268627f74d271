use std::fs;
use std::io::{self, BufRead, Write};

use clap::Parser;
use memsim::sim::console::{self, Command};
use memsim::ui::{make_sim, MemsimArgs};

fn init_logging(level: u64) {
    let default = match level {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

pub fn main() -> anyhow::Result<()> {
    let argv = MemsimArgs::parse();
    let toml_string = match &argv.config_path {
        Some(path) => fs::read_to_string(path).unwrap_or_else(|err| {
            eprintln!("failed to read config file: {}", err);
            std::process::exit(1);
        }),
        None => String::new(),
    };

    let (mut sim, sim_config) = make_sim(&toml_string, Some(argv));
    init_logging(sim_config.log_level);

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match console::parse(&line) {
            Ok(None) => {}
            Ok(Some(Command::Exit)) => break,
            Ok(Some(command)) => println!("{}", console::dispatch(&mut sim, &command)),
            Err(message) => println!("{}", message),
        }
    }

    if let Some(path) = &sim_config.stats_json {
        sim.write_summary(path)?;
    }
    Ok(())
}
