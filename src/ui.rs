use clap::Parser;
use std::path::PathBuf;
use toml::Table;

use crate::alloc::FitStrategy;
use crate::sim::config::{CacheLevelConfig, Config, MemConfig, SimConfig};
use crate::sim::top::Sim;

#[derive(Parser)]
#[command(version, about)]
pub struct MemsimArgs {
    #[arg(help = "Path to config.toml")]
    pub config_path: Option<PathBuf>,
    #[arg(long, help = "Override total memory size in bytes")]
    pub total_size: Option<u64>,
    #[arg(long, help = "Override fit strategy (first_fit, best_fit, worst_fit)")]
    pub strategy: Option<FitStrategy>,
    #[arg(long, help = "Enable log at level (0:warn, 1:info, 2:debug)")]
    pub log: Option<u64>,
    #[arg(long, help = "Write a JSON stats summary to this path on exit")]
    pub stats_json: Option<PathBuf>,
}

/// Build a Sim from the TOML configuration. Sections are optional: a
/// missing `[mem]` starts the console uninitialized, and cache levels stay
/// unconfigured unless `[l1]`/`[l2]` give them a nonzero size.
/// If `cli_args` is given, override TOML options with CLI arguments.
pub fn make_sim(toml_string: &str, cli_args: Option<MemsimArgs>) -> (Sim, SimConfig) {
    let config_table: Table = toml::from_str(toml_string).expect("cannot parse config toml");
    let mut sim_config = config_table
        .get("sim")
        .map(|v| SimConfig::from_section(Some(v)))
        .unwrap_or_default();
    let mut mem_config = config_table
        .get("mem")
        .map(|v| MemConfig::from_section(Some(v)));
    let l1_config = config_table
        .get("l1")
        .map(|v| CacheLevelConfig::from_section(Some(v)))
        .unwrap_or_default();
    let l2_config = config_table
        .get("l2")
        .map(|v| CacheLevelConfig::from_section(Some(v)))
        .unwrap_or_default();

    // override toml configs with CLI args
    if let Some(args) = cli_args {
        sim_config.log_level = args.log.unwrap_or(sim_config.log_level);
        sim_config.stats_json = args.stats_json.or(sim_config.stats_json);
        if let Some(total_size) = args.total_size {
            let mut mem = mem_config.unwrap_or_default();
            mem.total_size = total_size;
            mem_config = Some(mem);
        }
        if let Some(strategy) = args.strategy {
            let mut mem = mem_config.unwrap_or_default();
            mem.strategy = strategy;
            mem_config = Some(mem);
        }
    }

    let sim = Sim::from_configs(mem_config, l1_config, l2_config)
        .expect("cannot apply cache config");
    (sim, sim_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LevelId;

    #[test]
    fn empty_config_starts_uninitialized() {
        let (sim, sim_config) = make_sim("", None);
        assert!(sim.memory.is_none());
        assert!(!sim.hierarchy.level(LevelId::L1).is_configured());
        assert!(sim_config.stats_json.is_none());
    }

    #[test]
    fn sections_preconfigure_the_session() {
        let toml_string = r#"
            [mem]
            total_size = 4096
            strategy = "worst_fit"

            [l1]
            cache_size = 64
            block_size = 16
            associativity = 2
        "#;
        let (sim, _) = make_sim(toml_string, None);
        let memory = sim.memory.as_ref().unwrap();
        assert_eq!(memory.total_size(), 4096);
        assert_eq!(memory.strategy(), FitStrategy::WorstFit);
        assert!(sim.hierarchy.level(LevelId::L1).is_configured());
        assert!(!sim.hierarchy.level(LevelId::L2).is_configured());
    }

    #[test]
    fn cli_args_override_toml() {
        let toml_string = r#"
            [mem]
            total_size = 4096
        "#;
        let args = MemsimArgs {
            config_path: None,
            total_size: Some(128),
            strategy: Some(FitStrategy::BestFit),
            log: None,
            stats_json: None,
        };
        let (sim, _) = make_sim(toml_string, Some(args));
        let memory = sim.memory.as_ref().unwrap();
        assert_eq!(memory.total_size(), 128);
        assert_eq!(memory.strategy(), FitStrategy::BestFit);
    }
}
