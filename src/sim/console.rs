use std::fmt::Write as _;

use log::debug;

use crate::alloc::{BlockId, FitStrategy, PhysicalMemory, RegionKind};
use crate::cache::{AccessError, LevelId};
use crate::sim::top::Sim;

/// A parsed console command. Every variant maps onto one core operation;
/// the console itself holds no allocation or cache policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    InitMem {
        size: u64,
    },
    SetAllocator {
        strategy: FitStrategy,
    },
    SetCache {
        level: LevelId,
        cache_size: u64,
        block_size: u64,
        associativity: u64,
    },
    Malloc {
        size: u64,
    },
    Free {
        id: BlockId,
    },
    Dump,
    Stats,
    Access {
        id: BlockId,
        offset: u64,
    },
    CacheStats,
    Reset,
    Exit,
}

fn number(token: Option<&str>, what: &str) -> Result<u64, String> {
    let token = token.ok_or_else(|| format!("missing {}", what))?;
    token
        .parse::<u64>()
        .map_err(|_| format!("invalid {} '{}'", what, token))
}

/// Parse one input line. Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut tokens = line.split_whitespace();
    let Some(cmd) = tokens.next() else {
        return Ok(None);
    };

    let command = match cmd {
        "exit" => Command::Exit,
        "init" => match tokens.next() {
            Some("mem") => Command::InitMem {
                size: number(tokens.next(), "memory size")?,
            },
            _ => return Err("usage: init mem <size>".into()),
        },
        "set" => match tokens.next() {
            Some("allocator") => {
                let token = tokens.next().ok_or("usage: set allocator <strategy>")?;
                Command::SetAllocator {
                    strategy: token.parse()?,
                }
            }
            Some("cache") => {
                let token = tokens.next().ok_or("usage: set cache <l1|l2> <size> <block> <assoc>")?;
                Command::SetCache {
                    level: token.parse()?,
                    cache_size: number(tokens.next(), "cache size")?,
                    block_size: number(tokens.next(), "block size")?,
                    associativity: number(tokens.next(), "associativity")?,
                }
            }
            _ => return Err("usage: set <allocator|cache> ...".into()),
        },
        "malloc" => Command::Malloc {
            size: number(tokens.next(), "allocation size")?,
        },
        "free" => Command::Free {
            id: number(tokens.next(), "block id")?,
        },
        "dump" => Command::Dump,
        "stats" => Command::Stats,
        "access" => Command::Access {
            id: number(tokens.next(), "block id")?,
            offset: number(tokens.next(), "offset")?,
        },
        "cache" => match tokens.next() {
            Some("stats") => Command::CacheStats,
            _ => return Err("usage: cache stats".into()),
        },
        "reset" => Command::Reset,
        other => return Err(format!("Unknown command '{}'", other)),
    };
    Ok(Some(command))
}

/// Execute one command against the session, returning the rendered output.
/// `Exit` is the caller's concern and renders to nothing.
pub fn dispatch(sim: &mut Sim, command: &Command) -> String {
    debug!("console command: {:?}", command);
    match *command {
        Command::InitMem { size } => {
            if size == 0 {
                return "Memory size must be > 0".into();
            }
            sim.memory = Some(PhysicalMemory::new(size));
            format!("Initialized memory: {} bytes", size)
        }
        Command::SetAllocator { strategy } => match sim.memory.as_mut() {
            Some(memory) => {
                memory.set_strategy(strategy);
                format!("Allocator set to {:?}", strategy)
            }
            None => "Initialize memory first".into(),
        },
        Command::SetCache {
            level,
            cache_size,
            block_size,
            associativity,
        } => match sim
            .hierarchy
            .configure_level(level, cache_size, block_size, associativity)
        {
            Ok(()) => format!("{} cache configured", level),
            Err(err) => format!("Invalid cache configuration: {}", err),
        },
        Command::Malloc { size } => match sim.memory.as_mut() {
            Some(memory) => match memory.allocate(size) {
                Ok(id) => format!("Allocated block id={}", id),
                Err(_) => "Allocation failed".into(),
            },
            None => "Initialize memory first".into(),
        },
        Command::Free { id } => match sim.memory.as_mut() {
            Some(memory) => match memory.deallocate(id) {
                Ok(()) => format!("Block {} freed", id),
                Err(_) => "Invalid block id".into(),
            },
            None => "Initialize memory first".into(),
        },
        Command::Dump => match sim.memory.as_ref() {
            Some(memory) => render_dump(memory),
            None => "Initialize memory first".into(),
        },
        Command::Stats => match sim.memory.as_ref() {
            Some(memory) => render_stats(memory),
            None => "Initialize memory first".into(),
        },
        Command::Access { id, offset } => match sim.memory.as_ref() {
            Some(memory) => match sim.hierarchy.access(memory, id, offset) {
                Ok(outcome) => {
                    let cycles = outcome.cycles();
                    let unit = if cycles == 1 { "cycle" } else { "cycles" };
                    format!("{} ({} {})", outcome, cycles, unit)
                }
                Err(AccessError::NotFound(_)) => "Invalid block id".into(),
                Err(AccessError::OutOfBounds { .. }) => "Offset out of bounds".into(),
            },
            None => "Initialize memory first".into(),
        },
        Command::CacheStats => render_cache_stats(sim),
        Command::Reset => {
            sim.reset();
            "Simulation reset. Ready for new run.".into()
        }
        Command::Exit => String::new(),
    }
}

fn render_dump(memory: &PhysicalMemory) -> String {
    let mut out = String::from("Memory dump:");
    for region in memory.dump() {
        let last = region.start + region.size - 1;
        match region.kind {
            RegionKind::Free => {
                let _ = write!(out, "\n[{:#x} - {:#x}] FREE", region.start, last);
            }
            RegionKind::Used(id) => {
                let _ = write!(out, "\n[{:#x} - {:#x}] USED (id={})", region.start, last, id);
            }
        }
    }
    out
}

fn render_stats(memory: &PhysicalMemory) -> String {
    let stats = memory.stats();
    format!(
        "Total memory: {}\n\
         Used memory: {}\n\
         Free memory: {}\n\
         Utilization: {:.2}%\n\
         External fragmentation: {:.2}%\n\
         Internal fragmentation: {:.2}%\n\
         Allocation success rate: {:.2}%",
        stats.total,
        stats.used,
        stats.free,
        stats.utilization_pct,
        stats.external_frag_pct,
        stats.internal_frag_pct,
        stats.success_rate_pct
    )
}

fn render_cache_stats(sim: &Sim) -> String {
    let stats = sim.hierarchy.stats();
    format!(
        "L1 hits: {}, misses: {}, hit ratio: {:.2}%\n\
         L2 hits: {}, misses: {}, hit ratio: {:.2}%\n\
         Total cycles: {}",
        stats.l1.hits,
        stats.l1.misses,
        stats.l1.hit_ratio_pct,
        stats.l2.hits,
        stats.l2.misses,
        stats.l2.hit_ratio_pct,
        stats.total_cycles
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(sim: &mut Sim, line: &str) -> String {
        let command = parse(line).unwrap().unwrap();
        dispatch(sim, &command)
    }

    #[test]
    fn parse_covers_command_language() {
        assert_eq!(
            parse("init mem 100").unwrap(),
            Some(Command::InitMem { size: 100 })
        );
        assert_eq!(
            parse("set allocator best_fit").unwrap(),
            Some(Command::SetAllocator {
                strategy: FitStrategy::BestFit
            })
        );
        assert_eq!(
            parse("set cache l1 64 16 2").unwrap(),
            Some(Command::SetCache {
                level: LevelId::L1,
                cache_size: 64,
                block_size: 16,
                associativity: 2
            })
        );
        assert_eq!(
            parse("access 1 4").unwrap(),
            Some(Command::Access { id: 1, offset: 4 })
        );
        assert_eq!(parse("cache stats").unwrap(), Some(Command::CacheStats));
        assert_eq!(parse("exit").unwrap(), Some(Command::Exit));
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(parse("frobnicate").is_err());
        assert!(parse("malloc").is_err());
        assert!(parse("malloc ten").is_err());
        assert!(parse("set allocator quickest_fit").is_err());
        assert!(parse("set cache l3 64 16 2").is_err());
        assert!(parse("init 100").is_err());
    }

    #[test]
    fn commands_require_initialized_memory() {
        let mut sim = Sim::new();
        assert_eq!(run(&mut sim, "malloc 10"), "Initialize memory first");
        assert_eq!(run(&mut sim, "free 1"), "Initialize memory first");
        assert_eq!(run(&mut sim, "access 1 0"), "Initialize memory first");
        assert_eq!(run(&mut sim, "dump"), "Initialize memory first");
    }

    #[test]
    fn malloc_free_session() {
        let mut sim = Sim::new();
        assert_eq!(run(&mut sim, "init mem 100"), "Initialized memory: 100 bytes");
        assert_eq!(run(&mut sim, "malloc 30"), "Allocated block id=1");
        assert_eq!(run(&mut sim, "malloc 200"), "Allocation failed");
        assert_eq!(run(&mut sim, "free 1"), "Block 1 freed");
        assert_eq!(run(&mut sim, "free 1"), "Invalid block id");
    }

    #[test]
    fn access_renders_outcomes_and_failures() {
        let mut sim = Sim::new();
        run(&mut sim, "init mem 100");
        run(&mut sim, "set cache l1 64 16 2");
        run(&mut sim, "malloc 16");
        assert_eq!(run(&mut sim, "access 1 0"), "Memory access (100 cycles)");
        assert_eq!(run(&mut sim, "access 1 0"), "L1 hit (1 cycle)");
        assert_eq!(run(&mut sim, "access 1 16"), "Offset out of bounds");
        assert_eq!(run(&mut sim, "access 9 0"), "Invalid block id");
    }

    #[test]
    fn invalid_cache_configuration_is_reported() {
        let mut sim = Sim::new();
        let out = run(&mut sim, "set cache l1 64 0 2");
        assert!(out.starts_with("Invalid cache configuration"));
        assert!(!sim.hierarchy.level(LevelId::L1).is_configured());
    }

    #[test]
    fn dump_renders_address_ordered_regions() {
        let mut sim = Sim::new();
        run(&mut sim, "init mem 100");
        run(&mut sim, "malloc 16");
        let out = run(&mut sim, "dump");
        assert_eq!(
            out,
            "Memory dump:\n[0x0 - 0xf] USED (id=1)\n[0x10 - 0x63] FREE"
        );
    }

    #[test]
    fn stats_render_all_metrics() {
        let mut sim = Sim::new();
        run(&mut sim, "init mem 100");
        run(&mut sim, "malloc 30");
        let out = run(&mut sim, "stats");
        assert!(out.contains("Total memory: 100"));
        assert!(out.contains("Used memory: 30"));
        assert!(out.contains("Free memory: 70"));
        assert!(out.contains("Utilization: 30.00%"));
        assert!(out.contains("Allocation success rate: 100.00%"));
    }

    #[test]
    fn cache_stats_render_per_level_lines() {
        let mut sim = Sim::new();
        run(&mut sim, "init mem 100");
        run(&mut sim, "set cache l1 64 16 2");
        run(&mut sim, "set cache l2 64 16 2");
        run(&mut sim, "malloc 16");
        run(&mut sim, "access 1 0");
        run(&mut sim, "access 1 0");
        let out = run(&mut sim, "cache stats");
        assert!(out.contains("L1 hits: 1, misses: 1, hit ratio: 50.00%"));
        assert!(out.contains("L2 hits: 0, misses: 1, hit ratio: 0.00%"));
        assert!(out.contains("Total cycles: 101"));
    }

    #[test]
    fn reset_clears_the_whole_session() {
        let mut sim = Sim::new();
        run(&mut sim, "init mem 100");
        run(&mut sim, "set cache l1 64 16 2");
        run(&mut sim, "malloc 16");
        run(&mut sim, "access 1 0");
        assert_eq!(
            run(&mut sim, "reset"),
            "Simulation reset. Ready for new run."
        );
        assert!(sim.memory.is_none());
        assert_eq!(sim.hierarchy.total_cycles(), 0);
    }

    #[test]
    fn strategy_change_applies_to_later_requests() {
        let mut sim = Sim::new();
        run(&mut sim, "init mem 50");
        run(&mut sim, "malloc 10");
        run(&mut sim, "malloc 10");
        run(&mut sim, "malloc 30");
        run(&mut sim, "free 1");
        run(&mut sim, "free 3");
        assert_eq!(run(&mut sim, "set allocator worst_fit"), "Allocator set to WorstFit");
        run(&mut sim, "malloc 5");
        let memory = sim.memory.as_ref().unwrap();
        assert_eq!(memory.get_block(4).unwrap().start, 20);
    }
}
