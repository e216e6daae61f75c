use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::Local;
use clap::{Parser, Subcommand};

use fingertrace::app_dirs::AppDirs;
use fingertrace::clock::ManualClock;
use fingertrace::config::{Config, ConfigStore, FileConfigStore, Protocol};
use fingertrace::export;
use fingertrace::history::HistoryDb;
use fingertrace::simulate::{self, SimulationConfig, Simulator};
use fingertrace::{util, Anchors, Engine, Point3, SessionStore};

/// fingertip path-tracing assessment: guide paths, simulated and replayed sessions
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// config file (defaults to the user config directory)
    #[clap(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// built-in protocol to run, replacing any trials from the config
    #[clap(short = 'p', long, global = true)]
    protocol: Option<String>,

    /// debug logging
    #[clap(short = 'v', long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// print the guide path of one trial as CSV
    Guide {
        /// start anchor as x,y,z
        #[clap(long, value_parser = parse_point, allow_hyphen_values = true)]
        start: Point3,

        /// end anchor as x,y,z
        #[clap(long, value_parser = parse_point, allow_hyphen_values = true)]
        end: Point3,

        /// trial name (defaults to the first trial of the protocol)
        #[clap(short = 't', long)]
        trial: Option<String>,
    },

    /// run a seeded synthetic session and export it
    Simulate {
        #[clap(long, default_value_t = 42)]
        seed: u64,

        /// samples per attempt
        #[clap(long, default_value_t = 60)]
        samples: usize,

        /// per-axis jitter, meters
        #[clap(long, default_value_t = 0.004)]
        jitter: f64,

        /// lift the finger halfway through each attempt for this many seconds
        #[clap(long)]
        pause: Option<f64>,

        /// also write the generated event stream as a replay file
        #[clap(long)]
        events: Option<PathBuf>,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// drive a session from a recorded event file (t,event,x,y,z)
    Replay {
        file: PathBuf,

        #[clap(flatten)]
        output: OutputArgs,
    },

    /// show stored attempt history
    History {
        /// only list attempts of this trial
        #[clap(short = 't', long)]
        trial: Option<String>,

        /// delete all stored history
        #[clap(long)]
        clear: bool,

        #[clap(long)]
        db: Option<PathBuf>,
    },

    /// list built-in protocols
    Protocols,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// export directory (defaults to a timestamped session directory)
    #[clap(short = 'o', long)]
    out: Option<PathBuf>,

    /// store attempt summaries in the history database
    #[clap(long)]
    record_history: bool,

    /// history database path
    #[clap(long)]
    db: Option<PathBuf>,
}

fn parse_point(s: &str) -> Result<Point3, String> {
    let coords = s
        .split(',')
        .map(|c| c.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid coordinate in '{s}': {e}"))?;
    match coords.as_slice() {
        &[x, y, z] => Ok(Point3::new(x, y, z)),
        _ => Err(format!("expected x,y,z but got '{s}'")),
    }
}

fn load_config(cli: &Cli) -> Config {
    let store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let mut config = store.load();
    if let Some(protocol) = &cli.protocol {
        config.protocol = protocol.clone();
        config.trials = None;
    }
    config
}

fn session_stamp() -> String {
    Local::now().format("%Y%m%dT%H%M%S").to_string()
}

fn open_history(db: Option<&Path>) -> anyhow::Result<HistoryDb> {
    let db = match db {
        Some(path) => HistoryDb::open(path),
        None => HistoryDb::open_default(),
    };
    db.context("opening history database")
}

fn finish_session(store: &SessionStore, output: &OutputArgs) -> anyhow::Result<()> {
    let stamp = session_stamp();
    let dir = output
        .out
        .clone()
        .unwrap_or_else(|| AppDirs::export_dir(&stamp));

    print_summary(store, &mut io::stdout())?;
    match export::export_to_dir(store, &dir)? {
        Some(paths) => println!(
            "exported {} and {}",
            paths.points.display(),
            paths.attempts.display()
        ),
        None => println!("no attempts recorded, nothing exported"),
    }

    if output.record_history && !store.is_empty() {
        let mut db = open_history(output.db.as_deref())?;
        db.record_session(store, &stamp)?;
    }
    Ok(())
}

fn print_summary<W: Write>(store: &SessionStore, out: &mut W) -> io::Result<()> {
    writeln!(out, "trial,attempts,mean_max_deviation,mean_average_deviation")?;
    for log in store.trials() {
        let max: Vec<f64> = log.attempts.iter().map(|a| a.score.max_deviation).collect();
        let avg: Vec<f64> = log
            .attempts
            .iter()
            .map(|a| a.score.average_deviation)
            .collect();
        writeln!(
            out,
            "{},{}/{},{:.4},{:.4}",
            log.name,
            log.attempts.len(),
            log.required_attempts,
            util::mean(&max).unwrap_or(0.0),
            util::mean(&avg).unwrap_or(0.0)
        )?;
    }
    Ok(())
}

fn run_guide(config: &Config, start: Point3, end: Point3, trial: Option<&str>) -> anyhow::Result<()> {
    let trials = config.trials()?;
    let definition = match trial {
        Some(name) => trials
            .iter()
            .find(|t| t.name == name)
            .with_context(|| format!("no trial named '{name}'"))?,
        None => trials.first().context("protocol has no trials")?,
    };

    let anchors = Anchors::new(start, end);
    if anchors.is_degenerate() {
        log::warn!("start and end coincide, the guide is a single point");
    }
    let guide = fingertrace::path::generate_for(anchors, definition.kind, &config.path_config());

    let mut wtr = csv::Writer::from_writer(io::stdout());
    wtr.write_record(["point_idx", "x", "y", "z"])?;
    for (i, p) in guide.points().iter().enumerate() {
        wtr.write_record([i.to_string(), p.x.to_string(), p.y.to_string(), p.z.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

fn run_simulate(config: &Config, sim: SimulationConfig, events: Option<&Path>, output: &OutputArgs) -> anyhow::Result<()> {
    let clock = ManualClock::default();
    let mut engine = Engine::new(config, clock.clone())?;
    let session = Simulator::new(sim).run_session(&mut engine, &clock)?;

    if let Some(path) = events {
        let file = File::create(path)
            .with_context(|| format!("creating event file {}", path.display()))?;
        simulate::write_replay(&session.events, file)?;
    }
    finish_session(&engine.into_store(), output)
}

fn run_replay(config: &Config, file: &Path, output: &OutputArgs) -> anyhow::Result<()> {
    let reader = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let events = simulate::read_replay(BufReader::new(reader))?;

    let clock = ManualClock::default();
    let mut engine = Engine::new(config, clock.clone())?;
    simulate::play(&mut engine, &clock, events)?;
    if !engine.machine().is_session_complete() {
        log::warn!("replay ended before the session was complete");
    }
    finish_session(&engine.into_store(), output)
}

fn run_history(trial: Option<&str>, clear: bool, db: Option<&Path>) -> anyhow::Result<()> {
    let db = open_history(db)?;
    if clear {
        db.clear_all()?;
        println!("history cleared");
        return Ok(());
    }

    match trial {
        Some(name) => {
            println!("session,attempt,recorded_at,path_length,max_deviation,average_deviation");
            for a in db.attempts_for_trial(name)? {
                println!(
                    "{},{},{},{:.4},{:.4},{:.4}",
                    a.session_id,
                    a.attempt_number,
                    a.recorded_at.to_rfc3339(),
                    a.path_length,
                    a.max_deviation,
                    a.average_deviation
                );
            }
        }
        None => {
            println!("trial,sessions,attempts,mean_max_deviation,best_max_deviation");
            for s in db.trial_summary()? {
                println!(
                    "{},{},{},{:.4},{:.4}",
                    s.trial, s.sessions, s.attempts, s.mean_max_deviation, s.best_max_deviation
                );
            }
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let config = load_config(&cli);
    match &cli.command {
        Command::Guide { start, end, trial } => run_guide(&config, *start, *end, trial.as_deref()),
        Command::Simulate {
            seed,
            samples,
            jitter,
            pause,
            events,
            output,
        } => {
            if *samples < 2 {
                bail!("need at least 2 samples per attempt");
            }
            let sim = SimulationConfig {
                seed: *seed,
                samples_per_attempt: *samples,
                jitter: *jitter,
                pause_secs: *pause,
                ..SimulationConfig::default()
            };
            run_simulate(&config, sim, events.as_deref(), output)
        }
        Command::Replay { file, output } => run_replay(&config, file, output),
        Command::History { trial, clear, db } => run_history(trial.as_deref(), *clear, db.as_deref()),
        Command::Protocols => {
            for name in Protocol::builtin_names() {
                let protocol = Protocol::builtin(&name)?;
                println!("{} ({} trials)", name, protocol.trials.len());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fingertrace::path::TrialKind;
    use fingertrace::TrialDefinition;
    use tempfile::tempdir;

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("1,2.5,-3"), Ok(Point3::new(1.0, 2.5, -3.0)));
        assert_eq!(parse_point(" 0, 0 ,0"), Ok(Point3::ZERO));
        assert!(parse_point("1,2").is_err());
        assert!(parse_point("1,2,x").is_err());
    }

    #[test]
    fn test_cli_guide() {
        let cli = Cli::parse_from([
            "fingertrace",
            "guide",
            "--start",
            "-0.2,1.2,-0.4",
            "--end",
            "0.2,1.2,-0.4",
            "-t",
            "zigzag_beginner",
        ]);
        match cli.command {
            Command::Guide { start, end, trial } => {
                assert_eq!(start, Point3::new(-0.2, 1.2, -0.4));
                assert_eq!(end, Point3::new(0.2, 1.2, -0.4));
                assert_eq!(trial.as_deref(), Some("zigzag_beginner"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_simulate_defaults() {
        let cli = Cli::parse_from(["fingertrace", "simulate"]);
        assert!(!cli.verbose);
        match cli.command {
            Command::Simulate {
                seed,
                samples,
                pause,
                output,
                ..
            } => {
                assert_eq!(seed, 42);
                assert_eq!(samples, 60);
                assert_eq!(pause, None);
                assert!(!output.record_history);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "fingertrace",
            "replay",
            "events.csv",
            "--protocol",
            "quick",
            "-v",
            "-o",
            "out",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.protocol.as_deref(), Some("quick"));
        match cli.command {
            Command::Replay { file, output } => {
                assert_eq!(file, PathBuf::from("events.csv"));
                assert_eq!(output.out, Some(PathBuf::from("out")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_protocol_flag_replaces_inline_trials() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config {
            trials: Some(vec![TrialDefinition::new("mine", TrialKind::Straight, 1)]),
            ..Config::default()
        };
        FileConfigStore::with_path(&path).save(&config).unwrap();

        let path_arg = path.to_str().unwrap();
        let cli = Cli::parse_from(["fingertrace", "-c", path_arg, "protocols"]);
        assert_eq!(load_config(&cli).trials().unwrap()[0].name, "mine");

        let cli = Cli::parse_from(["fingertrace", "-c", path_arg, "-p", "quick", "protocols"]);
        let loaded = load_config(&cli);
        assert_eq!(loaded.protocol, "quick");
        assert_eq!(loaded.trials().unwrap().len(), 2);
    }

    #[test]
    fn test_print_summary() {
        let config = Config {
            min_sample_distance: 0.0,
            protocol: "quick".into(),
            ..Config::default()
        };
        let clock = ManualClock::default();
        let mut engine = Engine::new(&config, clock.clone()).unwrap();
        Simulator::new(SimulationConfig::default())
            .run_session(&mut engine, &clock)
            .unwrap();

        let mut out = Vec::new();
        print_summary(engine.store(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("straight_1,2/2,"));
        assert!(lines[2].starts_with("zigzag_beginner,2/2,"));
    }
}
