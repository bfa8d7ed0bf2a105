use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, fs};

use intentctl::config::ConfigState;
use intentctl::replay::{Replayer, parse_trace};
use intentctl::{TargetRect, Viewport};

use crate::pipeline::{self, WatchOptions};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("replay") => {
            let cfg = ConfigState::load_or_install_default()?;
            let profile = match pargs.opt_value_from_str::<_, String>("--profile")? {
                Some(name) => cfg.load(&name)?,
                None => cfg.profile.clone(),
            };
            let viewport = pargs
                .opt_value_from_fn("--viewport", parse_viewport)?
                .unwrap_or_default();
            let threshold = pargs
                .opt_value_from_str("--threshold")?
                .unwrap_or(profile.tuning.events.default_threshold);
            let snapshots = pargs.contains("--snapshot");
            let path: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: intentctl replay <trace.jsonl> [options]"))?;

            let text = fs::read_to_string(&path)
                .map_err(|e| anyhow!("failed to read {path}: {e}"))?;
            let events = parse_trace(&text)?;

            let mut replayer = Replayer::new(profile.tuning, viewport, threshold)?;
            for (line, ev) in &events {
                let Ok(step) = replayer.apply(*line, ev) else {
                    continue;
                };
                if snapshots {
                    let v = serde_json::json!({
                        "step": step,
                        "snapshot": replayer.tracker().debug_snapshot(),
                    });
                    println!("{v}");
                } else if step.changed {
                    println!(
                        "t={:>6} {:<9} score {:>6.2}  state {:<10} intent {}",
                        step.t,
                        step.kind,
                        step.score,
                        step.state.as_str(),
                        if step.intent { "yes" } else { "no" }
                    );
                }
            }
            let report = replayer.finish();
            print_response(&serde_json::to_value(&report)?);
            Ok(())
        }

        Some("watch") => {
            let cfg = ConfigState::load_or_install_default()?;
            let viewport = pargs
                .opt_value_from_fn("--viewport", parse_viewport)?
                .unwrap_or_default();
            let target = pargs
                .opt_value_from_fn("--target", parse_target)?
                .unwrap_or_default();
            let threshold = pargs
                .opt_value_from_str("--threshold")?
                .unwrap_or(cfg.profile.tuning.events.default_threshold);
            let wheel_px = pargs.opt_value_from_str("--wheel-px")?.unwrap_or(40.0);
            pipeline::run_watch(
                cfg,
                WatchOptions {
                    viewport,
                    target,
                    threshold,
                    wheel_px,
                },
            )
        }

        Some("list") => {
            let cfg = ConfigState::load_or_install_default()?;
            for name in cfg.list_profiles() {
                let mark = if name == cfg.active_name { "*" } else { " " };
                println!("{mark} {name}");
            }
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: intentctl use <profile_name>"))?;
            let mut cfg = ConfigState::load_or_install_default()?;
            cfg.set_active(&name)?;
            println!("active profile: {}", cfg.active_name);
            Ok(())
        }

        Some("show") => {
            let cfg = ConfigState::load_or_install_default()?;
            let profile = match pargs.free_from_str::<String>().ok() {
                Some(name) => cfg.load(&name)?,
                None => cfg.profile.clone(),
            };
            print!("{}", profile.to_toml()?);
            Ok(())
        }

        Some("doctor") => {
            let cfg = ConfigState::load_or_install_default()?;
            print_response(&cfg.doctor_report());
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn parse_viewport(s: &str) -> Result<Viewport> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("viewport must look like 1920x1080, got '{s}'"))?;
    let vp = Viewport::new(w.trim().parse()?, h.trim().parse()?);
    vp.validate()?;
    Ok(vp)
}

fn parse_target(s: &str) -> Result<TargetRect> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let [x, y, w, h] = parts[..] else {
        return Err(anyhow!("target must look like X,Y,W,H, got '{s}'"));
    };
    let t = TargetRect::new(x, y, w, h);
    t.validate()?;
    Ok(t)
}

fn print_help() {
    println!(
        r#"intentctl — cursor-trajectory intent scoring

USAGE:
  intentctl help [command]                Show general or command-specific help
  intentctl replay <trace.jsonl>          Score a recorded event trace
  intentctl watch                         Score live pointer devices
  intentctl list                          List tuning profiles
  intentctl use <name>                    Switch active profile
  intentctl show [name]                   Print a profile (default: active)
  intentctl doctor                        Diagnose permissions/devices

TIPS:
  - Profiles: ~/.config/intentctl/profiles
  - Active profile pointer: ~/.config/intentctl/active
  - RUST_LOG=intentctl=trace shows every sample's score
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "replay" => println!(
            "usage: intentctl replay <trace.jsonl> [--profile NAME] [--viewport WxH] [--threshold N] [--snapshot]\n\
             Feeds a JSON-lines trace through a tracker; prints score changes and a summary.\n\
             --snapshot prints the full debug snapshot after every event."
        ),
        "watch" => println!(
            "usage: intentctl watch [--viewport WxH] [--target X,Y,W,H] [--threshold N] [--wheel-px N]\n\
             Tracks relative pointer devices and logs when intent is gained or lost.\n\
             The active profile is reloaded when its file changes. Stop with Ctrl-C."
        ),
        "list" => {
            println!("usage: intentctl list\nLists available profiles; marks active with '*'.")
        }
        "use" => {
            println!("usage: intentctl use <name>\nSwitches the active profile to <name>.")
        }
        "show" => println!("usage: intentctl show [name]\nPrints a profile as TOML."),
        "doctor" => println!(
            "usage: intentctl doctor\nChecks permissions and lists detected pointer devices."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
