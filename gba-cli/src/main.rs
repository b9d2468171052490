mod dispatch;
mod script;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gba_hal::keypad::{DEFAULT_REPEAT_DELAY, DEFAULT_REPEAT_PERIOD};
use gba_hal::{IrqMask, Keypad, Keys};
use std::fs;

#[derive(Parser)]
#[command(name = "gba-cli")]
#[command(about = "Host-side harness for the GBA keypad and interrupt layer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a keypad script and print the derived key state per tick
    Keys {
        /// Path to the script (one sample per line, optional `xN` count)
        script: String,
        /// Ticks before a held key repeats (0 disables repeat)
        #[arg(long, default_value_t = DEFAULT_REPEAT_DELAY)]
        delay: u16,
        /// Ticks between repeats (0 repeats once per press)
        #[arg(long, default_value_t = DEFAULT_REPEAT_PERIOD)]
        period: u16,
    },
    /// Install handlers, raise interrupt lines and show what gets dispatched
    Irq {
        /// Lines to install a handler for, e.g. vblank,timer0
        #[arg(long, value_delimiter = ',')]
        install: Vec<String>,
        /// Lines to enable in IE (defaults to the installed ones)
        #[arg(long, value_delimiter = ',')]
        enable: Option<Vec<String>>,
        /// Lines to raise in IF
        #[arg(long, value_delimiter = ',', required = true)]
        raise: Vec<String>,
        /// Fill the remaining table slots, then try one more install
        #[arg(long)]
        fill: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Keys {
            script,
            delay,
            period,
        } => {
            let contents =
                fs::read_to_string(&script).with_context(|| format!("reading {}", script))?;
            let steps = script::parse_script(&contents).context("parsing keypad script")?;
            let samples = script::expand(&steps);

            let mut keypad = Keypad::new();
            keypad.set_repeat(delay, period);

            println!(
                "{:>5}  {:>6}  {:<16} {:<16} {:<16} {:<16}",
                "tick", "raw", "pressed", "repeat", "held", "released"
            );
            for (tick, raw) in samples.iter().enumerate() {
                keypad.update(*raw);
                println!(
                    "{:>5}  0x{:04X}  {:<16} {:<16} {:<16} {:<16}",
                    tick,
                    raw,
                    names(keypad.pressed()),
                    names(keypad.pressed_repeat()),
                    names(keypad.held()),
                    names(keypad.released()),
                );
            }
        }
        Command::Irq {
            install,
            enable,
            raise,
            fill,
        } => {
            let install = dispatch::parse_lines(&install)?;
            let enable = match enable {
                Some(lines) => dispatch::parse_lines(&lines)?,
                None => install,
            };
            let raise = dispatch::parse_lines(&raise)?;

            let report = dispatch::simulate(install, enable, raise, fill)?;

            if let Some(err) = &report.fill_error {
                println!("Table full: {}", err);
            }
            if report.fired.is_empty() {
                println!("No handlers ran.");
            } else {
                println!("Handlers (in table order): {}", report.fired.join(", "));
            }
            println!("Acknowledged: {}", mask_names(report.acknowledged));
            println!("Still pending: {}", mask_names(report.still_pending));
        }
    }

    Ok(())
}

fn names(keys: Keys) -> String {
    if keys.is_empty() {
        return "-".to_string();
    }
    keys.iter_names()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join("+")
}

fn mask_names(mask: IrqMask) -> String {
    if mask.is_empty() {
        return "none".to_string();
    }
    format!(
        "{} (0x{:04X})",
        mask.iter_names()
            .map(|(name, _)| name)
            .collect::<Vec<_>>()
            .join(", "),
        mask.bits()
    )
}
