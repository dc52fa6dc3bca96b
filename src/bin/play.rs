//! Console player - plays a MIDI file and prints every note event.
//!
//! Usage: cargo run --bin play -- <file.mid> [--tempo <rate>] [--duration <secs>]
//!        cargo run --bin play -- --list

use anyhow::{bail, Context, Result};
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use midi_player::midi::{note_name, output_port_names, MidiOut};
use midi_player::{NoteEvent, PlayerConfig, Score, Transport};

/// Longest sleep between dispatch steps.
const MAX_SLEEP: Duration = Duration::from_millis(20);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--list") {
        println!("Available MIDI output ports:");
        for (i, name) in output_port_names().iter().enumerate() {
            println!("  {}: {}", i, name);
        }
        return Ok(());
    }

    let Some(path) = positional_arg(&args) else {
        bail!("usage: play <file.mid> [--tempo <rate>] [--duration <secs>] | --list");
    };

    let tempo: Option<f64> = flag_value(&args, "--tempo")
        .map(|s| s.parse().with_context(|| format!("invalid --tempo value: {}", s)))
        .transpose()?;
    let duration: Option<Duration> = flag_value(&args, "--duration")
        .map(|s| {
            s.parse::<f64>()
                .ok()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .with_context(|| format!("invalid --duration value: {}", s))
        })
        .transpose()?;

    let config = PlayerConfig::load(PlayerConfig::default_path()).map_err(anyhow::Error::msg)?;
    let score = Score::from_file(path).with_context(|| format!("failed to load {}", path))?;

    let mut out = MidiOut::new(config.output_device.as_deref()).unwrap_or_else(|e| {
        eprintln!("No MIDI output ({}), printing only", e);
        MidiOut::disconnected()
    });
    config.apply_mutes(&mut out);

    println!("=== MIDI Player ===");
    println!("File:   {}", score.name);
    println!("Output: {}", out.port_name);
    println!(
        "Notes:  {}  Ticks/beat: {}  Ticks/s: {:.1}",
        score.note_count(),
        score.ticks_per_beat(),
        score.ticks_per_second()
    );
    println!();
    println!("{:<10} {:<8} {:<4} {:<6} {}", "TIME", "TYPE", "CH", "NOTE", "VEL");
    println!("{}", "-".repeat(40));

    let mut transport = Transport::new(score, out)
        .with_lookahead(config.lookahead_events)
        .with_note_offset(config.note_offset);
    transport.set_playback_tempo(tempo.unwrap_or(config.playback_speed))?;
    transport.add_listener(print_note_event);

    let started = Instant::now();
    transport.start_at(started);

    loop {
        let now = Instant::now();
        transport.advance(now);

        if transport.is_finished() {
            break;
        }
        if duration.is_some_and(|d| now.duration_since(started) >= d) {
            println!("\nDuration reached, stopping.");
            break;
        }

        let sleep = transport
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(MAX_SLEEP)
            .min(MAX_SLEEP);
        std::thread::sleep(sleep);
    }

    transport.stop();
    println!(
        "\nPlayed {:.1}s",
        Instant::now().duration_since(started).as_secs_f64()
    );
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// First argument that is neither a flag nor a flag's value.
fn positional_arg(args: &[String]) -> Option<&str> {
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--tempo" | "--duration" => i += 2,
            flag if flag.starts_with("--") => i += 1,
            arg => return Some(arg),
        }
    }
    None
}

fn print_note_event(event: &NoteEvent) {
    let kind = if event.message() == midi_player::midi::NOTE_ON {
        "NOTE_ON"
    } else {
        "NOTE_OFF"
    };
    println!(
        "{:<10} {:<8} {:<4} {:<6} {}",
        format!("{:.3}s", event.now.as_secs_f64()),
        kind,
        event.channel + 1,
        note_name(event.note),
        event.velocity
    );
    let _ = io::stdout().flush();
}
