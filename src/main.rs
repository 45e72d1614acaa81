use clap::{Parser, Subcommand};
use karaoke::clock::{Clock, SystemClock};
use karaoke::sink::{DisplaySink, ToneSink};
use karaoke::song::bundled;
use karaoke::{parse_song, ButtonEvent, KaraokeError, PlaybackStatus, Song, TimelineEventKind};
use std::fs;
use std::io::{self, BufRead, Write};
use std::process;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, Level};

#[derive(Parser)]
#[command(name = "karaoke")]
#[command(about = "Piezo melody and character-display lyric player", long_about = None)]
struct Cli {
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a song and build its timeline
    Check {
        /// Song file, or `bundled:demony` / `bundled:demony-oled`
        song: String,
    },
    /// Print the built timeline
    Timeline {
        song: String,
        /// Emit JSON instead of one event per line
        #[arg(long)]
        json: bool,
        /// Override the song's seed
        #[arg(short, long)]
        seed: Option<u64>,
    },
    /// Play in the terminal: enter = press, h = hold, q = quit
    Play {
        song: String,
        #[arg(short, long)]
        seed: Option<u64>,
        /// Start immediately and exit when the song ends
        #[arg(short, long)]
        autostart: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let result = match cli.command {
        Commands::Check { song } => load(&song, None).and_then(|song| check(&song)),
        Commands::Timeline { song, json, seed } => {
            load(&song, seed).and_then(|song| print_timeline(&song, json))
        }
        Commands::Play {
            song,
            seed,
            autostart,
        } => load(&song, seed).and_then(|song| play(&song, autostart)),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load(path: &str, seed: Option<u64>) -> Result<Song, KaraokeError> {
    let source = match path {
        "bundled:demony" => bundled::DEMONY.to_string(),
        "bundled:demony-oled" => bundled::DEMONY_OLED.to_string(),
        _ => match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path, e);
                process::exit(1);
            }
        },
    };
    let mut song = parse_song(&source)?;
    if let Some(seed) = seed {
        song.seed = seed;
    }
    Ok(song)
}

fn check(song: &Song) -> Result<(), KaraokeError> {
    let timeline = song.build_timeline()?;
    println!(
        "{} - {}",
        song.title.as_deref().unwrap_or("Untitled"),
        song.artist.as_deref().unwrap_or("unknown artist")
    );
    println!(
        "  {} bars, {} slots, {} lyric slots",
        song.bars.len(),
        timeline.slots(),
        timeline.lyric_slots()
    );
    println!(
        "  {} events, {} tones, melody {:.0} ms, ends at {:.0} ms",
        timeline.len(),
        timeline.tone_count(),
        timeline.melody_ms(),
        timeline.end_ms()
    );
    println!(
        "  display {}x{}, lyrics {:?}",
        song.display.geometry.cols, song.display.geometry.rows, song.timeline.mode
    );
    Ok(())
}

fn print_timeline(song: &Song, json: bool) -> Result<(), KaraokeError> {
    let timeline = song.build_timeline()?;
    if json {
        let text = serde_json::to_string_pretty(&timeline)
            .map_err(|e| KaraokeError::ConfigError(e.to_string()))?;
        println!("{}", text);
        return Ok(());
    }
    for event in timeline.iter() {
        let what = match &event.kind {
            TimelineEventKind::Tone {
                pitch: Some(pitch),
                duration_ms,
                ..
            } => format!("tone   {} {:.1} ms", pitch, duration_ms),
            TimelineEventKind::Tone { duration_ms, .. } => {
                format!("rest   {:.1} ms", duration_ms)
            }
            TimelineEventKind::Lyric { row, text } => format!("lyric  [{}] {:?}", row, text),
            TimelineEventKind::Glitch { first_row, lines } => {
                format!("glitch [{}..{}]", first_row, first_row.saturating_add(lines.len()))
            }
            TimelineEventKind::Scroll { first_row, rows } => {
                format!("scroll [{}..{}]", first_row, first_row.saturating_add(*rows))
            }
            TimelineEventKind::End => "end".to_string(),
        };
        println!("{:>9.1}  {}", event.due_ms, what);
    }
    Ok(())
}

/// Logs tones; a terminal has no piezo
struct TerminalTone;

impl ToneSink for TerminalTone {
    fn set_tone(&mut self, frequency_hz: f64, duration_ms: u64) {
        debug!(frequency_hz, duration_ms, "tone");
    }

    fn silence(&mut self) {
        debug!("silence");
    }
}

/// Redraws the whole frame on stdout at every present
struct TerminalDisplay {
    rows: Vec<String>,
    cols: usize,
}

impl TerminalDisplay {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows: vec![" ".repeat(cols); rows],
            cols,
        }
    }
}

impl DisplaySink for TerminalDisplay {
    fn write_line(&mut self, row: usize, text: &str) -> Result<(), KaraokeError> {
        match self.rows.get_mut(row) {
            Some(line) => {
                *line = text.to_string();
                Ok(())
            }
            None => Err(KaraokeError::DisplayIo(format!("no row {}", row))),
        }
    }

    fn present(&mut self) -> Result<(), KaraokeError> {
        let border = format!("+{}+", "-".repeat(self.cols));
        let mut out = io::stdout().lock();
        let mut frame = format!("{}\n", border);
        for line in &self.rows {
            frame.push_str(&format!("|{}|\n", line));
        }
        frame.push_str(&border);
        writeln!(out, "{}", frame)
            .and_then(|_| out.flush())
            .map_err(|e| KaraokeError::DisplayIo(e.to_string()))
    }
}

enum Command {
    Button(ButtonEvent),
    Quit,
}

fn spawn_stdin_reader() -> mpsc::Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let command = match line.trim() {
                "" => Command::Button(ButtonEvent::Press),
                "h" => Command::Button(ButtonEvent::Hold),
                "q" => Command::Quit,
                _ => continue,
            };
            if tx.send(command).is_err() {
                break;
            }
        }
    });
    rx
}

fn play(song: &Song, autostart: bool) -> Result<(), KaraokeError> {
    let geometry = song.display.geometry;
    let mut scheduler = song.scheduler(
        SystemClock::new(),
        TerminalTone,
        TerminalDisplay::new(geometry.rows, geometry.cols),
    );
    let controller = song.input_controller();
    let commands = spawn_stdin_reader();
    let mut input_open = true;

    if autostart {
        controller.handle(ButtonEvent::Press, &mut scheduler)?;
    }
    info!(title = song.title.as_deref().unwrap_or("untitled"), "ready");

    loop {
        scheduler.poll();

        let settled = scheduler.status() == PlaybackStatus::Idle && scheduler.next_wake().is_none();
        if settled && autostart && scheduler.completed_plays() > 0 {
            break;
        }

        let now = scheduler.clock().now_ms();
        let wait = scheduler
            .next_wake()
            .map(|due| Duration::from_millis(due.saturating_sub(now)));

        if !input_open {
            // stdin closed: run out the pending timers, then exit
            match wait {
                Some(wait) => thread::sleep(wait),
                None => break,
            }
            continue;
        }

        let received = match wait {
            Some(wait) => commands.recv_timeout(wait),
            None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(Command::Button(event)) => {
                controller.handle(event, &mut scheduler)?;
            }
            Ok(Command::Quit) => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => input_open = false,
        }
    }

    scheduler.stop();
    info!(plays = scheduler.completed_plays(), "bye");
    Ok(())
}
