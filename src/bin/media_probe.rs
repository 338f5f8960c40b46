// Pull the media layer in by path so the probe runs without the presence side
#[allow(dead_code)]
#[path = "../track.rs"]
mod track;
#[allow(dead_code)]
#[path = "../media/mod.rs"]
mod media;

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use media::{MediaSource, PlatformMedia, PlatformProbe, ProcessProbe};
use track::{unix_now, TrackSnapshot};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

fn print_snapshot(snapshot: &TrackSnapshot) {
    println!("\n🎵 MEDIA SESSION 🎵");
    for line in snapshot.to_string().lines() {
        println!("   {}", line);
    }
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn main() {
    println!("========================================");
    println!("        Nowcast Media Probe CLI         ");
    println!("========================================");
    println!("Commands:");
    println!("  [enter]          Show current snapshot");
    println!("  [w] <process>    Check whether a process is running");
    println!("  [q] quit         Exit");
    println!("----------------------------------------");

    let mut source = PlatformMedia::new();
    let probe = PlatformProbe::default();
    let mut snapshot = TrackSnapshot::default();

    // Stdin blocks, so it gets its own thread and feeds lines back over a channel
    let (tx, rx) = bounded::<String>(8);
    thread::spawn(move || {
        for line in io::stdin().lock().lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    prompt();
    loop {
        let previous = snapshot.identity();
        match source.poll() {
            Ok(report) => {
                let new_track = report
                    .as_ref()
                    .is_some_and(|r| r.title.as_deref().map(str::trim) != previous.title.as_deref());
                snapshot.absorb(report, unix_now(), new_track);
                snapshot.mark_playback(unix_now());
                if snapshot.identity() != previous {
                    print_snapshot(&snapshot);
                    prompt();
                }
            }
            Err(e) => {
                println!("\n[ERR] Media query failed: {}", e);
                prompt();
            }
        }

        let input = match rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let mut words = input.split_whitespace();
        match words.next() {
            None => print_snapshot(&snapshot),
            Some("w") => match words.next() {
                Some(name) => {
                    let state = if probe.is_running(name) { "running" } else { "not running" };
                    println!("[INFO] {} is {}", name, state);
                }
                None => println!("Usage: w <process name>"),
            },
            Some("q") | Some("quit") => {
                println!("[CMD] Quitting");
                break;
            }
            Some(_) => println!("Unknown command. Use enter, w, or q."),
        }
        prompt();
    }
}
