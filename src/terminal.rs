//! Terminal backend for headless/dedicated server console.
//!
//! Lines typed on stdin are submitted as [`ConsoleInputEvent`]s. Output goes
//! through the log, so nothing is written here.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Mutex;
use std::thread;

use bevy::prelude::*;

use crate::core::ConsoleInputEvent;

/// Plugin that feeds stdin into the command buffer.
///
/// [`ConsolePlugin`](crate::ConsolePlugin) adds it automatically when the
/// command line has `-dedicated`.
pub struct TerminalPlugin;

impl Plugin for TerminalPlugin {
    fn build(&self, app: &mut App) {
        let (sender, receiver) = mpsc::channel();
        if let Err(error) = spawn_stdin_reader(sender) {
            warn!("couldn't start the stdin reader: {}", error);
            return;
        }

        app.insert_resource(StdinReceiver(Mutex::new(receiver)))
            .add_systems(PreUpdate, read_stdin);
    }
}

#[derive(Resource)]
struct StdinReceiver(Mutex<Receiver<String>>);

fn spawn_stdin_reader(sender: Sender<String>) -> io::Result<()> {
    thread::Builder::new()
        .name("console stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines().map_while(Result::ok) {
                let text = line.trim();
                if !text.is_empty() && sender.send(text.to_string()).is_err() {
                    break;
                }
            }
        })
        .map(drop)
}

fn read_stdin(receiver: Res<StdinReceiver>, mut events: MessageWriter<ConsoleInputEvent>) {
    let Ok(rx) = receiver.0.lock() else {
        return;
    };

    loop {
        match rx.try_recv() {
            Ok(line) => {
                events.write(ConsoleInputEvent::new(line));
            }
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                debug!("stdin closed");
                break;
            }
        }
    }
}
