use std::{
    io,
    process::{Command, ExitStatus, Stdio},
};

use notify_rust::{Notification, Urgency};
use tracing::debug;

use crate::timer::Completion;

pub fn completion(which: Completion, sound: bool) {
    let (title, body) = match which {
        Completion::Task => ("Task Finished! 🍅", "Did you finish it? Time for a break."),
        Completion::Break => ("Break Finished! ☕", "Done for now, or on to the next task?"),
    };
    notify(title, body, sound);
}

fn notify(title: &str, body: &str, sound: bool) {
    if let Err(e) = Notification::new()
        .summary(title)
        .body(body)
        .appname("pomotask")
        .icon("alarm-clock")
        .urgency(Urgency::Critical)
        .show()
    {
        debug!("Desktop notification failed: {}", e);
    }

    if sound {
        std::thread::spawn(|| {
            for (cmd, file) in [
                ("paplay", "/usr/share/sounds/freedesktop/stereo/complete.oga"),
                ("aplay", "/usr/share/sounds/sound-icons/guitar-11.wav"),
                ("aplay", "/usr/share/sounds/generic.wav"),
            ] {
                if std::path::Path::new(file).exists() {
                    match play(cmd, file) {
                        Ok(status) if !status.success() => debug!("{} exited with {}", cmd, status),
                        Ok(_) => {}
                        Err(e) => debug!("Failed to play {} with {}: {}", file, cmd, e),
                    }
                    break;
                }
            }
        });
    }
}

/// Play `file` with `cmd`, waiting for the player to exit.
fn play(cmd: &str, file: &str) -> io::Result<ExitStatus> {
    Command::new(cmd)
        .arg(file)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?
        .wait()
}
