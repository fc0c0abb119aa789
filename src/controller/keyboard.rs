// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::io;
use std::path::PathBuf;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;

const START: &str = "start";
const STOP: &str = "stop";
const SCENE: &str = "scene";
const SUBSCENE: &str = "subscene";
const WINDOW: &str = "window";
const TOGGLE: &str = "toggle";
const VOLUME: &str = "vol";
const MIN_VOLUME: &str = "min";
const MAX_VOLUME: &str = "max";
const MIN_TIMEFRAME: &str = "tmin";
const MAX_TIMEFRAME: &str = "tmax";
const ANIMATE: &str = "animate";
const EXPORT: &str = "export";
const STATUS: &str = "status";

/// A controller that drives the player with line commands typed on stdin.
#[derive(Default)]
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads one command and forwards it. Returns false once the input is exhausted.
    fn monitor_io<R, W>(events_tx: &Sender<Event>, mut reader: R, mut writer: W) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({}, {}, {} N, {} N, {} N, {} S on|off, {}|{}|{} S V, {}|{} S MS, {} on|off, {} PATH, {}): ",
            START,
            STOP,
            SCENE,
            SUBSCENE,
            WINDOW,
            TOGGLE,
            VOLUME,
            MIN_VOLUME,
            MAX_VOLUME,
            MIN_TIMEFRAME,
            MAX_TIMEFRAME,
            ANIMATE,
            EXPORT,
            STATUS,
        )?;
        writer.flush()?;
        let mut input = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }
        if input.trim().is_empty() {
            return Ok(true);
        }

        match parse_command(&input) {
            Some(event) => events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            None => warn!(input = input.trim(), "Unrecognized input"),
        }
        Ok(true)
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// Parses a line command into an event.
fn parse_command(input: &str) -> Option<Event> {
    let mut words = input.split_whitespace();
    let command = words.next()?.to_lowercase();
    let args: Vec<&str> = words.collect();

    let event = match (command.as_str(), args.as_slice()) {
        (START, []) => Event::Start,
        (STOP, []) => Event::Stop,
        (STATUS, []) => Event::Status,
        (SCENE, [index]) => Event::SelectScene(index.parse().ok()?),
        (SUBSCENE, [index]) => Event::SelectSubscene(index.parse().ok()?),
        (WINDOW, [index]) => Event::SelectWindow(index.parse().ok()?),
        (TOGGLE, [sample, state]) => Event::Toggle(sample.to_string(), parse_switch(state)?),
        (VOLUME, [sample, value]) => Event::SetVolume(sample.to_string(), value.parse().ok()?),
        (MIN_VOLUME, [sample, value]) => {
            Event::SetMinVolume(sample.to_string(), value.parse().ok()?)
        }
        (MAX_VOLUME, [sample, value]) => {
            Event::SetMaxVolume(sample.to_string(), value.parse().ok()?)
        }
        (MIN_TIMEFRAME, [sample, value]) => {
            Event::SetMinTimeframe(sample.to_string(), value.parse().ok()?)
        }
        (MAX_TIMEFRAME, [sample, value]) => {
            Event::SetMaxTimeframe(sample.to_string(), value.parse().ok()?)
        }
        (ANIMATE, [state]) => Event::Animate(parse_switch(state)?),
        (EXPORT, [path]) => Event::Export(PathBuf::from(path)),
        _ => return None,
    };
    Some(event)
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            info!("Keyboard input closed.");
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader};

    use tokio::sync::mpsc;

    use super::*;

    fn get_event(event: &str) -> Result<Option<Event>, io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(event.as_bytes());
        let writer: Vec<u8> = Vec::new();
        assert!(Driver::monitor_io(&sender, reader, writer)?);

        // Force the sender to close.
        drop(sender);
        Ok(receiver.blocking_recv())
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!(Some(Event::Start), get_event("start\n")?);
        assert_eq!(Some(Event::Stop), get_event("STOP")?);
        assert_eq!(Some(Event::Status), get_event("status")?);
        assert_eq!(Some(Event::SelectScene(1)), get_event("scene 1")?);
        assert_eq!(Some(Event::SelectSubscene(2)), get_event("subscene 2")?);
        assert_eq!(Some(Event::SelectWindow(0)), get_event("window 0")?);
        assert_eq!(
            Some(Event::Toggle("wind".into(), false)),
            get_event("toggle wind off")?
        );
        assert_eq!(
            Some(Event::SetVolume("birds".into(), 42.5)),
            get_event("vol birds 42.5")?
        );
        assert_eq!(
            Some(Event::SetMinVolume("0".into(), 10.0)),
            get_event("min 0 10")?
        );
        assert_eq!(
            Some(Event::SetMaxVolume("0".into(), 90.0)),
            get_event("max 0 90")?
        );
        assert_eq!(
            Some(Event::SetMinTimeframe("wind".into(), 1500)),
            get_event("tmin wind 1500")?
        );
        assert_eq!(
            Some(Event::SetMaxTimeframe("wind".into(), 9000)),
            get_event("tmax wind 9000")?
        );
        assert_eq!(Some(Event::Animate(true)), get_event("animate on")?);
        assert_eq!(
            Some(Event::Export(PathBuf::from("/tmp/forest.json"))),
            get_event("export /tmp/forest.json")?
        );
        Ok(())
    }

    #[test]
    fn test_unrecognized_input_is_ignored() -> Result<(), io::Error> {
        assert_eq!(None, get_event("unrecognized")?);
        assert_eq!(None, get_event("scene one")?);
        assert_eq!(None, get_event("toggle wind maybe")?);
        assert_eq!(None, get_event("vol wind")?);
        assert_eq!(None, get_event("start now")?);
        assert_eq!(None, get_event("\n")?);
        Ok(())
    }

    #[test]
    fn test_end_of_input() {
        let (sender, _receiver) = mpsc::channel::<Event>(1);
        let reader = BufReader::new("".as_bytes());
        assert!(!Driver::monitor_io(&sender, reader, Vec::new()).unwrap());
    }
}
