use motion::{StopFlag, StopFlagError};
use std::io::{self, BufRead};
use std::sync::mpsc::Sender;
use std::thread;
use thiserror::Error;

/// Operator commands, already validated.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Status,
    Rain(bool),
    Calibrate,
    Geo { latitude: f64, longitude: f64 },
    Debug(bool),
    History,
    Help,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}, try \"help\"")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("not a number: {0:?}")]
    BadNumber(String),
    #[error("{name} {value} out of range")]
    OutOfRange { name: &'static str, value: f64 },
    #[error(transparent)]
    Rain(#[from] StopFlagError),
}

pub const HELP: &str = "\
commands:
  status              print tracker status as JSON
  rain <0|1>          raise or clear the external stop flag
  calibrate           run the calibration sweep
  geo <lat> <lon>     set and persist the site location
  debug <on|off>      toggle debug logging
  history             print the recent poses, oldest first";

fn number(raw: Option<&str>, usage: &'static str) -> Result<f64, CommandError> {
    let raw = raw.ok_or(CommandError::Usage(usage))?;
    raw.parse()
        .map_err(|_| CommandError::BadNumber(raw.to_string()))
}

pub fn parse(line: &str) -> Result<Command, CommandError> {
    let mut words = line.split_whitespace();
    let name = words.next().ok_or(CommandError::Empty)?;

    let command = match name.to_ascii_lowercase().as_str() {
        "status" => Command::Status,
        "calibrate" => Command::Calibrate,
        "history" => Command::History,
        "help" | "?" => Command::Help,
        "rain" => Command::Rain(StopFlag::parse_payload(words.next())?),
        "debug" => match words.next() {
            Some("on") => Command::Debug(true),
            Some("off") => Command::Debug(false),
            _ => return Err(CommandError::Usage("debug <on|off>")),
        },
        "geo" => {
            const USAGE: &str = "geo <lat> <lon>";
            let latitude = number(words.next(), USAGE)?;
            let longitude = number(words.next(), USAGE)?;
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(CommandError::OutOfRange {
                    name: "latitude",
                    value: latitude,
                });
            }
            if !(-180.0..=180.0).contains(&longitude) {
                return Err(CommandError::OutOfRange {
                    name: "longitude",
                    value: longitude,
                });
            }
            Command::Geo {
                latitude,
                longitude,
            }
        }
        other => return Err(CommandError::Unknown(other.to_string())),
    };

    if words.next().is_some() {
        return Err(CommandError::Usage(HELP));
    }
    Ok(command)
}

/// Reads stdin on its own thread and forwards valid commands. Invalid lines
/// are reported and dropped; the thread ends at EOF or when the receiver is
/// gone.
pub fn spawn_reader(tx: Sender<Command>) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::warn!("Console read failed: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse(&line) {
                    Ok(command) => {
                        if tx.send(command).is_err() {
                            break;
                        }
                    }
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            log::debug!("Console reader finished");
        })
}
