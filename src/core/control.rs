//! Line-oriented control interface
//!
//! Each stdin line is parsed into a `Msg` and forwarded to the event loop
//! over an mpsc channel.

use std::str::FromStr;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::domain::{CropMode, Dpi, Granularity, Rgb, StyleKey};
use crate::session::messages::{CropMsg, EditMsg, Msg, PrimaryMsg, RemapMsg, SessionMsg};

pub const HELP: &str = "\
session:   upload <path> | status | history | save <path> | exit
find:      generate <prompt> | restyle <prompt> | refine <n> <prompt>
           search <text> | search-similar [text] | results | open <n>
           hint [style|ratio|color|scene] [value|none]
edit:      click <x> <y> <display-w> <display-h> | granularity <fine|medium|coarse>
           deselect | say <instruction> | edit [instruction] | undo
colors:    colors | palette [n] | map <n> <#rrggbb|none> | tolerance <10-100>
           luminance <on|off> | variants [2-5] | use-variant <n>
           preview-colors | commit-colors | cancel-colors
crop:      crop <w-cm> <h-cm> [72|150|300] [fill|fit|preserve_border]
           commit-crop | cancel-crop
other:     help | quit";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid {what}: {reason}")]
    Invalid { what: &'static str, reason: String },
}

fn arg<T: FromStr>(value: Option<&str>, what: &'static str, usage: &'static str) -> Result<T, CommandError>
where
    T::Err: std::fmt::Display,
{
    let value = value.ok_or(CommandError::Usage(usage))?;
    value.parse().map_err(|e: T::Err| CommandError::Invalid {
        what,
        reason: e.to_string(),
    })
}

/// Everything after the command word, or a usage error if empty
fn rest<'a>(line: &'a str, command: &str, usage: &'static str) -> Result<&'a str, CommandError> {
    let text = line.trim_start()[command.len()..].trim();
    if text.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(text)
    }
}

/// Text after the command word, split into its first word and the rest
fn split_first<'a>(line: &'a str, command: &str) -> (Option<&'a str>, &'a str) {
    let text = line.trim_start()[command.len()..].trim();
    match text.split_once(char::is_whitespace) {
        Some((first, rest)) => (Some(first), rest.trim()),
        None if text.is_empty() => (None, ""),
        None => (Some(text), ""),
    }
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse(line: &str) -> Result<Option<Msg>, CommandError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let mut words = trimmed.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };

    let msg = match command {
        // Session
        "upload" => Msg::upload(rest(trimmed, command, "upload <path>")?),
        "status" => Msg::status(),
        "history" => Msg::Session(SessionMsg::History),
        "save" => Msg::Session(SessionMsg::Save(rest(trimmed, command, "save <path>")?.into())),
        "exit" => Msg::exit_session(),

        // Generation and search
        "generate" => Msg::generate(rest(trimmed, command, "generate <prompt>")?),
        "restyle" => Msg::Primary(PrimaryMsg::Restyle(
            rest(trimmed, command, "restyle <prompt>")?.to_string(),
        )),
        "refine" => {
            const USAGE: &str = "refine <n> <prompt>";
            let (index, prompt) = split_first(trimmed, command);
            let index = arg(index, "result number", USAGE)?;
            if prompt.is_empty() {
                return Err(CommandError::Usage(USAGE));
            }
            Msg::Primary(PrimaryMsg::Refine {
                index,
                prompt: prompt.to_string(),
            })
        }
        "search" => Msg::search(rest(trimmed, command, "search <text>")?),
        "search-similar" => Msg::Primary(PrimaryMsg::SearchSimilar(
            trimmed[command.len()..].trim().to_string(),
        )),
        "hint" => match split_first(trimmed, command) {
            (None, _) => Msg::Primary(PrimaryMsg::Hints),
            (Some(key), value) => {
                let key: StyleKey = arg(Some(key), "hint", "hint [style|ratio|color|scene] [value|none]")?;
                let value = match value {
                    "" | "none" => None,
                    text => Some(text.to_string()),
                };
                Msg::Primary(PrimaryMsg::Hint { key, value })
            }
        },
        "results" => Msg::Primary(PrimaryMsg::Results),
        "open" => Msg::open(arg(words.next(), "result number", "open <n>")?),

        // Region editing
        "click" => {
            const USAGE: &str = "click <x> <y> <display-w> <display-h>";
            let x = arg(words.next(), "x", USAGE)?;
            let y = arg(words.next(), "y", USAGE)?;
            let w = arg(words.next(), "display width", USAGE)?;
            let h = arg(words.next(), "display height", USAGE)?;
            Msg::click(x, y, w, h)
        }
        "granularity" => {
            let level: Granularity =
                arg(words.next(), "granularity", "granularity <fine|medium|coarse>")?;
            Msg::Edit(EditMsg::Granularity(level))
        }
        "deselect" => Msg::deselect(),
        "say" => Msg::say(rest(trimmed, command, "say <instruction>")?),
        "edit" => match trimmed[command.len()..].trim() {
            "" => Msg::apply_edit(),
            text => Msg::Edit(EditMsg::Apply(Some(text.to_string()))),
        },
        "undo" => Msg::undo(),

        // Color remap
        "colors" => Msg::Remap(RemapMsg::Start),
        "palette" => {
            let n = match words.next() {
                Some(n) => Some(arg(Some(n), "palette size", "palette [n]")?),
                None => None,
            };
            Msg::Remap(RemapMsg::Extract(n))
        }
        "map" => {
            const USAGE: &str = "map <n> <#rrggbb|none>";
            let index = arg(words.next(), "palette entry", USAGE)?;
            let target = match words.next() {
                Some("none") => None,
                value => Some(arg::<Rgb>(value, "color", USAGE)?),
            };
            Msg::assign_color(index, target)
        }
        "tolerance" => Msg::Remap(RemapMsg::Tolerance(arg(
            words.next(),
            "tolerance",
            "tolerance <10-100>",
        )?)),
        "luminance" => {
            let on = match words.next() {
                Some("on") => true,
                Some("off") => false,
                _ => return Err(CommandError::Usage("luminance <on|off>")),
            };
            Msg::Remap(RemapMsg::Luminance(on))
        }
        "variants" => {
            let n = match words.next() {
                Some(n) => Some(arg(Some(n), "variant color count", "variants [2-5]")?),
                None => None,
            };
            Msg::Remap(RemapMsg::Variants(n))
        }
        "use-variant" => Msg::Remap(RemapMsg::UseVariant(arg(
            words.next(),
            "variant number",
            "use-variant <n>",
        )?)),
        "preview-colors" => Msg::preview_colors(),
        "commit-colors" => Msg::commit_colors(),
        "cancel-colors" => Msg::Remap(RemapMsg::Cancel),

        // Crop
        "crop" => {
            const USAGE: &str = "crop <w-cm> <h-cm> [72|150|300] [fill|fit|preserve_border]";
            let width_cm = arg(words.next(), "width", USAGE)?;
            let height_cm = arg(words.next(), "height", USAGE)?;
            let mut dpi = None;
            let mut mode = None;
            for word in words {
                if let Ok(value) = word.parse::<u32>() {
                    let parsed = Dpi::try_from(value).map_err(|e| CommandError::Invalid {
                        what: "dpi",
                        reason: e.to_string(),
                    })?;
                    dpi = Some(parsed);
                } else {
                    mode = Some(arg::<CropMode>(Some(word), "crop mode", USAGE)?);
                }
            }
            Msg::crop(width_cm, height_cm, dpi, mode)
        }
        "commit-crop" => Msg::commit_crop(),
        "cancel-crop" => Msg::Crop(CropMsg::Cancel),

        "help" | "?" => Msg::Help,
        "quit" | "q" => Msg::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(msg))
}

/// Read stdin until EOF, forwarding parsed commands. EOF sends `Quit`.
pub async fn read_commands(tx: mpsc::UnboundedSender<Msg>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let msg = match lines.next_line().await {
            Ok(Some(line)) => match parse(&line) {
                Ok(Some(msg)) => msg,
                Ok(None) => continue,
                Err(err) => Msg::Unrecognized(err.to_string()),
            },
            Ok(None) => Msg::Quit,
            Err(err) => {
                log::error!("Failed to read stdin: {}", err);
                Msg::Quit
            }
        };
        let quit = matches!(msg, Msg::Quit);
        if tx.send(msg).is_err() || quit {
            break;
        }
    }
}
