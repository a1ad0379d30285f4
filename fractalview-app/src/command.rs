use std::path::PathBuf;

use thiserror::Error;

use fractalview_core::{ParamField, ZoomFactor};

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Set { field: ParamField, value: String },
    Generate,
    /// Toggle recentre mode.
    Arm,
    Click { x: f64, y: f64 },
    Zoom(ZoomFactor),
    Histogram,
    Palette(PathBuf),
    Render,
    Show,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub(crate) enum CommandError {
    #[error("unknown command {0:?} (try `help`)")]
    Unknown(String),

    #[error("`{command}` needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },

    #[error("`{command}`: {reason}")]
    BadArgument {
        command: &'static str,
        reason: String,
    },
}

pub(crate) const USAGE: &str = "\
commands:
  set <field> <value>   edit rows | cols | re | im | div | its
  generate              generate with the current parameters
  arm                   toggle recentre mode (next click recentres)
  click <x> <y>         click on the image at pixel (x, y)
  zoom <2|3|5|10>       zoom in by a factor
  histogram             fetch the divergence histogram
  palette <file>        upload a colour palette file
  render                re-colour the last image with the active palette
  show                  print the current state
  help                  this text
  quit                  exit once pending requests settle";

/// Parse a line. Blank lines and `#` comments yield `None`.
pub(crate) fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "set" => {
            let field = words.next().ok_or(CommandError::MissingArgument {
                command: "set",
                what: "a field name",
            })?;
            let field = field
                .parse::<ParamField>()
                .map_err(|e| CommandError::BadArgument {
                    command: "set",
                    reason: e.to_string(),
                })?;
            let value = words.collect::<Vec<_>>().join(" ");
            if value.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "set",
                    what: "a value",
                });
            }
            Command::Set { field, value }
        }
        "generate" | "gen" | "g" => Command::Generate,
        "arm" | "recentre" | "recenter" => Command::Arm,
        "click" => {
            let x = coordinate(words.next(), "click")?;
            let y = coordinate(words.next(), "click")?;
            Command::Click { x, y }
        }
        "zoom" | "z" => {
            let raw = words.next().ok_or(CommandError::MissingArgument {
                command: "zoom",
                what: "a factor",
            })?;
            let factor = raw
                .trim_start_matches(['x', '×'])
                .parse::<u32>()
                .ok()
                .and_then(|n| ZoomFactor::try_from(n).ok())
                .ok_or_else(|| CommandError::BadArgument {
                    command: "zoom",
                    reason: format!("{raw:?} is not one of 2, 3, 5, 10"),
                })?;
            Command::Zoom(factor)
        }
        "histogram" | "hist" => Command::Histogram,
        "palette" => {
            let path = words.collect::<Vec<_>>().join(" ");
            if path.is_empty() {
                return Err(CommandError::MissingArgument {
                    command: "palette",
                    what: "a file path",
                });
            }
            Command::Palette(PathBuf::from(path))
        }
        "render" => Command::Render,
        "show" | "status" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => return Err(CommandError::Unknown(name.to_string())),
    };
    Ok(Some(command))
}

fn coordinate(word: Option<&str>, command: &'static str) -> Result<f64, CommandError> {
    let word = word.ok_or(CommandError::MissingArgument {
        command,
        what: "x and y pixel coordinates",
    })?;
    word.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CommandError::BadArgument {
            command,
            reason: format!("{word:?} is not a pixel coordinate"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse("   ").unwrap(), None);
        assert_eq!(parse("# zoom in twice").unwrap(), None);
    }

    #[test]
    fn set_takes_field_and_value() {
        assert_eq!(
            parse("set div 0.0025").unwrap(),
            Some(Command::Set {
                field: ParamField::PixelDivision,
                value: "0.0025".into()
            })
        );
        assert!(matches!(
            parse("set rows"),
            Err(CommandError::MissingArgument { .. })
        ));
        assert!(matches!(
            parse("set colour red"),
            Err(CommandError::BadArgument { .. })
        ));
    }

    #[test]
    fn set_keeps_unparsed_value_for_validation() {
        // Value checking belongs to the parameter store.
        assert_eq!(
            parse("set its lots").unwrap(),
            Some(Command::Set {
                field: ParamField::MaxIterations,
                value: "lots".into()
            })
        );
    }

    #[test]
    fn click_needs_two_numbers() {
        assert_eq!(
            parse("click 200 150.5").unwrap(),
            Some(Command::Click { x: 200.0, y: 150.5 })
        );
        assert!(parse("click 200").is_err());
        assert!(parse("click a b").is_err());
        assert!(parse("click NaN 1").is_err());
    }

    #[test]
    fn zoom_accepts_only_button_factors() {
        assert_eq!(parse("zoom 10").unwrap(), Some(Command::Zoom(ZoomFactor::X10)));
        assert_eq!(parse("z x3").unwrap(), Some(Command::Zoom(ZoomFactor::X3)));
        assert!(parse("zoom 4").is_err());
        assert!(parse("zoom").is_err());
    }

    #[test]
    fn palette_path_may_contain_spaces() {
        assert_eq!(
            parse("palette my palettes/fire.palette").unwrap(),
            Some(Command::Palette(PathBuf::from("my palettes/fire.palette")))
        );
    }

    #[test]
    fn unknown_command_is_reported() {
        assert_eq!(
            parse("explode").unwrap_err(),
            CommandError::Unknown("explode".into())
        );
    }
}
