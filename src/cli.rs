use std::path::PathBuf;

use anyhow::{anyhow, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Generate {
        image: PathBuf,
        age: String,
        outfit: String,
    },
    Regenerate {
        id: i64,
        age: Option<String>,
        outfit: Option<String>,
    },
    List,
    View {
        id: i64,
        original: bool,
    },
    Download {
        id: i64,
        dir: PathBuf,
    },
    Delete {
        id: i64,
    },
    Outfits,
    Help,
}

pub fn usage() -> &'static str {
    "Usage:
  birthday_shoot generate --image <path> [--age <n>] [--outfit <style>]
  birthday_shoot regenerate --id <id> [--age <n>] [--outfit <style>]
  birthday_shoot list
  birthday_shoot view --id <id> [--original]
  birthday_shoot download --id <id> [--dir <dir>]
  birthday_shoot delete --id <id>
  birthday_shoot outfits"
}

fn take_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> Result<&'a str> {
    *index += 1;
    args.get(*index)
        .map(|value| value.as_str())
        .ok_or_else(|| anyhow!("Missing value for {flag}"))
}

fn parse_id(value: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|_| anyhow!("Invalid --id value: {value}"))
}

#[derive(Default)]
struct Flags {
    image: Option<PathBuf>,
    id: Option<i64>,
    age: Option<String>,
    outfit: Option<String>,
    dir: Option<PathBuf>,
    original: bool,
}

fn parse_flags(args: &[String], allowed: &[&str]) -> Result<Flags> {
    let mut flags = Flags::default();
    let mut index = 0;
    while index < args.len() {
        let flag = args[index].as_str();
        if !allowed.contains(&flag) {
            return Err(anyhow!("Unexpected argument: {flag}"));
        }
        match flag {
            "--image" => flags.image = Some(PathBuf::from(take_value(args, &mut index, flag)?)),
            "--id" => flags.id = Some(parse_id(take_value(args, &mut index, flag)?)?),
            "--age" => flags.age = Some(take_value(args, &mut index, flag)?.to_string()),
            "--outfit" => flags.outfit = Some(take_value(args, &mut index, flag)?.to_string()),
            "--dir" => flags.dir = Some(PathBuf::from(take_value(args, &mut index, flag)?)),
            "--original" => flags.original = true,
            _ => return Err(anyhow!("Unexpected argument: {flag}")),
        }
        index += 1;
    }
    Ok(flags)
}

fn require_id(flags: &Flags) -> Result<i64> {
    flags.id.ok_or_else(|| anyhow!("--id is required"))
}

/// Parses `args` as received from `std::env::args`, program name included.
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some(subcommand) = args.get(1).map(|value| value.as_str()) else {
        return Ok(Command::Help);
    };
    let rest = &args[2..];

    match subcommand {
        "generate" => {
            let flags = parse_flags(rest, &["--image", "--age", "--outfit"])?;
            let image = flags.image.ok_or_else(|| anyhow!("--image is required"))?;
            Ok(Command::Generate {
                image,
                age: flags.age.unwrap_or_default(),
                outfit: flags.outfit.unwrap_or_default(),
            })
        }
        "regenerate" => {
            let flags = parse_flags(rest, &["--id", "--age", "--outfit"])?;
            Ok(Command::Regenerate {
                id: require_id(&flags)?,
                age: flags.age,
                outfit: flags.outfit,
            })
        }
        "list" => {
            parse_flags(rest, &[])?;
            Ok(Command::List)
        }
        "view" => {
            let flags = parse_flags(rest, &["--id", "--original"])?;
            Ok(Command::View {
                id: require_id(&flags)?,
                original: flags.original,
            })
        }
        "download" => {
            let flags = parse_flags(rest, &["--id", "--dir"])?;
            Ok(Command::Download {
                id: require_id(&flags)?,
                dir: flags.dir.clone().unwrap_or_else(|| PathBuf::from(".")),
            })
        }
        "delete" => {
            let flags = parse_flags(rest, &["--id"])?;
            Ok(Command::Delete {
                id: require_id(&flags)?,
            })
        }
        "outfits" => {
            parse_flags(rest, &[])?;
            Ok(Command::Outfits)
        }
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(anyhow!("Unknown command: {other}\n\n{}", usage())),
    }
}
