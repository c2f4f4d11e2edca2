use std::{env, iter::Peekable, path::PathBuf};

use anyhow::{Result, anyhow};

const USAGE: &str =
    "usage: chainfold [--config <path>] <run | score [trace] | verify [trace] | dataset | finetune-set [--out <dir>]>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Drive the configured experiment over the corpus and score the traces.
    Run,
    /// Re-score a previously written trace file.
    Score { trace: Option<PathBuf> },
    /// Re-fold accepted designs from a trace file and compare to targets.
    Verify { trace: Option<PathBuf> },
    /// Generate the training and validation corpus files.
    Dataset,
    /// Emit the fine-tune message JSONL for the configured experiment.
    FinetuneSet { out: Option<PathBuf> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub config_path: PathBuf,
    pub command: Command,
}

pub fn cli_args() -> Result<CliArgs> {
    parse_args(env::args().skip(1))
}

pub fn parse_args<I>(args: I) -> Result<CliArgs>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().peekable();
    let mut config_path = None;
    let mut command: Option<Command> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --config"))?;
                config_path = Some(PathBuf::from(value));
            }
            "--out" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --out"))?;
                match &mut command {
                    Some(Command::FinetuneSet { out }) => *out = Some(PathBuf::from(value)),
                    _ => return Err(anyhow!("--out only applies to finetune-set. {USAGE}")),
                }
            }
            "run" if command.is_none() => command = Some(Command::Run),
            "dataset" if command.is_none() => command = Some(Command::Dataset),
            "score" if command.is_none() => {
                command = Some(Command::Score {
                    trace: next_positional(&mut args),
                });
            }
            "verify" if command.is_none() => {
                command = Some(Command::Verify {
                    trace: next_positional(&mut args),
                });
            }
            "finetune-set" if command.is_none() => {
                command = Some(Command::FinetuneSet { out: None });
            }
            other => {
                return Err(anyhow!("unknown argument: {other}. {USAGE}"));
            }
        }
    }

    let command = command.ok_or_else(|| anyhow!("missing command. {USAGE}"))?;
    Ok(CliArgs {
        config_path: config_path.unwrap_or_else(|| PathBuf::from("./chainfold.jsonc")),
        command,
    })
}

fn next_positional<I>(args: &mut Peekable<I>) -> Option<PathBuf>
where
    I: Iterator<Item = String>,
{
    match args.peek() {
        Some(value) if !value.starts_with("--") => args.next().map(PathBuf::from),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{Command, parse_args};

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn run_with_default_config_path() {
        let parsed = parse_args(strings(&["run"])).expect("args should parse");
        assert_eq!(parsed.command, Command::Run);
        assert_eq!(parsed.config_path, PathBuf::from("./chainfold.jsonc"));
    }

    #[test]
    fn score_takes_an_optional_trace_path() {
        let parsed =
            parse_args(strings(&["--config", "c.jsonc", "score", "old.jsonl"])).expect("parse");
        assert_eq!(parsed.config_path, PathBuf::from("c.jsonc"));
        assert_eq!(
            parsed.command,
            Command::Score {
                trace: Some(PathBuf::from("old.jsonl"))
            }
        );

        let parsed = parse_args(strings(&["score", "--config", "c.jsonc"])).expect("parse");
        assert_eq!(parsed.command, Command::Score { trace: None });
    }

    #[test]
    fn out_flag_is_rejected_outside_finetune_set() {
        let err = parse_args(strings(&["run", "--out", "d"])).expect_err("must fail");
        assert!(err.to_string().contains("--out"));

        let parsed = parse_args(strings(&["finetune-set", "--out", "d"])).expect("parse");
        assert_eq!(
            parsed.command,
            Command::FinetuneSet {
                out: Some(PathBuf::from("d"))
            }
        );
    }

    #[test]
    fn missing_command_is_an_error() {
        let err = parse_args(strings(&["--config", "c.jsonc"])).expect_err("must fail");
        assert!(err.to_string().contains("usage:"));
    }
}
