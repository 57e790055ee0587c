use std::{io, path::Path, process::Stdio, time::Duration};

use eyre::{Context, ContextCompat, Result, bail};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::{
    fs::{read_to_string, rename, write},
    process::Command,
};
use tracing::debug;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("waiting on {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} failed with {status}, err: {stderr}")]
    Exited {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

/// Runs `program` to completion and returns its stdout.
///
/// The child is killed if it is still running when `timeout` elapses.
pub async fn command_output_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<String, CommandError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CommandError::Spawn {
            program: program.to_owned(),
            source,
        })?;
    debug!("Spawned {program} pid={:?}", child.id());

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => output.map_err(|source| CommandError::Wait {
            program: program.to_owned(),
            source,
        })?,
        Err(_) => {
            return Err(CommandError::TimedOut {
                program: program.to_owned(),
                timeout,
            });
        }
    };

    if !output.status.success() {
        return Err(CommandError::Exited {
            program: program.to_owned(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub async fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = read_to_string(path)
        .await
        .context(format!("Reading {}", path.display()))?;
    serde_json::from_str(&content).context(format!("Parsing {}", path.display()))
}

/// Writes `value` as pretty JSON to a temp file, then renames it over `path`
pub async fn write_json_file<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .and_then(|x| x.to_str())
        .context(format!("Invalid file path {}", path.display()))?;
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    write(&tmp_path, serde_json::to_string_pretty(value)?)
        .await
        .context(format!("Writing {}", tmp_path.display()))?;
    rename(&tmp_path, path)
        .await
        .context(format!("Replacing {}", path.display()))?;
    Ok(())
}

/// Parses a fio style time value, bare numbers are seconds
pub fn parse_time(time: &str) -> Result<Duration> {
    let time = time.trim().to_lowercase();
    let split = time
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(time.len());
    let (value, unit) = time.split_at(split);
    let value = value
        .parse::<u64>()
        .context(format!("Parse time: {time}"))?;

    let secs = |scale: u64| {
        value
            .checked_mul(scale)
            .map(Duration::from_secs)
            .context(format!("Time out of range: {time}"))
    };

    Ok(match unit {
        "" | "s" => Duration::from_secs(value),
        "us" => Duration::from_micros(value),
        "ms" => Duration::from_millis(value),
        "m" => secs(60)?,
        "h" => secs(60 * 60)?,
        "d" => secs(60 * 60 * 24)?,
        _ => bail!("Unsupported time unit in {time}"),
    })
}
