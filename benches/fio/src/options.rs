use std::{convert::Infallible, fmt, str::FromStr};

use common::util::parse_time;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scalar value of a fio option as written in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn int(item: bool) -> u8 {
    if item { 1 } else { 0 }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", int(*b)),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(x) => write!(f, "{x}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl ParamValue {
    fn as_u64(&self) -> Option<u64> {
        match self {
            ParamValue::Int(i) => u64::try_from(*i).ok(),
            ParamValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn is_switch(&self) -> bool {
        match self {
            ParamValue::Bool(_) => true,
            ParamValue::Int(i) => *i == 0 || *i == 1,
            ParamValue::Text(s) => s == "0" || s == "1",
            ParamValue::Float(_) => false,
        }
    }

    fn is_text(&self) -> bool {
        matches!(self, ParamValue::Text(s) if !s.trim().is_empty())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("invalid value '{value}' for --{key}, expected {expected}")]
pub struct OptionError {
    pub key: String,
    pub value: String,
    pub expected: &'static str,
}

const WORKLOADS: &[&str] = &[
    "read",
    "write",
    "rw",
    "readwrite",
    "randread",
    "randwrite",
    "randrw",
    "trim",
    "randtrim",
    "trimwrite",
    "randtrimwrite",
];

const OUTPUT_FORMATS: &[&str] = &["normal", "terse", "json", "json+"];

/// fio options the monitor knows how to check. Anything else is passed
/// through to fio untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FioOption {
    Name,
    IoEngine,
    Direct,
    Rw,
    RwMixRead,
    RwMixWrite,
    Bs,
    IoDepth,
    Size,
    Runtime,
    RampTime,
    TimeBased,
    NumJobs,
    Filename,
    OutputFormat,
    Other(String),
}

impl FioOption {
    pub fn key(&self) -> &str {
        match self {
            FioOption::Name => "name",
            FioOption::IoEngine => "ioengine",
            FioOption::Direct => "direct",
            FioOption::Rw => "rw",
            FioOption::RwMixRead => "rwmixread",
            FioOption::RwMixWrite => "rwmixwrite",
            FioOption::Bs => "bs",
            FioOption::IoDepth => "iodepth",
            FioOption::Size => "size",
            FioOption::Runtime => "runtime",
            FioOption::RampTime => "ramp_time",
            FioOption::TimeBased => "time_based",
            FioOption::NumJobs => "numjobs",
            FioOption::Filename => "filename",
            FioOption::OutputFormat => "output-format",
            FioOption::Other(key) => key,
        }
    }

    /// Command line pair, flag and value as separate arguments
    pub fn args(&self, value: &ParamValue) -> [String; 2] {
        [format!("--{}", self.key()), value.to_string()]
    }

    pub fn validate(&self, value: &ParamValue) -> Result<(), OptionError> {
        let (valid, expected) = match self {
            FioOption::Rw => (
                matches!(value, ParamValue::Text(s) if WORKLOADS.contains(&s.as_str())),
                "a fio workload such as randrw",
            ),
            FioOption::RwMixRead | FioOption::RwMixWrite => (
                value.as_u64().is_some_and(|x| x <= 100),
                "a percentage between 0 and 100",
            ),
            FioOption::IoDepth | FioOption::NumJobs => (
                value.as_u64().is_some_and(|x| x > 0),
                "a positive integer",
            ),
            FioOption::Direct | FioOption::TimeBased => (value.is_switch(), "a boolean or 0/1"),
            FioOption::Runtime | FioOption::RampTime => (
                match value {
                    ParamValue::Int(i) => *i >= 0,
                    ParamValue::Text(s) => parse_time(s).is_ok(),
                    _ => false,
                },
                "a duration such as 120 or 60s",
            ),
            FioOption::Bs | FioOption::Size => (
                value.as_u64().is_some_and(|x| x > 0) || value.is_text(),
                "a size such as 8k or 1G",
            ),
            FioOption::OutputFormat => (
                matches!(value, ParamValue::Text(s) if s.split(',').all(|f| OUTPUT_FORMATS.contains(&f.trim()))),
                "one or more of normal, terse, json, json+",
            ),
            FioOption::Name | FioOption::IoEngine | FioOption::Filename => {
                (value.is_text(), "a non-empty string")
            }
            FioOption::Other(_) => (true, ""),
        };

        if valid {
            Ok(())
        } else {
            Err(OptionError {
                key: self.key().to_owned(),
                value: value.to_string(),
                expected,
            })
        }
    }
}

impl FromStr for FioOption {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "name" => FioOption::Name,
            "ioengine" => FioOption::IoEngine,
            "direct" => FioOption::Direct,
            "rw" => FioOption::Rw,
            "rwmixread" => FioOption::RwMixRead,
            "rwmixwrite" => FioOption::RwMixWrite,
            "bs" => FioOption::Bs,
            "iodepth" => FioOption::IoDepth,
            "size" => FioOption::Size,
            "runtime" => FioOption::Runtime,
            "ramp_time" => FioOption::RampTime,
            "time_based" => FioOption::TimeBased,
            "numjobs" => FioOption::NumJobs,
            "filename" => FioOption::Filename,
            "output-format" => FioOption::OutputFormat,
            other => FioOption::Other(other.to_owned()),
        })
    }
}

impl fmt::Display for FioOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn option(key: &str) -> FioOption {
        key.parse().unwrap()
    }

    #[test]
    fn values_format_for_the_command_line() {
        assert_eq!(
            FioOption::Direct.args(&ParamValue::Bool(true)),
            ["--direct".to_owned(), "1".to_owned()]
        );
        assert_eq!(
            FioOption::Runtime.args(&ParamValue::Int(10)),
            ["--runtime".to_owned(), "10".to_owned()]
        );
        assert_eq!(ParamValue::Float(2.5).to_string(), "2.5");
        assert_eq!(
            option("zonemode").args(&ParamValue::Text("zbd".to_owned())),
            ["--zonemode".to_owned(), "zbd".to_owned()]
        );
    }

    #[test]
    fn unknown_keys_pass_through() {
        assert_eq!(option("bs"), FioOption::Bs);
        assert_eq!(option("output-format"), FioOption::OutputFormat);
        assert_eq!(option("verify"), FioOption::Other("verify".to_owned()));
        assert_eq!(option("blocksize"), FioOption::Other("blocksize".to_owned()));
        assert_eq!(option("readwrite").key(), "readwrite");
        assert!(
            option("verify")
                .validate(&ParamValue::Text("md5".to_owned()))
                .is_ok()
        );
    }

    #[test]
    fn known_options_are_validated() {
        let text = |s: &str| ParamValue::Text(s.to_owned());

        assert!(FioOption::Rw.validate(&text("randrw")).is_ok());
        assert_eq!(
            FioOption::Rw.validate(&text("sideways")),
            Err(OptionError {
                key: "rw".to_owned(),
                value: "sideways".to_owned(),
                expected: "a fio workload such as randrw",
            })
        );
        assert!(FioOption::RwMixRead.validate(&ParamValue::Int(60)).is_ok());
        assert!(FioOption::RwMixRead.validate(&ParamValue::Int(160)).is_err());
        assert!(FioOption::IoDepth.validate(&ParamValue::Int(0)).is_err());
        assert!(FioOption::IoDepth.validate(&text("32")).is_ok());
        assert!(FioOption::Direct.validate(&ParamValue::Int(1)).is_ok());
        assert!(FioOption::Direct.validate(&ParamValue::Int(2)).is_err());
        assert!(FioOption::Runtime.validate(&text("2m")).is_ok());
        assert!(FioOption::Runtime.validate(&ParamValue::Float(1.5)).is_err());
        assert!(FioOption::Bs.validate(&text("8k")).is_ok());
        assert!(FioOption::OutputFormat.validate(&text("json")).is_ok());
        assert!(FioOption::OutputFormat.validate(&text("normal,json+")).is_ok());
        assert!(FioOption::OutputFormat.validate(&text("xml")).is_err());
        assert!(FioOption::Filename.validate(&text("")).is_err());
    }
}
