use std::collections::BTreeSet;
use std::error::Error;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::model::routing::{Metric, RouterId};

pub const PORT_MIN: i64 = 1024;
pub const PORT_MAX: i64 = 64000;

pub const DEFAULT_PERIOD: u64 = 30;
pub const DEFAULT_TIMEOUT: u64 = 180;
pub const DEFAULT_GARBAGE: u64 = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub port: u16,
    pub metric: Metric,
    pub router_id: RouterId,
}

/// Validated configuration record for one router process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    pub id: RouterId,
    pub inputs: Vec<u16>,
    pub outputs: Vec<OutputConfig>,
    pub period: u64,
    pub timeout: u64,
    pub garbage: u64,
}

#[derive(Debug, Error)]
pub enum ValueError {
    #[error("'{0}' must be a valid integer")]
    NotANumber(String),
    #[error("port {0} out of range ({PORT_MIN}-{PORT_MAX})")]
    PortOutOfRange(i64),
    #[error("metric {0} out of range (1-16)")]
    MetricOutOfRange(i64),
    #[error("router-id {0} must be non-negative")]
    NegativeRouterId(i64),
    #[error("time {0} must be at least 1")]
    TimeOutOfRange(i64),
    #[error("port {0} already in use")]
    PortCollision(u16),
    #[error("router-id {0} already in use")]
    RouterIdCollision(RouterId),
}

#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error("directive appears more than once")]
    Duplicate,
    #[error("invalid directive")]
    Unknown,
    #[error("empty {0} list")]
    Empty(&'static str),
    #[error("output {index}: expected port-metric-id")]
    OutputFormat { index: usize },
    #[error("output {index}")]
    Output {
        index: usize,
        #[source]
        source: ValueError,
    },
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error("period must be at least 1, equal to timeout/6 and garbage/8")]
    PeriodRatio,
    #[error("timeout must be at least 6, equal to 6*period and 3/4*garbage")]
    TimeoutRatio,
    #[error("garbage must be at least 8, equal to 8*period and 4/3*timeout")]
    GarbageRatio,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}")]
    Line {
        line: usize,
        #[source]
        source: DirectiveError,
    },
    #[error("missing {0} directive")]
    Missing(&'static str),
}

/// Renders an error and its cause chain, one cause per line, each level
/// indented one step further.
pub fn render_causes(error: &dyn Error) -> String {
    let mut lines = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(format!("{}{}", "\t".repeat(lines.len()), cause));
        source = cause.source();
    }
    lines.join("\n")
}

pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&text)
}

pub fn parse_config(text: &str) -> Result<RouterConfig, ConfigError> {
    let mut builder = ConfigBuilder::default();
    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        builder
            .apply_line(line)
            .map_err(|source| ConfigError::Line {
                line: index + 1,
                source,
            })?;
    }
    builder.finish()
}

#[derive(Debug, Default)]
struct ConfigBuilder {
    id: Option<RouterId>,
    inputs: Vec<u16>,
    outputs: Vec<OutputConfig>,
    period: Option<u64>,
    timeout: Option<u64>,
    garbage: Option<u64>,
    used_ports: BTreeSet<u16>,
    used_ids: BTreeSet<RouterId>,
}

impl ConfigBuilder {
    fn apply_line(&mut self, line: &str) -> Result<(), DirectiveError> {
        let (directive, rest) = match line.split_once(char::is_whitespace) {
            Some((directive, rest)) => (directive, rest.trim()),
            None => (line, ""),
        };

        match directive {
            "router-id" => {
                if self.id.is_some() {
                    return Err(DirectiveError::Duplicate);
                }
                self.id = Some(validate_id(rest, &mut self.used_ids)?);
            }
            "input-ports" => {
                if !self.inputs.is_empty() {
                    return Err(DirectiveError::Duplicate);
                }
                self.add_inputs(rest)?;
            }
            "outputs" => {
                if !self.outputs.is_empty() {
                    return Err(DirectiveError::Duplicate);
                }
                self.add_outputs(rest)?;
            }
            "period" => {
                if self.period.is_some() {
                    return Err(DirectiveError::Duplicate);
                }
                self.set_period(rest)?;
            }
            "timeout" => {
                if self.timeout.is_some() {
                    return Err(DirectiveError::Duplicate);
                }
                self.set_timeout(rest)?;
            }
            "garbage" => {
                if self.garbage.is_some() {
                    return Err(DirectiveError::Duplicate);
                }
                self.set_garbage(rest)?;
            }
            _ => return Err(DirectiveError::Unknown),
        }
        Ok(())
    }

    fn add_inputs(&mut self, rest: &str) -> Result<(), DirectiveError> {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(DirectiveError::Empty("input port"));
        }
        for token in tokens {
            let port = validate_port(token.trim_end_matches(','), &mut self.used_ports)?;
            self.inputs.push(port);
        }
        Ok(())
    }

    fn add_outputs(&mut self, rest: &str) -> Result<(), DirectiveError> {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(DirectiveError::Empty("output"));
        }
        for (position, token) in tokens.iter().enumerate() {
            let index = position + 1;
            let fields: Vec<&str> = token.trim_end_matches(',').split('-').collect();
            if fields.len() != 3 {
                return Err(DirectiveError::OutputFormat { index });
            }
            let wrap = |source| DirectiveError::Output { index, source };
            let port = validate_port(fields[0], &mut self.used_ports).map_err(wrap)?;
            let metric = validate_metric(fields[1]).map_err(wrap)?;
            let router_id = validate_id(fields[2], &mut self.used_ids).map_err(wrap)?;
            self.outputs.push(OutputConfig {
                port,
                metric,
                router_id,
            });
        }
        Ok(())
    }

    fn set_period(&mut self, rest: &str) -> Result<(), DirectiveError> {
        let period = validate_time(rest)?;
        let timeout_ok = self.timeout.is_none_or(|timeout| timeout == 6 * period);
        let garbage_ok = self.garbage.is_none_or(|garbage| garbage == 8 * period);
        if !timeout_ok || !garbage_ok {
            return Err(DirectiveError::PeriodRatio);
        }
        self.period = Some(period);
        Ok(())
    }

    fn set_timeout(&mut self, rest: &str) -> Result<(), DirectiveError> {
        let timeout = validate_time(rest)?;
        let period_ok = self.period.is_none_or(|period| timeout == 6 * period);
        let garbage_ok = self.garbage.is_none_or(|garbage| 4 * timeout == 3 * garbage);
        if timeout < 6 || !period_ok || !garbage_ok {
            return Err(DirectiveError::TimeoutRatio);
        }
        self.timeout = Some(timeout);
        Ok(())
    }

    fn set_garbage(&mut self, rest: &str) -> Result<(), DirectiveError> {
        let garbage = validate_time(rest)?;
        let period_ok = self.period.is_none_or(|period| garbage == 8 * period);
        let timeout_ok = self.timeout.is_none_or(|timeout| 4 * timeout == 3 * garbage);
        if garbage < 8 || !period_ok || !timeout_ok {
            return Err(DirectiveError::GarbageRatio);
        }
        self.garbage = Some(garbage);
        Ok(())
    }

    fn finish(self) -> Result<RouterConfig, ConfigError> {
        let Some(id) = self.id else {
            return Err(ConfigError::Missing("router-id"));
        };
        if self.inputs.is_empty() {
            return Err(ConfigError::Missing("input-ports"));
        }

        let (period, timeout, garbage) = match (self.period, self.timeout, self.garbage) {
            (Some(period), _, _) => (period, 6 * period, 8 * period),
            (None, Some(timeout), _) => (timeout / 6, timeout, timeout * 4 / 3),
            (None, None, Some(garbage)) => (garbage / 8, garbage * 3 / 4, garbage),
            (None, None, None) => (DEFAULT_PERIOD, DEFAULT_TIMEOUT, DEFAULT_GARBAGE),
        };

        Ok(RouterConfig {
            id,
            inputs: self.inputs,
            outputs: self.outputs,
            period,
            timeout,
            garbage,
        })
    }
}

fn parse_int(text: &str) -> Result<i64, ValueError> {
    text.parse::<i64>()
        .map_err(|_| ValueError::NotANumber(text.to_string()))
}

fn validate_port(text: &str, used: &mut BTreeSet<u16>) -> Result<u16, ValueError> {
    let value = parse_int(text)?;
    if !(PORT_MIN..=PORT_MAX).contains(&value) {
        return Err(ValueError::PortOutOfRange(value));
    }
    let port = value as u16;
    if !used.insert(port) {
        return Err(ValueError::PortCollision(port));
    }
    Ok(port)
}

fn validate_metric(text: &str) -> Result<Metric, ValueError> {
    let value = parse_int(text)?;
    if !(1..=16).contains(&value) {
        return Err(ValueError::MetricOutOfRange(value));
    }
    Ok(value as Metric)
}

fn validate_id(text: &str, used: &mut BTreeSet<RouterId>) -> Result<RouterId, ValueError> {
    let value = parse_int(text)?;
    if value < 0 {
        return Err(ValueError::NegativeRouterId(value));
    }
    let id = value as RouterId;
    if !used.insert(id) {
        return Err(ValueError::RouterIdCollision(id));
    }
    Ok(id)
}

fn validate_time(text: &str) -> Result<u64, ValueError> {
    let value = parse_int(text)?;
    if value < 1 {
        return Err(ValueError::TimeOutOfRange(value));
    }
    Ok(value as u64)
}
