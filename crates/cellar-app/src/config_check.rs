use std::path::Path;

use cellar_irc::is_channel_name;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CheckResult {
    pub name: &'static str,
    pub severity: Severity,
    pub passed: bool,
    pub message: String,
}

impl CheckResult {
    fn new(name: &'static str, severity: Severity, passed: bool, message: String) -> Self {
        Self {
            name,
            severity,
            passed,
            message,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct CheckReport {
    pub results: Vec<CheckResult>,
}

impl CheckReport {
    pub(crate) fn push(&mut self, result: CheckResult) {
        self.results.push(result);
    }

    pub(crate) fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn error_count(&self) -> usize {
        self.failed(Severity::Error)
    }

    fn warning_count(&self) -> usize {
        self.failed(Severity::Warning)
    }

    fn failed(&self, severity: Severity) -> usize {
        self.results
            .iter()
            .filter(|r| r.severity == severity && !r.passed)
            .count()
    }

    fn format_result(r: &CheckResult) -> String {
        let icon = match (r.severity, r.passed) {
            (Severity::Info, _) => "·",
            (_, true) => "✓",
            (Severity::Warning, false) => "⚠",
            (Severity::Error, false) => "✗",
        };
        format!("{icon} {}", r.message)
    }

    pub(crate) fn to_summary_string(&self) -> String {
        let mut lines: Vec<String> = self.results.iter().map(Self::format_result).collect();
        let errors = self.error_count();
        let warnings = self.warning_count();
        if errors == 0 && warnings == 0 {
            lines.push("\nall checks passed".to_owned());
        } else {
            lines.push(format!("\n{errors} error(s), {warnings} warning(s)"));
        }
        lines.join("\n")
    }

    pub(crate) fn to_json_value(&self) -> serde_json::Value {
        let checks: Vec<serde_json::Value> = self
            .results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "name": r.name,
                    "severity": r.severity.as_str(),
                    "passed": r.passed,
                    "message": r.message,
                })
            })
            .collect();

        serde_json::json!({
            "passed": !self.has_errors(),
            "errors": self.error_count(),
            "warnings": self.warning_count(),
            "checks": checks,
        })
    }
}

/// Validate the config at `config_path`. A missing file is not an error
/// unless it was named explicitly.
pub(crate) fn validate_config(config_path: &Path, explicit: bool) -> CheckReport {
    let mut report = CheckReport::default();

    let config = if !explicit && !config_path.exists() {
        report.push(CheckResult::new(
            "config_file",
            Severity::Info,
            true,
            format!("no {} found, using defaults", config_path.display()),
        ));
        Config::default()
    } else {
        match Config::load(config_path) {
            Ok(config) => {
                report.push(CheckResult::new(
                    "toml_parse",
                    Severity::Error,
                    true,
                    format!("{} parsed", config_path.display()),
                ));
                config
            }
            Err(error) => {
                report.push(CheckResult::new(
                    "toml_parse",
                    Severity::Error,
                    false,
                    format!("{error:#}"),
                ));
                return report;
            }
        }
    };

    check_irc(&config, &mut report);
    check_wizard(&config, &mut report);
    check_home(&config, &mut report);
    report
}

fn check_irc(config: &Config, report: &mut CheckReport) {
    let irc = &config.irc;
    if !irc.enabled {
        report.push(CheckResult::new(
            "irc_enabled",
            Severity::Info,
            true,
            "support chat disabled".to_owned(),
        ));
        return;
    }

    report.push(CheckResult::new(
        "irc_host",
        Severity::Error,
        !irc.host.trim().is_empty() && irc.port != 0,
        format!("chat server {}:{}", irc.host, irc.port),
    ));

    let nick_ok = !irc.nick.is_empty()
        && irc.nick.len() <= 30
        && !irc.nick.starts_with(|c: char| c.is_ascii_digit() || c == '-')
        && !irc.nick.contains([' ', ',', '*', '?', '!', '@', '#']);
    report.push(CheckResult::new(
        "irc_nick",
        Severity::Error,
        nick_ok,
        format!("nickname {:?}", irc.nick),
    ));

    report.push(CheckResult::new(
        "irc_home_channel",
        Severity::Error,
        is_channel_name(&irc.home_channel) && !irc.home_channel.contains(' '),
        format!("home channel {:?}", irc.home_channel),
    ));

    report.push(CheckResult::new(
        "irc_admin_nick",
        Severity::Warning,
        !irc.admin_nick.is_empty(),
        if irc.admin_nick.is_empty() {
            "no access bot configured, private messages will be refused".to_owned()
        } else {
            format!("access bot {}", irc.admin_nick)
        },
    ));
}

fn check_wizard(config: &Config, report: &mut CheckReport) {
    let wizard = &config.wizard;
    let end = u32::from(wizard.port_start) + u32::from(wizard.port_span);
    let passed = wizard.port_span > 0 && wizard.port_start > 0 && end <= 65_536;
    report.push(CheckResult::new(
        "wizard_ports",
        Severity::Error,
        passed,
        format!(
            "wizard ports {}..{}",
            wizard.port_start,
            end.saturating_sub(1)
        ),
    ));
}

fn check_home(config: &Config, report: &mut CheckReport) {
    let home = config.paths.home_dir();
    let (severity, passed, message) = if home.is_dir() {
        (Severity::Error, true, format!("home {}", home.display()))
    } else if home.exists() {
        (
            Severity::Error,
            false,
            format!("home {} is not a directory", home.display()),
        )
    } else {
        (
            Severity::Warning,
            true,
            format!("home {} will be created", home.display()),
        )
    };
    report.push(CheckResult::new("home_dir", severity, passed, message));
}
