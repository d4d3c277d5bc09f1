//! `rowgate check` command implementation.
//!
//! Loads the configuration the same way the other commands do and reports
//! every problem at once:
//! - structural validation (`RowgateConfig::validate`)
//! - table settings naming the same column as both excluded and identity
//! - connections whose engine has no built-in driver

use anyhow::Result;
use std::path::Path;

use rowgate_core::RowgateConfig;

// ============================================================================
// Check Result Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    pub category: &'static str,
    pub message: String,
    /// Location within the configuration (e.g. "tables.shop.users").
    pub location: Option<String>,
}

impl CheckFinding {
    fn error(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            category,
            message: message.into(),
            location: None,
        }
    }

    fn warning(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(category, message)
        }
    }

    fn info(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            ..Self::error(category, message)
        }
    }

    fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

#[derive(Debug, Default)]
pub struct CheckResults {
    pub findings: Vec<CheckFinding>,
}

impl CheckResults {
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn print_summary(&self) {
        let mut findings: Vec<&CheckFinding> = self.findings.iter().collect();
        findings.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.category.cmp(b.category)));

        for finding in findings {
            match &finding.location {
                Some(location) => println!(
                    "[{}] {}: {} ({})",
                    finding.severity, finding.category, finding.message, location
                ),
                None => println!("[{}] {}: {}", finding.severity, finding.category, finding.message),
            }
        }

        println!();
        if self.has_errors() {
            println!(
                "Configuration has {} error(s) and {} warning(s).",
                self.count(Severity::Error),
                self.count(Severity::Warning)
            );
        } else {
            println!("All checks passed ({} warning(s)).", self.count(Severity::Warning));
        }
    }
}

// ============================================================================
// Checks
// ============================================================================

/// Run every check against the configuration at `path`.
pub fn run_checks(path: &Path) -> CheckResults {
    let mut results = CheckResults::default();

    let config = match RowgateConfig::load_with_context(path) {
        Ok(config) => config,
        Err(e) => {
            results
                .findings
                .push(CheckFinding::error("load", e.to_string()).with_location(path.display().to_string()));
            return results;
        }
    };

    if let Err(e) = config.validate() {
        results.findings.push(CheckFinding::error("config", e.to_string()));
    }
    results.findings.extend(check_table_settings(&config));
    results.findings.extend(check_drivers(&config));
    results.findings.push(CheckFinding::info(
        "summary",
        format!(
            "{} connection(s), {} group(s)",
            config.connections.len(),
            config.groups.len()
        ),
    ));
    results
}

fn check_table_settings(config: &RowgateConfig) -> Vec<CheckFinding> {
    let mut findings = Vec::new();
    for (connection_id, tables) in &config.tables {
        for (table, settings) in tables {
            let location = format!("tables.{}.{}", connection_id, table);
            if let Some(identity) = &settings.identity_column
                && settings.is_excluded(identity)
            {
                findings.push(
                    CheckFinding::warning(
                        "tables",
                        format!("identity column '{}' is also excluded and will be hidden", identity),
                    )
                    .with_location(&location),
                );
            }
            if let Some(field) = &settings.ordering_field
                && settings.is_excluded(field)
            {
                findings.push(
                    CheckFinding::warning(
                        "tables",
                        format!("ordering field '{}' is excluded, primary key order is used", field),
                    )
                    .with_location(&location),
                );
            }
        }
    }
    findings
}

fn check_drivers(config: &RowgateConfig) -> Vec<CheckFinding> {
    config
        .connections
        .iter()
        .filter(|(_, c)| !rowgate_adapter_sqlx::supports(c.kind))
        .map(|(id, c)| {
            CheckFinding::warning(
                "connections",
                format!("no built-in driver for {}; this connection is skipped by the CLI", c.kind),
            )
            .with_location(format!("connections.{}", id))
        })
        .collect()
}

/// `rowgate check`: print findings and fail when any is an error.
pub fn run(path: &Path) -> Result<()> {
    println!("Checking {}", path.display());
    let results = run_checks(path);
    results.print_summary();
    if results.has_errors() {
        anyhow::bail!("configuration check failed");
    }
    Ok(())
}
