use std::path::Path;

use customers_core::config::{AppConfig, LoadOptions, StorageBackend};
use customers_db::{FileLogCustomerRepository, StaticPrivilegeRepository};
use serde::Serialize;

use crate::commands::{runtime, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            match runtime() {
                Ok(runtime) => {
                    checks.push(runtime.block_on(check_privilege_source(&config)));
                    checks.push(runtime.block_on(check_storage(&config)));
                }
                Err(error) => {
                    let details = format!("failed to initialize async runtime: {error}");
                    checks.push(DoctorCheck {
                        name: "privilege_source",
                        status: CheckStatus::Fail,
                        details: details.clone(),
                    });
                    checks.push(DoctorCheck {
                        name: "customer_storage",
                        status: CheckStatus::Fail,
                        details,
                    });
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["privilege_source", "customer_storage"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

async fn check_privilege_source(config: &AppConfig) -> DoctorCheck {
    let Some(path) = config.privileges.path.as_deref() else {
        return DoctorCheck {
            name: "privilege_source",
            status: CheckStatus::Fail,
            details: "privileges.path is not set".to_string(),
        };
    };

    match StaticPrivilegeRepository::load(path).await {
        Ok(source) => DoctorCheck {
            name: "privilege_source",
            status: CheckStatus::Pass,
            details: format!("loaded {} token(s) from `{}`", source.token_count(), path.display()),
        },
        Err(error) => DoctorCheck {
            name: "privilege_source",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

async fn check_storage(config: &AppConfig) -> DoctorCheck {
    match (config.storage.backend, config.storage.path.as_deref()) {
        (StorageBackend::Memory, _) => DoctorCheck {
            name: "customer_storage",
            status: CheckStatus::Pass,
            details: "in-memory storage starts empty on every boot".to_string(),
        },
        (StorageBackend::FileLog, Some(path)) if path.exists() => {
            match FileLogCustomerRepository::open(path).await {
                Ok(_) => DoctorCheck {
                    name: "customer_storage",
                    status: CheckStatus::Pass,
                    details: format!("replayed file log `{}`", path.display()),
                },
                Err(error) => DoctorCheck {
                    name: "customer_storage",
                    status: CheckStatus::Fail,
                    details: error.to_string(),
                },
            }
        }
        (StorageBackend::FileLog, Some(path)) => {
            let parent = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            if parent.is_dir() {
                DoctorCheck {
                    name: "customer_storage",
                    status: CheckStatus::Pass,
                    details: format!(
                        "file log `{}` does not exist yet; the server creates it on first start",
                        path.display()
                    ),
                }
            } else {
                DoctorCheck {
                    name: "customer_storage",
                    status: CheckStatus::Fail,
                    details: format!(
                        "directory `{}` for the file log does not exist",
                        parent.display()
                    ),
                }
            }
        }
        (StorageBackend::FileLog, None) => DoctorCheck {
            name: "customer_storage",
            status: CheckStatus::Fail,
            details: "storage.path is required for the file_log backend".to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
