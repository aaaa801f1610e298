use opsdesk_client::{ClientError, WorkflowApi};
use opsdesk_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use crate::runtime;

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

pub fn run(options: &LoadOptions, json_output: bool) -> String {
    let report = build_report(options);

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            let signed_in = check_credential_store(&config, &mut checks);
            if signed_in {
                checks.push(check_api_session(&config));
            } else {
                checks.push(skipped("api_session", "skipped because no session is stored"));
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            let reason = "skipped because configuration did not load";
            checks.push(skipped("credential_store", reason));
            checks.push(skipped("api_session", reason));
        }
    }

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Pushes the store check and reports whether a session is available for the API check.
fn check_credential_store(config: &AppConfig, checks: &mut Vec<DoctorCheck>) -> bool {
    let store = runtime::credentials(config);
    let (status, details, signed_in) = match store.read() {
        Ok(Some(_)) if config.api.token.is_some() => {
            (CheckStatus::Pass, "using api.token from configuration".to_string(), true)
        }
        Ok(Some(session)) => {
            let who = session
                .user
                .map(|user| format!("signed in as {}", user.email))
                .unwrap_or_else(|| "token stored without a profile".to_string());
            (CheckStatus::Pass, format!("{who} (`{}`)", config.session.path.display()), true)
        }
        Ok(None) => (
            CheckStatus::Skipped,
            format!("no session stored at `{}`", config.session.path.display()),
            false,
        ),
        Err(error) => (CheckStatus::Fail, error.to_string(), false),
    };
    checks.push(DoctorCheck { name: "credential_store", status, details });
    signed_in
}

fn check_api_session(config: &AppConfig) -> DoctorCheck {
    let executor = match runtime::build() {
        Ok(executor) => executor,
        Err(error) => {
            return DoctorCheck {
                name: "api_session",
                status: CheckStatus::Fail,
                details: format!("{error:#}"),
            };
        }
    };

    let result = executor.block_on(async {
        let api = runtime::connect(config)?;
        api.current_user().await
    });

    match result {
        Ok(user) => DoctorCheck {
            name: "api_session",
            status: CheckStatus::Pass,
            details: format!("`{}` accepted the session for {}", config.api_base(), user.email),
        },
        Err(ClientError::Unauthenticated) => DoctorCheck {
            name: "api_session",
            status: CheckStatus::Fail,
            details: "the stored session was rejected; sign in again".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "api_session",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn skipped(name: &'static str, reason: &str) -> DoctorCheck {
    DoctorCheck { name, status: CheckStatus::Skipped, details: reason.to_string() }
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
