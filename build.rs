use chrono::DateTime;
use std::io::Write;
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn commit_date(timestamp: &str) -> Option<String> {
    let seconds = timestamp.parse::<i64>().ok()?;
    let date = DateTime::from_timestamp(seconds, 0)?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let version = env!("CARGO_PKG_VERSION");
    let app_version = match git(&["rev-parse", "--short", "HEAD"]) {
        Some(sha) => {
            let date = git(&["log", "-1", "--format=%ct"])
                .as_deref()
                .and_then(commit_date)
                .unwrap_or_else(|| "unknown".to_string());
            format!("{} ({} {})", version, sha, date)
        }
        None => version.to_string(),
    };

    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=.git/HEAD")?;
    writeln!(stdout, "cargo:rustc-env=APP_VERSION={}", app_version)?;

    Ok(())
}
