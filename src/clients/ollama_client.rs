use chrono::NaiveDate;
use tokio::process::Command;

/// Wraps the user's request in the fixed instructions that pin the model to
/// the `-t .. -s .. -d .. -n ..` reply grammar.
pub fn build_rotation_prompt(user_prompt: &str, today: NaiveDate) -> String {
    format!(
        "I want to run a command-line tool that creates calendar events for a team rotation.\n\
         Current date (UTC): {today}\n\
         The tool takes the following flags:\n\
         - -t, --team-members: Comma-separated list of team members, no spaces\n\
         - -s, --start-date: Start date for the rotation in YYYY-MM-DD format\n\
         - -d, --duration: Duration of each member's turn in weeks, e.g. 3\n\
         - -n, --event-name: Name of the event, e.g. SRE-ROLE\n\
         When I ask you to create an event, return the flags with the values I should use.\n\
         Example: \"Create an event called SRE-ROLE for Cesar and Seth that repeats every three weeks starting the first of july\"\n\
         You should return:\n\
         -t Cesar,Seth -s 2024-07-01 -d 3 -n SRE-ROLE\n\
         Example: \"Create an event called Interrupt-catcher for Mulham, Juan and Bryan that repeats every 1 week starting the second of july\"\n\
         You should return:\n\
         -t Mulham,Juan,Bryan -s 2024-07-02 -d 1 -n Interrupt-catcher\n\
         Rules:\n\
         - If the year is omitted, assume the next occurrence of that date on or after the current date.\n\
         - Return only the flags in the exact order shown, on a single line.\n\
         - No additional information, prose, markdown or code fences.\n\
         Now, this is the real ask: {user_prompt}",
        today = today.format("%Y-%m-%d"),
        user_prompt = user_prompt
    )
}

pub async fn generate_rotation_flags(
    prompt: &str,
    today: NaiveDate,
    bin: &str,
    model: &str,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let full_prompt = build_rotation_prompt(prompt, today);
    run_model(bin, model, &full_prompt).await
}

async fn run_model(
    bin: &str,
    model: &str,
    prompt: &str,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    tracing::debug!(bin, model, "running local model");
    let output = Command::new(bin)
        .arg("run")
        .arg(model)
        .arg(prompt)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("failed to start {}: {}", bin, e))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "{} exited with {}: {}",
            bin,
            output.status,
            stderr.trim()
        )
        .into());
    }
    tracing::info!(output = %stdout.trim(), "model output");
    Ok(stdout)
}
