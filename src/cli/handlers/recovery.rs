use chrono::{DateTime, Utc};

use super::{load_workspace_cwd, print_json, CmdResult};
use crate::cli::commands::{RecoveryAction, RecoveryCmd};
use crate::io::recovery;

fn parse_timestamp(raw: &str, flag: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid --{} timestamp '{}': {}", flag, raw, e))
}

pub fn cmd_recovery(args: RecoveryCmd, json: bool) -> CmdResult {
    let ws = load_workspace_cwd()?;

    match args.action {
        Some(RecoveryAction::Path) => {
            println!("{}", recovery::recovery_log_path(&ws.dir).display());
            Ok(())
        }
        Some(RecoveryAction::Prune(prune)) => {
            let before = prune
                .before
                .as_deref()
                .map(|b| parse_timestamp(b, "before"))
                .transpose()?;
            let removed = recovery::prune_recovery(&ws.dir, before, prune.all)?;
            println!("Pruned {} entr{}", removed, if removed == 1 { "y" } else { "ies" });
            Ok(())
        }
        None => {
            let since = args
                .since
                .as_deref()
                .map(|s| parse_timestamp(s, "since"))
                .transpose()?;
            let entries = recovery::read_recovery_entries(&ws.dir, Some(args.limit.unwrap_or(10)), since);

            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("Recovery log is empty");
                return Ok(());
            }
            for entry in &entries {
                println!(
                    "{}  [{}] {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                    entry.category,
                    entry.description
                );
                for (key, value) in &entry.fields {
                    println!("  {}: {}", key, value);
                }
                if !entry.body.is_empty() {
                    for line in entry.body.lines().take(5) {
                        println!("    {}", line);
                    }
                    let extra = entry.body.lines().count().saturating_sub(5);
                    if extra > 0 {
                        println!("    ... ({} more line{})", extra, if extra == 1 { "" } else { "s" });
                    }
                }
            }
            if let Some(summary) = recovery::recovery_summary(&ws.dir)
                && summary.entry_count > entries.len()
            {
                println!("\n{} of {} entries shown", entries.len(), summary.entry_count);
            }
            Ok(())
        }
    }
}
