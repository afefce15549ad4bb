use std::error::Error;
use std::path::Path;

use super::{print_json, CmdResult, Context};
use crate::api::PlannerBackend;
use crate::cli::commands::{GenerateArgs, OcrArgs, RefineArgs};
use crate::cli::output::{outcome_to_json, print_check, print_merge_report};
use crate::session::{BrainDump, Outcome, RefineMode, Session};

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Run OCR over an image and return `(file name, text)`
fn read_image(
    session: &Session,
    backend: &dyn PlannerBackend,
    path: &str,
) -> Result<(String, String), Box<dyn Error>> {
    let bytes = std::fs::read(path).map_err(|e| format!("could not read {}: {}", path, e))?;
    let name = file_name(path);
    let text = session.extract_text(backend, &name, bytes)?;
    Ok((name, text))
}

fn report(outcome: &Outcome, session: &Session, json: bool) -> CmdResult {
    if json {
        return print_json(&outcome_to_json(outcome));
    }
    if let Some(report) = &outcome.merge {
        print_merge_report(report);
    }
    println!("Stage: {}\n", outcome.stage);
    println!("{}", session.summary_view().trim_end());
    if !outcome.check.errors.is_empty() || !outcome.check.warnings.is_empty() {
        println!();
        print_check(&outcome.check);
    }
    Ok(())
}

pub fn cmd_generate(args: GenerateArgs, json: bool) -> CmdResult {
    let mut ctx = Context::open()?;
    let mut session = ctx.session()?;
    let backend = ctx.backend()?;
    if args.fresh {
        session.clear();
    }

    let mut dump = BrainDump {
        texts: args.text,
        files: Vec::new(),
        context: args.context,
    };
    for path in &args.files {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("could not read {}: {}", path, e))?;
        dump.files.push((file_name(path), content));
    }
    for path in &args.images {
        let (name, text) = read_image(&session, &backend, path)?;
        if text.trim().is_empty() {
            eprintln!("warning: no text found in {}", name);
            continue;
        }
        dump.files.push((name, text));
    }

    let outcome = session.generate(&backend, &dump)?;
    ctx.persist(&session)?;
    report(&outcome, &session, json)
}

pub fn cmd_refine(args: RefineArgs, json: bool) -> CmdResult {
    let mut ctx = Context::open()?;
    let mut session = ctx.session()?;
    let backend = ctx.backend()?;
    let mode = if args.selected {
        RefineMode::Selected
    } else {
        RefineMode::Full
    };

    let outcome = session.refine(&backend, mode)?;
    ctx.persist(&session)?;
    report(&outcome, &session, json)
}

pub fn cmd_ocr(args: OcrArgs, json: bool) -> CmdResult {
    let ctx = Context::open()?;
    let session = ctx.session()?;
    let backend = ctx.backend()?;
    let (name, text) = read_image(&session, &backend, &args.image)?;
    if json {
        return print_json(&serde_json::json!({ "file": name, "text": text }));
    }
    println!("{}", text);
    Ok(())
}

pub fn cmd_health(json: bool) -> CmdResult {
    let ctx = Context::open()?;
    let backend = ctx.backend()?;
    let status = backend.health()?;
    if json {
        return print_json(&serde_json::json!({
            "url": ctx.ws.config.backend.url,
            "status": status.status,
        }));
    }
    println!("{}: {}", ctx.ws.config.backend.url, status.status);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_strips_directories() {
        assert_eq!(file_name("notes/monday.txt"), "monday.txt");
        assert_eq!(file_name("scan.png"), "scan.png");
    }
}
