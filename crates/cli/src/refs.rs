use crate::WorkspaceArgs;
use sqlnav_api::{Code, ReferenceLocation};
use sqlnav_core::RecomputeOutcome;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct ReferenceView {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Line")]
    line: usize,
    #[tabled(rename = "Col")]
    column: usize,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Member")]
    member: String,
    #[tabled(rename = "Source")]
    preview: String,
}

impl ReferenceView {
    fn from_location(location: &ReferenceLocation, sources: &mut SourceLines) -> Self {
        Self {
            file: location.file.display().to_string(),
            line: location.range.start_line + 1,
            column: location.range.start_col + 1,
            unit: location.context.unit.clone(),
            member: location
                .context
                .member
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            preview: sources
                .line(&location.file, location.range.start_line)
                .map(preview)
                .unwrap_or_default(),
        }
    }
}

const PREVIEW_CHARS: usize = 80;

/// Source files read once per listing, split into lines.
#[derive(Default)]
struct SourceLines {
    files: HashMap<PathBuf, Option<Vec<String>>>,
}

impl SourceLines {
    fn line(&mut self, file: &Path, index: usize) -> Option<&str> {
        let lines = self.files.entry(file.to_path_buf()).or_insert_with(|| {
            std::fs::read_to_string(file)
                .ok()
                .map(|text| text.lines().map(str::to_string).collect())
        });
        lines.as_ref()?.get(index).map(String::as_str)
    }
}

/// The trimmed line, cut to a table-friendly width.
fn preview(line: &str) -> String {
    let line = line.trim();
    if line.chars().count() <= PREVIEW_CHARS {
        return line.to_string();
    }
    let cut: String = line.chars().take(PREVIEW_CHARS - 3).collect();
    format!("{cut}...")
}

#[derive(Tabled)]
struct CodeView {
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "References")]
    references: usize,
}

pub async fn run(args: WorkspaceArgs, code: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = args.open(false).await?;

    if !workspace.analysis_enabled() {
        return Err("reference analysis is off: set SqlLoaderMetaPrefix or --loader-type".into());
    }
    // A one-shot pass needs a listener to run at all
    let id = workspace.subscribe(|| {});
    match workspace.recompute_now().await {
        Some(RecomputeOutcome::Failed(message)) => return Err(message.into()),
        Some(outcome) => tracing::debug!("Reference pass: {:?}", outcome),
        None => {}
    }
    workspace.unsubscribe(id);

    match code {
        Some(code) => {
            let code = Code::new(code.trim());
            let references = workspace.references(&code);
            println!("{} references to {}", references.len(), code);
            if !references.is_empty() {
                let mut sources = SourceLines::default();
                let views: Vec<ReferenceView> = references
                    .iter()
                    .map(|location| ReferenceView::from_location(location, &mut sources))
                    .collect();
                println!("{}", Table::new(&views).with(Style::psql()));
            }
        }
        None => {
            let mut views: Vec<CodeView> = workspace
                .prefix_search("")
                .into_iter()
                .map(|code| CodeView {
                    references: workspace.references(&code).len(),
                    code: code.to_string(),
                })
                .collect();
            views.sort_by(|a, b| b.references.cmp(&a.references).then(a.code.cmp(&b.code)));
            println!("{}", Table::new(&views).with(Style::psql()));
        }
    }
    Ok(())
}
