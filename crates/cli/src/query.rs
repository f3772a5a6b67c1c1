use crate::WorkspaceArgs;
use sqlnav_api::Code;
use std::path::PathBuf;

pub async fn complete(
    args: WorkspaceArgs,
    line: String,
    column: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = args.open(false).await?;
    let caret = column.unwrap_or_else(|| line.chars().count());
    for code in workspace.complete(&line, caret) {
        println!("{}", code);
    }
    Ok(())
}

pub async fn resolve(
    args: WorkspaceArgs,
    target: String,
    column: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = args.open(false).await?;

    let path = match column {
        Some(caret) => workspace.resolve_resource(&target, caret),
        None if target.contains('(') => {
            // Whole line given without a caret: take the first call on it
            let caret = target.find('"').map_or(0, |i| target[..=i].chars().count());
            workspace.resolve_resource(&target, caret)
        }
        None => workspace.lookup_path_by_code(&Code::new(target.trim())),
    };

    match path {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => Err(format!("no resource file for {}", target).into()),
    }
}

pub async fn code(args: WorkspaceArgs, file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = args.open(false).await?;
    let file = if file.is_absolute() {
        file
    } else {
        std::env::current_dir()?.join(file)
    };
    match workspace.lookup_code_by_path(&file) {
        Some(code) => {
            println!("{}", code);
            Ok(())
        }
        None => Err(format!("{} is not under the SQL root", file.display()).into()),
    }
}
