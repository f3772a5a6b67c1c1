use crate::WorkspaceArgs;
use tracing::info;

pub async fn run(args: WorkspaceArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = args.open(false).await?;
    let codes = workspace.prefix_search("");

    if json {
        let codes: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
        println!("{}", serde_json::to_string_pretty(&codes)?);
        return Ok(());
    }

    if let Some(session) = workspace.session() {
        info!(
            "Indexed {} codes under {}",
            codes.len(),
            session.index().root().display()
        );
    }
    for code in &codes {
        println!("{}", code);
    }
    Ok(())
}
