use anyhow::Result;
use tokengate::api::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<()> {
    let json = serde_json::to_string_pretty(&ApiDoc::openapi())?;
    println!("{json}");
    Ok(())
}
