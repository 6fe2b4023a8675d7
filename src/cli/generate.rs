//! `generate` command implementation

use crate::cli::GenerateArgs;
use crate::client::ApiClient;
use crate::config::OptimConfig;
use colored::Colorize;

/// Handle `optim generate`
pub async fn handle_generate(
    args: &GenerateArgs,
    config: &OptimConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let client = ApiClient::new(config.endpoints.clone(), &config.client)?;
    let response = client.process(&args.prompt, &args.model).await?;
    let body = serde_json::to_string_pretty(&response.data)?;

    if args.json {
        return Ok(body);
    }

    let source = if response.is_cached() {
        "Showing Cached Data".yellow()
    } else {
        "Showing Open AI Agent Response".green()
    };
    Ok(format!("{}\n{}", source, body))
}
