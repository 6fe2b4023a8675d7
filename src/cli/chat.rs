//! `chat` command implementation

use crate::cli::ChatArgs;
use crate::client::ApiClient;
use crate::config::OptimConfig;

/// Handle `optim chat`
pub async fn handle_chat(
    args: &ChatArgs,
    config: &OptimConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let client = ApiClient::new(config.endpoints.clone(), &config.client)?;
    let reply = client.test_prompt(&args.prompt).await?;

    match reply.analysis {
        Some(analysis) if reply.is_system_analysis() => Ok(format!(
            "{}\n{}",
            reply.text,
            serde_json::to_string_pretty(&analysis)?
        )),
        _ => Ok(reply.text),
    }
}
