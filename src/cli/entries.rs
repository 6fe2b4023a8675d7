//! `entries` command implementation

use crate::cli::output::{format_entries_json, format_entries_table};
use crate::cli::EntriesArgs;
use crate::client::ApiClient;
use crate::config::OptimConfig;
use crate::entries::parse_entries;

/// Handle `optim entries`
pub async fn handle_entries(
    args: &EntriesArgs,
    config: &OptimConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let client = ApiClient::new(config.endpoints.clone(), &config.client)?;
    let entries = client.get_all_entries().await?;
    let cases = parse_entries(&entries);
    tracing::debug!(entries = entries.len(), test_cases = cases.len(), "Loaded entries");

    if args.json {
        Ok(format_entries_json(&cases)?)
    } else {
        Ok(format_entries_table(&cases))
    }
}
