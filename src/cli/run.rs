//! `run` command implementation

use crate::cli::stream::{follow, FollowOutcome};
use crate::cli::RunArgs;
use crate::client::ApiClient;
use crate::config::OptimConfig;
use crate::entries::TestCase;
use crate::registry::{ConnectionKey, ConnectionRegistry, StreamKind};
use crate::stream::{JobStatus, StreamManager};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

/// Read a test case from `path`, filling in its identity.
pub fn load_test_case(
    path: &Path,
    prompt_hash: Option<&str>,
) -> Result<TestCase, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let mut case: TestCase = serde_json::from_str(&content)
        .map_err(|e| format!("{} is not a test case: {}", path.display(), e))?;

    if let Some(hash) = prompt_hash {
        case.prompt_hash = hash.to_string();
    }
    if case.prompt_hash.is_empty() {
        return Err(format!(
            "{} has no prompt_hash. Pass --prompt-hash.",
            path.display()
        )
        .into());
    }
    case.ensure_hash();
    Ok(case)
}

/// Handle `optim run`
pub async fn run_job(args: &RunArgs, config: &OptimConfig) -> Result<(), Box<dyn std::error::Error>> {
    let case = load_test_case(&args.file, args.prompt_hash.as_deref())?;
    let client = ApiClient::new(config.endpoints.clone(), &config.client)?;
    let job_id = client.create_job(&case).await?;

    let id = case.resource_id();
    println!(
        "{} Execution job {} created",
        "✓".green(),
        job_id.bold()
    );
    println!("  status stream: {}", ConnectionKey::new(StreamKind::Status, &id));
    println!("  log stream:    {}", ConnectionKey::new(StreamKind::Log, &id));

    if args.follow {
        let manager = StreamManager::from_config(Arc::new(ConnectionRegistry::new()), config)?;
        let subscription = manager.subscribe_status(&id, JobStatus::Pending);
        let outcome = follow(&manager, subscription, false).await;
        manager.shutdown().await;
        if outcome == FollowOutcome::Finished {
            println!("{} Job {} completed", "✓".green(), job_id);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_test_case_computes_hash() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            temp.path(),
            r#"{"prompt_hash": "p1", "test_case_id": 1, "test_case_title": "t"}"#,
        )
        .unwrap();

        let case = load_test_case(temp.path(), None).unwrap();
        assert_eq!(case.prompt_hash, "p1");
        assert_eq!(case.tc_hash.len(), 64);
    }

    #[test]
    fn test_load_test_case_prompt_hash_override() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), r#"{"test_case_id": 1}"#).unwrap();

        assert!(load_test_case(temp.path(), None).is_err());
        let case = load_test_case(temp.path(), Some("p9")).unwrap();
        assert_eq!(case.prompt_hash, "p9");
    }

    #[test]
    fn test_load_test_case_keeps_given_hash() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            temp.path(),
            r#"{"prompt_hash": "p1", "tc_hash": "fixed", "test_case_id": 1}"#,
        )
        .unwrap();

        assert_eq!(load_test_case(temp.path(), None).unwrap().tc_hash, "fixed");
    }

    #[test]
    fn test_load_test_case_rejects_non_object() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[1, 2]").unwrap();
        assert!(load_test_case(temp.path(), Some("p")).is_err());
    }
}
