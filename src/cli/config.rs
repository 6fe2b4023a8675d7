//! `optim config init`: write the annotated starter config.

use crate::cli::ConfigInitArgs;
use crate::config::OptimConfig;
use std::fs;
use std::path::Path;

const STARTER_CONFIG: &str = include_str!("../../optim.example.toml");

/// Write the starter config to `args.output` and list the endpoints it
/// points at.
pub fn handle_config_init(args: &ConfigInitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let target = args.output.as_path();
    if let Some(dir) = target.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.is_dir() {
            return Err(format!("Directory does not exist: {}", dir.display()).into());
        }
    }
    if target.exists() && !args.force {
        return Err(format!(
            "{} already exists; pass --force to replace it",
            target.display()
        )
        .into());
    }

    let starter: OptimConfig = toml::from_str(STARTER_CONFIG)?;
    starter.validate()?;
    fs::write(target, STARTER_CONFIG)?;
    tracing::debug!(path = %target.display(), "Wrote starter config");

    for line in init_summary(target, &starter) {
        println!("{}", line);
    }
    Ok(())
}

fn init_summary(target: &Path, config: &OptimConfig) -> Vec<String> {
    let mut lines = vec![format!("Wrote {}", target.display())];
    for (field, url) in config.endpoints.entries() {
        let name = field.trim_start_matches("endpoints.");
        lines.push(format!("  {:<18} {}", name, url));
    }
    lines.push(format!(
        "Follow a run with: optim --config {} logs --prompt-hash <hash> --tc-hash <hash>",
        target.display()
    ));
    lines
}
