//! `validate` command - check a configuration file without running.

use anyhow::Result;
use config_loader::ConfigLoader;
use serde_json::json;

use crate::cli::ValidateArgs;

pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    match ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            if args.json {
                println!(
                    "{}",
                    json!({
                        "valid": true,
                        "config": args.config.display().to_string(),
                        "events_endpoint": config.events_endpoint,
                    })
                );
            } else {
                println!("Configuration OK: {}", args.config.display());
                println!("  events endpoint: {}", config.events_endpoint);
                println!("  bulk upload limit: {}", config.bulk_upload_limit);
                println!("  flush interval: {} ms", config.flush_interval_ms);
            }
            Ok(())
        }
        Err(e) => {
            if args.json {
                println!(
                    "{}",
                    json!({
                        "valid": false,
                        "config": args.config.display().to_string(),
                        "error": e.to_string(),
                    })
                );
            } else {
                println!("Configuration INVALID: {}", args.config.display());
                println!("  {e}");
            }
            Err(e.into())
        }
    }
}
