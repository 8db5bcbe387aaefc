//! `info` command - display the resolved configuration.

use anyhow::Result;
use config_loader::ConfigLoader;

use crate::cli::InfoArgs;

pub fn run_info(args: &InfoArgs) -> Result<()> {
    let config = ConfigLoader::load_from_path(&args.config)?;

    if args.json {
        println!("{}", ConfigLoader::to_json(&config)?);
        return Ok(());
    }

    println!("Configuration: {}", args.config.display());
    println!("  events endpoint:    {}", config.events_endpoint);
    println!(
        "  fallback endpoint:  {}",
        config
            .events_fallback_endpoint
            .as_deref()
            .unwrap_or("(none)")
    );
    println!("  fallback disabled:  {}", config.disable_fallback);
    println!("  bulk upload limit:  {}", config.bulk_upload_limit);
    println!("  flush interval:     {} ms", config.flush_interval_ms);
    println!("  data expiration:    {} ms", config.data_expiration_ms);
    println!("  request timeout:    {} ms", config.request_timeout_ms);
    println!("  base properties:    {}", config.base_properties.len());

    Ok(())
}
