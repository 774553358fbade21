use super::{format_millis, join_names, json_pretty, open_cache, EXIT_SUCCESS};
use keel_core::KernelConfig;

pub fn run(config: &KernelConfig, json: bool) -> Result<u8, String> {
    let cache_path = config.cache_path();
    let Some(cache) = open_cache(&cache_path)? else {
        if json {
            let payload = serde_json::json!({
                "cache_file": cache_path,
                "features": [],
                "features_in_use": [],
            });
            println!("{}", json_pretty(&payload)?);
        } else {
            println!("no resolution cache at {}", cache_path.display());
        }
        return Ok(EXIT_SUCCESS);
    };

    if json {
        let features: Vec<_> = cache.features().collect();
        let payload = serde_json::json!({
            "cache_file": cache_path,
            "features": features,
            "features_in_use": cache.features_in_use(),
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("cache file:      {}", cache_path.display());
    println!(
        "features in use: {}",
        join_names(cache.features_in_use())
    );
    for feature in cache.features() {
        let stamp = feature.stamp();
        println!();
        println!("{}", feature.name());
        println!("  source:        {}", feature.source_path().display());
        println!("  modified:      {}", format_millis(stamp.last_modified));
        println!("  size:          {}", stamp.size);
        if let Some(class) = feature.log_provider_class() {
            println!("  log provider:  {class}");
        }
        println!("  boot artifacts: {}", feature.boot_artifacts().len());
        for path in feature.boot_artifacts() {
            println!("    {}", path.display());
        }
        println!("  includes:      {}", feature.included_descriptors().len());
        for path in feature.included_descriptors() {
            println!("    {}", path.display());
        }
        let matched = feature
            .components()
            .values()
            .filter(|c| c.best_match_path.is_some())
            .count();
        println!(
            "  components:    {} ({matched} with best match)",
            feature.components().len()
        );
    }
    Ok(EXIT_SUCCESS)
}
