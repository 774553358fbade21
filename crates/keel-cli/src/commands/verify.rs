use super::{colorize_status, json_pretty, open_cache, EXIT_SUCCESS};
use keel_core::KernelConfig;

pub fn run(config: &KernelConfig, json: bool) -> Result<u8, String> {
    let cache_path = config.cache_path();
    let report = open_cache(&cache_path)?
        .map(|cache| cache.verify())
        .unwrap_or_default();
    let current = report.iter().filter(|s| s.current).count();

    if json {
        let payload = serde_json::json!({
            "cache_file": cache_path,
            "checked": report.len(),
            "current": current,
            "stale": report.len() - current,
            "features": report,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "resolution cache: {current}/{} features current",
            report.len()
        );
        for status in &report {
            println!(
                "  {:<8} {}  {}",
                colorize_status(status.current),
                status.name,
                status.source_path.display()
            );
        }
    }
    Ok(EXIT_SUCCESS)
}
