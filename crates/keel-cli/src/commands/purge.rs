use super::{json_pretty, EXIT_SUCCESS};
use keel_core::{CacheLock, CoreError, KernelConfig};
use keel_store::remove_cache;

pub fn run(config: &KernelConfig, json: bool) -> Result<u8, String> {
    let cache_path = config.cache_path();
    let lock_path = config.lock_path();
    let Some(_lock) = CacheLock::try_acquire(&lock_path).map_err(|e| e.to_string())? else {
        return Err(CoreError::LockHeld(lock_path).to_string());
    };

    let removed = remove_cache(&cache_path).map_err(|e| format!("store error: {e}"))?;

    if json {
        let payload = serde_json::json!({
            "cache_file": cache_path,
            "removed": removed,
        });
        println!("{}", json_pretty(&payload)?);
    } else if removed {
        println!("removed {}", cache_path.display());
    } else {
        println!("no resolution cache at {}", cache_path.display());
    }
    Ok(EXIT_SUCCESS)
}
