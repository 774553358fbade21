use super::{join_names, json_pretty, yes_no, EXIT_SUCCESS};
use keel_core::{bootstrap, KernelConfig};
use std::path::{Path, PathBuf};

pub fn run(mut config: KernelConfig, clean: bool, boot: bool, json: bool) -> Result<u8, String> {
    if boot && !config.boot_mode {
        config.boot_mode = true;
        config.cache_file = boot_cache_file(&config.cache_file);
    }

    let resolution = bootstrap(&config, clean).map_err(|e| e.to_string())?;

    if json {
        println!("{}", json_pretty(&resolution)?);
        return Ok(EXIT_SUCCESS);
    }

    println!(
        "log provider:    {}",
        resolution.log_provider_class.as_deref().unwrap_or("(none)")
    );
    println!("features:        {}", join_names(&resolution.features_in_use));
    println!("clean start:     {}", yes_no(resolution.clean_start));
    println!("boot classpath:");
    for path in &resolution.boot_classpath {
        println!("  {}", path.display());
    }
    println!("components:      {}", resolution.components.len());
    for component in &resolution.components {
        let best = component
            .best_match_path
            .as_deref()
            .map_or_else(|| "(unresolved)".to_owned(), |p| p.display().to_string());
        println!(
            "  {:>3}  {}  {}",
            component.start_level(),
            component.id(),
            best
        );
    }
    Ok(EXIT_SUCCESS)
}

/// Boot-mode resolutions keep their own cache next to the regular one:
/// `kernel.cache` becomes `kernel.boot.cache`.
fn boot_cache_file(cache_file: &Path) -> PathBuf {
    let stem = cache_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match cache_file.extension() {
        Some(ext) => format!("{stem}.boot.{}", ext.to_string_lossy()),
        None => format!("{stem}.boot"),
    };
    cache_file.with_file_name(name)
}
