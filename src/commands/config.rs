use anyhow::Result;
use modbuild::config::CONFIG_KEYS;
use modbuild::Config;

pub fn run_show() -> Result<()> {
    let config = Config::load()?;
    let config_path = Config::default_path()?;

    println!();
    println!("  Config file: {}", config_path.display());
    println!();

    println!("  [resolver]");
    println!(
        "    fetch_timeout_seconds = {}",
        config.resolver.fetch_timeout_seconds
    );
    println!("    jobs                  = {}", config.resolver.jobs);
    println!(
        "    cache_dir             = {} ({})",
        config.resolver.cache_dir,
        config.cache_dir()?.display()
    );
    println!();

    println!("  [transform]");
    if config.transform.command.is_empty() {
        println!("    command               = <none, deobf dependencies will fail>");
    } else {
        println!(
            "    command               = {}",
            config.transform.command.join(" ")
        );
    }
    println!(
        "    timeout_seconds       = {}",
        config.transform.timeout_seconds
    );
    println!();

    println!("  [output]");
    println!("    staging_dir           = {}", config.output.staging_dir);
    println!("    manifest_dir          = {}", config.output.manifest_dir);
    println!();

    println!("💡 Modify settings:");
    println!("   modbuild config set <key> <value>");
    println!();
    println!("   Available keys:");
    for key in CONFIG_KEYS {
        println!("     • {}", key);
    }
    println!();

    Ok(())
}

pub fn run_set(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;

    if let Err(e) = config.set(key, value) {
        println!("  ❌ {}", e);
        println!();
        anyhow::bail!("Invalid configuration key or value");
    }

    config.save()?;
    println!("  ✓ {} = \"{}\"", key, value);
    println!();
    println!("✅ Configuration saved");

    Ok(())
}
