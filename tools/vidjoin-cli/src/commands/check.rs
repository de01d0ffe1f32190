//! Check system capabilities.

use vidjoin_common::config::VidjoinConfig;
use vidjoin_platform::{check_capabilities, print_capability_report};

pub fn run(config: &VidjoinConfig) -> anyhow::Result<()> {
    println!("vidjoin System Check");
    println!("{}", "=".repeat(50));
    println!("  ffmpeg:     {}", config.export.ffmpeg_path.display());
    println!("  ffprobe:    {}", config.export.ffprobe_path.display());
    println!("  Output dir: {}", config.output_dir.display());

    let capabilities = check_capabilities(config);
    println!();
    print_capability_report(&capabilities);

    let all_required_ok = capabilities
        .iter()
        .filter(|c| c.required)
        .all(|c| c.available);

    println!();
    if all_required_ok {
        println!("All required capabilities are available. vidjoin is ready.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}
