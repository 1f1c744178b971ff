use anyhow::Context;
use etherflow::{EtherApp, EtherOptions};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional path to a JSON options file
    let options = match std::env::args().nth(1) {
        Some(path) => EtherOptions::from_json_file(&path).unwrap_or_else(|err| {
            log::error!("Ignoring options file {}: {}", path, err);
            EtherOptions::default()
        }),
        None => EtherOptions::default(),
    };

    let app = EtherApp::new(options).context("failed to create event loop")?;
    app.run()?;
    Ok(())
}
