use super::{load_config, Globals};
use anyhow::Result;

pub fn run(globals: &Globals) -> Result<()> {
    let config = load_config(globals)?;
    if globals.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!("{}", config.to_toml()?);
    }
    Ok(())
}
