use anyhow::Result;

use campus_health::config::ConfigSnapshot;
use campus_health::validate::validate;

pub async fn run_validate(service: String) -> Result<()> {
    let result = validate(&service, &ConfigSnapshot::from_env());
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
