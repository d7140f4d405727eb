use anyhow::Result;

use campus_health::recovery::classify_message;

pub async fn run_classify(message: String) -> Result<()> {
    let classification = classify_message(&message);
    println!("{}", serde_json::to_string_pretty(&classification)?);
    Ok(())
}
