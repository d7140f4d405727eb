use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use campus_health::gate::{
    ClientStartupGate, FileSessionFlag, GatePolicy, GateView, HttpTransport, SessionFlag,
};

pub async fn run_wait(
    url: String,
    cache_dir: Option<String>,
    fresh: bool,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let session = Arc::new(FileSessionFlag::new(cache_dir)?);
    if fresh {
        session.clear()?;
    }

    let transport = Arc::new(HttpTransport::new(&url)?);
    println!("⏳ Waiting for {}", transport.url());

    let mut policy = GatePolicy::default();
    if let Some(secs) = timeout_secs {
        policy = policy.with_total_timeout(Duration::from_secs(secs));
    }

    let gate = ClientStartupGate::new(transport, session).with_policy(policy);

    let token = gate.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted, cancelling startup gate");
            token.cancel();
        }
    });

    let state = gate.run().await?;

    match state.view() {
        GateView::Render { banner: None } => {
            println!("✅ Server is ready");
            Ok(())
        }
        GateView::Render {
            banner: Some(banner),
        } => {
            println!("⚠️  Server is ready. {}", banner);
            Ok(())
        }
        GateView::Blocked {
            title,
            detail,
            failing,
        } => {
            println!("❌ {}", title);
            println!("   {}", detail);
            for (service, message) in &failing {
                println!("   - {}: {}", service, message);
            }
            anyhow::bail!("Server is not available ({:?})", state.phase)
        }
        GateView::Loading { attempt } => {
            anyhow::bail!("Startup gate stopped while loading (attempt {})", attempt)
        }
    }
}
