//! Log in and print live samples of one metric for a minute.
//!
//! Reads credentials from `NEUROSITY_DEVICE_ID`, `NEUROSITY_EMAIL` and
//! `NEUROSITY_PASSWORD`.
//!
//! ```bash
//! NEUROSITY_DEVICE_ID=xxx NEUROSITY_EMAIL=me@example.com NEUROSITY_PASSWORD=yyy \
//!     cargo run --example single_metric -- focus
//! ```

use std::time::Duration;

use neurosity_capture::{
    CaptureConfig, CloudClient, CredentialResolver, CredentialVar, Credentials, Metric, NoPrompt,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metric: Metric = std::env::args()
        .nth(1)
        .as_deref()
        .unwrap_or("focus")
        .parse()?;

    let mut resolver = CredentialResolver::new(NoPrompt);
    let credentials = Credentials::new(
        resolver.resolve(CredentialVar::DeviceId)?,
        resolver.resolve(CredentialVar::Email)?,
        resolver.resolve(CredentialVar::Password)?,
    );

    let config = CaptureConfig::discover(None)?;
    println!("Connecting to gateway at {}...", config.gateway_url);
    let client = CloudClient::connect(&config).await?;

    let token = client.login(&credentials).await?;
    println!("Logged in as {}", credentials.email);

    let (subscription_id, mut events) = client
        .subscribe_metric(&token, &credentials.device_id, metric)
        .await?;

    let deadline = tokio::time::sleep(Duration::from_secs(60));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => break,
            event = events.recv() => match event {
                Some(event) => println!("{} {}", event.timestamp(), event.payload),
                None => break,
            },
        }
    }

    client
        .unsubscribe_metric(&token, &subscription_id, metric)
        .await?;
    client.logout(&token).await?;
    client.disconnect().await?;
    Ok(())
}
