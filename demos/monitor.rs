//! Example: Print inputs and partitions as the panel reports them.

use pulson_alarm::{AlarmEvent, Category, ConnectionConfig, PulsonPanel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ConnectionConfig::builder()
        .host("mqtt.example.net")
        .username("installer")
        .password("secret")
        .serial_number("PS0001")
        .build();

    let panel = PulsonPanel::new(config);

    panel.register_added(Category::Inputs, |id| println!("New input {id}"));
    panel.register_added(Category::Partitions, |id| println!("New partition {id}"));

    let mut events = panel.subscribe();
    panel.start_with_retry().await?;

    println!("Waiting for panel updates (Ctrl+C to stop)...\n");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(AlarmEvent::FieldUpdated { category: Category::Inputs, id, .. }) => {
                    let input = panel.input(&id);
                    println!(
                        "Input {}: {} (blocked={})",
                        input.id,
                        input.status(),
                        input.is_blocked()
                    );
                }
                Ok(AlarmEvent::FieldUpdated { category: Category::Partitions, id, .. }) => {
                    let part = panel.partition(&id);
                    println!(
                        "Partition {}: {} (ready={}, panel={:?})",
                        part.id,
                        part.state(),
                        part.is_ready(),
                        part.panel_state()
                    );
                }
                Ok(AlarmEvent::Disconnected { requested: false }) => {
                    println!("Connection lost");
                    break;
                }
                Ok(_) => {}
                Err(e) => println!("Event stream error: {e}"),
            },
        }
    }

    println!("\n{}", serde_json::to_string_pretty(&panel.snapshot())?);
    panel.stop().await;
    Ok(())
}
