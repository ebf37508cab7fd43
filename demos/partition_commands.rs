//! Example: Arm and disarm a partition, block an input.

use pulson_alarm::{ConnectionConfig, PulsonPanel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = ConnectionConfig::builder()
        .host("mqtt.example.net")
        .username("installer")
        .password("secret")
        .serial_number("PS0001")
        .user_code("1234")
        .build();

    let panel = PulsonPanel::new(config);
    panel.start_with_retry().await?;

    // Retained state arrives right after subscribing
    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

    for id in panel.aggregator().partition_ids() {
        let part = panel.partition(&id);
        println!(
            "Partition {}: {} (can_arm={}, can_arm_night={})",
            id,
            part.state(),
            part.can_arm(),
            part.can_arm_night()
        );
    }

    let part = panel.partition("1");
    if part.can_arm_night() {
        println!("\nNight-arming partition 1...");
        panel.arm_night("1", None).await;
    } else if part.can_arm() {
        println!("\nArming partition 1...");
        panel.arm("1", None).await;
    } else {
        println!("\nPartition 1 is not ready to arm");
    }

    // Commands are not acknowledged; watch for the status to change
    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
    println!("Partition 1 is now: {}", panel.partition("1").state());

    println!("\nDisarming partition 1...");
    panel.disarm("1", None).await;

    println!("\nBlocking input 3...");
    if panel.set_input_block("3", true).await {
        println!("Input 3 blocked={}", panel.input("3").is_blocked());
    }

    panel.stop().await;
    Ok(())
}
