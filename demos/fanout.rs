//! Fan-out with flags: one topic, several listeners, one publish each.

use evbus::{Bus, Flag, Value, flag};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let bus = Bus::new(4);

    let created = bus.on("order:*", []);
    let audit = bus.on("*", []);
    let first_only = bus.once("order:created", []);

    let done = bus
        .emit("order:created", [Value::from(1001), Value::from("espresso")])
        .await;
    done.await.unwrap();

    let event = created.recv_async().await.unwrap();
    println!("created: #{} {}", event.int(0), event.string(1));

    let event = audit.recv_async().await.unwrap();
    println!("audit: topic={} original={}", event.topic, event.original_topic);

    let event = first_only.recv_async().await.unwrap();
    println!("once: #{} (listener now gone)", event.int(0));
    assert!(!bus.topics().contains(&"order:created".to_string()));

    // Bus-wide skip: a full queue drops deliveries instead of blocking.
    bus.use_("order:*", [flag(Flag::SKIP)]).unwrap();
    for n in 0..8 {
        bus.emit("order:created", [Value::from(n)]).await.await.unwrap();
    }
    println!("buffered after burst: {}", created.len());
}
