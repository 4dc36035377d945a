//! Merging the queues of three buses into one consumption queue.

use evbus::{Bus, Flag, Group, Value, flag};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let sensors = Bus::default();
    let system = Bus::default();
    let user = Bus::default();
    for bus in [&sensors, &system, &user] {
        bus.use_("*", [flag(Flag::SYNC)]).unwrap();
    }

    let group = Group::new(8);
    group.add([
        sensors.on("*", []),
        system.on("*", []),
        user.on("*", []),
    ]);
    let pipe = group.on();

    sensors.emit("temp", [Value::from(21.5)]).await.await.unwrap();
    system.emit("boot", [Value::from("ok")]).await.await.unwrap();
    user.emit("login", [Value::from("alice")]).await.await.unwrap();

    for _ in 0..3 {
        let event = pipe.recv_async().await.unwrap();
        println!("merged: {} {:?}", event.topic, event.args);
    }

    group.off([&pipe]);
    assert!(pipe.recv_async().await.is_err());
    println!("output closed");
}
