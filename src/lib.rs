//! In-process topic publish/subscribe.
//!
//! Producers emit events under string topics; consumers subscribe with
//! topics or glob patterns and read from bounded queues. Matching works
//! in both directions: `emit("*", ..)` fans out to every stored topic,
//! and a listener on `"*"` catches any concrete publish. Per-delivery
//! behavior — once, skip-on-block, close-on-block, void, sync — is
//! shaped by [`Middleware`]s installed bus-wide or per listener, and a
//! publication can be awaited and canceled through its [`Done`] handle.
//!
//! ```
//! use evbus::{Bus, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = Bus::new(1);
//! let queue = bus.on("user:*", []);
//!
//! let done = bus.emit("user:created", [Value::from(42)]).await;
//! done.await.unwrap();
//!
//! let event = queue.recv_async().await.unwrap();
//! assert_eq!(event.original_topic, "user:created");
//! assert_eq!(event.int(0), 42);
//! # }
//! ```

mod bus;
mod dispatch;
mod done;
mod error;
mod event;
mod flag;
mod group;
mod matcher;
mod middleware;
mod registry;

pub use {
    bus::Bus,
    done::Done,
    error::Error,
    event::{Event, EventReceiver, Value},
    flag::Flag,
    group::Group,
    matcher::{Matcher, PathMatch},
    middleware::{Middleware, flag, middleware},
};
