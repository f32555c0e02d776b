/*
ZMQ Ping-Pong: two domains, one process

Both domains listen on localhost over ZeroMQ. Ping exports itself in every
message so pong can reply through a proxy it never had to look up.

Usage:
    cargo run --example zmq_ping_pong

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
*/

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ocap_actors::{Domain, Message, Sponsor, SponsorConfig, ZmqTransport};

fn main() -> ocap_actors::Result<()> {
    println!("=== ZMQ Ping-Pong (ports 5001/5002) ===");

    let sponsor = Sponsor::new(SponsorConfig::named("ping-pong").with_workers(2))?;
    let transport = Arc::new(ZmqTransport::new()?);

    let ping_domain = Domain::new("tcp://localhost:5001", sponsor.clone(), transport.clone())?;
    let pong_domain = Domain::new("tcp://localhost:5002", sponsor.clone(), transport.clone())?;

    let report = sponsor.create_fn(|msg: Message, _ctx| println!("transport: {:?}", msg));
    ping_domain.on_failure(report.clone());
    pong_domain.on_failure(report.clone());
    ping_domain.listen(Some(report.clone()), Some(report.clone()));
    pong_domain.listen(Some(report.clone()), Some(report));

    // Give the PULL sockets time to bind
    thread::sleep(Duration::from_millis(200));

    let pong = pong_domain.create_fn(|msg: Message, _ctx| {
        let count = msg.get("count").and_then(Message::as_int).unwrap_or_default();
        println!("pong: received {}", count);
        if let Some(reply) = msg.get("reply").and_then(Message::as_capability) {
            reply.send(Message::map([("count", count - 1)]));
        }
    });
    let pong_address = pong_domain.local_to_remote(&pong);
    println!("pong exported at {}", pong_address);

    let remote_pong = ping_domain.remote_to_local(&pong_address);
    let ping = ping_domain.create_fn(move |msg: Message, ctx| {
        let count = msg.get("count").and_then(Message::as_int).unwrap_or_default();
        println!("ping: received {}", count);
        if count > 1330 {
            remote_pong.send(Message::map([
                ("count", Message::from(count)),
                ("reply", Message::from(ctx.self_ref())),
            ]));
        } else {
            ctx.become_ignore();
        }
    });

    ping.send(Message::map([("count", 1337)]));

    thread::sleep(Duration::from_secs(2));
    transport.stop();
    sponsor.shutdown();
    println!("=== Ping-Pong Complete ===");
    Ok(())
}
