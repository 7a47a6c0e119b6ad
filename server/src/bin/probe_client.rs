//! Headless smoke-test client.
//!
//! Connects to a running server, walks right, jumps, walks left, then idles
//! on heartbeats before disconnecting, printing the snapshot stream as it
//! goes. Useful for poking at a server without a real game client.

use bincode::{deserialize, serialize};
use shared::{timestamp_ms, Packet, PlayerId, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::sleep;

fn input(up: bool, left: bool, right: bool) -> Packet {
    Packet::Input {
        up,
        down: false,
        left,
        right,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:8080".to_string())
        .parse()?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Probe socket bound to {}", socket.local_addr()?);

    let connect_data = serialize(&Packet::Connect {
        client_version: PROTOCOL_VERSION,
    })?;
    println!("Sending connect to {}", server_addr);
    socket.send_to(&connect_data, server_addr).await?;

    let mut buf = [0u8; 2048];
    let (len, _) = socket.recv_from(&mut buf).await?;

    let my_id: PlayerId = match deserialize::<Packet>(&buf[0..len])? {
        Packet::Connected { client_id } => {
            println!("Connected with id {}", client_id);
            client_id
        }
        Packet::Disconnected { reason } => {
            println!("Server refused connection: {}", reason);
            return Ok(());
        }
        other => {
            println!("Expected Connected but got: {:?}", other);
            return Ok(());
        }
    };

    // Scripted input phases, one message per second:
    // walk right, jump while still running, walk left, then go idle.
    for step in 0..10 {
        let packet = match step {
            0..=2 => input(false, false, true),
            3 => input(true, false, true),
            4..=6 => input(false, true, false),
            _ => input(false, false, false),
        };

        println!("Step {}: sending {:?}", step, packet);
        socket.send_to(&serialize(&packet)?, server_addr).await?;

        // Idle phases also heartbeat so the session stays alive.
        if step >= 7 {
            let heartbeat = serialize(&Packet::Heartbeat {
                timestamp: timestamp_ms(),
            })?;
            socket.send_to(&heartbeat, server_addr).await?;
        }

        match socket.recv_from(&mut buf).await {
            Ok((len, _)) => match deserialize::<Packet>(&buf[0..len]) {
                Ok(Packet::Snapshot {
                    tick,
                    timestamp,
                    world,
                }) => {
                    println!(
                        "Snapshot tick {} at {} with {} players",
                        tick,
                        timestamp,
                        world.len()
                    );
                    if let Some(me) = world.get(&my_id) {
                        println!(
                            "  me: pos=({:.1}, {:.1}) vel=({:.1}, {:.1}) grounded={}",
                            me.x, me.y, me.vx, me.vy, me.grounded
                        );
                    }
                }
                Ok(other) => println!("Unexpected packet: {:?}", other),
                Err(e) => println!("Failed to deserialize snapshot: {}", e),
            },
            Err(e) => println!("Error receiving snapshot: {}", e),
        }

        sleep(Duration::from_secs(1)).await;
    }

    println!("Sending disconnect");
    socket.send_to(&serialize(&Packet::Disconnect)?, server_addr).await?;
    println!("Probe finished");

    Ok(())
}
