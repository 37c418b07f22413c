//! Frames over an async byte stream with `tokio_util::codec`.
//!
//! Run with:
//!   cargo run --example async-link --features async

use framelink::frame::{FrameConfig, LinkCodec};
use framelink::{ByteOrder, Packet};
use futures_util::{SinkExt, StreamExt};
use tokio_util::codec::{FramedRead, FramedWrite};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (near, far) = tokio::io::duplex(64);
    let config = FrameConfig {
        use_crc: true,
        ..FrameConfig::default()
    };
    let mut sink = FramedWrite::new(near, LinkCodec::new(config));
    let mut stream = FramedRead::new(far, LinkCodec::new(config));

    let sender = tokio::spawn(async move {
        for service in 0..4u8 {
            let payload = vec![0xC0 | service, service];
            let packet = Packet::request(service, 1, ByteOrder::Big, payload)?;
            sink.send(packet).await?;
        }
        Ok::<_, framelink::FrameError>(())
    });

    for _ in 0..4 {
        match stream.next().await {
            Some(packet) => {
                let packet = packet?;
                eprintln!(
                    "service {} {}: {:02X?}",
                    packet.service,
                    packet.status.as_str(),
                    packet.payload.as_ref()
                );
            }
            None => break,
        }
    }

    sender.await??;
    Ok(())
}
