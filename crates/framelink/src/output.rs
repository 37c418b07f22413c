use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use framelink_frame::Packet;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct EncodedFrame {
    pub service: u8,
    pub subfunction: u8,
    pub byte_order: String,
    pub crc: bool,
    pub payload_size: usize,
    pub frame_size: usize,
    pub frame: String,
}

#[derive(Serialize)]
pub struct DecodedPacket {
    pub service: u8,
    pub subfunction: u8,
    pub status: &'static str,
    pub byte_order: String,
    pub payload_size: usize,
    pub payload: String,
}

impl From<&Packet> for DecodedPacket {
    fn from(packet: &Packet) -> Self {
        Self {
            service: packet.service.get(),
            subfunction: packet.subfunction.get(),
            status: packet.status.as_str(),
            byte_order: packet.byte_order.to_string(),
            payload_size: packet.payload.len(),
            payload: to_hex(&packet.payload),
        }
    }
}

#[derive(Serialize)]
pub struct LoopbackReport {
    pub address: String,
    pub subfunction: u8,
    pub success: bool,
    pub announced_size: u8,
    pub request_size: usize,
    pub payload: String,
    pub responder_state: String,
}

pub fn print_encoded(frame: &EncodedFrame, wire: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(frame),
        OutputFormat::Table => {
            let mut table = new_table(vec!["SERVICE", "SUBFN", "ORDER", "CRC", "SIZE", "FRAME"]);
            table.add_row(vec![
                frame.service.to_string(),
                frame.subfunction.to_string(),
                frame.byte_order.clone(),
                frame.crc.to_string(),
                frame.frame_size.to_string(),
                frame.frame.clone(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", frame.frame),
        OutputFormat::Raw => print_raw(wire),
    }
}

pub fn print_packets(packets: &[DecodedPacket], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&packets),
        OutputFormat::Table => {
            let mut table = new_table(vec!["SERVICE", "SUBFN", "STATUS", "ORDER", "SIZE", "PAYLOAD"]);
            for packet in packets {
                table.add_row(vec![
                    packet.service.to_string(),
                    packet.subfunction.to_string(),
                    packet.status.to_string(),
                    packet.byte_order.clone(),
                    packet.payload_size.to_string(),
                    packet.payload.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for packet in packets {
                println!(
                    "service={} subfunction={} status={} order={} size={} payload={}",
                    packet.service,
                    packet.subfunction,
                    packet.status,
                    packet.byte_order,
                    packet.payload_size,
                    packet.payload
                );
            }
        }
        OutputFormat::Raw => {
            for packet in packets {
                println!("{}", packet.payload);
            }
        }
    }
}

pub fn print_loopback(report: &LoopbackReport, payload: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = new_table(vec!["ADDRESS", "SUBFN", "RESULT", "ANNOUNCED", "PAYLOAD"]);
            table.add_row(vec![
                report.address.clone(),
                report.subfunction.to_string(),
                result_label(report.success).to_string(),
                report.announced_size.to_string(),
                report.payload.clone(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "address={} subfunction={} result={} announced={} payload={}",
            report.address,
            report.subfunction,
            result_label(report.success),
            report.announced_size,
            report.payload
        ),
        OutputFormat::Raw => print_raw(payload),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn result_label(success: bool) -> &'static str {
    if success {
        "positive"
    } else {
        "negative"
    }
}

/// Uppercase, space-separated hex.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02X}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use framelink_frame::ByteOrder;

    use super::*;

    #[test]
    fn hex_rendering() {
        assert_eq!(to_hex(&[]), "");
        assert_eq!(to_hex(&[0xF0, 0x01, 0x0a]), "F0 01 0A");
    }

    #[test]
    fn decoded_packet_fields() {
        let packet = Packet::request(3, 2, ByteOrder::Big, vec![0xAB]).unwrap();
        let out = DecodedPacket::from(&packet);
        assert_eq!(out.status, "request");
        assert_eq!(out.byte_order, "big");
        assert_eq!(out.payload, "AB");
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"service\":3"));
    }
}
