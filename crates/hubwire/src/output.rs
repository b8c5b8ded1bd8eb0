use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hubwire_message::{DeviceNotification, Message};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

/// One JSON document per line.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_table(header: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

pub fn print_messages(messages: &[Message], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for message in messages {
                print_json(message);
            }
        }
        OutputFormat::Table => print_table(
            &["ID", "TYPE", "DETAILS"],
            messages
                .iter()
                .map(|message| {
                    vec![
                        format!("0x{:02x}", message.type_id()),
                        message.message_type().to_string(),
                        describe(message),
                    ]
                })
                .collect(),
        ),
        OutputFormat::Pretty => {
            for message in messages {
                println!("{} {}", message.message_type(), describe(message));
            }
        }
    }
}

/// One-line human summary of a message's fields.
pub fn describe(message: &Message) -> String {
    match message {
        Message::InfoRequest => String::new(),
        Message::InfoResponse(info) => format!(
            "rpc={}.{}.{} firmware={}.{}.{} packet={} message={} chunk={} device=0x{:04x}",
            info.rpc_major,
            info.rpc_minor,
            info.rpc_build,
            info.firmware_major,
            info.firmware_minor,
            info.firmware_build,
            info.max_packet_size,
            info.max_message_size,
            info.max_chunk_size,
            info.product_group_device
        ),
        Message::ClearSlotRequest { slot } => format!("slot={slot}"),
        Message::StartFileUploadRequest(upload) => format!(
            "name={:?} slot={} crc={:08x}",
            upload.file_name(),
            upload.slot(),
            upload.crc()
        ),
        Message::TransferChunkRequest(chunk) => format!(
            "running_crc={:08x} size={}",
            chunk.running_crc(),
            chunk.size()
        ),
        Message::ProgramFlowRequest { stop, slot } => format!("stop={stop} slot={slot}"),
        Message::ProgramFlowNotification { stop } => format!("stop={stop}"),
        Message::ConsoleNotification { text } => format!("{text:?}"),
        Message::DeviceNotificationRequest { interval_ms } => {
            format!("interval={interval_ms}ms")
        }
        Message::DeviceNotification(notification) => describe_devices(notification),
        Message::ClearSlotResponse(status)
        | Message::StartFileUploadResponse(status)
        | Message::TransferChunkResponse(status)
        | Message::ProgramFlowResponse(status)
        | Message::DeviceNotificationResponse(status) => {
            if status.is_success() {
                "ok".to_string()
            } else {
                format!("failed (0x{:02x})", status.code)
            }
        }
    }
}

fn describe_devices(notification: &DeviceNotification) -> String {
    let mut parts: Vec<String> = notification
        .records()
        .iter()
        .map(|record| {
            let fields: Vec<String> = record
                .fields()
                .map(|(name, values)| match values {
                    [value] => format!("{name}={value}"),
                    values => format!("{name}={values:?}"),
                })
                .collect();
            format!("{}({})", record.name(), fields.join(" "))
        })
        .collect();
    if let Some(partial) = notification.partial() {
        parts.push(format!(
            "<stopped at offset {}: sub-type 0x{:02x}, {} bytes dropped>",
            partial.offset, partial.sub_type, partial.dropped
        ));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use hubwire_message::{DeviceRecord, DeviceRecordKind, StatusResponse};

    use super::*;

    #[test]
    fn describes_status_responses() {
        assert_eq!(
            describe(&Message::TransferChunkResponse(StatusResponse::SUCCESS)),
            "ok"
        );
        assert_eq!(
            describe(&Message::ClearSlotResponse(StatusResponse::failure(1))),
            "failed (0x01)"
        );
    }

    #[test]
    fn describes_device_records_by_field_name() {
        let notification = DeviceNotification::from_records(vec![
            DeviceRecord::new(DeviceRecordKind::Battery, vec![90]).unwrap(),
        ])
        .unwrap();
        let text = describe(&Message::DeviceNotification(notification));
        assert!(text.starts_with("Battery("), "{text}");
        assert!(text.contains("=90"), "{text}");
    }
}
