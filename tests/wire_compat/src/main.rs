fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use oftlink_protocol::{FrameDecoder, MessageType, TransferDescriptor, decode, encode};
    use oftlink_transfer::{OftChecksum, checksum_bytes};
    use serde::Deserialize;

    /// A descriptor alongside the record a conforming peer puts on the wire.
    #[derive(Deserialize)]
    struct DescriptorCase {
        name: String,
        descriptor: serde_json::Value,
        hex: String,
    }

    #[derive(Deserialize)]
    struct ChecksumCase {
        name: String,
        input: String,
        checksum: u32,
    }

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file into `T`.
    fn load_fixture<T: serde::de::DeserializeOwned>(name: &str) -> T {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    fn descriptor_cases() -> Vec<(String, TransferDescriptor, Vec<u8>)> {
        load_fixture::<Vec<DescriptorCase>>("descriptors.json")
            .into_iter()
            .map(|case| {
                let descriptor = serde_json::from_value(case.descriptor)
                    .unwrap_or_else(|e| panic!("failed to deserialize {}: {e}", case.name));
                let record = hex::decode(&case.hex)
                    .unwrap_or_else(|e| panic!("bad hex in {}: {e}", case.name));
                (case.name, descriptor, record)
            })
            .collect()
    }

    // --- Descriptor records ---

    #[test]
    fn fixture_records_encode_byte_for_byte() {
        for (name, descriptor, record) in descriptor_cases() {
            assert_eq!(record.len(), 256, "{name}: fixture record length");
            assert_eq!(
                encode(&descriptor).as_ref(),
                record.as_slice(),
                "encode mismatch for {name}"
            );
        }
    }

    #[test]
    fn fixture_records_decode() {
        for (name, descriptor, record) in descriptor_cases() {
            let decoded = decode(&record).unwrap_or_else(|e| panic!("{name}: {e}"));
            assert_eq!(decoded, descriptor, "decode mismatch for {name}");
        }
    }

    #[test]
    fn fixture_records_stream_back_to_back() {
        let cases = descriptor_cases();
        let mut buf = bytes::BytesMut::new();
        for (_, _, record) in &cases {
            buf.extend_from_slice(record);
        }
        for (name, descriptor, _) in &cases {
            let next = FrameDecoder::decode(&mut buf)
                .unwrap_or_else(|e| panic!("{name}: {e}"))
                .unwrap_or_else(|| panic!("{name}: record incomplete"));
            assert_eq!(&next, descriptor);
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn fixture_descriptor_json_roundtrip() {
        for case in load_fixture::<Vec<DescriptorCase>>("descriptors.json") {
            let parsed: TransferDescriptor = serde_json::from_value(case.descriptor.clone())
                .unwrap_or_else(|e| panic!("failed to deserialize {}: {e}", case.name));
            let reserialized = serde_json::to_value(&parsed).unwrap();
            assert_eq!(
                case.descriptor, reserialized,
                "roundtrip mismatch for {}",
                case.name
            );
        }
    }

    #[test]
    fn fixture_covers_every_message_type() {
        let seen: Vec<MessageType> = descriptor_cases()
            .into_iter()
            .map(|(_, d, _)| d.message_type)
            .collect();
        for t in [
            MessageType::Prompt,
            MessageType::Ack,
            MessageType::ResumeRequest,
            MessageType::ResumeAckReceiver,
            MessageType::ResumeAckSender,
            MessageType::Done,
        ] {
            assert!(seen.contains(&t), "no fixture for {t}");
        }
    }

    // --- Checksums ---

    #[test]
    fn fixture_checksums() {
        for case in load_fixture::<Vec<ChecksumCase>>("checksums.json") {
            let input = hex::decode(&case.input).unwrap();
            assert_eq!(
                checksum_bytes(&input),
                case.checksum,
                "checksum mismatch for {}: got {:#010x}, want {:#010x}",
                case.name,
                checksum_bytes(&input),
                case.checksum
            );
        }
    }

    #[test]
    fn fixture_checksums_incremental() {
        // Odd chunk sizes exercise the even/odd byte position carry-over.
        for case in load_fixture::<Vec<ChecksumCase>>("checksums.json") {
            let input = hex::decode(&case.input).unwrap();
            let mut sum = OftChecksum::new();
            for chunk in input.chunks(37) {
                sum.update(chunk);
            }
            assert_eq!(sum.finalize(), case.checksum, "incremental mismatch for {}", case.name);
        }
    }
}
