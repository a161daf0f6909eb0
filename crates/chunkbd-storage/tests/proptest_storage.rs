//! Property-based tests for the bucket storage engine.
//!
//! These verify the clamp arithmetic and the device's read/write/trim
//! semantics against a flat in-memory model, catching edge cases around
//! bucket boundaries that unit tests might miss.

use std::sync::Arc;

use chunkbd_recovery::NoRecovery;
use chunkbd_storage::{
    BucketFactory, ChunkedExport, DeviceConfig, ExportProvider, NamespaceId, StorageMetrics,
};
use proptest::prelude::*;

fn test_config(dir: &tempfile::TempDir, bucket_size: u64, reported_size: u64) -> DeviceConfig {
    DeviceConfig {
        bucket_size,
        parent_dir: dir.path().to_path_buf(),
        reported_size,
        max_open_files: 4,
        encryption_seed: "proptest seed".to_string(),
    }
}

fn test_bucket(
    dir: &tempfile::TempDir,
    index: u64,
    bucket_size: u64,
) -> chunkbd_storage::Bucket {
    let config = test_config(dir, bucket_size, bucket_size * 8);
    let factory = BucketFactory::new(
        &config,
        &NamespaceId::derive(&config.encryption_seed),
        Arc::new(NoRecovery),
        Arc::new(StorageMetrics::new()),
    )
    .unwrap();
    factory.create(index).unwrap()
}

/// One device operation against a 64-byte model device.
#[derive(Debug, Clone)]
enum DeviceOp {
    Write { offset: u64, data: Vec<u8> },
    Read { offset: u64, length: usize },
    Trim { offset: u64, length: u64 },
}

const MODEL_SIZE: u64 = 64;

fn any_device_op() -> impl Strategy<Value = DeviceOp> {
    let span = (0..MODEL_SIZE).prop_flat_map(|offset| {
        (Just(offset), 1..=(MODEL_SIZE - offset))
    });
    prop_oneof![
        span.clone().prop_flat_map(|(offset, len)| {
            proptest::collection::vec(any::<u8>(), len as usize..=len as usize)
                .prop_map(move |data| DeviceOp::Write { offset, data })
        }),
        span.clone()
            .prop_map(|(offset, len)| DeviceOp::Read {
                offset,
                length: len as usize
            }),
        span.prop_map(|(offset, len)| DeviceOp::Trim {
            offset,
            length: len
        }),
    ]
}

proptest! {
    /// The clamp rule is exactly min(S - local, length) over its whole domain.
    #[test]
    fn prop_clamp_formula(
        bucket_size in 1u64..512,
        local in 0u64..512,
        length in 1u64..4096,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let bucket = test_bucket(&dir, 0, bucket_size);

        let result = bucket.clamped_length(local, length);
        if local >= bucket_size {
            prop_assert!(result.is_err());
        } else {
            prop_assert_eq!(result.unwrap(), (bucket_size - local).min(length));
        }
    }

    /// Reads serve exactly the clamped count, regardless of physical length.
    #[test]
    fn prop_read_serves_clamped_count(
        bucket_size in 1u64..128,
        local in 0u64..128,
        request in 1usize..256,
        written in 0usize..128,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let bucket = test_bucket(&dir, 0, bucket_size);
        if written > 0 {
            let span = written.min(bucket_size as usize);
            bucket.write_at(0, &vec![0x77u8; span]).unwrap();
        }

        let mut dst = vec![0u8; request];
        let result = bucket.read_at(local, &mut dst);
        if local >= bucket_size {
            prop_assert!(result.is_err());
        } else {
            let expected = (bucket_size - local).min(request as u64) as usize;
            prop_assert_eq!(result.unwrap(), expected);
        }
    }

    /// Round trip: what was written inside one bucket reads back unchanged,
    /// and bytes past the written span read as zeros.
    #[test]
    fn prop_bucket_round_trip(
        offset in 0u64..64,
        data in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        let bucket_size = 128u64;
        prop_assume!(offset + data.len() as u64 <= bucket_size);

        let dir = tempfile::tempdir().unwrap();
        let bucket = test_bucket(&dir, 0, bucket_size);
        bucket.write_at(offset, &data).unwrap();

        let mut out = vec![0xffu8; data.len()];
        prop_assert_eq!(bucket.read_at(offset, &mut out).unwrap(), data.len());
        prop_assert_eq!(&out, &data);

        // everything past the written span is logical zero
        let tail_offset = offset + data.len() as u64;
        if tail_offset < bucket_size {
            let mut tail = vec![0xffu8; (bucket_size - tail_offset) as usize];
            bucket.read_at(tail_offset, &mut tail).unwrap();
            prop_assert!(tail.iter().all(|&b| b == 0));
        }
    }

    /// The chunked export behaves exactly like a flat byte array, including
    /// across bucket boundaries.
    #[test]
    fn prop_export_matches_flat_model(
        ops in proptest::collection::vec(any_device_op(), 1..24),
    ) {
        let dir = tempfile::tempdir().unwrap();
        // 8-byte buckets force nearly every op to span a boundary
        let config = test_config(&dir, 8, MODEL_SIZE);
        let export = ChunkedExport::new(config, Arc::new(NoRecovery)).unwrap();
        let mut model = vec![0u8; MODEL_SIZE as usize];

        for op in &ops {
            match op {
                DeviceOp::Write { offset, data } => {
                    export.write(*offset, data, false).unwrap();
                    model[*offset as usize..*offset as usize + data.len()]
                        .copy_from_slice(data);
                }
                DeviceOp::Read { offset, length } => {
                    let got = export.read(*offset, *length).unwrap();
                    let want = &model[*offset as usize..*offset as usize + *length];
                    prop_assert_eq!(&got[..], want);
                }
                DeviceOp::Trim { offset, length } => {
                    export.trim(*offset, *length).unwrap();
                    model[*offset as usize..(*offset + *length) as usize].fill(0);
                }
            }
        }

        let final_read = export.read(0, MODEL_SIZE as usize).unwrap();
        prop_assert_eq!(final_read, model);
    }
}
