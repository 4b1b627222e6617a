//! 基于 proptest 的管道性质测试。
//!
//! # 教案级导览
//! - **Why**：端到端场景只覆盖少数几何组合，写入粒度、读取粒度与段大小之间的错位才是
//!   部分读写簿记最容易出错的地方；
//! - **How**：随机生成段池几何、写入分块与读取缓冲大小，用真实的生产者线程驱动管道；
//! - **What**：断言字节无损有序、读写计数守恒、流结束后恒返回 0、段全部回到池中。

use std::{sync::Arc, thread};

use proptest::{collection::vec, prelude::*};
use spark_pipe::Pipe;

fn chunks() -> impl Strategy<Value = Vec<Vec<u8>>> {
    vec(vec(any::<u8>(), 0..96), 0..24)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn bytes_arrive_in_order_and_segments_return(
        segment_count in 1usize..6,
        segment_size in 1usize..32,
        read_size in 1usize..64,
        writes in chunks(),
    ) {
        let pipe = Arc::new(Pipe::with_segments(segment_count, segment_size).expect("构造管道"));
        let expected: Vec<u8> = writes.concat();

        let producer = {
            let pipe = Arc::clone(&pipe);
            thread::spawn(move || {
                for chunk in &writes {
                    pipe.write(chunk).expect("写入");
                }
                pipe.end_of_stream();
            })
        };

        let mut buf = vec![0u8; read_size];
        let mut received = Vec::with_capacity(expected.len());
        let mut total = 0usize;
        loop {
            let read = pipe.read(&mut buf).expect("读取");
            prop_assert!(read <= read_size);
            if read == 0 {
                break;
            }
            total += read;
            received.extend_from_slice(&buf[..read]);
        }
        producer.join().expect("写线程不应 panic");

        prop_assert_eq!(total, expected.len());
        prop_assert_eq!(&received, &expected);
        prop_assert_eq!(pipe.read(&mut buf).expect("流结束后读取"), 0);

        let stats = pipe.statistics();
        prop_assert_eq!(stats.bytes_written, expected.len() as u64);
        prop_assert_eq!(stats.bytes_read, expected.len() as u64);
        prop_assert_eq!(stats.pool.free_segments, segment_count);
        prop_assert!(stats.pool.peak_leased <= segment_count);
        prop_assert_eq!(stats.pool.total_acquisitions, stats.pool.total_releases);
    }

    #[test]
    fn offsets_select_the_requested_window(
        payload in vec(any::<u8>(), 1..128),
        split in any::<prop::sample::Index>(),
        segment_size in 1usize..16,
    ) {
        let offset = split.index(payload.len());
        let count = payload.len() - offset;
        let pipe = Pipe::with_segments(payload.len(), segment_size).expect("构造管道");
        pipe.write_range(&payload, offset, count).expect("写入");
        pipe.end_of_stream();

        let mut buf = vec![0u8; count + 3];
        let mut received = Vec::new();
        loop {
            let read = pipe.read_range(&mut buf, 3, count).expect("读取");
            if read == 0 {
                break;
            }
            received.extend_from_slice(&buf[3..3 + read]);
        }
        prop_assert_eq!(&received[..], &payload[offset..]);
    }
}
