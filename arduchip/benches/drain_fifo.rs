use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use arduchip::{ArduChip, MAX_FRAMEBUFFER_SIZE};
use arduchip_test_data::{example_frame, MockArduChip};

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("FIFO Drain");

    for &length in [2050usize, 64 * 1024, MAX_FRAMEBUFFER_SIZE].iter() {
        let device = MockArduChip::with_frame(&example_frame(length));
        let mut camera = ArduChip::new(device.spi(), device.chip_select())
            .expect("An ArduChip should be created with a simulated device");
        let mut framebuffer = vec![0u8; MAX_FRAMEBUFFER_SIZE];
        group.throughput(Throughput::Bytes(length as u64));
        group.bench_with_input(BenchmarkId::from_parameter(length), &length, |b, _| {
            b.iter(|| {
                let read = camera.read_image(&mut framebuffer).unwrap();
                device.clear_transactions();
                read
            })
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
