use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fibre_admission::{FeatureExtractor, OptLabeler, Request, Window, WindowBuffer};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Zipf};
use rand_pcg::Pcg64;

const CACHE_SIZE: u64 = 64 * 1024 * 1024;

fn zipf_trace(len: usize, objects: u64) -> Vec<Request> {
  let mut rng = Pcg64::seed_from_u64(42);
  let sizes: Vec<u64> = (0..objects).map(|_| rng.random_range(64..=1 << 20)).collect();
  let zipf = Zipf::new(objects as f64, 0.8).unwrap();
  (0..len)
    .map(|i| {
      let id = zipf.sample(&mut rng) as u64 - 1;
      Request::new(i as u64 + 1, id, sizes[id as usize], 1.0)
    })
    .collect()
}

fn buffered(window_size: u64, trace: &[Request]) -> Window {
  let mut buffer = WindowBuffer::new(window_size);
  for request in trace {
    buffer.ingest(request);
  }
  buffer.take()
}

fn bench_window(c: &mut Criterion) {
  let mut group = c.benchmark_group("window");
  for &window_size in &[10_000u64, 100_000] {
    let trace = zipf_trace(window_size as usize, window_size / 10);
    group.throughput(Throughput::Elements(window_size));

    group.bench_with_input(BenchmarkId::new("ingest", window_size), &trace, |b, trace| {
      b.iter(|| black_box(buffered(window_size, trace)))
    });

    let window = buffered(window_size, &trace);
    let labeler = OptLabeler::new(CACHE_SIZE);
    group.bench_with_input(BenchmarkId::new("opt", window_size), &window, |b, window| {
      b.iter_batched(
        || window.clone(),
        |mut window| black_box(labeler.label(&mut window)),
        criterion::BatchSize::LargeInput,
      )
    });

    let mut labeled = window.clone();
    labeler.label(&mut labeled);
    let extractor = FeatureExtractor::new(CACHE_SIZE, 50);
    group.bench_with_input(BenchmarkId::new("features", window_size), &labeled, |b, window| {
      b.iter(|| black_box(extractor.extract(window).unwrap()))
    });
  }
  group.finish();
}

criterion_group!(benches, bench_window);
criterion_main!(benches);
