use criterion::{black_box, criterion_group, criterion_main, Criterion};
use eventhub_core::{EventBus, EventBusConfig, EventSource};

#[derive(Debug, Clone)]
struct PriceUpdated {
    sku: u64,
    cents: u64,
}

fn bench_register_revoke(c: &mut Criterion) {
    let bus = EventBus::with_config(EventBusConfig::default().with_dev_mode(false));
    let source = EventSource::from_values([PriceUpdated { sku: 1, cents: 999 }]);

    c.bench_function("register_revoke", |b| {
        b.iter(|| {
            let registration = bus.register(black_box(source.clone()));
            registration.revoke()
        })
    });
}

fn bench_dispatch_unheard(c: &mut Criterion) {
    let bus = EventBus::with_config(EventBusConfig::default().with_dev_mode(false));

    c.bench_function("dispatch_without_subscriber", |b| {
        b.iter(|| bus.dispatch(black_box(PriceUpdated { sku: 7, cents: 100 })))
    });
}

fn bench_dispatch_linked(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let bus = EventBus::with_config(EventBusConfig::default().with_dev_mode(false));
    let mut rx = runtime
        .block_on(async { bus.get::<PriceUpdated>().subscribe() })
        .expect("subscribe");

    c.bench_function("dispatch_and_receive", |b| {
        b.iter(|| {
            runtime.block_on(async {
                bus.dispatch(PriceUpdated { sku: 7, cents: 100 });
                black_box(rx.recv().await)
            })
        })
    });
}

criterion_group!(
    benches,
    bench_register_revoke,
    bench_dispatch_unheard,
    bench_dispatch_linked
);
criterion_main!(benches);
