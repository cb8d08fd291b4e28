use std::sync::Arc;

use alerts::{AlertEngine, AlertService};
use common::MachineId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::Stock;
use store::{InMemoryStore, VendingStore};

fn slot_with(machine_id: MachineId, slot_number: u32, quantity: u32) -> Stock {
    let mut stock = Stock::new(machine_id, slot_number, "cola-330ml".into(), 10, 2);
    if quantity > 0 {
        stock.apply_delta(quantity as i32).unwrap();
    }
    stock
}

fn bench_derive_six_slots(c: &mut Criterion) {
    let engine = AlertEngine::default();
    let machine_id = MachineId::new();
    let stock: Vec<Stock> = (1..=6).map(|i| slot_with(machine_id, i, i % 3)).collect();

    c.bench_function("alerts/derive_six_slots", |b| {
        b.iter(|| engine.derive(machine_id, &stock));
    });
}

fn bench_recompute_machine(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let service = AlertService::new(Arc::clone(&store));
    let machine_id = MachineId::new();

    rt.block_on(async {
        for i in 1..=6 {
            store
                .insert_stock(&slot_with(machine_id, i, i % 3))
                .await
                .unwrap();
        }
    });

    c.bench_function("alerts/recompute_machine", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.recompute(machine_id).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_derive_six_slots, bench_recompute_machine);
criterion_main!(benches);
