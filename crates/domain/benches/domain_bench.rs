//! Benchmarks for pure domain operations.

use common::{Currency, Money, PaymentRef, RefundId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Order, OrderItem, Stock};

fn sample_items() -> Vec<OrderItem> {
    vec![
        OrderItem::new("cola-330ml", "Cola 330ml", 2, Money::from_minor(250)),
        OrderItem::new("choc-bar", "Chocolate Bar", 1, Money::from_minor(180)),
        OrderItem::new("water-500ml", "Water 500ml", 3, Money::from_minor(120)),
    ]
}

fn bench_order_lifecycle(c: &mut Criterion) {
    c.bench_function("order/create", |b| {
        b.iter(|| Order::new(sample_items()).unwrap())
    });

    c.bench_function("order/create_and_activate", |b| {
        b.iter(|| {
            let mut order = Order::new(sample_items()).unwrap();
            order
                .activate(Currency::new("eur"), PaymentRef::new("pi_bench"))
                .unwrap();
            order
        })
    });

    c.bench_function("order/refund_ledger_to_full", |b| {
        b.iter(|| {
            let mut order = Order::new(sample_items()).unwrap();
            order
                .activate(Currency::new("eur"), PaymentRef::new("pi_bench"))
                .unwrap();
            order
                .apply_refund(RefundId::new("re_1"), Money::from_minor(500))
                .unwrap();
            order
                .apply_refund(RefundId::new("re_2"), Money::from_minor(540))
                .unwrap();
            order
        })
    });
}

fn bench_stock(c: &mut Criterion) {
    c.bench_function("stock/fill_and_drain", |b| {
        b.iter(|| {
            let mut stock = Stock::new(
                common::MachineId::new(),
                1,
                "cola-330ml".into(),
                10,
                2,
            );
            stock.apply_delta(10).unwrap();
            while !stock.is_empty() {
                stock.apply_delta(-1).unwrap();
            }
            stock
        })
    });
}

criterion_group!(benches, bench_order_lifecycle, bench_stock);
criterion_main!(benches);
