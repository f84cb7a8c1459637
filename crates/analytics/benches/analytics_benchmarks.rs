use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use autoshop_analytics::{LocalCalendar, MonthlyRevenue, RankBy, ServiceRanking};
use autoshop_catalog::{NewService, Service};
use autoshop_core::{InvoiceId, LineItemId, OrderId, ServiceId};
use autoshop_invoicing::Invoice;
use autoshop_orders::LineItem;

fn catalog(n: usize) -> Vec<Service> {
    (0..n)
        .map(|i| {
            NewService {
                name: format!("Service {i}"),
                description: None,
                price: Decimal::new(1000 + i as i64 * 250, 2),
                estimated_minutes: None,
            }
            .into_service(ServiceId::new(), Utc::now())
            .unwrap()
        })
        .collect()
}

fn line_items(services: &[Service], n: usize) -> Vec<LineItem> {
    let now = Utc::now();
    (0..n)
        .map(|i| {
            let s = &services[(i * 7) % services.len()];
            let quantity = (i % 3) as u32 + 1;
            LineItem {
                id: LineItemId::new(),
                order_id: OrderId::new(),
                service_id: s.id,
                quantity,
                unit_price: s.price,
                subtotal: s.price * Decimal::from(quantity),
                created_at: now,
            }
        })
        .collect()
}

fn invoices(n: usize) -> Vec<Invoice> {
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 9, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let subtotal = Decimal::new(2000 + (i % 50) as i64 * 100, 2);
            let tax = subtotal * Decimal::new(12, 2);
            Invoice {
                id: InvoiceId::new(),
                order_id: OrderId::new(),
                subtotal,
                tax,
                total: subtotal + tax,
                payment_method: if i % 2 == 0 { "cash" } else { "card" }.to_string(),
                issued_at: start + Duration::hours(i as i64 * 3),
            }
        })
        .collect()
}

fn bench_service_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("service_ranking");
    let services = catalog(40);

    for size in [1_000usize, 10_000, 100_000].iter() {
        let lines = line_items(&services, *size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &lines, |b, lines| {
            b.iter(|| {
                let mut ranking = ServiceRanking::new();
                for line in lines {
                    ranking.record(line);
                }
                black_box(ranking.top(5, RankBy::Quantity, &services))
            });
        });
    }

    group.finish();
}

fn bench_monthly_revenue(c: &mut Criterion) {
    let mut group = c.benchmark_group("monthly_revenue");
    let calendar = LocalCalendar::from_offset_minutes(-300).unwrap();

    for size in [1_000usize, 10_000].iter() {
        let rows = invoices(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &rows, |b, rows| {
            b.iter(|| {
                let mut series = MonthlyRevenue::new(calendar);
                for invoice in rows {
                    series.record(invoice);
                }
                black_box(series.into_series())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_service_ranking,
    bench_monthly_revenue
);
criterion_main!(benches);
