use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use studyhub::filter;
use studyhub::state::FilterState;
use studyhub::{Category, CategoryFilter, Material};

fn materials(n: usize) -> Vec<Material> {
    (0..n)
        .map(|i| Material {
            id: format!("m{i}"),
            file_name: format!("Unit {} notes part {}.pdf", i % 12, i),
            category: Category::ALL[i % Category::ALL.len()],
            file_url: format!("blob://studyhub/materials/CSE-2A/{i}_notes.pdf"),
            class: "CSE-2A".into(),
            uploaded_by: format!("student {}", i % 40),
            uploader_id: format!("u{}", i % 40),
            upload_date: Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
            file_size: Some(1024),
            file_type: Some("application/pdf".into()),
        })
        .collect()
}

fn bench_filter(c: &mut Criterion, name: &str, filter: FilterState) {
    let list = materials(2000);
    c.bench_function(name, |b| {
        b.iter(|| filter::apply(black_box(&list), black_box(&filter)));
    });
}

fn bench_identity(c: &mut Criterion) {
    bench_filter(c, "filter_2000_all", FilterState::default());
}

fn bench_category(c: &mut Criterion) {
    bench_filter(
        c,
        "filter_2000_category",
        FilterState {
            category: CategoryFilter::Only(Category::Notes),
            query: String::new(),
        },
    );
}

fn bench_query(c: &mut Criterion) {
    bench_filter(
        c,
        "filter_2000_query",
        FilterState {
            category: CategoryFilter::All,
            query: "Student 7".into(),
        },
    );
}

criterion_group!(benches, bench_identity, bench_category, bench_query);
criterion_main!(benches);
