use criterion::{criterion_group, criterion_main, Criterion};
use hotsearch_core::extract::parse_page;

fn archive_page(n: usize) -> String {
    let items: String = (1..=n)
        .map(|i| {
            format!(
                r#"<a aria-label="查看微博话题"><h2 class="text-xl">第{i}名：话题{i}</h2><div class="flex"><div class="inline-flex">社会</div><div class="inline-flex">🔥{i}.5万</div><div class="inline-flex">阅读1.2亿</div></div></a>"#
            )
        })
        .collect();
    format!("<html><body>{items}</body></html>")
}

fn bench_parse(c: &mut Criterion) {
    let html = archive_page(50);
    c.bench_function("parse_archive_page_50", |b| b.iter(|| parse_page(&html, "2025-01-01")));
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
