use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use physician_map::prelude::*;
use physician_map::reader::normalize_records;
use std::hint::black_box;

const SPECIALTIES: [&str; 6] = [
    "Cardiology",
    "Pediatric Cardiology",
    "Neurology",
    "Family Medicine",
    "Internal Medicine",
    "Dermatology",
];
const LANGUAGES: [&str; 4] = ["English", "English, Spanish", "Spanish, Vietnamese", "English, Mandarin"];

/// Synthetic directory spread over the Houston area, with some shared addresses
fn synthetic_directory(count: usize) -> Vec<ProviderRecord> {
    (0..count)
        .map(|i| {
            ProviderRecord::new()
                .with(" Name ", format!(" Dr. {} ", i))
                .with("Occupation", if i % 3 == 0 { "Nurse Practitioner" } else { "Physician" })
                .with("Specialty", SPECIALTIES[i % SPECIALTIES.len()])
                .with("Subspecialty", if i % 4 == 0 { "N/A".to_string() } else { format!("Focus {}", i % 9) })
                .with("LanguagesSpoken", LANGUAGES[i % LANGUAGES.len()])
                .with("Address", format!("{} Main St", i / 3))
                .with("Latitude", 29.5 + (i % 50) as f64 * 0.01)
                .with("Longitude", -95.6 + (i / 50) as f64 * 0.01)
        })
        .collect()
}

fn benchmark_load(c: &mut Criterion) {
    let raw = synthetic_directory(600);
    let mut group = c.benchmark_group("load");

    group.bench_function("normalize_600", |b| {
        b.iter(|| normalize_records(black_box(&raw)))
    });

    let normalized = normalize_records(&raw);
    group.bench_function("facet_index_600", |b| {
        b.iter(|| FacetIndex::build(black_box(&normalized)))
    });

    group.finish();
}

fn benchmark_filter(c: &mut Criterion) {
    let dataset = ProviderDataset::from_raw(&synthetic_directory(600));
    let engine = dataset.filter_engine();
    let mut group = c.benchmark_group("filter");

    let cases = [
        ("unconstrained", FilterCriteria::new()),
        ("specialty", FilterCriteria::new().specialty("cardio")),
        (
            "all_facets",
            FilterCriteria::new()
                .occupation("physician")
                .specialty("medicine")
                .subspecialty("focus")
                .language("spanish"),
        ),
    ];
    for (name, criteria) in &cases {
        group.bench_with_input(BenchmarkId::new("facets_600", name), criteria, |b, criteria| {
            b.iter(|| engine.apply_facets(black_box(dataset.records()), criteria))
        });
    }

    let origin = Coordinates::new(29.7604, -95.3698);
    group.bench_function("distance_600", |b| {
        b.iter(|| {
            let all: Vec<&ProviderRecord> = dataset.records().iter().collect();
            FilterEngine::apply_distance(all, black_box(&origin), 10.0)
        })
    });

    group.finish();
}

fn benchmark_render(c: &mut Criterion) {
    let dataset = ProviderDataset::from_raw(&synthetic_directory(600));
    let renderer = MarkerRenderer::default();
    let mut group = c.benchmark_group("render");

    group.bench_function("render_600_capped", |b| {
        b.iter(|| dataset.render_all(black_box(&renderer)))
    });

    let subset: Vec<&ProviderRecord> = dataset.records().iter().take(150).collect();
    group.bench_function("render_150_fit_bounds", |b| {
        b.iter(|| renderer.render(black_box(&subset), dataset.len()))
    });

    group.finish();
}

criterion_group!(benches, benchmark_load, benchmark_filter, benchmark_render);
criterion_main!(benches);
