use criterion::{black_box, criterion_group, criterion_main, Criterion};
use form_core::form::{
    Direction, FieldDefinition, FieldRegistry, NavigationController, ValidationEngine,
};
use form_core::storage::matches_filter;

fn build_registry(field_count: usize) -> FieldRegistry {
    let mut registry = FieldRegistry::new();
    for idx in 0..field_count {
        let name = format!("FIELD_{idx:04}");
        let definition = match idx % 3 {
            0 => FieldDefinition::number().required(),
            1 => FieldDefinition::date(),
            _ => FieldDefinition::text().with_max_length(40),
        };
        registry.register(&name, definition).expect("register field");
        let value = match idx % 3 {
            0 => format!("{}", idx * 10),
            1 => "2024-02-29".to_string(),
            _ => format!("value {idx}"),
        };
        registry.set(&name, value).expect("set field");
    }
    registry
}

fn bench_validation(c: &mut Criterion) {
    let engine = ValidationEngine::default();
    let mut registry = build_registry(black_box(500));

    c.bench_function("validate_form_500_fields", |b| {
        b.iter(|| {
            black_box(engine.validate_form(&mut registry));
        })
    });
}

fn bench_navigation(c: &mut Criterion) {
    let registry = build_registry(black_box(500));

    c.bench_function("navigate_full_cycle_500_fields", |b| {
        b.iter(|| {
            let mut current = NavigationController::first(&registry).expect("first field");
            for _ in 0..registry.len() {
                current = NavigationController::next(
                    &registry,
                    Some(current.as_str()),
                    Direction::Forward,
                )
                .expect("next field");
            }
            black_box(current);
        })
    });
}

fn bench_filters(c: &mut Criterion) {
    let names: Vec<String> = (0..10_000).map(|idx| format!("Employee{idx}")).collect();

    c.bench_function("like_filter_10k_values", |b| {
        b.iter(|| {
            let matched = names
                .iter()
                .filter(|name| matches_filter(name, black_box("emp%9_")))
                .count();
            black_box(matched);
        })
    });
}

criterion_group!(benches, bench_validation, bench_navigation, bench_filters);
criterion_main!(benches);
