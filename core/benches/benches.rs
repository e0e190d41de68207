
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use remodel::Record;
use types::*;

fn randomizer() -> StdRng {
    StdRng::seed_from_u64(0)
}

fn serialize(c: &mut Criterion) {
    let mut rng = randomizer();
    let schema = Account::schema();
    let record = Account::generate(&mut rng);
    let target = remodel::deserialize(&schema, &record, |_| (), None).unwrap();

    c.bench_function("Serialize model", |b| {
        b.iter(|| {
            let _ = remodel::serialize(black_box(&schema), black_box(&target)).unwrap();
        })
    });
    c.bench_function("Serialize model to JSON", |b| {
        b.iter(|| {
            let record = remodel::serialize(black_box(&schema), black_box(&target)).unwrap();
            let _ = serde_json::to_string(&record).unwrap();
        })
    });
    c.bench_function("Serialize record to JSON", |b| {
        b.iter(|| {
            let _ = serde_json::to_string(black_box(&record)).unwrap();
        })
    });
    c.bench_function("Serialize record to YAML", |b| {
        b.iter(|| {
            let _ = serde_yaml::to_string(black_box(&record)).unwrap();
        })
    });
    c.bench_function("Serialize record to RON", |b| {
        b.iter(|| {
            let _ = ron::to_string(black_box(&record)).unwrap();
        })
    });
}

fn deserialize(c: &mut Criterion) {
    let mut rng = randomizer();
    let schema = Account::schema();
    let record = Account::generate(&mut rng);

    c.bench_function("Deserialize model", |b| {
        b.iter(|| {
            let _ = remodel::deserialize(black_box(&schema), black_box(&record), |_| (), None)
                .unwrap();
        })
    });
    c.bench_function("Deserialize model from JSON", |b| {
        let input = serde_json::to_string(&record).unwrap();
        b.iter(|| {
            let record = serde_json::from_str::<Record>(black_box(&input)).unwrap();
            let _ = remodel::deserialize(&schema, &record, |_| (), None).unwrap();
        })
    });
    c.bench_function("Deserialize record from JSON", |b| {
        let input = serde_json::to_string(&record).unwrap();
        b.iter(|| {
            let _ = serde_json::from_str::<Record>(black_box(&input)).unwrap();
        })
    });
    c.bench_function("Deserialize record from YAML", |b| {
        let input = serde_yaml::to_string(&record).unwrap();
        b.iter(|| {
            let _ = serde_yaml::from_str::<Record>(black_box(&input)).unwrap();
        })
    });
    c.bench_function("Deserialize record from RON", |b| {
        let input = ron::to_string(&record).unwrap();
        b.iter(|| {
            let _ = ron::from_str::<Record>(black_box(&input)).unwrap();
        })
    });
}

fn update(c: &mut Criterion) {
    let mut rng = randomizer();
    let schema = Account::schema();
    let record = Account::generate(&mut rng);
    let next = Account::generate(&mut rng);
    let target = remodel::deserialize(&schema, &record, |_| (), None).unwrap();

    c.bench_function("Update model in place", |b| {
        b.iter(|| {
            let _ = remodel::update(black_box(&schema), &target, black_box(&next), |_| (), None)
                .unwrap();
        })
    });
}

fn batches(c: &mut Criterion) {
    let mut rng = randomizer();
    let schema = Account::schema();
    let records = (0..64)
        .map(|_| Account::generate(&mut rng))
        .collect::<Vec<_>>();

    c.bench_function("Deserialize batch", |b| {
        b.iter(|| {
            let _ = remodel::deserialize_all(black_box(&schema), black_box(&records), |_| (), None)
                .unwrap();
        })
    });
    c.bench_function("Serialize batch", |b| {
        let targets = remodel::deserialize_all(&schema, &records, |_| (), None).unwrap();
        b.iter(|| {
            let _ = remodel::serialize_all(black_box(&schema), black_box(&targets)).unwrap();
        })
    });
}

criterion_group!(benches, serialize, deserialize, update, batches);
criterion_main!(benches);
